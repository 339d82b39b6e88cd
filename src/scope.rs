// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! The interface between queries and the layer that actually sends
//! them.
//!
//! A query does not do I/O. Its driver picks [`Scope`]s through a
//! [`Transport`], asks the transport to start transactions on them,
//! and is later handed each [`TransactionOutcome`] by its owner.

use std::fmt;
use std::str::FromStr;

use crate::answer::Answer;
use crate::flags::{QueryFlags, ResolvedFlags};
use crate::message::{Packet, Rcode};
use crate::name::Name;
use crate::question::Question;
use crate::util::Caseless;

////////////////////////////////////////////////////////////////////////
// PROTOCOLS AND FAMILIES                                             //
////////////////////////////////////////////////////////////////////////

/// A name-resolution protocol.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Protocol {
    /// Unicast DNS.
    Dns,
    Llmnr,
    Mdns,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Dns => "dns",
            Self::Llmnr => "llmnr",
            Self::Mdns => "mdns",
        })
    }
}

impl FromStr for Protocol {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        [Self::Dns, Self::Llmnr, Self::Mdns]
            .into_iter()
            .find(|protocol| Caseless(text) == Caseless(&protocol.to_string()))
            .ok_or("unknown protocol")
    }
}

/// An address family.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Family {
    Inet,
    Inet6,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Inet => "inet",
            Self::Inet6 => "inet6",
        })
    }
}

impl FromStr for Family {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if Caseless(text) == Caseless("inet") || Caseless(text) == Caseless("ipv4") {
            Ok(Self::Inet)
        } else if Caseless(text) == Caseless("inet6") || Caseless(text) == Caseless("ipv6") {
            Ok(Self::Inet6)
        } else {
            Err("unknown address family")
        }
    }
}

////////////////////////////////////////////////////////////////////////
// SCOPES                                                             //
////////////////////////////////////////////////////////////////////////

/// Identifies a [`Scope`] within its [`Transport`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

/// A place queries can be sent: one protocol, possibly bound to an
/// interface and address family.
#[derive(Clone, Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub protocol: Protocol,
    pub family: Option<Family>,
    pub ifindex: Option<u32>,

    /// Routing domains: names at or below these are preferably resolved
    /// on this scope.
    pub domains: Vec<Name>,

    /// Domains that single-label names are expanded with.
    pub search_domains: Vec<Name>,

    /// Whether names matching no routing domain of any scope may be
    /// sent here.
    pub default_route: bool,
}

/// How well a name fits a [`Scope`]. Variants are ordered from worst to
/// best; `Yes` carries the label count of the routing domain matched,
/// so more specific domains win.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum DomainMatch {
    No,
    LastResort,
    Maybe,
    Yes(usize),
}

impl Scope {
    pub fn new(id: ScopeId, protocol: Protocol, family: Option<Family>, ifindex: Option<u32>) -> Self {
        Self {
            id,
            protocol,
            family,
            ifindex,
            domains: Vec::new(),
            search_domains: Vec::new(),
            default_route: protocol == Protocol::Dns,
        }
    }

    /// Rates how well `name` fits this scope for a query with the given
    /// interface restriction and flags.
    pub fn good_domain(&self, name: &Name, ifindex: Option<u32>, flags: QueryFlags) -> DomainMatch {
        if !flags.allows(self.protocol, self.family) {
            return DomainMatch::No;
        }
        if ifindex.is_some() && self.ifindex != ifindex {
            return DomainMatch::No;
        }

        match self.protocol {
            Protocol::Dns => {
                let best_domain = self
                    .domains
                    .iter()
                    .filter(|domain| name.eq_or_subdomain_of(domain))
                    .map(Name::len)
                    .max();
                if let Some(len) = best_domain {
                    DomainMatch::Yes(len)
                } else if is_under(name, &[b"local"]) {
                    DomainMatch::LastResort
                } else if name.is_single_label() {
                    if self.search_domains_for(name, flags).is_empty() {
                        DomainMatch::No
                    } else {
                        DomainMatch::Maybe
                    }
                } else if self.default_route {
                    DomainMatch::Maybe
                } else {
                    DomainMatch::No
                }
            }
            Protocol::Llmnr => {
                if (name.is_single_label() && !is_under(name, &[b"local"])) || is_reverse(name) {
                    DomainMatch::Maybe
                } else {
                    DomainMatch::No
                }
            }
            Protocol::Mdns => {
                if is_under(name, &[b"local"]) || is_reverse(name) {
                    DomainMatch::Maybe
                } else {
                    DomainMatch::No
                }
            }
        }
    }

    /// Returns the search domains `name` is expanded with on this
    /// scope: only single-label names are, only over unicast DNS, and
    /// never with [`QueryFlags::NO_SEARCH`].
    pub fn search_domains_for(&self, name: &Name, flags: QueryFlags) -> &[Name] {
        if self.protocol == Protocol::Dns
            && name.is_single_label()
            && !flags.contains(QueryFlags::NO_SEARCH)
        {
            &self.search_domains
        } else {
            &[]
        }
    }
}

/// Returns whether `name` is strictly below the domain whose labels
/// (without the null label) are `suffix`.
fn is_under(name: &Name, suffix: &[&[u8]]) -> bool {
    name.len() > suffix.len() + 1
        && name
            .labels()
            .rev()
            .skip(1)
            .zip(suffix.iter().rev())
            .all(|(label, expected)| label.octets().eq_ignore_ascii_case(expected))
}

/// Returns whether `name` is a reverse-lookup name.
fn is_reverse(name: &Name) -> bool {
    is_under(name, &[b"in-addr", b"arpa"]) || is_under(name, &[b"ip6", b"arpa"])
}

////////////////////////////////////////////////////////////////////////
// TRANSACTIONS                                                       //
////////////////////////////////////////////////////////////////////////

/// Identifies a transaction started by a [`Transport`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// What a transaction asks.
#[derive(Clone, Debug)]
pub enum Payload {
    Question(Question),

    /// A bypass message, sent as it is.
    Packet(Packet),
}

/// A request to start a transaction.
#[derive(Clone, Debug)]
pub struct Request {
    pub scope: ScopeId,
    pub payload: Payload,
}

/// How a transaction ended.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TransactionState {
    Success,

    /// A reply arrived with an RCODE other than NOERROR (NXDOMAIN
    /// included).
    RcodeFailure,
    Timeout,
    NetworkFailure,
    InvalidReply,
    Aborted,
}

/// The result of a finished transaction.
#[derive(Clone, Debug)]
pub struct TransactionOutcome {
    pub state: TransactionState,
    pub answer: Answer,
    pub rcode: Rcode,
    pub protocol: Protocol,
    pub family: Option<Family>,
    pub flags: ResolvedFlags,
}

impl TransactionOutcome {
    /// Returns an outcome in `state` with an empty answer.
    pub fn empty(state: TransactionState, protocol: Protocol) -> Self {
        Self {
            state,
            answer: Answer::new(),
            rcode: Rcode::NoError,
            protocol,
            family: None,
            flags: ResolvedFlags::empty(),
        }
    }
}

/// The capability to send queries, provided by the embedding system.
pub trait Transport {
    /// Returns the scopes currently available.
    fn scopes(&self) -> &[Scope];

    /// Starts a transaction. Its outcome is later delivered to the
    /// query that started it.
    fn start(&mut self, request: Request) -> Result<TransactionId, StartError>;

    /// Abandons a transaction whose outcome is no longer wanted.
    fn abort(&mut self, id: TransactionId);
}

/// An error signaling that a transaction could not be started.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StartError {
    UnknownScope,

    /// The scope cannot carry this kind of request.
    Unsupported,
    Busy,
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnknownScope => f.write_str("unknown scope"),
            Self::Unsupported => f.write_str("request not supported by the scope"),
            Self::Busy => f.write_str("transport busy"),
        }
    }
}

impl std::error::Error for StartError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
