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

//! Flag sets controlling how a query is resolved and describing where
//! its answer came from.

use std::str::FromStr;

use bitflags::bitflags;

use crate::scope::{Family, Protocol};

bitflags! {
    /// Resolution-mode flags of a query.
    ///
    /// The protocol bits select which kinds of scopes may carry the
    /// query; the remaining bits restrict how it is resolved.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct QueryFlags: u32 {
        const DNS = 1 << 0;
        const LLMNR_IPV4 = 1 << 1;
        const LLMNR_IPV6 = 1 << 2;
        const MDNS_IPV4 = 1 << 3;
        const MDNS_IPV6 = 1 << 4;

        /// Fail instead of following CNAME and DNAME redirects.
        const NO_CNAME = 1 << 5;

        /// Do not expand single-label names with search domains. Set
        /// automatically once a redirect has been followed.
        const NO_SEARCH = 1 << 6;

        const LLMNR = Self::LLMNR_IPV4.bits() | Self::LLMNR_IPV6.bits();
        const MDNS = Self::MDNS_IPV4.bits() | Self::MDNS_IPV6.bits();
        const PROTOCOLS = Self::DNS.bits() | Self::LLMNR.bits() | Self::MDNS.bits();
    }
}

impl QueryFlags {
    /// Returns the protocol bit a scope of the given protocol and
    /// family needs to be allowed.
    pub fn for_scope(protocol: Protocol, family: Option<Family>) -> Self {
        match (protocol, family) {
            (Protocol::Dns, _) => Self::DNS,
            (Protocol::Llmnr, Some(Family::Inet)) => Self::LLMNR_IPV4,
            (Protocol::Llmnr, Some(Family::Inet6)) => Self::LLMNR_IPV6,
            (Protocol::Llmnr, None) => Self::LLMNR,
            (Protocol::Mdns, Some(Family::Inet)) => Self::MDNS_IPV4,
            (Protocol::Mdns, Some(Family::Inet6)) => Self::MDNS_IPV6,
            (Protocol::Mdns, None) => Self::MDNS,
        }
    }

    /// Returns whether a scope of the given protocol and family may
    /// carry a query with these flags.
    pub fn allows(self, protocol: Protocol, family: Option<Family>) -> bool {
        self.intersects(Self::for_scope(protocol, family))
    }
}

bitflags! {
    /// Provenance of a completed lookup, reported by the transaction
    /// layer for the answer as a whole.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct ResolvedFlags: u32 {
        /// The answer was validated with DNSSEC.
        const AUTHENTICATED = 1 << 0;

        /// The answer travelled over an encrypted channel, or never
        /// left the host.
        const CONFIDENTIAL = 1 << 1;

        /// The answer was made up locally (e.g. for `localhost`).
        const SYNTHETIC = 1 << 2;

        const FROM_CACHE = 1 << 3;
        const FROM_ZONE = 1 << 4;
        const FROM_TRUST_ANCHOR = 1 << 5;
        const FROM_NETWORK = 1 << 6;

        const FROM_MASK = Self::FROM_CACHE.bits()
            | Self::FROM_ZONE.bits()
            | Self::FROM_TRUST_ANCHOR.bits()
            | Self::FROM_NETWORK.bits();
    }
}

impl ResolvedFlags {
    /// Returns whether an answer with these flags is authoritative: it
    /// was synthesized locally, or every one of its sources is local
    /// configuration.
    ///
    /// Flags without any source bit are *not* authoritative. An answer
    /// always records where it came from, so an empty source set means
    /// the provenance is unknown.
    pub fn is_authoritative(self) -> bool {
        let sources = self & Self::FROM_MASK;
        self.contains(Self::SYNTHETIC)
            || (!sources.is_empty() && (Self::FROM_ZONE | Self::FROM_TRUST_ANCHOR).contains(sources))
    }
}

impl FromStr for QueryFlags {
    type Err = bitflags::parser::ParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        bitflags::parser::from_str(text)
    }
}

impl FromStr for ResolvedFlags {
    type Err = bitflags::parser::ParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        bitflags::parser::from_str(text)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_bits_follow_protocol_and_family() {
        let flags = QueryFlags::DNS | QueryFlags::LLMNR_IPV6;
        assert!(flags.allows(Protocol::Dns, None));
        assert!(flags.allows(Protocol::Llmnr, Some(Family::Inet6)));
        assert!(!flags.allows(Protocol::Llmnr, Some(Family::Inet)));
        assert!(!flags.allows(Protocol::Mdns, None));
    }

    #[test]
    fn authoritative_needs_local_sources() {
        assert!(!ResolvedFlags::FROM_NETWORK.is_authoritative());
        assert!(!(ResolvedFlags::FROM_ZONE | ResolvedFlags::FROM_CACHE).is_authoritative());
        assert!(!ResolvedFlags::empty().is_authoritative());
        assert!(ResolvedFlags::FROM_ZONE.is_authoritative());
        assert!((ResolvedFlags::FROM_ZONE | ResolvedFlags::FROM_TRUST_ANCHOR).is_authoritative());
        assert!((ResolvedFlags::SYNTHETIC | ResolvedFlags::FROM_NETWORK).is_authoritative());
    }

    #[test]
    fn flags_parse_from_names() {
        assert_eq!(
            "AUTHENTICATED | FROM_NETWORK".parse::<ResolvedFlags>().unwrap(),
            ResolvedFlags::AUTHENTICATED | ResolvedFlags::FROM_NETWORK
        );
        assert!("BOGUS".parse::<QueryFlags>().is_err());
    }
}
