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

//! The [`Query`] type: one logical name resolution, from its question
//! through any number of CNAME/DNAME redirects to a terminal state.
//!
//! The query is split over several files:
//!
//! * this file holds construction, the dual-encoding [`Branches`], and
//!   the accessors, including the provenance predicates;
//! * [`chase`] implements the CNAME/DNAME chase;
//! * `auxiliary.rs` implements auxiliary linkage;
//! * `driver.rs` implements scope selection and transaction handling
//!   ([`Query::go`] and friends).

use std::collections::VecDeque;
use std::fmt;

use log::debug;

use crate::answer::Answer;
use crate::config::Config;
use crate::flags::{QueryFlags, ResolvedFlags};
use crate::manager::{Manager, QueryId, Registration};
use crate::message::{Packet, Rcode};
use crate::name::Name;
use crate::question::Question;
use crate::scope::{Family, Protocol, TransactionState};

mod auxiliary;
pub mod chase;
mod driver;
mod error;
pub use chase::{ChaseError, CnameResult};
pub use driver::Completion;
pub use error::{AuxiliaryError, AuxiliaryErrorKind, Error, ErrorKind};

use driver::Candidate;

////////////////////////////////////////////////////////////////////////
// QUERY STATES                                                       //
////////////////////////////////////////////////////////////////////////

/// The resolution state of a [`Query`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum QueryState {
    /// Constructed, or rewritten by a redirect, and not yet started.
    Pending,

    /// Transactions are running.
    Active,

    Success,

    /// No scope could carry the query.
    NoServers,
    RcodeFailure,
    Timeout,
    NetworkFailure,
    InvalidReply,
    Aborted,

    /// The redirect chain could not be followed; see
    /// [`Query::chase_error`].
    CnameLoop,
}

impl QueryState {
    /// Returns whether this state is final.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Active)
    }
}

impl From<TransactionState> for QueryState {
    fn from(state: TransactionState) -> Self {
        match state {
            TransactionState::Success => Self::Success,
            TransactionState::RcodeFailure => Self::RcodeFailure,
            TransactionState::Timeout => Self::Timeout,
            TransactionState::NetworkFailure => Self::NetworkFailure,
            TransactionState::InvalidReply => Self::InvalidReply,
            TransactionState::Aborted => Self::Aborted,
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Success => "success",
            Self::NoServers => "no-servers",
            Self::RcodeFailure => "rcode-failure",
            Self::Timeout => "timeout",
            Self::NetworkFailure => "network-failure",
            Self::InvalidReply => "invalid-reply",
            Self::Aborted => "aborted",
            Self::CnameLoop => "cname-loop",
        })
    }
}

////////////////////////////////////////////////////////////////////////
// QUESTION BRANCHES                                                  //
////////////////////////////////////////////////////////////////////////

/// The question(s) a query currently asks, in up to two encodings.
///
/// The literal (UTF-8) encoding is what link-local protocols carry; the
/// ASCII-compatible (IDNA) one is what unicast DNS carries. When the two
/// name the same keys they are kept once, as `Unified`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Branches {
    /// A bypass query; the question is the one embedded in the packet.
    None,

    /// One question used for every protocol.
    Unified(Question),

    /// The encodings name different keys.
    Diverged { utf8: Question, idna: Question },

    /// Only the literal encoding was supplied.
    Utf8Only(Question),
}

impl Branches {
    fn new(utf8: Option<Question>, idna: Option<Question>) -> Self {
        match (utf8, idna) {
            (None, None) => Self::None,
            (Some(utf8), None) => Self::Utf8Only(utf8),
            (None, Some(idna)) => Self::Unified(idna),
            (Some(utf8), Some(idna)) => Self::from_pair(utf8, idna),
        }
    }

    /// Joins a pair of questions, collapsing them if they are equal.
    fn from_pair(utf8: Question, idna: Question) -> Self {
        if utf8.is_equal(&idna) {
            Self::Unified(idna)
        } else {
            Self::Diverged { utf8, idna }
        }
    }

    /// Returns the literal question, if it is tracked separately.
    pub fn utf8(&self) -> Option<&Question> {
        match self {
            Self::Diverged { utf8, .. } | Self::Utf8Only(utf8) => Some(utf8),
            Self::None | Self::Unified(_) => None,
        }
    }

    /// Returns the ASCII-compatible question.
    pub fn idna(&self) -> Option<&Question> {
        match self {
            Self::Unified(idna) | Self::Diverged { idna, .. } => Some(idna),
            Self::None | Self::Utf8Only(_) => None,
        }
    }

    /// Returns every tracked question, literal first.
    fn iter(&self) -> impl Iterator<Item = &Question> {
        self.utf8().into_iter().chain(self.idna())
    }
}

////////////////////////////////////////////////////////////////////////
// QUERIES                                                            //
////////////////////////////////////////////////////////////////////////

/// One logical name resolution.
///
/// A `Query` is created with [`Query::new`] (or [`Query::new_bypass`]),
/// started with [`Query::go`], and fed transaction outcomes through
/// [`Query::complete_transaction`] until it reaches a terminal
/// [`QueryState`]. Answers that redirect the question are chased in
/// place (see [`chase`]), restarting resolution for the new name when
/// the answer at hand does not finish the chain.
///
/// Every query is registered with its [`Manager`] for as long as it
/// lives. A query may own auxiliary queries (see
/// [`Query::make_auxiliary`]); they are dropped with it. Dropping a
/// query does not abort its transactions; call [`Query::stop`] first.
pub struct Query {
    registration: Registration,
    config: Config,

    branches: Branches,
    bypass: Option<Packet>,

    /// Every key this query has posed, in order. Never shrinks.
    collected_questions: Question,

    ifindex: Option<u32>,
    flags: QueryFlags,

    state: QueryState,
    answer: Answer,
    answer_rcode: Rcode,
    answer_protocol: Option<Protocol>,
    answer_family: Option<Family>,
    answer_query_flags: ResolvedFlags,

    /// The search domain the accepted answer was looked up under.
    answer_search_domain: Option<Name>,

    n_cname_redirects: usize,
    previous_redirect_unauthenticated: bool,
    previous_redirect_non_confidential: bool,
    previous_redirect_non_authoritative: bool,
    chase_error: Option<ChaseError>,

    auxiliary_for: Option<QueryId>,

    /// Auxiliary queries, most recently attached first.
    auxiliary_queries: VecDeque<Query>,

    candidates: Vec<Candidate>,
}

impl Query {
    /// Creates a query.
    ///
    /// Exactly one of a question (in either or both encodings) and a
    /// bypass `packet` must be given. Each question must be valid for
    /// a query (see [`Question::is_valid_for_query`]), which among
    /// other things means all of its keys share one owner name. The two
    /// encodings are taken as given and need not agree with each other;
    /// unicast DNS asks the ASCII one, the link-local protocols the
    /// literal one. Violations fail with
    /// [`ErrorKind::InvalidInput`]. If the manager's live-query cap has
    /// been reached, this fails with [`ErrorKind::Busy`].
    pub fn new(
        manager: &Manager,
        question_utf8: Option<Question>,
        question_idna: Option<Question>,
        bypass: Option<Packet>,
        ifindex: Option<u32>,
        flags: QueryFlags,
    ) -> Result<Self, Error> {
        let question_utf8 = question_utf8.filter(|question| !question.is_empty());
        let question_idna = question_idna.filter(|question| !question.is_empty());

        if bypass.is_some() {
            if question_utf8.is_some() || question_idna.is_some() {
                return Err(Error::invalid("a bypass query cannot carry a separate question"));
            }
        } else if question_utf8.is_none() && question_idna.is_none() {
            return Err(Error::invalid("no question given"));
        }

        for question in question_utf8.iter().chain(question_idna.iter()) {
            if !question.is_valid_for_query() {
                return Err(Error::invalid("question is not valid for a query"));
            }
        }

        let registration = manager
            .register()
            .ok_or(Error::new(ErrorKind::Busy, "too many live queries"))?;

        let collected_questions = match &bypass {
            Some(packet) => packet.question().clone(),
            None => question_utf8
                .iter()
                .chain(question_idna.iter())
                .fold(Question::default(), |collected, question| collected.merge(question)),
        };
        let branches = Branches::new(question_utf8, question_idna);
        debug!(
            "Query {} created for {}",
            registration.id(),
            collected_questions
        );

        Ok(Self {
            registration,
            config: *manager.config(),
            branches,
            bypass,
            collected_questions,
            ifindex,
            flags,
            state: QueryState::Pending,
            answer: Answer::new(),
            answer_rcode: Rcode::NoError,
            answer_protocol: None,
            answer_family: None,
            answer_query_flags: ResolvedFlags::empty(),
            answer_search_domain: None,
            n_cname_redirects: 0,
            previous_redirect_unauthenticated: false,
            previous_redirect_non_confidential: false,
            previous_redirect_non_authoritative: false,
            chase_error: None,
            auxiliary_for: None,
            auxiliary_queries: VecDeque::new(),
            candidates: Vec::new(),
        })
    }

    /// Creates a bypass query for `packet`.
    pub fn new_bypass(
        manager: &Manager,
        packet: Packet,
        ifindex: Option<u32>,
        flags: QueryFlags,
    ) -> Result<Self, Error> {
        Self::new(manager, None, None, Some(packet), ifindex, flags)
    }

    pub fn id(&self) -> QueryId {
        self.registration.id()
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn flags(&self) -> QueryFlags {
        self.flags
    }

    pub fn ifindex(&self) -> Option<u32> {
        self.ifindex
    }

    pub fn branches(&self) -> &Branches {
        &self.branches
    }

    /// Returns the literal question, if it is tracked separately from
    /// the ASCII-compatible one.
    pub fn question_utf8(&self) -> Option<&Question> {
        self.branches.utf8()
    }

    pub fn question_idna(&self) -> Option<&Question> {
        self.branches.idna()
    }

    pub fn bypass(&self) -> Option<&Packet> {
        self.bypass.as_ref()
    }

    /// Returns the question to pose over `protocol`. Unicast DNS uses
    /// the ASCII-compatible question, the link-local protocols the
    /// literal one. Bypass queries return the embedded question, if
    /// any.
    pub fn question_for_protocol(&self, protocol: Protocol) -> Option<&Question> {
        match (&self.branches, protocol) {
            (Branches::None, _) => self
                .bypass
                .as_ref()
                .map(Packet::question)
                .filter(|question| !question.is_empty()),
            (Branches::Unified(question), _) | (Branches::Utf8Only(question), _) => Some(question),
            (Branches::Diverged { idna, .. }, Protocol::Dns) => Some(idna),
            (Branches::Diverged { utf8, .. }, _) => Some(utf8),
        }
    }

    pub fn collected_questions(&self) -> &Question {
        &self.collected_questions
    }

    pub fn answer(&self) -> &Answer {
        &self.answer
    }

    pub fn answer_rcode(&self) -> Rcode {
        self.answer_rcode
    }

    pub fn answer_protocol(&self) -> Option<Protocol> {
        self.answer_protocol
    }

    pub fn answer_family(&self) -> Option<Family> {
        self.answer_family
    }

    pub fn answer_query_flags(&self) -> ResolvedFlags {
        self.answer_query_flags
    }

    pub fn answer_search_domain(&self) -> Option<&Name> {
        self.answer_search_domain.as_ref()
    }

    pub fn n_cname_redirects(&self) -> usize {
        self.n_cname_redirects
    }

    /// Returns why the redirect chain could not be followed, if the
    /// query ended in [`QueryState::CnameLoop`].
    pub fn chase_error(&self) -> Option<&ChaseError> {
        self.chase_error.as_ref()
    }

    /// Returns whether every hop of the chain so far was DNSSEC
    /// authenticated.
    pub fn fully_authenticated(&self) -> bool {
        self.answer_query_flags
            .contains(ResolvedFlags::AUTHENTICATED)
            && !self.previous_redirect_unauthenticated
    }

    /// Returns whether every hop of the chain so far was confidential.
    pub fn fully_confidential(&self) -> bool {
        self.answer_query_flags.contains(ResolvedFlags::CONFIDENTIAL)
            && !self.previous_redirect_non_confidential
    }

    /// Returns whether every hop of the chain so far was authoritative
    /// (see [`ResolvedFlags::is_authoritative`]).
    pub fn fully_authoritative(&self) -> bool {
        self.answer_query_flags.is_authoritative() && !self.previous_redirect_non_authoritative
    }

    /// Clears the answer before the query is resolved again.
    fn reset_answer(&mut self) {
        self.answer = Answer::new();
        self.answer_rcode = Rcode::NoError;
        self.answer_protocol = None;
        self.answer_family = None;
        self.answer_query_flags = ResolvedFlags::empty();
        self.answer_search_domain = None;
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Query")
            .field("id", &self.id())
            .field("state", &self.state)
            .field("branches", &self.branches)
            .field("bypass", &self.bypass)
            .field("flags", &self.flags)
            .field("n_cname_redirects", &self.n_cname_redirects)
            .field("auxiliary_for", &self.auxiliary_for)
            .field("n_auxiliary_queries", &self.auxiliary_queries.len())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
