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

//! The CNAME/DNAME chase.
//!
//! Once a lookup completes, its answer is checked against the question
//! the query posed. If a record answers the question, the query is
//! done; if a CNAME or DNAME record redirects it instead, the query's
//! question is rewritten in place and the answer is checked again for
//! the new name, following the chain in whatever order its records
//! appear. A chain that leaves the answer has to be resolved anew by
//! the driver.

use std::fmt;

use log::{debug, trace};

use super::{Branches, Query, QueryState};
use crate::flags::{QueryFlags, ResolvedFlags};
use crate::message::Packet;
use crate::name::{self, Name};
use crate::question::Question;
use crate::rr::ResourceRecord;
use crate::scope::Protocol;

////////////////////////////////////////////////////////////////////////
// RESULTS AND ERRORS                                                 //
////////////////////////////////////////////////////////////////////////

/// The outcome of checking an answer against a query's question.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CnameResult {
    /// The answer settles the question (including by being empty, or
    /// by reporting a failure).
    Match,

    /// The answer has records, but none for the question.
    NoMatch,

    /// The question was redirected. From [`Query::process_cname_one`],
    /// this means one hop was followed; from
    /// [`Query::process_cname_many`], that the chain continues beyond
    /// the answer and the new question must be resolved.
    Cname,
}

/// An error signaling that a redirect chain could not be followed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ChaseError {
    /// The query was made with [`QueryFlags::NO_CNAME`].
    RedirectsDisabled,

    /// The chain is longer than
    /// [`Config::max_cname_redirects`](crate::config::Config::max_cname_redirects).
    TooManyRedirects,

    /// The chain leads back to keys the query has already posed.
    RedirectLoop,

    /// A redirect produced an invalid name.
    InvalidName(name::Error),
}

impl fmt::Display for ChaseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::RedirectsDisabled => f.write_str("redirects are disabled for this query"),
            Self::TooManyRedirects => f.write_str("too many CNAME/DNAME redirects"),
            Self::RedirectLoop => f.write_str("CNAME/DNAME redirects form a loop"),
            Self::InvalidName(err) => write!(f, "redirect produced an invalid name: {}", err),
        }
    }
}

impl std::error::Error for ChaseError {}

impl From<name::Error> for ChaseError {
    fn from(err: name::Error) -> Self {
        Self::InvalidName(err)
    }
}

////////////////////////////////////////////////////////////////////////
// THE CHASE                                                          //
////////////////////////////////////////////////////////////////////////

impl Query {
    /// Checks the answer against the pending question and follows at
    /// most one redirect.
    ///
    /// The pending question is the one for the protocol the answer came
    /// over, expanded with the search domain it was looked up under. A
    /// query whose state is not [`QueryState::Success`], that has no
    /// pending question, or whose answer is empty is a
    /// [`CnameResult::Match`]: there is nothing to chase.
    pub fn process_cname_one(&mut self) -> Result<CnameResult, ChaseError> {
        if self.state != QueryState::Success {
            return Ok(CnameResult::Match);
        }
        let question = match self.pending_question()? {
            Some(question) => question,
            None => return Ok(CnameResult::Match),
        };

        if let Some(item) = self.answer.iter().find(|item| question.matches_rr(&item.rr)) {
            trace!("Query {}: {:?} answers {}", self.id(), item.rr, question);
            return Ok(CnameResult::Match);
        }
        if self.answer.is_empty() {
            return Ok(CnameResult::Match);
        }

        let redirect = self
            .answer
            .iter()
            .map(|item| &item.rr)
            .find(|rr| question.matches_redirect(rr))
            .cloned();
        match redirect {
            Some(rr) => {
                self.cname_redirect(&rr)?;
                Ok(CnameResult::Cname)
            }
            None => {
                trace!("Query {}: nothing in the answer for {}", self.id(), question);
                Ok(CnameResult::NoMatch)
            }
        }
    }

    /// Follows the redirect chain through the answer for as long as it
    /// leads, in whatever order its records appear.
    ///
    /// If the first hop is not a redirect, its result is returned. Once
    /// at least one redirect has been followed, the chain ends either
    /// with a record answering the new question ([`CnameResult::Match`])
    /// or with the answer having nothing for it, in which case the
    /// query must be resolved again ([`CnameResult::Cname`]). Chains
    /// are bounded by the redirect limit and loop detection of
    /// [`Query::cname_redirect`].
    pub fn process_cname_many(&mut self) -> Result<CnameResult, ChaseError> {
        let first = self.process_cname_one()?;
        if first != CnameResult::Cname {
            return Ok(first);
        }
        loop {
            match self.process_cname_one()? {
                CnameResult::Match => return Ok(CnameResult::Match),
                CnameResult::NoMatch => return Ok(CnameResult::Cname),
                CnameResult::Cname => continue,
            }
        }
    }

    /// Rewrites the query's question following the redirect `rr`.
    ///
    /// Each encoding is redirected on its own: by `rr` if it applies,
    /// otherwise by another redirect in the answer that does. An
    /// encoding no redirect applies to keeps its question. If the two
    /// encodings end up equal they are unified. The provenance of the
    /// current answer is folded into the chain's, the new keys are
    /// collected, search-domain expansion is turned off, and a redirect
    /// learned over unicast DNS is never sent to a link-local protocol.
    pub fn cname_redirect(&mut self, rr: &ResourceRecord) -> Result<(), ChaseError> {
        if self.flags.contains(QueryFlags::NO_CNAME) {
            return Err(ChaseError::RedirectsDisabled);
        }
        if self.n_cname_redirects >= self.config.max_cname_redirects {
            return Err(ChaseError::TooManyRedirects);
        }

        let branches = match &self.branches {
            Branches::None => {
                let embedded = self
                    .bypass
                    .as_ref()
                    .map(Packet::question)
                    .cloned()
                    .unwrap_or_default();
                Branches::Unified(self.redirect_branch(&embedded, rr)?)
            }
            Branches::Unified(question) => Branches::Unified(self.redirect_branch(question, rr)?),
            Branches::Utf8Only(question) => Branches::Utf8Only(self.redirect_branch(question, rr)?),
            Branches::Diverged { utf8, idna } => {
                Branches::from_pair(self.redirect_branch(utf8, rr)?, self.redirect_branch(idna, rr)?)
            }
        };
        if branches
            .iter()
            .flat_map(Question::iter)
            .all(|key| self.collected_questions.contains_key(key))
        {
            return Err(ChaseError::RedirectLoop);
        }

        if !self.answer_query_flags.contains(ResolvedFlags::AUTHENTICATED) {
            self.previous_redirect_unauthenticated = true;
        }
        if !self.answer_query_flags.contains(ResolvedFlags::CONFIDENTIAL) {
            self.previous_redirect_non_confidential = true;
        }
        if !self.answer_query_flags.is_authoritative() {
            self.previous_redirect_non_authoritative = true;
        }

        for question in branches.iter() {
            self.collected_questions = self.collected_questions.merge(question);
        }
        debug!(
            "Query {}: following {:?} to {}",
            self.id(),
            rr,
            branches.iter().next().map(ToString::to_string).unwrap_or_default()
        );

        self.branches = branches;
        self.bypass = None;
        self.n_cname_redirects += 1;
        self.answer_search_domain = None;
        self.flags |= QueryFlags::NO_SEARCH;
        if self.answer_protocol == Some(Protocol::Dns) {
            self.flags -= QueryFlags::LLMNR | QueryFlags::MDNS;
        }
        Ok(())
    }

    /// Returns the question the current answer is for.
    fn pending_question(&self) -> Result<Option<Question>, ChaseError> {
        let protocol = self.answer_protocol.unwrap_or(Protocol::Dns);
        match self.question_for_protocol(protocol) {
            Some(question) => expand(question, self.answer_search_domain.as_ref()).map(Some),
            None => Ok(None),
        }
    }

    /// Redirects one encoding's question, returning it unchanged (but
    /// expanded with the answer's search domain) if no redirect of the
    /// answer applies to it.
    fn redirect_branch(
        &self,
        question: &Question,
        rr: &ResourceRecord,
    ) -> Result<Question, ChaseError> {
        let question = expand(question, self.answer_search_domain.as_ref())?;
        if let Some(next) = question.redirect(rr)? {
            return Ok(next);
        }
        for item in self.answer.iter() {
            if let Some(next) = question.redirect(&item.rr)? {
                return Ok(next);
            }
        }
        Ok(question)
    }
}

/// Expands `question` with a search domain.
pub(super) fn expand(question: &Question, search_domain: Option<&Name>) -> Result<Question, ChaseError> {
    match (search_domain, question.first_name()) {
        (Some(domain), Some(name)) => Ok(question.with_name(&name.concat(domain)?)),
        _ => Ok(question.clone()),
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::super::tests::{key, name, question};
    use super::*;
    use crate::answer::{Answer, AnswerFlags};
    use crate::class::Class;
    use crate::config::Config;
    use crate::manager::Manager;
    use crate::rr::{Rdata, Ttl, Type};

    fn record(owner: &str, rdata: Rdata) -> ResourceRecord {
        ResourceRecord::new(Class::IN, name(owner), Ttl::from(3600), rdata)
    }

    fn a(owner: &str) -> ResourceRecord {
        record(owner, Rdata::A(Ipv4Addr::new(192, 168, 1, 127)))
    }

    fn cname(owner: &str, target: &str) -> ResourceRecord {
        record(owner, Rdata::Cname(name(target)))
    }

    fn dname(owner: &str, target: &str) -> ResourceRecord {
        record(owner, Rdata::Dname(name(target)))
    }

    fn new_query(config: Config, owner: &str, flags: QueryFlags) -> Query {
        let manager = Manager::new(config);
        let idna = question(&[key(Type::A, owner)]);
        Query::new(&manager, None, Some(idna), None, None, flags).unwrap()
    }

    fn simple_query(owner: &str) -> Query {
        new_query(Config::default(), owner, QueryFlags::PROTOCOLS)
    }

    /// Puts the query in the state of having received `records` over
    /// unicast DNS.
    fn answer_with(query: &mut Query, records: &[ResourceRecord], flags: ResolvedFlags) {
        let mut answer = Answer::new();
        for rr in records {
            answer.add(rr.clone(), None, AnswerFlags::SECTION_ANSWER);
        }
        query.state = QueryState::Success;
        query.answer = answer;
        query.answer_protocol = Some(Protocol::Dns);
        query.answer_query_flags = flags;
    }

    #[test]
    fn direct_match() {
        let mut query = simple_query("www.example.com");
        answer_with(&mut query, &[a("www.example.com")], ResolvedFlags::FROM_NETWORK);
        assert_eq!(query.process_cname_one(), Ok(CnameResult::Match));
        assert_eq!(query.n_cname_redirects(), 0);
    }

    #[test]
    fn unrelated_records_do_not_match() {
        let mut query = simple_query("www.example.com");
        answer_with(&mut query, &[a("example.com")], ResolvedFlags::FROM_NETWORK);
        assert_eq!(query.process_cname_one(), Ok(CnameResult::NoMatch));
        assert_eq!(query.n_cname_redirects(), 0);
    }

    #[test]
    fn nothing_to_chase() {
        let mut query = simple_query("www.example.com");
        answer_with(&mut query, &[], ResolvedFlags::FROM_NETWORK);
        assert_eq!(query.process_cname_one(), Ok(CnameResult::Match));

        answer_with(&mut query, &[cname("www.example.com", "example.com")], ResolvedFlags::empty());
        query.state = QueryState::RcodeFailure;
        assert_eq!(query.process_cname_one(), Ok(CnameResult::Match));
        assert_eq!(query.n_cname_redirects(), 0);
    }

    #[test]
    fn cname_redirects_question() {
        let mut query = simple_query("www.example.com");
        answer_with(
            &mut query,
            &[cname("www.example.com", "example.com")],
            ResolvedFlags::FROM_NETWORK,
        );
        assert_eq!(query.process_cname_one(), Ok(CnameResult::Cname));
        assert_eq!(query.n_cname_redirects(), 1);
        assert_eq!(
            query.question_idna().unwrap().keys(),
            &[key(Type::A, "example.com")]
        );
        assert_eq!(query.question_utf8(), None);
        assert!(query.flags().contains(QueryFlags::NO_SEARCH));
        assert!(!query.flags().intersects(QueryFlags::LLMNR | QueryFlags::MDNS));
        assert!(query.flags().contains(QueryFlags::DNS));
        assert_eq!(query.collected_questions().len(), 2);
    }

    #[test]
    fn dname_preserves_prefix() {
        let mut query = simple_query("www.example.com");
        answer_with(
            &mut query,
            &[dname("example.com", "v2.example.com")],
            ResolvedFlags::FROM_NETWORK,
        );
        assert_eq!(query.process_cname_one(), Ok(CnameResult::Cname));
        assert_eq!(
            query.question_idna().unwrap().first_name(),
            Some(&name("www.v2.example.com"))
        );
    }

    #[test]
    fn converging_encodings_collapse() {
        let manager = Manager::default();
        let mut query = Query::new(
            &manager,
            Some(question(&[key(Type::A, "www.🎼.com")])),
            Some(question(&[key(Type::A, "www.xn--tl8h.com")])),
            None,
            None,
            QueryFlags::PROTOCOLS,
        )
        .unwrap();
        answer_with(
            &mut query,
            &[
                cname("www.xn--tl8h.com", "example.com"),
                cname("www.🎼.com", "example.com"),
            ],
            ResolvedFlags::FROM_NETWORK,
        );
        assert_eq!(query.process_cname_one(), Ok(CnameResult::Cname));
        assert_eq!(query.question_utf8(), None);
        assert_eq!(
            query.question_idna().unwrap().keys(),
            &[key(Type::A, "example.com")]
        );
        assert_eq!(query.collected_questions().len(), 3);
    }

    #[test]
    fn diverging_encodings_persist() {
        let manager = Manager::default();
        let mut query = Query::new(
            &manager,
            Some(question(&[key(Type::A, "www.🎼.com")])),
            Some(question(&[key(Type::A, "www.xn--tl8h.com")])),
            None,
            None,
            QueryFlags::PROTOCOLS,
        )
        .unwrap();
        answer_with(
            &mut query,
            &[cname("www.xn--tl8h.com", "example.com")],
            ResolvedFlags::FROM_NETWORK,
        );
        assert_eq!(query.process_cname_one(), Ok(CnameResult::Cname));
        assert_eq!(
            query.question_utf8().unwrap().keys(),
            &[key(Type::A, "www.🎼.com")]
        );
        assert_eq!(
            query.question_idna().unwrap().keys(),
            &[key(Type::A, "example.com")]
        );
        let collected = query.collected_questions();
        assert!(collected.contains_key(&key(Type::A, "www.🎼.com")));
        assert!(collected.contains_key(&key(Type::A, "www.xn--tl8h.com")));
        assert!(collected.contains_key(&key(Type::A, "example.com")));
    }

    #[test]
    fn scrambled_chain_is_followed() {
        let mut query = simple_query("www.example.com");
        answer_with(
            &mut query,
            &[
                a("example.com"),
                cname("www.example.com", "tmp1.example.com"),
                cname("tmp2.example.com", "example.com"),
                cname("tmp1.example.com", "tmp2.example.com"),
            ],
            ResolvedFlags::FROM_NETWORK,
        );
        assert_eq!(query.process_cname_many(), Ok(CnameResult::Match));
        assert_eq!(query.n_cname_redirects(), 3);
        assert_eq!(query.collected_questions().len(), 4);
        assert_eq!(
            query.question_idna().unwrap().first_name(),
            Some(&name("example.com"))
        );
    }

    #[test]
    fn chain_leaving_the_answer_needs_requery() {
        let mut query = simple_query("www.example.com");
        answer_with(
            &mut query,
            &[cname("www.example.com", "example.com")],
            ResolvedFlags::FROM_NETWORK,
        );
        assert_eq!(query.process_cname_many(), Ok(CnameResult::Cname));
        assert_eq!(query.n_cname_redirects(), 1);
    }

    #[test]
    fn first_hop_results_pass_through() {
        let mut query = simple_query("www.example.com");
        answer_with(&mut query, &[a("example.com")], ResolvedFlags::FROM_NETWORK);
        assert_eq!(query.process_cname_many(), Ok(CnameResult::NoMatch));
        answer_with(&mut query, &[a("www.example.com")], ResolvedFlags::FROM_NETWORK);
        assert_eq!(query.process_cname_many(), Ok(CnameResult::Match));
    }

    #[test]
    fn long_chains_are_cut_off() {
        let config = Config {
            max_cname_redirects: 3,
            ..Config::default()
        };
        let mut query = new_query(config, "a0.example", QueryFlags::DNS);
        let chain: Vec<ResourceRecord> = (0..6)
            .map(|i| cname(&format!("a{}.example", i), &format!("a{}.example", i + 1)))
            .collect();
        answer_with(&mut query, &chain, ResolvedFlags::FROM_NETWORK);
        assert_eq!(query.process_cname_many(), Err(ChaseError::TooManyRedirects));
        assert_eq!(query.n_cname_redirects(), 3);
    }

    #[test]
    fn loops_are_detected() {
        let mut query = simple_query("a.example");
        answer_with(
            &mut query,
            &[cname("a.example", "b.example"), cname("b.example", "a.example")],
            ResolvedFlags::FROM_NETWORK,
        );
        assert_eq!(query.process_cname_many(), Err(ChaseError::RedirectLoop));
        assert_eq!(query.n_cname_redirects(), 1);

        let mut query = simple_query("a.example");
        answer_with(&mut query, &[cname("a.example", "A.example")], ResolvedFlags::FROM_NETWORK);
        assert_eq!(query.process_cname_one(), Err(ChaseError::RedirectLoop));
    }

    #[test]
    fn redirects_can_be_disabled() {
        let mut query = new_query(
            Config::default(),
            "www.example.com",
            QueryFlags::DNS | QueryFlags::NO_CNAME,
        );
        answer_with(
            &mut query,
            &[cname("www.example.com", "example.com")],
            ResolvedFlags::FROM_NETWORK,
        );
        assert_eq!(query.process_cname_one(), Err(ChaseError::RedirectsDisabled));
        assert_eq!(query.n_cname_redirects(), 0);
    }

    #[test]
    fn search_domain_expands_pending_question() {
        let mut query = simple_query("printer");
        answer_with(
            &mut query,
            &[cname("printer.corp.example", "srv.corp.example")],
            ResolvedFlags::FROM_NETWORK,
        );
        query.answer_search_domain = Some(name("corp.example"));
        assert_eq!(query.process_cname_one(), Ok(CnameResult::Cname));
        assert_eq!(
            query.question_idna().unwrap().first_name(),
            Some(&name("srv.corp.example"))
        );
        assert_eq!(query.answer_search_domain(), None);

        answer_with(&mut query, &[a("printer.corp.example")], ResolvedFlags::FROM_NETWORK);
        query.answer_search_domain = Some(name("corp.example"));
        query.branches = Branches::Unified(question(&[key(Type::A, "printer")]));
        assert_eq!(query.process_cname_one(), Ok(CnameResult::Match));
    }

    #[test]
    fn bypass_questions_are_redirected() {
        let manager = Manager::default();
        let embedded = question(&[key(Type::A, "www.example.com")]);
        let mut query =
            Query::new_bypass(&manager, Packet::new_query(&embedded).unwrap(), None, QueryFlags::DNS)
                .unwrap();
        answer_with(
            &mut query,
            &[cname("www.example.com", "example.com"), a("example.com")],
            ResolvedFlags::FROM_NETWORK,
        );
        assert_eq!(query.process_cname_many(), Ok(CnameResult::Match));
        assert!(query.bypass().is_none());
        assert_eq!(
            query.question_idna().unwrap().keys(),
            &[key(Type::A, "example.com")]
        );
    }

    #[test]
    fn one_weak_hop_taints_the_chain() {
        let strong = ResolvedFlags::AUTHENTICATED | ResolvedFlags::CONFIDENTIAL | ResolvedFlags::FROM_ZONE;

        let mut query = simple_query("www.example.com");
        answer_with(&mut query, &[cname("www.example.com", "example.com")], strong);
        assert_eq!(query.process_cname_one(), Ok(CnameResult::Cname));
        answer_with(&mut query, &[a("example.com")], strong);
        assert_eq!(query.process_cname_one(), Ok(CnameResult::Match));
        assert!(query.fully_authenticated());
        assert!(query.fully_confidential());
        assert!(query.fully_authoritative());

        let mut query = simple_query("www.example.com");
        answer_with(
            &mut query,
            &[cname("www.example.com", "example.com")],
            ResolvedFlags::FROM_NETWORK,
        );
        assert_eq!(query.process_cname_one(), Ok(CnameResult::Cname));
        answer_with(&mut query, &[a("example.com")], strong);
        assert_eq!(query.process_cname_one(), Ok(CnameResult::Match));
        assert!(!query.fully_authenticated());
        assert!(!query.fully_confidential());
        assert!(!query.fully_authoritative());

        let mut query = simple_query("www.example.com");
        answer_with(
            &mut query,
            &[cname("www.example.com", "example.com")],
            ResolvedFlags::AUTHENTICATED | ResolvedFlags::FROM_NETWORK,
        );
        assert_eq!(query.process_cname_one(), Ok(CnameResult::Cname));
        answer_with(&mut query, &[a("example.com")], strong);
        assert!(query.fully_authenticated());
        assert!(!query.fully_confidential());
        assert!(!query.fully_authoritative());
    }
}
