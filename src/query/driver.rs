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

//! The resolution driver.
//!
//! [`Query::go`] picks the scopes a query is best sent to and starts a
//! *candidate* on each: a sequence of transactions for one scope, one
//! per search domain when the name is expanded. Outcomes come back
//! through [`Query::complete_transaction`]. The first successful
//! candidate is accepted and the rest are aborted; if none succeeds,
//! an RCODE failure is preferred over other failures. An accepted
//! success is run through the chase, which may restart the query for a
//! redirected name.

use log::{debug, trace};

use super::chase::expand;
use super::{CnameResult, Error, ErrorKind, Query, QueryState};
use crate::name::Name;
use crate::scope::{
    DomainMatch, Payload, Protocol, Request, Scope, ScopeId, TransactionId, TransactionOutcome,
    TransactionState, Transport,
};

////////////////////////////////////////////////////////////////////////
// CANDIDATES                                                         //
////////////////////////////////////////////////////////////////////////

/// The resolution of a query on one scope.
#[derive(Debug)]
pub(super) struct Candidate {
    scope: ScopeId,
    protocol: Protocol,

    /// The search domains to try, in order. Empty if the name is not
    /// expanded.
    search_domains: Vec<Name>,
    attempts: usize,

    /// The search domain of the current (or last) attempt.
    search_domain: Option<Name>,
    transaction: Option<TransactionId>,
    outcome: Option<TransactionOutcome>,
}

impl Candidate {
    fn new(scope: &Scope, search_domains: &[Name]) -> Self {
        Self {
            scope: scope.id,
            protocol: scope.protocol,
            search_domains: search_domains.to_vec(),
            attempts: 0,
            search_domain: None,
            transaction: None,
            outcome: None,
        }
    }

    /// Returns the search domain of the next attempt, `Some(None)` for
    /// an attempt without one, or `None` once the candidate has run
    /// out of attempts.
    fn next_attempt(&mut self) -> Option<Option<Name>> {
        let attempt = if self.search_domains.is_empty() {
            (self.attempts == 0).then_some(None)
        } else {
            self.search_domains.get(self.attempts).cloned().map(Some)
        };
        self.attempts += 1;
        attempt
    }
}

/// What became of a transaction outcome handed to
/// [`Query::complete_transaction`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Completion {
    /// The transaction belongs neither to the query nor to any of its
    /// auxiliary queries.
    Unknown,

    /// The query is still waiting on other transactions.
    Pending,

    /// The answer redirected the query, and resolution of the new name
    /// has started.
    Restarted,

    /// The query the transaction belonged to reached a terminal state.
    Done,
}

////////////////////////////////////////////////////////////////////////
// DRIVING                                                            //
////////////////////////////////////////////////////////////////////////

impl Query {
    /// Starts resolution. Returns whether any transaction was started.
    ///
    /// Candidates are started on every scope that shares the best
    /// [`DomainMatch`] for the query's name. If none can be started,
    /// the query ends right away: a bypass query in
    /// [`QueryState::Success`] with an empty NOERROR answer (there is
    /// nothing to ask), and any other query in
    /// [`QueryState::NoServers`]. Fails with [`ErrorKind::State`] unless
    /// the query is [`QueryState::Pending`].
    pub fn go(&mut self, transport: &mut dyn Transport) -> Result<bool, Error> {
        if self.state != QueryState::Pending {
            return Err(Error::new(ErrorKind::State, "query is not pending"));
        }

        let mut candidates = self.select_scopes(transport.scopes());
        candidates.retain_mut(|candidate| self.start_candidate(&mut *transport, candidate));
        self.candidates = candidates;

        if self.candidates.is_empty() {
            self.state = if self.bypass.is_some() {
                QueryState::Success
            } else {
                QueryState::NoServers
            };
            debug!("Query {} finished without a transaction: {}", self.id(), self.state);
            return Ok(false);
        }
        self.state = QueryState::Active;
        Ok(true)
    }

    /// Handles the outcome of transaction `id`, which may belong to
    /// this query or to one of its auxiliary queries.
    pub fn complete_transaction(
        &mut self,
        transport: &mut dyn Transport,
        id: TransactionId,
        outcome: TransactionOutcome,
    ) -> Completion {
        let index = match self
            .candidates
            .iter()
            .position(|candidate| candidate.transaction == Some(id))
        {
            Some(index) => index,
            None => {
                return match self
                    .auxiliary_queries
                    .iter_mut()
                    .find(|query| query.owns_transaction(id))
                {
                    Some(query) => query.complete_transaction(transport, id, outcome),
                    None => Completion::Unknown,
                };
            }
        };

        // The candidate is taken out while it is restarted, since that
        // borrows the rest of the query.
        let mut candidate = self.candidates.remove(index);
        candidate.transaction = None;
        debug!(
            "Query {}: transaction {} on scope {} ended: {:?}",
            self.id(),
            id,
            candidate.scope.0,
            outcome.state
        );

        if outcome.state == TransactionState::Success {
            for other in self.candidates.drain(..) {
                if let Some(transaction) = other.transaction {
                    transport.abort(transaction);
                }
            }
            return self.accept(transport, candidate.search_domain, outcome);
        }

        if outcome.state != TransactionState::Aborted && self.start_candidate(transport, &mut candidate) {
            self.candidates.insert(index, candidate);
            return Completion::Pending;
        }
        candidate.outcome = Some(outcome);
        self.candidates.insert(index, candidate);
        if self.candidates.iter().any(|candidate| candidate.transaction.is_some()) {
            return Completion::Pending;
        }

        let mut finished: Vec<(Option<Name>, TransactionOutcome)> = self
            .candidates
            .drain(..)
            .filter_map(|candidate| candidate.outcome.map(|outcome| (candidate.search_domain, outcome)))
            .collect();
        let index = finished
            .iter()
            .position(|(_, outcome)| outcome.state == TransactionState::RcodeFailure)
            .unwrap_or(0);
        if index >= finished.len() {
            self.state = QueryState::NoServers;
            return Completion::Done;
        }
        let (search_domain, outcome) = finished.swap_remove(index);
        self.accept(transport, search_domain, outcome)
    }

    /// Aborts every outstanding transaction of this query and of its
    /// auxiliary queries. An active query becomes
    /// [`QueryState::Aborted`].
    pub fn stop(&mut self, transport: &mut dyn Transport) {
        for candidate in self.candidates.drain(..) {
            if let Some(transaction) = candidate.transaction {
                transport.abort(transaction);
            }
        }
        for query in self.auxiliary_queries.iter_mut() {
            query.stop(transport);
        }
        if self.state == QueryState::Active {
            self.state = QueryState::Aborted;
            debug!("Query {} aborted", self.id());
        }
    }

    /// Returns whether transaction `id` was started by this query.
    pub fn owns_transaction(&self, id: TransactionId) -> bool {
        self.candidates
            .iter()
            .any(|candidate| candidate.transaction == Some(id))
    }

    /// Builds candidates for the scopes sharing the best match level.
    fn select_scopes(&self, scopes: &[Scope]) -> Vec<Candidate> {
        let mut best = DomainMatch::No;
        let mut candidates = Vec::new();
        for scope in scopes {
            let name = match self
                .question_for_protocol(scope.protocol)
                .and_then(|question| question.first_name())
            {
                Some(name) => name,
                None => continue,
            };
            let level = scope.good_domain(name, self.ifindex, self.flags);
            trace!("Query {}: scope {} rates {} as {:?}", self.id(), scope.id.0, name, level);
            if level == DomainMatch::No || level < best {
                continue;
            }
            if level > best {
                best = level;
                candidates.clear();
            }
            candidates.push(Candidate::new(scope, scope.search_domains_for(name, self.flags)));
        }
        debug!(
            "Query {}: {} scope(s) selected at {:?}",
            self.id(),
            candidates.len(),
            best
        );
        candidates
    }

    /// Starts the next attempt of `candidate`, moving on through its
    /// search domains until one starts. Returns `false` once no attempt
    /// is left.
    fn start_candidate(&self, transport: &mut dyn Transport, candidate: &mut Candidate) -> bool {
        while let Some(search_domain) = candidate.next_attempt() {
            let payload = match self.payload(candidate.protocol, search_domain.as_ref()) {
                Some(payload) => payload,
                None => continue,
            };
            let request = Request {
                scope: candidate.scope,
                payload,
            };
            match transport.start(request) {
                Ok(transaction) => {
                    debug!(
                        "Query {}: started transaction {} on scope {}",
                        self.id(),
                        transaction,
                        candidate.scope.0
                    );
                    candidate.transaction = Some(transaction);
                    candidate.search_domain = search_domain;
                    return true;
                }
                Err(err) => debug!(
                    "Query {}: could not start on scope {}: {}",
                    self.id(),
                    candidate.scope.0,
                    err
                ),
            }
        }
        false
    }

    /// Returns what to send over `protocol`, or `None` if the name
    /// cannot be expanded with `search_domain`.
    fn payload(&self, protocol: Protocol, search_domain: Option<&Name>) -> Option<Payload> {
        if let Some(packet) = &self.bypass {
            return Some(Payload::Packet(packet.clone()));
        }
        let question = self.question_for_protocol(protocol)?;
        expand(question, search_domain).ok().map(Payload::Question)
    }

    /// Takes on the outcome of a finished candidate and, if it is a
    /// success, chases redirects through its answer.
    fn accept(
        &mut self,
        transport: &mut dyn Transport,
        search_domain: Option<Name>,
        outcome: TransactionOutcome,
    ) -> Completion {
        self.state = outcome.state.into();
        self.answer = outcome.answer;
        self.answer_rcode = outcome.rcode;
        self.answer_protocol = Some(outcome.protocol);
        self.answer_family = outcome.family;
        self.answer_query_flags = outcome.flags;
        self.answer_search_domain = search_domain;

        if self.state == QueryState::Success {
            match self.process_cname_many() {
                Ok(CnameResult::Match) | Ok(CnameResult::NoMatch) => (),
                Ok(CnameResult::Cname) => {
                    self.reset_answer();
                    self.state = QueryState::Pending;
                    return match self.go(transport) {
                        Ok(true) => Completion::Restarted,
                        _ => Completion::Done,
                    };
                }
                Err(err) => {
                    debug!("Query {}: {}", self.id(), err);
                    self.state = QueryState::CnameLoop;
                    self.chase_error = Some(err);
                }
            }
        }
        debug!("Query {} finished: {}", self.id(), self.state);
        Completion::Done
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::super::tests::{key, name, question};
    use super::super::ChaseError;
    use super::*;
    use crate::answer::{Answer, AnswerFlags};
    use crate::class::Class;
    use crate::flags::{QueryFlags, ResolvedFlags};
    use crate::manager::Manager;
    use crate::message::{Packet, Rcode};
    use crate::question::Question;
    use crate::rr::{Rdata, ResourceRecord, Ttl, Type};
    use crate::scope::{Family, StartError};

    /// A transport that records what it is asked to do.
    #[derive(Default)]
    struct FakeTransport {
        scopes: Vec<Scope>,
        refused: Vec<ScopeId>,
        started: Vec<(TransactionId, Request)>,
        aborted: Vec<TransactionId>,
    }

    impl FakeTransport {
        fn new(scopes: Vec<Scope>) -> Self {
            Self {
                scopes,
                ..Self::default()
            }
        }

        fn last_id(&self) -> TransactionId {
            self.started.last().unwrap().0
        }

        fn question(&self, index: usize) -> &Question {
            match &self.started[index].1.payload {
                Payload::Question(question) => question,
                Payload::Packet(_) => panic!("expected a question"),
            }
        }
    }

    impl Transport for FakeTransport {
        fn scopes(&self) -> &[Scope] {
            &self.scopes
        }

        fn start(&mut self, request: Request) -> Result<TransactionId, StartError> {
            if self.refused.contains(&request.scope) {
                return Err(StartError::Unsupported);
            }
            let id = TransactionId(self.started.len() as u64);
            self.started.push((id, request));
            Ok(id)
        }

        fn abort(&mut self, id: TransactionId) {
            self.aborted.push(id);
        }
    }

    fn dns_scope(id: usize) -> Scope {
        Scope::new(ScopeId(id), Protocol::Dns, None, None)
    }

    fn a(owner: &str) -> ResourceRecord {
        ResourceRecord::new(
            Class::IN,
            name(owner),
            Ttl::from(300),
            Rdata::A(Ipv4Addr::new(192, 168, 1, 127)),
        )
    }

    fn cname(owner: &str, target: &str) -> ResourceRecord {
        ResourceRecord::new(Class::IN, name(owner), Ttl::from(300), Rdata::Cname(name(target)))
    }

    fn success(records: &[ResourceRecord]) -> TransactionOutcome {
        let mut answer = Answer::new();
        for rr in records {
            answer.add(rr.clone(), None, AnswerFlags::SECTION_ANSWER);
        }
        TransactionOutcome {
            answer,
            flags: ResolvedFlags::FROM_NETWORK,
            ..TransactionOutcome::empty(TransactionState::Success, Protocol::Dns)
        }
    }

    fn failure(state: TransactionState, rcode: Rcode) -> TransactionOutcome {
        TransactionOutcome {
            rcode,
            ..TransactionOutcome::empty(state, Protocol::Dns)
        }
    }

    fn address_query(manager: &Manager, owner: &str) -> Query {
        let idna = question(&[key(Type::A, owner)]);
        Query::new(manager, None, Some(idna), None, None, QueryFlags::PROTOCOLS).unwrap()
    }

    #[test]
    fn bypass_without_scopes_succeeds_empty() {
        let manager = Manager::default();
        let packet = Packet::new_query(&question(&[key(Type::A, "www.example.com")])).unwrap();
        let mut query = Query::new_bypass(&manager, packet, None, QueryFlags::DNS).unwrap();
        let mut transport = FakeTransport::default();
        assert_eq!(query.go(&mut transport), Ok(false));
        assert_eq!(query.state(), QueryState::Success);
        assert!(query.answer().is_empty());
        assert_eq!(query.answer_rcode(), Rcode::NoError);
    }

    #[test]
    fn question_without_scopes_has_no_servers() {
        let manager = Manager::default();
        let mut query = address_query(&manager, "www.example.com");
        let mut transport = FakeTransport::default();
        assert_eq!(query.go(&mut transport), Ok(false));
        assert_eq!(query.state(), QueryState::NoServers);
        assert!(query.answer().is_empty());
        assert_eq!(query.answer_rcode(), Rcode::NoError);
    }

    #[test]
    fn go_requires_a_pending_query() {
        let manager = Manager::default();
        let mut query = address_query(&manager, "www.example.com");
        let mut transport = FakeTransport::new(vec![dns_scope(0)]);
        assert_eq!(query.go(&mut transport), Ok(true));
        assert_eq!(query.state(), QueryState::Active);
        let err = query.go(&mut transport).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        assert_eq!(transport.started.len(), 1);
    }

    #[test]
    fn best_scopes_are_selected() {
        let manager = Manager::default();
        let mut routed = dns_scope(1);
        routed.domains.push(name("example.com"));
        routed.default_route = false;
        let mdns = Scope::new(ScopeId(2), Protocol::Mdns, Some(Family::Inet), Some(2));
        let mut transport = FakeTransport::new(vec![dns_scope(0), routed, mdns]);

        let mut query = address_query(&manager, "www.example.com");
        assert_eq!(query.go(&mut transport), Ok(true));
        assert_eq!(transport.started.len(), 1);
        assert_eq!(transport.started[0].1.scope, ScopeId(1));

        let mut query = address_query(&manager, "www.example.org");
        assert_eq!(query.go(&mut transport), Ok(true));
        assert_eq!(transport.started.len(), 2);
        assert_eq!(transport.started[1].1.scope, ScopeId(0));
    }

    #[test]
    fn equally_good_scopes_all_get_candidates() {
        let manager = Manager::default();
        let mut transport = FakeTransport::new(vec![dns_scope(0), dns_scope(1)]);
        let mut query = address_query(&manager, "www.example.com");
        assert_eq!(query.go(&mut transport), Ok(true));
        assert_eq!(transport.started.len(), 2);
    }

    #[test]
    fn refusing_scopes_are_skipped() {
        let manager = Manager::default();
        let mut transport = FakeTransport::new(vec![dns_scope(0), dns_scope(1)]);
        transport.refused.push(ScopeId(0));
        let mut query = address_query(&manager, "www.example.com");
        assert_eq!(query.go(&mut transport), Ok(true));
        assert_eq!(transport.started.len(), 1);
        assert_eq!(transport.started[0].1.scope, ScopeId(1));

        transport.refused.push(ScopeId(1));
        let mut query = address_query(&manager, "www.example.com");
        assert_eq!(query.go(&mut transport), Ok(false));
        assert_eq!(query.state(), QueryState::NoServers);
    }

    #[test]
    fn link_local_protocols_get_the_literal_name() {
        let manager = Manager::default();
        let mdns = Scope::new(ScopeId(1), Protocol::Mdns, Some(Family::Inet), Some(2));
        let mut transport = FakeTransport::new(vec![dns_scope(0), mdns]);
        let utf8 = question(&[key(Type::A, "www.🎼.local")]);
        let idna = question(&[key(Type::A, "www.xn--tl8h.local")]);
        let mut query =
            Query::new(&manager, Some(utf8.clone()), Some(idna), None, None, QueryFlags::PROTOCOLS)
                .unwrap();
        assert_eq!(query.go(&mut transport), Ok(true));
        assert_eq!(transport.started.len(), 1);
        assert_eq!(transport.started[0].1.scope, ScopeId(1));
        assert_eq!(transport.question(0), &utf8);
    }

    #[test]
    fn search_domains_advance_on_failure() {
        let manager = Manager::default();
        let mut scope = dns_scope(0);
        scope.search_domains.push(name("a.example"));
        scope.search_domains.push(name("b.example"));
        let mut transport = FakeTransport::new(vec![scope]);
        let mut query = address_query(&manager, "printer");
        assert_eq!(query.go(&mut transport), Ok(true));
        assert_eq!(transport.question(0).first_name(), Some(&name("printer.a.example")));

        let id = transport.last_id();
        let completion = query.complete_transaction(
            &mut transport,
            id,
            failure(TransactionState::RcodeFailure, Rcode::NxDomain),
        );
        assert_eq!(completion, Completion::Pending);
        assert_eq!(transport.question(1).first_name(), Some(&name("printer.b.example")));

        let id = transport.last_id();
        let completion = query.complete_transaction(&mut transport, id, success(&[a("printer.b.example")]));
        assert_eq!(completion, Completion::Done);
        assert_eq!(query.state(), QueryState::Success);
        assert_eq!(query.answer_search_domain(), Some(&name("b.example")));
        assert_eq!(query.answer().len(), 1);
    }

    #[test]
    fn exhausted_search_domains_fail() {
        let manager = Manager::default();
        let mut scope = dns_scope(0);
        scope.search_domains.push(name("a.example"));
        let mut transport = FakeTransport::new(vec![scope]);
        let mut query = address_query(&manager, "printer");
        query.go(&mut transport).unwrap();
        let id = transport.last_id();
        let completion = query.complete_transaction(
            &mut transport,
            id,
            failure(TransactionState::RcodeFailure, Rcode::NxDomain),
        );
        assert_eq!(completion, Completion::Done);
        assert_eq!(query.state(), QueryState::RcodeFailure);
        assert_eq!(query.answer_rcode(), Rcode::NxDomain);
        assert_eq!(transport.started.len(), 1);
    }

    #[test]
    fn first_success_wins() {
        let manager = Manager::default();
        let mut transport = FakeTransport::new(vec![dns_scope(0), dns_scope(1)]);
        let mut query = address_query(&manager, "www.example.com");
        query.go(&mut transport).unwrap();
        let (first, second) = (transport.started[0].0, transport.started[1].0);

        let completion = query.complete_transaction(&mut transport, second, success(&[a("www.example.com")]));
        assert_eq!(completion, Completion::Done);
        assert_eq!(query.state(), QueryState::Success);
        assert_eq!(query.answer_protocol(), Some(Protocol::Dns));
        assert_eq!(transport.aborted, vec![first]);
        assert!(!query.owns_transaction(first));
    }

    #[test]
    fn rcode_failures_are_preferred() {
        let manager = Manager::default();
        let mut transport = FakeTransport::new(vec![dns_scope(0), dns_scope(1)]);
        let mut query = address_query(&manager, "www.example.com");
        query.go(&mut transport).unwrap();
        let (first, second) = (transport.started[0].0, transport.started[1].0);

        let completion = query.complete_transaction(
            &mut transport,
            first,
            failure(TransactionState::Timeout, Rcode::NoError),
        );
        assert_eq!(completion, Completion::Pending);
        assert_eq!(query.state(), QueryState::Active);

        let completion = query.complete_transaction(
            &mut transport,
            second,
            failure(TransactionState::RcodeFailure, Rcode::ServFail),
        );
        assert_eq!(completion, Completion::Done);
        assert_eq!(query.state(), QueryState::RcodeFailure);
        assert_eq!(query.answer_rcode(), Rcode::ServFail);
    }

    #[test]
    fn redirects_restart_resolution() {
        let manager = Manager::default();
        let mut transport = FakeTransport::new(vec![dns_scope(0)]);
        let mut query = address_query(&manager, "www.example.com");
        query.go(&mut transport).unwrap();

        let id = transport.last_id();
        let completion = query.complete_transaction(
            &mut transport,
            id,
            success(&[cname("www.example.com", "example.com")]),
        );
        assert_eq!(completion, Completion::Restarted);
        assert_eq!(query.state(), QueryState::Active);
        assert_eq!(query.n_cname_redirects(), 1);
        assert_eq!(transport.question(1).keys(), &[key(Type::A, "example.com")]);
        assert!(query.answer().is_empty());

        let id = transport.last_id();
        let completion = query.complete_transaction(&mut transport, id, success(&[a("example.com")]));
        assert_eq!(completion, Completion::Done);
        assert_eq!(query.state(), QueryState::Success);
        assert!(query.answer().contains_name(&name("example.com")));
    }

    #[test]
    fn redirect_loops_end_the_query() {
        let manager = Manager::default();
        let mut transport = FakeTransport::new(vec![dns_scope(0)]);
        let mut query = address_query(&manager, "a.example");
        query.go(&mut transport).unwrap();
        let id = transport.last_id();
        let completion = query.complete_transaction(
            &mut transport,
            id,
            success(&[cname("a.example", "b.example"), cname("b.example", "a.example")]),
        );
        assert_eq!(completion, Completion::Done);
        assert_eq!(query.state(), QueryState::CnameLoop);
        assert_eq!(query.chase_error(), Some(&ChaseError::RedirectLoop));
    }

    #[test]
    fn stop_aborts_everything() {
        let manager = Manager::default();
        let mut transport = FakeTransport::new(vec![dns_scope(0), dns_scope(1)]);
        let mut query = address_query(&manager, "www.example.com");
        query.go(&mut transport).unwrap();
        let mut dependent = address_query(&manager, "www.example.org");
        dependent.go(&mut transport).unwrap();
        query.make_auxiliary(dependent).unwrap();

        query.stop(&mut transport);
        assert_eq!(query.state(), QueryState::Aborted);
        assert_eq!(transport.aborted.len(), 4);
        assert!(query
            .auxiliaries()
            .all(|query| query.state() == QueryState::Aborted));

        let id = transport.started[0].0;
        let completion = query.complete_transaction(&mut transport, id, success(&[]));
        assert_eq!(completion, Completion::Unknown);
    }

    #[test]
    fn auxiliary_outcomes_are_routed() {
        let manager = Manager::default();
        let mut transport = FakeTransport::new(vec![dns_scope(0)]);
        let mut query = address_query(&manager, "www.example.com");
        query.go(&mut transport).unwrap();
        let mut dependent = address_query(&manager, "mail.example.com");
        dependent.go(&mut transport).unwrap();
        let dependent_id = dependent.id();
        query.make_auxiliary(dependent).unwrap();

        let id = transport.last_id();
        let completion =
            query.complete_transaction(&mut transport, id, success(&[a("mail.example.com")]));
        assert_eq!(completion, Completion::Done);
        assert_eq!(query.state(), QueryState::Active);
        let dependent = query.auxiliary_mut(dependent_id).unwrap();
        assert_eq!(dependent.state(), QueryState::Success);
    }

    #[test]
    fn bypass_packets_are_sent_as_is() {
        let manager = Manager::default();
        let mut transport = FakeTransport::new(vec![dns_scope(0)]);
        let packet = Packet::new_query(&question(&[key(Type::A, "www.example.com")])).unwrap();
        let mut query = Query::new_bypass(&manager, packet.clone(), None, QueryFlags::DNS).unwrap();
        assert_eq!(query.go(&mut transport), Ok(true));
        match &transport.started[0].1.payload {
            Payload::Packet(sent) => assert_eq!(sent.octets(), packet.octets()),
            Payload::Question(_) => panic!("expected the bypass packet"),
        }

        let id = transport.last_id();
        let completion = query.complete_transaction(&mut transport, id, success(&[a("www.example.com")]));
        assert_eq!(completion, Completion::Done);
        assert_eq!(query.state(), QueryState::Success);
    }
}
