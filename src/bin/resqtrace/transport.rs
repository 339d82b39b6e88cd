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

//! Implements a [`Transport`] that answers from a scenario's records
//! instead of the network.

use std::collections::VecDeque;

use log::debug;

use resquery::answer::{Answer, AnswerFlags};
use resquery::flags::ResolvedFlags;
use resquery::message::Rcode;
use resquery::name::Name;
use resquery::question::Question;
use resquery::rr::ResourceRecord;
use resquery::scope::{
    Payload, Protocol, Request, Scope, ScopeId, StartError, TransactionId, TransactionOutcome,
    TransactionState, Transport,
};

use crate::scenario::{ScopeConfig, ServerConfig};

/// How many redirects a chain-following server includes at most.
const MAX_CHAIN_LEN: usize = 16;

/// A [`Transport`] whose transactions are queued until the caller
/// answers them with [`ScenarioTransport::respond`].
pub struct ScenarioTransport {
    scopes: Vec<Scope>,
    refused: Vec<ScopeId>,
    records: Vec<ResourceRecord>,
    provenance: ResolvedFlags,
    follow_chains: bool,
    failing: Vec<Name>,
    failure_rcode: Rcode,
    pending: VecDeque<(TransactionId, Request)>,
    next_id: u64,
}

impl ScenarioTransport {
    pub fn new(scope_configs: &[ScopeConfig], server: ServerConfig) -> Self {
        let mut scopes = Vec::with_capacity(scope_configs.len());
        let mut refused = Vec::new();
        for (i, config) in scope_configs.iter().enumerate() {
            let mut scope = Scope::new(
                ScopeId(i),
                config.protocol.0,
                config.family.as_ref().map(|f| f.0),
                config.ifindex,
            );
            scope.domains = config.domains.iter().map(|d| d.0.clone()).collect();
            scope.search_domains = config.search_domains.iter().map(|d| d.0.clone()).collect();
            if let Some(default_route) = config.default_route {
                scope.default_route = default_route;
            }
            if config.refuse {
                refused.push(scope.id);
            }
            scopes.push(scope);
        }

        Self {
            scopes,
            refused,
            records: server.records.into_iter().map(|r| r.0).collect(),
            provenance: server.provenance.0,
            follow_chains: server.follow_chains,
            failing: server.failing.into_iter().map(|n| n.0).collect(),
            failure_rcode: server.failure_rcode.0,
            pending: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Takes the oldest outstanding transaction.
    pub fn next_transaction(&mut self) -> Option<(TransactionId, Request)> {
        self.pending.pop_front()
    }

    /// Computes the outcome of `request` from the scenario's records.
    ///
    /// A name with no records at all gets NXDOMAIN; a name listed as
    /// failing gets the configured failure RCODE. Otherwise the answer
    /// holds the records matching the question and the first redirect
    /// of its name, and, if chains are followed, the same for each name
    /// redirected to.
    pub fn respond(&self, request: &Request) -> TransactionOutcome {
        let (protocol, family) = self
            .scopes
            .iter()
            .find(|scope| scope.id == request.scope)
            .map_or((Protocol::Dns, None), |scope| (scope.protocol, scope.family));
        let question = match &request.payload {
            Payload::Question(question) => question.clone(),
            Payload::Packet(packet) => packet.question().clone(),
        };
        let failure = |rcode| TransactionOutcome {
            rcode,
            family,
            ..TransactionOutcome::empty(TransactionState::RcodeFailure, protocol)
        };

        let name = match question.first_name() {
            Some(name) => name.clone(),
            None => return failure(Rcode::FormErr),
        };
        if self.failing.contains(&name) {
            return failure(self.failure_rcode);
        }

        let answer = self.lookup(question);
        if answer.is_empty() && !self.records.iter().any(|rr| *rr.name() == name) {
            return failure(Rcode::NxDomain);
        }
        TransactionOutcome {
            answer,
            family,
            flags: self.provenance,
            ..TransactionOutcome::empty(TransactionState::Success, protocol)
        }
    }

    fn lookup(&self, mut question: Question) -> Answer {
        let flags = if self.provenance.contains(ResolvedFlags::AUTHENTICATED) {
            AnswerFlags::SECTION_ANSWER | AnswerFlags::AUTHENTICATED
        } else {
            AnswerFlags::SECTION_ANSWER
        };

        let mut answer = Answer::new();
        for _ in 0..=MAX_CHAIN_LEN {
            let mut redirected = None;
            for rr in &self.records {
                if question.matches_rr(rr) {
                    answer.add(rr.clone(), None, flags);
                } else if redirected.is_none() && question.matches_redirect(rr) {
                    answer.add(rr.clone(), None, flags);
                    redirected = question.redirect(rr).ok().flatten();
                }
            }
            match redirected {
                Some(next) if self.follow_chains => question = next,
                _ => break,
            }
        }
        answer
    }
}

impl Transport for ScenarioTransport {
    fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    fn start(&mut self, request: Request) -> Result<TransactionId, StartError> {
        if !self.scopes.iter().any(|scope| scope.id == request.scope) {
            return Err(StartError::UnknownScope);
        }
        if self.refused.contains(&request.scope) {
            return Err(StartError::Unsupported);
        }
        let id = TransactionId(self.next_id);
        self.next_id += 1;
        debug!("Transaction {} queued for scope {}.", id, request.scope.0);
        self.pending.push_back((id, request));
        Ok(id)
    }

    fn abort(&mut self, id: TransactionId) {
        debug!("Transaction {} aborted.", id);
        self.pending.retain(|(pending_id, _)| *pending_id != id);
    }
}
