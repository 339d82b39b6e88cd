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

//! Auxiliary linkage between queries.
//!
//! A primary query owns its auxiliary queries outright; each of them
//! records the primary's [`QueryId`]. Nesting is one level deep.

use log::debug;

use super::{AuxiliaryError, AuxiliaryErrorKind, Query};
use crate::manager::QueryId;

impl Query {
    /// Attaches `dependent` as an auxiliary query of this one.
    ///
    /// The dependent is observable first among the auxiliaries until
    /// another is attached. It is refused (and handed back in the
    /// error) if it is already auxiliary or has auxiliaries of its own,
    /// if this query is itself auxiliary, or if this query already has
    /// [`Config::max_auxiliary_queries`](crate::config::Config::max_auxiliary_queries)
    /// auxiliaries.
    pub fn make_auxiliary(&mut self, mut dependent: Query) -> Result<(), AuxiliaryError> {
        let refusal = if dependent.auxiliary_for.is_some() {
            Some(AuxiliaryErrorKind::AlreadyAuxiliary)
        } else if !dependent.auxiliary_queries.is_empty() {
            Some(AuxiliaryErrorKind::HasAuxiliaries)
        } else if self.auxiliary_for.is_some() {
            Some(AuxiliaryErrorKind::PrimaryIsAuxiliary)
        } else if self.auxiliary_queries.len() >= self.config.max_auxiliary_queries {
            Some(AuxiliaryErrorKind::Full)
        } else {
            None
        };
        if let Some(kind) = refusal {
            return Err(AuxiliaryError::new(kind, dependent));
        }

        debug!("Query {} is now auxiliary to {}", dependent.id(), self.id());
        dependent.auxiliary_for = Some(self.id());
        self.auxiliary_queries.push_front(dependent);
        Ok(())
    }

    /// Returns the primary this query is auxiliary to.
    pub fn auxiliary_for(&self) -> Option<QueryId> {
        self.auxiliary_for
    }

    pub fn n_auxiliary_queries(&self) -> usize {
        self.auxiliary_queries.len()
    }

    /// Iterates over the auxiliary queries, most recently attached
    /// first.
    pub fn auxiliaries(&self) -> impl Iterator<Item = &Query> {
        self.auxiliary_queries.iter()
    }

    pub fn auxiliary_mut(&mut self, id: QueryId) -> Option<&mut Query> {
        self.auxiliary_queries.iter_mut().find(|query| query.id() == id)
    }

    /// Detaches an auxiliary query, making it top-level again.
    pub fn detach_auxiliary(&mut self, id: QueryId) -> Option<Query> {
        let index = self
            .auxiliary_queries
            .iter()
            .position(|query| query.id() == id)?;
        let mut query = self.auxiliary_queries.remove(index)?;
        query.auxiliary_for = None;
        Some(query)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::super::tests::{key, question};
    use super::*;
    use crate::config::Config;
    use crate::flags::QueryFlags;
    use crate::manager::Manager;
    use crate::rr::Type;

    fn new_query(manager: &Manager, owner: &str) -> Query {
        let idna = question(&[key(Type::A, owner)]);
        Query::new(manager, None, Some(idna), None, None, QueryFlags::DNS).unwrap()
    }

    #[test]
    fn dependents_enumerate_most_recent_first() {
        let manager = Manager::default();
        let mut primary = new_query(&manager, "example.com");
        let mut ids = Vec::new();
        for i in 0..5 {
            let dependent = new_query(&manager, &format!("host{}.example.com", i));
            ids.push(dependent.id());
            primary.make_auxiliary(dependent).unwrap();
        }
        assert_eq!(primary.n_auxiliary_queries(), 5);
        ids.reverse();
        assert_eq!(primary.auxiliaries().map(Query::id).collect::<Vec<_>>(), ids);
        assert!(primary
            .auxiliaries()
            .all(|query| query.auxiliary_for() == Some(primary.id())));
        assert_eq!(primary.auxiliary_for(), None);
    }

    #[test]
    fn nesting_is_refused() {
        let manager = Manager::default();
        let mut primary = new_query(&manager, "example.com");
        let mut other = new_query(&manager, "example.net");
        let dependent = new_query(&manager, "www.example.com");
        let dependent_id = dependent.id();
        primary.make_auxiliary(dependent).unwrap();

        // A primary cannot become auxiliary.
        let err = other.make_auxiliary(primary).unwrap_err();
        assert_eq!(err.kind(), AuxiliaryErrorKind::HasAuxiliaries);
        let mut primary = err.into_dependent();

        // An auxiliary cannot become a primary.
        let mut dependent = primary.detach_auxiliary(dependent_id).unwrap();
        assert_eq!(dependent.auxiliary_for(), None);
        assert_eq!(primary.n_auxiliary_queries(), 0);
        let leaf = new_query(&manager, "ftp.example.com");
        dependent.auxiliary_for = Some(primary.id());
        let err = dependent.make_auxiliary(leaf).unwrap_err();
        assert_eq!(err.kind(), AuxiliaryErrorKind::PrimaryIsAuxiliary);

        // An auxiliary cannot be attached twice.
        let err = primary.make_auxiliary(dependent).unwrap_err();
        assert_eq!(err.kind(), AuxiliaryErrorKind::AlreadyAuxiliary);
    }

    #[test]
    fn auxiliary_count_is_bounded() {
        let manager = Manager::new(Config {
            max_auxiliary_queries: 2,
            ..Config::default()
        });
        let mut primary = new_query(&manager, "example.com");
        primary.make_auxiliary(new_query(&manager, "a.example.com")).unwrap();
        primary.make_auxiliary(new_query(&manager, "b.example.com")).unwrap();
        let err = primary
            .make_auxiliary(new_query(&manager, "c.example.com"))
            .unwrap_err();
        assert_eq!(err.kind(), AuxiliaryErrorKind::Full);
        assert_eq!(err.into_dependent().auxiliary_for(), None);
        assert_eq!(primary.n_auxiliary_queries(), 2);
    }

    #[test]
    fn auxiliaries_are_dropped_with_their_primary() {
        let manager = Manager::default();
        let mut primary = new_query(&manager, "example.com");
        primary.make_auxiliary(new_query(&manager, "a.example.com")).unwrap();
        assert_eq!(manager.n_queries(), 2);
        drop(primary);
        assert_eq!(manager.n_queries(), 0);
    }
}
