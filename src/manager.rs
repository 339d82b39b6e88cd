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

//! The manager context and its registry of live queries.

use std::fmt;
use std::sync::{Arc, Mutex};

use log::warn;
use slab::Slab;

use crate::config::Config;

////////////////////////////////////////////////////////////////////////
// QUERY IDENTIFIERS                                                  //
////////////////////////////////////////////////////////////////////////

/// The identity of a live query. Identifiers are never reused by a
/// [`Manager`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct QueryId(u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

////////////////////////////////////////////////////////////////////////
// MANAGER                                                            //
////////////////////////////////////////////////////////////////////////

/// The context queries are created in.
///
/// A `Manager` holds the engine [`Config`] and the registry of live
/// queries. Every query holds a [`Registration`] for as long as it
/// lives; the registry refuses new registrations once
/// [`Config::max_queries`] are live. Clones of a `Manager` share the
/// same registry.
#[derive(Clone)]
pub struct Manager {
    config: Config,
    registry: Arc<Mutex<Registry>>,
}

/// The table of live queries. The count check and the insertion happen
/// under one lock, so the cap holds exactly.
struct Registry {
    live: Slab<QueryId>,
    next_id: u64,
}

impl Manager {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: Arc::new(Mutex::new(Registry {
                live: Slab::new(),
                next_id: 0,
            })),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the number of live queries.
    pub fn n_queries(&self) -> usize {
        self.registry.lock().unwrap().live.len()
    }

    /// Registers a new query. Returns `None` if the live-query cap has
    /// been reached.
    pub fn register(&self) -> Option<Registration> {
        let mut registry = self.registry.lock().unwrap();
        if registry.live.len() >= self.config.max_queries {
            warn!(
                "Refusing new query: {} queries are already live",
                registry.live.len()
            );
            return None;
        }
        let id = QueryId(registry.next_id);
        registry.next_id += 1;
        let key = registry.live.insert(id);
        Some(Registration {
            registry: self.registry.clone(),
            key,
            id,
        })
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Manager")
            .field("config", &self.config)
            .field("n_queries", &self.n_queries())
            .finish()
    }
}

/// The handle a live query holds in its manager's registry. Dropping
/// it unregisters the query.
pub struct Registration {
    registry: Arc<Mutex<Registry>>,
    key: usize,
    id: QueryId,
}

impl Registration {
    pub fn id(&self) -> QueryId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut registry = self.registry.lock().unwrap();
        registry.live.remove(self.key);
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Registration({})", self.id)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn small_manager(max_queries: usize) -> Manager {
        Manager::new(Config {
            max_queries,
            ..Config::default()
        })
    }

    #[test]
    fn registry_enforces_cap() {
        let manager = small_manager(2);
        let first = manager.register().unwrap();
        let second = manager.register().unwrap();
        assert!(manager.register().is_none());
        assert_eq!(manager.n_queries(), 2);
        drop(first);
        assert_eq!(manager.n_queries(), 1);
        let third = manager.register().unwrap();
        assert_ne!(third.id(), second.id());
    }

    #[test]
    fn ids_are_not_reused() {
        let manager = small_manager(1);
        let first_id = manager.register().unwrap().id();
        let second_id = manager.register().unwrap().id();
        assert!(second_id > first_id);
    }

    #[test]
    fn clones_share_registry() {
        let manager = small_manager(1);
        let clone = manager.clone();
        let _registration = manager.register().unwrap();
        assert!(clone.register().is_none());
    }
}
