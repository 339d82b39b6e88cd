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

//! The query-resolution core of a stub DNS client.
//!
//! A [`Query`](query::Query) is built from a [`Question`](question::Question)
//! (in a literal and an ASCII-compatible encoding) or from a pre-built
//! wire [`Packet`](message::Packet). It is started against the scopes
//! offered by a [`Transport`](scope::Transport), and each completed
//! transaction is run through the CNAME/DNAME chase until the query
//! reaches a match, a non-match, or a failure. Live queries are counted
//! by a [`Manager`](manager::Manager), which enforces a hard cap.

pub mod answer;
pub mod class;
pub mod config;
pub mod flags;
pub mod manager;
pub mod message;
pub mod name;
pub mod query;
pub mod question;
pub mod rr;
pub mod scope;
mod util;
