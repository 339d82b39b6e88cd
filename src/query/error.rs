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

//! Errors surfaced synchronously by [`Query`] operations.

use std::fmt;

use super::Query;

////////////////////////////////////////////////////////////////////////
// QUERY ERRORS                                                       //
////////////////////////////////////////////////////////////////////////

/// The kind of a query [`Error`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// The request was malformed (`EINVAL`).
    InvalidInput,

    /// The live-query cap has been reached (`EBUSY`).
    Busy,

    /// The operation is not allowed in the query's current state.
    State,
}

/// An error signaling that a query could not be created or driven.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    reason: &'static str,
}

impl Error {
    pub(super) fn new(kind: ErrorKind, reason: &'static str) -> Self {
        Self { kind, reason }
    }

    pub(super) fn invalid(reason: &'static str) -> Self {
        Self::new(ErrorKind::InvalidInput, reason)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.reason)
    }
}

impl std::error::Error for Error {}

////////////////////////////////////////////////////////////////////////
// AUXILIARY LINKAGE ERRORS                                           //
////////////////////////////////////////////////////////////////////////

/// The reason an auxiliary attachment was refused.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AuxiliaryErrorKind {
    /// The dependent is already auxiliary to a primary.
    AlreadyAuxiliary,

    /// The dependent has auxiliaries of its own.
    HasAuxiliaries,

    /// The primary is itself an auxiliary query.
    PrimaryIsAuxiliary,

    /// The primary has reached its auxiliary limit.
    Full,
}

/// An error signaling that [`Query::make_auxiliary`] refused a
/// dependent. The dependent is handed back.
pub struct AuxiliaryError {
    kind: AuxiliaryErrorKind,
    dependent: Box<Query>,
}

impl AuxiliaryError {
    pub(super) fn new(kind: AuxiliaryErrorKind, dependent: Query) -> Self {
        Self {
            kind,
            dependent: Box::new(dependent),
        }
    }

    pub fn kind(&self) -> AuxiliaryErrorKind {
        self.kind
    }

    /// Recovers the refused dependent.
    pub fn into_dependent(self) -> Query {
        *self.dependent
    }
}

impl fmt::Display for AuxiliaryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self.kind {
            AuxiliaryErrorKind::AlreadyAuxiliary => "query is already auxiliary to another query",
            AuxiliaryErrorKind::HasAuxiliaries => "query has auxiliary queries of its own",
            AuxiliaryErrorKind::PrimaryIsAuxiliary => "primary query is itself auxiliary",
            AuxiliaryErrorKind::Full => "primary query has too many auxiliary queries",
        })
    }
}

impl fmt::Debug for AuxiliaryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AuxiliaryError")
            .field("kind", &self.kind)
            .field("dependent", &self.dependent.id())
            .finish()
    }
}

impl std::error::Error for AuxiliaryError {}
