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

//! Implementation of the [`ResourceKey`] type.

use std::fmt;

use super::{Rdata, ResourceRecord, Type};
use crate::class::Class;
use crate::name::{self, Name};

/// The (class, type, owner name) triple identifying what a question
/// asks for or what a record is about.
///
/// A `ResourceKey` is immutable; its name is a shared [`Name`] handle,
/// so clones are cheap. Equality and hashing follow [`Name`] and are
/// ASCII-case-insensitive on the owner name and exact on class and
/// type. Wildcard matching (`ANY`) is done by [`ResourceKey::matches_rr`],
/// never by equality.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct ResourceKey {
    class: Class,
    rr_type: Type,
    name: Name,
}

impl ResourceKey {
    pub fn new(class: Class, rr_type: Type, name: Name) -> Self {
        Self {
            class,
            rr_type,
            name,
        }
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn rr_type(&self) -> Type {
        self.rr_type
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns a key with the same class and type for another name.
    pub fn with_name(&self, name: Name) -> Self {
        Self::new(self.class, self.rr_type, name)
    }

    /// Returns whether `rr` answers this key directly: same owner name,
    /// and class and type equal or matched by the `ANY` wildcard.
    pub fn matches_rr(&self, rr: &ResourceRecord) -> bool {
        self.class.matches(rr.class()) && self.rr_type.matches(rr.rr_type()) && self.name == *rr.name()
    }

    /// Returns whether `rr` redirects this key: a CNAME owned by the key
    /// name itself, or a DNAME owned by a strict ancestor of it (the
    /// owner of a DNAME is not itself redirected, RFC 6672 § 2.3).
    pub fn matches_redirect(&self, rr: &ResourceRecord) -> bool {
        if !self.rr_type.may_redirect() || !self.class.matches(rr.class()) {
            return false;
        }
        match rr.rdata() {
            Rdata::Cname(_) => self.name == *rr.name(),
            Rdata::Dname(_) => self.name.is_strict_subdomain_of(rr.name()),
            _ => false,
        }
    }

    /// Computes the name this key is redirected to by `rr`. Returns
    /// `Ok(None)` if `rr` does not redirect this key, and an error if a
    /// DNAME substitution produces an overlong name.
    pub fn redirect_target(&self, rr: &ResourceRecord) -> Result<Option<Name>, name::Error> {
        if !self.matches_redirect(rr) {
            return Ok(None);
        }
        match rr.rdata() {
            Rdata::Cname(target) => Ok(Some(target.clone())),
            Rdata::Dname(target) => self.name.replace_suffix(rr.name(), target),
            _ => Ok(None),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.class, self.rr_type)
    }
}

impl fmt::Debug for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({})", self)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
