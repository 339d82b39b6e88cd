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

//! Implementation of the [`Question`] type.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use crate::class::Class;
use crate::name::{self, Name, NameBuilder};
use crate::rr::{ResourceKey, ResourceRecord, Type};
use crate::scope::Family;
use crate::util::nibble_to_ascii_hex_digit;

/// The maximum number of keys a question may hold and still be posed.
pub const MAX_KEYS: usize = 64;

////////////////////////////////////////////////////////////////////////
// QUESTIONS                                                          //
////////////////////////////////////////////////////////////////////////

/// An ordered set of [`ResourceKey`]s posed together, such as the A and
/// AAAA keys of an address lookup.
///
/// A `Question` is immutable once built (see [`QuestionBuilder`]) and
/// cheap to clone. Keys are unique within a question and keep the order
/// they were added in. Two questions are equal if they hold the same
/// keys, regardless of order.
#[derive(Clone)]
pub struct Question {
    keys: Arc<[ResourceKey]>,
}

impl Question {
    /// Builds the question for the addresses of `name`: A and/or AAAA
    /// depending on `family`, both when it is `None`. With
    /// `convert_idna`, non-ASCII labels are converted to A-labels
    /// first.
    pub fn new_address(
        family: Option<Family>,
        name: &Name,
        convert_idna: bool,
    ) -> Result<Self, name::Error> {
        let name = if convert_idna {
            name.to_ascii()?
        } else {
            name.clone()
        };
        let mut builder = QuestionBuilder::new();
        if family != Some(Family::Inet6) {
            builder.add(ResourceKey::new(Class::IN, Type::A, name.clone()));
        }
        if family != Some(Family::Inet) {
            builder.add(ResourceKey::new(Class::IN, Type::AAAA, name));
        }
        Ok(builder.build())
    }

    /// Builds the PTR question for the reverse-lookup name of `addr`,
    /// under `in-addr.arpa` or `ip6.arpa`.
    pub fn new_reverse(addr: IpAddr) -> Result<Self, name::Error> {
        let mut builder = NameBuilder::new();
        match addr {
            IpAddr::V4(addr) => {
                for octet in addr.octets().iter().rev() {
                    builder.try_push_slice(octet.to_string().as_bytes())?;
                    builder.next_label()?;
                }
                builder.try_push_slice(b"in-addr")?;
            }
            IpAddr::V6(addr) => {
                for octet in addr.octets().iter().rev() {
                    builder.try_push(nibble_to_ascii_hex_digit(octet & 0xf))?;
                    builder.next_label()?;
                    builder.try_push(nibble_to_ascii_hex_digit(octet >> 4))?;
                    builder.next_label()?;
                }
                builder.try_push_slice(b"ip6")?;
            }
        }
        builder.next_label()?;
        builder.try_push_slice(b"arpa")?;
        builder.next_label()?;
        let name = builder.finish()?;
        Ok(Self::from(ResourceKey::new(Class::IN, Type::PTR, name)))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[ResourceKey] {
        &self.keys
    }

    pub fn iter(&self) -> std::slice::Iter<ResourceKey> {
        self.keys.iter()
    }

    pub fn contains_key(&self, key: &ResourceKey) -> bool {
        self.keys.contains(key)
    }

    /// Returns the owner name of the first key.
    pub fn first_name(&self) -> Option<&Name> {
        self.keys.first().map(ResourceKey::name)
    }

    /// Returns whether every key has the same owner name. An empty
    /// question trivially does.
    pub fn has_single_name(&self) -> bool {
        match self.first_name() {
            Some(first) => self.keys.iter().all(|key| key.name() == first),
            None => true,
        }
    }

    /// Returns whether this question may be posed by a query: it is
    /// non-empty, holds at most [`MAX_KEYS`] keys for a single owner
    /// name, and none of them uses the `ANY` class or a type that only
    /// makes sense between servers.
    pub fn is_valid_for_query(&self) -> bool {
        !self.is_empty()
            && self.len() <= MAX_KEYS
            && self.has_single_name()
            && self
                .keys
                .iter()
                .all(|key| !key.class().is_wildcard() && key.rr_type().is_valid_query_type())
    }

    /// Returns whether `rr` answers one of the keys directly.
    pub fn matches_rr(&self, rr: &ResourceRecord) -> bool {
        self.keys.iter().any(|key| key.matches_rr(rr))
    }

    /// Returns whether `rr` is a CNAME or DNAME record redirecting one
    /// of the keys.
    pub fn matches_redirect(&self, rr: &ResourceRecord) -> bool {
        self.keys.iter().any(|key| key.matches_redirect(rr))
    }

    /// Returns the question obtained by following the redirect `rr`:
    /// every key is moved to the name the first redirected key points
    /// to. Returns `Ok(None)` if `rr` redirects none of the keys.
    pub fn redirect(&self, rr: &ResourceRecord) -> Result<Option<Self>, name::Error> {
        for key in self.keys.iter() {
            if let Some(target) = key.redirect_target(rr)? {
                return Ok(Some(self.with_name(&target)));
            }
        }
        Ok(None)
    }

    /// Returns a question with the same keys moved to `name`.
    pub fn with_name(&self, name: &Name) -> Self {
        self.keys
            .iter()
            .map(|key| key.with_name(name.clone()))
            .collect()
    }

    /// Returns a question with every owner name converted to its
    /// ASCII-compatible form.
    pub fn to_ascii(&self) -> Result<Self, name::Error> {
        let mut builder = QuestionBuilder::new();
        for key in self.keys.iter() {
            builder.add(key.with_name(key.name().to_ascii()?));
        }
        Ok(builder.build())
    }

    /// Returns whether both questions hold the same keys, in any order.
    pub fn is_equal(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.keys, &other.keys)
            || (self.len() == other.len() && self.keys.iter().all(|key| other.contains_key(key)))
    }

    /// Returns the union of both questions, keys of `self` first.
    pub fn merge(&self, other: &Self) -> Self {
        self.keys.iter().chain(other.keys.iter()).cloned().collect()
    }
}

impl PartialEq for Question {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

impl Eq for Question {}

impl Default for Question {
    /// Returns the empty question.
    fn default() -> Self {
        QuestionBuilder::new().build()
    }
}

impl From<ResourceKey> for Question {
    fn from(key: ResourceKey) -> Self {
        Self {
            keys: Arc::new([key]),
        }
    }
}

impl FromIterator<ResourceKey> for Question {
    fn from_iter<I: IntoIterator<Item = ResourceKey>>(iter: I) -> Self {
        let mut builder = QuestionBuilder::new();
        iter.into_iter().for_each(|key| builder.add(key));
        builder.build()
    }
}

impl<'a> IntoIterator for &'a Question {
    type Item = &'a ResourceKey;
    type IntoIter = std::slice::Iter<'a, ResourceKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("{")?;
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            key.fmt(f)?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Question{}", self)
    }
}

/// Accumulates the keys of a [`Question`]. Adding a key already present
/// has no effect.
#[derive(Default)]
pub struct QuestionBuilder {
    keys: Vec<ResourceKey>,
}

impl QuestionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: ResourceKey) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    pub fn build(self) -> Question {
        Question {
            keys: self.keys.into(),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
