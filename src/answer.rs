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

//! Implementation of the [`Answer`] type.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::name::Name;
use crate::rr::ResourceRecord;

bitflags! {
    /// Per-record flags of an [`Answer`].
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct AnswerFlags: u16 {
        /// The record was validated with DNSSEC.
        const AUTHENTICATED = 1 << 0;
        const CACHEABLE = 1 << 1;

        /// The owner name is shared with other hosts (mDNS).
        const SHARED_OWNER = 1 << 2;
        const CACHE_FLUSH = 1 << 3;
        const GOODBYE = 1 << 4;

        /// The record came from the network rather than local data.
        const FROM_NETWORK = 1 << 5;

        const SECTION_ANSWER = 1 << 6;
        const SECTION_AUTHORITY = 1 << 7;
        const SECTION_ADDITIONAL = 1 << 8;
    }
}

/// A record of an [`Answer`] with the interface it was learned on and
/// its flags.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnswerItem {
    pub rr: ResourceRecord,
    pub ifindex: Option<u32>,
    pub flags: AnswerFlags,
}

/// The ordered records produced by a lookup.
///
/// An `Answer` is a shared handle: clones are cheap, and adding to an
/// answer whose records are shared copies them first, so other handles
/// never observe the change.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct Answer {
    items: Arc<Vec<AnswerItem>>,
}

impl Answer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record. If the same record is already present for the
    /// same interface, the two are folded: the record keeps its place,
    /// and its flags become the union of both, except
    /// [`AnswerFlags::AUTHENTICATED`], which is kept only if both
    /// copies carry it.
    pub fn add(&mut self, rr: ResourceRecord, ifindex: Option<u32>, flags: AnswerFlags) {
        let items = Arc::make_mut(&mut self.items);
        match items
            .iter_mut()
            .find(|item| item.ifindex == ifindex && item.rr == rr)
        {
            Some(item) => {
                let authenticated = (item.flags & flags) & AnswerFlags::AUTHENTICATED;
                item.flags = ((item.flags | flags) - AnswerFlags::AUTHENTICATED) | authenticated;
            }
            None => items.push(AnswerItem { rr, ifindex, flags }),
        }
    }

    /// Returns the union of two answers, records of `self` first.
    pub fn merge(&self, other: &Answer) -> Answer {
        if other.is_empty() {
            return self.clone();
        } else if self.is_empty() {
            return other.clone();
        }
        let mut merged = self.clone();
        for item in other.iter() {
            merged.add(item.rr.clone(), item.ifindex, item.flags);
        }
        merged
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<AnswerItem> {
        self.items.iter()
    }

    /// Returns whether any record is owned by `name`.
    pub fn contains_name(&self, name: &Name) -> bool {
        self.items.iter().any(|item| item.rr.name() == name)
    }
}

impl<'a> IntoIterator for &'a Answer {
    type Item = &'a AnswerItem;
    type IntoIter = std::slice::Iter<'a, AnswerItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for Answer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list()
            .entries(self.items.iter().map(|item| &item.rr))
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class;
    use crate::rr::{Rdata, Ttl};
    use std::net::Ipv4Addr;

    fn a_record(owner: &str, last: u8) -> ResourceRecord {
        ResourceRecord::new(
            Class::IN,
            owner.parse().unwrap(),
            Ttl::from(300),
            Rdata::A(Ipv4Addr::new(192, 0, 2, last)),
        )
    }

    #[test]
    fn duplicates_are_folded() {
        let mut answer = Answer::new();
        answer.add(a_record("example.com", 1), Some(1), AnswerFlags::AUTHENTICATED);
        answer.add(a_record("example.com", 2), Some(1), AnswerFlags::empty());
        answer.add(a_record("EXAMPLE.com", 1), Some(1), AnswerFlags::CACHEABLE);
        assert_eq!(answer.len(), 2);
        let first = answer.iter().next().unwrap();
        assert_eq!(first.flags, AnswerFlags::CACHEABLE);
    }

    #[test]
    fn different_interfaces_are_kept_apart() {
        let mut answer = Answer::new();
        answer.add(a_record("example.com", 1), Some(1), AnswerFlags::empty());
        answer.add(a_record("example.com", 1), Some(2), AnswerFlags::empty());
        assert_eq!(answer.len(), 2);
    }

    #[test]
    fn shared_answers_copy_on_write() {
        let mut answer = Answer::new();
        answer.add(a_record("example.com", 1), None, AnswerFlags::empty());
        let snapshot = answer.clone();
        answer.add(a_record("example.com", 2), None, AnswerFlags::empty());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(answer.len(), 2);
    }

    #[test]
    fn merge_keeps_order() {
        let mut a = Answer::new();
        a.add(a_record("a.example", 1), None, AnswerFlags::empty());
        let mut b = Answer::new();
        b.add(a_record("b.example", 2), None, AnswerFlags::empty());
        b.add(a_record("a.example", 1), None, AnswerFlags::empty());
        let merged = a.merge(&b);
        assert_eq!(merged.len(), 2);
        assert!(merged.contains_name(&"b.example".parse().unwrap()));
        assert_eq!(merged.iter().next().unwrap().rr, a_record("a.example", 1));
    }
}
