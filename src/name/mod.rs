// Copyright 2021 Matthew Ingwersen.
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

//! Implementation of data structures related to domain names.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FusedIterator;
use std::ops::Index;
use std::str::FromStr;
use std::sync::Arc;

use lazy_static::lazy_static;

mod builder;
mod error;
pub mod idna;
mod label;
mod wire;
pub use builder::NameBuilder;
pub use error::Error;
pub use label::Label;

/// The maximum number of labels in a domain name.
const MAX_N_LABELS: usize = 128;

/// The maximum length of the uncompressed on-the-wire representation of
/// a domain name.
const MAX_WIRE_LEN: usize = 255;

/// The maximum length of a label in a domain name (not including the
/// octet that provides the length).
const MAX_LABEL_LEN: usize = 63;

lazy_static! {
    static ref ROOT: Name = Name::from_parts(&[0], &[0]);
}

////////////////////////////////////////////////////////////////////////
// NAME STRUCTURE                                                     //
////////////////////////////////////////////////////////////////////////

/// An immutable, cheaply clonable domain name.
///
/// A `Name` is a handle to a shared buffer laid out as follows:
///
/// * one octet, `n_labels`, gives the number of labels in the name
///   (including the terminal null label);
/// * an array of `n_labels` octets gives the offset of each label in
///   the on-the-wire representation;
/// * the uncompressed on-the-wire representation of the name, as
///   defined in [RFC 1035 § 3.1].
///
/// Cloning a `Name` bumps a reference count; names are never modified
/// once built, and operations such as [`Name::replace_suffix`] return
/// new names.
///
/// Names can be constructed
///
/// * through the [`FromStr`] implementation, which accepts UTF-8
///   labels, RFC 4343 escapes, and an optional trailing dot;
/// * through a [`NameBuilder`]; or
/// * from compressed on-the-wire names through
///   [`Name::try_from_compressed`].
///
/// Equality, hashing, and ordering are ASCII-case-insensitive.
///
/// [RFC 1035 § 3.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.1
#[derive(Clone)]
pub struct Name {
    repr: Arc<[u8]>,
}

/// Private helpers.
impl Name {
    /// Builds a `Name` from its label offsets and wire representation.
    /// The caller guarantees that the two describe a valid name.
    fn from_parts(label_offsets: &[u8], wire_repr: &[u8]) -> Self {
        let mut repr = Vec::with_capacity(1 + label_offsets.len() + wire_repr.len());
        repr.push(label_offsets.len() as u8);
        repr.extend_from_slice(label_offsets);
        repr.extend_from_slice(wire_repr);
        Self { repr: repr.into() }
    }

    fn label_offset(&self, n: usize) -> usize {
        self.label_offsets()[n] as usize
    }

    fn label_offsets(&self) -> &[u8] {
        &self.repr[1..1 + self.len()]
    }

    /// Builds the name made of `prefix` (non-null labels) followed by
    /// the labels of `suffix`.
    fn join<'a>(prefix: impl Iterator<Item = &'a Label>, suffix: &Name) -> Result<Name, Error> {
        let mut builder = NameBuilder::new();
        for label in prefix {
            builder.try_push_label(label)?;
        }
        if builder.is_fully_qualified() {
            Ok(suffix.clone())
        } else {
            builder.finish_with_suffix(suffix)
        }
    }
}

////////////////////////////////////////////////////////////////////////
// NAME PUBLIC API                                                    //
////////////////////////////////////////////////////////////////////////

#[allow(clippy::len_without_is_empty)] // A domain name is never empty!
impl Name {
    /// Returns a `Name` representing the DNS root, `.`.
    pub fn root() -> Name {
        ROOT.clone()
    }

    /// Returns whether the `Name` is the DNS root `.`.
    pub fn is_root(&self) -> bool {
        self.len() == 1
    }

    /// Returns whether the `Name` has exactly one non-null label, like
    /// `localhost` or `printer`.
    pub fn is_single_label(&self) -> bool {
        self.len() == 2
    }

    /// Returns whether this `Name` is equal to or a subdomain of
    /// `other`.
    pub fn eq_or_subdomain_of(&self, other: &Name) -> bool {
        self.len() >= other.len()
            && self
                .labels()
                .rev()
                .zip(other.labels().rev())
                .all(|(a, b)| a == b)
    }

    /// Returns whether this `Name` is a subdomain of `other`, but not
    /// equal to it.
    pub fn is_strict_subdomain_of(&self, other: &Name) -> bool {
        self.len() > other.len() && self.eq_or_subdomain_of(other)
    }

    /// Returns whether every label of the `Name` is ASCII.
    pub fn is_ascii(&self) -> bool {
        self.wire_repr().is_ascii()
    }

    /// Returns an iterator over labels in this `Name`, ending with the
    /// null label.
    pub fn labels(&self) -> Labels {
        Labels::new(self)
    }

    /// Returns the number of labels in this `Name`, including the
    /// terminal null label.
    pub fn len(&self) -> usize {
        self.repr[0] as usize
    }

    /// Returns the superdomain obtained by skipping the first `skip`
    /// labels of the `Name`, or `None` if there aren't enough labels.
    pub fn superdomain(&self, skip: usize) -> Option<Name> {
        if skip == 0 {
            Some(self.clone())
        } else if skip < self.len() {
            let base = self.label_offset(skip);
            let offsets: Vec<u8> = self.label_offsets()[skip..]
                .iter()
                .map(|offset| offset - base as u8)
                .collect();
            Some(Name::from_parts(&offsets, &self.wire_repr()[base..]))
        } else {
            None
        }
    }

    /// Rewrites `self` under a DNAME-style substitution: if `self` is
    /// equal to or below `suffix`, the `suffix` labels are replaced with
    /// those of `replacement`, keeping any prefix. Returns `Ok(None)` if
    /// `self` is not within `suffix`.
    ///
    /// ```
    /// use resquery::name::Name;
    /// let name: Name = "www.example.com".parse().unwrap();
    /// let rewritten = name
    ///     .replace_suffix(&"example.com".parse().unwrap(), &"v2.example.com".parse().unwrap())
    ///     .unwrap();
    /// assert_eq!(rewritten, Some("www.v2.example.com".parse().unwrap()));
    /// ```
    pub fn replace_suffix(&self, suffix: &Name, replacement: &Name) -> Result<Option<Name>, Error> {
        if !self.eq_or_subdomain_of(suffix) {
            return Ok(None);
        }
        let n_prefix = self.len() - suffix.len();
        Self::join(self.labels().take(n_prefix), replacement).map(Some)
    }

    /// Returns the name formed by appending `suffix` to this name, as
    /// used when expanding a name with a search domain.
    pub fn concat(&self, suffix: &Name) -> Result<Name, Error> {
        Self::join(self.labels().take(self.len() - 1), suffix)
    }

    /// Returns the ASCII-compatible form of this name, converting every
    /// label holding non-ASCII text into an A-label. A name that is
    /// already ASCII is returned as it is.
    pub fn to_ascii(&self) -> Result<Name, Error> {
        if self.is_ascii() {
            return Ok(self.clone());
        }
        let mut builder = NameBuilder::new();
        for label in self.labels().take(self.len() - 1) {
            if !builder.is_fully_qualified() {
                builder.next_label()?;
            }
            builder.try_push_slice(&idna::label_to_ascii(label)?)?;
        }
        builder.next_label()?;
        builder.finish()
    }

    /// Tries to parse a compressed name present at index `start` of the
    /// provided buffer, following pointers. Returns the name and the
    /// number of contiguous octets read at `start` (which is 2 if a
    /// pointer is found right at `start`).
    pub fn try_from_compressed(octets: &[u8], start: usize) -> Result<(Self, usize), Error> {
        wire::parse_compressed_name(octets, start)
    }

    /// Returns the (uncompressed) on-the-wire representation of the
    /// `Name`.
    pub fn wire_repr(&self) -> &[u8] {
        &self.repr[1 + self.len()..]
    }
}

impl Index<usize> for Name {
    type Output = Label;

    fn index(&self, index: usize) -> &Self::Output {
        let offset = self.label_offset(index);
        let len = self.wire_repr()[offset] as usize;
        let start = offset + 1;
        Label::from_unchecked(&self.wire_repr()[start..start + len])
    }
}

/// Names are displayed without a trailing dot, except for the root,
/// which is displayed as `.`.
impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for (i, label) in self.labels().take(self.len() - 1).enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            label.fmt(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.repr, &other.repr)
            || (self.len() == other.len()
                && self.labels().zip(other.labels()).all(|(a, b)| a == b))
    }
}

impl Eq for Name {}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `Name`s are ordered as strings of labels read from right to left,
/// DNSSEC's canonical ordering ([RFC 4034 § 6.1]).
///
/// [RFC 4034 § 6.1]: https://datatracker.ietf.org/doc/html/rfc4034#section-6.1
impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.labels()
            .rev()
            .zip(other.labels().rev())
            .find_map(|(a, b)| Some(a.cmp(b)).filter(|ordering| ordering.is_ne()))
            .unwrap_or_else(|| self.len().cmp(&other.len()))
    }
}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for label in self.labels() {
            label.hash(state);
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ITERATION OVER A NAME'S LABELS                                     //
////////////////////////////////////////////////////////////////////////

/// An iterator over the [`Label`]s in a [`Name`], constructed with
/// [`Name::labels`].
#[derive(Clone, Debug)]
pub struct Labels<'a> {
    name: &'a Name,
    front: usize,
    back: usize,
}

impl Labels<'_> {
    fn new(name: &Name) -> Labels {
        Labels {
            name,
            front: 0,
            back: name.len(),
        }
    }
}

impl<'a> Iterator for Labels<'a> {
    type Item = &'a Label;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front < self.back {
            let this_one = self.front;
            self.front += 1;
            Some(&self.name[this_one])
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl DoubleEndedIterator for Labels<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.back > self.front {
            self.back -= 1;
            Some(&self.name[self.back])
        } else {
            None
        }
    }
}

impl ExactSizeIterator for Labels<'_> {}

impl FusedIterator for Labels<'_> {}

////////////////////////////////////////////////////////////////////////
// PARSING OF NAMES FROM RUST STRINGS                                 //
////////////////////////////////////////////////////////////////////////

/// Parses a textual domain name. Labels may contain UTF-8 text, which
/// is stored as is; escape sequences as defined by [RFC 4343 § 2.1] are
/// supported. The trailing dot is optional: application-supplied names
/// are always treated as fully qualified.
///
/// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::StrEmpty);
        } else if s == "." {
            return Ok(Name::root());
        }

        let mut remaining_octets: &[u8] = s.as_ref();
        let mut builder = NameBuilder::new();
        while let Some(&octet) = remaining_octets.first() {
            if octet == b'\\' {
                let (value, consumed) = parse_escape(&remaining_octets[1..])?;
                builder.try_push(value)?;
                remaining_octets = &remaining_octets[consumed + 1..];
            } else if octet == b'.' {
                builder.next_label()?;
                remaining_octets = &remaining_octets[1..];
            } else {
                builder.try_push(octet)?;
                remaining_octets = &remaining_octets[1..];
            }
        }
        if !builder.is_fully_qualified() {
            builder.next_label()?;
        }
        builder.finish()
    }
}

/// Parses an escape sequence. We expect `remaining_octets` to start
/// with the octet immediately *after* the backslash that introduces the
/// escape sequence.
fn parse_escape(remaining_octets: &[u8]) -> Result<(u8, usize), Error> {
    if remaining_octets.is_empty() {
        Err(Error::InvalidEscape)
    } else if remaining_octets[0].is_ascii_digit() {
        if remaining_octets.len() < 3
            || !remaining_octets[1].is_ascii_digit()
            || !remaining_octets[2].is_ascii_digit()
        {
            Err(Error::InvalidEscape)
        } else {
            let value = remaining_octets[..3]
                .iter()
                .fold(0usize, |acc, digit| 10 * acc + (digit - b'0') as usize);
            u8::try_from(value)
                .map(|value| (value, 3))
                .or(Err(Error::InvalidEscape))
        }
    } else {
        Ok((remaining_octets[0], 1))
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
