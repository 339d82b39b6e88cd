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

//! Implementation of the [`Label`] type.

use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::{Error, MAX_LABEL_LEN};

/// The prefix marking an A-label (RFC 5890 § 2.3.2.1).
pub(super) const ACE_PREFIX: &[u8] = b"xn--";

////////////////////////////////////////////////////////////////////////
// LABELS                                                             //
////////////////////////////////////////////////////////////////////////

/// The label given to a node in the Domain Name System's tree
/// structure.
///
/// `Label` is a wrapper over `[u8]` that can only be constructed if the
/// slice is a valid DNS label (no more than 63 octets long). Labels
/// supplied by applications may hold UTF-8 text; the octets are kept
/// as given and converted to their ASCII-compatible form only on
/// request (see [`Name::to_ascii`](super::Name::to_ascii)).
///
/// Comparisons between `Label`s are case-insensitive for ASCII letters
/// only, per [RFC 4343]. Case is preserved in the internal
/// representation.
///
/// [RFC 4343]: https://datatracker.ietf.org/doc/html/rfc4343
#[repr(transparent)]
pub struct Label {
    octets: [u8],
}

#[allow(clippy::len_without_is_empty)] // Following DNS terminology, we have is_null().
impl Label {
    /// Wraps up a `&[u8]` as a `Label` without checking its length for
    /// validity. To be used only within the parent module, and only
    /// after performing the length check manually.
    pub(super) fn from_unchecked(octets: &[u8]) -> &Self {
        unsafe { &*(octets as *const [u8] as *const Label) }
    }

    /// Returns whether this `Label` is the null (zero-length) label.
    pub fn is_null(&self) -> bool {
        self.octets.is_empty()
    }

    /// Returns whether this `Label` consists of ASCII octets only.
    pub fn is_ascii(&self) -> bool {
        self.octets.is_ascii()
    }

    /// Returns whether this `Label` is an A-label, i.e. the
    /// ASCII-compatible encoding of an internationalized label.
    pub fn is_a_label(&self) -> bool {
        self.octets.len() > ACE_PREFIX.len()
            && self.octets[..ACE_PREFIX.len()].eq_ignore_ascii_case(ACE_PREFIX)
    }

    /// Returns the number of octets in this `Label`.
    pub fn len(&self) -> usize {
        self.octets.len()
    }

    /// Returns the null (zero-length) `Label`.
    pub fn null() -> &'static Self {
        Self::from_unchecked(&[])
    }

    /// Returns the octets of this `Label`.
    pub fn octets(&self) -> &[u8] {
        &self.octets
    }
}

impl<'a> TryFrom<&'a [u8]> for &'a Label {
    type Error = Error;

    fn try_from(octets: &'a [u8]) -> Result<Self, Self::Error> {
        if octets.len() > MAX_LABEL_LEN {
            Err(Error::LabelTooLong)
        } else {
            Ok(Label::from_unchecked(octets))
        }
    }
}

impl<'a> TryFrom<&'a str> for &'a Label {
    type Error = Error;

    fn try_from(text: &'a str) -> Result<Self, Self::Error> {
        <&Label>::try_from(text.as_bytes())
    }
}

/// Writes a single ASCII octet of a label, escaping it in accordance
/// with RFC 1035 § 5.1 and RFC 4343 § 2.1.
fn write_escaped(f: &mut fmt::Formatter, octet: u8) -> fmt::Result {
    if octet == b'.' {
        f.write_str("\\.")
    } else if octet == b'\\' {
        f.write_str("\\\\")
    } else if octet.is_ascii_graphic() {
        write!(f, "{}", octet as char)
    } else {
        write!(f, "\\{:03}", octet)
    }
}

/// When a `Label` is displayed, periods and backslashes are escaped as
/// `\.` and `\\`, and ASCII octets that are not graphic characters are
/// escaped `\xyz` (three-digit zero-padded decimal). A label that is
/// valid UTF-8 has its non-ASCII characters written as they are, so
/// that internationalized names print legibly; any other non-ASCII
/// octet is escaped.
impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match std::str::from_utf8(self.octets()) {
            Ok(text) => {
                for c in text.chars() {
                    if c.is_ascii() {
                        write_escaped(f, c as u8)?;
                    } else {
                        write!(f, "{}", c)?;
                    }
                }
                Ok(())
            }
            Err(_) => self
                .octets()
                .iter()
                .try_for_each(|octet| write_escaped(f, *octet)),
        }
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.octets().eq_ignore_ascii_case(other.octets())
    }
}

impl Eq for Label {}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `Label`s are ordered as unsigned left-justified octet strings, with
/// uppercase ASCII letters treated as lowercase ([RFC 4034 § 6.1]).
///
/// [RFC 4034 § 6.1]: https://datatracker.ietf.org/doc/html/rfc4034#section-6.1
impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        self.octets
            .iter()
            .map(u8::to_ascii_lowercase)
            .cmp(other.octets.iter().map(u8::to_ascii_lowercase))
    }
}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must agree with the case-insensitive PartialEq.
        state.write_usize(self.octets.len());
        for octet in self.octets().iter().map(u8::to_ascii_lowercase) {
            state.write_u8(octet);
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
