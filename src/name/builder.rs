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

//! Implementation of the [`NameBuilder`] structure.

use arrayvec::ArrayVec;

use super::{Error, Label, Name, MAX_LABEL_LEN, MAX_N_LABELS, MAX_WIRE_LEN};

/// A facility to build [`Name`]s label by label.
///
/// The `NameBuilder` accumulates the on-the-wire representation and the
/// label offsets of a name in fixed-size buffers long enough for any
/// valid name, so building on the stack costs one allocation when the
/// name is finished.
///
/// A new `NameBuilder` starts with a single null label. Octets are
/// added to the current label with [`NameBuilder::try_push`] and
/// [`NameBuilder::try_push_slice`]; [`NameBuilder::next_label`] starts
/// a new one. Any call that would produce an invalid name fails and
/// leaves the builder unchanged.
///
/// ```
/// use resquery::name::{Name, NameBuilder};
/// let mut builder = NameBuilder::new();
/// builder.try_push_slice(b"example").unwrap();
/// builder.next_label().unwrap();
/// builder.try_push_slice(b"test").unwrap();
/// builder.next_label().unwrap(); // start the null label
/// assert_eq!(builder.finish().unwrap(), "example.test".parse::<Name>().unwrap());
/// ```
pub struct NameBuilder {
    wire_repr: ArrayVec<u8, MAX_WIRE_LEN>,
    label_offsets: ArrayVec<u8, MAX_N_LABELS>,
    label_start: usize,
    label_len: u8,
}

impl NameBuilder {
    /// Constructs a new `NameBuilder`, which initially contains a
    /// single null label.
    pub fn new() -> Self {
        let mut wire_repr = ArrayVec::new();
        wire_repr.push(0);
        let mut label_offsets = ArrayVec::new();
        label_offsets.push(0);
        Self {
            wire_repr,
            label_offsets,
            label_start: 0,
            label_len: 0,
        }
    }

    /// Returns whether the current label is the null label.
    pub fn is_fully_qualified(&self) -> bool {
        self.label_len == 0
    }

    /// Tries to add the given octet to the current label.
    pub fn try_push(&mut self, octet: u8) -> Result<(), Error> {
        if self.label_len >= (MAX_LABEL_LEN as u8) {
            Err(Error::LabelTooLong)
        } else if self.wire_repr.try_push(octet).is_ok() {
            self.label_len += 1;
            Ok(())
        } else {
            Err(Error::NameTooLong)
        }
    }

    /// Tries to add the given slice to the current label.
    pub fn try_push_slice(&mut self, octets: &[u8]) -> Result<(), Error> {
        if (self.label_len as usize) + octets.len() > MAX_LABEL_LEN {
            Err(Error::LabelTooLong)
        } else if self.wire_repr.try_extend_from_slice(octets).is_ok() {
            self.label_len += octets.len() as u8;
            Ok(())
        } else {
            Err(Error::NameTooLong)
        }
    }

    /// Appends a whole non-null label, starting a new label first if
    /// the current one is not empty.
    pub fn try_push_label(&mut self, label: &Label) -> Result<(), Error> {
        if !self.is_fully_qualified() {
            self.next_label()?;
        }
        self.try_push_slice(label.octets())
    }

    fn update_label_len(&mut self) {
        self.wire_repr[self.label_start] = self.label_len;
    }

    /// Finishes the current label and starts a new one. This fails if
    /// the current label is null (only the last label may be null) or
    /// if the name would become too long.
    pub fn next_label(&mut self) -> Result<(), Error> {
        if self.is_fully_qualified() {
            Err(Error::NullNonTerminal)
        } else if self.wire_repr.is_full() {
            Err(Error::NameTooLong)
        } else {
            self.update_label_len();
            self.label_start = self.wire_repr.len();
            self.label_len = 0;

            // Neither push can fail: wire_repr is not full, and a name
            // whose labels are all non-null cannot have more labels
            // than MAX_N_LABELS within MAX_WIRE_LEN octets.
            self.wire_repr.push(0);
            self.label_offsets.push(self.label_start as u8);
            Ok(())
        }
    }

    /// Finishes the construction of the domain name. Since the last
    /// label of a domain name must be null, this fails if that is not
    /// the case.
    pub fn finish(self) -> Result<Name, Error> {
        if !self.is_fully_qualified() {
            Err(Error::NonNullTerminal)
        } else {
            Ok(Name::from_parts(&self.label_offsets, &self.wire_repr))
        }
    }

    /// Finishes the construction by closing the current label and then
    /// appending the labels of `suffix`. This fails if the current
    /// label is null or if the result would be too long.
    pub fn finish_with_suffix(mut self, suffix: &Name) -> Result<Name, Error> {
        if self.is_fully_qualified() {
            Err(Error::NullNonTerminal)
        } else {
            self.update_label_len();
            let label_offset_base = self.wire_repr.len() as u8;
            self.wire_repr
                .try_extend_from_slice(suffix.wire_repr())
                .or(Err(Error::NameTooLong))?;
            for offset in suffix.label_offsets() {
                self.label_offsets.push(*offset + label_offset_base);
            }
            Ok(Name::from_parts(&self.label_offsets, &self.wire_repr))
        }
    }
}

impl Default for NameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namebuilder_works() {
        let mut builder = NameBuilder::new();
        for c in b"example".iter() {
            builder.try_push(*c).unwrap();
        }
        builder.next_label().unwrap();
        builder.try_push_slice(b"test").unwrap();
        builder.next_label().unwrap();
        let name = builder.finish().unwrap();
        assert_eq!(name.wire_repr(), b"\x07example\x04test\x00");
    }

    #[test]
    fn namebuilder_works_with_suffix() {
        let mut builder = NameBuilder::new();
        let suffix: Name = "test".parse().unwrap();
        builder.try_push_slice(b"example").unwrap();
        let name = builder.finish_with_suffix(&suffix).unwrap();
        assert_eq!(name, "example.test".parse().unwrap());
        assert_eq!(name.len(), 3);
    }

    #[test]
    fn push_label_starts_new_labels() {
        let mut builder = NameBuilder::new();
        builder.try_push_label(b"www".as_slice().try_into().unwrap()).unwrap();
        builder.try_push_label(b"v2".as_slice().try_into().unwrap()).unwrap();
        let name = builder
            .finish_with_suffix(&"example.com".parse().unwrap())
            .unwrap();
        assert_eq!(name.to_string(), "www.v2.example.com");
    }

    #[test]
    fn finish_rejects_non_fqdn() {
        let mut builder = NameBuilder::new();
        builder.try_push(b'x').unwrap();
        assert_eq!(builder.finish(), Err(Error::NonNullTerminal));
    }

    #[test]
    fn finish_with_suffix_rejects_fqdn() {
        let builder = NameBuilder::new();
        assert_eq!(
            builder.finish_with_suffix(&"test".parse().unwrap()),
            Err(Error::NullNonTerminal)
        );
    }

    #[test]
    fn try_push_rejects_long_label() {
        let mut builder = NameBuilder::new();
        for _ in 0..MAX_LABEL_LEN {
            builder.try_push(b'x').unwrap();
        }
        assert_eq!(builder.try_push(b'x'), Err(Error::LabelTooLong));
    }

    #[test]
    fn try_push_rejects_long_name() {
        let mut builder = NameBuilder::new();
        for _ in 0..MAX_N_LABELS - 1 {
            builder.try_push(b'x').unwrap();
            builder.next_label().unwrap();
        }
        assert_eq!(builder.try_push(b'x'), Err(Error::NameTooLong));
    }

    #[test]
    fn finish_with_suffix_rejects_long_name() {
        let mut builder = NameBuilder::new();
        for _ in 0..MAX_N_LABELS - 2 {
            builder.try_push(b'x').unwrap();
            builder.next_label().unwrap();
        }
        builder.try_push(b'x').unwrap();
        assert_eq!(
            builder.finish_with_suffix(&"test".parse().unwrap()),
            Err(Error::NameTooLong)
        );
    }

    #[test]
    fn next_label_rejects_null_non_terminal() {
        let mut builder = NameBuilder::new();
        assert_eq!(builder.next_label(), Err(Error::NullNonTerminal));
    }
}
