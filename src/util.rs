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

//! Crate-private utilities.

/// A wrapper around [`str`] references whose [`PartialEq`] and [`Eq`]
/// implementations are ASCII-case-insensitive.
pub struct Caseless<'a>(pub &'a str);

impl PartialEq for Caseless<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(other.0)
    }
}

impl Eq for Caseless<'_> {}

/// Converts a nibble into an ASCII hex character, as used in the labels
/// of `ip6.arpa` reverse-lookup names. Lower-case hex digits are used.
/// The passed value must be less than 16.
pub fn nibble_to_ascii_hex_digit(nibble: u8) -> u8 {
    assert!(nibble < 16);
    if nibble < 10 {
        b'0' + nibble
    } else {
        b'a' + nibble - 10
    }
}

/// Parses the RFC 3597 generic form of a class or type mnemonic
/// (`CLASS1`, `TYPE65280`, ...). Returns [`None`] if `text` does not
/// start with `prefix`.
pub fn parse_generic_mnemonic(text: &str, prefix: &str) -> Option<Result<u16, &'static str>> {
    text.get(0..prefix.len())
        .filter(|start| start.eq_ignore_ascii_case(prefix))
        .map(|_| {
            text[prefix.len()..]
                .parse::<u16>()
                .or(Err("value is not a valid unsigned 16-bit integer"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caseless_eq_works() {
        assert!(Caseless("Example") == Caseless("eXAMPLE"));
        assert!(Caseless("example") != Caseless("examples"));
    }

    #[test]
    fn nibbles_convert() {
        assert_eq!(nibble_to_ascii_hex_digit(0), b'0');
        assert_eq!(nibble_to_ascii_hex_digit(9), b'9');
        assert_eq!(nibble_to_ascii_hex_digit(15), b'f');
    }

    #[test]
    fn generic_mnemonics_parse() {
        assert_eq!(parse_generic_mnemonic("type39", "TYPE"), Some(Ok(39)));
        assert!(matches!(
            parse_generic_mnemonic("TYPE70000", "TYPE"),
            Some(Err(_))
        ));
        assert_eq!(parse_generic_mnemonic("A", "TYPE"), None);
    }
}
