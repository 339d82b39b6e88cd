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

//! Provides the [`Type`] structure for DNS RR types.

use std::fmt;
use std::str::FromStr;

use crate::util::{parse_generic_mnemonic, Caseless};

////////////////////////////////////////////////////////////////////////
// RR TYPES                                                           //
////////////////////////////////////////////////////////////////////////

/// Represents the RR type of a DNS record or question.
///
/// An RR type is represented on the wire as an unsigned 16-bit integer,
/// so this wraps `u16` with [`Display`](fmt::Display) and [`FromStr`]
/// implementations for the common mnemonics and the RFC 3597 generic
/// form. Besides data types, the question-only values `ANY`, `AXFR`,
/// and `IXFR` are included, since they may appear in questions.
#[derive(Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Type(u16);

/// Generates the constants, [`FromStr`], and [`Display`](fmt::Display)
/// for the named types from one table.
macro_rules! named_types {
    ($($name:ident = $value:expr,)*) => {
        impl Type {
            $(pub const $name: Type = Type($value);)*
        }

        impl FromStr for Type {
            type Err = &'static str;

            fn from_str(text: &str) -> Result<Self, Self::Err> {
                $(if Caseless(text) == Caseless(stringify!($name)) {
                    return Ok(Self::$name);
                })*
                parse_generic_mnemonic(text, "TYPE")
                    .unwrap_or(Err("unknown type"))
                    .map(Self::from)
            }
        }

        impl fmt::Display for Type {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match *self {
                    $(Self::$name => f.write_str(stringify!($name)),)*
                    Self(value) => write!(f, "TYPE{value}"), // RFC 3597 § 5
                }
            }
        }
    };
}

named_types! {
    A = 1,
    NS = 2,
    CNAME = 5,
    SOA = 6,
    PTR = 12,
    MX = 15,
    TXT = 16,
    AAAA = 28,
    SRV = 33,
    DNAME = 39,
    OPT = 41,
    DS = 43,
    RRSIG = 46,
    NSEC = 47,
    DNSKEY = 48,
    NSEC3 = 50,
    SVCB = 64,
    HTTPS = 65,
    TKEY = 249,
    TSIG = 250,
    IXFR = 251,
    AXFR = 252,
    ANY = 255,
}

impl Type {
    /// Returns whether this is the [`ANY`](Type::ANY) wildcard.
    pub fn is_wildcard(self) -> bool {
        self == Self::ANY
    }

    /// Returns whether a question for this type is answered by a record
    /// of type `other`.
    pub fn matches(self, other: Type) -> bool {
        self.is_wildcard() || self == other
    }

    /// Returns whether a lookup for this type may be redirected by a
    /// CNAME or DNAME record. Lookups for the redirect types themselves,
    /// for DNSSEC and transport metadata, and for the `ANY` wildcard are
    /// answered directly.
    pub fn may_redirect(self) -> bool {
        !matches!(
            self,
            Self::CNAME
                | Self::DNAME
                | Self::OPT
                | Self::DS
                | Self::RRSIG
                | Self::NSEC
                | Self::DNSKEY
                | Self::NSEC3
                | Self::TKEY
                | Self::TSIG
                | Self::IXFR
                | Self::AXFR
                | Self::ANY
        )
    }

    /// Returns whether this type may appear in a question posed by a
    /// stub resolver.
    pub fn is_valid_query_type(self) -> bool {
        !matches!(self, Self::OPT | Self::TKEY | Self::TSIG | Self::IXFR | Self::AXFR) && self.0 != 0
    }
}

impl From<u16> for Type {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<Type> for u16 {
    fn from(rr_type: Type) -> Self {
        rr_type.0
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_displays_according_to_rfc3597() {
        assert_eq!(Type::from(0xff00).to_string(), "TYPE65280");
        assert_eq!(Type::DNAME.to_string(), "DNAME");
    }

    #[test]
    fn type_parses_mnemonics_and_generic_form() {
        assert_eq!("aaaa".parse::<Type>(), Ok(Type::AAAA));
        assert_eq!("TYPE1".parse::<Type>(), Ok(Type::A));
        assert_eq!(u16::from("TYPE65280".parse::<Type>().unwrap()), 65280);
        assert!("BOGUS".parse::<Type>().is_err());
    }

    #[test]
    fn redirectable_types() {
        assert!(Type::A.may_redirect());
        assert!(Type::AAAA.may_redirect());
        assert!(Type::PTR.may_redirect());
        assert!(!Type::CNAME.may_redirect());
        assert!(!Type::DNAME.may_redirect());
        assert!(!Type::ANY.may_redirect());
    }

    #[test]
    fn any_matches_every_record_type() {
        assert!(Type::ANY.matches(Type::A));
        assert!(Type::ANY.matches(Type::CNAME));
        assert!(Type::A.matches(Type::A));
        assert!(!Type::A.matches(Type::AAAA));
    }
}
