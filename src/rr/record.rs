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

//! Implementation of resource records and their data.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::Arc;

use super::{ResourceKey, Type};
use crate::class::Class;
use crate::name::Name;

////////////////////////////////////////////////////////////////////////
// TTLS                                                               //
////////////////////////////////////////////////////////////////////////

/// The time to live of a record, in seconds.
///
/// [RFC 2181 § 8] limits TTLs to 0 through 2³¹ - 1; a value with the
/// most significant bit set is treated as zero.
///
/// [RFC 2181 § 8]: https://datatracker.ietf.org/doc/html/rfc2181#section-8
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Ttl(u32);

impl From<u32> for Ttl {
    fn from(raw: u32) -> Self {
        Self(if raw > i32::MAX as u32 { 0 } else { raw })
    }
}

impl From<Ttl> for u32 {
    fn from(ttl: Ttl) -> Self {
        ttl.0
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

////////////////////////////////////////////////////////////////////////
// RDATA                                                              //
////////////////////////////////////////////////////////////////////////

/// The type-specific payload of a record.
///
/// Only the types the resolution core inspects get a structured form;
/// every other type is carried as opaque octets.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Rdata {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Cname(Name),
    Dname(Name),
    Ns(Name),
    Ptr(Name),
    Unknown { rr_type: Type, octets: Box<[u8]> },
}

impl Rdata {
    /// Returns the RR type this data belongs to.
    pub fn rr_type(&self) -> Type {
        match self {
            Self::A(_) => Type::A,
            Self::Aaaa(_) => Type::AAAA,
            Self::Cname(_) => Type::CNAME,
            Self::Dname(_) => Type::DNAME,
            Self::Ns(_) => Type::NS,
            Self::Ptr(_) => Type::PTR,
            Self::Unknown { rr_type, .. } => *rr_type,
        }
    }

    /// Parses the presentation form of the data for `rr_type`. Types
    /// without a structured form use the RFC 3597 `\# <len> <hex>`
    /// syntax.
    pub fn parse(rr_type: Type, text: &str) -> Result<Self, &'static str> {
        let text = text.trim();
        match rr_type {
            Type::A => text.parse().map(Self::A).or(Err("invalid IPv4 address")),
            Type::AAAA => text.parse().map(Self::Aaaa).or(Err("invalid IPv6 address")),
            Type::CNAME => parse_name(text).map(Self::Cname),
            Type::DNAME => parse_name(text).map(Self::Dname),
            Type::NS => parse_name(text).map(Self::Ns),
            Type::PTR => parse_name(text).map(Self::Ptr),
            _ => parse_generic(text).map(|octets| Self::Unknown { rr_type, octets }),
        }
    }
}

fn parse_name(text: &str) -> Result<Name, &'static str> {
    text.parse().or(Err("invalid domain name"))
}

/// Parses RFC 3597 § 5 generic data, e.g. `\# 4 c0a8017f`.
fn parse_generic(text: &str) -> Result<Box<[u8]>, &'static str> {
    let mut fields = text.split_whitespace();
    if fields.next() != Some("\\#") {
        return Err("data of unknown types must use the \\# syntax");
    }
    let len: usize = fields
        .next()
        .and_then(|len| len.parse().ok())
        .ok_or("missing or invalid data length")?;
    let hex: String = fields.collect();
    if !hex.is_ascii() || hex.len() != 2 * len {
        return Err("data length does not match");
    }
    (0..len)
        .map(|i| u8::from_str_radix(&hex[2 * i..2 * i + 2], 16).or(Err("invalid hex data")))
        .collect()
}

impl fmt::Display for Rdata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::A(addr) => addr.fmt(f),
            Self::Aaaa(addr) => addr.fmt(f),
            Self::Cname(name) | Self::Dname(name) | Self::Ns(name) | Self::Ptr(name) => name.fmt(f),
            Self::Unknown { octets, .. } => {
                write!(f, "\\# {}", octets.len())?;
                if !octets.is_empty() {
                    f.write_str(" ")?;
                }
                octets.iter().try_for_each(|octet| write!(f, "{:02x}", octet))
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// RESOURCE RECORDS                                                   //
////////////////////////////////////////////////////////////////////////

/// An immutable, reference-counted resource record: a [`ResourceKey`]
/// plus a TTL and type-specific [`Rdata`].
///
/// The record's type is always that of its data, so a record can never
/// claim to be a CNAME while carrying an address.
#[derive(Clone, Eq, PartialEq)]
pub struct ResourceRecord(Arc<RecordInner>);

#[derive(Eq, PartialEq)]
struct RecordInner {
    key: ResourceKey,
    ttl: Ttl,
    rdata: Rdata,
}

impl ResourceRecord {
    pub fn new(class: Class, owner: Name, ttl: Ttl, rdata: Rdata) -> Self {
        let key = ResourceKey::new(class, rdata.rr_type(), owner);
        Self(Arc::new(RecordInner { key, ttl, rdata }))
    }

    pub fn key(&self) -> &ResourceKey {
        &self.0.key
    }

    pub fn class(&self) -> Class {
        self.0.key.class()
    }

    pub fn rr_type(&self) -> Type {
        self.0.key.rr_type()
    }

    pub fn name(&self) -> &Name {
        self.0.key.name()
    }

    pub fn ttl(&self) -> Ttl {
        self.0.ttl
    }

    pub fn rdata(&self) -> &Rdata {
        &self.0.rdata
    }

    /// Returns whether this is a CNAME or DNAME record.
    pub fn is_redirect(&self) -> bool {
        matches!(self.0.rdata, Rdata::Cname(_) | Rdata::Dname(_))
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.name(),
            self.ttl(),
            self.class(),
            self.rr_type(),
            self.rdata()
        )
    }
}

impl FromStr for ResourceRecord {
    type Err = &'static str;

    /// Parses a record in the master-file form
    /// `<owner> <ttl> <class> <type> <rdata>`. All fields are required.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (owner, rest) = split_field(text);
        let (ttl, rest) = split_field(rest);
        let (class, rest) = split_field(rest);
        let (rr_type, rest) = split_field(rest);
        if rr_type.is_empty() || rest.trim().is_empty() {
            return Err("missing fields");
        }
        let owner: Name = owner.parse().or(Err("invalid owner"))?;
        let ttl: u32 = ttl.parse().or(Err("invalid TTL"))?;
        let class: Class = class.parse()?;
        let rr_type: Type = rr_type.parse()?;
        let rdata = Rdata::parse(rr_type, rest)?;
        Ok(Self::new(class, owner, Ttl::from(ttl), rdata))
    }
}

/// Splits the first whitespace-delimited field off `text`.
fn split_field(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    text.split_at(end)
}

impl fmt::Debug for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
