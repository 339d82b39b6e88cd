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

//! Implements the scenario file.
//!
//! A scenario describes the question to ask, the scopes a transport
//! offers, and the records the (simulated) servers behind them hold:
//!
//! ```toml
//! [limits]
//! max_cname_redirects = 8
//!
//! [question]
//! name = "www.example.com"
//! types = ["A", "AAAA"]
//!
//! [[scopes]]
//! protocol = "dns"
//! search_domains = ["corp.example"]
//!
//! [server]
//! provenance = "AUTHENTICATED | FROM_NETWORK"
//! records = [
//!     "www.example.com 300 IN CNAME example.com",
//!     "example.com 300 IN A 192.0.2.1",
//! ]
//! ```

use std::fmt::{self, Write};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::Level::Debug;
use log::{debug, log_enabled};
use paste::paste;
use serde::{de, Deserialize};

use resquery::class::Class;
use resquery::config::Config;
use resquery::flags::{QueryFlags, ResolvedFlags};
use resquery::message::Rcode;
use resquery::name::Name;
use resquery::rr::{ResourceRecord, Type};
use resquery::scope::{Family, Protocol};

////////////////////////////////////////////////////////////////////////
// SCENARIO LOADING                                                   //
////////////////////////////////////////////////////////////////////////

/// Loads the scenario from the file given by `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Scenario> {
    let raw_scenario = fs::read(path.as_ref()).context("failed to read the scenario file")?;
    let scenario: Scenario =
        toml::from_slice(&raw_scenario).context("failed to parse the scenario file")?;
    log_scenario_summary(&scenario);
    Ok(scenario)
}

/// Summarizes the scenario in the log, if the debug log level is
/// enabled.
fn log_scenario_summary(scenario: &Scenario) {
    if !log_enabled!(Debug) {
        return;
    }

    let mut message = format!(
        "Scenario loaded:\n\
         Question: {} ({} type(s))\n\
         Limits:   {} queries, {} redirects, {} auxiliaries\n\
         Records:  {}\n\
         Scopes:   {}",
        scenario.question.name.0,
        scenario.question.types.len(),
        scenario.limits.max_queries,
        scenario.limits.max_cname_redirects,
        scenario.limits.max_auxiliary_queries,
        scenario.server.records.len(),
        scenario.scopes.len(),
    );
    for scope in &scenario.scopes {
        write!(message, "\n  {}", scope.protocol.0).unwrap();
        if let Some(ref family) = scope.family {
            write!(message, "/{}", family.0).unwrap();
        }
        if let Some(ifindex) = scope.ifindex {
            write!(message, " on interface {}", ifindex).unwrap();
        }
    }
    debug!("{}", message);
}

////////////////////////////////////////////////////////////////////////
// SCENARIO FILE STRUCTURE                                            //
////////////////////////////////////////////////////////////////////////

/// The complete scenario file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub limits: Config,
    pub question: QuestionConfig,
    #[serde(default)]
    pub scopes: Vec<ScopeConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

/// The question to ask.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionConfig {
    pub name: ConfigName,
    #[serde(default = "default_question_types")]
    pub types: Vec<ConfigType>,
    #[serde(default = "default_question_class")]
    pub class: ConfigClass,

    /// Whether unicast DNS gets the ASCII-compatible form of the name.
    #[serde(default = "default_idna")]
    pub idna: bool,

    /// Whether to send the question as a pre-built bypass packet.
    #[serde(default)]
    pub bypass: bool,
    #[serde(default = "default_query_flags")]
    pub flags: ConfigQueryFlags,
    pub ifindex: Option<u32>,
}

fn default_question_types() -> Vec<ConfigType> {
    vec![ConfigType(Type::A)]
}

fn default_question_class() -> ConfigClass {
    ConfigClass(Class::IN)
}

fn default_idna() -> bool {
    true
}

fn default_query_flags() -> ConfigQueryFlags {
    ConfigQueryFlags(QueryFlags::PROTOCOLS)
}

/// A scope offered by the transport.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeConfig {
    pub protocol: ConfigProtocol,
    pub family: Option<ConfigFamily>,
    pub ifindex: Option<u32>,
    #[serde(default)]
    pub domains: Vec<ConfigName>,
    #[serde(default)]
    pub search_domains: Vec<ConfigName>,

    /// Defaults to whether the scope is unicast DNS.
    pub default_route: Option<bool>,

    /// Whether the scope refuses to start transactions.
    #[serde(default)]
    pub refuse: bool,
}

/// The records behind every scope, and how they are served.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default)]
    pub records: Vec<ConfigRecord>,
    #[serde(default = "default_provenance")]
    pub provenance: ConfigResolvedFlags,

    /// Whether an answer includes the whole redirect chain, as a
    /// recursive resolver's would, or only the first hop.
    #[serde(default)]
    pub follow_chains: bool,

    /// Names that the server fails to resolve, and the RCODE it
    /// fails with.
    #[serde(default)]
    pub failing: Vec<ConfigName>,
    #[serde(default = "default_failure_rcode")]
    pub failure_rcode: ConfigRcode,
}

fn default_provenance() -> ConfigResolvedFlags {
    ConfigResolvedFlags(ResolvedFlags::FROM_NETWORK)
}

fn default_failure_rcode() -> ConfigRcode {
    ConfigRcode(Rcode::ServFail)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            provenance: default_provenance(),
            follow_chains: false,
            failing: Vec::new(),
            failure_rcode: default_failure_rcode(),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// WRAPPERS OVER RESQUERY TYPES FOR SERDE                             //
////////////////////////////////////////////////////////////////////////

/// Generates a deserializable `ConfigX` structure wrapping an `X` type
/// from [`resquery`], using its [`FromStr`](std::str::FromStr)
/// implementation.
macro_rules! make_serde_wrapper {
    ($wrapper:ident, $over:ty, $description:literal) => {
        /// A macro-generated deserializable wrapper over a [`resquery`]
        /// type.
        #[derive(Clone, Debug)]
        pub struct $wrapper(pub $over);

        impl<'de> Deserialize<'de> for $wrapper {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: de::Deserializer<'de>,
            {
                deserializer.deserialize_str(paste! { [<$wrapper Visitor>] })
            }
        }

        paste! {
            /// A macro-generated [`Visitor`](de::Visitor).
            #[derive(Debug)]
            struct [<$wrapper Visitor>];
        }

        impl<'de> de::Visitor<'de> for paste! { [<$wrapper Visitor>] } {
            type Value = $wrapper;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str($description)
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value
                    .parse()
                    .map($wrapper)
                    .map_err(|e| E::custom(format!("invalid {}: {}", $description, e)))
            }
        }
    };
}

make_serde_wrapper!(ConfigName, Name, "domain name");
make_serde_wrapper!(ConfigClass, Class, "DNS class");
make_serde_wrapper!(ConfigType, Type, "RR type");
make_serde_wrapper!(ConfigRcode, Rcode, "RCODE");
make_serde_wrapper!(ConfigRecord, ResourceRecord, "resource record");
make_serde_wrapper!(ConfigProtocol, Protocol, "protocol");
make_serde_wrapper!(ConfigFamily, Family, "address family");
make_serde_wrapper!(ConfigQueryFlags, QueryFlags, "query flags");
make_serde_wrapper!(ConfigResolvedFlags, ResolvedFlags, "provenance flags");

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_scenario_takes_defaults() {
        let scenario: Scenario = toml::from_str(
            r#"
            [question]
            name = "www.example.com"
            "#,
        )
        .unwrap();
        assert_eq!(scenario.limits, Config::default());
        assert_eq!(scenario.question.types.len(), 1);
        assert_eq!(scenario.question.types[0].0, Type::A);
        assert_eq!(scenario.question.flags.0, QueryFlags::PROTOCOLS);
        assert!(scenario.question.idna);
        assert!(scenario.scopes.is_empty());
        assert_eq!(scenario.server.provenance.0, ResolvedFlags::FROM_NETWORK);
    }

    #[test]
    fn full_scenario_parses() {
        let scenario: Scenario = toml::from_str(
            r#"
            [limits]
            max_cname_redirects = 4

            [question]
            name = "printer"
            types = ["A", "AAAA"]
            flags = "DNS | NO_CNAME"

            [[scopes]]
            protocol = "dns"
            search_domains = ["corp.example"]

            [[scopes]]
            protocol = "mdns"
            family = "inet6"
            ifindex = 2

            [server]
            provenance = "AUTHENTICATED | FROM_ZONE"
            failure_rcode = "REFUSED"
            failing = ["bad.example"]
            records = ["printer.corp.example 60 IN A 192.0.2.1"]
            "#,
        )
        .unwrap();
        assert_eq!(scenario.limits.max_cname_redirects, 4);
        assert_eq!(scenario.question.flags.0, QueryFlags::DNS | QueryFlags::NO_CNAME);
        assert_eq!(scenario.scopes[1].protocol.0, Protocol::Mdns);
        assert_eq!(scenario.scopes[1].family.as_ref().unwrap().0, Family::Inet6);
        assert_eq!(scenario.server.failure_rcode.0, Rcode::Refused);
        assert_eq!(scenario.server.records[0].0.rr_type(), Type::A);
        assert!(scenario.server.provenance.0.is_authoritative());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<Scenario, _> = toml::from_str(
            r#"
            [question]
            name = "www.example.com"
            colour = "blue"
            "#,
        );
        assert!(result.is_err());
    }
}
