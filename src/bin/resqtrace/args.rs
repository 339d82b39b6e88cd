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

//! Implements command-line argument parsing.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::anyhow;
use clap::{Parser, Subcommand};

use resquery::name::Name;
use resquery::rr::Type;

/// Parses the command line arguments.
pub fn parse() -> Args {
    Args::parse()
}

/// Traces DNS query resolution through a scripted scenario
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a scenario and trace each step of the query
    Trace(TraceArgs),
}

#[derive(Debug, Parser)]
pub struct TraceArgs {
    /// The scenario file to run
    #[clap(value_name = "FILE")]
    pub scenario: PathBuf,

    /// Ask this question instead of the scenario's
    #[clap(long, value_name = "NAME[/TYPE,...]")]
    pub ask: Option<QuestionDescription>,

    /// Fail instead of following CNAME/DNAME redirects
    #[clap(long)]
    pub no_cname: bool,

    /// Set the maximum number of redirects to follow
    #[clap(long, value_name = "N")]
    pub max_cname_redirects: Option<usize>,
}

/// A question provided on the command line with the `--ask` option.
/// This is parsed with its [`FromStr`] implementation and accepts a
/// name, optionally followed by a slash and a comma-separated list of
/// types (`A` if none are given):
///
/// * `www.example.com`
/// * `www.example.com/A,AAAA`
#[derive(Clone, Debug)]
pub struct QuestionDescription {
    pub name: Name,
    pub types: Vec<Type>,
}

impl FromStr for QuestionDescription {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, types) = match s.rsplit_once('/') {
            Some((name, types)) => (name, Some(types)),
            None => (s, None),
        };
        let name = name
            .parse()
            .map_err(|e| anyhow!("invalid question name: {}", e))?;
        let types = match types {
            Some(types) => types
                .split(',')
                .map(|t| t.parse().map_err(|e| anyhow!("invalid question type: {}", e)))
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![Type::A],
        };
        Ok(Self { name, types })
    }
}
