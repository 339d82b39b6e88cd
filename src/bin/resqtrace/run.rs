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

//! Implements the `trace` command.

use std::fmt::Write;
use std::process;

use anyhow::{Context, Result};
use env_logger::Env;
use log::{error, info};

use resquery::flags::QueryFlags;
use resquery::manager::Manager;
use resquery::message::Packet;
use resquery::query::{Completion, Query};
use resquery::question::Question;
use resquery::rr::ResourceKey;
use resquery::scope::{Payload, TransactionOutcome};

use crate::args::TraceArgs;
use crate::scenario;
use crate::transport::ScenarioTransport;

/// Traces a scenario.
pub fn run(args: TraceArgs) {
    env_logger::init_from_env(Env::new().default_filter_or("warn"));

    if let Err(e) = try_tracing(args) {
        let mut message = String::from("Failed to trace:");
        for (i, cause) in e.chain().enumerate() {
            write!(message, "\n[{}] {}", i + 1, cause).unwrap();
        }
        message.push_str("\nExiting with failure.");
        error!("{}", message);
        process::exit(1);
    }
}

fn try_tracing(args: TraceArgs) -> Result<()> {
    info!("Loading the scenario from {}.", args.scenario.display());
    let mut scenario =
        scenario::load_from_path(&args.scenario).context("failed to load the scenario")?;
    if let Some(max_cname_redirects) = args.max_cname_redirects {
        scenario.limits.max_cname_redirects = max_cname_redirects;
    }
    let mut flags = scenario.question.flags.0;
    if args.no_cname {
        flags |= QueryFlags::NO_CNAME;
    }

    // The command line question, if any, replaces the scenario's.
    let (name, types) = match args.ask {
        Some(description) => (description.name, description.types),
        None => (
            scenario.question.name.0.clone(),
            scenario.question.types.iter().map(|t| t.0).collect(),
        ),
    };
    let class = scenario.question.class.0;
    let literal: Question = types
        .into_iter()
        .map(|rr_type| ResourceKey::new(class, rr_type, name.clone()))
        .collect();

    let manager = Manager::new(scenario.limits);
    let ifindex = scenario.question.ifindex;
    let query = if scenario.question.bypass {
        let ascii = literal.to_ascii().context("failed to convert the question to ASCII")?;
        let packet = Packet::new_query(&ascii).context("failed to build the query message")?;
        Query::new_bypass(&manager, packet, ifindex, flags)
    } else if scenario.question.idna {
        let ascii = literal.to_ascii().context("failed to convert the question to ASCII")?;
        Query::new(&manager, Some(literal), Some(ascii), None, ifindex, flags)
    } else {
        Query::new(&manager, Some(literal), None, None, ifindex, flags)
    };
    let mut query = query.context("failed to create the query")?;
    let mut transport = ScenarioTransport::new(&scenario.scopes, scenario.server);

    println!("query {}: {}", query.id(), query.collected_questions());
    if !query.go(&mut transport).context("failed to start the query")? {
        println!("  no transaction could be started");
    }
    while let Some((id, request)) = transport.next_transaction() {
        let outcome = transport.respond(&request);
        println!(
            "  {} on scope {}: {} => {}",
            id,
            request.scope.0,
            describe_payload(&request.payload),
            describe_outcome(&outcome),
        );
        if query.complete_transaction(&mut transport, id, outcome) == Completion::Restarted {
            println!(
                "  redirect #{}, now asking {}",
                query.n_cname_redirects(),
                query
                    .question_idna()
                    .or_else(|| query.question_utf8())
                    .map_or_else(String::new, ToString::to_string),
            );
        }
    }

    print_result(&query);
    Ok(())
}

fn describe_payload(payload: &Payload) -> String {
    match payload {
        Payload::Question(question) => question.to_string(),
        Payload::Packet(packet) => format!("bypass packet {} {}", packet.id(), packet.question()),
    }
}

fn describe_outcome(outcome: &TransactionOutcome) -> String {
    format!(
        "{:?} {}, {} record(s) via {}",
        outcome.state,
        outcome.rcode,
        outcome.answer.len(),
        outcome.protocol,
    )
}

fn print_result(query: &Query) {
    println!("state:       {}", query.state());
    println!("rcode:       {}", query.answer_rcode());
    if let Some(protocol) = query.answer_protocol() {
        println!("protocol:    {}", protocol);
    }
    if let Some(search_domain) = query.answer_search_domain() {
        println!("search:      {}", search_domain);
    }
    println!("redirects:   {}", query.n_cname_redirects());
    if let Some(err) = query.chase_error() {
        println!("chase error: {}", err);
    }
    println!("asked:       {}", query.collected_questions());
    println!(
        "provenance:  authenticated={} confidential={} authoritative={}",
        query.fully_authenticated(),
        query.fully_confidential(),
        query.fully_authoritative(),
    );
    for item in query.answer() {
        println!("  {}", item.rr);
    }
}
