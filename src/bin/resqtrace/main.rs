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

//! `resqtrace` runs a query against a scripted set of scopes and
//! records and traces each step of its resolution.

mod args;
mod run;
mod scenario;
mod transport;

use args::Command;

fn main() {
    match args::parse().command {
        Command::Trace(trace_args) => run::run(trace_args),
    }
}
