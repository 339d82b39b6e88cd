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

//! Resource limits of the query engine.

#[cfg(feature = "serde")]
use serde::Deserialize;

/// Limits applied by a [`Manager`](crate::manager::Manager) and the
/// queries it registers.
///
/// With the `serde` feature, a `Config` can be deserialized; missing
/// fields take their default values and unknown fields are rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct Config {
    /// The maximum number of simultaneously live queries.
    #[cfg_attr(feature = "serde", serde(default = "default_max_queries"))]
    pub max_queries: usize,

    /// The maximum number of CNAME/DNAME redirects followed by one
    /// query before it fails.
    #[cfg_attr(feature = "serde", serde(default = "default_max_cname_redirects"))]
    pub max_cname_redirects: usize,

    /// The maximum number of auxiliary queries attached to a primary.
    #[cfg_attr(feature = "serde", serde(default = "default_max_auxiliary_queries"))]
    pub max_auxiliary_queries: usize,
}

pub const DEFAULT_MAX_QUERIES: usize = 2048;
pub const DEFAULT_MAX_CNAME_REDIRECTS: usize = 16;
pub const DEFAULT_MAX_AUXILIARY_QUERIES: usize = 64;

#[cfg(feature = "serde")]
fn default_max_queries() -> usize {
    DEFAULT_MAX_QUERIES
}

#[cfg(feature = "serde")]
fn default_max_cname_redirects() -> usize {
    DEFAULT_MAX_CNAME_REDIRECTS
}

#[cfg(feature = "serde")]
fn default_max_auxiliary_queries() -> usize {
    DEFAULT_MAX_AUXILIARY_QUERIES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_queries: DEFAULT_MAX_QUERIES,
            max_cname_redirects: DEFAULT_MAX_CNAME_REDIRECTS,
            max_auxiliary_queries: DEFAULT_MAX_AUXILIARY_QUERIES,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.max_queries, 2048);
        assert_eq!(config.max_cname_redirects, 16);
        assert_eq!(config.max_auxiliary_queries, 64);
    }

    #[cfg(feature = "binary")]
    #[test]
    fn deserializes_with_defaults() {
        let config: Config = toml::from_str("max_cname_redirects = 8").unwrap();
        assert_eq!(config.max_cname_redirects, 8);
        assert_eq!(config.max_queries, DEFAULT_MAX_QUERIES);
        assert!(toml::from_str::<Config>("max_hops = 8").is_err());
    }
}
