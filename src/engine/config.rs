// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Engine configuration options

use serde::{Deserialize, Serialize};

use super::strategy::StrategyKind;
use crate::error::{DciError, DciResult};

/// Which composite cache an engine uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    /// The process-wide cache shared by every engine
    #[default]
    Global,
    /// A cache owned by this engine and its clones
    Private,
}

/// Configuration for a [`RoleEngine`](super::RoleEngine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How composite types are applied to subjects
    pub strategy: StrategyKind,

    /// Where composite types are memoized
    pub cache: CacheScope,
}

impl EngineConfig {
    /// Create a new configuration with custom settings
    pub fn new(strategy: StrategyKind, cache: CacheScope) -> Self {
        Self { strategy, cache }
    }

    /// Retag subjects in place, shared cache
    pub fn in_place() -> Self {
        Self::new(StrategyKind::InPlace, CacheScope::Global)
    }

    /// Return role-bearing twins, shared cache
    pub fn cloning() -> Self {
        Self::new(StrategyKind::Clone, CacheScope::Global)
    }

    /// Retag in place with a private cache (useful for testing)
    pub fn isolated() -> Self {
        Self::new(StrategyKind::InPlace, CacheScope::Private)
    }

    /// Read a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> DciResult<Self> {
        serde_json::from_str(json).map_err(|e| DciError::invalid_config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("{}", EngineConfig::in_place())]
    #[case(r#"{"strategy": "clone"}"#, EngineConfig::cloning())]
    #[case(r#"{"cache": "private"}"#, EngineConfig::isolated())]
    #[case(
        r#"{"strategy": "clone", "cache": "private"}"#,
        EngineConfig::new(StrategyKind::Clone, CacheScope::Private)
    )]
    fn parses_json(#[case] json: &str, #[case] expected: EngineConfig) {
        assert_eq!(EngineConfig::from_json(json).unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_strategy() {
        let err = EngineConfig::from_json(r#"{"strategy": "proxy"}"#).unwrap_err();
        assert!(matches!(err, DciError::InvalidConfig { .. }));
    }

    #[test]
    fn default_is_in_place_global() {
        assert_eq!(EngineConfig::default(), EngineConfig::in_place());
    }
}
