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

//! Strategies for applying a composite descriptor to a subject

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use crate::composite::CompositeDescriptor;
use crate::error::DciResult;
use crate::model::Subject;

/// Policy that puts a composite descriptor onto a subject
pub trait ApplyStrategy: Send + Sync + Debug {
    /// Strategy name for diagnostics
    fn name(&self) -> &'static str;

    /// Apply `behavior` to `subject` and return the role-bearing value
    fn apply(&self, behavior: Arc<CompositeDescriptor>, subject: &Subject) -> DciResult<Subject>;
}

/// Swap the subject's own behavioral type; identity is preserved
#[derive(Debug, Default, Clone, Copy)]
pub struct InPlace;

impl ApplyStrategy for InPlace {
    fn name(&self) -> &'static str {
        "in-place"
    }

    fn apply(&self, behavior: Arc<CompositeDescriptor>, subject: &Subject) -> DciResult<Subject> {
        subject.retag(behavior);
        Ok(subject.clone())
    }
}

/// Produce a twin that shares the subject's state; the subject keeps its type
#[derive(Debug, Default, Clone, Copy)]
pub struct CloneShared;

impl ApplyStrategy for CloneShared {
    fn name(&self) -> &'static str {
        "clone"
    }

    fn apply(&self, behavior: Arc<CompositeDescriptor>, subject: &Subject) -> DciResult<Subject> {
        Ok(subject.twin(behavior))
    }
}

/// Built-in strategies, selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// [`InPlace`]
    #[default]
    InPlace,
    /// [`CloneShared`]
    Clone,
}

impl StrategyKind {
    /// Instantiate the strategy
    pub fn build(self) -> Arc<dyn ApplyStrategy> {
        match self {
            Self::InPlace => Arc::new(InPlace),
            Self::Clone => Arc::new(CloneShared),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataType;

    #[test]
    fn in_place_keeps_identity() {
        let account = DataType::builder("Account").build();
        let subject = account.instantiate([("balance", 1)]);
        let behavior = Arc::clone(account.root_behavior());

        let applied = InPlace.apply(behavior, &subject).unwrap();
        assert!(applied.ptr_eq(&subject));
    }

    #[test]
    fn clone_shares_state_only() {
        let account = DataType::builder("Account").build();
        let subject = account.instantiate([("balance", 1)]);
        let behavior = Arc::clone(account.root_behavior());

        let twin = CloneShared.apply(behavior, &subject).unwrap();
        assert!(!twin.ptr_eq(&subject));
        assert!(twin.shares_state_with(&subject));
    }

    #[test]
    fn kind_builds_matching_strategy() {
        assert_eq!(StrategyKind::InPlace.build().name(), "in-place");
        assert_eq!(StrategyKind::Clone.build().name(), "clone");
        assert_eq!(
            serde_json::to_string(&StrategyKind::InPlace).unwrap(),
            "\"in_place\""
        );
    }
}
