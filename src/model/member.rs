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

//! Member tables shared by data types, roles and composite descriptors

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use super::{Subject, Value};
use crate::composite::ComponentId;
use crate::error::DciResult;

/// An operation callable on a subject: receives the subject it was invoked on
/// and the call arguments
pub type Operation = Arc<dyn Fn(&Subject, &[Value]) -> DciResult<Value> + Send + Sync>;

/// Names owned by the composition machinery itself. They are never user data
/// and never take part in conflict detection.
pub const STRUCTURAL_MEMBERS: &[&str] = &[
    "__class__",
    "__dict__",
    "__doc__",
    "__module__",
    "__roles__",
    "__weakref__",
];

/// Check whether a member name belongs to the machinery
pub fn is_structural(name: &str) -> bool {
    STRUCTURAL_MEMBERS.contains(&name)
}

/// What a member contributes
#[derive(Clone)]
pub enum MemberKind {
    /// A declared data field
    Field,
    /// A callable operation
    Operation(Operation),
}

/// A named member together with the component that declared it
#[derive(Clone)]
pub struct Member {
    owner: ComponentId,
    owner_name: Arc<str>,
    kind: MemberKind,
}

impl Member {
    /// Create a field member
    pub fn field(owner: ComponentId, owner_name: Arc<str>) -> Self {
        Self {
            owner,
            owner_name,
            kind: MemberKind::Field,
        }
    }

    /// Create an operation member
    pub fn operation(owner: ComponentId, owner_name: Arc<str>, operation: Operation) -> Self {
        Self {
            owner,
            owner_name,
            kind: MemberKind::Operation(operation),
        }
    }

    /// Component that declared this member
    pub fn owner(&self) -> ComponentId {
        self.owner
    }

    /// Name of the declaring component
    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    /// Member kind
    pub fn kind(&self) -> &MemberKind {
        &self.kind
    }

    /// The operation, if this member is callable
    pub fn as_operation(&self) -> Option<&Operation> {
        match &self.kind {
            MemberKind::Operation(op) => Some(op),
            MemberKind::Field => None,
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            MemberKind::Field => "field",
            MemberKind::Operation(_) => "operation",
        };
        f.debug_struct("Member")
            .field("owner", &self.owner_name)
            .field("kind", &kind)
            .finish()
    }
}

/// Member name to member, in resolution order
pub type MemberTable = IndexMap<Arc<str>, Member>;

/// Merge `other` into `table`; names already present keep their entry
pub(crate) fn merge_missing(table: &mut MemberTable, other: &MemberTable) {
    for (name, member) in other {
        table
            .entry(Arc::clone(name))
            .or_insert_with(|| member.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_names_are_fixed() {
        assert!(is_structural("__doc__"));
        assert!(is_structural("__roles__"));
        assert!(!is_structural("balance"));
        assert!(!is_structural("__balance"));
    }

    #[test]
    fn merge_keeps_existing_entries() {
        let first = ComponentId::Data(1);
        let second = ComponentId::Role(2);
        let mut table = MemberTable::new();
        table.insert(Arc::from("a"), Member::field(first, Arc::from("A")));

        let mut other = MemberTable::new();
        other.insert(Arc::from("a"), Member::field(second, Arc::from("R")));
        other.insert(Arc::from("b"), Member::field(second, Arc::from("R")));

        merge_missing(&mut table, &other);
        assert_eq!(table["a"].owner(), first);
        assert_eq!(table["b"].owner(), second);
        assert_eq!(table.keys().map(|k| &**k).collect::<Vec<_>>(), ["a", "b"]);
    }
}
