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

//! Role definitions
//!
//! A role is an immutable, named bundle of operations. Roles may be built on
//! top of other roles; the full member table, including everything inherited
//! from supertypes, is computed once when the role is declared so conflict
//! checks never have to walk the chain again.

use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::composite::{ComponentId, next_component_id};
use crate::error::DciResult;
use crate::model::member::{Member, MemberTable, Operation, is_structural, merge_missing};
use crate::model::{Subject, Value};

/// A declared role
#[derive(Clone)]
pub struct Role {
    inner: Arc<RoleInner>,
}

struct RoleInner {
    id: u64,
    name: Arc<str>,
    supertypes: Vec<Role>,
    members: MemberTable,
    doc: Option<Arc<str>>,
}

impl Role {
    /// Start declaring a role
    pub fn builder(name: impl Into<String>) -> RoleBuilder {
        RoleBuilder::new(name)
    }

    /// Unique id of this role
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Component id used in composition keys
    pub fn component_id(&self) -> ComponentId {
        ComponentId::Role(self.inner.id)
    }

    /// Role name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Roles this role was built on
    pub fn supertypes(&self) -> &[Role] {
        &self.inner.supertypes
    }

    /// Documentation attached at declaration
    pub fn doc(&self) -> Option<&str> {
        self.inner.doc.as_deref()
    }

    /// Every member the role contributes, own members first
    pub fn members(&self) -> &MemberTable {
        &self.inner.members
    }

    /// Member names that take part in conflict detection
    pub fn member_names(&self) -> BTreeSet<&str> {
        self.inner
            .members
            .keys()
            .map(|name| &**name)
            .filter(|name| !is_structural(name))
            .collect()
    }

    /// Check whether the role contributes `name`
    pub fn declares(&self, name: &str) -> bool {
        self.inner.members.contains_key(name)
    }

    /// Check whether this role is `other` or is built on it
    pub fn is_or_extends(&self, other: &Role) -> bool {
        self == other
            || self
                .inner
                .supertypes
                .iter()
                .any(|parent| parent.is_or_extends(other))
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Role {}

impl std::hash::Hash for Role {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Role")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("members", &self.member_names())
            .finish()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

/// Builder for [`Role`]
pub struct RoleBuilder {
    name: String,
    supertypes: Vec<Role>,
    operations: IndexMap<Arc<str>, Operation>,
    doc: Option<String>,
}

impl RoleBuilder {
    /// Create a builder for a role with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: Vec::new(),
            operations: IndexMap::new(),
            doc: None,
        }
    }

    /// Build this role on top of an already declared role
    pub fn extends(mut self, parent: &Role) -> Self {
        self.supertypes.push(parent.clone());
        self
    }

    /// Declare an operation
    pub fn operation<F>(mut self, name: &str, operation: F) -> Self
    where
        F: Fn(&Subject, &[Value]) -> DciResult<Value> + Send + Sync + 'static,
    {
        self.operations.insert(Arc::from(name), Arc::new(operation));
        self
    }

    /// Attach documentation
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Finish the declaration
    pub fn build(self) -> Role {
        let id = next_component_id();
        let owner = ComponentId::Role(id);
        let name: Arc<str> = Arc::from(self.name);

        let mut members: MemberTable = self
            .operations
            .into_iter()
            .map(|(op_name, op)| (op_name, Member::operation(owner, Arc::clone(&name), op)))
            .collect();
        for parent in &self.supertypes {
            merge_missing(&mut members, parent.members());
        }

        Role {
            inner: Arc::new(RoleInner {
                id,
                name,
                supertypes: self.supertypes,
                members,
                doc: self.doc.map(Arc::from),
            }),
        }
    }
}
