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

//! Composite behavioral types
//!
//! A [`CompositeDescriptor`] is the operation set a subject exposes: its base
//! type plus zero or more active roles. Descriptors are immutable once built.
//! Identity is the ordered component list ([`CompositionKey`]), never the
//! diagnostic name, so two distinct orderings that happen to print the same
//! are still different types.

use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::member::{Member, MemberTable, Operation, merge_missing};
use crate::model::DataType;
use crate::role::Role;

static NEXT_COMPONENT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique id for a data type or role
pub(crate) fn next_component_id() -> u64 {
    NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Identity of one component of a composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentId {
    /// A subject's base type
    Data(u64),
    /// A role definition
    Role(u64),
}

/// Ordered component identities: roles most recent first, base type last
pub type CompositionKey = SmallVec<[ComponentId; 4]>;

/// Build the cache key for `roles` (most recent first) composed onto `base`
pub fn composition_key(base: &DataType, roles: &[Role]) -> CompositionKey {
    roles
        .iter()
        .map(Role::component_id)
        .chain(std::iter::once(base.component_id()))
        .collect()
}

/// Diagnostic name: base type first, then roles in application order
pub fn composite_name(base: &str, roles: &[Role]) -> String {
    let mut name = String::from(base);
    for role in roles.iter().rev() {
        name.push('+');
        name.push_str(role.name());
    }
    name
}

/// A synthesized behavioral type
pub struct CompositeDescriptor {
    key: CompositionKey,
    base: u64,
    name: Arc<str>,
    /// Most recently applied first
    roles: Vec<Role>,
    members: MemberTable,
    doc: Option<Arc<str>>,
}

impl CompositeDescriptor {
    /// The composite of a base type alone
    pub(crate) fn root(
        base: u64,
        name: Arc<str>,
        members: MemberTable,
        doc: Option<Arc<str>>,
    ) -> Self {
        let mut key = CompositionKey::new();
        key.push(ComponentId::Data(base));
        Self {
            key,
            base,
            name,
            roles: Vec::new(),
            members,
            doc,
        }
    }

    /// Compose `roles` (most recent first) onto `base`
    ///
    /// The member table starts from the base type and adds each role from the
    /// oldest to the newest; a name already present keeps its first entry.
    pub(crate) fn compose(base: &DataType, roles: Vec<Role>) -> Self {
        let mut members = base.members().clone();
        for role in roles.iter().rev() {
            merge_missing(&mut members, role.members());
        }
        Self {
            key: composition_key(base, &roles),
            base: base.id(),
            name: Arc::from(composite_name(base.name(), &roles)),
            roles,
            members,
            doc: base.doc().map(Arc::from),
        }
    }

    /// Component list this descriptor was built from
    pub fn key(&self) -> &CompositionKey {
        &self.key
    }

    /// Id of the base data type
    pub fn base_id(&self) -> u64 {
        self.base
    }

    /// Diagnostic name, e.g. `Account+MoneySource`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Active roles, most recently applied first
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// True for the base type with no roles applied
    pub fn is_root(&self) -> bool {
        self.roles.is_empty()
    }

    /// Check whether `role` or a role extending it is active
    pub fn plays(&self, role: &Role) -> bool {
        self.roles.iter().any(|active| active.is_or_extends(role))
    }

    /// Check whether exactly `role` is active
    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    /// Flattened member table
    pub fn members(&self) -> &MemberTable {
        &self.members
    }

    /// Look up a visible member
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    /// Check whether a member named `name` is visible
    pub fn has_member(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Resolve a callable operation
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.members.get(name).and_then(Member::as_operation)
    }

    /// Base type documentation
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

impl fmt::Debug for CompositeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeDescriptor")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DciResult;
    use crate::model::{Subject, Value};

    fn noop(_: &Subject, _: &[Value]) -> DciResult<Value> {
        Ok(Value::Empty)
    }

    #[test]
    fn compose_orders_key_and_name() {
        let account = DataType::builder("Account").operation("deposit", noop).build();
        let source = Role::builder("MoneySource").operation("transfer", noop).build();
        let audited = Role::builder("Audited").operation("audit", noop).build();

        // Audited applied after MoneySource
        let desc = CompositeDescriptor::compose(&account, vec![audited.clone(), source.clone()]);
        assert_eq!(desc.name(), "Account+MoneySource+Audited");
        assert_eq!(
            desc.key().as_slice(),
            &[
                audited.component_id(),
                source.component_id(),
                account.component_id()
            ]
        );
        assert_eq!(
            desc.members().keys().map(|k| &**k).collect::<Vec<_>>(),
            ["deposit", "transfer", "audit"]
        );
        assert!(desc.operation("transfer").is_some());
        assert!(!desc.is_root());
    }

    #[test]
    fn root_descriptor_has_only_the_base() {
        let account = DataType::builder("Account").build();
        let root = account.root_behavior();
        assert!(root.is_root());
        assert_eq!(root.key().as_slice(), &[account.component_id()]);
        assert_eq!(root.name(), "Account");
    }

    #[test]
    fn plays_follows_role_extension() {
        let account = DataType::builder("Account").build();
        let generic = Role::builder("Source").build();
        let concrete = Role::builder("CheckingSource").extends(&generic).build();

        let desc = CompositeDescriptor::compose(&account, vec![concrete.clone()]);
        assert!(desc.plays(&generic));
        assert!(desc.has_role(&concrete));
        assert!(!desc.has_role(&generic));
    }

    #[test]
    fn component_ids_are_unique() {
        let first = next_component_id();
        let second = next_component_id();
        assert!(second > first);
    }
}
