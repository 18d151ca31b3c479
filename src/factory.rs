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

//! Role factory
//!
//! Dispatches a generic role to a concrete sub-role chosen by the subject's
//! data type. Lookups walk the type's lineage from most to least specific and
//! take the first registered mapping. A generic role becomes *strict* once a
//! mapping names the generic role itself as the implementation; strict roles
//! fail for unmapped types instead of falling back to the generic role.

use dashmap::DashMap;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::engine::{RoleEngine, RoleGuard, default_engine};
use crate::error::{DciError, DciResult};
use crate::model::{DataType, Subject};
use crate::role::Role;

struct FactoryEntry {
    role: Role,
    /// Data type id to concrete role, in registration order
    mappings: IndexMap<u64, Role>,
    strict: bool,
}

/// Registry of concrete role implementations per data type
pub struct RoleFactory {
    engine: RoleEngine,
    registry: RwLock<FxHashMap<u64, FactoryEntry>>,
    /// (generic role id, data type id) to resolved role
    lookups: DashMap<(u64, u64), Role>,
}

impl Default for RoleFactory {
    fn default() -> Self {
        Self::new(default_engine().clone())
    }
}

impl RoleFactory {
    /// Create a factory that assigns through `engine`
    pub fn new(engine: RoleEngine) -> Self {
        Self {
            engine,
            registry: RwLock::new(FxHashMap::default()),
            lookups: DashMap::new(),
        }
    }

    /// The engine roles are assigned through
    pub fn engine(&self) -> &RoleEngine {
        &self.engine
    }

    /// Use `concrete` whenever `role` is requested for a subject of `data_type`
    /// or one of its descendants
    ///
    /// `concrete` must be `role` itself or extend it. Registering `role` as its
    /// own implementation marks it strict.
    pub fn register(&self, role: &Role, data_type: &DataType, concrete: &Role) -> DciResult<()> {
        if !concrete.is_or_extends(role) {
            return Err(DciError::not_a_subrole(role.name(), concrete.name()));
        }

        let mut registry = self.registry.write();
        let entry = registry.entry(role.id()).or_insert_with(|| FactoryEntry {
            role: role.clone(),
            mappings: IndexMap::new(),
            strict: false,
        });
        entry.mappings.insert(data_type.id(), concrete.clone());
        entry.strict |= concrete == role;

        // Still under the write lock: no lookup can repopulate a stale entry
        self.lookups.retain(|(role_id, _), _| *role_id != role.id());

        log::debug!(
            "registered role '{}' for '{}' as '{}'{}",
            role.name(),
            data_type.name(),
            concrete.name(),
            if entry.strict { " (strict)" } else { "" }
        );
        Ok(())
    }

    /// Check whether `role` is strict
    pub fn is_strict(&self, role: &Role) -> bool {
        self.registry
            .read()
            .get(&role.id())
            .is_some_and(|entry| entry.strict)
    }

    /// Resolve the role to apply for a subject of `data_type`
    pub fn lookup(&self, role: &Role, data_type: &DataType) -> DciResult<Role> {
        let key = (role.id(), data_type.id());
        if let Some(hit) = self.lookups.get(&key) {
            return Ok(hit.clone());
        }

        let registry = self.registry.read();
        let Some(entry) = registry.get(&role.id()) else {
            return Ok(role.clone());
        };

        let found = data_type
            .lineage()
            .iter()
            .find_map(|type_id| entry.mappings.get(type_id));
        let resolved = match found {
            Some(concrete) => concrete.clone(),
            None if entry.strict => {
                return Err(DciError::no_role_for_subject(
                    entry.role.name(),
                    data_type.name(),
                ));
            }
            None => role.clone(),
        };

        self.lookups.insert(key, resolved.clone());
        Ok(resolved)
    }

    /// Assign the role registered for the subject's type
    pub fn assign(&self, role: &Role, subject: &Subject) -> DciResult<Subject> {
        let concrete = self.lookup(role, subject.data_type())?;
        self.engine.assign(&concrete, subject)
    }

    /// Revoke the role registered for the subject's type
    pub fn revoke(&self, role: &Role, subject: &Subject) -> DciResult<Subject> {
        let concrete = self.lookup(role, subject.data_type())?;
        self.engine.revoke(&concrete, subject)
    }

    /// Play the role registered for the subject's type for the lifetime of
    /// the returned guard
    pub fn played_by(&self, role: &Role, subject: &Subject) -> DciResult<RoleGuard> {
        let concrete = self.lookup(role, subject.data_type())?;
        self.engine.played_by(&concrete, subject)
    }
}

static GLOBAL_FACTORY: Lazy<RoleFactory> = Lazy::new(RoleFactory::default);

/// Process-wide role factory backed by the default engine
pub fn global_factory() -> &'static RoleFactory {
    &GLOBAL_FACTORY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;

    fn factory() -> RoleFactory {
        RoleFactory::new(RoleEngine::new(EngineConfig::isolated()))
    }

    #[test]
    fn unregistered_role_resolves_to_itself() {
        let factory = factory();
        let role = Role::builder("Generic").build();
        let a = DataType::builder("A").build();
        assert_eq!(factory.lookup(&role, &a).unwrap(), role);
        assert!(!factory.is_strict(&role));
    }

    #[test]
    fn register_rejects_unrelated_role() {
        let factory = factory();
        let role = Role::builder("Generic").build();
        let other = Role::builder("Other").build();
        let a = DataType::builder("A").build();

        let err = factory.register(&role, &a, &other).unwrap_err();
        assert_eq!(err, DciError::not_a_subrole("Generic", "Other"));
    }

    #[test]
    fn registration_invalidates_cached_lookups() {
        let factory = factory();
        let role = Role::builder("Generic").build();
        let concrete = Role::builder("Concrete").extends(&role).build();
        let a = DataType::builder("A").build();

        assert_eq!(factory.lookup(&role, &a).unwrap(), role);
        factory.register(&role, &a, &concrete).unwrap();
        assert_eq!(factory.lookup(&role, &a).unwrap(), concrete);
    }
}
