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

//! Role composition engine
//!
//! The engine assigns and revokes roles. Each change computes the subject's
//! next role list, resolves the composite descriptor for it through the cache
//! and hands the descriptor to the configured [`ApplyStrategy`].

pub mod config;
pub mod scope;
pub mod strategy;

pub use config::{CacheScope, EngineConfig};
pub use scope::{RoleGuard, RolesGuard, settle};
pub use strategy::{ApplyStrategy, CloneShared, InPlace, StrategyKind};

use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

use crate::cache::{CompositeCache, global_cache};
use crate::composite::{CompositeDescriptor, composite_name, composition_key};
use crate::error::{DciError, DciResult};
use crate::model::{DataType, Layout, Subject};
use crate::role::{Role, conflict};

#[derive(Clone)]
enum CacheHandle {
    Global,
    Private(Arc<CompositeCache>),
}

/// Assigns and revokes roles
///
/// Cloning an engine is cheap; clones share the strategy and the cache.
#[derive(Clone)]
pub struct RoleEngine {
    cache: CacheHandle,
    strategy: Arc<dyn ApplyStrategy>,
}

impl Default for RoleEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl RoleEngine {
    /// Create an engine from a configuration
    pub fn new(config: EngineConfig) -> Self {
        let cache = match config.cache {
            CacheScope::Global => CacheHandle::Global,
            CacheScope::Private => CacheHandle::Private(Arc::new(CompositeCache::new())),
        };
        Self {
            cache,
            strategy: config.strategy.build(),
        }
    }

    /// Replace the apply strategy
    pub fn with_strategy(mut self, strategy: Arc<dyn ApplyStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// The apply strategy in use
    pub fn strategy(&self) -> &Arc<dyn ApplyStrategy> {
        &self.strategy
    }

    /// The composite cache in use
    pub fn cache(&self) -> &CompositeCache {
        match &self.cache {
            CacheHandle::Global => global_cache(),
            CacheHandle::Private(cache) => cache.as_ref(),
        }
    }

    /// Assign `role` to `subject`
    ///
    /// Returns the subject unchanged if it already plays the role. Fails with
    /// [`DciError::RoleConflict`] if any role member would shadow a member or
    /// field of the subject, and with [`DciError::IncompatibleSubject`] for
    /// fixed-layout subjects; nothing is applied in either case.
    pub fn assign(&self, role: &Role, subject: &Subject) -> DciResult<Subject> {
        if subject.plays(role) {
            log::trace!(
                "'{}' already plays '{}', assignment skipped",
                subject.type_name(),
                role.name()
            );
            return Ok(subject.clone());
        }

        conflict::check(role, subject)?;

        let data_type = subject.data_type();
        let mut roles = vec![role.clone()];
        roles.extend(subject.roles());

        if data_type.layout() == Layout::Fixed {
            return Err(DciError::incompatible_subject(
                composite_name(data_type.name(), &roles),
                data_type.name(),
            ));
        }

        let behavior = self.resolve(data_type, roles);
        log::trace!(
            "assign '{}' -> '{}' ({})",
            role.name(),
            behavior.name(),
            self.strategy.name()
        );
        self.strategy.apply(behavior, subject)
    }

    /// Revoke `role` from `subject`
    ///
    /// The role may sit anywhere in the subject's role list. Revoking a role
    /// that is not active, including one only reachable through an active
    /// sub-role, returns the subject unchanged.
    pub fn revoke(&self, role: &Role, subject: &Subject) -> DciResult<Subject> {
        let current = subject.roles();
        if !current.contains(role) {
            return Ok(subject.clone());
        }

        let remaining: Vec<Role> = current.into_iter().filter(|r| r != role).collect();
        let behavior = self.resolve(subject.data_type(), remaining);
        log::trace!(
            "revoke '{}' -> '{}' ({})",
            role.name(),
            behavior.name(),
            self.strategy.name()
        );
        self.strategy.apply(behavior, subject)
    }

    /// Play `role` for the lifetime of the returned guard
    pub fn played_by(&self, role: &Role, subject: &Subject) -> DciResult<RoleGuard> {
        if subject.plays(role) {
            return Ok(RoleGuard::new(self.clone(), subject.clone(), None));
        }
        let player = self.assign(role, subject)?;
        Ok(RoleGuard::new(self.clone(), player, Some(role.clone())))
    }

    /// Run `body` while `subject` plays `role`
    ///
    /// The role is revoked before returning, whether or not `body` failed.
    pub fn with_role<R, F>(&self, role: &Role, subject: &Subject, body: F) -> DciResult<R>
    where
        F: FnOnce(&Subject) -> DciResult<R>,
    {
        let guard = self.played_by(role, subject)?;
        let outcome = body(guard.subject());
        settle(outcome, guard.release().map(|_| ()))
    }

    /// Play several roles for the lifetime of the returned guard
    pub fn play_all(&self, pairs: &[(Role, Subject)]) -> DciResult<RolesGuard> {
        RolesGuard::acquire(self.clone(), pairs)
    }

    /// Run `body` with each subject playing its role; `body` receives the
    /// players in the order the pairs were given
    pub fn with_roles<R, F>(&self, pairs: &[(Role, Subject)], body: F) -> DciResult<R>
    where
        F: FnOnce(&[Subject]) -> DciResult<R>,
    {
        let guard = self.play_all(pairs)?;
        let outcome = body(guard.players());
        settle(outcome, guard.release())
    }

    /// Descriptor for `roles` (most recent first) on `base`; the root bypasses the cache
    fn resolve(&self, base: &DataType, roles: Vec<Role>) -> Arc<CompositeDescriptor> {
        if roles.is_empty() {
            return Arc::clone(base.root_behavior());
        }
        let key = composition_key(base, &roles);
        self.cache()
            .get_or_create(key, || CompositeDescriptor::compose(base, roles))
    }
}

impl fmt::Debug for RoleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = match self.cache {
            CacheHandle::Global => CacheScope::Global,
            CacheHandle::Private(_) => CacheScope::Private,
        };
        f.debug_struct("RoleEngine")
            .field("strategy", &self.strategy.name())
            .field("cache", &cache)
            .finish()
    }
}

static DEFAULT_ENGINE: Lazy<RoleEngine> = Lazy::new(RoleEngine::default);

/// Process-wide engine: in-place strategy, global cache
pub fn default_engine() -> &'static RoleEngine {
    &DEFAULT_ENGINE
}

/// Assign `role` to `subject` with the default engine
pub fn assign(role: &Role, subject: &Subject) -> DciResult<Subject> {
    DEFAULT_ENGINE.assign(role, subject)
}

/// Revoke `role` from `subject` with the default engine
pub fn revoke(role: &Role, subject: &Subject) -> DciResult<Subject> {
    DEFAULT_ENGINE.revoke(role, subject)
}

/// Play `role` for the lifetime of the returned guard, with the default engine
pub fn played_by(role: &Role, subject: &Subject) -> DciResult<RoleGuard> {
    DEFAULT_ENGINE.played_by(role, subject)
}
