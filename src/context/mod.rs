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

//! Interaction contexts
//!
//! An interaction names its collaborators in slots. Entering an interaction
//! pushes it on the caller's context stack and binds roles to the subjects in
//! its slots; role operations then reach collaborators by slot name through
//! [`get`], [`set`] and [`role_player`] instead of taking them as arguments.

pub mod scope;
pub mod stack;

pub use scope::{ContextGuard, enter, enter_with, in_context, with_context};
pub use stack::{current, current_as, depth, isolated};

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{DciError, DciResult};
use crate::model::{Subject, Value};
use crate::role::Role;

/// Conversion of a shared interaction into `Any`, implemented for every
/// sized `Send + Sync` type
pub trait IntoAny: Any + Send + Sync {
    /// Erase the concrete type
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> IntoAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// An object that can be entered as an interaction
///
/// Use [`current_as`] to get the concrete interaction back from the stack.
pub trait Interaction: IntoAny {
    /// Interaction name for diagnostics
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Read a slot
    fn slot(&self, name: &str) -> Option<Value>;

    /// Write a slot
    fn set_slot(&self, name: &str, value: Value) -> DciResult<()>;
}

/// A general-purpose interaction with named slots
pub struct Context {
    name: String,
    slots: RwLock<IndexMap<String, Value>>,
}

impl Context {
    /// Create an interaction without slots
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: RwLock::new(IndexMap::new()),
        }
    }

    /// Add a slot
    pub fn with_slot(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.slots.write().insert(name.into(), value.into());
        self
    }

    /// Slot names in declaration order
    pub fn slot_names(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }
}

impl Interaction for Context {
    fn name(&self) -> &str {
        &self.name
    }

    fn slot(&self, name: &str) -> Option<Value> {
        self.slots.read().get(name).cloned()
    }

    /// Writing an undeclared name adds it as a new slot
    fn set_slot(&self, name: &str, value: Value) -> DciResult<()> {
        self.slots.write().insert(name.to_string(), value);
        Ok(())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("slots", &self.slot_names())
            .finish()
    }
}

/// A role to bind to the subject held in a slot while an interaction is active
#[derive(Debug, Clone)]
pub struct Binding {
    /// Slot holding the subject
    pub slot: String,
    /// Role the subject plays
    pub role: Role,
}

impl Binding {
    /// Create a binding
    pub fn new(slot: impl Into<String>, role: &Role) -> Self {
        Self {
            slot: slot.into(),
            role: role.clone(),
        }
    }
}

/// Read a slot of the current interaction
pub fn get(name: &str) -> DciResult<Value> {
    current()?
        .slot(name)
        .ok_or_else(|| DciError::unknown_slot(name))
}

/// Write a slot of the current interaction
pub fn set(name: &str, value: impl Into<Value>) -> DciResult<()> {
    current()?.set_slot(name, value.into())
}

/// The subject playing in a slot of the current interaction
pub fn role_player(name: &str) -> DciResult<Subject> {
    let value = get(name)?;
    let actual = value.type_name();
    value
        .into_subject()
        .ok_or_else(|| DciError::slot_not_subject(name, actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::CompositeDescriptor;
    use crate::engine::{ApplyStrategy, EngineConfig, InPlace, RoleEngine};
    use parking_lot::Mutex;
    use crate::model::DataType;

    fn noop(_: &Subject, _: &[Value]) -> DciResult<Value> {
        Ok(Value::Empty)
    }

    #[test]
    fn forwarding_reads_and_writes_current_slots() {
        let ctx = Arc::new(Context::new("Counter").with_slot("count", 1));
        assert_eq!(get("count"), Err(DciError::NoActiveContext));

        let guard = enter(Arc::clone(&ctx), &[]).unwrap();
        assert_eq!(get("count"), Ok(Value::Integer(1)));
        set("count", 2).unwrap();
        assert_eq!(ctx.slot("count"), Some(Value::Integer(2)));
        assert_eq!(get("missing"), Err(DciError::unknown_slot("missing")));
        assert_eq!(
            role_player("count").unwrap_err(),
            DciError::slot_not_subject("count", "Integer")
        );
        guard.exit().unwrap();
        assert_eq!(depth(), 0);
    }

    #[test]
    fn bindings_are_applied_and_reverted() {
        let engine = RoleEngine::new(EngineConfig::isolated());
        let account = DataType::builder("Account").field("balance", 0).build();
        let auditor = Role::builder("Auditor").operation("audit", noop).build();
        let subject = account.instantiate([("balance", 3)]);
        let ctx = Arc::new(Context::new("Audit").with_slot("target", subject.clone()));

        let guard = enter_with(&engine, ctx, &[Binding::new("target", &auditor)]).unwrap();
        assert!(subject.plays(&auditor));
        assert!(role_player("target").unwrap().ptr_eq(&subject));
        guard.exit().unwrap();
        assert!(!subject.plays(&auditor));
    }

    #[test]
    fn frame_is_current_while_bindings_apply() {
        #[derive(Debug, Default)]
        struct Observing(Mutex<Vec<DciResult<String>>>);

        impl ApplyStrategy for Observing {
            fn name(&self) -> &'static str {
                "observing"
            }

            fn apply(
                &self,
                behavior: Arc<CompositeDescriptor>,
                subject: &Subject,
            ) -> DciResult<Subject> {
                self.0.lock().push(current().map(|c| c.name().to_string()));
                InPlace.apply(behavior, subject)
            }
        }

        let strategy = Arc::new(Observing::default());
        let engine = RoleEngine::new(EngineConfig::isolated()).with_strategy(strategy.clone());
        let account = DataType::builder("Account").field("balance", 0).build();
        let auditor = Role::builder("Auditor").operation("audit", noop).build();
        let subject = account.instantiate([("balance", 3)]);
        let ctx = Arc::new(Context::new("Audit").with_slot("target", subject));

        let guard = enter_with(&engine, ctx, &[Binding::new("target", &auditor)]).unwrap();
        assert_eq!(strategy.0.lock().first(), Some(&Ok("Audit".to_string())));
        guard.exit().unwrap();
        assert_eq!(depth(), 0);
    }

    #[test]
    fn clone_strategy_rewrites_slot_for_the_scope() {
        let engine = RoleEngine::new(EngineConfig::cloning());
        let account = DataType::builder("Account").field("balance", 0).build();
        let auditor = Role::builder("Auditor").operation("audit", noop).build();
        let subject = account.instantiate([("balance", 3)]);
        let ctx = Arc::new(Context::new("Audit").with_slot("target", subject.clone()));

        let guard =
            enter_with(&engine, Arc::clone(&ctx), &[Binding::new("target", &auditor)]).unwrap();
        let player = role_player("target").unwrap();
        assert!(!player.ptr_eq(&subject));
        assert!(player.plays(&auditor));
        assert!(!subject.plays(&auditor));
        drop(guard);

        let restored = ctx.slot("target").and_then(Value::into_subject).unwrap();
        assert!(restored.ptr_eq(&subject));
    }

    #[test]
    fn bad_bindings_push_nothing() {
        let engine = RoleEngine::new(EngineConfig::isolated());
        let account = DataType::builder("Account").build();
        let auditor = Role::builder("Auditor").operation("audit", noop).build();
        let subject = account.instantiate(Vec::<(String, Value)>::new());
        let ctx = Arc::new(
            Context::new("Audit")
                .with_slot("target", subject.clone())
                .with_slot("amount", 5),
        );

        let err = enter_with(
            &engine,
            Arc::clone(&ctx),
            &[
                Binding::new("target", &auditor),
                Binding::new("amount", &auditor),
            ],
        )
        .unwrap_err();
        assert_eq!(err, DciError::slot_not_subject("amount", "Integer"));
        assert!(!subject.plays(&auditor));
        assert_eq!(depth(), 0);

        let err = enter_with(&engine, ctx, &[Binding::new("nobody", &auditor)]).unwrap_err();
        assert_eq!(err, DciError::unknown_slot("nobody"));
    }

    #[test]
    fn writes_to_new_names_create_slots() {
        let ctx = Arc::new(Context::new("Test"));
        let value = in_context(&ctx, || {
            set("foo", 1)?;
            get("foo")
        });
        assert_eq!(value, Ok(Value::Integer(1)));
        assert_eq!(ctx.slot_names(), vec!["foo".to_string()]);
        assert_eq!(set("foo", 2), Err(DciError::NoActiveContext));
    }

    #[test]
    fn in_context_scopes_the_receiver() {
        let ctx = Arc::new(Context::new("Method"));
        let name = in_context(&ctx, || current().map(|c| c.name().to_string()));
        assert_eq!(name, Ok("Method".to_string()));
        assert_eq!(depth(), 0);
    }
}
