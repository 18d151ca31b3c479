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

//! Role-capable subjects
//!
//! A [`Subject`] is a cheap handle. Cloning the handle does not copy the
//! subject: both handles refer to the same behavioral type slot and the same
//! state block. The cloning strategy instead produces a *twin*, a distinct
//! subject with its own behavioral type slot that shares the state block.

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use super::member::is_structural;
use super::{DataType, Value};
use crate::composite::CompositeDescriptor;
use crate::error::{DciError, DciResult};
use crate::role::Role;

/// Field storage shared between a subject and its twins
pub type SharedState = Arc<RwLock<IndexMap<String, Value>>>;

/// A data object that roles can be assigned to
#[derive(Clone)]
pub struct Subject {
    inner: Arc<SubjectInner>,
}

struct SubjectInner {
    data_type: DataType,
    behavior: RwLock<Arc<CompositeDescriptor>>,
    state: SharedState,
}

impl Subject {
    pub(crate) fn new(data_type: DataType, fields: IndexMap<String, Value>) -> Self {
        let behavior = Arc::clone(data_type.root_behavior());
        Self {
            inner: Arc::new(SubjectInner {
                data_type,
                behavior: RwLock::new(behavior),
                state: Arc::new(RwLock::new(fields)),
            }),
        }
    }

    /// Swap this subject's behavioral type in place
    pub(crate) fn retag(&self, behavior: Arc<CompositeDescriptor>) {
        *self.inner.behavior.write() = behavior;
    }

    /// Create a twin carrying `behavior` and sharing this subject's state
    pub(crate) fn twin(&self, behavior: Arc<CompositeDescriptor>) -> Subject {
        Self {
            inner: Arc::new(SubjectInner {
                data_type: self.inner.data_type.clone(),
                behavior: RwLock::new(behavior),
                state: Arc::clone(&self.inner.state),
            }),
        }
    }

    /// The subject's base type
    pub fn data_type(&self) -> &DataType {
        &self.inner.data_type
    }

    /// Current behavioral type
    pub fn behavior(&self) -> Arc<CompositeDescriptor> {
        self.inner.behavior.read().clone()
    }

    /// Name of the current behavioral type, e.g. `Account+MoneySource`
    pub fn type_name(&self) -> Arc<str> {
        self.inner.behavior.read().name_arc()
    }

    /// Roles currently applied, most recently applied first
    pub fn roles(&self) -> Vec<Role> {
        self.inner.behavior.read().roles().to_vec()
    }

    /// Check whether the subject plays `role` or a role extending it
    pub fn plays(&self, role: &Role) -> bool {
        self.inner.behavior.read().plays(role)
    }

    /// Check whether `name` is reachable on the subject as a member or field
    pub fn responds_to(&self, name: &str) -> bool {
        self.inner.behavior.read().has_member(name) || self.inner.state.read().contains_key(name)
    }

    /// Check whether two handles refer to the same subject
    pub fn ptr_eq(&self, other: &Subject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Check whether two subjects share one state block (same subject or twins)
    pub fn shares_state_with(&self, other: &Subject) -> bool {
        Arc::ptr_eq(&self.inner.state, &other.inner.state)
    }

    /// Read a field
    ///
    /// Structural names are answered by the machinery: `__class__` is the
    /// behavioral type name, `__roles__` the active role names, `__doc__`
    /// the base type's documentation.
    pub fn get(&self, name: &str) -> Option<Value> {
        if is_structural(name) {
            return self.structural(name);
        }
        self.inner.state.read().get(name).cloned()
    }

    /// Write a field, returning the previous value
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inner.state.write().insert(name.into(), value.into())
    }

    /// Remove a per-instance field
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.inner.state.write().shift_remove(name)
    }

    /// Check whether a field is stored on the subject
    pub fn has_field(&self, name: &str) -> bool {
        self.inner.state.read().contains_key(name)
    }

    /// Names of all fields currently stored on the subject
    pub fn field_names(&self) -> Vec<String> {
        self.inner.state.read().keys().cloned().collect()
    }

    /// Snapshot of the subject's fields
    pub fn fields(&self) -> IndexMap<String, Value> {
        self.inner.state.read().clone()
    }

    /// Read an integer field
    pub fn get_integer(&self, name: &str) -> DciResult<i64> {
        match self.get(name) {
            Some(Value::Integer(i)) => Ok(i),
            Some(other) => Err(DciError::invalid_argument(
                name,
                format!("expected Integer, got {}", other.type_name()),
            )),
            None => Err(DciError::invalid_argument(
                name,
                format!("'{}' has no field '{name}'", self.type_name()),
            )),
        }
    }

    /// Invoke an operation by name
    ///
    /// The operation is resolved against the current behavioral type; the
    /// type is not locked while the operation runs, so operations may assign
    /// or revoke roles on their own subject.
    pub fn call(&self, operation: &str, args: &[Value]) -> DciResult<Value> {
        let resolved = {
            let behavior = self.inner.behavior.read();
            behavior.operation(operation).cloned()
        };
        match resolved {
            Some(op) => op(self, args),
            None => Err(DciError::no_such_operation(
                self.type_name().as_ref(),
                operation,
            )),
        }
    }

    fn structural(&self, name: &str) -> Option<Value> {
        let behavior = self.inner.behavior.read();
        match name {
            "__class__" => Some(Value::String(behavior.name().to_string())),
            "__roles__" => Some(Value::Collection(
                behavior
                    .roles()
                    .iter()
                    .map(|role| Value::String(role.name().to_string()))
                    .collect(),
            )),
            "__doc__" => behavior.doc().map(|doc| Value::String(doc.to_string())),
            _ => None,
        }
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subject({})", self.type_name())
    }
}
