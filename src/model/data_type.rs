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

//! Base types for role-capable subjects
//!
//! A [`DataType`] is what a subject *is* before any role is applied: its
//! declared fields with default values, its own operations, the parent types
//! it inherits from, and whether its storage can carry a composite type at
//! all. Each data type owns its root behavioral type, the composite of just
//! itself, which is what a subject returns to once its last role is revoked.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

use super::member::{Member, MemberTable, Operation, merge_missing};
use super::{Subject, Value};
use crate::composite::{ComponentId, CompositeDescriptor, next_component_id};
use crate::error::{DciError, DciResult};

/// Storage layout of a data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Subjects can be retagged or cloned onto composite types
    #[default]
    Extensible,
    /// Subjects are fixed-layout values; role assignment is rejected
    Fixed,
}

/// A subject's base type
#[derive(Clone)]
pub struct DataType {
    inner: Arc<DataTypeInner>,
}

struct DataTypeInner {
    id: u64,
    name: Arc<str>,
    parents: Vec<DataType>,
    /// Self first, then ancestors from most to least specific
    lineage: Vec<u64>,
    fields: IndexMap<Arc<str>, Value>,
    members: MemberTable,
    layout: Layout,
    doc: Option<Arc<str>>,
    root: Arc<CompositeDescriptor>,
}

impl DataType {
    /// Start declaring a new data type
    pub fn builder(name: impl Into<String>) -> DataTypeBuilder {
        DataTypeBuilder::new(name)
    }

    /// Unique id of this type
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Component id used in composition keys
    pub fn component_id(&self) -> ComponentId {
        ComponentId::Data(self.inner.id)
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.inner.name)
    }

    /// Direct parent types
    pub fn parents(&self) -> &[DataType] {
        &self.inner.parents
    }

    /// Ids of this type and all its ancestors, most specific first
    pub fn lineage(&self) -> &[u64] {
        &self.inner.lineage
    }

    /// Check whether this type is `other` or inherits from it
    pub fn is_a(&self, other: &DataType) -> bool {
        self.inner.lineage.contains(&other.inner.id)
    }

    /// Storage layout
    pub fn layout(&self) -> Layout {
        self.inner.layout
    }

    /// Documentation attached at declaration
    pub fn doc(&self) -> Option<&str> {
        self.inner.doc.as_deref()
    }

    /// Fields and operations visible on the type, own members first
    pub fn members(&self) -> &MemberTable {
        &self.inner.members
    }

    /// Declared fields with their default values
    pub fn fields(&self) -> &IndexMap<Arc<str>, Value> {
        &self.inner.fields
    }

    /// The behavioral type of a subject playing no roles
    pub fn root_behavior(&self) -> &Arc<CompositeDescriptor> {
        &self.inner.root
    }

    /// Create a subject; declared defaults are overridden by `fields`, and
    /// undeclared names become per-instance fields
    pub fn instantiate<K, V, I>(&self, fields: I) -> Subject
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut state: IndexMap<String, Value> = self
            .inner
            .fields
            .iter()
            .map(|(name, default)| (name.to_string(), default.clone()))
            .collect();
        for (name, value) in fields {
            state.insert(name.into(), value.into());
        }
        Subject::new(self.clone(), state)
    }

    /// Create a subject from a JSON object
    pub fn instantiate_json(&self, json: JsonValue) -> DciResult<Subject> {
        match json {
            JsonValue::Object(map) => Ok(self.instantiate(map)),
            other => Err(DciError::invalid_argument(
                "instantiate_json",
                format!("expected a JSON object for '{}', got {other}", self.name()),
            )),
        }
    }
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for DataType {}

impl std::hash::Hash for DataType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataType")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("layout", &self.inner.layout)
            .finish()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

/// Builder for [`DataType`]
pub struct DataTypeBuilder {
    name: String,
    parents: Vec<DataType>,
    fields: IndexMap<Arc<str>, Value>,
    operations: IndexMap<Arc<str>, Operation>,
    layout: Layout,
    doc: Option<String>,
}

impl DataTypeBuilder {
    /// Create a builder for a type with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
            fields: IndexMap::new(),
            operations: IndexMap::new(),
            layout: Layout::Extensible,
            doc: None,
        }
    }

    /// Inherit fields and operations from `parent`; earlier parents win
    pub fn extends(mut self, parent: &DataType) -> Self {
        self.parents.push(parent.clone());
        self
    }

    /// Declare a field with its default value
    pub fn field(mut self, name: &str, default: impl Into<Value>) -> Self {
        self.fields.insert(Arc::from(name), default.into());
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

    /// Set the storage layout
    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Attach documentation
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Finish the declaration
    pub fn build(self) -> DataType {
        let id = next_component_id();
        let owner = ComponentId::Data(id);
        let name: Arc<str> = Arc::from(self.name);

        let mut members = MemberTable::new();
        for field in self.fields.keys() {
            members.insert(Arc::clone(field), Member::field(owner, Arc::clone(&name)));
        }
        for (op_name, op) in self.operations {
            members.insert(op_name, Member::operation(owner, Arc::clone(&name), op));
        }

        let mut fields = self.fields;
        let mut lineage = vec![id];
        for parent in &self.parents {
            merge_missing(&mut members, parent.members());
            for (field, default) in parent.fields() {
                fields
                    .entry(Arc::clone(field))
                    .or_insert_with(|| default.clone());
            }
            for ancestor in parent.lineage() {
                if !lineage.contains(ancestor) {
                    lineage.push(*ancestor);
                }
            }
        }

        let doc: Option<Arc<str>> = self.doc.map(Arc::from);
        let root = Arc::new(CompositeDescriptor::root(
            id,
            Arc::clone(&name),
            members.clone(),
            doc.clone(),
        ));

        DataType {
            inner: Arc::new(DataTypeInner {
                id,
                name,
                parents: self.parents,
                lineage,
                fields,
                members,
                layout: self.layout,
                doc,
                root,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop(_: &Subject, _: &[Value]) -> DciResult<Value> {
        Ok(Value::Empty)
    }

    #[test]
    fn inheritance_merges_members_and_lineage() {
        let a = DataType::builder("A").operation("a", noop).build();
        let b = DataType::builder("B").extends(&a).operation("b", noop).build();
        let c = DataType::builder("C").extends(&b).operation("c", noop).build();

        assert_eq!(c.lineage(), &[c.id(), b.id(), a.id()]);
        assert!(c.is_a(&a));
        assert!(!a.is_a(&c));
        let names: Vec<&str> = c.members().keys().map(|k| &**k).collect();
        assert_eq!(names, ["c", "b", "a"]);
        assert_eq!(c.members()["a"].owner(), a.component_id());
    }

    #[test]
    fn diamond_lineage_is_deduplicated() {
        let base = DataType::builder("Base").build();
        let left = DataType::builder("Left").extends(&base).build();
        let right = DataType::builder("Right").extends(&base).build();
        let child = DataType::builder("Child")
            .extends(&left)
            .extends(&right)
            .build();

        assert_eq!(
            child.lineage(),
            &[child.id(), left.id(), base.id(), right.id()]
        );
    }

    #[test]
    fn instantiate_applies_defaults_and_overrides() {
        let account = DataType::builder("Account")
            .field("balance", 0)
            .field("owner", "nobody")
            .build();
        let subject = account.instantiate([("balance", Value::from(10)), ("note", "x".into())]);

        assert_eq!(subject.get("balance"), Some(Value::Integer(10)));
        assert_eq!(subject.get("owner"), Some(Value::from("nobody")));
        assert_eq!(subject.get("note"), Some(Value::from("x")));
    }

    #[test]
    fn instantiate_json_requires_object() {
        let account = DataType::builder("Account").build();
        let subject = account.instantiate_json(json!({"balance": 5})).unwrap();
        assert_eq!(subject.get("balance"), Some(Value::Integer(5)));

        let err = account.instantiate_json(json!([1, 2])).unwrap_err();
        assert!(matches!(err, DciError::InvalidArgument { .. }));
    }

    #[test]
    fn root_behavior_is_owned_by_the_type() {
        let account = DataType::builder("Account").build();
        let first = account.instantiate(Vec::<(String, Value)>::new());
        let second = account.instantiate(Vec::<(String, Value)>::new());
        assert!(Arc::ptr_eq(&first.behavior(), &second.behavior()));
        assert!(Arc::ptr_eq(&first.behavior(), account.root_behavior()));
    }
}
