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

//! Error types for role composition and interaction contexts

use thiserror::Error;

/// Result type for role and context operations
pub type DciResult<T> = Result<T, DciError>;

/// Errors surfaced by the composition engine, the role factory and the
/// context stack
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DciError {
    /// Applying the role would shadow members already visible on the subject
    #[error(
        "Can not apply role '{role}' to '{subject_type}' when overriding members: {}",
        members.join(", ")
    )]
    RoleConflict {
        /// The role that was being applied
        role: String,
        /// Behavioral type of the subject at the time of the attempt
        subject_type: String,
        /// Every colliding member name, sorted
        members: Vec<String>,
    },

    /// The role factory has no concrete role for the subject's type
    #[error("No role '{role}' found for subject type '{subject_type}'")]
    NoRoleForSubject {
        /// The generic role requested
        role: String,
        /// Runtime type of the subject
        subject_type: String,
    },

    /// The subject's storage layout can not carry a composite type
    #[error("Can not assign composite '{composite}': '{original}' has a fixed layout")]
    IncompatibleSubject {
        /// Name of the composite that was attempted
        composite: String,
        /// Name of the subject's original type
        original: String,
    },

    /// A context lookup happened while no interaction is active
    #[error("No active interaction context")]
    NoActiveContext,

    /// The current interaction is not of the requested type
    #[error("Current interaction '{context}' is not a {expected}")]
    ContextTypeMismatch {
        /// Name of the current interaction
        context: String,
        /// Type that was requested
        expected: String,
    },

    /// The current interaction has no slot with the given name
    #[error("Interaction has no slot '{slot}'")]
    UnknownSlot {
        /// The requested slot name
        slot: String,
    },

    /// A slot was expected to hold a subject
    #[error("Slot '{slot}' does not hold a subject (found {actual})")]
    SlotNotSubject {
        /// The slot name
        slot: String,
        /// Type of the value found in the slot
        actual: String,
    },

    /// No operation with that name is reachable on the subject
    #[error("'{type_name}' has no operation '{operation}'")]
    NoSuchOperation {
        /// Behavioral type of the subject
        type_name: String,
        /// The requested operation
        operation: String,
    },

    /// A factory registration used a role that does not extend the generic role
    #[error("Role '{concrete}' can not be registered for '{role}': not a sub-role")]
    NotASubrole {
        /// The generic role
        role: String,
        /// The role offered as concrete implementation
        concrete: String,
    },

    /// An operation received an argument it can not work with
    #[error("Operation '{operation}' invalid argument: {message}")]
    InvalidArgument {
        /// Operation name
        operation: String,
        /// Error message
        message: String,
    },

    /// A user-defined operation failed
    #[error("Operation '{operation}' failed: {message}")]
    OperationFailed {
        /// Operation name
        operation: String,
        /// Error message
        message: String,
    },

    /// Reverting a scope failed after the scoped body had already failed
    #[error("{original} (revert also failed: {revert})")]
    RevertFailed {
        /// The failure raised by the scoped body
        original: Box<DciError>,
        /// The failure raised while reverting roles or popping the context
        revert: Box<DciError>,
    },

    /// Engine configuration could not be read
    #[error("Invalid engine configuration: {message}")]
    InvalidConfig {
        /// Reason the configuration was rejected
        message: String,
    },
}

impl DciError {
    /// Create a role conflict error; member names are sorted
    pub fn role_conflict(
        role: impl Into<String>,
        subject_type: impl Into<String>,
        members: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut members: Vec<String> = members.into_iter().map(Into::into).collect();
        members.sort();
        members.dedup();
        Self::RoleConflict {
            role: role.into(),
            subject_type: subject_type.into(),
            members,
        }
    }

    /// Create a no-role-for-subject error
    pub fn no_role_for_subject(role: impl Into<String>, subject_type: impl Into<String>) -> Self {
        Self::NoRoleForSubject {
            role: role.into(),
            subject_type: subject_type.into(),
        }
    }

    /// Create an incompatible subject error
    pub fn incompatible_subject(composite: impl Into<String>, original: impl Into<String>) -> Self {
        Self::IncompatibleSubject {
            composite: composite.into(),
            original: original.into(),
        }
    }

    /// Create an unknown slot error
    pub fn unknown_slot(slot: impl Into<String>) -> Self {
        Self::UnknownSlot { slot: slot.into() }
    }

    /// Create a context type mismatch error
    pub fn context_type_mismatch(context: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::ContextTypeMismatch {
            context: context.into(),
            expected: expected.into(),
        }
    }

    /// Create a slot-not-subject error
    pub fn slot_not_subject(slot: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::SlotNotSubject {
            slot: slot.into(),
            actual: actual.into(),
        }
    }

    /// Create a no-such-operation error
    pub fn no_such_operation(type_name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::NoSuchOperation {
            type_name: type_name.into(),
            operation: operation.into(),
        }
    }

    /// Create a not-a-subrole error
    pub fn not_a_subrole(role: impl Into<String>, concrete: impl Into<String>) -> Self {
        Self::NotASubrole {
            role: role.into(),
            concrete: concrete.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an operation failure
    pub fn operation_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Chain a revert failure onto the failure that triggered the revert
    pub fn with_revert_failure(self, revert: DciError) -> Self {
        Self::RevertFailed {
            original: Box::new(self),
            revert: Box::new(revert),
        }
    }

    /// Colliding member names, if this is a role conflict
    pub fn conflicting_members(&self) -> Option<&[String]> {
        match self {
            Self::RoleConflict { members, .. } => Some(members),
            _ => None,
        }
    }
}

/// The context stack was popped out of LIFO order.
///
/// This is a programming error, usually a guard dropped on a different
/// execution-of-control than the one that created it. The stack panics with
/// this error's message instead of returning it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextStackCorruption {
    /// A pop was attempted on an empty stack
    #[error("context stack corrupted: frame #{expected} popped from an empty stack")]
    Empty {
        /// Frame the caller expected to pop
        expected: u64,
    },

    /// The top frame is not the frame being exited
    #[error("context stack corrupted: expected frame #{expected} on top, found #{found}")]
    Mismatch {
        /// Frame the caller expected to pop
        expected: u64,
        /// Frame actually on top of the stack
        found: u64,
    },
}
