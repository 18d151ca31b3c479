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

//! Conflict detection between a role and the subject it is applied to
//!
//! A role member collides with a member already visible on the subject's
//! behavioral type unless both were declared by the same component, which
//! happens when two sub-roles share a parent role. Per-instance fields always
//! collide. Structural names never take part.

use super::Role;
use crate::error::{DciError, DciResult};
use crate::model::Subject;
use crate::model::member::is_structural;

/// Names of every role member that would shadow something on `subject`
pub fn find_conflicts(role: &Role, subject: &Subject) -> Vec<String> {
    let behavior = subject.behavior();
    let mut conflicts = Vec::new();

    for (name, member) in role.members() {
        if is_structural(name) {
            continue;
        }
        let shadows_member = match behavior.member(name) {
            Some(existing) => existing.owner() != member.owner(),
            None => false,
        };
        if shadows_member || subject.has_field(name) {
            conflicts.push(name.to_string());
        }
    }

    conflicts
}

/// Fail with [`DciError::RoleConflict`] if `role` can not be applied to `subject`
pub fn check(role: &Role, subject: &Subject) -> DciResult<()> {
    let conflicts = find_conflicts(role, subject);
    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(DciError::role_conflict(
            role.name(),
            subject.type_name().as_ref(),
            conflicts,
        ))
    }
}
