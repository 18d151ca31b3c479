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

//! Scoped role acquisition
//!
//! Guards revoke exactly the roles they applied, on every exit path. A role
//! that was already active when the scope started is left alone, so nested
//! scopes over the same role only revert at the scope that applied it.

use std::fmt;
use std::ops::Deref;

use super::RoleEngine;
use crate::error::DciResult;
use crate::model::Subject;
use crate::role::Role;

/// Combine a scoped body's outcome with the outcome of reverting the scope
///
/// The body's failure always wins; a revert failure on top of it is chained.
pub fn settle<R>(outcome: DciResult<R>, revert: DciResult<()>) -> DciResult<R> {
    match (outcome, revert) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(revert_err)) => Err(revert_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(revert_err)) => Err(err.with_revert_failure(revert_err)),
    }
}

/// Scope in which a subject plays a role
///
/// Derefs to the role-bearing subject. Dropping the guard revokes the role if
/// this guard applied it; use [`RoleGuard::release`] to observe revert errors.
#[must_use = "the role is revoked as soon as the guard is dropped"]
pub struct RoleGuard {
    engine: RoleEngine,
    player: Subject,
    pending: Option<Role>,
}

impl RoleGuard {
    pub(crate) fn new(engine: RoleEngine, player: Subject, applied: Option<Role>) -> Self {
        Self {
            engine,
            player,
            pending: applied,
        }
    }

    /// The role-bearing subject
    pub fn subject(&self) -> &Subject {
        &self.player
    }

    /// Whether leaving the scope will revoke the role
    pub fn applied(&self) -> bool {
        self.pending.is_some()
    }

    /// Leave the scope, returning the subject after revocation
    pub fn release(mut self) -> DciResult<Subject> {
        match self.pending.take() {
            Some(role) => self.engine.revoke(&role, &self.player),
            None => Ok(self.player.clone()),
        }
    }
}

impl Deref for RoleGuard {
    type Target = Subject;

    fn deref(&self) -> &Subject {
        &self.player
    }
}

impl Drop for RoleGuard {
    fn drop(&mut self) {
        if let Some(role) = self.pending.take() {
            if let Err(e) = self.engine.revoke(&role, &self.player) {
                log::error!("failed to revoke role '{}' on scope exit: {e}", role.name());
            }
        }
    }
}

impl fmt::Debug for RoleGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleGuard")
            .field("player", &self.player)
            .field("pending", &self.pending.as_ref().map(Role::name))
            .finish()
    }
}

/// Scope in which several subjects play roles
///
/// Players are returned in the order the pairs were given; roles applied by
/// the scope are revoked in reverse order on exit.
#[must_use = "the roles are revoked as soon as the guard is dropped"]
pub struct RolesGuard {
    engine: RoleEngine,
    players: Vec<Subject>,
    applied: Vec<(Role, Subject)>,
}

impl RolesGuard {
    /// Apply every pair, reverting the ones already applied if one fails
    pub(crate) fn acquire(engine: RoleEngine, pairs: &[(Role, Subject)]) -> DciResult<Self> {
        let mut players = Vec::with_capacity(pairs.len());
        let mut applied = Vec::new();

        for (role, subject) in pairs {
            if subject.plays(role) {
                players.push(subject.clone());
                continue;
            }
            match engine.assign(role, subject) {
                Ok(player) => {
                    applied.push((role.clone(), player.clone()));
                    players.push(player);
                }
                Err(err) => {
                    return match revert_all(&engine, &mut applied) {
                        Ok(()) => Err(err),
                        Err(revert) => Err(err.with_revert_failure(revert)),
                    };
                }
            }
        }

        Ok(Self {
            engine,
            players,
            applied,
        })
    }

    /// Role-bearing subjects, in the order the pairs were given
    pub fn players(&self) -> &[Subject] {
        &self.players
    }

    /// Leave the scope, reporting the first revert failure
    pub fn release(mut self) -> DciResult<()> {
        revert_all(&self.engine, &mut self.applied)
    }
}

impl Drop for RolesGuard {
    fn drop(&mut self) {
        if let Err(e) = revert_all(&self.engine, &mut self.applied) {
            log::error!("failed to revoke roles on scope exit: {e}");
        }
    }
}

impl fmt::Debug for RolesGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RolesGuard")
            .field("players", &self.players)
            .field("pending", &self.applied.len())
            .finish()
    }
}

/// Revoke in reverse order; every role is attempted, the first error is kept
fn revert_all(engine: &RoleEngine, applied: &mut Vec<(Role, Subject)>) -> DciResult<()> {
    let mut first_error = None;
    while let Some((role, player)) = applied.pop() {
        if let Err(e) = engine.revoke(&role, &player) {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
