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

//! Entering and leaving interactions

use std::fmt;
use std::sync::Arc;

use super::stack::{self, AppliedBinding};
use super::{Binding, Interaction};
use crate::engine::{RoleEngine, default_engine, settle};
use crate::error::{DciError, DciResult};
use crate::model::Value;

/// An active interaction
///
/// Leaving the scope pops the frame, revokes the bindings in reverse order
/// and restores slots that were rewritten on entry. Dropping the guard does
/// the same; call [`ContextGuard::exit`] to observe revert errors.
///
/// The guard must be dropped on the execution-of-control that created it, in
/// LIFO order with other guards. Violating that is a programming error and
/// panics.
#[must_use = "the interaction ends as soon as the guard is dropped"]
pub struct ContextGuard {
    frame: u64,
    context: Arc<dyn Interaction>,
    engine: RoleEngine,
    active: bool,
}

impl ContextGuard {
    /// The interaction this guard keeps active
    pub fn context(&self) -> &Arc<dyn Interaction> {
        &self.context
    }

    /// Leave the interaction
    pub fn exit(mut self) -> DciResult<()> {
        self.leave()
    }

    fn leave(&mut self) -> DciResult<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        let frame = match stack::pop(self.frame) {
            Ok(frame) => frame,
            Err(corruption) => {
                if std::thread::panicking() {
                    log::error!("{corruption}");
                    return Ok(());
                }
                panic!("{corruption}");
            }
        };
        unwind(&self.engine, frame.context.as_ref(), frame.bindings)
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Err(e) = self.leave() {
            log::error!(
                "failed to unwind interaction '{}' on scope exit: {e}",
                self.context.name()
            );
        }
    }
}

impl fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard")
            .field("frame", &self.frame)
            .field("context", &self.context.name())
            .field("active", &self.active)
            .finish()
    }
}

/// Enter `context` with the default engine
pub fn enter<C>(context: Arc<C>, bindings: &[Binding]) -> DciResult<ContextGuard>
where
    C: Interaction + 'static,
{
    enter_with(default_engine(), context, bindings)
}

/// Enter `context`, applying `bindings` through `engine`
///
/// The frame is pushed first, so role operations see the interaction as
/// current while its bindings are applied. Each binding then assigns its role
/// to the subject held in its slot. Slots whose subject already plays the role
/// are left alone and not reverted on exit. If a binding fails, the ones
/// already applied are reverted and the frame is popped again.
pub fn enter_with<C>(
    engine: &RoleEngine,
    context: Arc<C>,
    bindings: &[Binding],
) -> DciResult<ContextGuard>
where
    C: Interaction + 'static,
{
    let context: Arc<dyn Interaction> = context;
    let guard = ContextGuard {
        frame: stack::push(Arc::clone(&context), Vec::new()),
        context,
        engine: engine.clone(),
        active: true,
    };
    let mut applied = Vec::with_capacity(bindings.len());

    for binding in bindings {
        match apply(engine, guard.context.as_ref(), binding) {
            Ok(Some(done)) => applied.push(done),
            Ok(None) => {}
            Err(err) => {
                let reverted = unwind(engine, guard.context.as_ref(), applied);
                return Err(match reverted.and(guard.exit()) {
                    Ok(()) => err,
                    Err(revert) => err.with_revert_failure(revert),
                });
            }
        }
    }

    if let Err((corruption, applied)) = stack::attach(guard.frame, applied) {
        if let Err(e) = unwind(engine, guard.context.as_ref(), applied) {
            log::error!("failed to revert bindings of '{}': {e}", guard.context.name());
        }
        panic!("{corruption}");
    }
    Ok(guard)
}

/// Run `body` inside `context` with `bindings` applied
pub fn with_context<C, R, F>(context: &Arc<C>, bindings: &[Binding], body: F) -> DciResult<R>
where
    C: Interaction + 'static,
    F: FnOnce(&Arc<C>) -> DciResult<R>,
{
    let guard = enter(Arc::clone(context), bindings)?;
    let outcome = body(context);
    settle(outcome, guard.exit())
}

/// Run `body` with `this` as the current interaction
///
/// The method-scoping helper: an interaction's own methods wrap their body in
/// this so role operations they call can reach the interaction.
pub fn in_context<C, R, F>(this: &Arc<C>, body: F) -> R
where
    C: Interaction + 'static,
    F: FnOnce() -> R,
{
    let context: Arc<dyn Interaction> = Arc::clone(this) as Arc<dyn Interaction>;
    let frame = stack::push(Arc::clone(&context), Vec::new());
    let _guard = ContextGuard {
        frame,
        context,
        engine: default_engine().clone(),
        active: true,
    };
    body()
}

fn apply(
    engine: &RoleEngine,
    context: &dyn Interaction,
    binding: &Binding,
) -> DciResult<Option<AppliedBinding>> {
    let original = context
        .slot(&binding.slot)
        .ok_or_else(|| DciError::unknown_slot(&binding.slot))?;
    let subject = match original.as_subject() {
        Some(subject) => subject.clone(),
        None => return Err(DciError::slot_not_subject(&binding.slot, original.type_name())),
    };
    if subject.plays(&binding.role) {
        return Ok(None);
    }

    let player = engine.assign(&binding.role, &subject)?;
    let replaced_slot = !player.ptr_eq(&subject);
    if replaced_slot {
        if let Err(err) = context.set_slot(&binding.slot, Value::Object(player.clone())) {
            return Err(match engine.revoke(&binding.role, &player) {
                Ok(_) => err,
                Err(revert) => err.with_revert_failure(revert),
            });
        }
    }

    Ok(Some(AppliedBinding {
        slot: binding.slot.clone(),
        role: binding.role.clone(),
        original,
        player,
        replaced_slot,
    }))
}

/// Revert bindings in reverse order; every binding is attempted, the first
/// error is kept
fn unwind(
    engine: &RoleEngine,
    context: &dyn Interaction,
    bindings: Vec<AppliedBinding>,
) -> DciResult<()> {
    let mut first_error = None;
    for binding in bindings.into_iter().rev() {
        if let Err(e) = engine.revoke(&binding.role, &binding.player) {
            first_error.get_or_insert(e);
        }
        if binding.replaced_slot {
            if let Err(e) = context.set_slot(&binding.slot, binding.original) {
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
