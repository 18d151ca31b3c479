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

//! Execution-local stack of active interactions
//!
//! Every OS thread has its own stack, and so does every tokio task: code
//! running inside a task uses a stack keyed by its task id, so tasks
//! multiplexed on one worker thread never see each other's frames. Futures
//! joined within a single task share that task's stack unless each is wrapped
//! in [`isolated`]. Frames are strictly LIFO; popping anything but the top
//! frame is reported as [`ContextStackCorruption`].

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task;

use super::Interaction;
use crate::error::{ContextStackCorruption, DciError, DciResult};
use crate::model::{Subject, Value};
use crate::role::Role;

/// A binding applied when a frame was entered
pub(crate) struct AppliedBinding {
    pub slot: String,
    pub role: Role,
    /// Slot value before the binding was applied
    pub original: Value,
    /// Role-bearing subject produced by the engine
    pub player: Subject,
    /// The slot was rewritten to hold `player`
    pub replaced_slot: bool,
}

pub(crate) struct Frame {
    pub id: u64,
    pub context: Arc<dyn Interaction>,
    pub bindings: Vec<AppliedBinding>,
}

type Stack = RefCell<Vec<Frame>>;

thread_local! {
    static THREAD_STACK: Stack = const { RefCell::new(Vec::new()) };
}

tokio::task_local! {
    static TASK_STACK: Stack;
}

/// Stacks of tokio tasks, removed again once they are empty
static TASK_STACKS: Lazy<DashMap<task::Id, Vec<Frame>>> = Lazy::new(DashMap::new);

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

fn with_stack<R>(f: impl FnOnce(&mut Vec<Frame>) -> R) -> R {
    if TASK_STACK.try_with(|_| ()).is_ok() {
        return TASK_STACK.with(|stack| f(&mut *stack.borrow_mut()));
    }
    match task::try_id() {
        Some(id) => with_task_stack(id, f),
        None => THREAD_STACK.with(|stack| f(&mut *stack.borrow_mut())),
    }
}

fn with_task_stack<R>(id: task::Id, f: impl FnOnce(&mut Vec<Frame>) -> R) -> R {
    let result = match TASK_STACKS.get_mut(&id) {
        Some(mut stack) => f(stack.value_mut()),
        None => {
            let mut stack = Vec::new();
            let result = f(&mut stack);
            if !stack.is_empty() {
                TASK_STACKS.insert(id, stack);
            }
            return result;
        }
    };
    TASK_STACKS.remove_if(&id, |_, stack| stack.is_empty());
    result
}

/// Run `future` with a context stack of its own
///
/// Frames pushed inside the future are invisible to the thread it is polled
/// on and to every other task.
pub fn isolated<F: Future>(future: F) -> impl Future<Output = F::Output> {
    TASK_STACK.scope(RefCell::new(Vec::new()), future)
}

pub(crate) fn push(context: Arc<dyn Interaction>, bindings: Vec<AppliedBinding>) -> u64 {
    let id = NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed);
    let depth = with_stack(|stack| {
        stack.push(Frame {
            id,
            context,
            bindings,
        });
        stack.len()
    });
    log::trace!("context frame #{id} pushed (depth {depth})");
    id
}

pub(crate) fn pop(expected: u64) -> Result<Frame, ContextStackCorruption> {
    let frame = with_stack(|stack| {
        match stack.last().map(|top| top.id) {
            None => Err(ContextStackCorruption::Empty { expected }),
            Some(found) if found != expected => {
                Err(ContextStackCorruption::Mismatch { expected, found })
            }
            Some(_) => stack.pop().ok_or(ContextStackCorruption::Empty { expected }),
        }
    })?;
    log::trace!("context frame #{expected} popped (depth {})", depth());
    Ok(frame)
}

/// Record the bindings applied for the top frame
pub(crate) fn attach(
    frame: u64,
    bindings: Vec<AppliedBinding>,
) -> Result<(), (ContextStackCorruption, Vec<AppliedBinding>)> {
    with_stack(|stack| match stack.last_mut() {
        Some(top) if top.id == frame => {
            top.bindings = bindings;
            Ok(())
        }
        Some(top) => Err((
            ContextStackCorruption::Mismatch {
                expected: frame,
                found: top.id,
            },
            bindings,
        )),
        None => Err((ContextStackCorruption::Empty { expected: frame }, bindings)),
    })
}

/// The innermost active interaction
pub fn current() -> DciResult<Arc<dyn Interaction>> {
    with_stack(|stack| {
        stack
            .last()
            .map(|frame| Arc::clone(&frame.context))
            .ok_or(DciError::NoActiveContext)
    })
}

/// The innermost active interaction as its concrete type
pub fn current_as<C: Interaction>() -> DciResult<Arc<C>> {
    let context = current()?;
    let name = context.name().to_string();
    context
        .into_any()
        .downcast::<C>()
        .map_err(|_| DciError::context_type_mismatch(name, std::any::type_name::<C>()))
}

/// Number of active interactions
pub fn depth() -> usize {
    with_stack(|stack| stack.len())
}
