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

//! Integration tests for the execution-local context stack

use dci_roles::context::{self, Binding, Context, Interaction};
use dci_roles::{DataType, DciError, DciResult, Role, Subject, Value};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Barrier};
use std::thread;

fn current_name() -> DciResult<String> {
    context::current().map(|ctx| ctx.name().to_string())
}

#[test]
fn nested_contexts_unwind_in_order() {
    let a = Arc::new(Context::new("A"));
    let b = Arc::new(Context::new("B"));

    let outer = context::enter(a, &[]).unwrap();
    let inner = context::enter(b, &[]).unwrap();
    assert_eq!(context::depth(), 2);
    assert_eq!(current_name(), Ok("B".to_string()));

    inner.exit().unwrap();
    assert_eq!(current_name(), Ok("A".to_string()));

    outer.exit().unwrap();
    assert_eq!(current_name(), Err(DciError::NoActiveContext));
    assert_eq!(context::depth(), 0);
}

#[test]
#[should_panic(expected = "context stack corrupted")]
fn out_of_order_exit_is_fatal() {
    let outer = context::enter(Arc::new(Context::new("A")), &[]).unwrap();
    let _inner = context::enter(Arc::new(Context::new("B")), &[]).unwrap();
    let _ = outer.exit();
}

#[test]
fn threads_observe_independent_stacks() {
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|name| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let guard = context::enter(Arc::new(Context::new(name)), &[]).unwrap();
                barrier.wait();
                let seen = (current_name(), context::depth());
                barrier.wait();
                guard.exit().unwrap();
                seen
            })
        })
        .collect();

    let seen: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        seen,
        vec![(Ok("left".to_string()), 1), (Ok("right".to_string()), 1)]
    );
    assert_eq!(context::depth(), 0);
}

async fn visit(name: &'static str) -> (DciResult<String>, usize) {
    let guard = context::enter(Arc::new(Context::new(name)), &[]).unwrap();
    tokio::task::yield_now().await;
    let seen = (current_name(), context::depth());
    tokio::task::yield_now().await;
    guard.exit().unwrap();
    seen
}

#[tokio::test(flavor = "current_thread")]
async fn isolated_futures_in_one_task_do_not_share_frames() {
    let (first, second) = futures::join!(
        context::isolated(visit("first")),
        context::isolated(visit("second"))
    );

    assert_eq!(first, (Ok("first".to_string()), 1));
    assert_eq!(second, (Ok("second".to_string()), 1));
    assert_eq!(current_name(), Err(DciError::NoActiveContext));
}

#[tokio::test(flavor = "current_thread")]
async fn spawned_tasks_on_one_thread_do_not_share_frames() {
    let first = tokio::spawn(visit("first"));
    let second = tokio::spawn(visit("second"));
    let (first, second) = futures::join!(first, second);

    assert_eq!(first.unwrap(), (Ok("first".to_string()), 1));
    assert_eq!(second.unwrap(), (Ok("second".to_string()), 1));
    assert_eq!(context::depth(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn task_stack_follows_the_task_across_threads() {
    let task = tokio::spawn(async {
        let guard = context::enter(Arc::new(Context::new("Roaming")), &[]).unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
            assert_eq!(current_name(), Ok("Roaming".to_string()));
        }
        guard.exit().unwrap();
        context::depth()
    });

    assert_eq!(task.await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn isolated_stack_follows_the_task_across_threads() {
    let task = tokio::spawn(context::isolated(async {
        let guard = context::enter(Arc::new(Context::new("Roaming")), &[]).unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
            assert_eq!(current_name(), Ok("Roaming".to_string()));
        }
        guard.exit().unwrap();
        context::depth()
    }));

    assert_eq!(task.await.unwrap(), 0);
}

/// An interaction with typed collaborators
struct Greeting {
    greeter: Subject,
    greeted: Subject,
}

impl Interaction for Greeting {
    fn name(&self) -> &str {
        "Greeting"
    }

    fn slot(&self, name: &str) -> Option<Value> {
        match name {
            "greeter" => Some(Value::from(self.greeter.clone())),
            "greeted" => Some(Value::from(self.greeted.clone())),
            _ => None,
        }
    }

    fn set_slot(&self, name: &str, _: Value) -> DciResult<()> {
        Err(DciError::invalid_argument(
            "set_slot",
            format!("slot '{name}' is read-only"),
        ))
    }
}

fn run_greeting(greeting: &Arc<Greeting>) -> DciResult<Value> {
    context::in_context(greeting, || {
        context::role_player("greeter")?.call("greet", &[])
    })
}

#[test]
fn current_interaction_can_be_recovered_by_type() {
    let person = DataType::builder("Person").field("name", "").build();
    let greeting = Arc::new(Greeting {
        greeter: person.instantiate([("name", "alice")]),
        greeted: person.instantiate([("name", "bob")]),
    });

    let found = context::in_context(&greeting, context::current_as::<Greeting>).unwrap();
    assert!(Arc::ptr_eq(&found, &greeting));

    let err = context::in_context(&greeting, context::current_as::<Context>).unwrap_err();
    assert_eq!(
        err,
        DciError::context_type_mismatch("Greeting", std::any::type_name::<Context>())
    );
}

#[test]
fn custom_interaction_with_method_scope() {
    let person = DataType::builder("Person").field("name", "").build();
    let greeter = Role::builder("Greeter")
        .operation("greet", |this, _| {
            let other = context::role_player("greeted")?;
            Ok(Value::from(format!(
                "{} greets {}",
                this.get("name").unwrap_or_default(),
                other.get("name").unwrap_or_default()
            )))
        })
        .build();

    let alice = person.instantiate([("name", "alice")]);
    let bob = person.instantiate([("name", "bob")]);
    let greeting = Arc::new(Greeting {
        greeter: alice.clone(),
        greeted: bob,
    });

    let guard = context::enter(Arc::clone(&greeting), &[Binding::new("greeter", &greeter)]).unwrap();
    assert_eq!(run_greeting(&greeting), Ok(Value::from("alice greets bob")));
    assert_eq!(context::depth(), 1);
    guard.exit().unwrap();

    assert!(!alice.plays(&greeter));
    assert_eq!(
        run_greeting(&greeting),
        Err(DciError::no_such_operation("Person", "greet"))
    );
}
