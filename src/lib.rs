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

//! Data Context Interaction for Rust
//!
//! Roles are attached to and detached from plain data subjects at runtime.
//! Each combination of a base type and active roles resolves to one cached
//! [`CompositeDescriptor`], so equal combinations are identical by reference.
//! Interactions are entered on an execution-local context stack, letting role
//! operations reach their collaborators by slot name.
//!
//! ```
//! use std::sync::Arc;
//! use dci_roles::context::{self, Binding, Context};
//! use dci_roles::{DataType, DciError, Role, Value};
//!
//! let account = DataType::builder("Account")
//!     .field("balance", 0)
//!     .build();
//!
//! let sink = Role::builder("MoneySink")
//!     .operation("receive", |this, args| {
//!         let amount = args.first().and_then(Value::as_integer).unwrap_or(0);
//!         this.set("balance", this.get_integer("balance")? + amount);
//!         Ok(Value::Empty)
//!     })
//!     .build();
//!
//! let source = Role::builder("MoneySource")
//!     .operation("transfer", |this, args| {
//!         let amount = args.first().and_then(Value::as_integer).unwrap_or(0);
//!         let balance = this.get_integer("balance")?;
//!         if balance < amount {
//!             return Err(DciError::operation_failed("transfer", "insufficient funds"));
//!         }
//!         this.set("balance", balance - amount);
//!         context::role_player("sink")?.call("receive", args)
//!     })
//!     .build();
//!
//! let a = account.instantiate([("balance", 1000)]);
//! let b = account.instantiate([("balance", 0)]);
//! let transfer = Arc::new(
//!     Context::new("TransferMoney")
//!         .with_slot("source", a.clone())
//!         .with_slot("sink", b.clone()),
//! );
//!
//! context::with_context(
//!     &transfer,
//!     &[Binding::new("source", &source), Binding::new("sink", &sink)],
//!     |_| context::role_player("source")?.call("transfer", &[Value::from(100)]),
//! )?;
//!
//! assert_eq!(a.get("balance"), Some(Value::Integer(900)));
//! assert_eq!(b.get("balance"), Some(Value::Integer(100)));
//! assert!(a.roles().is_empty());
//! # Ok::<(), DciError>(())
//! ```

pub mod cache;
pub mod composite;
pub mod context;
pub mod engine;
pub mod error;
pub mod factory;
pub mod model;
pub mod role;

pub use cache::{CacheStats, CompositeCache, global_cache};
pub use composite::{ComponentId, CompositeDescriptor, CompositionKey};
pub use context::{Binding, Context, ContextGuard, Interaction};
pub use engine::{
    ApplyStrategy, CacheScope, EngineConfig, RoleEngine, RoleGuard, RolesGuard, StrategyKind,
    assign, default_engine, played_by, revoke,
};
pub use error::{ContextStackCorruption, DciError, DciResult};
pub use factory::{RoleFactory, global_factory};
pub use model::{DataType, Layout, Subject, Value};
pub use role::{Role, RoleBuilder};
