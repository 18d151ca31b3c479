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

//! Data model for role-capable subjects
//!
//! This module provides the base types subjects are created from, the subject
//! handle itself and the dynamic values stored in subject fields.

pub mod data_type;
pub mod member;
pub mod subject;
pub mod value;

pub use data_type::{DataType, DataTypeBuilder, Layout};
pub use member::{Member, MemberKind, MemberTable, Operation, STRUCTURAL_MEMBERS, is_structural};
pub use subject::{SharedState, Subject};
pub use value::Value;
