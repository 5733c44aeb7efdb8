// Copyright 2024 Saptak Santra
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

//! Archetype storage engine: tables, columns, toggle bitsets and the
//! id-record cache an ECS world builds entity storage on top of.
//!
//! This crate owns row-level mutation (append/delete/move/swap/merge),
//! table lifecycle and id-record registration. It does not own entity
//! identity or query/observer dispatch: those are modeled as the
//! [`entity_index::EntityIndex`] and [`external::Observer`] traits so the
//! storage core can be built and tested without a world attached.

pub mod bitset;
pub mod bitset_column;
pub mod column;
pub mod entity_index;
pub mod error;
pub mod external;
pub mod hooks;
pub mod id;
pub mod id_record;
pub mod scratch;
pub mod table;
pub mod table_data;
pub mod table_record;
pub mod type_vec;

pub use bitset::BitSet;
pub use bitset_column::BitsetColumn;
pub use column::{Column, RawBuffer};
pub use entity_index::{EntityIndex, EntityRecord, HashEntityIndex};
pub use error::{EcsError, Result};
pub use external::{NullObserver, Observer};
pub use hooks::{ComponentHooks, TypeInfo};
pub use id::{well_known, EntityId, Id, IdKind};
pub use id_record::{IdRecord, IdRecordId, IdRegistry};
pub use scratch::Scratch;
pub use table::{Table, TableFlags, TableId, TableStore};
pub use table_data::{ColumnMove, TableData};
pub use table_record::TableRecord;
pub use type_vec::{Type, TypeScan};
