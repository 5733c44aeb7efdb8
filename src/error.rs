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

//! Error types
//!
//! Two classes of failure, per the storage engine's error handling design:
//! parameter violations (caller bugs, reported and recoverable) and internal
//! invariant violations (debug-only assertions; release builds are UB).

use std::fmt;

/// Storage engine error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A table pointer/handle was not recognized, or an id lookup failed.
    InvalidParameter(String),

    /// The requested operation is not valid in the table's current state.
    InvalidOperation(String),

    /// The table's lock counter is greater than zero; mutation rejected.
    LockedStorage,

    /// A component was not present where the operation assumed it would be.
    ComponentNotFound,

    /// Debug-only invariant violation. Only ever constructed behind
    /// `debug_assertions`; release builds skip the check entirely (per the
    /// storage engine's error handling design, this is UB on release).
    InternalError(String),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            EcsError::InvalidOperation(msg) => write!(f, "invalid operation: {msg}"),
            EcsError::LockedStorage => write!(f, "table is locked against mutation"),
            EcsError::ComponentNotFound => write!(f, "component not found"),
            EcsError::InternalError(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias.
pub type Result<T> = std::result::Result<T, EcsError>;
