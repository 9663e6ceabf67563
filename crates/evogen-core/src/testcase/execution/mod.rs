//! Execution-side collaborators of the chromosome model: the runtime value
//! model, the variable scope, and the result an external executor reports.

pub mod scope;
pub mod value;

pub use scope::Scope;
pub use value::{convert_for_slot, ArrayValue, ObjectValue, Value};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// What the external execution engine reports back for one run of a test.
///
/// The trace itself is opaque to this crate; what the chromosome model needs
/// is where execution stopped and which statements raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Unique identifier of this execution, for reporting.
    pub id: Uuid,
    /// Number of statements that actually executed.
    pub executed_statements: usize,
    /// Exception descriptions keyed by the raising statement's position.
    pub exceptions: BTreeMap<usize, String>,
}

impl ExecutionResult {
    pub fn new(executed_statements: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            executed_statements,
            exceptions: BTreeMap::new(),
        }
    }

    /// Builder-style recording of an exception at a statement position.
    pub fn with_exception(mut self, position: usize, description: impl Into<String>) -> Self {
        self.exceptions.insert(position, description.into());
        self
    }

    pub fn has_exceptions(&self) -> bool {
        !self.exceptions.is_empty()
    }

    /// Position of the earliest raising statement, if any.
    pub fn first_exception_position(&self) -> Option<usize> {
        self.exceptions.keys().next().copied()
    }
}
