// Copyright 2024 Evogen Platform
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

#![deny(unsafe_code)]

//! Core chromosome model and suite-level evolutionary operators for the
//! Evogen test generation platform.
//!
//! A test case is an ordered sequence of statements producing typed
//! variables; a suite of them is one individual of a genetic search driven
//! from outside this crate. What lives here is everything the search
//! rewrites: the variable-reference model that keeps handles valid while
//! tests are mutated and cloned, the suite-level mutation and crossover
//! operators with their bloat-control and tie-breaking policies, and the
//! minimizer that shrinks a finished suite without giving up a single
//! covered goal.

// Core modules
pub mod config;
pub mod errors;
pub mod ga;
pub mod suite;
pub mod testcase;
pub mod types;

pub use errors::{CodeUnderTestError, EvogenError};
pub use ga::{ChromosomeFactory, CoverageGoal, GoalFactory, GoalKey, SuiteFitness, TestChromosome};
pub use suite::{
    MinimizationReport, SecondaryObjective, SecondaryObjectives, TestSuiteChromosome,
    TestSuiteMinimizer,
};
pub use testcase::{Statement, StatementKind, TestCase, VariableRef};

/// Framework version for compatibility tracking
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
