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

//! The test suite chromosome: an ordered collection of test chromosomes
//! evolved as one individual, with suite-level mutation, crossover and
//! secondary-objective ranking.

pub mod bloat;
pub mod minimizer;
pub mod secondary;

pub use bloat::{AbsoluteLengthLimit, BloatControl, RelativeLengthLimit};
pub use minimizer::{MinimizationReport, TestSuiteMinimizer};
pub use secondary::{SecondaryObjective, SecondaryObjectives};

use crate::config::SearchConfig;
use crate::ga::{ChromosomeFactory, GoalKey, TestChromosome};
use crate::testcase::TestCase;
use rand::{Rng, RngCore};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// One individual of the search: an evolving collection of tests.
///
/// The order of contained tests carries no coverage meaning but matters to
/// secondary objectives and to the redundant-test removal pass, so it is
/// preserved through every operator.
#[derive(Clone, Default)]
pub struct TestSuiteChromosome {
    tests: Vec<TestChromosome>,
    factory: Option<Arc<dyn ChromosomeFactory>>,
    fitness: Option<f64>,
    coverage: Option<f64>,
    changed: bool,
}

impl fmt::Debug for TestSuiteChromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSuiteChromosome")
            .field("tests", &self.tests.len())
            .field("total_length", &self.total_length())
            .field("fitness", &self.fitness)
            .field("changed", &self.changed)
            .finish()
    }
}

impl TestSuiteChromosome {
    /// An empty suite with no factory; mutation can only rework existing
    /// tests, never insert fresh ones.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty suite that manufactures fresh tests through `factory`
    /// during mutation.
    pub fn with_factory(factory: Arc<dyn ChromosomeFactory>) -> Self {
        Self {
            factory: Some(factory),
            ..Self::default()
        }
    }

    /// Number of contained tests.
    pub fn size(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Sum of the statement counts of all contained tests.
    pub fn total_length(&self) -> usize {
        self.tests.iter().map(TestChromosome::size).sum()
    }

    pub fn tests(&self) -> &[TestChromosome] {
        &self.tests
    }

    pub fn tests_mut(&mut self) -> &mut [TestChromosome] {
        &mut self.tests
    }

    pub fn add_test(&mut self, test: TestChromosome) {
        self.tests.push(test);
        self.changed = true;
    }

    pub fn add_test_case(&mut self, test: TestCase) {
        self.add_test(TestChromosome::new(test));
    }

    /// Replaces the whole test list, e.g. with a minimized one.
    pub fn replace_tests(&mut self, tests: Vec<TestChromosome>) {
        self.tests = tests;
        self.changed = true;
    }

    pub fn clear_tests(&mut self) {
        self.tests.clear();
        self.changed = true;
    }

    /// Drops all tests that have become empty; returns how many went.
    pub fn drop_empty_tests(&mut self) -> usize {
        let before = self.tests.len();
        self.tests.retain(|t| t.size() > 0);
        let dropped = before - self.tests.len();
        if dropped > 0 {
            debug!(dropped, "removed empty test cases");
            self.changed = true;
        }
        dropped
    }

    /// Union of the covered-goal sets of all contained tests.
    pub fn covered_goals(&self) -> BTreeSet<GoalKey> {
        let mut goals = BTreeSet::new();
        for test in &self.tests {
            goals.extend(test.covered_goals().iter().cloned());
        }
        goals
    }

    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }

    pub fn coverage(&self) -> Option<f64> {
        self.coverage
    }

    pub fn set_coverage(&mut self, coverage: f64) {
        self.coverage = Some(coverage);
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn set_changed(&mut self, changed: bool) {
        self.changed = changed;
    }

    /// Applies suite-level mutation: `config.number_of_mutations`
    /// independent events, each of which gives every contained test its
    /// scheduled chance to mutate, then grows the suite through the
    /// geometric insertion tail, then drops tests that became empty.
    ///
    /// The suite is flagged changed iff at least one contained test changed
    /// or a test was inserted or removed.
    pub fn mutate(&mut self, rng: &mut dyn RngCore, config: &SearchConfig) {
        let mut changed = false;
        for _ in 0..config.number_of_mutations {
            changed |= self.mutate_once(rng, config);
        }
        if changed {
            self.changed = true;
        }
    }

    fn mutate_once(&mut self, rng: &mut dyn RngCore, config: &SearchConfig) -> bool {
        let mut changed = false;
        let size = self.tests.len();
        for (index, test) in self.tests.iter_mut().enumerate() {
            if rng.gen::<f64>() < config.mutation_schedule.probability(index, size) {
                if test.mutate(rng) {
                    changed = true;
                }
            }
        }

        // Insertion tail: a k-th fresh test joins with probability P^k, an
        // unbounded but improbable growth bias balanced by bloat control.
        if let Some(factory) = self.factory.clone() {
            let p = config.test_insertion_probability;
            let mut k = 1i32;
            while rng.gen::<f64>() <= p.powi(k) && self.tests.len() < config.max_suite_size {
                self.tests.push(factory.produce(rng));
                debug!(suite_size = self.tests.len(), "inserted fresh test during mutation");
                changed = true;
                k += 1;
            }
        }

        if self.drop_empty_tests() > 0 {
            changed = true;
        }
        changed
    }

    /// Single-point "borrow" crossover: clones the peer's test at `index`
    /// and appends it. Only `self` is affected.
    pub fn crossover_borrow(&mut self, other: &TestSuiteChromosome, index: usize) {
        self.tests.push(other.tests[index].clone());
        self.changed = true;
    }

    /// Two-point splice crossover over the list of tests: keeps this
    /// suite's tests before `position1`, then appends clones of the peer's
    /// tests from `position2` onward. Only `self` is affected.
    pub fn crossover_splice(
        &mut self,
        other: &TestSuiteChromosome,
        position1: usize,
        position2: usize,
    ) {
        self.tests.truncate(position1);
        self.tests
            .extend(other.tests.iter().skip(position2).cloned());
        self.changed = true;
    }

    /// Tie-breaks two suites of equal primary fitness under the configured
    /// ranking.
    pub fn compare_secondary(
        &self,
        other: &TestSuiteChromosome,
        objectives: &SecondaryObjectives,
    ) -> Ordering {
        objectives.compare(self, other)
    }
}
