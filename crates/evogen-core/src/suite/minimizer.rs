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

//! Greedy suite minimization: shrink a finished suite, whole tests and
//! individual statements alike, without losing a single covered goal.

use crate::config::{MinimizationConfig, MinimizationSortOrder};
use crate::ga::{CoverageGoal, GoalFactory, GoalKey, TestChromosome};
use crate::suite::TestSuiteChromosome;
use crate::testcase::factory::delete_statement_gracefully;
use crate::testcase::minimizer::TestCaseMinimizer;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Sizes before and after one minimization run, for the driver's statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinimizationReport {
    /// Unique identifier of this run.
    pub id: Uuid,
    /// When minimization started.
    pub started_at: DateTime<Utc>,
    /// Tests in the suite before minimization.
    pub tests_before: usize,
    /// Total statements before minimization.
    pub length_before: usize,
    /// Tests in the suite after minimization.
    pub tests_after: usize,
    /// Total statements after minimization.
    pub length_after: usize,
    /// Whether the time budget ran out. In per-test mode that means the
    /// suite was left untouched; in per-suite mode, that iteration stopped
    /// with all committed deletions kept.
    pub timed_out: bool,
}

/// Cooperative wall-clock budget, polled between steps. Never preemptive,
/// so one slow statement minimization can overrun it.
struct TimeBudget {
    deadline: Instant,
}

impl TimeBudget {
    fn new(limit: Duration) -> Self {
        Self {
            deadline: Instant::now() + limit,
        }
    }

    fn exhausted(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Shrinks a test suite while guaranteeing no covered goal is lost.
pub struct TestSuiteMinimizer {
    factories: Vec<Arc<dyn GoalFactory>>,
    config: MinimizationConfig,
    excluded_goals: BTreeSet<GoalKey>,
}

impl TestSuiteMinimizer {
    pub fn new(factory: Arc<dyn GoalFactory>) -> Self {
        Self::with_factories(vec![factory])
    }

    pub fn with_factories(factories: Vec<Arc<dyn GoalFactory>>) -> Self {
        Self {
            factories,
            config: MinimizationConfig::default(),
            excluded_goals: BTreeSet::new(),
        }
    }

    pub fn with_config(mut self, config: MinimizationConfig) -> Self {
        self.config = config;
        self
    }

    /// Excludes goals an existing, externally written test suite already
    /// covers; no generated test will be kept on their account.
    pub fn excluding_goals(mut self, goals: impl IntoIterator<Item = GoalKey>) -> Self {
        let before = self.excluded_goals.len();
        self.excluded_goals.extend(goals);
        info!(
            excluded = self.excluded_goals.len() - before,
            "removed goals already covered by an existing suite"
        );
        self
    }

    /// Minimizes `suite` in place.
    ///
    /// `per_test` selects goal-directed minimization (build a fresh suite of
    /// one minimized test per uncovered goal); otherwise the per-suite mode
    /// deletes statements wherever fitness tolerates it.
    pub fn minimize(
        &self,
        suite: &mut TestSuiteChromosome,
        per_test: bool,
        rng: &mut dyn RngCore,
    ) -> MinimizationReport {
        let started_at = Utc::now();
        let tests_before = suite.size();
        let length_before = suite.total_length();
        info!(
            per_test,
            tests = tests_before,
            length = length_before,
            "starting suite minimization"
        );

        // Stale execution results do not survive minimization decisions.
        for test in suite.tests_mut() {
            test.set_changed(true);
        }

        let budget = TimeBudget::new(self.config.timeout);
        let timed_out = if per_test {
            self.minimize_tests(suite, &budget, rng)
        } else {
            self.minimize_suite(suite, &budget, rng)
        };

        let report = MinimizationReport {
            id: Uuid::new_v4(),
            started_at,
            tests_before,
            length_before,
            tests_after: suite.size(),
            length_after: suite.total_length(),
            timed_out,
        };
        info!(
            tests = report.tests_after,
            length = report.length_after,
            timed_out,
            "suite minimization finished"
        );
        report
    }

    fn collect_goals(&self) -> Vec<Arc<dyn CoverageGoal>> {
        let mut goals: Vec<Arc<dyn CoverageGoal>> = self
            .factories
            .iter()
            .flat_map(|f| f.coverage_goals())
            .filter(|g| !self.excluded_goals.contains(&g.key()))
            .collect();
        if self.config.sort_goals {
            goals.sort_by_key(|g| g.key());
        }
        goals
    }

    /// Goal-directed minimization. All-or-nothing: any timeout abandons the
    /// whole pass and leaves the caller's suite untouched, because this
    /// mode builds a wholly new suite and a partial one would be
    /// incoherent.
    ///
    /// Returns whether the budget ran out.
    fn minimize_tests(
        &self,
        suite: &mut TestSuiteChromosome,
        budget: &TimeBudget,
        rng: &mut dyn RngCore,
    ) -> bool {
        let goals = self.collect_goals();
        let total = goals.len();
        let mut covered: BTreeSet<GoalKey> = BTreeSet::new();
        let mut minimized: Vec<TestChromosome> = Vec::new();

        for goal in &goals {
            if budget.exhausted() {
                warn!("minimization timeout, rolling back to the original suite");
                return true;
            }
            debug!(goal = %goal.key(), "considering goal");

            if self.config.skip_coincidental {
                for test in minimized.iter_mut() {
                    if budget.exhausted() {
                        warn!("minimization timeout, rolling back to the original suite");
                        return true;
                    }
                    if goal.is_covered(test) {
                        debug!(goal = %goal.key(), "covered by an already minimized test");
                        covered.insert(goal.key());
                        break;
                    }
                }
            }
            if covered.contains(&goal.key()) {
                continue;
            }

            let mut covering: Vec<usize> = Vec::new();
            for (index, test) in suite.tests_mut().iter_mut().enumerate() {
                if goal.is_covered(test) {
                    covering.push(index);
                }
            }
            // Shortest covering test first, position as deterministic
            // tie-break.
            covering.sort_by_key(|&index| (suite.tests()[index].size(), index));
            let Some(&chosen) = covering.first() else {
                debug!(goal = %goal.key(), "no test covers this goal");
                continue;
            };

            let mut copy = suite.tests()[chosen].clone();
            TestCaseMinimizer::new(goal.clone()).minimize(&mut copy, rng);
            if budget.exhausted() {
                warn!("minimization timeout, rolling back to the original suite");
                return true;
            }

            // Credit every goal the minimized test covers, not just the one
            // that triggered it; anything else re-adds redundant tests for
            // goals this test already handles.
            copy.clear_covered_goals();
            for g in &goals {
                if g.is_covered(&mut copy) {
                    covered.insert(g.key());
                }
            }
            minimized.push(copy);
            debug!(
                covered = covered.len(),
                total, "suite coverage after accepting minimized test"
            );
        }

        info!(covered = covered.len(), total, "per-test minimization complete");
        suite.replace_tests(minimized);

        if self.config.second_pass {
            self.remove_redundant_tests(suite, &goals);
        }
        false
    }

    /// Statement-deletion-directed minimization: for every test, last
    /// statement first, attempt a graceful delete and keep it unless the
    /// fitness vector got worse. Deletions commit incrementally, so running
    /// out of budget simply stops iterating; partial progress is safe here.
    ///
    /// Returns whether the budget ran out.
    fn minimize_suite(
        &self,
        suite: &mut TestSuiteChromosome,
        budget: &TimeBudget,
        rng: &mut dyn RngCore,
    ) -> bool {
        match self.config.sort_order {
            MinimizationSortOrder::ShortestFirst => {
                suite.tests_mut().sort_by_key(TestChromosome::size)
            }
            MinimizationSortOrder::LongestFirst => suite
                .tests_mut()
                .sort_by_key(|t| std::cmp::Reverse(t.size())),
        }

        let goals = self.collect_goals();
        let mut fitness: Vec<f64> = self
            .factories
            .iter()
            .map(|f| f.suite_fitness(suite))
            .collect();

        let mut changed = true;
        while changed && !budget.exhausted() {
            changed = false;
            suite.drop_empty_tests();

            for test_index in 0..suite.size() {
                if budget.exhausted() {
                    break;
                }
                let mut position = suite.tests()[test_index].size();
                while position > 0 {
                    position -= 1;
                    if budget.exhausted() {
                        break;
                    }
                    if position >= suite.tests()[test_index].size() {
                        // A cascading delete already consumed this position.
                        continue;
                    }
                    debug!(
                        tests = suite.size(),
                        length = suite.total_length(),
                        test = test_index,
                        statement = position,
                        "attempting statement deletion"
                    );

                    let original = suite.tests()[test_index].clone();
                    let deleted = delete_statement_gracefully(
                        suite.tests_mut()[test_index].test_mut(),
                        position,
                        rng,
                    )
                    .unwrap_or(false);
                    if !deleted {
                        debug!("deletion attempt failed, restoring test");
                        suite.tests_mut()[test_index] = original;
                        continue;
                    }

                    suite.tests_mut()[test_index].set_changed(true);
                    suite.tests_mut()[test_index].clear_covered_goals();

                    let new_fitness: Vec<f64> = self
                        .factories
                        .iter()
                        .map(|f| f.suite_fitness(suite))
                        .collect();

                    match compare_fitness_vectors(&new_fitness, &fitness) {
                        Ordering::Equal => {
                            // Same fitness with fewer statements: keep it.
                        }
                        Ordering::Less => {
                            fitness = new_fitness;
                            changed = true;
                            if self.config.sort_order != MinimizationSortOrder::ShortestFirst {
                                // Spread deletions across tests so the
                                // median length shrinks, not just one test.
                                break;
                            }
                        }
                        Ordering::Greater => {
                            debug!(statement = position, "deletion lost fitness, restoring");
                            suite.tests_mut()[test_index] = original;
                        }
                    }
                }
            }
        }

        let timed_out = budget.exhausted();
        suite.drop_empty_tests();
        self.remove_redundant_tests(suite, &goals);
        timed_out
    }

    /// Shared second pass: drop tests whose goals are strict subsets of the
    /// rest. Later-added tests are considered first: subsuming tests land
    /// at the back of a suite, and earlier, more foundational tests deserve
    /// protection. Covered goals are guaranteed identical before and after.
    fn remove_redundant_tests(
        &self,
        suite: &mut TestSuiteChromosome,
        goals: &[Arc<dyn CoverageGoal>],
    ) {
        debug!(tests = suite.size(), "removing redundant tests");
        let mut tests: Vec<TestChromosome> = suite.tests().to_vec();
        tests.reverse();

        let mut kept: Vec<TestChromosome> = Vec::new();
        let mut covered: BTreeSet<GoalKey> = BTreeSet::new();
        for mut test in tests {
            let mut adds_new_goals = false;
            for goal in goals {
                if !covered.contains(&goal.key()) && goal.is_covered(&mut test) {
                    adds_new_goals = true;
                    covered.insert(goal.key());
                }
            }
            if adds_new_goals {
                covered.extend(test.covered_goals().iter().cloned());
                kept.push(test);
            }
        }

        kept.reverse();
        debug!(tests = kept.len(), "after removing redundant tests");
        suite.replace_tests(kept);
    }
}

/// Element-wise fitness comparison in configured fitness-function order,
/// short-circuiting on the first function that differs.
///
/// Deliberately not a Pareto comparison: a deletion that improves an
/// earlier-listed function is accepted even if a later-listed one
/// regresses. This order-dependence is long-standing ranking behavior the
/// search was tuned against, kept as-is.
fn compare_fitness_vectors(new: &[f64], old: &[f64]) -> Ordering {
    for (n, o) in new.iter().zip(old.iter()) {
        match n.partial_cmp(o) {
            Some(Ordering::Less) => return Ordering::Less,
            Some(Ordering::Greater) => return Ordering::Greater,
            _ => {}
        }
    }
    Ordering::Equal
}

#[cfg(test)]
#[path = "minimizer_tests.rs"]
mod tests;
