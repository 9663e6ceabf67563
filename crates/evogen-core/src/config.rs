//! Configuration for the evolutionary search and for suite minimization.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Default number of suite-level mutation events per generation.
    pub const DEFAULT_NUMBER_OF_MUTATIONS: usize = 1;

    /// Default probability driving the geometric test-insertion tail.
    pub const DEFAULT_TEST_INSERTION_PROBABILITY: f64 = 0.1;

    /// Default maximum number of tests in a suite.
    pub const DEFAULT_MAX_SUITE_SIZE: usize = 100;

    /// Default absolute cap on the total statement count of a suite.
    pub const DEFAULT_MAX_TOTAL_LENGTH: usize = 2000;

    /// Default multiplier for the relative length bloat check.
    pub const DEFAULT_BLOAT_FACTOR: f64 = 2.0;

    /// Default wall-clock budget for one minimization run.
    pub const DEFAULT_MINIMIZATION_TIMEOUT: Duration = Duration::from_secs(60);
}

/// How the probability of mutating each contained test is derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MutationSchedule {
    /// Each test is mutated with probability `1 / n` where `n` is the
    /// current number of tests in the suite.
    Uniform,
    /// Each test is mutated with the same fixed probability.
    Fixed(f64),
}

impl MutationSchedule {
    /// Probability of mutating the test at `index` in a suite of `size` tests.
    pub fn probability(&self, _index: usize, size: usize) -> f64 {
        match self {
            MutationSchedule::Uniform => {
                if size == 0 {
                    0.0
                } else {
                    1.0 / size as f64
                }
            }
            MutationSchedule::Fixed(p) => *p,
        }
    }
}

/// Parameters of the suite-level evolutionary operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of independent mutation events applied to a suite per
    /// generation, regardless of suite size.
    pub number_of_mutations: usize,
    /// Probability `P` of the insertion tail: a `k`-th fresh test is
    /// inserted with probability `P^k`.
    pub test_insertion_probability: f64,
    /// Hard cap on the number of tests a suite may grow to during mutation.
    pub max_suite_size: usize,
    /// Absolute ceiling on total statement count used by bloat control.
    pub max_total_length: usize,
    /// Multiplier for the relative length bloat check.
    pub bloat_factor: f64,
    /// Per-test mutation probability schedule.
    pub mutation_schedule: MutationSchedule,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            number_of_mutations: defaults::DEFAULT_NUMBER_OF_MUTATIONS,
            test_insertion_probability: defaults::DEFAULT_TEST_INSERTION_PROBABILITY,
            max_suite_size: defaults::DEFAULT_MAX_SUITE_SIZE,
            max_total_length: defaults::DEFAULT_MAX_TOTAL_LENGTH,
            bloat_factor: defaults::DEFAULT_BLOAT_FACTOR,
            mutation_schedule: MutationSchedule::Uniform,
        }
    }
}

/// Order in which the per-suite minimizer visits tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinimizationSortOrder {
    /// Shortest tests first: favors removing whole short tests early and
    /// trims statements evenly across the suite.
    ShortestFirst,
    /// Longest tests first: favors trimming the biggest offenders.
    LongestFirst,
}

/// Parameters of the suite minimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinimizationConfig {
    /// Sort coverage goals into their natural order before processing so
    /// runs are reproducible.
    pub sort_goals: bool,
    /// Before minimizing a fresh test for a goal, check whether an already
    /// accepted test happens to cover it.
    pub skip_coincidental: bool,
    /// Run the redundant-test removal pass after per-test minimization.
    pub second_pass: bool,
    /// Visit order for per-suite minimization.
    pub sort_order: MinimizationSortOrder,
    /// Wall-clock budget; polled cooperatively, not preemptive.
    pub timeout: Duration,
}

impl Default for MinimizationConfig {
    fn default() -> Self {
        Self {
            sort_goals: true,
            skip_coincidental: true,
            second_pass: true,
            sort_order: MinimizationSortOrder::ShortestFirst,
            timeout: defaults::DEFAULT_MINIMIZATION_TIMEOUT,
        }
    }
}
