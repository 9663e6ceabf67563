//! Bloat control: rejecting suites that grow without earning it.

use crate::suite::TestSuiteChromosome;
use tracing::debug;

/// A policy the evolutionary loop consults before accepting an offspring.
pub trait BloatControl: Send + Sync {
    /// Whether `candidate` is too long to accept.
    fn is_too_long(&self, candidate: &TestSuiteChromosome) -> bool;
}

/// A fixed ceiling on the total statement count of a suite.
#[derive(Debug, Clone, Copy)]
pub struct AbsoluteLengthLimit {
    pub max_total_length: usize,
}

impl BloatControl for AbsoluteLengthLimit {
    fn is_too_long(&self, candidate: &TestSuiteChromosome) -> bool {
        candidate.total_length() > self.max_total_length
    }
}

/// Rejects candidates that are much longer than the best individual of the
/// current generation without being any fitter.
///
/// A candidate with strictly better fitness than the best seen is always
/// exempt: bloat control must never block genuine improvement.
#[derive(Debug, Clone)]
pub struct RelativeLengthLimit {
    bloat_factor: f64,
    best_fitness: Option<f64>,
    current_max: usize,
}

impl RelativeLengthLimit {
    pub fn new(bloat_factor: f64) -> Self {
        Self {
            bloat_factor,
            best_fitness: None,
            current_max: 0,
        }
    }

    /// Called at each generation boundary with the generation's best
    /// individual; records the fitness to beat and the length yardstick.
    pub fn observe_generation(&mut self, best: &TestSuiteChromosome) {
        self.current_max = best.total_length();
        self.best_fitness = best.fitness();
        debug!(
            current_max = self.current_max,
            best_fitness = ?self.best_fitness,
            "updated relative bloat yardstick"
        );
    }
}

impl BloatControl for RelativeLengthLimit {
    fn is_too_long(&self, candidate: &TestSuiteChromosome) -> bool {
        if self.current_max == 0 {
            return false;
        }
        if let (Some(candidate_fitness), Some(best_fitness)) =
            (candidate.fitness(), self.best_fitness)
        {
            // Lower is better; an actual improvement is never too long.
            if candidate_fitness < best_fitness {
                return false;
            }
        }
        candidate.total_length() as f64 > self.bloat_factor * self.current_max as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::TestChromosome;
    use crate::testcase::execution::Value;
    use crate::testcase::TestCase;
    use crate::types::{PrimitiveKind, TypeDesc};

    fn suite_of_length(total: usize) -> TestSuiteChromosome {
        let mut tc = TestCase::new();
        for i in 0..total {
            tc.add_primitive(TypeDesc::Primitive(PrimitiveKind::Int), Value::Int(i as i32));
        }
        let mut suite = TestSuiteChromosome::new();
        suite.add_test(TestChromosome::new(tc));
        suite
    }

    #[test]
    fn test_absolute_limit() {
        let limit = AbsoluteLengthLimit { max_total_length: 5 };
        assert!(!limit.is_too_long(&suite_of_length(5)));
        assert!(limit.is_too_long(&suite_of_length(6)));
    }

    #[test]
    fn test_relative_limit_before_any_generation_accepts_everything() {
        let limit = RelativeLengthLimit::new(2.0);
        assert!(!limit.is_too_long(&suite_of_length(1000)));
    }

    #[test]
    fn test_relative_limit_rejects_unfit_growth() {
        let mut limit = RelativeLengthLimit::new(2.0);
        let mut best = suite_of_length(10);
        best.set_fitness(4.0);
        limit.observe_generation(&best);

        let mut bloated = suite_of_length(21);
        bloated.set_fitness(4.0);
        assert!(limit.is_too_long(&bloated));

        let mut acceptable = suite_of_length(20);
        acceptable.set_fitness(4.0);
        assert!(!limit.is_too_long(&acceptable));
    }

    #[test]
    fn test_relative_limit_exempts_strict_improvement() {
        let mut limit = RelativeLengthLimit::new(2.0);
        let mut best = suite_of_length(10);
        best.set_fitness(4.0);
        limit.observe_generation(&best);

        let mut improved = suite_of_length(100);
        improved.set_fitness(3.0);
        assert!(!limit.is_too_long(&improved));
    }
}
