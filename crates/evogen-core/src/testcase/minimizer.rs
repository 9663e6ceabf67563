//! Per-goal test case minimization: strip a single test down to the
//! statements one coverage goal actually needs.

use crate::ga::{CoverageGoal, TestChromosome};
use crate::testcase::factory::delete_statement_gracefully;
use rand::RngCore;
use std::sync::Arc;
use tracing::debug;

/// Shrinks one test case while keeping one goal covered.
///
/// Statements are attempted last to first; a deletion survives only if the
/// goal stays covered afterwards, and sweeps repeat until a fixed point.
pub struct TestCaseMinimizer {
    goal: Arc<dyn CoverageGoal>,
}

impl TestCaseMinimizer {
    pub fn new(goal: Arc<dyn CoverageGoal>) -> Self {
        Self { goal }
    }

    pub fn minimize(&self, test: &mut TestChromosome, rng: &mut dyn RngCore) {
        if !self.goal.is_covered(test) {
            debug!(goal = %self.goal.key(), "test does not cover the goal, nothing to minimize");
            return;
        }

        let mut changed = true;
        while changed {
            changed = false;
            for pos in (0..test.size()).rev() {
                if pos >= test.size() {
                    // A cascading delete below already consumed this position.
                    continue;
                }
                let backup = test.clone();
                let deleted =
                    delete_statement_gracefully(test.test_mut(), pos, rng).unwrap_or(false);
                if !deleted {
                    *test = backup;
                    continue;
                }
                test.set_changed(true);
                if self.goal.is_covered(test) {
                    debug!(position = pos, "removed statement, goal still covered");
                    changed = true;
                } else {
                    *test = backup;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::GoalKey;
    use crate::testcase::execution::Value;
    use crate::testcase::{StatementKind, TestCase};
    use crate::types::{PrimitiveKind, TypeDesc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Covered iff the test calls the named method.
    struct CallGoal(&'static str);

    impl CoverageGoal for CallGoal {
        fn key(&self) -> GoalKey {
            format!("call:{}", self.0)
        }

        fn is_covered(&self, test: &mut TestChromosome) -> bool {
            let covered = test.test().statements().iter().any(|s| {
                matches!(s.kind(), StatementKind::MethodCall { method, .. } if method == self.0)
            });
            if covered {
                test.record_covered(self.key());
            }
            covered
        }
    }

    #[test]
    fn test_minimization_keeps_only_what_the_goal_needs() {
        let mut tc = TestCase::new();
        let int_ty = TypeDesc::Primitive(PrimitiveKind::Int);
        let v = tc.add_primitive(int_ty.clone(), Value::Int(10));
        for i in 0..5 {
            tc.add_primitive(int_ty.clone(), Value::Int(i));
        }
        let stack = tc.add_constructor("examples.Stack", vec![]);
        tc.add_method_call(Some(stack), "push", vec![v], TypeDesc::Void);

        let mut chromosome = TestChromosome::new(tc);
        let mut rng = StdRng::seed_from_u64(3);
        TestCaseMinimizer::new(Arc::new(CallGoal("push"))).minimize(&mut chromosome, &mut rng);

        // The five unrelated literals are gone; the call chain survives.
        assert_eq!(chromosome.size(), 3);
        let goal = CallGoal("push");
        assert!(goal.is_covered(&mut chromosome));
    }

    #[test]
    fn test_minimization_leaves_uncovering_test_alone() {
        let mut tc = TestCase::new();
        tc.add_primitive(TypeDesc::Primitive(PrimitiveKind::Int), Value::Int(1));
        let mut chromosome = TestChromosome::new(tc);
        let mut rng = StdRng::seed_from_u64(3);
        TestCaseMinimizer::new(Arc::new(CallGoal("pop"))).minimize(&mut chromosome, &mut rng);
        assert_eq!(chromosome.size(), 1);
    }
}
