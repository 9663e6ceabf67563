//! Tests for the suite minimizer, driven by small goal doubles standing in
//! for the external coverage-goal catalog.

use super::*;
use crate::config::MinimizationConfig;
use crate::ga::TestChromosome;
use crate::testcase::execution::Value;
use crate::testcase::{StatementKind, TestCase};
use crate::types::{PrimitiveKind, TypeDesc};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn int_ty() -> TypeDesc {
    TypeDesc::Primitive(PrimitiveKind::Int)
}

fn rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

/// Covered iff the test calls the named method.
struct MethodGoal {
    method: String,
}

impl MethodGoal {
    fn new(method: impl Into<String>) -> Arc<dyn CoverageGoal> {
        Arc::new(Self {
            method: method.into(),
        })
    }
}

impl CoverageGoal for MethodGoal {
    fn key(&self) -> GoalKey {
        format!("method:{}", self.method)
    }

    fn is_covered(&self, test: &mut TestChromosome) -> bool {
        let covered = test.test().statements().iter().any(|s| {
            matches!(s.kind(), StatementKind::MethodCall { method, .. } if *method == self.method)
        });
        if covered {
            test.record_covered(self.key());
        }
        covered
    }
}

/// Covered iff the test performs `from` directly before `to`, constructor
/// calls counting as the `new` event, the shape of a state-transition goal.
struct TransitionGoal {
    from: String,
    to: String,
}

impl TransitionGoal {
    fn new(from: &str, to: &str) -> Arc<dyn CoverageGoal> {
        Arc::new(Self {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

fn event_of(kind: &StatementKind) -> Option<&str> {
    match kind {
        StatementKind::Constructor { .. } => Some("new"),
        StatementKind::MethodCall { method, .. } => Some(method.as_str()),
        _ => None,
    }
}

impl CoverageGoal for TransitionGoal {
    fn key(&self) -> GoalKey {
        format!("transition:{}->{}", self.from, self.to)
    }

    fn is_covered(&self, test: &mut TestChromosome) -> bool {
        let events: Vec<&str> = test
            .test()
            .statements()
            .iter()
            .filter_map(|s| event_of(s.kind()))
            .collect();
        let covered = events
            .windows(2)
            .any(|w| w[0] == self.from && w[1] == self.to);
        if covered {
            test.record_covered(self.key());
        }
        covered
    }
}

/// Covered iff the test calls `method` with an argument defined as the
/// exact literal; distinguishes two calls of the same method.
struct CallWithLiteralGoal {
    method: String,
    literal: i32,
}

impl CallWithLiteralGoal {
    fn new(method: &str, literal: i32) -> Arc<dyn CoverageGoal> {
        Arc::new(Self {
            method: method.to_string(),
            literal,
        })
    }
}

impl CoverageGoal for CallWithLiteralGoal {
    fn key(&self) -> GoalKey {
        format!("call:{}({})", self.method, self.literal)
    }

    fn is_covered(&self, test: &mut TestChromosome) -> bool {
        let tc = test.test();
        let mut covered = false;
        for statement in tc.statements() {
            if let StatementKind::MethodCall { method, args, .. } = statement.kind() {
                if *method == self.method {
                    for arg in args {
                        let defining = tc.statement(arg.position(tc));
                        if let StatementKind::Primitive {
                            value: Value::Int(v),
                        } = defining.kind()
                        {
                            if *v == self.literal {
                                covered = true;
                            }
                        }
                    }
                }
            }
        }
        if covered {
            test.record_covered(self.key());
        }
        covered
    }
}

/// A goal factory over a fixed list of goals, scoring suites by uncovered
/// count through the trait's default.
struct StaticGoals {
    goals: Vec<Arc<dyn CoverageGoal>>,
}

impl StaticGoals {
    fn new(goals: Vec<Arc<dyn CoverageGoal>>) -> Arc<dyn GoalFactory> {
        Arc::new(Self { goals })
    }
}

impl GoalFactory for StaticGoals {
    fn coverage_goals(&self) -> Vec<Arc<dyn CoverageGoal>> {
        self.goals.clone()
    }
}

/// `new Stack(); push(10); pop(); push(10); pop();`
fn stack_test() -> TestCase {
    let mut tc = TestCase::new();
    let ten = tc.add_primitive(int_ty(), Value::Int(10));
    let stack = tc.add_constructor("examples.Stack", vec![]);
    tc.add_method_call(Some(stack.clone()), "push", vec![ten.clone()], TypeDesc::Void);
    tc.add_method_call(Some(stack.clone()), "pop", vec![], int_ty());
    tc.add_method_call(Some(stack.clone()), "push", vec![ten], TypeDesc::Void);
    tc.add_method_call(Some(stack), "pop", vec![], int_ty());
    tc
}

fn all_stack_transitions() -> Vec<Arc<dyn CoverageGoal>> {
    let mut goals = vec![
        TransitionGoal::new("new", "push"),
        TransitionGoal::new("new", "pop"),
        TransitionGoal::new("push", "push"),
        TransitionGoal::new("push", "pop"),
        TransitionGoal::new("pop", "push"),
        TransitionGoal::new("pop", "pop"),
    ];
    goals.sort_by_key(|g| g.key());
    goals
}

#[test]
fn test_suite_fitness_counts_uncovered_transition_goals() {
    let goals = all_stack_transitions();
    let n = goals.len() as f64;
    let factory = StaticGoals::new(goals);

    let mut suite = TestSuiteChromosome::new();
    suite.add_test_case(stack_test());

    // The test walks new->push, push->pop, pop->push; three of the N
    // transition goals, so fitness is exactly N - 3.
    assert_eq!(factory.suite_fitness(&mut suite), n - 3.0);
}

#[test]
fn test_minimizing_two_of_sixtynine_goals() {
    let mut goals: Vec<Arc<dyn CoverageGoal>> = vec![
        MethodGoal::new("push"),
        MethodGoal::new("pop"),
    ];
    for i in 0..67 {
        goals.push(MethodGoal::new(format!("unreached_{i:02}")));
    }
    let factory = StaticGoals::new(goals);
    let minimizer = TestSuiteMinimizer::new(factory.clone());

    let mut suite = TestSuiteChromosome::new();
    suite.add_test_case(stack_test());

    let report = minimizer.minimize(&mut suite, true, &mut rng());
    assert!(!report.timed_out);
    assert_eq!(factory.suite_fitness(&mut suite), 67.0);
    assert_eq!(suite.covered_goals().len(), 2);
}

#[test]
fn test_minimize_empty_suite_drops_empty_test() {
    let factory = StaticGoals::new(vec![]);
    let minimizer = TestSuiteMinimizer::new(factory);

    let mut suite = TestSuiteChromosome::new();
    suite.add_test_case(TestCase::new());

    let report = minimizer.minimize(&mut suite, false, &mut rng());
    assert_eq!(suite.size(), 0);
    assert_eq!(report.tests_before, 1);
    assert_eq!(report.tests_after, 0);
}

#[test]
fn test_suite_of_unreferenced_literals_minimizes_away() {
    let mut tc = TestCase::new();
    for i in 0..10 {
        tc.add_primitive(int_ty(), Value::Int(i));
    }
    let factory = StaticGoals::new(vec![]);
    let minimizer = TestSuiteMinimizer::new(factory);

    let mut suite = TestSuiteChromosome::new();
    suite.add_test_case(tc);

    minimizer.minimize(&mut suite, false, &mut rng());
    assert_eq!(suite.size(), 0);
}

/// Constructor, ten literals, one call using the first literal: only three
/// statements earn their place.
#[test]
fn test_per_suite_minimization_keeps_call_chain_only() {
    let mut tc = TestCase::new();
    let flag = tc.add_constructor("examples.FlagExample", vec![]);
    let mut first = None;
    for i in 0..10 {
        let v = tc.add_primitive(int_ty(), Value::Int(28234 + i));
        first.get_or_insert(v);
    }
    tc.add_method_call(Some(flag), "testMe", vec![first.unwrap()], TypeDesc::Void);
    assert_eq!(tc.size(), 12);

    let factory = StaticGoals::new(vec![MethodGoal::new("testMe")]);
    let minimizer = TestSuiteMinimizer::new(factory.clone());

    let mut suite = TestSuiteChromosome::new();
    suite.add_test_case(tc);
    let before = factory.suite_fitness(&mut suite);
    assert_eq!(before, 0.0);

    minimizer.minimize(&mut suite, false, &mut rng());

    assert_eq!(suite.size(), 1);
    assert_eq!(suite.tests()[0].size(), 3);
    assert_eq!(factory.suite_fitness(&mut suite), before);
}

/// One long test covering two goals splits into two minimal tests under
/// per-test minimization.
#[test]
fn test_per_test_minimization_splits_goals_into_minimal_tests() {
    let mut tc = TestCase::new();
    let flag = tc.add_constructor("examples.FlagExample", vec![]);
    let a = tc.add_primitive(int_ty(), Value::Int(28234));
    let b = tc.add_primitive(int_ty(), Value::Int(28241));
    for i in 0..8 {
        tc.add_primitive(int_ty(), Value::Int(i));
    }
    tc.add_method_call(Some(flag.clone()), "testMe", vec![a], TypeDesc::Void);
    tc.add_method_call(Some(flag), "testMe", vec![b], TypeDesc::Void);

    let factory = StaticGoals::new(vec![
        CallWithLiteralGoal::new("testMe", 28234),
        CallWithLiteralGoal::new("testMe", 28241),
    ]);
    let minimizer = TestSuiteMinimizer::new(factory.clone());

    let mut suite = TestSuiteChromosome::new();
    suite.add_test_case(tc);

    minimizer.minimize(&mut suite, true, &mut rng());

    assert_eq!(suite.size(), 2);
    for test in suite.tests() {
        assert_eq!(test.size(), 3);
    }
    assert_eq!(factory.suite_fitness(&mut suite), 0.0);
}

#[test]
fn test_per_test_timeout_leaves_suite_untouched() {
    let factory = StaticGoals::new(vec![MethodGoal::new("push")]);
    let config = MinimizationConfig {
        timeout: std::time::Duration::ZERO,
        ..MinimizationConfig::default()
    };
    let minimizer = TestSuiteMinimizer::new(factory).with_config(config);

    let mut suite = TestSuiteChromosome::new();
    suite.add_test_case(stack_test());
    let length_before = suite.total_length();

    let report = minimizer.minimize(&mut suite, true, &mut rng());
    assert!(report.timed_out);
    // All-or-nothing: the original suite is exactly what we started with.
    assert_eq!(suite.size(), 1);
    assert_eq!(suite.total_length(), length_before);
}

#[test]
fn test_redundant_removal_prefers_later_subsuming_tests() {
    let mut early = TestCase::new();
    let s = early.add_constructor("examples.Stack", vec![]);
    early.add_method_call(Some(s), "push", vec![], TypeDesc::Void);

    let mut late = TestCase::new();
    let s = late.add_constructor("examples.Stack", vec![]);
    late.add_method_call(Some(s.clone()), "push", vec![], TypeDesc::Void);
    late.add_method_call(Some(s), "pop", vec![], int_ty());

    let factory = StaticGoals::new(vec![MethodGoal::new("push"), MethodGoal::new("pop")]);
    let minimizer = TestSuiteMinimizer::new(factory.clone());

    let mut suite = TestSuiteChromosome::new();
    suite.add_test_case(early);
    suite.add_test_case(late);

    minimizer.minimize(&mut suite, false, &mut rng());

    // The later test subsumes the earlier one's goal, so one test remains
    // and nothing is uncovered.
    assert_eq!(suite.size(), 1);
    assert_eq!(factory.suite_fitness(&mut suite), 0.0);
}

#[test]
fn test_skip_coincidental_reuses_minimized_tests() {
    // Both goals are covered by the same minimal call, so the second goal
    // never needs a second test.
    let factory = StaticGoals::new(vec![
        MethodGoal::new("push"),
        TransitionGoal::new("new", "push"),
    ]);
    let minimizer = TestSuiteMinimizer::new(factory.clone());

    let mut suite = TestSuiteChromosome::new();
    suite.add_test_case(stack_test());

    minimizer.minimize(&mut suite, true, &mut rng());
    assert_eq!(suite.size(), 1);
    assert_eq!(factory.suite_fitness(&mut suite), 0.0);
}

#[test]
fn test_excluded_goals_do_not_earn_tests() {
    let factory = StaticGoals::new(vec![MethodGoal::new("push"), MethodGoal::new("pop")]);
    let minimizer = TestSuiteMinimizer::new(factory)
        .excluding_goals(["method:push".to_string()]);

    let mut suite = TestSuiteChromosome::new();
    suite.add_test_case(stack_test());

    minimizer.minimize(&mut suite, true, &mut rng());

    // Only the pop goal earns a test; push belongs to the existing suite.
    assert_eq!(suite.size(), 1);
    assert!(suite.covered_goals().contains("method:pop"));
    assert!(!suite.covered_goals().contains("method:push"));
}

#[test]
fn test_compare_fitness_vectors_is_order_dependent() {
    use std::cmp::Ordering;
    // The first differing function decides, later regressions are ignored.
    assert_eq!(
        compare_fitness_vectors(&[1.0, 9.0], &[2.0, 0.0]),
        Ordering::Less
    );
    assert_eq!(
        compare_fitness_vectors(&[2.0, 0.0], &[1.0, 9.0]),
        Ordering::Greater
    );
    assert_eq!(compare_fitness_vectors(&[1.0, 2.0], &[1.0, 2.0]), Ordering::Equal);
}

// Property coverage over generated suites: minimization may only shrink,
// and the covered-goal set is identical before and after.

const METHODS: [&str; 5] = ["alpha", "beta", "gamma", "delta", "epsilon"];

fn build_suite(calls_per_test: &[Vec<usize>]) -> TestSuiteChromosome {
    let mut suite = TestSuiteChromosome::new();
    for calls in calls_per_test {
        let mut tc = TestCase::new();
        let recv = tc.add_constructor("examples.Subject", vec![]);
        for &m in calls {
            tc.add_method_call(Some(recv.clone()), METHODS[m], vec![], TypeDesc::Void);
        }
        suite.add_test_case(tc);
    }
    suite
}

fn method_goal_factory() -> Arc<dyn GoalFactory> {
    StaticGoals::new(METHODS.iter().map(|m| MethodGoal::new(*m)).collect())
}

fn covered_set(factory: &Arc<dyn GoalFactory>, suite: &mut TestSuiteChromosome) -> Vec<GoalKey> {
    let mut covered = Vec::new();
    for goal in factory.coverage_goals() {
        if suite
            .tests_mut()
            .iter_mut()
            .any(|test| goal.is_covered(test))
        {
            covered.push(goal.key());
        }
    }
    covered
}

proptest! {
    #[test]
    fn prop_per_suite_minimization_preserves_coverage_and_never_grows(
        calls in proptest::collection::vec(
            proptest::collection::vec(0usize..METHODS.len(), 0..6),
            1..5,
        ),
        seed in 0u64..1000,
    ) {
        let factory = method_goal_factory();
        let mut suite = build_suite(&calls);
        let covered_before = covered_set(&factory, &mut suite);
        let length_before = suite.total_length();

        let minimizer = TestSuiteMinimizer::new(factory.clone());
        let mut rng = StdRng::seed_from_u64(seed);
        minimizer.minimize(&mut suite, false, &mut rng);

        prop_assert!(suite.total_length() <= length_before);
        let covered_after = covered_set(&factory, &mut suite);
        prop_assert_eq!(covered_before, covered_after);
    }

    #[test]
    fn prop_per_test_minimization_preserves_coverage(
        calls in proptest::collection::vec(
            proptest::collection::vec(0usize..METHODS.len(), 0..6),
            1..5,
        ),
        seed in 0u64..1000,
    ) {
        let factory = method_goal_factory();
        let mut suite = build_suite(&calls);
        let covered_before = covered_set(&factory, &mut suite);

        let minimizer = TestSuiteMinimizer::new(factory.clone());
        let mut rng = StdRng::seed_from_u64(seed);
        minimizer.minimize(&mut suite, true, &mut rng);

        let covered_after = covered_set(&factory, &mut suite);
        prop_assert_eq!(covered_before, covered_after);
    }
}
