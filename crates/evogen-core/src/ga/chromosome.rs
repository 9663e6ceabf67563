//! The test chromosome: one test case plus its evolutionary metadata.

use crate::ga::GoalKey;
use crate::testcase::execution::{ExecutionResult, Value};
use crate::testcase::factory::delete_statement_gracefully;
use crate::testcase::{StatementKind, TestCase};
use rand::{Rng, RngCore};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A test case wrapped with fitness and mutation state for the search.
#[derive(Debug, Clone)]
pub struct TestChromosome {
    id: Uuid,
    test: TestCase,
    fitness: Option<f64>,
    changed: bool,
    covered_goals: BTreeSet<GoalKey>,
    last_execution: Option<ExecutionResult>,
}

impl TestChromosome {
    pub fn new(test: TestCase) -> Self {
        Self {
            id: Uuid::new_v4(),
            test,
            fitness: None,
            changed: true,
            covered_goals: BTreeSet::new(),
            last_execution: None,
        }
    }

    /// Lineage identifier, stable across clones, used in reporting.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn test(&self) -> &TestCase {
        &self.test
    }

    /// Mutable access to the underlying test case. The caller is responsible
    /// for flagging the chromosome changed when it edits the case.
    pub fn test_mut(&mut self) -> &mut TestCase {
        &mut self.test
    }

    /// Number of statements in the underlying test case.
    pub fn size(&self) -> usize {
        self.test.size()
    }

    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Flags the chromosome changed. Going dirty invalidates the cached
    /// execution result.
    pub fn set_changed(&mut self, changed: bool) {
        self.changed = changed;
        if changed {
            self.last_execution = None;
        }
    }

    pub fn last_execution_result(&self) -> Option<&ExecutionResult> {
        self.last_execution.as_ref()
    }

    pub fn set_last_execution_result(&mut self, result: ExecutionResult) {
        self.last_execution = Some(result);
    }

    /// Goals recorded as covered by this chromosome, typically by
    /// `CoverageGoal::is_covered` side effects.
    pub fn covered_goals(&self) -> &BTreeSet<GoalKey> {
        &self.covered_goals
    }

    pub fn record_covered(&mut self, goal: GoalKey) {
        self.covered_goals.insert(goal);
    }

    pub fn clear_covered_goals(&mut self) {
        self.covered_goals.clear();
    }

    /// One chromosome-level mutation event: statements are deleted
    /// gracefully with probability `1/size` each, and literal definitions
    /// are nudged with the same probability. Statement insertion is the
    /// business of the chromosome factory that owns the class-under-test
    /// catalog, not of this crate.
    ///
    /// Returns whether anything changed; a change invalidates the cached
    /// execution result.
    pub fn mutate(&mut self, rng: &mut dyn RngCore) -> bool {
        let size = self.test.size();
        if size == 0 {
            return false;
        }
        let mut changed = false;
        let p = 1.0 / size as f64;

        for pos in (0..size).rev() {
            if pos >= self.test.size() {
                // Earlier cascading deletes already consumed this position.
                continue;
            }
            if rng.gen::<f64>() < p {
                if let Ok(true) = delete_statement_gracefully(&mut self.test, pos, rng) {
                    changed = true;
                }
            }
        }

        if !self.test.is_empty() {
            let p = 1.0 / self.test.size() as f64;
            for pos in 0..self.test.size() {
                if rng.gen::<f64>() >= p {
                    continue;
                }
                if let StatementKind::Primitive { value } = self.test.statement_mut(pos).kind_mut()
                {
                    *value = nudge_value(value, rng);
                    changed = true;
                }
            }
        }

        if changed {
            self.set_changed(true);
        }
        changed
    }
}

/// Small random perturbation of a literal, the classic primitive mutation.
fn nudge_value(value: &Value, rng: &mut dyn RngCore) -> Value {
    match value {
        Value::Int(v) => Value::Int(v.wrapping_add(rng.gen_range(-10..=10))),
        Value::Long(v) => Value::Long(v.wrapping_add(rng.gen_range(-10..=10))),
        Value::Short(v) => Value::Short(v.wrapping_add(rng.gen_range(-10i16..=10))),
        Value::Byte(v) => Value::Byte(v.wrapping_add(rng.gen_range(-5i8..=5))),
        Value::Bool(v) => Value::Bool(!v),
        Value::Char(c) => {
            char::from_u32((*c as u32).wrapping_add(rng.gen_range(1u32..=3)))
                .map(Value::Char)
                .unwrap_or(Value::Char('a'))
        }
        Value::Float(v) => Value::Float(v + rng.gen_range(-1.0f32..1.0)),
        Value::Double(v) => Value::Double(v + rng.gen_range(-1.0f64..1.0)),
        Value::Str(s) => {
            let mut s = s.clone();
            s.push(char::from(rng.gen_range(b'a'..=b'z')));
            Value::Str(s)
        }
        other => other.clone(),
    }
}
