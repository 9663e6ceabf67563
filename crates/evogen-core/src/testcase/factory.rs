//! Structural rewrites of test cases: the graceful statement delete the
//! minimizer and the chromosome-level mutation operators build on.

use crate::errors::EvogenError;
use crate::testcase::execution::Value;
use crate::testcase::statement::{Statement, StatementKind};
use crate::testcase::variable::VariableRef;
use crate::testcase::TestCase;
use rand::{Rng, RngCore};
use tracing::debug;

/// Removes the statement at `position` and repairs the test case so that no
/// dangling reference remains: dependents are rewired onto compatible
/// earlier variables where possible, field accesses through the removed
/// value degrade to dead accesses on a null constant, and anything still
/// depending on a removed value is deleted transitively.
///
/// Returns `Ok(true)` when the test case changed. A structurally invalid
/// request (position out of range) fails with `ConstructionFailed`; callers
/// treat that as "this deletion attempt failed" and move on.
pub fn delete_statement_gracefully(
    tc: &mut TestCase,
    position: usize,
    rng: &mut dyn RngCore,
) -> Result<bool, EvogenError> {
    if position >= tc.size() {
        return Err(EvogenError::ConstructionFailed(format!(
            "no statement at position {} in a test case of {} statements",
            position,
            tc.size()
        )));
    }

    let mut removed_positions = vec![position];
    let mut removed_vars = vec![tc.statement(position).return_value().clone()];

    for pos in (position + 1)..tc.size() {
        let mentioned: Vec<VariableRef> = removed_vars
            .iter()
            .filter(|var| tc.statement(pos).references(var))
            .cloned()
            .collect();
        if mentioned.is_empty() {
            continue;
        }

        for var in &mentioned {
            let alternatives = compatible_alternatives(tc, var, pos, &removed_positions);
            if !alternatives.is_empty() {
                let choice = &alternatives[rng.gen_range(0..alternatives.len())];
                tc.statement_mut(pos).replace(var, choice);
            } else if null_substitutable(tc.statement(pos), var) {
                let dead = VariableRef::constant(var.ty().clone(), Value::Null);
                tc.statement_mut(pos).replace(var, &dead);
            }
        }

        let still_dangling = removed_vars
            .iter()
            .any(|var| tc.statement(pos).references(var));
        if still_dangling {
            debug!(position = pos, "removing dependent statement transitively");
            removed_vars.push(tc.statement(pos).return_value().clone());
            removed_positions.push(pos);
        }
    }

    for pos in removed_positions.into_iter().rev() {
        tc.remove_statement(pos);
    }
    Ok(true)
}

/// Variables defined strictly before `before`, type-compatible with `var`,
/// whose defining statements are not themselves being removed.
fn compatible_alternatives(
    tc: &TestCase,
    var: &VariableRef,
    before: usize,
    removed_positions: &[usize],
) -> Vec<VariableRef> {
    let mut result = Vec::new();
    for pos in 0..before.min(tc.size()) {
        if removed_positions.contains(&pos) {
            continue;
        }
        let candidate = tc.statement(pos).return_value();
        if candidate == var || candidate.id().is_none() {
            continue;
        }
        if candidate.ty().is_assignable_to(var.ty()) {
            result.push(candidate.clone());
        }
    }
    result
}

/// Whether every mention of `var` in `statement` tolerates a null constant:
/// field accesses degrade to dead accesses, array bases and plain operands
/// do not.
fn null_substitutable(statement: &Statement, var: &VariableRef) -> bool {
    let mut any = false;
    for r in statement.variable_references() {
        if r == var {
            match statement.kind() {
                StatementKind::FieldRead {
                    source: Some(source),
                    ..
                } if source == var => any = true,
                _ => return false,
            }
        } else if r.uses(var) {
            if base_chain_mentions_as_array(r, var) {
                return false;
            }
            any = true;
        }
    }
    any
}

fn base_chain_mentions_as_array(r: &VariableRef, var: &VariableRef) -> bool {
    match r {
        VariableRef::ArrayIndex(_) => r.uses(var),
        VariableRef::Field(_) => match r.base_reference() {
            Some(base) => base == var && base.is_array_reference(),
            None => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcase::execution::Value;
    use crate::types::{FieldDesc, PrimitiveKind, TypeDesc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn int_ty() -> TypeDesc {
        TypeDesc::Primitive(PrimitiveKind::Int)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_delete_rewires_to_compatible_alternative() {
        let mut tc = TestCase::new();
        let a = tc.add_primitive(int_ty(), Value::Int(1));
        let b = tc.add_primitive(int_ty(), Value::Int(2));
        let stack = tc.add_constructor("examples.Stack", vec![]);
        tc.add_method_call(Some(stack), "push", vec![b.clone()], TypeDesc::Void);

        let changed = delete_statement_gracefully(&mut tc, 1, &mut rng()).unwrap();
        assert!(changed);
        // The push survived, rewired onto the remaining int variable.
        assert_eq!(tc.size(), 3);
        assert!(tc.references(&a));
        for statement in tc.statements() {
            for var in statement.variable_references() {
                assert!(var != &b, "dangling reference to the deleted variable");
            }
        }
    }

    #[test]
    fn test_delete_cascades_when_no_alternative_exists() {
        let mut tc = TestCase::new();
        let stack = tc.add_constructor("examples.Stack", vec![]);
        let v = tc.add_primitive(int_ty(), Value::Int(3));
        tc.add_method_call(Some(stack.clone()), "push", vec![v], TypeDesc::Void);

        // Deleting the only Stack removes the call depending on it.
        let changed = delete_statement_gracefully(&mut tc, 0, &mut rng()).unwrap();
        assert!(changed);
        assert_eq!(tc.size(), 1);
        assert!(!tc.references(&stack));
    }

    #[test]
    fn test_delete_degrades_field_read_to_dead_access() {
        let mut tc = TestCase::new();
        let obj = tc.add_constructor("examples.Counter", vec![]);
        let field = FieldDesc::new("examples.Counter", "count", int_ty(), false, true);
        tc.add_field_read(field, Some(obj.clone()));

        let changed = delete_statement_gracefully(&mut tc, 0, &mut rng()).unwrap();
        assert!(changed);
        // The field read survives as a dead access on a null constant.
        assert_eq!(tc.size(), 1);
        match tc.statement(0).kind() {
            StatementKind::FieldRead {
                source: Some(source),
                ..
            } => {
                assert!(source.is_constant());
                assert_eq!(source.constant_value(), Some(&Value::Null));
            }
            other => panic!("unexpected statement kind: {other:?}"),
        }
    }

    #[test]
    fn test_delete_out_of_range_is_construction_failure() {
        let mut tc = TestCase::new();
        let err = delete_statement_gracefully(&mut tc, 0, &mut rng()).unwrap_err();
        assert!(matches!(err, EvogenError::ConstructionFailed(_)));
    }

    #[test]
    fn test_delete_array_cascades_through_slots() {
        let mut tc = TestCase::new();
        let v = tc.add_primitive(int_ty(), Value::Int(1));
        let arr = tc.add_array(int_ty(), vec![3]);
        tc.add_assignment(VariableRef::array_index(arr.clone(), vec![0]), v.clone());

        let changed = delete_statement_gracefully(&mut tc, 1, &mut rng()).unwrap();
        assert!(changed);
        // No second array exists, so the slot assignment goes with it.
        assert_eq!(tc.size(), 1);
        assert!(tc.references(&v) || tc.statement(0).return_value() == &v);
    }
}
