//! The execution scope: the mapping from variable identities to the runtime
//! values produced while a test case runs.

use crate::testcase::VarId;
use crate::testcase::execution::Value;
use crate::types::ClassName;
use std::collections::HashMap;

/// Runtime bindings for one execution of a test case.
///
/// Plain variables are keyed by their per-test-case identity; static fields
/// live in a separate per-class table since no object instance anchors them.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    values: HashMap<VarId, Value>,
    statics: HashMap<(ClassName, String), Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the variable to a value, replacing any previous binding.
    pub fn set(&mut self, id: VarId, value: Value) {
        self.values.insert(id, value);
    }

    /// The value bound to a variable, if the defining statement has executed.
    pub fn get(&self, id: VarId) -> Option<&Value> {
        self.values.get(&id)
    }

    pub fn get_mut(&mut self, id: VarId) -> Option<&mut Value> {
        self.values.get_mut(&id)
    }

    /// Binds a static field of `class`.
    pub fn set_static(&mut self, class: &ClassName, field: &str, value: Value) {
        self.statics
            .insert((class.clone(), field.to_string()), value);
    }

    pub fn get_static(&self, class: &ClassName, field: &str) -> Option<&Value> {
        self.statics.get(&(class.clone(), field.to_string()))
    }

    /// Mutable slot for a static field, created null on first touch.
    pub fn static_slot_mut(&mut self, class: &ClassName, field: &str) -> &mut Value {
        self.statics
            .entry((class.clone(), field.to_string()))
            .or_insert(Value::Null)
    }

    /// Number of bound (non-static) variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_roundtrip() {
        let mut scope = Scope::new();
        let id = VarId::new(7);
        scope.set(id, Value::Int(42));
        assert_eq!(scope.get(id), Some(&Value::Int(42)));
        assert_eq!(scope.get(VarId::new(8)), None);
    }

    #[test]
    fn test_statics_are_separate_from_variables() {
        let mut scope = Scope::new();
        let class = ClassName::new("examples.Counter");
        scope.set_static(&class, "count", Value::Int(3));
        assert_eq!(scope.get_static(&class, "count"), Some(&Value::Int(3)));
        assert!(scope.is_empty());
    }
}
