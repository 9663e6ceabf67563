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

//! The test case: an ordered sequence of statements producing typed
//! variables, plus the structural-change epoch its position caches key on.

pub mod execution;
pub mod factory;
pub mod minimizer;
pub mod statement;
pub mod variable;

pub use statement::{Statement, StatementKind};
pub use variable::VariableRef;

use crate::testcase::execution::Value;
use crate::types::{ClassName, FieldDesc, TypeDesc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a produced variable, unique within its owning test case.
///
/// Handles survive cloning of the whole test case (the clone carries the
/// same ids, which only ever need to be unique per case), but are
/// meaningless across unrelated test cases.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VarId(u64);

impl VarId {
    /// Constructs an id with a known raw value. Intended for execution-side
    /// collaborators that persist scopes; test cases allocate their own ids.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// An ordered sequence of statements forming one candidate test.
///
/// Structural mutations (insert, remove) bump the epoch counter; variable
/// references compare their cached position against it and lazily recompute
/// after any structural change.
#[derive(Debug)]
pub struct TestCase {
    statements: Vec<Statement>,
    next_var: u64,
    epoch: AtomicU64,
}

impl Default for TestCase {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TestCase {
    fn clone(&self) -> Self {
        Self {
            statements: self.statements.clone(),
            next_var: self.next_var,
            epoch: AtomicU64::new(self.epoch()),
        }
    }
}

impl PartialEq for TestCase {
    fn eq(&self, other: &Self) -> bool {
        self.statements == other.statements
    }
}

impl TestCase {
    pub fn new() -> Self {
        Self {
            statements: Vec::new(),
            next_var: 0,
            epoch: AtomicU64::new(0),
        }
    }

    /// Number of statements.
    pub fn size(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// The statement at `position`. Panics when out of range; positions are
    /// an engine invariant, not user input.
    pub fn statement(&self, position: usize) -> &Statement {
        &self.statements[position]
    }

    pub(crate) fn statement_mut(&mut self, position: usize) -> &mut Statement {
        &mut self.statements[position]
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Current structural epoch. Bumped on every insert/remove/rewire, read
    /// by position caches.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn bump_epoch(&mut self) {
        self.epoch.fetch_add(1, Ordering::Release);
    }

    fn fresh_id(&mut self) -> VarId {
        let id = VarId(self.next_var);
        self.next_var += 1;
        id
    }

    fn push(&mut self, statement: Statement) -> &VariableRef {
        self.statements.push(statement);
        self.bump_epoch();
        self.statements.last().map(Statement::return_value).unwrap()
    }

    fn insert(&mut self, position: usize, statement: Statement) -> &VariableRef {
        self.statements.insert(position, statement);
        self.bump_epoch();
        self.statements[position].return_value()
    }

    /// Appends a literal definition and returns its variable.
    pub fn add_primitive(&mut self, ty: TypeDesc, value: Value) -> VariableRef {
        let ret = VariableRef::plain(self.fresh_id(), ty);
        self.push(Statement::new(ret, StatementKind::Primitive { value }))
            .clone()
    }

    /// Inserts a literal definition at `position`.
    pub fn insert_primitive(&mut self, position: usize, ty: TypeDesc, value: Value) -> VariableRef {
        let ret = VariableRef::plain(self.fresh_id(), ty);
        self.insert(position, Statement::new(ret, StatementKind::Primitive { value }))
            .clone()
    }

    /// Appends a constructor call and returns the constructed variable.
    pub fn add_constructor(
        &mut self,
        class: impl Into<String>,
        args: Vec<VariableRef>,
    ) -> VariableRef {
        let class = ClassName::new(class);
        let ret = VariableRef::plain(self.fresh_id(), TypeDesc::Class(class.clone()));
        self.push(Statement::new(ret, StatementKind::Constructor { class, args }))
            .clone()
    }

    /// Appends a method call and returns its declared result variable
    /// (of `Void` type for effect-only calls).
    pub fn add_method_call(
        &mut self,
        callee: Option<VariableRef>,
        method: impl Into<String>,
        args: Vec<VariableRef>,
        return_type: TypeDesc,
    ) -> VariableRef {
        let ret = VariableRef::plain(self.fresh_id(), return_type);
        self.push(Statement::new(
            ret,
            StatementKind::MethodCall {
                callee,
                method: method.into(),
                args,
            },
        ))
        .clone()
    }

    /// Appends an array declaration; the dimensionality follows the number
    /// of lengths given.
    pub fn add_array(&mut self, component: TypeDesc, lengths: Vec<usize>) -> VariableRef {
        let mut ty = component;
        for _ in 0..lengths.len() {
            ty = TypeDesc::array_of(ty);
        }
        let ret = VariableRef::array(self.fresh_id(), ty, lengths.clone());
        self.push(Statement::new(ret, StatementKind::ArrayDeclaration { lengths }))
            .clone()
    }

    /// Appends an assignment into the location named by `target` (an array
    /// slot or a field reference) and returns its position.
    pub fn add_assignment(&mut self, target: VariableRef, value: VariableRef) -> usize {
        debug_assert!(
            target.is_array_index() || target.is_field(),
            "assignment target must name an array slot or a field"
        );
        self.push(Statement::new(target, StatementKind::Assignment { value }));
        self.statements.len() - 1
    }

    /// Appends a field read and returns the fresh variable holding it.
    pub fn add_field_read(
        &mut self,
        field: FieldDesc,
        source: Option<VariableRef>,
    ) -> VariableRef {
        let ret = VariableRef::plain(self.fresh_id(), field.field_type().clone());
        self.push(Statement::new(ret, StatementKind::FieldRead { field, source }))
            .clone()
    }

    /// Removes and returns the statement at `position`.
    pub fn remove_statement(&mut self, position: usize) -> Statement {
        let removed = self.statements.remove(position);
        self.bump_epoch();
        removed
    }

    /// Whether any statement mentions `var`.
    pub fn references(&self, var: &VariableRef) -> bool {
        self.statements.iter().any(|s| s.references(var))
    }

    /// Replaces `old` with `new` in every statement from `from` onward.
    pub(crate) fn replace_references(
        &mut self,
        old: &VariableRef,
        new: &VariableRef,
        from: usize,
    ) {
        for statement in self.statements.iter_mut().skip(from) {
            statement.replace(old, new);
        }
        self.bump_epoch();
    }

    /// Source-like rendering of the whole test, for diagnostics.
    pub fn code(&self) -> String {
        self.statements
            .iter()
            .map(|s| s.code(self))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
