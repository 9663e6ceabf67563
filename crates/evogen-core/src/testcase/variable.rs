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

//! Variable references: typed handles to the values a test case produces.
//!
//! A reference is only meaningful relative to the test case that owns it.
//! The set of kinds is closed: a value is either the direct result of a
//! statement, a slot of an array, a field of an object, an embedded
//! constant, or the null literal. Every operation therefore matches
//! exhaustively instead of dispatching virtually.

use crate::errors::{CodeUnderTestError, EvogenError};
use crate::testcase::execution::{convert_for_slot, Scope, Value};
use crate::testcase::statement::Statement;
use crate::testcase::{TestCase, VarId};
use crate::types::{FieldDesc, TypeDesc};
use std::sync::Mutex;
use tracing::{debug, error, warn};

/// Write-once provenance: the source text a carved or parsed test originally
/// used for this variable. Ignored by equality; two references to the same
/// value are the same reference no matter where their text came from.
#[derive(Debug, Clone, Default)]
pub struct Provenance(Option<String>);

impl Provenance {
    fn record(&mut self, code: &str) {
        if let Some(existing) = &self.0 {
            debug!(existing, new = code, "original code already set, keeping it");
            return;
        }
        self.0 = Some(code.trim().to_string());
    }

    fn get(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl PartialEq for Provenance {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// Epoch-stamped cache of a reference's defining position.
///
/// Guarded by a per-reference mutex: a reader racing the driver's mutation
/// thread sees either the previous stamp (and rescans) or the new one, never
/// a torn pair.
#[derive(Debug, Default)]
struct PositionCache(Mutex<Option<(u64, usize)>>);

impl PositionCache {
    fn lookup(&self, tc: &TestCase, id: VarId, ty: &TypeDesc) -> usize {
        let epoch = tc.epoch();
        let mut slot = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((seen, position)) = *slot {
            if seen == epoch {
                return position;
            }
        }
        let position = find_defining_position(tc, id).unwrap_or_else(|| {
            panic!(
                "variable of type {} has no defining statement in a test case of {} statements; \
                 a reference's position is only defined while its statement is in the test case",
                ty.type_name(),
                tc.size()
            )
        });
        *slot = Some((epoch, position));
        position
    }
}

impl Clone for PositionCache {
    fn clone(&self) -> Self {
        Self(Mutex::new(*self.0.lock().unwrap_or_else(|e| e.into_inner())))
    }
}

impl PartialEq for PositionCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

fn find_defining_position(tc: &TestCase, id: VarId) -> Option<usize> {
    tc.statements()
        .iter()
        .position(|s| s.return_value().id() == Some(id))
}

/// The direct result of a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct PlainRef {
    pub(crate) id: VarId,
    pub(crate) ty: TypeDesc,
    origin: Provenance,
    cache: PositionCache,
}

/// An array produced by an array declaration; knows its dimension lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayRef {
    pub(crate) id: VarId,
    pub(crate) ty: TypeDesc,
    pub(crate) lengths: Vec<usize>,
    origin: Provenance,
    cache: PositionCache,
}

/// One slot of an array, e.g. `arr[3]` or `grid[1][2]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayIndexRef {
    pub(crate) array: Box<VariableRef>,
    pub(crate) indices: Vec<usize>,
    pub(crate) ty: TypeDesc,
    origin: Provenance,
}

/// A field of an object (`a.b`, chains allowed) or a static field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub(crate) field: FieldDesc,
    pub(crate) source: Option<Box<VariableRef>>,
    pub(crate) ty: TypeDesc,
    origin: Provenance,
}

/// A literal embedded directly into a statement; no statement computes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantRef {
    pub(crate) ty: TypeDesc,
    pub(crate) value: Value,
    origin: Provenance,
}

/// The null literal, typed.
#[derive(Debug, Clone, PartialEq)]
pub struct NullRef {
    pub(crate) ty: TypeDesc,
    origin: Provenance,
}

/// A typed handle denoting a value produced somewhere in a test case.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableRef {
    Plain(PlainRef),
    Array(ArrayRef),
    ArrayIndex(ArrayIndexRef),
    Field(FieldRef),
    Constant(ConstantRef),
    Null(NullRef),
}

impl VariableRef {
    pub(crate) fn plain(id: VarId, ty: TypeDesc) -> Self {
        VariableRef::Plain(PlainRef {
            id,
            ty,
            origin: Provenance::default(),
            cache: PositionCache::default(),
        })
    }

    pub(crate) fn array(id: VarId, ty: TypeDesc, lengths: Vec<usize>) -> Self {
        debug_assert!(ty.is_array(), "array reference must carry an array type");
        debug_assert!(!lengths.is_empty());
        VariableRef::Array(ArrayRef {
            id,
            ty,
            lengths,
            origin: Provenance::default(),
            cache: PositionCache::default(),
        })
    }

    /// A reference to the slot of `array` at `indices` (one index per
    /// dimension walked). The base must be an array reference.
    pub fn array_index(array: VariableRef, indices: Vec<usize>) -> Self {
        assert!(
            matches!(array, VariableRef::Array(_)),
            "array index base must be an array reference"
        );
        assert!(!indices.is_empty(), "array index needs at least one index");
        let ty = array
            .ty()
            .element_at_depth(indices.len())
            .unwrap_or_else(|| {
                panic!(
                    "array of type {} has no element at depth {}",
                    array.ty(),
                    indices.len()
                )
            })
            .clone();
        VariableRef::ArrayIndex(ArrayIndexRef {
            array: Box::new(array),
            indices,
            ty,
            origin: Provenance::default(),
        })
    }

    /// A reference to a field access. `source` is `None` iff the field is
    /// static.
    pub fn field(field: FieldDesc, source: Option<VariableRef>) -> Self {
        assert!(
            source.is_some() || field.is_static(),
            "non-static field access requires a source object"
        );
        let ty = field.field_type().clone();
        VariableRef::Field(FieldRef {
            field,
            source: source.map(Box::new),
            ty,
            origin: Provenance::default(),
        })
    }

    /// An embedded literal.
    pub fn constant(ty: TypeDesc, value: Value) -> Self {
        VariableRef::Constant(ConstantRef {
            ty,
            value,
            origin: Provenance::default(),
        })
    }

    /// The null literal with a declared type.
    pub fn null(ty: TypeDesc) -> Self {
        VariableRef::Null(NullRef {
            ty,
            origin: Provenance::default(),
        })
    }

    /// Declared type of the value this reference denotes.
    pub fn ty(&self) -> &TypeDesc {
        match self {
            VariableRef::Plain(r) => &r.ty,
            VariableRef::Array(r) => &r.ty,
            VariableRef::ArrayIndex(r) => &r.ty,
            VariableRef::Field(r) => &r.ty,
            VariableRef::Constant(r) => &r.ty,
            VariableRef::Null(r) => &r.ty,
        }
    }

    /// Per-test-case identity, present for statement-produced references.
    pub fn id(&self) -> Option<VarId> {
        match self {
            VariableRef::Plain(r) => Some(r.id),
            VariableRef::Array(r) => Some(r.id),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.ty().is_array()
    }

    pub fn is_array_reference(&self) -> bool {
        matches!(self, VariableRef::Array(_))
    }

    pub fn is_array_index(&self) -> bool {
        matches!(self, VariableRef::ArrayIndex(_))
    }

    pub fn is_field(&self) -> bool {
        matches!(self, VariableRef::Field(_))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, VariableRef::Constant(_))
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self, VariableRef::Null(_))
    }

    pub fn is_primitive(&self) -> bool {
        self.ty().is_primitive()
    }

    pub fn is_void(&self) -> bool {
        self.ty().is_void()
    }

    /// The embedded literal of a constant reference.
    pub fn constant_value(&self) -> Option<&Value> {
        match self {
            VariableRef::Constant(r) => Some(&r.value),
            _ => None,
        }
    }

    /// Indices of an array-slot reference.
    pub fn indices(&self) -> Option<&[usize]> {
        match self {
            VariableRef::ArrayIndex(r) => Some(&r.indices),
            _ => None,
        }
    }

    /// Dimension lengths of an array reference.
    pub fn lengths(&self) -> Option<&[usize]> {
        match self {
            VariableRef::Array(r) => Some(&r.lengths),
            _ => None,
        }
    }

    /// Field descriptor of a field reference.
    pub fn field_desc(&self) -> Option<&FieldDesc> {
        match self {
            VariableRef::Field(r) => Some(&r.field),
            _ => None,
        }
    }

    /// Nesting depth of a field chain: `a.b` is 1, `a.b.c` is 2 on the
    /// outer reference. Non-field references have depth 0.
    pub fn depth(&self) -> usize {
        match self {
            VariableRef::Field(r) => {
                1 + r.source.as_deref().map_or(0, VariableRef::depth)
            }
            _ => 0,
        }
    }

    /// Whether the framework may access the denoted location at all.
    pub fn is_accessible(&self) -> bool {
        match self {
            VariableRef::Field(r) => r.field.is_accessible(),
            _ => true,
        }
    }

    /// Records the original source text, first writer wins.
    pub fn set_origin(&mut self, code: &str) {
        match self {
            VariableRef::Plain(r) => r.origin.record(code),
            VariableRef::Array(r) => r.origin.record(code),
            VariableRef::ArrayIndex(r) => r.origin.record(code),
            VariableRef::Field(r) => r.origin.record(code),
            VariableRef::Constant(r) => r.origin.record(code),
            VariableRef::Null(r) => r.origin.record(code),
        }
    }

    pub fn origin(&self) -> Option<&str> {
        match self {
            VariableRef::Plain(r) => r.origin.get(),
            VariableRef::Array(r) => r.origin.get(),
            VariableRef::ArrayIndex(r) => r.origin.get(),
            VariableRef::Field(r) => r.origin.get(),
            VariableRef::Constant(r) => r.origin.get(),
            VariableRef::Null(r) => r.origin.get(),
        }
    }

    /// Position of the statement defining this reference in `tc`.
    ///
    /// Panics when no statement defines or references it; that is an
    /// engine invariant violation, not a condition callers handle.
    pub fn position(&self, tc: &TestCase) -> usize {
        match self {
            VariableRef::Plain(r) => r.cache.lookup(tc, r.id, &r.ty),
            VariableRef::Array(r) => r.cache.lookup(tc, r.id, &r.ty),
            VariableRef::ArrayIndex(r) => tc
                .statements()
                .iter()
                .position(|s| s.return_value() == self)
                // No assignment ever targeted this slot, so the array's own
                // defining statement is where the value came from.
                .unwrap_or_else(|| r.array.position(tc)),
            VariableRef::Field(r) => {
                if let Some(position) = tc
                    .statements()
                    .iter()
                    .position(|s| s.return_value() == self)
                {
                    return position;
                }
                if let Some(source) = &r.source {
                    return source.position(tc);
                }
                tc.statements()
                    .iter()
                    .position(|s| s.references(self))
                    .unwrap_or_else(|| {
                        panic!(
                            "static field access {} is not referenced by any statement",
                            r.field.qualified_name()
                        )
                    })
            }
            VariableRef::Constant(_) | VariableRef::Null(_) => tc
                .statements()
                .iter()
                .position(|s| s.references(self))
                .unwrap_or_else(|| {
                    panic!("embedded literal is not referenced by any statement in the test case")
                }),
        }
    }

    /// Whether the base chain of this (derived) reference contains `var`.
    pub fn uses(&self, var: &VariableRef) -> bool {
        match self {
            VariableRef::ArrayIndex(r) => r.array.as_ref() == var || r.array.uses(var),
            VariableRef::Field(r) => r
                .source
                .as_deref()
                .is_some_and(|s| s == var || s.uses(var)),
            _ => false,
        }
    }

    /// Reads the concrete runtime value this reference denotes in `scope`.
    pub fn value_in(&self, scope: &Scope) -> Result<Value, EvogenError> {
        match self {
            VariableRef::Plain(r) => Ok(scope.get(r.id).cloned().unwrap_or(Value::Null)),
            VariableRef::Array(r) => Ok(scope.get(r.id).cloned().unwrap_or(Value::Null)),
            VariableRef::ArrayIndex(r) => {
                let base_id = array_base_id(r);
                let mut current = scope.get(base_id).unwrap_or(&Value::Null);
                for idx in &r.indices {
                    let array = match current {
                        Value::Null => {
                            return Err(CodeUnderTestError::NullDereference.into())
                        }
                        Value::Array(a) => a,
                        other => {
                            return Err(CodeUnderTestError::TypeMismatch {
                                expected: "array".to_string(),
                                actual: other.describe(),
                            }
                            .into())
                        }
                    };
                    if *idx >= array.elements.len() {
                        return Err(CodeUnderTestError::IndexOutOfBounds {
                            index: *idx,
                            length: array.elements.len(),
                        }
                        .into());
                    }
                    current = &array.elements[*idx];
                }
                Ok(current.clone())
            }
            VariableRef::Field(r) => {
                if !r.field.is_accessible() {
                    error!(
                        field = %r.field.qualified_name(),
                        "framework denied access to field"
                    );
                    return Err(EvogenError::InaccessibleField {
                        field: r.field.qualified_name(),
                    });
                }
                match &r.source {
                    None => Ok(scope
                        .get_static(r.field.owner(), r.field.name())
                        .cloned()
                        .unwrap_or_else(|| Value::default_for(r.field.field_type()))),
                    Some(source) => match source.value_in(scope)? {
                        Value::Null => Err(CodeUnderTestError::NullDereference.into()),
                        Value::Object(object) => Ok(object
                            .fields
                            .get(r.field.name())
                            .cloned()
                            .unwrap_or_else(|| Value::default_for(r.field.field_type()))),
                        other => Err(CodeUnderTestError::TypeMismatch {
                            expected: r.field.owner().to_string(),
                            actual: other.describe(),
                        }
                        .into()),
                    },
                }
            }
            VariableRef::Constant(r) => Ok(r.value.clone()),
            VariableRef::Null(_) => Ok(Value::Null),
        }
    }

    /// Writes `value` to the location this reference denotes in `scope`,
    /// applying the array-slot conversion rules for typed slots.
    pub fn assign_in(&self, scope: &mut Scope, value: Value) -> Result<(), EvogenError> {
        match self {
            VariableRef::Plain(r) => {
                scope.set(r.id, value);
                Ok(())
            }
            VariableRef::Array(r) => {
                scope.set(r.id, value);
                Ok(())
            }
            VariableRef::ArrayIndex(r) => {
                let base_id = array_base_id(r);
                let mut current = match scope.get_mut(base_id) {
                    Some(v) => v,
                    None => return Err(CodeUnderTestError::NullDereference.into()),
                };
                let (last, walk) = r
                    .indices
                    .split_last()
                    .expect("array index carries at least one index");
                for idx in walk {
                    let array = match current {
                        Value::Null => {
                            return Err(CodeUnderTestError::NullDereference.into())
                        }
                        Value::Array(a) => a,
                        other => {
                            return Err(CodeUnderTestError::TypeMismatch {
                                expected: "array".to_string(),
                                actual: other.describe(),
                            }
                            .into())
                        }
                    };
                    if *idx >= array.elements.len() {
                        return Err(CodeUnderTestError::IndexOutOfBounds {
                            index: *idx,
                            length: array.elements.len(),
                        }
                        .into());
                    }
                    current = &mut array.elements[*idx];
                }
                let array = match current {
                    Value::Null => return Err(CodeUnderTestError::NullDereference.into()),
                    Value::Array(a) => a,
                    other => {
                        return Err(CodeUnderTestError::TypeMismatch {
                            expected: "array".to_string(),
                            actual: other.describe(),
                        }
                        .into())
                    }
                };
                if *last >= array.elements.len() {
                    return Err(CodeUnderTestError::IndexOutOfBounds {
                        index: *last,
                        length: array.elements.len(),
                    }
                    .into());
                }
                array.elements[*last] = convert_for_slot(&array.component, value)?;
                Ok(())
            }
            VariableRef::Field(r) => {
                if !r.field.is_accessible() {
                    error!(
                        field = %r.field.qualified_name(),
                        "framework denied access to field"
                    );
                    return Err(EvogenError::InaccessibleField {
                        field: r.field.qualified_name(),
                    });
                }
                let converted = convert_for_slot(r.field.field_type(), value)?;
                match &r.source {
                    None => {
                        scope.set_static(r.field.owner(), r.field.name(), converted);
                        Ok(())
                    }
                    Some(source) => match resolve_mut(source, scope)? {
                        Value::Null => Err(CodeUnderTestError::NullDereference.into()),
                        Value::Object(object) => {
                            object.fields.insert(r.field.name().to_string(), converted);
                            Ok(())
                        }
                        other => Err(CodeUnderTestError::TypeMismatch {
                            expected: r.field.owner().to_string(),
                            actual: other.describe(),
                        }
                        .into()),
                    },
                }
            }
            VariableRef::Constant(_) | VariableRef::Null(_) => Err(EvogenError::InternalError(
                "embedded literals are not assignable locations".to_string(),
            )),
        }
    }

    /// Produces the equivalent reference in `target`, whose statements are
    /// `offset` positions away from this reference's statements in `source`.
    pub fn copy_to(&self, source: &TestCase, target: &TestCase, offset: isize) -> VariableRef {
        match self {
            VariableRef::Plain(_) => {
                let position = shifted(self.position(source), offset);
                target.statement(position).return_value().clone()
            }
            VariableRef::Array(r) => {
                let position = shifted(self.position(source), offset);
                let ret = target.statement(position).return_value();
                if ret.is_array_reference() {
                    ret.clone()
                } else {
                    // The target statement lost its array typing (e.g. a
                    // loosely typed placeholder from cloning); rebind by
                    // fabricating an array reference over its identity.
                    let id = ret.id().unwrap_or_else(|| {
                        panic!("statement return value carries no identity to rebind to")
                    });
                    VariableRef::Array(ArrayRef {
                        id,
                        ty: r.ty.clone(),
                        lengths: r.lengths.clone(),
                        origin: Provenance::default(),
                        cache: PositionCache::default(),
                    })
                }
            }
            VariableRef::ArrayIndex(r) => {
                let array = r.array.copy_to(source, target, offset);
                VariableRef::array_index(array, r.indices.clone())
            }
            VariableRef::Field(r) => {
                let copied = r
                    .source
                    .as_deref()
                    .map(|s| s.copy_to(source, target, offset));
                VariableRef::field(r.field.clone(), copied)
            }
            VariableRef::Constant(r) => VariableRef::constant(r.ty.clone(), r.value.clone()),
            VariableRef::Null(_) => {
                panic!("null references carry no state and are never copied across test cases")
            }
        }
    }

    /// The reference to attach when rewriting `statement` in place: reuses
    /// an existing `same`-matching constant instead of duplicating it,
    /// clones anything else.
    pub fn clone_for_statement(&self, statement: &Statement) -> VariableRef {
        if let VariableRef::Constant(c) = self {
            for existing in statement.variable_references() {
                if let VariableRef::Constant(o) = existing {
                    if o.ty == c.ty && o.value == c.value {
                        return existing.clone();
                    }
                }
            }
        }
        self.clone()
    }

    /// Logical sameness: same resolved position, same declared type, and
    /// for derived kinds the same base/indices/field. Constants compare by
    /// type and value only, since equal literals are interchangeable no
    /// matter which statements embed them.
    pub fn same(&self, other: &VariableRef, tc: &TestCase) -> bool {
        match (self, other) {
            (VariableRef::Constant(a), VariableRef::Constant(b)) => {
                a.ty == b.ty && a.value == b.value
            }
            (VariableRef::Null(a), VariableRef::Null(b)) => a.ty == b.ty,
            (VariableRef::ArrayIndex(a), VariableRef::ArrayIndex(b)) => {
                self.position(tc) == other.position(tc)
                    && a.array.same(b.array.as_ref(), tc)
                    && a.indices == b.indices
            }
            (VariableRef::Field(a), VariableRef::Field(b)) => {
                if self.position(tc) != other.position(tc) || a.field != b.field {
                    return false;
                }
                match (&a.source, &b.source) {
                    (None, None) => true,
                    (Some(x), Some(y)) => x.same(y.as_ref(), tc),
                    _ => false,
                }
            }
            (VariableRef::Plain(_) | VariableRef::Array(_), VariableRef::Plain(_) | VariableRef::Array(_)) => {
                self.position(tc) == other.position(tc) && self.ty() == other.ty()
            }
            _ => false,
        }
    }

    /// The base this derived reference hangs off: the array under a slot,
    /// the root object under a field chain. `None` for direct references
    /// and static field accesses.
    pub fn base_reference(&self) -> Option<&VariableRef> {
        match self {
            VariableRef::ArrayIndex(r) => {
                Some(r.array.base_reference().unwrap_or(r.array.as_ref()))
            }
            VariableRef::Field(r) => r
                .source
                .as_deref()
                .map(|s| s.base_reference().unwrap_or(s)),
            _ => None,
        }
    }

    /// Installs a new base reference. Refuses to rebase an array slot onto
    /// anything that is not an array reference.
    pub fn set_base_reference(&mut self, var: VariableRef) -> Result<(), EvogenError> {
        match self {
            VariableRef::ArrayIndex(r) => {
                if !var.is_array_reference() {
                    return Err(EvogenError::ConstructionFailed(format!(
                        "cannot rebase an array slot onto a value of type {}",
                        var.ty()
                    )));
                }
                r.array = Box::new(var);
                Ok(())
            }
            VariableRef::Field(r) => {
                if !var
                    .ty()
                    .is_assignable_to(&TypeDesc::Class(r.field.owner().clone()))
                {
                    warn!(
                        field = %r.field.qualified_name(),
                        source_type = %var.ty(),
                        "field source replaced with a value of an unrelated type"
                    );
                }
                r.source = Some(Box::new(var));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Splices `new` in wherever the base chain of this reference mentions
    /// `old`. An incompatible replacement is silently refused, with one
    /// allowance: a null constant may become a field's source, modelling a
    /// graceful delete that leaves a dead field access behind.
    pub fn replace_reference(&mut self, old: &VariableRef, new: &VariableRef) {
        match self {
            VariableRef::ArrayIndex(r) => {
                if r.array.as_ref() == old {
                    if new.is_array_reference() {
                        r.array = Box::new(new.clone());
                    }
                } else {
                    r.array.replace_reference(old, new);
                }
            }
            VariableRef::Field(r) => {
                if let Some(source) = &mut r.source {
                    if source.as_ref() == old {
                        let compatible = new
                            .ty()
                            .is_assignable_to(&TypeDesc::Class(r.field.owner().clone()));
                        let null_constant = matches!(
                            new,
                            VariableRef::Constant(c) if c.value.is_null()
                        ) || new.is_null_literal();
                        if compatible || null_constant {
                            *source = Box::new(new.clone());
                        }
                    } else {
                        source.replace_reference(old, new);
                    }
                }
            }
            _ => {}
        }
    }

    /// Whether any assignment before `upto` initialized the slot of this
    /// array at `indices`.
    pub fn slot_initialized(&self, tc: &TestCase, indices: &[usize], upto: usize) -> bool {
        let id = match self {
            VariableRef::Array(r) => r.id,
            _ => panic!("slot bookkeeping is only defined on array references"),
        };
        tc.statements()
            .iter()
            .take(upto.min(tc.size()))
            .any(|statement| match statement.return_value() {
                VariableRef::ArrayIndex(target) => {
                    matches!(statement.kind(), crate::testcase::StatementKind::Assignment { .. })
                        && target.array.id() == Some(id)
                        && target.indices == indices
                }
                _ => false,
            })
    }

    /// The largest first-dimension index any statement references against
    /// this array; 0 when nothing indexes it. Decides the minimum length
    /// the array must keep for the test to stay valid after edits.
    pub fn max_referenced_index(&self, tc: &TestCase) -> usize {
        let id = match self {
            VariableRef::Array(r) => r.id,
            _ => panic!("slot bookkeeping is only defined on array references"),
        };
        let mut max = 0;
        for statement in tc.statements() {
            for var in statement.variable_references() {
                if let VariableRef::ArrayIndex(r) = var {
                    if r.array.id() == Some(id) {
                        if let Some(first) = r.indices.first() {
                            max = max.max(*first);
                        }
                    }
                }
            }
        }
        max
    }

    /// Name used in rendered code: `var3`, `arr1[0]`, `var2.count`, a
    /// literal for constants.
    pub fn name(&self, tc: &TestCase) -> String {
        match self {
            VariableRef::Plain(_) => format!("var{}", self.position(tc)),
            VariableRef::Array(_) => format!("arr{}", self.position(tc)),
            VariableRef::ArrayIndex(r) => {
                let mut name = r.array.name(tc);
                for idx in &r.indices {
                    name.push_str(&format!("[{idx}]"));
                }
                name
            }
            VariableRef::Field(r) => match &r.source {
                Some(source) => format!("{}.{}", source.name(tc), r.field.name()),
                None => r.field.qualified_name(),
            },
            VariableRef::Constant(r) => r.value.to_string(),
            VariableRef::Null(_) => "null".to_string(),
        }
    }
}

fn array_base_id(r: &ArrayIndexRef) -> VarId {
    match r.array.as_ref() {
        VariableRef::Array(a) => a.id,
        _ => panic!("array index base must be an array reference"),
    }
}

fn shifted(position: usize, offset: isize) -> usize {
    let shifted = position as isize + offset;
    assert!(shifted >= 0, "copy offset moved a statement position below zero");
    shifted as usize
}

fn resolve_mut<'a>(var: &VariableRef, scope: &'a mut Scope) -> Result<&'a mut Value, EvogenError> {
    match var {
        VariableRef::Plain(r) => scope
            .get_mut(r.id)
            .ok_or_else(|| CodeUnderTestError::NullDereference.into()),
        VariableRef::Array(r) => scope
            .get_mut(r.id)
            .ok_or_else(|| CodeUnderTestError::NullDereference.into()),
        VariableRef::ArrayIndex(r) => {
            let base_id = array_base_id(r);
            let mut current = match scope.get_mut(base_id) {
                Some(v) => v,
                None => return Err(CodeUnderTestError::NullDereference.into()),
            };
            for idx in &r.indices {
                let array = match current {
                    Value::Null => return Err(CodeUnderTestError::NullDereference.into()),
                    Value::Array(a) => a,
                    other => {
                        return Err(CodeUnderTestError::TypeMismatch {
                            expected: "array".to_string(),
                            actual: other.describe(),
                        }
                        .into())
                    }
                };
                if *idx >= array.elements.len() {
                    return Err(CodeUnderTestError::IndexOutOfBounds {
                        index: *idx,
                        length: array.elements.len(),
                    }
                    .into());
                }
                current = &mut array.elements[*idx];
            }
            Ok(current)
        }
        VariableRef::Field(r) => {
            if !r.field.is_accessible() {
                error!(field = %r.field.qualified_name(), "framework denied access to field");
                return Err(EvogenError::InaccessibleField {
                    field: r.field.qualified_name(),
                });
            }
            match &r.source {
                None => Ok(scope.static_slot_mut(r.field.owner(), r.field.name())),
                Some(source) => match resolve_mut(source, scope)? {
                    Value::Null => Err(CodeUnderTestError::NullDereference.into()),
                    Value::Object(object) => Ok(object
                        .fields
                        .entry(r.field.name().to_string())
                        .or_insert_with(|| Value::default_for(r.field.field_type()))),
                    other => Err(CodeUnderTestError::TypeMismatch {
                        expected: r.field.owner().to_string(),
                        actual: other.describe(),
                    }
                    .into()),
                },
            }
        }
        VariableRef::Constant(_) | VariableRef::Null(_) => Err(EvogenError::InternalError(
            "embedded literals are not assignable locations".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcase::execution::ArrayValue;
    use crate::types::PrimitiveKind;

    fn int_ty() -> TypeDesc {
        TypeDesc::Primitive(PrimitiveKind::Int)
    }

    fn short_array_case() -> (TestCase, VariableRef) {
        let mut tc = TestCase::new();
        let arr = tc.add_array(TypeDesc::Primitive(PrimitiveKind::Short), vec![4]);
        (tc, arr)
    }

    fn bind_array(scope: &mut Scope, arr: &VariableRef, component: TypeDesc, length: usize) {
        scope.set(
            arr.id().unwrap(),
            Value::Array(ArrayValue::new(component, length)),
        );
    }

    #[test]
    fn test_array_slot_write_narrows_boxed_int_to_short() {
        let (_tc, arr) = short_array_case();
        let slot = VariableRef::array_index(arr.clone(), vec![0]);
        let mut scope = Scope::new();
        bind_array(&mut scope, &arr, TypeDesc::Primitive(PrimitiveKind::Short), 4);

        slot.assign_in(&mut scope, Value::Int(0x1_2345)).unwrap();
        assert_eq!(slot.value_in(&scope).unwrap(), Value::Short(0x2345));
    }

    #[test]
    fn test_null_into_primitive_array_slot_is_code_under_test() {
        let (_tc, arr) = short_array_case();
        let slot = VariableRef::array_index(arr.clone(), vec![0]);
        let mut scope = Scope::new();
        bind_array(&mut scope, &arr, TypeDesc::Primitive(PrimitiveKind::Short), 4);

        let err = slot.assign_in(&mut scope, Value::Null).unwrap_err();
        assert!(err.is_code_under_test());
    }

    #[test]
    fn test_array_slot_out_of_bounds_is_code_under_test() {
        let (_tc, arr) = short_array_case();
        let slot = VariableRef::array_index(arr.clone(), vec![9]);
        let mut scope = Scope::new();
        bind_array(&mut scope, &arr, TypeDesc::Primitive(PrimitiveKind::Short), 4);

        let err = slot.value_in(&scope).unwrap_err();
        assert!(matches!(
            err,
            EvogenError::CodeUnderTest(CodeUnderTestError::IndexOutOfBounds { index: 9, length: 4 })
        ));
    }

    #[test]
    fn test_unbound_array_reads_as_null_dereference() {
        let (_tc, arr) = short_array_case();
        let slot = VariableRef::array_index(arr, vec![0]);
        let scope = Scope::new();
        let err = slot.value_in(&scope).unwrap_err();
        assert!(matches!(
            err,
            EvogenError::CodeUnderTest(CodeUnderTestError::NullDereference)
        ));
    }

    #[test]
    fn test_constant_sameness_is_value_based() {
        let tc = TestCase::new();
        let a = VariableRef::constant(int_ty(), Value::Int(42));
        let b = VariableRef::constant(int_ty(), Value::Int(42));
        let c = VariableRef::constant(int_ty(), Value::Int(7));
        assert!(a.same(&b, &tc));
        assert!(!a.same(&c, &tc));
    }

    #[test]
    fn test_array_index_position_prefers_assignment() {
        let mut tc = TestCase::new();
        let v0 = tc.add_primitive(int_ty(), Value::Int(1));
        let arr = tc.add_array(int_ty(), vec![3]);
        let slot = VariableRef::array_index(arr.clone(), vec![1]);
        let assignment_pos = tc.add_assignment(slot.clone(), v0);

        assert_eq!(slot.position(&tc), assignment_pos);

        // A slot nothing ever assigned falls back to the array's position.
        let untouched = VariableRef::array_index(arr.clone(), vec![2]);
        assert_eq!(untouched.position(&tc), arr.position(&tc));
    }

    #[test]
    fn test_slot_initialized_bookkeeping() {
        let mut tc = TestCase::new();
        let v0 = tc.add_primitive(int_ty(), Value::Int(1));
        let arr = tc.add_array(int_ty(), vec![3]);
        let slot = VariableRef::array_index(arr.clone(), vec![1]);
        let assignment_pos = tc.add_assignment(slot, v0);

        assert!(arr.slot_initialized(&tc, &[1], assignment_pos + 1));
        assert!(!arr.slot_initialized(&tc, &[1], assignment_pos));
        assert!(!arr.slot_initialized(&tc, &[0], tc.size()));
    }

    #[test]
    fn test_max_referenced_index() {
        let mut tc = TestCase::new();
        let v0 = tc.add_primitive(int_ty(), Value::Int(1));
        let arr = tc.add_array(int_ty(), vec![5]);
        tc.add_assignment(VariableRef::array_index(arr.clone(), vec![3]), v0.clone());
        tc.add_assignment(VariableRef::array_index(arr.clone(), vec![1]), v0);

        assert_eq!(arr.max_referenced_index(&tc), 3);

        let other = tc.add_array(int_ty(), vec![5]);
        assert_eq!(other.max_referenced_index(&tc), 0);
    }

    #[test]
    fn test_copy_to_clone_with_offset() {
        let mut tc = TestCase::new();
        let v0 = tc.add_primitive(int_ty(), Value::Int(5));
        let stack = tc.add_constructor("examples.Stack", vec![]);
        tc.add_method_call(Some(stack), "push", vec![v0.clone()], TypeDesc::Void);

        let mut target = tc.clone();
        target.insert_primitive(0, int_ty(), Value::Int(0));
        let copied = v0.copy_to(&tc, &target, 1);
        assert_eq!(copied.position(&target), 1);
        assert_eq!(copied.ty(), v0.ty());
    }

    #[test]
    fn test_array_copy_rebinds_to_target_return_value() {
        let mut tc = TestCase::new();
        let arr = tc.add_array(int_ty(), vec![2]);
        let clone = tc.clone();
        let copied = arr.copy_to(&tc, &clone, 0);
        assert!(copied.is_array_reference());
        assert_eq!(copied.lengths(), Some(&[2usize][..]));
    }

    #[test]
    #[should_panic(expected = "never copied across test cases")]
    fn test_null_reference_copy_panics() {
        let tc = TestCase::new();
        let target = TestCase::new();
        let null = VariableRef::null(TypeDesc::class("examples.Stack"));
        null.copy_to(&tc, &target, 0);
    }

    #[test]
    fn test_replace_reference_refuses_non_array_base() {
        let mut tc = TestCase::new();
        let v0 = tc.add_primitive(int_ty(), Value::Int(1));
        let arr = tc.add_array(int_ty(), vec![2]);
        let mut slot = VariableRef::array_index(arr.clone(), vec![0]);

        slot.replace_reference(&arr, &v0);
        // The incompatible replacement was refused; the base is unchanged.
        assert_eq!(slot.base_reference(), Some(&arr));
    }

    #[test]
    fn test_replace_reference_allows_null_constant_as_field_source() {
        let mut tc = TestCase::new();
        let obj = tc.add_constructor("examples.Counter", vec![]);
        let field = FieldDesc::new(
            "examples.Counter",
            "count",
            int_ty(),
            false,
            true,
        );
        let mut access = VariableRef::field(field, Some(obj.clone()));

        // Even a null constant of an unrelated declared type is accepted as
        // the new source: the result is a dead field access, not a type error.
        let null_constant = VariableRef::constant(TypeDesc::Str, Value::Null);
        access.replace_reference(&obj, &null_constant);
        assert_eq!(access.base_reference(), Some(&null_constant));
    }

    #[test]
    fn test_field_chain_depth() {
        let mut tc = TestCase::new();
        let obj = tc.add_constructor("examples.Node", vec![]);
        let next = FieldDesc::new(
            "examples.Node",
            "next",
            TypeDesc::class("examples.Node"),
            false,
            true,
        );
        let a = VariableRef::field(next.clone(), Some(obj));
        let b = VariableRef::field(next, Some(a.clone()));
        assert_eq!(a.depth(), 1);
        assert_eq!(b.depth(), 2);
    }

    #[test]
    fn test_inaccessible_field_read_is_fatal_kind() {
        let mut tc = TestCase::new();
        let obj = tc.add_constructor("examples.Counter", vec![]);
        let hidden = FieldDesc::new("examples.Counter", "secret", int_ty(), false, false);
        let access = VariableRef::field(hidden, Some(obj));
        let scope = Scope::new();
        let err = access.value_in(&scope).unwrap_err();
        assert!(matches!(err, EvogenError::InaccessibleField { .. }));
    }

    #[test]
    fn test_static_field_roundtrip_through_scope() {
        let counter = FieldDesc::new("examples.Counter", "total", int_ty(), true, true);
        let access = VariableRef::field(counter, None);
        let mut scope = Scope::new();
        access.assign_in(&mut scope, Value::Int(9)).unwrap();
        assert_eq!(access.value_in(&scope).unwrap(), Value::Int(9));
    }

    #[test]
    fn test_origin_is_write_once() {
        let mut var = VariableRef::constant(int_ty(), Value::Int(1));
        var.set_origin("first");
        var.set_origin("second");
        assert_eq!(var.origin(), Some("first"));
    }

    #[test]
    fn test_position_cache_survives_unrelated_reads_and_invalidates() {
        let mut tc = TestCase::new();
        let v0 = tc.add_primitive(int_ty(), Value::Int(1));
        assert_eq!(v0.position(&tc), 0);
        assert_eq!(v0.position(&tc), 0);
        tc.insert_primitive(0, int_ty(), Value::Int(2));
        assert_eq!(v0.position(&tc), 1);
    }
}
