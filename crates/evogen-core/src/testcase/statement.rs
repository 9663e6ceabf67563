//! The ordered units a test case is made of.
//!
//! The statement model is deliberately closed: a generated test only ever
//! contains literal definitions, constructor and method calls, array
//! declarations, assignments into array slots or fields, and field reads.
//! Each statement declares exactly one return value, which is how every
//! other part of the engine addresses the value it produces.

use crate::testcase::execution::Value;
use crate::testcase::variable::VariableRef;
use crate::testcase::TestCase;
use crate::types::{ClassName, FieldDesc};

/// The operation a statement performs.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// Defines a literal value, e.g. `int var0 = 42`.
    Primitive {
        /// The literal.
        value: Value,
    },
    /// Instantiates a class under test.
    Constructor {
        /// Class being constructed.
        class: ClassName,
        /// Argument variables.
        args: Vec<VariableRef>,
    },
    /// Invokes a method, possibly on a receiver.
    MethodCall {
        /// Receiver variable; `None` for static calls.
        callee: Option<VariableRef>,
        /// Method name.
        method: String,
        /// Argument variables.
        args: Vec<VariableRef>,
    },
    /// Declares a (possibly multi-dimensional) array.
    ArrayDeclaration {
        /// Length of each dimension.
        lengths: Vec<usize>,
    },
    /// Stores a value into the location named by the statement's return
    /// value (an array slot or a field).
    Assignment {
        /// The variable being stored.
        value: VariableRef,
    },
    /// Reads a field into a fresh variable.
    FieldRead {
        /// The field being read.
        field: FieldDesc,
        /// Source object; `None` for static fields.
        source: Option<VariableRef>,
    },
}

/// One step of a test case, producing one declared return value.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    ret: VariableRef,
    kind: StatementKind,
}

impl Statement {
    pub(crate) fn new(ret: VariableRef, kind: StatementKind) -> Self {
        Self { ret, kind }
    }

    /// The variable this statement declares.
    pub fn return_value(&self) -> &VariableRef {
        &self.ret
    }

    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut StatementKind {
        &mut self.kind
    }

    /// All variable references this statement mentions: the declared return
    /// value plus every operand. Base references (the array under an index,
    /// the object under a field) are reachable through the returned
    /// references themselves.
    pub fn variable_references(&self) -> Vec<&VariableRef> {
        let mut refs = vec![&self.ret];
        match &self.kind {
            StatementKind::Primitive { .. } | StatementKind::ArrayDeclaration { .. } => {}
            StatementKind::Constructor { args, .. } => refs.extend(args.iter()),
            StatementKind::MethodCall { callee, args, .. } => {
                refs.extend(callee.iter());
                refs.extend(args.iter());
            }
            StatementKind::Assignment { value } => refs.push(value),
            StatementKind::FieldRead { source, .. } => refs.extend(source.iter()),
        }
        refs
    }

    /// Whether this statement mentions `var`, directly or through the base
    /// of a derived reference.
    pub fn references(&self, var: &VariableRef) -> bool {
        self.variable_references()
            .into_iter()
            .any(|r| r == var || r.uses(var))
    }

    /// Replaces every operand occurrence of `old` with `new`, descending
    /// into the bases of derived references. The declared return value is
    /// never replaced wholesale, but its bases are rewired.
    pub fn replace(&mut self, old: &VariableRef, new: &VariableRef) {
        self.ret.replace_reference(old, new);
        let mut rewire = |slot: &mut VariableRef| {
            if *slot == *old {
                *slot = new.clone();
            } else {
                slot.replace_reference(old, new);
            }
        };
        match &mut self.kind {
            StatementKind::Primitive { .. } | StatementKind::ArrayDeclaration { .. } => {}
            StatementKind::Constructor { args, .. } => args.iter_mut().for_each(&mut rewire),
            StatementKind::MethodCall { callee, args, .. } => {
                callee.iter_mut().for_each(&mut rewire);
                args.iter_mut().for_each(&mut rewire);
            }
            StatementKind::Assignment { value } => rewire(value),
            StatementKind::FieldRead { source, .. } => source.iter_mut().for_each(&mut rewire),
        }
    }

    /// Source-like rendering for diagnostics and logs.
    pub fn code(&self, tc: &TestCase) -> String {
        match &self.kind {
            StatementKind::Primitive { value } => format!(
                "{} {} = {}",
                self.ret.ty().type_name(),
                self.ret.name(tc),
                value
            ),
            StatementKind::Constructor { class, args } => format!(
                "{} {} = new {}({})",
                self.ret.ty().type_name(),
                self.ret.name(tc),
                class.simple_name(),
                join_names(args, tc)
            ),
            StatementKind::MethodCall {
                callee,
                method,
                args,
            } => {
                let call = match callee {
                    Some(c) => format!("{}.{}({})", c.name(tc), method, join_names(args, tc)),
                    None => format!("{}({})", method, join_names(args, tc)),
                };
                if self.ret.ty().is_void() {
                    call
                } else {
                    format!("{} = {}", self.ret.name(tc), call)
                }
            }
            StatementKind::ArrayDeclaration { lengths } => {
                let dims: Vec<String> = lengths.iter().map(|l| format!("[{l}]")).collect();
                format!(
                    "{} {} = new {}",
                    self.ret.ty().type_name(),
                    self.ret.name(tc),
                    dims.join("")
                )
            }
            StatementKind::Assignment { value } => {
                format!("{} = {}", self.ret.name(tc), value.name(tc))
            }
            StatementKind::FieldRead { field, source } => {
                let access = match source {
                    Some(s) => format!("{}.{}", s.name(tc), field.name()),
                    None => field.qualified_name(),
                };
                format!("{} = {}", self.ret.name(tc), access)
            }
        }
    }
}

fn join_names(refs: &[VariableRef], tc: &TestCase) -> String {
    refs.iter()
        .map(|r| r.name(tc))
        .collect::<Vec<_>>()
        .join(", ")
}
