//! Semantic type descriptors for values produced inside generated tests.
//!
//! The engine never loads real classes; it reasons about the *shape* of the
//! values a test manipulates (primitives, their boxed forms, strings, arrays,
//! plain object types) so that mutation operators and the minimizer can make
//! assignability decisions without an execution environment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The primitive kinds a test value can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Bool,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        };
        f.write_str(name)
    }
}

/// Fully qualified name of a class under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassName(String);

impl ClassName {
    /// Creates a new ClassName from a string-like type.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The unqualified trailing segment of the name.
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl From<&str> for ClassName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ClassName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Declared type of a variable reference.
///
/// A closed descriptor: the set of shapes generated tests deal in is fixed,
/// so operations match exhaustively rather than dispatching virtually.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeDesc {
    /// The absence of a produced value (a call used only for its effect).
    Void,
    /// An unboxed primitive.
    Primitive(PrimitiveKind),
    /// The boxed (nullable) counterpart of a primitive.
    Boxed(PrimitiveKind),
    /// A string.
    Str,
    /// A reified type literal (e.g. a class object used as a value).
    TypeLiteral,
    /// A plain object type.
    Class(ClassName),
    /// An array with the given component type.
    Array(Box<TypeDesc>),
}

impl TypeDesc {
    /// Convenience constructor for an array of `component`.
    pub fn array_of(component: TypeDesc) -> Self {
        TypeDesc::Array(Box::new(component))
    }

    /// Convenience constructor for an object type.
    pub fn class(name: impl Into<String>) -> Self {
        TypeDesc::Class(ClassName::new(name))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDesc::Void)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeDesc::Primitive(_))
    }

    pub fn is_wrapper(&self) -> bool {
        matches!(self, TypeDesc::Boxed(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, TypeDesc::Str)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeDesc::Array(_))
    }

    /// Component type of an array, or `None` for non-arrays.
    pub fn component(&self) -> Option<&TypeDesc> {
        match self {
            TypeDesc::Array(c) => Some(c),
            _ => None,
        }
    }

    /// Element type after indexing through `depth` dimensions.
    ///
    /// `int[][]` at depth 1 is `int[]`, at depth 2 is `int`. Returns `None`
    /// when the type has fewer dimensions than requested.
    pub fn element_at_depth(&self, depth: usize) -> Option<&TypeDesc> {
        let mut current = self;
        for _ in 0..depth {
            current = current.component()?;
        }
        Some(current)
    }

    /// Whether a value of type `other` can be stored where `self` is expected.
    ///
    /// Deliberately structural: identical types, box/unbox pairs, and arrays
    /// of assignable components. Class hierarchies are not modelled here; the
    /// statement-generation layer that knows the class graph sits above this
    /// crate.
    pub fn is_assignable_from(&self, other: &TypeDesc) -> bool {
        match (self, other) {
            (a, b) if a == b => true,
            (TypeDesc::Boxed(a), TypeDesc::Primitive(b)) => a == b,
            (TypeDesc::Primitive(a), TypeDesc::Boxed(b)) => a == b,
            (TypeDesc::Array(a), TypeDesc::Array(b)) => a.is_assignable_from(b),
            _ => false,
        }
    }

    /// Whether a value of type `self` can be stored where `other` is expected.
    pub fn is_assignable_to(&self, other: &TypeDesc) -> bool {
        other.is_assignable_from(self)
    }

    /// Human-readable name used in diagnostics and generated code.
    pub fn type_name(&self) -> String {
        match self {
            TypeDesc::Void => "void".to_string(),
            TypeDesc::Primitive(k) => k.to_string(),
            TypeDesc::Boxed(k) => format!("Boxed<{k}>"),
            TypeDesc::Str => "String".to_string(),
            TypeDesc::TypeLiteral => "Type".to_string(),
            TypeDesc::Class(name) => name.to_string(),
            TypeDesc::Array(c) => format!("{}[]", c.type_name()),
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name())
    }
}

/// Descriptor of a field on a class under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDesc {
    owner: ClassName,
    name: String,
    ty: TypeDesc,
    is_static: bool,
    is_public: bool,
}

impl FieldDesc {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        ty: TypeDesc,
        is_static: bool,
        is_public: bool,
    ) -> Self {
        Self {
            owner: ClassName::new(owner),
            name: name.into(),
            ty,
            is_static,
            is_public,
        }
    }

    pub fn owner(&self) -> &ClassName {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &TypeDesc {
        &self.ty
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Accessibility is a property of the field's own declaration, not of
    /// whatever object the access goes through.
    pub fn is_accessible(&self) -> bool {
        self.is_public
    }

    /// `Owner.name`, as it appears in generated code.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner.simple_name(), self.name)
    }
}
