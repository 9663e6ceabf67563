//! Runtime values observed while executing a generated test.
//!
//! No virtual machine backs this engine; the execution layer materializes
//! the objects a test produces as values of this closed model. The numeric
//! conversion helpers mirror the widening/narrowing behavior of array-slot
//! assignment: a boxed number written into a `short` slot is narrowed, a
//! character written into a numeric slot is its code point, and conversely.

use crate::errors::CodeUnderTestError;
use crate::types::{ClassName, PrimitiveKind, TypeDesc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An array instance: component type plus element values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    /// Declared component type of the array.
    pub component: TypeDesc,
    /// Element values, one per slot.
    pub elements: Vec<Value>,
}

impl ArrayValue {
    /// Creates an array filled with the default value of its component type.
    pub fn new(component: TypeDesc, length: usize) -> Self {
        let fill = Value::default_for(&component);
        Self {
            component,
            elements: vec![fill; length],
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// An object instance: class name plus named field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectValue {
    /// Class of the instance.
    pub class: ClassName,
    /// Field values by field name.
    pub fields: BTreeMap<String, Value>,
}

impl ObjectValue {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: ClassName::new(class),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field initialization.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

/// A concrete runtime value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    TypeLiteral(TypeDesc),
    Array(ArrayValue),
    Object(ObjectValue),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value carries a number or a character, i.e. something
    /// the slot conversions below can work with.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Char(_)
                | Value::Byte(_)
                | Value::Short(_)
                | Value::Int(_)
                | Value::Long(_)
                | Value::Float(_)
                | Value::Double(_)
        )
    }

    /// The default value a freshly declared slot of `ty` holds.
    pub fn default_for(ty: &TypeDesc) -> Value {
        match ty {
            TypeDesc::Primitive(PrimitiveKind::Bool) => Value::Bool(false),
            TypeDesc::Primitive(PrimitiveKind::Char) => Value::Char('\0'),
            TypeDesc::Primitive(PrimitiveKind::Byte) => Value::Byte(0),
            TypeDesc::Primitive(PrimitiveKind::Short) => Value::Short(0),
            TypeDesc::Primitive(PrimitiveKind::Int) => Value::Int(0),
            TypeDesc::Primitive(PrimitiveKind::Long) => Value::Long(0),
            TypeDesc::Primitive(PrimitiveKind::Float) => Value::Float(0.0),
            TypeDesc::Primitive(PrimitiveKind::Double) => Value::Double(0.0),
            _ => Value::Null,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Char(c) => Some(*c as i64),
            Value::Byte(v) => Some(*v as i64),
            Value::Short(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Double(v) => Some(*v as i64),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Char(c) => Some(*c as u32 as f64),
            Value::Byte(v) => Some(*v as f64),
            Value::Short(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            Value::Long(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Human-readable type of this value, for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Char(_) => "char".to_string(),
            Value::Byte(_) => "byte".to_string(),
            Value::Short(_) => "short".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Long(_) => "long".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Double(_) => "double".to_string(),
            Value::Str(_) => "String".to_string(),
            Value::TypeLiteral(_) => "Type".to_string(),
            Value::Array(a) => format!("{}[]", a.component.type_name()),
            Value::Object(o) => o.class.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "'{v}'"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "\"{v}\""),
            Value::TypeLiteral(ty) => write!(f, "{ty}"),
            Value::Array(a) => write!(f, "{}[{}]", a.component.type_name(), a.len()),
            Value::Object(o) => write!(f, "{}@instance", o.class.simple_name()),
        }
    }
}

/// Converts `value` for storage into a slot whose component type is
/// `component`, applying the numeric narrowing/boxing rules.
///
/// A null written into a primitive slot is a code-under-test failure, never
/// a silent zero. Non-numeric, non-matching values land in a primitive
/// numeric slot as zero, matching the forgiving store semantics of the
/// execution layer this models.
pub fn convert_for_slot(
    component: &TypeDesc,
    value: Value,
) -> Result<Value, CodeUnderTestError> {
    let kind = match component {
        TypeDesc::Primitive(kind) => {
            if value.is_null() {
                return Err(CodeUnderTestError::NullIntoPrimitiveSlot);
            }
            *kind
        }
        TypeDesc::Boxed(kind) => {
            if value.is_null() {
                return Ok(Value::Null);
            }
            *kind
        }
        // Reference-typed slots store the value as-is.
        _ => return Ok(value),
    };

    let converted = match kind {
        PrimitiveKind::Bool => match value {
            Value::Bool(v) => Value::Bool(v),
            other => {
                return Err(CodeUnderTestError::TypeMismatch {
                    expected: "bool".to_string(),
                    actual: other.describe(),
                })
            }
        },
        PrimitiveKind::Char => match &value {
            Value::Char(c) => Value::Char(*c),
            v => Value::Char(
                char::from_u32(v.as_i64().unwrap_or(b'0' as i64) as u32).unwrap_or('0'),
            ),
        },
        PrimitiveKind::Byte => Value::Byte(value.as_i64().unwrap_or(0) as i8),
        PrimitiveKind::Short => Value::Short(value.as_i64().unwrap_or(0) as i16),
        PrimitiveKind::Int => Value::Int(value.as_i64().unwrap_or(0) as i32),
        PrimitiveKind::Long => Value::Long(value.as_i64().unwrap_or(0)),
        PrimitiveKind::Float => Value::Float(value.as_f64().unwrap_or(0.0) as f32),
        PrimitiveKind::Double => Value::Double(value.as_f64().unwrap_or(0.0)),
    };
    Ok(converted)
}
