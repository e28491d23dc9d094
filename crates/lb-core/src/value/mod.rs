mod alias;
mod array;
mod numeric;
mod object;

pub use alias::*;
pub use array::*;
pub use numeric::*;
pub use object::*;

use std::fmt::{Debug, Display, Formatter};

use derive_more::{Display as DeriveDisplay, From};
use serde::{Deserialize, Serialize};

/// Runtime tag of a [`Value`].
#[derive(
    Debug, DeriveDisplay, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ValueKind {
    #[display("null")]
    Null,
    #[display("bool")]
    Bool,
    #[display("int")]
    Long,
    #[display("float")]
    Double,
    #[display("string")]
    String,
    #[display("array")]
    Array,
    #[display("object")]
    Object,
    #[display("reference")]
    Alias,
}

/// The tagged "any" value of the hosted language.
#[derive(Clone, Default, From)]
pub enum Value {
    #[default]
    #[from(ignore)]
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    String(String),
    Array(PhpArray),
    Object(ObjectRef),
    Alias(Alias),
}

impl Value {
    pub const NULL: Value = Value::Null;

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    pub fn array(values: impl IntoIterator<Item = Value>) -> Value {
        Value::Array(PhpArray::from_values(values))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Long(_) => ValueKind::Long,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::Alias(_) => ValueKind::Alias,
        }
    }

    /// Kind of the referenced value when `self` is an alias.
    pub fn deref_kind(&self) -> ValueKind {
        match self {
            Value::Alias(alias) => alias.with_value(|v| v.kind()),
            other => other.kind(),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Alias(alias) => alias.with_value(|v| v.is_null()),
            _ => false,
        }
    }

    /// Copy of the value with any alias cell dereferenced.
    pub fn deref(&self) -> Value {
        match self {
            Value::Alias(alias) => alias.get(),
            other => other.clone(),
        }
    }

    pub fn into_deref(self) -> Value {
        match self {
            Value::Alias(alias) => alias.get(),
            other => other,
        }
    }

    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj.clone()),
            Value::Alias(alias) => alias.with_value(|v| v.as_object()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PhpArray> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness of the hosted language.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Long(l) => *l != 0,
            Value::Double(d) => *d != 0.0,
            Value::String(s) => !(s.is_empty() || s == "0"),
            Value::Array(arr) => !arr.is_empty(),
            Value::Object(_) => true,
            Value::Alias(alias) => alias.with_value(|v| v.to_bool()),
        }
    }

    /// `get_debug_type()`-style name used in diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::Object(obj) => obj.class().name().to_string(),
            Value::Alias(alias) => alias.with_value(|v| v.type_name()),
            other => other.kind().to_string(),
        }
    }

    /// Turns the slot into a reference cell, keeping its current value.
    pub fn ensure_alias(&mut self) -> Alias {
        if let Value::Alias(alias) = self {
            return alias.clone();
        }
        let alias = Alias::new(std::mem::take(self));
        *self = Value::Alias(alias.clone());
        alias
    }

    /// Vivifies `null` (and `false`) into an empty array. Returns `None` when
    /// the slot holds something that cannot become an array.
    pub fn ensure_array(&mut self) -> Option<&mut PhpArray> {
        if matches!(self, Value::Null | Value::Bool(false)) {
            *self = Value::Array(PhpArray::new());
        }
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Writes through an alias cell if the slot holds one.
    pub fn assign(&mut self, value: Value) {
        match self {
            Value::Alias(alias) => alias.set(value),
            slot => *slot = value,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(l), Value::Bool(r)) => l == r,
            (Value::Long(l), Value::Long(r)) => l == r,
            (Value::Double(l), Value::Double(r)) => l == r,
            (Value::String(l), Value::String(r)) => l == r,
            (Value::Array(l), Value::Array(r)) => l == r,
            (Value::Object(l), Value::Object(r)) => l.ptr_eq(r),
            (Value::Alias(l), Value::Alias(r)) => l.ptr_eq(r),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "bool({})", b),
            Value::Long(l) => write!(f, "int({})", l),
            Value::Double(d) => write!(f, "float({:?})", d),
            Value::String(s) => write!(f, "string({:?})", s),
            Value::Array(arr) => Debug::fmt(arr, f),
            Value::Object(obj) => Debug::fmt(obj, f),
            Value::Alias(alias) => Debug::fmt(alias, f),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(true) => write!(f, "1"),
            Value::Bool(false) => Ok(()),
            Value::Long(l) => write!(f, "{}", l),
            Value::Double(d) => write!(f, "{}", format_double(*d)),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(_) => write!(f, "Array"),
            Value::Object(obj) => write!(f, "{}", obj.class().name()),
            Value::Alias(alias) => alias.with_value(|v| Display::fmt(v, f)),
        }
    }
}

/// Shortest round-trip rendering, integral doubles without a fraction.
pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NAN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "INF" } else { "-INF" }.to_string()
    } else if d == d.trunc() && d.abs() < 1e15 {
        format!("{}", d as i64)
    } else {
        format!("{}", d)
    }
}
