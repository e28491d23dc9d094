use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Static type of a host routine parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    /// Accepts any value unchanged.
    Value,
    Bool,
    Long,
    Double,
    String,
    Array,
    /// Any object instance.
    Object,
    /// Instance of the named class or one of its subclasses.
    Class(String),
    Nullable(Box<TypeRef>),
}

impl TypeRef {
    pub fn class(name: impl Into<String>) -> Self {
        TypeRef::Class(name.into())
    }

    pub fn nullable(inner: TypeRef) -> Self {
        match inner {
            TypeRef::Value | TypeRef::Nullable(_) => inner,
            other => TypeRef::Nullable(Box::new(other)),
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeRef::Value | TypeRef::Nullable(_))
    }

    /// Strips one `Nullable` layer.
    pub fn non_null(&self) -> &TypeRef {
        match self {
            TypeRef::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Types whose null is a missing reference rather than a scalar zero.
    pub fn is_reference_type(&self) -> bool {
        matches!(
            self,
            TypeRef::String | TypeRef::Array | TypeRef::Object | TypeRef::Class(_)
        )
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeRef::Value => write!(f, "mixed"),
            TypeRef::Bool => write!(f, "bool"),
            TypeRef::Long => write!(f, "int"),
            TypeRef::Double => write!(f, "float"),
            TypeRef::String => write!(f, "string"),
            TypeRef::Array => write!(f, "array"),
            TypeRef::Object => write!(f, "object"),
            TypeRef::Class(name) => write!(f, "{}", name),
            TypeRef::Nullable(inner) => write!(f, "?{}", inner),
        }
    }
}
