//! Static description of a call site, fixed at compile time of the hosted
//! program, and the physical arguments passed to it at run time.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use lb_core::{TypeRef, Value, ValueKind};

use crate::chain::RuntimeChain;

/// Compile-time type of one physical argument.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
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
    /// Some object; the binder restricts on the runtime class.
    #[display("object")]
    Object,
    /// A reference cell.
    #[display("reference")]
    Alias,
    /// Statically unknown.
    #[display("mixed")]
    Any,
}

impl SourceType {
    /// The value kind every argument of this type has, when that kind alone
    /// decides conversion costs.
    pub fn exact_kind(self) -> Option<ValueKind> {
        match self {
            SourceType::Null => Some(ValueKind::Null),
            SourceType::Bool => Some(ValueKind::Bool),
            SourceType::Long => Some(ValueKind::Long),
            SourceType::Double => Some(ValueKind::Double),
            SourceType::String => Some(ValueKind::String),
            SourceType::Array => Some(ValueKind::Array),
            SourceType::Object | SourceType::Alias | SourceType::Any => None,
        }
    }
}

/// One entry of a call site's argument list. Markers carry call metadata
/// instead of user arguments; some occupy a physical slot, some do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgShape {
    /// The execution context. Never occupies a slot; the context is passed
    /// separately.
    Context,
    /// The instance a method is called on.
    Receiver,
    /// The routine name, for indirect calls (`$name()`, `$obj->$name()`).
    Name,
    /// The class name for static calls through a runtime class name.
    TargetType,
    /// The late static bound class name.
    LateStatic,
    /// The caller's class scope as a class name, or null.
    CallerClass,
    /// Generic type arguments. Never occupies a slot.
    Generic(Vec<TypeRef>),
    /// The next argument is spread into the argument list. Never occupies a
    /// slot.
    Unpack,
    /// A user argument.
    Value(SourceType),
    /// A [`RuntimeChain`] applied to the preceding user argument.
    Chain,
}

impl ArgShape {
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, ArgShape::Context | ArgShape::Generic(_) | ArgShape::Unpack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    /// Global function call; `name` is `None` for indirect calls.
    Function { name: Option<String> },
    Method { name: Option<String> },
    /// `Class::name(...)`; `class` is `None` when the class is passed through
    /// a [`ArgShape::TargetType`] slot.
    StaticMethod {
        class: Option<String>,
        name: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSiteShape {
    pub kind: CallKind,
    pub args: Vec<ArgShape>,
}

impl CallSiteShape {
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            kind: CallKind::Function {
                name: Some(name.into()),
            },
            args: Vec::new(),
        }
    }

    pub fn indirect_function() -> Self {
        Self {
            kind: CallKind::Function { name: None },
            args: vec![ArgShape::Name],
        }
    }

    /// `$receiver->name(...)`; the receiver is the first slot.
    pub fn method(name: impl Into<String>) -> Self {
        Self {
            kind: CallKind::Method {
                name: Some(name.into()),
            },
            args: vec![ArgShape::Receiver],
        }
    }

    pub fn static_method(class: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: CallKind::StaticMethod {
                class: Some(class.into()),
                name: Some(name.into()),
            },
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: ArgShape) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = ArgShape>) -> Self {
        self.args.extend(args);
        self
    }

    /// Number of physical arguments the site passes.
    pub fn slot_count(&self) -> usize {
        self.args.iter().filter(|arg| arg.occupies_slot()).count()
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            CallKind::Function { name }
            | CallKind::Method { name }
            | CallKind::StaticMethod { name, .. } => name.as_deref(),
        }
    }
}

/// A physical argument.
#[derive(Debug, Clone, From)]
pub enum CallArg {
    Value(Value),
    Chain(RuntimeChain),
}

impl CallArg {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            CallArg::Value(value) => Some(value),
            CallArg::Chain(_) => None,
        }
    }
}
