use std::result;

use derive_more::Display;
use serde::Serialize;
use thiserror::Error;

/// Failures detected while producing a binding. A binding error never reaches
/// the call-site cache; the site stays eligible for a later bind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("Call to undefined function {name}()")]
    RoutineNotFound { name: String },
    #[error("Call to undefined method {class}::{name}()")]
    MethodNotFound { class: String, name: String },
    #[error("Class \"{name}\" not found")]
    ClassNotFound { name: String },
    #[error("No overload of {name}() accepts the supplied arguments")]
    NoApplicableOverload { name: String },
    #[error("Undefined property: {class}::${name}")]
    UndefinedProperty { class: String, name: String },
    #[error("Invalid runtime chain: {0}")]
    InvalidChain(String),
    #[error("Malformed call site: {0}")]
    MalformedCallSite(String),
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LanguageErrorKind {
    #[display("Error")]
    NotAnObject,
    #[display("Error")]
    ReadonlyProperty,
    #[display("Error")]
    InaccessibleMember,
    #[display("TypeError")]
    TypeError,
    #[display("ArgumentCountError")]
    ArgumentCount,
    #[display("Error")]
    InvalidOperand,
    #[display("Error")]
    UndefinedConstant,
}

/// A catchable error object of the hosted language.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct LanguageError {
    pub kind: LanguageErrorKind,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Binding error: {0}")]
    Bind(#[from] BindError),
    #[error("{0}")]
    Language(#[from] LanguageError),
    #[error("Generic error: {0}")]
    Generic(eyre::Report),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    pub fn as_bind(&self) -> Option<&BindError> {
        match self {
            Error::Bind(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_language(&self) -> Option<&LanguageError> {
        match self {
            Error::Language(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_language(&self, kind: LanguageErrorKind) -> bool {
        matches!(self, Error::Language(err) if err.kind == kind)
    }
}

pub fn language_error(kind: LanguageErrorKind, message: impl Into<String>) -> Error {
    Error::Language(LanguageError {
        kind,
        message: message.into(),
    })
}

pub fn generic_error(message: impl Into<String>) -> Error {
    Error::Generic(eyre::Report::msg(message.into()))
}

// Convert from eyre::Report to our Error type
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Generic(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Generic(e.into())
    }
}
