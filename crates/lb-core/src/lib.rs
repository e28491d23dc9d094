//! LateBind core
//!
//! Runtime value model and the metadata surface the dispatch layer binds
//! against: classes, routines, properties, constants and the execution
//! context that owns them.

#[macro_use]
pub mod macros;

pub mod collections;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod metadata;
pub mod types;
pub mod value;

// Re-export commonly used items for convenience
pub use tracing;

pub use context::Context;
pub use metadata::{ClassRef, RoutineRef, SymbolTable};
pub use types::TypeRef;
pub use value::{Alias, ArrayKey, ObjectRef, PhpArray, Value, ValueKind};

// Alias for error types
pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
