//! Declared-symbol surface: what a routine, property, constant or class looks
//! like to the binders. Descriptors are immutable once built and shared via
//! `Arc`.

mod class;
mod routine;
mod table;

pub use class::*;
pub use routine::*;
pub use table::*;

use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    #[display("public")]
    Public,
    #[display("protected")]
    Protected,
    #[display("private")]
    Private,
}

/// Checks `visibility` of a member declared on `declaring` from code running in
/// `caller`'s scope.
pub fn is_visible(
    visibility: Visibility,
    declaring: &ClassDescriptor,
    caller: Option<&ClassDescriptor>,
) -> bool {
    match visibility {
        Visibility::Public => true,
        Visibility::Private => caller.is_some_and(|caller| caller.id() == declaring.id()),
        Visibility::Protected => caller.is_some_and(|caller| {
            caller.is_subclass_of(declaring.id()) || declaring.is_subclass_of(caller.id())
        }),
    }
}
