//! LateBind dispatch
//!
//! Resolves dynamically-typed call sites, member accesses and compound
//! lvalues against host routines and declared members. Each site is bound
//! once per runtime shape into a guarded thunk that is replayed until its
//! guard fails.

pub mod args;
pub mod cache;
pub mod callsite;
pub mod chain;
pub mod convert;
pub mod cost;
pub mod fields;
pub mod overload;
pub mod plan;
pub mod shape;

pub use cache::{CallSite, FieldSite};
pub use callsite::{Binding, CallBinder, CallSiteContext};
pub use chain::RuntimeChain;
pub use cost::ConversionCost;
pub use fields::{AccessKind, FieldBinder, FieldOutput, FieldRequest, FieldShape};
pub use shape::{ArgShape, CallArg, CallKind, CallSiteShape, SourceType};
