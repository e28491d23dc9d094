use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::{ClassId, Visibility};
use crate::context::Context;
use crate::types::TypeRef;
use crate::value::{ObjectRef, Value};

pub type RoutineId = u64;
pub type RoutineRef = Arc<RoutineDescriptor>;

fn next_routine_id() -> RoutineId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Parameters the binder supplies itself instead of taking them from the
/// caller's argument list.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParamRole {
    #[default]
    #[display("regular")]
    Regular,
    /// Placeholder for the execution context, which every body receives anyway.
    #[display("context")]
    Context,
    /// Name of the class the routine was resolved on.
    #[display("receiver-type")]
    ReceiverType,
    /// Name the routine was invoked under.
    #[display("indirect-name")]
    IndirectName,
    /// Late static bound class name.
    #[display("late-static")]
    LateStatic,
    /// Class scope of the caller, or null.
    #[display("caller-class")]
    CallerClass,
    /// Generic type arguments, as an array of type names.
    #[display("generic")]
    Generic,
    /// Every argument the caller passed, as an array.
    #[display("caller-args")]
    CallerArgs,
}

/// Lazily evaluated default, may depend on the execution context.
#[derive(Clone)]
pub struct DefaultProvider(Arc<dyn Fn(&Context) -> Value + Send + Sync>);

impl DefaultProvider {
    pub fn new(func: impl Fn(&Context) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(func))
    }

    pub fn provide(&self, ctx: &Context) -> Value {
        (self.0)(ctx)
    }
}

impl Debug for DefaultProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DefaultProvider")
    }
}

#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    pub name: String,
    pub ty: TypeRef,
    /// Attribute-declared default, consulted before `default_value`.
    pub default_provider: Option<DefaultProvider>,
    pub default_value: Option<Value>,
    pub is_variadic: bool,
    pub is_by_ref: bool,
    pub role: ParamRole,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            default_provider: None,
            default_value: None,
            is_variadic: false,
            is_by_ref: false,
            role: ParamRole::Regular,
        }
    }

    /// An implicit parameter filled in by the binder.
    pub fn implicit(name: impl Into<String>, role: ParamRole) -> Self {
        Self {
            role,
            ..Self::new(name, TypeRef::Value)
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_provider(mut self, provider: impl Fn(&Context) -> Value + Send + Sync + 'static) -> Self {
        self.default_provider = Some(DefaultProvider::new(provider));
        self
    }

    pub fn variadic(mut self) -> Self {
        self.is_variadic = true;
        self
    }

    pub fn by_ref(mut self) -> Self {
        self.is_by_ref = true;
        self
    }

    pub fn is_implicit(&self) -> bool {
        self.role != ParamRole::Regular
    }

    pub fn is_optional(&self) -> bool {
        self.is_variadic || self.default_provider.is_some() || self.default_value.is_some()
    }
}

/// What a routine body receives. `args` has one entry per declared parameter,
/// implicit ones included.
pub struct Invocation<'a> {
    pub ctx: &'a Context,
    pub this: Option<ObjectRef>,
    pub args: Vec<Value>,
}

impl Invocation<'_> {
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }
}

pub type RoutineBody = Arc<dyn Fn(Invocation<'_>) -> crate::Result<Value> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaringClass {
    pub id: ClassId,
    pub name: String,
}

/// A host-level routine the dispatcher can select.
#[derive(Clone)]
pub struct RoutineDescriptor {
    id: RoutineId,
    pub name: String,
    pub params: Vec<ParamDescriptor>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub declaring_class: Option<DeclaringClass>,
    /// `-1` or `null` results are reported as `false`.
    pub cast_to_false: bool,
    body: RoutineBody,
}

impl RoutineDescriptor {
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(Invocation<'_>) -> crate::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: next_routine_id(),
            name: name.into(),
            params: Vec::new(),
            visibility: Visibility::Public,
            is_static: false,
            declaring_class: None,
            cast_to_false: false,
            body: Arc::new(body),
        }
    }

    pub fn with_param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_params(mut self, params: impl IntoIterator<Item = ParamDescriptor>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn cast_to_false(mut self) -> Self {
        self.cast_to_false = true;
        self
    }

    pub fn id(&self) -> RoutineId {
        self.id
    }

    /// Parameters the caller supplies, in order.
    pub fn explicit_params(&self) -> impl Iterator<Item = &ParamDescriptor> {
        self.params.iter().filter(|p| !p.is_implicit())
    }

    pub fn explicit_arity(&self) -> usize {
        self.explicit_params().count()
    }

    pub fn has_variadic(&self) -> bool {
        self.explicit_params().any(|p| p.is_variadic)
    }

    /// `Class::name` or `name`.
    pub fn qualified_name(&self) -> String {
        match &self.declaring_class {
            Some(class) => format!("{}::{}", class.name, self.name),
            None => self.name.clone(),
        }
    }

    pub fn invoke(&self, invocation: Invocation<'_>) -> crate::Result<Value> {
        (self.body)(invocation)
    }
}

impl Debug for RoutineDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutineDescriptor")
            .field("id", &self.id)
            .field("name", &self.qualified_name())
            .field("params", &self.params.len())
            .finish()
    }
}
