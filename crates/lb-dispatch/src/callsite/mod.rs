//! Call-site binding: turns one call shape plus the physical arguments of
//! the first call into a guarded [`Binding`].

mod magic;
mod special;

use serde::Serialize;

use lb_core::error::{BindError, LanguageError, LanguageErrorKind};
use lb_core::metadata::{is_visible, MagicMethod, ParamRole, RoutineDescriptor};
use lb_core::{
    debug, warn, ClassRef, Context, ObjectRef, PhpArray, Result, RoutineRef, TypeRef, Value,
};

use crate::args::{ArgLayout, ArgumentsBinder, ArrayArgsBinder, LogicalArg, TupleArgsBinder};
use crate::overload::resolve_overloads;
use crate::plan::{ArgPlan, Guard, GuardSet, Thunk};
use crate::shape::{CallArg, CallKind, CallSiteShape};

/// What the binder learned about a call before choosing a routine.
#[derive(Debug, Clone, Default)]
pub struct CallSiteContext {
    /// User arguments, markers removed.
    pub arguments: Vec<LogicalArg>,
    pub guard: GuardSet,
    pub context_supplied: bool,
    pub receiver_slot: Option<usize>,
    /// The receiver, if the receiver slot holds an object.
    pub receiver: Option<ObjectRef>,
    pub target_type: Option<ClassRef>,
    /// Class scope of the caller, for visibility checks.
    pub class_context: Option<ClassRef>,
    /// Name supplied at run time for indirect calls.
    pub name: Option<String>,
    pub late_static: Option<ClassRef>,
    pub generics: Vec<TypeRef>,
    pub has_unpack: bool,
}

impl CallSiteContext {
    /// Resolves a class name as written at the call site. `self`, `parent`
    /// and `static` are relative to the caller's scope.
    pub fn resolve_class(&mut self, ctx: &Context, name: &str) -> Result<ClassRef> {
        let not_found = || BindError::ClassNotFound {
            name: name.to_string(),
        };
        let class = match name.to_ascii_lowercase().as_str() {
            "self" => self.class_context.clone(),
            "parent" => self
                .class_context
                .as_ref()
                .and_then(|class| class.parent().cloned()),
            "static" => self
                .late_static
                .clone()
                .or_else(|| self.receiver.as_ref().map(|obj| obj.class().clone()))
                .or_else(|| self.class_context.clone()),
            _ => {
                let class = ctx.class(name).ok_or_else(not_found)?;
                self.guard.push(Guard::ClassIs {
                    name: name.to_string(),
                    class: class.id(),
                });
                Some(class)
            }
        };
        class.ok_or_else(|| not_found().into())
    }

    /// The class the call resolved against.
    pub fn resolved_class(&self) -> Option<&ClassRef> {
        self.target_type
            .as_ref()
            .or_else(|| self.receiver.as_ref().map(|obj| obj.class()))
    }

    /// Slot passed as `$this` when invoking `routine`.
    pub fn receiver_slot_for(&self, routine: &RoutineDescriptor) -> Option<usize> {
        if routine.is_static || self.receiver.is_none() {
            return None;
        }
        self.receiver_slot
    }

    /// Plan for a parameter the binder fills in itself.
    pub fn implicit_arg(&self, role: ParamRole, binder: &dyn ArgumentsBinder) -> ArgPlan {
        let class_name =
            |class: Option<&ClassRef>| class.map_or(Value::Null, |c| Value::string(c.name()));
        match role {
            ParamRole::Regular | ParamRole::Context => ArgPlan::Const(Value::Null),
            ParamRole::ReceiverType => ArgPlan::Const(class_name(self.resolved_class())),
            ParamRole::IndirectName => ArgPlan::Const(
                self.name
                    .as_ref()
                    .map_or(Value::Null, |name| Value::string(name.as_str())),
            ),
            ParamRole::LateStatic => ArgPlan::Const(class_name(
                self.late_static.as_ref().or_else(|| self.resolved_class()),
            )),
            ParamRole::CallerClass => ArgPlan::Const(class_name(self.class_context.as_ref())),
            ParamRole::Generic => {
                if self.generics.is_empty() {
                    return ArgPlan::Const(Value::Array(PhpArray::empty()));
                }
                ArgPlan::Const(Value::array(
                    self.generics.iter().map(|ty| Value::string(ty.to_string())),
                ))
            }
            ParamRole::CallerArgs => binder.bind_all(),
        }
    }

    fn binder(&self) -> Box<dyn ArgumentsBinder> {
        if self.has_unpack {
            Box::new(ArrayArgsBinder::new(self.arguments.clone()))
        } else {
            Box::new(TupleArgsBinder::new(self.arguments.clone()))
        }
    }
}

/// Loggable description of a binding.
#[derive(Debug, Clone, Serialize)]
pub struct BindingSummary {
    pub site: String,
    pub dispatch: &'static str,
    pub candidates: usize,
    pub guards: GuardSet,
}

/// A call site bound for one runtime shape of its arguments.
#[derive(Debug)]
pub struct Binding {
    guard: GuardSet,
    layout: ArgLayout,
    caller: Option<ClassRef>,
    thunk: Thunk,
    summary: BindingSummary,
}

impl Binding {
    pub fn guard(&self) -> &GuardSet {
        &self.guard
    }

    pub fn thunk(&self) -> &Thunk {
        &self.thunk
    }

    pub fn summary(&self) -> &BindingSummary {
        &self.summary
    }

    /// The guard holds for these arguments.
    pub fn applies(&self, ctx: &Context, args: &[CallArg]) -> bool {
        self.guard.test(ctx, args)
    }

    pub fn invoke(&self, ctx: &Context, args: &[CallArg]) -> Result<Value> {
        let view = self.layout.view(ctx, self.caller.as_ref(), args)?;
        self.thunk.run(&view, args)
    }
}

pub struct CallBinder<'a> {
    ctx: &'a Context,
    shape: &'a CallSiteShape,
    args: &'a [CallArg],
}

impl<'a> CallBinder<'a> {
    pub fn new(ctx: &'a Context, shape: &'a CallSiteShape, args: &'a [CallArg]) -> Self {
        Self { ctx, shape, args }
    }

    pub fn bind(&self) -> Result<Binding> {
        let mut site = CallSiteContext::collect(self.ctx, self.shape, self.args)?;
        let name = match self.shape.name().map(str::to_string).or(site.name.clone()) {
            Some(name) => name,
            None => {
                return Err(BindError::MalformedCallSite(
                    "call site names no routine".to_string(),
                )
                .into())
            }
        };
        site.name.get_or_insert_with(|| name.clone());

        let (thunk, candidates) = match &self.shape.kind {
            CallKind::Function { .. } => self.bind_function(&mut site, &name)?,
            CallKind::Method { .. } => self.bind_method(&mut site, &name)?,
            CallKind::StaticMethod { class, .. } => {
                self.bind_static(&mut site, class.as_deref(), &name)?
            }
        };
        let binding = self.finish(site, &name, thunk, candidates);
        if self.ctx.options().trace_bindings {
            match serde_json::to_string(&binding.summary) {
                Ok(json) => debug!(binding = %json, "bound call site"),
                Err(err) => warn!("failed to serialize binding summary: {}", err),
            }
        }
        Ok(binding)
    }

    fn finish(
        &self,
        site: CallSiteContext,
        name: &str,
        thunk: Thunk,
        candidates: usize,
    ) -> Binding {
        let summary = BindingSummary {
            site: match &self.shape.kind {
                CallKind::Function { .. } => format!("{}()", name),
                CallKind::Method { .. } => format!("->{}()", name),
                CallKind::StaticMethod { .. } => format!(
                    "{}::{}()",
                    site.resolved_class().map_or("?", |c| c.name()),
                    name
                ),
            },
            dispatch: thunk.describe(),
            candidates,
            guards: site.guard.clone(),
        };
        Binding {
            layout: site.binder().layout(),
            guard: site.guard,
            caller: site.class_context,
            thunk,
            summary,
        }
    }

    fn bind_function(&self, site: &mut CallSiteContext, name: &str) -> Result<(Thunk, usize)> {
        let group = self
            .ctx
            .symbols()
            .function(name)
            .ok_or_else(|| BindError::RoutineNotFound {
                name: name.to_string(),
            })?;
        site.guard.push(Guard::FunctionIs {
            name: name.to_string(),
            group: group.id,
        });
        let binder = site.binder();
        let thunk = resolve_overloads(name, &group.routines, binder.as_ref(), site)?;
        Ok((thunk, group.routines.len()))
    }

    fn bind_method(&self, site: &mut CallSiteContext, name: &str) -> Result<(Thunk, usize)> {
        let Some(slot) = site.receiver_slot else {
            return Err(
                BindError::MalformedCallSite("method call without a receiver".to_string()).into(),
            );
        };
        let Some(receiver) = site.receiver.clone() else {
            site.guard.push(Guard::NotObject { slot });
            let given = self
                .args
                .get(slot)
                .and_then(CallArg::as_value)
                .map_or_else(|| "null".to_string(), Value::type_name);
            let err = LanguageError {
                kind: LanguageErrorKind::NotAnObject,
                message: format!("Call to a member function {}() on {}", name, given),
            };
            return Ok((Thunk::Throw(err), 0));
        };
        site.guard.push(Guard::ObjectOfClass {
            slot,
            class: receiver.class().id(),
        });
        let class = receiver.class().clone();
        self.bind_member(site, &class, name, MagicMethod::Call)
    }

    fn bind_static(
        &self,
        site: &mut CallSiteContext,
        class_name: Option<&str>,
        name: &str,
    ) -> Result<(Thunk, usize)> {
        let class = match class_name {
            Some(class_name) => site.resolve_class(self.ctx, class_name)?,
            None => site.target_type.clone().ok_or_else(|| {
                BindError::MalformedCallSite("static call without a target class".to_string())
            })?,
        };
        site.target_type = Some(class.clone());

        // `parent::f()` and friends keep `$this` when it is an instance of the
        // target class
        let keeps_receiver = site
            .receiver
            .as_ref()
            .is_some_and(|obj| obj.class().is_subclass_of(class.id()));
        match (&site.receiver, site.receiver_slot) {
            (Some(obj), Some(slot)) if keeps_receiver => site.guard.push(Guard::ObjectOfClass {
                slot,
                class: obj.class().id(),
            }),
            (_, Some(slot)) => {
                site.receiver = None;
                site.guard.push(Guard::NotObject { slot });
            }
            _ => {}
        }
        let magic = if keeps_receiver && class.magic(MagicMethod::Call).is_some() {
            MagicMethod::Call
        } else {
            MagicMethod::CallStatic
        };
        self.bind_member(site, &class, name, magic)
    }

    /// Resolves a method of `class`, falling back to the `magic` handler.
    fn bind_member(
        &self,
        site: &mut CallSiteContext,
        class: &ClassRef,
        name: &str,
        magic: MagicMethod,
    ) -> Result<(Thunk, usize)> {
        let declared = class.find_methods(name);
        let caller = site.class_context.as_deref();
        let visible: Vec<RoutineRef> = declared
            .iter()
            .filter(|method| {
                method
                    .declaring_class
                    .as_ref()
                    .and_then(|declaring| class.ancestor(declaring.id))
                    .map_or(true, |declaring| {
                        is_visible(method.visibility, declaring, caller)
                    })
            })
            .cloned()
            .collect();
        let callable: Vec<RoutineRef> = visible
            .iter()
            .filter(|method| method.is_static || site.receiver.is_some())
            .cloned()
            .collect();

        if !callable.is_empty() {
            let binder = site.binder();
            let thunk = resolve_overloads(name, &callable, binder.as_ref(), site)?;
            return Ok((thunk, callable.len()));
        }

        if let Some(handler) = class.magic(magic) {
            debug!(class = class.name(), name, handler = magic.name(), "routing to magic method");
            let binder = site.binder();
            let plan = magic::missing_method_plan(&handler, name, binder.as_ref(), site);
            return Ok((Thunk::Invoke(plan), 1));
        }

        if let Some(method) = visible.first() {
            lb_core::throw!(
                NotAnObject,
                "Non-static method {}() cannot be called statically",
                method.qualified_name()
            );
        }
        if let Some(method) = declared.first() {
            lb_core::throw!(
                InaccessibleMember,
                "Call to {} method {}() from {}",
                method.visibility,
                method.qualified_name(),
                caller.map_or_else(|| "global scope".to_string(), |c| format!("scope {}", c.name()))
            );
        }
        Err(BindError::MethodNotFound {
            class: class.name().to_string(),
            name: name.to_string(),
        }
        .into())
    }
}
