use serde::{Deserialize, Serialize};

use lb_core::error::{language_error, BindError, LanguageErrorKind};
use lb_core::metadata::ClassId;
use lb_core::{debug, Alias, ClassRef, Context, ObjectRef, Result, Value};

use super::{resolve_field, resolve_static_field, FieldResolution, ReadMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    Read,
    /// Read without warnings, as `??` does.
    ReadQuiet,
    /// Read as a reference cell, creating the member if needed.
    ReadRef,
    /// Read for a nested property write; an empty member becomes `stdClass`.
    EnsureObject,
    /// Read for a nested item write; an empty member becomes an array.
    EnsureArray,
    Write,
    /// Bind the member to a reference cell.
    WriteRef,
    Unset,
    Isset,
}

/// Static description of a member access site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldShape {
    /// `None` when the name is supplied at run time (`$obj->$name`).
    pub name: Option<String>,
    /// Set for static property access (`Class::$name`), which has no
    /// receiver.
    pub class: Option<String>,
    pub access: AccessKind,
}

impl FieldShape {
    pub fn instance(name: impl Into<String>, access: AccessKind) -> Self {
        Self {
            name: Some(name.into()),
            class: None,
            access,
        }
    }

    pub fn indirect(access: AccessKind) -> Self {
        Self {
            name: None,
            class: None,
            access,
        }
    }

    pub fn static_(class: impl Into<String>, name: impl Into<String>, access: AccessKind) -> Self {
        Self {
            name: Some(name.into()),
            class: Some(class.into()),
            access,
        }
    }
}

/// Runtime operands of one member access.
#[derive(Debug, Clone)]
pub struct FieldRequest<'a> {
    pub receiver: &'a Value,
    pub caller: Option<&'a ClassRef>,
    /// Member name for indirect sites.
    pub name: Option<&'a str>,
    /// Value for writes, reference cell for reference writes.
    pub operand: Option<Value>,
}

impl<'a> FieldRequest<'a> {
    pub fn new(receiver: &'a Value) -> Self {
        Self {
            receiver,
            caller: None,
            name: None,
            operand: None,
        }
    }

    pub fn with_caller(mut self, caller: &'a ClassRef) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn with_name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_operand(mut self, operand: Value) -> Self {
        self.operand = Some(operand);
        self
    }
}

#[derive(Debug, Clone)]
pub enum FieldOutput {
    Value(Value),
    Alias(Alias),
    Object(ObjectRef),
    Bool(bool),
    Done,
}

impl FieldOutput {
    pub fn into_value(self) -> Value {
        match self {
            FieldOutput::Value(value) => value,
            FieldOutput::Alias(alias) => Value::Alias(alias),
            FieldOutput::Object(obj) => Value::Object(obj),
            FieldOutput::Bool(b) => Value::Bool(b),
            FieldOutput::Done => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ReceiverGuard {
    Class(ClassId),
    NotObject,
    Static { name: String, class: ClassId },
}

#[derive(Debug, Clone, PartialEq)]
struct FieldGuard {
    receiver: ReceiverGuard,
    caller: Option<ClassId>,
    name: String,
}

impl FieldGuard {
    fn test(&self, ctx: &Context, shape: &FieldShape, request: &FieldRequest<'_>) -> bool {
        let name = shape.name.as_deref().or(request.name);
        if name != Some(self.name.as_str()) {
            return false;
        }
        if request.caller.map(|c| c.id()) != self.caller {
            return false;
        }
        match &self.receiver {
            ReceiverGuard::Class(id) => request
                .receiver
                .as_object()
                .is_some_and(|obj| obj.class().id() == *id),
            ReceiverGuard::NotObject => request.receiver.as_object().is_none(),
            ReceiverGuard::Static { name, class } => {
                ctx.class(name).is_some_and(|found| found.id() == *class)
            }
        }
    }
}

#[derive(Debug, Clone)]
enum FieldPlan {
    Resolved(FieldResolution),
    /// Instance access on something that is not an object.
    NotObject,
}

/// A member access site bound for one receiver class and caller scope.
#[derive(Debug, Clone)]
pub struct FieldBinding {
    shape: FieldShape,
    guard: FieldGuard,
    plan: FieldPlan,
    name: String,
}

impl FieldBinding {
    pub fn applies(&self, ctx: &Context, request: &FieldRequest<'_>) -> bool {
        self.guard.test(ctx, &self.shape, request)
    }

    pub fn resolution(&self) -> Option<&FieldResolution> {
        match &self.plan {
            FieldPlan::Resolved(resolution) => Some(resolution),
            FieldPlan::NotObject => None,
        }
    }

    pub fn execute(&self, ctx: &Context, request: FieldRequest<'_>) -> Result<FieldOutput> {
        let name = self.name.as_str();
        let access = self.shape.access;
        let resolution = match &self.plan {
            FieldPlan::Resolved(resolution) => resolution,
            FieldPlan::NotObject => {
                let given = request.receiver.type_name();
                return match access {
                    AccessKind::Read => {
                        ctx.warn(format!(
                            "Attempt to read property \"{}\" on {}",
                            name, given
                        ));
                        Ok(FieldOutput::Value(Value::Null))
                    }
                    AccessKind::ReadQuiet => Ok(FieldOutput::Value(Value::Null)),
                    AccessKind::Isset => Ok(FieldOutput::Bool(false)),
                    AccessKind::Unset => Ok(FieldOutput::Done),
                    _ => Err(language_error(
                        LanguageErrorKind::NotAnObject,
                        format!("Attempt to assign property \"{}\" on {}", name, given),
                    )),
                };
            }
        };

        let obj = request.receiver.as_object();
        let obj = obj.as_ref();
        Ok(match access {
            AccessKind::Read => {
                FieldOutput::Value(resolution.read(ctx, obj, name, ReadMode::Normal)?)
            }
            AccessKind::ReadQuiet => {
                FieldOutput::Value(resolution.read(ctx, obj, name, ReadMode::Quiet)?)
            }
            AccessKind::ReadRef => {
                FieldOutput::Alias(resolution.place(ctx, obj, name, false)?.ensure_alias())
            }
            AccessKind::EnsureObject => {
                FieldOutput::Object(resolution.place(ctx, obj, name, true)?.ensure_object(ctx)?)
            }
            AccessKind::EnsureArray => {
                FieldOutput::Alias(resolution.place(ctx, obj, name, true)?.ensure_array()?)
            }
            AccessKind::Write => {
                let value = request.operand.unwrap_or_default();
                resolution.write(ctx, obj, name, value)?;
                FieldOutput::Done
            }
            AccessKind::WriteRef => {
                let alias = match request.operand {
                    Some(Value::Alias(alias)) => alias,
                    Some(value) => Alias::new(value),
                    None => Alias::new(Value::Null),
                };
                resolution.write_ref(ctx, obj, name, alias)?;
                FieldOutput::Done
            }
            AccessKind::Unset => {
                resolution.unset(ctx, obj, name)?;
                FieldOutput::Done
            }
            AccessKind::Isset => FieldOutput::Bool(resolution.isset(ctx, obj, name)?),
        })
    }
}

/// Produces [`FieldBinding`]s.
pub struct FieldBinder<'a> {
    ctx: &'a Context,
    shape: &'a FieldShape,
}

impl<'a> FieldBinder<'a> {
    pub fn new(ctx: &'a Context, shape: &'a FieldShape) -> Self {
        Self { ctx, shape }
    }

    pub fn bind(&self, request: &FieldRequest<'_>) -> Result<FieldBinding> {
        let name = match self.shape.name.as_deref().or(request.name) {
            Some(name) => name.to_string(),
            None => {
                return Err(BindError::MalformedCallSite(
                    "member access names no member".to_string(),
                )
                .into())
            }
        };
        let caller = request.caller;

        let (receiver, plan) = match &self.shape.class {
            Some(class_name) => {
                let class = self
                    .ctx
                    .class(class_name)
                    .ok_or_else(|| BindError::ClassNotFound {
                        name: class_name.clone(),
                    })?;
                let resolution = resolve_static_field(&class, &name, caller)?;
                (
                    ReceiverGuard::Static {
                        name: class_name.clone(),
                        class: class.id(),
                    },
                    FieldPlan::Resolved(resolution),
                )
            }
            None => match request.receiver.as_object() {
                Some(obj) => {
                    let resolution = resolve_field(obj.class(), &name, caller);
                    if self.shape.access == AccessKind::Read
                        && resolution.is_undefined()
                        && self.ctx.options().strict_undefined_members
                    {
                        return Err(BindError::UndefinedProperty {
                            class: obj.class().name().to_string(),
                            name,
                        }
                        .into());
                    }
                    (
                        ReceiverGuard::Class(obj.class().id()),
                        FieldPlan::Resolved(resolution),
                    )
                }
                None => (ReceiverGuard::NotObject, FieldPlan::NotObject),
            },
        };
        debug!(
            member = name.as_str(),
            access = ?self.shape.access,
            plan = ?plan,
            "bound member access"
        );
        Ok(FieldBinding {
            shape: self.shape.clone(),
            guard: FieldGuard {
                receiver,
                caller: caller.map(|c| c.id()),
                name: name.clone(),
            },
            plan,
            name,
        })
    }
}
