use lb_core::error::BindError;
use lb_core::{ClassRef, Context, Result, Value};

use super::CallSiteContext;
use crate::args::LogicalArg;
use crate::plan::Guard;
use crate::shape::{ArgShape, CallArg, CallSiteShape, SourceType};

fn malformed(message: impl Into<String>) -> lb_core::Error {
    BindError::MalformedCallSite(message.into()).into()
}

fn slot_value(args: &[CallArg], slot: usize) -> Result<&Value> {
    match args.get(slot) {
        Some(CallArg::Value(value)) => Ok(value),
        _ => Err(malformed(format!("slot {} does not hold a value", slot))),
    }
}

fn slot_name(args: &[CallArg], slot: usize) -> Result<String> {
    match slot_value(args, slot)?.deref() {
        Value::String(name) => Ok(name),
        other => Err(malformed(format!(
            "slot {} must hold a name, got {}",
            slot,
            other.type_name()
        ))),
    }
}

/// A class name slot that may be null. The guard pins either the name or its
/// absence.
fn optional_class(
    ctx: &Context,
    site: &mut CallSiteContext,
    args: &[CallArg],
    slot: usize,
) -> Result<Option<ClassRef>> {
    if slot_value(args, slot)?.is_null() {
        site.guard.push(Guard::IsNull { slot });
        return Ok(None);
    }
    let name = slot_name(args, slot)?;
    let class = ctx
        .class(&name)
        .ok_or_else(|| BindError::ClassNotFound { name: name.clone() })?;
    site.guard.push(Guard::ClassIs {
        name: name.clone(),
        class: class.id(),
    });
    site.guard.push(Guard::NameIs { slot, name });
    Ok(Some(class))
}

impl CallSiteContext {
    /// Walks the site's argument shapes, pulling special markers out of the
    /// physical arguments and leaving the user arguments behind.
    pub fn collect(ctx: &Context, shape: &CallSiteShape, args: &[CallArg]) -> Result<Self> {
        let expected = shape.slot_count();
        if expected != args.len() {
            return Err(malformed(format!(
                "expected {} physical arguments, got {}",
                expected,
                args.len()
            )));
        }

        let mut site = CallSiteContext::default();
        let mut target_name = None;
        let mut pending_unpack = false;
        let mut slot = 0;
        for arg in &shape.args {
            match arg {
                ArgShape::Context => site.context_supplied = true,
                ArgShape::Generic(types) => site.generics.extend(types.iter().cloned()),
                ArgShape::Unpack => {
                    pending_unpack = true;
                    site.has_unpack = true;
                }
                ArgShape::Receiver => {
                    site.receiver_slot = Some(slot);
                    site.receiver = slot_value(args, slot)?.as_object();
                }
                ArgShape::Name => {
                    let name = slot_name(args, slot)?;
                    site.guard.push(Guard::NameIs {
                        slot,
                        name: name.clone(),
                    });
                    site.name = Some(name);
                }
                ArgShape::TargetType => {
                    let name = slot_name(args, slot)?;
                    site.guard.push(Guard::NameIs {
                        slot,
                        name: name.clone(),
                    });
                    target_name = Some(name);
                }
                ArgShape::LateStatic => {
                    site.late_static = optional_class(ctx, &mut site, args, slot)?;
                }
                ArgShape::CallerClass => {
                    site.class_context = optional_class(ctx, &mut site, args, slot)?;
                }
                ArgShape::Value(source) => {
                    let mut logical = LogicalArg::new(slot, *source);
                    logical.unpack = std::mem::take(&mut pending_unpack);
                    if !logical.unpack {
                        restrict(&mut site, &mut logical, slot_value(args, slot)?);
                    }
                    site.arguments.push(logical);
                }
                ArgShape::Chain => {
                    if !matches!(args.get(slot), Some(CallArg::Chain(_))) {
                        return Err(malformed(format!("slot {} does not hold a chain", slot)));
                    }
                    match site.arguments.last_mut() {
                        Some(last) if last.chain.is_none() && !last.unpack => {
                            last.chain = Some(slot)
                        }
                        _ => return Err(malformed("chain without an argument to apply to")),
                    }
                }
            }
            if arg.occupies_slot() {
                slot += 1;
            }
        }
        if pending_unpack {
            return Err(malformed("spread marker without an argument"));
        }
        if let Some(name) = target_name {
            // pinned by the NameIs guard on its slot
            site.target_type = Some(site.resolve_class(ctx, &name)?);
        }
        Ok(site)
    }
}

/// Specializes an argument on the runtime facts its static type leaves open.
fn restrict(site: &mut CallSiteContext, logical: &mut LogicalArg, value: &Value) {
    let slot = logical.slot;
    match (logical.source, value) {
        (SourceType::Object, Value::Object(obj)) => {
            site.guard.push(Guard::ObjectOfClass {
                slot,
                class: obj.class().id(),
            });
            logical.class = Some(obj.class().clone());
        }
        // not what the compiler promised; cost it from the runtime value
        (SourceType::Object, _) => logical.source = SourceType::Any,
        (source, _) => {
            if let Some(kind) = source.exact_kind() {
                site.guard.push(Guard::KindIs { slot, kind });
            }
        }
    }
}
