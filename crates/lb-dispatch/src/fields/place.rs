use lb_core::error::{language_error, LanguageErrorKind};
use lb_core::{Alias, ArrayKey, ClassRef, Context, ObjectRef, Result, Value};

/// A storage location a member access resolved to.
#[derive(Debug, Clone)]
pub enum FieldPlace {
    Declared { obj: ObjectRef, slot: usize },
    Static { class: ClassRef, slot: usize },
    /// Entry of an object's runtime-fields bag.
    Bag { obj: ObjectRef, key: ArrayKey },
    /// A value with no backing storage, e.g. the result of `__get`. Writes
    /// through it are lost.
    Temp(Value),
}

impl FieldPlace {
    /// Runs `func` on the slot while its owner is locked.
    pub fn with_value_mut<R>(&mut self, func: impl FnOnce(&mut Value) -> R) -> R {
        match self {
            FieldPlace::Declared { obj, slot } => obj.with_state(|state| {
                if state.fields.len() <= *slot {
                    state.fields.resize(*slot + 1, Value::Null);
                }
                func(&mut state.fields[*slot])
            }),
            FieldPlace::Static { class, slot } => class.with_statics(|statics| {
                if statics.len() <= *slot {
                    statics.resize(*slot + 1, Value::Null);
                }
                func(&mut statics[*slot])
            }),
            FieldPlace::Bag { obj, key } => {
                obj.with_state(|state| func(state.runtime_fields_mut().entry(key.clone())))
            }
            FieldPlace::Temp(value) => func(value),
        }
    }

    pub fn get(&mut self) -> Value {
        self.with_value_mut(|slot| slot.deref())
    }

    pub fn ensure_alias(&mut self) -> Alias {
        self.with_value_mut(Value::ensure_alias)
    }

    /// The object held by the place, creating a `stdClass` in an empty slot.
    pub fn ensure_object(&mut self, ctx: &Context) -> Result<ObjectRef> {
        self.with_value_mut(|slot| vivify_object(ctx, slot))
    }

    /// The array held by the place, creating one in an empty slot. The slot
    /// is turned into a reference cell so item writes land in the member.
    pub fn ensure_array(&mut self) -> Result<Alias> {
        self.with_value_mut(|slot| {
            vivify_array(slot)?;
            Ok(slot.ensure_alias())
        })
    }
}

pub(crate) fn vivify_object(ctx: &Context, slot: &mut Value) -> Result<ObjectRef> {
    if let Value::Alias(alias) = slot {
        return alias.with_value_mut(|inner| vivify_object(ctx, inner));
    }
    if slot.is_null() {
        *slot = Value::Object(ctx.new_std_object());
    }
    match slot {
        Value::Object(obj) => Ok(obj.clone()),
        other => Err(language_error(
            LanguageErrorKind::InvalidOperand,
            format!("Attempt to modify property of {}", other.type_name()),
        )),
    }
}

fn vivify_array(slot: &mut Value) -> Result<()> {
    if let Value::Alias(alias) = slot {
        return alias.with_value_mut(vivify_array);
    }
    let type_name = slot.type_name();
    match slot.ensure_array() {
        Some(_) => Ok(()),
        None => Err(language_error(
            LanguageErrorKind::InvalidOperand,
            format!("Cannot use a scalar value of type {} as an array", type_name),
        )),
    }
}
