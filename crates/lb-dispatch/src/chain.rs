//! Runtime chains describe compound lvalues such as `$a->b[0][]` as a linked
//! list of links ending in [`RuntimeChain::End`]. A chain can read through
//! the path, obtain a reference to its target, assign to it, test it or
//! unset it, creating intermediate objects and arrays on the way.
//!
//! Writes walk the chain with a trampoline: an object's lock is held only
//! while its own member slot is being prepared, never while descending into
//! another object, so cyclic object graphs cannot deadlock a walk.

use serde::Serialize;

use lb_core::error::{language_error, BindError, LanguageErrorKind};
use lb_core::{Alias, ArrayKey, ClassRef, Context, ObjectRef, Result, Value};

use crate::fields::{resolve_field, vivify_object, ReadMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LinkKind {
    Value,
    Property,
    ArrayItem,
    ArrayNewItem,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeChain {
    /// Head link: the rest of the chain applies to the operand itself.
    Value(Box<RuntimeChain>),
    Property {
        name: String,
        next: Box<RuntimeChain>,
    },
    ArrayItem {
        key: Value,
        next: Box<RuntimeChain>,
    },
    /// `[]`: appends a new item, then applies the rest to it.
    ArrayNewItem(Box<RuntimeChain>),
    End,
}

enum Terminal {
    Alias,
    Assign(Value),
    Unset,
}

impl Terminal {
    fn vivifies(&self) -> bool {
        !matches!(self, Terminal::Unset)
    }
}

enum Outcome {
    Alias(Alias),
    Done,
}

/// Where the walk continues once the current lock is released.
enum Hop<'c> {
    Finished(Outcome),
    /// Apply the property link `link` to `obj`.
    Object {
        obj: ObjectRef,
        link: &'c RuntimeChain,
        term: Terminal,
    },
    /// Apply `link` to the content of a reference cell.
    Cell {
        alias: Alias,
        link: &'c RuntimeChain,
        term: Terminal,
    },
}

fn item_key(key: &Value) -> Result<ArrayKey> {
    ArrayKey::from_value(key).ok_or_else(|| {
        language_error(
            LanguageErrorKind::TypeError,
            format!("Cannot access offset of type {} on array", key.type_name()),
        )
    })
}

fn invalid_chain(message: &str) -> lb_core::Error {
    BindError::InvalidChain(message.to_string()).into()
}

/// Lookahead: an empty slot followed by a property link becomes an object.
/// Arrays are created by the item links themselves.
fn prepare(ctx: &Context, next: LinkKind, slot: &mut Value) -> Result<()> {
    if next == LinkKind::Property && slot.is_null() {
        ctx.warn("Creating default object from empty value");
        vivify_object(ctx, slot)?;
    }
    Ok(())
}

impl RuntimeChain {
    pub fn builder() -> ChainBuilder {
        ChainBuilder::default()
    }

    pub fn kind(&self) -> LinkKind {
        match self {
            RuntimeChain::Value(_) => LinkKind::Value,
            RuntimeChain::Property { .. } => LinkKind::Property,
            RuntimeChain::ArrayItem { .. } => LinkKind::ArrayItem,
            RuntimeChain::ArrayNewItem(_) => LinkKind::ArrayNewItem,
            RuntimeChain::End => LinkKind::End,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RuntimeChain::End)
    }

    pub fn next(&self) -> Option<&RuntimeChain> {
        match self {
            RuntimeChain::Value(next)
            | RuntimeChain::Property { next, .. }
            | RuntimeChain::ArrayItem { next, .. }
            | RuntimeChain::ArrayNewItem(next) => Some(next),
            RuntimeChain::End => None,
        }
    }

    /// Reads the value at the end of the chain, applied to `value`.
    pub fn get_value(&self, ctx: &Context, caller: Option<&ClassRef>, value: Value) -> Result<Value> {
        self.read(ctx, caller, value, ReadMode::Normal)
    }

    /// The chain's target exists and is not null. Never warns.
    pub fn isset(&self, ctx: &Context, caller: Option<&ClassRef>, root: &Value) -> Result<bool> {
        Ok(!self.read(ctx, caller, root.clone(), ReadMode::Quiet)?.is_null())
    }

    /// A reference to the chain's target inside `root`, creating every
    /// missing step.
    pub fn get_alias(
        &self,
        ctx: &Context,
        caller: Option<&ClassRef>,
        root: &mut Value,
    ) -> Result<Alias> {
        match self.drive(ctx, caller, root, Terminal::Alias)? {
            Outcome::Alias(alias) => Ok(alias),
            Outcome::Done => Err(invalid_chain("chain has no target to reference")),
        }
    }

    pub fn set_value(
        &self,
        ctx: &Context,
        caller: Option<&ClassRef>,
        root: &mut Value,
        value: Value,
    ) -> Result<()> {
        self.drive(ctx, caller, root, Terminal::Assign(value.into_deref()))
            .map(|_| ())
    }

    /// Removes the chain's target. Missing steps make this a no-op.
    pub fn unset(&self, ctx: &Context, caller: Option<&ClassRef>, root: &mut Value) -> Result<()> {
        self.drive(ctx, caller, root, Terminal::Unset).map(|_| ())
    }

    fn read(
        &self,
        ctx: &Context,
        caller: Option<&ClassRef>,
        value: Value,
        mode: ReadMode,
    ) -> Result<Value> {
        let quiet = mode == ReadMode::Quiet;
        match self {
            RuntimeChain::End => Ok(value.into_deref()),
            RuntimeChain::Value(next) => next.read(ctx, caller, value, mode),
            RuntimeChain::Property { name, next } => {
                let obj = match value.into_deref() {
                    Value::Object(obj) => obj,
                    other => {
                        if !quiet {
                            ctx.warn(format!(
                                "Attempt to read property \"{}\" on {}",
                                name,
                                other.type_name()
                            ));
                        }
                        return Ok(Value::Null);
                    }
                };
                let member =
                    resolve_field(obj.class(), name, caller).read(ctx, Some(&obj), name, mode)?;
                next.read(ctx, caller, member, mode)
            }
            RuntimeChain::ArrayItem { key, next } => {
                let item = match value.into_deref() {
                    Value::Array(arr) => {
                        let key = item_key(key)?;
                        match arr.get(&key) {
                            Some(item) => item.clone(),
                            None => {
                                if !quiet {
                                    ctx.warn(format!("Undefined array key {}", key));
                                }
                                Value::Null
                            }
                        }
                    }
                    Value::String(s) => string_offset(ctx, &s, key, quiet),
                    Value::Null => {
                        if !quiet {
                            ctx.warn("Trying to access array offset on null");
                        }
                        Value::Null
                    }
                    other => {
                        if !quiet {
                            ctx.warn(format!(
                                "Trying to access array offset on value of type {}",
                                other.type_name()
                            ));
                        }
                        Value::Null
                    }
                };
                next.read(ctx, caller, item, mode)
            }
            RuntimeChain::ArrayNewItem(_) => Err(invalid_chain("Cannot use [] for reading")),
        }
    }

    fn drive<'c>(
        &'c self,
        ctx: &Context,
        caller: Option<&ClassRef>,
        root: &mut Value,
        term: Terminal,
    ) -> Result<Outcome> {
        let mut hop = self.step(ctx, caller, root, term)?;
        loop {
            hop = match hop {
                Hop::Finished(outcome) => return Ok(outcome),
                Hop::Object { obj, link, term } => link.step_object(ctx, caller, &obj, term)?,
                Hop::Cell { alias, link, term } => {
                    if let (RuntimeChain::End, Terminal::Alias) = (link, &term) {
                        return Ok(Outcome::Alias(alias));
                    }
                    alias.with_value_mut(|slot| link.step(ctx, caller, slot, term))?
                }
            };
        }
    }

    /// Applies this link to `slot`. Descending into another object or a
    /// reference cell is deferred to the trampoline.
    fn step<'c>(
        &'c self,
        ctx: &Context,
        caller: Option<&ClassRef>,
        slot: &mut Value,
        term: Terminal,
    ) -> Result<Hop<'c>> {
        if let Value::Alias(alias) = slot {
            return Ok(Hop::Cell {
                alias: alias.clone(),
                link: self,
                term,
            });
        }
        match self {
            RuntimeChain::Value(next) => {
                if term.vivifies() {
                    prepare(ctx, next.kind(), slot)?;
                }
                next.step(ctx, caller, slot, term)
            }
            RuntimeChain::End => Ok(Hop::Finished(match term {
                Terminal::Alias => Outcome::Alias(slot.ensure_alias()),
                Terminal::Assign(value) => {
                    *slot = value;
                    Outcome::Done
                }
                Terminal::Unset => {
                    *slot = Value::Null;
                    Outcome::Done
                }
            })),
            RuntimeChain::Property { name, .. } => match slot {
                Value::Object(obj) => Ok(Hop::Object {
                    obj: obj.clone(),
                    link: self,
                    term,
                }),
                _ if !term.vivifies() => Ok(Hop::Finished(Outcome::Done)),
                other => Err(language_error(
                    LanguageErrorKind::InvalidOperand,
                    format!(
                        "Attempt to assign property \"{}\" on {}",
                        name,
                        other.type_name()
                    ),
                )),
            },
            RuntimeChain::ArrayItem { key, next } => {
                let key = item_key(key)?;
                if !term.vivifies() {
                    let Value::Array(arr) = slot else {
                        return Ok(Hop::Finished(Outcome::Done));
                    };
                    if next.is_terminal() {
                        arr.remove(&key);
                        return Ok(Hop::Finished(Outcome::Done));
                    }
                    return match arr.get_mut(&key) {
                        Some(item) => next.step(ctx, caller, item, term),
                        None => Ok(Hop::Finished(Outcome::Done)),
                    };
                }
                let arr = as_array(slot)?;
                let item = arr.entry(key);
                prepare(ctx, next.kind(), item)?;
                next.step(ctx, caller, item, term)
            }
            RuntimeChain::ArrayNewItem(next) => {
                if !term.vivifies() {
                    return Err(invalid_chain("Cannot use [] for unsetting"));
                }
                let arr = as_array(slot)?;
                // the new item is fully resolved before it is appended
                let mut item = Value::Null;
                prepare(ctx, next.kind(), &mut item)?;
                let outcome = next.drive(ctx, caller, &mut item, term)?;
                arr.push(item);
                Ok(Hop::Finished(outcome))
            }
        }
    }

    /// Applies this property link to `obj`.
    fn step_object<'c>(
        &'c self,
        ctx: &Context,
        caller: Option<&ClassRef>,
        obj: &ObjectRef,
        term: Terminal,
    ) -> Result<Hop<'c>> {
        let RuntimeChain::Property { name, next } = self else {
            return Err(invalid_chain("object step on a non-property link"));
        };
        let resolution = resolve_field(obj.class(), name, caller);
        let obj = Some(obj);
        match (next.as_ref(), term) {
            (RuntimeChain::End, Terminal::Assign(value)) => {
                resolution.write(ctx, obj, name, value)?;
                Ok(Hop::Finished(Outcome::Done))
            }
            (RuntimeChain::End, Terminal::Unset) => {
                resolution.unset(ctx, obj, name)?;
                Ok(Hop::Finished(Outcome::Done))
            }
            (RuntimeChain::End, Terminal::Alias) => {
                let alias = resolution.place(ctx, obj, name, false)?.ensure_alias();
                Ok(Hop::Finished(Outcome::Alias(alias)))
            }
            (_, Terminal::Unset) => match resolution.existing_place(obj, name)? {
                Some(mut place) => {
                    place.with_value_mut(|slot| next.step(ctx, caller, slot, Terminal::Unset))
                }
                None => Ok(Hop::Finished(Outcome::Done)),
            },
            (_, term) => {
                let mut place = resolution.place(ctx, obj, name, true)?;
                place.with_value_mut(|slot| {
                    prepare(ctx, next.kind(), slot)?;
                    next.step(ctx, caller, slot, term)
                })
            }
        }
    }
}

fn as_array(slot: &mut Value) -> Result<&mut lb_core::PhpArray> {
    let type_name = slot.type_name();
    slot.ensure_array().ok_or_else(|| {
        language_error(
            LanguageErrorKind::InvalidOperand,
            format!("Cannot use a scalar value of type {} as an array", type_name),
        )
    })
}

fn string_offset(ctx: &Context, s: &str, key: &Value, quiet: bool) -> Value {
    let offset = match key.deref() {
        Value::Long(offset) => offset,
        other => {
            if !quiet {
                ctx.warn(format!(
                    "Cannot access offset of type {} on string",
                    other.type_name()
                ));
            }
            return Value::Null;
        }
    };
    let len = s.len() as i64;
    let index = if offset < 0 { len + offset } else { offset };
    match s.as_bytes().get(index.max(0) as usize) {
        Some(byte) if index >= 0 => Value::string((*byte as char).to_string()),
        _ => {
            if quiet {
                return Value::Null;
            }
            ctx.warn(format!("Uninitialized string offset {}", offset));
            Value::string("")
        }
    }
}

enum Step {
    Property(String),
    Item(Value),
    NewItem,
}

/// Builds a chain head to tail: `$x->a[0][]` is
/// `RuntimeChain::builder().property("a").item(0).new_item().build()`.
#[derive(Default)]
pub struct ChainBuilder {
    steps: Vec<Step>,
}

impl ChainBuilder {
    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.steps.push(Step::Property(name.into()));
        self
    }

    pub fn item(mut self, key: impl Into<Value>) -> Self {
        self.steps.push(Step::Item(key.into()));
        self
    }

    pub fn new_item(mut self) -> Self {
        self.steps.push(Step::NewItem);
        self
    }

    pub fn build(self) -> RuntimeChain {
        let tail = self
            .steps
            .into_iter()
            .rev()
            .fold(RuntimeChain::End, |next, step| {
                let next = Box::new(next);
                match step {
                    Step::Property(name) => RuntimeChain::Property { name, next },
                    Step::Item(key) => RuntimeChain::ArrayItem { key, next },
                    Step::NewItem => RuntimeChain::ArrayNewItem(next),
                }
            });
        RuntimeChain::Value(Box::new(tail))
    }
}
