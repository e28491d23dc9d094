//! Argument binders: the bridge between a call site's logical arguments and
//! a candidate routine's parameters. The tuple binder knows every argument's
//! static type; the array binder serves sites that spread arrays and only
//! learns the argument count at run time.

mod array;
mod tuple;

pub use array::ArrayArgsBinder;
pub use tuple::TupleArgsBinder;

use std::cell::RefCell;

use serde::Serialize;

use lb_core::error::BindError;
use lb_core::error::{language_error, LanguageErrorKind};
use lb_core::metadata::{ParamDescriptor, RoutineDescriptor};
use lb_core::{Alias, ClassRef, Context, Result, TypeRef, Value, ValueKind};

use crate::chain::RuntimeChain;
use crate::convert::{cost_of, kind_cost};
use crate::cost::ConversionCost;
use crate::plan::{ArgPlan, CostExpr};
use crate::shape::{CallArg, SourceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArgCount {
    Exact(usize),
    /// Known only once spread arrays are expanded.
    Runtime,
}

/// A user argument after special markers have been stripped.
#[derive(Debug, Clone)]
pub struct LogicalArg {
    pub slot: usize,
    pub source: SourceType,
    /// Slot of a chain applied to this argument.
    pub chain: Option<usize>,
    /// Spread into the argument list.
    pub unpack: bool,
    /// Class an object argument was restricted to while binding.
    pub class: Option<ClassRef>,
}

impl LogicalArg {
    pub fn new(slot: usize, source: SourceType) -> Self {
        Self {
            slot,
            source,
            chain: None,
            unpack: false,
            class: None,
        }
    }

    /// Cost decided without looking at the value.
    pub fn static_cost(&self, target: &TypeRef) -> Option<ConversionCost> {
        if self.chain.is_some() || self.unpack {
            return None;
        }
        match self.source {
            SourceType::Object => self
                .class
                .as_deref()
                .map(|class| kind_cost(ValueKind::Object, Some(class), target)),
            source => source.exact_kind().map(|kind| kind_cost(kind, None, target)),
        }
    }

    /// Can be bound to a by-reference parameter without a temporary.
    pub fn is_reference_capable(&self) -> bool {
        self.chain.is_some() || self.source == SourceType::Alias
    }
}

/// Binder operations the overload resolver drives.
pub trait ArgumentsBinder {
    fn arg_count(&self) -> ArgCount;

    /// Plan for argument `index`. With a parameter the argument is converted
    /// to its type and a missing argument falls back to the parameter's
    /// default; without one the raw value (or null) is passed.
    fn bind_arg(
        &self,
        index: usize,
        param: Option<&ParamDescriptor>,
        routine: &RoutineDescriptor,
    ) -> ArgPlan;

    /// Arguments from `from` on, packed for a variadic parameter.
    fn bind_trailing(&self, from: usize, elem: &TypeRef, by_ref: bool) -> ArgPlan;

    fn bind_all(&self) -> ArgPlan {
        ArgPlan::AllArgs
    }

    fn bind_cost(
        &self,
        index: usize,
        target: &TypeRef,
        by_ref: bool,
        mandatory: bool,
        force_zero: bool,
    ) -> CostExpr;

    fn bind_trailing_cost(&self, from: usize, elem: &TypeRef, by_ref: bool) -> CostExpr;

    /// Penalty for arguments beyond `arity` when there is no variadic.
    fn bind_excess_cost(&self, arity: usize) -> CostExpr;

    fn layout(&self) -> ArgLayout;
}

pub(crate) fn missing_cost(mandatory: bool) -> ConversionCost {
    if mandatory {
        ConversionCost::MISSING_ARGS
    } else {
        ConversionCost::DEFAULT_VALUE
    }
}

/// Value of a parameter nobody passed an argument for.
pub(crate) fn default_plan(param: &ParamDescriptor, routine: &RoutineDescriptor) -> ArgPlan {
    if let Some(provider) = &param.default_provider {
        return ArgPlan::Provider(provider.clone());
    }
    if let Some(value) = &param.default_value {
        return ArgPlan::Const(value.clone());
    }
    ArgPlan::Missing {
        routine: routine.qualified_name(),
        expected: routine
            .explicit_params()
            .filter(|p| !p.is_optional())
            .count(),
    }
}

pub(crate) fn present_plan(index: usize, param: Option<&ParamDescriptor>) -> ArgPlan {
    match param {
        Some(param) if param.is_by_ref => ArgPlan::Alias { index },
        Some(param) => ArgPlan::Value {
            index,
            target: param.ty.clone(),
        },
        None => ArgPlan::Value {
            index,
            target: TypeRef::Value,
        },
    }
}

pub(crate) fn absent_plan(param: Option<&ParamDescriptor>, routine: &RoutineDescriptor) -> ArgPlan {
    match param {
        Some(param) => default_plan(param, routine),
        None => ArgPlan::Const(Value::Null),
    }
}

/// Where each logical argument lives among the physical arguments.
#[derive(Debug, Clone)]
pub struct ArgLayout {
    args: Vec<LogicalArg>,
}

impl ArgLayout {
    pub fn new(args: Vec<LogicalArg>) -> Self {
        Self { args }
    }

    pub fn args(&self) -> &[LogicalArg] {
        &self.args
    }

    /// Resolves the layout against one call's physical arguments, expanding
    /// spread arrays.
    pub fn view<'a>(
        &'a self,
        ctx: &'a Context,
        caller: Option<&'a ClassRef>,
        args: &'a [CallArg],
    ) -> Result<ArgView<'a>> {
        let mut items = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            let root = match args.get(arg.slot) {
                Some(CallArg::Value(value)) => value,
                _ => {
                    return Err(BindError::MalformedCallSite(format!(
                        "slot {} does not hold a value",
                        arg.slot
                    ))
                    .into())
                }
            };
            if let Some(chain_slot) = arg.chain {
                let chain = match args.get(chain_slot) {
                    Some(CallArg::Chain(chain)) => chain,
                    _ => {
                        return Err(BindError::MalformedCallSite(format!(
                            "slot {} does not hold a chain",
                            chain_slot
                        ))
                        .into())
                    }
                };
                items.push(ArgItem::Chain {
                    root,
                    chain,
                    memo: RefCell::new(None),
                });
                continue;
            }
            if arg.unpack {
                match root.deref() {
                    Value::Array(spread) => {
                        items.extend(spread.values().cloned().map(ArgItem::Value));
                    }
                    other => {
                        return Err(language_error(
                            LanguageErrorKind::TypeError,
                            format!("Only arrays can be unpacked, {} given", other.type_name()),
                        ))
                    }
                }
                continue;
            }
            items.push(ArgItem::Value(root.clone()));
        }
        Ok(ArgView {
            ctx,
            caller,
            items,
        })
    }
}

enum ArgItem<'a> {
    Value(Value),
    /// Read lazily, at most once per call.
    Chain {
        root: &'a Value,
        chain: &'a RuntimeChain,
        memo: RefCell<Option<Value>>,
    },
}

/// The logical arguments of one call.
pub struct ArgView<'a> {
    ctx: &'a Context,
    caller: Option<&'a ClassRef>,
    items: Vec<ArgItem<'a>>,
}

impl<'a> ArgView<'a> {
    pub fn ctx(&self) -> &'a Context {
        self.ctx
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Argument `index`, possibly a reference cell. Null past the end.
    pub fn value(&self, index: usize) -> Result<Value> {
        match self.items.get(index) {
            None => Ok(Value::Null),
            Some(ArgItem::Value(value)) => Ok(value.clone()),
            Some(ArgItem::Chain { root, chain, memo }) => {
                if let Some(value) = memo.borrow().as_ref() {
                    return Ok(value.clone());
                }
                let value = chain.get_value(self.ctx, self.caller, (*root).clone())?;
                *memo.borrow_mut() = Some(value.clone());
                Ok(value)
            }
        }
    }

    /// Argument `index` as a reference cell. Plain values are wrapped in a
    /// temporary cell the caller never sees again.
    pub fn alias(&self, index: usize) -> Result<Alias> {
        match self.items.get(index) {
            None => Ok(Alias::new(Value::Null)),
            Some(ArgItem::Value(Value::Alias(alias))) => Ok(alias.clone()),
            Some(ArgItem::Value(value)) => Ok(Alias::new(value.clone())),
            Some(ArgItem::Chain { root, chain, .. }) => {
                let mut root = (*root).clone();
                chain.get_alias(self.ctx, self.caller, &mut root)
            }
        }
    }

    pub fn is_reference_capable(&self, index: usize) -> bool {
        matches!(
            self.items.get(index),
            Some(ArgItem::Value(Value::Alias(_)) | ArgItem::Chain { .. })
        )
    }

    /// By-value cost of the referent; binding a temporary to a by-reference
    /// parameter adds a warning.
    pub fn cost(&self, index: usize, target: &TypeRef, by_ref: bool) -> Result<ConversionCost> {
        let mut cost = cost_of(&self.value(index)?, target);
        if by_ref && !self.is_reference_capable(index) {
            cost |= ConversionCost::WARNING;
        }
        Ok(cost)
    }

    /// Every argument, dereferenced.
    pub fn values(&self) -> Result<Vec<Value>> {
        (0..self.len())
            .map(|index| self.value(index).map(Value::into_deref))
            .collect()
    }
}
