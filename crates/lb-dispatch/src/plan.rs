//! The bound form of a call site: guards that decide whether a binding still
//! applies, cost expressions evaluated at run time when overloads cannot be
//! decided statically, and the per-parameter argument plans.

use itertools::Itertools;
use serde::Serialize;

use lb_core::error::{language_error, LanguageError, LanguageErrorKind};
use lb_core::metadata::{ClassId, DefaultProvider, Invocation};
use lb_core::{trace, Context, ObjectRef, PhpArray, Result, RoutineRef, TypeRef, Value, ValueKind};

use crate::args::ArgView;
use crate::convert::convert;
use crate::cost::ConversionCost;
use crate::shape::CallArg;

/// Conversion cost of one candidate, possibly depending on runtime values.
#[derive(Debug, Clone)]
pub enum CostExpr {
    Const(ConversionCost),
    /// Cost of converting argument `index` to `target`.
    Arg {
        index: usize,
        target: TypeRef,
        by_ref: bool,
    },
    /// `present` if argument `index` was supplied, `absent` otherwise.
    IfPresent {
        index: usize,
        present: Box<CostExpr>,
        absent: ConversionCost,
    },
    /// `TOO_MANY_ARGS` when more than `arity` arguments were supplied.
    Excess { arity: usize },
    /// Combined cost of every argument from `from` on.
    Trailing {
        from: usize,
        elem: TypeRef,
        by_ref: bool,
    },
    Or(Vec<CostExpr>),
}

impl Default for CostExpr {
    fn default() -> Self {
        CostExpr::Const(ConversionCost::PASS)
    }
}

impl CostExpr {
    pub fn or(self, other: CostExpr) -> CostExpr {
        match (self, other) {
            (CostExpr::Const(a), CostExpr::Const(b)) => CostExpr::Const(a | b),
            (CostExpr::Const(c), expr) | (expr, CostExpr::Const(c)) if c == ConversionCost::PASS => {
                expr
            }
            (CostExpr::Or(mut left), CostExpr::Or(right)) => {
                left.extend(right);
                CostExpr::Or(left)
            }
            (CostExpr::Or(mut parts), expr) => {
                parts.push(expr);
                CostExpr::Or(parts)
            }
            (expr, CostExpr::Or(mut parts)) => {
                parts.insert(0, expr);
                CostExpr::Or(parts)
            }
            (left, right) => CostExpr::Or(vec![left, right]),
        }
    }

    pub fn as_const(&self) -> Option<ConversionCost> {
        match self {
            CostExpr::Const(cost) => Some(*cost),
            _ => None,
        }
    }

    /// The least cost any runtime arguments could produce.
    pub fn lower_bound(&self) -> ConversionCost {
        match self {
            CostExpr::Const(cost) => *cost,
            CostExpr::Arg { .. } | CostExpr::Excess { .. } | CostExpr::Trailing { .. } => {
                ConversionCost::PASS
            }
            CostExpr::IfPresent {
                present, absent, ..
            } => present.lower_bound().min(*absent),
            CostExpr::Or(parts) => parts
                .iter()
                .fold(ConversionCost::PASS, |acc, part| acc | part.lower_bound()),
        }
    }

    pub fn eval(&self, view: &ArgView<'_>) -> Result<ConversionCost> {
        Ok(match self {
            CostExpr::Const(cost) => *cost,
            CostExpr::Arg {
                index,
                target,
                by_ref,
            } => view.cost(*index, target, *by_ref)?,
            CostExpr::IfPresent {
                index,
                present,
                absent,
            } => {
                if *index < view.len() {
                    present.eval(view)?
                } else {
                    *absent
                }
            }
            CostExpr::Excess { arity } => {
                if view.len() > *arity {
                    ConversionCost::TOO_MANY_ARGS
                } else {
                    ConversionCost::PASS
                }
            }
            CostExpr::Trailing { from, elem, by_ref } => {
                let mut cost = ConversionCost::PASS;
                for index in *from..view.len() {
                    cost |= view.cost(index, elem, *by_ref)?;
                }
                cost
            }
            CostExpr::Or(parts) => {
                let mut cost = ConversionCost::PASS;
                for part in parts {
                    cost |= part.eval(view)?;
                }
                cost
            }
        })
    }
}

/// How one declared parameter receives its value.
#[derive(Debug, Clone)]
pub enum ArgPlan {
    /// Argument `index` converted to `target`.
    Value { index: usize, target: TypeRef },
    /// Argument `index` as a reference cell.
    Alias { index: usize },
    IfPresent {
        index: usize,
        present: Box<ArgPlan>,
        absent: Box<ArgPlan>,
    },
    Const(Value),
    Provider(DefaultProvider),
    /// A mandatory parameter nobody supplied. Fails when invoked.
    Missing { routine: String, expected: usize },
    /// Arguments from `from` on, packed into a fresh array.
    Trailing {
        from: usize,
        elem: TypeRef,
        by_ref: bool,
    },
    /// Every argument, packed into an array.
    AllArgs,
}

impl ArgPlan {
    pub fn eval(&self, view: &ArgView<'_>) -> Result<Value> {
        let ctx = view.ctx();
        match self {
            ArgPlan::Value { index, target } => convert(ctx, view.value(*index)?, target),
            ArgPlan::Alias { index } => Ok(Value::Alias(view.alias(*index)?)),
            ArgPlan::IfPresent {
                index,
                present,
                absent,
            } => {
                if *index < view.len() {
                    present.eval(view)
                } else {
                    absent.eval(view)
                }
            }
            ArgPlan::Const(value) => Ok(value.clone()),
            ArgPlan::Provider(provider) => Ok(provider.provide(ctx)),
            ArgPlan::Missing { routine, expected } => Err(language_error(
                LanguageErrorKind::ArgumentCount,
                format!(
                    "Too few arguments to function {}(), {} passed and at least {} expected",
                    routine,
                    view.len(),
                    expected
                ),
            )),
            ArgPlan::Trailing { from, elem, by_ref } => {
                if *from >= view.len() {
                    return Ok(Value::Array(PhpArray::empty()));
                }
                let mut packed = PhpArray::with_capacity(view.len() - from);
                for index in *from..view.len() {
                    let item = if *by_ref {
                        Value::Alias(view.alias(index)?)
                    } else {
                        convert(ctx, view.value(index)?, elem)?
                    };
                    packed.push(item);
                }
                Ok(Value::Array(packed))
            }
            ArgPlan::AllArgs => {
                if view.is_empty() {
                    return Ok(Value::Array(PhpArray::empty()));
                }
                Ok(Value::Array(PhpArray::from_values(view.values()?)))
            }
        }
    }
}

/// A runtime test a binding was specialized on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Guard {
    /// The slot holds an instance of exactly this class.
    ObjectOfClass { slot: usize, class: ClassId },
    NotObject { slot: usize },
    KindIs { slot: usize, kind: ValueKind },
    /// The slot holds this name, compared case-insensitively.
    NameIs { slot: usize, name: String },
    IsNull { slot: usize },
    /// The function name still resolves to the overload group it resolved
    /// to at bind time.
    FunctionIs { name: String, group: u64 },
    /// The class name still resolves to the same declaration.
    ClassIs { name: String, class: ClassId },
}

impl Guard {
    pub fn test(&self, ctx: &Context, args: &[CallArg]) -> bool {
        let slot_value = |slot: &usize| args.get(*slot).and_then(CallArg::as_value);
        match self {
            Guard::ObjectOfClass { slot, class } => slot_value(slot)
                .and_then(Value::as_object)
                .is_some_and(|obj| obj.class().id() == *class),
            Guard::NotObject { slot } => {
                slot_value(slot).is_some_and(|value| value.as_object().is_none())
            }
            Guard::KindIs { slot, kind } => {
                slot_value(slot).is_some_and(|value| value.deref_kind() == *kind)
            }
            Guard::NameIs { slot, name } => slot_value(slot).is_some_and(|value| {
                matches!(value.deref(), Value::String(s) if s.eq_ignore_ascii_case(name))
            }),
            Guard::IsNull { slot } => slot_value(slot).is_some_and(Value::is_null),
            Guard::FunctionIs { name, group } => ctx
                .symbols()
                .function(name)
                .is_some_and(|found| found.id == *group),
            Guard::ClassIs { name, class } => ctx
                .class(name)
                .is_some_and(|found| found.id() == *class),
        }
    }
}

/// Conjunction of guards. An empty set always holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GuardSet(Vec<Guard>);

impl GuardSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, guard: Guard) {
        if !self.0.contains(&guard) {
            self.0.push(guard);
        }
    }

    pub fn test(&self, ctx: &Context, args: &[CallArg]) -> bool {
        self.0.iter().all(|guard| guard.test(ctx, args))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Guard> {
        self.0.iter()
    }
}

/// Direct invocation of one routine.
#[derive(Debug, Clone)]
pub struct InvokePlan {
    pub routine: RoutineRef,
    /// Slot holding `$this`, for instance methods.
    pub receiver: Option<usize>,
    pub args: Vec<ArgPlan>,
}

fn receiver_object(args: &[CallArg], slot: usize) -> Result<ObjectRef> {
    let value = args.get(slot).and_then(CallArg::as_value);
    match value.and_then(Value::as_object) {
        Some(obj) => Ok(obj),
        None => Err(language_error(
            LanguageErrorKind::NotAnObject,
            format!(
                "Using $this when not in object context ({} given)",
                value.map(Value::type_name).unwrap_or_else(|| "nothing".to_string())
            ),
        )),
    }
}

impl InvokePlan {
    pub fn invoke(&self, view: &ArgView<'_>, args: &[CallArg]) -> Result<Value> {
        let this = match self.receiver {
            Some(slot) => Some(receiver_object(args, slot)?),
            None => None,
        };
        let values = self
            .args
            .iter()
            .map(|plan| plan.eval(view))
            .collect::<Result<Vec<_>>>()?;
        let result = self.routine.invoke(Invocation {
            ctx: view.ctx(),
            this,
            args: values,
        })?;
        if self.routine.cast_to_false && matches!(result, Value::Long(-1) | Value::Null) {
            return Ok(Value::Bool(false));
        }
        Ok(result)
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub cost: CostExpr,
    pub plan: InvokePlan,
}

/// What a binding does once its guard holds.
#[derive(Debug, Clone)]
pub enum Thunk {
    Invoke(InvokePlan),
    /// Picks the first candidate with the least runtime cost.
    Select {
        name: String,
        candidates: Vec<Candidate>,
    },
    Throw(LanguageError),
}

impl Thunk {
    pub fn run(&self, view: &ArgView<'_>, args: &[CallArg]) -> Result<Value> {
        match self {
            Thunk::Invoke(plan) => plan.invoke(view, args),
            Thunk::Select { name, candidates } => {
                let mut best: Option<(ConversionCost, &InvokePlan)> = None;
                for candidate in candidates {
                    let cost = candidate.cost.eval(view)?;
                    if best.map_or(true, |(least, _)| cost < least) {
                        best = Some((cost, &candidate.plan));
                    }
                }
                match best {
                    Some((cost, plan)) if cost.is_applicable() => {
                        trace!(routine = %plan.routine.qualified_name(), %cost, "overload selected at run time");
                        plan.invoke(view, args)
                    }
                    _ => {
                        let given = view
                            .values()?
                            .iter()
                            .map(Value::type_name)
                            .join(", ");
                        Err(language_error(
                            LanguageErrorKind::TypeError,
                            format!("No overload of {}() accepts ({})", name, given),
                        ))
                    }
                }
            }
            Thunk::Throw(err) => Err(err.clone().into()),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Thunk::Invoke(_) => "direct",
            Thunk::Select { .. } => "runtime-select",
            Thunk::Throw(_) => "throw",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_folds_constants() {
        let cost = CostExpr::Const(ConversionCost::PASS)
            .or(CostExpr::Const(ConversionCost::IMPLICIT_CAST))
            .or(CostExpr::Const(ConversionCost::PASS_COSTLY));
        assert_eq!(
            cost.as_const(),
            Some(ConversionCost::IMPLICIT_CAST | ConversionCost::PASS_COSTLY)
        );
    }

    #[test]
    fn lower_bound_keeps_static_part() {
        let cost = CostExpr::Const(ConversionCost::NO_CONVERSION).or(CostExpr::Arg {
            index: 0,
            target: TypeRef::Long,
            by_ref: false,
        });
        assert!(cost.as_const().is_none());
        assert!(!cost.lower_bound().is_applicable());
    }
}
