use lb_core::metadata::{ParamDescriptor, RoutineDescriptor};
use lb_core::{PhpArray, TypeRef, Value};

use super::{
    absent_plan, missing_cost, present_plan, ArgCount, ArgLayout, ArgumentsBinder, LogicalArg,
};
use crate::cost::ConversionCost;
use crate::plan::{ArgPlan, CostExpr};

/// Binds a fixed list of statically typed arguments. Costs of arguments with
/// an exact static type fold into constants.
#[derive(Debug, Clone)]
pub struct TupleArgsBinder {
    args: Vec<LogicalArg>,
}

impl TupleArgsBinder {
    pub fn new(args: Vec<LogicalArg>) -> Self {
        Self { args }
    }
}

impl ArgumentsBinder for TupleArgsBinder {
    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(self.args.len())
    }

    fn bind_arg(
        &self,
        index: usize,
        param: Option<&ParamDescriptor>,
        routine: &RoutineDescriptor,
    ) -> ArgPlan {
        if index < self.args.len() {
            present_plan(index, param)
        } else {
            absent_plan(param, routine)
        }
    }

    fn bind_trailing(&self, from: usize, elem: &TypeRef, by_ref: bool) -> ArgPlan {
        if from >= self.args.len() {
            return ArgPlan::Const(Value::Array(PhpArray::empty()));
        }
        ArgPlan::Trailing {
            from,
            elem: elem.clone(),
            by_ref,
        }
    }

    fn bind_cost(
        &self,
        index: usize,
        target: &TypeRef,
        by_ref: bool,
        mandatory: bool,
        force_zero: bool,
    ) -> CostExpr {
        if force_zero {
            return CostExpr::Const(ConversionCost::PASS);
        }
        let Some(arg) = self.args.get(index) else {
            return CostExpr::Const(missing_cost(mandatory));
        };
        let temporary = by_ref && !arg.is_reference_capable();
        match arg.static_cost(target) {
            Some(cost) if temporary => CostExpr::Const(cost | ConversionCost::WARNING),
            Some(cost) => CostExpr::Const(cost),
            None => CostExpr::Arg {
                index,
                target: target.clone(),
                by_ref,
            },
        }
    }

    fn bind_trailing_cost(&self, from: usize, elem: &TypeRef, by_ref: bool) -> CostExpr {
        (from..self.args.len()).fold(CostExpr::default(), |cost, index| {
            cost.or(self.bind_cost(index, elem, by_ref, false, false))
        })
    }

    fn bind_excess_cost(&self, arity: usize) -> CostExpr {
        if self.args.len() > arity {
            CostExpr::Const(ConversionCost::TOO_MANY_ARGS)
        } else {
            CostExpr::Const(ConversionCost::PASS)
        }
    }

    fn layout(&self) -> ArgLayout {
        ArgLayout::new(self.args.clone())
    }
}

#[cfg(test)]
mod tests {
    use lb_core::metadata::RoutineDescriptor;

    use super::*;
    use crate::shape::SourceType;

    fn binder(sources: &[SourceType]) -> TupleArgsBinder {
        TupleArgsBinder::new(
            sources
                .iter()
                .enumerate()
                .map(|(slot, source)| LogicalArg::new(slot, *source))
                .collect(),
        )
    }

    #[test]
    fn exact_sources_fold_to_constants() {
        let binder = binder(&[SourceType::Long, SourceType::Any]);
        assert_eq!(
            binder
                .bind_cost(0, &TypeRef::Double, false, true, false)
                .as_const(),
            Some(ConversionCost::PASS_COSTLY)
        );
        assert!(binder
            .bind_cost(1, &TypeRef::Double, false, true, false)
            .as_const()
            .is_none());
        assert_eq!(
            binder
                .bind_cost(2, &TypeRef::Double, false, true, false)
                .as_const(),
            Some(ConversionCost::MISSING_ARGS)
        );
        assert_eq!(
            binder.bind_excess_cost(1).as_const(),
            Some(ConversionCost::TOO_MANY_ARGS)
        );
    }

    #[test]
    fn missing_optional_argument_uses_default() {
        let binder = binder(&[]);
        let routine = RoutineDescriptor::new("f", |_| Ok(Value::Null));
        let param = ParamDescriptor::new("x", TypeRef::Long).with_default(Value::Long(7));
        assert!(matches!(
            binder.bind_arg(0, Some(&param), &routine),
            ArgPlan::Const(Value::Long(7))
        ));
        assert!(matches!(
            binder.bind_trailing(0, &TypeRef::Value, false),
            ArgPlan::Const(Value::Array(arr)) if arr.is_shared_empty()
        ));
    }
}
