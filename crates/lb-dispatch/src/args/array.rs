use lb_core::metadata::{ParamDescriptor, RoutineDescriptor};
use lb_core::{PhpArray, TypeRef, Value};

use super::{
    absent_plan, missing_cost, present_plan, ArgCount, ArgLayout, ArgumentsBinder, LogicalArg,
    TupleArgsBinder,
};
use crate::cost::ConversionCost;
use crate::plan::{ArgPlan, CostExpr};

/// Binds an argument list whose length is known only at run time because
/// some arguments spread arrays. Arguments before the first spread keep
/// their static positions and costs.
#[derive(Debug, Clone)]
pub struct ArrayArgsBinder {
    args: Vec<LogicalArg>,
    /// Number of leading arguments that are not spread.
    fixed: usize,
    leading: TupleArgsBinder,
}

impl ArrayArgsBinder {
    pub fn new(args: Vec<LogicalArg>) -> Self {
        let fixed = args
            .iter()
            .position(|arg| arg.unpack)
            .unwrap_or(args.len());
        let leading = TupleArgsBinder::new(args[..fixed].to_vec());
        Self {
            args,
            fixed,
            leading,
        }
    }

    fn is_fixed(&self) -> bool {
        self.fixed == self.args.len()
    }
}

impl ArgumentsBinder for ArrayArgsBinder {
    fn arg_count(&self) -> ArgCount {
        if self.is_fixed() {
            ArgCount::Exact(self.fixed)
        } else {
            ArgCount::Runtime
        }
    }

    fn bind_arg(
        &self,
        index: usize,
        param: Option<&ParamDescriptor>,
        routine: &RoutineDescriptor,
    ) -> ArgPlan {
        if index < self.fixed {
            return present_plan(index, param);
        }
        if self.is_fixed() {
            return absent_plan(param, routine);
        }
        ArgPlan::IfPresent {
            index,
            present: Box::new(present_plan(index, param)),
            absent: Box::new(absent_plan(param, routine)),
        }
    }

    fn bind_trailing(&self, from: usize, elem: &TypeRef, by_ref: bool) -> ArgPlan {
        if self.is_fixed() && from >= self.fixed {
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
        if index < self.fixed || self.is_fixed() {
            return self
                .leading
                .bind_cost(index, target, by_ref, mandatory, false);
        }
        CostExpr::IfPresent {
            index,
            present: Box::new(CostExpr::Arg {
                index,
                target: target.clone(),
                by_ref,
            }),
            absent: missing_cost(mandatory),
        }
    }

    fn bind_trailing_cost(&self, from: usize, elem: &TypeRef, by_ref: bool) -> CostExpr {
        if self.is_fixed() {
            return self.leading.bind_trailing_cost(from, elem, by_ref);
        }
        CostExpr::Trailing {
            from,
            elem: elem.clone(),
            by_ref,
        }
    }

    fn bind_excess_cost(&self, arity: usize) -> CostExpr {
        if self.is_fixed() {
            return self.leading.bind_excess_cost(arity);
        }
        CostExpr::Excess { arity }
    }

    fn layout(&self) -> ArgLayout {
        ArgLayout::new(self.args.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::SourceType;

    #[test]
    fn positions_after_a_spread_are_conditional() {
        let mut spread = LogicalArg::new(1, SourceType::Array);
        spread.unpack = true;
        let binder = ArrayArgsBinder::new(vec![LogicalArg::new(0, SourceType::Long), spread]);
        assert_eq!(binder.arg_count(), ArgCount::Runtime);
        assert_eq!(
            binder
                .bind_cost(0, &TypeRef::Long, false, true, false)
                .as_const(),
            Some(ConversionCost::PASS)
        );
        assert!(matches!(
            binder.bind_cost(1, &TypeRef::Long, false, true, false),
            CostExpr::IfPresent { absent, .. } if absent == ConversionCost::MISSING_ARGS
        ));
        assert!(matches!(
            binder.bind_excess_cost(2),
            CostExpr::Excess { arity: 2 }
        ));
    }
}
