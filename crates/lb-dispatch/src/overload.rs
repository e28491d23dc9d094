//! Overload resolution. Every candidate is bound against the arguments into
//! a cost expression; candidates that provably cannot accept the arguments
//! are pruned, and the rest either collapse to one statically chosen routine
//! or to a runtime selection ordered by preference.

use lb_core::error::BindError;
use lb_core::{debug, RoutineRef};

use crate::args::{absent_plan, ArgumentsBinder};
use crate::callsite::CallSiteContext;
use crate::cost::ConversionCost;
use crate::plan::{Candidate, CostExpr, InvokePlan, Thunk};

/// One candidate bound against the call's arguments.
#[derive(Debug, Clone)]
pub struct MethodCostInfo {
    pub routine: RoutineRef,
    pub cost: CostExpr,
    /// Least cost the candidate could have at run time.
    pub min_cost: ConversionCost,
    /// Position among the declared overloads.
    pub declared: usize,
    pub plan: InvokePlan,
}

impl MethodCostInfo {
    pub fn bind(
        routine: &RoutineRef,
        declared: usize,
        binder: &dyn ArgumentsBinder,
        site: &CallSiteContext,
    ) -> Self {
        let (cost, plan) = plan_routine(routine, binder, site);
        Self {
            routine: routine.clone(),
            min_cost: cost.lower_bound(),
            cost,
            declared,
            plan,
        }
    }

    fn arity(&self) -> usize {
        self.routine.explicit_arity()
    }
}

/// Maps each declared parameter of `routine` onto the call's arguments.
pub fn plan_routine(
    routine: &RoutineRef,
    binder: &dyn ArgumentsBinder,
    site: &CallSiteContext,
) -> (CostExpr, InvokePlan) {
    let mut cost = CostExpr::default();
    let mut args = Vec::with_capacity(routine.params.len());
    let mut index = 0;
    let mut variadic = false;
    for param in &routine.params {
        if param.is_implicit() {
            args.push(site.implicit_arg(param.role, binder));
            continue;
        }
        if variadic {
            args.push(absent_plan(Some(param), routine));
            continue;
        }
        if param.is_variadic {
            cost = cost.or(binder.bind_trailing_cost(index, &param.ty, param.is_by_ref));
            args.push(binder.bind_trailing(index, &param.ty, param.is_by_ref));
            variadic = true;
            continue;
        }
        cost = cost.or(binder.bind_cost(
            index,
            &param.ty,
            param.is_by_ref,
            !param.is_optional(),
            false,
        ));
        args.push(binder.bind_arg(index, Some(param), routine));
        index += 1;
    }
    if !variadic {
        cost = cost.or(binder.bind_excess_cost(index));
    }
    let plan = InvokePlan {
        routine: routine.clone(),
        receiver: site.receiver_slot_for(routine),
        args,
    };
    (cost, plan)
}

/// Chooses among `candidates` for the call described by `binder` and `site`.
pub fn resolve_overloads(
    name: &str,
    candidates: &[RoutineRef],
    binder: &dyn ArgumentsBinder,
    site: &CallSiteContext,
) -> Result<Thunk, BindError> {
    let no_overload = || BindError::NoApplicableOverload {
        name: name.to_string(),
    };
    let mut pool: Vec<(usize, RoutineRef)> = candidates.iter().cloned().enumerate().collect();
    loop {
        let bound: Vec<MethodCostInfo> = pool
            .iter()
            .map(|(declared, routine)| MethodCostInfo::bind(routine, *declared, binder, site))
            .collect();
        let considered = bound.len();
        let viable: Vec<MethodCostInfo> = bound
            .into_iter()
            .filter(|info| info.min_cost.is_applicable())
            .collect();
        debug!(
            name,
            considered,
            viable = viable.len(),
            "resolving overloads"
        );
        if viable.is_empty() {
            return Err(no_overload());
        }

        if viable.iter().all(|info| info.cost.as_const().is_some()) {
            let best = viable
                .into_iter()
                .min_by_key(|info| (info.min_cost, info.arity(), info.declared))
                .ok_or_else(no_overload)?;
            return Ok(Thunk::Invoke(best.plan));
        }

        if viable.len() < considered {
            // candidates were pruned, bind the survivors again
            pool = viable
                .into_iter()
                .map(|info| (info.declared, info.routine))
                .collect();
            continue;
        }

        let mut viable = viable;
        if viable.len() == 1 {
            let only = viable.remove(0);
            return Ok(Thunk::Invoke(only.plan));
        }
        viable.sort_by_key(|info| (info.arity(), info.min_cost, info.declared));
        return Ok(Thunk::Select {
            name: name.to_string(),
            candidates: viable
                .into_iter()
                .map(|info| Candidate {
                    cost: info.cost,
                    plan: info.plan,
                })
                .collect(),
        });
    }
}
