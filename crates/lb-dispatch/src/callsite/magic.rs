use lb_core::{RoutineRef, Value};

use super::CallSiteContext;
use crate::args::{default_plan, ArgumentsBinder};
use crate::plan::{ArgPlan, InvokePlan};

/// Invocation of `__call`/`__callStatic` standing in for the missing method
/// `name`: the first explicit parameter receives the name, the second every
/// argument of the call as an array.
pub(crate) fn missing_method_plan(
    magic: &RoutineRef,
    name: &str,
    binder: &dyn ArgumentsBinder,
    site: &CallSiteContext,
) -> InvokePlan {
    let mut explicit = 0;
    let args = magic
        .params
        .iter()
        .map(|param| {
            if param.is_implicit() {
                return site.implicit_arg(param.role, binder);
            }
            let plan = match explicit {
                0 => ArgPlan::Const(Value::string(name)),
                1 => binder.bind_all(),
                _ => default_plan(param, magic),
            };
            explicit += 1;
            plan
        })
        .collect();
    InvokePlan {
        routine: magic.clone(),
        receiver: site.receiver_slot_for(magic),
        args,
    }
}
