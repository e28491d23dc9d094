use std::sync::Arc;

use lb_core::error::{BindError, LanguageErrorKind};
use lb_core::metadata::{Invocation, ParamDescriptor, ParamRole, RoutineDescriptor};
use lb_core::{Alias, Context, SymbolTable, TypeRef, Value};
use lb_dispatch::plan::Thunk;
use lb_dispatch::{ArgShape, CallArg, CallSite, CallSiteShape, RuntimeChain, SourceType};
use pretty_assertions::assert_eq;

fn tagged(tag: &'static str, ty: TypeRef) -> RoutineDescriptor {
    RoutineDescriptor::new("f", move |_| Ok(Value::string(tag)))
        .with_param(ParamDescriptor::new("x", ty))
}

fn context(declare: impl FnOnce(&SymbolTable)) -> Context {
    let symbols = SymbolTable::new();
    declare(&symbols);
    Context::new(Arc::new(symbols))
}

fn call(ctx: &Context, shape: CallSiteShape, args: Vec<Value>) -> lb_core::Result<Value> {
    let site = CallSite::new(shape);
    let args: Vec<CallArg> = args.into_iter().map(CallArg::from).collect();
    site.invoke(ctx, &args)
}

fn long_arg(inv: &Invocation<'_>, index: usize) -> i64 {
    match inv.arg(index).into_deref() {
        Value::Long(l) => l,
        _ => 0,
    }
}

#[test]
fn static_types_pick_exact_overload() {
    let ctx = context(|symbols| {
        symbols.declare_function(
            "f",
            [tagged("int", TypeRef::Long), tagged("string", TypeRef::String)],
        );
    });

    let by_long = CallSiteShape::function("f").with_arg(ArgShape::Value(SourceType::Long));
    assert_eq!(
        call(&ctx, by_long, vec![Value::Long(5)]).unwrap(),
        Value::string("int")
    );

    let by_string = CallSiteShape::function("f").with_arg(ArgShape::Value(SourceType::String));
    assert_eq!(
        call(&ctx, by_string, vec![Value::string("abc")]).unwrap(),
        Value::string("string")
    );
}

#[test]
fn double_prefers_double_over_long_and_string() {
    let ctx = context(|symbols| {
        symbols.declare_function(
            "g",
            [
                tagged("long", TypeRef::Long),
                tagged("double", TypeRef::Double),
                tagged("string", TypeRef::String),
            ],
        );
    });
    let shape = CallSiteShape::function("g").with_arg(ArgShape::Value(SourceType::Double));
    assert_eq!(
        call(&ctx, shape, vec![Value::Double(1.5)]).unwrap(),
        Value::string("double")
    );
}

#[test]
fn statically_decided_call_binds_directly() {
    let ctx = context(|symbols| {
        symbols.declare_function(
            "f",
            [tagged("int", TypeRef::Long), tagged("string", TypeRef::String)],
        );
    });
    let site = CallSite::new(CallSiteShape::function("f").with_arg(ArgShape::Value(SourceType::Long)));
    site.invoke(&ctx, &[Value::Long(1).into()]).unwrap();

    let binding = site.current().expect("binding installed");
    assert!(matches!(binding.thunk(), Thunk::Invoke(_)));
    assert_eq!(binding.summary().dispatch, "direct");
}

#[test]
fn untyped_argument_selects_at_run_time() {
    let ctx = context(|symbols| {
        symbols.declare_function(
            "f",
            [tagged("int", TypeRef::Long), tagged("string", TypeRef::String)],
        );
    });
    let site = CallSite::new(CallSiteShape::function("f").with_arg(ArgShape::Value(SourceType::Any)));

    assert_eq!(
        site.invoke(&ctx, &[Value::Long(5).into()]).unwrap(),
        Value::string("int")
    );
    assert_eq!(
        site.invoke(&ctx, &[Value::string("five").into()]).unwrap(),
        Value::string("string")
    );

    let binding = site.current().expect("binding installed");
    assert!(matches!(binding.thunk(), Thunk::Select { .. }));
    // one binding serves both argument kinds
    assert_eq!(site.stats().binds, 1);
}

#[test]
fn inapplicable_overloads_fail_to_bind() {
    let ctx = context(|symbols| {
        symbols.declare_function("h", [tagged("array", TypeRef::Array)]);
    });
    let site = CallSite::new(CallSiteShape::function("h").with_arg(ArgShape::Value(SourceType::Long)));

    let err = site.invoke(&ctx, &[Value::Long(1).into()]).unwrap_err();
    assert_eq!(
        err.as_bind(),
        Some(&BindError::NoApplicableOverload {
            name: "h".to_string()
        })
    );
    // failed binds are never cached
    assert!(site.current().is_none());
}

#[test]
fn single_dynamic_candidate_reports_conversion_failure() {
    let ctx = context(|symbols| {
        symbols.declare_function("h", [tagged("array", TypeRef::Array)]);
    });
    let shape = CallSiteShape::function("h").with_arg(ArgShape::Value(SourceType::Any));
    let err = call(&ctx, shape, vec![Value::Long(1)]).unwrap_err();
    assert!(err.is_language(LanguageErrorKind::TypeError));
    assert_eq!(
        err.to_string(),
        "TypeError: Cannot pass value of type int where array is expected"
    );
}

#[test]
fn runtime_selection_without_applicable_candidate_throws() {
    let ctx = context(|symbols| {
        symbols.declare_function(
            "h",
            [tagged("array", TypeRef::Array), tagged("object", TypeRef::Object)],
        );
    });
    let shape = CallSiteShape::function("h").with_arg(ArgShape::Value(SourceType::Any));
    let err = call(&ctx, shape, vec![Value::Long(1)]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "TypeError: No overload of h() accepts (int)"
    );
}

#[test]
fn defaults_fill_missing_optional_parameters() {
    let ctx = context(|symbols| {
        symbols.declare_function(
            "k",
            [RoutineDescriptor::new("k", |inv| {
                Ok(Value::Long(long_arg(&inv, 0) * 100 + long_arg(&inv, 1)))
            })
            .with_param(ParamDescriptor::new("a", TypeRef::Long))
            .with_param(ParamDescriptor::new("b", TypeRef::Long).with_default(Value::Long(10)))],
        );
    });

    let one = CallSiteShape::function("k").with_arg(ArgShape::Value(SourceType::Long));
    assert_eq!(call(&ctx, one, vec![Value::Long(2)]).unwrap(), Value::Long(210));

    let two = CallSiteShape::function("k").with_args([
        ArgShape::Value(SourceType::Long),
        ArgShape::Value(SourceType::Long),
    ]);
    assert_eq!(
        call(&ctx, two, vec![Value::Long(2), Value::Long(3)]).unwrap(),
        Value::Long(203)
    );
}

#[test]
fn missing_mandatory_argument_raises_argument_count_error() {
    let ctx = context(|symbols| {
        symbols.declare_function(
            "k",
            [RoutineDescriptor::new("k", |_| Ok(Value::Null))
                .with_param(ParamDescriptor::new("a", TypeRef::Long))],
        );
    });
    let err = call(&ctx, CallSiteShape::function("k"), vec![]).unwrap_err();
    assert!(err.is_language(LanguageErrorKind::ArgumentCount));
    assert_eq!(
        err.to_string(),
        "ArgumentCountError: Too few arguments to function k(), 0 passed and at least 1 expected"
    );
}

#[test]
fn missing_arguments_rule_out_longer_overloads() {
    let unary = RoutineDescriptor::new("m", |_| Ok(Value::string("unary")))
        .with_param(ParamDescriptor::new("a", TypeRef::Long));
    let binary = RoutineDescriptor::new("m", |_| Ok(Value::string("binary")))
        .with_param(ParamDescriptor::new("a", TypeRef::Long))
        .with_param(ParamDescriptor::new("b", TypeRef::Long));
    let ctx = context(|symbols| {
        symbols.declare_function("m", [binary, unary]);
    });

    let one = CallSiteShape::function("m").with_arg(ArgShape::Value(SourceType::Long));
    assert_eq!(call(&ctx, one, vec![Value::Long(1)]).unwrap(), Value::string("unary"));

    let two = CallSiteShape::function("m").with_args([
        ArgShape::Value(SourceType::Long),
        ArgShape::Value(SourceType::Long),
    ]);
    assert_eq!(
        call(&ctx, two, vec![Value::Long(1), Value::Long(2)]).unwrap(),
        Value::string("binary")
    );
}

#[test]
fn equal_runtime_costs_prefer_shorter_then_first_declared() {
    let ctx = context(|symbols| {
        symbols.declare_function(
            "f",
            [
                RoutineDescriptor::new("f", |_| Ok(Value::string("variadic")))
                    .with_param(ParamDescriptor::new("x", TypeRef::String))
                    .with_param(ParamDescriptor::new("rest", TypeRef::Value).variadic()),
                tagged("first", TypeRef::String),
                tagged("second", TypeRef::String),
            ],
        );
    });
    let site =
        CallSite::new(CallSiteShape::function("f").with_arg(ArgShape::Value(SourceType::Any)));

    for _ in 0..3 {
        let picked = site.invoke(&ctx, &[Value::string("s").into()]).unwrap();
        assert_eq!(picked, Value::string("first"));
    }
    assert_eq!(site.stats().binds, 1);
    let binding = site.current().expect("binding cached");
    assert!(matches!(binding.thunk(), Thunk::Select { .. }));

    // a lossy argument costs the same for every candidate
    let picked = site.invoke(&ctx, &[Value::Long(5).into()]).unwrap();
    assert_eq!(picked, Value::string("first"));
}

fn sum_routine() -> RoutineDescriptor {
    RoutineDescriptor::new("sum", |inv| {
        let total = match inv.arg(0) {
            Value::Array(items) => items
                .values()
                .map(|v| match v {
                    Value::Long(l) => *l,
                    _ => 0,
                })
                .sum(),
            _ => -1,
        };
        Ok(Value::Long(total))
    })
    .with_param(ParamDescriptor::new("xs", TypeRef::Long).variadic())
}

#[test]
fn variadic_parameter_packs_trailing_arguments() {
    let ctx = context(|symbols| {
        symbols.declare_function("sum", [sum_routine()]);
    });

    let shape = CallSiteShape::function("sum").with_args([
        ArgShape::Value(SourceType::Long),
        ArgShape::Value(SourceType::String),
        ArgShape::Value(SourceType::Long),
    ]);
    assert_eq!(
        call(&ctx, shape, vec![Value::Long(1), Value::string("2"), Value::Long(3)]).unwrap(),
        Value::Long(6)
    );
    assert_eq!(
        call(&ctx, CallSiteShape::function("sum"), vec![]).unwrap(),
        Value::Long(0)
    );
}

#[test]
fn spread_arguments_match_positional_arguments() {
    let add = RoutineDescriptor::new("add", |inv| {
        Ok(Value::Long(long_arg(&inv, 0) + long_arg(&inv, 1)))
    })
    .with_param(ParamDescriptor::new("a", TypeRef::Long))
    .with_param(ParamDescriptor::new("b", TypeRef::Long));
    let ctx = context(|symbols| {
        symbols.declare_function("add", [add]);
        symbols.declare_function("sum", [sum_routine()]);
    });

    let positional = CallSiteShape::function("add").with_args([
        ArgShape::Value(SourceType::Long),
        ArgShape::Value(SourceType::Long),
    ]);
    let spread = CallSiteShape::function("add")
        .with_args([ArgShape::Unpack, ArgShape::Value(SourceType::Array)]);
    let mixed = CallSiteShape::function("add").with_args([
        ArgShape::Value(SourceType::Long),
        ArgShape::Unpack,
        ArgShape::Value(SourceType::Array),
    ]);

    let expected = call(&ctx, positional, vec![Value::Long(2), Value::Long(3)]).unwrap();
    assert_eq!(expected, Value::Long(5));
    assert_eq!(
        call(
            &ctx,
            spread.clone(),
            vec![Value::array([Value::Long(2), Value::Long(3)])]
        )
        .unwrap(),
        expected
    );
    assert_eq!(
        call(&ctx, mixed, vec![Value::Long(2), Value::array([Value::Long(3)])]).unwrap(),
        expected
    );

    let err = call(&ctx, spread, vec![Value::array([Value::Long(2)])]).unwrap_err();
    assert!(err.is_language(LanguageErrorKind::ArgumentCount));

    let spread_sum = CallSiteShape::function("sum")
        .with_args([ArgShape::Unpack, ArgShape::Value(SourceType::Array)]);
    assert_eq!(
        call(
            &ctx,
            spread_sum,
            vec![Value::array([Value::Long(1), Value::Long(2), Value::Long(3)])]
        )
        .unwrap(),
        Value::Long(6)
    );
}

#[test]
fn spreading_a_scalar_is_a_type_error() {
    let ctx = context(|symbols| {
        symbols.declare_function("sum", [sum_routine()]);
    });
    let shape = CallSiteShape::function("sum")
        .with_args([ArgShape::Unpack, ArgShape::Value(SourceType::Any)]);
    let err = call(&ctx, shape, vec![Value::Long(1)]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "TypeError: Only arrays can be unpacked, int given"
    );
}

#[test]
fn cast_to_false_maps_sentinel_results() {
    let ctx = context(|symbols| {
        symbols.declare_function(
            "find",
            [RoutineDescriptor::new("find", |inv| Ok(Value::Long(long_arg(&inv, 0))))
                .with_param(ParamDescriptor::new("at", TypeRef::Long))
                .cast_to_false()],
        );
    });
    let shape = CallSiteShape::function("find").with_arg(ArgShape::Value(SourceType::Long));
    assert_eq!(
        call(&ctx, shape.clone(), vec![Value::Long(-1)]).unwrap(),
        Value::Bool(false)
    );
    assert_eq!(call(&ctx, shape, vec![Value::Long(4)]).unwrap(), Value::Long(4));
}

fn increment() -> RoutineDescriptor {
    RoutineDescriptor::new("inc", |inv| match inv.arg(0) {
        Value::Alias(cell) => {
            let next = match cell.get() {
                Value::Long(n) => n + 1,
                _ => 1,
            };
            cell.set(Value::Long(next));
            Ok(Value::Long(next))
        }
        _ => Ok(Value::Null),
    })
    .with_param(ParamDescriptor::new("n", TypeRef::Long).by_ref())
}

#[test]
fn by_ref_parameter_writes_through_reference_argument() {
    let ctx = context(|symbols| {
        symbols.declare_function("inc", [increment()]);
    });
    let cell = Alias::new(Value::Long(41));
    let shape = CallSiteShape::function("inc").with_arg(ArgShape::Value(SourceType::Alias));
    call(&ctx, shape, vec![Value::Alias(cell.clone())]).unwrap();
    assert_eq!(cell.get(), Value::Long(42));

    // a plain value goes through a temporary the caller never sees
    let plain = CallSiteShape::function("inc").with_arg(ArgShape::Value(SourceType::Long));
    assert_eq!(
        call(&ctx, plain, vec![Value::Long(1)]).unwrap(),
        Value::Long(2)
    );
}

#[test]
fn by_ref_overloads_are_ranked_by_referent_type() {
    let by_ref = |tag: &'static str, ty: TypeRef| {
        RoutineDescriptor::new("f", move |_| Ok(Value::string(tag)))
            .with_param(ParamDescriptor::new("x", ty).by_ref())
    };
    let ctx = context(|symbols| {
        symbols.declare_function(
            "f",
            [by_ref("int&", TypeRef::Long), by_ref("array&", TypeRef::Array)],
        );
    });
    let shape = CallSiteShape::function("f").with_arg(ArgShape::Value(SourceType::Alias));

    let list = Alias::new(Value::array([Value::Long(1)]));
    assert_eq!(
        call(&ctx, shape.clone(), vec![Value::Alias(list)]).unwrap(),
        Value::string("array&")
    );
    let number = Alias::new(Value::Long(1));
    assert_eq!(
        call(&ctx, shape, vec![Value::Alias(number)]).unwrap(),
        Value::string("int&")
    );
}

#[test]
fn by_ref_parameter_writes_through_chain_argument() {
    let ctx = context(|symbols| {
        symbols.declare_function("inc", [increment()]);
    });
    let obj = ctx.new_std_object();
    obj.set_runtime_field("hits", Value::Long(7));

    let site = CallSite::new(
        CallSiteShape::function("inc")
            .with_args([ArgShape::Value(SourceType::Object), ArgShape::Chain]),
    );
    let chain = RuntimeChain::builder().property("hits").build();
    site.invoke(
        &ctx,
        &[CallArg::Value(Value::Object(obj.clone())), CallArg::Chain(chain)],
    )
    .unwrap();

    assert_eq!(
        obj.runtime_field("hits").map(Value::into_deref),
        Some(Value::Long(8))
    );
}

#[test]
fn implicit_parameters_are_filled_by_the_binder() {
    let ctx = context(|symbols| {
        symbols.declare_function(
            "whoami",
            [RoutineDescriptor::new("whoami", |inv| {
                Ok(Value::string(format!("{}/{}", inv.arg(0), inv.arg(1))))
            })
            .with_param(ParamDescriptor::implicit("name", ParamRole::IndirectName))
            .with_param(ParamDescriptor::implicit("args", ParamRole::CallerArgs))],
        );
    });
    let site = CallSite::new(
        CallSiteShape::indirect_function().with_arg(ArgShape::Value(SourceType::Long)),
    );
    let result = site
        .invoke(&ctx, &[Value::string("WhoAmI").into(), Value::Long(3).into()])
        .unwrap();
    // arrays render as "Array"
    assert_eq!(result, Value::string("WhoAmI/Array"));
}

#[test]
fn undefined_function_is_a_bind_error() {
    let ctx = context(|_| {});
    let err = call(&ctx, CallSiteShape::function("nope"), vec![]).unwrap_err();
    assert_eq!(err.to_string(), "Binding error: Call to undefined function nope()");
}
