use std::sync::Arc;

use lb_core::config::RuntimeOptions;
use lb_core::context::GuardBucket;
use lb_core::error::{BindError, Error, LanguageErrorKind};
use lb_core::metadata::{
    is_visible, ClassBuilder, MagicMethod, ParamDescriptor, ParamRole, PropertyDescriptor,
    RoutineDescriptor, SymbolTable, Visibility,
};
use lb_core::{Context, ObjectRef, TypeRef, Value};
use pretty_assertions::assert_eq;

fn noop(name: &str) -> RoutineDescriptor {
    RoutineDescriptor::new(name, |_| Ok(Value::Null))
}

#[test]
fn instance_slots_continue_after_parent_fields() {
    let base = ClassBuilder::new("Base")
        .property(PropertyDescriptor::new("a").with_default(Value::Long(1)))
        .property(PropertyDescriptor::new("shared").static_())
        .build();
    let child = ClassBuilder::new("Child")
        .extends(&base)
        .property(PropertyDescriptor::new("b").with_default(Value::Long(2)))
        .build();

    let b = child.find_property("b").expect("declared on child");
    assert_eq!(b.property.slot, 1);
    assert_eq!(b.declaring.name(), "Child");
    let a = child.find_property("a").expect("inherited from base");
    assert_eq!(a.declaring.name(), "Base");
    assert_eq!(child.instance_defaults(), vec![Value::Long(1), Value::Long(2)]);

    let obj = ObjectRef::new(&child);
    assert_eq!(obj.field(1), Value::Long(2));
}

#[test]
fn ancestry_queries() {
    let base = ClassBuilder::new("Base").build();
    let mid = ClassBuilder::new("Mid").extends(&base).build();
    let leaf = ClassBuilder::new("Leaf").extends(&mid).build();

    assert!(leaf.is_subclass_of(base.id()));
    assert!(!base.is_subclass_of(leaf.id()));
    assert_eq!(leaf.distance_to("base"), Some(2));
    assert_eq!(leaf.distance_to("Leaf"), Some(0));
    assert_eq!(leaf.distance_to("Other"), None);
    let names: Vec<&str> = leaf.ancestors().map(|c| c.name()).collect();
    assert_eq!(names, vec!["Leaf", "Mid", "Base"]);
}

#[test]
fn methods_resolve_on_most_derived_declaration() {
    let base = ClassBuilder::new("Base")
        .method(noop("run"))
        .method(noop("__get"))
        .build();
    let child = ClassBuilder::new("Child")
        .extends(&base)
        .method(noop("Run"))
        .method(noop("run").with_param(ParamDescriptor::new("x", TypeRef::Long)))
        .build();

    let found = child.find_methods("RUN");
    assert_eq!(found.len(), 2);
    assert!(found
        .iter()
        .all(|m| m.declaring_class.as_ref().map(|c| c.name.as_str()) == Some("Child")));
    assert_eq!(found[0].qualified_name(), "Child::Run");
    assert!(child.magic(MagicMethod::Get).is_some());
    assert!(child.magic(MagicMethod::Set).is_none());
}

#[test]
fn runtime_fields_are_inherited_unless_overridden() {
    let open = ClassBuilder::new("Open").runtime_fields(true).build();
    let derived = ClassBuilder::new("Derived").extends(&open).build();
    let sealed = ClassBuilder::new("Sealed")
        .extends(&open)
        .runtime_fields(false)
        .build();
    assert!(derived.has_runtime_fields());
    assert!(!sealed.has_runtime_fields());
    assert!(!ClassBuilder::new("Plain").build().has_runtime_fields());
}

#[test]
fn visibility_rules() {
    let base = ClassBuilder::new("Base").build();
    let child = ClassBuilder::new("Child").extends(&base).build();
    let stranger = ClassBuilder::new("Stranger").build();

    assert!(is_visible(Visibility::Public, &base, None));
    assert!(!is_visible(Visibility::Private, &base, None));
    assert!(is_visible(Visibility::Private, &base, Some(&*base)));
    assert!(!is_visible(Visibility::Private, &base, Some(&*child)));
    assert!(is_visible(Visibility::Protected, &base, Some(&*child)));
    assert!(is_visible(Visibility::Protected, &child, Some(&*base)));
    assert!(!is_visible(Visibility::Protected, &base, Some(&*stranger)));
}

#[test]
fn explicit_parameters_skip_implicit_ones() {
    let routine = noop("f")
        .with_param(ParamDescriptor::implicit("ctx", ParamRole::Context))
        .with_param(ParamDescriptor::new("a", TypeRef::Long))
        .with_param(ParamDescriptor::new("b", TypeRef::Long).with_default(Value::Long(0)))
        .with_param(ParamDescriptor::new("rest", TypeRef::Value).variadic());
    assert_eq!(routine.explicit_arity(), 3);
    assert!(routine.has_variadic());
    let optional: Vec<bool> = routine.explicit_params().map(|p| p.is_optional()).collect();
    assert_eq!(optional, vec![false, true, true]);
}

#[test]
fn every_declaration_gets_a_fresh_group() {
    let symbols = SymbolTable::new();
    let first = symbols.declare_function("f", [noop("f")]);
    let second = symbols.add_overload("F", noop("f"));
    assert_ne!(first.id, second.id);
    assert_eq!(second.routines.len(), 2);

    let found = symbols.function("\\f").expect("declared");
    assert_eq!(found.id, second.id);

    symbols.remove_function("f");
    assert!(symbols.function("f").is_none());
}

#[test]
fn concurrent_overloads_are_all_kept() {
    let symbols = SymbolTable::new();
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                symbols.add_overload("f", noop("f"));
            });
        }
    });
    let group = symbols.function("f").expect("declared");
    assert_eq!(group.routines.len(), 8);
}

#[test]
fn symbol_table_starts_with_std_class() {
    let symbols = SymbolTable::new();
    let std = symbols.class("STDCLASS").expect("stdClass predeclared");
    assert!(std.has_runtime_fields());
    assert!(Arc::ptr_eq(&std, &symbols.std_class()));
}

#[test]
fn routine_bodies_receive_invocation() {
    let routine = RoutineDescriptor::new("echo", |inv| Ok(inv.arg(0)))
        .with_param(ParamDescriptor::new("x", TypeRef::Value));
    let ctx = Context::new(Arc::new(SymbolTable::new()));
    let result = routine
        .invoke(lb_core::metadata::Invocation {
            ctx: &ctx,
            this: None,
            args: vec![Value::Long(3)],
        })
        .unwrap();
    assert_eq!(result, Value::Long(3));
}

#[test]
fn recursion_guards_are_per_bucket() {
    let ctx = Context::new(Arc::new(SymbolTable::new()));
    let obj = ctx.new_std_object();
    let get = ctx.enter_guard(&obj, "m", GuardBucket::Get);
    assert!(get.is_some());
    assert!(ctx.is_guarded(&obj, "m", GuardBucket::Get));
    assert!(!ctx.is_guarded(&obj, "m", GuardBucket::Isset));
    drop(get);
    assert!(!ctx.is_guarded(&obj, "m", GuardBucket::Get));
}

#[test]
fn conversion_warnings_respect_options() {
    let quiet = Context::with_options(
        Arc::new(SymbolTable::new()),
        RuntimeOptions {
            conversion_warnings: false,
            ..RuntimeOptions::default()
        },
    );
    quiet.conversion_warning("lossy");
    assert!(!quiet.diagnostics().has_warnings());

    let loud = Context::new(Arc::new(SymbolTable::new()));
    loud.conversion_warning("lossy");
    let reported = loud.diagnostics().take();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].to_string(), "lossy [conversion]");
}

#[test]
fn errors_render_like_the_hosted_language() {
    let err: Error = BindError::ClassNotFound {
        name: "Foo".to_string(),
    }
    .into();
    assert_eq!(err.to_string(), "Binding error: Class \"Foo\" not found");

    let err = lb_core::error::language_error(LanguageErrorKind::TypeError, "bad");
    assert_eq!(err.to_string(), "TypeError: bad");
    assert!(err.is_language(LanguageErrorKind::TypeError));
    assert!(err.as_bind().is_none());
}
