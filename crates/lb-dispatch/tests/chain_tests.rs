use std::sync::Arc;

use lb_core::error::BindError;
use lb_core::metadata::{ClassBuilder, PropertyDescriptor};
use lb_core::{Alias, ArrayKey, Context, ObjectRef, PhpArray, SymbolTable, Value};
use lb_dispatch::RuntimeChain;
use pretty_assertions::assert_eq;

fn context() -> Context {
    Context::new(Arc::new(SymbolTable::new()))
}

fn warnings(ctx: &Context) -> Vec<String> {
    ctx.diagnostics()
        .take()
        .into_iter()
        .map(|d| d.message)
        .collect()
}

#[test]
fn nested_write_then_read() {
    let ctx = context();
    let mut root = Value::Object(ctx.new_std_object());
    let chain = RuntimeChain::builder().property("a").item(0i64).build();

    chain.set_value(&ctx, None, &mut root, Value::Long(5)).unwrap();
    assert_eq!(chain.get_value(&ctx, None, root.clone()).unwrap(), Value::Long(5));
    assert!(chain.isset(&ctx, None, &root).unwrap());
    assert_eq!(warnings(&ctx), Vec::<String>::new());
}

#[test]
fn property_on_null_creates_std_object() {
    let ctx = context();
    let mut root = Value::Null;
    let chain = RuntimeChain::builder().property("name").build();

    chain
        .set_value(&ctx, None, &mut root, Value::string("x"))
        .unwrap();
    let obj = root.as_object().expect("vivified object");
    assert_eq!(obj.class().name(), "stdClass");
    assert_eq!(obj.runtime_field("name"), Some(Value::string("x")));
    assert_eq!(
        warnings(&ctx),
        vec!["Creating default object from empty value".to_string()]
    );
}

#[test]
fn new_items_append_in_order() {
    let ctx = context();
    let mut root = Value::Array(PhpArray::new());
    let chain = RuntimeChain::builder().new_item().item("k").build();

    chain
        .set_value(&ctx, None, &mut root, Value::string("first"))
        .unwrap();
    chain
        .set_value(&ctx, None, &mut root, Value::string("second"))
        .unwrap();

    let read = |index: i64| {
        RuntimeChain::builder()
            .item(index)
            .item("k")
            .build()
            .get_value(&ctx, None, root.clone())
            .unwrap()
    };
    assert_eq!(read(0), Value::string("first"));
    assert_eq!(read(1), Value::string("second"));
    assert_eq!(root.as_array().map(PhpArray::len), Some(2));
}

#[test]
fn alias_to_appended_item_writes_through() {
    let ctx = context();
    let obj = ctx.new_std_object();
    let mut root = Value::Object(obj.clone());

    let alias = RuntimeChain::builder()
        .property("list")
        .new_item()
        .build()
        .get_alias(&ctx, None, &mut root)
        .unwrap();
    alias.set(Value::Long(9));

    let first = RuntimeChain::builder().property("list").item(0i64).build();
    assert_eq!(first.get_value(&ctx, None, root.clone()).unwrap(), Value::Long(9));
}

#[test]
fn writes_through_a_reference_root() {
    let ctx = context();
    let cell = Alias::new(Value::Null);
    let mut root = Value::Alias(cell.clone());
    let chain = RuntimeChain::builder().item("a").item("b").build();

    chain.set_value(&ctx, None, &mut root, Value::Long(1)).unwrap();

    let expected: PhpArray = [(
        ArrayKey::from("a"),
        Value::Array([(ArrayKey::from("b"), Value::Long(1))].into_iter().collect()),
    )]
    .into_iter()
    .collect();
    assert_eq!(cell.get(), Value::Array(expected));
}

#[test]
fn declared_property_holding_an_array() {
    let class = ClassBuilder::new("Bag")
        .property(PropertyDescriptor::new("items"))
        .build();
    let symbols = SymbolTable::new();
    symbols.declare_class(class.clone());
    let ctx = Context::new(Arc::new(symbols));
    let obj = ObjectRef::new(&class);
    let mut root = Value::Object(obj.clone());

    let chain = RuntimeChain::builder().property("items").item("x").build();
    chain.set_value(&ctx, None, &mut root, Value::Long(3)).unwrap();

    let items = obj.field(0);
    assert_eq!(
        items.as_array().and_then(|arr| arr.get(&ArrayKey::from("x")).cloned()),
        Some(Value::Long(3))
    );
}

#[test]
fn unset_removes_item_and_ignores_missing_paths() {
    let ctx = context();
    let mut root = Value::Object(ctx.new_std_object());
    let item = RuntimeChain::builder().property("a").item(0i64).build();
    item.set_value(&ctx, None, &mut root, Value::Long(1)).unwrap();

    item.unset(&ctx, None, &mut root).unwrap();
    assert!(!item.isset(&ctx, None, &root).unwrap());

    let missing = RuntimeChain::builder().property("nothing").item(1i64).build();
    missing.unset(&ctx, None, &mut root).unwrap();
    assert!(!missing.isset(&ctx, None, &root).unwrap());
    assert_eq!(warnings(&ctx), Vec::<String>::new());
}

#[test]
fn reads_warn_on_missing_steps() {
    let ctx = context();
    let root = Value::Object(ctx.new_std_object());
    let chain = RuntimeChain::builder().property("tags").item(2i64).build();

    // stdClass has a bag, so the missing member reads as null with a warning
    assert_eq!(chain.get_value(&ctx, None, root).unwrap(), Value::Null);
    assert_eq!(
        warnings(&ctx),
        vec![
            "Undefined property: stdClass::$tags".to_string(),
            "Trying to access array offset on null".to_string(),
        ]
    );
}

#[test]
fn string_offsets_read_single_bytes() {
    let ctx = context();
    let chain = RuntimeChain::builder().item(1i64).build();
    assert_eq!(
        chain.get_value(&ctx, None, Value::string("abc")).unwrap(),
        Value::string("b")
    );
    let from_end = RuntimeChain::builder().item(-1i64).build();
    assert_eq!(
        from_end.get_value(&ctx, None, Value::string("abc")).unwrap(),
        Value::string("c")
    );
}

#[test]
fn append_cannot_be_read() {
    let ctx = context();
    let chain = RuntimeChain::builder().new_item().build();
    let err = chain
        .get_value(&ctx, None, Value::Array(PhpArray::new()))
        .unwrap_err();
    assert!(matches!(err.as_bind(), Some(BindError::InvalidChain(_))));
}

#[test]
fn cyclic_objects_do_not_deadlock() {
    let ctx = context();
    let a = ctx.new_std_object();
    let b = ctx.new_std_object();
    a.set_runtime_field("other", Value::Object(b.clone()));
    b.set_runtime_field("other", Value::Object(a.clone()));

    let mut root = Value::Object(a.clone());
    let chain = RuntimeChain::builder()
        .property("other")
        .property("other")
        .property("other")
        .property("v")
        .build();
    chain.set_value(&ctx, None, &mut root, Value::Long(1)).unwrap();

    assert_eq!(b.runtime_field("v"), Some(Value::Long(1)));
    assert_eq!(a.runtime_field("v"), None);
}
