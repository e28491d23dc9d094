use lb_core::value::format_double;
use lb_core::{Alias, ArrayKey, PhpArray, Value, ValueKind};
use pretty_assertions::assert_eq;

#[test]
fn alias_clones_share_one_cell() {
    let cell = Alias::new(Value::Long(1));
    let other = cell.clone();
    other.set(Value::string("two"));
    assert_eq!(cell.get(), Value::string("two"));
    assert!(cell.ptr_eq(&other));
    assert_eq!(cell.ref_count(), 2);
}

#[test]
fn alias_never_wraps_another_alias() {
    let inner = Alias::new(Value::Long(3));
    let outer = Alias::new(Value::Alias(inner.clone()));
    assert_eq!(outer.get(), Value::Long(3));
    assert!(!outer.ptr_eq(&inner));
}

#[test]
fn ensure_alias_keeps_slot_value() {
    let mut slot = Value::Long(7);
    let cell = slot.ensure_alias();
    assert_eq!(slot.deref_kind(), ValueKind::Long);
    cell.set(Value::Long(8));
    assert_eq!(slot.deref(), Value::Long(8));

    // an existing cell is reused
    let again = slot.ensure_alias();
    assert!(again.ptr_eq(&cell));
}

#[test]
fn assign_writes_through_aliases() {
    let cell = Alias::new(Value::Null);
    let mut slot = Value::Alias(cell.clone());
    slot.assign(Value::Long(4));
    assert_eq!(cell.get(), Value::Long(4));
    assert_eq!(slot.kind(), ValueKind::Alias);
}

#[test]
fn ensure_array_vivifies_empty_slots_only() {
    let mut null = Value::Null;
    assert!(null.ensure_array().is_some());
    assert_eq!(null.kind(), ValueKind::Array);

    let mut falsy = Value::Bool(false);
    assert!(falsy.ensure_array().is_some());

    let mut scalar = Value::Long(1);
    assert!(scalar.ensure_array().is_none());
    assert_eq!(scalar, Value::Long(1));
}

#[test]
fn truthiness() {
    let falsy = [
        Value::Null,
        Value::Bool(false),
        Value::Long(0),
        Value::Double(0.0),
        Value::string(""),
        Value::string("0"),
        Value::Array(PhpArray::new()),
    ];
    for value in falsy {
        assert!(!value.to_bool(), "{:?}", value);
    }
    let truthy = [
        Value::Bool(true),
        Value::Long(-1),
        Value::string("0.0"),
        Value::array([Value::Null]),
    ];
    for value in truthy {
        assert!(value.to_bool(), "{:?}", value);
    }
}

#[test]
fn display_matches_string_conversion() {
    assert_eq!(Value::Null.to_string(), "");
    assert_eq!(Value::Bool(true).to_string(), "1");
    assert_eq!(Value::Bool(false).to_string(), "");
    assert_eq!(Value::Long(-5).to_string(), "-5");
    assert_eq!(Value::Double(2.0).to_string(), "2");
    assert_eq!(Value::Double(0.5).to_string(), "0.5");
    assert_eq!(Value::Array(PhpArray::new()).to_string(), "Array");
    assert_eq!(format_double(f64::INFINITY), "INF");
    assert_eq!(format_double(f64::NAN), "NAN");
}

#[test]
fn type_names_for_diagnostics() {
    assert_eq!(Value::Null.type_name(), "null");
    assert_eq!(Value::Long(1).type_name(), "int");
    assert_eq!(Value::Double(1.0).type_name(), "float");
    assert_eq!(Value::Alias(Alias::new(Value::string("s"))).type_name(), "string");
}

#[test]
fn array_keys_from_operands() {
    assert_eq!(ArrayKey::from_value(&Value::Bool(true)), Some(ArrayKey::Int(1)));
    assert_eq!(ArrayKey::from_value(&Value::Double(2.9)), Some(ArrayKey::Int(2)));
    assert_eq!(ArrayKey::from_value(&Value::Null), Some(ArrayKey::Str(String::new())));
    assert_eq!(ArrayKey::from_value(&Value::string("7")), Some(ArrayKey::Int(7)));
    assert_eq!(ArrayKey::from_value(&Value::Array(PhpArray::new())), None);
}

#[test]
fn array_set_writes_through_reference_items() {
    let cell = Alias::new(Value::Long(1));
    let mut arr = PhpArray::new();
    arr.set(ArrayKey::from("r"), Value::Alias(cell.clone()));
    arr.set(ArrayKey::from("r"), Value::Long(2));
    assert_eq!(cell.get(), Value::Long(2));
}
