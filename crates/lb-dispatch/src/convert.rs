//! Cost model and value conversions between the hosted language's values and
//! host parameter types. [`cost_of`] and [`convert`] agree: whenever the cost
//! is below `NO_CONVERSION` the conversion succeeds.

use lb_core::error::{language_error, LanguageErrorKind};
use lb_core::metadata::{ClassDescriptor, Invocation, MagicMethod};
use lb_core::value::{format_double, parse_numeric, Number, NumericForm, ObjectRef};
use lb_core::{Context, Error, PhpArray, Result, TypeRef, Value, ValueKind};

use crate::cost::ConversionCost;

/// Cost of passing `value` to a parameter of type `target`.
pub fn cost_of(value: &Value, target: &TypeRef) -> ConversionCost {
    match value {
        Value::Alias(alias) => alias.with_value(|inner| cost_of(inner, target)),
        Value::Object(obj) => kind_cost(ValueKind::Object, Some(obj.class().as_ref()), target),
        other => kind_cost(other.kind(), None, target),
    }
}

/// Cost for a value known only by its kind and, for objects, its class.
/// `kind` must already be dereferenced.
pub fn kind_cost(
    kind: ValueKind,
    class: Option<&ClassDescriptor>,
    target: &TypeRef,
) -> ConversionCost {
    use ConversionCost as C;
    use TypeRef as T;
    use ValueKind as K;

    match target {
        T::Value => return C::PASS,
        T::Nullable(inner) => {
            return match kind {
                K::Null => C::PASS,
                _ => kind_cost(kind, class, inner),
            }
        }
        _ => {}
    }

    match (kind, target) {
        (K::Null, T::Bool | T::Long | T::Double) => C::IMPLICIT_CAST,
        (K::Null, _) => C::DEFAULT_VALUE,

        (K::Bool, T::Bool) => C::PASS,
        (K::Bool, T::Long | T::Double) => C::PASS_COSTLY,
        (K::Bool, T::String) => C::IMPLICIT_CAST,

        (K::Long, T::Long) => C::PASS,
        (K::Long, T::Double) => C::PASS_COSTLY,
        (K::Long, T::Bool) => C::LOOSING_PRECISION,
        (K::Long, T::String) => C::IMPLICIT_CAST,

        (K::Double, T::Double) => C::PASS,
        (K::Double, T::Long | T::Bool) => C::LOOSING_PRECISION,
        (K::Double, T::String) => C::IMPLICIT_CAST,

        (K::String, T::String) => C::PASS,
        (K::String, T::Bool) => C::IMPLICIT_CAST,
        (K::String, T::Long | T::Double) => C::LOOSING_PRECISION,

        (K::Array, T::Array) => C::PASS,
        (K::Array, T::Bool) => C::IMPLICIT_CAST,
        (K::Array, T::String) => C::WARNING,

        (K::Object, T::Object) => C::PASS,
        (K::Object, T::Bool) => C::IMPLICIT_CAST,
        (K::Object, T::Class(name)) => match class.and_then(|c| c.distance_to(name)) {
            Some(0) => C::PASS,
            Some(_) => C::PASS_COSTLY,
            None => C::NO_CONVERSION,
        },
        (K::Object, T::String) => {
            if class.and_then(|c| c.magic(MagicMethod::ToString)).is_some() {
                C::IMPLICIT_CAST
            } else {
                C::NO_CONVERSION
            }
        }

        // callers dereference before asking
        (K::Alias, _) => C::ERROR,
        _ => C::NO_CONVERSION,
    }
}

fn type_error(value: &Value, target: &TypeRef) -> Error {
    language_error(
        LanguageErrorKind::TypeError,
        format!(
            "Cannot pass value of type {} where {} is expected",
            value.type_name(),
            target
        ),
    )
}

/// Converts `value` to `target`, reporting lossy conversions on the
/// diagnostics channel.
pub fn convert(ctx: &Context, value: Value, target: &TypeRef) -> Result<Value> {
    let value = value.into_deref();
    match target {
        TypeRef::Value => Ok(value),
        TypeRef::Nullable(inner) => match value {
            Value::Null => Ok(Value::Null),
            other => convert(ctx, other, inner),
        },
        TypeRef::Bool => Ok(Value::Bool(value.to_bool())),
        TypeRef::Long => to_long(ctx, &value)
            .map(Value::Long)
            .ok_or_else(|| type_error(&value, target)),
        TypeRef::Double => to_double(ctx, &value)
            .map(Value::Double)
            .ok_or_else(|| type_error(&value, target)),
        TypeRef::String => match to_string(ctx, &value)? {
            Some(s) => Ok(Value::String(s)),
            None => Err(type_error(&value, target)),
        },
        TypeRef::Array => match value {
            Value::Array(_) => Ok(value),
            Value::Null => Ok(Value::Array(PhpArray::empty())),
            other => Err(type_error(&other, target)),
        },
        TypeRef::Object => match value {
            Value::Object(_) | Value::Null => Ok(value),
            other => Err(type_error(&other, target)),
        },
        TypeRef::Class(name) => match &value {
            Value::Object(obj) if obj.class().distance_to(name).is_some() => Ok(value),
            Value::Null => Ok(Value::Null),
            other => Err(type_error(other, target)),
        },
    }
}

fn double_to_long(ctx: &Context, d: f64) -> i64 {
    if !d.is_finite() || d.fract() != 0.0 {
        ctx.conversion_warning(format!(
            "Implicit conversion from float {} to int loses precision",
            format_double(d)
        ));
    }
    d as i64
}

fn parse_string_operand(ctx: &Context, s: &str) -> Number {
    let (number, form) = parse_numeric(s);
    match form {
        NumericForm::Whole => {}
        NumericForm::Leading => {
            ctx.conversion_warning(format!("A non-numeric value \"{}\" was truncated to a number", s))
        }
        NumericForm::NotNumeric => {
            ctx.conversion_warning(format!("A non-numeric value \"{}\" was converted to 0", s))
        }
    }
    number
}

fn to_long(ctx: &Context, value: &Value) -> Option<i64> {
    match value {
        Value::Null => Some(0),
        Value::Bool(b) => Some(*b as i64),
        Value::Long(l) => Some(*l),
        Value::Double(d) => Some(double_to_long(ctx, *d)),
        Value::String(s) => Some(match parse_string_operand(ctx, s) {
            Number::Long(l) => l,
            Number::Double(d) => double_to_long(ctx, d),
        }),
        _ => None,
    }
}

fn to_double(ctx: &Context, value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Long(l) => Some(*l as f64),
        Value::Double(d) => Some(*d),
        Value::String(s) => Some(parse_string_operand(ctx, s).as_double()),
        _ => None,
    }
}

fn to_string(ctx: &Context, value: &Value) -> Result<Option<String>> {
    Ok(match value {
        Value::Array(_) => {
            ctx.warn("Array to string conversion");
            Some("Array".to_string())
        }
        Value::Object(obj) => object_to_string(ctx, obj)?,
        Value::Alias(alias) => return to_string(ctx, &alias.get()),
        scalar => Some(scalar.to_string()),
    })
}

/// Runs `__toString` if the object's class declares one.
pub fn object_to_string(ctx: &Context, obj: &ObjectRef) -> Result<Option<String>> {
    let Some(routine) = obj.class().magic(MagicMethod::ToString) else {
        return Ok(None);
    };
    let result = routine.invoke(Invocation {
        ctx,
        this: Some(obj.clone()),
        args: vec![Value::Null; routine.params.len()],
    })?;
    match result.into_deref() {
        Value::String(s) => Ok(Some(s)),
        other => Err(language_error(
            LanguageErrorKind::TypeError,
            format!(
                "{}::__toString(): Return value must be of type string, {} returned",
                obj.class().name(),
                other.type_name()
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lb_core::SymbolTable;

    use super::*;

    #[test]
    fn identity_costs_pass() {
        let ctx = Context::new(Arc::new(SymbolTable::new()));
        let samples = [
            (Value::Bool(true), TypeRef::Bool),
            (Value::Long(3), TypeRef::Long),
            (Value::Double(1.5), TypeRef::Double),
            (Value::string("x"), TypeRef::String),
            (Value::array([Value::Long(1)]), TypeRef::Array),
            (Value::Object(ctx.new_std_object()), TypeRef::Object),
            (Value::Object(ctx.new_std_object()), TypeRef::class("stdClass")),
        ];
        for (value, target) in samples {
            assert_eq!(cost_of(&value, &target), ConversionCost::PASS, "{target}");
            let converted = convert(&ctx, value.clone(), &target).expect("identity converts");
            assert!(converted == value, "{target}");
        }
        assert!(!ctx.diagnostics().has_warnings());
    }

    #[test]
    fn string_to_long_warns_on_trailing_garbage() {
        let ctx = Context::new(Arc::new(SymbolTable::new()));
        let converted = convert(&ctx, Value::string("12abc"), &TypeRef::Long).unwrap();
        assert!(converted == Value::Long(12));
        assert!(ctx.diagnostics().has_warnings());
    }
}
