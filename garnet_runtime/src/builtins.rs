//! Built-in method definitions installed at bootstrap.
//!
//! Every method here is flagged as a basic definition, which is how the
//! dispatch core tells "the default `method_missing`" apart from a user
//! override.

use crate::class::ClassRef;
use crate::method::{Arity, Invoke, NativeFn, Visibility};
use crate::registry::ClassRegistry;
use crate::value::Value;
use garnet_core::{GarnetError, GarnetResult, MissingReason};

pub(crate) fn install(registry: &ClassRegistry) {
    let b = registry.builtins().clone();
    let def = |class: &ClassRef, name: &str, arity: Arity, func: NativeFn| {
        registry.define_basic(class, name, arity, func, Visibility::Public);
    };

    // BasicObject
    registry.define_basic(
        &b.basic_object,
        "method_missing",
        Arity::at_least(1),
        basic_method_missing,
        Visibility::Private,
    );
    def(&b.basic_object, "==", Arity::exact(1), basic_identical);
    def(&b.basic_object, "equal?", Arity::exact(1), basic_identical);
    def(&b.basic_object, "!", Arity::exact(0), basic_not);

    // Kernel
    def(&b.kernel, "respond_to?", Arity::exact(1), kernel_respond_to);
    def(&b.kernel, "class", Arity::exact(0), kernel_class);
    def(&b.kernel, "inspect", Arity::exact(0), kernel_inspect);
    def(&b.kernel, "nil?", Arity::exact(0), kernel_nil_p);
    def(&b.kernel, "freeze", Arity::exact(0), kernel_freeze);

    // Module
    def(&b.module, "name", Arity::exact(0), module_name);

    // Integer
    def(&b.integer, "+", Arity::exact(1), int_add);
    def(&b.integer, "-", Arity::exact(1), int_sub);
    def(&b.integer, "*", Arity::exact(1), int_mul);
    def(&b.integer, "<", Arity::exact(1), int_lt);
    def(&b.integer, "==", Arity::exact(1), value_eq);
    def(&b.integer, "to_s", Arity::exact(0), to_s);

    // String
    def(&b.string, "length", Arity::exact(0), str_length);
    def(&b.string, "+", Arity::exact(1), str_concat);
    def(&b.string, "==", Arity::exact(1), value_eq);
    def(&b.string, "to_s", Arity::exact(0), to_s);

    // Symbol, NilClass
    def(&b.symbol, "to_s", Arity::exact(0), to_s);
    def(&b.nil, "to_s", Arity::exact(0), to_s);
    def(&b.nil, "nil?", Arity::exact(0), kernel_nil_p);
}

// =============================================================================
// BasicObject / Kernel
// =============================================================================

/// Default `method_missing`: always raises.
///
/// Reached only when called explicitly; implicit missing-method handling
/// raises directly with the precise reason.
fn basic_method_missing(_: &mut dyn Invoke, recv: &Value, args: &[Value]) -> GarnetResult<Value> {
    let name = match args.first() {
        Some(Value::Symbol(mid)) => mid.to_string(),
        Some(other) => {
            return Err(GarnetError::raised(
                "ArgumentError",
                format!("no method name given ({})", other.inspect()),
            ));
        }
        None => return Err(GarnetError::raised("ArgumentError", "no method name given")),
    };
    Err(GarnetError::no_method(name, recv.describe(), MissingReason::NoEntry))
}

fn basic_identical(_: &mut dyn Invoke, recv: &Value, args: &[Value]) -> GarnetResult<Value> {
    Ok(Value::Bool(recv.identical(&args[0])))
}

fn basic_not(_: &mut dyn Invoke, recv: &Value, _: &[Value]) -> GarnetResult<Value> {
    Ok(Value::Bool(!recv.is_truthy()))
}

fn kernel_respond_to(ctx: &mut dyn Invoke, recv: &Value, args: &[Value]) -> GarnetResult<Value> {
    let Some(mid) = args[0].as_symbol() else {
        return Err(GarnetError::type_error(format!(
            "{} is not a symbol",
            args[0].inspect()
        )));
    };
    let registry = ctx.registry();
    let class = registry.class_of(recv);
    let public = registry
        .search_method(&class, mid)
        .is_some_and(|entry| entry.visibility == Visibility::Public);
    Ok(Value::Bool(public))
}

fn kernel_class(ctx: &mut dyn Invoke, recv: &Value, _: &[Value]) -> GarnetResult<Value> {
    Ok(Value::Class(ctx.registry().real_class_of(recv)))
}

fn kernel_inspect(_: &mut dyn Invoke, recv: &Value, _: &[Value]) -> GarnetResult<Value> {
    Ok(Value::str(&recv.inspect()))
}

fn kernel_nil_p(_: &mut dyn Invoke, recv: &Value, _: &[Value]) -> GarnetResult<Value> {
    Ok(Value::Bool(recv.is_nil()))
}

fn kernel_freeze(_: &mut dyn Invoke, recv: &Value, _: &[Value]) -> GarnetResult<Value> {
    if let Some(obj) = recv.as_object() {
        obj.freeze();
    }
    Ok(recv.clone())
}

fn module_name(_: &mut dyn Invoke, recv: &Value, _: &[Value]) -> GarnetResult<Value> {
    Ok(match recv.as_class() {
        Some(class) => Value::str(class.name()),
        None => Value::Nil,
    })
}

// =============================================================================
// Integer / String / Symbol
// =============================================================================

fn int_operands(recv: &Value, arg: &Value) -> GarnetResult<(i64, i64)> {
    match (recv.as_int(), arg.as_int()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(GarnetError::type_error(format!(
            "{} can't be coerced into Integer",
            arg.inspect()
        ))),
    }
}

fn int_add(_: &mut dyn Invoke, recv: &Value, args: &[Value]) -> GarnetResult<Value> {
    let (a, b) = int_operands(recv, &args[0])?;
    Ok(Value::Int(a.wrapping_add(b)))
}

fn int_sub(_: &mut dyn Invoke, recv: &Value, args: &[Value]) -> GarnetResult<Value> {
    let (a, b) = int_operands(recv, &args[0])?;
    Ok(Value::Int(a.wrapping_sub(b)))
}

fn int_mul(_: &mut dyn Invoke, recv: &Value, args: &[Value]) -> GarnetResult<Value> {
    let (a, b) = int_operands(recv, &args[0])?;
    Ok(Value::Int(a.wrapping_mul(b)))
}

fn int_lt(_: &mut dyn Invoke, recv: &Value, args: &[Value]) -> GarnetResult<Value> {
    let (a, b) = int_operands(recv, &args[0])?;
    Ok(Value::Bool(a < b))
}

fn value_eq(_: &mut dyn Invoke, recv: &Value, args: &[Value]) -> GarnetResult<Value> {
    Ok(Value::Bool(*recv == args[0]))
}

fn to_s(_: &mut dyn Invoke, recv: &Value, _: &[Value]) -> GarnetResult<Value> {
    Ok(match recv {
        Value::Str(_) => recv.clone(),
        Value::Nil => Value::str(""),
        Value::Symbol(s) => Value::Str(s.name()),
        other => Value::str(&other.inspect()),
    })
}

fn str_length(_: &mut dyn Invoke, recv: &Value, _: &[Value]) -> GarnetResult<Value> {
    match recv {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(GarnetError::type_error(format!(
            "{} is not a String",
            other.inspect()
        ))),
    }
}

fn str_concat(_: &mut dyn Invoke, recv: &Value, args: &[Value]) -> GarnetResult<Value> {
    match (recv, &args[0]) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::str(&format!("{a}{b}"))),
        (_, other) => Err(GarnetError::type_error(format!(
            "no implicit conversion of {} into String",
            other.inspect()
        ))),
    }
}
