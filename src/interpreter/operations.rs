//! Operator semantics
//!
//! The binary/unary operator algorithms the dispatch loop delegates to:
//! numeric arithmetic with the BigInt branches, the comparison family, and
//! property access that works across primitive receivers.

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::agent::Agent;
use crate::error::EngineError;
use crate::object::{JsObjectRef, PropertyKey};
use crate::value::{
    self, is_less_than, to_int32, to_number, to_numeric, to_primitive, to_string, to_uint32,
    CheapClone, JsString, PreferredType, Value,
};

/// The `+` operator: string concatenation or numeric addition.
pub fn add(agent: &mut Agent, left: &Value, right: &Value) -> Result<Value, EngineError> {
    let lp = to_primitive(agent, left, PreferredType::Default)?;
    let rp = to_primitive(agent, right, PreferredType::Default)?;
    if lp.is_string() || rp.is_string() {
        let ls = to_string(agent, &lp)?;
        let rs = to_string(agent, &rp)?;
        return Ok(Value::String(ls.concat(&rs)));
    }
    let ln = to_numeric(agent, &lp)?;
    let rn = to_numeric(agent, &rp)?;
    match (&ln, &rn) {
        (Value::BigInt(a), Value::BigInt(b)) => Ok(Value::from((**a).clone() + (**b).clone())),
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        _ => Err(agent.type_error("Cannot mix BigInt and other types, use explicit conversions")),
    }
}

/// The numeric operators other than `+`.
pub fn numeric_binary(
    agent: &mut Agent,
    op: NumericOp,
    left: &Value,
    right: &Value,
) -> Result<Value, EngineError> {
    let ln = to_numeric(agent, left)?;
    let rn = to_numeric(agent, right)?;
    match (&ln, &rn) {
        (Value::Number(a), Value::Number(b)) => Ok(number_op(agent, op, *a, *b)?),
        (Value::BigInt(a), Value::BigInt(b)) => bigint_op(agent, op, a, b),
        _ => Err(agent.type_error("Cannot mix BigInt and other types, use explicit conversions")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Ushr,
}

fn number_op(agent: &mut Agent, op: NumericOp, a: f64, b: f64) -> Result<Value, EngineError> {
    let n = match op {
        NumericOp::Sub => a - b,
        NumericOp::Mul => a * b,
        NumericOp::Div => a / b,
        NumericOp::Rem => {
            if b == 0.0 || a.is_nan() || b.is_nan() || a.is_infinite() {
                f64::NAN
            } else {
                a % b
            }
        }
        NumericOp::Exp => a.powf(b),
        NumericOp::BitAnd => (to_int32(a) & to_int32(b)) as f64,
        NumericOp::BitOr => (to_int32(a) | to_int32(b)) as f64,
        NumericOp::BitXor => (to_int32(a) ^ to_int32(b)) as f64,
        NumericOp::Shl => (to_int32(a) << (to_uint32(b) & 31)) as f64,
        NumericOp::Shr => (to_int32(a) >> (to_uint32(b) & 31)) as f64,
        NumericOp::Ushr => (to_uint32(a) >> (to_uint32(b) & 31)) as f64,
    };
    let _ = agent;
    Ok(Value::Number(n))
}

fn bigint_op(
    agent: &mut Agent,
    op: NumericOp,
    a: &Rc<BigInt>,
    b: &Rc<BigInt>,
) -> Result<Value, EngineError> {
    let a = &**a;
    let b = &**b;
    let result = match op {
        NumericOp::Sub => a - b,
        NumericOp::Mul => a * b,
        NumericOp::Div => {
            if b.is_zero() {
                return Err(agent.range_error("Division by zero"));
            }
            a / b
        }
        NumericOp::Rem => {
            if b.is_zero() {
                return Err(agent.range_error("Division by zero"));
            }
            a % b
        }
        NumericOp::Exp => {
            if b.is_negative() {
                return Err(agent.range_error("Exponent must be non-negative"));
            }
            let Some(exp) = b.to_u32() else {
                return Err(agent.range_error("BigInt exponent is too large"));
            };
            a.pow(exp)
        }
        NumericOp::BitAnd => a & b,
        NumericOp::BitOr => a | b,
        NumericOp::BitXor => a ^ b,
        NumericOp::Shl => {
            let Some(shift) = b.to_i64() else {
                return Err(agent.range_error("BigInt shift amount is too large"));
            };
            if shift >= 0 {
                a << shift as usize
            } else {
                a >> (-shift) as usize
            }
        }
        NumericOp::Shr => {
            let Some(shift) = b.to_i64() else {
                return Err(agent.range_error("BigInt shift amount is too large"));
            };
            if shift >= 0 {
                a >> shift as usize
            } else {
                a << (-shift) as usize
            }
        }
        NumericOp::Ushr => {
            return Err(agent.type_error("BigInts have no unsigned right shift"));
        }
    };
    Ok(Value::from(result))
}

/// Unary negation with ToNumeric.
pub fn negate(agent: &mut Agent, value: &Value) -> Result<Value, EngineError> {
    match to_numeric(agent, value)? {
        Value::Number(n) => Ok(Value::Number(-n)),
        Value::BigInt(b) => Ok(Value::from(-(*b).clone())),
        _ => unreachable!("ToNumeric returns numeric values"),
    }
}

/// Unary `~` with ToNumeric.
pub fn bitwise_not(agent: &mut Agent, value: &Value) -> Result<Value, EngineError> {
    match to_numeric(agent, value)? {
        Value::Number(n) => Ok(Value::Number(!to_int32(n) as f64)),
        Value::BigInt(b) => Ok(Value::from(!(*b).clone())),
        _ => unreachable!("ToNumeric returns numeric values"),
    }
}

/// `++`/`--` on an already-ToNumeric value.
pub fn increment(value: &Value, by: i64) -> Value {
    match value {
        Value::Number(n) => Value::Number(n + by as f64),
        Value::BigInt(b) => Value::from((**b).clone() + by),
        _ => Value::Number(f64::NAN),
    }
}

/// `<`, `>`, `<=`, `>=` via the abstract relational comparison.
pub fn compare(
    agent: &mut Agent,
    op: CompareOp,
    left: &Value,
    right: &Value,
) -> Result<bool, EngineError> {
    let result = match op {
        CompareOp::Less => is_less_than(agent, left, right)?,
        CompareOp::Greater => is_less_than(agent, right, left)?,
        CompareOp::LessEq => {
            return Ok(!is_less_than(agent, right, left)?.unwrap_or(true));
        }
        CompareOp::GreaterEq => {
            return Ok(!is_less_than(agent, left, right)?.unwrap_or(true));
        }
    };
    Ok(result.unwrap_or(false))
}

#[derive(Debug, Clone, Copy)]
pub enum CompareOp {
    Less,
    Greater,
    LessEq,
    GreaterEq,
}

/// Property read on any value: primitives go through their boxed prototype
/// (with the string fast paths), objects through `[[Get]]`.
pub fn get_value_property(
    agent: &mut Agent,
    value: &Value,
    key: &PropertyKey,
) -> Result<Value, EngineError> {
    match value {
        Value::Object(obj) => {
            // String boxes answer length and code-unit indexing like the
            // primitive would.
            let boxed = match &obj.borrow().exotic {
                crate::object::ExoticObject::BoxedPrimitive(inner @ Value::String(_)) => {
                    Some(inner.clone())
                }
                _ => None,
            };
            if let Some(inner) = boxed {
                let is_data_key = matches!(key, PropertyKey::Index(_))
                    || matches!(key, PropertyKey::String(name) if name == "length");
                if is_data_key {
                    return get_value_property(agent, &inner, key);
                }
            }
            crate::object::get(agent, obj, key)
        }
        Value::Undefined | Value::Null => Err(agent.type_error(format!(
            "Cannot read properties of {} (reading '{}')",
            if value.is_undefined() { "undefined" } else { "null" },
            key
        ))),
        Value::String(s) => {
            if let PropertyKey::String(name) = key {
                if name == "length" {
                    return Ok(Value::from(s.utf16_len()));
                }
            }
            if let PropertyKey::Index(idx) = key {
                let units: Vec<u16> = s.as_str().encode_utf16().collect();
                return Ok(match units.get(*idx as usize) {
                    Some(unit) => Value::String(JsString::from(
                        String::from_utf16_lossy(&[*unit]),
                    )),
                    None => Value::Undefined,
                });
            }
            prototype_lookup(agent, value, key)
        }
        _ => prototype_lookup(agent, value, key),
    }
}

/// Look a key up on the prototype a primitive would box to.
fn prototype_lookup(
    agent: &mut Agent,
    value: &Value,
    key: &PropertyKey,
) -> Result<Value, EngineError> {
    let realm = agent.current_realm();
    let intrinsics = realm.intrinsics();
    let proto: JsObjectRef = match value {
        Value::String(_) => intrinsics.string_prototype.clone(),
        Value::Number(_) => intrinsics.number_prototype.clone(),
        Value::Boolean(_) => intrinsics.boolean_prototype.clone(),
        Value::BigInt(_) => intrinsics.bigint_prototype.clone(),
        Value::Symbol(_) => intrinsics.symbol_prototype.clone(),
        _ => intrinsics.object_prototype.clone(),
    };
    crate::object::get_with_receiver(agent, &proto, key, value)
}

/// Property write on any value. Returns false on rejection (the strict
/// caller converts that to a TypeError).
pub fn set_value_property(
    agent: &mut Agent,
    target: &Value,
    key: &PropertyKey,
    value: Value,
) -> Result<bool, EngineError> {
    match target {
        Value::Object(obj) => crate::object::set(agent, obj, key, value),
        Value::Undefined | Value::Null => Err(agent.type_error(format!(
            "Cannot set properties of {} (setting '{}')",
            if target.is_undefined() { "undefined" } else { "null" },
            key
        ))),
        // Writes to other primitives silently fail (throwing in strict mode).
        _ => Ok(false),
    }
}

/// `in` operator.
pub fn has_property_op(
    agent: &mut Agent,
    key: &Value,
    target: &Value,
) -> Result<bool, EngineError> {
    let Value::Object(obj) = target else {
        return Err(agent.type_error("Cannot use 'in' operator on a non-object"));
    };
    let key = value::to_property_key(agent, key)?;
    Ok(obj.borrow().has_property(&key))
}

/// `instanceof`, honoring `[Symbol.hasInstance]`.
pub fn instance_of(
    agent: &mut Agent,
    value: &Value,
    constructor: &Value,
) -> Result<bool, EngineError> {
    if let Value::Object(ctor) = constructor {
        let has_instance_sym = agent.well_known_symbols().has_instance;
        let method =
            crate::object::get(agent, ctor, &PropertyKey::Symbol(has_instance_sym))?;
        if method.is_callable() {
            let result = crate::interpreter::call_value(
                agent,
                &method,
                constructor.clone(),
                &[value.clone()],
            )?;
            return Ok(result.to_boolean());
        }
    }
    crate::object::ordinary_has_instance(agent, constructor, value)
}

/// Template literal concatenation: ToString each part in order.
pub fn concat_template(
    agent: &mut Agent,
    parts: Vec<Value>,
) -> Result<Value, EngineError> {
    let mut out = String::new();
    for part in parts {
        out.push_str(to_string(agent, &part)?.as_str());
    }
    Ok(Value::from(out))
}

/// ToNumber as an opcode (unary `+`).
pub fn to_number_value(agent: &mut Agent, value: &Value) -> Result<Value, EngineError> {
    Ok(Value::Number(to_number(agent, value)?))
}

/// Shared doubled-checked ToNumeric for Inc/Dec operands.
pub fn to_numeric_value(agent: &mut Agent, value: &Value) -> Result<Value, EngineError> {
    to_numeric(agent, value)
}

/// CopyDataProperties: own enumerable keys of `source` into `target`,
/// skipping the excluded list.
pub fn copy_data_properties(
    agent: &mut Agent,
    target: &JsObjectRef,
    source: &Value,
    excluded: &[PropertyKey],
) -> Result<(), EngineError> {
    if source.is_nullish() {
        return Ok(());
    }
    let from = crate::value::to_object(agent, source)?;
    let keys: Vec<PropertyKey> = from
        .borrow()
        .own_property_keys()
        .into_iter()
        .filter(|k| !excluded.contains(k))
        .filter(|k| {
            from.borrow()
                .get_own_property(k)
                .map(|d| d.enumerable)
                .unwrap_or(false)
        })
        .collect();
    for key in keys {
        let value = crate::object::get(agent, &from, &key)?;
        crate::object::create_data_property(target, &key, value);
    }
    Ok(())
}

/// Named-property key cache: canonical index strings route to the indexed
/// store exactly like computed keys.
pub fn named_key(name: &JsString) -> PropertyKey {
    PropertyKey::from(name.cheap_clone())
}
