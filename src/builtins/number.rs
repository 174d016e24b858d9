//! Number, Boolean, and BigInt constructors with their prototypes

use std::rc::Rc;

use num_bigint::BigInt;

use crate::agent::Agent;
use crate::object::ExoticObject;
use crate::realm::Realm;
use crate::value::{number_to_string, to_number, to_numeric, Value};

use super::{create_native_function, def_method, def_value, install_constructor};

pub fn install(agent: &mut Agent, realm: &Rc<Realm>) {
    install_number(agent, realm);
    install_boolean(agent, realm);
    install_bigint(agent, realm);
}

fn this_number(agent: &mut Agent, receiver: &Value) -> Result<f64, crate::error::EngineError> {
    match receiver {
        Value::Number(n) => Ok(*n),
        Value::Object(obj) => {
            let boxed = match &obj.borrow().exotic {
                ExoticObject::BoxedPrimitive(Value::Number(n)) => Some(*n),
                _ => None,
            };
            boxed.ok_or_else(|| agent.type_error("Number method called on incompatible receiver"))
        }
        _ => Err(agent.type_error("Number method called on incompatible receiver")),
    }
}

fn install_number(agent: &mut Agent, realm: &Rc<Realm>) {
    let prototype = realm.intrinsics().number_prototype.clone();

    def_method(agent, realm, &prototype, "toString", 1, |agent, ctx| {
        let n = this_number(agent, &ctx.receiver)?;
        match ctx.arg(0) {
            Value::Undefined => Ok(Value::from(number_to_string(n))),
            radix => {
                let radix = to_number(agent, &radix)? as u32;
                if !(2..=36).contains(&radix) {
                    return Err(
                        agent.range_error("toString() radix must be between 2 and 36")
                    );
                }
                if radix == 10 {
                    return Ok(Value::from(number_to_string(n)));
                }
                Ok(Value::from(format_radix(n, radix)))
            }
        }
    });
    def_method(agent, realm, &prototype, "valueOf", 0, |agent, ctx| {
        Ok(Value::Number(this_number(agent, &ctx.receiver)?))
    });

    let ctor = create_native_function(agent, realm, "Number", 1, true, |agent, ctx| {
        let n = match ctx.args.first() {
            None => 0.0,
            Some(v) => to_number(agent, v)?,
        };
        if ctx.new_target.is_object() {
            return Ok(Value::Object(super::box_primitive(agent, &Value::Number(n))));
        }
        Ok(Value::Number(n))
    });
    def_method(agent, realm, &ctor, "isInteger", 1, |_, ctx| {
        Ok(Value::from(matches!(
            ctx.arg(0),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0
        )))
    });
    def_method(agent, realm, &ctor, "isNaN", 1, |_, ctx| {
        Ok(Value::from(
            matches!(ctx.arg(0), Value::Number(n) if n.is_nan()),
        ))
    });
    def_method(agent, realm, &ctor, "isFinite", 1, |_, ctx| {
        Ok(Value::from(
            matches!(ctx.arg(0), Value::Number(n) if n.is_finite()),
        ))
    });
    def_value(&ctor, "MAX_SAFE_INTEGER", Value::Number(9007199254740991.0));
    def_value(&ctor, "EPSILON", Value::Number(f64::EPSILON));

    install_constructor(agent, realm, "Number", ctor, &prototype);
}

fn install_boolean(agent: &mut Agent, realm: &Rc<Realm>) {
    let prototype = realm.intrinsics().boolean_prototype.clone();

    def_method(agent, realm, &prototype, "toString", 0, |agent, ctx| {
        let b = this_boolean(agent, &ctx.receiver)?;
        Ok(Value::from(if b { "true" } else { "false" }))
    });
    def_method(agent, realm, &prototype, "valueOf", 0, |agent, ctx| {
        Ok(Value::Boolean(this_boolean(agent, &ctx.receiver)?))
    });

    let ctor = create_native_function(agent, realm, "Boolean", 1, true, |agent, ctx| {
        let b = ctx.arg(0).to_boolean();
        if ctx.new_target.is_object() {
            return Ok(Value::Object(super::box_primitive(
                agent,
                &Value::Boolean(b),
            )));
        }
        Ok(Value::Boolean(b))
    });

    install_constructor(agent, realm, "Boolean", ctor, &prototype);
}

fn this_boolean(agent: &mut Agent, receiver: &Value) -> Result<bool, crate::error::EngineError> {
    match receiver {
        Value::Boolean(b) => Ok(*b),
        Value::Object(obj) => {
            let boxed = match &obj.borrow().exotic {
                ExoticObject::BoxedPrimitive(Value::Boolean(b)) => Some(*b),
                _ => None,
            };
            boxed.ok_or_else(|| agent.type_error("Boolean method called on incompatible receiver"))
        }
        _ => Err(agent.type_error("Boolean method called on incompatible receiver")),
    }
}

fn install_bigint(agent: &mut Agent, realm: &Rc<Realm>) {
    let prototype = realm.intrinsics().bigint_prototype.clone();

    def_method(agent, realm, &prototype, "toString", 0, |agent, ctx| {
        match &ctx.receiver {
            Value::BigInt(b) => Ok(Value::from(b.to_string())),
            _ => Err(agent.type_error("BigInt method called on incompatible receiver")),
        }
    });
    def_method(agent, realm, &prototype, "valueOf", 0, |agent, ctx| {
        match &ctx.receiver {
            Value::BigInt(_) => Ok(ctx.receiver.clone()),
            _ => Err(agent.type_error("BigInt method called on incompatible receiver")),
        }
    });

    // BigInt() converts; it is not constructible.
    let ctor = create_native_function(agent, realm, "BigInt", 1, false, |agent, ctx| {
        if ctx.new_target.is_object() {
            return Err(agent.type_error("BigInt is not a constructor"));
        }
        match to_numeric(agent, &ctx.arg(0))? {
            big @ Value::BigInt(_) => Ok(big),
            Value::Number(n) => {
                if !n.is_finite() || n.fract() != 0.0 {
                    return Err(agent.range_error(
                        "The number is not a safe integer and cannot be converted to a BigInt",
                    ));
                }
                Ok(Value::from(BigInt::from(n as i64)))
            }
            _ => Err(agent.type_error("Cannot convert value to a BigInt")),
        }
    });

    install_constructor(agent, realm, "BigInt", ctor, &prototype);
}

/// Integer-only radix formatting (fractional digits are truncated).
fn format_radix(n: f64, radix: u32) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let negative = n < 0.0;
    let mut i = n.abs().trunc() as u64;
    if i == 0 {
        return "0".to_string();
    }
    let digits = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    while i > 0 {
        out.push(digits[(i % u64::from(radix)) as usize]);
        i /= u64::from(radix);
    }
    if negative {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).expect("radix digits are ASCII")
}
