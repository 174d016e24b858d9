//! Global-object bindings that belong to no constructor

use std::rc::Rc;

use crate::agent::Agent;
use crate::object::{PartialDescriptor, PropertyKey};
use crate::realm::Realm;
use crate::value::{string_to_number, to_number, to_string, Value};

use super::{def_method, def_value, display_value};

pub fn install(agent: &mut Agent, realm: &Rc<Realm>) {
    let global = realm.global_object();

    global.borrow_mut().define_own_property(
        &PropertyKey::from("globalThis"),
        &PartialDescriptor::data(Value::Object(global.clone()), true, false, true),
    );
    global.borrow_mut().define_own_property(
        &PropertyKey::from("undefined"),
        &PartialDescriptor::data(Value::Undefined, false, false, false),
    );
    global.borrow_mut().define_own_property(
        &PropertyKey::from("NaN"),
        &PartialDescriptor::data(Value::Number(f64::NAN), false, false, false),
    );
    global.borrow_mut().define_own_property(
        &PropertyKey::from("Infinity"),
        &PartialDescriptor::data(Value::Number(f64::INFINITY), false, false, false),
    );

    def_method(agent, realm, &global, "print", 1, |agent, ctx| {
        let mut parts = Vec::with_capacity(ctx.args.len());
        for arg in &ctx.args {
            parts.push(display_value(agent, arg));
        }
        let text = parts.join(" ");
        agent.hooks.print(&text);
        Ok(Value::Undefined)
    });

    def_method(agent, realm, &global, "isNaN", 1, |agent, ctx| {
        Ok(Value::from(to_number(agent, &ctx.arg(0))?.is_nan()))
    });
    def_method(agent, realm, &global, "isFinite", 1, |agent, ctx| {
        Ok(Value::from(to_number(agent, &ctx.arg(0))?.is_finite()))
    });
    def_method(agent, realm, &global, "parseFloat", 1, |agent, ctx| {
        let s = to_string(agent, &ctx.arg(0))?;
        let trimmed = s.as_str().trim_start();
        // Longest numeric prefix.
        let mut end = 0;
        let bytes = trimmed.as_bytes();
        let mut seen_dot = false;
        let mut seen_exp = false;
        while end < bytes.len() {
            let c = bytes[end] as char;
            let ok = c.is_ascii_digit()
                || (c == '.' && !seen_dot && !seen_exp)
                || ((c == 'e' || c == 'E') && !seen_exp && end > 0)
                || ((c == '+' || c == '-')
                    && (end == 0 || matches!(bytes[end - 1], b'e' | b'E')));
            if !ok {
                break;
            }
            seen_dot |= c == '.';
            seen_exp |= c == 'e' || c == 'E';
            end += 1;
        }
        Ok(Value::Number(
            trimmed[..end].parse::<f64>().unwrap_or(f64::NAN),
        ))
    });
    def_method(agent, realm, &global, "parseInt", 2, |agent, ctx| {
        let s = to_string(agent, &ctx.arg(0))?;
        let radix = match ctx.arg(1) {
            Value::Undefined => 10,
            other => {
                let r = to_number(agent, &other)? as u32;
                if r == 0 {
                    10
                } else {
                    r
                }
            }
        };
        let trimmed = s.as_str().trim();
        if radix == 16 || trimmed.starts_with("0x") || trimmed.starts_with("0X") {
            return Ok(Value::Number(string_to_number(trimmed)));
        }
        let (digits, negative) = match trimmed.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (trimmed.strip_prefix('+').unwrap_or(trimmed), false),
        };
        let end = digits
            .find(|c: char| !c.is_digit(radix))
            .unwrap_or(digits.len());
        if end == 0 {
            return Ok(Value::Number(f64::NAN));
        }
        let parsed = i64::from_str_radix(&digits[..end], radix).unwrap_or(0) as f64;
        Ok(Value::Number(if negative { -parsed } else { parsed }))
    });

    // console.log and friends, routed through the host print hook.
    let console = agent.create_object_with_proto(Some(realm.intrinsics().object_prototype.clone()));
    for name in ["log", "error", "warn", "info"] {
        def_method(agent, realm, &console, name, 0, |agent, ctx| {
            let mut parts = Vec::with_capacity(ctx.args.len());
            for arg in &ctx.args {
                parts.push(display_value(agent, arg));
            }
            let text = parts.join(" ");
            agent.hooks.print(&text);
            Ok(Value::Undefined)
        });
    }
    def_value(&global, "console", Value::Object(console));
}
