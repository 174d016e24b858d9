//! The String constructor and %String.prototype%

use std::rc::Rc;

use unicode_normalization::UnicodeNormalization;

use crate::agent::Agent;
use crate::realm::Realm;
use crate::value::{to_number, to_string, JsString, Value};

use super::{create_array, create_native_function, def_method, install_constructor, this_string};

pub fn install(agent: &mut Agent, realm: &Rc<Realm>) {
    let prototype = realm.intrinsics().string_prototype.clone();

    def_method(agent, realm, &prototype, "charAt", 1, |agent, ctx| {
        let s = this_string(agent, ctx)?;
        let idx = to_number(agent, &ctx.arg(0))? as i64;
        let units: Vec<u16> = s.as_str().encode_utf16().collect();
        if idx < 0 || idx as usize >= units.len() {
            return Ok(Value::from(""));
        }
        Ok(Value::from(String::from_utf16_lossy(&[units[idx as usize]])))
    });

    def_method(agent, realm, &prototype, "charCodeAt", 1, |agent, ctx| {
        let s = this_string(agent, ctx)?;
        let idx = to_number(agent, &ctx.arg(0))? as i64;
        let units: Vec<u16> = s.as_str().encode_utf16().collect();
        if idx < 0 || idx as usize >= units.len() {
            return Ok(Value::Number(f64::NAN));
        }
        Ok(Value::from(units[idx as usize] as f64))
    });

    def_method(agent, realm, &prototype, "indexOf", 1, |agent, ctx| {
        let s = this_string(agent, ctx)?;
        let needle = to_string(agent, &ctx.arg(0))?;
        Ok(match s.as_str().find(needle.as_str()) {
            Some(byte_pos) => {
                let units = s.as_str()[..byte_pos].encode_utf16().count();
                Value::from(units)
            }
            None => Value::Number(-1.0),
        })
    });

    def_method(agent, realm, &prototype, "includes", 1, |agent, ctx| {
        let s = this_string(agent, ctx)?;
        let needle = to_string(agent, &ctx.arg(0))?;
        Ok(Value::from(s.as_str().contains(needle.as_str())))
    });

    def_method(agent, realm, &prototype, "slice", 2, |agent, ctx| {
        let s = this_string(agent, ctx)?;
        let units: Vec<u16> = s.as_str().encode_utf16().collect();
        let len = units.len() as i64;
        let start = clamp_index(agent, &ctx.arg(0), 0, len)?;
        let end = clamp_index(agent, &ctx.arg(1), len, len)?;
        if start >= end {
            return Ok(Value::from(""));
        }
        Ok(Value::from(String::from_utf16_lossy(
            &units[start as usize..end as usize],
        )))
    });

    def_method(agent, realm, &prototype, "split", 1, |agent, ctx| {
        let s = this_string(agent, ctx)?;
        let realm = agent.current_realm();
        let parts: Vec<Value> = match ctx.arg(0) {
            Value::Undefined => vec![Value::String(s)],
            separator => {
                let separator = to_string(agent, &separator)?;
                if separator.is_empty() {
                    s.as_str()
                        .chars()
                        .map(|c| Value::from(JsString::from(c)))
                        .collect()
                } else {
                    s.as_str()
                        .split(separator.as_str())
                        .map(Value::from)
                        .collect()
                }
            }
        };
        Ok(Value::Object(create_array(agent, &realm, parts)))
    });

    def_method(agent, realm, &prototype, "toUpperCase", 0, |agent, ctx| {
        let s = this_string(agent, ctx)?;
        Ok(Value::from(s.as_str().to_uppercase()))
    });

    def_method(agent, realm, &prototype, "toLowerCase", 0, |agent, ctx| {
        let s = this_string(agent, ctx)?;
        Ok(Value::from(s.as_str().to_lowercase()))
    });

    def_method(agent, realm, &prototype, "normalize", 0, |agent, ctx| {
        let s = this_string(agent, ctx)?;
        let form = match ctx.arg(0) {
            Value::Undefined => "NFC".to_string(),
            other => to_string(agent, &other)?.as_str().to_string(),
        };
        let normalized: String = match form.as_str() {
            "NFC" => s.as_str().nfc().collect(),
            "NFD" => s.as_str().nfd().collect(),
            "NFKC" => s.as_str().nfkc().collect(),
            "NFKD" => s.as_str().nfkd().collect(),
            _ => {
                return Err(agent.range_error(
                    "The normalization form should be one of NFC, NFD, NFKC, NFKD",
                ));
            }
        };
        Ok(Value::from(normalized))
    });

    def_method(agent, realm, &prototype, "toString", 0, |agent, ctx| {
        Ok(Value::String(this_string(agent, ctx)?))
    });
    def_method(agent, realm, &prototype, "valueOf", 0, |agent, ctx| {
        Ok(Value::String(this_string(agent, ctx)?))
    });

    let ctor = create_native_function(agent, realm, "String", 1, true, |agent, ctx| {
        let s = match ctx.args.first() {
            None => JsString::from(""),
            Some(v) => to_string(agent, v)?,
        };
        if ctx.new_target.is_object() {
            return Ok(Value::Object(super::box_primitive(
                agent,
                &Value::String(s),
            )));
        }
        Ok(Value::String(s))
    });

    install_constructor(agent, realm, "String", ctor, &prototype);
}

fn clamp_index(
    agent: &mut Agent,
    value: &Value,
    default: i64,
    len: i64,
) -> Result<i64, crate::error::EngineError> {
    let raw = match value {
        Value::Undefined => return Ok(default),
        other => to_number(agent, other)?,
    };
    let raw = if raw.is_nan() { 0.0 } else { raw };
    let idx = raw as i64;
    Ok(if idx < 0 {
        (len + idx).max(0)
    } else {
        idx.min(len)
    })
}
