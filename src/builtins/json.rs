//! The JSON namespace, backed by serde_json

use std::rc::Rc;

use crate::agent::Agent;
use crate::error::EngineError;
use crate::object::{JsObjectRef, PropertyKey};
use crate::realm::Realm;
use crate::value::{to_string, JsString, Value};

use super::{create_array, def_method, def_value};

pub fn install(agent: &mut Agent, realm: &Rc<Realm>) {
    let json = agent.create_object_with_proto(Some(realm.intrinsics().object_prototype.clone()));

    def_method(agent, realm, &json, "parse", 1, |agent, ctx| {
        let text = to_string(agent, &ctx.arg(0))?;
        let parsed: serde_json::Value = serde_json::from_str(text.as_str())
            .map_err(|e| agent.syntax_error(format!("Unexpected token in JSON: {}", e)))?;
        json_to_value(agent, &parsed)
    });

    def_method(agent, realm, &json, "stringify", 1, |agent, ctx| {
        match value_to_json(agent, &ctx.arg(0), 0)? {
            Some(json) => Ok(Value::from(json.to_string())),
            None => Ok(Value::Undefined),
        }
    });

    def_value(&realm.global_object(), "JSON", Value::Object(json));
}

/// serde_json tree → JS values.
pub fn json_to_value(agent: &mut Agent, json: &serde_json::Value) -> Result<Value, EngineError> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(items) => {
            let mut elements = Vec::with_capacity(items.len());
            for item in items {
                elements.push(json_to_value(agent, item)?);
            }
            let realm = agent.current_realm();
            Value::Object(create_array(agent, &realm, elements))
        }
        serde_json::Value::Object(map) => {
            let obj = agent.create_object();
            for (key, item) in map {
                let value = json_to_value(agent, item)?;
                crate::object::create_data_property(
                    &obj,
                    &PropertyKey::from(JsString::from(key.as_str())),
                    value,
                );
            }
            Value::Object(obj)
        }
    })
}

const MAX_STRINGIFY_DEPTH: usize = 64;

/// JS value → serde_json tree. `None` for values JSON drops (functions,
/// undefined, symbols).
pub fn value_to_json(
    agent: &mut Agent,
    value: &Value,
    depth: usize,
) -> Result<Option<serde_json::Value>, EngineError> {
    if depth > MAX_STRINGIFY_DEPTH {
        return Err(agent.type_error("Converting circular structure to JSON"));
    }
    Ok(match value {
        Value::Null => Some(serde_json::Value::Null),
        Value::Boolean(b) => Some(serde_json::Value::Bool(*b)),
        Value::Number(n) => {
            if n.is_finite() {
                serde_json::Number::from_f64(*n).map(serde_json::Value::Number)
            } else {
                Some(serde_json::Value::Null)
            }
        }
        Value::String(s) => Some(serde_json::Value::String(s.as_str().to_string())),
        Value::BigInt(_) => {
            return Err(agent.type_error("Do not know how to serialize a BigInt"));
        }
        Value::Undefined | Value::Empty | Value::Symbol(_) => None,
        Value::Object(obj) => {
            if obj.borrow().is_callable() {
                return Ok(None);
            }
            if obj.borrow().is_array() {
                Some(array_to_json(agent, obj, depth)?)
            } else {
                Some(object_to_json(agent, obj, depth)?)
            }
        }
    })
}

fn array_to_json(
    agent: &mut Agent,
    obj: &JsObjectRef,
    depth: usize,
) -> Result<serde_json::Value, EngineError> {
    let size = obj.borrow().array_like_size();
    let mut items = Vec::with_capacity(size as usize);
    for i in 0..size {
        let element = super::array_get(agent, obj, i)?;
        items.push(value_to_json(agent, &element, depth + 1)?.unwrap_or(serde_json::Value::Null));
    }
    Ok(serde_json::Value::Array(items))
}

fn object_to_json(
    agent: &mut Agent,
    obj: &JsObjectRef,
    depth: usize,
) -> Result<serde_json::Value, EngineError> {
    let mut map = serde_json::Map::new();
    let keys = obj.borrow().own_enumerable_string_keys();
    for key in keys {
        let value = crate::object::get(agent, obj, &key)?;
        if let Some(json) = value_to_json(agent, &value, depth + 1)? {
            map.insert(key.to_string(), json);
        }
    }
    Ok(serde_json::Value::Object(map))
}
