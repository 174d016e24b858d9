//! Embedder helpers for working with JavaScript values from Rust
//!
//! Thin wrappers over the object internal methods and the interpreter's
//! call path, plus serde_json conversions for moving structured data in
//! and out of the engine.

use crate::agent::Agent;
use crate::error::EngineError;
use crate::object::{JsObjectRef, PropertyKey};
use crate::value::Value;

/// Read a property off a value (prototype chain included).
pub fn get_property(agent: &mut Agent, value: &Value, key: &str) -> Result<Value, EngineError> {
    crate::interpreter::get_value_property(agent, value, &PropertyKey::from(key))
}

/// Write a property on an object value.
pub fn set_property(
    agent: &mut Agent,
    value: &Value,
    key: &str,
    property: Value,
) -> Result<bool, EngineError> {
    let Value::Object(obj) = value else {
        return Err(agent.type_error("Cannot set property of non-object"));
    };
    crate::object::set(agent, obj, &PropertyKey::from(key), property)
}

/// Read an array element.
pub fn get_index(agent: &mut Agent, value: &Value, index: u32) -> Result<Value, EngineError> {
    crate::interpreter::get_value_property(agent, value, &PropertyKey::Index(index))
}

/// All elements of an array-like.
pub fn get_elements(agent: &mut Agent, value: &Value) -> Result<Vec<Value>, EngineError> {
    let Value::Object(obj) = value else {
        return Err(agent.type_error("Cannot read elements of non-object"));
    };
    let size = obj.borrow().array_like_size();
    let mut out = Vec::with_capacity(size as usize);
    for i in 0..size {
        out.push(crate::object::get(agent, obj, &PropertyKey::Index(i))?);
    }
    Ok(out)
}

/// Call a function value.
pub fn call(
    agent: &mut Agent,
    callee: &Value,
    receiver: Value,
    args: &[Value],
) -> Result<Value, EngineError> {
    crate::interpreter::call_value(agent, callee, receiver, args)
}

/// Call a method by name.
pub fn call_method(
    agent: &mut Agent,
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Result<Value, EngineError> {
    let method = get_property(agent, receiver, name)?;
    crate::interpreter::call_value(agent, &method, receiver.clone(), args)
}

/// Build a JS value from a serde_json tree.
pub fn from_json(agent: &mut Agent, json: &serde_json::Value) -> Result<Value, EngineError> {
    crate::builtins::json_to_value(agent, json)
}

/// Convert a JS value into a serde_json tree. Functions, symbols, and
/// undefined come back as `None`, matching `JSON.stringify`.
pub fn to_json(
    agent: &mut Agent,
    value: &Value,
) -> Result<Option<serde_json::Value>, EngineError> {
    crate::builtins::value_to_json(agent, value, 0)
}

/// Create an empty object in the agent's current realm.
pub fn create_object(agent: &mut Agent) -> JsObjectRef {
    agent.create_object()
}
