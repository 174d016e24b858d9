//! Built-in objects
//!
//! The minimal standard-library surface, bound declaratively at realm
//! construction: each submodule installs one constructor/prototype pair
//! from `(name, arity, fn)` tables. Construction order is topological —
//! `%Object.prototype%` first, then `%Function.prototype%`, then
//! everything that hangs off them.

mod array;
mod error;
mod function;
mod global;
mod iterator;
mod json;
mod math;
mod number;
mod object;
mod promise;
mod string;
mod symbol;

pub use error::ErrorKind;
pub use json::{json_to_value, value_to_json};
pub use promise::enqueue_promise_reaction;

use std::rc::Rc;

use crate::agent::Agent;
use crate::error::EngineError;
use crate::object::{
    ExoticObject, JsFunction, JsObjectRef, NativeCallContext, NativeFunction, PartialDescriptor,
    PropertyKey,
};
use crate::realm::{Intrinsics, Realm};
use crate::value::{CheapClone, JsString, Value};

/// Build a realm's intrinsics and global, in dependency order.
pub fn install(agent: &mut Agent, realm: &Rc<Realm>) {
    let object_prototype = agent.create_object_with_proto(None);

    // %Function.prototype% is itself callable and returns undefined.
    let function_prototype = agent.create_object_with_proto(Some(object_prototype.clone()));
    function_prototype.borrow_mut().exotic = ExoticObject::Function(JsFunction::Native(
        NativeFunction {
            name: JsString::from(""),
            arity: 0,
            func: Rc::new(|_, _| Ok(Value::Undefined)),
            is_constructor: false,
            realm: realm.clone(),
        },
    ));

    let error_prototype = agent.create_object_with_proto(Some(object_prototype.clone()));
    let type_error_prototype = agent.create_object_with_proto(Some(error_prototype.clone()));
    let reference_error_prototype = agent.create_object_with_proto(Some(error_prototype.clone()));
    let range_error_prototype = agent.create_object_with_proto(Some(error_prototype.clone()));
    let syntax_error_prototype = agent.create_object_with_proto(Some(error_prototype.clone()));
    let uri_error_prototype = agent.create_object_with_proto(Some(error_prototype.clone()));
    let eval_error_prototype = agent.create_object_with_proto(Some(error_prototype.clone()));

    let iterator_prototype = agent.create_object_with_proto(Some(object_prototype.clone()));
    let array_iterator_prototype = agent.create_object_with_proto(Some(iterator_prototype.clone()));
    let generator_prototype = agent.create_object_with_proto(Some(iterator_prototype.clone()));

    let intrinsics = Intrinsics {
        object_prototype: object_prototype.clone(),
        function_prototype: function_prototype.clone(),
        array_prototype: agent.create_object_with_proto(Some(object_prototype.clone())),
        string_prototype: agent.create_object_with_proto(Some(object_prototype.clone())),
        number_prototype: agent.create_object_with_proto(Some(object_prototype.clone())),
        boolean_prototype: agent.create_object_with_proto(Some(object_prototype.clone())),
        bigint_prototype: agent.create_object_with_proto(Some(object_prototype.clone())),
        symbol_prototype: agent.create_object_with_proto(Some(object_prototype.clone())),
        error_prototype,
        type_error_prototype,
        reference_error_prototype,
        range_error_prototype,
        syntax_error_prototype,
        uri_error_prototype,
        eval_error_prototype,
        iterator_prototype,
        array_iterator_prototype,
        generator_prototype,
        promise_prototype: agent.create_object_with_proto(Some(object_prototype.clone())),
    };

    let global_object = agent.create_object_with_proto(Some(object_prototype));
    let global_env = agent.envs.alloc_global(global_object.clone());
    realm.init(intrinsics, global_object, global_env);

    object::install(agent, realm);
    function::install(agent, realm);
    iterator::install(agent, realm);
    array::install(agent, realm);
    error::install(agent, realm);
    symbol::install(agent, realm);
    string::install(agent, realm);
    number::install(agent, realm);
    math::install(agent, realm);
    json::install(agent, realm);
    promise::install(agent, realm);
    global::install(agent, realm);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Shared construction helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Create a native function object.
pub fn create_native_function(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    name: &str,
    arity: u32,
    is_constructor: bool,
    func: impl Fn(&mut Agent, &NativeCallContext) -> Result<Value, EngineError> + 'static,
) -> JsObjectRef {
    let proto = realm.intrinsics().function_prototype.clone();
    let obj = agent.create_object_with_proto(Some(proto));
    obj.borrow_mut().exotic = ExoticObject::Function(JsFunction::Native(NativeFunction {
        name: JsString::from(name),
        arity,
        func: Rc::new(func),
        is_constructor,
        realm: realm.clone(),
    }));
    obj.borrow_mut().define_own_property(
        &PropertyKey::from("length"),
        &PartialDescriptor::data(Value::from(arity), false, false, true),
    );
    obj.borrow_mut().define_own_property(
        &PropertyKey::from("name"),
        &PartialDescriptor::data(Value::from(name), false, false, true),
    );
    obj
}

/// Install a built-in method: writable + configurable, not enumerable.
pub fn def_method(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    target: &JsObjectRef,
    name: &str,
    arity: u32,
    func: impl Fn(&mut Agent, &NativeCallContext) -> Result<Value, EngineError> + 'static,
) {
    let f = create_native_function(agent, realm, name, arity, false, func);
    target.borrow_mut().define_own_property(
        &PropertyKey::from(name),
        &PartialDescriptor::data(Value::Object(f), true, false, true),
    );
}

/// Install a method under a symbol key.
pub fn def_symbol_method(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    target: &JsObjectRef,
    symbol: crate::value::JsSymbol,
    name: &str,
    arity: u32,
    func: impl Fn(&mut Agent, &NativeCallContext) -> Result<Value, EngineError> + 'static,
) {
    let f = create_native_function(agent, realm, name, arity, false, func);
    target.borrow_mut().define_own_property(
        &PropertyKey::Symbol(symbol),
        &PartialDescriptor::data(Value::Object(f), true, false, true),
    );
}

/// Install a plain data property with built-in attributes.
pub fn def_value(target: &JsObjectRef, name: &str, value: Value) {
    target.borrow_mut().define_own_property(
        &PropertyKey::from(name),
        &PartialDescriptor::data(value, true, false, true),
    );
}

/// Bind a constructor on the global object and wire `.prototype` /
/// `.constructor` both ways.
pub fn install_constructor(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    name: &str,
    ctor: JsObjectRef,
    prototype: &JsObjectRef,
) {
    ctor.borrow_mut().define_own_property(
        &PropertyKey::from("prototype"),
        &PartialDescriptor::data(Value::Object(prototype.clone()), false, false, false),
    );
    prototype.borrow_mut().define_own_property(
        &PropertyKey::from("constructor"),
        &PartialDescriptor::data(Value::Object(ctor.clone()), true, false, true),
    );
    let global = realm.global_object();
    def_value(&global, name, Value::Object(ctor));
    let _ = agent;
}

/// Create an array object holding the given elements.
pub fn create_array(agent: &mut Agent, realm: &Rc<Realm>, elements: Vec<Value>) -> JsObjectRef {
    let proto = realm.intrinsics().array_prototype.clone();
    let obj = agent.create_object_with_proto(Some(proto));
    obj.borrow_mut().exotic = ExoticObject::Array {
        length: 0,
        length_writable: true,
    };
    for (i, element) in elements.into_iter().enumerate() {
        obj.borrow_mut().define_own_property(
            &PropertyKey::Index(i as u32),
            &PartialDescriptor::data(element, true, true, true),
        );
    }
    obj
}

/// Box a primitive for ToObject.
pub fn box_primitive(agent: &mut Agent, value: &Value) -> JsObjectRef {
    let realm = agent.current_realm();
    let intrinsics = realm.intrinsics();
    let proto = match value {
        Value::String(_) => intrinsics.string_prototype.clone(),
        Value::Number(_) => intrinsics.number_prototype.clone(),
        Value::Boolean(_) => intrinsics.boolean_prototype.clone(),
        Value::BigInt(_) => intrinsics.bigint_prototype.clone(),
        Value::Symbol(_) => intrinsics.symbol_prototype.clone(),
        _ => intrinsics.object_prototype.clone(),
    };
    let obj = agent.create_object_with_proto(Some(proto));
    obj.borrow_mut().exotic = ExoticObject::BoxedPrimitive(value.clone());
    obj
}

/// Realm-bound error construction; `Agent::type_error` and friends route
/// here.
pub fn create_error_object(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    kind: ErrorKind,
    message: &str,
) -> JsObjectRef {
    let proto = error::prototype_for(realm, kind);
    let obj = agent.create_object_with_proto(Some(proto));
    obj.borrow_mut().define_own_property(
        &PropertyKey::from("message"),
        &PartialDescriptor::data(Value::from(message), true, false, true),
    );
    obj.borrow_mut().set_internal("ErrorData", Value::Boolean(true));
    obj
}

/// A value rendered for host output (`print`, `console.log`).
pub fn display_value(agent: &mut Agent, value: &Value) -> String {
    match value {
        Value::String(s) => s.as_str().to_string(),
        Value::Object(obj) if obj.borrow().is_array() => {
            let size = obj.borrow().array_like_size();
            let mut parts = Vec::new();
            for i in 0..size {
                let element = crate::object::get(agent, obj, &PropertyKey::Index(i))
                    .unwrap_or(Value::Undefined);
                parts.push(display_value(agent, &element));
            }
            format!("[ {} ]", parts.join(", "))
        }
        other => match crate::value::to_string(agent, other) {
            Ok(s) => s.as_str().to_string(),
            Err(_) => format!("{:?}", other),
        },
    }
}

/// Read an element off an array-like, for builtin implementations.
pub fn array_get(agent: &mut Agent, obj: &JsObjectRef, index: u32) -> Result<Value, EngineError> {
    crate::object::get(agent, obj, &PropertyKey::Index(index))
}

/// The `this` value of an array builtin, which must be an object.
pub fn this_object(agent: &mut Agent, ctx: &NativeCallContext) -> Result<JsObjectRef, EngineError> {
    match &ctx.receiver {
        Value::Object(obj) => Ok(obj.clone()),
        other => crate::value::to_object(agent, other),
    }
}

/// The string receiver of a String.prototype builtin.
pub fn this_string(agent: &mut Agent, ctx: &NativeCallContext) -> Result<JsString, EngineError> {
    match &ctx.receiver {
        Value::String(s) => Ok(s.cheap_clone()),
        Value::Object(obj) => {
            let boxed = match &obj.borrow().exotic {
                ExoticObject::BoxedPrimitive(Value::String(s)) => Some(s.cheap_clone()),
                _ => None,
            };
            match boxed {
                Some(s) => Ok(s),
                None => crate::value::to_string(agent, &ctx.receiver),
            }
        }
        other => crate::value::to_string(agent, other),
    }
}
