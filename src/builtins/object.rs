//! The Object constructor and %Object.prototype%

use std::rc::Rc;

use crate::agent::Agent;
use crate::object::{self, IntegrityLevel, JsObjectRef};
use crate::realm::Realm;
use crate::value::{to_property_key, Value};

use super::{create_native_function, def_method, install_constructor, this_object};

pub fn install(agent: &mut Agent, realm: &Rc<Realm>) {
    let prototype = realm.intrinsics().object_prototype.clone();

    def_method(agent, realm, &prototype, "hasOwnProperty", 1, |agent, ctx| {
        let obj = this_object(agent, ctx)?;
        let key = to_property_key(agent, &ctx.arg(0))?;
        let has = obj.borrow().has_own_property(&key);
        Ok(Value::from(has))
    });
    def_method(agent, realm, &prototype, "isPrototypeOf", 1, |_, ctx| {
        let Value::Object(target) = ctx.arg(0) else {
            return Ok(Value::Boolean(false));
        };
        let Value::Object(this) = &ctx.receiver else {
            return Ok(Value::Boolean(false));
        };
        let mut walk = target.borrow().get_prototype_of();
        while let Some(p) = walk {
            if Rc::ptr_eq(&p, this) {
                return Ok(Value::Boolean(true));
            }
            walk = p.borrow().get_prototype_of();
        }
        Ok(Value::Boolean(false))
    });
    def_method(agent, realm, &prototype, "toString", 0, |_, ctx| {
        Ok(match &ctx.receiver {
            Value::Null => Value::from("[object Null]"),
            Value::Undefined => Value::from("[object Undefined]"),
            Value::Object(obj) if obj.borrow().is_array() => Value::from("[object Array]"),
            Value::Object(obj) if obj.borrow().is_callable() => Value::from("[object Function]"),
            _ => Value::from("[object Object]"),
        })
    });
    def_method(agent, realm, &prototype, "valueOf", 0, |agent, ctx| {
        Ok(Value::Object(this_object(agent, ctx)?))
    });

    let ctor = create_native_function(agent, realm, "Object", 1, true, |agent, ctx| {
        match ctx.arg(0) {
            Value::Undefined | Value::Null => Ok(Value::Object(agent.create_object())),
            other => Ok(Value::Object(crate::value::to_object(agent, &other)?)),
        }
    });

    def_method(agent, realm, &ctor, "create", 2, |agent, ctx| {
        let proto = match ctx.arg(0) {
            Value::Object(obj) => Some(obj),
            Value::Null => None,
            _ => {
                return Err(agent.type_error("Object prototype may only be an Object or null"));
            }
        };
        let obj = agent.create_object_with_proto(proto);
        if let Value::Object(props) = ctx.arg(1) {
            define_properties(agent, &obj, &props)?;
        }
        Ok(Value::Object(obj))
    });
    def_method(agent, realm, &ctor, "keys", 1, |agent, ctx| {
        let obj = this_or_arg_object(agent, &ctx.arg(0))?;
        let keys: Vec<Value> = obj
            .borrow()
            .own_enumerable_string_keys()
            .iter()
            .map(|k| k.to_value())
            .collect();
        let realm = agent.current_realm();
        Ok(Value::Object(super::create_array(agent, &realm, keys)))
    });
    def_method(agent, realm, &ctor, "values", 1, |agent, ctx| {
        let obj = this_or_arg_object(agent, &ctx.arg(0))?;
        let keys = obj.borrow().own_enumerable_string_keys();
        let mut values = Vec::with_capacity(keys.len());
        for key in &keys {
            values.push(object::get(agent, &obj, key)?);
        }
        let realm = agent.current_realm();
        Ok(Value::Object(super::create_array(agent, &realm, values)))
    });
    def_method(agent, realm, &ctor, "entries", 1, |agent, ctx| {
        let obj = this_or_arg_object(agent, &ctx.arg(0))?;
        let keys = obj.borrow().own_enumerable_string_keys();
        let realm = agent.current_realm();
        let mut entries = Vec::with_capacity(keys.len());
        for key in &keys {
            let value = object::get(agent, &obj, key)?;
            let pair = super::create_array(agent, &realm, vec![key.to_value(), value]);
            entries.push(Value::Object(pair));
        }
        Ok(Value::Object(super::create_array(agent, &realm, entries)))
    });
    def_method(agent, realm, &ctor, "fromEntries", 1, |agent, ctx| {
        let Value::Object(pairs) = ctx.arg(0) else {
            return Err(agent.type_error("Object.fromEntries requires an array-like"));
        };
        let result = agent.create_object();
        let size = pairs.borrow().array_like_size();
        for i in 0..size {
            let entry = super::array_get(agent, &pairs, i)?;
            let Value::Object(entry) = entry else {
                return Err(agent.type_error("Iterator entry is not an object"));
            };
            let key = super::array_get(agent, &entry, 0)?;
            let value = super::array_get(agent, &entry, 1)?;
            let key = to_property_key(agent, &key)?;
            object::create_data_property(&result, &key, value);
        }
        Ok(Value::Object(result))
    });
    def_method(agent, realm, &ctor, "freeze", 1, |_, ctx| {
        if let Value::Object(obj) = ctx.arg(0) {
            obj.borrow_mut().set_integrity_level(IntegrityLevel::Frozen);
            return Ok(Value::Object(obj));
        }
        Ok(ctx.arg(0))
    });
    def_method(agent, realm, &ctor, "seal", 1, |_, ctx| {
        if let Value::Object(obj) = ctx.arg(0) {
            obj.borrow_mut().set_integrity_level(IntegrityLevel::Sealed);
            return Ok(Value::Object(obj));
        }
        Ok(ctx.arg(0))
    });
    def_method(agent, realm, &ctor, "isFrozen", 1, |_, ctx| {
        Ok(Value::from(match ctx.arg(0) {
            Value::Object(obj) => obj.borrow().test_integrity_level(IntegrityLevel::Frozen),
            _ => true,
        }))
    });
    def_method(agent, realm, &ctor, "isSealed", 1, |_, ctx| {
        Ok(Value::from(match ctx.arg(0) {
            Value::Object(obj) => obj.borrow().test_integrity_level(IntegrityLevel::Sealed),
            _ => true,
        }))
    });
    def_method(agent, realm, &ctor, "preventExtensions", 1, |_, ctx| {
        if let Value::Object(obj) = ctx.arg(0) {
            obj.borrow_mut().prevent_extensions();
            return Ok(Value::Object(obj));
        }
        Ok(ctx.arg(0))
    });
    def_method(agent, realm, &ctor, "isExtensible", 1, |_, ctx| {
        Ok(Value::from(match ctx.arg(0) {
            Value::Object(obj) => obj.borrow().is_extensible(),
            _ => false,
        }))
    });
    def_method(agent, realm, &ctor, "getPrototypeOf", 1, |agent, ctx| {
        let obj = this_or_arg_object(agent, &ctx.arg(0))?;
        let proto = obj.borrow().get_prototype_of();
        Ok(match proto {
            Some(proto) => Value::Object(proto),
            None => Value::Null,
        })
    });
    def_method(agent, realm, &ctor, "setPrototypeOf", 2, |agent, ctx| {
        let Value::Object(obj) = ctx.arg(0) else {
            return Ok(ctx.arg(0));
        };
        let proto = match ctx.arg(1) {
            Value::Object(p) => Some(p),
            Value::Null => None,
            _ => {
                return Err(agent.type_error("Object prototype may only be an Object or null"));
            }
        };
        if !object::set_prototype_of(&obj, proto) {
            return Err(agent.type_error("Cannot set prototype of this object"));
        }
        Ok(Value::Object(obj))
    });
    def_method(agent, realm, &ctor, "defineProperty", 3, |agent, ctx| {
        let Value::Object(obj) = ctx.arg(0) else {
            return Err(agent.type_error("Object.defineProperty called on non-object"));
        };
        let key = to_property_key(agent, &ctx.arg(1))?;
        let desc = object::to_property_descriptor(agent, &ctx.arg(2))?;
        if !obj.borrow_mut().define_own_property(&key, &desc) {
            return Err(agent.type_error(format!("Cannot redefine property: {}", key)));
        }
        Ok(Value::Object(obj))
    });
    def_method(agent, realm, &ctor, "getOwnPropertyDescriptor", 2, |agent, ctx| {
        let Value::Object(obj) = ctx.arg(0) else {
            return Ok(Value::Undefined);
        };
        let key = to_property_key(agent, &ctx.arg(1))?;
        let desc = obj.borrow().get_own_property(&key);
        Ok(match desc {
            Some(desc) => Value::Object(object::from_property_descriptor(agent, &desc)),
            None => Value::Undefined,
        })
    });
    def_method(agent, realm, &ctor, "assign", 2, |agent, ctx| {
        let Value::Object(target) = ctx.arg(0) else {
            return Err(agent.type_error("Cannot convert undefined or null to object"));
        };
        for source in ctx.args.iter().skip(1) {
            crate::interpreter::copy_data_properties(agent, &target, source, &[])?;
        }
        Ok(Value::Object(target))
    });

    install_constructor(agent, realm, "Object", ctor, &prototype);
}

fn this_or_arg_object(agent: &mut Agent, value: &Value) -> Result<JsObjectRef, crate::error::EngineError> {
    match value {
        Value::Object(obj) => Ok(obj.clone()),
        other => crate::value::to_object(agent, other),
    }
}

/// The second argument of `Object.create`: descriptor-map application.
fn define_properties(
    agent: &mut Agent,
    target: &JsObjectRef,
    props: &JsObjectRef,
) -> Result<(), crate::error::EngineError> {
    let keys = props.borrow().own_enumerable_string_keys();
    for key in keys {
        let desc_value = object::get(agent, props, &key)?;
        let desc = object::to_property_descriptor(agent, &desc_value)?;
        if !target.borrow_mut().define_own_property(&key, &desc) {
            return Err(agent.type_error(format!("Cannot define property {}", key)));
        }
    }
    Ok(())
}
