//! The Array constructor and %Array.prototype%

use std::rc::Rc;

use crate::agent::Agent;
use crate::object::{PartialDescriptor, PropertyKey};
use crate::realm::Realm;
use crate::value::{to_number, to_string, Value};

use super::{
    array_get, create_array, create_native_function, def_method, def_symbol_method,
    install_constructor, this_object,
};

pub fn install(agent: &mut Agent, realm: &Rc<Realm>) {
    let prototype = realm.intrinsics().array_prototype.clone();
    let iterator_symbol = realm.well_known.iterator.clone();

    def_symbol_method(
        agent,
        realm,
        &prototype,
        iterator_symbol,
        "[Symbol.iterator]",
        0,
        |agent, ctx| Ok(super::iterator::create_array_iterator(agent, ctx.receiver.clone())),
    );

    def_method(agent, realm, &prototype, "push", 1, |agent, ctx| {
        let this = this_object(agent, ctx)?;
        for arg in &ctx.args {
            let index = this.borrow().array_like_size();
            this.borrow_mut().define_own_property(
                &PropertyKey::Index(index),
                &PartialDescriptor::data(arg.clone(), true, true, true),
            );
        }
        let size = this.borrow().array_like_size();
        Ok(Value::from(size))
    });

    def_method(agent, realm, &prototype, "pop", 0, |agent, ctx| {
        let this = this_object(agent, ctx)?;
        let size = this.borrow().array_like_size();
        if size == 0 {
            return Ok(Value::Undefined);
        }
        let value = array_get(agent, &this, size - 1)?;
        this.borrow_mut().delete(&PropertyKey::Index(size - 1));
        this.borrow_mut().define_own_property(
            &PropertyKey::from("length"),
            &PartialDescriptor::value_only(Value::from(size - 1)),
        );
        Ok(value)
    });

    def_method(agent, realm, &prototype, "join", 1, |agent, ctx| {
        let this = this_object(agent, ctx)?;
        let separator = match ctx.arg(0) {
            Value::Undefined => ",".to_string(),
            other => to_string(agent, &other)?.as_str().to_string(),
        };
        let size = this.borrow().array_like_size();
        let mut parts = Vec::with_capacity(size as usize);
        for i in 0..size {
            let element = array_get(agent, &this, i)?;
            if element.is_nullish() {
                parts.push(String::new());
            } else {
                parts.push(to_string(agent, &element)?.as_str().to_string());
            }
        }
        Ok(Value::from(parts.join(&separator)))
    });

    def_method(agent, realm, &prototype, "map", 1, |agent, ctx| {
        let this = this_object(agent, ctx)?;
        let callback = ctx.arg(0);
        if !callback.is_callable() {
            return Err(agent.type_error("Array.prototype.map requires a callable argument"));
        }
        let size = this.borrow().array_like_size();
        let mut out = Vec::with_capacity(size as usize);
        for i in 0..size {
            let element = array_get(agent, &this, i)?;
            let mapped = crate::interpreter::call_value(
                agent,
                &callback,
                ctx.arg(1),
                &[element, Value::from(i), ctx.receiver.clone()],
            )?;
            out.push(mapped);
        }
        let realm = agent.current_realm();
        Ok(Value::Object(create_array(agent, &realm, out)))
    });

    def_method(agent, realm, &prototype, "filter", 1, |agent, ctx| {
        let this = this_object(agent, ctx)?;
        let callback = ctx.arg(0);
        if !callback.is_callable() {
            return Err(agent.type_error("Array.prototype.filter requires a callable argument"));
        }
        let size = this.borrow().array_like_size();
        let mut out = Vec::new();
        for i in 0..size {
            let element = array_get(agent, &this, i)?;
            let keep = crate::interpreter::call_value(
                agent,
                &callback,
                ctx.arg(1),
                &[element.clone(), Value::from(i), ctx.receiver.clone()],
            )?;
            if keep.to_boolean() {
                out.push(element);
            }
        }
        let realm = agent.current_realm();
        Ok(Value::Object(create_array(agent, &realm, out)))
    });

    def_method(agent, realm, &prototype, "forEach", 1, |agent, ctx| {
        let this = this_object(agent, ctx)?;
        let callback = ctx.arg(0);
        if !callback.is_callable() {
            return Err(agent.type_error("Array.prototype.forEach requires a callable argument"));
        }
        let size = this.borrow().array_like_size();
        for i in 0..size {
            let element = array_get(agent, &this, i)?;
            crate::interpreter::call_value(
                agent,
                &callback,
                ctx.arg(1),
                &[element, Value::from(i), ctx.receiver.clone()],
            )?;
        }
        Ok(Value::Undefined)
    });

    def_method(agent, realm, &prototype, "slice", 2, |agent, ctx| {
        let this = this_object(agent, ctx)?;
        let size = this.borrow().array_like_size() as i64;
        let start = relative_index(agent, &ctx.arg(0), 0, size)?;
        let end = relative_index(agent, &ctx.arg(1), size, size)?;
        let mut out = Vec::new();
        let mut i = start;
        while i < end {
            out.push(array_get(agent, &this, i as u32)?);
            i += 1;
        }
        let realm = agent.current_realm();
        Ok(Value::Object(create_array(agent, &realm, out)))
    });

    def_method(agent, realm, &prototype, "indexOf", 1, |agent, ctx| {
        let this = this_object(agent, ctx)?;
        let needle = ctx.arg(0);
        let size = this.borrow().array_like_size();
        for i in 0..size {
            let element = array_get(agent, &this, i)?;
            if element.is_strictly_equal(&needle) {
                return Ok(Value::from(i));
            }
        }
        Ok(Value::Number(-1.0))
    });

    def_method(agent, realm, &prototype, "includes", 1, |agent, ctx| {
        let this = this_object(agent, ctx)?;
        let needle = ctx.arg(0);
        let size = this.borrow().array_like_size();
        for i in 0..size {
            let element = array_get(agent, &this, i)?;
            if element.same_value_zero(&needle) {
                return Ok(Value::Boolean(true));
            }
        }
        Ok(Value::Boolean(false))
    });

    def_method(agent, realm, &prototype, "toString", 0, |agent, ctx| {
        let this = this_object(agent, ctx)?;
        let join = crate::object::get(agent, &this, &PropertyKey::from("join"))?;
        if join.is_callable() {
            return crate::interpreter::call_value(agent, &join, ctx.receiver.clone(), &[]);
        }
        Ok(Value::from("[object Array]"))
    });

    let ctor = create_native_function(agent, realm, "Array", 1, true, |agent, ctx| {
        let realm = agent.current_realm();
        // One numeric argument sets the length, anything else seeds elements.
        if ctx.args.len() == 1 {
            if let Value::Number(n) = ctx.arg(0) {
                let len = n as u32;
                if len as f64 != n {
                    return Err(agent.range_error("Invalid array length"));
                }
                let array = create_array(agent, &realm, Vec::new());
                array.borrow_mut().define_own_property(
                    &PropertyKey::from("length"),
                    &PartialDescriptor::value_only(Value::from(len)),
                );
                return Ok(Value::Object(array));
            }
        }
        Ok(Value::Object(create_array(agent, &realm, ctx.args.clone())))
    });

    def_method(agent, realm, &ctor, "isArray", 1, |_, ctx| {
        Ok(Value::from(match ctx.arg(0) {
            Value::Object(obj) => obj.borrow().is_array(),
            _ => false,
        }))
    });
    def_method(agent, realm, &ctor, "of", 0, |agent, ctx| {
        let realm = agent.current_realm();
        Ok(Value::Object(create_array(agent, &realm, ctx.args.clone())))
    });

    install_constructor(agent, realm, "Array", ctor, &prototype);
}

/// Normalized relative index for slice-style arguments.
fn relative_index(
    agent: &mut Agent,
    value: &Value,
    default: i64,
    size: i64,
) -> Result<i64, crate::error::EngineError> {
    let raw = match value {
        Value::Undefined => return Ok(default),
        other => to_number(agent, other)?,
    };
    let raw = if raw.is_nan() { 0.0 } else { raw };
    let idx = raw as i64;
    Ok(if idx < 0 {
        (size + idx).max(0)
    } else {
        idx.min(size)
    })
}
