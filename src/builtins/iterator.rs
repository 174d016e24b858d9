//! Iterator plumbing: %IteratorPrototype%, %ArrayIteratorPrototype%, and
//! %GeneratorPrototype% (next/return/throw).

use std::rc::Rc;

use crate::agent::Agent;
use crate::object::{ExoticObject, PropertyKey, GENERATOR_DONE};
use crate::realm::Realm;
use crate::value::Value;

use super::{def_method, def_symbol_method, this_object};

pub fn install(agent: &mut Agent, realm: &Rc<Realm>) {
    let iterator_prototype = realm.intrinsics().iterator_prototype.clone();
    let iterator_symbol = realm.well_known.iterator.clone();

    // Iterators are themselves iterable.
    def_symbol_method(
        agent,
        realm,
        &iterator_prototype,
        iterator_symbol.clone(),
        "[Symbol.iterator]",
        0,
        |_, ctx| Ok(ctx.receiver.clone()),
    );

    // %ArrayIteratorPrototype%.next over [[Target]] / [[Index]] slots.
    let array_iterator_prototype = realm.intrinsics().array_iterator_prototype.clone();
    def_method(agent, realm, &array_iterator_prototype, "next", 0, |agent, ctx| {
        let this = this_object(agent, ctx)?;
        let (target, index) = {
            let b = this.borrow();
            (b.internal("Target"), b.internal("Index"))
        };
        let (Some(Value::Object(target)), Some(index)) = (target, index) else {
            return Err(agent.type_error("next called on a non-iterator"));
        };
        let idx = index.as_number().unwrap_or(0.0) as u32;
        let size = target.borrow().array_like_size();
        let result = agent.create_object();
        if idx < size {
            this.borrow_mut().set_internal("Index", Value::from(idx + 1));
            let value = super::array_get(agent, &target, idx)?;
            crate::object::create_data_property(&result, &PropertyKey::from("value"), value);
            crate::object::create_data_property(
                &result,
                &PropertyKey::from("done"),
                Value::Boolean(false),
            );
        } else {
            crate::object::create_data_property(
                &result,
                &PropertyKey::from("value"),
                Value::Undefined,
            );
            crate::object::create_data_property(
                &result,
                &PropertyKey::from("done"),
                Value::Boolean(true),
            );
        }
        Ok(Value::Object(result))
    });

    // %GeneratorPrototype%.
    let generator_prototype = realm.intrinsics().generator_prototype.clone();
    def_method(agent, realm, &generator_prototype, "next", 1, |agent, ctx| {
        let this = this_object(agent, ctx)?;
        let (value, done) = crate::interpreter::resume_generator(agent, &this, ctx.arg(0))?;
        make_iter_result(agent, value, done)
    });
    def_method(agent, realm, &generator_prototype, "return", 1, |agent, ctx| {
        let this = this_object(agent, ctx)?;
        if let ExoticObject::Generator(state) = &this.borrow().exotic {
            state.borrow_mut().phase = GENERATOR_DONE;
        }
        make_iter_result(agent, ctx.arg(0), true)
    });
    def_method(agent, realm, &generator_prototype, "throw", 1, |agent, ctx| {
        let this = this_object(agent, ctx)?;
        if let ExoticObject::Generator(state) = &this.borrow().exotic {
            state.borrow_mut().phase = GENERATOR_DONE;
        }
        Err(crate::error::EngineError::Throw(ctx.arg(0)))
    });
}

/// Create an `{ value, done }` result object.
pub fn make_iter_result(agent: &mut Agent, value: Value, done: bool) -> Result<Value, crate::error::EngineError> {
    let result = agent.create_object();
    crate::object::create_data_property(&result, &PropertyKey::from("value"), value);
    crate::object::create_data_property(&result, &PropertyKey::from("done"), Value::from(done));
    Ok(Value::Object(result))
}

/// Create an array iterator for `arr[Symbol.iterator]()`.
pub fn create_array_iterator(agent: &mut Agent, target: Value) -> Value {
    let realm = agent.current_realm();
    let proto = realm.intrinsics().array_iterator_prototype.clone();
    let obj = agent.create_object_with_proto(Some(proto));
    obj.borrow_mut().set_internal("Target", target);
    obj.borrow_mut().set_internal("Index", Value::Number(0.0));
    Value::Object(obj)
}
