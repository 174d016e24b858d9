//! Promise, backed by the agent's microtask queue
//!
//! Enough of the promise machinery for `then`/`catch` chains: reactions
//! are recorded on the promise state and run as microtask jobs at the
//! next call-stack-empty checkpoint.

use std::cell::RefCell;
use std::rc::Rc;

use crate::agent::{Agent, Job};
use crate::object::{
    ExoticObject, JsObjectRef, PromiseReaction, PromiseState, PromiseStatus,
};
use crate::realm::Realm;
use crate::value::Value;

use super::{create_native_function, def_method, install_constructor};

pub fn install(agent: &mut Agent, realm: &Rc<Realm>) {
    let prototype = realm.intrinsics().promise_prototype.clone();

    def_method(agent, realm, &prototype, "then", 2, |agent, ctx| {
        let Value::Object(this) = &ctx.receiver else {
            return Err(agent.type_error("Promise.prototype.then requires a promise"));
        };
        let state = promise_state(agent, this)?;
        let realm = agent.current_realm();
        let derived = create_promise(agent, &realm);
        let reaction = PromiseReaction {
            on_fulfilled: callable_or_none(ctx.arg(0)),
            on_rejected: callable_or_none(ctx.arg(1)),
            derived: derived.clone(),
        };
        let snapshot = {
            let s = state.borrow();
            (s.status, s.result.clone())
        };
        match snapshot {
            (PromiseStatus::Pending, _) => {
                state.borrow_mut().reactions.push(reaction);
            }
            (status, result) => {
                enqueue_promise_reaction(agent, &realm, reaction, status, result);
            }
        }
        Ok(Value::Object(derived))
    });

    def_method(agent, realm, &prototype, "catch", 1, |agent, ctx| {
        let then = crate::interpreter::get_value_property(
            agent,
            &ctx.receiver,
            &crate::object::PropertyKey::from("then"),
        )?;
        crate::interpreter::call_value(
            agent,
            &then,
            ctx.receiver.clone(),
            &[Value::Undefined, ctx.arg(0)],
        )
    });

    let ctor = create_native_function(agent, realm, "Promise", 1, true, |agent, ctx| {
        let executor = ctx.arg(0);
        if !executor.is_callable() {
            return Err(agent.type_error("Promise resolver is not a function"));
        }
        let realm = agent.current_realm();
        let promise = create_promise(agent, &realm);
        let state = promise_state(agent, &promise)?;
        let (resolve, reject) = settle_functions(agent, &realm, &state);
        let result = crate::interpreter::call_value(
            agent,
            &executor,
            Value::Undefined,
            &[Value::Object(resolve), Value::Object(reject)],
        );
        if let Err(crate::error::EngineError::Throw(reason)) = result {
            settle(agent, &realm, &state, PromiseStatus::Rejected, reason);
        } else {
            result?;
        }
        Ok(Value::Object(promise))
    });

    def_method(agent, realm, &ctor, "resolve", 1, |agent, ctx| {
        let value = ctx.arg(0);
        if let Value::Object(obj) = &value {
            if matches!(obj.borrow().exotic, ExoticObject::Promise(_)) {
                return Ok(value);
            }
        }
        let realm = agent.current_realm();
        let promise = create_promise(agent, &realm);
        let state = promise_state(agent, &promise)?;
        settle(agent, &realm, &state, PromiseStatus::Fulfilled, value);
        Ok(Value::Object(promise))
    });

    def_method(agent, realm, &ctor, "reject", 1, |agent, ctx| {
        let realm = agent.current_realm();
        let promise = create_promise(agent, &realm);
        let state = promise_state(agent, &promise)?;
        settle(
            agent,
            &realm,
            &state,
            PromiseStatus::Rejected,
            ctx.arg(0),
        );
        Ok(Value::Object(promise))
    });

    install_constructor(agent, realm, "Promise", ctor, &prototype);
}

fn callable_or_none(value: Value) -> Option<Value> {
    if value.is_callable() {
        Some(value)
    } else {
        None
    }
}

pub fn create_promise(agent: &mut Agent, realm: &Rc<Realm>) -> JsObjectRef {
    let proto = realm.intrinsics().promise_prototype.clone();
    let obj = agent.create_object_with_proto(Some(proto));
    obj.borrow_mut().exotic = ExoticObject::Promise(Rc::new(RefCell::new(PromiseState {
        status: PromiseStatus::Pending,
        result: Value::Undefined,
        reactions: Vec::new(),
    })));
    obj
}

fn promise_state(
    agent: &mut Agent,
    obj: &JsObjectRef,
) -> Result<Rc<RefCell<PromiseState>>, crate::error::EngineError> {
    match &obj.borrow().exotic {
        ExoticObject::Promise(state) => Ok(state.clone()),
        _ => Err(agent.type_error("Receiver is not a promise")),
    }
}

/// The resolve/reject pair handed to an executor.
fn settle_functions(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    state: &Rc<RefCell<PromiseState>>,
) -> (JsObjectRef, JsObjectRef) {
    let resolve_state = state.clone();
    let resolve_realm = realm.clone();
    let resolve = create_native_function(agent, realm, "resolve", 1, false, move |agent, ctx| {
        settle(
            agent,
            &resolve_realm,
            &resolve_state,
            PromiseStatus::Fulfilled,
            ctx.arg(0),
        );
        Ok(Value::Undefined)
    });
    let reject_state = state.clone();
    let reject_realm = realm.clone();
    let reject = create_native_function(agent, realm, "reject", 1, false, move |agent, ctx| {
        settle(
            agent,
            &reject_realm,
            &reject_state,
            PromiseStatus::Rejected,
            ctx.arg(0),
        );
        Ok(Value::Undefined)
    });
    (resolve, reject)
}

/// Settle a promise; queued reactions become microtask jobs. Resolving
/// with another promise adopts its eventual state.
pub fn settle(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    state: &Rc<RefCell<PromiseState>>,
    status: PromiseStatus,
    value: Value,
) {
    if state.borrow().status != PromiseStatus::Pending {
        return;
    }

    // Adoption: fulfilled-with-a-promise waits for that promise instead.
    if status == PromiseStatus::Fulfilled {
        if let Value::Object(inner) = &value {
            let inner_state = match &inner.borrow().exotic {
                ExoticObject::Promise(s) => Some(s.clone()),
                _ => None,
            };
            if let Some(inner_state) = inner_state {
                register_adoption(agent, realm, &inner_state, state);
                return;
            }
        }
    }

    {
        let mut s = state.borrow_mut();
        s.status = status;
        s.result = value.clone();
    }
    let reactions = std::mem::take(&mut state.borrow_mut().reactions);
    for reaction in reactions {
        enqueue_promise_reaction(agent, realm, reaction, status, value.clone());
    }
}

fn register_adoption(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    inner: &Rc<RefCell<PromiseState>>,
    outer: &Rc<RefCell<PromiseState>>,
) {
    let snapshot = {
        let s = inner.borrow();
        (s.status, s.result.clone())
    };
    match snapshot {
        (PromiseStatus::Pending, _) => {
            // Piggyback on the reaction list with a native pass-through.
            let outer_f = outer.clone();
            let realm_f = realm.clone();
            let on_fulfilled = create_native_function(
                agent,
                realm,
                "",
                1,
                false,
                move |agent, ctx| {
                    settle(agent, &realm_f, &outer_f, PromiseStatus::Fulfilled, ctx.arg(0));
                    Ok(Value::Undefined)
                },
            );
            let outer_r = outer.clone();
            let realm_r = realm.clone();
            let on_rejected = create_native_function(
                agent,
                realm,
                "",
                1,
                false,
                move |agent, ctx| {
                    settle(agent, &realm_r, &outer_r, PromiseStatus::Rejected, ctx.arg(0));
                    Ok(Value::Undefined)
                },
            );
            let derived = create_promise(agent, realm);
            inner.borrow_mut().reactions.push(PromiseReaction {
                on_fulfilled: Some(Value::Object(on_fulfilled)),
                on_rejected: Some(Value::Object(on_rejected)),
                derived,
            });
        }
        (status, result) => {
            settle(agent, realm, outer, status, result);
        }
    }
}

/// Queue one reaction as a microtask job.
pub fn enqueue_promise_reaction(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    reaction: PromiseReaction,
    status: PromiseStatus,
    value: Value,
) {
    let job_realm = realm.clone();
    let job = create_native_function(agent, realm, "", 0, false, move |agent, _ctx| {
        let derived_state = match &reaction.derived.borrow().exotic {
            ExoticObject::Promise(s) => Some(s.clone()),
            _ => None,
        };
        let handler = match status {
            PromiseStatus::Fulfilled => reaction.on_fulfilled.clone(),
            _ => reaction.on_rejected.clone(),
        };
        let outcome = match handler {
            Some(handler) => {
                crate::interpreter::call_value(agent, &handler, Value::Undefined, &[value.clone()])
            }
            // No handler: the derived promise inherits this settlement.
            None => match status {
                PromiseStatus::Fulfilled => Ok(value.clone()),
                _ => Err(crate::error::EngineError::Throw(value.clone())),
            },
        };
        if let Some(derived_state) = derived_state {
            match outcome {
                Ok(result) => settle(
                    agent,
                    &job_realm,
                    &derived_state,
                    PromiseStatus::Fulfilled,
                    result,
                ),
                Err(crate::error::EngineError::Throw(reason)) => settle(
                    agent,
                    &job_realm,
                    &derived_state,
                    PromiseStatus::Rejected,
                    reason,
                ),
                Err(internal) => return Err(internal),
            }
        }
        Ok(Value::Undefined)
    });
    let realm = realm.clone();
    agent.enqueue_microtask(Job {
        callback: Value::Object(job),
        args: Vec::new(),
        realm,
    });
}
