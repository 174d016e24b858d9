//! %Function.prototype%: call, apply, bind

use std::rc::Rc;

use crate::agent::Agent;
use crate::object::{BoundFunctionData, ExoticObject, JsFunction, PartialDescriptor, PropertyKey};
use crate::realm::Realm;
use crate::value::Value;

use super::def_method;

pub fn install(agent: &mut Agent, realm: &Rc<Realm>) {
    let prototype = realm.intrinsics().function_prototype.clone();

    def_method(agent, realm, &prototype, "call", 1, |agent, ctx| {
        let this_arg = ctx.arg(0);
        let args: Vec<Value> = ctx.args.iter().skip(1).cloned().collect();
        crate::interpreter::call_value(agent, &ctx.receiver, this_arg, &args)
    });

    def_method(agent, realm, &prototype, "apply", 2, |agent, ctx| {
        let this_arg = ctx.arg(0);
        let args = match ctx.arg(1) {
            Value::Undefined | Value::Null => Vec::new(),
            Value::Object(array) => {
                let size = array.borrow().array_like_size();
                let mut out = Vec::with_capacity(size as usize);
                for i in 0..size {
                    out.push(super::array_get(agent, &array, i)?);
                }
                out
            }
            _ => {
                return Err(agent.type_error("CreateListFromArrayLike called on non-object"));
            }
        };
        crate::interpreter::call_value(agent, &ctx.receiver, this_arg, &args)
    });

    def_method(agent, realm, &prototype, "bind", 1, |agent, ctx| {
        let Value::Object(target) = &ctx.receiver else {
            return Err(agent.type_error("Bind must be called on a function"));
        };
        if !target.borrow().is_callable() {
            return Err(agent.type_error("Bind must be called on a function"));
        }
        let bound = BoundFunctionData {
            target: target.clone(),
            this_arg: ctx.arg(0),
            bound_args: ctx.args.iter().skip(1).cloned().collect(),
        };
        let realm = agent.current_realm();
        let proto = realm.intrinsics().function_prototype.clone();
        let obj = agent.create_object_with_proto(Some(proto));
        obj.borrow_mut().exotic = ExoticObject::Function(JsFunction::Bound(Box::new(bound)));
        let name = target.borrow().function_name().unwrap_or_default();
        obj.borrow_mut().define_own_property(
            &PropertyKey::from("name"),
            &PartialDescriptor::data(
                Value::from(format!("bound {}", name)),
                false,
                false,
                true,
            ),
        );
        Ok(Value::Object(obj))
    });

    def_method(agent, realm, &prototype, "toString", 0, |agent, ctx| {
        let Value::Object(func) = &ctx.receiver else {
            return Err(agent.type_error("Function.prototype.toString requires a function"));
        };
        let name = func.borrow().function_name().unwrap_or_default();
        Ok(Value::from(format!(
            "function {}() {{ [native code] }}",
            name
        )))
    });
}
