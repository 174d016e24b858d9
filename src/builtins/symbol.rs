//! The Symbol function and well-known symbols

use std::rc::Rc;

use crate::agent::Agent;
use crate::object::{ExoticObject, PartialDescriptor, PropertyKey};
use crate::realm::Realm;
use crate::value::{to_string, Value};

use super::{create_native_function, def_method, install_constructor};

pub fn install(agent: &mut Agent, realm: &Rc<Realm>) {
    let prototype = realm.intrinsics().symbol_prototype.clone();

    def_method(agent, realm, &prototype, "toString", 0, |agent, ctx| {
        let sym = match &ctx.receiver {
            Value::Symbol(sym) => sym.clone(),
            Value::Object(obj) => match &obj.borrow().exotic {
                ExoticObject::BoxedPrimitive(Value::Symbol(sym)) => sym.clone(),
                _ => return Err(agent.type_error("Symbol.prototype.toString requires a Symbol")),
            },
            _ => return Err(agent.type_error("Symbol.prototype.toString requires a Symbol")),
        };
        Ok(Value::from(match sym.description() {
            Some(desc) => format!("Symbol({})", desc),
            None => "Symbol()".to_string(),
        }))
    });
    def_method(agent, realm, &prototype, "valueOf", 0, |agent, ctx| {
        match &ctx.receiver {
            Value::Symbol(_) => Ok(ctx.receiver.clone()),
            Value::Object(obj) => {
                let boxed = match &obj.borrow().exotic {
                    ExoticObject::BoxedPrimitive(v @ Value::Symbol(_)) => Some(v.clone()),
                    _ => None,
                };
                boxed.ok_or_else(|| agent.type_error("Symbol.prototype.valueOf requires a Symbol"))
            }
            _ => Err(agent.type_error("Symbol.prototype.valueOf requires a Symbol")),
        }
    });

    // Symbol() is callable but never constructible.
    let ctor = create_native_function(agent, realm, "Symbol", 0, false, |agent, ctx| {
        if ctx.new_target.is_object() {
            return Err(agent.type_error("Symbol is not a constructor"));
        }
        let description = match ctx.arg(0) {
            Value::Undefined => None,
            other => Some(to_string(agent, &other)?),
        };
        Ok(Value::Symbol(agent.new_symbol(description)))
    });

    def_method(agent, realm, &ctor, "for", 1, |agent, ctx| {
        let key = to_string(agent, &ctx.arg(0))?;
        Ok(Value::Symbol(agent.symbol_for(key)))
    });

    let well_known = realm.well_known.clone();
    for (name, sym) in [
        ("iterator", well_known.iterator),
        ("toPrimitive", well_known.to_primitive),
        ("toStringTag", well_known.to_string_tag),
        ("hasInstance", well_known.has_instance),
    ] {
        ctor.borrow_mut().define_own_property(
            &PropertyKey::from(name),
            &PartialDescriptor::data(Value::Symbol(sym), false, false, false),
        );
    }

    install_constructor(agent, realm, "Symbol", ctor, &prototype);
}
