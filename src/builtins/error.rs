//! Error constructors and prototypes
//!
//! All seven specification error kinds, wired so `instanceof Error` holds
//! across call boundaries within a realm.

use std::rc::Rc;

use crate::agent::Agent;
use crate::object::{JsObjectRef, PartialDescriptor, PropertyKey};
use crate::realm::Realm;
use crate::value::{to_string, Value};

use super::{create_native_function, def_method, install_constructor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    Type,
    Reference,
    Range,
    Syntax,
    Uri,
    Eval,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::Type => "TypeError",
            ErrorKind::Reference => "ReferenceError",
            ErrorKind::Range => "RangeError",
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Uri => "URIError",
            ErrorKind::Eval => "EvalError",
        }
    }
}

pub fn prototype_for(realm: &Rc<Realm>, kind: ErrorKind) -> JsObjectRef {
    let intrinsics = realm.intrinsics();
    match kind {
        ErrorKind::Error => intrinsics.error_prototype.clone(),
        ErrorKind::Type => intrinsics.type_error_prototype.clone(),
        ErrorKind::Reference => intrinsics.reference_error_prototype.clone(),
        ErrorKind::Range => intrinsics.range_error_prototype.clone(),
        ErrorKind::Syntax => intrinsics.syntax_error_prototype.clone(),
        ErrorKind::Uri => intrinsics.uri_error_prototype.clone(),
        ErrorKind::Eval => intrinsics.eval_error_prototype.clone(),
    }
}

pub fn install(agent: &mut Agent, realm: &Rc<Realm>) {
    let error_prototype = realm.intrinsics().error_prototype.clone();
    super::def_value(&error_prototype, "name", Value::from("Error"));
    super::def_value(&error_prototype, "message", Value::from(""));
    def_method(agent, realm, &error_prototype, "toString", 0, |agent, ctx| {
        let Value::Object(this) = &ctx.receiver else {
            return Err(agent.type_error("Error.prototype.toString requires an object"));
        };
        let name = crate::object::get(agent, this, &PropertyKey::from("name"))?;
        let message = crate::object::get(agent, this, &PropertyKey::from("message"))?;
        let name = match name {
            Value::Undefined => "Error".to_string(),
            other => to_string(agent, &other)?.as_str().to_string(),
        };
        let message = match message {
            Value::Undefined => String::new(),
            other => to_string(agent, &other)?.as_str().to_string(),
        };
        Ok(Value::from(match (name.is_empty(), message.is_empty()) {
            (true, _) => message,
            (_, true) => name,
            _ => format!("{}: {}", name, message),
        }))
    });

    install_error_kind(agent, realm, ErrorKind::Error, &error_prototype, None);
    for kind in [
        ErrorKind::Type,
        ErrorKind::Reference,
        ErrorKind::Range,
        ErrorKind::Syntax,
        ErrorKind::Uri,
        ErrorKind::Eval,
    ] {
        let prototype = prototype_for(realm, kind);
        super::def_value(&prototype, "name", Value::from(kind.name()));
        install_error_kind(agent, realm, kind, &prototype, Some(&error_prototype));
    }
}

fn install_error_kind(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    kind: ErrorKind,
    prototype: &JsObjectRef,
    _parent: Option<&JsObjectRef>,
) {
    let realm_for_ctor = realm.clone();
    let ctor = create_native_function(
        agent,
        realm,
        kind.name(),
        1,
        true,
        move |agent, ctx| {
            // `new.target.prototype` wins so subclassing works; the kind's
            // own prototype is the fallback.
            let proto = match &ctx.new_target {
                Value::Object(nt) => {
                    match crate::object::get(agent, nt, &PropertyKey::from("prototype"))? {
                        Value::Object(p) => p,
                        _ => prototype_for(&realm_for_ctor, kind),
                    }
                }
                _ => prototype_for(&realm_for_ctor, kind),
            };
            let obj = agent.create_object_with_proto(Some(proto));
            obj.borrow_mut()
                .set_internal("ErrorData", Value::Boolean(true));
            match ctx.arg(0) {
                Value::Undefined => {}
                message => {
                    let message = to_string(agent, &message)?;
                    obj.borrow_mut().define_own_property(
                        &PropertyKey::from("message"),
                        &PartialDescriptor::data(Value::String(message), true, false, true),
                    );
                }
            }
            Ok(Value::Object(obj))
        },
    );
    def_method(agent, realm, prototype, "valueOf", 0, |_, ctx| Ok(ctx.receiver.clone()));
    install_constructor(agent, realm, kind.name(), ctor, prototype);
}
