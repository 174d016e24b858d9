//! The Math namespace object

use std::rc::Rc;

use crate::agent::Agent;
use crate::realm::Realm;
use crate::value::{to_number, Value};

use super::{def_method, def_value};

pub fn install(agent: &mut Agent, realm: &Rc<Realm>) {
    let math = agent.create_object_with_proto(Some(realm.intrinsics().object_prototype.clone()));

    def_value(&math, "PI", Value::Number(std::f64::consts::PI));
    def_value(&math, "E", Value::Number(std::f64::consts::E));

    def_method(agent, realm, &math, "floor", 1, |agent, ctx| {
        Ok(Value::Number(to_number(agent, &ctx.arg(0))?.floor()))
    });
    def_method(agent, realm, &math, "ceil", 1, |agent, ctx| {
        Ok(Value::Number(to_number(agent, &ctx.arg(0))?.ceil()))
    });
    def_method(agent, realm, &math, "round", 1, |agent, ctx| {
        let n = to_number(agent, &ctx.arg(0))?;
        // JavaScript rounds half-way cases toward +Infinity.
        Ok(Value::Number((n + 0.5).floor()))
    });
    def_method(agent, realm, &math, "trunc", 1, |agent, ctx| {
        Ok(Value::Number(to_number(agent, &ctx.arg(0))?.trunc()))
    });
    def_method(agent, realm, &math, "abs", 1, |agent, ctx| {
        Ok(Value::Number(to_number(agent, &ctx.arg(0))?.abs()))
    });
    def_method(agent, realm, &math, "sqrt", 1, |agent, ctx| {
        Ok(Value::Number(to_number(agent, &ctx.arg(0))?.sqrt()))
    });
    def_method(agent, realm, &math, "pow", 2, |agent, ctx| {
        let base = to_number(agent, &ctx.arg(0))?;
        let exp = to_number(agent, &ctx.arg(1))?;
        Ok(Value::Number(base.powf(exp)))
    });
    def_method(agent, realm, &math, "max", 2, |agent, ctx| {
        let mut best = f64::NEG_INFINITY;
        for arg in &ctx.args {
            let n = to_number(agent, arg)?;
            if n.is_nan() {
                return Ok(Value::Number(f64::NAN));
            }
            if n > best {
                best = n;
            }
        }
        Ok(Value::Number(best))
    });
    def_method(agent, realm, &math, "min", 2, |agent, ctx| {
        let mut best = f64::INFINITY;
        for arg in &ctx.args {
            let n = to_number(agent, arg)?;
            if n.is_nan() {
                return Ok(Value::Number(f64::NAN));
            }
            if n < best {
                best = n;
            }
        }
        Ok(Value::Number(best))
    });

    super::def_value(&realm.global_object(), "Math", Value::Object(math));
}
