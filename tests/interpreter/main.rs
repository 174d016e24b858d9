//! Integration tests for the interpreter, organized by feature
//!
//! Each file exercises one area through the public `run_source` API; the
//! shared helpers below evaluate a script in a fresh realm.

mod basics;
mod classes;
mod closures;
mod control_flow;
mod errors;
mod generators;
mod globals;
mod modules;
mod objects;
mod promises;
mod strings;

use jsrun::{run_source, Agent, RunResult, Value};

/// Evaluate a script and return its completion value.
pub fn eval(source: &str) -> Value {
    let mut agent = Agent::new();
    let realm = agent.make_realm();
    match run_source(&mut agent, &realm, source) {
        RunResult::Success(value) => value,
        other => panic!("evaluation of {:?} failed: {:?}", source, other),
    }
}

/// Evaluate a script that must throw; returns the thrown value.
pub fn eval_throws(source: &str) -> Value {
    let mut agent = Agent::new();
    let realm = agent.make_realm();
    match run_source(&mut agent, &realm, source) {
        RunResult::RuntimeError(value) => value,
        other => panic!("expected a throw from {:?}, got {:?}", source, other),
    }
}

pub fn eval_number(source: &str) -> f64 {
    match eval(source) {
        Value::Number(n) => n,
        other => panic!("expected a number from {:?}, got {:?}", source, other),
    }
}

pub fn eval_string(source: &str) -> String {
    match eval(source) {
        Value::String(s) => s.as_str().to_string(),
        other => panic!("expected a string from {:?}, got {:?}", source, other),
    }
}

pub fn eval_bool(source: &str) -> bool {
    match eval(source) {
        Value::Boolean(b) => b,
        other => panic!("expected a boolean from {:?}, got {:?}", source, other),
    }
}
