//! jsrun — a small ECMAScript engine
//!
//! Source text goes through the lexer/parser into an annotated AST, the
//! compiler lowers it to bytecode (`FunctionInfo` trees), and the stack
//! interpreter executes it inside an [`Agent`] against a [`Realm`].
//!
//! # Example
//!
//! ```
//! use jsrun::{run_source, Agent, RunResult};
//!
//! let mut agent = Agent::new();
//! let realm = agent.make_realm();
//! match run_source(&mut agent, &realm, "1 + 2 * 3") {
//!     RunResult::Success(value) => assert_eq!(value.as_number(), Some(7.0)),
//!     other => panic!("unexpected result: {:?}", other),
//! }
//! ```

pub mod agent;
pub mod api;
pub mod ast;
pub mod builtins;
pub mod compiler;
pub mod env;
pub mod error;
pub mod interpreter;
pub mod ir;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod realm;
pub mod value;

pub use agent::{Agent, HostHooks};
pub use error::{EngineError, ParseError, RunResult};
pub use object::{JsObject, JsObjectRef, PropertyKey};
pub use realm::{ModuleResolver, Realm, SourceInfo};
pub use value::{CheapClone, JsString, JsSymbol, Value};

use std::rc::Rc;

use compiler::CompiledProgram;
use env::ImportBinding;
use interpreter::PendingModule;
use parser::Parser;
use realm::{ModuleRecord, ModuleStatus};

/// Evaluate JavaScript source text as a script.
pub fn run_source(agent: &mut Agent, realm: &Rc<Realm>, source: &str) -> RunResult {
    run(agent, realm, source, false, "<eval>")
}

/// Evaluate source text as a module (imports resolve through the realm's
/// module resolver).
pub fn run_module_source(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    name: &str,
    source: &str,
) -> RunResult {
    run(agent, realm, source, true, name)
}

/// Evaluate a file; `.mjs` files run as modules.
pub fn run_file(agent: &mut Agent, realm: &Rc<Realm>, path: &std::path::Path) -> RunResult {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => return RunResult::InternalError(format!("cannot read {}: {}", path.display(), e)),
    };
    let is_module = path.extension().map(|e| e == "mjs").unwrap_or(false);
    let name = path.display().to_string();
    run(agent, realm, &source, is_module, &name)
}

/// Drain the microtask queue (the `blockUntilEmpty` hook for embedders).
pub fn block_until_empty(agent: &mut Agent) -> Result<(), EngineError> {
    agent.run_jobs()
}

fn run(agent: &mut Agent, realm: &Rc<Realm>, source: &str, is_module: bool, name: &str) -> RunResult {
    let compiled = match parse_and_compile(source, is_module) {
        Ok(compiled) => compiled,
        Err(e) => return RunResult::ParseError(e),
    };
    if let Err(e) = ir::validate(&compiled.info) {
        return RunResult::InternalError(e.to_string());
    }
    if agent.print_ir {
        let dump = format!("{}", compiled.info);
        agent.hooks.print(&dump);
    }

    let result = if is_module {
        run_compiled_module(agent, realm, name, compiled)
    } else {
        interpreter::run_top_level(agent, realm, &compiled.info, realm.global_env(), None)
    };

    let completion = match result {
        Ok(value) => RunResult::Success(value),
        Err(EngineError::Throw(value)) => return RunResult::RuntimeError(value),
        Err(EngineError::Internal(reason)) => return RunResult::InternalError(reason),
    };

    // Call stack is empty again: microtask checkpoint.
    match agent.run_jobs() {
        Ok(()) => completion,
        Err(EngineError::Internal(reason)) => RunResult::InternalError(reason),
        Err(EngineError::Throw(value)) => RunResult::RuntimeError(value),
    }
}

fn parse_and_compile(source: &str, is_module: bool) -> Result<CompiledProgram, ParseError> {
    let program = Parser::new(source).parse_program(is_module)?;
    Ok(compiler::compile_program(&program)?)
}

/// Evaluate an already-compiled module body: resolve and evaluate its
/// dependencies depth-first, wire the import bindings, then run.
fn run_compiled_module(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    name: &str,
    compiled: CompiledProgram,
) -> Result<Value, EngineError> {
    let meta = compiled
        .module
        .ok_or_else(|| EngineError::internal("module compile without module metadata"))?;

    let record = Rc::new(ModuleRecord {
        name: name.to_string(),
        env: std::cell::Cell::new(env::EnvId(usize::MAX)),
        exports: std::cell::RefCell::new(meta.exports.iter().cloned().collect()),
        status: std::cell::RefCell::new(ModuleStatus::Evaluating),
    });
    realm
        .modules
        .borrow_mut()
        .insert(name.to_string(), record.clone());

    let mut imports: Vec<(u32, ImportBinding)> = Vec::new();
    for request in &meta.requests {
        let dep = evaluate_module_request(agent, realm, request.specifier.as_str(), name)?;
        for (imported, local_slot) in &request.bindings {
            let Some(dep_slot) = dep.exports.borrow().get(imported).copied() else {
                return Err(agent.syntax_error(format!(
                    "The requested module '{}' does not provide an export named '{}'",
                    request.specifier, imported
                )));
            };
            imports.push((
                *local_slot,
                ImportBinding {
                    env: dep.env.get(),
                    slot: dep_slot,
                },
            ));
        }
        if let Some(local_slot) = request.default {
            let Some(dep_slot) = dep.exports.borrow().get("default").copied() else {
                return Err(agent.syntax_error(format!(
                    "The requested module '{}' does not provide a default export",
                    request.specifier
                )));
            };
            imports.push((
                local_slot,
                ImportBinding {
                    env: dep.env.get(),
                    slot: dep_slot,
                },
            ));
        }
    }

    let pending = PendingModule {
        imports,
        record: record.clone(),
    };
    let result = interpreter::run_top_level(
        agent,
        realm,
        &compiled.info,
        realm.global_env(),
        Some(pending),
    );
    *record.status.borrow_mut() = ModuleStatus::Evaluated;
    result
}

/// Resolve one import specifier through the realm's resolver hook and
/// evaluate the dependency (once per realm; cycles are an error).
fn evaluate_module_request(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    specifier: &str,
    referrer: &str,
) -> Result<Rc<ModuleRecord>, EngineError> {
    let info = {
        let mut resolver = realm.module_resolver.borrow_mut();
        let Some(resolver) = resolver.as_mut() else {
            return Err(agent.type_error(format!(
                "Cannot resolve module '{}': no module resolver installed",
                specifier
            )));
        };
        resolver
            .resolve(specifier, referrer)
            .map_err(|reason| EngineError::internal(format!("module resolution failed: {}", reason)))
    };
    let info = match info {
        Ok(info) => info,
        Err(_) => {
            return Err(agent.type_error(format!("Cannot find module '{}'", specifier)));
        }
    };

    if let Some(existing) = realm.modules.borrow().get(&info.name) {
        if *existing.status.borrow() == ModuleStatus::Evaluating {
            return Err(agent.syntax_error(format!(
                "Detected cycle while resolving module '{}'",
                info.name
            )));
        }
        return Ok(existing.clone());
    }

    let compiled = parse_and_compile(&info.text, true)
        .map_err(|e| EngineError::internal(format!("module '{}': {}", info.name, e)))?;
    ir::validate(&compiled.info).map_err(|e| EngineError::internal(e.to_string()))?;
    run_compiled_module(agent, realm, &info.name, compiled)?;
    let record = realm
        .modules
        .borrow()
        .get(&info.name)
        .cloned()
        .ok_or_else(|| EngineError::internal("module record vanished during evaluation"))?;
    Ok(record)
}
