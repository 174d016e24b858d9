//! The agent: per-thread execution state
//!
//! One agent owns the object id counter, the environment arena, the active
//! function call stack, and the microtask queue. Exactly one activation
//! executes at a time within an agent; `&mut Agent` threading enforces it.

use std::collections::VecDeque;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::env::EnvironmentArena;
use crate::error::{EngineError, Span};
use crate::object::{JsObject, JsObjectRef};
use crate::realm::{Realm, WellKnownSymbols};
use crate::value::{CheapClone, JsString, JsSymbol, Value};

/// Host interface: effects the engine delegates outward.
pub trait HostHooks {
    /// `print(...)` and console output.
    fn print(&mut self, text: &str);
}

/// Default hooks writing to stdout.
pub struct StdoutHooks;

impl HostHooks for StdoutHooks {
    fn print(&mut self, text: &str) {
        println!("{}", text);
    }
}

/// A queued microtask: a callback with its arguments, run at the next
/// call-stack-empty checkpoint.
pub struct Job {
    pub callback: Value,
    pub args: Vec<Value>,
    pub realm: Rc<Realm>,
}

/// One entry of the active-function stack.
pub struct ActiveCall {
    /// `None` for the root script activation.
    pub function: Option<JsObjectRef>,
    pub realm: Rc<Realm>,
    /// Source position the activation is currently executing.
    pub span: Span,
}

pub struct Agent {
    next_object_id: u64,
    next_symbol_id: u64,
    pub envs: EnvironmentArena,
    call_stack: Vec<ActiveCall>,
    microtasks: VecDeque<Job>,
    symbol_registry: FxHashMap<JsString, JsSymbol>,
    /// Dump each compiled `FunctionInfo` before execution.
    pub print_ir: bool,
    pub hooks: Box<dyn HostHooks>,
}

impl Agent {
    pub fn new() -> Self {
        Self::with_hooks(Box::new(StdoutHooks))
    }

    pub fn with_hooks(hooks: Box<dyn HostHooks>) -> Self {
        Self {
            next_object_id: 0,
            next_symbol_id: 0,
            envs: EnvironmentArena::new(),
            call_stack: Vec::new(),
            microtasks: VecDeque::new(),
            symbol_registry: FxHashMap::default(),
            print_ir: false,
            hooks,
        }
    }

    /// Create a realm wired to this agent. See `builtins::install` for the
    /// intrinsic construction order.
    pub fn make_realm(&mut self) -> Rc<Realm> {
        let well_known = WellKnownSymbols {
            iterator: self.new_symbol(Some(JsString::from("Symbol.iterator"))),
            to_primitive: self.new_symbol(Some(JsString::from("Symbol.toPrimitive"))),
            to_string_tag: self.new_symbol(Some(JsString::from("Symbol.toStringTag"))),
            has_instance: self.new_symbol(Some(JsString::from("Symbol.hasInstance"))),
        };
        let realm = Realm::new(well_known);
        crate::builtins::install(self, &realm);
        realm
    }

    // ─── identity allocation ───────────────────────────────────────────────

    pub fn next_object_id(&mut self) -> u64 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        id
    }

    pub fn new_symbol(&mut self, description: Option<JsString>) -> JsSymbol {
        let id = self.next_symbol_id;
        self.next_symbol_id += 1;
        JsSymbol::new(id, description)
    }

    /// `Symbol.for`: one symbol per registry key, agent-wide.
    pub fn symbol_for(&mut self, key: JsString) -> JsSymbol {
        if let Some(sym) = self.symbol_registry.get(&key) {
            return sym.clone();
        }
        let sym = self.new_symbol(Some(key.cheap_clone()));
        self.symbol_registry.insert(key, sym.clone());
        sym
    }

    // ─── object creation ───────────────────────────────────────────────────

    /// An ordinary object with the current realm's `%Object.prototype%`.
    pub fn create_object(&mut self) -> JsObjectRef {
        let proto = self
            .current_realm_opt()
            .map(|realm| realm.intrinsics().object_prototype.clone());
        self.create_object_with_proto(proto)
    }

    pub fn create_object_with_proto(&mut self, proto: Option<JsObjectRef>) -> JsObjectRef {
        let id = self.next_object_id();
        Rc::new(std::cell::RefCell::new(JsObject::new(id, proto)))
    }

    // ─── call stack ────────────────────────────────────────────────────────

    pub fn push_call(&mut self, function: Option<JsObjectRef>, realm: Rc<Realm>) {
        self.call_stack.push(ActiveCall {
            function,
            realm,
            span: Span::default(),
        });
    }

    pub fn pop_call(&mut self) {
        self.call_stack.pop();
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn active_function(&self) -> Option<JsObjectRef> {
        self.call_stack.last().and_then(|c| c.function.clone())
    }

    /// Record the source position the active frame is executing; error
    /// reporting reads it back.
    pub fn set_pending_span(&mut self, span: Span) {
        if let Some(top) = self.call_stack.last_mut() {
            top.span = span;
        }
    }

    pub fn pending_span(&self) -> Span {
        self.call_stack.last().map(|c| c.span).unwrap_or_default()
    }

    pub fn current_realm(&self) -> Rc<Realm> {
        self.current_realm_opt().expect("no active realm")
    }

    pub fn current_realm_opt(&self) -> Option<Rc<Realm>> {
        self.call_stack.last().map(|c| c.realm.clone())
    }

    pub fn well_known_symbols(&self) -> WellKnownSymbols {
        self.current_realm().well_known.clone()
    }

    // ─── microtasks ────────────────────────────────────────────────────────

    pub fn enqueue_microtask(&mut self, job: Job) {
        self.microtasks.push_back(job);
    }

    pub fn has_pending_jobs(&self) -> bool {
        !self.microtasks.is_empty()
    }

    /// Microtask checkpoint: drain FIFO until the queue is empty. Jobs
    /// enqueued while draining run before this returns. Must only be called
    /// with an empty call stack.
    pub fn run_jobs(&mut self) -> Result<(), EngineError> {
        debug_assert!(self.call_stack.is_empty(), "checkpoint inside an activation");
        while let Some(job) = self.microtasks.pop_front() {
            self.push_call(None, job.realm.clone());
            let result =
                crate::interpreter::call_value(self, &job.callback, Value::Undefined, &job.args);
            self.pop_call();
            match result {
                Ok(_) => {}
                // Promise reaction jobs route handler throws into their
                // derived promise; a throw escaping here is host-level and
                // only reported.
                Err(EngineError::Throw(value)) => {
                    let text = format!("Uncaught (in microtask) {:?}", value);
                    self.hooks.print(&text);
                }
                Err(internal) => return Err(internal),
            }
        }
        Ok(())
    }

    // ─── realm-bound error factories ───────────────────────────────────────

    pub fn type_error(&mut self, message: impl Into<String>) -> EngineError {
        self.make_error(crate::builtins::ErrorKind::Type, message.into())
    }

    pub fn reference_error(&mut self, message: impl Into<String>) -> EngineError {
        self.make_error(crate::builtins::ErrorKind::Reference, message.into())
    }

    pub fn range_error(&mut self, message: impl Into<String>) -> EngineError {
        self.make_error(crate::builtins::ErrorKind::Range, message.into())
    }

    pub fn syntax_error(&mut self, message: impl Into<String>) -> EngineError {
        self.make_error(crate::builtins::ErrorKind::Syntax, message.into())
    }

    fn make_error(&mut self, kind: crate::builtins::ErrorKind, message: String) -> EngineError {
        match self.current_realm_opt() {
            Some(realm) => {
                let obj = crate::builtins::create_error_object(self, &realm, kind, &message);
                // The activation's pending source position becomes the top
                // of the error's stack string.
                let span = self.pending_span();
                let stack = format!("{}: {}\n    at {}", kind.name(), message, span.start);
                obj.borrow_mut().define_own_property(
                    &crate::object::PropertyKey::from("stack"),
                    &crate::object::PartialDescriptor::data(
                        Value::from(stack),
                        true,
                        false,
                        true,
                    ),
                );
                EngineError::Throw(Value::Object(obj))
            }
            // No realm to bind to (embedder misuse); throw a plain string.
            None => EngineError::Throw(Value::from(format!("{}: {}", kind.name(), message))),
        }
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new()
    }
}
