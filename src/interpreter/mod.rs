//! Interpreter
//!
//! Executes one `FunctionInfo` per activation: a single operand stack,
//! indexed locals, a current-environment pointer, and a runtime stack of
//! entered handler regions carrying the height/environment snapshots the
//! throw path restores.

mod operations;

pub use operations::{copy_data_properties, get_value_property};

use std::cell::RefCell;
use std::rc::Rc;

use crate::agent::Agent;
use crate::env::GlobalLookup;
use crate::error::EngineError;
use crate::ir::{
    Constant, FunctionInfo, MethodKind, MethodPlacement, Opcode, NEW_TARGET_SLOT, RECEIVER_SLOT,
};
use crate::object::{
    ConstructorKind, ExoticObject, FunctionKind, GeneratorState, InterpretedFunction, JsFunction,
    JsObjectRef, PartialDescriptor, PropertyKey, GENERATOR_DONE, GENERATOR_START,
};
use crate::realm::Realm;
use crate::value::{self, to_property_key, CheapClone, JsString, Value};

use operations::{CompareOp, NumericOp};

/// Hard recursion bound; interpreted calls nest on the host stack, so this
/// stays well inside the default test-thread stack size.
const MAX_CALL_DEPTH: usize = 192;

/// An entered handler region with the snapshots its handler restores.
struct HandlerScope {
    region: usize,
    stack_height: usize,
    env: crate::env::EnvId,
}

/// Import wiring applied when a module root environment materializes.
pub struct PendingModule {
    /// `(local slot, binding into the exporting module's env)` pairs.
    pub imports: Vec<(u32, crate::env::ImportBinding)>,
    pub record: Rc<crate::realm::ModuleRecord>,
}

/// One executing `FunctionInfo`.
struct Activation {
    info: Rc<FunctionInfo>,
    stack: Vec<Value>,
    locals: Vec<Value>,
    env: crate::env::EnvId,
    ip: usize,
    function: Option<JsObjectRef>,
    realm: Rc<Realm>,
    args: Vec<Value>,
    generator: Option<Rc<RefCell<GeneratorState>>>,
    resume_phase: u32,
    handlers: Vec<HandlerScope>,
    pending_module: Option<PendingModule>,
}

enum Flow {
    Next,
    Jump(u32),
    Return(Value),
}

impl Activation {
    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value, EngineError> {
        self.stack
            .pop()
            .ok_or_else(|| EngineError::internal("operand stack underflow"))
    }

    fn peek(&self) -> Result<&Value, EngineError> {
        self.stack
            .last()
            .ok_or_else(|| EngineError::internal("operand stack underflow"))
    }

    fn peek_at(&self, depth: usize) -> Result<&Value, EngineError> {
        let len = self.stack.len();
        self.stack
            .get(len.checked_sub(depth + 1).ok_or_else(|| {
                EngineError::internal("operand stack underflow")
            })?)
            .ok_or_else(|| EngineError::internal("operand stack underflow"))
    }

    fn local(&self, slot: u16) -> Value {
        self.locals[slot as usize].clone()
    }

    fn set_local(&mut self, slot: u16, value: Value) {
        self.locals[slot as usize] = value;
    }

    fn generator_state(&self) -> Result<&Rc<RefCell<GeneratorState>>, EngineError> {
        self.generator
            .as_ref()
            .ok_or_else(|| EngineError::internal("generator opcode outside a generator frame"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Entry points
// ═══════════════════════════════════════════════════════════════════════════════

/// Run a compiled top-level script/module body against a realm.
pub fn run_top_level(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    info: &Rc<FunctionInfo>,
    env: crate::env::EnvId,
    pending_module: Option<PendingModule>,
) -> Result<Value, EngineError> {
    let global = realm.global_object();
    let mut activation = Activation {
        info: info.clone(),
        stack: Vec::new(),
        locals: vec![Value::Undefined; info.locals.len()],
        env,
        ip: 0,
        function: None,
        realm: realm.clone(),
        args: Vec::new(),
        generator: None,
        resume_phase: GENERATOR_START,
        handlers: Vec::new(),
        pending_module,
    };
    activation.locals[RECEIVER_SLOT as usize] = Value::Object(global);
    agent.push_call(None, realm.clone());
    let result = execute(agent, &mut activation);
    agent.pop_call();
    result
}

/// Call any value; non-callables throw a TypeError.
pub fn call_value(
    agent: &mut Agent,
    callee: &Value,
    receiver: Value,
    args: &[Value],
) -> Result<Value, EngineError> {
    let Value::Object(obj) = callee else {
        return Err(agent.type_error(format!("{:?} is not a function", callee)));
    };
    if !obj.borrow().is_callable() {
        return Err(agent.type_error(format!("{:?} is not a function", callee)));
    }
    call_function(agent, obj, receiver, args, Value::Undefined)
}

/// Invoke a function object.
pub fn call_function(
    agent: &mut Agent,
    func: &JsObjectRef,
    receiver: Value,
    args: &[Value],
    new_target: Value,
) -> Result<Value, EngineError> {
    if agent.call_depth() >= MAX_CALL_DEPTH {
        return Err(agent.range_error("Maximum call stack size exceeded"));
    }
    let function = {
        let borrowed = func.borrow();
        match borrowed.function() {
            Some(f) => f.clone(),
            None => return Err(agent.type_error("value is not a function")),
        }
    };
    match function {
        JsFunction::Native(native) => {
            let ctx = crate::object::NativeCallContext {
                receiver,
                new_target,
                args: args.to_vec(),
            };
            agent.push_call(Some(func.clone()), native.realm.clone());
            let result = (native.func)(agent, &ctx);
            agent.pop_call();
            result
        }
        JsFunction::Bound(bound) => {
            let mut all_args = bound.bound_args.clone();
            all_args.extend_from_slice(args);
            call_function(
                agent,
                &bound.target,
                bound.this_arg.clone(),
                &all_args,
                new_target,
            )
        }
        JsFunction::Interpreted(interpreted) => match interpreted.kind {
            FunctionKind::ClassConstructor => {
                Err(agent.type_error("Class constructor cannot be invoked without 'new'"))
            }
            FunctionKind::Generator => {
                Ok(create_generator_object(agent, func, &interpreted, receiver, args))
            }
            FunctionKind::Async | FunctionKind::AsyncGenerator => Err(EngineError::internal(
                "async function execution is not implemented",
            )),
            FunctionKind::Normal | FunctionKind::Arrow => {
                let receiver = coerce_receiver(agent, &interpreted, receiver)?;
                run_interpreted(agent, func, &interpreted, receiver, new_target, args)
            }
        },
    }
}

/// Sloppy-mode functions see the global object instead of undefined/null,
/// and boxed primitives instead of bare ones.
fn coerce_receiver(
    agent: &mut Agent,
    f: &InterpretedFunction,
    receiver: Value,
) -> Result<Value, EngineError> {
    if f.info.is_strict || f.kind == FunctionKind::Arrow {
        return Ok(receiver);
    }
    match receiver {
        Value::Undefined | Value::Null | Value::Empty => {
            Ok(Value::Object(f.realm.global_object()))
        }
        Value::Object(_) => Ok(receiver),
        primitive => Ok(Value::Object(value::to_object(agent, &primitive)?)),
    }
}

fn run_interpreted(
    agent: &mut Agent,
    func: &JsObjectRef,
    f: &InterpretedFunction,
    receiver: Value,
    new_target: Value,
    args: &[Value],
) -> Result<Value, EngineError> {
    let info = f.info.clone();
    let mut locals = vec![Value::Undefined; info.locals.len()];
    locals[RECEIVER_SLOT as usize] = receiver;
    locals[NEW_TARGET_SLOT as usize] = new_target;
    let user_args = (info.arg_count as usize).saturating_sub(2);
    for i in 0..user_args {
        locals[2 + i] = args.get(i).cloned().unwrap_or(Value::Undefined);
    }

    let mut activation = Activation {
        info,
        stack: Vec::new(),
        locals,
        env: f.env,
        ip: 0,
        function: Some(func.clone()),
        realm: f.realm.clone(),
        args: args.to_vec(),
        generator: None,
        resume_phase: GENERATOR_START,
        handlers: Vec::new(),
        pending_module: None,
    };
    agent.push_call(Some(func.clone()), f.realm.clone());
    let result = execute(agent, &mut activation);
    agent.pop_call();
    result
}

/// Construct an instance. Dispatches on the callable's constructor kind.
pub fn construct(
    agent: &mut Agent,
    ctor: &Value,
    args: &[Value],
    new_target: Value,
) -> Result<Value, EngineError> {
    let Value::Object(func) = ctor else {
        return Err(agent.type_error(format!("{:?} is not a constructor", ctor)));
    };
    if !func.borrow().is_constructor() {
        return Err(agent.type_error(format!("{:?} is not a constructor", ctor)));
    }
    let function = func.borrow().function().cloned().expect("constructor");

    match function {
        JsFunction::Native(native) => {
            let ctx = crate::object::NativeCallContext {
                receiver: Value::Undefined,
                new_target,
                args: args.to_vec(),
            };
            agent.push_call(Some(func.clone()), native.realm.clone());
            let result = (native.func)(agent, &ctx);
            agent.pop_call();
            result
        }
        JsFunction::Bound(bound) => {
            let mut all_args = bound.bound_args.clone();
            all_args.extend_from_slice(args);
            let target = Value::Object(bound.target.clone());
            // new.target falls back to the target for a plain `new bound()`.
            let nt = if let (Value::Object(a), Value::Object(b)) = (&new_target, ctor) {
                if Rc::ptr_eq(a, b) {
                    target.clone()
                } else {
                    new_target
                }
            } else {
                new_target
            };
            construct(agent, &target, &all_args, nt)
        }
        JsFunction::Interpreted(interpreted) => {
            if agent.call_depth() >= MAX_CALL_DEPTH {
                return Err(agent.range_error("Maximum call stack size exceeded"));
            }
            let derived = interpreted.constructor_kind == ConstructorKind::Derived;
            let receiver = if derived {
                Value::Empty
            } else {
                Value::Object(ordinary_create_from_constructor(
                    agent,
                    &interpreted.realm,
                    &new_target,
                )?)
            };

            let info = interpreted.info.clone();
            let mut locals = vec![Value::Undefined; info.locals.len()];
            locals[RECEIVER_SLOT as usize] = receiver.clone();
            locals[NEW_TARGET_SLOT as usize] = new_target;
            let user_args = (info.arg_count as usize).saturating_sub(2);
            for i in 0..user_args {
                locals[2 + i] = args.get(i).cloned().unwrap_or(Value::Undefined);
            }
            let mut activation = Activation {
                info,
                stack: Vec::new(),
                locals,
                env: interpreted.env,
                ip: 0,
                function: Some(func.clone()),
                realm: interpreted.realm.clone(),
                args: args.to_vec(),
                generator: None,
                resume_phase: GENERATOR_START,
                handlers: Vec::new(),
                pending_module: None,
            };
            agent.push_call(Some(func.clone()), interpreted.realm.clone());
            let result = execute(agent, &mut activation);
            agent.pop_call();
            let result = result?;

            if result.is_object() {
                return Ok(result);
            }
            if derived {
                let this = activation.locals[RECEIVER_SLOT as usize].clone();
                if result.is_undefined() {
                    if this.is_empty() {
                        return Err(agent.reference_error(
                            "Must call super constructor in derived class before returning",
                        ));
                    }
                    return Ok(this);
                }
                return Err(agent.type_error(
                    "Derived constructors may only return object or undefined",
                ));
            }
            Ok(activation.locals[RECEIVER_SLOT as usize].clone())
        }
    }
}

/// OrdinaryCreateFromConstructor: the new object's prototype comes from
/// `new_target.prototype`, falling back to the realm's `%Object.prototype%`.
fn ordinary_create_from_constructor(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    new_target: &Value,
) -> Result<JsObjectRef, EngineError> {
    let proto = match new_target {
        Value::Object(nt) => match crate::object::get(agent, nt, &PropertyKey::from("prototype"))? {
            Value::Object(proto) => Some(proto),
            _ => Some(realm.intrinsics().object_prototype.clone()),
        },
        _ => Some(realm.intrinsics().object_prototype.clone()),
    };
    Ok(agent.create_object_with_proto(proto))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Generators
// ═══════════════════════════════════════════════════════════════════════════════

/// Calling a generator function produces a suspended generator object.
fn create_generator_object(
    agent: &mut Agent,
    func: &JsObjectRef,
    f: &InterpretedFunction,
    receiver: Value,
    args: &[Value],
) -> Value {
    let mut locals = vec![Value::Undefined; f.info.locals.len()];
    locals[RECEIVER_SLOT as usize] = receiver;
    let user_args = (f.info.arg_count as usize).saturating_sub(2);
    for i in 0..user_args {
        locals[2 + i] = args.get(i).cloned().unwrap_or(Value::Undefined);
    }

    let proto = match crate::object::get(agent, func, &PropertyKey::from("prototype")) {
        Ok(Value::Object(proto)) => proto,
        _ => f.realm.intrinsics().generator_prototype.clone(),
    };
    let state = GeneratorState {
        phase: GENERATOR_START,
        stack: Vec::new(),
        locals,
        env: f.env,
        sent: Value::Undefined,
        function: f.clone(),
        callee: func.clone(),
    };
    let obj = agent.create_object_with_proto(Some(proto));
    obj.borrow_mut().exotic = ExoticObject::Generator(Rc::new(RefCell::new(state)));
    Value::Object(obj)
}

/// Drive a suspended generator. Returns `(value, done)`.
pub fn resume_generator(
    agent: &mut Agent,
    generator: &JsObjectRef,
    sent: Value,
) -> Result<(Value, bool), EngineError> {
    let state_rc = {
        let borrowed = generator.borrow();
        match &borrowed.exotic {
            ExoticObject::Generator(state) => state.clone(),
            _ => return Err(agent.type_error("next called on a non-generator object")),
        }
    };

    let (info, env, locals, stack, phase, realm, callee) = {
        let mut state = state_rc.borrow_mut();
        if state.phase == GENERATOR_DONE {
            return Ok((Value::Undefined, true));
        }
        let phase = state.phase;
        // Pre-mark done; a yield rewrites the phase before suspending.
        state.phase = GENERATOR_DONE;
        state.sent = sent;
        (
            state.function.info.clone(),
            state.env,
            std::mem::take(&mut state.locals),
            std::mem::take(&mut state.stack),
            phase,
            state.function.realm.clone(),
            state.callee.clone(),
        )
    };

    let mut activation = Activation {
        info,
        stack,
        locals,
        env,
        ip: 0,
        function: Some(callee.clone()),
        realm: realm.clone(),
        args: Vec::new(),
        generator: Some(state_rc.clone()),
        resume_phase: phase,
        handlers: Vec::new(),
        pending_module: None,
    };
    agent.push_call(Some(callee), realm);
    let result = execute(agent, &mut activation);
    agent.pop_call();
    let value = result?;

    let suspended = state_rc.borrow().phase != GENERATOR_DONE;
    if suspended {
        // The yield saved the operand stack; keep the locals and the
        // environment pointer alongside it.
        let mut state = state_rc.borrow_mut();
        state.locals = activation.locals;
        state.env = activation.env;
    }
    Ok((value, !suspended))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Dispatch loop
// ═══════════════════════════════════════════════════════════════════════════════

fn execute(agent: &mut Agent, act: &mut Activation) -> Result<Value, EngineError> {
    let info = act.info.clone();
    let opcodes = &info.opcodes;

    loop {
        if act.ip >= opcodes.len() {
            return Err(EngineError::internal("instruction pointer ran off the end"));
        }

        // Source position for error reporting.
        agent.set_pending_span(info.locations[act.ip]);

        // Handler-region entry/exit tracking: snapshot on entry, drop on
        // exit, replace on re-entry. Regions opening at the same index push
        // widest first so the innermost sits on top for throw dispatch.
        let mut opening: Vec<usize> = Vec::new();
        for (i, region) in info.handlers.iter().enumerate() {
            if region.start as usize == act.ip {
                opening.push(i);
            } else if region.end as usize == act.ip {
                act.handlers.retain(|h| h.region != i);
            }
        }
        opening.sort_by_key(|&i| std::cmp::Reverse(info.handlers[i].end));
        for i in opening {
            act.handlers.retain(|h| h.region != i);
            act.handlers.push(HandlerScope {
                region: i,
                stack_height: act.stack.len(),
                env: act.env,
            });
        }

        let op = &opcodes[act.ip];
        match step(agent, act, op) {
            Ok(Flow::Next) => act.ip += 1,
            Ok(Flow::Jump(target)) => act.ip = target as usize,
            Ok(Flow::Return(value)) => return Ok(value),
            Err(EngineError::Throw(thrown)) => {
                let ip = act.ip as u32;
                // Innermost entered region containing the faulting ip.
                let position = act
                    .handlers
                    .iter()
                    .rposition(|h| {
                        let region = info.handlers[h.region];
                        region.start <= ip && ip < region.end
                    });
                match position {
                    Some(pos) => {
                        act.handlers.truncate(pos + 1);
                        let scope = act.handlers.pop().expect("handler scope");
                        let region = info.handlers[scope.region];
                        act.stack.truncate(scope.stack_height);
                        // Unwind environment records entered inside the region.
                        act.env = scope.env;
                        act.push(thrown);
                        act.ip = region.handler as usize;
                    }
                    None => return Err(EngineError::Throw(thrown)),
                }
            }
            Err(internal) => return Err(internal),
        }
    }
}

fn step(agent: &mut Agent, act: &mut Activation, op: &Opcode) -> Result<Flow, EngineError> {
    match op {
        // ─── stack ─────────────────────────────────────────────────────────
        Opcode::Pop => {
            act.pop()?;
        }
        Opcode::Dup => {
            let top = act.peek()?.clone();
            act.push(top);
        }
        Opcode::DupX1 => {
            let b = act.pop()?;
            let a = act.pop()?;
            act.push(b.clone());
            act.push(a);
            act.push(b);
        }
        Opcode::Swap => {
            let b = act.pop()?;
            let a = act.pop()?;
            act.push(b);
            act.push(a);
        }

        // ─── constants ─────────────────────────────────────────────────────
        Opcode::PushConstant(idx) => {
            let value = match act.info.constant(*idx) {
                Constant::Number(n) => Value::Number(*n),
                Constant::String(s) => Value::String(s.cheap_clone()),
                other => {
                    return Err(EngineError::internal(format!(
                        "PushConstant on non-value constant {:?}",
                        other
                    )));
                }
            };
            act.push(value);
        }
        Opcode::PushUndefined => act.push(Value::Undefined),
        Opcode::PushNull => act.push(Value::Null),
        Opcode::PushBoolean(b) => act.push(Value::Boolean(*b)),
        Opcode::PushBigInt(idx) => {
            let value = match act.info.constant(*idx) {
                Constant::BigInt(b) => Value::BigInt(b.clone()),
                other => {
                    return Err(EngineError::internal(format!(
                        "PushBigInt on non-bigint constant {:?}",
                        other
                    )));
                }
            };
            act.push(value);
        }
        Opcode::PushEmpty => act.push(Value::Empty),

        // ─── locals ────────────────────────────────────────────────────────
        Opcode::LoadValue(slot) => {
            let value = act.local(*slot);
            act.push(value);
        }
        Opcode::StoreValue(slot) => {
            let value = act.pop()?;
            act.set_local(*slot, value);
        }
        Opcode::LoadInt(slot) => {
            let value = act.local(*slot);
            act.push(value);
        }
        Opcode::StoreInt(slot) => {
            let value = act.pop()?;
            act.set_local(*slot, value);
        }
        Opcode::IncInt(slot) => {
            let value = act.local(*slot).as_number().unwrap_or(0.0);
            act.set_local(*slot, Value::Number(value + 1.0));
        }
        Opcode::LoadBoolean(slot) => {
            let value = act.local(*slot);
            act.push(value);
        }
        Opcode::StoreBoolean(slot) => {
            let value = act.pop()?;
            act.set_local(*slot, value);
        }

        // ─── environment records ───────────────────────────────────────────
        Opcode::PushDeclarativeEnvRecord(n) => {
            act.env = agent.envs.alloc_declarative(u32::from(*n), Some(act.env));
        }
        Opcode::PushModuleEnvRecord(n) => {
            // A module root chains to null, not to the global environment.
            act.env = agent.envs.alloc_module(u32::from(*n), None);
            if let Some(pending) = act.pending_module.take() {
                for (slot, binding) in pending.imports {
                    agent.envs.add_import(act.env, slot, binding);
                }
                pending.record.env.set(act.env);
            }
        }
        Opcode::PopEnvRecord => {
            let old = act.env;
            act.env = agent
                .envs
                .outer(old)
                .ok_or_else(|| EngineError::internal("PopEnvRecord at chain root"))?;
            agent.envs.try_free(old);
        }
        Opcode::LoadCurrentEnvSlot(slot) => {
            let value = agent.envs.get_slot(act.env, u32::from(*slot), 0);
            act.push(value);
        }
        Opcode::StoreCurrentEnvSlot(slot) => {
            let value = act.pop()?;
            agent.envs.set_slot(act.env, u32::from(*slot), 0, value);
        }
        Opcode::LoadEnvSlot { slot, distance } => {
            let value = agent
                .envs
                .get_slot(act.env, u32::from(*slot), u32::from(*distance));
            act.push(value);
        }
        Opcode::StoreEnvSlot { slot, distance } => {
            let value = act.pop()?;
            agent
                .envs
                .set_slot(act.env, u32::from(*slot), u32::from(*distance), value);
        }

        // ─── globals ───────────────────────────────────────────────────────
        Opcode::LoadGlobal(idx) => {
            let name = act.info.string_constant(*idx);
            let value = load_global(agent, act, &name)?;
            act.push(value);
        }
        Opcode::StoreGlobal(idx) => {
            let name = act.info.string_constant(*idx);
            let value = act.pop()?;
            store_global(agent, act, &name, value)?;
        }
        Opcode::InitializeGlobalLexical(idx) => {
            let name = act.info.string_constant(*idx);
            let value = act.pop()?;
            let env = act.realm.global_env();
            agent.envs.set_global_lexical(env, &name, value);
        }
        Opcode::DeclareGlobals(idx) => {
            let decls = match act.info.constant(*idx) {
                Constant::Declarations(d) => d.clone(),
                other => {
                    return Err(EngineError::internal(format!(
                        "DeclareGlobals on {:?}",
                        other
                    )));
                }
            };
            declare_globals(agent, act, &decls)?;
        }
        Opcode::TypeOfGlobal(idx) => {
            let name = act.info.string_constant(*idx);
            let env = act.realm.global_env();
            let value = match agent.envs.classify_global(env, &name) {
                GlobalLookup::Unresolvable => Value::Undefined,
                GlobalLookup::Lexical(lexical) => lexical.value,
                GlobalLookup::ObjectProperty => {
                    let global = act.realm.global_object();
                    crate::object::get(agent, &global, &PropertyKey::from(name.cheap_clone()))?
                }
            };
            act.push(Value::from(value.type_of()));
        }

        // ─── properties ────────────────────────────────────────────────────
        Opcode::LoadNamedProperty(idx) => {
            let name = act.info.string_constant(*idx);
            let object = act.pop()?;
            let key = operations::named_key(&name);
            let value = operations::get_value_property(agent, &object, &key)?;
            act.push(value);
        }
        Opcode::StoreNamedProperty(idx) => {
            let name = act.info.string_constant(*idx);
            let value = act.pop()?;
            let object = act.pop()?;
            let key = operations::named_key(&name);
            let ok = operations::set_value_property(agent, &object, &key, value)?;
            if !ok && act.info.is_strict {
                return Err(agent.type_error(format!(
                    "Cannot assign to read only property '{}'",
                    name
                )));
            }
        }
        Opcode::LoadKeyedProperty => {
            let key = act.pop()?;
            let object = act.pop()?;
            let key = to_property_key(agent, &key)?;
            let value = operations::get_value_property(agent, &object, &key)?;
            act.push(value);
        }
        Opcode::StoreKeyedProperty => {
            let value = act.pop()?;
            let key = act.pop()?;
            let object = act.pop()?;
            let key = to_property_key(agent, &key)?;
            let ok = operations::set_value_property(agent, &object, &key, value)?;
            if !ok && act.info.is_strict {
                return Err(
                    agent.type_error(format!("Cannot assign to read only property '{}'", key))
                );
            }
        }
        Opcode::DeletePropertyStrict | Opcode::DeletePropertySloppy => {
            let key = act.pop()?;
            let object = act.pop()?;
            let result = match &object {
                Value::Object(obj) => {
                    let key = to_property_key(agent, &key)?;
                    let ok = obj.borrow_mut().delete(&key);
                    if !ok && matches!(op, Opcode::DeletePropertyStrict) {
                        return Err(agent.type_error(format!(
                            "Cannot delete property '{}'",
                            key
                        )));
                    }
                    ok
                }
                Value::Undefined | Value::Null => {
                    return Err(agent.type_error("Cannot convert undefined or null to object"));
                }
                _ => true,
            };
            act.push(Value::from(result));
        }

        // ─── binary operators ──────────────────────────────────────────────
        Opcode::Add => {
            let rhs = act.pop()?;
            let lhs = act.pop()?;
            let result = operations::add(agent, &lhs, &rhs)?;
            act.push(result);
        }
        Opcode::Sub => numeric_op(agent, act, NumericOp::Sub)?,
        Opcode::Mul => numeric_op(agent, act, NumericOp::Mul)?,
        Opcode::Div => numeric_op(agent, act, NumericOp::Div)?,
        Opcode::Rem => numeric_op(agent, act, NumericOp::Rem)?,
        Opcode::Exp => numeric_op(agent, act, NumericOp::Exp)?,
        Opcode::BitwiseAnd => numeric_op(agent, act, NumericOp::BitAnd)?,
        Opcode::BitwiseOr => numeric_op(agent, act, NumericOp::BitOr)?,
        Opcode::BitwiseXor => numeric_op(agent, act, NumericOp::BitXor)?,
        Opcode::ShiftLeft => numeric_op(agent, act, NumericOp::Shl)?,
        Opcode::ShiftRight => numeric_op(agent, act, NumericOp::Shr)?,
        Opcode::ShiftRightUnsigned => numeric_op(agent, act, NumericOp::Ushr)?,
        Opcode::TestEqual => {
            let rhs = act.pop()?;
            let lhs = act.pop()?;
            let eq = value::is_loosely_equal(agent, &lhs, &rhs)?;
            act.push(Value::from(eq));
        }
        Opcode::TestNotEqual => {
            let rhs = act.pop()?;
            let lhs = act.pop()?;
            let eq = value::is_loosely_equal(agent, &lhs, &rhs)?;
            act.push(Value::from(!eq));
        }
        Opcode::TestEqualStrict => {
            let rhs = act.pop()?;
            let lhs = act.pop()?;
            act.push(Value::from(lhs.is_strictly_equal(&rhs)));
        }
        Opcode::TestNotEqualStrict => {
            let rhs = act.pop()?;
            let lhs = act.pop()?;
            act.push(Value::from(!lhs.is_strictly_equal(&rhs)));
        }
        Opcode::TestLessThan => compare_op(agent, act, CompareOp::Less)?,
        Opcode::TestLessThanOrEqual => compare_op(agent, act, CompareOp::LessEq)?,
        Opcode::TestGreaterThan => compare_op(agent, act, CompareOp::Greater)?,
        Opcode::TestGreaterThanOrEqual => compare_op(agent, act, CompareOp::GreaterEq)?,
        Opcode::TestIn => {
            let rhs = act.pop()?;
            let lhs = act.pop()?;
            let result = operations::has_property_op(agent, &lhs, &rhs)?;
            act.push(Value::from(result));
        }
        Opcode::TestInstanceOf => {
            let rhs = act.pop()?;
            let lhs = act.pop()?;
            let result = operations::instance_of(agent, &lhs, &rhs)?;
            act.push(Value::from(result));
        }

        // ─── unary operators ───────────────────────────────────────────────
        Opcode::TypeOf => {
            let value = act.pop()?;
            act.push(Value::from(value.type_of()));
        }
        Opcode::ToNumber => {
            let value = act.pop()?;
            let result = operations::to_number_value(agent, &value)?;
            act.push(result);
        }
        Opcode::ToNumeric => {
            let value = act.pop()?;
            let result = operations::to_numeric_value(agent, &value)?;
            act.push(result);
        }
        Opcode::Negate => {
            let value = act.pop()?;
            let result = operations::negate(agent, &value)?;
            act.push(result);
        }
        Opcode::BitwiseNot => {
            let value = act.pop()?;
            let result = operations::bitwise_not(agent, &value)?;
            act.push(result);
        }
        Opcode::ToBooleanLogicalNot => {
            let value = act.pop()?;
            act.push(Value::from(!value.to_boolean()));
        }
        Opcode::Inc => {
            let value = act.pop()?;
            act.push(operations::increment(&value, 1));
        }
        Opcode::Dec => {
            let value = act.pop()?;
            act.push(operations::increment(&value, -1));
        }

        // ─── control flow ──────────────────────────────────────────────────
        Opcode::Jump(target) => return Ok(Flow::Jump(*target)),
        Opcode::JumpIfTrue(target) => {
            let cond = act.pop()?;
            if matches!(cond, Value::Boolean(true)) {
                return Ok(Flow::Jump(*target));
            }
        }
        Opcode::JumpIfFalse(target) => {
            let cond = act.pop()?;
            if matches!(cond, Value::Boolean(false)) {
                return Ok(Flow::Jump(*target));
            }
        }
        Opcode::JumpIfToBooleanTrue(target) => {
            let cond = act.pop()?;
            if cond.to_boolean() {
                return Ok(Flow::Jump(*target));
            }
        }
        Opcode::JumpIfToBooleanFalse(target) => {
            let cond = act.pop()?;
            if !cond.to_boolean() {
                return Ok(Flow::Jump(*target));
            }
        }
        Opcode::JumpIfUndefined(target) => {
            let value = act.pop()?;
            if value.is_undefined() {
                return Ok(Flow::Jump(*target));
            }
        }
        Opcode::JumpIfNotUndefined(target) => {
            let value = act.pop()?;
            if !value.is_undefined() {
                return Ok(Flow::Jump(*target));
            }
        }
        Opcode::JumpIfNotNullish(target) => {
            if !act.peek()?.is_nullish() {
                return Ok(Flow::Jump(*target));
            }
        }
        Opcode::JumpIfNotEmpty(target) => {
            if !act.peek()?.is_empty() {
                return Ok(Flow::Jump(*target));
            }
        }
        Opcode::JumpTable(targets) => {
            let phase = act.resume_phase as usize;
            let target = targets.get(phase).copied().ok_or_else(|| {
                EngineError::internal(format!("resume phase {} outside jump table", phase))
            })?;
            return Ok(Flow::Jump(target));
        }

        // ─── calls ─────────────────────────────────────────────────────────
        Opcode::Call(n) => {
            let mut args = vec![Value::Undefined; *n as usize];
            for slot in args.iter_mut().rev() {
                *slot = act.pop()?;
            }
            let receiver = act.pop()?;
            let callee = act.pop()?;
            let result = call_value(agent, &callee, receiver, &args)?;
            act.push(result);
        }
        Opcode::CallArray => {
            let args_array = act.pop()?;
            let receiver = act.pop()?;
            let callee = act.pop()?;
            let args = array_elements(agent, &args_array)?;
            let result = call_value(agent, &callee, receiver, &args)?;
            act.push(result);
        }
        Opcode::Construct(n) => {
            let mut args = vec![Value::Undefined; *n as usize];
            for slot in args.iter_mut().rev() {
                *slot = act.pop()?;
            }
            let new_target = act.pop()?;
            let ctor = act.pop()?;
            let result = construct(agent, &ctor, &args, new_target)?;
            act.push(result);
        }
        Opcode::ConstructArray => {
            let args_array = act.pop()?;
            let new_target = act.pop()?;
            let ctor = act.pop()?;
            let args = array_elements(agent, &args_array)?;
            let result = construct(agent, &ctor, &args, new_target)?;
            act.push(result);
        }
        Opcode::Return => {
            let value = act.pop()?;
            return Ok(Flow::Return(value));
        }
        Opcode::Throw => {
            let value = act.pop()?;
            return Err(EngineError::Throw(value));
        }

        // ─── iteration ─────────────────────────────────────────────────────
        Opcode::GetIterator => {
            let value = act.pop()?;
            let record = get_iterator(agent, &value)?;
            act.push(record);
        }
        Opcode::IteratorNext => {
            let record = act.pop()?;
            let result = iterator_next(agent, &record)?;
            act.push(result);
        }
        Opcode::IteratorResultDone => {
            let result = act.pop()?;
            let done = operations::get_value_property(agent, &result, &PropertyKey::from("done"))?;
            act.push(Value::from(done.to_boolean()));
        }
        Opcode::IteratorResultValue => {
            let result = act.pop()?;
            let value =
                operations::get_value_property(agent, &result, &PropertyKey::from("value"))?;
            act.push(value);
        }
        Opcode::ForInEnumerate => {
            let value = act.pop()?;
            let record = for_in_enumerate(agent, &value)?;
            act.push(record);
        }

        // ─── closures ──────────────────────────────────────────────────────
        Opcode::CreateClosure(idx) => {
            let closure = create_closure(agent, act, *idx, FunctionKind::Normal)?;
            act.push(closure);
        }
        Opcode::CreateGeneratorClosure(idx) => {
            let closure = create_closure(agent, act, *idx, FunctionKind::Generator)?;
            act.push(closure);
        }
        Opcode::CreateAsyncClosure(idx) => {
            let closure = create_closure(agent, act, *idx, FunctionKind::Async)?;
            act.push(closure);
        }
        Opcode::CreateAsyncGeneratorClosure(idx) => {
            let closure = create_closure(agent, act, *idx, FunctionKind::AsyncGenerator)?;
            act.push(closure);
        }
        Opcode::CreateClassConstructor(idx) => {
            let closure = create_closure(agent, act, *idx, FunctionKind::ClassConstructor)?;
            act.push(closure);
        }

        // ─── classes and super ─────────────────────────────────────────────
        Opcode::CreateClass => {
            let ctor = act.pop()?;
            let superclass = act.pop()?;
            let (proto, ctor) = create_class(agent, act, superclass, ctor)?;
            act.push(proto);
            act.push(ctor);
        }
        Opcode::AttachClassMethod {
            name,
            placement,
            kind,
        } => {
            let method = act.pop()?;
            let name = act.info.string_constant(*name);
            let key = PropertyKey::from(name.cheap_clone());
            attach_class_method(agent, act, &key, method, *placement, *kind)?;
        }
        Opcode::AttachComputedClassMethod { placement, kind } => {
            let method = act.pop()?;
            let key = act.pop()?;
            let key = to_property_key(agent, &key)?;
            attach_class_method(agent, act, &key, method, *placement, *kind)?;
        }
        Opcode::FinalizeClass => {
            let ctor = act.pop()?;
            let _proto = act.pop()?;
            act.push(ctor);
        }
        Opcode::GetSuperConstructor => {
            let func = agent
                .active_function()
                .ok_or_else(|| EngineError::internal("super outside a function activation"))?;
            let parent = func.borrow().get_prototype_of();
            act.push(match parent {
                Some(parent) => Value::Object(parent),
                None => Value::Null,
            });
        }
        Opcode::GetSuperBase => {
            let func = agent
                .active_function()
                .ok_or_else(|| EngineError::internal("super outside a function activation"))?;
            let home = func.borrow().function().and_then(|f| match f {
                JsFunction::Interpreted(i) => i.home_object.clone(),
                _ => None,
            });
            let Some(home) = home else {
                return Err(agent.type_error("'super' keyword is only valid inside a method"));
            };
            let base = home.borrow().get_prototype_of();
            act.push(match base {
                Some(base) => Value::Object(base),
                None => Value::Undefined,
            });
        }

        // ─── miscellaneous ─────────────────────────────────────────────────
        Opcode::CreateObject => {
            let obj = agent.create_object();
            act.push(Value::Object(obj));
        }
        Opcode::CreateArray => {
            let array = crate::builtins::create_array(agent, &act.realm, Vec::new());
            act.push(Value::Object(array));
        }
        Opcode::StoreArray => {
            let value = act.pop()?;
            let array = act.peek()?.clone();
            let Value::Object(array) = array else {
                return Err(EngineError::internal("StoreArray target is not an array"));
            };
            let index = array.borrow().array_like_size();
            crate::object::create_data_property(&array, &PropertyKey::Index(index), value);
        }
        Opcode::StoreArrayIndexed(index) => {
            let value = act.pop()?;
            let array = act.peek()?.clone();
            let Value::Object(array) = array else {
                return Err(EngineError::internal("StoreArray target is not an array"));
            };
            crate::object::create_data_property(&array, &PropertyKey::Index(*index), value);
        }
        Opcode::CreateRegExpObject(idx) => {
            let (pattern, flags) = match act.info.constant(*idx) {
                Constant::RegExp { pattern, flags } => (pattern.clone(), flags.clone()),
                other => {
                    return Err(EngineError::internal(format!(
                        "CreateRegExpObject on {:?}",
                        other
                    )));
                }
            };
            let obj = agent.create_object();
            crate::object::create_data_property(
                &obj,
                &PropertyKey::from("source"),
                Value::String(pattern),
            );
            crate::object::create_data_property(
                &obj,
                &PropertyKey::from("flags"),
                Value::String(flags),
            );
            act.push(Value::Object(obj));
        }
        Opcode::CreateTemplateLiteral(n) => {
            let mut parts = vec![Value::Undefined; *n as usize];
            for slot in parts.iter_mut().rev() {
                *slot = act.pop()?;
            }
            let result = operations::concat_template(agent, parts)?;
            act.push(result);
        }
        Opcode::CollectRestArgs(start) => {
            let rest: Vec<Value> = act
                .args
                .iter()
                .skip(*start as usize)
                .cloned()
                .collect();
            let array = crate::builtins::create_array(agent, &act.realm, rest);
            act.push(Value::Object(array));
        }
        Opcode::CreateUnmappedArgumentsObject | Opcode::CreateMappedArgumentsObject => {
            // Mapped arguments are materialized unmapped: a snapshot object,
            // never tied to the live parameter slots.
            let obj = create_arguments_object(agent, act)?;
            act.push(Value::Object(obj));
        }
        Opcode::PushClosure => {
            let func = act
                .function
                .clone()
                .ok_or_else(|| EngineError::internal("PushClosure outside a function"))?;
            act.push(Value::Object(func));
        }
        Opcode::ThrowConstantReassignmentError(idx) => {
            let name = act.info.string_constant(*idx);
            return Err(agent.type_error(format!(
                "Assignment to constant variable '{}'",
                name
            )));
        }
        Opcode::ThrowLexicalAccessError(idx) => {
            let name = act.info.string_constant(*idx);
            return Err(agent.reference_error(format!(
                "Cannot access '{}' before initialization",
                name
            )));
        }
        Opcode::ThrowSuperNotCalledError => {
            return Err(agent.reference_error(
                "Must call super constructor in derived class before accessing 'this'",
            ));
        }
        Opcode::CopyObjectExcludingProperties(n) => {
            let mut excluded = Vec::with_capacity(*n as usize);
            for _ in 0..*n {
                let key = act.pop()?;
                excluded.push(to_property_key(agent, &key)?);
            }
            let source = act.pop()?;
            let target = agent.create_object();
            operations::copy_data_properties(agent, &target, &source, &excluded)?;
            act.push(Value::Object(target));
        }
        Opcode::CopyDataProperties => {
            let source = act.pop()?;
            let target = act.peek()?.clone();
            let Value::Object(target) = target else {
                return Err(EngineError::internal("CopyDataProperties on non-object"));
            };
            operations::copy_data_properties(agent, &target, &source, &[])?;
        }
        Opcode::DefineObjectAccessor { name, kind } => {
            let func = act.pop()?;
            let target = act.pop()?;
            let Value::Object(target) = target else {
                return Err(EngineError::internal("accessor target is not an object"));
            };
            let Value::Object(func) = func else {
                return Err(EngineError::internal("accessor is not a function"));
            };
            let name = act.info.string_constant(*name);
            let mut desc = PartialDescriptor {
                enumerable: Some(true),
                configurable: Some(true),
                ..Default::default()
            };
            if *kind == MethodKind::Getter {
                desc.get = Some(Some(func));
            } else {
                desc.set = Some(Some(func));
            }
            target
                .borrow_mut()
                .define_own_property(&PropertyKey::from(name.cheap_clone()), &desc);
        }

        // ─── generator coordination ────────────────────────────────────────
        Opcode::SetGeneratorPhase(phase) => {
            let state = act.generator_state()?;
            state.borrow_mut().phase = *phase;
        }
        Opcode::PushToGeneratorState => {
            let value = act.pop()?;
            let state = act.generator_state()?.clone();
            state.borrow_mut().stack.push(value);
        }
        Opcode::PopFromGeneratorState => {
            let state = act.generator_state()?.clone();
            let value = state
                .borrow_mut()
                .stack
                .pop()
                .ok_or_else(|| EngineError::internal("generator state stack underflow"))?;
            act.push(value);
        }
        Opcode::PushGeneratorSentValue => {
            let state = act.generator_state()?;
            let sent = state.borrow().sent.clone();
            act.push(sent);
        }
    }
    Ok(Flow::Next)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Opcode helpers
// ═══════════════════════════════════════════════════════════════════════════════

fn numeric_op(agent: &mut Agent, act: &mut Activation, op: NumericOp) -> Result<(), EngineError> {
    let rhs = act.pop()?;
    let lhs = act.pop()?;
    let result = operations::numeric_binary(agent, op, &lhs, &rhs)?;
    act.push(result);
    Ok(())
}

fn compare_op(agent: &mut Agent, act: &mut Activation, op: CompareOp) -> Result<(), EngineError> {
    let rhs = act.pop()?;
    let lhs = act.pop()?;
    let result = operations::compare(agent, op, &lhs, &rhs)?;
    act.push(Value::from(result));
    Ok(())
}

fn load_global(agent: &mut Agent, act: &Activation, name: &JsString) -> Result<Value, EngineError> {
    let env = act.realm.global_env();
    match agent.envs.classify_global(env, name) {
        GlobalLookup::Lexical(lexical) => {
            if lexical.value.is_empty() {
                Err(agent.reference_error(format!(
                    "Cannot access '{}' before initialization",
                    name
                )))
            } else {
                Ok(lexical.value)
            }
        }
        GlobalLookup::ObjectProperty => {
            let global = act.realm.global_object();
            crate::object::get(agent, &global, &PropertyKey::from(name.cheap_clone()))
        }
        GlobalLookup::Unresolvable => {
            Err(agent.reference_error(format!("{} is not defined", name)))
        }
    }
}

fn store_global(
    agent: &mut Agent,
    act: &Activation,
    name: &JsString,
    value: Value,
) -> Result<(), EngineError> {
    let env = act.realm.global_env();
    match agent.envs.classify_global(env, name) {
        GlobalLookup::Lexical(lexical) => {
            if lexical.value.is_empty() {
                return Err(agent.reference_error(format!(
                    "Cannot access '{}' before initialization",
                    name
                )));
            }
            if !lexical.mutable {
                return Err(agent.type_error(format!(
                    "Assignment to constant variable '{}'",
                    name
                )));
            }
            agent.envs.set_global_lexical(env, name, value);
            Ok(())
        }
        GlobalLookup::ObjectProperty => {
            let global = act.realm.global_object();
            let ok = crate::object::set(
                agent,
                &global,
                &PropertyKey::from(name.cheap_clone()),
                value,
            )?;
            if !ok && act.info.is_strict {
                return Err(agent.type_error(format!(
                    "Cannot assign to read only property '{}'",
                    name
                )));
            }
            Ok(())
        }
        GlobalLookup::Unresolvable => {
            if act.info.is_strict {
                return Err(agent.reference_error(format!("{} is not defined", name)));
            }
            let global = act.realm.global_object();
            crate::object::set(
                agent,
                &global,
                &PropertyKey::from(name.cheap_clone()),
                value,
            )?;
            Ok(())
        }
    }
}

/// GlobalDeclarationInstantiation: restricted-name checks, then binding
/// installation with `undefined` vars and dead-zone lexicals.
fn declare_globals(
    agent: &mut Agent,
    act: &Activation,
    decls: &crate::ir::GlobalDeclarations,
) -> Result<(), EngineError> {
    let env = act.realm.global_env();
    let global = act.realm.global_object();

    for name in decls.lets.iter().chain(&decls.consts) {
        if agent.envs.has_restricted_global_property(env, name)
            || agent.envs.has_lexical_binding(env, name)
        {
            return Err(agent.syntax_error(format!(
                "Identifier '{}' has already been declared",
                name
            )));
        }
    }
    for name in &decls.functions {
        if !agent.envs.can_declare_global_function(env, name) {
            return Err(agent.type_error(format!(
                "Cannot declare global function '{}'",
                name
            )));
        }
    }
    for name in decls.vars.iter().chain(&decls.functions) {
        if !agent.envs.can_declare_global_var(env, name) {
            return Err(agent.type_error(format!("Cannot declare global variable '{}'", name)));
        }
    }

    for name in decls.vars.iter().chain(&decls.functions) {
        let key = PropertyKey::from(name.cheap_clone());
        if !global.borrow().has_own_property(&key) {
            global.borrow_mut().define_own_property(
                &key,
                &PartialDescriptor::data(Value::Undefined, true, true, false),
            );
        }
    }
    for name in &decls.lets {
        agent.envs.declare_global_lexical(env, name.cheap_clone(), true);
    }
    for name in &decls.consts {
        agent
            .envs
            .declare_global_lexical(env, name.cheap_clone(), false);
    }
    Ok(())
}

/// Shared closure construction for every CreateClosure variant.
fn create_closure(
    agent: &mut Agent,
    act: &Activation,
    child: u16,
    kind: FunctionKind,
) -> Result<Value, EngineError> {
    let info = act.info.children[child as usize].clone();
    let kind = if kind == FunctionKind::Normal && info.is_arrow {
        FunctionKind::Arrow
    } else {
        kind
    };
    agent.envs.increment_capture(act.env);
    let function = InterpretedFunction {
        info,
        kind,
        constructor_kind: ConstructorKind::Base,
        env: act.env,
        home_object: None,
        realm: act.realm.clone(),
    };
    let obj = make_function_object(agent, &act.realm, function)?;
    Ok(Value::Object(obj))
}

pub fn make_function_object(
    agent: &mut Agent,
    realm: &Rc<Realm>,
    function: InterpretedFunction,
) -> Result<JsObjectRef, EngineError> {
    let proto = realm.intrinsics().function_prototype.clone();
    let obj = agent.create_object_with_proto(Some(proto));
    let name = function.info.name.cheap_clone();
    let length = function.info.param_count;
    let kind = function.kind;
    obj.borrow_mut().exotic = ExoticObject::Function(JsFunction::Interpreted(function));

    obj.borrow_mut().define_own_property(
        &PropertyKey::from("length"),
        &PartialDescriptor::data(Value::from(u32::from(length)), false, false, true),
    );
    obj.borrow_mut().define_own_property(
        &PropertyKey::from("name"),
        &PartialDescriptor::data(Value::String(name), false, false, true),
    );

    match kind {
        FunctionKind::Normal => {
            let prototype = agent.create_object();
            crate::object::create_data_property(
                &prototype,
                &PropertyKey::from("constructor"),
                Value::Object(obj.clone()),
            );
            obj.borrow_mut().define_own_property(
                &PropertyKey::from("prototype"),
                &PartialDescriptor::data(Value::Object(prototype), true, false, false),
            );
        }
        FunctionKind::Generator => {
            let generator_proto = realm.intrinsics().generator_prototype.clone();
            let prototype = agent.create_object_with_proto(Some(generator_proto));
            obj.borrow_mut().define_own_property(
                &PropertyKey::from("prototype"),
                &PartialDescriptor::data(Value::Object(prototype), true, false, false),
            );
        }
        _ => {}
    }
    Ok(obj)
}

/// The four-way superclass analysis of class creation.
fn create_class(
    agent: &mut Agent,
    act: &Activation,
    superclass: Value,
    ctor: Value,
) -> Result<(Value, Value), EngineError> {
    let Value::Object(ctor_obj) = &ctor else {
        return Err(EngineError::internal("class constructor is not an object"));
    };
    let intrinsics = act.realm.intrinsics().clone();

    let (proto_parent, ctor_parent, derived) = match &superclass {
        Value::Empty => (
            Some(intrinsics.object_prototype.clone()),
            intrinsics.function_prototype.clone(),
            false,
        ),
        Value::Null => (None, intrinsics.function_prototype.clone(), true),
        Value::Object(superclass_obj) if superclass_obj.borrow().is_constructor() => {
            let parent_proto =
                crate::object::get(agent, superclass_obj, &PropertyKey::from("prototype"))?;
            let parent_proto = match parent_proto {
                Value::Object(p) => Some(p),
                Value::Null => None,
                _ => {
                    return Err(
                        agent.type_error("Class extends value does not have valid prototype")
                    );
                }
            };
            (parent_proto, superclass_obj.clone(), true)
        }
        _ => {
            return Err(agent.type_error("Class extends value is not a constructor"));
        }
    };

    let proto = agent.create_object_with_proto(proto_parent);

    {
        let mut ctor_mut = ctor_obj.borrow_mut();
        ctor_mut.prototype = Some(ctor_parent);
        if let ExoticObject::Function(JsFunction::Interpreted(f)) = &mut ctor_mut.exotic {
            f.constructor_kind = if derived {
                ConstructorKind::Derived
            } else {
                ConstructorKind::Base
            };
            f.home_object = Some(proto.clone());
        }
    }

    ctor_obj.borrow_mut().define_own_property(
        &PropertyKey::from("prototype"),
        &PartialDescriptor::data(Value::Object(proto.clone()), false, false, false),
    );
    proto.borrow_mut().define_own_property(
        &PropertyKey::from("constructor"),
        &PartialDescriptor::data(ctor.clone(), true, false, true),
    );

    Ok((Value::Object(proto), ctor))
}

fn attach_class_method(
    agent: &mut Agent,
    act: &mut Activation,
    key: &PropertyKey,
    method: Value,
    placement: MethodPlacement,
    kind: MethodKind,
) -> Result<(), EngineError> {
    let _ = agent;
    let ctor = act.peek_at(0)?.clone();
    let proto = act.peek_at(1)?.clone();
    let target = match placement {
        MethodPlacement::Static => ctor,
        MethodPlacement::Prototype => proto,
    };
    let Value::Object(target) = target else {
        return Err(EngineError::internal("class member target is not an object"));
    };
    let Value::Object(method_obj) = &method else {
        return Err(EngineError::internal("class member is not a function"));
    };

    if let ExoticObject::Function(JsFunction::Interpreted(f)) =
        &mut method_obj.borrow_mut().exotic
    {
        f.home_object = Some(target.clone());
    }

    let desc = match kind {
        MethodKind::Normal => PartialDescriptor::data(method.clone(), true, false, true),
        MethodKind::Getter => PartialDescriptor {
            get: Some(Some(method_obj.clone())),
            enumerable: Some(false),
            configurable: Some(true),
            ..Default::default()
        },
        MethodKind::Setter => PartialDescriptor {
            set: Some(Some(method_obj.clone())),
            enumerable: Some(false),
            configurable: Some(true),
            ..Default::default()
        },
    };
    target.borrow_mut().define_own_property(key, &desc);
    Ok(())
}

/// Build the `arguments` snapshot object.
fn create_arguments_object(
    agent: &mut Agent,
    act: &Activation,
) -> Result<JsObjectRef, EngineError> {
    let obj = agent.create_object();
    for (i, arg) in act.args.iter().enumerate() {
        crate::object::create_data_property(&obj, &PropertyKey::Index(i as u32), arg.clone());
    }
    obj.borrow_mut().define_own_property(
        &PropertyKey::from("length"),
        &PartialDescriptor::data(Value::from(act.args.len()), true, false, true),
    );
    Ok(obj)
}

/// Collect the element values of an array-like (spread argument arrays).
fn array_elements(agent: &mut Agent, value: &Value) -> Result<Vec<Value>, EngineError> {
    let Value::Object(obj) = value else {
        return Err(EngineError::internal("spread arguments are not an array"));
    };
    let size = obj.borrow().array_like_size();
    let mut out = Vec::with_capacity(size as usize);
    for i in 0..size {
        out.push(crate::object::get(agent, obj, &PropertyKey::Index(i))?);
    }
    Ok(out)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Iterator protocol
// ═══════════════════════════════════════════════════════════════════════════════

/// GetIterator: look up `[Symbol.iterator]`, call it, and package the
/// iterator with its cached `next` method into an internal record object.
fn get_iterator(agent: &mut Agent, value: &Value) -> Result<Value, EngineError> {
    let iterator_sym = agent.well_known_symbols().iterator;
    let method =
        operations::get_value_property(agent, value, &PropertyKey::Symbol(iterator_sym))?;
    if !method.is_callable() {
        return Err(agent.type_error(format!("{:?} is not iterable", value)));
    }
    let iterator = call_value(agent, &method, value.clone(), &[])?;
    if !iterator.is_object() {
        return Err(agent.type_error("Result of the Symbol.iterator method is not an object"));
    }
    let next = operations::get_value_property(agent, &iterator, &PropertyKey::from("next"))?;

    let record = agent.create_object_with_proto(None);
    record.borrow_mut().set_internal("Iterator", iterator);
    record.borrow_mut().set_internal("NextMethod", next);
    Ok(Value::Object(record))
}

/// IteratorNext: invoke the cached `next` and demand an object result.
fn iterator_next(agent: &mut Agent, record: &Value) -> Result<Value, EngineError> {
    let Value::Object(record) = record else {
        return Err(EngineError::internal("IteratorNext on a non-record"));
    };

    // for-in records iterate a key snapshot directly.
    let for_in = {
        let b = record.borrow();
        b.internal("ForInKeys").zip(b.internal("ForInIndex"))
    };
    if let Some((keys, index)) = for_in {
        let Value::Object(keys) = keys else {
            return Err(EngineError::internal("for-in keys are not an array"));
        };
        let idx = index.as_number().unwrap_or(0.0) as u32;
        let size = keys.borrow().array_like_size();
        let result = agent.create_object();
        if idx < size {
            let key = crate::object::get(agent, &keys, &PropertyKey::Index(idx))?;
            record
                .borrow_mut()
                .set_internal("ForInIndex", Value::from(idx + 1));
            crate::object::create_data_property(&result, &PropertyKey::from("value"), key);
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
        return Ok(Value::Object(result));
    }

    let (iterator, next) = {
        let b = record.borrow();
        (
            b.internal("Iterator")
                .ok_or_else(|| EngineError::internal("iterator record without [[Iterator]]"))?,
            b.internal("NextMethod")
                .ok_or_else(|| EngineError::internal("iterator record without [[NextMethod]]"))?,
        )
    };
    let result = call_value(agent, &next, iterator, &[])?;
    if !result.is_object() {
        return Err(agent.type_error("Iterator result is not an object"));
    }
    Ok(result)
}

/// ForInEnumerate: snapshot the enumerable string keys along the prototype
/// chain (shadowed keys reported once).
fn for_in_enumerate(agent: &mut Agent, value: &Value) -> Result<Value, EngineError> {
    let obj = value::to_object(agent, value)?;
    let mut seen: Vec<JsString> = Vec::new();
    let mut keys: Vec<Value> = Vec::new();
    let mut current = Some(obj);
    while let Some(o) = current {
        let own = o.borrow().own_enumerable_string_keys();
        for key in own {
            if let Some(name) = key.as_string_value() {
                if !seen.contains(&name) {
                    seen.push(name.cheap_clone());
                    keys.push(Value::String(name));
                }
            }
        }
        current = o.borrow().get_prototype_of();
    }
    let realm = agent.current_realm();
    let keys_array = crate::builtins::create_array(agent, &realm, keys);
    let record = agent.create_object_with_proto(None);
    record
        .borrow_mut()
        .set_internal("ForInKeys", Value::Object(keys_array));
    record
        .borrow_mut()
        .set_internal("ForInIndex", Value::Number(0.0));
    Ok(Value::Object(record))
}

