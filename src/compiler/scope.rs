//! Scope analysis
//!
//! Decides, per declared source, whether it compiles to a direct local
//! slot or to an environment slot. A source is inlineable when it is
//! local, never captured by a nested closure, and not hoisted into global
//! or module storage; everything else gets a slot in its scope's
//! environment record.

use crate::ast::{
    FunctionNode, Scope, ScopeRef, SourceRef, VariableMode, VariableType,
};
use crate::ir::{FunctionBuilder, GlobalDeclarations, LocalKind, RESERVED_SLOTS};

fn is_inlineable(source: &SourceRef) -> bool {
    source.mode == VariableMode::Local && !source.captured.get()
}

/// Slot assignment for a function scope. Parameters reuse their argument
/// slots when inlineable; captured ones get environment slots and a
/// prologue copy.
pub fn assign_function_slots(func: &FunctionNode, builder: &mut FunctionBuilder) {
    let scope = &func.scope;
    let mut env_slots = 0u32;
    let mut inlineable = 0u32;

    for (i, param) in func.params.iter().enumerate() {
        let source = &param.source;
        if is_inlineable(source) {
            source.is_inlineable.set(true);
            source.slot.set((RESERVED_SLOTS as usize + i) as u32);
            inlineable += 1;
        } else {
            source.is_inlineable.set(false);
            source.slot.set(env_slots);
            env_slots += 1;
        }
    }

    for source in scope.sources.borrow().iter() {
        if source.vtype == VariableType::Parameter {
            continue;
        }
        if is_inlineable(source) {
            source.is_inlineable.set(true);
            source.slot.set(builder.new_local_slot(LocalKind::Value) as u32);
            inlineable += 1;
        } else {
            source.is_inlineable.set(false);
            source.slot.set(env_slots);
            env_slots += 1;
        }
    }

    scope.env_slot_count.set(env_slots);
    scope.inlineable_local_count.set(inlineable);
}

/// Slot assignment for block, catch, switch, and for-head scopes. Global
/// sources (script top level) have no slots at all.
pub fn assign_block_slots(scope: &ScopeRef, builder: &mut FunctionBuilder) {
    let mut env_slots = 0u32;
    let mut inlineable = 0u32;
    for source in scope.sources.borrow().iter() {
        if source.mode == VariableMode::Global {
            continue;
        }
        if is_inlineable(source) {
            source.is_inlineable.set(true);
            source.slot.set(builder.new_local_slot(LocalKind::Value) as u32);
            inlineable += 1;
        } else {
            source.is_inlineable.set(false);
            source.slot.set(env_slots);
            env_slots += 1;
        }
    }
    scope.env_slot_count.set(env_slots);
    scope.inlineable_local_count.set(inlineable);
}

/// Module roots keep every binding in the module environment so exports
/// and live import bindings can reference them by slot.
pub fn assign_module_slots(scope: &ScopeRef) {
    let mut env_slots = 0u32;
    for source in scope.sources.borrow().iter() {
        source.is_inlineable.set(false);
        source.slot.set(env_slots);
        env_slots += 1;
    }
    scope.env_slot_count.set(env_slots);
    scope.inlineable_local_count.set(0);
}

/// Partition a script scope's declarations for `DeclareGlobals`.
pub fn global_declarations(scope: &ScopeRef) -> GlobalDeclarations {
    let mut decls = GlobalDeclarations::default();
    for source in scope.sources.borrow().iter() {
        if source.is_arguments_object || source.is_this_binding {
            continue;
        }
        let name = source.name.clone();
        match source.vtype {
            VariableType::Var => decls.vars.push(name),
            VariableType::Function => decls.functions.push(name),
            VariableType::Let | VariableType::Class => decls.lets.push(name),
            VariableType::Const => decls.consts.push(name),
            VariableType::Parameter => {}
        }
    }
    decls
}

pub fn arguments_source(scope: &Scope) -> Option<SourceRef> {
    scope
        .sources
        .borrow()
        .iter()
        .find(|s| s.is_arguments_object)
        .cloned()
}

pub fn this_source(scope: &Scope) -> Option<SourceRef> {
    scope
        .sources
        .borrow()
        .iter()
        .find(|s| s.is_this_binding)
        .cloned()
}
