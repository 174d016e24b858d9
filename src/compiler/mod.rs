//! Bytecode compiler
//!
//! Lowers the annotated AST into `FunctionInfo` trees. Scope analysis
//! happens on entry to each scope: sources that were never captured and
//! carry no environment-level semantics get direct local slots, everything
//! else gets a slot in the scope's declarative environment record with
//! compile-time distances.

mod compile_expr;
mod compile_stmt;
mod scope;

use std::rc::Rc;

use crate::ast::*;
use crate::error::{ParseError, Span};
use crate::ir::{
    FunctionBuilder, FunctionInfo, JumpKind, JumpPlaceholder, LocalKind, Opcode, SlotIndex,
    RECEIVER_SLOT, RESERVED_SLOTS,
};
use crate::value::{CheapClone, JsString};

pub type CResult<T> = Result<T, CompileError>;

/// Error during lowering; surfaced to embedders as a parse-stage failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    pub span: Span,
}

impl CompileError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl From<CompileError> for ParseError {
    fn from(e: CompileError) -> Self {
        ParseError::new(e.message, e.span)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Loop,
    Switch,
    /// Labelled block: only a labelled break targets it.
    Block,
}

/// Break/continue target bookkeeping for one labelled (or plain) section.
struct Section {
    label: Option<JsString>,
    kind: SectionKind,
    break_jumps: Vec<JumpPlaceholder>,
    continue_jumps: Vec<JumpPlaceholder>,
    env_depth: usize,
    finally_depth: usize,
}

/// A pending finally block; early exits compile it inline on their way out.
struct FinallyEntry<'ast> {
    statements: &'ast [Statement],
    scope: &'ast ScopeRef,
    env_depth: usize,
}

/// What kind of function body the current frame compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Script,
    Module,
    Function,
    DerivedConstructor,
}

struct Frame<'ast> {
    builder: FunctionBuilder,
    kind: FrameKind,
    sections: Vec<Section>,
    finallys: Vec<FinallyEntry<'ast>>,
    /// Top-level scripts accumulate their completion value here.
    completion_slot: Option<SlotIndex>,
    /// Scratch slot for the value travelling through an early exit that
    /// crosses finally blocks.
    scratch_slot: Option<SlotIndex>,
    /// Scratch slot for the value a yield hands back to the caller.
    yield_slot: Option<SlotIndex>,
    is_generator: bool,
    /// Jump placeholders escaping the current optional chain.
    optional_jumps: Vec<Vec<JumpPlaceholder>>,
}

pub struct Compiler<'ast> {
    /// Scope ids of every environment record on the compile-time chain,
    /// outermost first. Spans function boundaries, exactly like the runtime
    /// chain closures capture.
    env_chain: Vec<usize>,
    frames: Vec<Frame<'ast>>,
    /// Name an anonymous function expression inherits from its binding.
    pending_name: Option<JsString>,
    /// Module env slot reserved for `export default`.
    default_export_slot: Option<u32>,
}

/// One `import ... from "specifier"` of a module.
#[derive(Debug, Clone)]
pub struct ModuleRequest {
    pub specifier: JsString,
    /// `(exported name, local module-env slot)` pairs.
    pub bindings: Vec<(JsString, u32)>,
    /// Local slot receiving the default export.
    pub default: Option<u32>,
}

/// Module wiring the runner applies before executing the body.
#[derive(Debug, Clone, Default)]
pub struct ModuleMeta {
    pub requests: Vec<ModuleRequest>,
    /// `(exported name, module-env slot)` pairs.
    pub exports: Vec<(JsString, u32)>,
    pub env_slot_count: u32,
}

pub struct CompiledProgram {
    pub info: Rc<FunctionInfo>,
    pub module: Option<ModuleMeta>,
}

/// Compile a parsed program into its top-level `FunctionInfo`.
pub fn compile_program(program: &Program) -> CResult<CompiledProgram> {
    let mut compiler = Compiler {
        env_chain: Vec::new(),
        frames: Vec::new(),
        pending_name: None,
        default_export_slot: None,
    };
    compiler.compile_top_level(program)
}

impl<'ast> Compiler<'ast> {
    fn frame(&mut self) -> &mut Frame<'ast> {
        self.frames.last_mut().expect("no active frame")
    }

    fn builder(&mut self) -> &mut FunctionBuilder {
        &mut self.frames.last_mut().expect("no active frame").builder
    }

    fn emit(&mut self, op: Opcode) -> usize {
        self.builder().add_opcode(op)
    }

    fn set_span(&mut self, span: Span) {
        self.builder().set_span(span);
    }

    // ─── top level ─────────────────────────────────────────────────────────

    fn compile_top_level(&mut self, program: &'ast Program) -> CResult<CompiledProgram> {
        let kind = if program.is_module {
            FrameKind::Module
        } else {
            FrameKind::Script
        };
        let name = JsString::from(if program.is_module { "<module>" } else { "<script>" });
        let builder = FunctionBuilder::new(
            name,
            0,
            program.scope.is_strict.get(),
            true,
            false,
        );
        self.frames.push(Frame {
            builder,
            kind,
            sections: Vec::new(),
            finallys: Vec::new(),
            completion_slot: None,
            scratch_slot: None,
            yield_slot: None,
            is_generator: false,
            optional_jumps: Vec::new(),
        });

        // Scripts and modules both report the value of their last
        // expression statement as the completion value.
        let completion = self.builder().new_local_slot(LocalKind::Value);
        self.frame().completion_slot = Some(completion);
        self.emit(Opcode::PushUndefined);
        self.emit(Opcode::StoreValue(completion));

        let mut module_meta = None;
        if program.is_module {
            // Module bindings all live in the module root environment.
            scope::assign_module_slots(&program.scope);
            let mut slot_count = program.scope.env_slot_count.get();
            let has_default = program.statements.iter().any(
                |s| matches!(s, Statement::Export { default: Some(_), .. }),
            );
            if has_default {
                self.default_export_slot = Some(slot_count);
                slot_count += 1;
            }
            module_meta = Some(self.collect_module_meta(program, slot_count)?);
            self.emit(Opcode::PushModuleEnvRecord(slot_count as u16));
            self.env_chain.push(program.scope.id);
            // Module `var` bindings hoist as undefined.
            let var_slots: Vec<SlotIndex> = program
                .scope
                .sources
                .borrow()
                .iter()
                .filter(|s| s.vtype == VariableType::Var && !s.is_this_binding)
                .map(|s| s.slot.get() as SlotIndex)
                .collect();
            for slot in var_slots {
                self.emit(Opcode::PushUndefined);
                self.emit(Opcode::StoreCurrentEnvSlot(slot));
            }
            self.hoist_functions_in(&program.statements)?;
        } else {
            // Global declaration instantiation: classify and declare, then
            // create top-level function closures.
            let decls = scope::global_declarations(&program.scope);
            let idx = self.builder().add_declarations(decls);
            self.emit(Opcode::DeclareGlobals(idx));

            self.enter_scope_slots(&program.scope)?;
            // Top-level arrows may capture the global receiver.
            if let Some(this_source) = scope::this_source(&program.scope) {
                if this_source.used.get() {
                    self.emit(Opcode::LoadValue(RECEIVER_SLOT));
                    self.store_source(&this_source);
                }
            }
            self.hoist_functions_in(&program.statements)?;
        }

        for statement in &program.statements {
            self.compile_statement(statement)?;
        }

        if !self.builder().is_done() {
            match self.frame().completion_slot {
                Some(slot) => {
                    self.emit(Opcode::LoadValue(slot));
                }
                None => {
                    self.emit(Opcode::PushUndefined);
                }
            }
            self.emit(Opcode::Return);
        }

        if program.is_module {
            self.env_chain.pop();
        } else if program.scope.creates_env() {
            self.env_chain.pop();
        }

        let frame = self.frames.pop().expect("frame");
        Ok(CompiledProgram {
            info: Rc::new(frame.builder.finalize()),
            module: module_meta,
        })
    }

    /// Gather the import requests and the export table of a module.
    fn collect_module_meta(
        &mut self,
        program: &'ast Program,
        env_slot_count: u32,
    ) -> CResult<ModuleMeta> {
        let mut meta = ModuleMeta {
            env_slot_count,
            ..Default::default()
        };
        for statement in &program.statements {
            match statement {
                Statement::Import {
                    specifiers,
                    default,
                    module,
                } => {
                    let request = ModuleRequest {
                        specifier: module.cheap_clone(),
                        bindings: specifiers
                            .iter()
                            .map(|s| (s.imported.cheap_clone(), s.local.slot.get()))
                            .collect(),
                        default: default.as_ref().map(|d| d.slot.get()),
                    };
                    meta.requests.push(request);
                }
                Statement::Export {
                    declaration,
                    specifiers,
                    default,
                } => {
                    if let Some(decl) = declaration {
                        match &**decl {
                            Statement::Declaration(var) => {
                                for declarator in &var.declarators {
                                    meta.exports.push((
                                        declarator.source.name.cheap_clone(),
                                        declarator.source.slot.get(),
                                    ));
                                }
                            }
                            Statement::FunctionDeclaration { source, .. }
                            | Statement::ClassDeclaration { source, .. } => {
                                meta.exports
                                    .push((source.name.cheap_clone(), source.slot.get()));
                            }
                            _ => {}
                        }
                    }
                    for spec in specifiers {
                        let Some(source) = program.scope.find_source(&spec.local) else {
                            return Err(CompileError::new(
                                format!("Export of undeclared binding '{}'", spec.local),
                                Span::default(),
                            ));
                        };
                        meta.exports
                            .push((spec.exported.cheap_clone(), source.slot.get()));
                    }
                    if default.is_some() {
                        let slot = self.default_export_slot.expect("default slot");
                        meta.exports.push((JsString::from("default"), slot));
                    }
                }
                _ => {}
            }
        }
        Ok(meta)
    }

    // ─── functions ─────────────────────────────────────────────────────────

    /// Compile a function body into a child `FunctionInfo` and return its
    /// index in the current builder.
    fn compile_function(
        &mut self,
        func: &'ast FunctionNode,
        kind_override: Option<FrameKind>,
    ) -> CResult<u16> {
        let name = func
            .name
            .as_ref()
            .cloned()
            .or_else(|| self.pending_name.take())
            .unwrap_or_else(|| JsString::from(""));
        let frame_kind = kind_override.unwrap_or(FrameKind::Function);
        let mut builder = FunctionBuilder::new(
            name,
            func.params.len() as u16,
            func.scope.is_strict.get(),
            false,
            func.is_generator,
        );
        if func.is_arrow {
            builder.set_arrow();
        }
        self.frames.push(Frame {
            builder,
            kind: frame_kind,
            sections: Vec::new(),
            finallys: Vec::new(),
            completion_slot: None,
            scratch_slot: None,
            yield_slot: None,
            is_generator: func.is_generator,
            optional_jumps: Vec::new(),
        });
        self.set_span(func.span);

        if func.is_generator {
            self.builder().emit_jump_table();
        }

        // Scope analysis for the function scope, then the prologue.
        scope::assign_function_slots(func, &mut self.frame().builder);
        let pushed_env = func.scope.creates_env();
        if pushed_env {
            let n = func.scope.env_slot_count.get() as u16;
            self.emit(Opcode::PushDeclarativeEnvRecord(n));
            self.env_chain.push(func.scope.id);
        }

        self.compile_function_prologue(func)?;

        match &func.body {
            FunctionBody::Block(statements) => {
                self.hoist_functions_in(statements)?;
                for statement in statements {
                    self.compile_statement(statement)?;
                }
                if !self.builder().is_done() {
                    self.emit_function_epilogue();
                }
            }
            FunctionBody::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(Opcode::Return);
            }
        }

        if pushed_env {
            self.env_chain.pop();
        }
        let frame = self.frames.pop().expect("frame");
        let info = Rc::new(frame.builder.finalize());
        Ok(self.builder().add_child_function(info))
    }

    /// Default epilogue for block-bodied functions falling off the end.
    fn emit_function_epilogue(&mut self) {
        if self.frame().kind == FrameKind::DerivedConstructor {
            // The receiver must have been initialized by super().
            self.emit(Opcode::LoadValue(RECEIVER_SLOT));
            let ok = self.builder().emit_jump(JumpKind::IfNotEmpty);
            self.emit(Opcode::ThrowSuperNotCalledError);
            self.builder().patch_jump(ok);
            self.emit(Opcode::Return);
        } else {
            self.emit(Opcode::PushUndefined);
            self.emit(Opcode::Return);
        }
    }

    fn compile_function_prologue(&mut self, func: &'ast FunctionNode) -> CResult<()> {
        // Captured `var` bindings live in the environment; they hoist as
        // undefined, not as dead-zone slots.
        let var_env_slots: Vec<SlotIndex> = func
            .scope
            .sources
            .borrow()
            .iter()
            .filter(|s| {
                !s.is_inlineable.get()
                    && s.vtype == VariableType::Var
                    && !s.is_arguments_object
                    && !s.is_this_binding
            })
            .map(|s| s.slot.get() as SlotIndex)
            .collect();
        for slot in var_env_slots {
            self.emit(Opcode::PushUndefined);
            self.emit(Opcode::StoreCurrentEnvSlot(slot));
        }

        // Parameters: defaults, then copies into the environment for
        // captured ones. Arguments arrive in the reserved arg slots.
        for (i, param) in func.params.iter().enumerate() {
            let arg_slot = (RESERVED_SLOTS as usize + i) as SlotIndex;
            if param.rest {
                self.emit(Opcode::CollectRestArgs(i as u16));
                self.emit(Opcode::StoreValue(arg_slot));
            } else if let Some(default) = &param.default {
                self.emit(Opcode::LoadValue(arg_slot));
                let skip = self.builder().emit_jump(JumpKind::IfNotUndefined);
                self.compile_expression(default)?;
                self.emit(Opcode::StoreValue(arg_slot));
                self.builder().patch_jump(skip);
            }
            if !param.source.is_inlineable.get() {
                let env_slot = param.source.slot.get() as SlotIndex;
                self.emit(Opcode::LoadValue(arg_slot));
                self.emit(Opcode::StoreCurrentEnvSlot(env_slot));
            }
        }

        // The implicit `arguments` object.
        if let Some(arguments) = scope::arguments_source(&func.scope) {
            if arguments.used.get() {
                match func.scope.arguments_mode.get() {
                    ArgumentsMode::None => {}
                    ArgumentsMode::Unmapped => {
                        self.emit(Opcode::CreateUnmappedArgumentsObject);
                        self.store_source(&arguments);
                    }
                    ArgumentsMode::Mapped => {
                        self.emit(Opcode::CreateMappedArgumentsObject);
                        self.store_source(&arguments);
                    }
                }
            }
        }

        // Lexical `this` for arrows nested inside this function.
        if let Some(this_source) = scope::this_source(&func.scope) {
            if this_source.used.get() {
                self.emit(Opcode::LoadValue(RECEIVER_SLOT));
                self.store_source(&this_source);
            }
        }

        // Named function expressions bind their own name.
        if let Some(self_source) = &func.self_source {
            if self_source.used.get() {
                self.emit(Opcode::PushClosure);
                self.store_source(self_source);
            }
        }

        Ok(())
    }

    /// Create closures for the function declarations of one statement list
    /// (the declaring scope hoists them above everything else).
    fn hoist_functions_in(&mut self, statements: &'ast [Statement]) -> CResult<()> {
        for statement in statements {
            let (func, source) = match statement {
                Statement::FunctionDeclaration { func, source } => (func, source),
                Statement::Export {
                    declaration: Some(decl),
                    ..
                } => match &**decl {
                    Statement::FunctionDeclaration { func, source } => (func, source),
                    _ => continue,
                },
                _ => continue,
            };
            let idx = self.compile_function(func, None)?;
            let create = if func.is_async && func.is_generator {
                Opcode::CreateAsyncGeneratorClosure(idx)
            } else if func.is_async {
                Opcode::CreateAsyncClosure(idx)
            } else if func.is_generator {
                Opcode::CreateGeneratorClosure(idx)
            } else {
                Opcode::CreateClosure(idx)
            };
            self.emit(create);
            self.store_source(source);
        }
        Ok(())
    }

    // ─── scope entry / exit ────────────────────────────────────────────────

    /// Assign slots for a block-like scope, push its environment record if
    /// it needs one, and reset inlineable lexicals into their dead zone.
    /// Returns whether an env record was pushed.
    fn enter_scope_slots(&mut self, scope: &ScopeRef) -> CResult<bool> {
        scope::assign_block_slots(scope, &mut self.frame().builder);
        let pushed = scope.creates_env();
        if pushed {
            let n = scope.env_slot_count.get() as u16;
            self.emit(Opcode::PushDeclarativeEnvRecord(n));
            self.env_chain.push(scope.id);
        }
        for source in scope.sources.borrow().iter() {
            if source.vtype.has_tdz() && source.is_inlineable.get() {
                self.emit(Opcode::PushEmpty);
                self.emit(Opcode::StoreValue(source.slot.get() as SlotIndex));
            }
        }
        Ok(pushed)
    }

    fn exit_scope(&mut self, pushed: bool) {
        if pushed {
            self.emit(Opcode::PopEnvRecord);
            self.env_chain.pop();
        }
    }

    // ─── variable access ───────────────────────────────────────────────────

    /// Environment distance from the current position to a source's
    /// declaring scope.
    fn env_distance(&self, scope_id: usize) -> u16 {
        let pos = self
            .env_chain
            .iter()
            .rev()
            .position(|id| *id == scope_id)
            .expect("binding's environment is not on the chain");
        pos as u16
    }

    /// Push a source's value, with a TDZ guard for lexical bindings.
    fn load_source(&mut self, source: &SourceRef) {
        match source.mode {
            VariableMode::Global => {
                let idx = self.builder().add_string(source.name.cheap_clone());
                self.emit(Opcode::LoadGlobal(idx));
                return;
            }
            VariableMode::Local | VariableMode::Module => {}
        }
        if source.is_inlineable.get() {
            self.emit(Opcode::LoadValue(source.slot.get() as SlotIndex));
        } else {
            let distance = self.env_distance(source.scope_id);
            let slot = source.slot.get() as SlotIndex;
            if distance == 0 {
                self.emit(Opcode::LoadCurrentEnvSlot(slot));
            } else {
                self.emit(Opcode::LoadEnvSlot { slot, distance });
            }
        }
        if source.vtype.has_tdz() {
            self.emit_tdz_guard(&source.name);
        }
    }

    /// Guard the value on top of the stack against the dead-zone sentinel.
    fn emit_tdz_guard(&mut self, name: &JsString) {
        let idx = self.builder().add_string(name.cheap_clone());
        let ok = self.builder().emit_jump(JumpKind::IfNotEmpty);
        self.emit(Opcode::ThrowLexicalAccessError(idx));
        self.builder().patch_jump(ok);
    }

    /// Pop the top of stack into a source's storage (no const/TDZ checks;
    /// used for initialization).
    fn store_source(&mut self, source: &SourceRef) {
        match source.mode {
            VariableMode::Global => {
                let idx = self.builder().add_string(source.name.cheap_clone());
                if source.vtype.has_tdz() {
                    self.emit(Opcode::InitializeGlobalLexical(idx));
                } else {
                    self.emit(Opcode::StoreGlobal(idx));
                }
                return;
            }
            VariableMode::Local | VariableMode::Module => {}
        }
        if source.is_inlineable.get() {
            self.emit(Opcode::StoreValue(source.slot.get() as SlotIndex));
        } else {
            let distance = self.env_distance(source.scope_id);
            let slot = source.slot.get() as SlotIndex;
            if distance == 0 {
                self.emit(Opcode::StoreCurrentEnvSlot(slot));
            } else {
                self.emit(Opcode::StoreEnvSlot { slot, distance });
            }
        }
    }

    /// Pop the top of stack into a source as a user-level assignment:
    /// const reassignment throws, lexicals get a dead-zone check.
    fn assign_source(&mut self, source: &SourceRef, span: Span) -> CResult<()> {
        let _ = span;
        if source.vtype == VariableType::Const {
            let idx = self.builder().add_string(source.name.cheap_clone());
            self.emit(Opcode::ThrowConstantReassignmentError(idx));
            return Ok(());
        }
        if source.vtype.has_tdz() && source.mode != VariableMode::Global {
            // Assignment before initialization throws too.
            self.load_source_raw(source);
            self.emit_tdz_guard(&source.name);
            self.emit(Opcode::Pop);
        }
        self.store_source(source);
        Ok(())
    }

    /// Load without the TDZ guard (guard emission sites add their own).
    fn load_source_raw(&mut self, source: &SourceRef) {
        if source.mode == VariableMode::Global {
            let idx = self.builder().add_string(source.name.cheap_clone());
            self.emit(Opcode::LoadGlobal(idx));
            return;
        }
        if source.is_inlineable.get() {
            self.emit(Opcode::LoadValue(source.slot.get() as SlotIndex));
        } else {
            let distance = self.env_distance(source.scope_id);
            let slot = source.slot.get() as SlotIndex;
            if distance == 0 {
                self.emit(Opcode::LoadCurrentEnvSlot(slot));
            } else {
                self.emit(Opcode::LoadEnvSlot { slot, distance });
            }
        }
    }

    // ─── sections (break/continue) ─────────────────────────────────────────

    fn push_section(&mut self, label: Option<JsString>, kind: SectionKind) {
        let env_depth = self.env_chain.len();
        let finally_depth = self.frame().finallys.len();
        self.frame().sections.push(Section {
            label,
            kind,
            break_jumps: Vec::new(),
            continue_jumps: Vec::new(),
            env_depth,
            finally_depth,
        });
    }

    /// Close a section: patch breaks to here and continues to `continue_to`.
    fn pop_section(&mut self, continue_to: Option<usize>) {
        let section = self.frame().sections.pop().expect("section underflow");
        let height = self.builder().height();
        for jump in section.break_jumps {
            self.builder().patch_jump(jump);
        }
        if let Some(target) = continue_to {
            for jump in section.continue_jumps {
                self.builder().patch_jump_to(jump, target as u32);
            }
        }
        self.builder().set_height(height);
    }

    fn find_section(&self, label: Option<&JsString>, for_continue: bool) -> Option<usize> {
        let frame = self.frames.last()?;
        for (i, section) in frame.sections.iter().enumerate().rev() {
            if for_continue && section.kind != SectionKind::Loop {
                continue;
            }
            match label {
                Some(l) => {
                    if section.label.as_ref() == Some(l) {
                        return Some(i);
                    }
                }
                None => {
                    if section.kind != SectionKind::Block {
                        return Some(i);
                    }
                }
            }
        }
        None
    }

    fn compile_break(&mut self, label: Option<&JsString>, span: Span) -> CResult<()> {
        let Some(index) = self.find_section(label, false) else {
            return Err(CompileError::new("Illegal break statement", span));
        };
        let (env_depth, finally_depth) = {
            let s = &self.frames.last().expect("frame").sections[index];
            (s.env_depth, s.finally_depth)
        };
        // The exit path leaves scopes at runtime; mirror that on the
        // compile-time chain so finally bodies see their own distances,
        // then restore it for the (unreachable) code after the jump.
        let saved_chain = self.env_chain.clone();
        self.unwind_finallys(finally_depth)?;
        self.pop_envs_to(env_depth);
        let jump = self.builder().emit_jump(JumpKind::Unconditional);
        self.env_chain = saved_chain;
        self.frame().sections[index].break_jumps.push(jump);
        Ok(())
    }

    fn compile_continue(&mut self, label: Option<&JsString>, span: Span) -> CResult<()> {
        let Some(index) = self.find_section(label, true) else {
            return Err(CompileError::new("Illegal continue statement", span));
        };
        let (env_depth, finally_depth) = {
            let s = &self.frames.last().expect("frame").sections[index];
            (s.env_depth, s.finally_depth)
        };
        let saved_chain = self.env_chain.clone();
        self.unwind_finallys(finally_depth)?;
        self.pop_envs_to(env_depth);
        let jump = self.builder().emit_jump(JumpKind::Unconditional);
        self.env_chain = saved_chain;
        self.frame().sections[index].continue_jumps.push(jump);
        Ok(())
    }

    /// Emit environment pops down to `depth`, truncating the compile-time
    /// chain in step. Callers restore the chain after the exit jump.
    fn pop_envs_to(&mut self, depth: usize) {
        while self.env_chain.len() > depth {
            self.emit(Opcode::PopEnvRecord);
            self.env_chain.pop();
        }
    }

    /// Inline the pending finally blocks (innermost first) down to `depth`,
    /// as an early exit passes through them. Each body compiles at the
    /// environment depth its `try` was entered with.
    fn unwind_finallys(&mut self, depth: usize) -> CResult<()> {
        let count = self.frame().finallys.len();
        for i in (depth..count).rev() {
            let (statements, scope, env_depth) = {
                let entry = &self.frames.last().expect("frame").finallys[i];
                (entry.statements, entry.scope, entry.env_depth)
            };
            self.pop_envs_to(env_depth);
            self.compile_finally_body(statements, scope)?;
        }
        Ok(())
    }

    fn compile_finally_body(
        &mut self,
        statements: &'ast [Statement],
        scope: &'ast ScopeRef,
    ) -> CResult<()> {
        let pushed = self.enter_scope_slots(scope)?;
        self.hoist_functions_in(statements)?;
        for statement in statements {
            self.compile_statement(statement)?;
        }
        self.exit_scope(pushed);
        Ok(())
    }

    /// A scratch Value local for values that must survive stack unwinds.
    fn scratch_slot(&mut self) -> SlotIndex {
        if let Some(slot) = self.frame().scratch_slot {
            return slot;
        }
        let slot = self.builder().new_local_slot(LocalKind::Value);
        self.frame().scratch_slot = Some(slot);
        slot
    }

    fn compile_return(&mut self, argument: Option<&'ast Expression>, span: Span) -> CResult<()> {
        self.set_span(span);
        if self.frame().kind == FrameKind::Script || self.frame().kind == FrameKind::Module {
            return Err(CompileError::new("Illegal return statement", span));
        }

        let has_finallys = !self.frame().finallys.is_empty();
        let derived = self.frame().kind == FrameKind::DerivedConstructor;

        match argument {
            Some(expr) => {
                self.compile_expression(expr)?;
            }
            None => {
                if derived {
                    // `return;` in a derived constructor returns the
                    // receiver, which must have been initialized.
                    self.emit(Opcode::LoadValue(RECEIVER_SLOT));
                    let ok = self.builder().emit_jump(JumpKind::IfNotEmpty);
                    self.emit(Opcode::ThrowSuperNotCalledError);
                    self.builder().patch_jump(ok);
                } else {
                    self.emit(Opcode::PushUndefined);
                }
            }
        }

        if has_finallys {
            let slot = self.scratch_slot();
            self.emit(Opcode::StoreValue(slot));
            let saved_chain = self.env_chain.clone();
            self.unwind_finallys(0)?;
            self.env_chain = saved_chain;
            self.emit(Opcode::LoadValue(slot));
        }
        if self.frame().is_generator {
            // A completed generator reports done on every later resume.
            self.emit(Opcode::SetGeneratorPhase(crate::object::GENERATOR_DONE));
        }
        self.emit(Opcode::Return);
        Ok(())
    }
}
