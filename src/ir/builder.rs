//! FunctionBuilder - helper for emitting opcodes
//!
//! Provides jump placeholders with patching, constant-pool deduplication,
//! local slot allocation, handler-region registration, and linear stack
//! height tracking (the validator re-derives heights independently).

use std::rc::Rc;

use num_bigint::BigInt;
use rustc_hash::FxHashMap;

use crate::error::Span;
use crate::value::{CheapClone, JsString};

use super::{
    Constant, ConstIndex, FunctionInfo, GlobalDeclarations, HandlerRegion, JumpTarget, LocalKind,
    Opcode, SlotIndex, RESERVED_SLOTS,
};

/// A jump whose target is patched once the destination is known.
#[derive(Debug, Clone, Copy)]
pub struct JumpPlaceholder {
    pub instruction_index: usize,
}

/// Which conditional form a reserved jump uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Unconditional,
    IfTrue,
    IfFalse,
    IfToBooleanTrue,
    IfToBooleanFalse,
    IfUndefined,
    IfNotUndefined,
    IfNotNullish,
    IfNotEmpty,
}

impl JumpKind {
    fn opcode(self, target: JumpTarget) -> Opcode {
        match self {
            JumpKind::Unconditional => Opcode::Jump(target),
            JumpKind::IfTrue => Opcode::JumpIfTrue(target),
            JumpKind::IfFalse => Opcode::JumpIfFalse(target),
            JumpKind::IfToBooleanTrue => Opcode::JumpIfToBooleanTrue(target),
            JumpKind::IfToBooleanFalse => Opcode::JumpIfToBooleanFalse(target),
            JumpKind::IfUndefined => Opcode::JumpIfUndefined(target),
            JumpKind::IfNotUndefined => Opcode::JumpIfNotUndefined(target),
            JumpKind::IfNotNullish => Opcode::JumpIfNotNullish(target),
            JumpKind::IfNotEmpty => Opcode::JumpIfNotEmpty(target),
        }
    }
}

/// Builder for one `FunctionInfo`.
pub struct FunctionBuilder {
    name: JsString,
    opcodes: Vec<Opcode>,
    locations: Vec<Span>,
    current_span: Span,

    constants: Vec<Constant>,
    string_map: FxHashMap<JsString, ConstIndex>,
    number_map: FxHashMap<u64, ConstIndex>,

    locals: Vec<LocalKind>,
    arg_count: u16,
    param_count: u16,
    is_strict: bool,
    is_top_level: bool,
    is_generator: bool,
    is_arrow: bool,

    children: Vec<Rc<FunctionInfo>>,
    handlers: Vec<HandlerRegion>,

    /// Set while the last emitted opcode is an unconditional terminator;
    /// suppresses fall-through emission.
    done: bool,
    /// Linear stack height at the current emission point.
    height: u32,

    /// Generator re-entry targets; index 0 is the initial entry.
    phase_targets: Vec<JumpTarget>,
    jump_table_index: Option<usize>,
}

impl FunctionBuilder {
    pub fn new(
        name: JsString,
        param_count: u16,
        is_strict: bool,
        is_top_level: bool,
        is_generator: bool,
    ) -> Self {
        let arg_count = RESERVED_SLOTS + param_count;
        Self {
            name,
            opcodes: Vec::new(),
            locations: Vec::new(),
            current_span: Span::default(),
            constants: Vec::new(),
            string_map: FxHashMap::default(),
            number_map: FxHashMap::default(),
            locals: vec![LocalKind::Value; arg_count as usize],
            arg_count,
            param_count,
            is_strict,
            is_top_level,
            is_generator,
            is_arrow: false,
            children: Vec::new(),
            handlers: Vec::new(),
            done: false,
            height: 0,
            phase_targets: Vec::new(),
            jump_table_index: None,
        }
    }

    // ─── emission ──────────────────────────────────────────────────────────

    pub fn set_span(&mut self, span: Span) {
        self.current_span = span;
    }

    /// Emit an opcode, returning its index.
    pub fn add_opcode(&mut self, op: Opcode) -> usize {
        let index = self.opcodes.len();
        let (pops, pushes) = op.stack_effect();
        self.height = self.height.saturating_sub(pops) + pushes;
        self.done = op.is_terminator();
        self.locations.push(self.current_span);
        self.opcodes.push(op);
        index
    }

    pub fn opcode_count(&self) -> usize {
        self.opcodes.len()
    }

    /// Whether the last opcode was an unconditional terminator; callers use
    /// this to suppress dead fall-through emission.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// A label was just bound here; control can arrive via a jump.
    pub fn mark_reachable(&mut self) {
        self.done = false;
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_height(&mut self, height: u32) {
        self.height = height;
    }

    // ─── locals ────────────────────────────────────────────────────────────

    pub fn new_local_slot(&mut self, kind: LocalKind) -> SlotIndex {
        let slot = self.locals.len() as SlotIndex;
        self.locals.push(kind);
        slot
    }

    pub fn get_locals(&self) -> &[LocalKind] {
        &self.locals
    }

    // ─── jumps ─────────────────────────────────────────────────────────────

    /// Reserve a jump with a placeholder target.
    pub fn emit_jump(&mut self, kind: JumpKind) -> JumpPlaceholder {
        let index = self.add_opcode(kind.opcode(JumpTarget::MAX));
        JumpPlaceholder {
            instruction_index: index,
        }
    }

    /// Patch a placeholder to the current instruction index.
    pub fn patch_jump(&mut self, placeholder: JumpPlaceholder) {
        let target = self.opcodes.len() as JumpTarget;
        self.patch_jump_to(placeholder, target);
        self.done = false;
    }

    pub fn patch_jump_to(&mut self, placeholder: JumpPlaceholder, target: JumpTarget) {
        match &mut self.opcodes[placeholder.instruction_index] {
            Opcode::Jump(t)
            | Opcode::JumpIfTrue(t)
            | Opcode::JumpIfFalse(t)
            | Opcode::JumpIfToBooleanTrue(t)
            | Opcode::JumpIfToBooleanFalse(t)
            | Opcode::JumpIfUndefined(t)
            | Opcode::JumpIfNotUndefined(t)
            | Opcode::JumpIfNotNullish(t)
            | Opcode::JumpIfNotEmpty(t) => *t = target,
            other => panic!("patching a non-jump opcode {:?}", other),
        }
    }

    pub fn emit_jump_to(&mut self, target: usize) {
        self.add_opcode(Opcode::Jump(target as JumpTarget));
    }

    /// Reserve a conditional jump, run the block, then patch the jump to the
    /// instruction after the block.
    pub fn if_helper<E>(
        &mut self,
        kind: JumpKind,
        body: impl FnOnce(&mut Self) -> Result<(), E>,
    ) -> Result<(), E> {
        let placeholder = self.emit_jump(kind);
        let entry_height = self.height;
        body(self)?;
        self.patch_jump(placeholder);
        self.height = entry_height;
        Ok(())
    }

    /// Two-armed variant: the reserved jump skips into the else block.
    pub fn if_else_helper<E>(
        &mut self,
        kind: JumpKind,
        then_body: impl FnOnce(&mut Self) -> Result<(), E>,
        else_body: impl FnOnce(&mut Self) -> Result<(), E>,
    ) -> Result<(), E> {
        let to_else = self.emit_jump(kind);
        let entry_height = self.height;
        then_body(self)?;
        let exit_height = self.height;
        let to_end = self.emit_jump(JumpKind::Unconditional);
        self.patch_jump(to_else);
        self.height = entry_height;
        else_body(self)?;
        self.patch_jump(to_end);
        self.height = exit_height;
        Ok(())
    }

    // ─── handler regions ───────────────────────────────────────────────────

    pub fn add_handler_region(&mut self, start: u32, end: u32, handler: u32) {
        self.handlers.push(HandlerRegion { start, end, handler });
    }

    // ─── generator phases ──────────────────────────────────────────────────

    /// Emit the re-entry jump table placeholder at the prologue.
    pub fn emit_jump_table(&mut self) {
        let index = self.add_opcode(Opcode::JumpTable(Vec::new()));
        self.jump_table_index = Some(index);
        // Phase 0 resumes right after the table.
        self.phase_targets.push(index as JumpTarget + 1);
    }

    /// Register the current position as a resume point; returns the phase.
    pub fn add_phase_target(&mut self) -> u32 {
        let phase = self.phase_targets.len() as u32;
        self.phase_targets.push(self.opcodes.len() as JumpTarget);
        self.done = false;
        phase
    }

    /// Reserve a phase whose target is bound later with `set_phase_target`.
    pub fn reserve_phase(&mut self) -> u32 {
        let phase = self.phase_targets.len() as u32;
        self.phase_targets.push(0);
        phase
    }

    pub fn set_phase_target(&mut self, phase: u32) {
        self.phase_targets[phase as usize] = self.opcodes.len() as JumpTarget;
        self.done = false;
    }

    pub fn is_strict(&self) -> bool {
        self.is_strict
    }

    pub fn set_arrow(&mut self) {
        self.is_arrow = true;
    }

    // ─── constants ─────────────────────────────────────────────────────────

    pub fn add_constant(&mut self, constant: Constant) -> ConstIndex {
        let idx = self.constants.len();
        assert!(idx < ConstIndex::MAX as usize, "constant pool overflow");
        self.constants.push(constant);
        idx as ConstIndex
    }

    pub fn add_string(&mut self, s: JsString) -> ConstIndex {
        if let Some(&idx) = self.string_map.get(&s) {
            return idx;
        }
        let idx = self.add_constant(Constant::String(s.cheap_clone()));
        self.string_map.insert(s, idx);
        idx
    }

    pub fn add_number(&mut self, n: f64) -> ConstIndex {
        let bits = n.to_bits();
        if let Some(&idx) = self.number_map.get(&bits) {
            return idx;
        }
        let idx = self.add_constant(Constant::Number(n));
        self.number_map.insert(bits, idx);
        idx
    }

    pub fn add_bigint(&mut self, b: BigInt) -> ConstIndex {
        self.add_constant(Constant::BigInt(Rc::new(b)))
    }

    pub fn add_regexp(&mut self, pattern: JsString, flags: JsString) -> ConstIndex {
        self.add_constant(Constant::RegExp { pattern, flags })
    }

    pub fn add_declarations(&mut self, decls: GlobalDeclarations) -> ConstIndex {
        self.add_constant(Constant::Declarations(Rc::new(decls)))
    }

    // ─── children ──────────────────────────────────────────────────────────

    pub fn add_child_function(&mut self, child: Rc<FunctionInfo>) -> ConstIndex {
        let idx = self.children.len();
        assert!(idx < ConstIndex::MAX as usize, "child function overflow");
        self.children.push(child);
        idx as ConstIndex
    }

    // ─── finalize ──────────────────────────────────────────────────────────

    /// Seal the builder into an immutable `FunctionInfo`, patching the
    /// generator jump table.
    pub fn finalize(mut self) -> FunctionInfo {
        if let Some(index) = self.jump_table_index {
            self.opcodes[index] = Opcode::JumpTable(std::mem::take(&mut self.phase_targets));
        }
        FunctionInfo {
            name: self.name,
            opcodes: self.opcodes.into_boxed_slice(),
            locals: self.locals.into_boxed_slice(),
            arg_count: self.arg_count,
            param_count: self.param_count,
            is_strict: self.is_strict,
            is_top_level: self.is_top_level,
            is_generator: self.is_generator,
            is_arrow: self.is_arrow,
            children: self.children,
            handlers: self.handlers,
            constants: self.constants,
            locations: self.locations.into_boxed_slice(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> FunctionBuilder {
        FunctionBuilder::new(JsString::from("test"), 0, false, false, false)
    }

    #[test]
    fn test_emit_and_count() {
        let mut b = builder();
        b.add_opcode(Opcode::PushUndefined);
        b.add_opcode(Opcode::Return);
        assert_eq!(b.opcode_count(), 2);
        assert!(b.is_done());
        let info = b.finalize();
        assert_eq!(info.opcodes.len(), 2);
        assert_eq!(info.arg_count, RESERVED_SLOTS);
    }

    #[test]
    fn test_jump_patching() {
        let mut b = builder();
        b.add_opcode(Opcode::PushBoolean(true));
        let skip = b.emit_jump(JumpKind::IfTrue);
        b.add_opcode(Opcode::PushNull);
        b.add_opcode(Opcode::Pop);
        b.patch_jump(skip);
        let info = b.finalize();
        assert_eq!(info.opcodes[1], Opcode::JumpIfTrue(4));
    }

    #[test]
    fn test_if_helper_patches_past_body() {
        let mut b = builder();
        b.add_opcode(Opcode::PushBoolean(false));
        b.if_helper::<()>(JumpKind::IfToBooleanFalse, |b| {
            b.add_opcode(Opcode::PushUndefined);
            b.add_opcode(Opcode::Pop);
            Ok(())
        })
        .unwrap();
        let info = b.finalize();
        assert_eq!(info.opcodes[1], Opcode::JumpIfToBooleanFalse(4));
        assert_eq!(info.opcodes.len(), 4);
    }

    #[test]
    fn test_string_constants_deduplicate() {
        let mut b = builder();
        let a = b.add_string(JsString::from("x"));
        let c = b.add_string(JsString::from("x"));
        let d = b.add_string(JsString::from("y"));
        assert_eq!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_height_tracking() {
        let mut b = builder();
        assert_eq!(b.height(), 0);
        b.add_opcode(Opcode::PushUndefined);
        b.add_opcode(Opcode::PushNull);
        assert_eq!(b.height(), 2);
        b.add_opcode(Opcode::Call(0));
        assert_eq!(b.height(), 1);
    }

    #[test]
    fn test_jump_table_finalize() {
        let mut b = FunctionBuilder::new(JsString::from("gen"), 0, false, false, true);
        b.emit_jump_table();
        b.add_opcode(Opcode::PushUndefined);
        let phase = b.add_phase_target();
        b.add_opcode(Opcode::Return);
        assert_eq!(phase, 1);
        let info = b.finalize();
        assert_eq!(info.opcodes[0], Opcode::JumpTable(vec![1, 2]));
    }
}
