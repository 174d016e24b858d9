//! Expression lowering
//!
//! Every expression compiles to a net effect of exactly one pushed value.
//! Short-circuit forms lower to conditional jumps, update and member
//! assignments juggle with `Dup`/`DupX1` (or scratch locals for keyed
//! targets), and optional chains thread their short-circuit jumps through
//! the frame.

use crate::ast::*;
use crate::error::Span;
use crate::ir::{
    JumpKind, LocalKind, MethodKind, MethodPlacement, Opcode, SlotIndex, NEW_TARGET_SLOT,
    RECEIVER_SLOT,
};
use crate::value::{number_to_string, CheapClone, JsString};

use super::{CompileError, Compiler, CResult, FrameKind};

impl<'ast> Compiler<'ast> {
    pub(super) fn compile_expression(&mut self, expr: &'ast Expression) -> CResult<()> {
        match expr {
            Expression::Number(n) => {
                let idx = self.builder().add_number(*n);
                self.emit(Opcode::PushConstant(idx));
            }
            Expression::BigInt(b) => {
                let idx = self.builder().add_bigint(b.clone());
                self.emit(Opcode::PushBigInt(idx));
            }
            Expression::String(s) => {
                let idx = self.builder().add_string(s.cheap_clone());
                self.emit(Opcode::PushConstant(idx));
            }
            Expression::Boolean(b) => {
                self.emit(Opcode::PushBoolean(*b));
            }
            Expression::Null => {
                self.emit(Opcode::PushNull);
            }
            Expression::RegExp { pattern, flags } => {
                let idx = self
                    .builder()
                    .add_regexp(pattern.cheap_clone(), flags.cheap_clone());
                self.emit(Opcode::CreateRegExpObject(idx));
            }
            Expression::Template(template) => self.compile_template(template)?,
            Expression::Identifier { name, source, span } => {
                self.set_span(*span);
                match source.borrow().clone() {
                    Some(source) => self.load_source(&source),
                    None => {
                        let idx = self.builder().add_string(name.cheap_clone());
                        self.emit(Opcode::LoadGlobal(idx));
                    }
                }
            }
            Expression::This { source, span } => {
                self.set_span(*span);
                match source {
                    Some(source) => self.load_source(source),
                    None => {
                        self.emit(Opcode::LoadValue(RECEIVER_SLOT));
                        if self.frame().kind == FrameKind::DerivedConstructor {
                            self.emit_tdz_guard(&JsString::from("this"));
                        }
                    }
                }
            }
            Expression::NewTarget => {
                self.emit(Opcode::LoadValue(NEW_TARGET_SLOT));
            }
            Expression::Array(elements) => self.compile_array_literal(elements)?,
            Expression::Object(properties) => self.compile_object_literal(properties)?,
            Expression::Function(func) => {
                self.compile_closure(func)?;
            }
            Expression::Class(class) => self.compile_class(class)?,
            Expression::Unary { op, argument } => self.compile_unary(*op, argument)?,
            Expression::Update { op, prefix, target } => {
                self.compile_update(*op, *prefix, target)?
            }
            Expression::Binary { op, left, right } => {
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                self.emit(binary_opcode(*op));
            }
            Expression::Logical { op, left, right } => {
                self.compile_expression(left)?;
                match op {
                    LogicalOp::And => {
                        self.emit(Opcode::Dup);
                        let end = self.builder().emit_jump(JumpKind::IfToBooleanFalse);
                        self.emit(Opcode::Pop);
                        self.compile_expression(right)?;
                        self.builder().patch_jump(end);
                    }
                    LogicalOp::Or => {
                        self.emit(Opcode::Dup);
                        let end = self.builder().emit_jump(JumpKind::IfToBooleanTrue);
                        self.emit(Opcode::Pop);
                        self.compile_expression(right)?;
                        self.builder().patch_jump(end);
                    }
                    LogicalOp::Nullish => {
                        let end = self.builder().emit_jump(JumpKind::IfNotNullish);
                        self.emit(Opcode::Pop);
                        self.compile_expression(right)?;
                        self.builder().patch_jump(end);
                    }
                }
            }
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.compile_expression(test)?;
                let to_else = self.builder().emit_jump(JumpKind::IfToBooleanFalse);
                let entry = self.builder().height();
                self.compile_expression(consequent)?;
                let to_end = self.builder().emit_jump(JumpKind::Unconditional);
                self.builder().patch_jump(to_else);
                self.builder().set_height(entry);
                self.compile_expression(alternate)?;
                self.builder().patch_jump(to_end);
            }
            Expression::Assignment {
                op,
                target,
                value,
                span,
            } => self.compile_assignment(*op, target, value, *span)?,
            Expression::LogicalAssignment {
                op,
                target,
                value,
                span,
            } => self.compile_logical_assignment(*op, target, value, *span)?,
            Expression::Member {
                object,
                property,
                optional,
                span,
            } => {
                self.compile_expression(object)?;
                self.set_span(*span);
                if *optional {
                    self.emit_optional_guard(1)?;
                }
                self.compile_property_load(property)?;
            }
            Expression::Call {
                callee,
                arguments,
                optional,
                span,
            } => self.compile_call(callee, arguments, *optional, *span)?,
            Expression::New {
                callee,
                arguments,
                span,
            } => {
                self.compile_expression(callee)?;
                self.set_span(*span);
                self.emit(Opcode::Dup); // new.target is the constructor
                self.compile_arguments_and_invoke(arguments, true)?;
            }
            Expression::OptionalChain(inner) => {
                self.frame().optional_jumps.push(Vec::new());
                self.compile_expression(inner)?;
                let jumps = self
                    .frame()
                    .optional_jumps
                    .pop()
                    .expect("optional chain underflow");
                let height = self.builder().height();
                for jump in jumps {
                    self.builder().patch_jump(jump);
                }
                self.builder().set_height(height);
            }
            Expression::SuperCall { arguments, span } => {
                self.set_span(*span);
                self.emit(Opcode::GetSuperConstructor);
                self.emit(Opcode::LoadValue(NEW_TARGET_SLOT));
                self.compile_arguments_and_invoke(arguments, true)?;
                // super() initializes the receiver slot and evaluates to it.
                self.emit(Opcode::Dup);
                self.emit(Opcode::StoreValue(RECEIVER_SLOT));
            }
            Expression::SuperMember { property, span } => {
                self.set_span(*span);
                self.emit(Opcode::GetSuperBase);
                self.compile_property_load(property)?;
            }
            Expression::Sequence(exprs) => {
                for (i, expr) in exprs.iter().enumerate() {
                    self.compile_expression(expr)?;
                    if i + 1 != exprs.len() {
                        self.emit(Opcode::Pop);
                    }
                }
            }
            Expression::Yield {
                argument,
                delegate,
                span,
            } => self.compile_yield(argument.as_deref(), *delegate, *span)?,
        }
        Ok(())
    }

    // ─── literals ──────────────────────────────────────────────────────────

    fn compile_template(&mut self, template: &'ast TemplateLiteral) -> CResult<()> {
        let mut parts = 0u16;
        for (i, quasi) in template.quasis.iter().enumerate() {
            if !quasi.is_empty() || template.expressions.is_empty() {
                let idx = self.builder().add_string(quasi.cheap_clone());
                self.emit(Opcode::PushConstant(idx));
                parts += 1;
            }
            if let Some(expr) = template.expressions.get(i) {
                self.compile_expression(expr)?;
                parts += 1;
            }
        }
        self.emit(Opcode::CreateTemplateLiteral(parts));
        Ok(())
    }

    fn compile_array_literal(&mut self, elements: &'ast [Option<ArrayElement>]) -> CResult<()> {
        self.emit(Opcode::CreateArray);
        let has_spread = elements
            .iter()
            .any(|e| e.as_ref().map(|e| e.spread).unwrap_or(false));
        if !has_spread {
            for (i, element) in elements.iter().enumerate() {
                match element {
                    Some(element) => self.compile_expression(&element.expr)?,
                    None => {
                        self.emit(Opcode::PushUndefined);
                    }
                }
                self.emit(Opcode::StoreArrayIndexed(i as u32));
            }
            return Ok(());
        }
        for element in elements {
            match element {
                Some(element) if element.spread => {
                    self.compile_expression(&element.expr)?;
                    self.emit(Opcode::GetIterator);
                    self.compile_append_iterated()?;
                }
                Some(element) => {
                    self.compile_expression(&element.expr)?;
                    self.emit(Opcode::StoreArray);
                }
                None => {
                    self.emit(Opcode::PushUndefined);
                    self.emit(Opcode::StoreArray);
                }
            }
        }
        Ok(())
    }

    /// `[array, iter_record] → [array]`: append every iterated value.
    fn compile_append_iterated(&mut self) -> CResult<()> {
        let iter_slot = self.builder().new_local_slot(LocalKind::Value);
        self.emit(Opcode::StoreValue(iter_slot));
        let head = self.builder().opcode_count();
        self.emit(Opcode::LoadValue(iter_slot));
        self.emit(Opcode::IteratorNext);
        self.emit(Opcode::Dup);
        self.emit(Opcode::IteratorResultDone);
        let done = self.builder().emit_jump(JumpKind::IfTrue);
        self.emit(Opcode::IteratorResultValue);
        self.emit(Opcode::StoreArray);
        self.builder().emit_jump_to(head);
        self.builder().patch_jump(done);
        self.emit(Opcode::Pop); // the final result object
        Ok(())
    }

    fn compile_object_literal(&mut self, properties: &'ast [ObjectProperty]) -> CResult<()> {
        // A literal that opens with a spread clones that object directly.
        let mut rest = properties;
        match properties.first() {
            Some(ObjectProperty::Spread(expr)) => {
                self.compile_expression(expr)?;
                self.emit(Opcode::CopyObjectExcludingProperties(0));
                rest = &properties[1..];
            }
            _ => {
                self.emit(Opcode::CreateObject);
            }
        }
        for property in rest {
            match property {
                ObjectProperty::KeyValue { key, value } => match key {
                    PropertyName::Identifier(name) | PropertyName::String(name) => {
                        self.emit(Opcode::Dup);
                        if let PropertyName::Identifier(n) = key {
                            self.pending_name = Some(n.cheap_clone());
                        }
                        self.compile_expression(value)?;
                        self.pending_name = None;
                        let idx = self.builder().add_string(name.cheap_clone());
                        self.emit(Opcode::StoreNamedProperty(idx));
                    }
                    PropertyName::Number(n) => {
                        self.emit(Opcode::Dup);
                        let key_idx = self.builder().add_string(JsString::from(number_to_string(*n)));
                        self.emit(Opcode::PushConstant(key_idx));
                        self.compile_expression(value)?;
                        self.emit(Opcode::StoreKeyedProperty);
                    }
                    PropertyName::Computed(key_expr) => {
                        self.emit(Opcode::Dup);
                        self.compile_expression(key_expr)?;
                        self.compile_expression(value)?;
                        self.emit(Opcode::StoreKeyedProperty);
                    }
                },
                ObjectProperty::Method { key, func, kind } => match kind {
                    AccessorKind::Method => match key {
                        PropertyName::Identifier(name) | PropertyName::String(name) => {
                            self.emit(Opcode::Dup);
                            self.pending_name = Some(name.cheap_clone());
                            self.compile_closure(func)?;
                            let idx = self.builder().add_string(name.cheap_clone());
                            self.emit(Opcode::StoreNamedProperty(idx));
                        }
                        PropertyName::Number(n) => {
                            self.emit(Opcode::Dup);
                            let key_idx =
                                self.builder().add_string(JsString::from(number_to_string(*n)));
                            self.emit(Opcode::PushConstant(key_idx));
                            self.compile_closure(func)?;
                            self.emit(Opcode::StoreKeyedProperty);
                        }
                        PropertyName::Computed(key_expr) => {
                            self.emit(Opcode::Dup);
                            self.compile_expression(key_expr)?;
                            self.compile_closure(func)?;
                            self.emit(Opcode::StoreKeyedProperty);
                        }
                    },
                    AccessorKind::Getter | AccessorKind::Setter => {
                        let name = match key {
                            PropertyName::Identifier(name) | PropertyName::String(name) => {
                                name.cheap_clone()
                            }
                            PropertyName::Number(n) => JsString::from(number_to_string(*n)),
                            PropertyName::Computed(_) => {
                                return Err(CompileError::new(
                                    "Computed accessor properties are not supported",
                                    Span::default(),
                                ));
                            }
                        };
                        self.emit(Opcode::Dup);
                        self.pending_name = Some(name.cheap_clone());
                        self.compile_closure(func)?;
                        let idx = self.builder().add_string(name);
                        let method_kind = if *kind == AccessorKind::Getter {
                            MethodKind::Getter
                        } else {
                            MethodKind::Setter
                        };
                        self.emit(Opcode::DefineObjectAccessor {
                            name: idx,
                            kind: method_kind,
                        });
                    }
                },
                ObjectProperty::Spread(expr) => {
                    self.compile_expression(expr)?;
                    self.emit(Opcode::CopyDataProperties);
                }
            }
        }
        Ok(())
    }

    // ─── closures and classes ──────────────────────────────────────────────

    pub(super) fn compile_closure(&mut self, func: &'ast FunctionNode) -> CResult<()> {
        let idx = self.compile_function(func, None)?;
        let op = if func.is_async && func.is_generator {
            Opcode::CreateAsyncGeneratorClosure(idx)
        } else if func.is_async {
            Opcode::CreateAsyncClosure(idx)
        } else if func.is_generator {
            Opcode::CreateGeneratorClosure(idx)
        } else {
            Opcode::CreateClosure(idx)
        };
        self.emit(op);
        Ok(())
    }

    pub(super) fn compile_class(&mut self, class: &'ast ClassNode) -> CResult<()> {
        self.set_span(class.span);
        match &class.super_class {
            Some(expr) => self.compile_expression(expr)?,
            None => {
                self.emit(Opcode::PushEmpty);
            }
        }

        let derived = class.super_class.is_some();
        let ctor_idx = match &class.constructor {
            Some(ctor) => {
                if class.name.is_some() {
                    self.pending_name = class.name.clone();
                }
                let kind = if derived {
                    FrameKind::DerivedConstructor
                } else {
                    FrameKind::Function
                };
                self.compile_function(ctor, Some(kind))?
            }
            None => self.implicit_constructor(class.name.clone(), derived),
        };
        self.emit(Opcode::CreateClassConstructor(ctor_idx));
        self.emit(Opcode::CreateClass);

        for member in &class.members {
            let placement = if member.is_static {
                MethodPlacement::Static
            } else {
                MethodPlacement::Prototype
            };
            let kind = match member.kind {
                AccessorKind::Method => MethodKind::Normal,
                AccessorKind::Getter => MethodKind::Getter,
                AccessorKind::Setter => MethodKind::Setter,
            };
            match &member.key {
                PropertyName::Identifier(name) | PropertyName::String(name) => {
                    self.pending_name = Some(name.cheap_clone());
                    self.compile_closure(&member.func)?;
                    let idx = self.builder().add_string(name.cheap_clone());
                    self.emit(Opcode::AttachClassMethod {
                        name: idx,
                        placement,
                        kind,
                    });
                }
                PropertyName::Number(n) => {
                    let name = JsString::from(number_to_string(*n));
                    let idx = self.builder().add_string(name);
                    self.emit(Opcode::PushConstant(idx));
                    self.compile_closure(&member.func)?;
                    self.emit(Opcode::AttachComputedClassMethod { placement, kind });
                }
                PropertyName::Computed(key_expr) => {
                    self.compile_expression(key_expr)?;
                    self.compile_closure(&member.func)?;
                    self.emit(Opcode::AttachComputedClassMethod { placement, kind });
                }
            }
        }

        self.emit(Opcode::FinalizeClass);
        Ok(())
    }

    /// Synthesize the constructor of a class that declares none.
    fn implicit_constructor(&mut self, name: Option<JsString>, derived: bool) -> u16 {
        use crate::ir::FunctionBuilder;
        let mut builder = FunctionBuilder::new(
            name.unwrap_or_else(|| JsString::from("")),
            0,
            true,
            false,
            false,
        );
        if derived {
            builder.add_opcode(Opcode::GetSuperConstructor);
            builder.add_opcode(Opcode::LoadValue(NEW_TARGET_SLOT));
            builder.add_opcode(Opcode::CollectRestArgs(0));
            builder.add_opcode(Opcode::ConstructArray);
            builder.add_opcode(Opcode::Return);
        } else {
            builder.add_opcode(Opcode::PushUndefined);
            builder.add_opcode(Opcode::Return);
        }
        let info = std::rc::Rc::new(builder.finalize());
        self.builder().add_child_function(info)
    }

    // ─── operators ─────────────────────────────────────────────────────────

    fn compile_unary(&mut self, op: UnaryOp, argument: &'ast Expression) -> CResult<()> {
        match op {
            UnaryOp::Minus => {
                self.compile_expression(argument)?;
                self.emit(Opcode::Negate);
            }
            UnaryOp::Plus => {
                self.compile_expression(argument)?;
                self.emit(Opcode::ToNumber);
            }
            UnaryOp::Not => {
                self.compile_expression(argument)?;
                self.emit(Opcode::ToBooleanLogicalNot);
            }
            UnaryOp::BitNot => {
                self.compile_expression(argument)?;
                self.emit(Opcode::BitwiseNot);
            }
            UnaryOp::TypeOf => match argument {
                // A bare, possibly-unresolved name must not throw.
                Expression::Identifier { name, source, span }
                    if source.borrow().is_none() =>
                {
                    self.set_span(*span);
                    let idx = self.builder().add_string(name.cheap_clone());
                    self.emit(Opcode::TypeOfGlobal(idx));
                }
                _ => {
                    self.compile_expression(argument)?;
                    self.emit(Opcode::TypeOf);
                }
            },
            UnaryOp::Void => {
                self.compile_expression(argument)?;
                self.emit(Opcode::Pop);
                self.emit(Opcode::PushUndefined);
            }
            UnaryOp::Delete => match argument {
                Expression::Member {
                    object,
                    property,
                    optional: false,
                    span,
                } => {
                    self.compile_expression(object)?;
                    match property {
                        MemberProperty::Identifier(name) => {
                            let idx = self.builder().add_string(name.cheap_clone());
                            self.emit(Opcode::PushConstant(idx));
                        }
                        MemberProperty::Computed(key) => self.compile_expression(key)?,
                    }
                    self.set_span(*span);
                    if self.builder().is_strict() {
                        self.emit(Opcode::DeletePropertyStrict);
                    } else {
                        self.emit(Opcode::DeletePropertySloppy);
                    }
                }
                Expression::Identifier { name, source, .. } if source.borrow().is_none() => {
                    // Deleting an unresolved name targets the global object.
                    let global = self.builder().add_string(JsString::from("globalThis"));
                    self.emit(Opcode::LoadGlobal(global));
                    let idx = self.builder().add_string(name.cheap_clone());
                    self.emit(Opcode::PushConstant(idx));
                    self.emit(Opcode::DeletePropertySloppy);
                }
                _ => {
                    self.compile_expression(argument)?;
                    self.emit(Opcode::Pop);
                    self.emit(Opcode::PushBoolean(true));
                }
            },
        }
        Ok(())
    }

    fn compile_update(
        &mut self,
        op: UpdateOp,
        prefix: bool,
        target: &'ast Expression,
    ) -> CResult<()> {
        let arith = if op == UpdateOp::Inc {
            Opcode::Inc
        } else {
            Opcode::Dec
        };
        match target {
            Expression::Identifier { name, source, span } => {
                self.set_span(*span);
                let resolved = source.borrow().clone();
                match &resolved {
                    Some(source) => self.load_source(source),
                    None => {
                        let idx = self.builder().add_string(name.cheap_clone());
                        self.emit(Opcode::LoadGlobal(idx));
                    }
                }
                self.emit(Opcode::ToNumeric);
                if prefix {
                    self.emit(arith);
                    self.emit(Opcode::Dup);
                } else {
                    self.emit(Opcode::Dup);
                    self.emit(arith);
                }
                match &resolved {
                    Some(source) => self.assign_source(source, *span)?,
                    None => {
                        let idx = self.builder().add_string(name.cheap_clone());
                        self.emit(Opcode::StoreGlobal(idx));
                    }
                }
            }
            Expression::Member {
                object,
                property: MemberProperty::Identifier(name),
                span,
                ..
            } => {
                self.compile_expression(object)?;
                self.set_span(*span);
                self.emit(Opcode::Dup);
                let idx = self.builder().add_string(name.cheap_clone());
                self.emit(Opcode::LoadNamedProperty(idx));
                self.emit(Opcode::ToNumeric);
                if prefix {
                    self.emit(arith);
                    self.emit(Opcode::DupX1);
                } else {
                    self.emit(Opcode::DupX1);
                    self.emit(arith);
                }
                self.emit(Opcode::StoreNamedProperty(idx));
            }
            Expression::Member {
                object,
                property: MemberProperty::Computed(key),
                span,
                ..
            } => {
                let (t_obj, t_key, t_val) = self.scratch_triple();
                self.compile_expression(object)?;
                self.emit(Opcode::StoreValue(t_obj));
                self.compile_expression(key)?;
                self.emit(Opcode::StoreValue(t_key));
                self.set_span(*span);
                self.emit(Opcode::LoadValue(t_obj));
                self.emit(Opcode::LoadValue(t_key));
                self.emit(Opcode::LoadKeyedProperty);
                self.emit(Opcode::ToNumeric);
                if prefix {
                    self.emit(arith);
                    self.emit(Opcode::Dup);
                } else {
                    self.emit(Opcode::Dup);
                    self.emit(arith);
                }
                self.emit(Opcode::StoreValue(t_val));
                self.emit(Opcode::LoadValue(t_obj));
                self.emit(Opcode::LoadValue(t_key));
                self.emit(Opcode::LoadValue(t_val));
                self.emit(Opcode::StoreKeyedProperty);
            }
            _ => {
                return Err(CompileError::new(
                    "Invalid update expression target",
                    Span::default(),
                ));
            }
        }
        Ok(())
    }

    fn compile_assignment(
        &mut self,
        op: AssignOp,
        target: &'ast Expression,
        value: &'ast Expression,
        span: Span,
    ) -> CResult<()> {
        match target {
            Expression::Identifier { name, source, span: id_span } => {
                let resolved = source.borrow().clone();
                if let Some(binary) = op {
                    match &resolved {
                        Some(source) => self.load_source(source),
                        None => {
                            let idx = self.builder().add_string(name.cheap_clone());
                            self.emit(Opcode::LoadGlobal(idx));
                        }
                    }
                    self.compile_expression(value)?;
                    self.emit(binary_opcode(binary));
                } else {
                    self.pending_name = Some(name.cheap_clone());
                    self.compile_expression(value)?;
                    self.pending_name = None;
                }
                self.emit(Opcode::Dup);
                self.set_span(*id_span);
                match &resolved {
                    Some(source) => self.assign_source(source, span)?,
                    None => {
                        let idx = self.builder().add_string(name.cheap_clone());
                        self.emit(Opcode::StoreGlobal(idx));
                    }
                }
            }
            Expression::Member {
                object,
                property: MemberProperty::Identifier(name),
                span: member_span,
                ..
            } => {
                let idx = self.builder().add_string(name.cheap_clone());
                self.compile_expression(object)?;
                if let Some(binary) = op {
                    self.emit(Opcode::Dup);
                    self.emit(Opcode::LoadNamedProperty(idx));
                    self.compile_expression(value)?;
                    self.emit(binary_opcode(binary));
                } else {
                    self.compile_expression(value)?;
                }
                self.set_span(*member_span);
                self.emit(Opcode::DupX1);
                self.emit(Opcode::StoreNamedProperty(idx));
            }
            Expression::Member {
                object,
                property: MemberProperty::Computed(key),
                span: member_span,
                ..
            } => {
                let (t_obj, t_key, t_val) = self.scratch_triple();
                self.compile_expression(object)?;
                self.emit(Opcode::StoreValue(t_obj));
                self.compile_expression(key)?;
                self.emit(Opcode::StoreValue(t_key));
                if let Some(binary) = op {
                    self.emit(Opcode::LoadValue(t_obj));
                    self.emit(Opcode::LoadValue(t_key));
                    self.emit(Opcode::LoadKeyedProperty);
                    self.compile_expression(value)?;
                    self.emit(binary_opcode(binary));
                } else {
                    self.compile_expression(value)?;
                }
                self.set_span(*member_span);
                self.emit(Opcode::StoreValue(t_val));
                self.emit(Opcode::LoadValue(t_obj));
                self.emit(Opcode::LoadValue(t_key));
                self.emit(Opcode::LoadValue(t_val));
                self.emit(Opcode::StoreKeyedProperty);
                self.emit(Opcode::LoadValue(t_val));
            }
            _ => {
                return Err(CompileError::new("Invalid assignment target", span));
            }
        }
        Ok(())
    }

    fn compile_logical_assignment(
        &mut self,
        op: LogicalOp,
        target: &'ast Expression,
        value: &'ast Expression,
        span: Span,
    ) -> CResult<()> {
        let Expression::Identifier { name, source, .. } = target else {
            return Err(CompileError::new(
                "Logical assignment currently requires an identifier target",
                span,
            ));
        };
        let resolved = source.borrow().clone();
        match &resolved {
            Some(source) => self.load_source(source),
            None => {
                let idx = self.builder().add_string(name.cheap_clone());
                self.emit(Opcode::LoadGlobal(idx));
            }
        }
        let end = match op {
            LogicalOp::And => {
                self.emit(Opcode::Dup);
                let end = self.builder().emit_jump(JumpKind::IfToBooleanFalse);
                self.emit(Opcode::Pop);
                end
            }
            LogicalOp::Or => {
                self.emit(Opcode::Dup);
                let end = self.builder().emit_jump(JumpKind::IfToBooleanTrue);
                self.emit(Opcode::Pop);
                end
            }
            LogicalOp::Nullish => {
                let end = self.builder().emit_jump(JumpKind::IfNotNullish);
                self.emit(Opcode::Pop);
                end
            }
        };
        self.compile_expression(value)?;
        self.emit(Opcode::Dup);
        match &resolved {
            Some(source) => self.assign_source(source, span)?,
            None => {
                let idx = self.builder().add_string(name.cheap_clone());
                self.emit(Opcode::StoreGlobal(idx));
            }
        }
        self.builder().patch_jump(end);
        Ok(())
    }

    // ─── member access and calls ───────────────────────────────────────────

    fn compile_property_load(&mut self, property: &'ast MemberProperty) -> CResult<()> {
        match property {
            MemberProperty::Identifier(name) => {
                let idx = self.builder().add_string(name.cheap_clone());
                self.emit(Opcode::LoadNamedProperty(idx));
            }
            MemberProperty::Computed(key) => {
                self.compile_expression(key)?;
                self.emit(Opcode::LoadKeyedProperty);
            }
        }
        Ok(())
    }

    /// Short-circuit the enclosing optional chain when the top of stack is
    /// nullish, popping `depth` values and producing `undefined`.
    fn emit_optional_guard(&mut self, depth: u16) -> CResult<()> {
        let cont = self.builder().emit_jump(JumpKind::IfNotNullish);
        let entry = self.builder().height();
        for _ in 0..depth {
            self.emit(Opcode::Pop);
        }
        self.emit(Opcode::PushUndefined);
        let escape = self.builder().emit_jump(JumpKind::Unconditional);
        let frame = self.frame();
        match frame.optional_jumps.last_mut() {
            Some(jumps) => jumps.push(escape),
            None => {
                return Err(CompileError::new(
                    "optional access outside a chain",
                    Span::default(),
                ));
            }
        }
        self.builder().patch_jump(cont);
        self.builder().set_height(entry);
        Ok(())
    }

    fn compile_call(
        &mut self,
        callee: &'ast Expression,
        arguments: &'ast [Argument],
        optional: bool,
        span: Span,
    ) -> CResult<()> {
        match callee {
            Expression::Member {
                object,
                property,
                optional: member_optional,
                span: member_span,
            } => {
                self.compile_expression(object)?;
                self.set_span(*member_span);
                if *member_optional {
                    self.emit_optional_guard(1)?;
                }
                self.emit(Opcode::Dup);
                self.compile_property_load(property)?; // [receiver, f]
                if optional {
                    self.emit_optional_guard(2)?;
                }
                self.emit(Opcode::Swap); // [f, receiver]
            }
            Expression::SuperMember { property, span } => {
                self.set_span(*span);
                self.emit(Opcode::GetSuperBase);
                self.compile_property_load(property)?;
                self.emit(Opcode::LoadValue(RECEIVER_SLOT)); // [f, this]
            }
            _ => {
                self.compile_expression(callee)?;
                if optional {
                    self.emit_optional_guard(1)?;
                }
                self.emit(Opcode::PushUndefined); // [f, undefined]
            }
        }
        self.set_span(span);
        self.compile_arguments_and_invoke(arguments, false)
    }

    /// Compile arguments and emit the call/construct opcode. Expects
    /// `[callee, receiver]` (or `[ctor, new_target]`) on the stack.
    fn compile_arguments_and_invoke(
        &mut self,
        arguments: &'ast [Argument],
        construct: bool,
    ) -> CResult<()> {
        let has_spread = arguments.iter().any(|a| a.spread);
        if has_spread {
            self.emit(Opcode::CreateArray);
            for argument in arguments {
                self.compile_expression(&argument.expr)?;
                if argument.spread {
                    self.emit(Opcode::GetIterator);
                    self.compile_append_iterated()?;
                } else {
                    self.emit(Opcode::StoreArray);
                }
            }
            self.emit(if construct {
                Opcode::ConstructArray
            } else {
                Opcode::CallArray
            });
            return Ok(());
        }
        for argument in arguments {
            self.compile_expression(&argument.expr)?;
        }
        let n = arguments.len() as u16;
        self.emit(if construct {
            Opcode::Construct(n)
        } else {
            Opcode::Call(n)
        });
        Ok(())
    }

    /// Pop a value into a for-in/for-of assignment target.
    pub(super) fn compile_store_to_target(&mut self, target: &'ast Expression) -> CResult<()> {
        match target {
            Expression::Identifier { name, source, span } => {
                self.set_span(*span);
                match source.borrow().clone() {
                    Some(source) => self.assign_source(&source, *span)?,
                    None => {
                        let idx = self.builder().add_string(name.cheap_clone());
                        self.emit(Opcode::StoreGlobal(idx));
                    }
                }
            }
            Expression::Member {
                object,
                property: MemberProperty::Identifier(name),
                ..
            } => {
                self.compile_expression(object)?;
                self.emit(Opcode::Swap); // [obj, value]
                let idx = self.builder().add_string(name.cheap_clone());
                self.emit(Opcode::StoreNamedProperty(idx));
            }
            Expression::Member {
                object,
                property: MemberProperty::Computed(key),
                ..
            } => {
                let (t_obj, t_key, t_val) = self.scratch_triple();
                self.emit(Opcode::StoreValue(t_val));
                self.compile_expression(object)?;
                self.emit(Opcode::StoreValue(t_obj));
                self.compile_expression(key)?;
                self.emit(Opcode::StoreValue(t_key));
                self.emit(Opcode::LoadValue(t_obj));
                self.emit(Opcode::LoadValue(t_key));
                self.emit(Opcode::LoadValue(t_val));
                self.emit(Opcode::StoreKeyedProperty);
            }
            _ => {
                return Err(CompileError::new(
                    "Invalid for-loop assignment target",
                    Span::default(),
                ));
            }
        }
        Ok(())
    }

    // ─── generators ────────────────────────────────────────────────────────

    fn compile_yield(
        &mut self,
        argument: Option<&'ast Expression>,
        delegate: bool,
        span: Span,
    ) -> CResult<()> {
        self.set_span(span);
        if !self.frame().is_generator {
            return Err(CompileError::new("yield outside of a generator", span));
        }
        if delegate {
            return self.compile_yield_delegate(argument, span);
        }
        match argument {
            Some(expr) => self.compile_expression(expr)?,
            None => {
                self.emit(Opcode::PushUndefined);
            }
        }
        self.emit_yield_suspend()
    }

    /// Save the live stack, return the value on top to the caller, and lay
    /// down the resume point that restores it all.
    fn emit_yield_suspend(&mut self) -> CResult<()> {
        let yield_slot = self.yield_slot();
        self.emit(Opcode::StoreValue(yield_slot));
        let depth = self.builder().height();
        let phase = self.builder().reserve_phase();
        self.emit(Opcode::SetGeneratorPhase(phase));
        for _ in 0..depth {
            self.emit(Opcode::PushToGeneratorState);
        }
        self.emit(Opcode::LoadValue(yield_slot));
        self.emit(Opcode::Return);

        self.builder().set_phase_target(phase);
        self.builder().set_height(0);
        for _ in 0..depth {
            self.emit(Opcode::PopFromGeneratorState);
        }
        self.emit(Opcode::PushGeneratorSentValue);
        Ok(())
    }

    /// `yield*`: drain the delegate iterator, yielding each value; the
    /// expression result is the delegate's final result value.
    fn compile_yield_delegate(
        &mut self,
        argument: Option<&'ast Expression>,
        span: Span,
    ) -> CResult<()> {
        match argument {
            Some(expr) => self.compile_expression(expr)?,
            None => return Err(CompileError::new("yield* requires an argument", span)),
        }
        self.emit(Opcode::GetIterator);
        let iter_slot = self.builder().new_local_slot(LocalKind::Value);
        self.emit(Opcode::StoreValue(iter_slot));

        let head = self.builder().opcode_count();
        self.builder().mark_reachable();
        self.emit(Opcode::LoadValue(iter_slot));
        self.emit(Opcode::IteratorNext);
        self.emit(Opcode::Dup);
        self.emit(Opcode::IteratorResultDone);
        let done = self.builder().emit_jump(JumpKind::IfTrue);
        self.emit(Opcode::IteratorResultValue);
        self.emit_yield_suspend()?;
        self.emit(Opcode::Pop); // sent value is not forwarded to the delegate
        self.builder().emit_jump_to(head);

        self.builder().patch_jump(done);
        self.builder().set_height(1);
        self.emit(Opcode::IteratorResultValue);
        Ok(())
    }

    // ─── scratch locals ────────────────────────────────────────────────────

    fn scratch_triple(&mut self) -> (SlotIndex, SlotIndex, SlotIndex) {
        let a = self.builder().new_local_slot(LocalKind::Value);
        let b = self.builder().new_local_slot(LocalKind::Value);
        let c = self.builder().new_local_slot(LocalKind::Value);
        (a, b, c)
    }

    fn yield_slot(&mut self) -> SlotIndex {
        if let Some(slot) = self.frame().yield_slot {
            return slot;
        }
        let slot = self.builder().new_local_slot(LocalKind::Value);
        self.frame().yield_slot = Some(slot);
        slot
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Rem => Opcode::Rem,
        BinaryOp::Exp => Opcode::Exp,
        BinaryOp::BitAnd => Opcode::BitwiseAnd,
        BinaryOp::BitOr => Opcode::BitwiseOr,
        BinaryOp::BitXor => Opcode::BitwiseXor,
        BinaryOp::Shl => Opcode::ShiftLeft,
        BinaryOp::Shr => Opcode::ShiftRight,
        BinaryOp::Ushr => Opcode::ShiftRightUnsigned,
        BinaryOp::Eq => Opcode::TestEqual,
        BinaryOp::NotEq => Opcode::TestNotEqual,
        BinaryOp::StrictEq => Opcode::TestEqualStrict,
        BinaryOp::StrictNotEq => Opcode::TestNotEqualStrict,
        BinaryOp::Lt => Opcode::TestLessThan,
        BinaryOp::LtEq => Opcode::TestLessThanOrEqual,
        BinaryOp::Gt => Opcode::TestGreaterThan,
        BinaryOp::GtEq => Opcode::TestGreaterThanOrEqual,
        BinaryOp::In => Opcode::TestIn,
        BinaryOp::InstanceOf => Opcode::TestInstanceOf,
    }
}
