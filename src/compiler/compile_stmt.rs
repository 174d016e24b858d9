//! Statement lowering
//!
//! Every statement compiles to a net-zero stack effect. Loops register
//! break/continue sections; try/catch/finally builds handler regions with
//! finally bodies inlined on each exit path.

use crate::ast::*;
use crate::ir::{JumpKind, LocalKind, Opcode, SlotIndex};
use crate::value::{CheapClone, JsString};

use super::{Compiler, CResult, SectionKind};

impl<'ast> Compiler<'ast> {
    pub(super) fn compile_statement(&mut self, statement: &'ast Statement) -> CResult<()> {
        self.compile_statement_with_label(statement, None)
    }

    fn compile_statement_with_label(
        &mut self,
        statement: &'ast Statement,
        label: Option<JsString>,
    ) -> CResult<()> {
        if self.builder().is_done() {
            // Unreachable fall-through after return/throw/break.
            if !matches!(statement, Statement::FunctionDeclaration { .. }) {
                return Ok(());
            }
        }
        match statement {
            Statement::Expression(expr) => {
                self.compile_expression(expr)?;
                match self.frame().completion_slot {
                    Some(slot) => {
                        self.emit(Opcode::StoreValue(slot));
                    }
                    None => {
                        self.emit(Opcode::Pop);
                    }
                }
                Ok(())
            }
            Statement::Declaration(decl) => self.compile_declaration(decl),
            Statement::FunctionDeclaration { .. } => Ok(()), // hoisted at scope entry
            Statement::ClassDeclaration { class, source } => {
                self.compile_class(class)?;
                self.store_source(source);
                Ok(())
            }
            Statement::Block { statements, scope } => {
                let pushed = self.enter_scope_slots(scope)?;
                if let Some(label) = label {
                    self.push_section(Some(label), SectionKind::Block);
                    self.hoist_functions_in(statements)?;
                    for statement in statements {
                        self.compile_statement(statement)?;
                    }
                    self.pop_section(None);
                } else {
                    self.hoist_functions_in(statements)?;
                    for statement in statements {
                        self.compile_statement(statement)?;
                    }
                }
                self.exit_scope(pushed);
                Ok(())
            }
            Statement::If {
                test,
                consequent,
                alternate,
            } => self.compile_if(test, consequent, alternate.as_deref()),
            Statement::While { test, body } => self.compile_while(test, body, label),
            Statement::DoWhile { body, test } => self.compile_do_while(body, test, label),
            Statement::For {
                init,
                test,
                update,
                body,
                scope,
            } => self.compile_for(init.as_ref(), test.as_ref(), update.as_ref(), body, scope, label),
            Statement::ForIn {
                target,
                object,
                body,
                scope,
            } => self.compile_for_each(target, object, body, scope, label, true),
            Statement::ForOf {
                target,
                iterable,
                body,
                scope,
            } => self.compile_for_each(target, iterable, body, scope, label, false),
            Statement::Switch {
                discriminant,
                cases,
                scope,
            } => self.compile_switch(discriminant, cases, scope, label),
            Statement::Break { label, span } => self.compile_break(label.as_ref(), *span),
            Statement::Continue { label, span } => self.compile_continue(label.as_ref(), *span),
            Statement::Labeled { label, body } => {
                self.compile_statement_with_label(body, Some(label.cheap_clone()))
            }
            Statement::Return { argument, span } => self.compile_return(argument.as_ref(), *span),
            Statement::Throw { argument, span } => {
                self.compile_expression(argument)?;
                self.set_span(*span);
                self.emit(Opcode::Throw);
                Ok(())
            }
            Statement::Try {
                block,
                block_scope,
                handler,
                finalizer,
                finalizer_scope,
            } => self.compile_try(
                block,
                block_scope,
                handler.as_ref(),
                finalizer.as_deref(),
                finalizer_scope.as_ref(),
            ),
            Statement::Import { .. } => Ok(()), // wired by the module runner
            Statement::Export {
                declaration,
                specifiers: _,
                default,
            } => {
                if let Some(decl) = declaration {
                    self.compile_statement(decl)?;
                }
                if let Some(expr) = default {
                    self.compile_expression(expr)?;
                    let slot = self
                        .default_export_slot
                        .expect("default export slot not reserved");
                    self.emit(Opcode::StoreCurrentEnvSlot(slot as SlotIndex));
                }
                Ok(())
            }
            Statement::Empty | Statement::Debugger => Ok(()),
        }
    }

    fn compile_declaration(&mut self, decl: &'ast VariableDeclaration) -> CResult<()> {
        for declarator in &decl.declarators {
            self.set_span(declarator.span);
            match &declarator.init {
                Some(init) => {
                    // Anonymous function initializers take the binding name.
                    self.pending_name = Some(declarator.source.name.cheap_clone());
                    self.compile_expression(init)?;
                    self.pending_name = None;
                }
                None => {
                    if decl.kind == DeclarationKind::Var {
                        continue; // already undefined from hoisting
                    }
                    self.emit(Opcode::PushUndefined);
                }
            }
            self.store_source(&declarator.source);
        }
        Ok(())
    }

    fn compile_if(
        &mut self,
        test: &'ast Expression,
        consequent: &'ast Statement,
        alternate: Option<&'ast Statement>,
    ) -> CResult<()> {
        self.compile_expression(test)?;
        let skip = self.builder().emit_jump(JumpKind::IfToBooleanFalse);
        self.compile_statement(consequent)?;
        match alternate {
            Some(alternate) => {
                let to_end = self.builder().emit_jump(JumpKind::Unconditional);
                self.builder().patch_jump(skip);
                self.compile_statement(alternate)?;
                self.builder().patch_jump(to_end);
            }
            None => {
                self.builder().patch_jump(skip);
            }
        }
        Ok(())
    }

    fn compile_while(
        &mut self,
        test: &'ast Expression,
        body: &'ast Statement,
        label: Option<JsString>,
    ) -> CResult<()> {
        self.push_section(label, SectionKind::Loop);
        let head = self.builder().opcode_count();
        self.builder().mark_reachable();
        self.compile_expression(test)?;
        let exit = self.builder().emit_jump(JumpKind::IfToBooleanFalse);
        self.compile_statement(body)?;
        self.builder().emit_jump_to(head);
        self.builder().patch_jump(exit);
        self.pop_section(Some(head));
        Ok(())
    }

    fn compile_do_while(
        &mut self,
        body: &'ast Statement,
        test: &'ast Expression,
        label: Option<JsString>,
    ) -> CResult<()> {
        self.push_section(label, SectionKind::Loop);
        let head = self.builder().opcode_count();
        self.compile_statement(body)?;
        let test_at = self.builder().opcode_count();
        self.builder().mark_reachable();
        self.compile_expression(test)?;
        let op = Opcode::JumpIfToBooleanTrue(head as u32);
        self.emit(op);
        self.pop_section(Some(test_at));
        Ok(())
    }

    fn compile_for(
        &mut self,
        init: Option<&'ast ForInit>,
        test: Option<&'ast Expression>,
        update: Option<&'ast Expression>,
        body: &'ast Statement,
        scope: &'ast ScopeRef,
        label: Option<JsString>,
    ) -> CResult<()> {
        let pushed = self.enter_scope_slots(scope)?;
        match init {
            Some(ForInit::Declaration(decl)) => self.compile_declaration(decl)?,
            Some(ForInit::Expression(expr)) => {
                self.compile_expression(expr)?;
                self.emit(Opcode::Pop);
            }
            None => {}
        }

        // Lexical loop variables captured by closures get a fresh
        // environment record per iteration.
        let per_iteration = pushed
            && matches!(
                init,
                Some(ForInit::Declaration(VariableDeclaration {
                    kind: DeclarationKind::Let | DeclarationKind::Const,
                    ..
                }))
            );

        self.push_section(label, SectionKind::Loop);
        let head = self.builder().opcode_count();
        self.builder().mark_reachable();
        let exit = match test {
            Some(test) => {
                self.compile_expression(test)?;
                Some(self.builder().emit_jump(JumpKind::IfToBooleanFalse))
            }
            None => None,
        };
        self.compile_statement(body)?;

        let continue_target = self.builder().opcode_count();
        self.builder().mark_reachable();
        if per_iteration {
            self.copy_loop_environment(scope);
        }
        if let Some(update) = update {
            self.compile_expression(update)?;
            self.emit(Opcode::Pop);
        }
        self.builder().emit_jump_to(head);
        if let Some(exit) = exit {
            self.builder().patch_jump(exit);
        }
        self.pop_section(Some(continue_target));
        self.exit_scope(pushed);
        Ok(())
    }

    /// Close over a fresh copy of the loop's environment record so closures
    /// created this iteration keep this iteration's values.
    fn copy_loop_environment(&mut self, scope: &ScopeRef) {
        let n = scope.env_slot_count.get();
        for slot in 0..n {
            self.emit(Opcode::LoadCurrentEnvSlot(slot as SlotIndex));
        }
        self.emit(Opcode::PopEnvRecord);
        self.emit(Opcode::PushDeclarativeEnvRecord(n as u16));
        for slot in (0..n).rev() {
            self.emit(Opcode::StoreCurrentEnvSlot(slot as SlotIndex));
        }
    }

    fn compile_for_each(
        &mut self,
        target: &'ast ForTarget,
        object: &'ast Expression,
        body: &'ast Statement,
        scope: &'ast ScopeRef,
        label: Option<JsString>,
        is_for_in: bool,
    ) -> CResult<()> {
        self.compile_expression(object)?;

        // for-in over a nullish value runs zero iterations.
        let skip_all = if is_for_in {
            let go = self.builder().emit_jump(JumpKind::IfNotNullish);
            self.emit(Opcode::Pop);
            let skip = self.builder().emit_jump(JumpKind::Unconditional);
            self.builder().patch_jump(go);
            self.emit(Opcode::ForInEnumerate);
            Some(skip)
        } else {
            self.emit(Opcode::GetIterator);
            None
        };

        let iter_slot = self.builder().new_local_slot(LocalKind::Value);
        self.emit(Opcode::StoreValue(iter_slot));

        self.push_section(label, SectionKind::Loop);
        let head = self.builder().opcode_count();
        self.builder().mark_reachable();
        self.emit(Opcode::LoadValue(iter_slot));
        self.emit(Opcode::IteratorNext);
        self.emit(Opcode::Dup);
        self.emit(Opcode::IteratorResultDone);
        let done = self.builder().emit_jump(JumpKind::IfTrue);
        self.emit(Opcode::IteratorResultValue);

        let pushed = self.enter_scope_slots(scope)?;
        match target {
            ForTarget::Declaration { source, .. } => {
                self.store_source(source);
            }
            ForTarget::Assignment(expr) => {
                self.compile_store_to_target(expr)?;
            }
        }
        self.compile_statement(body)?;
        self.exit_scope(pushed);
        self.builder().emit_jump_to(head);

        self.builder().patch_jump(done);
        self.builder().set_height(1);
        self.emit(Opcode::Pop);
        self.pop_section(Some(head));
        if let Some(skip) = skip_all {
            self.builder().patch_jump(skip);
        }
        self.builder().set_height(0);
        Ok(())
    }

    fn compile_switch(
        &mut self,
        discriminant: &'ast Expression,
        cases: &'ast [SwitchCase],
        scope: &'ast ScopeRef,
        label: Option<JsString>,
    ) -> CResult<()> {
        self.compile_expression(discriminant)?;
        let pushed = self.enter_scope_slots(scope)?;
        for case in cases {
            self.hoist_functions_in(&case.body)?;
        }
        self.push_section(label, SectionKind::Switch);

        // Test cascade over a retained discriminant copy.
        let mut test_jumps = Vec::new();
        for (i, case) in cases.iter().enumerate() {
            let Some(test) = &case.test else { continue };
            self.emit(Opcode::Dup);
            self.compile_expression(test)?;
            self.emit(Opcode::TestEqualStrict);
            let jump = self.builder().emit_jump(JumpKind::IfToBooleanTrue);
            test_jumps.push((i, jump));
        }
        self.emit(Opcode::Pop);
        let fallback = self.builder().emit_jump(JumpKind::Unconditional);

        // Per-case entry stubs drop the discriminant copy before falling
        // into the body (bodies themselves fall through to each other).
        let mut body_jumps = Vec::new();
        for (i, jump) in test_jumps {
            self.builder().patch_jump(jump);
            self.builder().set_height(1);
            self.emit(Opcode::Pop);
            let to_body = self.builder().emit_jump(JumpKind::Unconditional);
            body_jumps.push((i, to_body));
        }

        let mut default_body = None;
        let mut body_starts = vec![0usize; cases.len()];
        for (i, case) in cases.iter().enumerate() {
            body_starts[i] = self.builder().opcode_count();
            self.builder().mark_reachable();
            self.builder().set_height(0);
            if case.test.is_none() {
                default_body = Some(body_starts[i]);
            }
            for statement in &case.body {
                self.compile_statement(statement)?;
            }
        }

        for (i, jump) in body_jumps {
            self.builder().patch_jump_to(jump, body_starts[i] as u32);
        }
        match default_body {
            Some(target) => self.builder().patch_jump_to(fallback, target as u32),
            None => self.builder().patch_jump(fallback),
        }
        self.builder().set_height(0);
        self.builder().mark_reachable();
        self.pop_section(None);
        self.exit_scope(pushed);
        Ok(())
    }

    fn compile_try(
        &mut self,
        block: &'ast [Statement],
        block_scope: &'ast ScopeRef,
        handler: Option<&'ast CatchClause>,
        finalizer: Option<&'ast [Statement]>,
        finalizer_scope: Option<&'ast ScopeRef>,
    ) -> CResult<()> {
        let env_depth = self.env_chain.len();
        if let (Some(statements), Some(scope)) = (finalizer, finalizer_scope) {
            self.frame().finallys.push(super::FinallyEntry {
                statements,
                scope,
                env_depth,
            });
        }

        let try_start = self.builder().opcode_count() as u32;
        self.compile_finally_body(block, block_scope)?;
        let try_end = self.builder().opcode_count() as u32;
        let after_normal = self.builder().emit_jump(JumpKind::Unconditional);

        // Catch handler: entered with the thrown value on the stack.
        let mut catch_end = try_end;
        let catch_exit = if let Some(clause) = handler {
            let entry = self.builder().opcode_count() as u32;
            self.builder().mark_reachable();
            self.builder().set_height(1);

            let pushed = self.enter_scope_slots(&clause.scope)?;
            match &clause.param {
                Some(param) => self.store_source(param),
                None => {
                    self.emit(Opcode::Pop);
                }
            }
            self.hoist_functions_in(&clause.body)?;
            for statement in &clause.body {
                self.compile_statement(statement)?;
            }
            self.exit_scope(pushed);

            self.builder()
                .add_handler_region(try_start, try_end, entry);
            let exit = self.builder().emit_jump(JumpKind::Unconditional);
            catch_end = self.builder().opcode_count() as u32;
            Some(exit)
        } else {
            None
        };

        if let (Some(statements), Some(scope)) = (finalizer, finalizer_scope) {
            self.frame().finallys.pop();

            // Exceptional path: run the finally body, then rethrow.
            let entry = self.builder().opcode_count() as u32;
            self.builder().mark_reachable();
            self.builder().set_height(1);
            let slot = self.scratch_slot();
            self.emit(Opcode::StoreValue(slot));
            self.compile_finally_body(statements, scope)?;
            self.emit(Opcode::LoadValue(slot));
            self.emit(Opcode::Throw);
            self.builder()
                .add_handler_region(try_start, catch_end, entry);

            // Normal path.
            self.builder().patch_jump(after_normal);
            if let Some(exit) = catch_exit {
                self.builder().patch_jump(exit);
            }
            self.builder().set_height(0);
            self.builder().mark_reachable();
            self.compile_finally_body(statements, scope)?;
        } else {
            self.builder().patch_jump(after_normal);
            if let Some(exit) = catch_exit {
                self.builder().patch_jump(exit);
            }
            self.builder().set_height(0);
            self.builder().mark_reachable();
        }
        Ok(())
    }

}
