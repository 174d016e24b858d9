//! Parser
//!
//! Recursive-descent parser with an integrated binder: scopes are built as
//! the tree is parsed and every identifier reference is resolved to its
//! `VariableSource` (or left as a bare global name). Destructuring
//! patterns, `await`, tagged templates, and `with` are rejected here
//! rather than given invented semantics.

use crate::ast::*;
use crate::error::{ParseError, Span};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::value::{CheapClone, JsString};

type PResult<T> = Result<T, ParseError>;

/// Where `super` is legal in the enclosing function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MethodContext {
    None,
    Method,
    Constructor { derived: bool },
}

/// A reference whose declaration had not been seen yet; the binder retries
/// it against each enclosing scope as that scope closes.
struct PendingRef {
    name: JsString,
    cell: BindingCell,
    /// Ids of the scopes open at the use site, innermost last.
    scope_ids: Vec<usize>,
    function_depth: u32,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    prev_span: Span,

    scopes: Vec<ScopeRef>,
    next_scope_id: usize,
    function_depth: u32,
    unresolved: Vec<PendingRef>,

    strict: bool,
    in_generator: bool,
    method_context: MethodContext,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            prev_span: Span::default(),
            scopes: Vec::new(),
            next_scope_id: 0,
            function_depth: 0,
            unresolved: Vec::new(),
            strict: false,
            in_generator: false,
            method_context: MethodContext::None,
        }
    }

    // ─── token plumbing ────────────────────────────────────────────────────

    fn advance(&mut self) {
        self.prev_span = self.current.span;
        self.current = self.lexer.next_token();
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> PResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!(
                "Unexpected token {:?}, expected {:?}",
                self.current.kind, kind
            )))
        }
    }

    fn error(&self, reason: impl Into<String>) -> ParseError {
        ParseError::new(reason, self.current.span)
    }

    fn is_ident(&self, text: &str) -> bool {
        matches!(&self.current.kind, TokenKind::Identifier(name) if name == text)
    }

    fn identifier_name(&mut self) -> PResult<JsString> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.cheap_clone();
                self.advance();
                Ok(name)
            }
            TokenKind::Yield if !self.in_generator && !self.strict => {
                self.advance();
                Ok(JsString::from("yield"))
            }
            other => Err(self.error(format!("Expected identifier, found {:?}", other))),
        }
    }

    /// Consume a statement terminator, applying automatic semicolon
    /// insertion at newlines, `}` and end of input.
    fn eat_semicolon(&mut self) -> PResult<()> {
        if self.eat(&TokenKind::Semicolon) {
            return Ok(());
        }
        if self.check(&TokenKind::RBrace)
            || self.check(&TokenKind::Eof)
            || self.current.newline_before
        {
            return Ok(());
        }
        Err(self.error(format!("Expected ';', found {:?}", self.current.kind)))
    }

    // ─── scopes and binding ────────────────────────────────────────────────

    fn enter_scope(&mut self, kind: ScopeKind, is_arrow: bool) -> ScopeRef {
        let id = self.next_scope_id;
        self.next_scope_id += 1;
        let scope = Scope::new(kind, id, self.function_depth, self.strict, is_arrow);
        self.scopes.push(scope.clone());
        scope
    }

    /// Pop a scope and retry the pending references that could still bind
    /// into it — declarations parsed after their first use (hoisted vars,
    /// mutually recursive functions, TDZ lexicals) land here.
    fn exit_scope(&mut self) {
        let scope = self.scopes.pop().expect("scope underflow");
        self.unresolved.retain(|pending| {
            if !pending.scope_ids.contains(&scope.id) {
                return true;
            }
            let Some(source) = scope.find_source(&pending.name) else {
                return true;
            };
            source.used.set(true);
            if scope.function_depth < pending.function_depth {
                source.captured.set(true);
            }
            *pending.cell.borrow_mut() = Some(source);
            false
        });
    }

    fn current_scope(&self) -> &ScopeRef {
        self.scopes.last().expect("no active scope")
    }

    fn mode_for(scope: &Scope) -> VariableMode {
        match scope.kind {
            ScopeKind::Script => VariableMode::Global,
            ScopeKind::Module => VariableMode::Module,
            _ => VariableMode::Local,
        }
    }

    /// Declare a binding. `var` hoists to the nearest hoisting scope;
    /// lexical declarations bind in the current scope and reject
    /// duplicates.
    fn declare(&mut self, name: JsString, vtype: VariableType) -> PResult<SourceRef> {
        let hoisting = matches!(vtype, VariableType::Var);
        let scope = if hoisting {
            self.scopes
                .iter()
                .rev()
                .find(|s| s.is_hoisting())
                .expect("no hoisting scope")
                .clone()
        } else {
            self.current_scope().clone()
        };

        if let Some(existing) = scope.find_source(&name) {
            let both_var = matches!(existing.vtype, VariableType::Var | VariableType::Function)
                && matches!(vtype, VariableType::Var | VariableType::Function);
            if both_var {
                return Ok(existing);
            }
            return Err(self.error(format!(
                "Identifier '{}' has already been declared",
                name
            )));
        }

        let source = VariableSource::new(name, vtype, Self::mode_for(&scope), scope.id);
        scope.add_source(source.clone());
        Ok(source)
    }

    /// Resolve an identifier reference against the scope stack. References
    /// that find no declaration yet become pending cells, retried as each
    /// enclosing scope closes; a cell still empty after that is a global.
    fn resolve(&mut self, name: &JsString) -> BindingCell {
        for scope in self.scopes.iter().rev() {
            if let Some(source) = scope.find_source(name) {
                source.used.set(true);
                if scope.function_depth < self.function_depth {
                    source.captured.set(true);
                }
                return resolved_cell(source);
            }
        }
        // `arguments` resolves to the implicit binding of the nearest
        // non-arrow function.
        if name == "arguments" {
            for scope in self.scopes.iter().rev() {
                if scope.kind == ScopeKind::Function && !scope.is_arrow {
                    let source = VariableSource::pseudo(name.cheap_clone(), scope.id, false);
                    scope.add_source(source.clone());
                    source.used.set(true);
                    if scope.function_depth < self.function_depth {
                        source.captured.set(true);
                    }
                    scope.arguments_mode.set(ArgumentsMode::Unmapped);
                    return resolved_cell(source);
                }
            }
        }
        let cell = unresolved_cell();
        self.unresolved.push(PendingRef {
            name: name.cheap_clone(),
            cell: cell.clone(),
            scope_ids: self.scopes.iter().map(|s| s.id).collect(),
            function_depth: self.function_depth,
        });
        cell
    }

    /// Resolve `this`: inside an arrow it becomes a captured binding of the
    /// nearest non-arrow function; otherwise it compiles straight to the
    /// receiver slot.
    fn resolve_this(&mut self) -> Option<SourceRef> {
        let mut crossed_arrow = false;
        for scope in self.scopes.iter().rev() {
            if scope.kind == ScopeKind::Function || scope.kind == ScopeKind::Script {
                if scope.is_arrow {
                    crossed_arrow = true;
                    continue;
                }
                if !crossed_arrow {
                    return None;
                }
                let this_name = JsString::from("this");
                let source = scope
                    .sources
                    .borrow()
                    .iter()
                    .find(|s| s.is_this_binding)
                    .cloned();
                let source = match source {
                    Some(s) => s,
                    None => {
                        let s = VariableSource::pseudo(this_name, scope.id, true);
                        scope.add_source(s.clone());
                        s
                    }
                };
                source.used.set(true);
                if scope.function_depth < self.function_depth {
                    source.captured.set(true);
                }
                return Some(source);
            }
        }
        None
    }

    // ─── program ───────────────────────────────────────────────────────────

    pub fn parse_program(&mut self, is_module: bool) -> PResult<Program> {
        if is_module {
            self.strict = true;
        }
        let scope = self.enter_scope(
            if is_module {
                ScopeKind::Module
            } else {
                ScopeKind::Script
            },
            false,
        );
        scope.is_strict.set(self.strict);

        let mut statements = Vec::new();
        self.parse_directives(&scope, &mut statements)?;
        while !self.check(&TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        self.exit_scope();
        Ok(Program {
            statements,
            scope,
            is_module,
        })
    }

    /// The directive prologue; "use strict" flips the scope strict.
    fn parse_directives(&mut self, scope: &ScopeRef, out: &mut Vec<Statement>) -> PResult<()> {
        while let TokenKind::String(s) = &self.current.kind {
            let text = s.cheap_clone();
            let checkpoint = (self.lexer.checkpoint(), self.current.clone());
            self.advance();
            // Only a bare string expression statement is a directive.
            let is_directive = self.check(&TokenKind::Semicolon)
                || self.check(&TokenKind::RBrace)
                || self.check(&TokenKind::Eof)
                || self.current.newline_before;
            if !is_directive {
                self.lexer.restore(checkpoint.0);
                self.current = checkpoint.1;
                break;
            }
            self.eat(&TokenKind::Semicolon);
            if text == "use strict" {
                self.strict = true;
                scope.is_strict.set(true);
            }
            out.push(Statement::Expression(Expression::String(text)));
        }
        Ok(())
    }

    // ─── statements ────────────────────────────────────────────────────────

    fn parse_statement(&mut self) -> PResult<Statement> {
        match &self.current.kind {
            TokenKind::Var | TokenKind::Const => self.parse_variable_statement(),
            TokenKind::Let => self.parse_variable_statement(),
            TokenKind::Function => self.parse_function_declaration(false),
            TokenKind::Async => self.parse_async_statement(),
            TokenKind::Class => self.parse_class_declaration(),
            TokenKind::LBrace => self.parse_block_statement(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::Break => {
                let span = self.current.span;
                self.advance();
                let label = self.optional_label();
                self.eat_semicolon()?;
                Ok(Statement::Break { label, span })
            }
            TokenKind::Continue => {
                let span = self.current.span;
                self.advance();
                let label = self.optional_label();
                self.eat_semicolon()?;
                Ok(Statement::Continue { label, span })
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Empty)
            }
            TokenKind::Debugger => {
                self.advance();
                self.eat_semicolon()?;
                Ok(Statement::Debugger)
            }
            TokenKind::Import => self.parse_import_declaration(),
            TokenKind::Export => self.parse_export_declaration(),
            TokenKind::With => Err(self.error("'with' statements are not supported")),
            TokenKind::Identifier(name) => {
                // Possibly a labelled statement.
                let name = name.cheap_clone();
                let checkpoint = (self.lexer.checkpoint(), self.current.clone());
                self.advance();
                if self.eat(&TokenKind::Colon) {
                    let body = self.parse_statement()?;
                    return Ok(Statement::Labeled {
                        label: name,
                        body: Box::new(body),
                    });
                }
                self.lexer.restore(checkpoint.0);
                self.current = checkpoint.1;
                self.parse_expression_statement()
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn optional_label(&mut self) -> Option<JsString> {
        if self.current.newline_before {
            return None;
        }
        if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.cheap_clone();
            self.advance();
            Some(name)
        } else {
            None
        }
    }

    fn parse_async_statement(&mut self) -> PResult<Statement> {
        // `async function` declarations only; async arrows are unsupported.
        let checkpoint = (self.lexer.checkpoint(), self.current.clone());
        self.advance();
        if self.check(&TokenKind::Function) && !self.current.newline_before {
            return self.parse_function_declaration(true);
        }
        self.lexer.restore(checkpoint.0);
        self.current = checkpoint.1;
        self.parse_expression_statement()
    }

    fn parse_expression_statement(&mut self) -> PResult<Statement> {
        let expr = self.parse_expression(true)?;
        self.eat_semicolon()?;
        Ok(Statement::Expression(expr))
    }

    fn parse_variable_statement(&mut self) -> PResult<Statement> {
        let decl = self.parse_variable_declaration(true)?;
        self.eat_semicolon()?;
        Ok(Statement::Declaration(decl))
    }

    fn parse_variable_declaration(&mut self, allow_in: bool) -> PResult<VariableDeclaration> {
        let kind = match self.current.kind {
            TokenKind::Var => DeclarationKind::Var,
            TokenKind::Let => DeclarationKind::Let,
            TokenKind::Const => DeclarationKind::Const,
            _ => return Err(self.error("Expected variable declaration")),
        };
        self.advance();

        let mut declarators = Vec::new();
        loop {
            if matches!(self.current.kind, TokenKind::LBrace | TokenKind::LBracket) {
                return Err(self.error("Destructuring patterns are not supported"));
            }
            let span = self.current.span;
            let name = self.identifier_name()?;
            let source = self.declare(name, kind.variable_type())?;
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_assignment(allow_in)?)
            } else {
                if kind == DeclarationKind::Const {
                    return Err(self.error("Missing initializer in const declaration"));
                }
                None
            };
            declarators.push(Declarator { source, init, span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(VariableDeclaration { kind, declarators })
    }

    fn parse_function_declaration(&mut self, is_async: bool) -> PResult<Statement> {
        self.expect(&TokenKind::Function)?;
        let is_generator = self.eat(&TokenKind::Star);
        let name = self.identifier_name()?;
        let source = self.declare(name.cheap_clone(), VariableType::Function)?;
        let func = self.parse_function_rest(
            Some(name),
            false,
            is_generator,
            is_async,
            MethodContext::None,
            false,
        )?;
        Ok(Statement::FunctionDeclaration {
            func: Box::new(func),
            source,
        })
    }

    /// Parse params + body once the `function` header (or arrow params) is
    /// next. Handles scope creation, strictness, and the self binding of
    /// named function expressions.
    fn parse_function_rest(
        &mut self,
        name: Option<JsString>,
        is_arrow: bool,
        is_generator: bool,
        is_async: bool,
        method_context: MethodContext,
        bind_self: bool,
    ) -> PResult<FunctionNode> {
        let span = self.current.span;
        let outer_strict = self.strict;
        let outer_generator = self.in_generator;
        let outer_method = self.method_context;

        self.function_depth += 1;
        self.in_generator = is_generator;
        if method_context != MethodContext::None {
            self.method_context = method_context;
        } else if !is_arrow {
            self.method_context = MethodContext::None;
        }
        let scope = self.enter_scope(ScopeKind::Function, is_arrow);

        let self_source = if bind_self {
            name.as_ref()
                .map(|n| {
                    let source =
                        VariableSource::new(n.cheap_clone(), VariableType::Function, VariableMode::Local, scope.id);
                    scope.add_source(source.clone());
                    source
                })
        } else {
            None
        };

        let params = self.parse_parameters()?;

        let body = if is_arrow && !self.check(&TokenKind::LBrace) {
            FunctionBody::Expression(Box::new(self.parse_assignment(true)?))
        } else {
            self.expect(&TokenKind::LBrace)?;
            let mut statements = Vec::new();
            self.parse_directives(&scope.clone(), &mut statements)?;
            while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
                statements.push(self.parse_statement()?);
            }
            self.expect(&TokenKind::RBrace)?;
            FunctionBody::Block(statements)
        };

        self.exit_scope();
        self.function_depth -= 1;
        self.strict = outer_strict;
        self.in_generator = outer_generator;
        self.method_context = outer_method;

        Ok(FunctionNode {
            name,
            params,
            body,
            scope,
            self_source,
            is_arrow,
            is_generator,
            is_async,
            span,
        })
    }

    fn parse_parameters(&mut self) -> PResult<Vec<Parameter>> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let rest = self.eat(&TokenKind::DotDotDot);
            if matches!(self.current.kind, TokenKind::LBrace | TokenKind::LBracket) {
                return Err(self.error("Destructuring parameters are not supported"));
            }
            let name = self.identifier_name()?;
            let source = self.declare(name, VariableType::Parameter)?;
            let default = if !rest && self.eat(&TokenKind::Assign) {
                Some(self.parse_assignment(true)?)
            } else {
                None
            };
            params.push(Parameter {
                source,
                default,
                rest,
            });
            if rest {
                break;
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_class_declaration(&mut self) -> PResult<Statement> {
        let class = self.parse_class_node()?;
        let name = class
            .name
            .as_ref()
            .ok_or_else(|| self.error("Class declarations require a name"))?
            .cheap_clone();
        let source = self.declare(name, VariableType::Class)?;
        Ok(Statement::ClassDeclaration {
            class: Box::new(class),
            source,
        })
    }

    fn parse_class_node(&mut self) -> PResult<ClassNode> {
        let span = self.current.span;
        self.expect(&TokenKind::Class)?;
        let name = if let TokenKind::Identifier(n) = &self.current.kind {
            let n = n.cheap_clone();
            self.advance();
            Some(n)
        } else {
            None
        };
        let super_class = if self.eat(&TokenKind::Extends) {
            Some(Box::new(self.parse_unary()?))
        } else {
            None
        };
        let derived = super_class.is_some();

        // Class bodies are always strict.
        let outer_strict = self.strict;
        self.strict = true;

        self.expect(&TokenKind::LBrace)?;
        let mut constructor = None;
        let mut members = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            let is_static = if self.is_ident("static") {
                let checkpoint = (self.lexer.checkpoint(), self.current.clone());
                self.advance();
                if self.check(&TokenKind::LParen) || self.check(&TokenKind::Assign) {
                    self.lexer.restore(checkpoint.0);
                    self.current = checkpoint.1;
                    false
                } else {
                    true
                }
            } else {
                false
            };

            let mut kind = AccessorKind::Method;
            if self.is_ident("get") || self.is_ident("set") {
                let is_get = self.is_ident("get");
                let checkpoint = (self.lexer.checkpoint(), self.current.clone());
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.lexer.restore(checkpoint.0);
                    self.current = checkpoint.1;
                } else {
                    kind = if is_get {
                        AccessorKind::Getter
                    } else {
                        AccessorKind::Setter
                    };
                }
            }
            let is_generator = self.eat(&TokenKind::Star);
            let key = self.parse_property_name()?;

            let is_constructor = !is_static
                && kind == AccessorKind::Method
                && !is_generator
                && matches!(&key, PropertyName::Identifier(n) if n == "constructor");

            let context = if is_constructor {
                MethodContext::Constructor { derived }
            } else {
                MethodContext::Method
            };
            let func = self.parse_function_rest(None, false, is_generator, false, context, false)?;

            if is_constructor {
                constructor = Some(Box::new(func));
            } else {
                members.push(ClassMember {
                    key,
                    kind,
                    is_static,
                    func: Box::new(func),
                });
            }
        }
        self.expect(&TokenKind::RBrace)?;
        self.strict = outer_strict;

        Ok(ClassNode {
            name,
            super_class,
            constructor,
            members,
            span,
        })
    }

    fn parse_property_name(&mut self) -> PResult<PropertyName> {
        match &self.current.kind {
            TokenKind::Identifier(n) => {
                let n = n.cheap_clone();
                self.advance();
                Ok(PropertyName::Identifier(n))
            }
            TokenKind::String(s) => {
                let s = s.cheap_clone();
                self.advance();
                Ok(PropertyName::String(s))
            }
            TokenKind::Number(n) => {
                let n = *n;
                self.advance();
                Ok(PropertyName::Number(n))
            }
            TokenKind::LBracket => {
                self.advance();
                let expr = self.parse_assignment(true)?;
                self.expect(&TokenKind::RBracket)?;
                Ok(PropertyName::Computed(Box::new(expr)))
            }
            // Keywords are valid property names.
            other => {
                if let Some(text) = keyword_text(other) {
                    self.advance();
                    Ok(PropertyName::Identifier(JsString::from(text)))
                } else {
                    Err(self.error(format!("Invalid property name {:?}", other)))
                }
            }
        }
    }

    fn parse_block_statement(&mut self) -> PResult<Statement> {
        self.expect(&TokenKind::LBrace)?;
        let scope = self.enter_scope(ScopeKind::Block, false);
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RBrace)?;
        self.exit_scope();
        Ok(Statement::Block { statements, scope })
    }

    fn parse_if_statement(&mut self) -> PResult<Statement> {
        self.expect(&TokenKind::If)?;
        self.expect(&TokenKind::LParen)?;
        let test = self.parse_expression(true)?;
        self.expect(&TokenKind::RParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_while_statement(&mut self) -> PResult<Statement> {
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LParen)?;
        let test = self.parse_expression(true)?;
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::While { test, body })
    }

    fn parse_do_while_statement(&mut self) -> PResult<Statement> {
        self.expect(&TokenKind::Do)?;
        let body = Box::new(self.parse_statement()?);
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LParen)?;
        let test = self.parse_expression(true)?;
        self.expect(&TokenKind::RParen)?;
        self.eat(&TokenKind::Semicolon);
        Ok(Statement::DoWhile { body, test })
    }

    fn parse_for_statement(&mut self) -> PResult<Statement> {
        self.expect(&TokenKind::For)?;
        self.expect(&TokenKind::LParen)?;
        let scope = self.enter_scope(ScopeKind::Block, false);

        // for-in / for-of with a fresh declaration.
        if matches!(
            self.current.kind,
            TokenKind::Var | TokenKind::Let | TokenKind::Const
        ) {
            let kind = match self.current.kind {
                TokenKind::Var => DeclarationKind::Var,
                TokenKind::Let => DeclarationKind::Let,
                _ => DeclarationKind::Const,
            };
            let checkpoint = (self.lexer.checkpoint(), self.current.clone());
            self.advance();
            if let TokenKind::Identifier(name) = self.current.kind.clone() {
                self.advance();
                if self.check(&TokenKind::In) || self.is_ident("of") {
                    let is_in = self.check(&TokenKind::In);
                    self.advance();
                    let source = self.declare(name, kind.variable_type())?;
                    let target = ForTarget::Declaration { kind, source };
                    return self.finish_for_each(scope, target, is_in);
                }
            }
            self.lexer.restore(checkpoint.0);
            self.current = checkpoint.1;
        } else if !self.check(&TokenKind::Semicolon) {
            // for-in / for-of over an existing reference.
            let checkpoint = (self.lexer.checkpoint(), self.current.clone());
            if let TokenKind::Identifier(name) = self.current.kind.clone() {
                self.advance();
                if self.check(&TokenKind::In) || self.is_ident("of") {
                    let is_in = self.check(&TokenKind::In);
                    self.advance();
                    let span = checkpoint.1.span;
                    let source = self.resolve(&name);
                    let target = ForTarget::Assignment(Expression::Identifier {
                        name,
                        source,
                        span,
                    });
                    return self.finish_for_each(scope, target, is_in);
                }
                self.lexer.restore(checkpoint.0);
                self.current = checkpoint.1;
            }
        }

        // Classic three-clause for.
        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if matches!(
            self.current.kind,
            TokenKind::Var | TokenKind::Let | TokenKind::Const
        ) {
            Some(ForInit::Declaration(self.parse_variable_declaration(false)?))
        } else {
            Some(ForInit::Expression(self.parse_expression(false)?))
        };
        self.expect(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression(true)?)
        };
        self.expect(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression(true)?)
        };
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        self.exit_scope();
        Ok(Statement::For {
            init,
            test,
            update,
            body,
            scope,
        })
    }

    fn finish_for_each(
        &mut self,
        scope: ScopeRef,
        target: ForTarget,
        is_in: bool,
    ) -> PResult<Statement> {
        let object = self.parse_assignment(true)?;
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        self.exit_scope();
        Ok(if is_in {
            Statement::ForIn {
                target,
                object,
                body,
                scope,
            }
        } else {
            Statement::ForOf {
                target,
                iterable: object,
                body,
                scope,
            }
        })
    }

    fn parse_switch_statement(&mut self) -> PResult<Statement> {
        self.expect(&TokenKind::Switch)?;
        self.expect(&TokenKind::LParen)?;
        let discriminant = self.parse_expression(true)?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::LBrace)?;
        let scope = self.enter_scope(ScopeKind::Block, false);
        let mut cases = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            let test = if self.eat(&TokenKind::Case) {
                let test = self.parse_expression(true)?;
                Some(test)
            } else {
                self.expect(&TokenKind::Default)?;
                None
            };
            self.expect(&TokenKind::Colon)?;
            let mut body = Vec::new();
            while !matches!(
                self.current.kind,
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        self.expect(&TokenKind::RBrace)?;
        self.exit_scope();
        Ok(Statement::Switch {
            discriminant,
            cases,
            scope,
        })
    }

    fn parse_return_statement(&mut self) -> PResult<Statement> {
        let span = self.current.span;
        self.expect(&TokenKind::Return)?;
        let argument = if self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.check(&TokenKind::Eof)
            || self.current.newline_before
        {
            None
        } else {
            Some(self.parse_expression(true)?)
        };
        self.eat_semicolon()?;
        Ok(Statement::Return { argument, span })
    }

    fn parse_throw_statement(&mut self) -> PResult<Statement> {
        let span = self.current.span;
        self.expect(&TokenKind::Throw)?;
        if self.current.newline_before {
            return Err(self.error("Illegal newline after throw"));
        }
        let argument = self.parse_expression(true)?;
        self.eat_semicolon()?;
        Ok(Statement::Throw { argument, span })
    }

    fn parse_try_statement(&mut self) -> PResult<Statement> {
        self.expect(&TokenKind::Try)?;
        self.expect(&TokenKind::LBrace)?;
        let block_scope = self.enter_scope(ScopeKind::Block, false);
        let mut block = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            block.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RBrace)?;
        self.exit_scope();

        let handler = if self.eat(&TokenKind::Catch) {
            let scope = self.enter_scope(ScopeKind::Catch, false);
            let param = if self.eat(&TokenKind::LParen) {
                if matches!(self.current.kind, TokenKind::LBrace | TokenKind::LBracket) {
                    return Err(self.error("Destructuring catch parameters are not supported"));
                }
                let name = self.identifier_name()?;
                let source = self.declare(name, VariableType::Let)?;
                self.expect(&TokenKind::RParen)?;
                Some(source)
            } else {
                None
            };
            self.expect(&TokenKind::LBrace)?;
            let mut body = Vec::new();
            while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
                body.push(self.parse_statement()?);
            }
            self.expect(&TokenKind::RBrace)?;
            self.exit_scope();
            Some(CatchClause { param, body, scope })
        } else {
            None
        };

        let (finalizer, finalizer_scope) = if self.eat(&TokenKind::Finally) {
            self.expect(&TokenKind::LBrace)?;
            let scope = self.enter_scope(ScopeKind::Block, false);
            let mut body = Vec::new();
            while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
                body.push(self.parse_statement()?);
            }
            self.expect(&TokenKind::RBrace)?;
            self.exit_scope();
            (Some(body), Some(scope))
        } else {
            (None, None)
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally after try"));
        }

        Ok(Statement::Try {
            block,
            block_scope,
            handler,
            finalizer,
            finalizer_scope,
        })
    }

    // ─── modules ───────────────────────────────────────────────────────────

    fn parse_import_declaration(&mut self) -> PResult<Statement> {
        self.expect(&TokenKind::Import)?;
        if self.current_scope().kind != ScopeKind::Module {
            return Err(self.error("import declarations require a module"));
        }
        let mut specifiers = Vec::new();
        let mut default = None;

        if let TokenKind::Identifier(name) = self.current.kind.clone() {
            self.advance();
            default = Some(self.declare(name, VariableType::Const)?);
            if self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::LBrace)?;
                self.parse_import_specifiers(&mut specifiers)?;
            }
        } else if self.eat(&TokenKind::LBrace) {
            self.parse_import_specifiers(&mut specifiers)?;
        } else if let TokenKind::String(_) = self.current.kind {
            // Side-effect import.
        } else {
            return Err(self.error("Unsupported import form"));
        }

        if default.is_some() || !specifiers.is_empty() {
            if !self.is_ident("from") {
                return Err(self.error("Expected 'from' in import declaration"));
            }
            self.advance();
        }
        let module = match self.current.kind.clone() {
            TokenKind::String(s) => {
                self.advance();
                s
            }
            _ => return Err(self.error("Expected module specifier string")),
        };
        self.eat_semicolon()?;
        Ok(Statement::Import {
            specifiers,
            default,
            module,
        })
    }

    fn parse_import_specifiers(&mut self, out: &mut Vec<ImportSpecifier>) -> PResult<()> {
        while !self.check(&TokenKind::RBrace) {
            let imported = self.identifier_name()?;
            let local_name = if self.is_ident("as") {
                self.advance();
                self.identifier_name()?
            } else {
                imported.cheap_clone()
            };
            let local = self.declare(local_name, VariableType::Const)?;
            out.push(ImportSpecifier { imported, local });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(())
    }

    fn parse_export_declaration(&mut self) -> PResult<Statement> {
        self.expect(&TokenKind::Export)?;
        if self.current_scope().kind != ScopeKind::Module {
            return Err(self.error("export declarations require a module"));
        }
        if self.eat(&TokenKind::Default) {
            let expr = self.parse_assignment(true)?;
            self.eat_semicolon()?;
            return Ok(Statement::Export {
                declaration: None,
                specifiers: Vec::new(),
                default: Some(expr),
            });
        }
        if self.eat(&TokenKind::LBrace) {
            let mut specifiers = Vec::new();
            while !self.check(&TokenKind::RBrace) {
                let local = self.identifier_name()?;
                let exported = if self.is_ident("as") {
                    self.advance();
                    self.identifier_name()?
                } else {
                    local.cheap_clone()
                };
                specifiers.push(ExportSpecifier { local, exported });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RBrace)?;
            self.eat_semicolon()?;
            return Ok(Statement::Export {
                declaration: None,
                specifiers,
                default: None,
            });
        }
        let declaration = self.parse_statement()?;
        match &declaration {
            Statement::Declaration(_)
            | Statement::FunctionDeclaration { .. }
            | Statement::ClassDeclaration { .. } => {}
            _ => return Err(self.error("Unsupported export form")),
        }
        Ok(Statement::Export {
            declaration: Some(Box::new(declaration)),
            specifiers: Vec::new(),
            default: None,
        })
    }

    // ─── expressions ───────────────────────────────────────────────────────

    pub fn parse_expression(&mut self, allow_in: bool) -> PResult<Expression> {
        let first = self.parse_assignment(allow_in)?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.parse_assignment(allow_in)?);
        }
        Ok(Expression::Sequence(exprs))
    }

    fn parse_assignment(&mut self, allow_in: bool) -> PResult<Expression> {
        if self.check(&TokenKind::Yield) && self.in_generator {
            return self.parse_yield();
        }

        // Arrow functions: single identifier or a parenthesized list
        // followed by `=>`.
        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }

        let span = self.current.span;
        let target = self.parse_conditional(allow_in)?;

        let op: Option<AssignOp> = match self.current.kind {
            TokenKind::Assign => Some(None),
            TokenKind::PlusAssign => Some(Some(BinaryOp::Add)),
            TokenKind::MinusAssign => Some(Some(BinaryOp::Sub)),
            TokenKind::StarAssign => Some(Some(BinaryOp::Mul)),
            TokenKind::SlashAssign => Some(Some(BinaryOp::Div)),
            TokenKind::PercentAssign => Some(Some(BinaryOp::Rem)),
            TokenKind::StarStarAssign => Some(Some(BinaryOp::Exp)),
            TokenKind::AmpAssign => Some(Some(BinaryOp::BitAnd)),
            TokenKind::PipeAssign => Some(Some(BinaryOp::BitOr)),
            TokenKind::CaretAssign => Some(Some(BinaryOp::BitXor)),
            TokenKind::ShlAssign => Some(Some(BinaryOp::Shl)),
            TokenKind::ShrAssign => Some(Some(BinaryOp::Shr)),
            TokenKind::UshrAssign => Some(Some(BinaryOp::Ushr)),
            _ => None,
        };
        if let Some(op) = op {
            self.check_assignment_target(&target)?;
            self.advance();
            let value = self.parse_assignment(allow_in)?;
            return Ok(Expression::Assignment {
                op,
                target: Box::new(target),
                value: Box::new(value),
                span,
            });
        }

        let logical = match self.current.kind {
            TokenKind::AmpAmpAssign => Some(LogicalOp::And),
            TokenKind::PipePipeAssign => Some(LogicalOp::Or),
            TokenKind::QuestionQuestionAssign => Some(LogicalOp::Nullish),
            _ => None,
        };
        if let Some(op) = logical {
            self.check_assignment_target(&target)?;
            self.advance();
            let value = self.parse_assignment(allow_in)?;
            return Ok(Expression::LogicalAssignment {
                op,
                target: Box::new(target),
                value: Box::new(value),
                span,
            });
        }

        Ok(target)
    }

    fn check_assignment_target(&self, target: &Expression) -> PResult<()> {
        match target {
            Expression::Identifier { .. } | Expression::Member { .. } => Ok(()),
            Expression::Array(_) | Expression::Object(_) => {
                Err(self.error("Destructuring assignment is not supported"))
            }
            _ => Err(self.error("Invalid assignment target")),
        }
    }

    fn parse_yield(&mut self) -> PResult<Expression> {
        let span = self.current.span;
        self.expect(&TokenKind::Yield)?;
        let delegate = self.eat(&TokenKind::Star);
        let argument = if self.current.newline_before
            || matches!(
                self.current.kind,
                TokenKind::Semicolon
                    | TokenKind::RParen
                    | TokenKind::RBrace
                    | TokenKind::RBracket
                    | TokenKind::Comma
                    | TokenKind::Colon
                    | TokenKind::Eof
            ) {
            None
        } else {
            Some(Box::new(self.parse_assignment(true)?))
        };
        Ok(Expression::Yield {
            argument,
            delegate,
            span,
        })
    }

    /// Detect and parse arrow functions without binder side effects on the
    /// failure path.
    fn try_parse_arrow(&mut self) -> PResult<Option<Expression>> {
        match self.current.kind.clone() {
            TokenKind::Identifier(name) => {
                let checkpoint = (self.lexer.checkpoint(), self.current.clone());
                self.advance();
                if self.check(&TokenKind::Arrow) && !self.current.newline_before {
                    self.advance();
                    let func = self.parse_arrow_with(|p| {
                        let source = p.declare(name.cheap_clone(), VariableType::Parameter)?;
                        Ok(vec![Parameter {
                            source,
                            default: None,
                            rest: false,
                        }])
                    })?;
                    return Ok(Some(Expression::Function(Box::new(func))));
                }
                self.lexer.restore(checkpoint.0);
                self.current = checkpoint.1;
                Ok(None)
            }
            TokenKind::LParen => {
                if !self.paren_starts_arrow() {
                    return Ok(None);
                }
                let func = self.parse_arrow_with(|p| p.parse_parameters())?;
                Ok(Some(Expression::Function(Box::new(func))))
            }
            _ => Ok(None),
        }
    }

    /// Lookahead: does the parenthesized run ahead end with `=>`?
    fn paren_starts_arrow(&mut self) -> bool {
        let checkpoint = (self.lexer.checkpoint(), self.current.clone());
        let mut depth = 0usize;
        let mut result = false;
        loop {
            match &self.current.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        result = self.check(&TokenKind::Arrow) && !self.current.newline_before;
                        break;
                    }
                }
                TokenKind::Eof => break,
                _ => {}
            }
            self.advance();
        }
        self.lexer.restore(checkpoint.0);
        self.current = checkpoint.1;
        result
    }

    fn parse_arrow_with(
        &mut self,
        parse_params: impl FnOnce(&mut Self) -> PResult<Vec<Parameter>>,
    ) -> PResult<FunctionNode> {
        let span = self.current.span;
        let outer_generator = self.in_generator;
        self.in_generator = false;
        self.function_depth += 1;
        let scope = self.enter_scope(ScopeKind::Function, true);
        let params = parse_params(self)?;
        if self.check(&TokenKind::Arrow) {
            self.advance();
        }
        let body = if self.check(&TokenKind::LBrace) {
            self.advance();
            let mut statements = Vec::new();
            self.parse_directives(&scope.clone(), &mut statements)?;
            while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
                statements.push(self.parse_statement()?);
            }
            self.expect(&TokenKind::RBrace)?;
            FunctionBody::Block(statements)
        } else {
            FunctionBody::Expression(Box::new(self.parse_assignment(true)?))
        };
        self.exit_scope();
        self.function_depth -= 1;
        self.in_generator = outer_generator;
        Ok(FunctionNode {
            name: None,
            params,
            body,
            scope,
            self_source: None,
            is_arrow: true,
            is_generator: false,
            is_async: false,
            span,
        })
    }

    fn parse_conditional(&mut self, allow_in: bool) -> PResult<Expression> {
        let test = self.parse_nullish(allow_in)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment(true)?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assignment(allow_in)?;
        Ok(Expression::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn parse_nullish(&mut self, allow_in: bool) -> PResult<Expression> {
        let mut left = self.parse_logical_or(allow_in)?;
        while self.eat(&TokenKind::QuestionQuestion) {
            let right = self.parse_logical_or(allow_in)?;
            left = Expression::Logical {
                op: LogicalOp::Nullish,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_logical_or(&mut self, allow_in: bool) -> PResult<Expression> {
        let mut left = self.parse_logical_and(allow_in)?;
        while self.eat(&TokenKind::PipePipe) {
            let right = self.parse_logical_and(allow_in)?;
            left = Expression::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self, allow_in: bool) -> PResult<Expression> {
        let mut left = self.parse_binary(0, allow_in)?;
        while self.eat(&TokenKind::AmpAmp) {
            let right = self.parse_binary(0, allow_in)?;
            left = Expression::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// Precedence-climbing parse of the binary operators.
    fn parse_binary(&mut self, min_prec: u8, allow_in: bool) -> PResult<Expression> {
        let mut left = self.parse_unary()?;
        loop {
            let Some((op, prec, right_assoc)) = self.binary_op(allow_in) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.advance();
            let next_min = if right_assoc { prec } else { prec + 1 };
            let right = self.parse_binary(next_min, allow_in)?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn binary_op(&self, allow_in: bool) -> Option<(BinaryOp, u8, bool)> {
        let op = match self.current.kind {
            TokenKind::Pipe => (BinaryOp::BitOr, 1, false),
            TokenKind::Caret => (BinaryOp::BitXor, 2, false),
            TokenKind::Amp => (BinaryOp::BitAnd, 3, false),
            TokenKind::Eq => (BinaryOp::Eq, 4, false),
            TokenKind::NotEq => (BinaryOp::NotEq, 4, false),
            TokenKind::StrictEq => (BinaryOp::StrictEq, 4, false),
            TokenKind::StrictNotEq => (BinaryOp::StrictNotEq, 4, false),
            TokenKind::Lt => (BinaryOp::Lt, 5, false),
            TokenKind::LtEq => (BinaryOp::LtEq, 5, false),
            TokenKind::Gt => (BinaryOp::Gt, 5, false),
            TokenKind::GtEq => (BinaryOp::GtEq, 5, false),
            TokenKind::InstanceOf => (BinaryOp::InstanceOf, 5, false),
            TokenKind::In if allow_in => (BinaryOp::In, 5, false),
            TokenKind::Shl => (BinaryOp::Shl, 6, false),
            TokenKind::Shr => (BinaryOp::Shr, 6, false),
            TokenKind::Ushr => (BinaryOp::Ushr, 6, false),
            TokenKind::Plus => (BinaryOp::Add, 7, false),
            TokenKind::Minus => (BinaryOp::Sub, 7, false),
            TokenKind::Star => (BinaryOp::Mul, 8, false),
            TokenKind::Slash => (BinaryOp::Div, 8, false),
            TokenKind::Percent => (BinaryOp::Rem, 8, false),
            TokenKind::StarStar => (BinaryOp::Exp, 9, true),
            _ => return None,
        };
        Some(op)
    }

    fn parse_unary(&mut self) -> PResult<Expression> {
        let op = match self.current.kind {
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::TypeOf => Some(UnaryOp::TypeOf),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let argument = self.parse_unary()?;
            return Ok(Expression::Unary {
                op,
                argument: Box::new(argument),
            });
        }
        if matches!(self.current.kind, TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let op = if self.check(&TokenKind::PlusPlus) {
                UpdateOp::Inc
            } else {
                UpdateOp::Dec
            };
            self.advance();
            let target = self.parse_unary()?;
            self.check_assignment_target(&target)?;
            return Ok(Expression::Update {
                op,
                prefix: true,
                target: Box::new(target),
            });
        }
        if self.check(&TokenKind::Await) {
            return Err(self.error("'await' is not supported"));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expression> {
        let expr = self.parse_call_chain()?;
        if !self.current.newline_before
            && matches!(self.current.kind, TokenKind::PlusPlus | TokenKind::MinusMinus)
        {
            let op = if self.check(&TokenKind::PlusPlus) {
                UpdateOp::Inc
            } else {
                UpdateOp::Dec
            };
            self.advance();
            self.check_assignment_target(&expr)?;
            return Ok(Expression::Update {
                op,
                prefix: false,
                target: Box::new(expr),
            });
        }
        Ok(expr)
    }

    fn parse_call_chain(&mut self) -> PResult<Expression> {
        let mut expr = if self.eat(&TokenKind::New) {
            if self.check(&TokenKind::Dot) {
                // new.target
                self.advance();
                let prop = self.identifier_name()?;
                if prop != "target" {
                    return Err(self.error("Expected 'new.target'"));
                }
                Expression::NewTarget
            } else {
                let span = self.prev_span;
                let callee = self.parse_member_only()?;
                let arguments = if self.check(&TokenKind::LParen) {
                    self.parse_arguments()?
                } else {
                    Vec::new()
                };
                Expression::New {
                    callee: Box::new(callee),
                    arguments,
                    span,
                }
            }
        } else {
            self.parse_primary()?
        };

        let mut has_optional = false;
        loop {
            match &self.current.kind {
                TokenKind::Dot => {
                    let span = self.current.span;
                    self.advance();
                    let name = self.member_name()?;
                    expr = Expression::Member {
                        object: Box::new(expr),
                        property: MemberProperty::Identifier(name),
                        optional: false,
                        span,
                    };
                }
                TokenKind::QuestionDot => {
                    let span = self.current.span;
                    self.advance();
                    has_optional = true;
                    if self.check(&TokenKind::LParen) {
                        let arguments = self.parse_arguments()?;
                        expr = Expression::Call {
                            callee: Box::new(expr),
                            arguments,
                            optional: true,
                            span,
                        };
                    } else if self.check(&TokenKind::LBracket) {
                        self.advance();
                        let key = self.parse_expression(true)?;
                        self.expect(&TokenKind::RBracket)?;
                        expr = Expression::Member {
                            object: Box::new(expr),
                            property: MemberProperty::Computed(Box::new(key)),
                            optional: true,
                            span,
                        };
                    } else {
                        let name = self.member_name()?;
                        expr = Expression::Member {
                            object: Box::new(expr),
                            property: MemberProperty::Identifier(name),
                            optional: true,
                            span,
                        };
                    }
                }
                TokenKind::LBracket => {
                    let span = self.current.span;
                    self.advance();
                    let key = self.parse_expression(true)?;
                    self.expect(&TokenKind::RBracket)?;
                    expr = Expression::Member {
                        object: Box::new(expr),
                        property: MemberProperty::Computed(Box::new(key)),
                        optional: false,
                        span,
                    };
                }
                TokenKind::LParen => {
                    let span = self.current.span;
                    let arguments = self.parse_arguments()?;
                    expr = Expression::Call {
                        callee: Box::new(expr),
                        arguments,
                        optional: false,
                        span,
                    };
                }
                TokenKind::TemplateHead(_) | TokenKind::TemplateNoSub(_) => {
                    return Err(self.error("Tagged templates are not supported"));
                }
                _ => break,
            }
        }

        if has_optional {
            expr = Expression::OptionalChain(Box::new(expr));
        }
        Ok(expr)
    }

    /// Member expression without call arguments, for `new` callees.
    fn parse_member_only(&mut self) -> PResult<Expression> {
        let mut expr = self.parse_primary()?;
        loop {
            match &self.current.kind {
                TokenKind::Dot => {
                    let span = self.current.span;
                    self.advance();
                    let name = self.member_name()?;
                    expr = Expression::Member {
                        object: Box::new(expr),
                        property: MemberProperty::Identifier(name),
                        optional: false,
                        span,
                    };
                }
                TokenKind::LBracket => {
                    let span = self.current.span;
                    self.advance();
                    let key = self.parse_expression(true)?;
                    self.expect(&TokenKind::RBracket)?;
                    expr = Expression::Member {
                        object: Box::new(expr),
                        property: MemberProperty::Computed(Box::new(key)),
                        optional: false,
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn member_name(&mut self) -> PResult<JsString> {
        match self.current.kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => {
                if let Some(text) = keyword_text(&other) {
                    self.advance();
                    Ok(JsString::from(text))
                } else {
                    Err(self.error(format!("Expected property name, found {:?}", other)))
                }
            }
        }
    }

    fn parse_arguments(&mut self) -> PResult<Vec<Argument>> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let spread = self.eat(&TokenKind::DotDotDot);
            let expr = self.parse_assignment(true)?;
            args.push(Argument { expr, spread });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expression> {
        match self.current.kind.clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expression::Number(n))
            }
            TokenKind::BigInt(b) => {
                self.advance();
                Ok(Expression::BigInt(b))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expression::String(s))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expression::Boolean(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expression::Boolean(false))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expression::Null)
            }
            TokenKind::Slash | TokenKind::SlashAssign => {
                // Expression position: this is a regex literal.
                let token = self.lexer.rescan_regex(self.current.span.start);
                self.current = token;
                match self.current.kind.clone() {
                    TokenKind::Regex { pattern, flags } => {
                        self.advance();
                        Ok(Expression::RegExp { pattern, flags })
                    }
                    _ => Err(self.error("Invalid regular expression")),
                }
            }
            TokenKind::TemplateNoSub(s) => {
                self.advance();
                Ok(Expression::Template(TemplateLiteral {
                    quasis: vec![s],
                    expressions: Vec::new(),
                }))
            }
            TokenKind::TemplateHead(head) => {
                self.advance();
                self.parse_template_rest(head)
            }
            TokenKind::This => {
                let span = self.current.span;
                self.advance();
                let source = self.resolve_this();
                Ok(Expression::This { source, span })
            }
            TokenKind::Super => {
                let span = self.current.span;
                self.advance();
                self.parse_super(span)
            }
            TokenKind::Identifier(name) => {
                let span = self.current.span;
                self.advance();
                let source = self.resolve(&name);
                Ok(Expression::Identifier { name, source, span })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression(true)?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::Function => {
                self.advance();
                let is_generator = self.eat(&TokenKind::Star);
                let name = if let TokenKind::Identifier(n) = self.current.kind.clone() {
                    self.advance();
                    Some(n)
                } else {
                    None
                };
                let func = self.parse_function_rest(
                    name,
                    false,
                    is_generator,
                    false,
                    MethodContext::None,
                    true,
                )?;
                Ok(Expression::Function(Box::new(func)))
            }
            TokenKind::Async => {
                self.advance();
                if self.check(&TokenKind::Function) && !self.current.newline_before {
                    self.advance();
                    let is_generator = self.eat(&TokenKind::Star);
                    let name = if let TokenKind::Identifier(n) = self.current.kind.clone() {
                        self.advance();
                        Some(n)
                    } else {
                        None
                    };
                    let func = self.parse_function_rest(
                        name,
                        false,
                        is_generator,
                        true,
                        MethodContext::None,
                        true,
                    )?;
                    return Ok(Expression::Function(Box::new(func)));
                }
                Err(self.error("async arrow functions are not supported"))
            }
            TokenKind::Class => {
                let class = self.parse_class_node()?;
                Ok(Expression::Class(Box::new(class)))
            }
            other => Err(self.error(format!("Unexpected token {:?}", other))),
        }
    }

    fn parse_super(&mut self, span: Span) -> PResult<Expression> {
        match self.method_context {
            MethodContext::None => return Err(self.error("'super' outside of a method")),
            MethodContext::Method => {}
            MethodContext::Constructor { .. } => {}
        }
        if self.check(&TokenKind::LParen) {
            if !matches!(self.method_context, MethodContext::Constructor { derived: true }) {
                return Err(self.error("'super' call outside of a derived constructor"));
            }
            let arguments = self.parse_arguments()?;
            return Ok(Expression::SuperCall { arguments, span });
        }
        if self.eat(&TokenKind::Dot) {
            let name = self.member_name()?;
            return Ok(Expression::SuperMember {
                property: MemberProperty::Identifier(name),
                span,
            });
        }
        if self.eat(&TokenKind::LBracket) {
            let key = self.parse_expression(true)?;
            self.expect(&TokenKind::RBracket)?;
            return Ok(Expression::SuperMember {
                property: MemberProperty::Computed(Box::new(key)),
                span,
            });
        }
        Err(self.error("Unexpected use of 'super'"))
    }

    fn parse_template_rest(&mut self, head: JsString) -> PResult<Expression> {
        let mut quasis = vec![head];
        let mut expressions = Vec::new();
        loop {
            expressions.push(self.parse_expression(true)?);
            if !self.check(&TokenKind::RBrace) {
                return Err(self.error("Expected '}' in template literal"));
            }
            // Re-enter the lexer right after the brace.
            let after_brace = self.current.span.end;
            self.lexer.restore(after_brace);
            let token = self.lexer.scan_template_continuation();
            match token.kind {
                TokenKind::TemplateMiddle(s) => {
                    quasis.push(s);
                    self.advance();
                }
                TokenKind::TemplateTail(s) => {
                    quasis.push(s);
                    self.current = self.lexer.next_token();
                    break;
                }
                _ => return Err(self.error("Unterminated template literal")),
            }
        }
        Ok(Expression::Template(TemplateLiteral {
            quasis,
            expressions,
        }))
    }

    fn parse_array_literal(&mut self) -> PResult<Expression> {
        self.expect(&TokenKind::LBracket)?;
        let mut elements = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            if self.eat(&TokenKind::Comma) {
                elements.push(None); // hole
                continue;
            }
            let spread = self.eat(&TokenKind::DotDotDot);
            let expr = self.parse_assignment(true)?;
            elements.push(Some(ArrayElement { expr, spread }));
            if !self.check(&TokenKind::RBracket) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(Expression::Array(elements))
    }

    fn parse_object_literal(&mut self) -> PResult<Expression> {
        self.expect(&TokenKind::LBrace)?;
        let mut properties = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.eat(&TokenKind::DotDotDot) {
                let expr = self.parse_assignment(true)?;
                properties.push(ObjectProperty::Spread(expr));
            } else {
                properties.push(self.parse_object_property()?);
            }
            if !self.check(&TokenKind::RBrace) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expression::Object(properties))
    }

    fn parse_object_property(&mut self) -> PResult<ObjectProperty> {
        // get/set accessors, unless `get`/`set` is itself the key.
        if self.is_ident("get") || self.is_ident("set") {
            let is_get = self.is_ident("get");
            let checkpoint = (self.lexer.checkpoint(), self.current.clone());
            self.advance();
            if !matches!(
                self.current.kind,
                TokenKind::Colon | TokenKind::Comma | TokenKind::RBrace | TokenKind::LParen
            ) {
                let key = self.parse_property_name()?;
                let func =
                    self.parse_function_rest(None, false, false, false, MethodContext::Method, false)?;
                return Ok(ObjectProperty::Method {
                    key,
                    func: Box::new(func),
                    kind: if is_get {
                        AccessorKind::Getter
                    } else {
                        AccessorKind::Setter
                    },
                });
            }
            self.lexer.restore(checkpoint.0);
            self.current = checkpoint.1;
        }

        let is_generator = self.eat(&TokenKind::Star);
        let key = self.parse_property_name()?;

        if self.check(&TokenKind::LParen) {
            // Method shorthand.
            let func = self.parse_function_rest(
                None,
                false,
                is_generator,
                false,
                MethodContext::Method,
                false,
            )?;
            return Ok(ObjectProperty::Method {
                key,
                func: Box::new(func),
                kind: AccessorKind::Method,
            });
        }
        if is_generator {
            return Err(self.error("Expected method body after generator property name"));
        }

        if self.eat(&TokenKind::Colon) {
            let value = self.parse_assignment(true)?;
            return Ok(ObjectProperty::KeyValue { key, value });
        }

        // Shorthand { x }.
        match key {
            PropertyName::Identifier(name) => {
                let source = self.resolve(&name);
                let span = self.prev_span;
                Ok(ObjectProperty::KeyValue {
                    key: PropertyName::Identifier(name.cheap_clone()),
                    value: Expression::Identifier { name, source, span },
                })
            }
            _ => Err(self.error("Expected ':' after property name")),
        }
    }
}

fn keyword_text(kind: &TokenKind) -> Option<&'static str> {
    Some(match kind {
        TokenKind::Var => "var",
        TokenKind::Let => "let",
        TokenKind::Const => "const",
        TokenKind::Function => "function",
        TokenKind::Class => "class",
        TokenKind::Extends => "extends",
        TokenKind::Return => "return",
        TokenKind::If => "if",
        TokenKind::Else => "else",
        TokenKind::While => "while",
        TokenKind::Do => "do",
        TokenKind::For => "for",
        TokenKind::In => "in",
        TokenKind::InstanceOf => "instanceof",
        TokenKind::TypeOf => "typeof",
        TokenKind::Void => "void",
        TokenKind::Delete => "delete",
        TokenKind::New => "new",
        TokenKind::This => "this",
        TokenKind::Super => "super",
        TokenKind::Null => "null",
        TokenKind::True => "true",
        TokenKind::False => "false",
        TokenKind::Throw => "throw",
        TokenKind::Try => "try",
        TokenKind::Catch => "catch",
        TokenKind::Finally => "finally",
        TokenKind::Switch => "switch",
        TokenKind::Case => "case",
        TokenKind::Default => "default",
        TokenKind::Break => "break",
        TokenKind::Continue => "continue",
        TokenKind::Yield => "yield",
        TokenKind::Import => "import",
        TokenKind::Export => "export",
        TokenKind::Debugger => "debugger",
        TokenKind::Async => "async",
        TokenKind::Await => "await",
        TokenKind::With => "with",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        Parser::new(source).parse_program(false).expect("parse failed")
    }

    fn parse_err(source: &str) -> ParseError {
        Parser::new(source)
            .parse_program(false)
            .expect_err("expected parse error")
    }

    #[test]
    fn test_simple_script() {
        let program = parse("let x = 1; x + 2;");
        assert_eq!(program.statements.len(), 2);
        assert!(!program.is_module);
    }

    #[test]
    fn test_resolution_links_to_declaration() {
        let program = parse("let x = 1; x;");
        let Statement::Expression(Expression::Identifier { source, .. }) = &program.statements[1]
        else {
            panic!("expected identifier statement");
        };
        let source = source.borrow().clone().expect("x should resolve");
        assert_eq!(source.name, "x");
        assert_eq!(source.mode, VariableMode::Global);
        assert!(source.used.get());
    }

    #[test]
    fn test_use_before_declaration_binds_late() {
        let program = parse("function f() { return g(); function g() { return 1; } }");
        let Statement::FunctionDeclaration { func, .. } = &program.statements[0] else {
            panic!("expected function");
        };
        let FunctionBody::Block(body) = &func.body else { panic!() };
        let Statement::Return {
            argument: Some(Expression::Call { callee, .. }),
            ..
        } = &body[0]
        else {
            panic!("expected return g()");
        };
        let Expression::Identifier { source, .. } = &**callee else {
            panic!("expected identifier callee");
        };
        let source = source.borrow().clone().expect("g should bind to the later declaration");
        assert_eq!(source.vtype, VariableType::Function);
    }

    #[test]
    fn test_capture_detection() {
        let program = parse("function f() { let a = 1; return () => a; }");
        let Statement::FunctionDeclaration { func, .. } = &program.statements[0] else {
            panic!("expected function");
        };
        let FunctionBody::Block(body) = &func.body else {
            panic!()
        };
        let Statement::Declaration(decl) = &body[0] else {
            panic!()
        };
        assert!(decl.declarators[0].source.captured.get());
    }

    #[test]
    fn test_unresolved_is_global_reference() {
        let program = parse("print;");
        let Statement::Expression(Expression::Identifier { source, .. }) = &program.statements[0]
        else {
            panic!()
        };
        assert!(source.borrow().is_none());
    }

    #[test]
    fn test_arrow_forms() {
        parse("let f = x => x + 1;");
        parse("let g = (a, b = 2) => { return a + b; };");
        parse("let h = () => 0;");
    }

    #[test]
    fn test_paren_expression_not_arrow() {
        parse("let y = (1 + 2) * 3;");
    }

    #[test]
    fn test_destructuring_rejected() {
        parse_err("let { a } = obj;");
        parse_err("let [a] = arr;");
        parse_err("function f({ a }) {}");
    }

    #[test]
    fn test_duplicate_let_rejected() {
        parse_err("let a = 1; let a = 2;");
    }

    #[test]
    fn test_classes() {
        parse("class A { constructor() {} m() { return 1; } static s() {} get v() { return 2; } }");
        parse("class B extends A { constructor() { super(); } m() { return super.m(); } }");
    }

    #[test]
    fn test_super_call_outside_derived_ctor_rejected() {
        parse_err("class A { m() { super(); } }");
    }

    #[test]
    fn test_for_variants() {
        parse("for (let i = 0; i < 3; i++) {}");
        parse("for (const k in obj) {}");
        parse("for (const v of arr) {}");
        parse("for (;;) { break; }");
    }

    #[test]
    fn test_template_literal() {
        let program = parse("`a${1}b${2}c`;");
        let Statement::Expression(Expression::Template(t)) = &program.statements[0] else {
            panic!()
        };
        assert_eq!(t.quasis.len(), 3);
        assert_eq!(t.expressions.len(), 2);
    }

    #[test]
    fn test_asi() {
        parse("let a = 1\nlet b = 2\na + b");
        parse("return_value");
    }

    #[test]
    fn test_optional_chain() {
        let program = parse("a?.b.c;");
        let Statement::Expression(Expression::OptionalChain(_)) = &program.statements[0] else {
            panic!("expected optional chain boundary");
        };
    }

    #[test]
    fn test_generator_yield() {
        parse("function* g() { yield 1; let x = yield; yield* [1, 2]; }");
        parse_err("function f() { yield 1; }");
    }

    #[test]
    fn test_modules() {
        let program = Parser::new("import { a as b } from 'm'; export let c = b;")
            .parse_program(true)
            .expect("module parse");
        assert!(program.is_module);
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn test_use_strict_directive() {
        let program = parse("'use strict'; let x = 1;");
        assert!(program.scope.is_strict.get());
    }

    #[test]
    fn test_regex_in_expression_position() {
        let program = parse("let r = /ab+c/g;");
        let Statement::Declaration(decl) = &program.statements[0] else {
            panic!()
        };
        assert!(matches!(
            decl.declarators[0].init,
            Some(Expression::RegExp { .. })
        ));
    }
}
