//! Recursive descent parser
//!
//! Statements are parsed here; expressions (precedence climbing) live in
//! `expr.rs` and binding patterns in `pattern.rs`.

mod expr;
mod pattern;

use std::sync::Arc;

use crate::core::ast::{
    DeclKind, Declarator, FunctionBody, FunctionDef, Param, Pattern, Program, Stmt, StmtKind,
};
use crate::core::span::Span;
use crate::core::token::{Token, TokenKind};
use crate::error::{ScriptError, ScriptResult};
use crate::lexer::Lexer;

/// Deepest nesting of expressions, statements and patterns the parser
/// accepts, counting every operator, member link and bracket on the way in.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Parse a complete script.
pub fn parse(source: &str) -> ScriptResult<Program> {
    Parser::new(source)?.parse_program()
}

pub struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    position: usize,
    prev_end: u32,
    /// Nesting of function bodies, tracked for `return` validation
    function_depth: usize,
    loop_depth: usize,
    nesting: usize,
}

impl<'s> Parser<'s> {
    pub fn new(source: &'s str) -> ScriptResult<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self::from_tokens(source, tokens))
    }

    fn from_tokens(source: &'s str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            position: 0,
            prev_end: 0,
            function_depth: 0,
            loop_depth: 0,
            nesting: 0,
        }
    }

    pub fn parse_program(&mut self) -> ScriptResult<Program> {
        let mut body = Vec::new();
        while !self.at(&TokenKind::Eof) {
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    // ---- token helpers -------------------------------------------------

    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.position.min(last)]
    }

    fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind(&self, n: usize) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.position + n).min(last)].kind
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    fn at_ident(&self, name: &str) -> bool {
        matches!(self.kind(), TokenKind::Identifier(n) if n == name)
    }

    fn start(&self) -> u32 {
        self.current().span.start
    }

    fn span_from(&self, start: u32) -> Span {
        Span {
            start,
            end: self.prev_end.max(start),
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        self.prev_end = token.span.end;
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ScriptResult<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> ScriptError {
        let token = self.current();
        let message = match &token.kind {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            TokenKind::Identifier(name) => format!("Unexpected identifier '{name}'"),
            TokenKind::Number(_) => "Unexpected number".to_string(),
            TokenKind::String(_) => "Unexpected string".to_string(),
            TokenKind::Template(_) => "Unexpected template string".to_string(),
            other => format!("Unexpected token '{other}'"),
        };
        ScriptError::syntax(message, token.span)
    }

    fn expect_identifier(&mut self) -> ScriptResult<Arc<str>> {
        match self.kind() {
            TokenKind::Identifier(name) => {
                let name = Arc::from(name.as_str());
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Automatic semicolon insertion: `;`, or a line break, `}` or the end.
    fn consume_semicolon(&mut self) -> ScriptResult<()> {
        if self.eat(&TokenKind::Semicolon) {
            return Ok(());
        }
        let token = self.current();
        if token.newline_before || matches!(token.kind, TokenKind::RightBrace | TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// One level deeper; fails past [`MAX_NESTING_DEPTH`].
    fn enter(&mut self) -> ScriptResult<()> {
        if self.nesting >= MAX_NESTING_DEPTH {
            return Err(ScriptError::syntax(
                "Maximum nesting depth exceeded",
                self.current().span,
            ));
        }
        self.nesting += 1;
        Ok(())
    }

    /// Run `parse`, then drop back to the nesting level it started at.
    fn scoped<T>(&mut self, parse: impl FnOnce(&mut Self) -> ScriptResult<T>) -> ScriptResult<T> {
        let base = self.nesting;
        let result = parse(self);
        self.nesting = base;
        result
    }

    // ---- statements ----------------------------------------------------

    fn parse_statement(&mut self) -> ScriptResult<Stmt> {
        self.scoped(|parser| {
            parser.enter()?;
            parser.parse_statement_inner()
        })
    }

    fn parse_statement_inner(&mut self) -> ScriptResult<Stmt> {
        let start = self.start();
        let kind = match self.kind().clone() {
            TokenKind::LeftBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::Semicolon => {
                self.advance();
                StmtKind::Empty
            }
            TokenKind::Const | TokenKind::Let | TokenKind::Var => {
                let stmt = self.parse_declaration()?;
                self.consume_semicolon()?;
                stmt
            }
            TokenKind::Function => StmtKind::Function(self.parse_function(false, true)?),
            TokenKind::Identifier(name)
                if name == "async"
                    && *self.peek_kind(1) == TokenKind::Function
                    && !self.tokens[self.position + 1].newline_before =>
            {
                self.advance();
                StmtKind::Function(self.parse_function(true, true)?)
            }
            TokenKind::Return => {
                if self.function_depth == 0 {
                    return Err(ScriptError::syntax(
                        "Illegal return statement",
                        self.current().span,
                    ));
                }
                self.advance();
                let value = if self.at(&TokenKind::Semicolon)
                    || self.at(&TokenKind::RightBrace)
                    || self.at(&TokenKind::Eof)
                    || self.current().newline_before
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                StmtKind::Return(value)
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::While => {
                self.advance();
                self.expect(&TokenKind::LeftParen)?;
                let test = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                let body = self.parse_loop_body()?;
                StmtKind::While { test, body }
            }
            TokenKind::Do => {
                self.advance();
                let body = self.parse_loop_body()?;
                self.expect(&TokenKind::While)?;
                self.expect(&TokenKind::LeftParen)?;
                let test = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                self.eat(&TokenKind::Semicolon);
                StmtKind::DoWhile { body, test }
            }
            TokenKind::Break | TokenKind::Continue => {
                let token = self.advance();
                if self.loop_depth == 0 {
                    return Err(ScriptError::syntax(
                        format!("Illegal {} statement", token.kind),
                        token.span,
                    ));
                }
                self.consume_semicolon()?;
                if token.kind == TokenKind::Break {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                }
            }
            TokenKind::Throw => {
                self.advance();
                if self.current().newline_before {
                    return Err(ScriptError::syntax(
                        "Illegal newline after throw",
                        self.current().span,
                    ));
                }
                let value = self.parse_expression()?;
                self.consume_semicolon()?;
                StmtKind::Throw(value)
            }
            TokenKind::Try => self.parse_try()?,
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt {
            kind,
            span: self.span_from(start),
        })
    }

    fn parse_block(&mut self) -> ScriptResult<Vec<Stmt>> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut body = Vec::new();
        while !self.at(&TokenKind::RightBrace) {
            if self.at(&TokenKind::Eof) {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_loop_body(&mut self) -> ScriptResult<Box<Stmt>> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        body.map(Box::new)
    }

    fn decl_kind(&mut self) -> Option<DeclKind> {
        let kind = match self.kind() {
            TokenKind::Const => DeclKind::Const,
            TokenKind::Let => DeclKind::Let,
            TokenKind::Var => DeclKind::Var,
            _ => return None,
        };
        self.advance();
        Some(kind)
    }

    fn parse_declaration(&mut self) -> ScriptResult<StmtKind> {
        let Some(kind) = self.decl_kind() else {
            return Err(self.unexpected());
        };
        let first = self.parse_binding_pattern()?;
        self.parse_declarators(kind, first)
    }

    fn parse_declarators(
        &mut self,
        kind: DeclKind,
        first: Pattern,
    ) -> ScriptResult<StmtKind> {
        let mut declarators = Vec::new();
        let mut target = first;
        loop {
            let target_span = self.current().span;
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            let needs_init = kind == DeclKind::Const
                || !matches!(target, Pattern::Ident(_));
            if init.is_none() && needs_init {
                return Err(ScriptError::syntax(
                    "Missing initializer in declaration",
                    target_span,
                ));
            }
            declarators.push(Declarator { target, init });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            target = self.parse_binding_pattern()?;
        }
        Ok(StmtKind::Declare { kind, declarators })
    }

    fn parse_if(&mut self) -> ScriptResult<StmtKind> {
        self.advance();
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(StmtKind::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_for(&mut self) -> ScriptResult<StmtKind> {
        let for_span = self.advance().span;
        if self.at(&TokenKind::Await) {
            return Err(ScriptError::syntax("for await is not supported", for_span));
        }
        self.expect(&TokenKind::LeftParen)?;

        let init_start = self.start();
        let init = if self.at(&TokenKind::Semicolon) {
            None
        } else if let Some(kind) = self.decl_kind() {
            let target = self.parse_binding_pattern()?;
            if self.at_ident("of") || self.at(&TokenKind::In) {
                return self.parse_for_each(Some(kind), target);
            }
            let decl = self.parse_declarators(kind, target)?;
            Some(Box::new(Stmt {
                kind: decl,
                span: self.span_from(init_start),
            }))
        } else if matches!(self.kind(), TokenKind::Identifier(_))
            && (matches!(self.peek_kind(1), TokenKind::Identifier(n) if n == "of")
                || *self.peek_kind(1) == TokenKind::In)
        {
            let name = self.expect_identifier()?;
            return self.parse_for_each(None, Pattern::Ident(name));
        } else {
            let expr = self.parse_expression()?;
            Some(Box::new(Stmt {
                span: expr.span,
                kind: StmtKind::Expr(expr),
            }))
        };
        self.expect(&TokenKind::Semicolon)?;

        let test = if self.at(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let update = if self.at(&TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RightParen)?;

        let body = self.parse_loop_body()?;
        Ok(StmtKind::For {
            init,
            test,
            update,
            body,
        })
    }

    fn parse_for_each(
        &mut self,
        kind: Option<DeclKind>,
        target: Pattern,
    ) -> ScriptResult<StmtKind> {
        let is_of = self.at_ident("of");
        self.advance();
        let subject = if is_of {
            self.parse_assignment()?
        } else {
            self.parse_expression()?
        };
        self.expect(&TokenKind::RightParen)?;
        let body = self.parse_loop_body()?;
        Ok(if is_of {
            StmtKind::ForOf {
                kind,
                target,
                iterable: subject,
                body,
            }
        } else {
            StmtKind::ForIn {
                kind,
                target,
                object: subject,
                body,
            }
        })
    }

    fn parse_try(&mut self) -> ScriptResult<StmtKind> {
        self.advance();
        let block = self.parse_block()?;
        let mut param = None;
        let mut handler = None;
        if self.eat(&TokenKind::Catch) {
            if self.eat(&TokenKind::LeftParen) {
                param = Some(self.parse_binding_pattern()?);
                self.expect(&TokenKind::RightParen)?;
            }
            handler = Some(self.parse_block()?);
        }
        let finalizer = if self.eat(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(ScriptError::syntax(
                "Missing catch or finally after try",
                self.current().span,
            ));
        }
        Ok(StmtKind::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    // ---- functions -----------------------------------------------------

    /// Parse `function name(params) { body }`; the `async` keyword, if any,
    /// has already been consumed.
    fn parse_function(&mut self, is_async: bool, require_name: bool) -> ScriptResult<Arc<FunctionDef>> {
        let start = self.expect(&TokenKind::Function)?.span.start;
        if self.eat(&TokenKind::Star) {
            return Err(ScriptError::syntax(
                "Generator functions are not supported",
                self.span_from(start),
            ));
        }
        let name = if matches!(self.kind(), TokenKind::Identifier(_)) {
            Some(self.expect_identifier()?)
        } else if require_name {
            return Err(self.unexpected());
        } else {
            None
        };
        let params = self.parse_params()?;
        let body = self.parse_function_body()?;
        Ok(Arc::new(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(body),
            is_async,
            is_arrow: false,
            span: self.span_from(start),
        }))
    }

    fn parse_params(&mut self) -> ScriptResult<Vec<Param>> {
        self.expect(&TokenKind::LeftParen)?;
        let mut params = Vec::new();
        while !self.at(&TokenKind::RightParen) {
            if self.eat(&TokenKind::Ellipsis) {
                let target = self.parse_binding_pattern()?;
                params.push(Param {
                    target,
                    default: None,
                    rest: true,
                });
                break;
            }
            let target = self.parse_binding_pattern()?;
            let default = if self.eat(&TokenKind::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            params.push(Param {
                target,
                default,
                rest: false,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightParen)?;
        Ok(params)
    }

    fn parse_function_body(&mut self) -> ScriptResult<Vec<Stmt>> {
        let saved_loops = std::mem::take(&mut self.loop_depth);
        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;
        self.loop_depth = saved_loops;
        body
    }
}
