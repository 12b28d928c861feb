//! Expression parsing with precedence climbing

use std::sync::Arc;

use super::Parser;
use crate::core::ast::{
    Argument, ArrayElement, AssignOp, BinaryOp, Expr, ExprKind, FunctionBody, FunctionDef,
    LogicalOp, ObjectProperty, Param, Pattern, PropertyKey, TemplatePart, UnaryOp,
};
use crate::core::token::{TemplateChunk, TokenKind};
use crate::error::{ScriptError, ScriptResult};
use crate::lexer::Lexer;
use crate::value::number_to_string;

impl Parser<'_> {
    /// Comma-separated expression list.
    pub(super) fn parse_expression(&mut self) -> ScriptResult<Expr> {
        let first = self.parse_assignment()?;
        if !self.at(&TokenKind::Comma) {
            return Ok(first);
        }
        let start = first.span.start;
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_assignment()?);
        }
        Ok(Expr::new(ExprKind::Sequence(items), self.span_from(start)))
    }

    pub(super) fn parse_assignment(&mut self) -> ScriptResult<Expr> {
        self.scoped(|parser| {
            parser.enter()?;
            parser.parse_assignment_inner()
        })
    }

    fn parse_assignment_inner(&mut self) -> ScriptResult<Expr> {
        if let Some(arrow) = self.try_arrow_function()? {
            return Ok(arrow);
        }

        let start = self.start();
        let left = self.parse_conditional()?;

        let op = match self.kind() {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::PlusAssign => AssignOp::Binary(BinaryOp::Add),
            TokenKind::MinusAssign => AssignOp::Binary(BinaryOp::Subtract),
            TokenKind::StarAssign => AssignOp::Binary(BinaryOp::Multiply),
            TokenKind::SlashAssign => AssignOp::Binary(BinaryOp::Divide),
            TokenKind::PercentAssign => AssignOp::Binary(BinaryOp::Modulo),
            TokenKind::NullishAssign => AssignOp::Logical(LogicalOp::Nullish),
            TokenKind::OrAssign => AssignOp::Logical(LogicalOp::Or),
            TokenKind::AndAssign => AssignOp::Logical(LogicalOp::And),
            _ => return Ok(left),
        };
        let op_span = self.advance().span;

        let target = if op == AssignOp::Assign {
            self.expr_to_pattern(left)?
        } else {
            match left.kind {
                ExprKind::Ident(name) => Pattern::Ident(name),
                ExprKind::Member { optional: false, .. } | ExprKind::Index { optional: false, .. } => {
                    Pattern::Member(Box::new(left))
                }
                _ => {
                    return Err(ScriptError::syntax(
                        "Invalid left-hand side in assignment",
                        op_span,
                    ));
                }
            }
        };

        let value = self.parse_assignment()?;
        Ok(Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            self.span_from(start),
        ))
    }

    fn try_arrow_function(&mut self) -> ScriptResult<Option<Expr>> {
        let start = self.start();
        let mut offset = 0;
        let is_async = self.at_ident("async")
            && !self.tokens[(self.position + 1).min(self.tokens.len() - 1)].newline_before
            && matches!(
                self.peek_kind(1),
                TokenKind::Identifier(_) | TokenKind::LeftParen
            );
        if is_async {
            offset = 1;
        }

        let lookahead = (
            self.peek_kind(offset).clone(),
            self.peek_kind(offset + 1).clone(),
        );
        let params = match lookahead {
            (TokenKind::Identifier(name), TokenKind::Arrow) => {
                let target = Pattern::Ident(Arc::from(name.as_str()));
                for _ in 0..=offset {
                    self.advance();
                }
                vec![Param {
                    target,
                    default: None,
                    rest: false,
                }]
            }
            (TokenKind::LeftParen, _) => {
                let saved = (self.position, self.prev_end, self.nesting);
                if is_async {
                    self.advance();
                }
                match self.parse_params() {
                    Ok(params) if self.at(&TokenKind::Arrow) && !self.current().newline_before => {
                        params
                    }
                    _ => {
                        (self.position, self.prev_end, self.nesting) = saved;
                        return Ok(None);
                    }
                }
            }
            _ => return Ok(None),
        };

        self.expect(&TokenKind::Arrow)?;
        let body = if self.at(&TokenKind::LeftBrace) {
            FunctionBody::Block(self.parse_function_body()?)
        } else {
            let saved_loops = std::mem::take(&mut self.loop_depth);
            let body = self.parse_assignment();
            self.loop_depth = saved_loops;
            FunctionBody::Expr(Box::new(body?))
        };

        let span = self.span_from(start);
        let def = FunctionDef {
            name: None,
            params,
            body,
            is_async,
            is_arrow: true,
            span,
        };
        Ok(Some(Expr::new(ExprKind::Function(Arc::new(def)), span)))
    }

    fn parse_conditional(&mut self) -> ScriptResult<Expr> {
        let start = self.start();
        let test = self.parse_binary(0)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            self.span_from(start),
        ))
    }

    fn parse_binary(&mut self, min_precedence: u8) -> ScriptResult<Expr> {
        self.scoped(|parser| parser.parse_binary_chain(min_precedence))
    }

    /// Operands of a left-associative chain nest one level per operator.
    fn parse_binary_chain(&mut self, min_precedence: u8) -> ScriptResult<Expr> {
        let start = self.start();
        let mut left = self.parse_unary()?;

        while let Some(precedence) = self.kind().precedence() {
            if precedence < min_precedence {
                break;
            }
            self.enter()?;
            let op_token = self.advance().kind;
            let next_min = if op_token.is_right_associative() {
                precedence
            } else {
                precedence + 1
            };
            let right = self.parse_binary(next_min)?;
            let span = self.span_from(start);

            let kind = match op_token {
                TokenKind::And => logical(LogicalOp::And, left, right),
                TokenKind::Or => logical(LogicalOp::Or, left, right),
                TokenKind::Nullish => logical(LogicalOp::Nullish, left, right),
                other => {
                    let op = match other {
                        TokenKind::Plus => BinaryOp::Add,
                        TokenKind::Minus => BinaryOp::Subtract,
                        TokenKind::Star => BinaryOp::Multiply,
                        TokenKind::Slash => BinaryOp::Divide,
                        TokenKind::Percent => BinaryOp::Modulo,
                        TokenKind::Power => BinaryOp::Power,
                        TokenKind::Equal => BinaryOp::Equal,
                        TokenKind::NotEqual => BinaryOp::NotEqual,
                        TokenKind::StrictEqual => BinaryOp::StrictEqual,
                        TokenKind::StrictNotEqual => BinaryOp::StrictNotEqual,
                        TokenKind::LessThan => BinaryOp::LessThan,
                        TokenKind::GreaterThan => BinaryOp::GreaterThan,
                        TokenKind::LessEqual => BinaryOp::LessEqual,
                        TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                        TokenKind::In => BinaryOp::In,
                        TokenKind::Instanceof => BinaryOp::Instanceof,
                        unexpected => {
                            return Err(ScriptError::syntax(
                                format!("Unexpected operator '{unexpected}'"),
                                span,
                            ));
                        }
                    };
                    ExprKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    }
                }
            };
            left = Expr::new(kind, span);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ScriptResult<Expr> {
        self.scoped(Self::parse_unary_inner)
    }

    fn parse_unary_inner(&mut self) -> ScriptResult<Expr> {
        let start = self.start();
        let op = match self.kind() {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Typeof => UnaryOp::Typeof,
            TokenKind::Delete => UnaryOp::Delete,
            TokenKind::Await => {
                self.enter()?;
                self.advance();
                let operand = self.parse_unary()?;
                return Ok(Expr::new(
                    ExprKind::Await(Box::new(operand)),
                    self.span_from(start),
                ));
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                self.enter()?;
                let increment = self.advance().kind == TokenKind::PlusPlus;
                let target = self.parse_unary()?;
                self.check_update_target(&target)?;
                return Ok(Expr::new(
                    ExprKind::Update {
                        increment,
                        prefix: true,
                        target: Box::new(target),
                    },
                    self.span_from(start),
                ));
            }
            _ => return self.parse_postfix(),
        };
        self.enter()?;
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            self.span_from(start),
        ))
    }

    fn parse_postfix(&mut self) -> ScriptResult<Expr> {
        let start = self.start();
        let expr = self.parse_call_member()?;
        let increment = match self.kind() {
            TokenKind::PlusPlus if !self.current().newline_before => true,
            TokenKind::MinusMinus if !self.current().newline_before => false,
            _ => return Ok(expr),
        };
        self.check_update_target(&expr)?;
        self.advance();
        Ok(Expr::new(
            ExprKind::Update {
                increment,
                prefix: false,
                target: Box::new(expr),
            },
            self.span_from(start),
        ))
    }

    fn check_update_target(&self, target: &Expr) -> ScriptResult<()> {
        match target.kind {
            ExprKind::Ident(_)
            | ExprKind::Member { optional: false, .. }
            | ExprKind::Index { optional: false, .. } => Ok(()),
            _ => Err(ScriptError::syntax(
                "Invalid left-hand side expression in update operation",
                target.span,
            )),
        }
    }

    fn parse_call_member(&mut self) -> ScriptResult<Expr> {
        self.scoped(Self::parse_call_member_chain)
    }

    /// Every `.name`, `[index]` and `(args)` link nests one level.
    fn parse_call_member_chain(&mut self) -> ScriptResult<Expr> {
        let start = self.start();
        let mut expr = if self.at(&TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        loop {
            if matches!(
                self.kind(),
                TokenKind::Dot | TokenKind::QuestionDot | TokenKind::LeftBracket | TokenKind::LeftParen
            ) {
                self.enter()?;
            }
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.expect_property_name()?;
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property,
                            optional: false,
                        },
                        self.span_from(start),
                    );
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    expr = match self.kind() {
                        TokenKind::LeftParen => {
                            let args = self.parse_arguments()?;
                            Expr::new(
                                ExprKind::Call {
                                    callee: Box::new(expr),
                                    args,
                                    optional: true,
                                },
                                self.span_from(start),
                            )
                        }
                        TokenKind::LeftBracket => {
                            self.advance();
                            let index = self.parse_expression()?;
                            self.expect(&TokenKind::RightBracket)?;
                            Expr::new(
                                ExprKind::Index {
                                    object: Box::new(expr),
                                    index: Box::new(index),
                                    optional: true,
                                },
                                self.span_from(start),
                            )
                        }
                        _ => {
                            let property = self.expect_property_name()?;
                            Expr::new(
                                ExprKind::Member {
                                    object: Box::new(expr),
                                    property,
                                    optional: true,
                                },
                                self.span_from(start),
                            )
                        }
                    };
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RightBracket)?;
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                            optional: false,
                        },
                        self.span_from(start),
                    );
                }
                TokenKind::LeftParen => {
                    let args = self.parse_arguments()?;
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                            optional: false,
                        },
                        self.span_from(start),
                    );
                }
                TokenKind::Template(_) if !self.current().newline_before => {
                    return Err(ScriptError::syntax(
                        "Tagged templates are not supported",
                        self.current().span,
                    ));
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_new(&mut self) -> ScriptResult<Expr> {
        let start = self.expect(&TokenKind::New)?.span.start;
        let mut callee = self.parse_primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                self.enter()?;
                let property = self.expect_property_name()?;
                callee = Expr::new(
                    ExprKind::Member {
                        object: Box::new(callee),
                        property,
                        optional: false,
                    },
                    self.span_from(start),
                );
            } else {
                break;
            }
        }
        let args = if self.at(&TokenKind::LeftParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::new(
            ExprKind::New {
                callee: Box::new(callee),
                args,
            },
            self.span_from(start),
        ))
    }

    fn expect_property_name(&mut self) -> ScriptResult<Arc<str>> {
        match self.kind().as_property_name() {
            Some(name) => {
                self.advance();
                Ok(Arc::from(name))
            }
            None => Err(self.unexpected()),
        }
    }

    fn parse_arguments(&mut self) -> ScriptResult<Vec<Argument>> {
        self.expect(&TokenKind::LeftParen)?;
        let mut args = Vec::new();
        while !self.at(&TokenKind::RightParen) {
            if self.eat(&TokenKind::Ellipsis) {
                args.push(Argument::Spread(self.parse_assignment()?));
            } else {
                args.push(Argument::Positional(self.parse_assignment()?));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> ScriptResult<Expr> {
        let token = self.current().clone();
        let span = token.span;
        let kind = match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                ExprKind::Number(n)
            }
            TokenKind::String(s) => {
                self.advance();
                ExprKind::String(Arc::from(s))
            }
            TokenKind::Template(chunks) => {
                self.advance();
                ExprKind::Template(self.parse_template(chunks)?)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::Null
            }
            TokenKind::Undefined => {
                self.advance();
                ExprKind::Undefined
            }
            TokenKind::Identifier(name) if name == "async" && *self.peek_kind(1) == TokenKind::Function => {
                self.advance();
                let def = self.parse_function(true, false)?;
                return Ok(Expr::new(ExprKind::Function(def), self.span_from(span.start)));
            }
            TokenKind::Identifier(name) => {
                self.advance();
                ExprKind::Ident(Arc::from(name))
            }
            TokenKind::Function => {
                let def = self.parse_function(false, false)?;
                return Ok(Expr::new(ExprKind::Function(def), self.span_from(span.start)));
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                return Ok(Expr::new(inner.kind, self.span_from(span.start)));
            }
            TokenKind::LeftBracket => self.parse_array_literal()?,
            TokenKind::LeftBrace => self.parse_object_literal()?,
            _ => return Err(self.unexpected()),
        };
        Ok(Expr::new(kind, self.span_from(span.start)))
    }

    fn parse_template(&mut self, chunks: Vec<TemplateChunk>) -> ScriptResult<Vec<TemplatePart>> {
        let mut parts = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match chunk {
                TemplateChunk::Text(text) => parts.push(TemplatePart::Text(Arc::from(text))),
                TemplateChunk::Expr(range) => {
                    let tokens = Lexer::with_range(self.source, range.start as usize, range.end as usize)
                        .tokenize()?;
                    let mut inner = Parser::from_tokens(self.source, tokens);
                    inner.function_depth = self.function_depth;
                    inner.nesting = self.nesting;
                    let expr = inner.parse_expression()?;
                    if !inner.at(&TokenKind::Eof) {
                        return Err(inner.unexpected());
                    }
                    parts.push(TemplatePart::Expr(expr));
                }
            }
        }
        Ok(parts)
    }

    fn parse_array_literal(&mut self) -> ScriptResult<ExprKind> {
        self.expect(&TokenKind::LeftBracket)?;
        let mut items = Vec::new();
        while !self.at(&TokenKind::RightBracket) {
            if self.at(&TokenKind::Comma) {
                self.advance();
                items.push(ArrayElement::Hole);
                continue;
            }
            if self.eat(&TokenKind::Ellipsis) {
                items.push(ArrayElement::Spread(self.parse_assignment()?));
            } else {
                items.push(ArrayElement::Item(self.parse_assignment()?));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBracket)?;
        Ok(ExprKind::Array(items))
    }

    fn parse_object_literal(&mut self) -> ScriptResult<ExprKind> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut props = Vec::new();
        while !self.at(&TokenKind::RightBrace) {
            props.push(self.parse_object_property()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(ExprKind::Object(props))
    }

    fn parse_object_property(&mut self) -> ScriptResult<ObjectProperty> {
        if self.eat(&TokenKind::Ellipsis) {
            return Ok(ObjectProperty::Spread(self.parse_assignment()?));
        }

        let start = self.start();
        let is_async = self.at_ident("async")
            && !matches!(
                self.peek_kind(1),
                TokenKind::Colon | TokenKind::Comma | TokenKind::RightBrace | TokenKind::LeftParen
            );
        if is_async {
            self.advance();
        }

        let key_token = self.current().clone();
        let key = match &key_token.kind {
            TokenKind::String(s) => {
                self.advance();
                PropertyKey::Named(Arc::from(s.as_str()))
            }
            TokenKind::Number(n) => {
                self.advance();
                PropertyKey::Named(Arc::from(number_to_string(*n)))
            }
            TokenKind::LeftBracket => {
                self.advance();
                let expr = self.parse_assignment()?;
                self.expect(&TokenKind::RightBracket)?;
                PropertyKey::Computed(Box::new(expr))
            }
            other => match other.as_property_name() {
                Some(name) => {
                    self.advance();
                    PropertyKey::Named(Arc::from(name))
                }
                None => return Err(self.unexpected()),
            },
        };

        if self.at(&TokenKind::LeftParen) {
            let params = self.parse_params()?;
            let body = self.parse_function_body()?;
            let name = match &key {
                PropertyKey::Named(name) => Some(Arc::clone(name)),
                PropertyKey::Computed(_) => None,
            };
            let span = self.span_from(start);
            let def = FunctionDef {
                name,
                params,
                body: FunctionBody::Block(body),
                is_async,
                is_arrow: false,
                span,
            };
            return Ok(ObjectProperty::KeyValue(
                key,
                Expr::new(ExprKind::Function(Arc::new(def)), span),
            ));
        }
        if is_async {
            return Err(self.unexpected());
        }

        if self.eat(&TokenKind::Colon) {
            return Ok(ObjectProperty::KeyValue(key, self.parse_assignment()?));
        }

        let PropertyKey::Named(name) = key else {
            return Err(self.unexpected());
        };
        if !matches!(key_token.kind, TokenKind::Identifier(_)) {
            return Err(ScriptError::syntax(
                format!("Unexpected token '{}'", key_token.kind),
                key_token.span,
            ));
        }

        // `{ a = 1 }` is only valid as a destructuring target; keep it as an
        // assignment so `expr_to_pattern` can turn it into a default.
        if self.eat(&TokenKind::Assign) {
            let value = self.parse_assignment()?;
            let span = self.span_from(start);
            return Ok(ObjectProperty::KeyValue(
                PropertyKey::Named(Arc::clone(&name)),
                Expr::new(
                    ExprKind::Assign {
                        op: AssignOp::Assign,
                        target: Box::new(Pattern::Ident(name)),
                        value: Box::new(value),
                    },
                    span,
                ),
            ));
        }

        Ok(ObjectProperty::Shorthand(name))
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> ExprKind {
    ExprKind::Logical {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use crate::core::ast::{ExprKind, StmtKind};
    use crate::parser::parse;

    fn expr(source: &str) -> ExprKind {
        let program = parse(source).unwrap();
        match program.body.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Expr(e)) => e.kind,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn precedence_multiplication_binds_tighter() {
        let ExprKind::Binary { op, right, .. } = expr("1 + 2 * 3") else {
            panic!("expected binary");
        };
        assert_eq!(op, crate::core::ast::BinaryOp::Add);
        assert!(matches!(right.kind, ExprKind::Binary { .. }));
    }

    #[test]
    fn arrow_functions() {
        assert!(matches!(expr("x => x * 2"), ExprKind::Function(_)));
        assert!(matches!(expr("(a, b = 2) => { return a + b }"), ExprKind::Function(_)));
        assert!(matches!(expr("async (u) => await get(u)"), ExprKind::Function(def) if def.is_async));
        assert!(matches!(expr("async x => x"), ExprKind::Function(def) if def.is_async));
    }

    #[test]
    fn parenthesized_expression_is_not_arrow() {
        assert!(matches!(expr("(a + b) * c"), ExprKind::Binary { .. }));
    }

    #[test]
    fn optional_chains() {
        assert!(matches!(expr("a?.b"), ExprKind::Member { optional: true, .. }));
        assert!(matches!(expr("a?.[0]"), ExprKind::Index { optional: true, .. }));
        assert!(matches!(expr("a.f?.()"), ExprKind::Call { optional: true, .. }));
    }

    #[test]
    fn object_literal_forms() {
        let ExprKind::Assign { value, .. } = expr("o = { a, 'b-c': 1, [k]: 2, ...rest, m() { return 1 } }") else {
            panic!("expected assignment");
        };
        let ExprKind::Object(props) = &value.kind else {
            panic!("expected object literal");
        };
        assert_eq!(props.len(), 5);
    }

    #[test]
    fn destructuring_assignment() {
        assert!(matches!(expr("[a, b] = [b, a]"), ExprKind::Assign { .. }));
        assert!(parse("1 = 2").is_err());
    }

    #[test]
    fn template_expressions_are_parsed() {
        let ExprKind::Template(parts) = expr("`total: ${items.length * 2}!`") else {
            panic!("expected template");
        };
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn new_with_member_callee() {
        assert!(matches!(expr("new Error('x')"), ExprKind::New { .. }));
    }
}
