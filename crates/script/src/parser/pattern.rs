//! Binding and assignment patterns

use std::sync::Arc;

use super::Parser;
use crate::core::ast::{
    ArrayElement, AssignOp, Expr, ExprKind, ObjectProperty, Pattern, PatternItem, PatternProp,
    PropertyKey,
};
use crate::core::token::TokenKind;
use crate::error::{ScriptError, ScriptResult};

impl Parser<'_> {
    /// Declaration / parameter target: identifier, `[...]` or `{...}`.
    pub(super) fn parse_binding_pattern(&mut self) -> ScriptResult<Pattern> {
        self.scoped(|parser| {
            parser.enter()?;
            parser.parse_binding_target()
        })
    }

    fn parse_binding_target(&mut self) -> ScriptResult<Pattern> {
        match self.kind() {
            TokenKind::Identifier(_) => Ok(Pattern::Ident(self.expect_identifier()?)),
            TokenKind::LeftBracket => self.parse_array_pattern(),
            TokenKind::LeftBrace => self.parse_object_pattern(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_array_pattern(&mut self) -> ScriptResult<Pattern> {
        self.expect(&TokenKind::LeftBracket)?;
        let mut items = Vec::new();
        let mut rest = None;
        while !self.at(&TokenKind::RightBracket) {
            if self.eat(&TokenKind::Comma) {
                items.push(None);
                continue;
            }
            if self.eat(&TokenKind::Ellipsis) {
                rest = Some(Box::new(self.parse_binding_pattern()?));
                break;
            }
            let target = self.parse_binding_pattern()?;
            let default = self.parse_default()?;
            items.push(Some(PatternItem { target, default }));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBracket)?;
        Ok(Pattern::Array { items, rest })
    }

    fn parse_object_pattern(&mut self) -> ScriptResult<Pattern> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut props = Vec::new();
        let mut rest = None;
        while !self.at(&TokenKind::RightBrace) {
            if self.eat(&TokenKind::Ellipsis) {
                rest = Some(self.expect_identifier()?);
                break;
            }
            let key_token = self.current().clone();
            let key: Arc<str> = match &key_token.kind {
                TokenKind::String(s) => Arc::from(s.as_str()),
                other => match other.as_property_name() {
                    Some(name) => Arc::from(name),
                    None => return Err(self.unexpected()),
                },
            };
            self.advance();

            let target = if self.eat(&TokenKind::Colon) {
                self.parse_binding_pattern()?
            } else if matches!(key_token.kind, TokenKind::Identifier(_)) {
                Pattern::Ident(Arc::clone(&key))
            } else {
                return Err(ScriptError::syntax(
                    format!("Unexpected token '{}'", key_token.kind),
                    key_token.span,
                ));
            };
            let default = self.parse_default()?;
            props.push(PatternProp {
                key,
                target,
                default,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(Pattern::Object { props, rest })
    }

    fn parse_default(&mut self) -> ScriptResult<Option<Expr>> {
        if self.eat(&TokenKind::Assign) {
            Ok(Some(self.parse_assignment()?))
        } else {
            Ok(None)
        }
    }

    /// Reinterpret an already parsed expression as an assignment target.
    pub(super) fn expr_to_pattern(&self, expr: Expr) -> ScriptResult<Pattern> {
        let span = expr.span;
        match expr.kind {
            ExprKind::Ident(name) => Ok(Pattern::Ident(name)),
            ExprKind::Member { optional: false, .. } | ExprKind::Index { optional: false, .. } => {
                Ok(Pattern::Member(Box::new(expr)))
            }
            ExprKind::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                let mut rest = None;
                let count = elements.len();
                for (i, element) in elements.into_iter().enumerate() {
                    match element {
                        ArrayElement::Hole => items.push(None),
                        ArrayElement::Item(item) => {
                            let (target, default) = self.split_default(item)?;
                            items.push(Some(PatternItem { target, default }));
                        }
                        ArrayElement::Spread(inner) if i + 1 == count => {
                            rest = Some(Box::new(self.expr_to_pattern(inner)?));
                        }
                        ArrayElement::Spread(inner) => {
                            return Err(ScriptError::syntax(
                                "Rest element must be last element",
                                inner.span,
                            ));
                        }
                    }
                }
                Ok(Pattern::Array { items, rest })
            }
            ExprKind::Object(properties) => {
                let mut props = Vec::with_capacity(properties.len());
                let mut rest = None;
                for property in properties {
                    match property {
                        ObjectProperty::Shorthand(name) => props.push(PatternProp {
                            key: Arc::clone(&name),
                            target: Pattern::Ident(name),
                            default: None,
                        }),
                        ObjectProperty::KeyValue(PropertyKey::Named(key), value) => {
                            let (target, default) = self.split_default(value)?;
                            props.push(PatternProp {
                                key,
                                target,
                                default,
                            });
                        }
                        ObjectProperty::Spread(Expr {
                            kind: ExprKind::Ident(name),
                            ..
                        }) => rest = Some(name),
                        ObjectProperty::KeyValue(PropertyKey::Computed(key), _) => {
                            return Err(ScriptError::syntax(
                                "Computed keys are not supported in destructuring",
                                key.span,
                            ));
                        }
                        ObjectProperty::Spread(other) => {
                            return Err(ScriptError::syntax(
                                "Invalid rest element",
                                other.span,
                            ));
                        }
                    }
                }
                Ok(Pattern::Object { props, rest })
            }
            _ => Err(ScriptError::syntax(
                "Invalid left-hand side in assignment",
                span,
            )),
        }
    }

    fn split_default(&self, expr: Expr) -> ScriptResult<(Pattern, Option<Expr>)> {
        match expr.kind {
            ExprKind::Assign {
                op: AssignOp::Assign,
                target,
                value,
            } => Ok((*target, Some(*value))),
            kind => Ok((
                self.expr_to_pattern(Expr {
                    kind,
                    span: expr.span,
                })?,
                None,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::ast::{Pattern, StmtKind};
    use crate::parser::parse;

    #[test]
    fn nested_object_pattern_with_defaults() {
        let program = parse("const { a, b: { c = 3 }, ...others } = obj;").unwrap();
        let StmtKind::Declare { declarators, .. } = &program.body[0].kind else {
            panic!("expected declaration");
        };
        let Pattern::Object { props, rest } = &declarators[0].target else {
            panic!("expected object pattern");
        };
        assert_eq!(props.len(), 2);
        assert_eq!(rest.as_deref(), Some("others"));
        assert!(matches!(&props[1].target, Pattern::Object { props, .. } if props[0].default.is_some()));
    }

    #[test]
    fn array_pattern_with_holes_and_rest() {
        let program = parse("let [, second, ...tail] = list;").unwrap();
        let StmtKind::Declare { declarators, .. } = &program.body[0].kind else {
            panic!("expected declaration");
        };
        let Pattern::Array { items, rest } = &declarators[0].target else {
            panic!("expected array pattern");
        };
        assert_eq!(items.len(), 2);
        assert!(items[0].is_none());
        assert!(rest.is_some());
    }

    #[test]
    fn destructuring_requires_initializer() {
        assert!(parse("const { a };").is_err());
    }
}
