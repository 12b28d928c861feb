//! Expression evaluation

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::IndexMap;

use super::call::Closure;
use super::methods::{check_string_length, get_property, set_property};
use super::ops::{self, iterate};
use super::{Env, Interpreter};
use crate::core::ast::{
    Argument, ArrayElement, AssignOp, Expr, ExprKind, LogicalOp, ObjectProperty, Pattern,
    PropertyKey, TemplatePart, UnaryOp,
};
use crate::error::{ScriptError, ScriptResult};
use crate::value::{Callable, Value};

/// Something that can be read and written: a variable or a property
enum Reference {
    Binding(Arc<str>),
    Property(Value, String),
}

/// The function half of a call expression
enum CallTarget {
    Method { receiver: Value, key: String },
    Plain(Value),
}

/// Source-like rendering of a callee for "is not a function" messages.
fn describe_callee(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.to_string(),
        ExprKind::Member {
            object, property, ..
        } => format!("{}.{property}", describe_callee(object)),
        ExprKind::Index { object, .. } => format!("{}[...]", describe_callee(object)),
        ExprKind::Call { callee, .. } => format!("{}(...)", describe_callee(callee)),
        _ => "expression".to_string(),
    }
}

fn not_a_function(callee: &Expr) -> ScriptError {
    ScriptError::type_error(format!("{} is not a function", describe_callee(callee)))
}

impl Interpreter {
    pub(super) fn eval_expr<'a>(
        &'a self,
        expr: &'a Expr,
        env: &'a Env,
    ) -> BoxFuture<'a, ScriptResult<Value>> {
        async move {
            self.eval_expr_kind(expr, env)
                .await
                .map_err(|e| e.at(expr.span))
        }
        .boxed()
    }

    /// Evaluate an initializer, naming anonymous functions after their
    /// binding.
    pub(super) async fn eval_named(
        &self,
        expr: &Expr,
        target: &Pattern,
        env: &Env,
    ) -> ScriptResult<Value> {
        match (&expr.kind, target) {
            (ExprKind::Function(def), Pattern::Ident(name)) if def.name.is_none() => {
                Ok(self.make_closure(def, env, Some(Arc::clone(name))))
            }
            _ => self.eval_expr(expr, env).await,
        }
    }

    fn make_closure(
        &self,
        def: &Arc<crate::core::ast::FunctionDef>,
        env: &Env,
        name: Option<Arc<str>>,
    ) -> Value {
        let closure = Closure::new(Arc::clone(def), self.capture(&env.scope), name);
        Value::Function(Arc::new(Callable::Closure(closure)))
    }

    async fn eval_expr_kind(&self, expr: &Expr, env: &Env) -> ScriptResult<Value> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::String(Arc::clone(s))),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Undefined => Ok(Value::Undefined),
            ExprKind::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Expr(inner) => {
                            let text = self.eval_expr(inner, env).await?.to_display_string();
                            check_string_length(out.len() + text.len())?;
                            out.push_str(&text);
                        }
                    }
                }
                Ok(Value::from(out))
            }
            ExprKind::Ident(name) => self.lookup(name, env),
            ExprKind::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    match element {
                        ArrayElement::Item(item) => items.push(self.eval_expr(item, env).await?),
                        ArrayElement::Spread(inner) => {
                            let value = self.eval_expr(inner, env).await?;
                            items.extend(iterate(&value)?);
                        }
                        ArrayElement::Hole => items.push(Value::Undefined),
                    }
                }
                Ok(Value::array(items))
            }
            ExprKind::Object(properties) => self.eval_object(properties, env).await,
            ExprKind::Function(def) => Ok(self.make_closure(def, env, None)),
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand, env).await,
            ExprKind::Update {
                increment,
                prefix,
                target,
            } => {
                let reference = self.resolve_reference(target, env).await?;
                let old = self.read_reference(&reference, env)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.write_reference(reference, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval_expr(left, env).await?;
                let right = self.eval_expr(right, env).await?;
                ops::binary(*op, &left, &right)
            }
            ExprKind::Logical { op, left, right } => {
                let left = self.eval_expr(left, env).await?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval_expr(right, env).await
                }
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval_expr(test, env).await?.is_truthy() {
                    self.eval_expr(consequent, env).await
                } else {
                    self.eval_expr(alternate, env).await
                }
            }
            ExprKind::Assign { op, target, value } => self.eval_assign(*op, target, value, env).await,
            ExprKind::Member { .. } | ExprKind::Index { .. } | ExprKind::Call { .. } => {
                Ok(self.eval_chain(expr, env).await?.unwrap_or_default())
            }
            ExprKind::New { callee, args } => {
                let constructor = self.eval_expr(callee, env).await?;
                let args = self.eval_args(args, env).await?;
                match constructor {
                    Value::Function(callable) => {
                        self.construct(callable, args, expr.span, env.depth).await
                    }
                    _ => Err(ScriptError::type_error(format!(
                        "{} is not a constructor",
                        describe_callee(callee)
                    ))),
                }
            }
            ExprKind::Await(operand) => self.eval_expr(operand, env).await?.settle().await,
            ExprKind::Sequence(items) => {
                let mut last = Value::Undefined;
                for item in items {
                    last = self.eval_expr(item, env).await?;
                }
                Ok(last)
            }
        }
    }

    fn lookup(&self, name: &str, env: &Env) -> ScriptResult<Value> {
        match env.scope.lookup(name) {
            Some(value) => Ok(value),
            None if name == "this" => Ok(Value::Undefined),
            None => Err(ScriptError::reference(name)),
        }
    }

    async fn eval_object(
        &self,
        properties: &[ObjectProperty],
        env: &Env,
    ) -> ScriptResult<Value> {
        let mut entries = IndexMap::with_capacity(properties.len());
        for property in properties {
            match property {
                ObjectProperty::KeyValue(key, value) => {
                    let (key, value) = match key {
                        PropertyKey::Named(name) => {
                            let target = Pattern::Ident(Arc::clone(name));
                            (name.to_string(), self.eval_named(value, &target, env).await?)
                        }
                        PropertyKey::Computed(key) => {
                            let key = self.eval_expr(key, env).await?.to_property_key();
                            (key, self.eval_expr(value, env).await?)
                        }
                    };
                    entries.insert(key, value);
                }
                ObjectProperty::Shorthand(name) => {
                    entries.insert(name.to_string(), self.lookup(name, env)?);
                }
                ObjectProperty::Spread(inner) => match self.eval_expr(inner, env).await? {
                    Value::Object(object) => {
                        let copied = object.lock().clone();
                        entries.extend(copied);
                    }
                    source @ (Value::Array(_) | Value::String(_)) => {
                        for (index, item) in iterate(&source)?.into_iter().enumerate() {
                            entries.insert(index.to_string(), item);
                        }
                    }
                    _ => {}
                },
            }
        }
        Ok(Value::object(entries))
    }

    async fn eval_unary(&self, op: UnaryOp, operand: &Expr, env: &Env) -> ScriptResult<Value> {
        match op {
            UnaryOp::Typeof => {
                if let ExprKind::Ident(name) = &operand.kind
                    && env.scope.lookup(name).is_none()
                {
                    return Ok(Value::from("undefined"));
                }
                let value = self.eval_expr(operand, env).await?;
                Ok(Value::from(value.type_of()))
            }
            UnaryOp::Delete => {
                if !matches!(operand.kind, ExprKind::Member { .. } | ExprKind::Index { .. }) {
                    return Ok(Value::Bool(true));
                }
                if let Reference::Property(target, key) =
                    self.resolve_reference(operand, env).await?
                {
                    match &target {
                        Value::Object(object) => {
                            object.lock().shift_remove(&key);
                        }
                        Value::Array(_) => set_property(&target, key, Value::Undefined)?,
                        Value::Undefined | Value::Null => {
                            return Err(ScriptError::type_error(format!(
                                "Cannot convert {target} to object"
                            )));
                        }
                        _ => {}
                    }
                }
                Ok(Value::Bool(true))
            }
            UnaryOp::Not => Ok(Value::Bool(!self.eval_expr(operand, env).await?.is_truthy())),
            UnaryOp::Negate => Ok(Value::Number(-self.eval_expr(operand, env).await?.to_number())),
            UnaryOp::Plus => Ok(Value::Number(self.eval_expr(operand, env).await?.to_number())),
        }
    }

    async fn eval_assign(
        &self,
        op: AssignOp,
        target: &Pattern,
        value: &Expr,
        env: &Env,
    ) -> ScriptResult<Value> {
        match op {
            AssignOp::Assign => {
                let value = self.eval_named(value, target, env).await?;
                self.bind_pattern(target, value.clone(), None, env).await?;
                Ok(value)
            }
            AssignOp::Binary(binary) => {
                let reference = self.pattern_reference(target, env).await?;
                let current = self.read_reference(&reference, env)?;
                let rhs = self.eval_expr(value, env).await?;
                let result = ops::binary(binary, &current, &rhs)?;
                self.write_reference(reference, result.clone(), env)?;
                Ok(result)
            }
            AssignOp::Logical(logical) => {
                let reference = self.pattern_reference(target, env).await?;
                let current = self.read_reference(&reference, env)?;
                let assign = match logical {
                    LogicalOp::And => current.is_truthy(),
                    LogicalOp::Or => !current.is_truthy(),
                    LogicalOp::Nullish => current.is_nullish(),
                };
                if !assign {
                    return Ok(current);
                }
                let value = self.eval_named(value, target, env).await?;
                self.write_reference(reference, value.clone(), env)?;
                Ok(value)
            }
        }
    }

    /// Assign to `obj.key` or `obj[key]`.
    pub(super) async fn assign_member(
        &self,
        target: &Expr,
        value: Value,
        env: &Env,
    ) -> ScriptResult<()> {
        let reference = self.resolve_reference(target, env).await?;
        self.write_reference(reference, value, env)
    }

    async fn pattern_reference(&self, target: &Pattern, env: &Env) -> ScriptResult<Reference> {
        match target {
            Pattern::Ident(name) => Ok(Reference::Binding(Arc::clone(name))),
            Pattern::Member(expr) => self.resolve_reference(expr, env).await,
            Pattern::Object { .. } | Pattern::Array { .. } => Err(ScriptError::syntax_at_runtime(
                "Invalid left-hand side in assignment",
            )),
        }
    }

    async fn resolve_reference(&self, target: &Expr, env: &Env) -> ScriptResult<Reference> {
        match &target.kind {
            ExprKind::Ident(name) => Ok(Reference::Binding(Arc::clone(name))),
            ExprKind::Member {
                object, property, ..
            } => {
                let object = self.eval_expr(object, env).await?;
                Ok(Reference::Property(object, property.to_string()))
            }
            ExprKind::Index { object, index, .. } => {
                let object = self.eval_expr(object, env).await?;
                let key = self.eval_expr(index, env).await?.to_property_key();
                Ok(Reference::Property(object, key))
            }
            _ => Err(ScriptError::syntax_at_runtime(
                "Invalid left-hand side in assignment",
            )),
        }
    }

    fn read_reference(&self, reference: &Reference, env: &Env) -> ScriptResult<Value> {
        match reference {
            Reference::Binding(name) => self.lookup(name, env),
            Reference::Property(object, key) => get_property(object, key),
        }
    }

    fn write_reference(&self, reference: Reference, value: Value, env: &Env) -> ScriptResult<()> {
        match reference {
            Reference::Binding(name) => env.scope.assign(&name, value),
            Reference::Property(object, key) => set_property(&object, key, value),
        }
    }

    async fn eval_args(&self, args: &[Argument], env: &Env) -> ScriptResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Argument::Positional(expr) => values.push(self.eval_expr(expr, env).await?),
                Argument::Spread(expr) => {
                    let value = self.eval_expr(expr, env).await?;
                    values.extend(iterate(&value)?);
                }
            }
        }
        Ok(values)
    }

    /// Member access and calls. `None` means an optional link short-circuited
    /// the rest of the chain.
    fn eval_chain<'a>(
        &'a self,
        expr: &'a Expr,
        env: &'a Env,
    ) -> BoxFuture<'a, ScriptResult<Option<Value>>> {
        async move {
            let result = match &expr.kind {
                ExprKind::Member {
                    object,
                    property,
                    optional,
                } => {
                    let Some(target) = self.eval_chain(object, env).await? else {
                        return Ok(None);
                    };
                    if *optional && target.is_nullish() {
                        return Ok(None);
                    }
                    get_property(&target, property).map(Some)
                }
                ExprKind::Index {
                    object,
                    index,
                    optional,
                } => {
                    let Some(target) = self.eval_chain(object, env).await? else {
                        return Ok(None);
                    };
                    if *optional && target.is_nullish() {
                        return Ok(None);
                    }
                    let key = self.eval_expr(index, env).await?.to_property_key();
                    get_property(&target, &key).map(Some)
                }
                ExprKind::Call {
                    callee,
                    args,
                    optional,
                } => self.eval_call(expr, callee, args, *optional, env).await,
                _ => self.eval_expr(expr, env).await.map(Some),
            };
            result.map_err(|e| e.at(expr.span))
        }
        .boxed()
    }

    async fn eval_call(
        &self,
        call: &Expr,
        callee: &Expr,
        args: &[Argument],
        optional: bool,
        env: &Env,
    ) -> ScriptResult<Option<Value>> {
        let target = match &callee.kind {
            ExprKind::Member {
                object,
                property,
                optional: link_optional,
            } => {
                let Some(receiver) = self.eval_chain(object, env).await? else {
                    return Ok(None);
                };
                if *link_optional && receiver.is_nullish() {
                    return Ok(None);
                }
                CallTarget::Method {
                    receiver,
                    key: property.to_string(),
                }
            }
            ExprKind::Index {
                object,
                index,
                optional: link_optional,
            } => {
                let Some(receiver) = self.eval_chain(object, env).await? else {
                    return Ok(None);
                };
                if *link_optional && receiver.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval_expr(index, env).await?.to_property_key();
                CallTarget::Method { receiver, key }
            }
            _ => match self.eval_chain(callee, env).await? {
                Some(value) => CallTarget::Plain(value),
                None => return Ok(None),
            },
        };

        match target {
            CallTarget::Plain(value) => match value {
                Value::Function(callable) => {
                    let args = self.eval_args(args, env).await?;
                    self.call_function(callable, Value::Undefined, args, call.span, env.depth)
                        .await
                        .map(Some)
                }
                value if optional && value.is_nullish() => Ok(None),
                _ => Err(not_a_function(callee)),
            },
            CallTarget::Method { receiver, key } => {
                if receiver.is_nullish() {
                    return Err(ScriptError::type_error(format!(
                        "Cannot read properties of {receiver} (reading '{key}')"
                    )));
                }
                let own = match &receiver {
                    Value::Object(_) | Value::Function(_) => get_property(&receiver, &key)?,
                    _ => Value::Undefined,
                };
                match own {
                    Value::Function(callable) => {
                        let args = self.eval_args(args, env).await?;
                        return self
                            .call_function(callable, receiver, args, call.span, env.depth)
                            .await
                            .map(Some);
                    }
                    Value::Undefined => {}
                    Value::Null if optional => return Ok(None),
                    _ => return Err(not_a_function(callee)),
                }
                let args = self.eval_args(args, env).await?;
                if let Some(result) = self
                    .call_method(&receiver, &key, args, call.span, env.depth)
                    .await?
                {
                    return Ok(Some(result));
                }
                if optional {
                    return Ok(None);
                }
                Err(not_a_function(callee))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn callee_of(source: &str) -> Expr {
        let program = parse(source).unwrap();
        let Some(crate::core::ast::StmtKind::Expr(expr)) =
            program.body.into_iter().next().map(|s| s.kind)
        else {
            panic!("expected expression statement");
        };
        match expr.kind {
            ExprKind::Call { callee, .. } => *callee,
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn callee_descriptions() {
        assert_eq!(describe_callee(&callee_of("a.b.c()")), "a.b.c");
        assert_eq!(describe_callee(&callee_of("items[0]()")), "items[...]");
        assert_eq!(describe_callee(&callee_of("f()()")), "f(...)");
    }
}
