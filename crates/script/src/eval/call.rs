//! Function objects and calls

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::ops::iterate;
use super::{BindingKind, Completion, Env, Interpreter, Scope};
use crate::core::ast::{FunctionBody, FunctionDef, Param};
use crate::core::span::Span;
use crate::error::{ScriptError, ScriptResult};
use crate::value::{Callable, Intrinsic, Promise, Value};

const ANONYMOUS: &str = "<anonymous>";

/// A script function together with the scope it was created in
pub struct Closure {
    def: Arc<FunctionDef>,
    scope: Arc<Scope>,
    /// Name inferred from the binding, e.g. `const f = () => {}`
    inferred_name: Option<Arc<str>>,
}

impl Closure {
    pub(crate) fn new(
        def: Arc<FunctionDef>,
        scope: Arc<Scope>,
        inferred_name: Option<Arc<str>>,
    ) -> Self {
        Self {
            def,
            scope,
            inferred_name,
        }
    }

    pub fn name(&self) -> Arc<str> {
        self.def
            .name
            .clone()
            .or_else(|| self.inferred_name.clone())
            .unwrap_or_else(|| Arc::from(ANONYMOUS))
    }

    pub fn is_async(&self) -> bool {
        self.def.is_async
    }

    fn is_constructible(&self) -> bool {
        !self.def.is_arrow && !self.def.is_async
    }
}

impl Interpreter {
    /// Call `callee` with `this` bound (ignored by arrows and builtins).
    pub(crate) fn call_function<'a>(
        &'a self,
        callee: Arc<Callable>,
        this: Value,
        args: Vec<Value>,
        site: Span,
        depth: usize,
    ) -> BoxFuture<'a, ScriptResult<Value>> {
        async move {
            match &*callee {
                Callable::Native { func, .. } => func(&args),
                Callable::Host { func, .. } => Ok(Value::Promise(Promise::spawn(func(args)))),
                Callable::Intrinsic(intrinsic) => {
                    self.call_intrinsic(*intrinsic, args, site, depth).await
                }
                Callable::Closure(closure) => {
                    self.call_closure(closure, this, args, site, depth).await
                }
            }
        }
        .boxed()
    }

    /// `new callee(...args)`
    pub(super) async fn construct(
        &self,
        callee: Arc<Callable>,
        args: Vec<Value>,
        site: Span,
        depth: usize,
    ) -> ScriptResult<Value> {
        match &*callee {
            Callable::Native {
                func,
                constructor: true,
                ..
            } => func(&args),
            Callable::Closure(closure) if closure.is_constructible() => {
                let this = Value::empty_object();
                let result = self
                    .call_closure(closure, this.clone(), args, site, depth)
                    .await?;
                Ok(match result {
                    Value::Object(_) | Value::Array(_) => result,
                    _ => this,
                })
            }
            other => Err(ScriptError::type_error(format!(
                "{} is not a constructor",
                other.name()
            ))),
        }
    }

    async fn call_closure(
        &self,
        closure: &Closure,
        this: Value,
        args: Vec<Value>,
        site: Span,
        depth: usize,
    ) -> ScriptResult<Value> {
        let result = if depth >= self.limits.max_call_depth {
            Err(ScriptError::limit("Maximum call stack size exceeded"))
        } else {
            self.step().await;
            self.run_body(closure, this, args, depth + 1).await
        };
        let result = result.map_err(|e| e.unwind(closure.name(), closure.def.span, site));

        if closure.is_async() {
            // Async functions run to completion inline; their result is
            // handed back already settled.
            return Ok(Value::Promise(match result {
                Ok(value) => Promise::resolved(value),
                Err(err) => Promise::rejected(err),
            }));
        }
        result
    }

    async fn run_body(
        &self,
        closure: &Closure,
        this: Value,
        args: Vec<Value>,
        depth: usize,
    ) -> ScriptResult<Value> {
        let env = Env {
            scope: Scope::child(&closure.scope),
            depth,
        };
        if !closure.def.is_arrow {
            env.scope
                .declare(&Arc::from("this"), this, BindingKind::Const)?;
        }
        self.bind_params(&closure.def.params, args, &env).await?;

        match &closure.def.body {
            FunctionBody::Expr(expr) => self.eval_expr(expr, &env).await,
            FunctionBody::Block(body) => match self.exec_statements(body, &env).await? {
                Completion::Return(value) => Ok(value),
                Completion::Normal | Completion::Break | Completion::Continue => {
                    Ok(Value::Undefined)
                }
            },
        }
    }

    async fn bind_params(&self, params: &[Param], args: Vec<Value>, env: &Env) -> ScriptResult<()> {
        let mut args = args.into_iter();
        for param in params {
            if param.rest {
                let rest = Value::array(args.by_ref().collect());
                self.bind_pattern(&param.target, rest, Some(BindingKind::Var), env)
                    .await?;
                break;
            }
            let mut value = args.next().unwrap_or_default();
            if let (Value::Undefined, Some(default)) = (&value, &param.default) {
                value = self.eval_named(default, &param.target, env).await?;
            }
            self.bind_pattern(&param.target, value, Some(BindingKind::Var), env)
                .await?;
        }
        Ok(())
    }

    async fn call_intrinsic(
        &self,
        intrinsic: Intrinsic,
        args: Vec<Value>,
        site: Span,
        depth: usize,
    ) -> ScriptResult<Value> {
        match intrinsic {
            Intrinsic::ArrayFrom => {
                let source = args.first().cloned().unwrap_or_default();
                let items = match &source {
                    Value::Object(object) => {
                        let length = object.lock().get("length").map_or(0.0, Value::to_number);
                        let length = if length.is_finite() && length > 0.0 {
                            length as usize
                        } else {
                            0
                        };
                        if length as u64 > self.limits.max_loop_iterations {
                            return Err(ScriptError::range("Invalid array length"));
                        }
                        vec![Value::Undefined; length]
                    }
                    other => iterate(other)?,
                };
                let Some(Value::Function(map)) = args.get(1) else {
                    return Ok(Value::array(items));
                };
                let mut mapped = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let value = self
                        .call_function(
                            Arc::clone(map),
                            Value::Undefined,
                            vec![item, Value::from(index)],
                            site,
                            depth,
                        )
                        .await?;
                    mapped.push(value);
                }
                Ok(Value::array(mapped))
            }
        }
    }
}
