//! Statement execution

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::call::Closure;
use super::ops::{enumerable_keys, iterate};
use super::{BindingKind, Completion, Env, Interpreter, Scope};
use crate::core::ast::{DeclKind, Expr, Pattern, Stmt, StmtKind};
use crate::error::{ErrorKind, ScriptError, ScriptResult};
use crate::value::{Callable, Value};

pub(super) fn binding_kind(kind: DeclKind) -> BindingKind {
    match kind {
        DeclKind::Const => BindingKind::Const,
        DeclKind::Let => BindingKind::Let,
        DeclKind::Var => BindingKind::Var,
    }
}

impl Interpreter {
    /// Declare every `function` statement of a block before running it.
    pub(super) fn hoist_functions(&self, body: &[Stmt], env: &Env) -> ScriptResult<()> {
        for stmt in body {
            if let StmtKind::Function(def) = &stmt.kind
                && let Some(name) = &def.name
            {
                let closure = Closure::new(Arc::clone(def), self.capture(&env.scope), None);
                env.scope
                    .declare(
                        name,
                        Value::Function(Arc::new(Callable::Closure(closure))),
                        BindingKind::Function,
                    )
                    .map_err(|e| e.at(stmt.span))?;
            }
        }
        Ok(())
    }

    /// Run a statement list in `env` (no new scope).
    pub(super) fn exec_statements<'a>(
        &'a self,
        body: &'a [Stmt],
        env: &'a Env,
    ) -> BoxFuture<'a, ScriptResult<Completion>> {
        async move {
            self.hoist_functions(body, env)?;
            for stmt in body {
                match self.exec_stmt(stmt, env).await? {
                    Completion::Normal => {}
                    abrupt => return Ok(abrupt),
                }
            }
            Ok(Completion::Normal)
        }
        .boxed()
    }

    pub(super) fn exec_stmt<'a>(
        &'a self,
        stmt: &'a Stmt,
        env: &'a Env,
    ) -> BoxFuture<'a, ScriptResult<Completion>> {
        async move {
            self.exec_stmt_kind(stmt, env)
                .await
                .map_err(|e| e.at(stmt.span))
        }
        .boxed()
    }

    async fn exec_stmt_kind(&self, stmt: &Stmt, env: &Env) -> ScriptResult<Completion> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval_expr(expr, env).await?;
            }
            StmtKind::Declare { kind, declarators } => {
                let kind = binding_kind(*kind);
                for declarator in declarators {
                    let value = match &declarator.init {
                        Some(init) => self.eval_named(init, &declarator.target, env).await?,
                        None => Value::Undefined,
                    };
                    self.bind_pattern(&declarator.target, value, Some(kind), env)
                        .await?;
                }
            }
            StmtKind::Function(_) | StmtKind::Empty => {}
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env).await?,
                    None => Value::Undefined,
                };
                return Ok(Completion::Return(value));
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval_expr(test, env).await?.is_truthy() {
                    return self.exec_stmt(consequent, env).await;
                }
                if let Some(alternate) = alternate {
                    return self.exec_stmt(alternate, env).await;
                }
            }
            StmtKind::Block(body) => {
                return self.exec_statements(body, &env.block()).await;
            }
            StmtKind::While { test, body } => loop {
                if !self.eval_expr(test, env).await?.is_truthy() {
                    break;
                }
                self.tick_loop().await?;
                match self.exec_stmt(body, env).await? {
                    Completion::Break => break,
                    Completion::Return(value) => return Ok(Completion::Return(value)),
                    Completion::Normal | Completion::Continue => {}
                }
            },
            StmtKind::DoWhile { body, test } => loop {
                self.tick_loop().await?;
                match self.exec_stmt(body, env).await? {
                    Completion::Break => break,
                    Completion::Return(value) => return Ok(Completion::Return(value)),
                    Completion::Normal | Completion::Continue => {}
                }
                if !self.eval_expr(test, env).await?.is_truthy() {
                    break;
                }
            },
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => return self.exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body, env).await,
            StmtKind::ForOf {
                kind,
                target,
                iterable,
                body,
            } => {
                let iterable = self.eval_expr(iterable, env).await?;
                let items = iterate(&iterable)?;
                return self.exec_for_each(*kind, target, items, body, env).await;
            }
            StmtKind::ForIn {
                kind,
                target,
                object,
                body,
            } => {
                let object = self.eval_expr(object, env).await?;
                let keys = enumerable_keys(&object)
                    .into_iter()
                    .map(Value::from)
                    .collect();
                return self.exec_for_each(*kind, target, keys, body, env).await;
            }
            StmtKind::Break => return Ok(Completion::Break),
            StmtKind::Continue => return Ok(Completion::Continue),
            StmtKind::Throw(value) => {
                let value = self.eval_expr(value, env).await?;
                return Err(ScriptError::thrown(value).at(stmt.span));
            }
            StmtKind::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                return self
                    .exec_try(block, param.as_ref(), handler.as_deref(), finalizer.as_deref(), env)
                    .await;
            }
        }
        Ok(Completion::Normal)
    }

    async fn exec_for(
        &self,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        env: &Env,
    ) -> ScriptResult<Completion> {
        let mut iteration = env.block();
        let mut per_iteration = Vec::new();
        if let Some(init) = init {
            self.exec_stmt(init, &iteration).await?;
            if matches!(
                init.kind,
                StmtKind::Declare {
                    kind: DeclKind::Let,
                    ..
                }
            ) {
                per_iteration = iteration.scope.local_names();
            }
        }

        loop {
            if let Some(test) = test
                && !self.eval_expr(test, &iteration).await?.is_truthy()
            {
                break;
            }
            self.tick_loop().await?;
            match self.exec_stmt(body, &iteration).await? {
                Completion::Break => break,
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal | Completion::Continue => {}
            }

            // Fresh `let` bindings per iteration, so closures keep the value
            // they saw.
            if !per_iteration.is_empty() {
                let next = Scope::child(&env.scope);
                for name in &per_iteration {
                    let value = iteration.scope.lookup(name).unwrap_or_default();
                    next.declare(name, value, BindingKind::Let)?;
                }
                iteration = Env {
                    scope: next,
                    depth: env.depth,
                };
            }
            if let Some(update) = update {
                self.eval_expr(update, &iteration).await?;
            }
        }
        Ok(Completion::Normal)
    }

    async fn exec_for_each(
        &self,
        kind: Option<DeclKind>,
        target: &Pattern,
        items: Vec<Value>,
        body: &Stmt,
        env: &Env,
    ) -> ScriptResult<Completion> {
        for item in items {
            self.tick_loop().await?;
            let iteration = env.block();
            self.bind_pattern(target, item, kind.map(binding_kind), &iteration)
                .await?;
            match self.exec_stmt(body, &iteration).await? {
                Completion::Break => break,
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal | Completion::Continue => {}
            }
        }
        Ok(Completion::Normal)
    }

    async fn exec_try(
        &self,
        block: &[Stmt],
        param: Option<&Pattern>,
        handler: Option<&[Stmt]>,
        finalizer: Option<&[Stmt]>,
        env: &Env,
    ) -> ScriptResult<Completion> {
        let mut result = self.exec_statements(block, &env.block()).await;

        // Exhausted budgets are not catchable.
        if let (Err(err), Some(handler)) = (&result, handler)
            && err.kind() != ErrorKind::Limit
        {
            let caught = err.to_value();
            let handler_env = env.block();
            let bound = match param {
                Some(param) => {
                    self.bind_pattern(param, caught, Some(BindingKind::Let), &handler_env)
                        .await
                }
                None => Ok(()),
            };
            result = match bound {
                Ok(()) => self.exec_statements(handler, &handler_env).await,
                Err(err) => Err(err),
            };
        }

        if let Some(finalizer) = finalizer {
            match self.exec_statements(finalizer, &env.block()).await? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        result
    }
}
