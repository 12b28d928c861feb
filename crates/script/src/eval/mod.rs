//! Async tree-walking evaluation
//!
//! Every evaluation step returns a boxed future so that recursion through
//! expressions, statements and calls stays `Send`. Host functions are
//! spawned onto the runtime when called; everything else runs inline.

mod call;
mod expr;
mod methods;
mod ops;
mod pattern;
mod scope;
mod stmt;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

pub use call::Closure;
pub(crate) use methods::{get_property, set_property};
pub(crate) use ops::enumerable_keys;
pub use scope::{BindingKind, Scope};

use crate::builtins;
use crate::core::ast::{Program, StmtKind};
use crate::error::{ScriptError, ScriptResult};
use crate::parser::parse;
use crate::value::Value;

/// Name of the outermost stack frame.
pub const TOP_LEVEL_FRAME: &str = "<top-level>";

/// Execution budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Nested script function calls
    pub max_call_depth: usize,
    /// Loop iterations over the whole run
    pub max_loop_iterations: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_call_depth: 128,
            max_loop_iterations: 1_000_000,
        }
    }
}

/// Steps between cooperative yields, so a busy script cannot starve the
/// runtime or outlive its timeout.
const YIELD_EVERY: u64 = 1024;

/// Scope and call depth of the code being evaluated
#[derive(Clone)]
pub(crate) struct Env {
    pub scope: Arc<Scope>,
    pub depth: usize,
}

impl Env {
    fn block(&self) -> Self {
        Self {
            scope: Scope::child(&self.scope),
            depth: self.depth,
        }
    }
}

/// Outcome of a statement
pub(crate) enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// The script interpreter. One instance per execution; globals defined
/// on it are visible to everything it runs.
///
/// Dropping the interpreter clears the globals and every scope a closure
/// captured, so values held only by the script are released with it.
pub struct Interpreter {
    globals: Arc<Scope>,
    limits: Limits,
    loop_iterations: AtomicU64,
    steps: AtomicU64,
    captured: Mutex<Captured>,
}

/// Scopes closures were created in, pruned as they die.
#[derive(Default)]
struct Captured {
    scopes: Vec<Weak<Scope>>,
    prune_at: usize,
}

impl Captured {
    const MIN_PRUNE_AT: usize = 64;

    fn push(&mut self, scope: &Arc<Scope>) {
        if self.scopes.len() >= self.prune_at.max(Self::MIN_PRUNE_AT) {
            self.scopes.retain(|weak| weak.strong_count() > 0);
            self.prune_at = self.scopes.len() * 2;
        }
        self.scopes.push(Arc::downgrade(scope));
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        let globals = Scope::root();
        builtins::install(&globals);
        Self {
            globals,
            limits,
            loop_iterations: AtomicU64::new(0),
            steps: AtomicU64::new(0),
            captured: Mutex::new(Captured::default()),
        }
    }

    /// Bind (or rebind) a global name.
    pub fn define_global(&self, name: &str, value: Value) {
        let name: Arc<str> = Arc::from(name);
        // Globals are `var`-like, so redefinition cannot fail.
        let _ = self.globals.declare(&name, value, BindingKind::Var);
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.lookup(name)
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Parse and run `source`.
    pub async fn eval_source(&self, source: &str) -> ScriptResult<Value> {
        let program = parse(source)?;
        self.run(&program).await
    }

    /// Run a parsed program. Yields the value of the last expression
    /// statement, like a REPL.
    pub async fn run(&self, program: &Program) -> ScriptResult<Value> {
        let env = Env {
            scope: Scope::child(&self.globals),
            depth: 0,
        };
        self.captured.lock().push(&env.scope);
        tracing::debug!(statements = program.body.len(), "running script");
        let result = self
            .run_top_level(program, &env)
            .await
            .map_err(|e| e.finish(TOP_LEVEL_FRAME));
        if let Err(err) = &result {
            tracing::debug!(
                code = err.kind().code(),
                loop_iterations = self.loop_iterations.load(Ordering::Relaxed),
                "script failed"
            );
        }
        result
    }

    async fn run_top_level(&self, program: &Program, env: &Env) -> ScriptResult<Value> {
        self.hoist_functions(&program.body, env)?;
        let mut last = Value::Undefined;
        for stmt in &program.body {
            if let StmtKind::Expr(expr) = &stmt.kind {
                last = self.eval_expr(expr, env).await?;
                continue;
            }
            match self.exec_stmt(stmt, env).await? {
                Completion::Normal => {}
                Completion::Return(value) => return Ok(value),
                Completion::Break | Completion::Continue => break,
            }
        }
        Ok(last)
    }

    /// Record `scope` as captured by a closure and hand back a handle to it.
    fn capture(&self, scope: &Arc<Scope>) -> Arc<Scope> {
        self.captured.lock().push(scope);
        Arc::clone(scope)
    }

    /// Count one loop iteration against the budget.
    async fn tick_loop(&self) -> ScriptResult<()> {
        let iterations = self.loop_iterations.fetch_add(1, Ordering::Relaxed) + 1;
        if iterations > self.limits.max_loop_iterations {
            return Err(ScriptError::limit(format!(
                "Loop iteration budget of {} exceeded",
                self.limits.max_loop_iterations
            )));
        }
        self.step().await;
        Ok(())
    }

    async fn step(&self) {
        let steps = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        if steps % YIELD_EVERY == 0 {
            tokio::task::yield_now().await;
        }
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        let captured = std::mem::take(&mut self.captured.get_mut().scopes);
        for scope in captured.iter().filter_map(Weak::upgrade) {
            scope.release_chain();
        }
        self.globals.release();
    }
}
