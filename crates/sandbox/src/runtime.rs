//! Sandbox runtime: compile, bind, run under a deadline, collect the trace

use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::SecretString;
use serde::Serialize;
use sluice_action::{ActionDefinition, ActionRunner, Org};
use sluice_script::{Interpreter, Limits, parse};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::bindings::{self, ActionBinding};
use crate::error::SandboxError;
use crate::trace::{BuiltinFunctionCall, Trace};
use crate::wrapper::WrappedSource;

/// Wall-clock budget of one execution unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Lifecycle of one execution.
///
/// `Idle → Compiling → Running → {Completed | TimedOut | Errored}`; a snippet
/// that does not parse goes from `Compiling` straight to `Errored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Idle,
    Compiling,
    Running,
    Completed,
    TimedOut,
    Errored,
}

impl ExecutionState {
    pub fn can_advance_to(self, next: Self) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (Idle, Compiling)
                | (Compiling, Running | Errored)
                | (Running, Completed | TimedOut | Errored)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Errored)
    }

    fn advance(self, next: Self) -> Self {
        debug_assert!(self.can_advance_to(next), "{self:?} -> {next:?}");
        debug!(from = ?self, to = ?next, "execution state");
        next
    }
}

/// Budgets applied to every execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxConfig {
    pub timeout: Duration,
    pub limits: Limits,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            limits: Limits::default(),
        }
    }
}

/// One snippet and everything it may touch.
#[derive(Debug)]
pub struct Execution {
    pub code: String,
    pub actions: Vec<ActionDefinition>,
    pub org: Org,
    /// End-user credential for the bound APIs; never persisted
    pub user_api_key: Option<SecretString>,
}

/// The outcome of an execution. `events` always holds everything recorded
/// before the end; a failed run ends with an `error` event.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub state: ExecutionState,
    pub events: Vec<BuiltinFunctionCall>,
    pub error: Option<SandboxError>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.state == ExecutionState::Completed
    }
}

/// Runs snippets against their bound actions.
#[derive(Debug, Clone)]
pub struct Sandbox {
    runner: Arc<ActionRunner>,
    config: SandboxConfig,
}

impl Sandbox {
    pub fn new(runner: ActionRunner, config: SandboxConfig) -> Self {
        Self {
            runner: Arc::new(runner),
            config,
        }
    }

    pub fn config(&self) -> SandboxConfig {
        self.config
    }

    /// Run `execution` to completion, failure or timeout.
    ///
    /// On timeout the snippet stops being driven, but action calls it
    /// already started keep running in the background until they finish.
    pub async fn run(&self, execution: Execution) -> ExecutionReport {
        let span = info_span!(
            "execution",
            org_id = %execution.org.id,
            actions = execution.actions.len()
        );
        self.run_in_span(execution).instrument(span).await
    }

    async fn run_in_span(&self, execution: Execution) -> ExecutionReport {
        let started = Instant::now();
        let trace = Trace::new();
        let state = ExecutionState::Idle.advance(ExecutionState::Compiling);

        let names: Vec<String> = execution
            .actions
            .iter()
            .map(ActionDefinition::call_name)
            .chain(["console".to_string(), "plot".to_string()])
            .collect();
        let wrapped = WrappedSource::new(&execution.code, &names);
        let program = match parse(wrapped.source()) {
            Ok(program) => program,
            Err(err) => {
                let error = SandboxError::Compile(wrapped.translate(&err));
                return finish(state, &trace, Some(error), started);
            }
        };

        let interpreter = Interpreter::with_limits(self.config.limits);
        let org = Arc::new(execution.org);
        let credential = execution.user_api_key.map(Arc::new);
        for action in execution.actions {
            let (name, function) = ActionBinding {
                action,
                runner: Arc::clone(&self.runner),
                org: Arc::clone(&org),
                credential: credential.clone(),
                trace: trace.clone(),
            }
            .into_function();
            interpreter.define_global(&name, function);
        }
        interpreter.define_global("console", bindings::console(&trace));
        interpreter.define_global("plot", bindings::plot(&trace));

        let state = state.advance(ExecutionState::Running);
        let error = match tokio::time::timeout(self.config.timeout, interpreter.run(&program)).await
        {
            Ok(Ok(_)) => None,
            Ok(Err(err)) => Some(SandboxError::Runtime(wrapped.translate(&err))),
            Err(_) => Some(SandboxError::Timeout(self.config.timeout)),
        };
        finish(state, &trace, error, started)
    }
}

fn finish(
    state: ExecutionState,
    trace: &Trace,
    error: Option<SandboxError>,
    started: Instant,
) -> ExecutionReport {
    let state = state.advance(match &error {
        None => ExecutionState::Completed,
        Some(SandboxError::Timeout(_)) => ExecutionState::TimedOut,
        Some(_) => ExecutionState::Errored,
    });
    if let Some(error) = &error {
        warn!(code = error.code(), %error, "execution failed");
        trace.push(BuiltinFunctionCall::error(error.to_string()));
    }
    let events = trace.snapshot();
    info!(
        state = ?state,
        events = events.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "execution finished"
    );
    ExecutionReport {
        state,
        events,
        error,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::ExecutionState::*;
    use super::*;

    #[rstest]
    #[case(Idle, Compiling, true)]
    #[case(Compiling, Running, true)]
    #[case(Compiling, Errored, true)]
    #[case(Running, Completed, true)]
    #[case(Running, TimedOut, true)]
    #[case(Running, Errored, true)]
    #[case(Idle, Running, false)]
    #[case(Compiling, TimedOut, false)]
    #[case(Completed, Running, false)]
    #[case(Errored, Completed, false)]
    fn transitions(#[case] from: ExecutionState, #[case] to: ExecutionState, #[case] ok: bool) {
        assert_eq!(from.can_advance_to(to), ok);
    }

    #[test]
    fn terminal_states() {
        assert!(Completed.is_terminal());
        assert!(TimedOut.is_terminal());
        assert!(Errored.is_terminal());
        assert!(!Running.is_terminal());
    }
}
