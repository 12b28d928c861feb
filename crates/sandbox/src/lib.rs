//! # sluice-sandbox
//!
//! Runs a generated snippet against a set of declared HTTP actions and
//! records what it did.
//!
//! The snippet is wrapped in an async entry function and evaluated by the
//! `sluice-script` interpreter. The only names it can reach besides the
//! language builtins are:
//!
//! - one async function per action, under the action's camelCase name
//! - `console.log/info/warn/error`
//! - `plot(title, type, data, labels?)`
//!
//! Each of these appends to the execution [`Trace`]. The trace survives
//! failures: a snippet that throws or times out still reports everything it
//! did, followed by an `error` event whose message points into the snippet
//! itself (`line N`), not the generated wrapper.
//!
//! ```rust,no_run
//! use sluice_action::{ActionRunner, BuildOptions, Dispatcher, Org, ResponseProcessor};
//! use sluice_resilience::RetryStrategy;
//! use sluice_sandbox::{Execution, Sandbox, SandboxConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = ActionRunner::new(
//!     Dispatcher::new(RetryStrategy::exponential(3)?)?,
//!     ResponseProcessor::new(),
//!     BuildOptions::default(),
//! );
//! let sandbox = Sandbox::new(runner, SandboxConfig::default());
//! let report = sandbox
//!     .run(Execution {
//!         code: "console.log('hello');".into(),
//!         actions: Vec::new(),
//!         org: Org::default(),
//!         user_api_key: None,
//!     })
//!     .await;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

mod bindings;
pub mod error;
pub mod runtime;
pub mod trace;
pub mod wrapper;

pub use error::{SandboxError, SandboxResult};
pub use runtime::{
    DEFAULT_TIMEOUT, Execution, ExecutionReport, ExecutionState, Sandbox, SandboxConfig,
};
pub use trace::{BuiltinFunctionCall, CallArgs, HumanFormatArgs, MessageArgs, PlotArgs, Trace};
pub use wrapper::{USER_CODE_MARKER, WrappedSource};
