//! # sluice-script
//!
//! A small, JavaScript-shaped language for generated automation snippets,
//! evaluated by an async tree-walking interpreter.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sluice_script::{Interpreter, Value};
//!
//! # async fn demo() -> sluice_script::ScriptResult<()> {
//! let interpreter = Interpreter::new();
//! interpreter.define_global(
//!     "getUser",
//!     Value::host("getUser", |args| async move { Ok(args.into_iter().next().unwrap_or_default()) }),
//! );
//! let value = interpreter
//!     .eval_source("const user = await getUser({ id: 7 }); user.id * 2")
//!     .await?;
//! assert_eq!(value.to_number(), 14.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Language
//!
//! - `const`/`let`/`var` with object and array destructuring
//! - `if`, `while`, `do`/`while`, C-style `for`, `for...of`, `for...in`
//! - `try`/`catch`/`finally`, `throw`, `new Error(message)`
//! - functions, arrows and `async` functions with default and rest parameters
//! - template literals, spread, optional chaining, `??`
//!
//! Host functions registered with [`Value::host`] start running on the
//! tokio runtime as soon as they are called and hand back a promise, so
//! several un-awaited calls proceed concurrently.
//!
//! ## Limits
//!
//! [`Limits`] caps call depth and loop iterations. Exceeding either raises
//! an [`ErrorKind::Limit`] error that `catch` cannot intercept.

pub mod builtins;
pub mod core;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use crate::core::ast::Program;
pub use crate::core::span::Span;
pub use error::{ErrorKind, Frame, ScriptError, ScriptResult};
pub use eval::{Interpreter, Limits, TOP_LEVEL_FRAME};
pub use parser::parse;
pub use value::{Callable, Promise, Value, number_to_string};
