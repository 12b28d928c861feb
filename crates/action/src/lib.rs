//! # Sluice Actions
//!
//! Declarative HTTP actions: an [`ActionDefinition`] describes one operation
//! of a third-party API (method, path template, parameters, body schema and
//! auth). This crate turns a call of such an action into a real request and
//! its response into compact JSON.
//!
//! ## Pipeline
//!
//! - [`build_request`]: parameters are routed to path, query, headers or
//!   cookies and the credential is placed via [`AuthPlacement`]
//! - [`Dispatcher`]: sends the request with one manual redirect hop and
//!   exponential retry of transport failures
//! - [`ResponseProcessor`]: decodes by content type, de-duplicates arrays of
//!   objects and applies `keys_to_keep`
//!
//! [`ActionRunner`] wires the three together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use secrecy::SecretString;
//! use sluice_action::*;
//! use sluice_resilience::RetryStrategy;
//!
//! # async fn run(action: ActionDefinition, org: Org) -> Result<(), Box<dyn std::error::Error>> {
//! let runner = ActionRunner::new(
//!     Dispatcher::new(RetryStrategy::exponential(3)?)?,
//!     ResponseProcessor::new(),
//!     BuildOptions::default(),
//! );
//! let key = SecretString::from("sk-live".to_string());
//! let params = serde_json::json!({"id": 42});
//! let params = params.as_object().cloned().unwrap_or_default();
//! let user = runner
//!     .call(&action, &params, CallContext { org: &org, credential: Some(&key) })
//!     .await?;
//! println!("{user}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

/// Credential placement and redaction.
pub mod auth;
/// Sending requests: manual redirects and retry.
pub mod dispatch;
pub mod error;
/// Text extraction collaborators for PDF and HTML bodies.
pub mod extract;
/// Reduction of HTML error pages to their headings.
pub mod html;
/// Action, API and parameter definitions.
pub mod model;
/// Content-type decoding, de-duplication and key filtering.
pub mod process;
/// Request construction.
pub mod request;
mod runner;

// ── Public re-exports ───────────────────────────────────────────────────────

pub use auth::{AuthPlacement, REDACTED};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use error::{ActionError, ActionResult};
pub use extract::{HttpTextExtractor, TextExtractor};
pub use model::{
    ActionDefinition, Api, BodySchema, Header, Org, Parameter, ParameterLocation,
    QUERY_PARAMETER_AUTH,
};
pub use process::{ResponseProcessor, dedupe, filter_keys};
pub use request::{BuildOptions, CallContext, PreparedRequest, RequestLog, build_request};
pub use runner::ActionRunner;
