//! # sluice-api
//!
//! The HTTP boundary: a single `POST /execute` endpoint that admits a
//! caller, runs their snippet in a [`Sandbox`](sluice_sandbox::Sandbox)
//! and answers with the recorded trace, plus `GET /health`.
//!
//! | Condition                        | Status | Body                          |
//! |----------------------------------|--------|-------------------------------|
//! | missing or wrong bearer secret   | 401    | `{"error":"Unauthorized"}`    |
//! | over the caller's rate limit     | 429    | `{"error":"Rate limit hit…"}` |
//! | body does not match the schema   | 400    | `{"error":"Invalid request body"}` |
//! | execution ran (even if it failed)| 200    | the event array               |

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ConfigError, RetryConfig, ServerConfig, TextExtractionConfig};
pub use error::{ApiError, ApiResult};
pub use routes::{ExecuteRequest, router};
pub use state::AppState;

/// Bind `config.bind` and serve until ctrl-c or SIGTERM.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let app = router(state, config.body_limit_bytes);

    let listener = TcpListener::bind(config.bind)
        .await
        .context("bind server listener failed")?;
    info!(addr = %config.bind, "sluice-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated with error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(%err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
