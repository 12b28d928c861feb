//! Logging setup shared by the sluice binaries.
//!
//! ```no_run
//! let _guard = sluice_log::init().expect("logger");
//! tracing::info!("ready");
//! ```

mod builder;
mod config;
mod core;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, Fields, Format};
pub use core::{LogError, LogResult};

/// Initialize logging from `SLUICE_LOG` / `SLUICE_LOG_FORMAT`.
pub fn init() -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(Config::from_env()).build()
}

/// Initialize logging from an explicit configuration.
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}
