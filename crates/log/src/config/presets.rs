//! Configuration presets

use super::{Config, Fields, Format};

impl Config {
    /// Read `SLUICE_LOG` (or `RUST_LOG`) and `SLUICE_LOG_FORMAT`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("SLUICE_LOG") {
            config.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            config.level = level;
        }

        if let Ok(format) = std::env::var("SLUICE_LOG_FORMAT") {
            config.format = Format::parse_lossy(&format);
        }

        config
    }

    /// Pretty output at debug level
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: Format::Pretty,
            ..Self::default()
        }
    }

    /// JSON output at info level, no colors
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Json,
            ansi: false,
            ..Self::default()
        }
    }

    /// Attach a service name to the root span.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.fields = Fields {
            service: Some(service.into()),
            ..self.fields
        };
        self
    }
}
