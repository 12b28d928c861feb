//! Server configuration
//!
//! Layered with figment, later layers winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. `SLUICE_*` environment variables, `__` separating nested keys
//!    (`SLUICE_RATE_LIMIT__MAX_REQUESTS=60`)
//!
//! Command-line flags are applied on top by the binary.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format as _, Toml};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sluice_resilience::RateLimitPolicy;
use url::Url;

/// Environment prefix for every setting.
pub const ENV_PREFIX: &str = "SLUICE_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// Admission is impossible without a shared secret
    #[error("service_secret is not set")]
    MissingSecret,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Bearer token every caller must present
    pub service_secret: Option<SecretString>,
    pub execution_timeout_ms: u64,
    pub rate_limit: RateLimitPolicy,
    pub retry: RetryConfig,
    pub text_extraction: TextExtractionConfig,
    /// When set, every outbound call also carries the org id and name headers
    pub mock_api_host: Option<String>,
    pub redact_query_auth: bool,
    pub body_limit_bytes: usize,
    pub log: sluice_log::Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            service_secret: None,
            execution_timeout_ms: 60_000,
            rate_limit: RateLimitPolicy::execute(),
            retry: RetryConfig::default(),
            text_extraction: TextExtractionConfig::default(),
            mock_api_host: None,
            redact_query_auth: false,
            body_limit_bytes: 2 * 1024 * 1024,
            log: sluice_log::Config::from_env(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per outbound call, the first one included
    pub max_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Endpoints of the external document-to-text services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TextExtractionConfig {
    pub pdf_to_text_url: Option<Url>,
    pub html_to_text_url: Option<Url>,
}

impl ServerConfig {
    /// Defaults, then `path` if given, then the environment.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        // SLUICE_LOG and SLUICE_LOG_FORMAT belong to the logger's own env preset
        figment.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["log", "log_format"])
                .split("__"),
        )
    }

    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment(path))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.service_secret {
            Some(secret) if !secret.expose_secret().is_empty() => Ok(()),
            _ => Err(ConfigError::MissingSecret),
        }
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use figment::providers::Serialized;
    use pretty_assertions::assert_eq;
    use sluice_log::Format;

    use super::*;

    fn from_toml(toml: &str) -> Result<ServerConfig, ConfigError> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();
        ServerConfig::from_figment(&Figment::new().merge(Toml::file(file.path())))
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.execution_timeout(), Duration::from_secs(60));
        assert_eq!(config.rate_limit, RateLimitPolicy::new(30, Duration::from_secs(10)));
        assert_eq!(config.retry.max_attempts, 3);
        assert!(!config.redact_query_auth);
    }

    #[test]
    fn reads_nested_toml() {
        let config = from_toml(
            r#"
service_secret = "s3cret"
bind = "0.0.0.0:9000"
execution_timeout_ms = 5000

[rate_limit]
max_requests = 5
window_ms = 1000

[text_extraction]
pdf_to_text_url = "http://extract.local/pdf"

[log]
format = "json"
"#,
        )
        .unwrap();

        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.execution_timeout(), Duration::from_secs(5));
        assert_eq!(config.rate_limit, RateLimitPolicy::new(5, Duration::from_secs(1)));
        assert_eq!(
            config.text_extraction.pdf_to_text_url.map(String::from),
            Some("http://extract.local/pdf".to_string())
        );
        assert_eq!(config.text_extraction.html_to_text_url, None);
        assert_eq!(config.log.format, Format::Json);
    }

    #[test]
    fn missing_or_empty_secret_is_rejected() {
        assert!(matches!(from_toml(""), Err(ConfigError::MissingSecret)));
        assert!(matches!(
            from_toml(r#"service_secret = """#),
            Err(ConfigError::MissingSecret)
        ));
    }

    #[test]
    fn malformed_values_are_reported() {
        let err = from_toml("service_secret = \"x\"\nbind = \"nowhere\"").unwrap_err();
        assert!(matches!(err, ConfigError::Figment(_)), "{err}");
    }

    #[test]
    fn later_layers_win() {
        let figment = Figment::new()
            .merge(Serialized::default("service_secret", "first"))
            .merge(Serialized::default("execution_timeout_ms", 10))
            .merge(Serialized::default("execution_timeout_ms", 20));
        let config = ServerConfig::from_figment(&figment).unwrap();
        assert_eq!(config.execution_timeout_ms, 20);
    }
}
