//! Logger builder

use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::{Config, Format};
use crate::core::{LogError, LogResult};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Keeps the root span entered for the lifetime of the process.
#[derive(Debug)]
pub struct LoggerGuard {
    _root_span: Option<tracing::span::EnteredSpan>,
}

impl LoggerBuilder {
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Parse the filter directives without installing anything.
    pub fn filter(&self) -> LogResult<EnvFilter> {
        EnvFilter::try_new(&self.config.level)
            .map_err(|e| LogError::Filter(format!("{}: {e}", self.config.level)))
    }

    /// Build and install the global subscriber.
    ///
    /// Fails when the filter cannot be parsed or a subscriber is already set.
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = self.filter()?;

        Registry::default()
            .with(self.fmt_layer())
            .with(filter)
            .try_init()
            .map_err(|e| LogError::Init(e.to_string()))?;

        let root = if self.config.fields.is_empty() {
            None
        } else {
            let fields = &self.config.fields;
            let span = tracing::info_span!(
                "app",
                service = fields.service.as_deref().unwrap_or(""),
                env = fields.env.as_deref().unwrap_or(""),
                version = fields.version.as_deref().unwrap_or("")
            );
            Some(span.entered())
        };

        Ok(LoggerGuard { _root_span: root })
    }

    fn fmt_layer(&self) -> BoxedLayer {
        let ansi = self.config.ansi;
        match self.config.format {
            Format::Pretty => fmt::layer().pretty().with_ansi(ansi).boxed(),
            Format::Compact => fmt::layer()
                .compact()
                .with_ansi(ansi)
                .with_target(true)
                .boxed(),
            Format::Json => fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_directive_is_rejected_before_install() {
        let builder = LoggerBuilder::from_config(Config {
            level: "sluice=notalevel".to_string(),
            ..Config::default()
        });
        let err = builder.filter().unwrap_err();
        assert!(matches!(err, LogError::Filter(msg) if msg.starts_with("sluice=notalevel")));
    }

    #[test]
    fn directive_lists_parse() {
        let builder = LoggerBuilder::from_config(Config {
            level: "sluice_api=debug,warn".to_string(),
            ..Config::default()
        });
        assert!(builder.filter().is_ok());
    }
}
