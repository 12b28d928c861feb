//! Shared server state

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use sluice_action::{
    ActionRunner, BuildOptions, Dispatcher, HttpTextExtractor, ResponseProcessor,
};
use sluice_resilience::{KeyedSlidingWindow, RateLimitPolicy, RateLimiter, RetryStrategy};
use sluice_sandbox::{Sandbox, SandboxConfig};

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone)]
pub struct AppState {
    pub(crate) sandbox: Arc<Sandbox>,
    pub(crate) secret: Arc<SecretString>,
    /// Keyed by the caller key of the presented secret
    pub(crate) limiter: Arc<dyn RateLimiter<Key = String>>,
}

impl AppState {
    pub fn new(sandbox: Sandbox, secret: SecretString, rate_limit: RateLimitPolicy) -> Self {
        Self {
            sandbox: Arc::new(sandbox),
            secret: Arc::new(secret),
            limiter: Arc::new(KeyedSlidingWindow::new(rate_limit)),
        }
    }

    /// Wire the dispatcher, processor and sandbox described by `config`.
    pub fn from_config(config: &ServerConfig) -> ApiResult<Self> {
        let secret = config
            .service_secret
            .as_ref()
            .map(|secret| SecretString::from(secret.expose_secret().to_owned()))
            .ok_or_else(|| ApiError::Internal("service_secret is not set".into()))?;

        let retry = RetryStrategy::exponential(config.retry.max_attempts)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let dispatcher = Dispatcher::new(retry).map_err(|e| ApiError::Internal(e.to_string()))?;

        let mut processor = ResponseProcessor::new();
        if let Some(url) = &config.text_extraction.pdf_to_text_url {
            processor = processor.with_pdf_extractor(Arc::new(HttpTextExtractor::new(url.clone())));
        }
        if let Some(url) = &config.text_extraction.html_to_text_url {
            processor =
                processor.with_html_extractor(Arc::new(HttpTextExtractor::new(url.clone())));
        }

        let runner = ActionRunner::new(
            dispatcher,
            processor,
            BuildOptions {
                mock_api_host: config.mock_api_host.clone(),
                redact_query_auth: config.redact_query_auth,
            },
        );
        let sandbox = Sandbox::new(
            runner,
            SandboxConfig {
                timeout: config.execution_timeout(),
                ..SandboxConfig::default()
            },
        );
        Ok(Self::new(sandbox, secret, config.rate_limit))
    }
}
