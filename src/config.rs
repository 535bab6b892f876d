//! Service configuration.
//!
//! Both services are configured from the environment by default, using the
//! same variable names as the deployment scripts.

use std::env;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default timeout for a single service request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default number of attempts for transient service failures.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

fn required(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("{} is not set", name)))
}

/// Document analysis (OCR/layout) service settings.
#[derive(Debug, Clone)]
pub struct DocumentIntelligenceConfig {
    /// Service endpoint, e.g. `https://<name>.cognitiveservices.azure.com`
    pub endpoint: String,

    /// Subscription key
    pub api_key: String,

    /// Analysis model id
    pub model_id: String,

    /// REST API version
    pub api_version: String,

    /// Timeout of each HTTP request
    pub timeout: Duration,

    /// Delay between result polls
    pub poll_interval: Duration,

    /// Maximum number of result polls
    pub max_polls: u32,
}

impl DocumentIntelligenceConfig {
    /// Create a configuration with default model and timing.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model_id: "prebuilt-layout".to_string(),
            api_version: "2024-11-30".to_string(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: Duration::from_secs(2),
            max_polls: 90,
        }
    }

    /// Read `ENDPOINT_DOCINT` and `API_KEY_DOCINT`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(
            required("ENDPOINT_DOCINT")?,
            required("API_KEY_DOCINT")?,
        ))
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Chat completion service settings.
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    /// Resource endpoint, e.g. `https://<name>.openai.azure.com`
    pub endpoint: String,

    /// API key
    pub api_key: String,

    /// Deployment name of a vision-capable chat model
    pub deployment: String,

    /// REST API version
    pub api_version: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Timeout of each HTTP request
    pub timeout: Duration,

    /// Attempts for timeouts, connection errors, 429 and 5xx responses
    pub max_attempts: u32,
}

impl AzureOpenAiConfig {
    /// Create a configuration with deterministic sampling.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            deployment: deployment.into(),
            api_version: "2024-10-21".to_string(),
            temperature: 0.0,
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Read `AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_API_KEY`,
    /// `AZURE_OPENAI_DEPLOYMENT` and optionally `OPENAI_API_VERSION`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(
            required("AZURE_OPENAI_ENDPOINT")?,
            required("AZURE_OPENAI_API_KEY")?,
            required("AZURE_OPENAI_DEPLOYMENT")?,
        );
        if let Ok(version) = env::var("OPENAI_API_VERSION") {
            if !version.trim().is_empty() {
                config.api_version = version;
            }
        }
        Ok(config)
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of attempts for transient failures.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }
}
