//! Client and search configuration
//!
//! [`ClientConfig`] describes the transport side (endpoint, credentials, rate
//! limits, URL ceiling, retry policy). [`SearchConfig`] describes how the
//! orchestrator batches and dispatches work. Both are plain values built with
//! `with_*` methods and passed explicitly; nothing here is process-global.

use std::env;
use std::time::Duration;

use crate::error::{Result, RetrievalError};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryConfig;

const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const DEFAULT_TOOL: &str = "pmc-retrieval";

/// Rate limit without an API key (requests per second)
pub const NCBI_DEFAULT_RATE: f64 = 3.0;
/// Rate limit with an API key (requests per second)
pub const NCBI_KEYED_RATE: f64 = 10.0;

/// Configuration for the E-utilities HTTP gateway
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub email: Option<String>,
    pub tool: Option<String>,
    pub base_url: Option<String>,
    /// Requests per second; derived from the API key when unset
    pub rate_limit: Option<f64>,
    pub timeout: Duration,
    pub user_agent: Option<String>,
    /// Longest GET URL the gateway will send, in bytes
    pub max_url_length: usize,
    pub retry_config: RetryConfig,
}

impl ClientConfig {
    /// Create a configuration with NCBI defaults and no credentials
    ///
    /// # Example
    ///
    /// ```
    /// use pmc_retrieval::ClientConfig;
    ///
    /// let config = ClientConfig::new()
    ///     .with_api_key("your_api_key_here")
    ///     .with_email("researcher@university.edu");
    /// assert_eq!(config.effective_rate_limit(), 10.0);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `NCBI_API_KEY`, `NCBI_EMAIL` and `NCBI_TOOL` from the environment
    pub fn from_env() -> Self {
        let non_empty = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        let mut config = Self::new();
        config.api_key = non_empty("NCBI_API_KEY");
        config.email = non_empty("NCBI_EMAIL");
        config.tool = non_empty("NCBI_TOOL");
        config
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_tool<S: Into<String>>(mut self, tool: S) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Point the client at a different endpoint (mock servers, mirrors)
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_rate_limit(mut self, rate: f64) -> Self {
        self.rate_limit = Some(rate);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_max_url_length(mut self, max_url_length: usize) -> Self {
        self.max_url_length = max_url_length;
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Explicit rate if set, otherwise the NCBI ceiling for the credential state
    pub fn effective_rate_limit(&self) -> f64 {
        self.rate_limit.unwrap_or(if self.api_key.is_some() {
            NCBI_KEYED_RATE
        } else {
            NCBI_DEFAULT_RATE
        })
    }

    /// Base URL without a trailing slash
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("pmc-retrieval/{}", env!("CARGO_PKG_VERSION")))
    }

    pub fn effective_tool(&self) -> &str {
        self.tool.as_deref().unwrap_or(DEFAULT_TOOL)
    }

    /// Query parameters appended to every request
    pub fn build_api_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(api_key) = &self.api_key {
            params.push(("api_key".to_string(), api_key.clone()));
        }
        if let Some(email) = &self.email {
            params.push(("email".to_string(), email.clone()));
        }
        if self.email.is_some() || self.tool.is_some() {
            params.push(("tool".to_string(), self.effective_tool().to_string()));
        }

        params
    }

    /// Bytes taken by `&api_key=<key>` in a URL, zero without a key
    pub fn api_key_param_len(&self) -> usize {
        self.api_key
            .as_ref()
            .map(|key| "&api_key=".len() + key.len())
            .unwrap_or(0)
    }

    pub fn create_rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.effective_rate_limit())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            email: None,
            tool: None,
            base_url: None,
            rate_limit: None,
            timeout: Duration::from_secs(30),
            user_agent: None,
            max_url_length: 2000,
            retry_config: RetryConfig::default(),
        }
    }
}

/// Configuration for the retrieval orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// E-utilities database to search
    pub database: String,
    /// Byte budget for the encoded terms of one batch
    pub batch_budget: usize,
    /// Concurrent batch workers
    pub max_workers: usize,
    /// Records requested per ESummary page
    pub page_size: usize,
    /// Extra attempts per batch after the gateway gave up
    pub batch_retries: u32,
    /// Drop results without a secondary (PMID) identifier
    pub require_secondary_id: bool,
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_batch_budget(mut self, batch_budget: usize) -> Self {
        self.batch_budget = batch_budget;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_batch_retries(mut self, batch_retries: u32) -> Self {
        self.batch_retries = batch_retries;
        self
    }

    pub fn with_require_secondary_id(mut self, require: bool) -> Self {
        self.require_secondary_id = require;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(RetrievalError::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(RetrievalError::InvalidConfig(
                "page_size must be at least 1".to_string(),
            ));
        }
        if self.database.trim().is_empty() {
            return Err(RetrievalError::InvalidConfig(
                "database must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            database: "pmc".to_string(),
            batch_budget: 1000,
            max_workers: 2,
            page_size: 1000,
            batch_retries: 1,
            require_secondary_id: false,
        }
    }
}
