//! Shared HTTP client utilities

use crate::{InferenceError, Result};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum number of idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Maximum number of retries for transient errors
    pub max_retries: u32,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            // Token classification over a short text is quick; anything slower
            // than this is treated as an unavailable classifier
            timeout_secs: 30,
            connect_timeout_secs: 5,
            pool_max_idle_per_host: 8,
            max_retries: 1,
            user_agent: format!("BankShield/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Create a configured HTTP client with connection pooling
pub fn create_client(config: &HttpClientConfig) -> Result<Client> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        // Expire idle connections before the inference server closes them
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(&config.user_agent)
        .use_rustls_tls()
        .build()
        .map_err(|e| InferenceError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Whether an error is worth another attempt
fn is_retryable(err: &InferenceError) -> bool {
    match err {
        InferenceError::HttpError(req_err) => {
            req_err.is_connect() || req_err.is_timeout() || req_err.is_request()
        }
        // Rate limiting, model still loading, gateway trouble
        InferenceError::ProviderError { status_code, .. } => {
            matches!(status_code, 429 | 500 | 502 | 503 | 504)
        }
        InferenceError::Timeout(_) => true,
        InferenceError::ParseError(_) | InferenceError::ConfigError(_) => false,
    }
}

/// Retry policy for transient errors
pub async fn with_retry<F, Fut, T>(max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff_ms = 2u64.pow(attempt - 1) * 100; // 100ms, 200ms, 400ms
            debug!(
                "Retrying classifier request after {}ms (attempt {}/{})",
                backoff_ms, attempt, max_retries
            );
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        }

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if is_retryable(&e) && attempt < max_retries {
                    warn!(
                        "Classifier request failed (attempt {}/{}): {}",
                        attempt + 1,
                        max_retries + 1,
                        e
                    );
                    last_error = Some(e);
                } else {
                    return Err(e);
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        InferenceError::ConfigError("Retry loop exited unexpectedly".to_string())
    }))
}
