use std::{env, time::Duration};

use groupchat_core::storage::RetryPolicy;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Single table holding every entity (default: "groupChatTable")
    pub table_name: String,
    /// Retries after the first attempt on transient failures (default: 5)
    pub retry_max_attempts: usize,
    /// Initial backoff delay in milliseconds (default: 20)
    pub retry_min_delay_ms: u64,
    /// Backoff delay cap in milliseconds (default: 1,000)
    pub retry_max_delay_ms: u64,
    /// Page size when a request sets no limit (default: 20)
    pub page_size_default: usize,
    /// Largest page a request may ask for (default: 100)
    pub page_size_max: usize,
    /// Buffered events per group channel (default: 100)
    pub event_channel_capacity: usize,
    /// Request timeout in seconds (default: 10)
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `GROUPCHAT_TABLE` - Table name (default: "groupChatTable")
    /// - `RETRY_MAX_ATTEMPTS` - Retries on transient failures (default: 5)
    /// - `RETRY_MIN_DELAY_MS` - Initial backoff delay (default: 20)
    /// - `RETRY_MAX_DELAY_MS` - Maximum backoff delay (default: 1,000)
    /// - `PAGE_SIZE_DEFAULT` - Default page size (default: 20)
    /// - `PAGE_SIZE_MAX` - Maximum page size (default: 100)
    /// - `EVENT_CHANNEL_CAPACITY` - Per-group event buffer (default: 100)
    /// - `REQUEST_TIMEOUT_SECS` - Request timeout (default: 10)
    pub fn from_env() -> Self {
        Self {
            table_name: env::var("GROUPCHAT_TABLE").unwrap_or_else(|_| "groupChatTable".to_string()),
            retry_max_attempts: parse_var("RETRY_MAX_ATTEMPTS", 5),
            retry_min_delay_ms: parse_var("RETRY_MIN_DELAY_MS", 20),
            retry_max_delay_ms: parse_var("RETRY_MAX_DELAY_MS", 1_000),
            page_size_default: parse_var("PAGE_SIZE_DEFAULT", 20),
            page_size_max: parse_var("PAGE_SIZE_MAX", 100),
            event_channel_capacity: parse_var("EVENT_CHANNEL_CAPACITY", 100),
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 10),
        }
    }

    /// Backoff policy for store reads and transactional writes.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry_max_attempts,
            min_delay: Duration::from_millis(self.retry_min_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms.max(self.retry_min_delay_ms)),
            jitter: true,
        }
    }

    /// Get the request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
