use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Configures timeouts, retries, default headers and body replay.
///
/// Behavioural collaborators (transport, retry policy, URL redactor, jitter)
/// are not plain data and are set on [`ClientBuilder`](crate::ClientBuilder).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Per-exchange timeout in milliseconds. `0` disables it.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Base retry backoff in milliseconds (exponential strategy).
    pub retry_backoff_ms: u64,
    /// Upper bound for a single wait between attempts.
    pub max_backoff_ms: Option<u64>,
    /// Default headers merged into every request that does not set them itself.
    pub headers: BTreeMap<String, String>,
    /// Header names removed from the built-in defaults.
    pub remove_headers: Vec<String>,
    /// Extra methods eligible for retry beyond GET, HEAD, OPTIONS, TRACE, PUT and DELETE.
    pub retry_methods: Vec<String>,
    /// Wall-clock ceiling on time spent across all attempts and waits.
    pub max_retry_duration_ms: Option<u64>,
    /// Retry non-idempotent requests even without an idempotency key.
    pub retry_non_idempotent: bool,
    /// Largest one-shot body, in bytes, buffered for replay. `None` means unbounded.
    pub max_replay_body_size: Option<u64>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 0,
            retry_backoff_ms: 250,
            max_backoff_ms: None,
            headers: BTreeMap::new(),
            remove_headers: Vec::new(),
            retry_methods: Vec::new(),
            max_retry_duration_ms: None,
            retry_non_idempotent: false,
            max_replay_body_size: None,
        }
    }
}

impl ClientOptions {
    /// Sets the retry count and base backoff together.
    pub fn with_retries(mut self, max_retries: usize, retry_backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = retry_backoff_ms;
        self
    }

    /// Adds a default header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
