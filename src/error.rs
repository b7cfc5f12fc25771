use reqwest::StatusCode;

/// Boxed error produced by a [`Transport`](crate::Transport) exchange.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network or request execution error from the transport.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    /// Retryable HTTP status that was still failing when retries ran out.
    #[error("http error {status} from {url}")]
    Status {
        /// Status code of the last response.
        status: StatusCode,
        /// Redacted request URL.
        url: String,
    },
    /// Request body is larger than the configured replay buffer.
    ///
    /// Returned before any network attempt is made.
    #[error("request body exceeds replay limit of {limit} bytes")]
    ReplayBodyTooLarge { limit: u64 },
    /// Reading a one-shot request body into the replay buffer failed.
    #[error("failed to read request body: {0}")]
    BodyRead(#[source] std::io::Error),
    /// The request context was canceled.
    #[error("request canceled")]
    Canceled,
    /// The request context deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// Waiting for another attempt would exceed the maximum retry duration.
    ///
    /// The source is the last observed failure.
    #[error("retry budget exceeded after {attempts} attempts: {source}")]
    RetryBudgetExceeded {
        attempts: usize,
        #[source]
        source: Box<ClientError>,
    },
    /// Request URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Header name or value is not valid HTTP.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    /// Client options could not be turned into a client.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Returns `true` for errors caused by the request context finishing.
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }

    /// Returns the failure that ended retrying, looking through a retry budget error.
    pub fn last_failure(&self) -> &ClientError {
        match self {
            Self::RetryBudgetExceeded { source, .. } => source.last_failure(),
            other => other,
        }
    }
}
