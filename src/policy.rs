use std::time::Duration;

use reqwest::Response;

use crate::{classify::is_retryable_transport_error, retry_after::retry_after, BoxError, Transport};

/// Outcome of a [`RetryPolicy`] for one exchange.
///
/// `delay` is the wait the server asked for. The client may still shorten it under
/// deadline pressure, and zero means "use the client's own backoff".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryDecision {
    pub delay: Duration,
    pub retry: bool,
}

impl RetryDecision {
    /// Do not retry; the outcome is final.
    pub const STOP: Self = Self {
        delay: Duration::ZERO,
        retry: false,
    };

    /// Retry using the client's backoff schedule.
    pub const fn retry() -> Self {
        Self {
            delay: Duration::ZERO,
            retry: true,
        }
    }

    /// Retry after the given server-directed delay.
    pub const fn retry_after(delay: Duration) -> Self {
        Self { delay, retry: true }
    }
}

/// Decides whether an exchange should be retried.
pub trait RetryPolicy: Send + Sync {
    /// Inspects the raw outcome of one exchange.
    ///
    /// `transport` is the collaborator that produced it, for policies that need to act on
    /// its connection pool.
    fn decide(
        &self,
        outcome: &Result<Response, BoxError>,
        transport: &dyn Transport,
    ) -> RetryDecision;
}

impl<F> RetryPolicy for F
where
    F: Fn(&Result<Response, BoxError>, &dyn Transport) -> RetryDecision + Send + Sync,
{
    fn decide(
        &self,
        outcome: &Result<Response, BoxError>,
        transport: &dyn Transport,
    ) -> RetryDecision {
        self(outcome, transport)
    }
}

/// The standard retry policy.
///
/// - Transport errors are retried when [`is_retryable_transport_error`] says so.
/// - 408, 421 and 425 are retried immediately. A 421 also closes the transport's idle
///   connections, since the peer no longer serves this origin on them.
/// - 429 and every 5xx are retried, honoring `Retry-After`.
/// - Everything else is final.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRetryPolicy;

impl RetryPolicy for DefaultRetryPolicy {
    fn decide(
        &self,
        outcome: &Result<Response, BoxError>,
        transport: &dyn Transport,
    ) -> RetryDecision {
        match outcome {
            Err(err) => {
                if is_retryable_transport_error(err.as_ref()) {
                    RetryDecision::retry()
                } else {
                    RetryDecision::STOP
                }
            }
            Ok(response) => match response.status().as_u16() {
                421 => {
                    transport.close_idle_connections();
                    RetryDecision::retry()
                }
                408 | 425 => RetryDecision::retry(),
                429 | 500..=599 => RetryDecision::retry_after(retry_after(response.headers())),
                _ => RetryDecision::STOP,
            },
        }
    }
}
