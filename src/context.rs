//! Cancellation and deadline scope for a single logical call.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::ClientError;

/// Cancellation signal plus optional deadline carried by every call to
/// [`ResilientClient::execute`](crate::ResilientClient::execute).
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Creates a context with no deadline that is only finished by [`cancel`](Self::cancel).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context bound to an existing cancellation token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Returns a copy of this context that also expires after `timeout`.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.with_deadline(deadline)
    }

    /// Returns a copy of this context that also expires at `deadline`.
    ///
    /// An existing earlier deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Derives a context that is canceled with this one but can be canceled on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancels this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, if one is set. Zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns the context error if the context has already finished.
    pub fn err(&self) -> Option<ClientError> {
        if self.token.is_cancelled() {
            return Some(ClientError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ClientError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves with the context error once the context is canceled or its deadline passes.
    pub async fn done(&self) -> ClientError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => ClientError::Canceled,
                _ = sleep_until(deadline) => ClientError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ClientError::Canceled
            }
        }
    }
}
