use std::{fmt, sync::Arc, time::Duration};

use rand::Rng as _;

/// Source of jitter added to exponential backoff.
pub trait Jitter: Send + Sync {
    /// Returns a duration drawn uniformly from `[0, upper)`. `upper` is never zero.
    fn sample(&self, upper: Duration) -> Duration;
}

impl<F> Jitter for F
where
    F: Fn(Duration) -> Duration + Send + Sync,
{
    fn sample(&self, upper: Duration) -> Duration {
        self(upper)
    }
}

/// Jitter drawn from the thread-local random number generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn sample(&self, upper: Duration) -> Duration {
        let upper = u64::try_from(upper.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(rand::rng().random_range(0..upper))
    }
}

/// Wait computed before the next attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Wait {
    pub(crate) duration: Duration,
    /// The wait came from the server (`Retry-After`) rather than our own schedule.
    pub(crate) server_directed: bool,
}

/// Exponential backoff with full jitter and an optional ceiling.
#[derive(Clone)]
pub(crate) struct Backoff {
    base: Duration,
    max: Option<Duration>,
    jitter: Arc<dyn Jitter>,
}

impl Backoff {
    pub(crate) fn new(base: Duration, max: Option<Duration>, jitter: Arc<dyn Jitter>) -> Self {
        Self { base, max, jitter }
    }

    /// Computes the wait after the given 1-based attempt.
    ///
    /// A positive `server_delay` replaces the exponential term. Otherwise the term
    /// `base * 2^(attempt - 1)` is stretched by a random amount in `[0, term)`.
    pub(crate) fn wait(&self, attempt: usize, server_delay: Duration) -> Wait {
        let server_directed = !server_delay.is_zero();
        let mut duration = if server_directed {
            server_delay
        } else {
            let term = self.term(attempt);
            if term.is_zero() {
                term
            } else {
                term.saturating_add(self.jitter.sample(term))
            }
        };

        if let Some(max) = self.max {
            duration = duration.min(max);
        }

        Wait {
            duration,
            server_directed,
        }
    }

    fn term(&self, attempt: usize) -> Duration {
        let exp = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let factor = 1u32.checked_shl(exp).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor)
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backoff")
            .field("base", &self.base)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}
