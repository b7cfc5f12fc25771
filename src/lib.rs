//! `resilient-http` sends outbound HTTP requests with automatic retries.
//!
//! [`ResilientClient::execute`] wraps a single-exchange [`Transport`] with:
//! - exponential backoff with jitter, capped by an optional ceiling
//! - server-directed pacing via `Retry-After`
//! - a wall-clock retry budget and caller deadlines through [`RequestContext`]
//! - body buffering so retried requests resend identical bytes
//! - structured `tracing` logs with redacted URLs

mod backoff;
mod classify;
mod client;
mod context;
mod error;
mod options;
mod policy;
mod redact;
mod replay;
mod request;
mod retry_after;
mod transport;

pub use backoff::{Jitter, RandomJitter};
pub use classify::is_retryable_transport_error;
pub use client::{ClientBuilder, ResilientClient, IDEMPOTENT_METHODS};
pub use context::RequestContext;
pub use error::{BoxError, ClientError};
pub use options::ClientOptions;
pub use policy::{DefaultRetryPolicy, RetryDecision, RetryPolicy};
pub use redact::{DefaultUrlRedactor, UrlRedactor};
pub use request::{BodyProducer, BodyReader, OutboundRequest, RequestBody, IDEMPOTENCY_HEADERS};
pub use retry_after::{parse_retry_after, retry_after};
pub use transport::{ReqwestTransport, Transport};

pub type Result<T> = std::result::Result<T, ClientError>;
