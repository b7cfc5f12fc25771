use std::{collections::HashSet, fmt, sync::Arc, time::Duration};

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT},
    Method, Response,
};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::{
    backoff::{Backoff, Jitter, RandomJitter},
    policy::{DefaultRetryPolicy, RetryPolicy},
    redact::{DefaultUrlRedactor, UrlRedactor},
    replay::prepare_replay,
    request::{BodyProducer, RequestHead},
    ClientError, ClientOptions, OutboundRequest, ReqwestTransport, RequestContext, Result,
    Transport,
};

const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Methods that are always eligible for retry.
pub const IDEMPOTENT_METHODS: [Method; 6] = [
    Method::GET,
    Method::HEAD,
    Method::OPTIONS,
    Method::TRACE,
    Method::PUT,
    Method::DELETE,
];

/// Builds a [`ResilientClient`] from [`ClientOptions`] and injected collaborators.
pub struct ClientBuilder {
    options: ClientOptions,
    transport: Option<Arc<dyn Transport>>,
    retry_policy: Arc<dyn RetryPolicy>,
    url_redactor: Arc<dyn UrlRedactor>,
    jitter: Arc<dyn Jitter>,
}

impl ClientBuilder {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            transport: None,
            retry_policy: Arc::new(DefaultRetryPolicy),
            url_redactor: Arc::new(DefaultUrlRedactor),
            jitter: Arc::new(RandomJitter),
        }
    }

    /// Replaces the exchange primitive. Defaults to [`ReqwestTransport`].
    pub fn transport(self, transport: impl Transport + 'static) -> Self {
        self.shared_transport(Arc::new(transport))
    }

    /// Like [`transport`](Self::transport), for a transport shared with other owners.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces [`DefaultRetryPolicy`].
    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Arc::new(policy);
        self
    }

    /// Replaces [`DefaultUrlRedactor`] for log output.
    pub fn url_redactor(mut self, redactor: impl UrlRedactor + 'static) -> Self {
        self.url_redactor = Arc::new(redactor);
        self
    }

    /// Replaces [`RandomJitter`], mostly to make timing deterministic in tests.
    pub fn jitter(mut self, jitter: impl Jitter + 'static) -> Self {
        self.jitter = Arc::new(jitter);
        self
    }

    /// Validates the options and creates the client.
    pub fn build(self) -> Result<ResilientClient> {
        let options = self.options;
        let default_headers = build_default_headers(&options)?;
        let retry_methods = build_retry_methods(&options.retry_methods)?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };
        let backoff = Backoff::new(
            Duration::from_millis(options.retry_backoff_ms),
            options.max_backoff_ms.map(Duration::from_millis),
            self.jitter,
        );

        Ok(ResilientClient {
            transport,
            retry_policy: self.retry_policy,
            url_redactor: self.url_redactor,
            backoff,
            default_headers: Arc::new(default_headers),
            retry_methods: Arc::new(retry_methods),
            timeout: (options.timeout_ms > 0).then(|| Duration::from_millis(options.timeout_ms)),
            max_retry_duration: options.max_retry_duration_ms.map(Duration::from_millis),
            options: Arc::new(options),
        })
    }
}

fn build_default_headers(options: &ClientOptions) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

    for (name, value) in &options.headers {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|err| ClientError::InvalidHeader(format!("{name}: {err}")))?;
        let value = HeaderValue::try_from(value.as_str())
            .map_err(|err| ClientError::InvalidHeader(format!("{name}: {err}")))?;
        headers.insert(name, value);
    }

    for name in &options.remove_headers {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|err| ClientError::InvalidHeader(format!("{name}: {err}")))?;
        headers.remove(name);
    }

    Ok(headers)
}

fn build_retry_methods(extra: &[String]) -> Result<HashSet<Method>> {
    let mut methods: HashSet<Method> = IDEMPOTENT_METHODS.into_iter().collect();
    for name in extra {
        let method = Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes())
            .map_err(|err| ClientError::Config(format!("invalid retry method '{name}': {err}")))?;
        methods.insert(method);
    }
    Ok(methods)
}

/// Copies default headers into `headers` where the request does not already set them.
fn merge_default_headers(headers: &mut HeaderMap, defaults: &HeaderMap) {
    for name in defaults.keys() {
        if headers.contains_key(name) {
            continue;
        }
        for value in defaults.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }
}

#[derive(Clone)]
/// HTTP client that retries transient failures with backoff, server pacing and a retry budget.
///
/// Configuration is immutable after construction; clones share it and may be used
/// concurrently.
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    retry_policy: Arc<dyn RetryPolicy>,
    url_redactor: Arc<dyn UrlRedactor>,
    backoff: Backoff,
    default_headers: Arc<HeaderMap>,
    retry_methods: Arc<HashSet<Method>>,
    timeout: Option<Duration>,
    max_retry_duration: Option<Duration>,
    options: Arc<ClientOptions>,
}

impl fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("options", &self.options)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl ResilientClient {
    /// Creates a client with the default transport, retry policy and redactor.
    pub fn new(options: ClientOptions) -> Result<Self> {
        ClientBuilder::new(options).build()
    }

    pub fn builder(options: ClientOptions) -> ClientBuilder {
        ClientBuilder::new(options)
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Sends `request`, retrying transient failures until it succeeds, fails terminally,
    /// runs out of attempts or retry budget, or `ctx` finishes.
    ///
    /// Responses with a final status (including most 4xx) are returned as `Ok`; the caller
    /// inspects the status. One-shot bodies are buffered up front so every attempt sends
    /// the same bytes.
    pub async fn execute(&self, ctx: &RequestContext, request: OutboundRequest) -> Result<Response> {
        let retries = if self.is_retry_eligible(&request) {
            self.options.max_retries
        } else {
            0
        };
        let (head, body) = request.into_parts();
        let body = prepare_replay(ctx, body, self.options.max_replay_body_size).await?;
        let url = self.url_redactor.redact(&head.url);

        let started = Instant::now();
        let mut attempt = 1usize;

        loop {
            let outbound = self.prepare_attempt(&head, body.as_ref());
            let exchange_started = Instant::now();
            let outcome = tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                outcome = self.transport.exchange(outbound) => outcome,
            };
            let duration_ms = millis(exchange_started.elapsed());
            let decision = self.retry_policy.decide(&outcome, self.transport.as_ref());

            let last_err = match outcome {
                Ok(response) if !decision.retry => {
                    info!(
                        method = %head.method,
                        url = %url,
                        attempt,
                        status = response.status().as_u16(),
                        duration_ms,
                        "http request completed"
                    );
                    return Ok(response);
                }
                Err(err) if !decision.retry => {
                    warn!(
                        method = %head.method,
                        url = %url,
                        attempt,
                        duration_ms,
                        error = %err,
                        "http request failed"
                    );
                    return Err(ClientError::Transport(err));
                }
                Ok(response) => {
                    let status = response.status();
                    drain(ctx, response).await?;
                    ClientError::Status {
                        status,
                        url: url.clone(),
                    }
                }
                Err(err) => ClientError::Transport(err),
            };

            if attempt > retries {
                warn!(
                    method = %head.method,
                    url = %url,
                    attempt,
                    duration_ms,
                    error = %last_err,
                    "http request failed, no retries left"
                );
                return Err(last_err);
            }

            let wait = self.backoff.wait(attempt, decision.delay);
            let mut delay = wait.duration;
            let mut truncated_server_delay = false;
            if let Some(remaining) = ctx.remaining() {
                if remaining.is_zero() {
                    return Err(ClientError::DeadlineExceeded);
                }
                if delay > remaining {
                    truncated_server_delay = wait.server_directed;
                    delay = remaining;
                }
            }

            if let Some(budget) = self.max_retry_duration {
                if started.elapsed().saturating_add(delay) > budget {
                    debug!(
                        url = %url,
                        attempt,
                        wait_ms = millis(delay),
                        budget_ms = millis(budget),
                        "retry budget exhausted"
                    );
                    return Err(ClientError::RetryBudgetExceeded {
                        attempts: attempt,
                        source: Box::new(last_err),
                    });
                }
            }

            warn!(
                method = %head.method,
                url = %url,
                attempt,
                duration_ms,
                wait_ms = millis(delay),
                server_directed = wait.server_directed,
                error = %last_err,
                "http request failed, retrying"
            );

            tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                _ = sleep(delay) => {}
            }

            // Retrying before the server's requested window has passed would defeat it.
            if truncated_server_delay {
                debug!(url = %url, attempt, "deadline cuts into server-directed delay");
                return Err(ClientError::DeadlineExceeded);
            }
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            attempt += 1;
        }
    }

    fn is_retry_eligible(&self, request: &OutboundRequest) -> bool {
        self.retry_methods.contains(request.method())
            || (*request.method() == Method::POST && request.has_idempotency_key())
            || self.options.retry_non_idempotent
    }

    fn prepare_attempt(&self, head: &RequestHead, body: Option<&BodyProducer>) -> reqwest::Request {
        let mut request = reqwest::Request::new(head.method.clone(), head.url.clone());
        *request.headers_mut() = head.headers.clone();
        merge_default_headers(request.headers_mut(), &self.default_headers);
        *request.body_mut() = body.map(BodyProducer::produce);
        *request.timeout_mut() = self.timeout;
        request
    }
}

/// Reads the rest of a response that is about to be retried, so its connection can be reused.
async fn drain(ctx: &RequestContext, response: Response) -> Result<()> {
    tokio::select! {
        biased;
        err = ctx.done() => Err(err),
        // Read failures only cost the connection; the retry proceeds regardless.
        _ = response.bytes() => Ok(()),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
