use std::{fmt, sync::Arc};

use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method, Url,
};
use tokio::io::AsyncRead;

use crate::{ClientError, Result};

/// Header names that mark a non-idempotent request as safe to resend.
pub const IDEMPOTENCY_HEADERS: [&str; 2] = ["idempotency-key", "x-idempotency-key"];

/// One-shot request body source.
pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;

/// Produces a fresh body over the same bytes on every call.
#[derive(Clone)]
pub struct BodyProducer(Arc<dyn Fn() -> reqwest::Body + Send + Sync>);

impl BodyProducer {
    pub fn new<F>(produce: F) -> Self
    where
        F: Fn() -> reqwest::Body + Send + Sync + 'static,
    {
        Self(Arc::new(produce))
    }

    /// Producer that replays the given bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self::new(move || reqwest::Body::from(bytes.clone()))
    }

    pub fn produce(&self) -> reqwest::Body {
        (self.0)()
    }
}

impl fmt::Debug for BodyProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BodyProducer").finish()
    }
}

/// Body of an [`OutboundRequest`].
#[derive(Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// A stream that can only be read once. Buffered before the first attempt.
    OneShot(BodyReader),
    /// A body that can be produced again for every attempt.
    Replayable(BodyProducer),
}

impl RequestBody {
    /// Wraps a reader that can only be consumed once.
    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::OneShot(Box::new(reader))
    }

    /// Wraps in-memory bytes, which are replayable as-is.
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Self::Replayable(BodyProducer::from_bytes(bytes))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::OneShot(_) => f.write_str("OneShot"),
            Self::Replayable(_) => f.write_str("Replayable"),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::bytes(bytes)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::bytes(text)
    }
}

impl From<&'static str> for RequestBody {
    fn from(text: &'static str) -> Self {
        Self::bytes(text)
    }
}

impl From<BodyProducer> for RequestBody {
    fn from(producer: BodyProducer) -> Self {
        Self::Replayable(producer)
    }
}

/// A request handed to [`ResilientClient::execute`](crate::ResilientClient::execute).
///
/// The client never mutates it; each attempt is built from a fresh copy.
#[derive(Debug)]
pub struct OutboundRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: RequestBody,
}

impl OutboundRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// Parses `url` and creates a request.
    pub fn parse(method: Method, url: &str) -> Result<Self> {
        Ok(Self::new(method, Url::parse(url)?))
    }

    pub fn get(url: &str) -> Result<Self> {
        Self::parse(Method::GET, url)
    }

    pub fn post(url: &str) -> Result<Self> {
        Self::parse(Method::POST, url)
    }

    pub fn put(url: &str) -> Result<Self> {
        Self::parse(Method::PUT, url)
    }

    pub fn delete(url: &str) -> Result<Self> {
        Self::parse(Method::DELETE, url)
    }

    /// Sets a header, replacing any previous value.
    pub fn header<K, V>(mut self, name: K, value: V) -> Result<Self>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: fmt::Display,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: fmt::Display,
    {
        let name = HeaderName::try_from(name)
            .map_err(|err| ClientError::InvalidHeader(err.to_string()))?;
        let value = HeaderValue::try_from(value)
            .map_err(|err| ClientError::InvalidHeader(format!("{name}: {err}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Marks the request as safe to resend with an `Idempotency-Key` header.
    pub fn idempotency_key(self, key: &str) -> Result<Self> {
        self.header(IDEMPOTENCY_HEADERS[0], key)
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body_ref(&self) -> &RequestBody {
        &self.body
    }

    /// Returns `true` if the request carries an explicit idempotency marker.
    pub fn has_idempotency_key(&self) -> bool {
        IDEMPOTENCY_HEADERS
            .iter()
            .any(|name| self.headers.contains_key(*name))
    }

    pub(crate) fn into_parts(self) -> (RequestHead, RequestBody) {
        (
            RequestHead {
                method: self.method,
                url: self.url,
                headers: self.headers,
            },
            self.body,
        )
    }
}

/// Method, URL and headers of a request, shared by every attempt.
#[derive(Clone, Debug)]
pub(crate) struct RequestHead {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
}
