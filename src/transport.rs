use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;

use crate::{BoxError, ClientError, Result};

/// Performs a single HTTP exchange.
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` once and returns the response or the transport failure.
    async fn exchange(&self, request: reqwest::Request) -> std::result::Result<reqwest::Response, BoxError>;

    /// Drops pooled connections that are not currently in use.
    ///
    /// In-flight exchanges must not be affected. Does nothing by default.
    fn close_idle_connections(&self) {}
}

type ClientFactory = dyn Fn() -> reqwest::Result<reqwest::Client> + Send + Sync;

/// [`Transport`] backed by a pooled [`reqwest::Client`].
///
/// Closing idle connections swaps in a freshly built client. The old pool is dropped
/// once the exchanges still holding it complete.
pub struct ReqwestTransport {
    factory: Arc<ClientFactory>,
    client: RwLock<reqwest::Client>,
}

impl ReqwestTransport {
    /// Creates a transport with reqwest's default client settings.
    pub fn new() -> Result<Self> {
        Self::from_factory(|| reqwest::Client::builder().build())
    }

    /// Creates a transport that builds its clients with `factory`.
    pub fn from_factory<F>(factory: F) -> Result<Self>
    where
        F: Fn() -> reqwest::Result<reqwest::Client> + Send + Sync + 'static,
    {
        let client = factory().map_err(|err| ClientError::Config(err.to_string()))?;
        Ok(Self {
            factory: Arc::new(factory),
            client: RwLock::new(client),
        })
    }

    fn current(&self) -> reqwest::Client {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn exchange(&self, request: reqwest::Request) -> std::result::Result<reqwest::Response, BoxError> {
        let client = self.current();
        client.execute(request).await.map_err(BoxError::from)
    }

    fn close_idle_connections(&self) {
        match (self.factory)() {
            Ok(fresh) => {
                *self.client.write().unwrap_or_else(PoisonError::into_inner) = fresh;
                tracing::debug!("replaced http client to drop idle connections");
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to rebuild http client, keeping existing pool");
            }
        }
    }
}
