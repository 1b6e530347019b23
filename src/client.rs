//! Client facade over every resource manager

use std::fmt;
use std::sync::Arc;

use hyper::header::HeaderValue;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::registry::ReasonCodeRegistry;
use crate::resources::{
    AccessTokenManager, AggregationManager, CommandManager, DataAccessManager, HealthManager,
    NodeManager, ValueStoreManager, VariableManager,
};
use crate::transport::{BearerAuth, HyperTransport, Transport};

/// Entry point to the Anedya API.
///
/// Owns one transport and base URL shared by every manager it hands out.
/// Cloning is cheap and clones share the connection pool.
#[derive(Clone)]
pub struct Client {
    executor: Executor,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.executor.base_url())
            .finish()
    }
}

impl Client {
    /// Create a client for `base_url` authenticating with `api_key`.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use anedya_sdk::Client;
    ///
    /// let client = Client::new("https://api.ap-in-1.anedya.io", "your-api-key")?;
    /// # Ok::<(), anedya_sdk::Error>(())
    /// ```
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let config = ClientConfig {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            ..Default::default()
        };
        Self::with_config(config)
    }

    /// Create a client from a full configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        validate_base_url(&config.base_url)?;
        validate_api_key(&config.api_key)?;

        let transport = BearerAuth::new(HyperTransport::new(config.timeout())?, config.api_key.as_str());
        debug!(
            "Created client for {} (timeout {}ms)",
            config.base_url, config.timeout_ms
        );

        Ok(Self::with_transport(Arc::new(transport), config.base_url))
    }

    /// Create a client over a caller-supplied transport.
    ///
    /// No authentication is added; the transport is expected to handle it.
    pub fn with_transport(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            executor: Executor::new(transport, base_url),
        }
    }

    /// Like [`with_transport`](Self::with_transport), classifying server
    /// reason codes with `registry`.
    pub fn with_registry(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        registry: Arc<ReasonCodeRegistry>,
    ) -> Self {
        Self {
            executor: Executor::with_registry(transport, base_url, registry),
        }
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.executor.base_url()
    }

    pub fn nodes(&self) -> NodeManager {
        NodeManager::from_executor(self.executor.clone())
    }

    pub fn variables(&self) -> VariableManager {
        VariableManager::from_executor(self.executor.clone())
    }

    pub fn value_store(&self) -> ValueStoreManager {
        ValueStoreManager::from_executor(self.executor.clone())
    }

    pub fn health(&self) -> HealthManager {
        HealthManager::from_executor(self.executor.clone())
    }

    pub fn data(&self) -> DataAccessManager {
        DataAccessManager::from_executor(self.executor.clone())
    }

    pub fn aggregations(&self) -> AggregationManager {
        AggregationManager::from_executor(self.executor.clone())
    }

    pub fn commands(&self) -> CommandManager {
        CommandManager::from_executor(self.executor.clone())
    }

    pub fn access_tokens(&self) -> AccessTokenManager {
        AccessTokenManager::from_executor(self.executor.clone())
    }
}

/// Base URLs must be absolute http(s) URLs without a query or fragment.
fn validate_base_url(base_url: &str) -> Result<()> {
    if base_url.is_empty() {
        return Err(Error::input_required("base url is required"));
    }
    let url = Url::parse(base_url)
        .map_err(|e| Error::validation(format!("invalid base url '{}': {}", base_url, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::validation(format!(
            "base url must use http or https, got '{}'",
            url.scheme()
        )));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(Error::validation("base url must not have a query or fragment"));
    }
    Ok(())
}

/// API keys must be non-empty and usable in an `Authorization` header.
fn validate_api_key(api_key: &str) -> Result<()> {
    if api_key.is_empty() {
        return Err(Error::input_required("api key is required"));
    }
    HeaderValue::from_str(api_key)
        .map_err(|_| Error::validation("api key contains characters not allowed in a header"))?;
    Ok(())
}
