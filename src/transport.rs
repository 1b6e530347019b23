//! HTTP transport used by the operation executor
//!
//! The executor talks to the network only through the [`Transport`] trait, so
//! tests and embedders can substitute their own implementation. The default
//! stack is [`HyperTransport`] wrapped in [`BearerAuth`].

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, AUTHORIZATION};
use hyper::{Request, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HttpClient;
use hyper_util::rt::TokioExecutor;
use tracing::debug;
use zeroize::Zeroize;

use crate::error::{Error, ErrorKind, Result};

/// Boxed error type produced by transports and response bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body handed back by a transport. It is read in full before decoding.
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// Sends one fully built request and returns the response.
///
/// The body may be streamed or already buffered; the executor reads it in
/// full either way.
///
/// Implementations must be safe to share between concurrent calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request.
    async fn send(
        &self,
        request: Request<Full<Bytes>>,
    ) -> std::result::Result<Response<ResponseBody>, BoxError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(
        &self,
        request: Request<Full<Bytes>>,
    ) -> std::result::Result<Response<ResponseBody>, BoxError> {
        (**self).send(request).await
    }
}

/// API key wrapper that zeros its memory on drop.
#[derive(Clone)]
struct AuthToken(String);

impl AuthToken {
    fn new(token: String) -> Self {
        Self(token)
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl Drop for AuthToken {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Transport layer that adds `Authorization: Bearer <api key>` to every
/// request before handing it to the wrapped transport.
#[derive(Clone)]
pub struct BearerAuth<T> {
    token: AuthToken,
    inner: T,
}

impl<T> BearerAuth<T> {
    /// Wrap `inner`, authenticating with `api_key`.
    pub fn new(inner: T, api_key: impl Into<String>) -> Self {
        Self {
            token: AuthToken::new(api_key.into()),
            inner,
        }
    }
}

impl<T> fmt::Debug for BearerAuth<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuth").finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: Transport> Transport for BearerAuth<T> {
    async fn send(
        &self,
        mut request: Request<Full<Bytes>>,
    ) -> std::result::Result<Response<ResponseBody>, BoxError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.token.as_str()))?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
        self.inner.send(request).await
    }
}

/// Build a rustls ClientConfig trusting the webpki root set.
fn build_tls_config() -> Result<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    Ok(rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::new(ErrorKind::RequestBuildFailed, format!("TLS configuration error: {}", e)))?
        .with_root_certificates(roots)
        .with_no_client_auth())
}

type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;

/// Pooled hyper client over rustls. Speaks HTTP/1.1 and HTTP/2 and also
/// accepts plain `http://` URLs.
///
/// The timeout covers the whole exchange: the response body is buffered
/// before `send` returns.
#[derive(Clone)]
pub struct HyperTransport {
    http_client: HttpClient<HttpsConnector, Full<Bytes>>,
    timeout: Duration,
}

impl HyperTransport {
    /// Create a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let tls_config = build_tls_config()?;

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();

        let http_client = HttpClient::builder(TokioExecutor::new()).build(https_connector);

        Ok(Self {
            http_client,
            timeout,
        })
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(
        &self,
        request: Request<Full<Bytes>>,
    ) -> std::result::Result<Response<ResponseBody>, BoxError> {
        let timeout_ms = self.timeout.as_millis();

        // The timeout bounds the whole exchange, body included.
        let exchange = async {
            let response = self.http_client.request(request).await?;
            debug!("Transport response: {}", response.status());
            let (parts, body) = response.into_parts();
            let bytes = body.collect().await?.to_bytes();
            Ok::<_, BoxError>(Response::from_parts(parts, bytes))
        };
        let response = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| format!("request timed out after {}ms", timeout_ms))??;

        Ok(response.map(|bytes| {
            Full::new(bytes)
                .map_err(|never: Infallible| -> BoxError { match never {} })
                .boxed_unsync()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Records the Authorization header of every request it sees.
    #[derive(Default)]
    struct HeaderCapture {
        seen: Mutex<Vec<Option<HeaderValue>>>,
    }

    #[async_trait]
    impl Transport for HeaderCapture {
        async fn send(
            &self,
            request: Request<Full<Bytes>>,
        ) -> std::result::Result<Response<ResponseBody>, BoxError> {
            self.seen
                .lock()
                .unwrap()
                .push(request.headers().get(AUTHORIZATION).cloned());
            let body = Full::new(Bytes::from_static(b"{\"success\":true}"))
                .map_err(|never: Infallible| -> BoxError { match never {} })
                .boxed_unsync();
            Ok(Response::new(body))
        }
    }

    fn empty_request() -> Request<Full<Bytes>> {
        Request::builder()
            .method("POST")
            .uri("http://localhost/v1/node/list")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_bearer_auth_injects_header() {
        let capture = Arc::new(HeaderCapture::default());
        let transport = BearerAuth::new(capture.clone(), "secret-key");

        transport.send(empty_request()).await.unwrap();

        let seen = capture.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let value = seen[0].as_ref().expect("authorization header missing");
        assert_eq!(value.to_str().unwrap(), "Bearer secret-key");
        assert!(value.is_sensitive());
    }

    #[tokio::test]
    async fn test_bearer_auth_replaces_existing_header() {
        let capture = Arc::new(HeaderCapture::default());
        let transport = BearerAuth::new(capture.clone(), "right");

        let mut request = empty_request();
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Bearer wrong"));
        transport.send(request).await.unwrap();

        let seen = capture.seen.lock().unwrap();
        assert_eq!(seen[0].as_ref().unwrap().to_str().unwrap(), "Bearer right");
    }

    #[tokio::test]
    async fn test_bearer_auth_rejects_invalid_key() {
        let capture = Arc::new(HeaderCapture::default());
        let transport = BearerAuth::new(capture.clone(), "bad\nkey");

        let result = transport.send(empty_request()).await;
        assert!(result.is_err());
        assert!(capture.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_bearer_auth_debug_hides_key() {
        let transport = BearerAuth::new(HeaderCapture::default(), "secret-key");
        assert!(!format!("{:?}", transport).contains("secret-key"));
    }

    #[test]
    fn test_build_tls_config() {
        let config = build_tls_config();
        assert!(config.is_ok(), "Default TLS config should succeed");
    }

    #[tokio::test]
    async fn test_hyper_transport_new() {
        let transport = HyperTransport::new(Duration::from_secs(5)).unwrap();
        assert_eq!(transport.timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_hyper_transport_connection_refused() {
        // Port 9 (discard) on localhost is closed in test environments.
        let transport = HyperTransport::new(Duration::from_secs(5)).unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("http://127.0.0.1:9/v1/node/list")
            .body(Full::new(Bytes::new()))
            .unwrap();
        assert!(transport.send(request).await.is_err());
    }

    #[tokio::test]
    async fn test_hyper_transport_timeout_covers_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Send headers and part of the body, then stall.
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\ncontent-type: application/json\r\n\r\n{\"success\":")
                .await
                .unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let transport = HyperTransport::new(Duration::from_millis(200)).unwrap();
        let request = Request::builder()
            .method("POST")
            .uri(format!("http://{}/v1/node/list", addr))
            .body(Full::new(Bytes::from_static(b"{}")))
            .unwrap();

        let started = Instant::now();
        let result = tokio::time::timeout(Duration::from_secs(3), transport.send(request))
            .await
            .expect("send should give up on its own");
        let err = result.err().expect("stalled body should fail");
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(3));

        server.abort();
    }
}
