//! Generic request pipeline shared by every endpoint
//!
//! Each call runs the same fixed sequence of stages:
//!
//! 1. validate the request (no I/O)
//! 2. encode it as JSON
//! 3. build the POST request
//! 4. transmit it (the only stage that waits or observes cancellation)
//! 5. read the whole response body
//! 6. decode the common envelope
//! 7. classify the outcome from the HTTP status and the envelope's success flag
//!
//! A stage that fails ends the call with an error of that stage's kind.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::registry::ReasonCodeRegistry;
use crate::transport::{ResponseBody, Transport};

/// One API endpoint: a request record bound to a path, a payload shape and a
/// validation rule.
pub trait Operation: Serialize + Send {
    /// Endpoint path appended to the base URL, e.g. `/v1/node/create`.
    const PATH: &'static str;

    /// Short name used in error messages, e.g. `create node`.
    const NAME: &'static str;

    /// Endpoint-specific fields of a successful envelope.
    type Payload: DeserializeOwned;

    /// Value returned to the caller on success.
    type Output;

    /// Check the request. Must be pure and must not perform I/O.
    fn validate(&self) -> Result<()>;

    /// Combine the request with the server payload into the caller's result.
    fn into_output(self, payload: Self::Payload) -> Result<Self::Output>;
}

/// Fields common to every response envelope.
///
/// All fields default so that error envelopes carrying only some of them
/// still decode.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: String,
    #[serde(default, rename = "reasonCode")]
    reason_code: String,
}

/// Payload for endpoints whose success envelope carries nothing beyond the
/// common fields.
#[derive(Debug, Default, Deserialize)]
pub struct Empty {}

/// Runs [`Operation`]s against one base URL through one transport.
///
/// Cheap to clone; clones share the transport and registry.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    base_url: String,
    registry: Arc<ReasonCodeRegistry>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Create an executor using the standard reason-code registry.
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self::with_registry(transport, base_url, ReasonCodeRegistry::standard())
    }

    /// Create an executor with a custom reason-code registry.
    pub fn with_registry(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        registry: Arc<ReasonCodeRegistry>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            inner: Arc::new(Inner {
                transport,
                base_url,
                registry,
            }),
        }
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Run one operation through the full pipeline.
    pub async fn execute<O: Operation>(&self, ctx: &Context, op: O) -> Result<O::Output> {
        op.validate()?;

        let body = serde_json::to_vec(&op).map_err(|e| {
            Error::new(
                ErrorKind::RequestEncodeFailed,
                format!("failed to encode {} request: {}", O::NAME, e),
            )
        })?;

        let request = self.build_request(O::PATH, body).map_err(|e| {
            Error::new(
                ErrorKind::RequestBuildFailed,
                format!("failed to build {} request: {}", O::NAME, e),
            )
        })?;

        let response = self.transmit(ctx, request, O::NAME).await?;
        let status = response.status();
        debug!("Received response: {} {}", status, O::PATH);

        let bytes = Self::read_body(response, O::NAME).await?;

        let envelope: Envelope = serde_json::from_slice(&bytes).map_err(|e| {
            Error::new(
                ErrorKind::ResponseDecodeFailed,
                format!("failed to decode {} response: {}", O::NAME, e),
            )
            .with_status(status)
        })?;

        if !status.is_success() || !envelope.success {
            return Err(self.failure(status, envelope, O::NAME));
        }

        let payload: O::Payload = serde_json::from_slice(&bytes).map_err(|e| {
            Error::new(
                ErrorKind::ResponseDecodeFailed,
                format!("failed to decode {} response payload: {}", O::NAME, e),
            )
            .with_status(status)
        })?;

        op.into_output(payload)
    }

    fn build_request(
        &self,
        path: &str,
        body: Vec<u8>,
    ) -> std::result::Result<Request<Full<Bytes>>, http::Error> {
        let url = format!("{}{}", self.inner.base_url, path);
        Request::builder()
            .method(Method::POST)
            .uri(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .body(Full::new(Bytes::from(body)))
    }

    async fn transmit(
        &self,
        ctx: &Context,
        request: Request<Full<Bytes>>,
        name: &str,
    ) -> Result<Response<ResponseBody>> {
        if ctx.is_done() {
            return Err(Error::new(
                ErrorKind::TransportFailed,
                format!("{} request not sent: {}", name, ctx.reason()),
            ));
        }

        debug!("Sending request: {} {}", request.method(), request.uri().path());

        tokio::select! {
            biased;
            _ = ctx.done() => Err(Error::new(
                ErrorKind::TransportFailed,
                format!("{} request aborted: {}", name, ctx.reason()),
            )),
            result = self.inner.transport.send(request) => result.map_err(|e| {
                Error::new(
                    ErrorKind::TransportFailed,
                    format!("failed to execute {} request: {}", name, e),
                )
            }),
        }
    }

    async fn read_body(response: Response<ResponseBody>, name: &str) -> Result<Bytes> {
        let status = response.status();
        let collected = response.into_body().collect().await.map_err(|e| {
            Error::new(
                ErrorKind::ResponseReadFailed,
                format!("failed to read {} response: {}", name, e),
            )
            .with_status(status)
        })?;
        Ok(collected.to_bytes())
    }

    fn failure(&self, status: StatusCode, envelope: Envelope, name: &str) -> Error {
        let kind = if envelope.reason_code.is_empty()
            && matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        {
            ErrorKind::Unauthorized
        } else {
            self.inner.registry.classify(&envelope.reason_code)
        };

        let message = if envelope.error.is_empty() {
            format!("{} failed with status {}", name, status.as_u16())
        } else {
            envelope.error
        };

        Error::new(kind, message)
            .with_reason_code(envelope.reason_code)
            .with_status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::BoxError;
    use async_trait::async_trait;
    use serde::ser::Error as _;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Transport double returning a fixed status and body.
    struct Stub {
        status: StatusCode,
        body: &'static str,
        calls: AtomicUsize,
        requests: Mutex<Vec<Request<Full<Bytes>>>>,
        cancel_on_send: Option<Context>,
        hang: bool,
    }

    impl Stub {
        fn new(status: u16, body: &'static str) -> Self {
            Self {
                status: StatusCode::from_u16(status).unwrap(),
                body,
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                cancel_on_send: None,
                hang: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for Stub {
        async fn send(
            &self,
            request: Request<Full<Bytes>>,
        ) -> std::result::Result<Response<ResponseBody>, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if let Some(ctx) = &self.cancel_on_send {
                ctx.cancel();
            }
            let body = Full::new(Bytes::from_static(self.body.as_bytes()))
                .map_err(|never: Infallible| -> BoxError { match never {} })
                .boxed_unsync();
            let mut response = Response::new(body);
            *response.status_mut() = self.status;
            Ok(response)
        }
    }

    #[derive(Serialize)]
    struct Echo {
        name: String,
    }

    #[derive(Deserialize)]
    struct EchoPayload {
        id: String,
    }

    impl Operation for Echo {
        const PATH: &'static str = "/v1/test/echo";
        const NAME: &'static str = "echo";
        type Payload = EchoPayload;
        type Output = (String, String);

        fn validate(&self) -> Result<()> {
            crate::validate::require(&self.name, "name")
        }

        fn into_output(self, payload: EchoPayload) -> Result<(String, String)> {
            Ok((payload.id, self.name))
        }
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to serialize"))
        }
    }

    impl Operation for Unencodable {
        const PATH: &'static str = "/v1/test/bad";
        const NAME: &'static str = "bad";
        type Payload = Empty;
        type Output = ();

        fn validate(&self) -> Result<()> {
            Ok(())
        }

        fn into_output(self, _: Empty) -> Result<()> {
            Ok(())
        }
    }

    fn echo(name: &str) -> Echo {
        Echo {
            name: name.to_string(),
        }
    }

    fn executor(stub: &Arc<Stub>) -> Executor {
        Executor::new(stub.clone(), "http://api.test/")
    }

    #[tokio::test]
    async fn test_success_requires_status_and_flag() {
        let stub = Arc::new(Stub::new(200, r#"{"success":true,"id":"x-1"}"#));
        let out = executor(&stub)
            .execute(&Context::background(), echo("alpha"))
            .await
            .unwrap();
        assert_eq!(out, ("x-1".to_string(), "alpha".to_string()));
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_request_shape() {
        let stub = Arc::new(Stub::new(200, r#"{"success":true,"id":"x-1"}"#));
        executor(&stub)
            .execute(&Context::background(), echo("alpha"))
            .await
            .unwrap();

        let requests = stub.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri().to_string(), "http://api.test/v1/test/echo");
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(request.headers()[ACCEPT], "application/json");
    }

    #[tokio::test]
    async fn test_request_body_is_json() {
        let stub = Arc::new(Stub::new(200, r#"{"success":true,"id":"x-1"}"#));
        executor(&stub)
            .execute(&Context::background(), echo("alpha"))
            .await
            .unwrap();

        let request = stub.requests.lock().unwrap().pop().unwrap();
        let bytes = request.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, serde_json::json!({"name": "alpha"}));
    }

    #[tokio::test]
    async fn test_validation_failure_skips_transport() {
        let stub = Arc::new(Stub::new(200, r#"{"success":true,"id":"x-1"}"#));
        let err = executor(&stub)
            .execute(&Context::background(), echo(""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputRequired);
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_encode_failure() {
        let stub = Arc::new(Stub::new(200, r#"{"success":true}"#));
        let err = executor(&stub)
            .execute(&Context::background(), Unencodable)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestEncodeFailed);
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_build_failure() {
        let stub = Arc::new(Stub::new(200, r#"{"success":true,"id":"x-1"}"#));
        let executor = Executor::new(stub.clone(), "not a url");
        let err = executor
            .execute(&Context::background(), echo("alpha"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestBuildFailed);
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_http_error_with_failure_envelope() {
        let stub = Arc::new(Stub::new(
            500,
            r#"{"success":false,"error":"boom","reasonCode":"node::nodenotfound"}"#,
        ));
        let err = executor(&stub)
            .execute(&Context::background(), echo("alpha"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "boom");
        assert_eq!(err.reason_code(), Some("node::nodenotfound"));
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_http_error_with_success_flag_is_failure() {
        let stub = Arc::new(Stub::new(
            409,
            r#"{"success":true,"id":"x-1","reasonCode":"node::devidexists","error":"taken"}"#,
        ));
        let err = executor(&stub)
            .execute(&Context::background(), echo("alpha"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.message(), "taken");
    }

    #[tokio::test]
    async fn test_ok_status_with_failure_flag_is_failure() {
        let stub = Arc::new(Stub::new(200, r#"{"success":false,"reasonCode":"zz::unmapped"}"#));
        let err = executor(&stub)
            .execute(&Context::background(), echo("alpha"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.message(), "echo failed with status 200");
        assert_eq!(err.reason_code(), Some("zz::unmapped"));
    }

    #[tokio::test]
    async fn test_failure_payload_is_ignored() {
        // payload fields have the wrong type, but they must not be read
        let stub = Arc::new(Stub::new(
            200,
            r#"{"success":false,"error":"nope","reasonCode":"vs::keynotfound","id":0}"#,
        ));
        let err = executor(&stub)
            .execute(&Context::background(), echo("alpha"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_unauthorized_status_without_reason_code() {
        let stub = Arc::new(Stub::new(401, r#"{"success":false,"error":"invalid api key"}"#));
        let err = executor(&stub)
            .execute(&Context::background(), echo("alpha"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn test_non_json_body_is_decode_failure() {
        let stub = Arc::new(Stub::new(502, "<html>bad gateway</html>"));
        let err = executor(&stub)
            .execute(&Context::background(), echo("alpha"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseDecodeFailed);
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn test_bad_success_payload_is_decode_failure() {
        let stub = Arc::new(Stub::new(200, r#"{"success":true}"#));
        let err = executor(&stub)
            .execute(&Context::background(), echo("alpha"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseDecodeFailed);
    }

    #[tokio::test]
    async fn test_cancelled_context_sends_nothing() {
        let stub = Arc::new(Stub::new(200, r#"{"success":true,"id":"x-1"}"#));
        let ctx = Context::background();
        ctx.cancel();

        let err = executor(&stub).execute(&ctx, echo("alpha")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailed);
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_validation_runs_before_cancellation_check() {
        let stub = Arc::new(Stub::new(200, r#"{"success":true,"id":"x-1"}"#));
        let ctx = Context::background();
        ctx.cancel();

        let err = executor(&stub).execute(&ctx, echo("")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputRequired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_waiting_transmit() {
        let mut stub = Stub::new(200, r#"{"success":true,"id":"x-1"}"#);
        stub.hang = true;
        let stub = Arc::new(stub);

        let ctx = Context::with_timeout(Duration::from_millis(50));
        let err = executor(&stub).execute(&ctx, echo("alpha")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailed);
        assert!(err.message().contains("deadline"));
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_after_response_keeps_result() {
        let ctx = Context::background();
        let mut stub = Stub::new(200, r#"{"success":true,"id":"x-1"}"#);
        stub.cancel_on_send = Some(ctx.clone());
        let stub = Arc::new(stub);

        let out = executor(&stub).execute(&ctx, echo("alpha")).await.unwrap();
        assert_eq!(out.0, "x-1");
        assert!(ctx.is_done());
    }

    #[tokio::test]
    async fn test_custom_registry() {
        let stub = Arc::new(Stub::new(
            400,
            r#"{"success":false,"error":"slow down","reasonCode":"logs::quotaexceeded"}"#,
        ));
        let registry = Arc::new(
            ReasonCodeRegistry::empty().with("logs::quotaexceeded", ErrorKind::ResourceLimitExceeded),
        );
        let executor = Executor::with_registry(stub.clone(), "http://api.test", registry);
        let err = executor
            .execute(&Context::background(), echo("alpha"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceLimitExceeded);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let stub = Arc::new(Stub::new(200, "{}"));
        assert_eq!(executor(&stub).base_url(), "http://api.test");
    }
}
