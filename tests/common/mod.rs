//! Recording transport double shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context as TaskContext, Poll};

use anedya_sdk::transport::{BoxError, ResponseBody, Transport};
use anedya_sdk::Client;
use async_trait::async_trait;
use bytes::Bytes;
use http_body::{Body, Frame};
use http_body_util::{BodyExt, Full};
use hyper::header::HeaderMap;
use hyper::{Request, Response, StatusCode};

pub const BASE_URL: &str = "http://anedya.test";

/// What the stub does with the next request.
pub enum Reply {
    /// Respond with a status and a raw body
    Json(u16, String),
    /// Respond 200 with the request body plus `"success": true`
    Echo,
    /// Respond with a body that fails while being read
    BrokenBody(u16),
    /// Fail at the transport level
    Fail(&'static str),
    /// Never respond
    Hang,
}

/// A request as seen by the transport
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

#[derive(Default)]
pub struct StubTransport {
    replies: Mutex<VecDeque<Reply>>,
    recorded: Mutex<Vec<Recorded>>,
}

impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stub answering every request with `status` and `body`, once.
    pub fn replying(status: u16, body: &str) -> Arc<Self> {
        let stub = Self::new();
        stub.push(Reply::Json(status, body.to_string()));
        stub
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> usize {
        self.recorded.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.recorded
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request recorded")
    }
}

fn full_body(bytes: Bytes) -> ResponseBody {
    Full::new(bytes)
        .map_err(|never: Infallible| -> BoxError { match never {} })
        .boxed_unsync()
}

fn respond(status: u16, body: ResponseBody) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::from_u16(status).unwrap();
    response
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<Response<ResponseBody>, BoxError> {
        let (parts, body) = request.into_parts();
        let bytes = body.collect().await?.to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes)?;

        self.recorded.lock().unwrap().push(Recorded {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            headers: parts.headers,
            body: json.clone(),
        });

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Json(200, r#"{"success":true}"#.to_string()));

        match reply {
            Reply::Json(status, body) => Ok(respond(status, full_body(Bytes::from(body)))),
            Reply::Echo => {
                let mut echoed = json;
                echoed["success"] = serde_json::Value::Bool(true);
                let bytes = serde_json::to_vec(&echoed)?;
                Ok(respond(200, full_body(Bytes::from(bytes))))
            }
            Reply::BrokenBody(status) => Ok(respond(status, BrokenBody.boxed_unsync())),
            Reply::Fail(message) => Err(message.into()),
            Reply::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

/// Response body whose first frame is an error.
struct BrokenBody;

impl Body for BrokenBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut TaskContext<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(Some(Err("connection reset while reading body".into())))
    }
}

/// Client wired to `stub`.
pub fn client(stub: &Arc<StubTransport>) -> Client {
    Client::with_transport(stub.clone(), BASE_URL)
}
