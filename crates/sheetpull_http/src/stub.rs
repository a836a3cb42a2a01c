//! Scripted in-memory http client.
//!
//! Requests are matched against registered routes in order. Every request is
//! recorded so tests can inspect what was sent.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::{Ready, ready};
use futures::stream::{self, Once};
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::{Method, Request, StatusCode};
use sheetpull_error::{PullError, Result};
use url::Url;

use crate::client::{HttpClient, HttpResponse};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
struct Route {
    method: Method,
    host: String,
    path_prefix: String,
    status: StatusCode,
    body: Bytes,
}

#[derive(Debug, Default)]
struct StubState {
    routes: Vec<Route>,
    requests: Vec<RecordedRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct StubHttpClient {
    state: Arc<Mutex<StubState>>,
}

impl StubHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to requests with `method` to `host` whose path starts with
    /// `path_prefix`.
    pub fn route(
        &self,
        method: Method,
        host: impl Into<String>,
        path_prefix: impl Into<String>,
        status: StatusCode,
        body: impl Into<Bytes>,
    ) -> &Self {
        self.state.lock().routes.push(Route {
            method,
            host: host.into(),
            path_prefix: path_prefix.into(),
            status,
            body: body.into(),
        });
        self
    }

    /// All requests made so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Requests made to a host.
    pub fn requests_to(&self, host: &str) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.url.host_str() == Some(host))
            .cloned()
            .collect()
    }
}

impl HttpClient for StubHttpClient {
    type Response = StubResponse;
    type RequestFuture = Ready<Result<StubResponse>>;

    fn do_request(&self, request: Request) -> Self::RequestFuture {
        let body = request
            .body()
            .and_then(|b| b.as_bytes())
            .map(Bytes::copy_from_slice)
            .unwrap_or_default();

        let mut state = self.state.lock();
        state.requests.push(RecordedRequest {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: request.headers().clone(),
            body,
        });

        let host = request.url().host_str().unwrap_or_default();
        let path = request.url().path();
        let route = state.routes.iter().find(|r| {
            r.method == request.method() && r.host == host && path.starts_with(&r.path_prefix)
        });

        ready(match route {
            Some(route) => Ok(StubResponse::new(route.status, route.body.clone())),
            None => Err(PullError::http(format!(
                "No stub route for {} {}",
                request.method(),
                request.url()
            ))),
        })
    }
}

#[derive(Debug)]
pub struct StubResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl StubResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        StubResponse {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

impl HttpResponse for StubResponse {
    type BytesStream = Once<Ready<Result<Bytes>>>;

    fn status(&self) -> StatusCode {
        self.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn into_bytes_stream(self) -> Self::BytesStream {
        stream::once(ready(Ok(self.body)))
    }
}
