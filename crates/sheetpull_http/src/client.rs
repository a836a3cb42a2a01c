use std::fmt::Debug;

use bytes::{Bytes, BytesMut};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Request, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sheetpull_error::{PullError, Result, ResultExt};

pub trait HttpClient: Sync + Send + Debug + Clone + 'static {
    type Response: HttpResponse;
    type RequestFuture: Future<Output = Result<Self::Response>> + Send + Unpin;

    /// Do the request.
    fn do_request(&self, request: Request) -> Self::RequestFuture;
}

pub trait HttpResponse: Send {
    type BytesStream: Stream<Item = Result<Bytes>> + Send + Unpin;

    fn status(&self) -> StatusCode;
    fn headers(&self) -> &HeaderMap;

    /// Convert the response body into a byte stream.
    fn into_bytes_stream(self) -> Self::BytesStream;
}

/// Http client backed by reqwest.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(client: reqwest::Client) -> Self {
        ReqwestClient { client }
    }
}

impl HttpClient for ReqwestClient {
    type Response = ReqwestResponse;
    type RequestFuture = BoxFuture<'static, Result<Self::Response>>;

    fn do_request(&self, request: Request) -> Self::RequestFuture {
        self.client
            .execute(request)
            .map(|result| match result {
                Ok(resp) => Ok(ReqwestResponse(resp)),
                Err(e) => Err(PullError::http_with_source(
                    "Failed to make request",
                    Box::new(e),
                )),
            })
            .boxed()
    }
}

#[derive(Debug)]
pub struct ReqwestResponse(reqwest::Response);

impl HttpResponse for ReqwestResponse {
    type BytesStream = BoxStream<'static, Result<Bytes>>;

    fn status(&self) -> StatusCode {
        self.0.status()
    }

    fn headers(&self) -> &HeaderMap {
        self.0.headers()
    }

    fn into_bytes_stream(self) -> Self::BytesStream {
        self.0
            .bytes_stream()
            .map_err(|e| PullError::http_with_source("Failed to stream body", Box::new(e)))
            .boxed()
    }
}

/// Helper to set a json body on this request.
///
/// Overwrites the existing body and 'Content-Type' of the request.
pub fn set_json_body<T>(request: &mut Request, content_type: &'static str, body: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(body).context("Failed to serialize request body to json")?;
    *request.body_mut() = Some(body.into());
    request
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));

    Ok(())
}

/// Helper to set a form body on this request.
///
/// Overwrites the existing body and 'Content-Type' of the request.
pub fn set_form_body<T>(request: &mut Request, body: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let body = serde_urlencoded::to_string(body)
        .context("Failed to serialize request body to url encoded form")?;
    *request.body_mut() = Some(body.into());
    request.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );

    Ok(())
}

/// Collect the full response body.
pub async fn read_body<R>(response: R) -> Result<Bytes>
where
    R: HttpResponse,
{
    let mut stream = response.into_bytes_stream();
    let mut buf = BytesMut::new();
    while let Some(bs) = stream.try_next().await? {
        buf.extend_from_slice(bs.as_ref());
    }
    Ok(buf.freeze())
}

/// Helper to read a json response.
///
/// This will collect the full response before trying to deserialize it.
pub async fn read_json_response<T, R>(response: R) -> Result<T>
where
    T: DeserializeOwned,
    R: HttpResponse,
{
    let bytes = read_body(response).await?;
    serde_json::from_slice(&bytes).context("Failed to deserialize response body as json")
}

/// Read an error body as text for including in error messages.
///
/// Long bodies are cut off, some services return full html pages.
pub async fn read_error_text<R>(response: R) -> String
where
    R: HttpResponse,
{
    const MAX_LEN: usize = 512;

    match read_body(response).await {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            let text = text.trim();
            match text.char_indices().nth(MAX_LEN) {
                Some((idx, _)) => format!("{}...", &text[..idx]),
                None => text.to_string(),
            }
        }
        Err(e) => format!("<failed to read body: {e}>"),
    }
}
