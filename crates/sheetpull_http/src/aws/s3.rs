use std::fmt;

use bytes::Bytes;
use chrono::Utc;
use percent_encoding::utf8_percent_encode;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request};
use sheetpull_error::{PullError, Result};
use tracing::debug;
use url::Url;

use super::credentials::AwsCredentials;
use super::signer::{AWS_ENCODE_SET, AwsRequestAuthorizer};
use crate::client::{HttpClient, HttpResponse, read_error_text};

/// Bucket plus object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl S3Location {
    /// Key with each path segment encoded for signing.
    ///
    /// Errors on `.` and `..` segments, url parsing would collapse them and
    /// write to a different key.
    fn encoded_key(&self) -> Result<String> {
        let mut segments = Vec::new();
        for seg in self.key.split('/') {
            if seg == "." || seg == ".." {
                return Err(PullError::Config(format!(
                    "Object key '{}' must not contain '.' or '..' segments",
                    self.key
                )));
            }
            segments.push(utf8_percent_encode(seg, AWS_ENCODE_SET).to_string());
        }
        Ok(segments.join("/"))
    }
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone)]
pub struct S3Client<C: HttpClient> {
    client: C,
    credentials: AwsCredentials,
    region: String,
    /// Custom endpoint. Uses path style addressing when set.
    endpoint: Option<Url>,
}

/// Whether the bucket can be used as a virtual host under https.
///
/// Dots in the name split it across labels of the host, which the
/// `*.s3.{region}.amazonaws.com` wildcard certificate doesn't cover.
fn virtual_host_compatible(bucket: &str) -> bool {
    !bucket.contains('.')
}

impl<C> S3Client<C>
where
    C: HttpClient,
{
    pub fn new(client: C, credentials: AwsCredentials, region: impl Into<String>) -> Self {
        S3Client {
            client,
            credentials,
            region: region.into(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    fn object_url(&self, location: &S3Location) -> Result<Url> {
        let key = location.encoded_key()?;
        let url = match &self.endpoint {
            Some(endpoint) => {
                let base = endpoint.as_str().trim_end_matches('/');
                format!("{base}/{}/{key}", location.bucket)
            }
            None if virtual_host_compatible(&location.bucket) => format!(
                "https://{}.s3.{}.amazonaws.com/{key}",
                location.bucket, self.region
            ),
            None => format!(
                "https://s3.{}.amazonaws.com/{}/{key}",
                self.region, location.bucket
            ),
        };
        Url::parse(&url).map_err(|e| PullError::WriteError {
            path: location.to_string(),
            msg: format!("invalid object url: {e}"),
        })
    }

    /// Write an object in a single request.
    ///
    /// Either the full object is written or nothing is.
    pub async fn put_object(
        &self,
        location: &S3Location,
        content_type: &'static str,
        body: Bytes,
    ) -> Result<()> {
        let url = self.object_url(location)?;
        let len = body.len();

        let mut request = Request::new(Method::PUT, url);
        *request.body_mut() = Some(body.into());
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));

        let request = AwsRequestAuthorizer {
            date: Utc::now(),
            credentials: &self.credentials,
            region: &self.region,
            service: "s3",
        }
        .authorize(request)?;

        debug!(%location, bytes = len, "putting object");
        let resp = self
            .client
            .do_request(request)
            .await
            .map_err(|e| PullError::WriteError {
                path: location.to_string(),
                msg: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = read_error_text(resp).await;
            return Err(PullError::WriteError {
                path: location.to_string(),
                msg: format!("status {status}: {text}"),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use reqwest::header::AUTHORIZATION;
    use sheetpull_error::ErrorKind;

    use super::*;
    use crate::stub::StubHttpClient;

    fn creds() -> AwsCredentials {
        AwsCredentials {
            key_id: "AKID".to_string(),
            secret: "secret".to_string(),
            session_token: None,
        }
    }

    fn location(bucket: &str, key: &str) -> S3Location {
        S3Location {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    #[test]
    fn location_display() {
        let loc = location("bucket", "folder/sub/file.csv");
        assert_eq!("s3://bucket/folder/sub/file.csv", loc.to_string());
    }

    #[test]
    fn object_urls() {
        let loc = location("b", "data/my file.csv");

        let client = S3Client::new(StubHttpClient::new(), creds(), "eu-central-1");
        assert_eq!(
            "https://b.s3.eu-central-1.amazonaws.com/data/my%20file.csv",
            client.object_url(&loc).unwrap().as_str()
        );

        let client = client.with_endpoint(Url::parse("http://localhost:9000/").unwrap());
        assert_eq!(
            "http://localhost:9000/b/data/my%20file.csv",
            client.object_url(&loc).unwrap().as_str()
        );
    }

    #[test]
    fn dotted_bucket_uses_path_style() {
        let loc = location("my.data.bucket", "data/f.csv");

        let client = S3Client::new(StubHttpClient::new(), creds(), "us-west-2");
        assert_eq!(
            "https://s3.us-west-2.amazonaws.com/my.data.bucket/data/f.csv",
            client.object_url(&loc).unwrap().as_str()
        );

        let client = client.with_endpoint(Url::parse("http://localhost:9000").unwrap());
        assert_eq!(
            "http://localhost:9000/my.data.bucket/data/f.csv",
            client.object_url(&loc).unwrap().as_str()
        );
    }

    #[test]
    fn dot_segments_rejected() {
        let client = S3Client::new(StubHttpClient::new(), creds(), "us-east-1");
        for key in ["data/../f.csv", "./f.csv", "data/./sub/f.csv", "data/.."] {
            let err = client.object_url(&location("b", key)).unwrap_err();
            assert_eq!(ErrorKind::Config, err.kind(), "key: {key}");
        }

        // Dots inside a segment are fine.
        assert_eq!(
            "https://b.s3.us-east-1.amazonaws.com/data/..f.csv",
            client
                .object_url(&location("b", "data/..f.csv"))
                .unwrap()
                .as_str()
        );
    }

    #[tokio::test]
    async fn put_object_dotted_bucket() {
        let stub = StubHttpClient::new();
        stub.route(
            Method::PUT,
            "s3.eu-west-1.amazonaws.com",
            "/my.bucket/data/",
            StatusCode::OK,
            "",
        );
        let client = S3Client::new(stub.clone(), creds(), "eu-west-1");

        client
            .put_object(
                &location("my.bucket", "data/f.csv"),
                "text/csv",
                Bytes::from_static(b"a\n"),
            )
            .await
            .unwrap();

        let reqs = stub.requests();
        assert_eq!(1, reqs.len());
        assert_eq!("/my.bucket/data/f.csv", reqs[0].url.path());
    }

    #[tokio::test]
    async fn put_object_dot_segment_sends_nothing() {
        let stub = StubHttpClient::new();
        let client = S3Client::new(stub.clone(), creds(), "us-east-1");

        let err = client
            .put_object(&location("b", "data/../f.csv"), "text/csv", Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::Config, err.kind());
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn put_object_signed() {
        let stub = StubHttpClient::new();
        stub.route(
            Method::PUT,
            "b.s3.us-east-1.amazonaws.com",
            "/data/",
            StatusCode::OK,
            "",
        );
        let client = S3Client::new(stub.clone(), creds(), "us-east-1");

        let loc = location("b", "data/f.csv");
        client
            .put_object(&loc, "text/csv", Bytes::from_static(b"a\tb\n"))
            .await
            .unwrap();

        let reqs = stub.requests();
        assert_eq!(1, reqs.len());
        assert_eq!(Method::PUT, reqs[0].method);
        assert_eq!("text/csv", reqs[0].headers[CONTENT_TYPE]);
        assert!(
            reqs[0].headers[AUTHORIZATION]
                .to_str()
                .unwrap()
                .contains("/us-east-1/s3/aws4_request")
        );
        assert_eq!(b"a\tb\n".as_slice(), reqs[0].body.as_ref());
    }

    #[tokio::test]
    async fn rejected_put_is_write_error() {
        let stub = StubHttpClient::new();
        stub.route(
            Method::PUT,
            "b.s3.us-east-1.amazonaws.com",
            "/",
            StatusCode::FORBIDDEN,
            "<Error><Code>AccessDenied</Code></Error>",
        );
        let client = S3Client::new(stub, creds(), "us-east-1");

        let loc = location("b", "data/f.csv");
        let err = client
            .put_object(&loc, "text/csv", Bytes::new())
            .await
            .unwrap_err();

        assert_eq!(ErrorKind::WriteError, err.kind());
        assert!(err.to_string().contains("s3://b/data/f.csv"));
        assert!(err.to_string().contains("AccessDenied"));
    }

    #[tokio::test]
    async fn transport_failure_is_write_error() {
        // No routes, every request fails.
        let client = S3Client::new(StubHttpClient::new(), creds(), "us-east-1");
        let loc = location("b", "f.csv");
        let err = client
            .put_object(&loc, "text/csv", Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::WriteError, err.kind());
    }
}
