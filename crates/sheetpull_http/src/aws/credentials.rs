use std::fmt;
use std::path::Path;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use reqwest::{Method, Request};
use serde::Deserialize;
use sheetpull_error::{PullError, Result, ResultExt};
use tracing::debug;
use url::Url;

use super::profile;
use crate::client::{HttpClient, HttpResponse, read_body, read_error_text, read_json_response};

/// Host for the container credentials endpoint used with a relative uri.
const CONTAINER_CREDENTIALS_HOST: &str = "http://169.254.170.2";

const IMDS_ENDPOINT: &str = "http://169.254.169.254";
const IMDS_TOKEN_PATH: &str = "/latest/api/token";
const IMDS_ROLE_PATH: &str = "/latest/meta-data/iam/security-credentials/";
const IMDS_TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const IMDS_TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
const IMDS_TOKEN_TTL_SECONDS: &str = "21600";
/// Instance metadata is link local, off ec2 requests only ever time out.
const IMDS_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub key_id: String,
    pub secret: String,
    /// Present for temporary credentials (assumed roles, job runtimes).
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("key_id", &self.key_id)
            .field("secret", &"<secret>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<secret>"),
            )
            .finish()
    }
}

/// Credentials document served by the container endpoint and by instance
/// metadata.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoleCredentials {
    /// Only set by instance metadata, "Success" when usable.
    code: Option<String>,
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
}

impl From<RoleCredentials> for AwsCredentials {
    fn from(creds: RoleCredentials) -> Self {
        AwsCredentials {
            key_id: creds.access_key_id,
            secret: creds.secret_access_key,
            session_token: creds.token,
        }
    }
}

impl AwsCredentials {
    /// Static credentials from the standard environment variables.
    fn from_vars(get: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let key_id = get("AWS_ACCESS_KEY_ID").filter(|v| !v.is_empty())?;
        let secret = get("AWS_SECRET_ACCESS_KEY").filter(|v| !v.is_empty())?;
        let session_token = get("AWS_SESSION_TOKEN").filter(|v| !v.is_empty());

        Some(AwsCredentials {
            key_id,
            secret,
            session_token,
        })
    }

    /// Resolve credentials through the default provider chain.
    ///
    /// In order: environment variables, the shared credentials and config
    /// files, the container credentials endpoint, then ec2 instance metadata.
    pub async fn resolve<C>(client: &C) -> Result<Self>
    where
        C: HttpClient,
    {
        Self::resolve_with(
            client,
            |key| std::env::var(key).ok(),
            home::home_dir().as_deref(),
        )
        .await
    }

    async fn resolve_with<C>(
        client: &C,
        get: impl Fn(&str) -> Option<String>,
        home: Option<&Path>,
    ) -> Result<Self>
    where
        C: HttpClient,
    {
        if let Some(creds) = Self::from_vars(&get) {
            debug!("using aws credentials from environment");
            return Ok(creds);
        }

        if let Some(creds) = profile::from_shared_files(&get, home)? {
            return Ok(creds);
        }

        if let Some((url, token)) = container_endpoint(&get)? {
            debug!(%url, "fetching aws credentials from container endpoint");
            return Self::fetch_from_container(client, url, token).await;
        }

        let imds_disabled = get("AWS_EC2_METADATA_DISABLED")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        if !imds_disabled {
            let endpoint = imds_endpoint(&get)?;
            debug!(%endpoint, "fetching aws credentials from instance metadata");
            match Self::fetch_from_imds(client, &endpoint).await {
                Ok(creds) => return Ok(creds),
                Err(e) => debug!(%e, "instance metadata credentials unavailable"),
            }
        }

        Err(PullError::Config(
            "No AWS credentials found. Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY, configure a profile, or run with a container or instance role".to_string(),
        ))
    }

    async fn fetch_from_container<C>(client: &C, url: Url, token: Option<String>) -> Result<Self>
    where
        C: HttpClient,
    {
        let mut request = Request::new(Method::GET, url);
        if let Some(token) = token {
            let val = HeaderValue::from_str(&token)
                .context("Container authorization token is not a valid header value")?;
            request.headers_mut().insert(AUTHORIZATION, val);
        }

        let resp = client.do_request(request).await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = read_error_text(resp).await;
            return Err(PullError::http(format!(
                "Container credentials endpoint returned {status}: {text}"
            )));
        }

        let creds: RoleCredentials = read_json_response(resp).await?;
        Ok(creds.into())
    }

    /// Fetch instance role credentials using an IMDSv2 session token.
    async fn fetch_from_imds<C>(client: &C, endpoint: &Url) -> Result<Self>
    where
        C: HttpClient,
    {
        let mut request = Request::new(Method::PUT, imds_url(endpoint, IMDS_TOKEN_PATH)?);
        request.headers_mut().insert(
            HeaderName::from_static(IMDS_TOKEN_TTL_HEADER),
            HeaderValue::from_static(IMDS_TOKEN_TTL_SECONDS),
        );
        let token = imds_text(client, request).await?;
        let mut token = HeaderValue::from_str(token.trim())
            .context("Instance metadata token is not a valid header value")?;
        token.set_sensitive(true);

        let mut request = Request::new(Method::GET, imds_url(endpoint, IMDS_ROLE_PATH)?);
        request
            .headers_mut()
            .insert(HeaderName::from_static(IMDS_TOKEN_HEADER), token.clone());
        let roles = imds_text(client, request).await?;
        let role = roles
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| PullError::http("Instance has no role attached"))?;

        let mut request = Request::new(
            Method::GET,
            imds_url(endpoint, &format!("{IMDS_ROLE_PATH}{role}"))?,
        );
        request
            .headers_mut()
            .insert(HeaderName::from_static(IMDS_TOKEN_HEADER), token);
        *request.timeout_mut() = Some(IMDS_TIMEOUT);

        let resp = client.do_request(request).await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = read_error_text(resp).await;
            return Err(PullError::http(format!(
                "Instance metadata returned {status} for role '{role}': {text}"
            )));
        }
        let creds: RoleCredentials = read_json_response(resp).await?;
        if let Some(code) = creds.code.as_deref().filter(|c| *c != "Success") {
            return Err(PullError::http(format!(
                "Instance metadata credentials for role '{role}' not available: {code}"
            )));
        }

        debug!(%role, "using aws credentials from instance role");
        Ok(creds.into())
    }
}

/// Send an instance metadata request and read the text body.
async fn imds_text<C>(client: &C, mut request: Request) -> Result<String>
where
    C: HttpClient,
{
    *request.timeout_mut() = Some(IMDS_TIMEOUT);
    let path = request.url().path().to_string();

    let resp = client.do_request(request).await?;
    let status = resp.status();
    if !status.is_success() {
        let text = read_error_text(resp).await;
        return Err(PullError::http(format!(
            "Instance metadata returned {status} for '{path}': {text}"
        )));
    }

    let body = read_body(resp).await?;
    String::from_utf8(body.to_vec()).http_context("Instance metadata response is not utf8")
}

fn imds_url(endpoint: &Url, path: &str) -> Result<Url> {
    endpoint
        .join(path)
        .context_fn(|| format!("Failed to build instance metadata url for '{path}'"))
}

fn imds_endpoint(get: impl Fn(&str) -> Option<String>) -> Result<Url> {
    let endpoint = get("AWS_EC2_METADATA_SERVICE_ENDPOINT")
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| IMDS_ENDPOINT.to_string());
    Url::parse(&endpoint).map_err(|e| {
        PullError::Config(format!(
            "Invalid instance metadata endpoint '{endpoint}': {e}"
        ))
    })
}

fn container_endpoint(get: impl Fn(&str) -> Option<String>) -> Result<Option<(Url, Option<String>)>> {
    let token = get("AWS_CONTAINER_AUTHORIZATION_TOKEN");

    if let Some(relative) = get("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI") {
        let url = Url::parse(&format!("{CONTAINER_CREDENTIALS_HOST}{relative}"))
            .context("Failed to parse container credentials relative uri")?;
        return Ok(Some((url, token)));
    }

    if let Some(full) = get("AWS_CONTAINER_CREDENTIALS_FULL_URI") {
        let url = Url::parse(&full).context("Failed to parse container credentials full uri")?;
        return Ok(Some((url, token)));
    }

    Ok(None)
}
