use std::fmt;

use chrono::Utc;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, Request};
use serde::{Deserialize, Serialize};
use sheetpull_error::{PullError, Result, ResultExt};
use tracing::debug;
use url::Url;

use super::credentials::AwsCredentials;
use super::signer::AwsRequestAuthorizer;
use crate::client::{HttpClient, HttpResponse, read_body, read_json_response, set_json_body};

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const GET_SECRET_VALUE_TARGET: &str = "secretsmanager.GetSecretValue";

/// Plaintext secret value.
///
/// Debug output never includes the value.
pub struct SecretString(String);

impl SecretString {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString(<{} bytes>)", self.0.len())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueRequest<'a> {
    secret_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResponse {
    name: Option<String>,
    secret_string: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AwsErrorResponse {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

impl AwsErrorResponse {
    /// Error code without the optional namespace prefix.
    fn code(&self) -> &str {
        let ty = self.error_type.as_deref().unwrap_or_default();
        ty.rsplit('#').next().unwrap_or(ty)
    }
}

#[derive(Debug, Clone)]
pub struct SecretsManagerClient<C: HttpClient> {
    client: C,
    credentials: AwsCredentials,
    region: String,
    endpoint: Url,
}

impl<C> SecretsManagerClient<C>
where
    C: HttpClient,
{
    /// Create a client for the regional endpoint.
    pub fn try_new(client: C, credentials: AwsCredentials, region: impl Into<String>) -> Result<Self> {
        let region = region.into();
        let endpoint = Url::parse(&format!("https://secretsmanager.{region}.amazonaws.com/"))
            .map_err(|_| PullError::Config(format!("Invalid secrets manager region '{region}'")))?;
        Ok(SecretsManagerClient {
            client,
            credentials,
            region,
            endpoint,
        })
    }

    /// Send requests to a custom endpoint instead of the regional one.
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Get the string payload of a secret.
    pub async fn get_secret_string(&self, secret_id: &str) -> Result<SecretString> {
        let mut request = Request::new(Method::POST, self.endpoint.clone());
        set_json_body(&mut request, AMZ_JSON, &GetSecretValueRequest { secret_id })?;
        request.headers_mut().insert(
            HeaderName::from_static("x-amz-target"),
            HeaderValue::from_static(GET_SECRET_VALUE_TARGET),
        );

        let request = AwsRequestAuthorizer {
            date: Utc::now(),
            credentials: &self.credentials,
            region: &self.region,
            service: "secretsmanager",
        }
        .authorize(request)?;

        debug!(region = %self.region, "requesting secret value");
        let resp = self.client.do_request(request).await?;
        let status = resp.status();

        if !status.is_success() {
            let body = read_body(resp).await?;
            let err: AwsErrorResponse = serde_json::from_slice(&body).unwrap_or(AwsErrorResponse {
                error_type: None,
                message: Some(String::from_utf8_lossy(&body).into_owned()),
            });
            let message = err.message.clone().unwrap_or_default();

            return Err(match err.code() {
                "ResourceNotFoundException" => PullError::CredentialNotFound {
                    secret_id: secret_id.to_string(),
                    region: self.region.clone(),
                },
                "AccessDeniedException" => PullError::PermissionDenied(format!(
                    "Not allowed to read secret '{secret_id}': {message}"
                )),
                "UnrecognizedClientException" | "InvalidSignatureException" => {
                    PullError::AuthenticationError(format!(
                        "AWS rejected the request credentials: {message}"
                    ))
                }
                code => PullError::http(format!(
                    "GetSecretValue failed with status {status} ({code}): {message}"
                )),
            });
        }

        let resp: GetSecretValueResponse = read_json_response(resp)
            .await
            .http_context("Failed to read GetSecretValue response")?;

        match resp.secret_string {
            Some(s) => Ok(SecretString(s)),
            // Binary-only secrets can't hold a json credential.
            None => {
                debug!(name = ?resp.name, "secret has no string payload");
                Err(PullError::CredentialNotFound {
                    secret_id: secret_id.to_string(),
                    region: self.region.clone(),
                })
            }
        }
    }
}
