use std::fmt;

use base64::Engine;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Method, Request};
use ring::signature::RsaKeyPair;
use serde::{Deserialize, Serialize};
use sheetpull_error::{PullError, Result, ResultExt};
use tracing::debug;
use url::Url;

use crate::client::{HttpClient, HttpResponse, read_body, read_json_response, set_form_body};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Service account key as downloaded from the cloud console.
///
/// Only the fields needed for the jwt bearer flow are required.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    #[serde(rename = "type")]
    account_type: Option<String>,
    project_id: Option<String>,
    private_key_id: Option<String>,
    private_key: String,
    client_email: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("type", &self.account_type)
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<secret>")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Serialize)]
struct JwtHeader<'a> {
    alg: &'static str,
    typ: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
}

#[derive(Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<secret>")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

impl ServiceAccount {
    pub fn try_from_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| PullError::CredentialMalformed {
            msg: "Failed to deserialize json service account key".to_string(),
            source: Some(Box::new(e)),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Build the signed jwt assertion for the given scopes.
    pub fn signed_jwt(&self, scopes: &[&str], now: DateTime<Utc>) -> Result<String> {
        let scope = scopes.join(" ");
        let claims = JwtClaims {
            iss: &self.client_email,
            scope: &scope,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let header = JwtHeader {
            alg: "RS256",
            typ: "JWT",
            kid: self.private_key_id.as_deref(),
        };

        let header_b64 = BASE64_URL_SAFE_NO_PAD
            .encode(serde_json::to_string(&header).context("Failed to encode jwt header")?);
        let claims_b64 = BASE64_URL_SAFE_NO_PAD
            .encode(serde_json::to_string(&claims).context("Failed to encode jwt claims")?);
        let signing_input = format!("{header_b64}.{claims_b64}");

        let key_pair = self.key_pair()?;

        // Sign with PKCS#1 v1.5 SHA-256 (RS256)
        let mut signature = vec![0; key_pair.public().modulus_len()];
        key_pair
            .sign(
                &ring::signature::RSA_PKCS1_SHA256,
                &ring::rand::SystemRandom::new(),
                signing_input.as_bytes(),
                &mut signature,
            )
            .map_err(|_| PullError::internal("Failed to sign jwt"))?;

        let sig_b64 = BASE64_URL_SAFE_NO_PAD.encode(&signature);
        Ok(format!("{signing_input}.{sig_b64}"))
    }

    fn key_pair(&self) -> Result<RsaKeyPair> {
        let mut reader = std::io::Cursor::new(self.private_key.as_bytes());
        loop {
            let item = rustls_pemfile::read_one(&mut reader).map_err(|e| {
                PullError::CredentialMalformed {
                    msg: "Invalid PEM private key".to_string(),
                    source: Some(Box::new(e)),
                }
            })?;

            match item {
                Some(rustls_pemfile::Item::Pkcs8Key(der)) => {
                    return RsaKeyPair::from_pkcs8(der.secret_pkcs8_der()).map_err(|_| {
                        PullError::credential_malformed(
                            "Failed to create rsa key pair from pkcs8 key",
                        )
                    });
                }
                Some(rustls_pemfile::Item::Pkcs1Key(der)) => {
                    return RsaKeyPair::from_der(der.secret_pkcs1_der()).map_err(|_| {
                        PullError::credential_malformed(
                            "Failed to create rsa key pair from pkcs1 key",
                        )
                    });
                }
                Some(_) => continue,
                None => {
                    return Err(PullError::credential_malformed(
                        "Service account key has no RSA private key",
                    ));
                }
            }
        }
    }

    /// Fetch an access token using this service account.
    ///
    /// A rejection by the token endpoint is an authentication error.
    pub async fn fetch_access_token<C>(&self, client: &C, scopes: &[&str]) -> Result<AccessToken>
    where
        C: HttpClient,
    {
        let jwt = self.signed_jwt(scopes, Utc::now())?;

        // Exchange the JWT for an access token
        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];
        let url = Url::parse(&self.token_uri).map_err(|e| PullError::CredentialMalformed {
            msg: format!("Invalid token_uri '{}'", self.token_uri),
            source: Some(Box::new(e)),
        })?;
        let mut request = Request::new(Method::POST, url);
        set_form_body(&mut request, &params)?;

        debug!(client_email = %self.client_email, "exchanging jwt for access token");
        let resp = client.do_request(request).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = read_body(resp).await?;
            let msg = match serde_json::from_slice::<TokenErrorResponse>(&body) {
                Ok(TokenErrorResponse {
                    error: Some(error),
                    error_description,
                }) => match error_description {
                    Some(desc) => format!("{error}: {desc}"),
                    None => error,
                },
                _ => String::from_utf8_lossy(&body).into_owned(),
            };
            return Err(PullError::AuthenticationError(format!(
                "Token endpoint rejected service account '{}' ({status}): {msg}",
                self.client_email
            )));
        }

        read_json_response(resp).await
    }
}
