use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Request;
use reqwest::header::{AUTHORIZATION, HOST, HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};
use sheetpull_error::{PullError, Result, ResultExt};
use url::Url;

use super::credentials::AwsCredentials;
use crate::hex;

const SIGN_ALG: &str = "AWS4-HMAC-SHA256";

type HmacSha256 = Hmac<Sha256>;

/// URI encoding set following aws rules.
///
/// See <https://docs.aws.amazon.com/IAM/latest/UserGuide/create-signed-request.html>
pub const AWS_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug)]
pub struct AwsRequestAuthorizer<'a> {
    pub date: DateTime<Utc>,
    pub credentials: &'a AwsCredentials,
    pub region: &'a str,
    /// Signing name of the service, e.g. "s3" or "secretsmanager".
    pub service: &'a str,
}

impl AwsRequestAuthorizer<'_> {
    /// Authorizes a request with a set of credentials.
    ///
    /// The request url path must already be encoded with [`AWS_ENCODE_SET`]
    /// per segment. Only buffered bodies can be signed.
    ///
    /// See <https://docs.aws.amazon.com/IAM/latest/UserGuide/create-signed-request.html>
    pub fn authorize(&self, mut request: Request) -> Result<Request> {
        let payload_hash = {
            let mut hasher = Sha256::new();
            match request.body() {
                Some(body) => match body.as_bytes() {
                    Some(bs) => hasher.update(bs),
                    None => return Err(PullError::internal("Cannot sign a streaming body")),
                },
                None => hasher.update(b""),
            }
            hex::encode(hasher.finalize())
        };

        // Manually add host header here to ensure it's included as a signed header.
        let host = host_header_value(request.url())?;
        request.headers_mut().insert(HOST, host);

        let amz_date = self.date.format("%Y%m%dT%H%M%SZ").to_string();
        request.headers_mut().insert(
            HeaderName::from_static("x-amz-content-sha256"),
            HeaderValue::from_str(&payload_hash).context("Invalid payload hash header")?,
        );
        request.headers_mut().insert(
            HeaderName::from_static("x-amz-date"),
            HeaderValue::from_str(&amz_date).context("Invalid date header")?,
        );
        if let Some(token) = &self.credentials.session_token {
            request.headers_mut().insert(
                HeaderName::from_static("x-amz-security-token"),
                HeaderValue::from_str(token).context("Session token is not a valid header value")?,
            );
        }

        let (canonical_headers, signed_headers) = canonical_headers(request.headers())?;

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            request.method(),
            request.url().path(),
            canonical_query_string(request.url()),
            canonical_headers,
            signed_headers,
            payload_hash,
        );

        let request_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));

        let scope = self.credential_scope();
        let string_to_sign = format!("{SIGN_ALG}\n{amz_date}\n{scope}\n{request_hash}");

        let sig = self.compute_signature(&string_to_sign)?;

        let auth_val = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            SIGN_ALG, self.credentials.key_id, scope, signed_headers, sig,
        );
        request.headers_mut().insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_val).context("Invalid authorization header")?,
        );

        Ok(request)
    }

    fn compute_signature(&self, string_to_sign: &str) -> Result<String> {
        // DateKey = HMAC-SHA256("AWS4"+"<SecretAccessKey>", "<YYYYMMDD>")
        // DateRegionKey = HMAC-SHA256(<DateKey>, "<aws-region>")
        // DateRegionServiceKey = HMAC-SHA256(<DateRegionKey>, "<aws-service>")
        // SigningKey = HMAC-SHA256(<DateRegionServiceKey>, "aws4_request")
        //
        // Each step keys a fresh hmac with the previous output.
        let date_key = hmac(
            format!("AWS4{}", self.credentials.secret).as_bytes(),
            self.date.format("%Y%m%d").to_string().as_bytes(),
        )?;
        let region_key = hmac(&date_key, self.region.as_bytes())?;
        let service_key = hmac(&region_key, self.service.as_bytes())?;
        let signing_key = hmac(&service_key, b"aws4_request")?;
        let sig = hmac(&signing_key, string_to_sign.as_bytes())?;

        Ok(hex::encode(sig))
    }

    fn credential_scope(&self) -> String {
        format!(
            "{}/{}/{}/aws4_request",
            self.date.format("%Y%m%d"),
            self.region,
            self.service,
        )
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mac = HmacSha256::new_from_slice(key)
        .context("Failed to create hmac")?
        .chain_update(data)
        .finalize();
    Ok(mac.into_bytes().to_vec())
}

fn host_header_value(url: &Url) -> Result<HeaderValue> {
    let host = url
        .host_str()
        .ok_or_else(|| PullError::internal(format!("Url '{url}' has no host")))?;
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    HeaderValue::from_str(&host).context("Invalid host header")
}

fn canonical_query_string(url: &Url) -> String {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            (
                utf8_percent_encode(&k, AWS_ENCODE_SET).to_string(),
                utf8_percent_encode(&v, AWS_ENCODE_SET).to_string(),
            )
        })
        .collect();
    // Sorted by encoded key.
    params.sort();

    let mut buf = String::with_capacity(url.query().map(|q| q.len()).unwrap_or(0));
    for (idx, (key, val)) in params.into_iter().enumerate() {
        if idx > 0 {
            buf.push('&');
        }
        buf.push_str(&key);
        buf.push('=');
        buf.push_str(&val);
    }

    buf
}

fn canonical_headers(header_map: &HeaderMap) -> Result<(String, String)> {
    let mut headers: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (key, val) in header_map {
        let val = val
            .to_str()
            .context_fn(|| format!("Header '{key}' is not valid ascii"))?;
        headers.entry(key.as_str()).or_default().push(val);
    }

    let mut header_buf = String::new();
    let mut signed_buf = String::new();

    for (idx, (key, vals)) in headers.into_iter().enumerate() {
        if idx > 0 {
            signed_buf.push(';');
        }

        header_buf.push_str(key);
        header_buf.push(':');
        signed_buf.push_str(key);

        for (val_idx, val) in vals.into_iter().enumerate() {
            if val_idx > 0 {
                header_buf.push(',');
            }
            header_buf.push_str(val.trim());
        }
        header_buf.push('\n');
    }

    Ok((header_buf, signed_buf))
}
