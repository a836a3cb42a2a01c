use std::fmt;
use std::str::FromStr;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, Request, StatusCode};
use serde::Deserialize;
use sheetpull_error::{PullError, Result, ResultExt};
use tracing::debug;
use url::Url;

use super::credentials::AccessToken;
use crate::client::{HttpClient, HttpResponse, read_body, read_json_response};

pub const SHEETS_API_ENDPOINT: &str = "https://sheets.googleapis.com/";

/// Read access to drive files and spreadsheets.
pub const SHEETS_READ_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive.readonly",
    "https://www.googleapis.com/auth/spreadsheets.readonly",
];

/// How cell values are rendered by the api.
///
/// <https://developers.google.com/sheets/api/reference/rest/v4/ValueRenderOption>
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueRenderOption {
    #[default]
    FormattedValue,
    UnformattedValue,
    Formula,
}

impl ValueRenderOption {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FormattedValue => "FORMATTED_VALUE",
            Self::UnformattedValue => "UNFORMATTED_VALUE",
            Self::Formula => "FORMULA",
        }
    }
}

impl fmt::Display for ValueRenderOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueRenderOption {
    type Err = PullError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FORMATTED_VALUE" => Ok(Self::FormattedValue),
            "UNFORMATTED_VALUE" => Ok(Self::UnformattedValue),
            "FORMULA" => Ok(Self::Formula),
            other => Err(PullError::Config(format!(
                "Unknown value render option '{other}'"
            ))),
        }
    }
}

/// Response of `spreadsheets.values.get`.
///
/// Trailing empty rows and trailing empty cells within a row are omitted by
/// the api, so rows may have different lengths. `values` is absent when the
/// range holds no data.
///
/// <https://developers.google.com/sheets/api/reference/rest/v4/spreadsheets.values#ValueRange>
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    pub range: Option<String>,
    pub major_dimension: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SheetsClient<C: HttpClient> {
    client: C,
    endpoint: Url,
}

impl<C> SheetsClient<C>
where
    C: HttpClient,
{
    pub fn new(client: C) -> Self {
        SheetsClient {
            client,
            // Constant, always parses.
            endpoint: Url::parse(SHEETS_API_ENDPOINT).expect("valid sheets endpoint"),
        }
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn values_url(
        &self,
        spreadsheet_id: &str,
        range: &str,
        render: ValueRenderOption,
    ) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| PullError::Config(format!("Invalid sheets endpoint '{}'", self.endpoint)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range]);
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", render.as_str());
        Ok(url)
    }

    /// Get the values for a range, e.g. "Sheet1" or "Sheet1!A1:D100".
    pub async fn get_values(
        &self,
        token: &AccessToken,
        spreadsheet_id: &str,
        range: &str,
        render: ValueRenderOption,
    ) -> Result<ValueRange> {
        let url = self.values_url(spreadsheet_id, range, render)?;
        let mut request = Request::new(Method::GET, url);
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.access_token))
            .context("Access token is not a valid header value")?;
        auth.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, auth);

        debug!(%spreadsheet_id, %range, "getting sheet values");
        let resp = self.client.do_request(request).await?;
        let status = resp.status();

        if !status.is_success() {
            let body = read_body(resp).await?;
            let message = match serde_json::from_slice::<GoogleErrorResponse>(&body) {
                Ok(resp) => {
                    let status = resp.error.status.unwrap_or_default();
                    let message = resp.error.message.unwrap_or_default();
                    format!("{status} {message}").trim().to_string()
                }
                Err(_) => String::from_utf8_lossy(&body).into_owned(),
            };

            return Err(match status {
                StatusCode::BAD_REQUEST => PullError::RangeNotFound {
                    range: range.to_string(),
                    msg: message,
                },
                StatusCode::UNAUTHORIZED => PullError::AuthenticationError(message),
                StatusCode::FORBIDDEN => PullError::PermissionDenied(format!(
                    "Spreadsheet '{spreadsheet_id}': {message}"
                )),
                StatusCode::NOT_FOUND => PullError::SheetNotFound(spreadsheet_id.to_string()),
                status => PullError::http(format!(
                    "Sheets api returned {status} for '{spreadsheet_id}': {message}"
                )),
            });
        }

        read_json_response(resp)
            .await
            .http_context("Failed to read sheet values response")
    }
}
