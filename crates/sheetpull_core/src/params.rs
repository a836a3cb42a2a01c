use sheetpull_error::{PullError, Result, config_error};
use sheetpull_http::google::sheets::ValueRenderOption;
use url::Url;

use crate::format::delimited::DEFAULT_DELIMITER;
use crate::format::{OutputFormat, is_truthy};
use crate::persist::OutputTarget;

pub const DEFAULT_FOLDER: &str = "data";
pub const DEFAULT_FILENAME: &str = "filename";

/// Endpoint overrides, used for local stacks and non aws object stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    pub secrets: Option<Url>,
    pub sheets: Option<Url>,
    /// Object store endpoint, switches to path style addressing.
    pub s3: Option<Url>,
}

/// Parameters for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParameters {
    pub secret_name: String,
    pub secret_region: String,
    pub spreadsheet_id: String,
    /// Tab name or A1 range, e.g. "Sheet1" or "Sheet1!A1:D100".
    pub spreadsheet_tab: String,
    pub bucket: String,
    pub folder: String,
    pub filename: String,
    pub output_format: OutputFormat,
    /// Raw compression flag, see `is_truthy`.
    pub compression: String,
    pub value_render_option: ValueRenderOption,
    pub csv_delimiter: u8,
    /// Region of the bucket. Defaults to the secret region.
    pub s3_region: Option<String>,
    pub endpoints: Endpoints,
}

impl RunParameters {
    /// Parameters with defaults for everything but the required values.
    pub fn new(
        secret_name: impl Into<String>,
        secret_region: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        spreadsheet_tab: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        RunParameters {
            secret_name: secret_name.into(),
            secret_region: secret_region.into(),
            spreadsheet_id: spreadsheet_id.into(),
            spreadsheet_tab: spreadsheet_tab.into(),
            bucket: bucket.into(),
            folder: DEFAULT_FOLDER.to_string(),
            filename: DEFAULT_FILENAME.to_string(),
            output_format: OutputFormat::Csv,
            compression: "false".to_string(),
            value_render_option: ValueRenderOption::default(),
            csv_delimiter: DEFAULT_DELIMITER,
            s3_region: None,
            endpoints: Endpoints::default(),
        }
    }

    /// Check that required values are present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("google_secret_name", &self.secret_name),
            ("google_secret_region", &self.secret_region),
            ("google_spreadsheet_id", &self.spreadsheet_id),
            ("google_spreadsheet_tab", &self.spreadsheet_tab),
            ("bucket", &self.bucket),
            ("filename", &self.filename),
        ];
        for (name, val) in required {
            if val.trim().is_empty() {
                config_error!("Parameter '{name}' must not be empty");
            }
        }
        Ok(())
    }

    pub fn compression_enabled(&self) -> bool {
        is_truthy(&self.compression)
    }

    pub fn s3_region(&self) -> &str {
        self.s3_region.as_deref().unwrap_or(&self.secret_region)
    }

    pub fn output_target(&self) -> OutputTarget {
        OutputTarget {
            bucket: self.bucket.clone(),
            folder: self.folder.clone(),
            filename: self.filename.clone(),
            format: self.output_format,
            compression: self
                .output_format
                .compression_for(self.compression_enabled()),
            delimiter: self.csv_delimiter,
        }
    }
}

/// Parse a delimiter argument.
///
/// Accepts a single ascii character, or one of the escapes `\t` and `tab`.
pub fn parse_delimiter(s: &str) -> Result<u8> {
    match s {
        "\\t" | "tab" | "\t" => Ok(b'\t'),
        s if s.len() == 1 && s.is_ascii() && s != "\n" && s != "\r" && s != "\"" => {
            Ok(s.as_bytes()[0])
        }
        _ => Err(PullError::Config(format!(
            "Delimiter must be a single ascii character, got '{s}'"
        ))),
    }
}
