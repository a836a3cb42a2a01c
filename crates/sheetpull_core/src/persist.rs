use std::fmt;

use chrono::{DateTime, Utc};
use sheetpull_error::{Result, config_error};
use sheetpull_http::aws::s3::{S3Client, S3Location};
use sheetpull_http::client::HttpClient;
use tracing::info;

use crate::format::{Compression, EncodeOptions, OutputFormat, encode_table};
use crate::table::Table;

/// Timestamp suffix appended to the file name, second granularity.
pub const TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

/// Where and how a table gets written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub bucket: String,
    /// Key prefix, may contain nested segments.
    pub folder: String,
    /// File name stem, the timestamp and extensions are appended.
    pub filename: String,
    pub format: OutputFormat,
    pub compression: Option<Compression>,
    pub delimiter: u8,
}

impl OutputTarget {
    /// Object location for a write happening at `now`.
    ///
    /// `s3://{bucket}/{folder}/{filename}_{timestamp}.{ext}[.{codec}]`
    pub fn location(&self, now: DateTime<Utc>) -> Result<S3Location> {
        if self.bucket.is_empty() {
            config_error!("Bucket must not be empty");
        }
        if self.filename.is_empty() {
            config_error!("Filename must not be empty");
        }

        let mut name = format!(
            "{}_{}.{}",
            self.filename,
            now.format(TIMESTAMP_FORMAT),
            self.format.extension()
        );
        if let Some(compression) = self.compression {
            name.push('.');
            name.push_str(compression.extension());
        }

        let folder = self.folder.trim_matches('/');
        let key = if folder.is_empty() {
            name
        } else {
            format!("{folder}/{name}")
        };
        if key.split('/').any(|seg| seg == "." || seg == "..") {
            config_error!("Output path '{key}' must not contain '.' or '..' segments");
        }

        Ok(S3Location {
            bucket: self.bucket.clone(),
            key,
        })
    }

    fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            format: self.format,
            compression: self.compression,
            delimiter: self.delimiter,
        }
    }
}

/// An object written by `persist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub location: S3Location,
    pub format: OutputFormat,
    pub compression: Option<Compression>,
    /// Size of the written object in bytes.
    pub size: usize,
}

impl fmt::Display for OutputArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.location, self.format)?;
        if let Some(compression) = self.compression {
            write!(f, ", {compression}")?;
        }
        write!(f, ", {} bytes)", self.size)
    }
}

/// Entry name used inside single file archives.
fn archive_entry_name(key: &str, compression: Option<Compression>) -> &str {
    let name = key.rsplit('/').next().unwrap_or(key);
    match compression {
        Some(Compression::Zip) => name.strip_suffix(".zip").unwrap_or(name),
        _ => name,
    }
}

/// Encode the table and write it as a single object.
///
/// The timestamp in the path is taken from `now`. The object is written with
/// one put request, nothing is left behind if encoding fails.
pub async fn persist<C>(
    table: &Table,
    target: &OutputTarget,
    store: &S3Client<C>,
    now: DateTime<Utc>,
) -> Result<OutputArtifact>
where
    C: HttpClient,
{
    let location = target.location(now)?;
    let entry_name = archive_entry_name(&location.key, target.compression);

    let body = encode_table(table, &target.encode_options(), entry_name)?;
    let size = body.len();

    store
        .put_object(
            &location,
            target.format.content_type(target.compression),
            body,
        )
        .await?;

    let artifact = OutputArtifact {
        location,
        format: target.format,
        compression: target.compression,
        size,
    };
    info!(
        path = %artifact.location,
        format = %artifact.format,
        compression = ?artifact.compression.map(|c| c.extension()),
        bytes = artifact.size,
        rows = table.num_rows(),
        "wrote table"
    );

    Ok(artifact)
}
