//! Output formats and compression codecs.
//!
//! Format and codec are chosen independently. A format knows which codec it
//! uses when compression is requested, a codec knows its own file extension.

pub mod archive;
pub mod columnar;
pub mod delimited;

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use sheetpull_error::{PullError, Result};

use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Delimited text, tab separated by default.
    Csv,
    /// Columnar binary.
    Parquet,
}

impl OutputFormat {
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }

    /// Codec used by this format when compression is enabled.
    pub const fn default_compression(&self) -> Compression {
        match self {
            Self::Csv => Compression::Zip,
            Self::Parquet => Compression::Snappy,
        }
    }

    pub const fn supports(&self, compression: Compression) -> bool {
        matches!(
            (self, compression),
            (Self::Csv, Compression::Zip) | (Self::Parquet, Compression::Snappy)
        )
    }

    /// Pick the codec for a compression flag.
    pub fn compression_for(&self, enabled: bool) -> Option<Compression> {
        enabled.then(|| self.default_compression())
    }

    pub const fn content_type(&self, compression: Option<Compression>) -> &'static str {
        match (self, compression) {
            (_, Some(Compression::Zip)) => "application/zip",
            (Self::Csv, _) => "text/csv",
            (Self::Parquet, _) => "application/octet-stream",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = PullError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            other => Err(PullError::Config(format!(
                "Unsupported output format '{other}', expected 'csv' or 'parquet'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Zip archive wrapping the whole file.
    Zip,
    /// Parquet page compression.
    Snappy,
}

impl Compression {
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Snappy => "snappy",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Parse a compression flag.
///
/// Truthy values are exactly "true", "1", "t", "y" and "yes", compared case
/// insensitively. Everything else is false.
pub fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_lowercase().as_str(),
        "true" | "1" | "t" | "y" | "yes"
    )
}

/// Options for encoding a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub format: OutputFormat,
    pub compression: Option<Compression>,
    /// Field delimiter for delimited text.
    pub delimiter: u8,
}

impl EncodeOptions {
    pub fn new(format: OutputFormat, compression: Option<Compression>) -> Self {
        EncodeOptions {
            format,
            compression,
            delimiter: delimited::DEFAULT_DELIMITER,
        }
    }
}

/// Encode a table into the bytes of a single object.
///
/// `entry_name` is the file name used inside archive codecs.
pub fn encode_table(table: &Table, opts: &EncodeOptions, entry_name: &str) -> Result<Bytes> {
    if let Some(compression) = opts.compression {
        if !opts.format.supports(compression) {
            return Err(PullError::Config(format!(
                "Compression '{compression}' is not supported for '{}' output",
                opts.format
            )));
        }
    }

    match opts.format {
        OutputFormat::Csv => {
            let text = delimited::write_delimited(table, opts.delimiter)?;
            match opts.compression {
                Some(Compression::Zip) => archive::zip_single_entry(entry_name, &text),
                _ => Ok(Bytes::from(text)),
            }
        }
        OutputFormat::Parquet => columnar::write_parquet(table, opts.compression),
    }
}

#[cfg(test)]
mod tests {
    use sheetpull_error::ErrorKind;

    use super::*;

    #[test]
    fn truthy_literals() {
        for val in ["true", "TRUE", "True", "1", "t", "T", "y", "Y", "yes", "YeS"] {
            assert!(is_truthy(val), "{val}");
        }
        for val in ["false", "0", "", "no", "on", "2", " true", "yes ", "enabled"] {
            assert!(!is_truthy(val), "{val}");
        }
    }

    #[test]
    fn parse_format() {
        assert_eq!(OutputFormat::Csv, "csv".parse().unwrap());
        assert_eq!(OutputFormat::Parquet, "Parquet".parse().unwrap());
        let err = "json".parse::<OutputFormat>().unwrap_err();
        assert_eq!(ErrorKind::Config, err.kind());
    }

    #[test]
    fn compression_per_format() {
        assert_eq!(Some(Compression::Zip), OutputFormat::Csv.compression_for(true));
        assert_eq!(
            Some(Compression::Snappy),
            OutputFormat::Parquet.compression_for(true)
        );
        assert_eq!(None, OutputFormat::Csv.compression_for(false));
        assert_eq!(None, OutputFormat::Parquet.compression_for(false));

        assert!(!OutputFormat::Csv.supports(Compression::Snappy));
        assert!(!OutputFormat::Parquet.supports(Compression::Zip));
    }

    #[test]
    fn unsupported_pair_rejected() {
        let table = Table::try_new(vec!["a".to_string()], vec![]).unwrap();
        let opts = EncodeOptions::new(OutputFormat::Csv, Some(Compression::Snappy));
        let err = encode_table(&table, &opts, "f.csv").unwrap_err();
        assert_eq!(ErrorKind::Config, err.kind());
    }

    #[test]
    fn content_types() {
        assert_eq!("text/csv", OutputFormat::Csv.content_type(None));
        assert_eq!(
            "application/zip",
            OutputFormat::Csv.content_type(Some(Compression::Zip))
        );
        assert_eq!(
            "application/octet-stream",
            OutputFormat::Parquet.content_type(Some(Compression::Snappy))
        );
    }
}
