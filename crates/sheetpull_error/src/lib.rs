use std::error::Error as StdError;
use std::fmt;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T, E = PullError> = std::result::Result<T, E>;

/// Coarse classification of a [`PullError`].
///
/// Every kind is terminal for a run. The kind is what gets reported to the job
/// host alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CredentialNotFound,
    CredentialMalformed,
    AuthenticationError,
    SheetNotFound,
    RangeNotFound,
    PermissionDenied,
    EmptySheetRange,
    MalformedRow,
    WriteError,
    Config,
    Http,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialNotFound => "CredentialNotFound",
            Self::CredentialMalformed => "CredentialMalformed",
            Self::AuthenticationError => "AuthenticationError",
            Self::SheetNotFound => "SheetNotFound",
            Self::RangeNotFound => "RangeNotFound",
            Self::PermissionDenied => "PermissionDenied",
            Self::EmptySheetRange => "EmptySheetRange",
            Self::MalformedRow => "MalformedRow",
            Self::WriteError => "WriteError",
            Self::Config => "Config",
            Self::Http => "Http",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PullError {
    #[error("Secret '{secret_id}' not found in region '{region}'")]
    CredentialNotFound { secret_id: String, region: String },

    #[error("Secret does not hold a usable service account credential: {msg}")]
    CredentialMalformed {
        msg: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Spreadsheet '{0}' not found or not shared with the service account")]
    SheetNotFound(String),

    #[error("Range '{range}' not found: {msg}")]
    RangeNotFound { range: String, msg: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Sheet range is empty, expected at least a header row")]
    EmptySheetRange,

    #[error("Sheet row {row} has {got} cells, but the header only has {expected}")]
    MalformedRow {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("Failed to write '{path}': {msg}")]
    WriteError { path: String, msg: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{msg}")]
    Http {
        msg: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{msg}")]
    Internal {
        msg: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl PullError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CredentialNotFound { .. } => ErrorKind::CredentialNotFound,
            Self::CredentialMalformed { .. } => ErrorKind::CredentialMalformed,
            Self::AuthenticationError(_) => ErrorKind::AuthenticationError,
            Self::SheetNotFound(_) => ErrorKind::SheetNotFound,
            Self::RangeNotFound { .. } => ErrorKind::RangeNotFound,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::EmptySheetRange => ErrorKind::EmptySheetRange,
            Self::MalformedRow { .. } => ErrorKind::MalformedRow,
            Self::WriteError { .. } => ErrorKind::WriteError,
            Self::Config(_) => ErrorKind::Config,
            Self::Http { .. } => ErrorKind::Http,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        PullError::Internal {
            msg: msg.into(),
            source: None,
        }
    }

    pub fn http(msg: impl Into<String>) -> Self {
        PullError::Http {
            msg: msg.into(),
            source: None,
        }
    }

    pub fn http_with_source(msg: impl Into<String>, source: BoxError) -> Self {
        PullError::Http {
            msg: msg.into(),
            source: Some(source),
        }
    }

    pub fn credential_malformed(msg: impl Into<String>) -> Self {
        PullError::CredentialMalformed {
            msg: msg.into(),
            source: None,
        }
    }
}

/// Attach a message to a foreign error.
pub trait ResultExt<T, E> {
    /// Wrap the error as an internal error with the given message.
    fn context(self, msg: &'static str) -> Result<T>;

    /// Like `context`, but the message is built lazily.
    fn context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Wrap the error as a transport error with the given message.
    fn http_context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| PullError::Internal {
            msg: msg.to_string(),
            source: Some(Box::new(e)),
        })
    }

    fn context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| PullError::Internal {
            msg: f(),
            source: Some(Box::new(e)),
        })
    }

    fn http_context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| PullError::Http {
            msg: msg.to_string(),
            source: Some(Box::new(e)),
        })
    }
}

/// Return early with a config error.
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        return Err($crate::PullError::Config(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = PullError::MalformedRow {
            row: 3,
            expected: 2,
            got: 4,
        };
        assert_eq!(ErrorKind::MalformedRow, err.kind());
        assert_eq!(
            "Sheet row 3 has 4 cells, but the header only has 2",
            err.to_string()
        );
    }

    #[test]
    fn context_keeps_source() {
        let res: std::result::Result<(), std::fmt::Error> = Err(std::fmt::Error);
        let err = res.context("formatting failed").unwrap_err();
        assert_eq!(ErrorKind::Internal, err.kind());
        assert!(err.source().is_some());
    }

    #[test]
    fn config_error_macro_returns_early() {
        fn check(v: &str) -> Result<()> {
            if v.is_empty() {
                config_error!("value for '{}' is empty", "bucket");
            }
            Ok(())
        }

        let err = check("").unwrap_err();
        assert_eq!("Invalid configuration: value for 'bucket' is empty", err.to_string());
        assert!(check("b").is_ok());
    }
}
