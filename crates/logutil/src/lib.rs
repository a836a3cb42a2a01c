//! Utilities for logging.

use tracing::Level;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoggingMode {
    /// Multi-line human readable output.
    #[default]
    Pretty,
    /// One json object per event.
    Json,
    /// Single line human readable output.
    Compact,
}

/// Map a `-v` count to a max level.
///
/// Zero logs at info, each additional flag opens up one more level.
pub fn level_for_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialize the global logger, writing to stderr.
///
/// `RUST_LOG` takes precedence over the verbosity when set.
pub fn init(verbose: u8, mode: LoggingMode) {
    if let Err(e) = try_init(level_for_verbosity(verbose), mode) {
        eprintln!("Failed to set global logger: {e}");
    }
}

pub fn try_init(level: Level, mode: LoggingMode) -> Result<(), SetGlobalDefaultError> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let builder = SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match mode {
        LoggingMode::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish()),
        LoggingMode::Json => tracing::subscriber::set_global_default(
            builder.json().with_current_span(false).finish(),
        ),
        LoggingMode::Compact => {
            tracing::subscriber::set_global_default(builder.compact().finish())
        }
    }
}

/// Initialize a logger for tests.
///
/// Safe to call from multiple tests, only the first call installs anything.
pub fn init_test() {
    let _ = SubscriberBuilder::default()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(Level::INFO, level_for_verbosity(0));
        assert_eq!(Level::DEBUG, level_for_verbosity(1));
        assert_eq!(Level::TRACE, level_for_verbosity(2));
        assert_eq!(Level::TRACE, level_for_verbosity(3));
        assert_eq!(Level::TRACE, level_for_verbosity(9));
    }

    #[test]
    fn init_test_is_repeatable() {
        init_test();
        init_test();
    }
}
