//! Logging setup for the binary.

use crate::error::{AnonymizeError, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Log level for the given verbosity (0=INFO, 1=DEBUG, 2+=TRACE, quiet=ERROR)
pub fn level_for(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Initializes structured logging on stderr.
///
/// `RUST_LOG` takes precedence over the verbosity flags when set.
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let level = level_for(verbose, quiet);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| {
            AnonymizeError::configuration(format!("Failed to initialize logging: {}", e))
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let cases = [
            ((true, 0), Level::ERROR),
            ((true, 5), Level::ERROR),
            ((false, 0), Level::INFO),
            ((false, 1), Level::DEBUG),
            ((false, 2), Level::TRACE),
            ((false, 10), Level::TRACE),
        ];

        for ((quiet, verbose), expected) in cases {
            assert_eq!(level_for(verbose, quiet), expected, "quiet={quiet}, verbose={verbose}");
        }
    }
}
