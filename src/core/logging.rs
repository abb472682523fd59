//! Diagnostic logging setup
//!
//! The library emits `tracing` events with structured fields (file, record
//! type, upload id, counts). The binary installs a stderr subscriber so that
//! diagnostics never mix with command output on stdout.
//!
//! Level selection, highest precedence first:
//! 1. `HRETL_LOG` (any `EnvFilter` directive, e.g. `hretl=debug`)
//! 2. `--verbose` -> debug, `--quiet` -> error
//! 3. default -> warn

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding filter directives
pub const LOG_ENV: &str = "HRETL_LOG";

/// Pick the base level from the global CLI flags
pub fn level_for(verbose: bool, quiet: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        Level::WARN
    }
}

/// Build the filter for the given base level, honouring `HRETL_LOG`
pub fn build_filter(level: Level) -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase())),
        _ => EnvFilter::new(level.as_str().to_lowercase()),
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(verbose: bool, quiet: bool) {
    let filter = build_filter(level_for(verbose, quiet));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .compact(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_flags() {
        assert_eq!(level_for(true, false), Level::DEBUG);
        assert_eq!(level_for(false, true), Level::ERROR);
        assert_eq!(level_for(false, false), Level::WARN);
        // verbose wins over quiet
        assert_eq!(level_for(true, true), Level::DEBUG);
    }
}
