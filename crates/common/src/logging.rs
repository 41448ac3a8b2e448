//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Fallback when the configured level does not parse as a filter.
const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global subscriber. Logs go to stderr so stdout stays free
/// for command output such as a compiled EDL.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this
/// twice is harmless; the first subscriber stays installed.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| configured_filter(config));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.compact().with_target(true).try_init()
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Defaults, for tests and small tools.
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}

fn configured_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_new(config.level.trim()).unwrap_or_else(|e| {
        eprintln!(
            "invalid log level '{}' ({e}); using {DEFAULT_DIRECTIVE}",
            config.level
        );
        EnvFilter::new(DEFAULT_DIRECTIVE)
    })
}
