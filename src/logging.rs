//! Logging initialization.
//!
//! The subscriber is installed before the config file is read, so events from
//! config loading are not lost. The configured level is applied afterwards
//! through a reload handle.

use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// Level used until the config file has been read.
const STARTUP_LEVEL: &str = "info";

/// Parse log level string to tracing Level.
fn parse_level(level: &str) -> Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// `level` for this crate, warnings for dependencies.
fn crate_directive(level: &str) -> String {
    format!(
        "warn,{}={}",
        env!("CARGO_CRATE_NAME"),
        parse_level(level).to_string().to_lowercase()
    )
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(crate_directive(level)).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Handle to the installed subscriber's filter.
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    /// `RUST_LOG` was set and always wins over the config file.
    from_env: bool,
}

impl LogHandle {
    /// Switches to the configured level unless `RUST_LOG` is set.
    pub fn set_level(&self, level: &str) {
        if self.from_env {
            return;
        }
        if let Err(e) = self.filter.reload(level_filter(level)) {
            tracing::warn!(error = %e, level = %level, "Failed to apply configured log level");
        }
    }
}

/// Installs the global subscriber, writing to stderr so stdout stays free
/// for the run summary.
pub fn init() -> LogHandle {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (level_filter(STARTUP_LEVEL), false),
    };
    let (filter_layer, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    LogHandle {
        filter: handle,
        from_env,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level(" WARNING "), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_crate_directive() {
        assert_eq!(crate_directive("debug"), "warn,feedsheet=debug");
        assert_eq!(crate_directive("nonsense"), "warn,feedsheet=info");
    }
}
