// src/logging.rs

//! Subscriber setup.
//!
//! The filter is picked in this order:
//! 1. `--log-level` (or `-v`, meaning debug) on the command line
//! 2. the `WATCHRUN_LOG` environment variable, as an `EnvFilter` directive
//!    such as `debug` or `watchrun=debug,notify=warn`
//! 3. `info`
//!
//! Everything goes to stderr; stdout belongs to the supervised command.

use anyhow::{anyhow, Context, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "WATCHRUN_LOG";

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV).ok().as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(Level::from(level).as_str()));
    }
    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid {LOG_ENV} value {directive:?}")),
        None => Ok(EnvFilter::new("info")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_beats_environment() {
        let filter = build_filter(Some(LogLevel::Trace), Some("error")).unwrap();
        assert_eq!(filter.to_string(), "trace");
    }

    #[test]
    fn environment_directive_is_used_verbatim() {
        let filter = build_filter(None, Some(" watchrun=debug ")).unwrap();
        assert_eq!(filter.to_string(), "watchrun=debug");

        assert_eq!(build_filter(None, None).unwrap().to_string(), "info");
        assert_eq!(build_filter(None, Some("")).unwrap().to_string(), "info");
    }

    #[test]
    fn malformed_directive_is_rejected() {
        assert!(build_filter(None, Some("watchrun=loud")).is_err());
    }
}
