// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Flags only collect raw values; turning them into a validated
//! [`Config`](crate::config::Config) happens in [`crate::config::loader`].

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `watchrun`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "watchrun",
    version,
    about = "Run the COMMAND and restart it when a file matching the pattern is modified.",
    override_usage = "watchrun [OPTION]... -- COMMAND",
    long_about = None
)]
pub struct CliArgs {
    /// Observation target path (default "./").
    #[arg(short = 't', long = "target", value_name = "PATH")]
    pub targets: Vec<PathBuf>,

    /// Trigger pathname glob pattern (default "**").
    #[arg(short = 'p', long = "pattern", value_name = "GLOB")]
    pub patterns: Vec<String>,

    /// Ignore pathname glob pattern.
    #[arg(short = 'i', long = "ignore", value_name = "GLOB")]
    pub ignores: Vec<String>,

    /// Duration to delay the restart of the command (e.g. "1s", "500ms").
    #[arg(short = 'd', long, value_name = "DURATION")]
    pub delay: Option<String>,

    /// Restart the command when it exits on its own.
    #[arg(short = 'r', long)]
    pub restart: bool,

    /// Signal used to stop the command (default "SIGTERM").
    #[arg(short = 's', long, value_name = "SIGNAL")]
    pub signal: Option<String>,

    /// Filter out events of this type (create, write, remove, rename, chmod).
    #[arg(short = 'f', long = "filter", value_name = "EVENT")]
    pub filters: Vec<String>,

    /// Poll for changes at this interval instead of using native notifications.
    #[arg(short = 'P', long, value_name = "DURATION")]
    pub polling: Option<String>,

    /// Forward standard input to the command.
    #[arg(short = 'n', long)]
    pub stdin: bool,

    /// Load defaults from this TOML file; flags override its values.
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output (same as `--log-level debug`).
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `-v`, then `WATCHRUN_LOG`, then `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// The command to supervise, given after `--`.
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl CliArgs {
    /// Level requested on the command line, if any.
    pub fn requested_log_level(&self) -> Option<LogLevel> {
        match (self.log_level, self.verbose) {
            (Some(level), _) => Some(level),
            (None, true) => Some(LogLevel::Debug),
            (None, false) => None,
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
