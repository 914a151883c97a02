// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{Op, StopSignal};
use crate::watch::patterns::MatchRules;

/// Raw configuration as read from an optional TOML file and then layered
/// with CLI flags.
///
/// ```toml
/// targets = ["src", "templates"]
/// patterns = ["**/*.rs", "**/*.html"]
/// ignores = ["**/target/**"]
/// delay = "500ms"
/// restart = true
/// signal = "SIGINT"
/// filter = ["chmod"]
/// polling = "0"
/// stdin = false
/// command = ["cargo", "run"]
/// ```
///
/// Every key is optional; defaults are applied during validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Observation targets (files or directories).
    #[serde(default)]
    pub targets: Vec<PathBuf>,

    /// Trigger glob patterns.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Ignore glob patterns. These win over `patterns`.
    #[serde(default)]
    pub ignores: Vec<String>,

    /// Settle delay before restarting, e.g. `"1s"`.
    #[serde(default)]
    pub delay: Option<String>,

    /// Restart the command when it exits on its own.
    #[serde(default)]
    pub restart: bool,

    /// Stop signal name or number.
    #[serde(default)]
    pub signal: Option<String>,

    /// Event types to ignore.
    #[serde(default)]
    pub filter: Vec<String>,

    /// Polling interval; `"0"` (the default) selects native notifications.
    #[serde(default)]
    pub polling: Option<String>,

    /// Forward our stdin to the command.
    #[serde(default)]
    pub stdin: bool,

    /// Command in argv form.
    #[serde(default)]
    pub command: Vec<String>,
}

/// Validated configuration consumed by the engine.
///
/// Only constructible through `TryFrom<RawConfig>` (see
/// [`crate::config::validate`]), so every value here has been checked.
#[derive(Debug, Clone)]
pub struct Config {
    pub targets: Vec<PathBuf>,
    pub rules: MatchRules,
    pub delay: Duration,
    pub restart_on_exit: bool,
    pub signal: StopSignal,
    /// Operation types the user opted out of.
    pub event_filter: Op,
    /// Zero selects the native backend.
    pub polling_interval: Duration,
    pub forward_stdin: bool,
    pub command: Vec<String>,
}

impl Config {
    /// Operations that may still trigger a restart after filtering.
    pub fn trigger_mask(&self) -> Op {
        Op::all().difference(self.event_filter)
    }

    /// Human-readable form of the command for log lines.
    ///
    /// Arguments containing whitespace or quotes are shown quoted.
    pub fn display_command(&self) -> String {
        self.command
            .iter()
            .map(|arg| {
                if arg.contains([' ', '\t', '"', '\'']) {
                    format!("{arg:?}")
                } else {
                    arg.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
