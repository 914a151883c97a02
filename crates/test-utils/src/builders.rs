#![allow(dead_code)]

use std::path::PathBuf;

use watchrun::config::{Config, RawConfig};

/// Builder for `Config` to simplify test setup.
pub struct ConfigBuilder {
    raw: RawConfig,
}

impl ConfigBuilder {
    /// Start from a command line; everything else uses defaults.
    pub fn new(command: &[&str]) -> Self {
        Self {
            raw: RawConfig {
                command: command.iter().map(|s| s.to_string()).collect(),
                ..RawConfig::default()
            },
        }
    }

    pub fn target(mut self, path: impl Into<PathBuf>) -> Self {
        self.raw.targets.push(path.into());
        self
    }

    pub fn pattern(mut self, glob: &str) -> Self {
        self.raw.patterns.push(glob.to_string());
        self
    }

    pub fn ignore(mut self, glob: &str) -> Self {
        self.raw.ignores.push(glob.to_string());
        self
    }

    pub fn delay(mut self, delay: &str) -> Self {
        self.raw.delay = Some(delay.to_string());
        self
    }

    pub fn restart(mut self, on: bool) -> Self {
        self.raw.restart = on;
        self
    }

    pub fn signal(mut self, signal: &str) -> Self {
        self.raw.signal = Some(signal.to_string());
        self
    }

    pub fn filter(mut self, op: &str) -> Self {
        self.raw.filter.push(op.to_string());
        self
    }

    pub fn polling(mut self, interval: &str) -> Self {
        self.raw.polling = Some(interval.to_string());
        self
    }

    pub fn raw(self) -> RawConfig {
        self.raw
    }

    pub fn build(self) -> Config {
        Config::try_from(self.raw).expect("Failed to build valid config from builder")
    }
}
