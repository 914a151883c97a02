// src/config/validate.rs

use std::path::PathBuf;
use std::time::Duration;

use crate::config::model::{Config, RawConfig};
use crate::errors::{Result, WatchrunError};
use crate::types::{Op, StopSignal};
use crate::watch::patterns::MatchRules;

const DEFAULT_TARGET: &str = "./";
const DEFAULT_PATTERN: &str = "**";
const DEFAULT_DELAY: Duration = Duration::from_secs(1);

impl TryFrom<RawConfig> for Config {
    type Error = WatchrunError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        if raw.command.is_empty() {
            return Err(WatchrunError::ConfigError("COMMAND required".to_string()));
        }

        let targets = if raw.targets.is_empty() {
            vec![PathBuf::from(DEFAULT_TARGET)]
        } else {
            raw.targets
        };

        let patterns = if raw.patterns.is_empty() {
            vec![DEFAULT_PATTERN.to_string()]
        } else {
            raw.patterns
        };
        let rules = MatchRules::new(&patterns, &raw.ignores)?;

        let delay = match raw.delay.as_deref() {
            Some(s) => parse_duration(s)
                .map_err(|e| WatchrunError::ConfigError(format!("delay: {e}")))?,
            None => DEFAULT_DELAY,
        };

        let polling_interval = match raw.polling.as_deref() {
            Some(s) => parse_duration(s)
                .map_err(|e| WatchrunError::ConfigError(format!("polling: {e}")))?,
            None => Duration::ZERO,
        };

        let signal = match raw.signal.as_deref() {
            Some(s) => s.parse::<StopSignal>().map_err(WatchrunError::ConfigError)?,
            None => StopSignal::default(),
        };

        let event_filter = parse_filter(&raw.filter)?;

        Ok(Config {
            targets,
            rules,
            delay,
            restart_on_exit: raw.restart,
            signal,
            event_filter,
            polling_interval,
            forward_stdin: raw.stdin,
            command: raw.command,
        })
    }
}

fn parse_filter(names: &[String]) -> Result<Op> {
    names.iter().try_fold(Op::empty(), |acc, name| {
        Op::from_filter_name(name).map(|op| acc | op).ok_or_else(|| {
            WatchrunError::ConfigError(format!(
                "invalid filter event: {name} (expected create, write, remove, rename or chmod)"
            ))
        })
    })
}

/// Parse a duration string like `"1s"`, `"250ms"`, `"1.5s"` or `"1m30s"`.
///
/// Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`. A bare `"0"` is accepted.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = s;
    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("duration {s:?} missing unit suffix"))?;
        if num_len == 0 {
            return Err(format!("invalid duration {s:?}"));
        }
        let (num_part, tail) = rest.split_at(num_len);

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);

        let unit_nanos: u64 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 60 * 60 * 1_000_000_000,
            other => {
                return Err(format!(
                    "unsupported duration unit '{other}'; expected ns, us, ms, s, m, or h"
                ));
            }
        };

        let part = if num_part.contains('.') {
            let value: f64 = num_part
                .parse()
                .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;
            Duration::from_nanos((value * unit_nanos as f64).round() as u64)
        } else {
            let value: u64 = num_part
                .parse()
                .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;
            value
                .checked_mul(unit_nanos)
                .map(Duration::from_nanos)
                .ok_or_else(|| format!("duration {s:?} out of range"))?
        };

        total += part;
        rest = next;
    }

    Ok(total)
}
