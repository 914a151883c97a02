// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::cli::CliArgs;
use crate::config::model::{Config, RawConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfig`.
///
/// This only performs TOML deserialization; it does **not** apply defaults
/// or validate values. Use [`resolve`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Build the validated [`Config`] for a run.
///
/// - Reads the `--config` TOML file when one is given.
/// - Layers CLI flags on top: non-empty lists and explicit values replace
///   the file's values, boolean switches can only turn features on.
/// - Applies defaults and validates (see [`crate::config::validate`]).
pub fn resolve(args: &CliArgs) -> Result<Config> {
    let base = match &args.config {
        Some(path) => load_from_path(path)?,
        None => RawConfig::default(),
    };
    Config::try_from(overlay_cli(base, args))
}

/// Apply CLI values over a raw config read from file.
pub fn overlay_cli(mut raw: RawConfig, args: &CliArgs) -> RawConfig {
    if !args.targets.is_empty() {
        raw.targets = args.targets.clone();
    }
    if !args.patterns.is_empty() {
        raw.patterns = args.patterns.clone();
    }
    if !args.ignores.is_empty() {
        raw.ignores = args.ignores.clone();
    }
    if args.delay.is_some() {
        raw.delay = args.delay.clone();
    }
    if args.signal.is_some() {
        raw.signal = args.signal.clone();
    }
    if !args.filters.is_empty() {
        raw.filter = args.filters.clone();
    }
    if args.polling.is_some() {
        raw.polling = args.polling.clone();
    }
    if !args.command.is_empty() {
        raw.command = args.command.clone();
    }
    raw.restart |= args.restart;
    raw.stdin |= args.stdin;
    raw
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::errors::WatchrunError;

    #[test]
    fn cli_values_override_file_values() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
patterns = ["**/*.go"]
ignores = ["**/*_test.go"]
delay = "2s"
restart = true
command = ["go", "run", "."]
"#
        )
        .unwrap();

        let args = CliArgs {
            config: Some(file.path().to_path_buf()),
            delay: Some("250ms".to_string()),
            ..CliArgs::default()
        };
        let cfg = resolve(&args).unwrap();

        assert_eq!(cfg.delay, Duration::from_millis(250));
        assert!(cfg.restart_on_exit);
        assert_eq!(cfg.command, vec!["go", "run", "."]);
        assert!(cfg.rules.is_ignored("./a_test.go"));
        assert!(cfg.rules.is_triggering("./a.go"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "commnd = [\"true\"]\n").unwrap();

        assert!(matches!(
            load_from_path(file.path()),
            Err(WatchrunError::TomlError(_))
        ));
    }
}
