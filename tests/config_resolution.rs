use std::error::Error;
use std::time::Duration;

use watchrun::config::Config;
use watchrun::errors::WatchrunError;
use watchrun::types::{Op, StopSignal};
use watchrun_test_utils::builders::ConfigBuilder;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn defaults_watch_everything_in_the_current_directory() -> TestResult {
    let cfg = ConfigBuilder::new(&["make", "run"]).build();

    assert_eq!(cfg.targets, vec![std::path::PathBuf::from("./")]);
    assert_eq!(cfg.rules.patterns(), ["**".to_string()]);
    assert!(cfg.rules.ignores().is_empty());
    assert_eq!(cfg.delay, Duration::from_secs(1));
    assert_eq!(cfg.polling_interval, Duration::ZERO);
    assert_eq!(cfg.signal, StopSignal::Term);
    assert_eq!(cfg.trigger_mask(), Op::all());
    assert!(!cfg.restart_on_exit);
    assert!(!cfg.forward_stdin);
    Ok(())
}

#[cfg(unix)]
#[test]
fn explicit_values_are_applied() -> TestResult {
    let cfg = ConfigBuilder::new(&["go", "run", "."])
        .target("src")
        .pattern("**/*.go")
        .ignore("**/*_test.go")
        .delay("250ms")
        .signal("SIGINT")
        .filter("chmod")
        .filter("remove")
        .polling("1s")
        .restart(true)
        .build();

    assert_eq!(cfg.delay, Duration::from_millis(250));
    assert_eq!(cfg.polling_interval, Duration::from_secs(1));
    assert_eq!(cfg.signal, StopSignal::Int);
    assert_eq!(cfg.trigger_mask(), Op::CREATE | Op::WRITE | Op::RENAME);
    assert!(cfg.restart_on_exit);
    assert!(cfg.rules.is_triggering("src/main.go"));
    assert!(cfg.rules.is_ignored("src/main_test.go"));
    Ok(())
}

#[test]
fn invalid_values_are_config_errors() -> TestResult {
    let bad = [
        ConfigBuilder::new(&["x"]).delay("soon").raw(),
        ConfigBuilder::new(&["x"]).signal("SIGNOPE").raw(),
        ConfigBuilder::new(&["x"]).filter("touch").raw(),
        ConfigBuilder::new(&[]).raw(),
    ];
    for raw in bad {
        let err = Config::try_from(raw).unwrap_err();
        assert!(matches!(err, WatchrunError::ConfigError(_)), "{err:?}");
    }

    let err = Config::try_from(ConfigBuilder::new(&["x"]).pattern("a[").raw()).unwrap_err();
    assert!(matches!(err, WatchrunError::Pattern { .. }));
    Ok(())
}

#[test]
fn display_command_quotes_arguments_with_spaces() -> TestResult {
    let cfg = ConfigBuilder::new(&["sh", "-c", "echo hi"]).build();
    assert_eq!(cfg.display_command(), r#"sh -c "echo hi""#);
    Ok(())
}
