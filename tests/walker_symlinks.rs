#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;

use watchrun::fs::RealFileSystem;
use watchrun::watch::{walk, MatchRules, WalkOptions, WatchBackend};
use watchrun_test_utils::fake_backend::RecordingBackend;
use watchrun_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn everything() -> MatchRules {
    MatchRules::new(&["**".to_string()], &[]).unwrap()
}

#[test]
fn symlink_loop_under_a_target_is_not_followed() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    fs::create_dir(root.join("sub"))?;
    fs::write(root.join("sub").join("a.go"), "package sub\n")?;
    symlink("..", root.join("sub").join("loop"))?;

    let backend = RecordingBackend::new();
    let report = walk(
        &backend,
        &RealFileSystem,
        root,
        &everything(),
        WalkOptions::default(),
    )?;

    assert_eq!(report.registered, vec![root.to_path_buf(), root.join("sub")]);
    assert_eq!(backend.watch_list().len(), 2);
    Ok(())
}

#[test]
fn self_loop_and_dangling_links_are_skipped() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    let spin = root.join("spin");
    symlink(&spin, &spin)?;
    symlink(root.join("nowhere"), root.join("dangling"))?;
    fs::create_dir(root.join("real"))?;

    let backend = RecordingBackend::new();
    let report = walk(
        &backend,
        &RealFileSystem,
        root,
        &everything(),
        WalkOptions {
            report_matches: true,
        },
    )?;

    assert_eq!(report.registered, vec![root.to_path_buf(), root.join("real")]);
    assert!(report.matched.contains(&spin));
    Ok(())
}

#[test]
fn symlinked_target_root_is_followed() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let real = dir.path().join("real");
    fs::create_dir_all(real.join("inner"))?;
    let alias = dir.path().join("alias");
    symlink(&real, &alias)?;

    let backend = RecordingBackend::new();
    let report = walk(
        &backend,
        &RealFileSystem,
        Path::new(&alias),
        &everything(),
        WalkOptions::default(),
    )?;

    assert_eq!(report.registered, vec![alias.clone(), alias.join("inner")]);
    Ok(())
}
