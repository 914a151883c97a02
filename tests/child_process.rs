#![cfg(unix)]

use std::error::Error;
use std::path::Path;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use watchrun::errors::WatchrunError;
use watchrun::exec::{CommandLauncher, ExitDetector, ProcessLauncher, StdinRelay, TERM_GRACE};
use watchrun::types::StopSignal;
use watchrun_test_utils::{init_tracing, with_timeout, with_timeout_of};

type TestResult = Result<(), Box<dyn Error>>;

fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

fn launcher(argv: Vec<String>, signal: StopSignal, stdin: Option<StdinRelay>) -> CommandLauncher {
    let exits = ExitDetector::new(Duration::from_millis(10), &CancellationToken::new())
        .expect("exit detector");
    CommandLauncher::new(argv, signal, stdin, exits)
}

#[tokio::test]
async fn exit_code_is_reported() -> TestResult {
    init_tracing();
    let mut launcher = launcher(sh("exit 3"), StopSignal::Term, None);

    let exit = with_timeout(launcher.launch(CancellationToken::new())).await?;
    assert_eq!(exit.code, Some(3));
    assert!(!exit.stopped);
    assert!(!exit.success());
    Ok(())
}

#[tokio::test]
async fn cooperative_child_stops_on_signal() -> TestResult {
    init_tracing();
    let mut launcher = launcher(vec!["sleep".into(), "30".into()], StopSignal::Int, None);
    let cancel = CancellationToken::new();
    let run = launcher.launch(cancel.clone());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let started = Instant::now();
    cancel.cancel();
    let exit = with_timeout(run).await?;

    assert!(exit.stopped);
    assert_eq!(exit.code, None);
    assert!(started.elapsed() < TERM_GRACE);
    Ok(())
}

#[tokio::test]
async fn stubborn_child_is_killed_after_grace() -> TestResult {
    init_tracing();
    // The ignored disposition is inherited by `sleep`, so the whole group
    // shrugs off TERM.
    let mut launcher = launcher(sh("trap '' TERM; sleep 30"), StopSignal::Term, None);
    let cancel = CancellationToken::new();
    let run = launcher.launch(cancel.clone());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let started = Instant::now();
    cancel.cancel();
    let exit = with_timeout_of(TERM_GRACE * 3, run).await?;

    assert!(exit.stopped);
    assert_eq!(exit.code, None);
    assert!(started.elapsed() >= TERM_GRACE);
    Ok(())
}

/// Wait for the script to write its pid file.
async fn read_pid(path: &Path) -> i32 {
    with_timeout(async {
        loop {
            if let Ok(text) = std::fs::read_to_string(path) {
                if let Ok(pid) = text.trim().parse() {
                    return pid;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
}

/// Alive means signalable and not a zombie waiting for its reaper.
fn is_running(pid: i32) -> bool {
    if kill(Pid::from_raw(pid), None::<Signal>).is_err() {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        // State is the field after the parenthesised command name.
        Ok(stat) => stat
            .rsplit_once(')')
            .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
            .unwrap_or(true),
        Err(_) => !Path::new("/proc/self").exists(),
    }
}

#[tokio::test]
async fn stop_reaches_the_whole_process_group() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let pidfile = dir.path().join("grandchild.pid");
    let script = format!("sleep 30 & echo $! > '{}'; wait", pidfile.display());
    let mut launcher = launcher(sh(&script), StopSignal::Term, None);
    let cancel = CancellationToken::new();
    let run = tokio::spawn(launcher.launch(cancel.clone()));

    let grandchild = read_pid(&pidfile).await;
    assert!(is_running(grandchild));

    cancel.cancel();
    let exit = with_timeout(run).await??;
    assert!(exit.stopped);

    let gone = with_timeout(async {
        while is_running(grandchild) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });
    gone.await;
    Ok(())
}

#[tokio::test]
async fn suspended_child_is_continued_so_it_can_stop() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let pidfile = dir.path().join("child.pid");
    let script = format!("echo $$ > '{}'; exec sleep 30", pidfile.display());
    let mut launcher = launcher(sh(&script), StopSignal::Term, None);
    let cancel = CancellationToken::new();
    let run = tokio::spawn(launcher.launch(cancel.clone()));

    let pid = read_pid(&pidfile).await;
    // Give `exec` a moment so the stop lands on `sleep`.
    tokio::time::sleep(Duration::from_millis(100)).await;
    kill(Pid::from_raw(pid), Signal::SIGSTOP)?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    cancel.cancel();
    let exit = with_timeout(run).await??;

    assert!(exit.stopped);
    assert_eq!(exit.code, None);
    assert!(
        started.elapsed() < TERM_GRACE,
        "stopped child needed the kill fallback: {:?}",
        started.elapsed()
    );
    Ok(())
}

#[tokio::test]
async fn stdin_is_forwarded_when_enabled() -> TestResult {
    init_tracing();
    let (tx, rx) = mpsc::channel(4);
    let relay = StdinRelay::from_receiver(rx);
    let mut launcher = launcher(
        sh(r#"read line; [ "$line" = hello ] && exit 7; exit 1"#),
        StopSignal::Term,
        Some(relay),
    );

    let run = launcher.launch(CancellationToken::new());
    tx.send(b"hello\n".to_vec()).await?;

    let exit = with_timeout(run).await?;
    assert_eq!(exit.code, Some(7));
    Ok(())
}

#[tokio::test]
async fn without_forwarding_stdin_is_empty() -> TestResult {
    init_tracing();
    let mut launcher = launcher(
        sh("if read line; then exit 1; else exit 0; fi"),
        StopSignal::Term,
        None,
    );

    let exit = with_timeout(launcher.launch(CancellationToken::new())).await?;
    assert!(exit.success());
    Ok(())
}

#[tokio::test]
async fn missing_program_is_a_spawn_error() -> TestResult {
    init_tracing();
    let mut launcher = launcher(
        vec!["/definitely/not/a/real/program".to_string()],
        StopSignal::Term,
        None,
    );

    let res = with_timeout(launcher.launch(CancellationToken::new())).await;
    assert!(matches!(res, Err(WatchrunError::Spawn(_))));
    Ok(())
}

#[tokio::test]
async fn one_relay_serves_consecutive_children() -> TestResult {
    init_tracing();
    let (tx, rx) = mpsc::channel(4);
    let relay = StdinRelay::from_receiver(rx);
    let mut launcher = launcher(
        sh(r#"read line; [ "$line" = ping ] && exit 0; exit 1"#),
        StopSignal::Term,
        Some(relay),
    );

    for _ in 0..2 {
        let run = launcher.launch(CancellationToken::new());
        tx.send(b"ping\n".to_vec()).await?;
        assert!(with_timeout(run).await?.success());
    }
    Ok(())
}
