// src/exec/unix.rs

//! Process groups, signal delivery and SIGCHLD-driven reaping on unix.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{Result, WatchrunError};
use crate::types::StopSignal;

/// Put the child in a process group of its own, led by itself.
pub(crate) fn configure(cmd: &mut Command) {
    cmd.process_group(0);
}

fn to_nix(sig: StopSignal) -> Signal {
    match sig {
        StopSignal::Hup => Signal::SIGHUP,
        StopSignal::Int => Signal::SIGINT,
        StopSignal::Quit => Signal::SIGQUIT,
        StopSignal::Kill => Signal::SIGKILL,
        StopSignal::Usr1 => Signal::SIGUSR1,
        StopSignal::Usr2 => Signal::SIGUSR2,
        StopSignal::Term => Signal::SIGTERM,
        StopSignal::Winch => Signal::SIGWINCH,
    }
}

fn send(pid: u32, sig: Signal) -> Result<()> {
    let pgid = i32::try_from(pid).map_err(|_| WatchrunError::Terminate {
        pid,
        reason: "pid out of range".to_string(),
    })?;
    match killpg(Pid::from_raw(pgid), sig) {
        // Already gone.
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(WatchrunError::Terminate {
            pid,
            reason: format!("{sig}: {errno}"),
        }),
    }
}

/// Send `sig` to the process group led by `pid`.
///
/// A stopped group cannot act on anything but KILL, so every other signal is
/// followed by SIGCONT.
pub(crate) async fn signal_group(pid: u32, sig: StopSignal) -> Result<()> {
    let sig = to_nix(sig);
    send(pid, sig)?;
    if sig != Signal::SIGKILL && sig != Signal::SIGCONT {
        send(pid, Signal::SIGCONT)?;
    }
    Ok(())
}

pub(crate) async fn force_kill(pid: u32) -> Result<()> {
    send(pid, Signal::SIGKILL)
}

/// Detects child exit from SIGCHLD.
///
/// One listener task per detector bumps a generation counter on every
/// SIGCHLD; waiters try a non-blocking reap each time the counter moves.
/// Create it once and share clones.
#[derive(Debug, Clone)]
pub struct ExitDetector {
    generation: watch::Receiver<u64>,
}

impl ExitDetector {
    /// `_poll_interval` is only used on platforms without SIGCHLD.
    pub fn new(_poll_interval: Duration, cancel: &CancellationToken) -> Result<Self> {
        let mut sigchld = signal(SignalKind::child())?;
        let (tx, generation) = watch::channel(0u64);
        let cancel = cancel.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    got = sigchld.recv() => {
                        if got.is_none() {
                            break;
                        }
                        tx.send_modify(|g| *g = g.wrapping_add(1));
                    }
                }
            }
            debug!("SIGCHLD listener finished");
        });

        Ok(Self { generation })
    }

    /// Wait until `child` has exited and been reaped.
    pub async fn wait(&self, child: &mut Child) -> io::Result<ExitStatus> {
        let mut generation = self.generation.clone();
        loop {
            generation.borrow_and_update();
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if generation.changed().await.is_err() {
                // Listener gone (shutdown); fall back to tokio's own reaper.
                return child.wait().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_stop_signal_has_a_nix_counterpart() {
        assert_eq!(to_nix(StopSignal::Term), Signal::SIGTERM);
        assert_eq!(to_nix(StopSignal::Winch), Signal::SIGWINCH);
        assert_eq!(to_nix(StopSignal::Kill), Signal::SIGKILL);
    }

    #[tokio::test]
    async fn signalling_a_vanished_group_is_not_an_error() {
        let mut child = tokio::process::Command::new("true")
            .process_group(0)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        child.wait().await.unwrap();

        signal_group(pid, StopSignal::Term).await.unwrap();
        force_kill(pid).await.unwrap();
    }

    #[tokio::test]
    async fn detector_sees_exit() {
        let cancel = CancellationToken::new();
        let exits = ExitDetector::new(Duration::from_millis(100), &cancel).unwrap();

        let mut child = tokio::process::Command::new("sh")
            .args(["-c", "exit 3"])
            .spawn()
            .unwrap();
        let status = tokio::time::timeout(Duration::from_secs(5), exits.wait(&mut child))
            .await
            .expect("exit observed")
            .unwrap();
        assert_eq!(status.code(), Some(3));
        cancel.cancel();
    }
}
