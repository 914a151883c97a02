// src/exec/windows.rs

//! Process groups, tree kill and polled exit detection on Windows.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::errors::{Result, WatchrunError};
use crate::types::StopSignal;

const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) fn configure(cmd: &mut Command) {
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

/// Kill the whole process tree. Windows has no signal delivery, so `_sig`
/// is ignored.
pub(crate) async fn signal_group(pid: u32, _sig: StopSignal) -> Result<()> {
    let output = Command::new("TASKKILL")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| WatchrunError::Terminate {
            pid,
            reason: e.to_string(),
        })?;
    if output.status.success() {
        return Ok(());
    }
    // 128: process not found.
    if output.status.code() == Some(128) {
        return Ok(());
    }
    Err(WatchrunError::Terminate {
        pid,
        reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

pub(crate) async fn force_kill(pid: u32) -> Result<()> {
    signal_group(pid, StopSignal::Kill).await
}

/// Detects child exit by polling its status.
#[derive(Debug, Clone)]
pub struct ExitDetector {
    interval: Duration,
}

impl ExitDetector {
    /// Poll every `poll_interval` (half the restart delay).
    pub fn new(poll_interval: Duration, _cancel: &CancellationToken) -> Result<Self> {
        Ok(Self {
            interval: poll_interval.max(MIN_POLL_INTERVAL),
        })
    }

    pub async fn wait(&self, child: &mut Child) -> io::Result<ExitStatus> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
