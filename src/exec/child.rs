// src/exec/child.rs

//! A single run of the supervised command.

use std::io;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{Result, WatchrunError};
use crate::exec::launcher::ChildExit;
use crate::exec::platform;
use crate::exec::stdin::StdinRelay;
use crate::exec::ExitDetector;
use crate::types::StopSignal;

/// How long a signalled child gets before it is force-killed.
pub const TERM_GRACE: Duration = Duration::from_secs(5);

/// Everything needed to start one child.
#[derive(Debug, Clone)]
pub(crate) struct ChildSpec {
    pub argv: Vec<String>,
    pub signal: StopSignal,
    pub stdin: Option<StdinRelay>,
    pub exits: ExitDetector,
}

/// Start the command in its own process group and wait for it.
///
/// When `cancel` fires the group is sent the stop signal; a child still
/// alive after [`TERM_GRACE`] is killed. Either way the child is reaped
/// before this returns.
pub(crate) async fn run_child(spec: ChildSpec, cancel: CancellationToken) -> Result<ChildExit> {
    let Some((program, args)) = spec.argv.split_first() else {
        return Err(WatchrunError::Spawn(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty command",
        )));
    };

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
    platform::configure(&mut cmd);

    let mut child = cmd.spawn().map_err(WatchrunError::Spawn)?;
    let pid = child.id().ok_or_else(|| {
        WatchrunError::Spawn(io::Error::other("child exited before its pid was read"))
    })?;
    let started = Instant::now();
    debug!(pid, "child started");

    // Fires once the child is reaped so the stdin pump lets go.
    let exited = CancellationToken::new();
    let _exited_guard = exited.clone().drop_guard();
    if let (Some(relay), Some(pipe)) = (spec.stdin, child.stdin.take()) {
        tokio::spawn(relay.pump(pipe, exited.clone()));
    }

    let finished = tokio::select! {
        res = spec.exits.wait(&mut child) => Some(res),
        _ = cancel.cancelled() => None,
    };

    let (status, stopped) = match finished {
        Some(res) => (res?, false),
        None => {
            debug!(pid, signal = %spec.signal, "stopping child");
            platform::signal_group(pid, spec.signal).await?;

            let graceful = tokio::time::timeout(TERM_GRACE, spec.exits.wait(&mut child)).await;
            let status = match graceful {
                Ok(res) => res?,
                Err(_) => {
                    warn!(pid, grace = ?TERM_GRACE, "child ignored stop signal; killing");
                    platform::force_kill(pid).await?;
                    spec.exits.wait(&mut child).await?
                }
            };
            (status, true)
        }
    };

    let exit = ChildExit {
        code: status.code(),
        stopped,
    };
    debug!(pid, elapsed = ?started.elapsed(), "child reaped: {exit}");
    Ok(exit)
}
