// src/exec/launcher.rs

//! Pluggable child launcher.
//!
//! The supervisor talks to a [`ProcessLauncher`] instead of spawning
//! processes itself. Production uses [`CommandLauncher`]; tests swap in a
//! fake that scripts exits without touching the OS.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::errors::Result;
use crate::exec::child::{run_child, ChildSpec};
use crate::exec::stdin::StdinRelay;
use crate::exec::ExitDetector;
use crate::types::StopSignal;

/// How a child run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Whether we asked it to stop.
    pub stopped: bool,
}

impl ChildExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {code}")?,
            None => f.write_str("terminated by signal")?,
        }
        if self.stopped {
            f.write_str(" (stopped)")?;
        }
        Ok(())
    }
}

/// One child run: resolves once the child has been reaped.
///
/// Errors:
/// - [`WatchrunError::Spawn`](crate::errors::WatchrunError::Spawn) if the
///   process could not be started (the supervisor treats it as an exit);
/// - [`WatchrunError::Terminate`](crate::errors::WatchrunError::Terminate)
///   if stopping it failed (fatal for the supervisor).
pub type ChildRun = Pin<Box<dyn Future<Output = Result<ChildExit>> + Send + 'static>>;

/// Trait abstracting how the supervised command is started.
pub trait ProcessLauncher: Send {
    /// Start a child. Cancelling `cancel` asks it to stop: signal, grace
    /// window, then force kill.
    fn launch(&mut self, cancel: CancellationToken) -> ChildRun;
}

/// Real launcher used in production.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    argv: Vec<String>,
    signal: StopSignal,
    stdin: Option<StdinRelay>,
    exits: ExitDetector,
}

impl CommandLauncher {
    pub fn new(
        argv: Vec<String>,
        signal: StopSignal,
        stdin: Option<StdinRelay>,
        exits: ExitDetector,
    ) -> Self {
        Self {
            argv,
            signal,
            stdin,
            exits,
        }
    }
}

impl ProcessLauncher for CommandLauncher {
    fn launch(&mut self, cancel: CancellationToken) -> ChildRun {
        let spec = ChildSpec {
            argv: self.argv.clone(),
            signal: self.signal,
            stdin: self.stdin.clone(),
            exits: self.exits.clone(),
        };
        Box::pin(run_child(spec, cancel))
    }
}
