// src/engine/supervisor.rs

use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::core::SupervisorCore;
use crate::engine::trigger::drain_stale;
use crate::engine::{SupervisorCommand, SupervisorInput};
use crate::errors::{Result, WatchrunError};
use crate::exec::{ChildExit, ChildRun, ProcessLauncher};

/// Settings the supervisor runs with.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub delay: Duration,
    pub restart_on_exit: bool,
    /// Command line shown in log lines.
    pub display_command: String,
}

/// The child currently owned by the supervisor.
struct ActiveChild {
    cancel: CancellationToken,
    run: ChildRun,
}

/// What woke the supervisor loop.
enum Wake {
    Cancelled,
    Trigger(Option<PathBuf>),
    Child(Result<ChildExit>),
    Delay,
}

/// Starts, stops and restarts the child in response to triggers, its own
/// exit and shutdown.
///
/// This is the IO shell around [`SupervisorCore`], which holds all the
/// transition rules. This struct owns the timer, the trigger channel and
/// the running child.
pub struct Supervisor<L: ProcessLauncher> {
    core: SupervisorCore,
    launcher: L,
    triggers: mpsc::Receiver<PathBuf>,
    triggers_open: bool,
    options: SupervisorOptions,
    cancel: CancellationToken,
    child: Option<ActiveChild>,
    delay: Option<Pin<Box<Sleep>>>,
}

impl<L: ProcessLauncher> fmt::Debug for Supervisor<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("core", &self.core)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<L: ProcessLauncher> Supervisor<L> {
    pub fn new(
        launcher: L,
        triggers: mpsc::Receiver<PathBuf>,
        options: SupervisorOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            core: SupervisorCore::new(options.restart_on_exit),
            launcher,
            triggers,
            triggers_open: true,
            options,
            cancel,
            child: None,
            delay: None,
        }
    }

    /// Main loop. Returns once `cancel` has fired and the child is reaped,
    /// or with an error if stopping the child failed.
    pub async fn run(mut self) -> Result<()> {
        let first = self.core.start();
        self.execute(first.commands);

        loop {
            let wake = self.next_wake().await;
            let input = match wake {
                Wake::Cancelled => {
                    debug!("supervisor cancelled");
                    SupervisorInput::Cancelled
                }
                Wake::Trigger(Some(path)) => {
                    info!(path = %path.display(), "triggered");
                    SupervisorInput::Triggered(path)
                }
                Wake::Trigger(None) => {
                    debug!("trigger channel closed");
                    self.triggers_open = false;
                    continue;
                }
                Wake::Child(res) => {
                    self.child = None;
                    match res {
                        Ok(exit) if exit.success() => info!("command exit status 0"),
                        Ok(exit) => info!(%exit, "command exited"),
                        Err(err @ WatchrunError::Terminate { .. }) => {
                            error!(error = %err, "failed to stop command");
                            return Err(err);
                        }
                        Err(err) => warn!(error = %err, "command error"),
                    }
                    SupervisorInput::ChildExited
                }
                Wake::Delay => {
                    self.delay = None;
                    SupervisorInput::DelayElapsed
                }
            };

            let step = self.core.step(input);
            self.execute(step.commands);
            if !step.keep_running {
                break;
            }
        }

        debug!("supervisor exiting");
        Ok(())
    }

    async fn next_wake(&mut self) -> Wake {
        let listen_cancel = self.core.accepts_cancel();
        let listen_triggers = self.triggers_open && self.core.accepts_triggers();

        tokio::select! {
            biased;
            _ = self.cancel.cancelled(), if listen_cancel => Wake::Cancelled,
            res = wait_child(&mut self.child) => Wake::Child(res),
            _ = wait_delay(&mut self.delay) => Wake::Delay,
            path = self.triggers.recv(), if listen_triggers => Wake::Trigger(path),
        }
    }

    fn execute(&mut self, commands: Vec<SupervisorCommand>) {
        for command in commands {
            match command {
                SupervisorCommand::Launch => self.launch(),
                SupervisorCommand::ArmDelay => {
                    debug!(delay = ?self.options.delay, "waiting before restart");
                    self.delay = Some(Box::pin(tokio::time::sleep(self.options.delay)));
                }
                SupervisorCommand::StopChild => {
                    if let Some(child) = &self.child {
                        child.cancel.cancel();
                    }
                }
            }
        }
    }

    fn launch(&mut self) {
        let dropped = drain_stale(&mut self.triggers);
        if dropped > 0 {
            debug!(dropped, "discarded triggers from previous cycle");
        }

        info!(command = %self.options.display_command, "start");
        let cancel = self.cancel.child_token();
        let run = self.launcher.launch(cancel.clone());
        self.child = Some(ActiveChild { cancel, run });

        self.core.step(SupervisorInput::Launched);
    }
}

async fn wait_child(child: &mut Option<ActiveChild>) -> Result<ChildExit> {
    match child {
        Some(child) => child.run.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn wait_delay(delay: &mut Option<Pin<Box<Sleep>>>) {
    match delay {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
