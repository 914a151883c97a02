// src/engine/mod.rs

//! Restart engine.
//!
//! This module ties together:
//! - the debounced trigger relay between the event router and the supervisor
//! - the supervisor loop that starts, stops and restarts the child when a
//!   trigger arrives, when the child exits on its own, or on shutdown
//!
//! The pure state machine lives in [`core`]; the async/IO shell is
//! implemented in [`supervisor`].

use std::path::PathBuf;

pub mod core;
pub mod supervisor;
pub mod trigger;

pub use core::{SupervisorCore, SupervisorState};
pub use supervisor::{Supervisor, SupervisorOptions};
pub use trigger::{debounced_trigger, DebouncedTrigger};

/// Inputs the supervisor core reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorInput {
    /// The child process was handed to the launcher.
    Launched,
    /// A qualifying change was observed at this path.
    Triggered(PathBuf),
    /// The current child is gone (exited, was stopped, or failed to start).
    ChildExited,
    /// The settle delay ran out.
    DelayElapsed,
    /// Outer cancellation (shutdown signal or fatal error elsewhere).
    Cancelled,
}

/// Command produced by the pure core, to be executed by the async shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorCommand {
    /// Start a new child.
    Launch,
    /// Start the settle delay timer.
    ArmDelay,
    /// Ask the current child to terminate.
    StopChild,
}

/// Decision returned by the core after handling a single input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreStep {
    /// Commands the shell should execute, in order.
    pub commands: Vec<SupervisorCommand>,
    /// Whether the supervisor loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn continue_with(commands: Vec<SupervisorCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn idle() -> Self {
        Self::continue_with(Vec::new())
    }

    fn exit() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: false,
        }
    }
}
