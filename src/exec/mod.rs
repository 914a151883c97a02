// src/exec/mod.rs

//! Child process control.
//!
//! - [`launcher`] provides the `ProcessLauncher` trait the supervisor talks
//!   to and the production `CommandLauncher`.
//! - [`child`] runs one child: own process group, optional stdin pipe, stop
//!   signal with a grace window, then force kill.
//! - [`stdin`] forwards our stdin to whichever child is current.
//! - `unix` / `windows` hold the platform side: process-group setup, signal
//!   delivery and exit detection ([`ExitDetector`]).

pub mod child;
pub mod launcher;
pub mod stdin;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as platform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as platform;

pub use child::TERM_GRACE;
pub use launcher::{ChildExit, ChildRun, CommandLauncher, ProcessLauncher};
pub use platform::ExitDetector;
pub use stdin::StdinRelay;
