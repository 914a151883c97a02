// src/engine/trigger.rs

//! Debounced trigger between the event router and the supervisor.
//!
//! The router pushes paths into an unbounded input and never waits. A relay
//! task moves them into a single-slot channel with `try_send`; while the slot
//! is occupied further paths are dropped. The supervisor empties the slot
//! whenever it starts a child, so changes seen mid-cycle are folded into
//! that cycle.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Relay task state.
#[derive(Debug)]
pub struct DebouncedTrigger {
    input: mpsc::UnboundedReceiver<PathBuf>,
    output: mpsc::Sender<PathBuf>,
}

/// Create the trigger pipeline.
///
/// Returns the router-facing input, the relay (to be spawned with
/// [`DebouncedTrigger::run`]) and the supervisor-facing single-slot output.
pub fn debounced_trigger() -> (
    mpsc::UnboundedSender<PathBuf>,
    DebouncedTrigger,
    mpsc::Receiver<PathBuf>,
) {
    let (input_tx, input) = mpsc::unbounded_channel();
    let (output, output_rx) = mpsc::channel(1);
    (input_tx, DebouncedTrigger { input, output }, output_rx)
}

impl DebouncedTrigger {
    /// Relay until `cancel` fires or either side goes away.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let path = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                path = self.input.recv() => match path {
                    Some(path) => path,
                    None => break,
                },
            };

            match self.output.try_send(path) {
                Ok(()) => {}
                Err(TrySendError::Full(path)) => {
                    trace!(path = %path.display(), "restart already pending; coalesced");
                }
                Err(TrySendError::Closed(_)) => break,
            }
        }
        debug!("trigger relay finished");
    }
}

/// Discard anything left in the slot. Returns how many paths were dropped.
pub fn drain_stale(rx: &mut mpsc::Receiver<PathBuf>) -> usize {
    let mut dropped = 0;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}
