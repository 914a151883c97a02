use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use watchrun::errors::WatchrunError;
use watchrun::exec::{ChildExit, ChildRun, ProcessLauncher};

/// What one fake child does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeChild {
    /// Runs until asked to stop.
    RunUntilStopped,
    /// Exits with `code` after `after`, unless stopped first.
    ExitAfter { after: Duration, code: i32 },
    /// Fails to start.
    FailToStart,
    /// Ignores the stop request and reports a termination failure.
    RefuseToStop,
}

/// Shared counters describing what the launcher did.
#[derive(Debug)]
pub struct LaunchLog {
    launches: watch::Sender<usize>,
    alive: AtomicUsize,
    max_alive: AtomicUsize,
    stops: AtomicUsize,
}

impl LaunchLog {
    fn new() -> Self {
        Self {
            launches: watch::channel(0).0,
            alive: AtomicUsize::new(0),
            max_alive: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn launches(&self) -> usize {
        *self.launches.borrow()
    }

    pub fn alive(&self) -> usize {
        self.alive.load(Ordering::SeqCst)
    }

    /// Highest number of children alive at the same time.
    pub fn max_alive(&self) -> usize {
        self.max_alive.load(Ordering::SeqCst)
    }

    /// How many children were stopped through their cancel token.
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` launches happened.
    pub async fn wait_launches(&self, n: usize) {
        let mut rx = self.launches.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    fn started(&self) {
        let alive = self.alive.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_alive.fetch_max(alive, Ordering::SeqCst);
        self.launches.send_modify(|count| *count += 1);
    }

    fn reaped(&self, stopped: bool) {
        self.alive.fetch_sub(1, Ordering::SeqCst);
        if stopped {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Scriptable launcher: each launch takes the next [`FakeChild`] from the
/// script, falling back to a default once the script is used up.
#[derive(Debug)]
pub struct FakeLauncher {
    script: VecDeque<FakeChild>,
    fallback: FakeChild,
    log: Arc<LaunchLog>,
}

impl FakeLauncher {
    pub fn new(fallback: FakeChild) -> Self {
        Self {
            script: VecDeque::new(),
            fallback,
            log: Arc::new(LaunchLog::new()),
        }
    }

    pub fn then(mut self, child: FakeChild) -> Self {
        self.script.push_back(child);
        self
    }

    pub fn log(&self) -> Arc<LaunchLog> {
        Arc::clone(&self.log)
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&mut self, cancel: CancellationToken) -> ChildRun {
        let behaviour = self.script.pop_front().unwrap_or(self.fallback);
        let log = Arc::clone(&self.log);
        log.started();
        debug!(?behaviour, launches = log.launches(), "fake child launched");

        Box::pin(async move {
            match behaviour {
                FakeChild::RunUntilStopped => {
                    cancel.cancelled().await;
                    log.reaped(true);
                    Ok(ChildExit {
                        code: None,
                        stopped: true,
                    })
                }
                FakeChild::ExitAfter { after, code } => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            log.reaped(true);
                            Ok(ChildExit { code: None, stopped: true })
                        }
                        _ = tokio::time::sleep(after) => {
                            log.reaped(false);
                            Ok(ChildExit { code: Some(code), stopped: false })
                        }
                    }
                }
                FakeChild::FailToStart => {
                    log.reaped(false);
                    Err(WatchrunError::Spawn(io::Error::new(
                        io::ErrorKind::NotFound,
                        "no such command",
                    )))
                }
                FakeChild::RefuseToStop => {
                    cancel.cancelled().await;
                    Err(WatchrunError::Terminate {
                        pid: 4242,
                        reason: "operation not permitted".to_string(),
                    })
                }
            }
        })
    }
}
