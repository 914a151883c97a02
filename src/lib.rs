// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::Config;
use crate::engine::{debounced_trigger, Supervisor, SupervisorOptions};
use crate::exec::{CommandLauncher, ExitDetector, StdinRelay};
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::walker::{walk, WalkOptions};
use crate::watch::{clean_path, new_backend, EventRouter, MatchRules, WatchBackend};

/// High-level entry point used by `main.rs`.
///
/// Resolves the configuration from `args` and runs until a shutdown signal
/// arrives (`Ok`) or a fatal watcher error occurs (`Err`).
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = config::resolve(&args)?;
    run_with_config(cfg).await
}

/// Run with an already validated configuration.
///
/// This wires together:
/// - the watch backend and the initial recursive registration of targets
/// - event router -> debounced trigger -> supervisor
/// - the child launcher (exit detection, optional stdin forwarding)
/// - shutdown signals
pub async fn run_with_config(cfg: Config) -> Result<()> {
    log_config(&cfg);

    let cancel = CancellationToken::new();
    let (backend, streams) =
        new_backend(cfg.polling_interval, &cancel).context("creating watcher")?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let rules = Arc::new(cfg.rules.clone());

    if let Err(err) = register_targets(&backend, &fs, &rules, &cfg.targets).await {
        backend.close();
        return Err(err);
    }

    let (trigger_tx, relay, trigger_rx) = debounced_trigger();
    tokio::spawn(relay.run(cancel.clone()));

    let router = EventRouter::new(
        Arc::clone(&backend),
        Arc::clone(&fs),
        Arc::clone(&rules),
        cfg.trigger_mask(),
        trigger_tx,
    );
    let mut router_task = tokio::spawn(router.run(streams, cancel.clone()));

    let exits = ExitDetector::new(cfg.delay / 2, &cancel).context("setting up exit detection")?;
    let stdin = if cfg.forward_stdin {
        Some(StdinRelay::spawn().context("starting stdin reader")?)
    } else {
        None
    };
    let launcher = CommandLauncher::new(cfg.command.clone(), cfg.signal, stdin, exits);
    let options = SupervisorOptions {
        delay: cfg.delay,
        restart_on_exit: cfg.restart_on_exit,
        display_command: cfg.display_command(),
    };
    let mut supervisor_task =
        tokio::spawn(Supervisor::new(launcher, trigger_rx, options, cancel.clone()).run());

    let finished = tokio::select! {
        sig = shutdown_signal() => Finished::Signal(sig),
        res = &mut router_task => Finished::Router(res),
        res = &mut supervisor_task => Finished::Supervisor(res),
    };

    cancel.cancel();

    let outcome = match finished {
        Finished::Signal(Ok(name)) => {
            info!(signal = name, "signal received; shutting down");
            join_supervisor(supervisor_task).await
        }
        Finished::Signal(Err(err)) => {
            let _ = join_supervisor(supervisor_task).await;
            Err(anyhow!(err).context("listening for shutdown signals"))
        }
        Finished::Router(res) => {
            let sup = join_supervisor(supervisor_task).await;
            match flatten(res) {
                Ok(()) => sup,
                Err(err) => {
                    error!(error = %err, "watcher failed");
                    Err(err.context("watcher error"))
                }
            }
        }
        Finished::Supervisor(res) => {
            let _ = router_task.await;
            flatten(res)
        }
    };

    backend.close();
    outcome
}

enum Finished {
    Signal(std::io::Result<&'static str>),
    Router(std::result::Result<errors::Result<()>, tokio::task::JoinError>),
    Supervisor(std::result::Result<errors::Result<()>, tokio::task::JoinError>),
}

fn flatten(res: std::result::Result<errors::Result<()>, tokio::task::JoinError>) -> Result<()> {
    res.map_err(|e| anyhow!("task failed: {e}"))?.map_err(anyhow::Error::from)
}

async fn join_supervisor(task: JoinHandle<errors::Result<()>>) -> Result<()> {
    flatten(task.await).context("supervisor")
}

/// Register every target (recursively for directories). Any failure here is
/// fatal.
async fn register_targets(
    backend: &Arc<dyn WatchBackend>,
    fs: &Arc<dyn FileSystem>,
    rules: &Arc<MatchRules>,
    targets: &[PathBuf],
) -> Result<()> {
    let backend = Arc::clone(backend);
    let fs = Arc::clone(fs);
    let rules = Arc::clone(rules);
    let targets: Vec<PathBuf> = targets.iter().map(|t| clean_path(t)).collect();

    tokio::task::spawn_blocking(move || -> Result<()> {
        for target in targets {
            let report = walk(
                backend.as_ref(),
                fs.as_ref(),
                &target,
                &rules,
                WalkOptions::default(),
            )
            .with_context(|| format!("watching target {}", target.display()))?;
            debug!(
                target = %target.display(),
                registered = report.registered.len(),
                "target registered"
            );
        }
        Ok(())
    })
    .await
    .map_err(|e| anyhow!("target registration failed: {e}"))?
}

fn log_config(cfg: &Config) {
    debug!(command = ?cfg.command, "config");
    debug!(targets = ?cfg.targets, "config");
    debug!(patterns = ?cfg.rules.patterns(), "config");
    debug!(ignores = ?cfg.rules.ignores(), "config");
    debug!(delay = ?cfg.delay, "config");
    debug!(signal = %cfg.signal, "config");
    debug!(restart = cfg.restart_on_exit, "config");
    debug!(filter = %cfg.event_filter, "config");
    debug!(polling = ?cfg.polling_interval, "config");
    debug!(stdin = cfg.forward_stdin, "config");
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hup = signal(SignalKind::hangup())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;
    let name = tokio::select! {
        _ = hup.recv() => "SIGHUP",
        _ = int.recv() => "SIGINT",
        _ = term.recv() => "SIGTERM",
    };
    Ok(name)
}

#[cfg(windows)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl-C")
}
