use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use watchrun::fs::RealFileSystem;
use watchrun::types::Op;
use watchrun::watch::{new_backend, walk, EventRouter, MatchRules, WalkOptions, WatchBackend};
use watchrun_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

struct Scenario {
    root: PathBuf,
    backend: Arc<dyn WatchBackend>,
    triggers: mpsc::UnboundedReceiver<PathBuf>,
    cancel: CancellationToken,
}

impl Scenario {
    fn start(root: &Path, polling: Duration) -> Result<Self, Box<dyn Error>> {
        let cancel = CancellationToken::new();
        let (backend, streams) = new_backend(polling, &cancel)?;
        let rules = Arc::new(MatchRules::new(
            &["**/*.go".to_string()],
            &["**/*_test.go".to_string()],
        )?);
        let fs = Arc::new(RealFileSystem);

        walk(
            backend.as_ref(),
            fs.as_ref(),
            root,
            &rules,
            WalkOptions::default(),
        )?;

        let (tx, triggers) = mpsc::unbounded_channel();
        let router = EventRouter::new(Arc::clone(&backend), fs, rules, Op::all(), tx);
        tokio::spawn(router.run(streams, cancel.clone()));

        Ok(Self {
            root: root.to_path_buf(),
            backend,
            triggers,
            cancel,
        })
    }

    /// Wait until `path` is forwarded. Returns everything forwarded before it.
    async fn expect(&mut self, path: &Path) -> Vec<PathBuf> {
        with_timeout(async {
            let mut before = Vec::new();
            loop {
                let got = self.triggers.recv().await.expect("router stopped");
                if got == path {
                    return before;
                }
                before.push(got);
            }
        })
        .await
    }

    fn stop(self) {
        self.cancel.cancel();
        self.backend.close();
    }
}

async fn run_scenario(polling: Duration) -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    // Canonical, so native reports and our expectations agree on spelling.
    let root = dir.path().canonicalize()?;
    fs::write(root.join("main.go"), "package main\n")?;
    let outside = tempfile::tempdir()?;

    let mut s = Scenario::start(&root, polling)?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // A plain edit.
    fs::write(root.join("main.go"), "package main\n\nfunc main() {}\n")?;
    s.expect(&root.join("main.go")).await;

    // Ignored files never show up, even when they also match a pattern.
    fs::write(root.join("main_test.go"), "package main\n")?;
    fs::write(root.join("marker.go"), "package main\n")?;
    let before = s.expect(&root.join("marker.go")).await;
    assert!(!before.contains(&root.join("main_test.go")));

    // A directory created later is watched too.
    let sub = root.join("sub");
    fs::create_dir(&sub)?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    fs::write(sub.join("lib.go"), "package sub\n")?;
    s.expect(&sub.join("lib.go")).await;
    assert!(s.backend.watch_list().contains(&sub));

    // A tree moved in from elsewhere reports the files it brings along.
    let staged = outside.path().join("moved");
    fs::create_dir_all(staged.join("deeper"))?;
    fs::write(staged.join("deeper").join("util.go"), "package deeper\n")?;
    fs::rename(&staged, root.join("moved")).or_else(|_| {
        // Different filesystems: fall back to creating it in place.
        fs::create_dir_all(root.join("moved").join("deeper"))?;
        fs::write(
            root.join("moved").join("deeper").join("util.go"),
            "package deeper\n",
        )
    })?;
    s.expect(&root.join("moved").join("deeper").join("util.go"))
        .await;

    s.stop();
    Ok(())
}

#[tokio::test]
async fn polling_backend_scenario() -> TestResult {
    run_scenario(Duration::from_millis(25)).await
}

#[tokio::test]
async fn native_backend_scenario() -> TestResult {
    run_scenario(Duration::ZERO).await
}
