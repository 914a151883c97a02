// src/exec/stdin.rs

//! Stdin forwarding.
//!
//! One OS thread reads our stdin for the whole process lifetime and hands
//! chunks over a single-slot channel. Each child gets a pump task that pulls
//! from that channel into the child's stdin pipe until the child exits, so a
//! pending read of our stdin never holds up a restart.

use std::io::{self, Read};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Read size of the stdin reader thread.
pub const CHUNK_SIZE: usize = 255;

/// Shared handle to the stdin chunk stream.
#[derive(Debug, Clone)]
pub struct StdinRelay {
    input: Arc<Mutex<mpsc::Receiver<Vec<u8>>>>,
}

impl StdinRelay {
    /// Start the reader thread on the real stdin.
    ///
    /// The stream ends (and every later child sees EOF) once stdin reaches
    /// end of file or fails.
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel(1);
        std::thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || read_loop(io::stdin().lock(), tx))?;
        Ok(Self::from_receiver(rx))
    }

    /// Build a relay over an existing chunk stream.
    pub fn from_receiver(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            input: Arc::new(Mutex::new(rx)),
        }
    }

    /// Copy chunks into `pipe` until the input ends or `exited` fires.
    ///
    /// Dropping `pipe` on return closes the child's stdin.
    pub async fn pump(self, mut pipe: ChildStdin, exited: CancellationToken) {
        loop {
            let chunk = tokio::select! {
                biased;
                _ = exited.cancelled() => break,
                chunk = async { self.input.lock().await.recv().await } => chunk,
            };
            let Some(bytes) = chunk else {
                debug!("stdin closed; closing child stdin");
                break;
            };

            let written = tokio::select! {
                biased;
                _ = exited.cancelled() => break,
                res = async {
                    pipe.write_all(&bytes).await?;
                    pipe.flush().await
                } => res,
            };
            if let Err(err) = written {
                debug!(error = %err, "child stdin closed");
                break;
            }
        }
    }
}

fn read_loop(mut stdin: impl Read, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        match stdin.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(error = %err, "stdin read failed");
                break;
            }
        }
    }
}
