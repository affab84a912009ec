//! Power-trace recording.
//!
//! The measurement tool is an external program driven through two verbs:
//! `<program> calibrate` and `<program> record <milliseconds>`. A recording
//! runs as a background task while the test sequence keeps talking to the
//! module; the sequence joins it before reporting success.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A power-measurement instrument.
#[async_trait]
pub trait PowerRecorder: Send + Sync {
    async fn calibrate(&self) -> Result<()>;

    /// Record a trace for `duration`, returning once it is saved.
    async fn record(&self, duration: Duration) -> Result<()>;
}

/// Recorder used when measurement is disabled.
pub struct NullRecorder;

#[async_trait]
impl PowerRecorder for NullRecorder {
    async fn calibrate(&self) -> Result<()> {
        debug!("Recording disabled, skipping calibration");
        Ok(())
    }

    async fn record(&self, _duration: Duration) -> Result<()> {
        debug!("Recording disabled");
        Ok(())
    }
}

/// Recorder backed by an external command-line program.
pub struct ExternalRecorder {
    program: PathBuf,
}

impl ExternalRecorder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ExternalRecorder {
            program: program.into(),
        }
    }

    async fn invoke(&self, args: &[String]) -> Result<()> {
        debug!(program = %self.program.display(), ?args, "Running recorder");
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to start {}", self.program.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            info!(output = %stdout.trim(), "Recorder output");
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} {} exited with {}: {}",
                self.program.display(),
                args.join(" "),
                output.status,
                stderr.trim()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl PowerRecorder for ExternalRecorder {
    async fn calibrate(&self) -> Result<()> {
        info!("Calibrating");
        self.invoke(&["calibrate".to_string()]).await
    }

    async fn record(&self, duration: Duration) -> Result<()> {
        self.invoke(&["record".to_string(), duration.as_millis().to_string()])
            .await
    }
}

/// A recording in progress.
pub struct Recording {
    cancel: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

impl Recording {
    /// Spawn a background recording of `duration`.
    pub fn start(recorder: Arc<dyn PowerRecorder>, duration: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            info!(duration_ms = duration.as_millis() as u64, "Recording started");
            tokio::select! {
                result = recorder.record(duration) => {
                    info!("Recording complete");
                    result
                }
                _ = token.cancelled() => {
                    warn!("Recording cancelled");
                    Ok(())
                }
            }
        });
        Recording { cancel, handle }
    }

    /// Wait for the recording to finish.
    pub async fn join(self) -> Result<()> {
        self.handle.await.context("recording task failed")?
    }

    /// Stop the recording early and wait for the task to exit.
    ///
    /// An external recorder process is killed.
    pub async fn cancel(self) -> Result<()> {
        self.cancel.cancel();
        self.join().await
    }
}
