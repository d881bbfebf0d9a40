//! Scripted collaborators for lifecycle tests.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::downloader::{
    partial_path, DownloadEvent, DownloadEventSender, DownloadHandle, DownloadHost,
    DownloadRequest, DownloadState,
};
use super::process::{CommandSpec, LineCallback, ProcessOutcome, ProcessRunner};
use super::types::AssetPart;

// ============================================================================
// Process runner
// ============================================================================

/// One scripted process run.
#[derive(Debug, Clone, Default)]
pub struct Step {
    exit_code: i32,
    delay: Duration,
    hold: Duration,
    lines: Vec<String>,
    dirs: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

impl Step {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn fail(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Default::default()
        }
    }

    pub fn line(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    /// Waits `delay` before producing any output.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Waits `hold` after the output before exiting.
    pub fn hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn creates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.push(dir.into());
        self
    }

    pub fn creates_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.files.push(file.into());
        self
    }
}

/// `ProcessRunner` that replays steps in order and records every command.
///
/// Once the script is exhausted every run succeeds without side effects.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        on_line: LineCallback<'_>,
    ) -> std::io::Result<ProcessOutcome> {
        self.calls.lock().unwrap().push(spec.clone());
        let step = self.steps.lock().unwrap().pop_front().unwrap_or_default();
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }

        for dir in &step.dirs {
            std::fs::create_dir_all(dir)?;
        }
        for file in &step.files {
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(file, b"bin")?;
        }
        for line in &step.lines {
            on_line(line);
        }
        if !step.hold.is_zero() {
            tokio::time::sleep(step.hold).await;
        }

        Ok(ProcessOutcome {
            exit_code: Some(step.exit_code),
            output: step.lines.join("\n"),
        })
    }
}

// ============================================================================
// Download host
// ============================================================================

/// How a scripted transfer ends.
#[derive(Debug, Clone)]
pub enum Ending {
    /// Writes the bytes to the destination and completes.
    Complete(Vec<u8>),
    /// Leaves a few bytes in the `.part` file and fails.
    Fail(String),
    Cancelled,
    /// Never finishes; only ends by cancellation.
    Hang,
}

/// Scripted behavior of one sub-download.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub delay: Duration,
    pub progress: Vec<(u64, Option<u64>)>,
    pub ending: Ending,
}

impl Transfer {
    pub fn complete(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        Self {
            delay: Duration::ZERO,
            progress: vec![(0, Some(len)), (len / 2, Some(len)), (len, Some(len))],
            ending: Ending::Complete(bytes),
        }
    }

    pub fn failing(cause: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            progress: vec![(0, Some(100))],
            ending: Ending::Fail(cause.to_string()),
        }
    }

    pub fn ending(ending: Ending) -> Self {
        Self {
            delay: Duration::ZERO,
            progress: Vec::new(),
            ending,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Increments the counter when dropped before being disarmed.
struct CancelProbe {
    counter: Arc<AtomicUsize>,
    armed: bool,
}

impl Drop for CancelProbe {
    fn drop(&mut self) {
        if self.armed {
            self.counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// `DownloadHost` that plays back a scripted transfer per asset part.
#[derive(Debug, Default)]
pub struct FakeDownloadHost {
    transfers: Mutex<HashMap<AssetPart, Transfer>>,
    begun: Mutex<Vec<DownloadRequest>>,
    cancelled: Arc<AtomicUsize>,
}

impl FakeDownloadHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, part: AssetPart, transfer: Transfer) -> Self {
        self.set(part, transfer);
        self
    }

    /// Replaces the script for `part` for later transfers.
    pub fn set(&self, part: AssetPart, transfer: Transfer) {
        self.transfers.lock().unwrap().insert(part, transfer);
    }

    pub fn begun(&self) -> Vec<DownloadRequest> {
        self.begun.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl DownloadHost for FakeDownloadHost {
    fn begin(&self, request: DownloadRequest, events: DownloadEventSender) -> DownloadHandle {
        self.begun.lock().unwrap().push(request.clone());
        let transfer = self
            .transfers
            .lock()
            .unwrap()
            .get(&request.part)
            .cloned()
            .unwrap_or_else(|| Transfer::complete(b"weights".to_vec()));
        let counter = self.cancelled.clone();

        let task = tokio::spawn(async move {
            let mut probe = CancelProbe {
                counter,
                armed: true,
            };
            let part = request.part;

            if !transfer.delay.is_zero() {
                tokio::time::sleep(transfer.delay).await;
            }
            for (received, total) in transfer.progress {
                let _ = events.send(DownloadEvent::Progress {
                    part,
                    received,
                    total,
                });
            }

            let partial = partial_path(&request.dest);
            if let Some(parent) = request.dest.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }

            let state = match transfer.ending {
                Ending::Complete(bytes) => {
                    std::fs::write(&partial, bytes).unwrap();
                    std::fs::rename(&partial, &request.dest).unwrap();
                    DownloadState::Completed
                }
                Ending::Fail(cause) => {
                    std::fs::write(&partial, [0u8; 10]).unwrap();
                    DownloadState::Failed(cause)
                }
                Ending::Cancelled => DownloadState::Cancelled,
                Ending::Hang => futures::future::pending::<DownloadState>().await,
            };
            probe.armed = false;
            let _ = events.send(DownloadEvent::Finished { part, state });
        });

        DownloadHandle::from_task(task)
    }
}

/// Builds an in-memory zip holding a minimal Core ML encoder package.
pub fn encoder_zip(asset: &str) -> Vec<u8> {
    use std::io::Write;

    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip.start_file(
            format!("ggml-{asset}-encoder.mlmodelc/model.mil"),
            options,
        )
        .unwrap();
        zip.write_all(b"program").unwrap();
        zip.finish().unwrap();
    }
    buf.into_inner()
}
