//! Lifecycle events and the task runner that produces them.
//!
//! The lifecycle code reports progress through plain callbacks.
//! [`run_operation`] is the single place where those callbacks become
//! channel events for the UI: progress is rate-limited, the terminal event
//! is never dropped, and a fresh [`SystemStatus`] always follows it.

use std::fmt;
use std::path::PathBuf;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, trace};
use uuid::Uuid;

use super::manager::EngineManager;
use super::progress::{Throttle, PROGRESS_INTERVAL};
use super::types::{ModelMirror, RepoMirror, SystemStatus};

/// Identifies one run of a lifecycle operation.
pub type OperationId = Uuid;

// =============================================================================
// Operations
// =============================================================================

/// A lifecycle request issued by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Install(RepoMirror),
    Build,
    Download { asset: String, mirror: ModelMirror },
    Delete(String),
    Import(PathBuf),
    Uninstall,
    /// Probe for the Python `whisper` CLI; changes nothing on disk.
    CheckOpenAiWhisper,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install(mirror) => write!(f, "install whisper.cpp from {mirror}"),
            Self::Build => write!(f, "build whisper.cpp"),
            Self::Download { asset, mirror } => write!(f, "download {asset} from {mirror}"),
            Self::Delete(asset) => write!(f, "delete {asset}"),
            Self::Import(path) => write!(f, "import {}", path.display()),
            Self::Uninstall => write!(f, "uninstall whisper.cpp"),
            Self::CheckOpenAiWhisper => write!(f, "check for the OpenAI Whisper CLI"),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Events sent from a lifecycle operation to the GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// Operation has started.
    Started { id: OperationId, operation: Operation },

    /// Clone progress while git reports a known total.
    FetchProgress { phase: String, fraction: f32 },

    /// A line of compiler output.
    ProcessOutput(String),

    /// Combined model download progress, 0 to 100.
    DownloadProgress { label: String, percent: f32 },

    /// Operation succeeded.
    Completed { summary: String },

    /// Operation failed.
    Failed { error: String },

    /// Status recomputed after the operation settled. Always the last event.
    StatusChanged(SystemStatus),
}

/// Sender for lifecycle events.
pub type EventSender = mpsc::UnboundedSender<LifecycleEvent>;

/// Receiver for lifecycle events.
pub type EventReceiver = mpsc::UnboundedReceiver<LifecycleEvent>;

/// Create an event channel for a lifecycle operation.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

// =============================================================================
// Emitter
// =============================================================================

struct Emitter {
    tx: EventSender,
    throttle: Mutex<Throttle<LifecycleEvent>>,
}

impl Emitter {
    fn new(tx: EventSender) -> Self {
        Self {
            tx,
            throttle: Mutex::new(Throttle::default()),
        }
    }

    fn send(&self, event: LifecycleEvent) {
        // A closed receiver means the UI stopped listening; the work goes on.
        let _ = self.tx.send(event);
    }

    fn progress(&self, event: LifecycleEvent) {
        let ready = self
            .throttle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .offer(event, Instant::now());
        if let Some(event) = ready {
            self.send(event);
        }
    }

    /// Sends a held-back sample whose interval has passed.
    fn release_due(&self) {
        let due = self
            .throttle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .poll(Instant::now());
        if let Some(event) = due {
            self.send(event);
        }
    }

    /// Awaits `work`, releasing stalled progress every interval meanwhile.
    async fn drive<F: Future>(&self, work: F) -> F::Output {
        tokio::pin!(work);
        let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                output = &mut work => return output,
                _ = ticker.tick() => self.release_due(),
            }
        }
    }

    fn finish(&self, event: LifecycleEvent) {
        let pending = self
            .throttle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .flush();
        if let Some(pending) = pending {
            self.send(pending);
        }
        self.send(event);
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Runs `operation` on the current tokio runtime, streaming events to
/// `event_sender`.
///
/// # Example
///
/// ```ignore
/// use subforge_core::engine::{event_channel, run_operation, LifecycleEvent, Operation};
///
/// let (tx, mut rx) = event_channel();
/// let handle = run_operation(manager.clone(), Operation::Build, tx);
///
/// while let Some(event) = rx.recv().await {
///     match event {
///         LifecycleEvent::ProcessOutput(line) => println!("{line}"),
///         LifecycleEvent::StatusChanged(_) => break,
///         _ => {}
///     }
/// }
/// ```
pub fn run_operation(
    manager: Arc<EngineManager>,
    operation: Operation,
    event_sender: EventSender,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let id = OperationId::new_v4();
        info!(%id, %operation, "Starting lifecycle operation");

        let emitter = Emitter::new(event_sender);
        emitter.send(LifecycleEvent::Started {
            id,
            operation: operation.clone(),
        });

        let work = async {
            match &operation {
                Operation::Install(mirror) => manager
                    .install_dependency(*mirror, &|phase: &str, fraction: f32| {
                        emitter.progress(LifecycleEvent::FetchProgress {
                            phase: phase.to_string(),
                            fraction,
                        })
                    })
                    .await
                    .map(|outcome| outcome.describe().to_string()),
                Operation::Build => manager
                    .build_dependency(&|line: &str| {
                        trace!(line, "make");
                        emitter.progress(LifecycleEvent::ProcessOutput(line.to_string()))
                    })
                    .await
                    .map(|outcome| outcome.describe().to_string()),
                Operation::Download { asset, mirror } => manager
                    .download_asset(asset, *mirror, &|label: &str, percent: f32| {
                        emitter.progress(LifecycleEvent::DownloadProgress {
                            label: label.to_string(),
                            percent,
                        })
                    })
                    .await
                    .map(|()| format!("{asset} downloaded")),
                Operation::Delete(asset) => manager
                    .delete_asset(asset)
                    .await
                    .map(|()| format!("{asset} deleted")),
                Operation::Import(path) => manager
                    .import_asset(path)
                    .await
                    .map(|outcome| outcome.describe()),
                Operation::Uninstall => manager
                    .uninstall_dependency()
                    .await
                    .map(|()| "whisper.cpp removed".to_string()),
                Operation::CheckOpenAiWhisper => Ok(if manager.check_openai_whisper().await {
                    "OpenAI Whisper CLI is available".to_string()
                } else {
                    "OpenAI Whisper CLI not found".to_string()
                }),
            }
        };
        let result = emitter.drive(work).await;

        match result {
            Ok(summary) => {
                info!(%id, %summary, "Lifecycle operation completed");
                emitter.finish(LifecycleEvent::Completed { summary });
            }
            Err(e) => {
                error!(%id, %operation, error = %e, "Lifecycle operation failed");
                emitter.finish(LifecycleEvent::Failed {
                    error: e.to_string(),
                });
            }
        }

        emitter.send(LifecycleEvent::StatusChanged(manager.status()));
    })
}
