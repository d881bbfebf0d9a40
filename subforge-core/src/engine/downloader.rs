//! Async file downloads with progress reporting and URL validation.
//!
//! `DownloadHost` is the download-session seam used by the asset downloader:
//! it begins one transfer and reports byte progress and a terminal state on
//! an event channel. `HttpDownloadHost` streams with reqwest.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::types::AssetPart;

// ============================================================================
// URL Security Validation
// ============================================================================

/// Allowed domains for downloads.
const ALLOWED_DOMAINS: &[&str] = &["github.com", "gitee.com", "huggingface.co", "hf-mirror.com"];

/// Validates that a URL is safe for downloading.
///
/// Checks:
/// - URL scheme must be HTTPS
/// - Host must be in the allowed domain list
pub fn validate_url(url_str: &str) -> Result<()> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL: {}", url_str))?;

    if url.scheme() != "https" {
        anyhow::bail!("URL must use HTTPS: {}", url_str);
    }

    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("URL must have a host: {}", url_str))?;

    // Subdomains count (cdn-lfs.huggingface.co)
    let is_allowed = ALLOWED_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)));

    if !is_allowed {
        anyhow::bail!(
            "Download domain not allowed: {}. Allowed: {:?}",
            host,
            ALLOWED_DOMAINS
        );
    }

    Ok(())
}

// ============================================================================
// Download Session Types
// ============================================================================

/// One transfer inside an asset acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub part: AssetPart,
    pub url: String,
    pub dest: PathBuf,
}

/// Terminal state of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadState {
    Completed,
    Failed(String),
    Cancelled,
}

/// Event reported by a download host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    Progress {
        part: AssetPart,
        received: u64,
        /// Total bytes, once the server has announced it.
        total: Option<u64>,
    },
    Finished {
        part: AssetPart,
        state: DownloadState,
    },
}

pub type DownloadEventSender = mpsc::UnboundedSender<DownloadEvent>;
pub type DownloadEventReceiver = mpsc::UnboundedReceiver<DownloadEvent>;

/// Handle to a running transfer.
#[derive(Debug, Default)]
pub struct DownloadHandle {
    task: Option<JoinHandle<()>>,
}

impl DownloadHandle {
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A handle with nothing to cancel.
    pub fn detached() -> Self {
        Self { task: None }
    }

    /// Stops the transfer. No terminal event is sent for a cancelled transfer.
    pub fn cancel(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Host capability that performs downloads.
///
/// Implementations write into [`partial_path`] while transferring and move
/// the file to `dest` only once it is complete, so `dest` never holds a
/// truncated file.
pub trait DownloadHost: Send + Sync {
    /// Begins `request`, reporting on `events` until a `Finished` event.
    fn begin(&self, request: DownloadRequest, events: DownloadEventSender) -> DownloadHandle;
}

// ============================================================================
// HTTP Download Host
// ============================================================================

/// `DownloadHost` that streams over HTTPS with reqwest.
#[derive(Debug, Clone, Default)]
pub struct HttpDownloadHost {
    client: reqwest::Client,
}

impl HttpDownloadHost {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl DownloadHost for HttpDownloadHost {
    fn begin(&self, request: DownloadRequest, events: DownloadEventSender) -> DownloadHandle {
        let client = self.client.clone();

        let task = tokio::spawn(async move {
            let part = request.part;
            let progress_events = events.clone();
            let result = download_file(&client, &request.url, &request.dest, |received, total| {
                let _ = progress_events.send(DownloadEvent::Progress {
                    part,
                    received,
                    total,
                });
            })
            .await;

            let state = match result {
                Ok(_) => DownloadState::Completed,
                Err(e) => {
                    warn!(url = %request.url, error = %e, "Download failed");
                    DownloadState::Failed(format!("{e:#}"))
                }
            };
            let _ = events.send(DownloadEvent::Finished { part, state });
        });

        DownloadHandle::from_task(task)
    }
}

// ============================================================================
// Download Function
// ============================================================================

/// Where an unfinished transfer to `dest` is written: `<dest>.part`.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Downloads a file from a URL with streaming and progress reporting.
///
/// `progress_cb` receives `(bytes_downloaded, total_bytes)`. Bytes go to
/// [`partial_path`] and are renamed to `dest` after the final flush; a
/// failed transfer leaves the `.part` file behind.
///
/// # Returns
///
/// The total number of bytes downloaded.
///
/// # Errors
///
/// Returns an error if:
/// - The URL is not HTTPS or from an allowed domain.
/// - The network request fails.
/// - The server returns a non-success status code.
/// - The file cannot be created or written.
pub async fn download_file<F>(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    progress_cb: F,
) -> Result<u64>
where
    F: Fn(u64, Option<u64>),
{
    info!("Downloading {} to {}", url, dest.display());

    validate_url(url)?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to start download from {}", url))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!(
            "Download failed with status {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        );
    }

    let total_bytes = response.content_length();
    debug!("Content-Length: {:?}", total_bytes);

    let partial = partial_path(dest);
    let bytes_downloaded =
        write_stream(response.bytes_stream(), total_bytes, &partial, &progress_cb).await?;

    tokio::fs::rename(&partial, dest)
        .await
        .with_context(|| format!("Failed to move {} into place", partial.display()))?;

    info!(
        "Download complete: {} bytes written to {}",
        bytes_downloaded,
        dest.display()
    );

    Ok(bytes_downloaded)
}

/// Writes every chunk of `stream` to `path`, reporting progress after each.
async fn write_stream<S, B, E, F>(
    stream: S,
    total_bytes: Option<u64>,
    path: &Path,
    progress_cb: &F,
) -> Result<u64>
where
    S: futures::Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
    F: Fn(u64, Option<u64>),
{
    let mut stream = std::pin::pin!(stream);
    let mut file = File::create(path)
        .await
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut bytes_downloaded: u64 = 0;

    progress_cb(0, total_bytes);

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.with_context(|| "Failed to read chunk from response stream")?;
        let chunk = chunk.as_ref();

        file.write_all(chunk)
            .await
            .with_context(|| "Failed to write chunk to file")?;

        bytes_downloaded += chunk.len() as u64;
        progress_cb(bytes_downloaded, total_bytes);
    }

    file.flush().await.context("Failed to flush file")?;
    Ok(bytes_downloaded)
}
