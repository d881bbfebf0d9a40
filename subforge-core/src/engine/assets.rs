//! Asset downloader: acquires the files that make up one model.
//!
//! Every call opens its own download session (a fresh event channel), so
//! concurrent acquisitions never see each other's events. The primary
//! weights and, on platforms that need it, the Core ML encoder archive are
//! transferred concurrently; their byte counts are combined into a single
//! percentage.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::catalog::{auxiliary_model_url, primary_model_url};
use super::downloader::{DownloadEvent, DownloadHost, DownloadRequest, DownloadState};
use super::error::{LifecycleError, LifecycleResult};
use super::extractor::extract_zip;
use super::paths::{validate_asset_name, EnginePaths};
use super::progress::CombinedProgress;
use super::types::{AssetPart, Capabilities, ModelMirror};

/// Receives `(label, percent)` for the acquisition.
pub type DownloadProgressCallback<'a> = &'a (dyn Fn(&str, f32) + Send + Sync);

/// The transfers needed to acquire `asset` on this platform.
pub fn plan_downloads(
    paths: &EnginePaths,
    caps: &Capabilities,
    asset: &str,
    mirror: ModelMirror,
) -> Vec<DownloadRequest> {
    let mut requests = vec![DownloadRequest {
        part: AssetPart::Primary,
        url: primary_model_url(asset, mirror),
        dest: paths.primary_model_file(asset),
    }];
    if caps.requires_auxiliary {
        requests.push(DownloadRequest {
            part: AssetPart::Auxiliary,
            url: auxiliary_model_url(asset, mirror),
            dest: paths.auxiliary_archive(asset),
        });
    }
    requests
}

/// Downloads `asset` unless every required file is already present.
///
/// Transfers land in `<dest>.part` and are renamed once complete, so a failed
/// download never looks installed.
pub async fn download(
    paths: &EnginePaths,
    caps: &Capabilities,
    host: &dyn DownloadHost,
    asset: &str,
    mirror: ModelMirror,
    on_progress: DownloadProgressCallback<'_>,
) -> LifecycleResult<()> {
    let asset = validate_asset_name(asset)?;

    if !paths.is_installed() {
        return Err(LifecycleError::NotInstalled);
    }
    if paths.asset_record(asset, caps).is_installed() {
        debug!(asset, "Model already present, nothing to download");
        return Ok(());
    }

    let requests = plan_downloads(paths, caps, asset, mirror);
    let parts: Vec<AssetPart> = requests.iter().map(|r| r.part).collect();
    let expected = requests.len();

    info!(asset, %mirror, parts = expected, "Downloading model");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handles: Vec<_> = requests
        .into_iter()
        .map(|request| host.begin(request, tx.clone()))
        .collect();
    // The session ends when every transfer has dropped its sender.
    drop(tx);

    let mut progress = CombinedProgress::new(&parts);
    let mut completed = 0usize;

    let result = loop {
        let Some(event) = rx.recv().await else {
            break Err(LifecycleError::DownloadFailed(format!(
                "{asset}: download session closed before completion"
            )));
        };

        match event {
            DownloadEvent::Progress {
                part,
                received,
                total,
            } => {
                let percent = progress.update(part, received, total);
                on_progress(asset, percent);
            }
            DownloadEvent::Finished {
                part,
                state: DownloadState::Completed,
            } => {
                debug!(asset, ?part, "Transfer completed");
                if part == AssetPart::Auxiliary {
                    if let Err(e) = unpack_auxiliary(paths, asset).await {
                        break Err(e);
                    }
                }
                completed += 1;
                if completed == expected {
                    break Ok(());
                }
            }
            DownloadEvent::Finished {
                part,
                state: DownloadState::Failed(cause),
            } => {
                break Err(LifecycleError::DownloadFailed(format!(
                    "{asset} ({}): {cause}",
                    part_label(part)
                )));
            }
            DownloadEvent::Finished {
                part,
                state: DownloadState::Cancelled,
            } => {
                break Err(LifecycleError::DownloadFailed(format!(
                    "{asset} ({}): cancelled",
                    part_label(part)
                )));
            }
        }
    };

    if let Err(e) = &result {
        warn!(asset, error = %e, "Model download failed");
        for handle in &handles {
            handle.cancel();
        }
        return result;
    }

    on_progress(asset, progress.complete());
    info!(asset, "Model download complete");
    Ok(())
}

fn part_label(part: AssetPart) -> &'static str {
    match part {
        AssetPart::Primary => "weights",
        AssetPart::Auxiliary => "Core ML encoder",
    }
}

/// Unpacks the encoder archive into the models directory and deletes it.
async fn unpack_auxiliary(paths: &EnginePaths, asset: &str) -> LifecycleResult<()> {
    let archive: PathBuf = paths.auxiliary_archive(asset);
    let models_dir = paths.models_dir().to_path_buf();

    let to_extract = archive.clone();
    tokio::task::spawn_blocking(move || extract_zip(&to_extract, &models_dir))
        .await
        .map_err(|e| LifecycleError::UnpackFailed(e.to_string()))?
        .map_err(|e| LifecycleError::UnpackFailed(format!("{e:#}")))?;

    tokio::fs::remove_file(&archive)
        .await
        .map_err(|e| LifecycleError::fs(&format!("Failed to remove {}", archive.display()), e))?;

    info!(asset, "Core ML encoder unpacked");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{encoder_zip, Ending, FakeDownloadHost, Transfer};
    use crate::engine::types::Platform;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    fn installed(temp: &TempDir) -> EnginePaths {
        let paths = EnginePaths::new(temp.path());
        std::fs::create_dir_all(paths.models_dir()).unwrap();
        paths
    }

    fn apple() -> Capabilities {
        Capabilities::for_platform(Some(Platform::MacosArm64))
    }

    fn linux() -> Capabilities {
        Capabilities::for_platform(Some(Platform::LinuxX64))
    }

    fn recorder() -> Mutex<Vec<f32>> {
        Mutex::new(Vec::new())
    }

    #[test]
    fn test_plan_downloads_per_platform() {
        let paths = EnginePaths::new("/data");
        let plan = plan_downloads(&paths, &linux(), "tiny", ModelMirror::HuggingFace);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].part, AssetPart::Primary);
        assert!(plan[0].url.starts_with("https://huggingface.co/"));

        let plan = plan_downloads(&paths, &apple(), "tiny", ModelMirror::HfMirror);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].dest, paths.auxiliary_archive("tiny"));
    }

    #[tokio::test]
    async fn test_download_requires_installation() {
        let temp = TempDir::new().unwrap();
        let paths = EnginePaths::new(temp.path());
        let host = FakeDownloadHost::new();

        let err = download(&paths, &linux(), &host, "tiny", ModelMirror::default(), &|_: &str, _: f32| {})
            .await
            .unwrap_err();

        assert_eq!(err, LifecycleError::NotInstalled);
        assert!(host.begun().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_asset_name_rejected() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        let host = FakeDownloadHost::new();

        let err = download(&paths, &linux(), &host, "../x", ModelMirror::default(), &|_: &str, _: f32| {})
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::InvalidAsset(_)));
    }

    #[tokio::test]
    async fn test_short_circuit_when_present() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        std::fs::write(paths.primary_model_file("tiny"), b"w").unwrap();
        std::fs::create_dir_all(paths.auxiliary_model_dir("tiny")).unwrap();
        let host = FakeDownloadHost::new();

        for caps in [linux(), apple()] {
            download(&paths, &caps, &host, "tiny", ModelMirror::default(), &|_: &str, _: f32| {})
                .await
                .unwrap();
        }

        assert!(host.begun().is_empty());
    }

    #[tokio::test]
    async fn test_primary_alone_is_not_enough_on_apple() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        std::fs::write(paths.primary_model_file("tiny"), b"w").unwrap();
        let host = FakeDownloadHost::new()
            .with(AssetPart::Auxiliary, Transfer::complete(encoder_zip("tiny")));

        download(&paths, &apple(), &host, "tiny", ModelMirror::default(), &|_: &str, _: f32| {})
            .await
            .unwrap();

        assert_eq!(host.begun().len(), 2);
        assert!(paths.asset_record("tiny", &apple()).is_installed());
    }

    #[tokio::test]
    async fn test_download_single_part() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        let host = FakeDownloadHost::new();
        let seen = recorder();

        download(&paths, &linux(), &host, "tiny", ModelMirror::default(), &|label: &str, p: f32| {
            assert_eq!(label, "tiny");
            seen.lock().unwrap().push(p);
        })
        .await
        .unwrap();

        assert!(paths.primary_model_file("tiny").is_file());
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.last(), Some(&100.0));
        assert_eq!(seen.iter().filter(|p| **p == 100.0).count(), 1);
    }

    #[tokio::test]
    async fn test_download_with_encoder_unpacks_and_removes_archive() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        let host = FakeDownloadHost::new()
            .with(AssetPart::Primary, Transfer::complete(vec![7u8; 400]))
            .with(AssetPart::Auxiliary, Transfer::complete(encoder_zip("tiny")));
        let seen = recorder();

        download(&paths, &apple(), &host, "tiny", ModelMirror::default(), &|_: &str, p: f32| {
            seen.lock().unwrap().push(p)
        })
        .await
        .unwrap();

        assert!(paths.auxiliary_model_dir("tiny").join("model.mil").is_file());
        assert!(!paths.auxiliary_archive("tiny").exists());
        assert!(paths.asset_record("tiny", &apple()).is_installed());

        let seen = seen.into_inner().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "not monotonic: {seen:?}");
        assert_eq!(seen.iter().filter(|p| **p == 100.0).count(), 1);
        assert_eq!(seen.last(), Some(&100.0));
    }

    #[tokio::test]
    async fn test_auxiliary_failure_after_primary_completed() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        let host = FakeDownloadHost::new().with(
            AssetPart::Auxiliary,
            Transfer::failing("interrupted").after(Duration::from_millis(30)),
        );
        let seen = recorder();

        let err = download(&paths, &apple(), &host, "tiny", ModelMirror::default(), &|_: &str, p: f32| {
            seen.lock().unwrap().push(p)
        })
        .await
        .unwrap_err();

        match err {
            LifecycleError::DownloadFailed(cause) => assert!(cause.contains("interrupted")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(paths.primary_model_file("tiny").is_file());
        assert!(!paths.asset_record("tiny", &apple()).is_installed());
        assert!(!seen.into_inner().unwrap().contains(&100.0));
    }

    #[tokio::test]
    async fn test_failure_cancels_remaining_transfer() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        let host = FakeDownloadHost::new()
            .with(AssetPart::Primary, Transfer::ending(Ending::Hang))
            .with(AssetPart::Auxiliary, Transfer::ending(Ending::Cancelled));

        let err = download(&paths, &apple(), &host, "tiny", ModelMirror::default(), &|_: &str, _: f32| {})
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::DownloadFailed(_)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(host.cancelled(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_encoder_archive_is_unpack_failure() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        let host = FakeDownloadHost::new()
            .with(AssetPart::Auxiliary, Transfer::complete(b"not a zip".to_vec()));

        let err = download(&paths, &apple(), &host, "tiny", ModelMirror::default(), &|_: &str, _: f32| {})
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::UnpackFailed(_)));
        assert!(!paths.asset_record("tiny", &apple()).is_installed());
    }
}
