//! End-to-end lifecycle through the public API with a fake toolchain and
//! download host.

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use subforge_core::engine::downloader::{
    partial_path, DownloadEvent, DownloadEventSender, DownloadHandle, DownloadRequest,
    DownloadState,
};
use subforge_core::engine::process::{CommandSpec, LineCallback, ProcessOutcome};
use subforge_core::engine::{
    event_channel, run_operation, Capabilities, DownloadHost, EngineManager, EnginePaths,
    LifecycleEvent, ModelMirror, Operation, Platform, ProcessRunner, RepoMirror, SystemStatus,
};

/// Behaves like git and make: clone creates the source tree, make produces
/// the executable unless CUDA is requested on a machine without nvcc.
struct FakeToolchain {
    paths: EnginePaths,
    cuda_available: bool,
}

#[async_trait]
impl ProcessRunner for FakeToolchain {
    async fn run(
        &self,
        spec: &CommandSpec,
        on_line: LineCallback<'_>,
    ) -> std::io::Result<ProcessOutcome> {
        match spec.program.as_str() {
            "git" => {
                on_line("Cloning into 'whisper.cpp'...");
                on_line("Receiving objects: 100% (800/800), done.");
                std::fs::create_dir_all(self.paths.models_dir())?;
            }
            "make" => {
                let wants_cuda = spec.envs.iter().any(|(k, _)| k == "WHISPER_CUBLAS");
                if wants_cuda && !self.cuda_available {
                    on_line("nvcc: command not found");
                    return Ok(ProcessOutcome {
                        exit_code: Some(2),
                        output: "make: nvcc: No such file or directory".to_string(),
                    });
                }
                on_line("cc -O3 -c whisper.cpp");
                std::fs::write(self.paths.executable(), b"#!/bin/sh\n")?;
            }
            other => panic!("unexpected program {other}"),
        }

        Ok(ProcessOutcome {
            exit_code: Some(0),
            output: String::new(),
        })
    }
}

/// Writes half the payload into the `.part` file, then either fails or
/// finishes it and moves it into place.
struct InstantDownloads {
    fail: bool,
}

impl DownloadHost for InstantDownloads {
    fn begin(&self, request: DownloadRequest, events: DownloadEventSender) -> DownloadHandle {
        let fail = self.fail;
        let task = tokio::spawn(async move {
            let part = request.part;
            let _ = events.send(DownloadEvent::Progress {
                part,
                received: 4,
                total: Some(8),
            });
            let partial = partial_path(&request.dest);
            let state = match tokio::fs::write(&partial, b"ggml").await {
                Err(e) => DownloadState::Failed(e.to_string()),
                Ok(()) if fail => DownloadState::Failed("connection reset".to_string()),
                Ok(()) => {
                    let finished = async {
                        tokio::fs::write(&partial, b"ggmlggml").await?;
                        tokio::fs::rename(&partial, &request.dest).await
                    };
                    match finished.await {
                        Ok(()) => DownloadState::Completed,
                        Err(e) => DownloadState::Failed(e.to_string()),
                    }
                }
            };
            let _ = events.send(DownloadEvent::Progress {
                part,
                received: 8,
                total: Some(8),
            });
            let _ = events.send(DownloadEvent::Finished { part, state });
        });
        DownloadHandle::from_task(task)
    }
}

fn linux_manager(temp: &TempDir, cuda_available: bool, downloads_fail: bool) -> Arc<EngineManager> {
    let paths = EnginePaths::new(temp.path().join("data"));
    let runner = FakeToolchain {
        paths: paths.clone(),
        cuda_available,
    };
    Arc::new(EngineManager::with_hosts(
        paths,
        Capabilities::for_platform(Some(Platform::LinuxX64)),
        Arc::new(runner),
        Arc::new(InstantDownloads {
            fail: downloads_fail,
        }),
    ))
}

/// Runs one operation to completion and returns its summary or error plus
/// the final status.
async fn run(
    manager: &Arc<EngineManager>,
    operation: Operation,
) -> (Result<String, String>, SystemStatus, Vec<LifecycleEvent>) {
    let (tx, mut rx) = event_channel();
    run_operation(manager.clone(), operation, tx)
        .await
        .expect("operation task panicked");

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let mut outcome = None;
    let mut status = None;
    for event in &events {
        match event {
            LifecycleEvent::Completed { summary } => outcome = Some(Ok(summary.clone())),
            LifecycleEvent::Failed { error } => outcome = Some(Err(error.clone())),
            LifecycleEvent::StatusChanged(s) => status = Some(s.clone()),
            _ => {}
        }
    }

    assert!(
        matches!(events.last(), Some(LifecycleEvent::StatusChanged(_))),
        "status must be the last event"
    );
    (
        outcome.expect("no terminal event"),
        status.expect("no status event"),
        events,
    )
}

#[tokio::test]
async fn full_lifecycle_with_cpu_fallback() {
    let temp = TempDir::new().unwrap();
    let manager = linux_manager(&temp, false, false);

    let initial = manager.status();
    assert!(!initial.dependency_installed);
    assert!(!initial.dependency_built);
    assert!(initial.installed_assets.is_empty());

    let (result, status, _) = run(&manager, Operation::Install(RepoMirror::Gitee)).await;
    assert_eq!(result.unwrap(), "whisper.cpp installed");
    assert!(status.dependency_installed);
    assert!(!status.dependency_built);

    // Installing again is a no-op
    let (result, _, _) = run(&manager, Operation::Install(RepoMirror::Github)).await;
    assert_eq!(result.unwrap(), "whisper.cpp is already installed");

    let (result, status, events) = run(&manager, Operation::Build).await;
    assert!(result.unwrap().contains("CPU"));
    assert!(status.dependency_built);
    assert!(events
        .iter()
        .any(|e| matches!(e, LifecycleEvent::ProcessOutput(_))));

    let (result, status, events) = run(
        &manager,
        Operation::Download {
            asset: "tiny".to_string(),
            mirror: ModelMirror::HfMirror,
        },
    )
    .await;
    assert_eq!(result.unwrap(), "tiny downloaded");
    assert!(status.has_asset("tiny"));
    let last_percent = events.iter().rev().find_map(|e| match e {
        LifecycleEvent::DownloadProgress { percent, .. } => Some(*percent),
        _ => None,
    });
    assert_eq!(last_percent, Some(100.0));

    let source = temp.path().join("ggml-custom-q5.bin");
    std::fs::write(&source, b"ggml").unwrap();
    let (result, status, _) = run(&manager, Operation::Import(source)).await;
    assert_eq!(result.unwrap(), "custom-q5 imported");
    assert_eq!(status.installed_assets, vec!["custom-q5", "tiny"]);

    let (result, status, _) = run(&manager, Operation::Delete("tiny".to_string())).await;
    assert!(result.is_ok());
    assert!(!status.has_asset("tiny"));
    assert!(status.has_asset("custom-q5"));

    let (result, status, _) = run(&manager, Operation::Uninstall).await;
    assert!(result.is_ok());
    assert_eq!(
        status,
        SystemStatus {
            models_dir: status.models_dir.clone(),
            ..SystemStatus::default()
        }
    );
}

#[tokio::test]
async fn failed_download_leaves_asset_missing() {
    let temp = TempDir::new().unwrap();
    let manager = linux_manager(&temp, true, true);

    let (result, _, _) = run(&manager, Operation::Install(RepoMirror::Github)).await;
    assert!(result.is_ok());

    let (result, status, _) = run(
        &manager,
        Operation::Download {
            asset: "base".to_string(),
            mirror: ModelMirror::HuggingFace,
        },
    )
    .await;

    let error = result.unwrap_err();
    assert!(error.contains("connection reset"), "{error}");
    assert!(!status.has_asset("base"));

    let weights = manager.paths().primary_model_file("base");
    assert!(!weights.exists());
    assert!(partial_path(&weights).is_file());
}

#[tokio::test]
async fn accelerated_build_when_toolchain_supports_it() {
    let temp = TempDir::new().unwrap();
    let manager = linux_manager(&temp, true, false);

    run(&manager, Operation::Install(RepoMirror::Github)).await.0.unwrap();
    let (result, status, _) = run(&manager, Operation::Build).await;

    assert!(result.unwrap().contains("accelerated"));
    assert!(status.dependency_built);
}

#[tokio::test]
async fn operations_before_install_are_rejected() {
    let temp = TempDir::new().unwrap();
    let manager = linux_manager(&temp, true, false);

    let (result, _, _) = run(&manager, Operation::Build).await;
    assert!(result.is_err());

    let (result, status, _) = run(
        &manager,
        Operation::Download {
            asset: "tiny".to_string(),
            mirror: ModelMirror::default(),
        },
    )
    .await;
    assert!(result.is_err());
    assert!(status.installed_assets.is_empty());
}
