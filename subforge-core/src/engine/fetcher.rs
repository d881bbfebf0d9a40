//! Repository fetcher: shallow clone of the pinned whisper.cpp source.
//!
//! A clone either leaves a complete installation behind or nothing at all.
//! When git reports success but the installation is still incomplete, the
//! whole clone is restarted from scratch, at most [`MAX_INSTALL_ATTEMPTS`]
//! times.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use super::catalog::{repo_url, ENGINE_REVISION};
use super::error::{LifecycleError, LifecycleResult};
use super::paths::{remove_dir_if_exists, EnginePaths};
use super::process::{CommandSpec, ProcessRunner};
use super::types::{InstallOutcome, RepoMirror};

/// Upper bound on full clone restarts.
pub const MAX_INSTALL_ATTEMPTS: usize = 3;

/// Receives `(phase, fraction)` while git reports a known total.
pub type FetchProgressCallback<'a> = &'a (dyn Fn(&str, f32) + Send + Sync);

/// A parsed git progress line.
#[derive(Debug, Clone, PartialEq)]
pub struct GitProgress {
    pub phase: String,
    pub fraction: f32,
}

fn git_progress_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:remote:\s*)?([A-Za-z][A-Za-z ]*?):\s+\d{1,3}%\s+\((\d+)/(\d+)\)")
            .unwrap_or_else(|e| panic!("invalid git progress pattern: {e}"))
    })
}

/// Parses lines like `Receiving objects:  45% (1234/2742), 1.2 MiB`.
///
/// Returns `None` for other output and for lines without a usable total.
pub fn parse_git_progress(line: &str) -> Option<GitProgress> {
    let caps = git_progress_regex().captures(line.trim())?;
    let done: u64 = caps.get(2)?.as_str().parse().ok()?;
    let total: u64 = caps.get(3)?.as_str().parse().ok()?;
    if total == 0 {
        return None;
    }

    Some(GitProgress {
        phase: caps.get(1)?.as_str().trim().to_string(),
        fraction: (done as f32 / total as f32).min(1.0),
    })
}

/// The clone command for a mirror.
pub fn clone_command(paths: &EnginePaths, mirror: RepoMirror) -> CommandSpec {
    CommandSpec::new("git")
        .arg("clone")
        .arg("--depth")
        .arg("1")
        .arg("--single-branch")
        .arg("--branch")
        .arg(ENGINE_REVISION)
        .arg("--progress")
        .arg(repo_url(mirror))
        .arg(paths.root().to_string_lossy().into_owned())
}

/// Clones whisper.cpp unless it is already installed.
pub async fn install(
    paths: &EnginePaths,
    runner: &dyn ProcessRunner,
    mirror: RepoMirror,
    on_progress: FetchProgressCallback<'_>,
) -> LifecycleResult<InstallOutcome> {
    if paths.is_installed() {
        debug!(root = %paths.root().display(), "whisper.cpp already installed");
        return Ok(InstallOutcome::AlreadyInstalled);
    }

    let spec = clone_command(paths, mirror);
    let relay = |line: &str| {
        if let Some(progress) = parse_git_progress(line) {
            on_progress(&progress.phase, progress.fraction);
        }
    };

    for attempt in 1..=MAX_INSTALL_ATTEMPTS {
        info!(attempt, %mirror, revision = ENGINE_REVISION, "Cloning whisper.cpp");

        // Leftovers of an interrupted clone would make git refuse the target.
        remove_dir_if_exists(paths.root()).await?;
        tokio::fs::create_dir_all(paths.data_root())
            .await
            .map_err(|e| LifecycleError::fs("Failed to create data directory", e))?;

        let cause = match runner.run(&spec, &relay).await {
            Ok(outcome) if outcome.success() => None,
            Ok(outcome) => Some(outcome.failure_summary(&spec)),
            Err(e) => Some(format!("failed to run git: {e}")),
        };

        if let Some(cause) = cause {
            discard_partial_install(paths).await;
            return Err(LifecycleError::FetchFailed(cause));
        }

        if paths.is_installed() {
            info!(root = %paths.root().display(), "whisper.cpp installed");
            return Ok(InstallOutcome::Installed);
        }

        warn!(attempt, "Clone finished but the installation is incomplete");
    }

    discard_partial_install(paths).await;
    Err(LifecycleError::FetchFailed(format!(
        "installation still incomplete after {MAX_INSTALL_ATTEMPTS} attempts"
    )))
}

async fn discard_partial_install(paths: &EnginePaths) {
    if let Err(e) = remove_dir_if_exists(paths.root()).await {
        warn!(error = %e, "Failed to clean up partial installation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{ScriptedRunner, Step};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn clone_ok(paths: &EnginePaths) -> Step {
        Step::ok()
            .line("Cloning into 'whisper.cpp'...")
            .line("Receiving objects:  50% (5/10)")
            .line("Receiving objects: 100% (10/10), 1.20 MiB | 2.00 MiB/s, done.")
            .creates_dir(paths.models_dir())
    }

    #[test]
    fn test_parse_git_progress() {
        let progress = parse_git_progress("Receiving objects:  45% (45/100), 1.20 MiB").unwrap();
        assert_eq!(progress.phase, "Receiving objects");
        assert!((progress.fraction - 0.45).abs() < f32::EPSILON);

        let remote = parse_git_progress("remote: Counting objects: 100% (50/50), done.").unwrap();
        assert_eq!(remote.phase, "Counting objects");
        assert_eq!(remote.fraction, 1.0);

        assert!(parse_git_progress("Cloning into 'whisper.cpp'...").is_none());
        assert!(parse_git_progress("Resolving deltas:   0% (0/0)").is_none());
    }

    #[test]
    fn test_clone_command_is_shallow_and_pinned() {
        let paths = EnginePaths::new("/data");
        let spec = clone_command(&paths, RepoMirror::Gitee);
        assert_eq!(spec.program, "git");
        assert!(spec.args.contains(&"--depth".to_string()));
        assert!(spec.args.contains(&"--single-branch".to_string()));
        assert!(spec.args.contains(&ENGINE_REVISION.to_string()));
        assert!(spec.args.contains(&repo_url(RepoMirror::Gitee).to_string()));
    }

    #[tokio::test]
    async fn test_install_reports_progress() {
        let temp = TempDir::new().unwrap();
        let paths = EnginePaths::new(temp.path());
        let runner = ScriptedRunner::new(vec![clone_ok(&paths)]);
        let seen = Mutex::new(Vec::new());

        let outcome = install(&paths, &runner, RepoMirror::Github, &|phase: &str, f: f32| {
            seen.lock().unwrap().push((phase.to_string(), f))
        })
        .await
        .unwrap();

        assert_eq!(outcome, InstallOutcome::Installed);
        assert!(paths.is_installed());
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], ("Receiving objects".to_string(), 1.0));
    }

    #[tokio::test]
    async fn test_install_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let paths = EnginePaths::new(temp.path());
        let runner = ScriptedRunner::new(vec![clone_ok(&paths)]);

        install(&paths, &runner, RepoMirror::Github, &|_: &str, _: f32| {})
            .await
            .unwrap();
        let second = install(&paths, &runner, RepoMirror::Github, &|_: &str, _: f32| {})
            .await
            .unwrap();

        assert_eq!(second, InstallOutcome::AlreadyInstalled);
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_mirror_uses_default_command() {
        let temp = TempDir::new().unwrap();
        let paths = EnginePaths::new(temp.path());
        let runner = ScriptedRunner::new(vec![clone_ok(&paths)]);

        let mirror = RepoMirror::from_selector("primary-mirror");
        install(&paths, &runner, mirror, &|_: &str, _: f32| {})
            .await
            .unwrap();

        assert_eq!(
            runner.calls()[0],
            clone_command(&paths, RepoMirror::default())
        );
    }

    #[tokio::test]
    async fn test_failed_clone_removes_partial_root() {
        let temp = TempDir::new().unwrap();
        let paths = EnginePaths::new(temp.path());
        let runner = ScriptedRunner::new(vec![Step::fail(128)
            .creates_dir(paths.root().join(".git"))
            .line("fatal: unable to access 'https://github.com/ggerganov/whisper.cpp/'")]);

        let err = install(&paths, &runner, RepoMirror::Github, &|_: &str, _: f32| {})
            .await
            .unwrap_err();

        match err {
            LifecycleError::FetchFailed(cause) => assert!(cause.contains("unable to access")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!paths.root().exists());
    }

    #[tokio::test]
    async fn test_stale_root_is_replaced() {
        let temp = TempDir::new().unwrap();
        let paths = EnginePaths::new(temp.path());
        std::fs::create_dir_all(paths.root().join("stale")).unwrap();
        let runner = ScriptedRunner::new(vec![clone_ok(&paths)]);

        install(&paths, &runner, RepoMirror::Github, &|_: &str, _: f32| {})
            .await
            .unwrap();

        assert!(!paths.root().join("stale").exists());
        assert!(paths.is_installed());
    }

    #[tokio::test]
    async fn test_incomplete_clone_retry_is_bounded() {
        let temp = TempDir::new().unwrap();
        let paths = EnginePaths::new(temp.path());
        let incomplete = || Step::ok().creates_dir(paths.root());
        let runner = ScriptedRunner::new(vec![incomplete(), incomplete(), incomplete(), incomplete()]);

        let err = install(&paths, &runner, RepoMirror::Github, &|_: &str, _: f32| {})
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::FetchFailed(_)));
        assert_eq!(runner.calls().len(), MAX_INSTALL_ATTEMPTS);
        assert!(!paths.root().exists());
    }

    #[tokio::test]
    async fn test_incomplete_clone_recovers_on_retry() {
        let temp = TempDir::new().unwrap();
        let paths = EnginePaths::new(temp.path());
        let runner = ScriptedRunner::new(vec![
            Step::ok().creates_dir(paths.root()),
            clone_ok(&paths),
        ]);

        let outcome = install(&paths, &runner, RepoMirror::Github, &|_: &str, _: f32| {})
            .await
            .unwrap();

        assert_eq!(outcome, InstallOutcome::Installed);
        assert_eq!(runner.calls().len(), 2);
    }
}
