//! Build driver: compiles whisper.cpp with `make`.
//!
//! The first attempt uses the acceleration mode from the platform
//! capabilities. A failure that the output attributes to the acceleration
//! layer (missing CUDA toolkit, Core ML tooling) triggers exactly one plain
//! CPU build; anything else is reported as is.

use tracing::{info, warn};

use super::error::{LifecycleError, LifecycleResult};
use super::paths::EnginePaths;
use super::process::{CommandSpec, LineCallback, ProcessOutcome, ProcessRunner};
use super::types::{Acceleration, BuildOutcome, Capabilities};

/// The `make` invocation for an acceleration mode.
pub fn make_command(paths: &EnginePaths, acceleration: Acceleration) -> CommandSpec {
    let mut spec = CommandSpec::new("make")
        .arg("-j")
        .arg("-C")
        .arg(paths.root().to_string_lossy().into_owned());
    for (key, value) in acceleration.make_env() {
        spec = spec.env(*key, *value);
    }
    spec
}

/// Builds whisper.cpp unless a usable executable already exists.
pub async fn build(
    paths: &EnginePaths,
    caps: &Capabilities,
    runner: &dyn ProcessRunner,
    on_output: LineCallback<'_>,
) -> LifecycleResult<BuildOutcome> {
    if !paths.is_installed() {
        return Err(LifecycleError::NotInstalled);
    }
    if paths.is_built(caps) {
        info!(prebuilt = caps.prebuilt_binary, "whisper.cpp already built");
        return Ok(BuildOutcome::AlreadyBuilt);
    }

    let acceleration = caps.acceleration;
    info!(acceleration = acceleration.display_name(), "Building whisper.cpp");

    let spec = make_command(paths, acceleration);
    let outcome = run_make(runner, &spec, on_output).await?;
    if outcome.success() {
        return Ok(if acceleration == Acceleration::None {
            BuildOutcome::BuiltGeneric
        } else {
            BuildOutcome::BuiltAccelerated
        });
    }

    if !acceleration.is_acceleration_failure(&outcome.output) {
        return Err(LifecycleError::BuildFailed(outcome.failure_summary(&spec)));
    }

    warn!(
        acceleration = acceleration.display_name(),
        "Accelerated build failed, falling back to CPU build"
    );
    on_output(&format!(
        "{} build failed, retrying without acceleration",
        acceleration.display_name()
    ));

    let fallback = make_command(paths, Acceleration::None);
    let outcome = run_make(runner, &fallback, on_output).await?;
    if outcome.success() {
        Ok(BuildOutcome::BuiltGeneric)
    } else {
        Err(LifecycleError::BuildFailed(outcome.failure_summary(&fallback)))
    }
}

async fn run_make(
    runner: &dyn ProcessRunner,
    spec: &CommandSpec,
    on_output: LineCallback<'_>,
) -> LifecycleResult<ProcessOutcome> {
    runner
        .run(spec, on_output)
        .await
        .map_err(|e| LifecycleError::BuildFailed(format!("failed to run make: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{ScriptedRunner, Step};
    use crate::engine::types::Platform;
    use tempfile::TempDir;

    fn installed(temp: &TempDir) -> EnginePaths {
        let paths = EnginePaths::new(temp.path());
        std::fs::create_dir_all(paths.models_dir()).unwrap();
        paths
    }

    fn linux() -> Capabilities {
        Capabilities::for_platform(Some(Platform::LinuxX64))
    }

    #[test]
    fn test_make_command_env() {
        let paths = EnginePaths::new("/data");
        let cuda = make_command(&paths, Acceleration::Cuda);
        assert_eq!(cuda.envs, vec![("WHISPER_CUBLAS".to_string(), "1".to_string())]);
        assert_eq!(cuda.args[..2], ["-j".to_string(), "-C".to_string()]);

        let coreml = make_command(&paths, Acceleration::CoreMl);
        assert_eq!(coreml.envs, vec![("WHISPER_COREML".to_string(), "1".to_string())]);

        assert!(make_command(&paths, Acceleration::None).envs.is_empty());
    }

    #[tokio::test]
    async fn test_build_requires_installation() {
        let temp = TempDir::new().unwrap();
        let paths = EnginePaths::new(temp.path());
        let runner = ScriptedRunner::default();

        let err = build(&paths, &linux(), &runner, &|_: &str| {})
            .await
            .unwrap_err();

        assert_eq!(err, LifecycleError::NotInstalled);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_existing_executable_skips_compiler() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        std::fs::write(paths.executable(), b"bin").unwrap();
        let runner = ScriptedRunner::default();

        let outcome = build(&paths, &linux(), &runner, &|_: &str| {})
            .await
            .unwrap();

        assert_eq!(outcome, BuildOutcome::AlreadyBuilt);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_prebuilt_platform_skips_compiler() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        let runner = ScriptedRunner::default();
        let windows = Capabilities::for_platform(Some(Platform::WindowsX64));

        let outcome = build(&paths, &windows, &runner, &|_: &str| {})
            .await
            .unwrap();

        assert_eq!(outcome, BuildOutcome::AlreadyBuilt);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_accelerated_build() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        let runner = ScriptedRunner::new(vec![Step::ok().creates_file(paths.executable())]);

        let outcome = build(&paths, &linux(), &runner, &|_: &str| {})
            .await
            .unwrap();

        assert_eq!(outcome, BuildOutcome::BuiltAccelerated);
        assert_eq!(runner.calls().len(), 1);
        assert!(paths.is_built(&linux()));
    }

    #[tokio::test]
    async fn test_cuda_failure_falls_back_once() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        let runner = ScriptedRunner::new(vec![
            Step::fail(2).line("make: nvcc: No such file or directory"),
            Step::ok().creates_file(paths.executable()),
        ]);

        let outcome = build(&paths, &linux(), &runner, &|_: &str| {})
            .await
            .unwrap();

        assert_eq!(outcome, BuildOutcome::BuiltGeneric);
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], make_command(&paths, Acceleration::None));
    }

    #[tokio::test]
    async fn test_failed_fallback_is_terminal() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        let runner = ScriptedRunner::new(vec![
            Step::fail(2).line("fatal error: cublas_v2.h: No such file or directory"),
            Step::fail(2).line("error: unknown type name 'foo'"),
        ]);

        let err = build(&paths, &linux(), &runner, &|_: &str| {})
            .await
            .unwrap_err();

        match err {
            LifecycleError::BuildFailed(cause) => assert!(cause.contains("unknown type name")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_unrelated_failure_does_not_fall_back() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        let runner = ScriptedRunner::new(vec![Step::fail(2).line("error: expected ';'")]);

        let err = build(&paths, &linux(), &runner, &|_: &str| {})
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::BuildFailed(_)));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cuda_flags_in_compile_lines_do_not_trigger_fallback() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        let runner = ScriptedRunner::new(vec![Step::fail(2)
            .line("cc -O3 -DGGML_USE_CUBLAS -I/usr/local/cuda/include -c ggml.c")
            .line("c++ -O3 -DGGML_USE_CUBLAS -c whisper.cpp")
            .line("whisper.cpp:120:5: error: expected ';' before 'return'")]);

        let err = build(&paths, &linux(), &runner, &|_: &str| {})
            .await
            .unwrap_err();

        match err {
            LifecycleError::BuildFailed(cause) => assert!(cause.contains("expected ';'")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_output_is_relayed() {
        let temp = TempDir::new().unwrap();
        let paths = installed(&temp);
        let runner = ScriptedRunner::new(vec![Step::ok().line("cc ggml.c").line("cc whisper.cpp")]);
        let lines = std::sync::Mutex::new(Vec::new());

        build(&paths, &linux(), &runner, &|line: &str| {
            lines.lock().unwrap().push(line.to_string())
        })
        .await
        .unwrap();

        assert_eq!(lines.into_inner().unwrap(), vec!["cc ggml.c", "cc whisper.cpp"]);
    }
}
