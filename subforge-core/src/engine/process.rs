//! Child process execution with streamed output.
//!
//! `ProcessRunner` is the seam used by the fetcher and the build driver.
//! `TokioProcessRunner` is the real implementation; tests substitute fakes.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info};

/// Maximum characters of output kept for error reporting.
const MAX_OUTPUT_CHARS: usize = 16_000;

/// Callback receiving each output line (stdout and stderr interleaved).
pub type LineCallback<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// A command to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Shell-like rendering for logs and messages.
    pub fn display(&self) -> String {
        let mut parts: Vec<String> = self
            .envs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// How a child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code, `None` when killed by a signal.
    pub exit_code: Option<i32>,
    /// Tail of the combined output.
    pub output: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// One-line failure description for error messages.
    pub fn failure_summary(&self, spec: &CommandSpec) -> String {
        let code = self
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let last_line = self
            .output
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("");
        format!("`{}` exited with {}: {}", spec.display(), code, last_line.trim())
    }
}

/// Runs commands and streams their output.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        spec: &CommandSpec,
        on_line: LineCallback<'_>,
    ) -> std::io::Result<ProcessOutcome>;
}

/// `ProcessRunner` backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        on_line: LineCallback<'_>,
    ) -> std::io::Result<ProcessOutcome> {
        info!(command = %spec.display(), cwd = ?spec.current_dir, "Spawning process");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        for (key, value) in &spec.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        // Headless output
        cmd.env("TERM", "dumb");
        cmd.env("NO_COLOR", "1");
        cmd.env("CLICOLOR", "0");
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let tail = Mutex::new(String::new());
        let (out_res, err_res) = tokio::join!(
            pump(stdout, on_line, &tail),
            pump(stderr, on_line, &tail)
        );
        out_res?;
        err_res?;

        let status = child.wait().await?;
        let output = tail.into_inner().unwrap_or_else(|e| e.into_inner());

        debug!(command = %spec.program, code = ?status.code(), "Process exited");

        Ok(ProcessOutcome {
            exit_code: status.code(),
            output,
        })
    }
}

/// Reads a pipe to the end, splitting on `\n` and `\r`.
///
/// Git redraws progress with carriage returns, so both count as line ends.
async fn pump<R>(
    reader: Option<R>,
    on_line: LineCallback<'_>,
    tail: &Mutex<String>,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(());
    };

    let mut buf = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        for &byte in &buf[..n] {
            if byte == b'\n' || byte == b'\r' {
                flush_line(&mut pending, on_line, tail);
            } else {
                pending.push(byte);
            }
        }
    }
    flush_line(&mut pending, on_line, tail);

    Ok(())
}

fn flush_line(pending: &mut Vec<u8>, on_line: LineCallback<'_>, tail: &Mutex<String>) {
    if pending.is_empty() {
        return;
    }
    let line = String::from_utf8_lossy(pending).into_owned();
    pending.clear();

    on_line(&line);

    if let Ok(mut tail) = tail.lock() {
        push_tail(&mut tail, &line);
    }
}

fn push_tail(tail: &mut String, line: &str) {
    tail.push_str(line);
    tail.push('\n');

    if tail.len() > MAX_OUTPUT_CHARS {
        let mut cut = tail.len() - MAX_OUTPUT_CHARS;
        while !tail.is_char_boundary(cut) {
            cut += 1;
        }
        tail.drain(..cut);
    }
}
