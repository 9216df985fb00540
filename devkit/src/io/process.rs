//! Helpers for running child processes with bounded output capture.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};

/// A program invocation with its working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub stdin: Option<String>,
}

impl CommandRequest {
    pub fn new<I, S>(program: impl Into<String>, args: I, cwd: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.into(),
            stdin: None,
        }
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// `program arg1 arg2` for messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured child process output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if terminated by a signal.
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Abstraction over process spawning so tasks can be tested without it.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput>;
}

/// Spawns real child processes.
#[derive(Debug, Clone)]
pub struct SystemProcessRunner {
    output_limit_bytes: usize,
}

impl SystemProcessRunner {
    pub fn new(output_limit_bytes: usize) -> Self {
        Self { output_limit_bytes }
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args).current_dir(&request.cwd);
        run_command(cmd, request.stdin.as_deref().map(str::as_bytes), self.output_limit_bytes)
            .with_context(|| format!("run {}", request.display()))
    }
}

/// Run `request` and fail unless it exits successfully.
pub fn run_checked<R: ProcessRunner + ?Sized>(
    runner: &R,
    request: &CommandRequest,
) -> Result<CommandOutput> {
    let output = runner.run(request)?;
    if !output.success {
        let stderr = output.stderr_lossy();
        let detail = stderr.trim();
        let code = output
            .code
            .map_or_else(|| "signal".to_string(), |code| code.to_string());
        if detail.is_empty() {
            return Err(anyhow!("`{}` failed with status {code}", request.display()));
        }
        return Err(anyhow!(
            "`{}` failed with status {code}: {detail}",
            request.display()
        ));
    }
    Ok(output)
}

/// Run a command and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
/// There is no timeout: a hung child blocks the caller.
#[instrument(skip_all, fields(output_limit_bytes))]
pub fn run_command(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        child_stdin.write_all(input).context("write stdin")?;
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let status = child.wait().context("wait for command")?;

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), "command finished");
    Ok(CommandOutput {
        code: status.code(),
        success: status.success(),
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_stream_limited_counts_truncated_bytes() {
        let input = vec![b'x'; 100];
        let (buf, truncated) = read_stream_limited(&input[..], 40).expect("read");
        assert_eq!(buf.len(), 40);
        assert_eq!(truncated, 60);
    }

    #[test]
    fn request_display_joins_program_and_args() {
        let request = CommandRequest::new("yarn", ["add", "--dev", "jest"], "/tmp");
        assert_eq!(request.display(), "yarn add --dev jest");
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_stdout_and_stdin() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = SystemProcessRunner::new(1024);
        let request = CommandRequest::new("cat", Vec::<String>::new(), temp.path())
            .with_stdin("hello");
        let output = runner.run(&request).expect("run cat");
        assert!(output.success);
        assert_eq!(output.stdout_lossy(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn run_checked_reports_failed_status() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = SystemProcessRunner::new(1024);
        let request = CommandRequest::new("sh", ["-c", "echo nope >&2; exit 3"], temp.path());
        let err = run_checked(&runner, &request).expect_err("should fail");
        let msg = err.to_string();
        assert!(msg.contains("status 3"), "{msg}");
        assert!(msg.contains("nope"), "{msg}");
    }
}
