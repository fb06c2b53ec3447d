//! Bounded command execution
//!
//! Runs an external process under a deadline. The process is always killed
//! when the deadline passes or the execution context is cancelled.

#![allow(dead_code)]

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::executor::ExecutionContext;
use crate::models::{combine_output, CommandInvocation, CommandResult};
use crate::utils::Timer;

/// How long to keep reading pipes after the process is gone
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Reasons a command did not run to completion
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("failed to start `{command}`: {message}")]
    Spawn { command: String, message: String },

    #[error("failed to wait for command: {0}")]
    Wait(String),

    #[error("command terminated by signal")]
    Signal,

    #[error("command timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("command timed out after {secs}s and could not be terminated: {message}")]
    Unterminated { secs: u64, message: String },

    #[error("command cancelled before completion")]
    Cancelled,
}

impl ExecError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::TimedOut { .. } | ExecError::Unterminated { .. })
    }
}

/// Run `invocation` with no external cancellation
pub async fn execute_command(invocation: &CommandInvocation) -> CommandResult {
    execute_command_with_context(invocation, &ExecutionContext::background()).await
}

/// Run `invocation`, racing process exit against its timeout and `ctx`
pub async fn execute_command_with_context(
    invocation: &CommandInvocation,
    ctx: &ExecutionContext,
) -> CommandResult {
    let timeout = invocation.effective_timeout();

    let mut command = Command::new(&invocation.command);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = invocation.directory.as_deref().filter(|d| !d.is_empty()) {
        command.current_dir(dir);
    }

    // The child leads its own group so a kill also reaches its descendants
    #[cfg(unix)]
    command.process_group(0);

    let timer = Timer::start(invocation.to_string());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!("Failed to start {}: {}", invocation.command, e);
            let failure = ExecError::Spawn {
                command: invocation.command.clone(),
                message: e.to_string(),
            };
            return CommandResult::failed(failure, String::new(), 0);
        }
    };

    debug!(
        "Started `{}` (pid {:?}, timeout {}s)",
        invocation,
        child.id(),
        timeout.as_secs()
    );

    let mut group = ProcessGroup::of(&child);
    let stdout = CapturedOutput::spawn(child.stdout.take());
    let stderr = CapturedOutput::spawn(child.stderr.take());

    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(status),
        () = tokio::time::sleep(timeout) => Outcome::TimedOut,
        () = ctx.cancelled() => Outcome::Cancelled,
    };

    match outcome {
        Outcome::Exited(Ok(status)) => {
            group.disarm();
            let elapsed = timer.elapsed_ms();
            finished(status, collect_output(stdout, stderr).await, elapsed)
        }
        Outcome::Exited(Err(e)) => {
            error!("Failed waiting for `{}`: {}", invocation, e);
            let elapsed = timer.elapsed_ms();
            let output = collect_output(stdout, stderr).await;
            CommandResult::failed(ExecError::Wait(e.to_string()), output, elapsed)
        }
        Outcome::TimedOut => {
            let secs = timeout.as_secs();
            let killed = terminate(&mut group, &mut child).await;
            let elapsed = timer.elapsed_ms();
            let failure = timeout_failure(secs, killed);
            match &failure {
                ExecError::TimedOut { .. } => {
                    info!("`{}` timed out after {}s and was killed", invocation, secs)
                }
                other => error!("`{}`: {}", invocation, other),
            }
            let output = collect_output(stdout, stderr).await;
            CommandResult::failed(failure, output, elapsed)
        }
        Outcome::Cancelled => {
            if let Err(e) = terminate(&mut group, &mut child).await {
                error!("Failed to kill cancelled `{}`: {}", invocation, e);
            } else {
                info!("`{}` cancelled and killed", invocation);
            }
            let elapsed = timer.elapsed_ms();
            let output = collect_output(stdout, stderr).await;
            CommandResult::failed(ExecError::Cancelled, output, elapsed)
        }
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Map the result of killing a timed-out process to its failure
fn timeout_failure(secs: u64, killed: io::Result<()>) -> ExecError {
    match killed {
        Ok(()) => ExecError::TimedOut { secs },
        Err(e) => ExecError::Unterminated {
            secs,
            message: e.to_string(),
        },
    }
}

/// Kill the process group, then the child itself, reaping it
async fn terminate(group: &mut ProcessGroup, child: &mut Child) -> io::Result<()> {
    let group_killed = group.kill();
    let child_killed = child.kill().await;
    group_killed.and(child_killed)
}

async fn collect_output(stdout: CapturedOutput, stderr: CapturedOutput) -> String {
    let (stdout, stderr) = tokio::join!(stdout.finish(), stderr.finish());
    combine_output(&stdout, &stderr)
}

/// Process group led by a spawned child
///
/// Dropping an armed group kills every process in it.
struct ProcessGroup {
    pgid: Option<i32>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self {
            pgid: child.id().and_then(|pid| i32::try_from(pid).ok()),
        }
    }

    /// Forget the group once its leader exited on its own
    fn disarm(&mut self) {
        self.pgid = None;
    }

    fn kill(&mut self) -> io::Result<()> {
        match self.pgid.take() {
            Some(pgid) => kill_group(pgid),
            None => Ok(()),
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Err(e) = self.kill() {
            warn!("Failed to kill process group: {}", e);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: i32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: i32) -> io::Result<()> {
    Ok(())
}

fn finished(status: ExitStatus, output: String, elapsed_ms: u64) -> CommandResult {
    match status.code() {
        Some(code) => CommandResult::exited(code, output, elapsed_ms),
        None => CommandResult::failed(ExecError::Signal, output, elapsed_ms),
    }
}

/// Pipe contents collected by a background reader
///
/// Bytes land in a shared buffer as they arrive, so whatever was read before
/// a kill is still available afterwards.
struct CapturedOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl CapturedOutput {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let reader = pipe.map(|mut pipe| {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) => break,
                        Err(e) => {
                            debug!("Stopped reading command output: {}", e);
                            break;
                        }
                        Ok(n) => buffer
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&chunk[..n]),
                    }
                }
            })
        });
        Self { buffer, reader }
    }

    /// Wait briefly for the pipe to close, then take what was captured
    async fn finish(mut self) -> String {
        if let Some(mut reader) = self.reader.take() {
            if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut reader)
                .await
                .is_err()
            {
                debug!("Output pipe still open after process exit, abandoning reader");
                reader.abort();
            }
        }
        let bytes = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let text = String::from_utf8_lossy(&bytes).into_owned();
        text
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_successful_command() {
        let result = execute_command(&CommandInvocation::new("echo").arg("hello")).await;

        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output.trim(), "hello");
        assert!(result.failure.is_none());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_not_an_infrastructure_failure() {
        let inv = CommandInvocation::new("sh").args(["-c", "exit 3"]);
        let result = execute_command(&inv).await;

        assert!(!result.success);
        assert_eq!(result.exit_code, 3);
        assert!(result.failure.is_none());
        assert!(result.error_message().is_none());
    }

    #[tokio::test]
    async fn test_combined_output_stdout_then_stderr() {
        let inv = CommandInvocation::new("sh").args(["-c", "printf out; printf err >&2"]);
        let result = execute_command(&inv).await;

        assert!(result.success);
        assert_eq!(result.output, "out\nerr");
    }

    #[tokio::test]
    async fn test_stderr_only_has_no_leading_newline() {
        let inv = CommandInvocation::new("sh").args(["-c", "printf err >&2; exit 1"]);
        let result = execute_command(&inv).await;

        assert_eq!(result.exit_code, 1);
        assert_eq!(result.output, "err");
    }

    #[tokio::test]
    async fn test_missing_executable_reports_spawn_failure() {
        let result =
            execute_command(&CommandInvocation::new("definitely-not-a-real-binary-xyz")).await;

        assert!(!result.success);
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.execution_time_ms, 0);
        assert!(matches!(result.failure, Some(ExecError::Spawn { .. })));
        let message = result.error_message().unwrap();
        assert!(!message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let start = Instant::now();
        let inv = CommandInvocation::new("sleep").arg("5").timeout(1);
        let result = execute_command(&inv).await;
        let elapsed = start.elapsed();

        assert!(!result.success);
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.failure, Some(ExecError::TimedOut { secs: 1 }));
        assert!(result.error_message().unwrap().contains("timed out"));
        assert!(result.execution_time_ms >= 1000);
        assert!(result.execution_time_ms < 2500);
        assert!(elapsed < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let inv = CommandInvocation::new("sh")
            .args(["-c", "echo started; exec sleep 5"])
            .timeout(1);
        let result = execute_command(&inv).await;

        assert_eq!(result.failure, Some(ExecError::TimedOut { secs: 1 }));
        assert_eq!(result.output.trim(), "started");
    }

    /// Whether `pid` is a live, non-zombie process
    #[cfg(target_os = "linux")]
    fn is_running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .is_some_and(|state| state != 'Z'),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_background_descendants() {
        let inv = CommandInvocation::new("sh")
            .args(["-c", "sleep 30 & echo $!; wait"])
            .timeout(1);
        let result = execute_command(&inv).await;

        assert_eq!(result.failure, Some(ExecError::TimedOut { secs: 1 }));
        assert!(result.execution_time_ms >= 1000);
        assert!(result.execution_time_ms < 2500);

        let descendant: u32 = result.output.trim().parse().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!is_running(descendant));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_cancellation_kills_background_descendants() {
        let (ctx, handle) = ExecutionContext::background().child();
        let inv = CommandInvocation::new("sh")
            .args(["-c", "sleep 30 & echo $!; wait"])
            .timeout(20);

        let task = tokio::spawn(async move { execute_command_with_context(&inv, &ctx).await });
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.failure, Some(ExecError::Cancelled));

        let descendant: u32 = result.output.trim().parse().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!is_running(descendant));
    }

    #[tokio::test]
    async fn test_timed_out_process_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("survived");
        let script = format!("(sleep 2; touch '{}') & wait", marker.display());
        let inv = CommandInvocation::new("sh").args(["-c", &script]).timeout(1);

        let result = execute_command(&inv).await;
        assert!(result.failure.as_ref().is_some_and(ExecError::is_timeout));

        // A surviving subshell would create the marker once its sleep ends
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!marker.exists());
    }

    #[test]
    fn test_timeout_failure_when_kill_succeeds() {
        assert_eq!(timeout_failure(3, Ok(())), ExecError::TimedOut { secs: 3 });
    }

    #[test]
    fn test_timeout_failure_when_kill_fails() {
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "operation not permitted");
        let failure = timeout_failure(3, Err(denied));

        assert!(failure.is_timeout());
        assert_eq!(
            failure,
            ExecError::Unterminated {
                secs: 3,
                message: "operation not permitted".to_string(),
            }
        );
        let message = failure.to_string();
        assert!(message.contains("timed out after 3s"));
        assert!(message.contains("could not be terminated"));
    }

    #[test]
    fn test_disarmed_group_is_not_signalled() {
        let mut group = ProcessGroup { pgid: Some(i32::MAX) };
        group.disarm();
        assert!(group.kill().is_ok());
    }

    #[tokio::test]
    async fn test_cancellation_kills_process() {
        let (ctx, handle) = ExecutionContext::background().child();
        let inv = CommandInvocation::new("sleep").arg("10").timeout(20);

        let task = tokio::spawn(async move { execute_command_with_context(&inv, &ctx).await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.failure, Some(ExecError::Cancelled));
        assert_eq!(result.exit_code, -1);
    }

    #[tokio::test]
    async fn test_working_directory_override() {
        let dir = tempfile::tempdir().unwrap();
        let inv = CommandInvocation::new("pwd").directory(dir.path().to_string_lossy());
        let result = execute_command(&inv).await;

        assert!(result.success);
        let reported = std::fs::canonicalize(result.output.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }
}
