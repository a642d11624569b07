//! Bounded-call supervision.
//!
//! No externally-facing await in this crate is unbounded: RPC calls,
//! bundler calls and orchestrator subprocess runs all go through
//! [`with_timeout`] or [`run_supervised`] with a per-operation-class
//! deadline. Cancellation is timeout-driven only; there is no user-initiated
//! cancel.

use crate::{
    constants::MAX_STREAM_CAPTURE,
    error::{RelayError, RelayResult, TimeoutError},
};
use std::{future::IntoFuture, process::Stdio, time::Duration};
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Identifies the operation class for a bounded call, determining the
/// stable code and status of the error raised on timeout.
#[derive(Debug, Clone)]
pub struct TimeoutMeta {
    /// Stable error code, e.g. `RPC_TIMEOUT`.
    pub code: &'static str,
    /// HTTP-style status.
    pub status: u16,
    /// What was being awaited, for the error message.
    pub context: String,
}

impl TimeoutMeta {
    /// Metadata for a chain or bundler RPC call.
    pub fn rpc(context: impl Into<String>) -> Self {
        Self { code: "RPC_TIMEOUT", status: 504, context: context.into() }
    }

    /// Metadata for an orchestrator subprocess run.
    pub fn orchestrator(context: impl Into<String>) -> Self {
        Self { code: "ORCHESTRATOR_TIMEOUT", status: 504, context: context.into() }
    }

    /// Metadata for an edge collaborator call (receipts, notes, cost
    /// recorder).
    pub fn edge(context: impl Into<String>) -> Self {
        Self { code: "EDGE_TIMEOUT", status: 504, context: context.into() }
    }

    fn into_error(self, timeout: Duration) -> TimeoutError {
        TimeoutError {
            code: self.code,
            status: self.status,
            message: format!("{} timed out after {}ms", self.context, timeout.as_millis()),
        }
    }
}

/// Races `op` against `timeout`.
///
/// On timeout the operation's future is dropped and a structured
/// [`TimeoutError`] is raised; timer cleanup is structural. Timeouts are
/// never retried here; retry policy belongs to the caller.
pub async fn with_timeout<F, T, E>(op: F, timeout: Duration, meta: TimeoutMeta) -> RelayResult<T>
where
    F: IntoFuture<Output = Result<T, E>>,
    RelayError: From<E>,
{
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => result.map_err(RelayError::from),
        Err(_) => {
            warn!(code = meta.code, context = %meta.context, timeout_ms = timeout.as_millis(), "bounded call timed out");
            Err(meta.into_error(timeout).into())
        }
    }
}

/// A command to run under supervision.
#[derive(Debug, Clone)]
pub struct SupervisedCommand {
    /// The program to execute.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
}

/// The captured outcome of a supervised run.
///
/// A spawn failure is a resolved outcome with `error` populated, not an
/// `Err`: some non-zero exits encode a legitimate continuation signal, so
/// callers must always be able to inspect what they got.
#[derive(Debug, Clone, Default)]
pub struct SupervisedOutput {
    /// Captured stdout, capped at [`MAX_STREAM_CAPTURE`].
    pub stdout: String,
    /// Captured stderr, capped at [`MAX_STREAM_CAPTURE`].
    pub stderr: String,
    /// The exit code, if the process ran and exited.
    pub exit_code: Option<i32>,
    /// Populated when the process could not be spawned or waited on.
    pub error: Option<String>,
}

/// Runs `cmd` detached into its own process group, streaming and capping
/// stdout/stderr.
///
/// On normal exit resolves with the captured output and exit code. On
/// timeout the **whole process group** receives SIGKILL (falling back to
/// killing the child alone if group termination is unavailable) and the
/// call rejects with the supplied timeout metadata. Exactly one outcome
/// settles.
pub async fn run_supervised(
    cmd: SupervisedCommand,
    timeout: Duration,
    meta: TimeoutMeta,
) -> RelayResult<SupervisedOutput> {
    let mut command = tokio::process::Command::new(&cmd.program);
    command
        .args(&cmd.args)
        .envs(cmd.env.iter().cloned())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Detach into a fresh process group so a timeout can take down any
    // children the orchestrator script spawned (bundler helpers etc.).
    #[cfg(unix)]
    command.process_group(0);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(program = %cmd.program, %err, "failed to spawn supervised process");
            return Ok(SupervisedOutput {
                error: Some(format!("spawn failed: {err}")),
                ..Default::default()
            });
        }
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let run = async {
        let (stdout, stderr, status) = tokio::join!(
            read_capped(stdout),
            read_capped(stderr),
            child.wait(),
        );
        (stdout, stderr, status)
    };

    match tokio::time::timeout(timeout, run).await {
        Ok((stdout, stderr, status)) => {
            let (exit_code, error) = match status {
                Ok(status) => (status.code(), None),
                Err(err) => (None, Some(format!("wait failed: {err}"))),
            };
            debug!(program = %cmd.program, ?exit_code, "supervised process exited");
            Ok(SupervisedOutput { stdout, stderr, exit_code, error })
        }
        Err(_) => {
            terminate_group(&mut child).await;
            Err(meta.into_error(timeout).into())
        }
    }
}

/// Reads a child stream to EOF, keeping at most [`MAX_STREAM_CAPTURE`]
/// bytes. The stream is drained past the cap so the child never blocks on a
/// full pipe.
async fn read_capped<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let Some(mut stream) = stream else { return String::new() };
    let mut buf = Vec::new();
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = MAX_STREAM_CAPTURE.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Sends SIGKILL to the child's process group, falling back to terminating
/// the child alone, then reaps it.
async fn terminate_group(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    let group_killed = child
        .id()
        .map(|pid| {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;
            killpg(Pid::from_raw(pid as i32), Signal::SIGKILL).is_ok()
        })
        .unwrap_or(false);
    #[cfg(not(unix))]
    let group_killed = false;

    if !group_killed {
        warn!("process group termination unavailable, killing child directly");
        let _ = child.start_kill();
    }
    // Reap so the pid is not left as a zombie. Bounded: SIGKILL cannot be
    // blocked, so this returns promptly.
    let _ = tokio::time::timeout(Duration::from_secs(2), child.wait()).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_timeout_passes_through_success() {
        let out = with_timeout(
            async { Ok::<_, RelayError>(7u64) },
            Duration::from_secs(1),
            TimeoutMeta::rpc("test call"),
        )
        .await
        .unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn with_timeout_raises_structured_error() {
        let err = with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, RelayError>(())
            },
            Duration::from_millis(50),
            TimeoutMeta::rpc("eth_chainId"),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), "RPC_TIMEOUT");
        assert_eq!(err.status(), 504);
        assert!(err.to_string().contains("eth_chainId"));
    }

    #[tokio::test]
    async fn spawn_failure_resolves_with_error_populated() {
        let out = run_supervised(
            SupervisedCommand {
                program: "/nonexistent/definitely-not-a-binary".into(),
                args: vec![],
                env: vec![],
            },
            Duration::from_secs(5),
            TimeoutMeta::orchestrator("spawn test"),
        )
        .await
        .unwrap();

        assert!(out.error.is_some());
        assert_eq!(out.exit_code, None);
    }
}
