use std::ffi::OsString;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::signal::unix::{SignalKind, signal};

use crate::error::MaxrunError;
use crate::plan::RunRequest;

/// Bytes of child stderr retained for diagnostics. The full streams are
/// forwarded regardless; only the tail is kept in memory.
pub const STDERR_TAIL_BYTES: usize = 4096;

const FORWARD_BUF_BYTES: usize = 8192;

/// The planner's fixed argument contract. Nothing here is configurable:
/// the tool owns the meaning of every flag.
pub fn plan_args(request: &RunRequest) -> Vec<OsString> {
    vec![
        request.input_file.clone().into(),
        "--num_agents".into(),
        request.num_agents.to_string().into(),
        "--num_cpus".into(),
        request.num_cpus.to_string().into(),
        "--output_csv".into(),
        "-o".into(),
        request.output_dir.clone().into(),
        "-v".into(),
    ]
}

/// Render the invocation for logs and the dry-run preview.
pub fn render_command(tool: &Path, request: &RunRequest) -> String {
    let mut parts = vec![tool.display().to_string()];
    parts.extend(
        plan_args(request)
            .iter()
            .map(|a| a.to_string_lossy().into_owned()),
    );
    parts.join(" ")
}

/// Run the planner to completion.
///
/// The child is spawned with an explicit working directory, no shell, and
/// its own process group; stdout/stderr are forwarded byte-for-byte while a
/// bounded stderr tail is retained for the failure report. Blocks until the
/// child exits and mirrors a non-zero exit as `ToolFailed`.
pub async fn invoke_plan(
    request: &RunRequest,
    tool: &Path,
    working_dir: &Path,
) -> Result<(), MaxrunError> {
    let start = Instant::now();

    let mut cmd = Command::new(tool);
    cmd.args(plan_args(request))
        .current_dir(working_dir)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    tracing::info!(command = %render_command(tool, request), "invoking planner");

    let mut child = cmd.spawn().map_err(|e| MaxrunError::Launch {
        tool: tool.to_path_buf(),
        source: e,
    })?;

    // process_group(0) makes the child its own group leader (pgid == pid),
    // so terminal-generated SIGINT no longer reaches it; the wait loop
    // re-delivers whatever the provisioner receives.
    let child_pid = child.id();

    let stdout_pipe = child.stdout.take().expect("stdout was piped");
    let stderr_pipe = child.stderr.take().expect("stderr was piped");

    let stdout_task = tokio::spawn(stream_through(stdout_pipe, tokio::io::stdout(), 0));
    let stderr_task = tokio::spawn(stream_through(
        stderr_pipe,
        tokio::io::stderr(),
        STDERR_TAIL_BYTES,
    ));

    let status = wait_forwarding_signals(&mut child, child_pid).await?;

    // The readers hit EOF once the child (and anything else holding its
    // pipe ends) has exited.
    let _ = stdout_task.await;
    let stderr_tail = stderr_task.await.unwrap_or_default();

    let elapsed_s = start.elapsed().as_secs_f64();
    if !status.success() {
        let code = status.code().unwrap_or(-1);
        tracing::warn!(code, elapsed_s, "planner failed");
        return Err(MaxrunError::ToolFailed {
            tool: tool.display().to_string(),
            code,
            stderr_tail,
        });
    }

    tracing::info!(elapsed_s, "planner finished");
    Ok(())
}

/// Block on the child while re-delivering SIGINT/SIGTERM to its process
/// group, so an interrupted provisioner never leaves the planner orphaned.
async fn wait_forwarding_signals(
    child: &mut Child,
    child_pid: Option<u32>,
) -> Result<ExitStatus, MaxrunError> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| MaxrunError::Other(format!("failed to install SIGINT handler: {e}")))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| MaxrunError::Other(format!("failed to install SIGTERM handler: {e}")))?;

    loop {
        tokio::select! {
            status = child.wait() => {
                return status
                    .map_err(|e| MaxrunError::Other(format!("failed to wait for planner: {e}")));
            }
            _ = sigint.recv() => forward_signal(child_pid, libc::SIGINT),
            _ = sigterm.recv() => forward_signal(child_pid, libc::SIGTERM),
        }
    }
}

fn forward_signal(child_pid: Option<u32>, sig: i32) {
    if let Some(pid) = child_pid {
        tracing::info!(signal = sig, "forwarding termination signal to planner");
        // Negative pid targets the whole process group, not just the leader.
        unsafe {
            libc::kill(-(pid as i32), sig);
        }
    }
}

/// Copy a child pipe to one of our own streams chunk by chunk, keeping the
/// last `tail_cap` bytes. Forward errors are tolerated and draining
/// continues so the child never blocks on a full pipe.
async fn stream_through<R, W>(mut from: R, mut to: W, tail_cap: usize) -> String
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut tail: Vec<u8> = Vec::new();
    let mut buf = [0u8; FORWARD_BUF_BYTES];
    loop {
        match from.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = to.write_all(&buf[..n]).await {
                    tracing::debug!("output forward error: {e}");
                } else {
                    let _ = to.flush().await;
                }
                if tail_cap > 0 {
                    tail.extend_from_slice(&buf[..n]);
                    if tail.len() > tail_cap {
                        let cut = tail.len() - tail_cap;
                        tail.drain(..cut);
                    }
                }
            }
            Err(e) => {
                tracing::warn!("pipe read error: {e}");
                break;
            }
        }
    }
    String::from_utf8_lossy(&tail).into_owned()
}
