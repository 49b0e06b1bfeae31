//! One-shot external command execution.
//!
//! Every call spawns a fresh OS process, delivers the full stdin payload,
//! and collects the complete standard output. No state is shared between
//! calls.

use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// An external command failed to start, lost its stdin, or exited non-zero.
#[derive(Debug, Error)]
#[error("command `{command}` failed{}: {stderr}", exit_suffix(.exit_code))]
pub struct CommandError {
    pub command: String,
    /// Absent when the process never started or was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured error-stream text, or the spawn/IO error description.
    pub stderr: String,
}

fn exit_suffix(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!(" with exit code {code}"),
        None => String::new(),
    }
}

impl CommandError {
    fn startup(command: &str, error: impl std::fmt::Display) -> Self {
        Self {
            command: command.to_string(),
            exit_code: None,
            stderr: error.to_string(),
        }
    }
}

/// Run `command` to completion and return everything it wrote to stdout.
///
/// The stdin payload is written in full and the child's stdin handle is then
/// closed, so commands that read until end-of-input terminate instead of
/// hanging. Output is concatenated across however many chunks the pipe
/// delivers it in. A non-zero exit code fails with the captured stderr text.
pub async fn run_command(
    command: &str,
    args: &[String],
    stdin_payload: &str,
) -> Result<String, CommandError> {
    tracing::debug!(command, ?args, "running external command");

    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| CommandError::startup(command, e))?;

    if !stdin_payload.is_empty() {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CommandError::startup(command, "child stdin unavailable"))?;
        stdin
            .write_all(stdin_payload.as_bytes())
            .await
            .map_err(|e| CommandError::startup(command, e))?;
        // Dropped here: the child sees end-of-input once the payload is out.
    }
    drop(child.stdin.take());

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| CommandError::startup(command, e))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(CommandError {
            command: command.to_string(),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
