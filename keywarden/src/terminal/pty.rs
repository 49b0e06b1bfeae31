//! Pseudo-terminal transport.
//!
//! Spawns a child process attached to a fresh PTY so that tools demanding a
//! real terminal device (secret prompts in particular) can be automated.
//! Blocking PTY I/O runs on `spawn_blocking` threads bridged to tokio
//! channels; the async side only ever awaits.

use std::io::{Read, Write};

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, PtySize};
use tokio::sync::{mpsc, oneshot};

use super::{TerminalError, Transport};

type WriteRequest = (String, oneshot::Sender<std::io::Result<()>>);

/// A child process running on a dedicated pseudo-terminal.
///
/// Each session owns its PTY pair and child exclusively; concurrent sessions
/// share no state.
pub struct PtySession {
    input_tx: mpsc::Sender<WriteRequest>,
    chunk_rx: mpsc::Receiver<String>,
    exit_rx: Option<oneshot::Receiver<i32>>,
    child_killer: Box<dyn ChildKiller + Send + Sync>,
    _master: Box<dyn portable_pty::MasterPty + Send>,
}

impl PtySession {
    /// Allocate a PTY and spawn `command` on it.
    pub fn spawn(command: &str, args: &[String]) -> Result<Self, TerminalError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TerminalError::OpenFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(command);
        cmd.args(args);

        let mut child = pair.slave.spawn_command(cmd).map_err(|e| {
            TerminalError::SpawnFailed {
                command: command.to_string(),
                reason: e.to_string(),
            }
        })?;
        let child_killer = child.clone_killer();

        let mut writer = pair
            .master
            .take_writer()
            .map_err(|e| TerminalError::OpenFailed(format!("failed to get PTY writer: {e}")))?;
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| TerminalError::OpenFailed(format!("failed to clone PTY reader: {e}")))?;

        let (input_tx, mut input_rx) = mpsc::channel::<WriteRequest>(16);
        let (chunk_tx, chunk_rx) = mpsc::channel::<String>(64);
        let (exit_tx, exit_rx) = oneshot::channel::<i32>();

        // Input task: each write is acknowledged only after it is flushed,
        // so the matching loop never races ahead of its own answer.
        tokio::task::spawn_blocking(move || {
            while let Some((text, ack)) = input_rx.blocking_recv() {
                let result = writer
                    .write_all(text.as_bytes())
                    .and_then(|_| writer.flush());
                let failed = result.is_err();
                let _ = ack.send(result);
                if failed {
                    break;
                }
            }
        });

        // Output task: PTY -> chunk channel, in arrival order. EOF or a read
        // error (the master reports an error once the child closes the
        // slave) ends the stream.
        tokio::task::spawn_blocking(move || {
            let mut buffer = [0u8; 1024];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let data = String::from_utf8_lossy(&buffer[..n]).to_string();
                        if chunk_tx.blocking_send(data).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        // Exit monitor: report the child's exit code once.
        tokio::task::spawn_blocking(move || {
            let code = child
                .wait()
                .map(|status| status.exit_code() as i32)
                .unwrap_or(-1);
            let _ = exit_tx.send(code);
        });

        Ok(Self {
            input_tx,
            chunk_rx,
            exit_rx: Some(exit_rx),
            child_killer,
            _master: pair.master,
        })
    }

    /// Wait for the child to exit and return its exit code.
    pub async fn wait(&mut self) -> Result<i32, TerminalError> {
        let exit_rx = self
            .exit_rx
            .take()
            .ok_or_else(|| TerminalError::Io("exit status already consumed".to_string()))?;
        exit_rx
            .await
            .map_err(|_| TerminalError::Io("exit monitor dropped".to_string()))
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        // A session abandoned mid-exchange must not leak its child. Errors
        // are ignored; the child may have exited already.
        let _ = self.child_killer.kill();
    }
}

#[async_trait::async_trait]
impl Transport for PtySession {
    async fn next_chunk(&mut self) -> Result<Option<String>, TerminalError> {
        Ok(self.chunk_rx.recv().await)
    }

    async fn send_line(&mut self, text: &str) -> Result<(), TerminalError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.input_tx
            .send((format!("{text}\n"), ack_tx))
            .await
            .map_err(|_| TerminalError::Io("terminal input channel closed".to_string()))?;
        match ack_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TerminalError::Io(e.to_string())),
            Err(_) => Err(TerminalError::Io(
                "input task dropped before the write completed".to_string(),
            )),
        }
    }
}
