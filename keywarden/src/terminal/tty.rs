//! Direct controlling-terminal channel.
//!
//! Fallback transport for scripted exchanges in contexts where no
//! pseudo-terminal can be allocated but the hosting process already owns a
//! controlling terminal, e.g. running inside an interactive shell. The
//! matching discipline is identical to the PTY driver; only the transport
//! differs.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};

use async_trait::async_trait;

use super::{TerminalError, Transport};

const TTY_DEVICE: &str = "/dev/tty";

/// Independent read and write handles on the controlling terminal.
///
/// The controlling terminal is a process-wide singleton resource: hold at
/// most one open channel at a time, and `dispose()` it before opening
/// another.
#[derive(Debug, Default)]
pub struct TtyChannel {
    reader: Option<File>,
    writer: Option<File>,
}

impl TtyChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the controlling terminal for reading and writing.
    ///
    /// On failure no handle is retained, so a later `dispose()` is still
    /// safe and a later `read()` still reports `NotOpened`.
    pub fn open(&mut self) -> Result<(), TerminalError> {
        let reader =
            File::open(TTY_DEVICE).map_err(|e| TerminalError::OpenFailed(e.to_string()))?;
        let writer = OpenOptions::new()
            .write(true)
            .open(TTY_DEVICE)
            .map_err(|e| TerminalError::OpenFailed(e.to_string()))?;
        self.reader = Some(reader);
        self.writer = Some(writer);
        Ok(())
    }

    /// The next available chunk of terminal input as decoded text.
    ///
    /// A zero-byte read means the peer disconnected; that is surfaced as
    /// `EmptyRead`, never as a valid empty prompt.
    pub async fn read(&mut self) -> Result<String, TerminalError> {
        let reader = self.reader.as_ref().ok_or(TerminalError::NotOpened)?;
        let mut handle = reader
            .try_clone()
            .map_err(|e| TerminalError::Io(e.to_string()))?;
        let chunk = tokio::task::spawn_blocking(move || {
            let mut buffer = [0u8; 1024];
            let n = handle.read(&mut buffer)?;
            Ok::<_, std::io::Error>(String::from_utf8_lossy(&buffer[..n]).to_string())
        })
        .await
        .map_err(|e| TerminalError::Io(e.to_string()))?
        .map_err(|e| TerminalError::Io(e.to_string()))?;

        if chunk.is_empty() {
            return Err(TerminalError::EmptyRead);
        }
        Ok(chunk)
    }

    /// Write `text` to the terminal verbatim.
    pub async fn write(&mut self, text: &str) -> Result<(), TerminalError> {
        let writer = self.writer.as_ref().ok_or(TerminalError::NotOpened)?;
        let mut handle = writer
            .try_clone()
            .map_err(|e| TerminalError::Io(e.to_string()))?;
        let owned = text.to_string();
        tokio::task::spawn_blocking(move || {
            handle.write_all(owned.as_bytes())?;
            handle.flush()
        })
        .await
        .map_err(|e| TerminalError::Io(e.to_string()))?
        .map_err(|e| TerminalError::Io(e.to_string()))
    }

    /// Release the terminal handles. Idempotent, and safe after a failed or
    /// absent `open()`.
    pub fn dispose(&mut self) {
        self.reader = None;
        self.writer = None;
    }
}

#[async_trait]
impl Transport for TtyChannel {
    async fn next_chunk(&mut self) -> Result<Option<String>, TerminalError> {
        // EOF surfaces as EmptyRead; a direct terminal has no clean end.
        self.read().await.map(Some)
    }

    async fn send_line(&mut self, text: &str) -> Result<(), TerminalError> {
        self.write(&format!("{text}\n")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_before_open_is_not_opened() {
        let mut channel = TtyChannel::new();
        let err = channel.read().await.unwrap_err();
        assert!(matches!(err, TerminalError::NotOpened));
    }

    #[tokio::test]
    async fn test_write_before_open_is_not_opened() {
        let mut channel = TtyChannel::new();
        let err = channel.write("hello").await.unwrap_err();
        assert!(matches!(err, TerminalError::NotOpened));
    }

    #[test]
    fn test_dispose_is_idempotent_and_safe_without_open() {
        let mut channel = TtyChannel::new();
        channel.dispose();
        channel.dispose();
    }

    #[tokio::test]
    async fn test_dispose_after_open_forgets_handles() {
        // Only meaningful where a controlling terminal exists; CI test
        // runners usually detach it.
        let mut channel = TtyChannel::new();
        if channel.open().is_err() {
            return;
        }
        channel.dispose();
        let err = channel.read().await.unwrap_err();
        assert!(matches!(err, TerminalError::NotOpened));
    }
}
