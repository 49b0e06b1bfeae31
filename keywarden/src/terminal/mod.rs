//! Scripted interactive exchanges with terminal-bound programs.
//!
//! Some tools (notably passphrase-protected signing tools) refuse input
//! piped through plain stdin and insist on a terminal device. This module
//! automates them with a fixed question/answer script instead of free-form
//! terminal emulation: every chunk of output must satisfy the next expected
//! pattern, whose scripted answer is written back before the following chunk
//! is examined.
//!
//! The matching loop is written once against the [`Transport`] capability
//! and runs unchanged over a freshly allocated pseudo-terminal
//! ([`pty::PtySession`]) or the process's own controlling terminal
//! ([`tty::TtyChannel`]).

pub mod pty;
pub mod tty;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("failed to open terminal: {0}")]
    OpenFailed(String),

    #[error("failed to spawn `{command}` on the terminal: {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("terminal I/O error: {0}")]
    Io(String),

    #[error("invalid action pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("output {chunk:?} arrived with no scripted action left to consume it")]
    ProtocolExhausted { chunk: String },

    #[error("output {chunk:?} did not match the expected pattern `{pattern}`")]
    UnexpectedOutput { chunk: String, pattern: String },

    #[error("interactive child exited with code {code}")]
    ChildProcessFailed { code: i32 },

    #[error("terminal channel used before open()")]
    NotOpened,

    #[error("terminal read returned no data")]
    EmptyRead,
}

// ============================================================================
// Actions and the exchange state machine
// ============================================================================

/// One step of a scripted exchange: a pattern the next chunk of output must
/// satisfy, and the literal text to send back when it does.
#[derive(Debug, Clone)]
pub struct Action {
    question: Regex,
    answer: String,
}

impl Action {
    pub fn new(question: &str, answer: impl Into<String>) -> Result<Self, TerminalError> {
        Ok(Self {
            question: Regex::new(question)?,
            answer: answer.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.question.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExchangeState {
    /// Waiting for output to satisfy the action at this index.
    Pending(usize),
    Succeeded,
    Failed,
}

/// The action queue of one interactive session, as an explicit state
/// machine.
///
/// Actions are consumed strictly in the order given, never skipped,
/// reordered, or retried. Exhaustion and mismatch are terminal transitions;
/// both leave the machine in `Failed` and the session unusable.
#[derive(Debug)]
pub struct Exchange {
    actions: Vec<Action>,
    state: ExchangeState,
}

impl Exchange {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            state: ExchangeState::Pending(0),
        }
    }

    /// Feed one chunk of child output. On a match, returns the scripted
    /// answer to send back.
    pub fn observe(&mut self, chunk: &str) -> Result<&str, TerminalError> {
        let index = match self.state {
            ExchangeState::Pending(index) => index,
            ExchangeState::Succeeded | ExchangeState::Failed => {
                return Err(TerminalError::ProtocolExhausted {
                    chunk: chunk.to_string(),
                });
            }
        };
        if index >= self.actions.len() {
            self.state = ExchangeState::Failed;
            return Err(TerminalError::ProtocolExhausted {
                chunk: chunk.to_string(),
            });
        }
        if !self.actions[index].question.is_match(chunk) {
            let pattern = self.actions[index].pattern().to_string();
            self.state = ExchangeState::Failed;
            return Err(TerminalError::UnexpectedOutput {
                chunk: chunk.to_string(),
                pattern,
            });
        }
        self.state = ExchangeState::Pending(index + 1);
        Ok(self.actions[index].answer.as_str())
    }

    /// Settle the exchange once the child has exited.
    ///
    /// Exit code zero succeeds even with unconsumed trailing actions: the
    /// script only requires that every prompt that actually appeared was
    /// answered.
    pub fn finish(&mut self, exit_code: i32) -> Result<(), TerminalError> {
        if exit_code == 0 {
            self.state = ExchangeState::Succeeded;
            Ok(())
        } else {
            self.state = ExchangeState::Failed;
            Err(TerminalError::ChildProcessFailed { code: exit_code })
        }
    }
}

// ============================================================================
// Transport and the matching loop
// ============================================================================

/// Polymorphic transport for one scripted exchange: something that yields
/// chunks of decoded output and accepts answer lines.
#[async_trait]
pub trait Transport {
    /// The next available chunk, or `None` once the peer is cleanly gone.
    async fn next_chunk(&mut self) -> Result<Option<String>, TerminalError>;

    /// Send one answer line (newline appended by the transport). Resolves
    /// only after the bytes are fully written and flushed.
    async fn send_line(&mut self, text: &str) -> Result<(), TerminalError>;
}

/// Run `exchange` over `transport` until the output stream ends.
///
/// Chunks are processed strictly in arrival order; the answer for chunk N is
/// fully written before chunk N+1 is examined, so the child never reads an
/// answer ahead of its own prompt.
pub async fn run_exchange<T: Transport + ?Sized>(
    transport: &mut T,
    exchange: &mut Exchange,
) -> Result<(), TerminalError> {
    while let Some(chunk) = transport.next_chunk().await? {
        tracing::trace!(chunk = %chunk, "terminal output chunk");
        let answer = exchange.observe(&chunk)?.to_string();
        transport.send_line(&answer).await?;
    }
    Ok(())
}

/// Drive `command` to completion inside a fresh pseudo-terminal, answering
/// its prompts from `actions`.
///
/// Fails with [`TerminalError::UnexpectedOutput`] on a mismatched prompt,
/// [`TerminalError::ProtocolExhausted`] when output arrives with the script
/// already spent, and [`TerminalError::ChildProcessFailed`] on a non-zero
/// exit - including a child killed from outside.
pub async fn drive(
    command: &str,
    args: &[String],
    actions: Vec<Action>,
) -> Result<(), TerminalError> {
    let mut exchange = Exchange::new(actions);
    let mut session = pty::PtySession::spawn(command, args)?;
    run_exchange(&mut session, &mut exchange).await?;
    let code = session.wait().await?;
    exchange.finish(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn action(question: &str, answer: &str) -> Action {
        Action::new(question, answer).expect("test pattern is valid")
    }

    #[test]
    fn test_actions_match_in_order() {
        let mut exchange = Exchange::new(vec![
            action("Continue\\?", "yes"),
            action("Passphrase:", "hunter2"),
        ]);
        assert_eq!(exchange.observe("Continue? (y/N) ").unwrap(), "yes");
        assert_eq!(exchange.observe("Passphrase: ").unwrap(), "hunter2");
        assert!(exchange.finish(0).is_ok());
    }

    #[test]
    fn test_out_of_order_chunk_is_a_mismatch() {
        let mut exchange = Exchange::new(vec![
            action("First", "one"),
            action("Second", "two"),
        ]);
        exchange.observe("First? ").unwrap();
        let err = exchange.observe("First? ").unwrap_err();
        match err {
            TerminalError::UnexpectedOutput { chunk, pattern } => {
                assert_eq!(chunk, "First? ");
                assert_eq!(pattern, "Second");
            }
            other => panic!("expected UnexpectedOutput, got {other:?}"),
        }
    }

    #[test]
    fn test_chunk_after_script_is_spent_is_exhaustion() {
        let mut exchange = Exchange::new(vec![action("Only", "x")]);
        exchange.observe("Only prompt ").unwrap();
        let err = exchange.observe("surprise").unwrap_err();
        assert!(matches!(err, TerminalError::ProtocolExhausted { .. }));
    }

    #[test]
    fn test_empty_script_is_exhausted_immediately() {
        let mut exchange = Exchange::new(Vec::new());
        let err = exchange.observe("anything").unwrap_err();
        assert!(matches!(err, TerminalError::ProtocolExhausted { .. }));
    }

    #[test]
    fn test_trailing_unconsumed_actions_are_not_an_error() {
        let mut exchange = Exchange::new(vec![
            action("First", "one"),
            action("Second", "two"),
        ]);
        exchange.observe("First? ").unwrap();
        assert!(exchange.finish(0).is_ok());
    }

    #[test]
    fn test_nonzero_exit_fails_even_after_all_actions_fired() {
        let mut exchange = Exchange::new(vec![action("Prompt", "x")]);
        exchange.observe("Prompt: ").unwrap();
        let err = exchange.finish(3).unwrap_err();
        assert!(matches!(
            err,
            TerminalError::ChildProcessFailed { code: 3 }
        ));
    }

    struct ScriptedTransport {
        chunks: VecDeque<String>,
        sent: Vec<String>,
    }

    impl ScriptedTransport {
        fn new(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
                sent: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn next_chunk(&mut self) -> Result<Option<String>, TerminalError> {
            Ok(self.chunks.pop_front())
        }

        async fn send_line(&mut self, text: &str) -> Result<(), TerminalError> {
            self.sent.push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_matching_loop_answers_every_prompt() {
        let mut transport = ScriptedTransport::new(&["Overwrite? (y/N) ", "Enter passphrase: "]);
        let mut exchange = Exchange::new(vec![
            action("Overwrite\\? \\(y/N\\)", "y"),
            action("Enter passphrase:", "secret"),
        ]);
        run_exchange(&mut transport, &mut exchange)
            .await
            .expect("exchange should complete");
        assert_eq!(transport.sent, vec!["y", "secret"]);
    }

    #[tokio::test]
    async fn test_matching_loop_stops_at_first_mismatch() {
        let mut transport = ScriptedTransport::new(&["Unrelated warning"]);
        let mut exchange = Exchange::new(vec![action("Enter passphrase:", "secret")]);
        let err = run_exchange(&mut transport, &mut exchange)
            .await
            .unwrap_err();
        assert!(matches!(err, TerminalError::UnexpectedOutput { .. }));
        assert!(transport.sent.is_empty());
    }
}
