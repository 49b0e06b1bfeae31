//! Key status and unlock protocol against the external key agent.
//!
//! Composes the process runner, the metadata parser, and the terminal
//! driver to answer "is key X unlocked" and "unlock key X with passphrase
//! P". Every operation spawns fresh processes and surfaces the first
//! failure of any composed step unchanged; there are no retries and no
//! silent fallbacks.

pub mod parser;

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::process::{run_command, CommandError};
use crate::terminal::{drive, Action, TerminalError};
use shared_types::KeyInfo;

#[derive(Debug, Error)]
pub enum GpgError {
    #[error("no known key matches `{0}`")]
    KeyNotFound(String),

    #[error("key agent reported an error: {0}")]
    AgentError(String),

    #[error("malformed key agent response: {0}")]
    MalformedResponse(String),

    #[error("failed to create scratch file: {0}")]
    ScratchFile(#[from] std::io::Error),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Terminal(#[from] TerminalError),
}

/// Entry points for querying and unlocking keys held by the agent.
///
/// Nothing is cached between calls: the agent's keyring is the source of
/// truth and may change at any time (key added or removed, locked or
/// unlocked). Concurrent calls are safe; each one owns its processes and
/// scratch files exclusively.
#[derive(Debug, Clone)]
pub struct GpgClient {
    gpg_program: String,
    agent_program: String,
}

impl GpgClient {
    pub fn new(gpg_program: impl Into<String>, agent_program: impl Into<String>) -> Self {
        Self {
            gpg_program: gpg_program.into(),
            agent_program: agent_program.into(),
        }
    }

    /// Resolve a short key identifier to its full record.
    ///
    /// The enumeration asks for fingerprints twice so subkey fingerprints
    /// are shown too, plus keygrips. The first key whose fingerprint
    /// contains `short_id` wins: agents commonly report only a suffix of
    /// the fingerprint as the configured signing key, so this is substring
    /// containment in enumeration order, not equality.
    pub async fn resolve_key(&self, short_id: &str) -> Result<KeyInfo, GpgError> {
        let args = vec![
            "--list-secret-keys".to_string(),
            "--fingerprint".to_string(),
            "--fingerprint".to_string(),
            "--with-keygrip".to_string(),
        ];
        let listing = run_command(&self.gpg_program, &args, "").await?;
        select_key(parser::parse_key_listing(&listing), short_id)
    }

    /// Ask the agent whether the private material behind `keygrip` is
    /// currently cached.
    pub async fn is_unlocked(&self, keygrip: &str) -> Result<bool, GpgError> {
        let reply = run_command(&self.agent_program, &[], &format!("KEYINFO {keygrip}\n")).await?;
        parse_keyinfo_reply(&reply)
    }

    /// `resolve_key` composed with `is_unlocked`.
    pub async fn is_key_id_unlocked(&self, short_id: &str) -> Result<bool, GpgError> {
        let key = self.resolve_key(short_id).await?;
        self.is_unlocked(&key.keygrip).await
    }

    /// Unlock the key by signing a scratch document interactively,
    /// answering the prompts with the supplied passphrase.
    ///
    /// The signature target exists before the run, so the signing tool asks
    /// for overwrite confirmation ahead of the passphrase prompt; both
    /// scratch files are removed on every exit path. An empty passphrase is
    /// a legal attempt and is forwarded as-is. A successful run leaves the
    /// key cached in the agent as a side effect; callers wanting a
    /// confirmed boolean re-query `is_unlocked`.
    pub async fn unlock_key(&self, short_id: &str, passphrase: &str) -> Result<(), GpgError> {
        let key = self.resolve_key(short_id).await?;

        let document = NamedTempFile::new()?;
        let signature = NamedTempFile::new()?;

        let actions = vec![
            Action::new(r"Overwrite\? \(y/N\)", "y")?,
            Action::new(r"Enter passphrase:", passphrase)?,
        ];

        let args = vec![
            "--pinentry-mode".to_string(),
            "loopback".to_string(),
            "--local-user".to_string(),
            key.fingerprint.clone(),
            "--output".to_string(),
            signature.path().display().to_string(),
            "--sign".to_string(),
            document.path().display().to_string(),
        ];

        tracing::debug!(fingerprint = %key.fingerprint, "driving interactive signing run");
        drive(&self.gpg_program, &args, actions).await?;
        Ok(())
    }
}

fn select_key(keys: Vec<KeyInfo>, short_id: &str) -> Result<KeyInfo, GpgError> {
    keys.into_iter()
        .find(|key| key.fingerprint.contains(short_id))
        .ok_or_else(|| GpgError::KeyNotFound(short_id.to_string()))
}

/// Decode the agent's KEYINFO reply.
///
/// Success is two lines: an 11-token status line and an `OK` sentinel (not
/// otherwise parsed). The cached flag sits at token index 7 - `"1"` cached,
/// `"0"` not, `"-"` unknown. A single-line reply is the agent's error
/// shape.
fn parse_keyinfo_reply(reply: &str) -> Result<bool, GpgError> {
    let lines: Vec<&str> = reply.lines().filter(|l| !l.trim().is_empty()).collect();
    match lines.as_slice() {
        [] => Err(GpgError::MalformedResponse("empty agent reply".to_string())),
        [only] => Err(GpgError::AgentError((*only).to_string())),
        [status, ..] => {
            let tokens: Vec<&str> = status.split_whitespace().collect();
            if tokens.len() != 11 {
                return Err(GpgError::MalformedResponse(format!(
                    "expected 11 status tokens, got {}: {status}",
                    tokens.len()
                )));
            }
            Ok(tokens[7] == "1")
        }
    }
}
