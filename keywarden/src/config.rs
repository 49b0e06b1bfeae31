//! Environment-driven configuration.
//!
//! Everything has a sensible default; the editor extension normally ships a
//! `.env` or sets variables on the spawned process. When no key is
//! configured explicitly, the enclosing git repository is consulted.

use crate::process::run_command;

#[derive(Debug, Clone)]
pub struct Config {
    /// Short identifier of the signing key, usually a fingerprint suffix.
    pub key_id: Option<String>,
    /// Whether the surrounding repository requires signed commits.
    pub signing_required: bool,
    /// Program used for key enumeration and interactive signing.
    pub gpg_program: String,
    /// Program used to query the running key agent.
    pub agent_program: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            key_id: std::env::var("KEYWARDEN_KEY_ID")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            signing_required: env_flag("KEYWARDEN_SIGNING_REQUIRED", false),
            gpg_program: env_str("KEYWARDEN_GPG_PROGRAM", "gpg"),
            agent_program: env_str("KEYWARDEN_AGENT_PROGRAM", "gpg-connect-agent"),
        }
    }

    /// Fill unset fields from the enclosing git repository.
    pub async fn discover_from_repository(&mut self) {
        if self.key_id.is_none() {
            if let Some(key) = git_config_value("user.signingkey").await {
                tracing::info!(key_id = %key, "using signing key from git config");
                self.key_id = Some(key);
            }
        }
        if !self.signing_required {
            if let Some(flag) = git_config_value("commit.gpgsign").await {
                self.signing_required = flag.eq_ignore_ascii_case("true");
            }
        }
    }
}

async fn git_config_value(name: &str) -> Option<String> {
    let args = vec!["config".to_string(), "--get".to_string(), name.to_string()];
    match run_command("git", &args, "").await {
        Ok(output) => {
            let value = output.trim();
            (!value.is_empty()).then(|| value.to_string())
        }
        Err(e) => {
            // git exits non-zero for an unset setting; nothing to report.
            tracing::debug!(setting = name, error = %e, "git config lookup failed");
            None
        }
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(raw) => flag_from(&raw),
        Err(_) => default,
    }
}

fn flag_from(value: &str) -> bool {
    value != "0" && !value.eq_ignore_ascii_case("false")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_parsing_accepts_common_spellings() {
        assert!(flag_from("1"));
        assert!(flag_from("true"));
        assert!(flag_from("TRUE"));
        assert!(!flag_from("0"));
        assert!(!flag_from("false"));
        assert!(!flag_from("False"));
    }
}
