//! Shared types between the keywarden backend and the editor frontend
//!
//! These types are used by both:
//! - the backend binary (native Rust)
//! - the editor extension (TypeScript)
//!
//! Serializable with serde for JSON over stdout; exported to TypeScript
//! with ts-rs so the extension consumes the same shapes the backend emits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Key Records
// ============================================================================

/// Whether a key record is the primary key of its certificate or a subkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../editor/types/generated.ts")]
pub enum KeyType {
    Primary,
    Subordinate,
}

/// One cryptographic key record as reported by the key agent's keyring.
///
/// `fingerprint` and `keygrip` are taken verbatim from agent output (with
/// grouping whitespace stripped from the fingerprint). Records are recomputed
/// on every query; the agent's keyring is the source of truth and may change
/// between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../editor/types/generated.ts")]
pub struct KeyInfo {
    pub key_type: KeyType,
    /// Capability-letter flags (sign/certify/encrypt/authenticate), opaque
    /// pass-through, not individually validated.
    pub capabilities: String,
    pub fingerprint: String,
    pub keygrip: String,
}

// ============================================================================
// Status Reports
// ============================================================================

/// Snapshot of the configured signing key's state, rendered by the editor.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../editor/types/generated.ts")]
pub struct KeyStatusReport {
    /// The short identifier the key was looked up with.
    pub key_id: String,
    pub fingerprint: String,
    pub keygrip: String,
    /// Whether the agent currently caches the key's private material.
    pub unlocked: bool,
    /// Whether the surrounding repository requires signed commits.
    pub signing_required: bool,
    pub checked_at: DateTime<Utc>,
}
