//! Keywarden - signing-key status and unlock backend
//!
//! This crate drives the external GnuPG tooling through real process and
//! terminal transports: enumerating keys, querying the agent's cache state,
//! and unlocking a key by answering its interactive prompts.

pub mod config;
pub mod gpg;
pub mod process;
pub mod terminal;
