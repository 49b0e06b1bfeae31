//! Parsing of the key-enumeration listing.
//!
//! The listing is free-form text with repeated blocks of the shape:
//!
//! ```text
//! pub   rsa4096 [SC]
//!       1111 2222 3333 4444 5555 6666 7777 8888 9999
//!       Keygrip = ABCD1234EF567890
//! ```
//!
//! Parsing is a linear scan for non-overlapping matches of that shape, not a
//! structural parse: unrelated text between blocks is ignored, and a block
//! missing any part (no keygrip line, malformed header) simply contributes
//! no record.

use std::sync::OnceLock;

use regex::Regex;
use shared_types::{KeyInfo, KeyType};

fn key_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Header tolerates extra columns (creation date, expiry) between the
        // algorithm and the capability brackets.
        Regex::new(
            r"(?m)^[ \t]*(pub|sub)\s+\S+[^\[\r\n]*\[([A-Za-z]+)\][^\r\n]*\r?\n[ \t]*([0-9A-Fa-f][0-9A-Fa-f ]*)\r?\n[ \t]*Keygrip\s*=\s*([0-9A-Fa-f]+)",
        )
        .expect("key block pattern is valid")
    })
}

/// Extract every well-formed key block from `listing`, in document order.
///
/// Fingerprints are returned with the grouping whitespace stripped. The
/// parser never fabricates values: no full match, no record - and never a
/// partial one.
pub fn parse_key_listing(listing: &str) -> Vec<KeyInfo> {
    key_block_pattern()
        .captures_iter(listing)
        .map(|caps| {
            let key_type = if &caps[1] == "pub" {
                KeyType::Primary
            } else {
                KeyType::Subordinate
            };
            let fingerprint: String = caps[3].chars().filter(|c| !c.is_whitespace()).collect();
            KeyInfo {
                key_type,
                capabilities: caps[2].to_string(),
                fingerprint,
                keygrip: caps[4].to_string(),
            }
        })
        .collect()
}
