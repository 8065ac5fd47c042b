//! Hash-chain primitives: linking and whole-file verification.
//!
//! Hash input layout (bytes, in order):
//!   1. previous hash as UTF-8 (base64 text, or `GENESIS_HASH`)
//!   2. canonical field string as UTF-8
//!
//! The digest is SHA-256, stored as standard padded base64.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

use notary_contracts::ledger::GENESIS_HASH;

use crate::line;

/// Compute `base64(SHA256(previous_hash || canonical_fields))`.
pub fn hash_link(previous_hash: &str, canonical_fields: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(canonical_fields.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Find the first line (1-based) that breaks the chain, or `None` if the
/// whole sequence verifies.
///
/// A line breaks the chain when:
///
/// 1. it does not split into fields, `prev=` and `hash=`;
/// 2. its stored `prev=` differs from the running hash;
/// 3. its stored `hash=` differs from the recomputed link.
///
/// Only the first break is reported; later lines are not inspected.
pub fn first_broken_line<S: AsRef<str>>(lines: &[S]) -> Option<usize> {
    let mut running = GENESIS_HASH.to_string();

    for (idx, raw) in lines.iter().enumerate() {
        let Some((data, prev, hash)) = line::split_line(raw.as_ref()) else {
            return Some(idx + 1);
        };

        if prev != running || hash_link(&running, data) != hash {
            return Some(idx + 1);
        }

        running = hash.to_string();
    }

    None
}

/// Sequence number and hash a new record should chain from, given the
/// current lines of the active file.
pub(crate) fn head_of<S: AsRef<str>>(lines: &[S]) -> (u64, String) {
    let last_hash = lines
        .last()
        .and_then(|l| line::stored_hash(l.as_ref()))
        .unwrap_or(GENESIS_HASH)
        .to_string();
    (lines.len() as u64, last_hash)
}
