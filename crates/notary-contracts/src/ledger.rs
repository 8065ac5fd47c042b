//! Audit ledger types.
//!
//! A `LedgerRecord` is one line of the hash-chained audit ledger. An
//! `AuditEntry` is what a component hands to the ledger to have an action
//! recorded; the ledger assigns the sequence number, timestamp and hashes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actor::Actor;

/// The `previous_hash` of the first record of every ledger file.
pub const GENESIS_HASH: &str = "0000";

/// Whether the audited action succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(Self::Success),
            "FAILURE" => Some(Self::Failure),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Security-relevant actions written to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateKey,
    RevokeKey,
    ExpireKeys,
    SignHash,
    TransactionCreated,
    TransactionVerified,
    TransactionVerifiedNok,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateKey => "CREATE_KEY",
            Self::RevokeKey => "REVOKE_KEY",
            Self::ExpireKeys => "EXPIRE_KEYS",
            Self::SignHash => "SIGN_HASH",
            Self::TransactionCreated => "TRANSACTION_CREATED",
            Self::TransactionVerified => "TRANSACTION_VERIFIED",
            Self::TransactionVerifiedNok => "TRANSACTION_VERIFIED_NOK",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to record one action in the ledger.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor: Actor,
    /// Name of the emitting service, e.g. "KMS" or "TRANSACTION".
    pub service: String,
    pub action: String,
    pub detail: String,
    pub outcome: Outcome,
}

impl AuditEntry {
    pub fn new(
        actor: Actor,
        service: impl Into<String>,
        action: AuditAction,
        detail: impl Into<String>,
        outcome: Outcome,
    ) -> Self {
        Self {
            actor,
            service: service.into(),
            action: action.as_str().to_string(),
            detail: detail.into(),
            outcome,
        }
    }
}

/// One immutable, chained ledger entry.
///
/// `current_hash` is `base64(SHA256(previous_hash || canonical_fields))`,
/// where the canonical fields are everything on the line before `prev=`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// 1-based position within its ledger file.
    pub sequence: u64,
    /// RFC 3339 timestamp, kept verbatim as written so hashes stay reproducible.
    pub timestamp: String,
    pub actor_id: String,
    pub actor_name: String,
    pub service: String,
    pub action: String,
    pub detail: String,
    pub outcome: Outcome,
    pub previous_hash: String,
    pub current_hash: String,
}

/// Result of verifying one ledger file end to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationResult {
    /// Every record recomputes to its stored hash.
    Intact,
    /// First mismatching record (1-based). When the file was the active
    /// ledger it has been quarantined under `quarantined_as`.
    CorruptedAtLine {
        line: usize,
        quarantined_as: Option<String>,
    },
    /// The file could not be read at all; distinct from a hash mismatch.
    TechnicalError { reason: String },
}

impl VerificationResult {
    pub fn is_intact(&self) -> bool {
        matches!(self, Self::Intact)
    }
}
