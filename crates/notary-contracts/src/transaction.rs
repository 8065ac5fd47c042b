//! Notarized transaction types.
//!
//! A `Transaction` hands a piece of content from an owner to a recipient.
//! Its `MediaRecord` points at the stored blob and embeds the
//! `SignatureRecord` that binds the content hash to the owner's key.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::UserId;
use crate::key::KeyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle returned by the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub String);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata reported by the blob store for a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobStat {
    pub size: u64,
    pub content_type: String,
}

/// `Pending` until a verification succeeds; `Verified` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Verified,
}

/// Everything a verifier needs to re-derive a signature check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// Base64 SHA-256 of the content.
    pub content_hash: String,
    /// Base64 RSA/SHA-256 signature over the decoded content hash.
    pub signature: String,
    pub key_id: KeyId,
    /// Base64 SPKI snapshot of the signing key's public half.
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub object_id: ObjectId,
    pub content_type: String,
    pub signature: SignatureRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub owner_id: UserId,
    pub recipient_id: UserId,
    pub amount: f64,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
    pub media: Option<MediaRecord>,
}

/// Which side of a transaction a history query is asked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Owner,
    Recipient,
}
