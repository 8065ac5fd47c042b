//! Key lifecycle types owned by the key vault.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::UserId;

/// Identifier assigned to a key record by its repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyId(pub u64);

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a key.
///
/// `Active` is the only non-terminal state. `Revoked` and `Expired` never
/// transition anywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyStatus {
    Active,
    Revoked,
    Expired,
}

impl KeyStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: KeyStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Revoked) | (Self::Active, Self::Expired)
        )
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "ACTIVE",
            Self::Revoked => "REVOKED",
            Self::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// AES-256-GCM envelope around a PKCS#8 private key. Both fields are base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKey {
    /// Ciphertext with the 128-bit tag appended.
    pub ciphertext: String,
    /// The 96-bit nonce used for this encryption only.
    pub nonce: String,
}

/// A user's named key pair as persisted by the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: KeyId,
    pub user_id: UserId,
    /// Unique within `user_id`.
    pub key_name: String,
    /// Base64 SPKI DER.
    pub public_key: String,
    pub encrypted_private_key: EncryptedKey,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    pub expired_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    /// Active and not past its expiry instant at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.status == KeyStatus::Active && self.expired_at.map_or(true, |at| at > now)
    }
}

/// A key record before the repository has assigned it an id.
#[derive(Debug, Clone)]
pub struct NewKeyRecord {
    pub user_id: UserId,
    pub key_name: String,
    pub public_key: String,
    pub encrypted_private_key: EncryptedKey,
    pub created_at: DateTime<Utc>,
    pub expired_at: Option<DateTime<Utc>>,
}
