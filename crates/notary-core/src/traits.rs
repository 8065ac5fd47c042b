//! Trait definitions for every seam of the notary trust layer.
//!
//! The first four traits are implemented inside this workspace:
//!
//! - `LedgerStore`          : append-only line storage under the audit chain
//! - `AuditTrail`           : records an action as a chained ledger entry
//! - `KeyRepository`        : persistence of key records with per-record CAS
//! - `TransactionRepository`: persistence of notarized transactions
//!
//! The remaining three are external collaborators the core only consumes:
//! `BlobStore`, `IdentityProvider` and `NotificationSink`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use notary_contracts::{
    actor::{Actor, UserId},
    error::NotaryResult,
    key::{KeyId, KeyRecord, KeyStatus, NewKeyRecord},
    ledger::{AuditAction, AuditEntry, LedgerRecord},
    transaction::{BlobStat, ObjectId, Party, Transaction, TransactionId},
};

/// Line-oriented, append-only storage for ledger files.
///
/// Implementations serialize writers: `append` and `rotate` never interleave,
/// and readers never observe a half-written line.
pub trait LedgerStore: Send + Sync {
    /// Identifier of the file that `append` writes to.
    fn active_file(&self) -> &str;

    /// Append one line (without its terminator) to the active file.
    ///
    /// Returns `StorageUnavailable` when the line could not be made durable.
    fn append(&self, line: &str) -> NotaryResult<()>;

    /// All complete lines of `file`, in write order.
    fn read_all(&self, file: &str) -> NotaryResult<Vec<String>>;

    /// The raw bytes of `file`, for forensic export.
    fn read_raw(&self, file: &str) -> NotaryResult<Vec<u8>>;

    /// Move the active file to a timestamped quarantine name and start a new,
    /// empty active file. Returns the quarantine identifier.
    fn rotate(&self) -> NotaryResult<String>;

    /// Identifiers of every file following the ledger naming convention.
    fn list(&self) -> NotaryResult<Vec<String>>;
}

/// Anything that can durably record an audited action.
///
/// An action whose `record_action` call failed must be treated as not having
/// happened: the caller compensates or retries.
pub trait AuditTrail: Send + Sync {
    fn record_action(&self, entry: AuditEntry) -> NotaryResult<LedgerRecord>;
}

/// Result of a compare-and-set on a key's status.
#[derive(Debug, Clone)]
pub enum StatusChange {
    /// The record held the expected status and now holds the new one.
    Applied(KeyRecord),
    /// The record held some other status and was left untouched.
    Unchanged(KeyRecord),
}

impl StatusChange {
    pub fn record(&self) -> &KeyRecord {
        match self {
            Self::Applied(r) | Self::Unchanged(r) => r,
        }
    }

    pub fn into_record(self) -> KeyRecord {
        match self {
            Self::Applied(r) | Self::Unchanged(r) => r,
        }
    }

    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Storage for key records.
///
/// Operations on distinct records proceed independently; status changes on a
/// single record are serialized by `compare_and_set_status`.
pub trait KeyRepository: Send + Sync {
    fn exists(&self, user_id: &UserId, key_name: &str) -> NotaryResult<bool>;

    /// Assign an id and store the record. Fails with `DuplicateKeyName` if the
    /// `(user_id, key_name)` pair was taken concurrently.
    fn insert(&self, record: NewKeyRecord) -> NotaryResult<KeyRecord>;

    /// Remove a record whose creation was never committed to the audit trail.
    fn discard(&self, key_id: KeyId) -> NotaryResult<()>;

    fn find(&self, key_id: KeyId, user_id: &UserId) -> NotaryResult<Option<KeyRecord>>;

    fn list_by_user(&self, user_id: &UserId) -> NotaryResult<Vec<KeyRecord>>;

    /// Atomically move `key_id` from `expected` to `next`. Returns
    /// `KeyNotFound` if the record does not exist.
    fn compare_and_set_status(
        &self,
        key_id: KeyId,
        expected: KeyStatus,
        next: KeyStatus,
    ) -> NotaryResult<StatusChange>;

    /// Ids of `Active` records whose expiry is at or before `now`.
    fn due_for_expiry(&self, now: DateTime<Utc>) -> NotaryResult<Vec<KeyId>>;
}

/// Storage for notarized transactions.
pub trait TransactionRepository: Send + Sync {
    fn insert(&self, transaction: Transaction) -> NotaryResult<()>;

    /// Remove a transaction whose creation was never committed to the audit trail.
    fn discard(&self, id: TransactionId) -> NotaryResult<()>;

    fn find(&self, id: TransactionId) -> NotaryResult<Option<Transaction>>;

    /// Move the transaction to `Verified`. Already verified transactions are
    /// returned unchanged.
    fn mark_verified(&self, id: TransactionId) -> NotaryResult<Transaction>;

    fn list_for(&self, user_id: &UserId, party: Party) -> NotaryResult<Vec<Transaction>>;
}

/// Opaque content storage addressed by handle.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> NotaryResult<ObjectId>;

    async fn get(&self, object_id: &ObjectId) -> NotaryResult<Vec<u8>>;

    async fn stat(&self, object_id: &ObjectId) -> NotaryResult<BlobStat>;
}

/// Reports who is calling. Used only to populate audit actor fields.
pub trait IdentityProvider: Send + Sync {
    fn current_actor(&self) -> NotaryResult<Actor>;
}

/// Fire-and-forget notification of transaction events.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        trigger_id: &UserId,
        recipient_id: &UserId,
        action: AuditAction,
    ) -> NotaryResult<()>;
}
