//! In-memory `KeyRepository` backed by `DashMap`.
//!
//! Records live in one map keyed by id; a second map indexes
//! `(user_id, key_name)` so name uniqueness is claimed atomically through
//! the entry API. Status changes lock only the shard holding the record.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};

use notary_contracts::{
    actor::UserId,
    error::{NotaryError, NotaryResult},
    key::{KeyId, KeyRecord, KeyStatus, NewKeyRecord},
};
use notary_core::traits::{KeyRepository, StatusChange};

#[derive(Debug, Default)]
pub struct InMemoryKeyRepository {
    records: DashMap<KeyId, KeyRecord>,
    names: DashMap<(UserId, String), KeyId>,
    next_id: AtomicU64,
}

impl InMemoryKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Overwrite a stored record wholesale, simulating at-rest tampering.
    pub fn overwrite(&self, record: KeyRecord) {
        self.records.insert(record.id, record);
    }
}

impl KeyRepository for InMemoryKeyRepository {
    fn exists(&self, user_id: &UserId, key_name: &str) -> NotaryResult<bool> {
        Ok(self
            .names
            .contains_key(&(user_id.clone(), key_name.to_string())))
    }

    fn insert(&self, record: NewKeyRecord) -> NotaryResult<KeyRecord> {
        let name_key = (record.user_id.clone(), record.key_name.clone());
        let slot = match self.names.entry(name_key) {
            Entry::Occupied(_) => {
                return Err(NotaryError::DuplicateKeyName {
                    user_id: record.user_id.to_string(),
                    key_name: record.key_name,
                })
            }
            Entry::Vacant(slot) => slot,
        };

        let id = KeyId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let stored = KeyRecord {
            id,
            user_id: record.user_id,
            key_name: record.key_name,
            public_key: record.public_key,
            encrypted_private_key: record.encrypted_private_key,
            status: KeyStatus::Active,
            created_at: record.created_at,
            expired_at: record.expired_at,
        };
        self.records.insert(id, stored.clone());
        slot.insert(id);
        Ok(stored)
    }

    fn discard(&self, key_id: KeyId) -> NotaryResult<()> {
        if let Some((_, record)) = self.records.remove(&key_id) {
            self.names.remove(&(record.user_id, record.key_name));
        }
        Ok(())
    }

    fn find(&self, key_id: KeyId, user_id: &UserId) -> NotaryResult<Option<KeyRecord>> {
        Ok(self
            .records
            .get(&key_id)
            .filter(|r| &r.user_id == user_id)
            .map(|r| r.clone()))
    }

    fn list_by_user(&self, user_id: &UserId) -> NotaryResult<Vec<KeyRecord>> {
        let mut keys: Vec<KeyRecord> = self
            .records
            .iter()
            .filter(|r| &r.user_id == user_id)
            .map(|r| r.clone())
            .collect();
        keys.sort_by_key(|r| r.id);
        Ok(keys)
    }

    fn compare_and_set_status(
        &self,
        key_id: KeyId,
        expected: KeyStatus,
        next: KeyStatus,
    ) -> NotaryResult<StatusChange> {
        let mut record = self
            .records
            .get_mut(&key_id)
            .ok_or_else(|| NotaryError::KeyNotFound {
                key_id: key_id.0,
                user_id: String::new(),
            })?;

        if record.status != expected || !expected.can_transition_to(next) {
            return Ok(StatusChange::Unchanged(record.clone()));
        }
        record.status = next;
        Ok(StatusChange::Applied(record.clone()))
    }

    fn due_for_expiry(&self, now: DateTime<Utc>) -> NotaryResult<Vec<KeyId>> {
        let mut due: Vec<KeyId> = self
            .records
            .iter()
            .filter(|r| r.status == KeyStatus::Active && r.expired_at.is_some_and(|at| at <= now))
            .map(|r| r.id)
            .collect();
        due.sort();
        Ok(due)
    }
}
