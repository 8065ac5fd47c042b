//! `KeyVault`: key generation, protected storage, and lifecycle.
//!
//! Every security-relevant operation ends with an audit record. When that
//! append fails the operation fails too:
//!
//! - `generate` discards the freshly inserted record, so the key never exists;
//! - `revoke` leaves the key revoked (the safe direction) and reports the
//!   error; calling it again re-audits without changing state;
//! - `sign_with_key` withholds the signature.

use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use notary_contracts::{
    actor::{Actor, UserId},
    error::{NotaryError, NotaryResult},
    key::{KeyId, KeyRecord, KeyStatus, NewKeyRecord},
    ledger::{AuditAction, AuditEntry, Outcome},
    transaction::SignatureRecord,
};
use notary_core::traits::{AuditTrail, IdentityProvider, KeyRepository};

use crate::{envelope, master::MasterSecret};

pub const DEFAULT_SERVICE_NAME: &str = "KMS";

/// Result of `KeyVault::generate`. The private key is only ever available
/// here, once.
pub struct GeneratedKey {
    pub record: KeyRecord,
    /// Base64 PKCS#8 private key. Wiped on drop.
    pub private_key: Zeroizing<String>,
}

impl std::fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedKey")
            .field("record", &self.record)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Per-user RSA key management over an encrypted key repository.
///
/// Private keys only ever reach the repository sealed under `master`.
/// Every state change is recorded in the audit trail.
pub struct KeyVault {
    /// Secret that seals and opens stored private keys.
    master: MasterSecret,
    /// Where key records live.
    repo: Arc<dyn KeyRepository>,
    /// Ledger every key action is recorded to.
    audit: Arc<dyn AuditTrail>,
    /// Source of the actor named in audit records.
    identity: Arc<dyn IdentityProvider>,
    /// Service name written into audit records.
    service_name: String,
}

impl KeyVault {
    /// Create a vault. `service_name` is usually `DEFAULT_SERVICE_NAME`.
    pub fn new(
        master: MasterSecret,
        repo: Arc<dyn KeyRepository>,
        audit: Arc<dyn AuditTrail>,
        identity: Arc<dyn IdentityProvider>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            master,
            repo,
            audit,
            identity,
            service_name: service_name.into(),
        }
    }

    fn audit(&self, actor: Actor, action: AuditAction, detail: String) -> NotaryResult<()> {
        self.audit
            .record_action(AuditEntry::new(
                actor,
                self.service_name.clone(),
                action,
                detail,
                Outcome::Success,
            ))
            .map(|_| ())
    }

    /// Generate, encrypt and store a new RSA-2048 key for `user_id`.
    ///
    /// `validity_months <= 0` is treated as one month.
    pub fn generate(
        &self,
        user_id: &UserId,
        key_name: &str,
        validity_months: i32,
    ) -> NotaryResult<GeneratedKey> {
        if self.repo.exists(user_id, key_name)? {
            return Err(NotaryError::DuplicateKeyName {
                user_id: user_id.to_string(),
                key_name: key_name.to_string(),
            });
        }
        let actor = self.identity.current_actor()?;

        let pair = notary_sign::generate_keypair()?;
        let encrypted_private_key = envelope::seal(&self.master, &pair.private_key_der)?;

        let created_at = Utc::now();
        let expired_at = expiry_after(created_at, validity_months);

        let record = self.repo.insert(NewKeyRecord {
            user_id: user_id.clone(),
            key_name: key_name.to_string(),
            public_key: pair.public_key.clone(),
            encrypted_private_key,
            created_at,
            expired_at: Some(expired_at),
        })?;

        if let Err(e) = self.audit(actor, AuditAction::CreateKey, format!("Create key : {}", record.id)) {
            warn!(key_id = %record.id, error = %e, "key creation not audited; discarding record");
            self.repo.discard(record.id)?;
            return Err(e);
        }

        info!(
            key_id = %record.id,
            user_id = %user_id,
            expired_at = %expired_at,
            "key generated"
        );

        Ok(GeneratedKey {
            record,
            private_key: pair.private_key_base64(),
        })
    }

    /// Revoke `key_id`. Revoking a key that is already revoked or expired
    /// leaves it untouched but is still audited.
    pub fn revoke(&self, user_id: &UserId, key_id: KeyId) -> NotaryResult<KeyRecord> {
        let Some(_) = self.repo.find(key_id, user_id)? else {
            return Err(NotaryError::KeyNotFound {
                key_id: key_id.0,
                user_id: user_id.to_string(),
            });
        };
        let actor = self.identity.current_actor()?;

        let change = self
            .repo
            .compare_and_set_status(key_id, KeyStatus::Active, KeyStatus::Revoked)?;
        if !change.applied() {
            debug!(
                key_id = %key_id,
                status = %change.record().status,
                "revoke on terminal key is a no-op"
            );
        }

        self.audit(actor, AuditAction::RevokeKey, format!("Revoke key : {key_id}"))?;

        info!(key_id = %key_id, user_id = %user_id, "key revoked");
        Ok(change.into_record())
    }

    /// Keys of `user_id` that are active and not past their expiry at `now`.
    pub fn list_valid(&self, user_id: &UserId, now: DateTime<Utc>) -> NotaryResult<Vec<KeyRecord>> {
        Ok(self
            .repo
            .list_by_user(user_id)?
            .into_iter()
            .filter(|k| k.is_valid_at(now))
            .collect())
    }

    /// Every key of `user_id`, whatever its status.
    pub fn list_keys(&self, user_id: &UserId) -> NotaryResult<Vec<KeyRecord>> {
        self.repo.list_by_user(user_id)
    }

    /// One key of `user_id`. Keys of other users are reported as not found.
    pub fn find_key(&self, user_id: &UserId, key_id: KeyId) -> NotaryResult<KeyRecord> {
        self.repo
            .find(key_id, user_id)?
            .ok_or_else(|| NotaryError::KeyNotFound {
                key_id: key_id.0,
                user_id: user_id.to_string(),
            })
    }

    /// Move every active key whose expiry is at or before `now` to
    /// `Expired`. Returns how many keys this call expired.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> NotaryResult<usize> {
        let mut expired = 0;
        for key_id in self.repo.due_for_expiry(now)? {
            // A concurrent revoke may win; that key is simply skipped.
            match self
                .repo
                .compare_and_set_status(key_id, KeyStatus::Active, KeyStatus::Expired)
            {
                Ok(change) if change.applied() => expired += 1,
                Ok(_) => {}
                Err(NotaryError::KeyNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        if expired > 0 {
            self.audit(
                Actor::system(),
                AuditAction::ExpireKeys,
                format!("Expired keys : {expired}"),
            )?;
            info!(count = expired, "keys expired");
        }
        Ok(expired)
    }

    /// Decrypt the PKCS#8 private key held in `record`.
    pub fn decrypt_private_key(&self, record: &KeyRecord) -> NotaryResult<Zeroizing<Vec<u8>>> {
        envelope::open(&self.master, &record.encrypted_private_key).inspect_err(|_| {
            warn!(key_id = %record.id, "private key envelope failed authentication");
        })
    }

    /// Sign a base64 content hash with a stored key.
    ///
    /// The key's status and expiry are checked against `now` at the point of
    /// use, so a key that a sweep has not reached yet is still refused.
    pub fn sign_with_key(
        &self,
        user_id: &UserId,
        key_id: KeyId,
        content_hash: &str,
        now: DateTime<Utc>,
    ) -> NotaryResult<SignatureRecord> {
        let record = self.find_key(user_id, key_id)?;
        if !record.is_valid_at(now) {
            let reason = match record.status {
                KeyStatus::Active => "past its expiry".to_string(),
                other => other.to_string(),
            };
            return Err(NotaryError::KeyNotActive {
                key_id: key_id.0,
                reason,
            });
        }
        let actor = self.identity.current_actor()?;

        let der = self.decrypt_private_key(&record)?;
        let private = notary_sign::private_key_from_der(&der)?;
        let signature = notary_sign::sign_with(&private, content_hash)?;

        self.audit(actor, AuditAction::SignHash, format!("Sign with key : {key_id}"))?;

        debug!(key_id = %key_id, "content hash signed with vault key");
        Ok(SignatureRecord {
            content_hash: content_hash.to_string(),
            signature,
            key_id,
            public_key: record.public_key,
        })
    }
}

/// `start + max(months, 1)` calendar months, clamped to the last valid day.
pub fn expiry_after(start: DateTime<Utc>, months: i32) -> DateTime<Utc> {
    let months = u32::try_from(months.max(1)).unwrap_or(1);
    start
        .checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
