//! # notary-vault
//!
//! Per-user RSA key lifecycle.
//!
//! ## Overview
//!
//! `KeyVault` issues RSA-2048 key pairs, keeps the private halves encrypted
//! under a process-wide `MasterSecret` (AES-256-GCM, fresh nonce per key),
//! signs content hashes with stored keys, and ages keys out of validity.
//!
//! Key status only moves forward:
//!
//! ```text
//! ACTIVE --revoke--> REVOKED
//! ACTIVE --sweep---> EXPIRED
//! ```
//!
//! Storage is behind `notary_core::traits::KeyRepository`;
//! `InMemoryKeyRepository` is the bundled implementation.

pub mod envelope;
pub mod master;
pub mod memory;
pub mod vault;

pub use master::{MasterSecret, MASTER_KEY_LEN};
pub use memory::InMemoryKeyRepository;
pub use vault::{expiry_after, GeneratedKey, KeyVault, DEFAULT_SERVICE_NAME};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use notary_contracts::{
        actor::{Actor, Role, UserId},
        error::{NotaryError, NotaryResult},
        key::{KeyId, KeyStatus},
    };
    use notary_core::traits::{IdentityProvider, KeyRepository};
    use notary_ledger::{HashChainLedger, MemoryLedgerStore};

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    struct FixedIdentity;

    impl IdentityProvider for FixedIdentity {
        fn current_actor(&self) -> NotaryResult<Actor> {
            Ok(Actor::new("u1", "alice", Role::User))
        }
    }

    struct Harness {
        vault: KeyVault,
        repo: Arc<InMemoryKeyRepository>,
        store: Arc<MemoryLedgerStore>,
        ledger: Arc<HashChainLedger>,
    }

    fn harness() -> Harness {
        let repo = Arc::new(InMemoryKeyRepository::new());
        let store = Arc::new(MemoryLedgerStore::new());
        let ledger = Arc::new(HashChainLedger::open(store.clone()).unwrap());
        let vault = KeyVault::new(
            MasterSecret::from_bytes([42u8; 32]),
            repo.clone(),
            ledger.clone(),
            Arc::new(FixedIdentity),
            DEFAULT_SERVICE_NAME,
        );
        Harness {
            vault,
            repo,
            store,
            ledger,
        }
    }

    fn actions(h: &Harness) -> Vec<String> {
        h.ledger
            .records("audit.log")
            .unwrap()
            .into_iter()
            .map(|r| r.action)
            .collect()
    }

    fn u1() -> UserId {
        UserId::new("u1")
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    /// Generate, sign, verify with the returned public key, revoke.
    #[test]
    fn test_generate_sign_verify_revoke_scenario() {
        let h = harness();
        let generated = h.vault.generate(&u1(), "k1", 12).unwrap();
        let key_id = generated.record.id;

        let hash = notary_sign::content_hash(b"video bytes");
        let sig = h.vault.sign_with_key(&u1(), key_id, &hash, Utc::now()).unwrap();
        assert!(notary_sign::verify(&hash, &sig.signature, &generated.record.public_key).unwrap());

        // The once-returned private key signs equivalently.
        let direct = notary_sign::sign(&hash, &generated.private_key).unwrap();
        assert!(notary_sign::verify(&hash, &direct, &generated.record.public_key).unwrap());

        let revoked = h.vault.revoke(&u1(), key_id).unwrap();
        assert_eq!(revoked.status, KeyStatus::Revoked);
        assert!(h.vault.list_valid(&u1(), Utc::now()).unwrap().is_empty());

        assert_eq!(actions(&h), vec!["CREATE_KEY", "SIGN_HASH", "REVOKE_KEY"]);
        assert!(h.ledger.verify("audit.log").is_intact());
    }

    /// Key names are unique per user but may repeat across users.
    #[test]
    fn test_duplicate_key_name_per_user() {
        let h = harness();
        h.vault.generate(&u1(), "k1", 12).unwrap();

        let err = h.vault.generate(&u1(), "k1", 12).unwrap_err();
        assert!(matches!(err, NotaryError::DuplicateKeyName { .. }));

        h.vault.generate(&UserId::new("u2"), "k1", 12).unwrap();
        assert_eq!(h.repo.len(), 2);
    }

    /// Non-positive validity is coerced to one month.
    #[test]
    fn test_validity_floor_is_one_month() {
        let start = Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(
            expiry_after(start, 0),
            Utc.with_ymd_and_hms(2026, 2, 28, 12, 0, 0).unwrap()
        );
        assert_eq!(expiry_after(start, -5), expiry_after(start, 1));
        assert_eq!(
            expiry_after(start, 12),
            Utc.with_ymd_and_hms(2027, 1, 31, 12, 0, 0).unwrap()
        );
    }

    /// Revoked and expired keys never come back.
    #[test]
    fn test_status_is_monotonic() {
        let h = harness();
        let a = h.vault.generate(&u1(), "a", 1).unwrap().record.id;
        let b = h.vault.generate(&u1(), "b", 1).unwrap().record.id;

        h.vault.revoke(&u1(), a).unwrap();
        let later = Utc::now() + Duration::days(400);
        assert_eq!(h.vault.sweep_expired(later).unwrap(), 1, "only b expires");

        // Revoking again is a no-op on state.
        assert_eq!(h.vault.revoke(&u1(), a).unwrap().status, KeyStatus::Revoked);
        assert_eq!(h.vault.revoke(&u1(), b).unwrap().status, KeyStatus::Expired);
        assert_eq!(h.vault.sweep_expired(later).unwrap(), 0);

        for status in [KeyStatus::Active, KeyStatus::Revoked, KeyStatus::Expired] {
            for id in [a, b] {
                let change = h.repo.compare_and_set_status(id, status, KeyStatus::Active).unwrap();
                assert!(!change.applied(), "nothing may transition back to ACTIVE");
            }
        }
        assert!(h.vault.list_valid(&u1(), Utc::now()).unwrap().is_empty());
        assert_eq!(h.vault.list_keys(&u1()).unwrap().len(), 2);
    }

    /// A sweep audits once when it expired something, never otherwise.
    #[test]
    fn test_sweep_audits_only_when_work_was_done() {
        let h = harness();
        h.vault.generate(&u1(), "k", 1).unwrap();

        assert_eq!(h.vault.sweep_expired(Utc::now()).unwrap(), 0);
        assert_eq!(actions(&h), vec!["CREATE_KEY"]);

        assert_eq!(h.vault.sweep_expired(Utc::now() + Duration::days(40)).unwrap(), 1);
        assert_eq!(actions(&h), vec!["CREATE_KEY", "EXPIRE_KEYS"]);

        let record = h.ledger.records("audit.log").unwrap().pop().unwrap();
        assert_eq!(record.actor_id, "system");
    }

    /// A key past its expiry is refused at the point of use, before any sweep.
    #[test]
    fn test_sign_rechecks_expiry() {
        let h = harness();
        let key_id = h.vault.generate(&u1(), "k", 1).unwrap().record.id;
        let hash = notary_sign::content_hash(b"x");

        let err = h
            .vault
            .sign_with_key(&u1(), key_id, &hash, Utc::now() + Duration::days(40))
            .unwrap_err();
        assert!(matches!(err, NotaryError::KeyNotActive { .. }));
        assert_eq!(h.vault.find_key(&u1(), key_id).unwrap().status, KeyStatus::Active);
    }

    /// Keys are scoped to their owner.
    #[test]
    fn test_key_lookup_is_scoped_to_user() {
        let h = harness();
        let key_id = h.vault.generate(&u1(), "k", 1).unwrap().record.id;
        let other = UserId::new("u2");

        assert!(matches!(
            h.vault.revoke(&other, key_id).unwrap_err(),
            NotaryError::KeyNotFound { .. }
        ));
        assert!(matches!(
            h.vault.revoke(&u1(), KeyId(999)).unwrap_err(),
            NotaryError::KeyNotFound { .. }
        ));
        assert_eq!(h.vault.find_key(&u1(), key_id).unwrap().status, KeyStatus::Active);
    }

    /// Stored ciphertext is decryptable, and tampering fails closed.
    #[test]
    fn test_private_key_envelope_round_trip_and_tamper() {
        let h = harness();
        let generated = h.vault.generate(&u1(), "k", 1).unwrap();

        let der = h.vault.decrypt_private_key(&generated.record).unwrap();
        let reencoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, der.as_slice());
        assert_eq!(reencoded, generated.private_key.as_str());

        let mut tampered = generated.record.clone();
        let mut raw = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            &tampered.encrypted_private_key.ciphertext,
        )
        .unwrap();
        raw[10] ^= 0xff;
        tampered.encrypted_private_key.ciphertext =
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, raw);
        h.repo.overwrite(tampered.clone());

        assert!(matches!(
            h.vault.decrypt_private_key(&tampered),
            Err(NotaryError::DecryptionFailed)
        ));
        let hash = notary_sign::content_hash(b"x");
        assert!(matches!(
            h.vault.sign_with_key(&u1(), tampered.id, &hash, Utc::now()),
            Err(NotaryError::DecryptionFailed)
        ));
    }

    /// The private key never lands in storage or logs unencrypted.
    #[test]
    fn test_private_key_not_stored_in_plaintext() {
        let h = harness();
        let generated = h.vault.generate(&u1(), "k", 1).unwrap();
        let stored = h.vault.find_key(&u1(), generated.record.id).unwrap();

        assert_ne!(stored.encrypted_private_key.ciphertext, generated.private_key.as_str());
        assert!(format!("{generated:?}").contains("<redacted>"));
        assert!(!format!("{generated:?}").contains(generated.private_key.as_str()));
    }

    /// If the creation cannot be audited, the key does not exist afterwards.
    #[test]
    fn test_unaudited_generation_is_compensated() {
        let h = harness();
        h.store.set_unavailable(true);

        let err = h.vault.generate(&u1(), "k1", 12).unwrap_err();
        assert!(err.is_retryable());
        assert!(h.repo.is_empty(), "record must be discarded");

        h.store.set_unavailable(false);
        h.vault.generate(&u1(), "k1", 12).unwrap();
        assert_eq!(actions(&h), vec!["CREATE_KEY"]);
    }

    /// A signature whose use cannot be audited is withheld.
    #[test]
    fn test_unaudited_signature_is_withheld() {
        let h = harness();
        let key_id = h.vault.generate(&u1(), "k", 1).unwrap().record.id;

        h.store.set_unavailable(true);
        let hash = notary_sign::content_hash(b"x");
        let err = h.vault.sign_with_key(&u1(), key_id, &hash, Utc::now()).unwrap_err();
        assert!(matches!(err, NotaryError::StorageUnavailable { .. }));
    }

    /// Master secret parsing rejects wrong lengths and redacts itself.
    #[test]
    fn test_master_secret_parsing() {
        let generated = MasterSecret::generate().unwrap();
        let encoded = generated.to_base64();
        let parsed = MasterSecret::from_base64(&encoded).unwrap();
        assert_eq!(parsed.to_base64().as_str(), encoded.as_str());

        assert!(matches!(
            MasterSecret::from_base64("AAAA"),
            Err(NotaryError::ConfigError { .. })
        ));
        assert!(matches!(
            MasterSecret::from_base64("!!"),
            Err(NotaryError::ConfigError { .. })
        ));
        assert_eq!(format!("{parsed:?}"), "MasterSecret(<redacted>)");
    }
}
