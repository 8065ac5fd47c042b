//! End-to-end notarization flows against in-process collaborators.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use notary_contracts::{
    actor::{Actor, Role, UserId},
    error::{ErrorKind, NotaryError},
    key::KeyId,
    ledger::AuditAction,
    transaction::{ObjectId, Party, TransactionId, TransactionStatus},
};
use notary_core::traits::BlobStore;
use notary_ledger::{HashChainLedger, MemoryLedgerStore};
use notary_service::{
    CreateTransaction, ExpirySweeper, InMemoryBlobStore, InMemoryTransactionRepository, Notary,
    NotaryConfig, NotaryRuntime, RecordingNotifier, ServiceConfig, SignWith, StaticIdentity,
};
use notary_vault::{InMemoryKeyRepository, KeyVault, MasterSecret};

// ── Helpers ───────────────────────────────────────────────────────────────────

struct Harness {
    notary: Notary,
    vault: Arc<KeyVault>,
    store: Arc<MemoryLedgerStore>,
    ledger: Arc<HashChainLedger>,
    transactions: Arc<InMemoryTransactionRepository>,
    blobs: Arc<InMemoryBlobStore>,
    notifier: Arc<RecordingNotifier>,
}

fn harness_with(config: ServiceConfig) -> Harness {
    let identity = Arc::new(StaticIdentity(Actor::new("u1", "alice", Role::User)));
    let store = Arc::new(MemoryLedgerStore::new());
    let ledger = Arc::new(HashChainLedger::open(store.clone()).unwrap());
    let vault = Arc::new(KeyVault::new(
        MasterSecret::from_bytes([9u8; 32]),
        Arc::new(InMemoryKeyRepository::new()),
        ledger.clone(),
        identity.clone(),
        "KMS",
    ));
    let transactions = Arc::new(InMemoryTransactionRepository::new());
    let blobs = Arc::new(InMemoryBlobStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let notary = Notary::new(
        vault.clone(),
        ledger.clone(),
        transactions.clone(),
        blobs.clone(),
        identity,
        notifier.clone(),
        &config,
    );
    Harness {
        notary,
        vault,
        store,
        ledger,
        transactions,
        blobs,
        notifier,
    }
}

fn harness() -> Harness {
    harness_with(ServiceConfig::default())
}

fn owner() -> UserId {
    UserId::new("u1")
}

fn recipient() -> UserId {
    UserId::new("u2")
}

fn request(amount: f64, signer: SignWith) -> CreateTransaction {
    CreateTransaction {
        owner_id: owner(),
        recipient_id: recipient(),
        amount,
        validity_months: 6,
        content: b"frame data".to_vec(),
        content_type: "video/mp4".to_string(),
        signer,
    }
}

/// Client-held key material, generated once for the whole test binary.
fn client_pair() -> &'static notary_sign::KeyPair {
    static PAIR: OnceLock<notary_sign::KeyPair> = OnceLock::new();
    PAIR.get_or_init(|| notary_sign::generate_keypair().unwrap())
}

fn client_signer() -> SignWith {
    let pair = client_pair();
    SignWith::ClientHeld {
        key_id: KeyId(77),
        private_key: pair.private_key_base64(),
        public_key: pair.public_key.clone(),
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

// ── Tests ─────────────────────────────────────────────────────────────────────

/// Vault-signed content verifies under the vault key and becomes VERIFIED.
#[tokio::test]
async fn test_vault_signed_transaction_verifies() {
    let h = harness();
    let key = h.vault.generate(&owner(), "k1", 12).unwrap();
    let cancel = CancellationToken::new();

    let id = h
        .notary
        .create_transaction(
            request(150.0, SignWith::Vault { key_id: key.record.id }),
            &cancel,
        )
        .await
        .unwrap();

    let tx = h.notary.transaction(id).unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert!(tx.expired_at > tx.created_at);
    let media = tx.media.as_ref().unwrap();
    assert_eq!(media.signature.content_hash, notary_sign::content_hash(b"frame data"));
    assert_eq!(media.signature.public_key, key.record.public_key);

    let ok = h
        .notary
        .verify_transaction(id, &key.record.public_key, &cancel)
        .await
        .unwrap();
    assert!(ok);
    assert_eq!(h.notary.transaction(id).unwrap().status, TransactionStatus::Verified);

    assert_eq!(
        actions(&h),
        vec!["CREATE_KEY", "SIGN_HASH", "TRANSACTION_CREATED", "TRANSACTION_VERIFIED"]
    );
    assert!(h.ledger.verify("audit.log").is_intact());

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!((&sent[0].trigger_id, &sent[0].recipient_id), (&owner(), &recipient()));
    assert_eq!(sent[0].action, AuditAction::TransactionCreated);
    assert_eq!((&sent[1].trigger_id, &sent[1].recipient_id), (&recipient(), &owner()));
    assert_eq!(sent[1].action, AuditAction::TransactionVerified);
}

/// A client-held key signs without touching the vault.
#[tokio::test]
async fn test_client_held_key_flow() {
    let h = harness();
    let cancel = CancellationToken::new();

    let id = h
        .notary
        .create_transaction(request(10.0, client_signer()), &cancel)
        .await
        .unwrap();
    assert!(h
        .notary
        .verify_transaction(id, &client_pair().public_key, &cancel)
        .await
        .unwrap());

    assert_eq!(actions(&h), vec!["TRANSACTION_CREATED", "TRANSACTION_VERIFIED"]);
    assert_eq!(h.notary.fetch_content(id, &cancel).await.unwrap(), b"frame data");
    let info = h.notary.content_info(id, &cancel).await.unwrap();
    assert_eq!(info.size, 10);
    assert_eq!(info.content_type, "video/mp4");
}

/// The wrong public key fails verification, stays PENDING, and is audited.
#[tokio::test]
async fn test_failed_verification_is_recorded_and_retryable() {
    let h = harness();
    let key = h.vault.generate(&owner(), "k1", 12).unwrap();
    let cancel = CancellationToken::new();
    let id = h
        .notary
        .create_transaction(
            request(5.0, SignWith::Vault { key_id: key.record.id }),
            &cancel,
        )
        .await
        .unwrap();

    let ok = h
        .notary
        .verify_transaction(id, &client_pair().public_key, &cancel)
        .await
        .unwrap();
    assert!(!ok);
    assert_eq!(h.notary.transaction(id).unwrap().status, TransactionStatus::Pending);
    assert_eq!(actions(&h).last().unwrap(), "TRANSACTION_VERIFIED_NOK");
    let last = h.ledger.records("audit.log").unwrap().pop().unwrap();
    assert_eq!(last.outcome.as_str(), "FAILURE");

    // Retrying with the right key succeeds.
    assert!(h
        .notary
        .verify_transaction(id, &key.record.public_key, &cancel)
        .await
        .unwrap());
}

/// Non-positive and NaN amounts are rejected before any work is done.
#[tokio::test]
async fn test_invalid_amount_rejected() {
    let h = harness();
    let cancel = CancellationToken::new();

    for amount in [0.0, -3.5, f64::NAN] {
        let err = h
            .notary
            .create_transaction(request(amount, client_signer()), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, NotaryError::InvalidAmount { .. }));
    }
    assert!(h.blobs.is_empty());
    assert!(actions(&h).is_empty());
}

/// A revoked vault key cannot notarize.
#[tokio::test]
async fn test_revoked_key_cannot_sign() {
    let h = harness();
    let key = h.vault.generate(&owner(), "k1", 12).unwrap();
    h.vault.revoke(&owner(), key.record.id).unwrap();

    let err = h
        .notary
        .create_transaction(
            request(1.0, SignWith::Vault { key_id: key.record.id }),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, NotaryError::KeyNotActive { .. }));
    assert!(h.transactions.is_empty());
}

/// Unknown transactions and missing media are distinct not-found errors.
#[tokio::test]
async fn test_lookup_errors() {
    let h = harness();
    let cancel = CancellationToken::new();
    let missing = TransactionId::new();

    assert!(matches!(
        h.notary.verify_transaction(missing, "AAAA", &cancel).await,
        Err(NotaryError::TransactionNotFound { .. })
    ));
    assert!(matches!(
        h.notary.fetch_content(missing, &cancel).await,
        Err(NotaryError::TransactionNotFound { .. })
    ));
}

/// A malformed public key on verify is an input error, and nothing is audited.
#[tokio::test]
async fn test_malformed_public_key_on_verify() {
    let h = harness();
    let cancel = CancellationToken::new();
    let id = h
        .notary
        .create_transaction(request(1.0, client_signer()), &cancel)
        .await
        .unwrap();

    let err = h
        .notary
        .verify_transaction(id, "not base64 !", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, NotaryError::InvalidKeyEncoding { .. }));
    assert_eq!(actions(&h), vec!["TRANSACTION_CREATED"]);
}

/// If TRANSACTION_CREATED cannot be appended the transaction is discarded.
#[tokio::test]
async fn test_unaudited_creation_is_compensated() {
    let h = harness();
    h.store.set_unavailable(true);

    let err = h
        .notary
        .create_transaction(request(1.0, client_signer()), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(h.transactions.is_empty());
    assert!(h.notifier.sent().is_empty(), "nothing to notify about");
}

/// A failing notifier never undoes a committed transaction.
#[tokio::test]
async fn test_notification_failure_is_swallowed() {
    let h = harness();
    h.notifier.set_failing(true);

    let id = h
        .notary
        .create_transaction(request(1.0, client_signer()), &CancellationToken::new())
        .await
        .unwrap();
    assert!(h.notary.transaction(id).is_ok());
    assert_eq!(actions(&h), vec!["TRANSACTION_CREATED"]);
}

/// A slow blob store surfaces as a retryable timeout with nothing committed.
#[tokio::test]
async fn test_blob_store_timeout() {
    let h = harness_with(ServiceConfig {
        upstream_timeout_ms: 20,
        ..ServiceConfig::default()
    });
    h.blobs.set_latency(Duration::from_millis(500));

    let err = h
        .notary
        .create_transaction(request(1.0, client_signer()), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NotaryError::UpstreamTimeout { ref operation } if operation == "blob.put"));
    assert!(err.is_retryable());
    assert!(h.transactions.is_empty());
    assert!(actions(&h).is_empty());
}

/// A stalled ledger append surfaces as a retryable timeout and the
/// transaction is discarded.
#[tokio::test]
async fn test_stalled_ledger_append_times_out() {
    let h = harness_with(ServiceConfig {
        upstream_timeout_ms: 50,
        ..ServiceConfig::default()
    });
    h.store.set_latency(Duration::from_millis(500));

    let err = h
        .notary
        .create_transaction(request(1.0, client_signer()), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(
        matches!(err, NotaryError::UpstreamTimeout { ref operation } if operation == "ledger.append"),
        "expected a ledger timeout, got {err:?}"
    );
    assert!(err.is_retryable());
    assert!(h.transactions.is_empty(), "unaudited transaction must be discarded");
    assert!(h.notifier.sent().is_empty());
}

/// Vault signing audits SIGN_HASH, so a stalled ledger times it out before
/// any content is stored.
#[tokio::test]
async fn test_vault_signing_is_bounded_by_timeout() {
    let h = harness_with(ServiceConfig {
        upstream_timeout_ms: 50,
        ..ServiceConfig::default()
    });
    let key = h.vault.generate(&owner(), "k1", 12).unwrap();
    h.store.set_latency(Duration::from_millis(500));

    let err = h
        .notary
        .create_transaction(
            request(1.0, SignWith::Vault { key_id: key.record.id }),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, NotaryError::UpstreamTimeout { ref operation } if operation == "vault.sign"),
        "expected a signing timeout, got {err:?}"
    );
    assert!(h.blobs.is_empty(), "nothing may be stored without a signature");
    assert!(h.transactions.is_empty());
}

/// A missing object is a not-found error, not a retryable outage.
#[tokio::test]
async fn test_missing_blob_is_not_found() {
    let h = harness();
    let missing = ObjectId("no-such-object".to_string());

    let err = h.blobs.get(&missing).await.unwrap_err();
    assert!(matches!(err, NotaryError::ObjectNotFound { .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!err.is_retryable(), "callers must not retry a missing object");

    let err = h.blobs.stat(&missing).await.unwrap_err();
    assert!(matches!(err, NotaryError::ObjectNotFound { .. }), "got {err:?}");
}

/// Cancelling mid-flight aborts before the ledger append.
#[tokio::test]
async fn test_cancellation_before_commit() {
    let h = harness();
    h.blobs.set_latency(Duration::from_millis(500));
    let cancel = CancellationToken::new();

    let trigger = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        })
    };

    let err = h
        .notary
        .create_transaction(request(1.0, client_signer()), &cancel)
        .await
        .unwrap_err();
    trigger.await.unwrap();

    assert!(matches!(err, NotaryError::Cancelled));
    assert!(h.transactions.is_empty());
    assert!(actions(&h).is_empty());
}

/// History lists transactions by side.
#[tokio::test]
async fn test_history_by_party() {
    let h = harness();
    let cancel = CancellationToken::new();
    for amount in [1.0, 2.0] {
        h.notary
            .create_transaction(request(amount, client_signer()), &cancel)
            .await
            .unwrap();
    }

    let sent = h.notary.transactions_for(&owner(), Party::Owner).unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].created_at <= sent[1].created_at);
    assert_eq!(h.notary.transactions_for(&recipient(), Party::Recipient).unwrap().len(), 2);
    assert!(h.notary.transactions_for(&owner(), Party::Recipient).unwrap().is_empty());
}

/// The sweeper expires due keys and stops on shutdown.
#[tokio::test]
async fn test_sweeper_runs_until_shutdown() {
    let h = harness();
    h.vault.generate(&owner(), "k1", 1).unwrap();
    let sweeper = ExpirySweeper::new(h.vault.clone(), Duration::from_millis(10));
    assert_eq!(sweeper.sweep_once().unwrap(), 0);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(sweeper.run(shutdown.clone()));
    tokio::time::sleep(Duration::from_millis(30)).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("sweeper must stop promptly")
        .unwrap();

    // Nothing was due yet, so the key is still valid and no sweep was audited.
    assert_eq!(h.vault.list_valid(&owner(), Utc::now()).unwrap().len(), 1);
    assert_eq!(actions(&h), vec!["CREATE_KEY"]);
}

/// A runtime assembled from TOML writes its ledger to the configured directory.
#[tokio::test]
async fn test_runtime_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let toml = format!(
        "[ledger]\ndir = {:?}\n\n[service]\nupstream_timeout_ms = 1000\n",
        dir.path().display().to_string()
    );
    let config = NotaryConfig::from_toml_str(&toml).unwrap();
    let identity = Arc::new(StaticIdentity(Actor::new("u1", "alice", Role::User)));
    let runtime =
        NotaryRuntime::from_config(&config, MasterSecret::from_bytes([3u8; 32]), identity).unwrap();

    let key = runtime.vault.generate(&owner(), "k1", 12).unwrap();
    let cancel = CancellationToken::new();
    let id = runtime
        .notary
        .create_transaction(
            request(1.0, SignWith::Vault { key_id: key.record.id }),
            &cancel,
        )
        .await
        .unwrap();
    assert!(runtime
        .notary
        .verify_transaction(id, &key.record.public_key, &cancel)
        .await
        .unwrap());

    assert!(dir.path().join("audit.log").exists());
    assert!(runtime.ledger.verify("audit.log").is_intact());
    assert_eq!(runtime.ledger.records("audit.log").unwrap().len(), 4);
    assert_eq!(runtime.notifier.sent().len(), 2);
    assert_eq!(runtime.transactions.len(), 1);
    assert_eq!(runtime.keys.len(), 1);
    assert_eq!(runtime.sweeper().sweep_once().unwrap(), 0);
}
