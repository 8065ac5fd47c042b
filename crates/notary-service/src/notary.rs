//! The notarization orchestrator.
//!
//! `Notary` hashes content, gets the hash signed, stores the content and
//! the transaction, and later checks the stored signature against a public
//! key. Every collaborator call is bounded by the configured upstream
//! timeout, ledger appends and vault signing included. Blocking work (RSA
//! signing, file appends) runs on tokio's blocking pool so a stalled disk
//! never stalls a runtime worker. A `CancellationToken` can abort a request
//! at any point before its ledger append; once the append starts the
//! request is no longer cancellable and runs to completion.
//!
//! Transaction lifecycle:
//!
//! ```text
//! PENDING --verify ok--> VERIFIED
//! ```
//!
//! A failed verification leaves the transaction `PENDING`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use notary_contracts::{
    actor::UserId,
    error::{NotaryError, NotaryResult},
    key::KeyId,
    ledger::{AuditAction, AuditEntry, Outcome},
    transaction::{
        BlobStat, MediaRecord, Party, SignatureRecord, Transaction, TransactionId,
        TransactionStatus,
    },
};
use notary_core::traits::{
    AuditTrail, BlobStore, IdentityProvider, NotificationSink, TransactionRepository,
};
use notary_vault::{expiry_after, KeyVault};

use crate::config::ServiceConfig;

/// Where the signature over the content hash comes from.
pub enum SignWith {
    /// A key held by the vault. Its status is checked at the point of use.
    Vault { key_id: KeyId },
    /// Key material kept by the owner and supplied with the request.
    ClientHeld {
        key_id: KeyId,
        /// Base64 PKCS#8 private key.
        private_key: Zeroizing<String>,
        /// Base64 SPKI public key, stored as the verification snapshot.
        public_key: String,
    },
}

impl std::fmt::Debug for SignWith {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vault { key_id } => f.debug_struct("Vault").field("key_id", key_id).finish(),
            Self::ClientHeld {
                key_id, public_key, ..
            } => f
                .debug_struct("ClientHeld")
                .field("key_id", key_id)
                .field("private_key", &"<redacted>")
                .field("public_key", public_key)
                .finish(),
        }
    }
}

/// Input to `Notary::create_transaction`.
#[derive(Debug)]
pub struct CreateTransaction {
    pub owner_id: UserId,
    pub recipient_id: UserId,
    pub amount: f64,
    pub validity_months: i32,
    pub content: Vec<u8>,
    pub content_type: String,
    pub signer: SignWith,
}

/// Creates and verifies notarized transactions.
pub struct Notary {
    /// Signs content hashes with vault-held keys.
    vault: Arc<KeyVault>,
    /// Ledger for TRANSACTION_CREATED and verification outcomes.
    audit: Arc<dyn AuditTrail>,
    transactions: Arc<dyn TransactionRepository>,
    /// Holds the notarized content itself.
    blobs: Arc<dyn BlobStore>,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn NotificationSink>,
    /// Service name written into audit records.
    service_name: String,
    /// Bound on every collaborator call.
    upstream_timeout: Duration,
}

impl Notary {
    /// Wire a notary from its collaborators. Service name and timeout come
    /// from `config`.
    pub fn new(
        vault: Arc<KeyVault>,
        audit: Arc<dyn AuditTrail>,
        transactions: Arc<dyn TransactionRepository>,
        blobs: Arc<dyn BlobStore>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn NotificationSink>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            vault,
            audit,
            transactions,
            blobs,
            identity,
            notifier,
            service_name: config.service_name.clone(),
            upstream_timeout: config.upstream_timeout(),
        }
    }

    /// Await `call` under the upstream timeout.
    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = NotaryResult<T>>,
    ) -> NotaryResult<T> {
        match tokio::time::timeout(self.upstream_timeout, call).await {
            Ok(inner) => inner,
            Err(_) => {
                warn!(operation, timeout_ms = self.upstream_timeout.as_millis() as u64, "upstream call timed out");
                Err(NotaryError::UpstreamTimeout {
                    operation: operation.to_string(),
                })
            }
        }
    }

    /// Await `call` under the upstream timeout, giving up early on `cancel`.
    async fn upstream<T>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        call: impl Future<Output = NotaryResult<T>>,
    ) -> NotaryResult<T> {
        tokio::select! {
            _ = cancel.cancelled() => Err(NotaryError::Cancelled),
            res = self.bounded(operation, call) => res,
        }
    }

    /// Run `work` on the blocking pool. A timed-out or cancelled caller
    /// stops waiting; the work itself still runs to the end.
    async fn blocking<T, F>(operation: &str, work: F) -> NotaryResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> NotaryResult<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| NotaryError::storage(format!("{operation} task failed: {e}")))?
    }

    /// Fire-and-forget: failures and timeouts are logged, never returned.
    async fn notify(&self, trigger_id: &UserId, recipient_id: &UserId, action: AuditAction) {
        let call = self.notifier.notify(trigger_id, recipient_id, action);
        match tokio::time::timeout(self.upstream_timeout, call).await {
            Ok(Ok(())) => debug!(%action, recipient = %recipient_id, "notification sent"),
            Ok(Err(e)) => warn!(%action, recipient = %recipient_id, error = %e, "notification failed"),
            Err(_) => warn!(%action, recipient = %recipient_id, "notification timed out"),
        }
    }

    /// Append one audit record. Bounded by the timeout but not cancellable:
    /// the append is the commit point.
    async fn record(&self, action: AuditAction, detail: String, outcome: Outcome) -> NotaryResult<()> {
        let actor = self.identity.current_actor()?;
        let entry = AuditEntry::new(actor, self.service_name.clone(), action, detail, outcome);
        let audit = Arc::clone(&self.audit);
        self.bounded(
            "ledger.append",
            Self::blocking("ledger.append", move || audit.record_action(entry).map(|_| ())),
        )
        .await
    }

    fn ensure_live(cancel: &CancellationToken) -> NotaryResult<()> {
        if cancel.is_cancelled() {
            return Err(NotaryError::Cancelled);
        }
        Ok(())
    }

    /// Notarize `request.content` and store it as a new pending transaction.
    pub async fn create_transaction(
        &self,
        request: CreateTransaction,
        cancel: &CancellationToken,
    ) -> NotaryResult<TransactionId> {
        let CreateTransaction {
            owner_id,
            recipient_id,
            amount,
            validity_months,
            content,
            content_type,
            signer,
        } = request;

        if amount.is_nan() || amount <= 0.0 {
            return Err(NotaryError::InvalidAmount { amount });
        }
        Self::ensure_live(cancel)?;

        let content_hash = notary_sign::content_hash(&content);
        let signature = match signer {
            // Vault signing appends SIGN_HASH, so it is timed like any I/O.
            SignWith::Vault { key_id } => {
                let vault = Arc::clone(&self.vault);
                let (user_id, hash) = (owner_id.clone(), content_hash.clone());
                let work = move || vault.sign_with_key(&user_id, key_id, &hash, Utc::now());
                self.upstream("vault.sign", cancel, Self::blocking("vault.sign", work))
                    .await?
            }
            // Pure computation: off the worker, cancellable, not timed.
            SignWith::ClientHeld {
                key_id,
                private_key,
                public_key,
            } => {
                let hash = content_hash.clone();
                let work = move || notary_sign::sign(&hash, &private_key);
                let signature = tokio::select! {
                    _ = cancel.cancelled() => return Err(NotaryError::Cancelled),
                    res = Self::blocking("client.sign", work) => res?,
                };
                SignatureRecord {
                    signature,
                    content_hash: content_hash.clone(),
                    key_id,
                    public_key,
                }
            }
        };
        Self::ensure_live(cancel)?;

        let object_id = self
            .upstream("blob.put", cancel, self.blobs.put(content, &content_type))
            .await?;
        Self::ensure_live(cancel)?;

        let created_at = Utc::now();
        let transaction = Transaction {
            id: TransactionId::new(),
            owner_id: owner_id.clone(),
            recipient_id: recipient_id.clone(),
            amount,
            status: TransactionStatus::Pending,
            created_at,
            expired_at: expiry_after(created_at, validity_months),
            media: Some(MediaRecord {
                object_id,
                content_type,
                signature,
            }),
        };
        let id = transaction.id;
        self.transactions.insert(transaction)?;

        let detail = format!("Transaction from {owner_id} to {recipient_id}: {amount}");
        if let Err(e) = self
            .record(AuditAction::TransactionCreated, detail, Outcome::Success)
            .await
        {
            warn!(transaction_id = %id, error = %e, "transaction creation not audited; discarding");
            self.transactions.discard(id)?;
            return Err(e);
        }

        info!(transaction_id = %id, owner = %owner_id, recipient = %recipient_id, "transaction created");

        self.notify(&owner_id, &recipient_id, AuditAction::TransactionCreated)
            .await;
        Ok(id)
    }

    /// Check the stored signature of `id` under `public_key`.
    ///
    /// Both outcomes are audited. `true` moves the transaction to `VERIFIED`.
    pub async fn verify_transaction(
        &self,
        id: TransactionId,
        public_key: &str,
        cancel: &CancellationToken,
    ) -> NotaryResult<bool> {
        let transaction = self.transaction(id)?;
        let media = transaction
            .media
            .as_ref()
            .ok_or_else(|| NotaryError::MediaNotFound {
                transaction_id: id.to_string(),
            })?;

        let ok = notary_sign::verify(
            &media.signature.content_hash,
            &media.signature.signature,
            public_key,
        )?;
        Self::ensure_live(cancel)?;

        let (action, detail, outcome) = if ok {
            (AuditAction::TransactionVerified, "Transaction valid", Outcome::Success)
        } else {
            (AuditAction::TransactionVerifiedNok, "Transaction not valid", Outcome::Failure)
        };
        self.record(action, format!("{detail} : {id}"), outcome)
            .await?;

        if ok {
            self.transactions.mark_verified(id)?;
        }

        info!(transaction_id = %id, verified = ok, "transaction verification recorded");

        self.notify(&transaction.recipient_id, &transaction.owner_id, action)
            .await;
        Ok(ok)
    }

    /// Look up one transaction.
    pub fn transaction(&self, id: TransactionId) -> NotaryResult<Transaction> {
        self.transactions
            .find(id)?
            .ok_or_else(|| NotaryError::TransactionNotFound {
                transaction_id: id.to_string(),
            })
    }

    /// Transactions where `user_id` is the owner or the recipient, oldest first.
    pub fn transactions_for(&self, user_id: &UserId, party: Party) -> NotaryResult<Vec<Transaction>> {
        self.transactions.list_for(user_id, party)
    }

    fn media_of(&self, id: TransactionId) -> NotaryResult<MediaRecord> {
        self.transaction(id)?
            .media
            .ok_or_else(|| NotaryError::MediaNotFound {
                transaction_id: id.to_string(),
            })
    }

    /// Download the notarized content of `id`.
    pub async fn fetch_content(
        &self,
        id: TransactionId,
        cancel: &CancellationToken,
    ) -> NotaryResult<Vec<u8>> {
        let media = self.media_of(id)?;
        self.upstream("blob.get", cancel, self.blobs.get(&media.object_id))
            .await
    }

    /// Size and content type of the notarized content of `id`.
    pub async fn content_info(
        &self,
        id: TransactionId,
        cancel: &CancellationToken,
    ) -> NotaryResult<BlobStat> {
        let media = self.media_of(id)?;
        self.upstream("blob.stat", cancel, self.blobs.stat(&media.object_id))
            .await
    }
}
