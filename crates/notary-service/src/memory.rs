//! In-process stand-ins for the orchestrator's collaborators.
//!
//! These back the demo binary and the tests. The blob store can be given a
//! latency to exercise upstream timeouts, and the notifier can be told to
//! fail to exercise fire-and-forget semantics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use notary_contracts::{
    actor::{Actor, UserId},
    error::{NotaryError, NotaryResult},
    ledger::AuditAction,
    transaction::{BlobStat, ObjectId, Party, Transaction, TransactionId, TransactionStatus},
};
use notary_core::traits::{BlobStore, IdentityProvider, NotificationSink, TransactionRepository};

// ── Blob store ────────────────────────────────────────────────────────────────

/// Object storage in a `HashMap`, with optional per-call latency.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    objects: RwLock<HashMap<ObjectId, (Vec<u8>, String)>>,
    latency_ms: AtomicU64,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn delay(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> NotaryResult<ObjectId> {
        self.delay().await;
        let id = ObjectId(Uuid::new_v4().to_string());
        self.objects
            .write()
            .map_err(|_| NotaryError::storage("blob store lock poisoned"))?
            .insert(id.clone(), (bytes, content_type.to_string()));
        Ok(id)
    }

    async fn get(&self, object_id: &ObjectId) -> NotaryResult<Vec<u8>> {
        self.delay().await;
        self.objects
            .read()
            .map_err(|_| NotaryError::storage("blob store lock poisoned"))?
            .get(object_id)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| NotaryError::ObjectNotFound {
                object_id: object_id.to_string(),
            })
    }

    async fn stat(&self, object_id: &ObjectId) -> NotaryResult<BlobStat> {
        self.delay().await;
        self.objects
            .read()
            .map_err(|_| NotaryError::storage("blob store lock poisoned"))?
            .get(object_id)
            .map(|(bytes, content_type)| BlobStat {
                size: bytes.len() as u64,
                content_type: content_type.clone(),
            })
            .ok_or_else(|| NotaryError::ObjectNotFound {
                object_id: object_id.to_string(),
            })
    }
}

// ── Transaction repository ────────────────────────────────────────────────────

/// Transactions keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryTransactionRepository {
    transactions: RwLock<HashMap<TransactionId, Transaction>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> NotaryError {
        NotaryError::storage("transaction store lock poisoned")
    }
}

impl TransactionRepository for InMemoryTransactionRepository {
    fn insert(&self, transaction: Transaction) -> NotaryResult<()> {
        self.transactions
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(transaction.id, transaction);
        Ok(())
    }

    fn discard(&self, id: TransactionId) -> NotaryResult<()> {
        self.transactions
            .write()
            .map_err(|_| Self::poisoned())?
            .remove(&id);
        Ok(())
    }

    fn find(&self, id: TransactionId) -> NotaryResult<Option<Transaction>> {
        Ok(self
            .transactions
            .read()
            .map_err(|_| Self::poisoned())?
            .get(&id)
            .cloned())
    }

    fn mark_verified(&self, id: TransactionId) -> NotaryResult<Transaction> {
        let mut transactions = self.transactions.write().map_err(|_| Self::poisoned())?;
        let tx = transactions
            .get_mut(&id)
            .ok_or_else(|| NotaryError::TransactionNotFound {
                transaction_id: id.to_string(),
            })?;
        tx.status = TransactionStatus::Verified;
        Ok(tx.clone())
    }

    fn list_for(&self, user_id: &UserId, party: Party) -> NotaryResult<Vec<Transaction>> {
        let transactions = self.transactions.read().map_err(|_| Self::poisoned())?;
        let mut matching: Vec<Transaction> = transactions
            .values()
            .filter(|tx| match party {
                Party::Owner => &tx.owner_id == user_id,
                Party::Recipient => &tx.recipient_id == user_id,
            })
            .cloned()
            .collect();
        matching.sort_by_key(|tx| tx.created_at);
        Ok(matching)
    }
}

// ── Identity ──────────────────────────────────────────────────────────────────

/// Always reports the same caller.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub Actor);

impl IdentityProvider for StaticIdentity {
    fn current_actor(&self) -> NotaryResult<Actor> {
        Ok(self.0.clone())
    }
}

// ── Notifications ─────────────────────────────────────────────────────────────

/// One delivered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub trigger_id: UserId,
    pub recipient_id: UserId,
    pub action: AuditAction,
}

/// Records every notification it is given.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every `notify` fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(
        &self,
        trigger_id: &UserId,
        recipient_id: &UserId,
        action: AuditAction,
    ) -> NotaryResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotaryError::storage("notification service unreachable"));
        }
        self.sent
            .lock()
            .map_err(|_| NotaryError::storage("notifier lock poisoned"))?
            .push(Notification {
                trigger_id: trigger_id.clone(),
                recipient_id: recipient_id.clone(),
                action,
            });
        Ok(())
    }
}
