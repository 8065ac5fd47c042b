//! Wiring of a complete notary from configuration.
//!
//! The ledger is file-backed; keys, transactions, blobs and notifications
//! use the in-process implementations.

use std::sync::Arc;

use notary_contracts::error::NotaryResult;
use notary_core::traits::IdentityProvider;
use notary_ledger::{FileLedgerStore, HashChainLedger};
use notary_vault::{InMemoryKeyRepository, KeyVault, MasterSecret};

use crate::config::{LedgerConfig, NotaryConfig};
use crate::memory::{InMemoryBlobStore, InMemoryTransactionRepository, RecordingNotifier};
use crate::notary::Notary;
use crate::sweeper::ExpirySweeper;

/// Open the file-backed ledger described by `config`.
pub fn open_ledger(config: &LedgerConfig) -> NotaryResult<Arc<HashChainLedger>> {
    let store = FileLedgerStore::with_names(
        &config.dir,
        config.active_file.as_str(),
        config.quarantine_prefix.as_str(),
    )?;
    Ok(Arc::new(HashChainLedger::open(Arc::new(store))?))
}

/// Every component of a running notary, wired from one `NotaryConfig`.
pub struct NotaryRuntime {
    /// File-backed audit ledger shared by the vault and the notary.
    pub ledger: Arc<HashChainLedger>,
    pub keys: Arc<InMemoryKeyRepository>,
    pub vault: Arc<KeyVault>,
    pub transactions: Arc<InMemoryTransactionRepository>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub notary: Notary,
    sweep_interval: std::time::Duration,
}

impl NotaryRuntime {
    /// Open the ledger and assemble the vault and notary on top of it.
    pub fn from_config(
        config: &NotaryConfig,
        master: MasterSecret,
        identity: Arc<dyn IdentityProvider>,
    ) -> NotaryResult<Self> {
        let ledger = open_ledger(&config.ledger)?;
        let keys = Arc::new(InMemoryKeyRepository::new());
        let vault = Arc::new(KeyVault::new(
            master,
            keys.clone(),
            ledger.clone(),
            identity.clone(),
            config.vault.service_name.clone(),
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
            &config.service,
        );

        Ok(Self {
            ledger,
            keys,
            vault,
            transactions,
            blobs,
            notifier,
            notary,
            sweep_interval: config.vault.sweep_interval(),
        })
    }

    /// A sweeper over this runtime's vault, at the configured interval.
    pub fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(self.vault.clone(), self.sweep_interval)
    }
}
