//! # notary-service
//!
//! The notarization orchestrator and its runtime wiring.
//!
//! ## Overview
//!
//! `Notary` composes the hash-chained ledger, the key vault, and the
//! signature engine with three external collaborators (blob store,
//! identity provider, notification sink) to create and verify notarized
//! transactions. `ExpirySweeper` ages keys out in the background.
//! `NotaryRuntime` assembles everything from a `NotaryConfig`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = NotaryConfig::from_file(Path::new("notary.toml"))?;
//! let runtime = NotaryRuntime::from_config(&config, config.vault.master_secret()?, identity)?;
//!
//! let shutdown = CancellationToken::new();
//! tokio::spawn(runtime.sweeper().run(shutdown.clone()));
//!
//! let id = runtime.notary.create_transaction(request, &shutdown).await?;
//! let ok = runtime.notary.verify_transaction(id, &public_key, &shutdown).await?;
//! ```

pub mod config;
pub mod memory;
pub mod notary;
pub mod runtime;
pub mod sweeper;

pub use config::{LedgerConfig, NotaryConfig, ServiceConfig, VaultConfig};
pub use memory::{
    InMemoryBlobStore, InMemoryTransactionRepository, Notification, RecordingNotifier,
    StaticIdentity,
};
pub use notary::{CreateTransaction, Notary, SignWith};
pub use runtime::{open_ledger, NotaryRuntime};
pub use sweeper::ExpirySweeper;
