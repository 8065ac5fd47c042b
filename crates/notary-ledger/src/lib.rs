//! # notary-ledger
//!
//! Append-only, SHA-256 hash-chained audit ledger.
//!
//! ## Overview
//!
//! Every security-relevant action is written as one text line that links
//! to the previous line through its hash. Editing, inserting or removing any
//! line breaks the chain from that point on, and `HashChainLedger::verify`
//! reports the first broken line. A corrupted active ledger is quarantined
//! under a new name and a fresh, empty ledger takes its place.
//!
//! Storage is behind the `LedgerStore` trait: `FileLedgerStore` keeps the
//! ledger in a directory on disk, `MemoryLedgerStore` keeps it in memory.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use notary_ledger::{FileLedgerStore, HashChainLedger};
//!
//! let store = Arc::new(FileLedgerStore::open("/var/lib/notary/ledger")?);
//! let ledger = HashChainLedger::open(store)?;
//! ledger.record_action(entry)?;
//!
//! assert!(ledger.verify(ledger.active_file()).is_intact());
//! ```

pub mod chain;
pub mod engine;
pub mod line;
pub mod memory;
pub mod store;

pub use chain::{first_broken_line, hash_link};
pub use engine::HashChainLedger;
pub use memory::MemoryLedgerStore;
pub use store::{FileLedgerStore, DEFAULT_ACTIVE_FILE, DEFAULT_QUARANTINE_PREFIX};

// ── Tests ─────────────────────────────────────────────────────────────────────
