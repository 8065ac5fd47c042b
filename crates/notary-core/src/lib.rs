//! # notary-core
//!
//! The seams of the notary trust layer.
//!
//! This crate holds only trait definitions. The ledger, vault and service
//! crates implement or consume them; hosting applications plug their own
//! storage, identity and notification backends in through them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notary_core::traits::{AuditTrail, KeyRepository, LedgerStore};
//! ```

pub mod traits;

pub use traits::{
    AuditTrail, BlobStore, IdentityProvider, KeyRepository, LedgerStore, NotificationSink,
    StatusChange, TransactionRepository,
};
