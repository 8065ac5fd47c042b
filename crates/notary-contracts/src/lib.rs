//! # notary-contracts
//!
//! Shared types, identifiers, and the error taxonomy for the notary trust
//! layer.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod actor;
pub mod error;
pub mod key;
pub mod ledger;
pub mod transaction;
