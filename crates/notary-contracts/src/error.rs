//! Error taxonomy for the notary trust layer.
//!
//! All fallible operations return `NotaryResult<T>`. Every variant belongs to
//! exactly one `ErrorKind`, which tells the caller whether the failure is
//! correctable, transient, or fatal for the operation. Messages never carry
//! key material.

use thiserror::Error;

/// Coarse classification of a `NotaryError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad caller input. Rejected synchronously, never retried automatically.
    InputValidation,
    /// A ledger hash mismatch. Always surfaced, never ignored.
    IntegrityViolation,
    /// AEAD tag mismatch, unparsable key, or a signing failure.
    CryptoFailure,
    /// A missing key, transaction, media record, or stored object.
    NotFound,
    /// Storage or upstream unavailable. The whole audited action may be retried.
    Transient,
}

/// The unified error type for the notary crates.
#[derive(Debug, Error)]
pub enum NotaryError {
    #[error("invalid amount {amount}: must be strictly positive")]
    InvalidAmount { amount: f64 },

    /// Key material could not be base64-decoded.
    #[error("invalid key encoding: {reason}")]
    InvalidKeyEncoding { reason: String },

    /// Key bytes decoded but do not parse as the expected key structure.
    #[error("invalid key format: {reason}")]
    InvalidKeyFormat { reason: String },

    #[error("key name '{key_name}' already exists for user '{user_id}'")]
    DuplicateKeyName { user_id: String, key_name: String },

    /// A ledger file identifier that is malformed or outside the naming convention.
    #[error("invalid ledger file identifier '{name}'")]
    InvalidLedgerFile { name: String },

    #[error("key {key_id} not found for user '{user_id}'")]
    KeyNotFound { key_id: u64, user_id: String },

    /// The key exists but is revoked, expired, or past its expiry instant.
    #[error("key {key_id} is not usable: {reason}")]
    KeyNotActive { key_id: u64, reason: String },

    #[error("media not found for transaction {transaction_id}")]
    MediaNotFound { transaction_id: String },

    #[error("transaction {transaction_id} not found")]
    TransactionNotFound { transaction_id: String },

    /// The blob store holds no object under this id.
    #[error("object {object_id} not found")]
    ObjectNotFound { object_id: String },

    /// The AEAD authentication tag did not verify.
    #[error("private key decryption failed")]
    DecryptionFailed,

    #[error("private key encryption failed")]
    EncryptionFailed,

    #[error("key generation failed: {reason}")]
    KeyGenerationFailed { reason: String },

    #[error("signing failed: {reason}")]
    SigningFailed { reason: String },

    #[error("randomness source failed")]
    RandomnessFailure,

    /// A chained record does not match its recomputed hash.
    #[error("ledger '{file}' corrupted at line {line}")]
    IntegrityViolation { file: String, line: usize },

    /// The backing store could not be reached or written. Retry the whole action.
    #[error("storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    #[error("upstream call '{operation}' timed out")]
    UpstreamTimeout { operation: String },

    #[error("operation cancelled before commit")]
    Cancelled,

    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl NotaryError {
    /// Map this error onto the coarse taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount { .. }
            | Self::InvalidKeyEncoding { .. }
            | Self::InvalidKeyFormat { .. }
            | Self::DuplicateKeyName { .. }
            | Self::InvalidLedgerFile { .. }
            | Self::KeyNotActive { .. }
            | Self::ConfigError { .. } => ErrorKind::InputValidation,
            Self::IntegrityViolation { .. } => ErrorKind::IntegrityViolation,
            Self::DecryptionFailed
            | Self::EncryptionFailed
            | Self::KeyGenerationFailed { .. }
            | Self::SigningFailed { .. }
            | Self::RandomnessFailure => ErrorKind::CryptoFailure,
            Self::KeyNotFound { .. }
            | Self::MediaNotFound { .. }
            | Self::TransactionNotFound { .. }
            | Self::ObjectNotFound { .. } => ErrorKind::NotFound,
            Self::StorageUnavailable { .. } | Self::UpstreamTimeout { .. } | Self::Cancelled => {
                ErrorKind::Transient
            }
        }
    }

    /// True when the whole audited action can be safely retried.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Shorthand for `StorageUnavailable` from any displayable cause.
    pub fn storage(reason: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable {
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias used throughout the notary crates.
pub type NotaryResult<T> = Result<T, NotaryError>;
