//! TOML configuration for a notary deployment.
//!
//! ```toml
//! [ledger]
//! dir = "/var/lib/notary/ledger"
//! active_file = "audit.log"
//! quarantine_prefix = "audit-corrupted"
//!
//! [vault]
//! master_key_env = "NOTARY_MASTER_KEY"
//! sweep_interval_secs = 3600
//! service_name = "KMS"
//!
//! [service]
//! service_name = "TRANSACTION"
//! upstream_timeout_ms = 5000
//! ```
//!
//! Every field has a default, so an empty document is a valid config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use notary_contracts::error::{NotaryError, NotaryResult};
use notary_ledger::{DEFAULT_ACTIVE_FILE, DEFAULT_QUARANTINE_PREFIX};
use notary_vault::{MasterSecret, DEFAULT_SERVICE_NAME};

pub const DEFAULT_MASTER_KEY_ENV: &str = "NOTARY_MASTER_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotaryConfig {
    pub ledger: LedgerConfig,
    pub vault: VaultConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub dir: PathBuf,
    pub active_file: String,
    pub quarantine_prefix: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("ledger"),
            active_file: DEFAULT_ACTIVE_FILE.to_string(),
            quarantine_prefix: DEFAULT_QUARANTINE_PREFIX.to_string(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    /// Base64 master key. Prefer `master_key_env` outside of tests.
    pub master_key: Option<String>,
    pub master_key_env: String,
    pub sweep_interval_secs: u64,
    pub service_name: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            master_key: None,
            master_key_env: DEFAULT_MASTER_KEY_ENV.to_string(),
            sweep_interval_secs: 3600,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("master_key", &self.master_key.as_ref().map(|_| "<redacted>"))
            .field("master_key_env", &self.master_key_env)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("service_name", &self.service_name)
            .finish()
    }
}

impl VaultConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Resolve the master secret from `master_key`, or failing that from the
    /// environment variable named by `master_key_env`.
    pub fn master_secret(&self) -> NotaryResult<MasterSecret> {
        if let Some(encoded) = &self.master_key {
            return MasterSecret::from_base64(encoded);
        }
        let encoded = std::env::var(&self.master_key_env).map_err(|_| NotaryError::ConfigError {
            reason: format!(
                "no master key configured and ${} is not set",
                self.master_key_env
            ),
        })?;
        MasterSecret::from_base64(&encoded)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub service_name: String,
    pub upstream_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "TRANSACTION".to_string(),
            upstream_timeout_ms: 5000,
        }
    }
}

impl ServiceConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms.max(1))
    }
}

impl NotaryConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `NotaryError::ConfigError` if the TOML is malformed or names
    /// unknown fields.
    pub fn from_toml_str(s: &str) -> NotaryResult<Self> {
        toml::from_str(s).map_err(|e| NotaryError::ConfigError {
            reason: format!("failed to parse notary TOML: {e}"),
        })
    }

    pub fn from_file(path: &Path) -> NotaryResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| NotaryError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}
