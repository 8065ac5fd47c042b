//! The vault's master secret.
//!
//! One 256-bit AES key per vault process, used only to wrap private keys.
//! It is not `Clone`, it is wiped on drop, and its `Debug` output is
//! redacted so it cannot end up in a log line by accident.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use notary_contracts::error::{NotaryError, NotaryResult};

/// Size of the master secret in bytes (256 bits).
pub const MASTER_KEY_LEN: usize = 32;

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret {
    bytes: [u8; MASTER_KEY_LEN],
}

impl MasterSecret {
    pub fn from_bytes(bytes: [u8; MASTER_KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Decode a base64 master key. Anything other than exactly 32 bytes is
    /// rejected as a configuration error.
    pub fn from_base64(encoded: &str) -> NotaryResult<Self> {
        let decoded = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|_| {
            NotaryError::ConfigError {
                reason: "master key is not valid base64".to_string(),
            }
        })?);

        let bytes: [u8; MASTER_KEY_LEN] =
            decoded
                .as_slice()
                .try_into()
                .map_err(|_| NotaryError::ConfigError {
                    reason: format!(
                        "master key must be {MASTER_KEY_LEN} bytes, got {}",
                        decoded.len()
                    ),
                })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Draw a fresh master secret from the system CSPRNG.
    pub fn generate() -> NotaryResult<Self> {
        let mut bytes = [0u8; MASTER_KEY_LEN];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| NotaryError::RandomnessFailure)?;
        Ok(Self::from_bytes(bytes))
    }

    /// Base64 form, for provisioning a new deployment.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; MASTER_KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(<redacted>)")
    }
}
