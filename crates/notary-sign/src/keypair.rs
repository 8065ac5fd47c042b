//! RSA-2048 key pairs and their base64 DER encodings.
//!
//! Public keys travel as base64 SPKI, private keys as base64 PKCS#8. The
//! private half is only ever handed out inside `Zeroizing` buffers.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::debug;
use zeroize::Zeroizing;

use notary_contracts::error::{NotaryError, NotaryResult};

pub const KEY_BITS: usize = 2048;

/// A freshly generated key pair in its exchange encodings.
pub struct KeyPair {
    /// Base64 SPKI DER.
    pub public_key: String,
    /// PKCS#8 DER of the private key. Wiped on drop.
    pub private_key_der: Zeroizing<Vec<u8>>,
}

impl KeyPair {
    /// Base64 of the PKCS#8 private key, for handing to the key owner.
    pub fn private_key_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.private_key_der.as_slice()))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("private_key_der", &"<redacted>")
            .finish()
    }
}

/// Generate an RSA-2048 key pair from the operating system's CSPRNG.
pub fn generate_keypair() -> NotaryResult<KeyPair> {
    let private = RsaPrivateKey::new(&mut OsRng, KEY_BITS).map_err(|e| {
        NotaryError::KeyGenerationFailed {
            reason: e.to_string(),
        }
    })?;

    let public_der = RsaPublicKey::from(&private)
        .to_public_key_der()
        .map_err(|e| NotaryError::KeyGenerationFailed {
            reason: e.to_string(),
        })?;
    let private_der = private
        .to_pkcs8_der()
        .map_err(|e| NotaryError::KeyGenerationFailed {
            reason: e.to_string(),
        })?;

    debug!(bits = KEY_BITS, "rsa key pair generated");

    Ok(KeyPair {
        public_key: STANDARD.encode(public_der.as_bytes()),
        private_key_der: Zeroizing::new(private_der.as_bytes().to_vec()),
    })
}

/// Decode a base64 PKCS#8 private key.
pub fn decode_private_key(private_key_b64: &str) -> NotaryResult<RsaPrivateKey> {
    let der = Zeroizing::new(STANDARD.decode(private_key_b64.trim()).map_err(|e| {
        NotaryError::InvalidKeyEncoding {
            reason: format!("private key is not base64: {e}"),
        }
    })?);
    private_key_from_der(&der)
}

/// Parse PKCS#8 DER bytes as an RSA private key.
pub fn private_key_from_der(der: &[u8]) -> NotaryResult<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_der(der).map_err(|e| NotaryError::InvalidKeyFormat {
        reason: format!("private key is not PKCS#8 RSA: {e}"),
    })
}

/// Decode a base64 SPKI public key.
pub fn decode_public_key(public_key_b64: &str) -> NotaryResult<RsaPublicKey> {
    let der = STANDARD
        .decode(public_key_b64.trim())
        .map_err(|e| NotaryError::InvalidKeyEncoding {
            reason: format!("public key is not base64: {e}"),
        })?;
    RsaPublicKey::from_public_key_der(&der).map_err(|e| NotaryError::InvalidKeyFormat {
        reason: format!("public key is not SPKI RSA: {e}"),
    })
}
