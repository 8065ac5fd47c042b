//! RSA PKCS#1 v1.5 / SHA-256 signatures over content hashes.
//!
//! The signed message is the raw digest bytes obtained by base64-decoding
//! the content hash. Callers hash the content first with `content_hash`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use sha2::{Digest, Sha256};
use tracing::debug;

use notary_contracts::error::{NotaryError, NotaryResult};

use crate::keypair::{decode_private_key, decode_public_key};

/// Base64 SHA-256 of `content`.
pub fn content_hash(content: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(content))
}

/// Sign a base64 content hash with a base64 PKCS#8 private key.
pub fn sign(content_hash_b64: &str, private_key_b64: &str) -> NotaryResult<String> {
    let private = decode_private_key(private_key_b64)?;
    sign_with(&private, content_hash_b64)
}

/// Sign a base64 content hash with an already decoded private key.
pub fn sign_with(private: &rsa::RsaPrivateKey, content_hash_b64: &str) -> NotaryResult<String> {
    let digest = STANDARD
        .decode(content_hash_b64.trim())
        .map_err(|e| NotaryError::SigningFailed {
            reason: format!("content hash is not base64: {e}"),
        })?;

    let signing_key = SigningKey::<Sha256>::new(private.clone());
    let signature = signing_key
        .try_sign(&digest)
        .map_err(|e| NotaryError::SigningFailed {
            reason: e.to_string(),
        })?;

    debug!(digest_len = digest.len(), "content hash signed");
    Ok(STANDARD.encode(signature.to_bytes()))
}

/// Check a base64 signature over a base64 content hash.
///
/// A malformed public key is an error. A signature or hash that does not
/// decode is untrusted input and simply fails the check.
pub fn verify(content_hash_b64: &str, signature_b64: &str, public_key_b64: &str) -> NotaryResult<bool> {
    let public = decode_public_key(public_key_b64)?;

    let Ok(digest) = STANDARD.decode(content_hash_b64.trim()) else {
        debug!("content hash did not decode; verification fails");
        return Ok(false);
    };
    let Ok(raw_signature) = STANDARD.decode(signature_b64.trim()) else {
        debug!("signature did not decode; verification fails");
        return Ok(false);
    };
    let Ok(signature) = Signature::try_from(raw_signature.as_slice()) else {
        return Ok(false);
    };

    let verifying_key = VerifyingKey::<Sha256>::new(public);
    Ok(verifying_key.verify(&digest, &signature).is_ok())
}
