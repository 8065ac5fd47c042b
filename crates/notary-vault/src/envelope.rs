//! AES-256-GCM envelopes for private keys at rest.
//!
//! Every encryption draws a fresh 96-bit nonce from `SystemRandom`; the
//! nonce is stored next to the ciphertext, and the 128-bit tag is appended
//! to the ciphertext. No associated data is bound.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::aead::{self, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use notary_contracts::{
    error::{NotaryError, NotaryResult},
    key::EncryptedKey,
};

use crate::master::MasterSecret;

fn cipher(master: &MasterSecret) -> NotaryResult<LessSafeKey> {
    let unbound = UnboundKey::new(&AES_256_GCM, master.as_bytes())
        .map_err(|_| NotaryError::EncryptionFailed)?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` under the master secret.
pub fn seal(master: &MasterSecret, plaintext: &[u8]) -> NotaryResult<EncryptedKey> {
    let key = cipher(master)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| NotaryError::RandomnessFailure)?;

    let mut in_out = Vec::with_capacity(plaintext.len() + AES_256_GCM.tag_len());
    in_out.extend_from_slice(plaintext);
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce_bytes),
        aead::Aad::empty(),
        &mut in_out,
    )
    .map_err(|_| NotaryError::EncryptionFailed)?;

    Ok(EncryptedKey {
        ciphertext: STANDARD.encode(&in_out),
        nonce: STANDARD.encode(nonce_bytes),
    })
}

/// Decrypt an envelope. Any tag mismatch, wrong master secret, or malformed
/// field yields `DecryptionFailed` and no plaintext.
pub fn open(master: &MasterSecret, envelope: &EncryptedKey) -> NotaryResult<Zeroizing<Vec<u8>>> {
    let nonce_bytes: [u8; NONCE_LEN] = STANDARD
        .decode(&envelope.nonce)
        .ok()
        .and_then(|n| n.try_into().ok())
        .ok_or(NotaryError::DecryptionFailed)?;
    let mut in_out = Zeroizing::new(
        STANDARD
            .decode(&envelope.ciphertext)
            .map_err(|_| NotaryError::DecryptionFailed)?,
    );

    let key = cipher(master).map_err(|_| NotaryError::DecryptionFailed)?;
    let plaintext = key
        .open_in_place(
            Nonce::assume_unique_for_key(nonce_bytes),
            aead::Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| NotaryError::DecryptionFailed)?;

    Ok(Zeroizing::new(plaintext.to_vec()))
}
