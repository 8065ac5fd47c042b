//! # notary-sign
//!
//! Stateless signing and verification of content hashes.
//!
//! Keys are RSA-2048, exchanged as base64 DER (SPKI for public keys, PKCS#8
//! for private keys). Signatures are PKCS#1 v1.5 with SHA-256 over the
//! decoded bytes of a base64 SHA-256 content hash. Every function here is a
//! pure function of its inputs and is safe to call from any thread.

pub mod keypair;
pub mod signer;

pub use keypair::{
    decode_private_key, decode_public_key, generate_keypair, private_key_from_der, KeyPair,
};
pub use signer::{content_hash, sign, sign_with, verify};

// ── Tests ─────────────────────────────────────────────────────────────────────
