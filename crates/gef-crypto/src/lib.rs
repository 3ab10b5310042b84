#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! Ed25519 signing, SHA-256 hashing, and the hex/base64url codecs the
//! GuardClaw Execution Framework's envelope fields are encoded with.
//!
//! Every operation here matches one named in spec §4.2 exactly:
//! `generate_keypair`, `sign`, `verify`, `sha256`, `random_nonce_hex`.
//! `verify` never panics and never returns `Result` — a bad signature is
//! data (`false`), not an exceptional condition, per the protocol's
//! failure-semantics contract (spec §4.9).

use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use base64::Engine;
use ed25519_dalek::{Signature, Signer as _, SigningKey as DalekSigningKey, Verifier as _, VerifyingKey};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Errors raised by the codec and parsing helpers in this crate.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The string was not valid hexadecimal.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    /// The string contained uppercase hex digits; the protocol requires
    /// lowercase-only hex for every fixed-length hex field.
    #[error("hex must be lowercase")]
    UppercaseHex,
    /// Decoded bytes did not match the expected fixed length.
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength {
        /// Expected byte length.
        expected: usize,
        /// Actual decoded byte length.
        actual: usize,
    },
    /// The string was not valid base64url (no padding).
    #[error("invalid base64url: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    /// The decoded bytes were not a well-formed Ed25519 public key.
    #[error("invalid Ed25519 public key")]
    InvalidPublicKey,
}

/// A 32-byte Ed25519 signing seed. Zeroized on drop.
///
/// This wraps the raw seed rather than `ed25519_dalek::SigningKey` directly
/// so the zeroizing newtype has no dependency on `ed25519-dalek`'s own
/// zeroize plumbing.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretSeed(pub [u8; 32]);

impl SecretSeed {
    fn dalek(&self) -> DalekSigningKey {
        DalekSigningKey::from_bytes(&self.0)
    }

    /// Derives the Ed25519 public key for this seed.
    #[must_use]
    pub fn public_key(&self) -> [u8; 32] {
        self.dalek().verifying_key().to_bytes()
    }
}

/// An Ed25519 keypair: a zeroizing secret seed plus its public key.
pub struct Keypair {
    /// Secret signing seed; zeroized on drop.
    pub secret: SecretSeed,
    /// Public verifying key bytes.
    pub public: [u8; 32],
}

/// Generates a fresh Ed25519 keypair using the OS CSPRNG.
#[must_use]
pub fn generate_keypair() -> Keypair {
    let sk = DalekSigningKey::generate(&mut OsRng);
    let public = sk.verifying_key().to_bytes();
    Keypair {
        secret: SecretSeed(sk.to_bytes()),
        public,
    }
}

/// Signs `message` with `secret`, returning the 64-byte Ed25519 signature.
#[must_use]
pub fn sign(secret: &SecretSeed, message: &[u8]) -> [u8; 64] {
    let sig: Signature = secret.dalek().sign(message);
    sig.to_bytes()
}

/// Verifies an Ed25519 signature. Returns `false` on any failure (malformed
/// key, malformed signature, or a genuine mismatch) — this function never
/// panics and never raises.
#[must_use]
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(vk) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let sig = Signature::from_bytes(signature);
    vk.verify(message, &sig).is_ok()
}

/// SHA-256 of `data` (FIPS 180-4).
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Generates a fresh 128-bit nonce from the OS CSPRNG, hex-encoded as 32
/// lowercase characters.
#[must_use]
pub fn random_nonce_hex() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Lowercase hex-encodes `bytes`.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decodes a lowercase hex string into exactly `N` bytes.
///
/// # Errors
///
/// Returns [`CryptoError::UppercaseHex`] if `s` contains any uppercase
/// digit, [`CryptoError::InvalidHex`] if `s` is not valid hex, or
/// [`CryptoError::WrongLength`] if the decoded length is not `N`.
pub fn parse_fixed_hex<const N: usize>(s: &str) -> Result<[u8; N], CryptoError> {
    if s.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(CryptoError::UppercaseHex);
    }
    let bytes = hex::decode(s)?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| CryptoError::WrongLength { expected: N, actual })
}

/// Base64url-encodes `bytes` with no padding, as the protocol's `signature`
/// field requires.
#[must_use]
pub fn b64url_encode(bytes: &[u8]) -> String {
    B64.encode(bytes)
}

/// Decodes a base64url-no-pad string.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidBase64`] if `s` is not valid base64url.
pub fn b64url_decode(s: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(B64.decode(s)?)
}

/// Parses a 64-byte Ed25519 public key from lowercase hex, validating that
/// it decompresses to a well-formed curve point.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidPublicKey`] if the bytes do not form a
/// valid Ed25519 public key, or the usual hex-parsing errors otherwise.
pub fn parse_public_key_hex(s: &str) -> Result<[u8; 32], CryptoError> {
    let bytes = parse_fixed_hex::<32>(s)?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(bytes)
}
