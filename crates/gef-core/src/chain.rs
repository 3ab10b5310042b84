//! The causal hash chain: binds each envelope to its predecessor.

use crate::envelope::SigningSurface;
use gef_canon::CanonicalError;
use gef_crypto::{hex_encode, sha256};

/// The 64-zero sentinel hash stored in the genesis entry's `causal_hash`.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Returns the genesis sentinel hash.
#[must_use]
pub fn genesis_hash() -> String {
    GENESIS_HASH.to_string()
}

/// Computes `hex(SHA-256(JCS(prev.signing_surface_value())))`.
///
/// Because this reads only `prev.signing_surface_value()`, it is structurally
/// incapable of depending on `prev`'s signature: P6 (chain independence from
/// signature, §8) holds by construction rather than by a side test that
/// happens to pass.
///
/// # Errors
///
/// Returns [`CanonicalError`] if `prev`'s signing surface contains a
/// non-finite number (it never will for a [`crate::envelope::Envelope`]
/// built through [`crate::envelope::EnvelopeBuilder`], since payloads
/// produced that way are schema-validated JSON values, but the signature
/// stays general over any [`SigningSurface`]).
pub fn compute_causal_hash<S: SigningSurface>(prev: &S) -> Result<String, CanonicalError> {
    let canon = gef_canon::canonicalize_value(&prev.signing_surface_value())?;
    Ok(hex_encode(&sha256(&canon)))
}
