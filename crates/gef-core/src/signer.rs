//! The signer: owns a private key, an agent id, and a ledger's running
//! state, and produces finalized signed envelopes (§4.5).

use crate::chain::genesis_hash;
use crate::envelope::{Envelope, EnvelopeBuilder, RecordType, SigningSurface};
use crate::error::GefError;
use crate::time::now_truncated_ms;
use crate::writer::LedgerWriter;
use gef_crypto::{hex_encode, random_nonce_hex, sha256, sign, SecretSeed};

/// `{Closed, Open-Empty, Open-Nonempty}` per §4.8, restricted to the two
/// open states a live [`LedgerHandle`] value can occupy — `Closed` is the
/// absence of a handle, which Rust's ownership already models without a
/// variant for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LedgerState {
    Empty,
    Nonempty,
}

/// A ledger handle: the producer side of the protocol.
///
/// Owns the signing key, the `agent_id`, the running sequence counter, and
/// the canonical bytes of the most recently appended signing surface. A
/// failed [`Self::append`] leaves all of this unchanged — the handle is
/// retry-safe because it commits state only after the write durably
/// succeeds.
pub struct LedgerHandle {
    writer: LedgerWriter,
    agent_id: String,
    signing_key: SecretSeed,
    public_key_hex: String,
    state: LedgerState,
    last_sequence: Option<u64>,
    last_canonical_bytes: Option<Vec<u8>>,
}

impl LedgerHandle {
    /// Opens (creating if necessary) the ledger at `path`, recovering
    /// `(last_sequence, last_canonical_bytes)` from whatever is already on
    /// disk.
    ///
    /// # Errors
    ///
    /// Returns [`GefError::Io`] if the file cannot be opened, locked, or
    /// scanned.
    pub fn open(
        path: impl AsRef<std::path::Path>,
        signing_key: SecretSeed,
        agent_id: impl Into<String>,
    ) -> Result<Self, GefError> {
        let (writer, recovered) = LedgerWriter::open(path)?;
        let state = if recovered.last_sequence.is_some() {
            LedgerState::Nonempty
        } else {
            LedgerState::Empty
        };
        let public_key_hex = hex_encode(&signing_key.public_key());
        Ok(Self {
            writer,
            agent_id: agent_id.into(),
            signing_key,
            public_key_hex,
            state,
            last_sequence: recovered.last_sequence,
            last_canonical_bytes: recovered.last_canonical_bytes,
        })
    }

    /// Builds, signs, and appends one envelope, implementing the nine steps
    /// of §4.5 in order. Only after [`LedgerWriter::append_line`] returns
    /// `Ok` does this method update `last_sequence`/`last_canonical_bytes`;
    /// on any earlier failure the handle's state — and the ledger state
    /// machine (§4.8) — is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`GefError::Schema`] if the built envelope fails validation
    /// (this should not happen for well-formed inputs, since every field but
    /// `payload` is handle-controlled), [`GefError::Canonical`] if `payload`
    /// contains a non-finite number, or [`GefError::Io`]/[`GefError::Serialize`]
    /// if the write itself fails.
    pub fn append(
        &mut self,
        record_type: RecordType,
        payload: serde_json::Value,
    ) -> Result<Envelope, GefError> {
        // 1. causal_hash
        let causal_hash = match &self.last_canonical_bytes {
            None => genesis_hash(),
            Some(bytes) => hex_encode(&sha256(bytes)),
        };
        // 2. sequence
        let sequence = self.last_sequence.map_or(0, |s| s + 1);
        // 3. nonce
        let nonce = random_nonce_hex();
        // 4. timestamp (truncated, not rounded)
        let timestamp = now_truncated_ms();
        // 5. build + schema-validate the unsigned envelope
        let unsigned = EnvelopeBuilder::build_unsigned(
            record_type,
            &self.agent_id,
            &self.public_key_hex,
            sequence,
            &nonce,
            &timestamp,
            &causal_hash,
            payload,
        )?;
        // 6. canonicalize the signing surface
        let canon = gef_canon::canonicalize_value(&unsigned.signing_surface_value())?;
        // 7. sign
        let signature_bytes = sign(&self.signing_key, &canon);
        // 8. attach signature
        let signature = gef_crypto::b64url_encode(&signature_bytes);
        let envelope = Envelope { unsigned, signature };

        // 9. hand to the writer; commit in-memory state only on success
        self.writer.append_line(&envelope)?;

        tracing::debug!(
            agent_id = %self.agent_id,
            sequence,
            record_type = envelope.unsigned.record_type,
            "appended envelope"
        );

        self.last_sequence = Some(sequence);
        self.last_canonical_bytes = Some(canon);
        self.state = LedgerState::Nonempty;
        Ok(envelope)
    }

    /// Flushes and `fsync`s the underlying ledger file.
    ///
    /// # Errors
    ///
    /// Returns [`GefError::Io`] if the sync fails.
    pub fn sync(&mut self) -> Result<(), GefError> {
        self.writer.sync()
    }

    /// The sequence of the last successfully appended envelope, or `None`
    /// for an empty ledger.
    #[must_use]
    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Whether this ledger has no entries yet (`Open-Empty` in §4.8).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state == LedgerState::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gef_crypto::generate_keypair;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn append_starts_at_genesis_and_increments_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let kp = generate_keypair();
        let mut handle = LedgerHandle::open(&path, kp.secret, "agent-007").unwrap();
        assert!(handle.is_empty());

        let e0 = handle.append(RecordType::Intent, json!({"step": 0})).unwrap();
        assert_eq!(e0.unsigned.sequence, 0);
        assert_eq!(e0.unsigned.causal_hash, genesis_hash());
        assert!(!handle.is_empty());

        let e1 = handle.append(RecordType::Execution, json!({"step": 1})).unwrap();
        assert_eq!(e1.unsigned.sequence, 1);
        assert_ne!(e1.unsigned.causal_hash, genesis_hash());
    }

    #[test]
    fn a_failed_append_leaves_state_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let kp = generate_keypair();
        let mut handle = LedgerHandle::open(&path, kp.secret, "agent-007").unwrap();
        handle.append(RecordType::Intent, json!({"step": 0})).unwrap();

        let before = handle.last_sequence();
        // Non-object payloads fail schema validation and must not advance state.
        let err = handle.append(RecordType::Execution, json!(["bad"])).unwrap_err();
        assert!(matches!(err, GefError::Schema(_)));
        assert_eq!(handle.last_sequence(), before);
    }

    #[test]
    fn reopening_a_ledger_continues_the_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let kp = generate_keypair();
        {
            let mut handle = LedgerHandle::open(&path, kp.secret.clone(), "agent-007").unwrap();
            handle.append(RecordType::Intent, json!({})).unwrap();
            handle.append(RecordType::Execution, json!({})).unwrap();
        }
        let mut handle = LedgerHandle::open(&path, kp.secret, "agent-007").unwrap();
        assert_eq!(handle.last_sequence(), Some(1));
        let e2 = handle.append(RecordType::Result, json!({})).unwrap();
        assert_eq!(e2.unsigned.sequence, 2);
    }
}
