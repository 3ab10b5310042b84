//! The replay engine: the verifier (§4.7). Loads a ledger line by line and
//! runs two-phase verification, continuing past every recoverable violation
//! so the resulting [`ReplaySummary`] is a complete audit picture rather
//! than a first-error-wins truncation.

use crate::chain::genesis_hash;
use crate::envelope::{Envelope, FieldViolation, RecordType, SigningSurface};
use crate::error::GefError;
use gef_crypto::{b64url_decode, hex_encode, parse_public_key_hex, sha256, verify};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// The eleven field names §3.1 permits on an envelope — no more, no fewer.
const ENVELOPE_FIELDS: [&str; 11] = [
    "gef_version",
    "record_id",
    "record_type",
    "agent_id",
    "signer_public_key",
    "sequence",
    "nonce",
    "timestamp",
    "causal_hash",
    "payload",
    "signature",
];

/// The closed set of violation kinds (§4.7, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// Malformed JSON, a failed field constraint, a duplicate nonce, or a
    /// mixed `gef_version` within one ledger.
    Schema,
    /// The entry's stored `sequence` does not equal its 0-based position.
    SequenceGap,
    /// The entry's stored `causal_hash` does not match the recomputed hash
    /// of the preceding signing surface.
    ChainBreak,
    /// Ed25519 verification of the entry's signature returned `false`.
    InvalidSignature,
}

/// One typed, structured inconsistency discovered during replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainViolation {
    /// What kind of inconsistency this is.
    pub kind: ViolationKind,
    /// The 0-based position in the ledger file where it was found.
    pub at_sequence: u64,
    /// Human-readable detail.
    pub detail: String,
}

/// The typed report produced by one replay run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Number of non-blank lines attempted.
    pub total_entries: u64,
    /// Every violation found, in the order entries were read.
    pub violations: Vec<ChainViolation>,
    /// `false` iff any [`ViolationKind::Schema`] violation was found.
    pub schema_valid: bool,
    /// `false` iff any [`ViolationKind::ChainBreak`] or
    /// [`ViolationKind::SequenceGap`] violation was found.
    pub chain_valid: bool,
    /// `false` iff any [`ViolationKind::InvalidSignature`] violation was
    /// found.
    pub signatures_valid: bool,
    /// `schema_valid && chain_valid && signatures_valid`.
    pub overall_valid: bool,
    /// Forward-compatibility notices (e.g. an unregistered `record_type`
    /// under a newer `"1.y"` minor version). Never affects `overall_valid`;
    /// not a protocol field, an ambient addition for operator visibility.
    pub warnings: Vec<String>,
}

/// The verifier side of the protocol. Stateless between runs; each call to
/// [`Self::verify_ledger`] carries its own scratch state and terminates
/// deterministically when the file is exhausted (§4.8).
pub struct ReplayEngine;

impl ReplayEngine {
    /// Verifies the ledger at `path`.
    ///
    /// If `policy_key` is `Some`, every entry's `signer_public_key` must
    /// equal it (a mismatch is a schema violation); if `None`, each entry is
    /// checked against its own embedded key (§4.7, §9's I-key open
    /// question).
    ///
    /// # Errors
    ///
    /// Returns [`GefError::Io`] if the file cannot be opened or read, or
    /// [`GefError::VersionFatal`] if the first entry's `gef_version` major
    /// component is not `1` — the only condition that halts verification
    /// instead of being recorded as a violation.
    pub fn verify_ledger(path: &Path, policy_key: Option<&str>) -> Result<ReplaySummary, GefError> {
        let reader = BufReader::new(File::open(path)?);

        let mut summary = ReplaySummary::default();
        let mut seen_nonces: HashSet<String> = HashSet::new();
        let mut seen_record_ids: HashSet<String> = HashSet::new();
        let mut last_canonical_bytes: Option<Vec<u8>> = None;
        let mut ledger_version: Option<String> = None;
        let mut forward_compat_minor = false;
        let mut position: u64 = 0;

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            summary.total_entries += 1;

            let raw_value: serde_json::Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    summary.violations.push(ChainViolation {
                        kind: ViolationKind::Schema,
                        at_sequence: position,
                        detail: format!("malformed JSON line: {e}"),
                    });
                    position += 1;
                    continue;
                }
            };

            // `#[serde(flatten)]` on Envelope silently drops keys it doesn't
            // recognize, so a 12th field would otherwise deserialize cleanly
            // and never be flagged (§3.1: "exactly eleven fields. No more,
            // no fewer."). Check the raw key set before typed deserialization.
            let extra_fields: Vec<String> = match raw_value.as_object() {
                Some(obj) => obj
                    .keys()
                    .filter(|k| !ENVELOPE_FIELDS.contains(&k.as_str()))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            };

            let envelope: Envelope = match serde_json::from_value(raw_value) {
                Ok(envelope) => envelope,
                Err(e) => {
                    summary.violations.push(ChainViolation {
                        kind: ViolationKind::Schema,
                        at_sequence: position,
                        detail: format!("malformed JSON line: {e}"),
                    });
                    position += 1;
                    continue;
                }
            };

            if position == 0 {
                let major = envelope.unsigned.gef_version.split('.').next().unwrap_or("");
                if major != "1" {
                    return Err(GefError::VersionFatal { found: envelope.unsigned.gef_version });
                }
                forward_compat_minor = envelope
                    .unsigned
                    .gef_version
                    .split('.')
                    .nth(1)
                    .and_then(|m| m.parse::<u64>().ok())
                    .is_some_and(|m| m > 0);
                ledger_version = Some(envelope.unsigned.gef_version.clone());
            }

            let mut field_violations = envelope.unsigned.validate_fields();

            if !extra_fields.is_empty() {
                field_violations.push(FieldViolation::from_parts(
                    "envelope",
                    format!("unexpected field(s): {}", extra_fields.join(", ")),
                ));
            }

            if let Some(v0) = &ledger_version {
                if &envelope.unsigned.gef_version != v0 {
                    field_violations.push(FieldViolation::from_parts(
                        "gef_version",
                        format!("mixed version: ledger is {v0:?}, entry is {:?}", envelope.unsigned.gef_version),
                    ));
                }
            }

            if !RecordType::is_registered_for(&envelope.unsigned.record_type, &envelope.unsigned.gef_version) {
                if forward_compat_minor {
                    summary.warnings.push(format!(
                        "position {position}: unregistered record_type {:?} under gef_version {:?}",
                        envelope.unsigned.record_type, envelope.unsigned.gef_version
                    ));
                } else {
                    field_violations.push(FieldViolation::from_parts(
                        "record_type",
                        format!(
                            "{:?} is not registered for gef_version {:?}",
                            envelope.unsigned.record_type, envelope.unsigned.gef_version
                        ),
                    ));
                }
            }

            if let Some(key) = policy_key {
                if envelope.unsigned.signer_public_key != key {
                    field_violations.push(FieldViolation::from_parts(
                        "signer_public_key",
                        format!("does not match the supplied policy key {key:?}"),
                    ));
                }
            }

            let schema_ok = field_violations.is_empty();
            for fv in &field_violations {
                summary.violations.push(ChainViolation {
                    kind: ViolationKind::Schema,
                    at_sequence: position,
                    detail: fv.to_string(),
                });
            }

            // Phase 1, steps 3-5: sequence, chain, nonce. These run
            // regardless of schema validity — chain integrity is
            // independent of whether every field of this entry is
            // well-formed.
            if envelope.unsigned.sequence != position {
                summary.violations.push(ChainViolation {
                    kind: ViolationKind::SequenceGap,
                    at_sequence: position,
                    detail: format!("stored sequence {} != position {position}", envelope.unsigned.sequence),
                });
            }

            let expected_causal_hash = match &last_canonical_bytes {
                None => genesis_hash(),
                Some(bytes) => hex_encode(&sha256(bytes)),
            };
            if envelope.unsigned.causal_hash != expected_causal_hash {
                summary.violations.push(ChainViolation {
                    kind: ViolationKind::ChainBreak,
                    at_sequence: position,
                    detail: format!(
                        "expected causal_hash {expected_causal_hash}, found {}",
                        envelope.unsigned.causal_hash
                    ),
                });
            }

            if !seen_nonces.insert(envelope.unsigned.nonce.clone()) {
                summary.violations.push(ChainViolation {
                    kind: ViolationKind::Schema,
                    at_sequence: position,
                    detail: "duplicate nonce".to_string(),
                });
            }

            if !seen_record_ids.insert(envelope.unsigned.record_id.clone()) {
                summary.violations.push(ChainViolation {
                    kind: ViolationKind::Schema,
                    at_sequence: position,
                    detail: "duplicate record_id".to_string(),
                });
            }

            // Step 6: update last_canonical_bytes whether or not phase 2
            // passes. Only a non-finite number in `payload` can make this
            // fail, and that failure is itself a schema-level condition.
            match gef_canon::canonicalize_value(&envelope.signing_surface_value()) {
                Ok(canon) => {
                    if schema_ok && !signature_valid(&envelope, &canon) {
                        summary.violations.push(ChainViolation {
                            kind: ViolationKind::InvalidSignature,
                            at_sequence: position,
                            detail: "Ed25519 verification returned false".to_string(),
                        });
                    }
                    last_canonical_bytes = Some(canon);
                }
                Err(e) => {
                    summary.violations.push(ChainViolation {
                        kind: ViolationKind::Schema,
                        at_sequence: position,
                        detail: format!("signing surface does not canonicalize: {e}"),
                    });
                }
            }

            position += 1;
        }

        summary.schema_valid = !summary.violations.iter().any(|v| v.kind == ViolationKind::Schema);
        summary.chain_valid = !summary
            .violations
            .iter()
            .any(|v| matches!(v.kind, ViolationKind::ChainBreak | ViolationKind::SequenceGap));
        summary.signatures_valid = !summary.violations.iter().any(|v| v.kind == ViolationKind::InvalidSignature);
        summary.overall_valid = summary.schema_valid && summary.chain_valid && summary.signatures_valid;

        for v in &summary.violations {
            tracing::warn!(kind = ?v.kind, at_sequence = v.at_sequence, detail = %v.detail, "ledger violation");
        }

        Ok(summary)
    }
}

fn signature_valid(envelope: &Envelope, canon: &[u8]) -> bool {
    let Ok(public_key) = parse_public_key_hex(&envelope.unsigned.signer_public_key) else {
        return false;
    };
    let Ok(sig_vec) = b64url_decode(&envelope.signature) else {
        return false;
    };
    let Ok(sig_bytes): Result<[u8; 64], _> = sig_vec.try_into() else {
        return false;
    };
    verify(&public_key, canon, &sig_bytes)
}

impl FieldViolation {
    fn from_parts(field: &'static str, detail: impl Into<String>) -> Self {
        Self { field, detail: detail.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::LedgerHandle;
    use gef_crypto::generate_keypair;
    use serde_json::json;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn empty_ledger_is_trivially_valid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        File::create(&path).unwrap();

        let summary = ReplayEngine::verify_ledger(&path, None).unwrap();
        assert_eq!(summary.total_entries, 0);
        assert!(summary.overall_valid);
        assert!(summary.violations.is_empty());
    }

    #[test]
    fn a_freshly_produced_ledger_verifies_clean() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let kp = generate_keypair();
        {
            let mut handle = LedgerHandle::open(&path, kp.secret, "agent-007").unwrap();
            for rt in [RecordType::Intent, RecordType::Execution, RecordType::Result] {
                handle.append(rt, json!({"n": 1})).unwrap();
            }
        }

        let summary = ReplayEngine::verify_ledger(&path, Some(&hex::encode(kp.public))).unwrap();
        assert_eq!(summary.total_entries, 3);
        assert!(summary.overall_valid, "{summary:?}");
        assert!(summary.violations.is_empty());
    }

    #[test]
    fn verification_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let kp = generate_keypair();
        {
            let mut handle = LedgerHandle::open(&path, kp.secret, "agent-007").unwrap();
            handle.append(RecordType::Intent, json!({})).unwrap();
            handle.append(RecordType::Execution, json!({})).unwrap();
        }

        let first = ReplayEngine::verify_ledger(&path, None).unwrap();
        let second = ReplayEngine::verify_ledger(&path, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn version_fatal_halts_before_producing_a_summary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{"gef_version":"2.0","record_id":"r1","record_type":"execution","agent_id":"a","signer_public_key":"{}","sequence":0,"nonce":"{}","timestamp":"2026-02-26T00:00:00.000Z","causal_hash":"{}","payload":{{}},"signature":"x"}}"#,
            "d".repeat(64),
            "e".repeat(32),
            genesis_hash(),
        )
        .unwrap();

        let err = ReplayEngine::verify_ledger(&path, None).unwrap_err();
        assert!(matches!(err, GefError::VersionFatal { .. }));
    }

    #[test]
    fn duplicate_nonce_is_a_schema_violation_with_chain_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let kp = generate_keypair();

        // Build three valid entries, then rewrite entry 1's line to reuse
        // entry 0's nonce; re-sign it so signature verification still
        // passes and only the nonce-duplication rule fires.
        let mut lines = Vec::new();
        {
            let mut handle = LedgerHandle::open(&path, kp.secret.clone(), "agent-007").unwrap();
            for _ in 0..3 {
                handle.append(RecordType::Execution, json!({})).unwrap();
            }
        }
        for line in std::fs::read_to_string(&path).unwrap().lines() {
            lines.push(line.to_string());
        }

        let entry0: Envelope = serde_json::from_str(&lines[0]).unwrap();
        let mut entry1: Envelope = serde_json::from_str(&lines[1]).unwrap();
        entry1.unsigned.nonce = entry0.unsigned.nonce.clone();
        let canon = gef_canon::canonicalize_value(&entry1.signing_surface_value()).unwrap();
        let sig = gef_crypto::sign(&kp.secret, &canon);
        entry1.signature = gef_crypto::b64url_encode(&sig);
        lines[1] = serde_json::to_string(&entry1).unwrap();

        std::fs::write(&path, lines.join("\n") + "\n").unwrap();

        let summary = ReplayEngine::verify_ledger(&path, None).unwrap();
        assert!(summary
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::Schema && v.detail == "duplicate nonce" && v.at_sequence == 1));
        assert!(summary.signatures_valid);
    }
}
