//! The envelope: an append-only ledger's atomic unit.
//!
//! An envelope has exactly eleven fields (§3.1): ten form the **signing
//! surface**, the input to both the Ed25519 signature and the next
//! envelope's causal hash; the eleventh, `signature`, is excluded from both.
//!
//! # Examples
//!
//! ```
//! use gef_core::envelope::{EnvelopeBuilder, RecordType};
//! use gef_core::chain::genesis_hash;
//! use serde_json::json;
//!
//! let unsigned = EnvelopeBuilder::build_unsigned(
//!     RecordType::Execution,
//!     "agent-007",
//!     "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a",
//!     0,
//!     "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4",
//!     "2026-02-26T00:00:00.000Z",
//!     &genesis_hash(),
//!     json!({"action": "initialize"}),
//! ).unwrap();
//! assert_eq!(unsigned.sequence, 0);
//! ```

use gef_crypto::{parse_fixed_hex, parse_public_key_hex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The protocol version this crate implements. Every envelope this crate
/// *produces* carries exactly this string; envelopes this crate *reads* may
/// carry any `"1.y"` (see [`crate::replay`]'s forward-compatibility rule).
pub const GEF_VERSION: &str = "1.0";

/// One violated field constraint from §3.1.
#[derive(Debug, Clone, Error)]
#[error("{field}: {detail}")]
pub struct FieldViolation {
    /// The violating field's name, stable across versions.
    pub field: &'static str,
    /// Human-readable detail of what was wrong.
    pub detail: String,
}

impl FieldViolation {
    fn new(field: &'static str, detail: impl Into<String>) -> Self {
        Self { field, detail: detail.into() }
    }
}

/// Schema validation failed with one or more field violations.
///
/// A single `String` cannot carry the precise, per-field diagnostics the
/// replay engine needs to emit — this is why the error type is a `Vec`, not
/// a formatted message (§4.3's explicit requirement).
#[derive(Debug, Clone)]
pub struct SchemaError {
    /// Every constraint that failed, in field-check order.
    pub violations: Vec<FieldViolation>,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "schema validation failed with {} violation(s)", self.violations.len())?;
        for v in &self.violations {
            write!(f, "; {v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaError {}

/// The four record-type variants §3.1 registers for protocol version 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// An agent action that was actually taken.
    Execution,
    /// A declared intent to act, not yet carried out.
    Intent,
    /// The outcome of a prior execution.
    Result,
    /// A failed action or failed attempt.
    Failure,
}

impl RecordType {
    /// The lowercase wire string for this variant, per §3.1's table.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Intent => "intent",
            Self::Result => "result",
            Self::Failure => "failure",
        }
    }

    /// Parses a wire string into a known variant, or `None` if it is not one
    /// of the four registered names.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "execution" => Some(Self::Execution),
            "intent" => Some(Self::Intent),
            "result" => Some(Self::Result),
            "failure" => Some(Self::Failure),
            _ => None,
        }
    }

    /// Whether `raw` is a registered `record_type` for `gef_version`.
    ///
    /// Every `"1.y"` minor version registers the same four names; a `"2.x"`
    /// or later major version is handled separately by the replay engine's
    /// version-fatal halt, not by this registry check.
    #[must_use]
    pub fn is_registered_for(raw: &str, gef_version: &str) -> bool {
        gef_version.split('.').next() == Some("1") && Self::parse(raw).is_some()
    }
}

/// The ten-field signing surface, shared by every envelope.
///
/// Produced only by [`EnvelopeBuilder::build_unsigned`], which validates
/// every §3.1 constraint before returning one. `record_type` is stored as a
/// `String`, not the closed [`RecordType`] enum, so that a ledger written
/// under a future `"1.y"` minor version with an as-yet-unregistered
/// `record_type` still parses — the forward-compatibility rule in
/// [`crate::replay`] downgrades that specific condition to a warning rather
/// than failing to deserialize the line at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedEnvelope {
    /// Protocol version, e.g. `"1.0"`.
    pub gef_version: String,
    /// Unique record identifier (UUIDv4 recommended).
    pub record_id: String,
    /// One of the registered record-type names for `gef_version`.
    pub record_type: String,
    /// Identifier of the agent that produced this record.
    pub agent_id: String,
    /// 64 lowercase hex characters: the signer's Ed25519 public key.
    pub signer_public_key: String,
    /// Zero-based position within the ledger.
    pub sequence: u64,
    /// 32 lowercase hex characters: 128 bits of CSPRNG randomness.
    pub nonce: String,
    /// `YYYY-MM-DDTHH:MM:SS.sssZ`, UTC, millisecond precision.
    pub timestamp: String,
    /// 64 lowercase hex characters: hash of the predecessor's signing
    /// surface, or the genesis sentinel at position 0.
    pub causal_hash: String,
    /// Application-defined payload. Must be a JSON object.
    pub payload: serde_json::Value,
}

impl UnsignedEnvelope {
    /// Validates every §3.1 constraint except the record-type registry
    /// check, which the caller applies separately (the replay engine needs
    /// to treat an unregistered `record_type` as a warning rather than a
    /// violation under the forward-compatibility rule; the builder treats it
    /// as a hard failure). Collects every failing field rather than
    /// short-circuiting on the first one.
    #[must_use]
    pub fn validate_fields(&self) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        if !is_well_formed_version(&self.gef_version) {
            violations.push(FieldViolation::new(
                "gef_version",
                format!("{:?} is not of the form \"<major>.<minor>\"", self.gef_version),
            ));
        }
        if self.record_id.is_empty() {
            violations.push(FieldViolation::new("record_id", "must be non-empty"));
        }
        if self.agent_id.is_empty() {
            violations.push(FieldViolation::new("agent_id", "must be non-empty"));
        }
        if let Err(e) = parse_public_key_hex(&self.signer_public_key) {
            violations.push(FieldViolation::new(
                "signer_public_key",
                format!("must be 64 lowercase hex characters: {e}"),
            ));
        }
        if let Err(e) = parse_fixed_hex::<16>(&self.nonce) {
            violations.push(FieldViolation::new(
                "nonce",
                format!("must be 32 lowercase hex characters: {e}"),
            ));
        }
        if !crate::time::is_valid_gef_timestamp(&self.timestamp) {
            violations.push(FieldViolation::new(
                "timestamp",
                format!("{:?} is not YYYY-MM-DDTHH:MM:SS.sssZ", self.timestamp),
            ));
        }
        if let Err(e) = parse_fixed_hex::<32>(&self.causal_hash) {
            violations.push(FieldViolation::new(
                "causal_hash",
                format!("must be 64 lowercase hex characters: {e}"),
            ));
        }
        if !self.payload.is_object() {
            violations.push(FieldViolation::new("payload", "must be a JSON object"));
        }

        violations
    }

    /// Validates every §3.1 constraint, including that `record_type` is
    /// registered for `gef_version`. Use [`Self::validate_fields`] directly
    /// when the caller needs to apply the forward-compatibility exception to
    /// that one check.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if any constraint fails.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut violations = self.validate_fields();
        if !RecordType::is_registered_for(&self.record_type, &self.gef_version) {
            violations.push(FieldViolation::new(
                "record_type",
                format!("{:?} is not registered for gef_version {:?}", self.record_type, self.gef_version),
            ));
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError { violations })
        }
    }
}

fn is_well_formed_version(v: &str) -> bool {
    let mut parts = v.split('.');
    let (Some(major), Some(minor), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !major.is_empty()
        && !minor.is_empty()
        && major.bytes().all(|b| b.is_ascii_digit())
        && minor.bytes().all(|b| b.is_ascii_digit())
}

/// A finalized, signed envelope: [`UnsignedEnvelope`] plus its signature.
///
/// Produced only by [`crate::signer::LedgerHandle::append`] — application
/// code never constructs one with a fabricated signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// The ten signing-surface fields.
    #[serde(flatten)]
    pub unsigned: UnsignedEnvelope,
    /// Base64url (no padding) Ed25519 signature over the canonicalized
    /// signing surface. Excluded from the signing surface itself.
    pub signature: String,
}

/// A type whose ten signing-surface fields can be projected into a JSON
/// value for canonicalization. [`Envelope::chain_dict_value`] and
/// [`SigningSurface::signing_surface_value`] share the same method body by
/// construction (INV-31), not by a runtime equality check.
pub trait SigningSurface {
    /// The ten-field signing surface as a `serde_json::Value`.
    fn signing_surface_value(&self) -> serde_json::Value;
}

impl SigningSurface for UnsignedEnvelope {
    fn signing_surface_value(&self) -> serde_json::Value {
        serde_json::json!({
            "gef_version": self.gef_version,
            "record_id": self.record_id,
            "record_type": self.record_type,
            "agent_id": self.agent_id,
            "signer_public_key": self.signer_public_key,
            "sequence": self.sequence,
            "nonce": self.nonce,
            "timestamp": self.timestamp,
            "causal_hash": self.causal_hash,
            "payload": self.payload,
        })
    }
}

impl SigningSurface for Envelope {
    fn signing_surface_value(&self) -> serde_json::Value {
        self.unsigned.signing_surface_value()
    }
}

impl Envelope {
    /// Identical to [`SigningSurface::signing_surface_value`] (INV-31: the
    /// spec defines these as equal and forbids them from ever diverging).
    #[must_use]
    pub fn chain_dict_value(&self) -> serde_json::Value {
        self.signing_surface_value()
    }
}

/// Generates a fresh `record_id` (UUIDv4), per §3.1's recommendation.
#[must_use]
pub fn generate_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Builds [`UnsignedEnvelope`]s, validating every §3.1 constraint before
/// returning one. `record_id` and `gef_version` are not caller-supplied:
/// the builder always stamps the current protocol version and generates a
/// fresh record id, matching the signing call shape in §4.3.
pub struct EnvelopeBuilder;

impl EnvelopeBuilder {
    /// Builds and validates an [`UnsignedEnvelope`]. Fails closed: on any
    /// constraint violation, no envelope is returned and nothing downstream
    /// (signer, writer) is invoked.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if any field in §3.1 is violated.
    pub fn build_unsigned(
        record_type: RecordType,
        agent_id: &str,
        signer_public_key_hex: &str,
        sequence: u64,
        nonce_hex: &str,
        timestamp: &str,
        causal_hash_hex: &str,
        payload: serde_json::Value,
    ) -> Result<UnsignedEnvelope, SchemaError> {
        let unsigned = UnsignedEnvelope {
            gef_version: GEF_VERSION.to_string(),
            record_id: generate_record_id(),
            record_type: record_type.as_str().to_string(),
            agent_id: agent_id.to_string(),
            signer_public_key: signer_public_key_hex.to_string(),
            sequence,
            nonce: nonce_hex.to_string(),
            timestamp: timestamp.to_string(),
            causal_hash: causal_hash_hex.to_string(),
            payload,
        };
        unsigned.validate()?;
        Ok(unsigned)
    }
}
