use thiserror::Error;

/// Errors raised while canonicalizing a value under RFC 8785 (JCS) rules.
///
/// GuardClaw's signing surface and chain hash are both computed over these
/// bytes, so canonicalization failures are never silently swallowed — every
/// caller must propagate them.
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// The value contained a `NaN` or infinite number, which has no
    /// canonical JSON representation.
    #[error("non-finite number is not representable in canonical JSON")]
    NonFiniteNumber,
    /// Serialization to `serde_json::Value` failed before canonicalization
    /// could begin.
    #[error("serde error: {0}")]
    Serde(String),
}
