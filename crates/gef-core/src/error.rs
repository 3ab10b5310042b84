//! The crate's top-level error type for conditions that abort an operation
//! outright, as opposed to [`crate::replay::ChainViolation`]s, which are data
//! accumulated inside a [`crate::replay::ReplaySummary`] while verification
//! keeps running.

use crate::envelope::SchemaError;
use thiserror::Error;

/// Errors that abort an append or a replay run rather than being recorded as
/// a typed violation.
#[derive(Debug, Error)]
pub enum GefError {
    /// Filesystem I/O failed (open, read, write, lock, or fsync).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The envelope under construction failed schema validation.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Canonicalization failed (a non-finite number somewhere in the payload).
    #[error(transparent)]
    Canonical(#[from] gef_canon::CanonicalError),
    /// The ledger's `gef_version` major component is not `1`; verification
    /// halts immediately rather than producing a (misleading) summary.
    #[error("unsupported gef_version {found:?}: only major version 1 is implemented")]
    VersionFatal {
        /// The unsupported version string found on disk.
        found: String,
    },
    /// Serializing a finalized envelope to its on-disk JSON form failed.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
