#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! The GuardClaw Execution Framework protocol core: the envelope model, the
//! causal hash chain, the signer/ledger-writer append path, and the replay
//! engine that verifies a ledger offline.
//!
//! Production and verification share exactly [`canon`][gef_canon] and
//! [`crypto`][gef_crypto] underneath [`envelope`] and [`chain`] — this is
//! what lets a verifier built against this crate check a ledger produced by
//! any other conforming implementation, and vice versa (spec §6.3).

pub mod chain;
pub mod envelope;
pub mod error;
pub mod replay;
pub mod signer;
pub mod time;
pub mod writer;

pub use chain::{compute_causal_hash, genesis_hash};
pub use envelope::{Envelope, EnvelopeBuilder, RecordType, SchemaError, SigningSurface, UnsignedEnvelope};
pub use error::GefError;
pub use replay::{ChainViolation, ReplayEngine, ReplaySummary, ViolationKind};
pub use signer::LedgerHandle;
pub use writer::{LedgerWriter, RecoveredState};
