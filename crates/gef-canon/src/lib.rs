#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! RFC 8785 JSON Canonicalization Scheme (JCS) for the GuardClaw Execution
//! Framework.
//!
//! This crate is the delegate "RFC-8785-conforming library" the protocol
//! requires (spec §4.1): nothing upstream of it hand-rolls canonicalization.
//! It canonicalizes any [`serde::Serialize`] value, or an already-parsed
//! [`serde_json::Value`], into deterministic UTF-8 bytes with keys sorted by
//! ascending Unicode code point, integers in minimal decimal form, and
//! finite floating-point numbers formatted per ECMA-262 `Number::toString`.

mod canonicalize;
mod errors;
mod number;

pub use canonicalize::{canonicalize, canonicalize_value};
pub use errors::CanonicalError;
pub use number::format_f64;
