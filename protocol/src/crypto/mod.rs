//! # Cryptographic Primitives
//!
//! Two jobs, two primitives:
//!
//! - **HMAC-SHA512** authenticates every parameter set exchanged with the
//!   payment gateway (see [`mac`]).
//! - **SHA-256** fingerprints OTP codes at rest (see [`hash`]).
//!
//! Everything here is a thin wrapper around the RustCrypto crates. No custom
//! constructions, no hand-rolled comparisons: constant-time equality comes
//! from `subtle` or from `Mac::verify_slice`.

pub mod hash;
pub mod mac;

pub use hash::{domain_separated_sha256, sha256};
pub use mac::{constant_time_eq, hmac_sha512_hex, verify_hmac_sha512_hex};
