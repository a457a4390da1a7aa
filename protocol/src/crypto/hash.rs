//! # Hashing Utilities
//!
//! SHA-256 helpers used where we need a one-way fingerprint rather than a
//! keyed MAC. In practice that means OTP codes: the store keeps a salted
//! digest, never the digits themselves, so a dump of the store is not a
//! list of working codes.
//!
//! ## Domain separation
//!
//! Every multi-part digest goes through [`domain_separated_sha256`], which
//! length-prefixes each part. Without the prefixes, `("ab", "c")` and
//! `("a", "bc")` would hash identically, and an identity that happens to end
//! in digits could collide with a neighbour's code.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use claimpay_protocol::crypto::sha256;
///
/// let hash = sha256(b"claimpay");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash a sequence of parts under a context label.
///
/// Layout: `len(context) ‖ context ‖ (len(part) ‖ part)*`, lengths as
/// little-endian u32. Unambiguous for any split of the input into parts.
pub fn domain_separated_sha256(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update((context.len() as u32).to_le_bytes());
    hasher.update(context.as_bytes());
    for part in parts {
        hasher.update((part.len() as u32).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}
