//! # Keyed Message Authentication
//!
//! HMAC-SHA512 over canonical text, rendered as lowercase hex. This is the
//! primitive under the gateway signature engine.
//!
//! Verification recomputes the tag and compares in constant time via
//! `Mac::verify_slice`. A `==` on hex strings would leak how many leading
//! characters an attacker got right.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;

type HmacSha512 = Hmac<Sha512>;

/// HMAC-SHA512 output length in bytes.
pub const HMAC_SHA512_LENGTH: usize = 64;

/// Compute `HMAC-SHA512(key, message)` and return it as lowercase hex.
///
/// HMAC accepts keys of any length, so this cannot fail. Rejecting an empty
/// key is the caller's job.
pub fn hmac_sha512_hex(key: &[u8], message: &[u8]) -> String {
    hex::encode(hmac_sha512(key, message))
}

fn hmac_sha512(key: &[u8], message: &[u8]) -> [u8; HMAC_SHA512_LENGTH] {
    let mut mac = new_mac(key);
    mac.update(message);
    let mut out = [0u8; HMAC_SHA512_LENGTH];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Verify a hex-encoded tag against `HMAC-SHA512(key, message)`.
///
/// Only the canonical form verifies: exactly 128 lowercase hex characters.
/// Anything else, including an uppercased copy of a valid tag, is a failed
/// verification.
pub fn verify_hmac_sha512_hex(key: &[u8], message: &[u8], tag_hex: &str) -> bool {
    if !is_lowercase_hex_tag(tag_hex) {
        return false;
    }
    let Ok(tag) = hex::decode(tag_hex) else {
        return false;
    };
    if tag.len() != HMAC_SHA512_LENGTH {
        return false;
    }
    let mut mac = new_mac(key);
    mac.update(message);
    mac.verify_slice(&tag).is_ok()
}

/// Constant-time equality for byte slices of possibly different lengths.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

fn is_lowercase_hex_tag(tag_hex: &str) -> bool {
    tag_hex.len() == HMAC_SHA512_LENGTH * 2
        && tag_hex
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn new_mac(key: &[u8]) -> HmacSha512 {
    match HmacSha512::new_from_slice(key) {
        Ok(mac) => mac,
        // HMAC pads or hashes any key length; InvalidLength is unreachable.
        Err(_) => unreachable!("HMAC accepts keys of every length"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc4231_test_case_2() {
        // RFC 4231, test case 2: key "Jefe".
        let tag = hmac_sha512_hex(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            tag,
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
             9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn tag_is_128_lowercase_hex_chars() {
        let tag = hmac_sha512_hex(b"k", b"m");
        assert_eq!(tag.len(), 128);
        assert!(tag.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn verify_accepts_own_tag() {
        let tag = hmac_sha512_hex(b"secret", b"payload");
        assert!(verify_hmac_sha512_hex(b"secret", b"payload", &tag));
    }

    #[test]
    fn verify_rejects_uppercase_hex() {
        let tag = hmac_sha512_hex(b"secret", b"payload").to_uppercase();
        assert!(!verify_hmac_sha512_hex(b"secret", b"payload", &tag));
    }

    #[test]
    fn verify_rejects_single_letter_case_flip() {
        let tag = hmac_sha512_hex(b"secret", b"payload");
        let i = tag
            .find(|c: char| c.is_ascii_alphabetic())
            .expect("tag has a hex letter");
        let mut flipped = tag.clone();
        flipped.replace_range(i..i + 1, &tag[i..i + 1].to_ascii_uppercase());
        assert!(!verify_hmac_sha512_hex(b"secret", b"payload", &flipped));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let tag = hmac_sha512_hex(b"secret", b"payload");
        assert!(!verify_hmac_sha512_hex(b"other", b"payload", &tag));
    }

    #[test]
    fn verify_rejects_garbage() {
        assert!(!verify_hmac_sha512_hex(b"secret", b"payload", "not-hex"));
        assert!(!verify_hmac_sha512_hex(b"secret", b"payload", "abcd"));
        assert!(!verify_hmac_sha512_hex(b"secret", b"payload", ""));
    }

    #[test]
    fn constant_time_eq_behaviour() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
