//! Code generation and hashing.
//!
//! Digits come from the OS CSPRNG. A code is hashed as
//! `SHA-256(ctx ‖ salt ‖ identity ‖ purpose ‖ code)` with length-prefixed
//! parts and a fresh 16-byte salt per record, so the same six digits issued
//! to two people never share a digest.

use std::fmt;

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

use super::record::OtpPurpose;
use crate::config::OTP_SALT_LENGTH;
use crate::crypto::hash::domain_separated_sha256;
use crate::crypto::mac::constant_time_eq;

const OTP_HASH_CONTEXT: &str = "claimpay.otp.v1";

/// A plaintext code on its way to the mailer.
///
/// `Debug` is redacted so a stray `{:?}` in a log line cannot leak it.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// Draws `length` decimal digits from the OS CSPRNG.
    pub fn generate(length: usize) -> Self {
        let mut rng = OsRng;
        let digits = (0..length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        Self(digits)
    }

    /// Wraps a code presented by a user.
    pub fn from_presented(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(<redacted>)")
    }
}

pub fn generate_salt() -> [u8; OTP_SALT_LENGTH] {
    let mut salt = [0u8; OTP_SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

pub fn hash_code(
    salt: &[u8; OTP_SALT_LENGTH],
    identity: &str,
    purpose: OtpPurpose,
    code: &OtpCode,
) -> [u8; 32] {
    domain_separated_sha256(
        OTP_HASH_CONTEXT,
        &[
            salt.as_slice(),
            identity.as_bytes(),
            purpose.as_str().as_bytes(),
            code.expose().as_bytes(),
        ],
    )
}

/// Hashes `presented` the same way and compares in constant time.
pub fn matches(
    stored_hash: &[u8; 32],
    salt: &[u8; OTP_SALT_LENGTH],
    identity: &str,
    purpose: OtpPurpose,
    presented: &OtpCode,
) -> bool {
    let candidate = hash_code(salt, identity, purpose, presented);
    constant_time_eq(&candidate, stored_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_codes_are_numeric_and_sized() {
        for len in [4, 6, 9] {
            let code = OtpCode::generate(len);
            assert_eq!(code.expose().len(), len);
            assert!(code.expose().bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn generated_codes_vary() {
        let codes: HashSet<String> = (0..200)
            .map(|_| OtpCode::generate(9).expose().to_string())
            .collect();
        assert!(codes.len() > 190);
    }

    #[test]
    fn debug_is_redacted() {
        let code = OtpCode::from_presented("123456");
        assert!(!format!("{code:?}").contains("123456"));
    }

    #[test]
    fn presented_codes_are_trimmed() {
        assert_eq!(OtpCode::from_presented(" 123456\n").expose(), "123456");
    }

    #[test]
    fn hash_binds_every_input() {
        let salt = [7u8; 16];
        let code = OtpCode::from_presented("123456");
        let base = hash_code(&salt, "a@b.c", OtpPurpose::PasswordChange, &code);

        assert_ne!(base, hash_code(&[8u8; 16], "a@b.c", OtpPurpose::PasswordChange, &code));
        assert_ne!(base, hash_code(&salt, "x@b.c", OtpPurpose::PasswordChange, &code));
        assert_ne!(base, hash_code(&salt, "a@b.c", OtpPurpose::EmailVerify, &code));
        assert_ne!(
            base,
            hash_code(&salt, "a@b.c", OtpPurpose::PasswordChange, &OtpCode::from_presented("123457"))
        );
    }

    #[test]
    fn matches_accepts_only_the_right_code() {
        let salt = generate_salt();
        let code = OtpCode::generate(6);
        let stored = hash_code(&salt, "a@b.c", OtpPurpose::PasswordChange, &code);
        assert!(matches(&stored, &salt, "a@b.c", OtpPurpose::PasswordChange, &code));
        assert!(!matches(
            &stored,
            &salt,
            "a@b.c",
            OtpPurpose::PasswordChange,
            &OtpCode::from_presented("not-it")
        ));
    }
}
