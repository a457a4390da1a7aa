//! Stored OTP state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::OtpError;

/// What a code authorizes. One live code per identity and purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    PasswordChange,
    EmailVerify,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PasswordChange => "password_change",
            Self::EmailVerify => "email_verify",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store key: normalized identity plus purpose.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OtpKey {
    pub identity: String,
    pub purpose: OtpPurpose,
}

impl OtpKey {
    pub fn new(identity: impl Into<String>, purpose: OtpPurpose) -> Self {
        Self {
            identity: identity.into(),
            purpose,
        }
    }
}

/// Lifecycle position of a stored code.
///
/// There is no consumed state: a consumed record is deleted from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OtpState {
    Issued,
    Expired,
    Locked,
}

/// One issued code. Holds a salted digest, never the digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub identity: String,
    pub purpose: OtpPurpose,
    pub code_hash: [u8; 32],
    pub salt: [u8; 16],
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts_remaining: u32,
    pub locked: bool,
}

impl OtpRecord {
    pub fn key(&self) -> OtpKey {
        OtpKey::new(self.identity.clone(), self.purpose)
    }

    /// Expired once `now` reaches `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Expiry wins over lock: a locked code that has also timed out reports
    /// as expired.
    pub fn state(&self, now: DateTime<Utc>) -> OtpState {
        if self.is_expired(now) {
            OtpState::Expired
        } else if self.locked {
            OtpState::Locked
        } else {
            OtpState::Issued
        }
    }
}

/// Trims and lowercases an email identity.
///
/// Rejects empty input and anything without an `@` between non-empty parts.
pub fn normalize_identity(raw: &str) -> Result<String, OtpError> {
    let identity = raw.trim().to_lowercase();
    match identity.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(identity),
        _ => Err(OtpError::InvalidIdentity(raw.trim().to_string())),
    }
}
