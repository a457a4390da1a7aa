//! Error types for the OTP lifecycle.
//!
//! Every variant except [`OtpError::Mismatch`] leaves the caller with zero
//! attempts: the code is gone, expired, or locked, and a new one must be
//! issued. [`OtpError::attempts_left`] folds that into one number for UX.

use thiserror::Error;

/// Errors returned by [`super::OtpLifecycleManager`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OtpError {
    /// No live code for this identity and purpose (never issued, already
    /// consumed, or expired and cleaned up).
    #[error("no active code")]
    NotFound,

    /// The code existed but its TTL has passed.
    #[error("code expired")]
    Expired,

    /// The attempt budget is exhausted. Only a fresh `issue` clears this.
    #[error("code locked after too many attempts")]
    Locked,

    /// Wrong code. When `attempts_left` is zero the record is now locked.
    #[error("code mismatch, {attempts_left} attempts left")]
    Mismatch { attempts_left: u32 },

    /// The mailer failed or timed out. The record was still stored.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The identity is empty or not an email address.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
}

impl OtpError {
    /// Attempts the caller may still make against the current code.
    pub fn attempts_left(&self) -> u32 {
        match self {
            Self::Mismatch { attempts_left } => *attempts_left,
            _ => 0,
        }
    }
}
