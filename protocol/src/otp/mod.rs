//! # One-Time Passwords
//!
//! Short-lived, attempt-limited codes that prove control of an email
//! address before a sensitive account change.
//!
//! - [`OtpLifecycleManager`] issues and validates codes.
//! - [`OtpStore`] holds one salted-hash record per identity and purpose and
//!   serializes all transitions on a key.
//! - [`OtpMailer`] is the delivery collaborator.
//! - [`reaper::spawn_reaper`] optionally sweeps expired records.
//!
//! Plaintext codes exist only between generation and the mailer call. They
//! are never stored and never logged.

pub mod clock;
pub mod code;
pub mod error;
pub mod mailer;
pub mod manager;
pub mod reaper;
pub mod record;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use code::OtpCode;
pub use error::OtpError;
pub use mailer::{LogMailer, MailError, MemoryMailer, OtpEmail, OtpMailer};
pub use manager::{OtpLifecycleManager, OtpReceipt, VerifiedOtp};
pub use reaper::spawn_reaper;
pub use record::{normalize_identity, OtpKey, OtpPurpose, OtpRecord, OtpState};
pub use store::{AttemptOutcome, OtpStore};
