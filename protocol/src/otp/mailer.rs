//! Delivery of plaintext codes.
//!
//! The lifecycle manager hands each fresh code to an [`OtpMailer`] exactly
//! once. Transport, retries, and templates beyond [`OtpEmail::for_code`]
//! belong to the implementation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

use super::code::OtpCode;
use super::record::OtpPurpose;

const CODE_LINE_PREFIX: &str = "Your verification code is: ";

/// Mail delivery error.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to send email: {0}")]
    SendFailed(String),

    #[error("mailer not configured: {0}")]
    InvalidConfig(String),
}

/// One outbound message. The body contains the plaintext code, so `Debug`
/// prints only the recipient and subject.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpEmail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl OtpEmail {
    pub fn for_code(recipient: &str, purpose: OtpPurpose, code: &OtpCode, ttl: Duration) -> Self {
        let subject = match purpose {
            OtpPurpose::PasswordChange => "Confirm your password change",
            OtpPurpose::EmailVerify => "Verify your email address",
        };
        let minutes = ttl.as_secs().div_ceil(60).max(1);
        let body = format!(
            "{CODE_LINE_PREFIX}{}\n\n\
             This code expires in {minutes} minute{}. It can be used once.\n\n\
             If you did not request this code, ignore this email and your \
             account will not be changed.",
            code.expose(),
            if minutes == 1 { "" } else { "s" },
        );
        Self {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body,
        }
    }

    /// The code embedded by [`OtpEmail::for_code`], if any.
    pub fn embedded_code(&self) -> Option<&str> {
        self.body
            .lines()
            .find_map(|line| line.strip_prefix(CODE_LINE_PREFIX))
    }
}

impl fmt::Debug for OtpEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpEmail")
            .field("recipient", &self.recipient)
            .field("subject", &self.subject)
            .field("body", &"<redacted>")
            .finish()
    }
}

/// The email collaborator.
#[async_trait]
pub trait OtpMailer: Send + Sync {
    async fn send(&self, email: &OtpEmail) -> Result<(), MailError>;
}

/// Logs that a message would have been sent. Never logs the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl OtpMailer for LogMailer {
    async fn send(&self, email: &OtpEmail) -> Result<(), MailError> {
        info!(recipient = %email.recipient, subject = %email.subject, "otp email dispatched");
        Ok(())
    }
}

/// Keeps every message in memory. Used by tests and local tooling.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OtpEmail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OtpEmail> {
        self.sent.lock().clone()
    }

    /// The code from the most recent message to `recipient`.
    pub fn last_code_for(&self, recipient: &str) -> Option<String> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|e| e.recipient == recipient)
            .and_then(|e| e.embedded_code().map(str::to_string))
    }
}

#[async_trait]
impl OtpMailer for MemoryMailer {
    async fn send(&self, email: &OtpEmail) -> Result<(), MailError> {
        self.sent.lock().push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_carries_code_and_purpose_subject() {
        let code = OtpCode::from_presented("482913");
        let email = OtpEmail::for_code(
            "a@b.c",
            OtpPurpose::PasswordChange,
            &code,
            Duration::from_secs(300),
        );
        assert_eq!(email.subject, "Confirm your password change");
        assert_eq!(email.embedded_code(), Some("482913"));
        assert!(email.body.contains("5 minutes"));

        let verify = OtpEmail::for_code("a@b.c", OtpPurpose::EmailVerify, &code, Duration::from_secs(60));
        assert_eq!(verify.subject, "Verify your email address");
        assert!(verify.body.contains("1 minute."));
    }

    #[test]
    fn debug_hides_body() {
        let email = OtpEmail::for_code(
            "a@b.c",
            OtpPurpose::EmailVerify,
            &OtpCode::from_presented("482913"),
            Duration::from_secs(300),
        );
        assert!(!format!("{email:?}").contains("482913"));
    }

    #[tokio::test]
    async fn memory_mailer_returns_latest_code() {
        let mailer = MemoryMailer::new();
        for code in ["111111", "222222"] {
            let email = OtpEmail::for_code(
                "a@b.c",
                OtpPurpose::PasswordChange,
                &OtpCode::from_presented(code),
                Duration::from_secs(300),
            );
            mailer.send(&email).await.unwrap();
        }
        assert_eq!(mailer.last_code_for("a@b.c").as_deref(), Some("222222"));
        assert_eq!(mailer.last_code_for("x@y.z"), None);
        assert_eq!(mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let email = OtpEmail::for_code(
            "a@b.c",
            OtpPurpose::PasswordChange,
            &OtpCode::generate(6),
            Duration::from_secs(300),
        );
        assert!(LogMailer.send(&email).await.is_ok());
    }
}
