//! # OTP-Gated Password Change
//!
//! A password change is two requests. The first proves the old credential
//! and mails a code. The second presents old credential, new credential,
//! and code:
//!
//! ```text
//!   request_code:    verify old ──► issue OTP(PasswordChange)
//!   change_password: verify old ──► policy ──► consume OTP ──► set new
//! ```
//!
//! Every step before the last is read-only or single-use, and each one
//! aborts the whole operation on failure, so the credential is never
//! changed without a consumed code. The converse can happen: if the final
//! write fails after the code was consumed, the user requests a new code.
//!
//! The policy check runs before the OTP is consumed, so a too-short
//! password does not burn the code.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PasswordPolicy;
use crate::otp::{normalize_identity, OtpError, OtpLifecycleManager, OtpPurpose, OtpReceipt, VerifiedOtp};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure reported by a [`CredentialStore`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct CredentialStoreError(pub String);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasswordChangeError {
    /// The old credential did not verify.
    #[error("current credential is incorrect")]
    InvalidCredential,

    /// The new credential was rejected by [`PasswordPolicy`].
    #[error("new credential rejected: {0}")]
    PolicyViolation(String),

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error("credential store error: {0}")]
    CredentialStore(String),
}

impl From<CredentialStoreError> for PasswordChangeError {
    fn from(e: CredentialStoreError) -> Self {
        Self::CredentialStore(e.0)
    }
}

// ---------------------------------------------------------------------------
// Collaborator
// ---------------------------------------------------------------------------

/// Where credentials live. Hashing and storage format are the
/// implementation's business.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn verify_credential(&self, identity: &str, credential: &str) -> Result<bool, CredentialStoreError>;

    async fn set_credential(&self, identity: &str, new_credential: &str) -> Result<(), CredentialStoreError>;
}

// ---------------------------------------------------------------------------
// Request / pending change
// ---------------------------------------------------------------------------

/// The second step of a password change.
#[derive(Clone)]
pub struct PasswordChangeRequest {
    pub identity: String,
    pub old_credential: String,
    pub new_credential: String,
    pub presented_otp: String,
}

impl fmt::Debug for PasswordChangeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordChangeRequest")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Binds one consumed OTP to one credential write.
///
/// Only [`PasswordChangeOrchestrator`] can create one, and only from a
/// [`VerifiedOtp`]. Applying it takes it by value.
pub struct PendingPasswordChange {
    id: Uuid,
    identity: String,
    new_credential: String,
    authorized_at: DateTime<Utc>,
}

impl PendingPasswordChange {
    fn authorize(verified: VerifiedOtp, new_credential: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: verified.identity().to_string(),
            new_credential,
            authorized_at: verified.verified_at(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl fmt::Debug for PendingPasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingPasswordChange")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("authorized_at", &self.authorized_at)
            .finish_non_exhaustive()
    }
}

/// What a completed change reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordChanged {
    pub change_id: Uuid,
    pub identity: String,
    pub authorized_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PasswordChangeOrchestrator
// ---------------------------------------------------------------------------

pub struct PasswordChangeOrchestrator {
    otp: Arc<OtpLifecycleManager>,
    credentials: Arc<dyn CredentialStore>,
    policy: PasswordPolicy,
}

impl PasswordChangeOrchestrator {
    pub fn new(
        otp: Arc<OtpLifecycleManager>,
        credentials: Arc<dyn CredentialStore>,
        policy: PasswordPolicy,
    ) -> Self {
        Self {
            otp,
            credentials,
            policy,
        }
    }

    /// Verifies the old credential and mails a password-change code.
    pub async fn request_code(
        &self,
        identity: &str,
        old_credential: &str,
    ) -> Result<OtpReceipt, PasswordChangeError> {
        let identity = normalize_identity(identity)?;
        self.verify_old(&identity, old_credential).await?;
        Ok(self.otp.issue(&identity, OtpPurpose::PasswordChange).await?)
    }

    /// Runs the full change. The credential store is written only after the
    /// OTP has been consumed.
    pub async fn change_password(
        &self,
        request: PasswordChangeRequest,
    ) -> Result<PasswordChanged, PasswordChangeError> {
        let identity = normalize_identity(&request.identity)?;
        self.verify_old(&identity, &request.old_credential).await?;
        self.check_policy(&request.old_credential, &request.new_credential)?;

        let verified = self
            .otp
            .validate(&identity, OtpPurpose::PasswordChange, &request.presented_otp)
            .map_err(|e| {
                warn!(identity = %identity, error = %e, attempts_left = e.attempts_left(), "password change otp rejected");
                e
            })?;

        let pending = PendingPasswordChange::authorize(verified, request.new_credential);
        self.apply(pending).await
    }

    async fn apply(&self, pending: PendingPasswordChange) -> Result<PasswordChanged, PasswordChangeError> {
        let PendingPasswordChange {
            id,
            identity,
            new_credential,
            authorized_at,
        } = pending;

        if let Err(e) = self.credentials.set_credential(&identity, &new_credential).await {
            warn!(identity = %identity, change_id = %id, error = %e, "credential write failed after otp consumption");
            return Err(e.into());
        }

        info!(identity = %identity, change_id = %id, "password changed");
        Ok(PasswordChanged {
            change_id: id,
            identity,
            authorized_at,
        })
    }

    async fn verify_old(&self, identity: &str, old_credential: &str) -> Result<(), PasswordChangeError> {
        if self.credentials.verify_credential(identity, old_credential).await? {
            Ok(())
        } else {
            warn!(identity = %identity, "current credential rejected");
            Err(PasswordChangeError::InvalidCredential)
        }
    }

    fn check_policy(&self, old: &str, new: &str) -> Result<(), PasswordChangeError> {
        let length = new.chars().count();
        if length < self.policy.min_length {
            return Err(PasswordChangeError::PolicyViolation(format!(
                "must be at least {} characters",
                self.policy.min_length
            )));
        }
        if new == old {
            return Err(PasswordChangeError::PolicyViolation(
                "must differ from the current credential".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for PasswordChangeOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordChangeOrchestrator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
