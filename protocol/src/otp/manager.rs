//! OTP issuance and validation.
//!
//! Per `(identity, purpose)` the lifecycle is
//!
//! ```text
//!   NONE ──issue──► ISSUED ──right code──► CONSUMED
//!                     │ ├────TTL passes───► EXPIRED
//!                     │ └──budget spent───► LOCKED
//!                     └── issue again ────► ISSUED (fresh budget)
//! ```
//!
//! `issue` commits the record before calling the mailer and bounds the
//! mailer with a timeout. A slow or failed delivery therefore leaves a
//! valid record behind and surfaces as [`OtpError::Delivery`].

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::code::{self, OtpCode};
use super::error::OtpError;
use super::mailer::{OtpEmail, OtpMailer};
use super::record::{normalize_identity, OtpPurpose, OtpRecord};
use super::store::{AttemptOutcome, OtpStore};
use crate::config::{ConfigError, OtpConfig};

/// Returned by a successful `issue`. Carries no code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpReceipt {
    pub identity: String,
    pub purpose: OtpPurpose,
    pub expires_at: DateTime<Utc>,
    pub attempts_allowed: u32,
}

/// Proof that a code was presented correctly and consumed.
///
/// Not `Clone`: each consumption authorizes one operation.
#[derive(Debug, PartialEq, Eq)]
pub struct VerifiedOtp {
    identity: String,
    purpose: OtpPurpose,
    verified_at: DateTime<Utc>,
}

impl VerifiedOtp {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn purpose(&self) -> OtpPurpose {
        self.purpose
    }

    pub fn verified_at(&self) -> DateTime<Utc> {
        self.verified_at
    }
}

pub struct OtpLifecycleManager {
    config: OtpConfig,
    store: Arc<OtpStore>,
    mailer: Arc<dyn OtpMailer>,
    clock: Arc<dyn Clock>,
}

impl OtpLifecycleManager {
    pub fn new(
        config: OtpConfig,
        store: Arc<OtpStore>,
        mailer: Arc<dyn OtpMailer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            mailer,
            clock,
        })
    }

    /// Same as [`OtpLifecycleManager::new`] with wall-clock time.
    pub fn with_system_clock(
        config: OtpConfig,
        store: Arc<OtpStore>,
        mailer: Arc<dyn OtpMailer>,
    ) -> Result<Self, ConfigError> {
        Self::new(config, store, mailer, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<OtpStore> {
        &self.store
    }

    /// Issues a fresh code, replacing any previous one for this key, and
    /// sends it.
    ///
    /// The `Ok`/`Err` reports delivery, not validation. On
    /// [`OtpError::Delivery`] the new record is already stored.
    pub async fn issue(&self, identity: &str, purpose: OtpPurpose) -> Result<OtpReceipt, OtpError> {
        let identity = normalize_identity(identity)?;
        let now = self.clock.now();
        let ttl = self.config.ttl();
        let expires_at = now + ChronoDuration::seconds(self.config.ttl_secs as i64);

        let plaintext = OtpCode::generate(self.config.code_length);
        let salt = code::generate_salt();
        let record = OtpRecord {
            identity: identity.clone(),
            purpose,
            code_hash: code::hash_code(&salt, &identity, purpose, &plaintext),
            salt,
            issued_at: now,
            expires_at,
            attempts_remaining: self.config.max_attempts,
            locked: false,
        };

        let replaced = self.store.put(record).is_some();
        info!(
            identity = %identity,
            purpose = %purpose,
            expires_at = %expires_at,
            replaced,
            "otp issued"
        );

        let email = OtpEmail::for_code(&identity, purpose, &plaintext, ttl);
        let timeout = self.config.delivery_timeout();
        match tokio::time::timeout(timeout, self.mailer.send(&email)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(identity = %identity, purpose = %purpose, error = %e, "otp delivery failed");
                return Err(OtpError::Delivery(e.to_string()));
            }
            Err(_) => {
                warn!(identity = %identity, purpose = %purpose, ?timeout, "otp delivery timed out");
                return Err(OtpError::Delivery(format!(
                    "timed out after {}s",
                    timeout.as_secs()
                )));
            }
        }

        Ok(OtpReceipt {
            identity,
            purpose,
            expires_at,
            attempts_allowed: self.config.max_attempts,
        })
    }

    /// Checks a presented code and consumes it on success.
    pub fn validate(
        &self,
        identity: &str,
        purpose: OtpPurpose,
        presented: &str,
    ) -> Result<VerifiedOtp, OtpError> {
        let identity = normalize_identity(identity)?;
        let presented = OtpCode::from_presented(presented);
        let now = self.clock.now();

        let outcome = self.store.attempt(&identity, purpose, now, |record| {
            code::matches(&record.code_hash, &record.salt, &identity, purpose, &presented)
        });

        match outcome {
            AttemptOutcome::Consumed(_) => {
                info!(identity = %identity, purpose = %purpose, "otp consumed");
                Ok(VerifiedOtp {
                    identity,
                    purpose,
                    verified_at: now,
                })
            }
            AttemptOutcome::Rejected {
                attempts_left,
                locked_now,
            } => {
                if locked_now {
                    warn!(identity = %identity, purpose = %purpose, "otp locked after final failed attempt");
                } else {
                    debug!(identity = %identity, purpose = %purpose, attempts_left, "otp mismatch");
                }
                Err(OtpError::Mismatch { attempts_left })
            }
            AttemptOutcome::Locked => {
                debug!(identity = %identity, purpose = %purpose, "attempt against locked otp");
                Err(OtpError::Locked)
            }
            AttemptOutcome::Expired => {
                debug!(identity = %identity, purpose = %purpose, "attempt against expired otp");
                Err(OtpError::Expired)
            }
            AttemptOutcome::NotFound => Err(OtpError::NotFound),
        }
    }
}

impl std::fmt::Debug for OtpLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpLifecycleManager")
            .field("config", &self.config)
            .field("records", &self.store.len())
            .finish()
    }
}
