//! Integration tests for the OTP-gated password change.
//!
//! The credential store here keeps SHA-256 digests, so the tests also
//! check that nothing in the flow depends on seeing a stored plaintext.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use parking_lot::Mutex;

use claimpay_protocol::account::{
    CredentialStore, CredentialStoreError, PasswordChangeError, PasswordChangeOrchestrator,
    PasswordChangeRequest,
};
use claimpay_protocol::config::{OtpConfig, PasswordPolicy};
use claimpay_protocol::crypto::sha256;
use claimpay_protocol::otp::{
    ManualClock, MemoryMailer, OtpError, OtpLifecycleManager, OtpPurpose, OtpStore,
};

const ID: &str = "dave@example.com";
const OLD: &str = "correct horse";
const NEW: &str = "battery staple";

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn digest(credential: &str) -> String {
    hex::encode(sha256(credential.as_bytes()))
}

#[derive(Default)]
struct DigestCredentials {
    digests: Mutex<HashMap<String, String>>,
    writes: Mutex<u32>,
}

impl DigestCredentials {
    fn with(identity: &str, credential: &str) -> Self {
        let store = Self::default();
        store
            .digests
            .lock()
            .insert(identity.to_string(), digest(credential));
        store
    }

    fn matches(&self, identity: &str, credential: &str) -> bool {
        self.digests.lock().get(identity) == Some(&digest(credential))
    }
}

#[async_trait]
impl CredentialStore for DigestCredentials {
    async fn verify_credential(&self, identity: &str, credential: &str) -> Result<bool, CredentialStoreError> {
        Ok(self.matches(identity, credential))
    }

    async fn set_credential(&self, identity: &str, new_credential: &str) -> Result<(), CredentialStoreError> {
        *self.writes.lock() += 1;
        self.digests
            .lock()
            .insert(identity.to_string(), digest(new_credential));
        Ok(())
    }
}

struct Harness {
    orchestrator: PasswordChangeOrchestrator,
    otp: Arc<OtpLifecycleManager>,
    creds: Arc<DigestCredentials>,
    mailer: Arc<MemoryMailer>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let mailer = Arc::new(MemoryMailer::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
    ));
    let otp = Arc::new(
        OtpLifecycleManager::new(
            OtpConfig {
                max_attempts: 3,
                ..OtpConfig::default()
            },
            Arc::new(OtpStore::new()),
            mailer.clone(),
            clock.clone(),
        )
        .unwrap(),
    );
    let creds = Arc::new(DigestCredentials::with(ID, OLD));
    let orchestrator =
        PasswordChangeOrchestrator::new(otp.clone(), creds.clone(), PasswordPolicy::default());
    Harness {
        orchestrator,
        otp,
        creds,
        mailer,
        clock,
    }
}

fn change(code: &str) -> PasswordChangeRequest {
    PasswordChangeRequest {
        identity: ID.into(),
        old_credential: OLD.into(),
        new_credential: NEW.into(),
        presented_otp: code.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_step_change_succeeds() {
    let h = harness();
    h.orchestrator.request_code(ID, OLD).await.unwrap();
    let code = h.mailer.last_code_for(ID).unwrap();

    let done = h.orchestrator.change_password(change(&code)).await.unwrap();
    assert_eq!(done.identity, ID);
    assert!(h.creds.matches(ID, NEW));
    assert!(!h.creds.matches(ID, OLD));
}

#[tokio::test]
async fn identity_case_does_not_matter() {
    let h = harness();
    h.orchestrator.request_code("Dave@Example.com", OLD).await.unwrap();
    let code = h.mailer.last_code_for(ID).unwrap();

    let mut req = change(&code);
    req.identity = " DAVE@example.com".into();
    assert!(h.orchestrator.change_password(req).await.is_ok());
}

#[tokio::test]
async fn no_mutation_without_otp() {
    let h = harness();
    let err = h
        .orchestrator
        .change_password(change("123456"))
        .await
        .unwrap_err();
    assert_eq!(err, PasswordChangeError::Otp(OtpError::NotFound));
    assert_eq!(*h.creds.writes.lock(), 0);
}

#[tokio::test]
async fn no_mutation_with_wrong_old_credential_even_with_valid_code() {
    let h = harness();
    h.orchestrator.request_code(ID, OLD).await.unwrap();
    let code = h.mailer.last_code_for(ID).unwrap();

    let mut req = change(&code);
    req.old_credential = "wrong".into();
    assert_eq!(
        h.orchestrator.change_password(req).await.unwrap_err(),
        PasswordChangeError::InvalidCredential
    );
    assert_eq!(*h.creds.writes.lock(), 0);

    // The code was not consumed by the rejected attempt.
    assert!(h.orchestrator.change_password(change(&code)).await.is_ok());
}

#[tokio::test]
async fn email_verify_code_cannot_authorize_password_change() {
    let h = harness();
    h.otp.issue(ID, OtpPurpose::EmailVerify).await.unwrap();
    let code = h.mailer.last_code_for(ID).unwrap();

    assert_eq!(
        h.orchestrator.change_password(change(&code)).await.unwrap_err(),
        PasswordChangeError::Otp(OtpError::NotFound)
    );
}

#[tokio::test]
async fn expired_code_is_refused() {
    let h = harness();
    h.orchestrator.request_code(ID, OLD).await.unwrap();
    let code = h.mailer.last_code_for(ID).unwrap();
    h.clock.advance(Duration::minutes(10));

    assert_eq!(
        h.orchestrator.change_password(change(&code)).await.unwrap_err(),
        PasswordChangeError::Otp(OtpError::Expired)
    );
    assert!(h.creds.matches(ID, OLD));
}

#[tokio::test]
async fn brute_force_locks_out() {
    let h = harness();
    h.orchestrator.request_code(ID, OLD).await.unwrap();
    let code = h.mailer.last_code_for(ID).unwrap();
    let guess = if code == "000000" { "999999" } else { "000000" };

    for expected_left in [2, 1, 0] {
        let err = h.orchestrator.change_password(change(guess)).await.unwrap_err();
        assert_eq!(err, PasswordChangeError::Otp(OtpError::Mismatch { attempts_left: expected_left }));
    }
    assert_eq!(
        h.orchestrator.change_password(change(&code)).await.unwrap_err(),
        PasswordChangeError::Otp(OtpError::Locked)
    );
    assert!(h.creds.matches(ID, OLD));
}

#[tokio::test]
async fn concurrent_changes_with_one_code_apply_once() {
    let h = Arc::new(harness());
    h.orchestrator.request_code(ID, OLD).await.unwrap();
    let code = h.mailer.last_code_for(ID).unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let h = Arc::clone(&h);
            let code = code.clone();
            tokio::spawn(async move { h.orchestrator.change_password(change(&code)).await })
        })
        .collect();

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(*h.creds.writes.lock(), 1);
}
