//! Inbound callback verification and reconciliation.
//!
//! The gateway reports a payment result twice: by redirecting the user to
//! the return URL and by calling the merchant's IPN endpoint. Both carry the
//! same signed parameter set. [`CallbackVerifier`] strips `vnp_SecureHash`,
//! re-canonicalizes what is left with the same encoder the builder uses, and
//! checks the HMAC.
//!
//! Nothing on this path returns `Err`. Missing signatures, bad escapes, and
//! wrong hashes all come back as an outcome with `is_valid == false` and a
//! [`CallbackRejection`] saying why.
//!
//! A valid signature only proves the gateway said it. It does not prove the
//! callback belongs to a payment we are still waiting for, so
//! [`CallbackVerifier::reconcile`] checks the echoed reference and amount
//! against the caller's [`PendingPayments`] before anything is settled.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::canonical::canonicalize;
use super::error::GatewayError;
use super::params::ParameterSet;
use super::signing::SignatureEngine;
use super::types::{Amount, TransactionRef};
use crate::config::{self, GatewayConfig};

// ---------------------------------------------------------------------------
// CallbackOutcome
// ---------------------------------------------------------------------------

/// Why a callback failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackRejection {
    /// No `vnp_SecureHash` parameter at all.
    MissingSignature,
    /// The payload could not be decoded or canonicalized.
    Malformed(String),
    /// The recomputed HMAC does not match.
    SignatureMismatch,
}

/// The verified (or not) result of one gateway callback.
///
/// `response_code` and `transaction_ref` are echoed from the payload even
/// when `is_valid` is false, for logging. Do not act on them unless
/// `is_valid` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackOutcome {
    pub is_valid: bool,
    /// Valid signature, success response code, and (when present) success
    /// transaction status.
    pub succeeded: bool,
    pub response_code: String,
    pub transaction_ref: TransactionRef,
    pub transaction_status: Option<String>,
    /// `vnp_Amount` parsed as minor units, if present and numeric.
    pub amount: Option<Amount>,
    pub gateway_transaction_no: Option<String>,
    pub bank_code: Option<String>,
    pub pay_date: Option<String>,
    pub rejection: Option<CallbackRejection>,
    /// Everything received, signature included.
    pub raw_parameters: ParameterSet,
}

impl CallbackOutcome {
    /// True only for a verified callback reporting a completed payment.
    pub fn is_success(&self) -> bool {
        self.is_valid && self.succeeded
    }

    fn rejected(raw_parameters: ParameterSet, rejection: CallbackRejection) -> Self {
        let mut outcome = Self::from_parameters(raw_parameters);
        outcome.rejection = Some(rejection);
        outcome
    }

    fn from_parameters(raw_parameters: ParameterSet) -> Self {
        let owned = |key: &str| raw_parameters.get(key).map(str::to_string);
        Self {
            is_valid: false,
            succeeded: false,
            response_code: owned(config::PARAM_RESPONSE_CODE).unwrap_or_default(),
            transaction_ref: TransactionRef::from_echo(
                owned(config::PARAM_TXN_REF).unwrap_or_default(),
            ),
            transaction_status: owned(config::PARAM_TRANSACTION_STATUS),
            amount: raw_parameters
                .get(config::PARAM_AMOUNT)
                .and_then(|v| v.parse::<u64>().ok())
                .and_then(|minor| Amount::from_minor(minor).ok()),
            gateway_transaction_no: owned(config::PARAM_TRANSACTION_NO),
            bank_code: owned(config::PARAM_BANK_CODE),
            pay_date: owned(config::PARAM_PAY_DATE),
            rejection: None,
            raw_parameters,
        }
    }
}

// ---------------------------------------------------------------------------
// CallbackVerifier
// ---------------------------------------------------------------------------

/// Verifies gateway callbacks against the shared secret.
#[derive(Debug, Clone)]
pub struct CallbackVerifier {
    engine: SignatureEngine,
    success_code: String,
}

impl CallbackVerifier {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        Ok(Self {
            engine: SignatureEngine::new(config)?,
            success_code: config.success_code.clone(),
        })
    }

    /// Verifies a raw query string exactly as received on the wire.
    pub fn verify_query(&self, query: &str) -> CallbackOutcome {
        match ParameterSet::from_query(query) {
            Ok(params) => self.verify(params),
            Err(e) => {
                warn!(error = %e, "callback query could not be decoded");
                CallbackOutcome::rejected(ParameterSet::new(), CallbackRejection::Malformed(e.to_string()))
            }
        }
    }

    /// Verifies an already-decoded parameter set.
    pub fn verify(&self, parameters: ParameterSet) -> CallbackOutcome {
        let Some(provided) = parameters.get(config::PARAM_SECURE_HASH).map(str::to_string) else {
            warn!("callback without secure hash");
            return CallbackOutcome::rejected(parameters, CallbackRejection::MissingSignature);
        };

        // canonicalize() skips the hash parameter itself, so the remainder
        // is rendered without cloning and removing.
        let canonical_text = match canonicalize(&parameters) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "callback could not be canonicalized");
                return CallbackOutcome::rejected(
                    parameters,
                    CallbackRejection::Malformed(e.to_string()),
                );
            }
        };

        let mut outcome = CallbackOutcome::from_parameters(parameters);

        if !self.engine.verify_text(&canonical_text, &provided) {
            warn!(txn_ref = %outcome.transaction_ref, "callback signature mismatch");
            outcome.rejection = Some(CallbackRejection::SignatureMismatch);
            return outcome;
        }

        outcome.is_valid = true;
        outcome.succeeded = outcome.response_code == self.success_code
            && outcome
                .transaction_status
                .as_deref()
                .map_or(true, |status| status == self.success_code);

        info!(
            txn_ref = %outcome.transaction_ref,
            response_code = %outcome.response_code,
            succeeded = outcome.succeeded,
            "callback verified"
        );
        outcome
    }

    /// Matches a verified outcome against the caller's pending payments and
    /// settles it at most once.
    pub async fn reconcile(
        &self,
        outcome: &CallbackOutcome,
        pending: &dyn PendingPayments,
    ) -> Reconciliation {
        if !outcome.is_valid {
            return Reconciliation::Rejected;
        }

        let Some(payment) = pending.lookup(&outcome.transaction_ref).await else {
            warn!(txn_ref = %outcome.transaction_ref, "callback for unknown reference");
            return Reconciliation::UnknownReference;
        };

        if outcome.amount != Some(payment.amount) {
            warn!(
                txn_ref = %outcome.transaction_ref,
                expected = payment.amount.minor_units(),
                received = ?outcome.amount.map(|a| a.minor_units()),
                "callback amount mismatch"
            );
            return Reconciliation::AmountMismatch {
                expected: payment.amount,
                received: outcome.amount,
            };
        }

        if payment.status != PaymentStatus::Pending {
            debug!(txn_ref = %outcome.transaction_ref, "callback for settled payment");
            return Reconciliation::AlreadyProcessed;
        }

        if !pending
            .mark_settled(&outcome.transaction_ref, outcome.succeeded)
            .await
        {
            return Reconciliation::AlreadyProcessed;
        }

        info!(
            txn_ref = %outcome.transaction_ref,
            claim_id = %payment.claim_id,
            succeeded = outcome.succeeded,
            "payment settled"
        );
        Reconciliation::Settled {
            claim_id: payment.claim_id,
            succeeded: outcome.succeeded,
        }
    }
}

// ---------------------------------------------------------------------------
// Pending payments
// ---------------------------------------------------------------------------

/// Settlement state of an outbound payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
}

/// What the caller recorded when it sent the user to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub transaction_ref: TransactionRef,
    pub claim_id: String,
    pub amount: Amount,
    pub status: PaymentStatus,
}

/// The caller's store of outstanding payment references.
#[async_trait]
pub trait PendingPayments: Send + Sync {
    async fn lookup(&self, transaction_ref: &TransactionRef) -> Option<PendingPayment>;

    /// Moves a pending payment to its final status. Returns `false` if the
    /// payment is unknown or no longer pending, so concurrent duplicate
    /// callbacks settle it exactly once.
    async fn mark_settled(&self, transaction_ref: &TransactionRef, succeeded: bool) -> bool;
}

/// `DashMap`-backed [`PendingPayments`] for tests and single-process use.
#[derive(Debug, Default)]
pub struct InMemoryPendingPayments {
    entries: DashMap<TransactionRef, PendingPayment>,
}

impl InMemoryPendingPayments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, transaction_ref: TransactionRef, claim_id: impl Into<String>, amount: Amount) {
        self.entries.insert(
            transaction_ref.clone(),
            PendingPayment {
                transaction_ref,
                claim_id: claim_id.into(),
                amount,
                status: PaymentStatus::Pending,
            },
        );
    }

    pub fn status(&self, transaction_ref: &TransactionRef) -> Option<PaymentStatus> {
        self.entries.get(transaction_ref).map(|e| e.status)
    }
}

#[async_trait]
impl PendingPayments for InMemoryPendingPayments {
    async fn lookup(&self, transaction_ref: &TransactionRef) -> Option<PendingPayment> {
        self.entries.get(transaction_ref).map(|e| e.value().clone())
    }

    async fn mark_settled(&self, transaction_ref: &TransactionRef, succeeded: bool) -> bool {
        match self.entries.get_mut(transaction_ref) {
            Some(mut entry) if entry.status == PaymentStatus::Pending => {
                entry.status = if succeeded {
                    PaymentStatus::Succeeded
                } else {
                    PaymentStatus::Failed
                };
                true
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciliation & IPN acknowledgement
// ---------------------------------------------------------------------------

/// Result of matching a callback against pending payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Reconciliation {
    /// Signature invalid; nothing was looked up.
    Rejected,
    UnknownReference,
    AmountMismatch {
        expected: Amount,
        received: Option<Amount>,
    },
    AlreadyProcessed,
    Settled { claim_id: String, succeeded: bool },
}

/// The JSON body the gateway expects in reply to an IPN call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpnAcknowledgement {
    #[serde(rename = "RspCode")]
    pub rsp_code: String,
    #[serde(rename = "Message")]
    pub message: String,
}

impl IpnAcknowledgement {
    fn new(code: &str, message: &str) -> Self {
        Self {
            rsp_code: code.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<&Reconciliation> for IpnAcknowledgement {
    fn from(r: &Reconciliation) -> Self {
        match r {
            Reconciliation::Rejected => Self::new("97", "Invalid signature"),
            Reconciliation::UnknownReference => Self::new("01", "Order not found"),
            Reconciliation::AmountMismatch { .. } => Self::new("04", "Invalid amount"),
            Reconciliation::AlreadyProcessed => Self::new("02", "Order already confirmed"),
            Reconciliation::Settled { .. } => Self::new("00", "Confirm Success"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
