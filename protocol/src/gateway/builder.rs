//! Outbound payment requests via the builder pattern.
//!
//! [`PaymentRequestBuilder`] turns business data (which claim, how much,
//! where to send the user back) into a signed redirect URL. It owns the
//! gateway constants, the signature engine, and the transaction-reference
//! generator; it persists nothing. Mapping the returned
//! [`TransactionRef`] to the claim is the caller's job.

use std::net::IpAddr;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::GatewayError;
use super::params::ParameterSet;
use super::signing::{SignatureEngine, SignedRequest};
use super::types::{Amount, OrderType, TransactionRef, TxnRefGenerator};
use crate::config::{self, GatewayConfig};

// ---------------------------------------------------------------------------
// PaymentRequest
// ---------------------------------------------------------------------------

/// What the claim workflow asks the gateway to collect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub claim_id: String,
    pub amount: Amount,
    /// Free-text claim category, rendered into the order description.
    pub claim_type: String,
    /// Where the gateway sends the user (and the signed result) afterwards.
    pub return_url: String,
    pub client_ip: String,
    #[serde(default)]
    pub order_type: OrderType,
    /// Pre-selects a bank on the checkout page.
    #[serde(default)]
    pub bank_code: Option<String>,
    /// Overrides the configured checkout locale.
    #[serde(default)]
    pub locale: Option<String>,
}

impl PaymentRequest {
    pub fn new(
        claim_id: impl Into<String>,
        amount: Amount,
        claim_type: impl Into<String>,
        return_url: impl Into<String>,
        client_ip: impl Into<String>,
    ) -> Self {
        Self {
            claim_id: claim_id.into(),
            amount,
            claim_type: claim_type.into(),
            return_url: return_url.into(),
            client_ip: client_ip.into(),
            order_type: OrderType::default(),
            bank_code: None,
            locale: None,
        }
    }

    fn validate(&self) -> Result<(), GatewayError> {
        if self.amount.minor_units() == 0 {
            return Err(GatewayError::invalid_amount("0", "amount must be positive"));
        }
        if self.claim_id.trim().is_empty() {
            return Err(GatewayError::InvalidParameter {
                name: "claim_id",
                reason: "must not be empty".to_string(),
            });
        }
        if self.claim_type.trim().is_empty() {
            return Err(GatewayError::InvalidParameter {
                name: "claim_type",
                reason: "must not be empty".to_string(),
            });
        }
        let url = url::Url::parse(&self.return_url).map_err(|e| GatewayError::InvalidParameter {
            name: "return_url",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::InvalidParameter {
                name: "return_url",
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }
        self.client_ip
            .parse::<IpAddr>()
            .map_err(|e| GatewayError::InvalidParameter {
                name: "client_ip",
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn order_info(&self) -> String {
        format!(
            "Reimbursement {} claim {}",
            self.claim_type.trim(),
            self.claim_id.trim()
        )
    }
}

// ---------------------------------------------------------------------------
// PaymentRedirect
// ---------------------------------------------------------------------------

/// The builder's output: where to send the user, and how to recognise the
/// callback when it comes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRedirect {
    pub redirect_url: String,
    pub transaction_ref: TransactionRef,
    pub created_at: DateTime<FixedOffset>,
    pub expires_at: DateTime<FixedOffset>,
    pub signed: SignedRequest,
}

// ---------------------------------------------------------------------------
// PaymentRequestBuilder
// ---------------------------------------------------------------------------

/// Assembles and signs outbound gateway requests.
///
/// Safe to share between threads: the only mutable state is the atomic
/// sequence inside the reference generator.
#[derive(Debug)]
pub struct PaymentRequestBuilder {
    config: GatewayConfig,
    engine: SignatureEngine,
    timezone: FixedOffset,
    refs: TxnRefGenerator,
}

impl PaymentRequestBuilder {
    /// Validates the configuration once, up front. A missing secret fails
    /// here rather than on the first customer's checkout.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let engine = SignatureEngine::new(&config)?;
        let timezone = config.timezone()?;
        Ok(Self {
            config,
            engine,
            timezone,
            refs: TxnRefGenerator::new(),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Builds a redirect stamped with the current time.
    pub fn build(&self, request: &PaymentRequest) -> Result<PaymentRedirect, GatewayError> {
        self.build_at(request, Utc::now())
    }

    /// Builds a redirect stamped with `now`.
    ///
    /// The parameter set is:
    /// `vnp_Version`, `vnp_Command`, `vnp_TmnCode`, `vnp_Amount` (minor units),
    /// `vnp_CurrCode`, `vnp_TxnRef`, `vnp_OrderInfo`, `vnp_OrderType`,
    /// `vnp_Locale`, `vnp_ReturnUrl`, `vnp_IpAddr`, `vnp_CreateDate`,
    /// `vnp_ExpireDate`, and `vnp_BankCode` when requested.
    pub fn build_at(
        &self,
        request: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<PaymentRedirect, GatewayError> {
        request.validate()?;

        let created_at = now.with_timezone(&self.timezone);
        let expires_at = created_at + Duration::minutes(self.config.payment_expiry_minutes);
        let transaction_ref = self.refs.generate(&request.claim_id, &created_at)?;

        let mut params = ParameterSet::new();
        params.insert(config::PARAM_VERSION, self.config.version.as_str())?;
        params.insert(config::PARAM_COMMAND, self.config.command.as_str())?;
        params.insert(config::PARAM_TMN_CODE, self.config.tmn_code.as_str())?;
        params.insert(config::PARAM_AMOUNT, request.amount.minor_units().to_string())?;
        params.insert(config::PARAM_CURR_CODE, self.config.currency.as_str())?;
        params.insert(config::PARAM_TXN_REF, transaction_ref.as_str())?;
        params.insert(config::PARAM_ORDER_INFO, request.order_info())?;
        params.insert(config::PARAM_ORDER_TYPE, request.order_type.as_str())?;
        params.insert(
            config::PARAM_LOCALE,
            request.locale.as_deref().unwrap_or(&self.config.locale),
        )?;
        params.insert(config::PARAM_RETURN_URL, request.return_url.as_str())?;
        params.insert(config::PARAM_IP_ADDR, request.client_ip.as_str())?;
        params.insert(
            config::PARAM_CREATE_DATE,
            created_at.format(config::GATEWAY_DATE_FORMAT).to_string(),
        )?;
        params.insert(
            config::PARAM_EXPIRE_DATE,
            expires_at.format(config::GATEWAY_DATE_FORMAT).to_string(),
        )?;
        if let Some(bank) = request.bank_code.as_deref().filter(|b| !b.is_empty()) {
            params.insert(config::PARAM_BANK_CODE, bank)?;
        }

        let signed = self.engine.sign_parameters(params)?;
        let redirect_url = format!("{}?{}", self.config.base_url, signed.query_string());

        info!(
            txn_ref = %transaction_ref,
            claim_id = %request.claim_id,
            amount_minor = request.amount.minor_units(),
            "payment request signed"
        );

        Ok(PaymentRedirect {
            redirect_url,
            transaction_ref,
            created_at,
            expires_at,
            signed,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
