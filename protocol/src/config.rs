//! # Protocol Configuration & Constants
//!
//! Every magic string the payment gateway expects lives here, next to the
//! deployment knobs (secret, timezone, OTP budget) that the process loads at
//! startup. If you're hardcoding `"vnp_Amount"` somewhere else, you're doing
//! it wrong and the gateway will tell you so with a `97`.
//!
//! The `vnp_*` names are part of the wire contract. Renaming one is not a
//! refactor, it's an outage.

use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Gateway Wire Parameters
// ---------------------------------------------------------------------------

/// Protocol version spoken to the gateway.
pub const GATEWAY_VERSION: &str = "2.1.0";

/// Command for a standard pay-redirect.
pub const GATEWAY_COMMAND_PAY: &str = "pay";

/// Currency code. The gateway only settles in VND.
pub const GATEWAY_CURRENCY: &str = "VND";

/// Default checkout page locale.
pub const GATEWAY_LOCALE: &str = "vn";

/// Response code the gateway uses for "the money moved".
pub const GATEWAY_SUCCESS_CODE: &str = "00";

/// Sandbox checkout endpoint. Production deployments override this.
pub const GATEWAY_SANDBOX_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";

/// Timestamp layout for `vnp_CreateDate` / `vnp_ExpireDate` / `vnp_PayDate`.
pub const GATEWAY_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Longest checkout window the config accepts, in minutes (one week).
pub const GATEWAY_MAX_PAYMENT_EXPIRY_MINUTES: i64 = 7 * 24 * 60;

pub const PARAM_VERSION: &str = "vnp_Version";
pub const PARAM_COMMAND: &str = "vnp_Command";
pub const PARAM_TMN_CODE: &str = "vnp_TmnCode";
pub const PARAM_AMOUNT: &str = "vnp_Amount";
pub const PARAM_CURR_CODE: &str = "vnp_CurrCode";
pub const PARAM_TXN_REF: &str = "vnp_TxnRef";
pub const PARAM_ORDER_INFO: &str = "vnp_OrderInfo";
pub const PARAM_ORDER_TYPE: &str = "vnp_OrderType";
pub const PARAM_LOCALE: &str = "vnp_Locale";
pub const PARAM_RETURN_URL: &str = "vnp_ReturnUrl";
pub const PARAM_IP_ADDR: &str = "vnp_IpAddr";
pub const PARAM_CREATE_DATE: &str = "vnp_CreateDate";
pub const PARAM_EXPIRE_DATE: &str = "vnp_ExpireDate";
pub const PARAM_BANK_CODE: &str = "vnp_BankCode";
pub const PARAM_RESPONSE_CODE: &str = "vnp_ResponseCode";
pub const PARAM_TRANSACTION_STATUS: &str = "vnp_TransactionStatus";
pub const PARAM_TRANSACTION_NO: &str = "vnp_TransactionNo";
pub const PARAM_PAY_DATE: &str = "vnp_PayDate";

/// The signature parameter. Excluded from canonical text, appended last on
/// the wire, and the only thing stripped from a callback before re-signing.
pub const PARAM_SECURE_HASH: &str = "vnp_SecureHash";

/// The gateway multiplies every amount by 100 before it hits the wire.
pub const AMOUNT_MINOR_FACTOR: u64 = 100;

/// Maximum length of `vnp_TxnRef` accepted by the gateway.
pub const MAX_TXN_REF_LENGTH: usize = 100;

/// How many characters of the claim id lead the transaction reference.
pub const TXN_REF_CLAIM_PREFIX_LEN: usize = 8;

// ---------------------------------------------------------------------------
// OTP Parameters
// ---------------------------------------------------------------------------

/// Six digits: one in a million per guess, and the attempt budget makes sure
/// nobody gets a million guesses.
pub const OTP_DEFAULT_LENGTH: usize = 6;

/// Short enough that a leaked inbox screenshot is useless by lunch.
pub const OTP_DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Longest TTL the config accepts.
pub const OTP_MAX_TTL_SECS: u64 = 24 * 60 * 60;

/// Wrong guesses allowed before the record locks.
pub const OTP_DEFAULT_ATTEMPTS: u32 = 5;

/// Upper bound on how long `issue` waits for the mail collaborator.
pub const OTP_DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Random salt mixed into every stored code hash.
pub const OTP_SALT_LENGTH: usize = 16;

/// Minimum length of a new credential in a password change.
pub const PASSWORD_MIN_LENGTH: usize = 8;

// ---------------------------------------------------------------------------
// Configuration Errors
// ---------------------------------------------------------------------------

/// Deployment defects found while validating configuration.
///
/// These are fatal at startup. A missing secret is not user input; it is a
/// broken deploy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is absent or empty.
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),

    /// A value is present but outside its legal range.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// GatewayConfig
// ---------------------------------------------------------------------------

/// Everything the payment builder and callback verifier need to know about
/// the merchant's gateway account.
///
/// Shared read-only across every request; construct once at startup and pass
/// by reference (or `Arc`).
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Checkout endpoint the redirect URL points at.
    pub base_url: String,
    pub version: String,
    pub command: String,
    /// Merchant terminal code assigned by the gateway.
    pub tmn_code: String,
    /// Shared HMAC secret. Never logged, never embedded in a signed request.
    pub hash_secret: String,
    pub currency: String,
    pub locale: String,
    pub success_code: String,
    /// Deployment timezone as minutes east of UTC (420 = GMT+7).
    pub timezone_offset_minutes: i32,
    /// How long the checkout page stays valid, in minutes.
    pub payment_expiry_minutes: i64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: GATEWAY_SANDBOX_URL.to_string(),
            version: GATEWAY_VERSION.to_string(),
            command: GATEWAY_COMMAND_PAY.to_string(),
            tmn_code: String::new(),
            hash_secret: String::new(),
            currency: GATEWAY_CURRENCY.to_string(),
            locale: GATEWAY_LOCALE.to_string(),
            success_code: GATEWAY_SUCCESS_CODE.to_string(),
            timezone_offset_minutes: 7 * 60,
            payment_expiry_minutes: 15,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("version", &self.version)
            .field("command", &self.command)
            .field("tmn_code", &self.tmn_code)
            .field("hash_secret", &"<redacted>")
            .field("currency", &self.currency)
            .field("locale", &self.locale)
            .field("success_code", &self.success_code)
            .field("timezone_offset_minutes", &self.timezone_offset_minutes)
            .field("payment_expiry_minutes", &self.payment_expiry_minutes)
            .finish()
    }
}

impl GatewayConfig {
    /// Convenience constructor for the two values that have no default.
    pub fn new(tmn_code: impl Into<String>, hash_secret: impl Into<String>) -> Self {
        Self {
            tmn_code: tmn_code.into(),
            hash_secret: hash_secret.into(),
            ..Self::default()
        }
    }

    /// Rejects configurations that would produce unsigned or unroutable requests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hash_secret.is_empty() {
            return Err(ConfigError::Missing("gateway.hash_secret"));
        }
        if self.tmn_code.is_empty() {
            return Err(ConfigError::Missing("gateway.tmn_code"));
        }
        if self.base_url.is_empty() {
            return Err(ConfigError::Missing("gateway.base_url"));
        }
        if self.success_code.is_empty() {
            return Err(ConfigError::Missing("gateway.success_code"));
        }
        self.timezone()?;
        if !(1..=GATEWAY_MAX_PAYMENT_EXPIRY_MINUTES).contains(&self.payment_expiry_minutes) {
            return Err(ConfigError::Invalid {
                field: "gateway.payment_expiry_minutes",
                reason: format!(
                    "must be between 1 and {GATEWAY_MAX_PAYMENT_EXPIRY_MINUTES}, got {}",
                    self.payment_expiry_minutes
                ),
            });
        }
        Ok(())
    }

    /// The deployment timezone used for every gateway timestamp.
    pub fn timezone(&self) -> Result<FixedOffset, ConfigError> {
        self.timezone_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::Invalid {
                    field: "gateway.timezone_offset_minutes",
                    reason: format!("{} is not a valid UTC offset", self.timezone_offset_minutes),
                }
            })
    }
}

// ---------------------------------------------------------------------------
// OtpConfig
// ---------------------------------------------------------------------------

/// Knobs for the OTP lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OtpConfig {
    pub code_length: usize,
    pub ttl_secs: u64,
    pub max_attempts: u32,
    pub delivery_timeout_secs: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: OTP_DEFAULT_LENGTH,
            ttl_secs: OTP_DEFAULT_TTL.as_secs(),
            max_attempts: OTP_DEFAULT_ATTEMPTS,
            delivery_timeout_secs: OTP_DEFAULT_DELIVERY_TIMEOUT.as_secs(),
        }
    }
}

impl OtpConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Four digits is already generous to an attacker; nine keeps the
        // numeric space inside a u32.
        if !(4..=9).contains(&self.code_length) {
            return Err(ConfigError::Invalid {
                field: "otp.code_length",
                reason: format!("must be between 4 and 9, got {}", self.code_length),
            });
        }
        if self.ttl_secs == 0 || self.ttl_secs > OTP_MAX_TTL_SECS {
            return Err(ConfigError::Invalid {
                field: "otp.ttl_secs",
                reason: format!("must be between 1 and {OTP_MAX_TTL_SECS}"),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "otp.max_attempts",
                reason: "must be positive".to_string(),
            });
        }
        if self.delivery_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "otp.delivery_timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PasswordPolicy
// ---------------------------------------------------------------------------

/// Rules a new credential must satisfy before an OTP is spent on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: PASSWORD_MIN_LENGTH,
        }
    }
}

// ---------------------------------------------------------------------------
// AuthConfig
// ---------------------------------------------------------------------------

/// The whole configuration surface, as loaded from disk by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    pub gateway: GatewayConfig,
    pub otp: OtpConfig,
    pub password: PasswordPolicy,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gateway.validate()?;
        self.otp.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_config_needs_secret() {
        let cfg = GatewayConfig::default();
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::Missing("gateway.hash_secret"))
        );
    }

    #[test]
    fn gateway_config_needs_terminal_code() {
        let cfg = GatewayConfig::new("", "secret");
        assert_eq!(cfg.validate(), Err(ConfigError::Missing("gateway.tmn_code")));
    }

    #[test]
    fn populated_gateway_config_validates() {
        let cfg = GatewayConfig::new("CLAIMPAY", "SECRETKEY");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.version, GATEWAY_VERSION);
        assert_eq!(cfg.success_code, GATEWAY_SUCCESS_CODE);
    }

    #[test]
    fn timezone_defaults_to_gmt_plus_seven() {
        let cfg = GatewayConfig::new("T", "S");
        assert_eq!(cfg.timezone().unwrap().local_minus_utc(), 7 * 3600);
    }

    #[test]
    fn absurd_timezone_rejected() {
        let mut cfg = GatewayConfig::new("T", "S");
        cfg.timezone_offset_minutes = 24 * 60;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "gateway.timezone_offset_minutes", .. })
        ));
    }

    #[test]
    fn overflowing_timezone_is_an_error_not_a_panic() {
        for minutes in [i32::MAX, i32::MIN, i32::MAX / 60 + 1] {
            let mut cfg = GatewayConfig::new("T", "S");
            cfg.timezone_offset_minutes = minutes;
            assert!(
                matches!(
                    cfg.validate(),
                    Err(ConfigError::Invalid { field: "gateway.timezone_offset_minutes", .. })
                ),
                "{minutes}"
            );
        }
    }

    #[test]
    fn debug_output_redacts_secret() {
        let cfg = GatewayConfig::new("T", "super-secret-value");
        let dbg = format!("{:?}", cfg);
        assert!(!dbg.contains("super-secret-value"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn otp_defaults_are_sane() {
        let cfg = OtpConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.code_length, 6);
        assert_eq!(cfg.ttl(), Duration::from_secs(300));
        assert!(cfg.max_attempts >= 3 && cfg.max_attempts <= 5);
    }

    #[test]
    fn otp_ttl_is_bounded() {
        for ttl_secs in [0, OTP_MAX_TTL_SECS + 1] {
            let cfg = OtpConfig {
                ttl_secs,
                ..OtpConfig::default()
            };
            assert!(cfg.validate().is_err(), "{ttl_secs}");
        }
    }

    #[test]
    fn otp_zero_attempts_rejected() {
        let cfg = OtpConfig {
            max_attempts: 0,
            ..OtpConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn auth_config_deserializes_with_defaults() {
        let json = r#"{ "gateway": { "tmn_code": "ABC", "hash_secret": "XYZ" } }"#;
        let cfg: AuthConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.gateway.locale, "vn");
        assert_eq!(cfg.otp.max_attempts, OTP_DEFAULT_ATTEMPTS);
        assert_eq!(cfg.password.min_length, PASSWORD_MIN_LENGTH);
    }
}
