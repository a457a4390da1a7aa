//! Error types for the payment-gateway engines.
//!
//! Only the outbound path (building and signing) returns these. The inbound
//! callback path folds every failure into [`super::CallbackOutcome`] instead,
//! because a forged callback is expected traffic rather than a bug.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while building or signing gateway requests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// A key or value cannot be represented in the wire encoding.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The gateway configuration is unusable (missing secret, bad timezone).
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The amount cannot be converted exactly into minor units.
    #[error("invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: String },

    /// A business input failed validation before any signing happened.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl GatewayError {
    pub(crate) fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub(crate) fn invalid_amount(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
