//! Value types for gateway requests.
//!
//! Small and strict. An [`Amount`] can only be built from an exact decimal,
//! and a [`TransactionRef`] can only come out of a [`TxnRefGenerator`] or
//! from a callback echo.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, TimeZone};
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::GatewayError;
use crate::config::{AMOUNT_MINOR_FACTOR, MAX_TXN_REF_LENGTH, TXN_REF_CLAIM_PREFIX_LEN};

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A payment amount in gateway minor units (major × 100).
///
/// Never constructed from arithmetic on floats. `123.45` becomes `12345`
/// because the digits are read as a decimal string, not because `123.45 * 100.0`
/// happened to round the right way this time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Amount {
    minor: u64,
}

impl Amount {
    /// Wraps an already-converted minor-unit value. Zero is rejected.
    pub fn from_minor(minor: u64) -> Result<Self, GatewayError> {
        if minor == 0 {
            return Err(GatewayError::invalid_amount("0", "amount must be positive"));
        }
        Ok(Self { minor })
    }

    /// Parses a decimal major-unit amount exactly.
    ///
    /// Rules:
    /// - digits with an optional single `.` and at least one digit on each side;
    /// - at most two significant fractional digits (`1.500` is fine,
    ///   `1.505` is rejected, never rounded or truncated);
    /// - strictly positive and within `u64` minor units.
    pub fn parse(input: &str) -> Result<Self, GatewayError> {
        let trimmed = input.trim();
        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(GatewayError::invalid_amount(input, "expected a plain decimal number"));
        }
        if trimmed.contains('.') && frac.is_empty() {
            return Err(GatewayError::invalid_amount(input, "missing fractional digits"));
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(GatewayError::invalid_amount(input, "expected a plain decimal number"));
        }
        if frac.len() > 2 && frac[2..].bytes().any(|b| b != b'0') {
            return Err(GatewayError::invalid_amount(
                input,
                "fractional minor units are not representable",
            ));
        }

        let cents_digits: String = frac.chars().chain(std::iter::repeat('0')).take(2).collect();
        let cents: u64 = cents_digits
            .parse()
            .map_err(|_| GatewayError::invalid_amount(input, "bad fractional part"))?;
        let whole: u64 = whole
            .parse()
            .map_err(|_| GatewayError::invalid_amount(input, "amount too large"))?;

        let minor = whole
            .checked_mul(AMOUNT_MINOR_FACTOR)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(|| GatewayError::invalid_amount(input, "amount too large"))?;

        if minor == 0 {
            return Err(GatewayError::invalid_amount(input, "amount must be positive"));
        }

        Ok(Self { minor })
    }

    /// Converts a float amount by way of its shortest round-trip decimal
    /// representation, then applies [`Amount::parse`].
    ///
    /// `123.45_f64` prints as `"123.45"` and converts to `12345`. A value
    /// like `0.1 + 0.2` prints as `0.30000000000000004` and is rejected.
    pub fn from_major_f64(value: f64) -> Result<Self, GatewayError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(GatewayError::invalid_amount(
                &value.to_string(),
                "amount must be a positive finite number",
            ));
        }
        Self::parse(&value.to_string())
    }

    pub fn minor_units(&self) -> u64 {
        self.minor
    }

    /// Major units with exactly two decimals, e.g. `"123.45"`.
    pub fn display_decimal(&self) -> String {
        format!(
            "{}.{:02}",
            self.minor / AMOUNT_MINOR_FACTOR,
            self.minor % AMOUNT_MINOR_FACTOR
        )
    }
}

impl TryFrom<u64> for Amount {
    type Error = GatewayError;

    fn try_from(minor: u64) -> Result<Self, Self::Error> {
        Self::from_minor(minor)
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.minor
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.minor)
    }
}

// ---------------------------------------------------------------------------
// OrderType
// ---------------------------------------------------------------------------

/// Gateway order category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    BillPayment,
    #[default]
    Other,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BillPayment => "billpayment",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TransactionRef
// ---------------------------------------------------------------------------

/// Correlates an outbound payment request with its callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRef(String);

impl TransactionRef {
    /// Wraps a reference echoed back by the gateway. No format is enforced
    /// here; callers look it up in their own pending store anyway.
    pub fn from_echo(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates transaction references.
///
/// Layout: `{claim prefix}{yyyyMMddHHmmssSSS}{seq:04}{rand:04X}`.
///
/// - the claim prefix is up to eight alphanumerics of the claim id, uppercased;
/// - the timestamp is rendered in the deployment timezone;
/// - `seq` is a per-generator counter modulo 10 000, so two requests for the
///   same claim in the same millisecond still differ;
/// - the random suffix separates generators in different processes.
#[derive(Debug, Default)]
pub struct TxnRefGenerator {
    sequence: AtomicU32,
}

impl TxnRefGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate<Tz>(&self, claim_id: &str, at: &DateTime<Tz>) -> Result<TransactionRef, GatewayError>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let prefix: String = claim_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(TXN_REF_CLAIM_PREFIX_LEN)
            .collect::<String>()
            .to_ascii_uppercase();

        if prefix.is_empty() {
            return Err(GatewayError::InvalidParameter {
                name: "claim_id",
                reason: "must contain at least one alphanumeric character".to_string(),
            });
        }

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) % 10_000;
        let salt: u16 = OsRng.gen();
        let reference = format!(
            "{}{}{:04}{:04X}",
            prefix,
            at.format("%Y%m%d%H%M%S%3f"),
            seq,
            salt
        );
        debug_assert!(reference.len() <= MAX_TXN_REF_LENGTH);

        Ok(TransactionRef(reference))
    }
}
