//! # Payment Gateway Integration
//!
//! Outbound payment requests and inbound callbacks for a VNPay-style
//! gateway. Both directions share one parameter model and one canonical
//! encoding:
//!
//! ```text
//!  PaymentRequest ──► PaymentRequestBuilder ──► ParameterSet ──► canonicalize ──► HMAC-SHA512
//!                                                                      ▲
//!  callback query ──► ParameterSet::from_query ──► CallbackVerifier ───┘
//! ```
//!
//! - [`params`]: the key/value map and query-string parsing.
//! - [`canonical`]: the byte string that gets signed.
//! - [`signing`]: the signature engine.
//! - [`types`]: `Amount`, `OrderType`, `TransactionRef`.
//! - [`builder`]: signed redirect URLs for outbound payments.
//! - [`callback`]: return-URL and IPN verification plus reconciliation.

pub mod builder;
pub mod callback;
pub mod canonical;
pub mod error;
pub mod params;
pub mod signing;
pub mod types;

pub use builder::{PaymentRedirect, PaymentRequest, PaymentRequestBuilder};
pub use callback::{
    CallbackOutcome, CallbackRejection, CallbackVerifier, InMemoryPendingPayments,
    IpnAcknowledgement, PaymentStatus, PendingPayment, PendingPayments, Reconciliation,
};
pub use canonical::{canonicalize, encode_value};
pub use error::GatewayError;
pub use params::ParameterSet;
pub use signing::{sign, verify, SignatureEngine, SignedRequest};
pub use types::{Amount, OrderType, TransactionRef, TxnRefGenerator};
