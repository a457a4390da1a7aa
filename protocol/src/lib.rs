// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ClaimPay Protocol Core Library
//!
//! The security-sensitive half of a claim-reimbursement backend: paying
//! approved claims through an external payment gateway, and making sure
//! nobody changes an account password without proving they own the inbox.
//!
//! Both halves come down to producing or checking a tamper-evident token
//! under a secret, with canonicalization rules strict enough that two
//! honest parties always agree on the bytes.
//!
//! ## Architecture
//!
//! - **config**: Wire constants and the configuration surface.
//! - **crypto**: HMAC-SHA512 and SHA-256 wrappers. Don't roll your own.
//! - **gateway**: Canonical signing, payment redirects, callback verification.
//! - **otp**: Issue, deliver, validate, and lock out one-time codes.
//! - **account**: Password change gated by an OTP.
//!
//! ## Ground rules
//!
//! 1. A forged callback is traffic, not an exception. Verification returns
//!    an outcome, never an `Err`.
//! 2. Plaintext codes and shared secrets never reach a log line or a
//!    `Debug` impl.
//! 3. Every comparison against a secret-derived value is constant-time.
//! 4. If it touches money or credentials, it has tests. Plural.

pub mod account;
pub mod config;
pub mod crypto;
pub mod gateway;
pub mod otp;
