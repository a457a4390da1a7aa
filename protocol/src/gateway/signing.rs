//! Signature engine: HMAC-SHA512 over canonical text.
//!
//! Stateless apart from the read-only secret, so one engine can be shared
//! across every request thread. Signatures are never cached.

use serde::Serialize;

use super::canonical::canonicalize;
use super::error::GatewayError;
use super::params::ParameterSet;
use crate::config::{ConfigError, GatewayConfig};
use crate::crypto::mac::{hmac_sha512_hex, verify_hmac_sha512_hex};

/// Signs `canonical_text` under `secret`, returning lowercase hex.
///
/// Fails only when the secret is empty, which is a provisioning defect.
pub fn sign(canonical_text: &str, secret: &str) -> Result<String, GatewayError> {
    if secret.is_empty() {
        return Err(ConfigError::Missing("gateway.hash_secret").into());
    }
    Ok(hmac_sha512_hex(secret.as_bytes(), canonical_text.as_bytes()))
}

/// Recomputes the signature and compares it in constant time.
///
/// An empty secret never verifies anything.
pub fn verify(canonical_text: &str, secret: &str, provided_signature_hex: &str) -> bool {
    !secret.is_empty()
        && verify_hmac_sha512_hex(
            secret.as_bytes(),
            canonical_text.as_bytes(),
            provided_signature_hex,
        )
}

/// A parameter set together with its canonical text and signature.
///
/// The secret that produced `signature` is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedRequest {
    pub canonical_text: String,
    /// Lowercase hex HMAC-SHA512 of `canonical_text`.
    pub signature: String,
    pub parameters: ParameterSet,
}

impl SignedRequest {
    /// The full wire query: canonical text followed by the signature.
    pub fn query_string(&self) -> String {
        format!(
            "{}&{}={}",
            self.canonical_text,
            crate::config::PARAM_SECURE_HASH,
            self.signature
        )
    }
}

/// Holds the shared secret and signs or verifies parameter sets.
#[derive(Clone)]
pub struct SignatureEngine {
    secret: String,
}

impl std::fmt::Debug for SignatureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureEngine")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl SignatureEngine {
    /// Builds an engine from the gateway configuration.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Self::with_secret(config.hash_secret.clone())
    }

    pub fn with_secret(secret: impl Into<String>) -> Result<Self, GatewayError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(ConfigError::Missing("gateway.hash_secret").into());
        }
        Ok(Self { secret })
    }

    /// Signs raw canonical text.
    pub fn sign_text(&self, canonical_text: &str) -> String {
        hmac_sha512_hex(self.secret.as_bytes(), canonical_text.as_bytes())
    }

    /// Verifies a hex signature over raw canonical text.
    pub fn verify_text(&self, canonical_text: &str, provided_signature_hex: &str) -> bool {
        verify(canonical_text, &self.secret, provided_signature_hex)
    }

    /// Canonicalizes and signs a parameter set.
    ///
    /// Any `vnp_SecureHash` already present is ignored by the canonical text
    /// and dropped from the returned parameters.
    pub fn sign_parameters(&self, mut parameters: ParameterSet) -> Result<SignedRequest, GatewayError> {
        parameters.remove(crate::config::PARAM_SECURE_HASH);
        let canonical_text = canonicalize(&parameters)?;
        let signature = self.sign_text(&canonical_text);
        Ok(SignedRequest {
            canonical_text,
            signature,
            parameters,
        })
    }
}
