//! Canonical text: the exact byte string that gets signed.
//!
//! The rules, in order:
//!
//! 1. Drop `vnp_SecureHash` if present.
//! 2. Walk keys in ascending byte order (free with [`ParameterSet`]).
//! 3. Encode each value as `application/x-www-form-urlencoded`:
//!    `[A-Za-z0-9*-._]` pass through, space becomes `+`, every other byte of
//!    the UTF-8 encoding becomes `%XX` with uppercase hex.
//! 4. Join as `k1=v1&k2=v2`, no trailing separator.
//!
//! The outbound builder, the redirect query string, and the callback
//! verifier all go through [`canonicalize`] and [`encode_value`]. There is
//! no second encoder anywhere in the crate, so build and verify cannot
//! drift apart.

use url::form_urlencoded;

use super::error::GatewayError;
use super::params::{validate_key, ParameterSet};
use crate::config::PARAM_SECURE_HASH;

/// Encodes one parameter value with the protocol's fixed encoding.
pub fn encode_value(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Renders a parameter set as canonical text.
///
/// Fails with [`GatewayError::Encoding`] only if a key falls outside the
/// allowed alphabet. `ParameterSet` already enforces that on insert.
pub fn canonicalize(params: &ParameterSet) -> Result<String, GatewayError> {
    let mut out = String::with_capacity(params.len() * 32);

    for (key, value) in params.iter().filter(|(k, _)| *k != PARAM_SECURE_HASH) {
        validate_key(key)?;
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(key);
        out.push('=');
        out.push_str(&encode_value(value));
    }

    Ok(out)
}
