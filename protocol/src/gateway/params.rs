//! The parameter set exchanged with the gateway.
//!
//! A [`ParameterSet`] is a map from parameter name to value. Callers treat
//! it as unordered; the wire does not, which is why the backing store is a
//! `BTreeMap<String, _>`. `String`'s `Ord` is byte-wise, so iteration order
//! is already the ascending ordinal order the canonicalizer needs. Nobody
//! has to remember to sort.

use std::collections::BTreeMap;

use serde::Serialize;

use super::error::GatewayError;

/// Mapping from parameter name to value with unique, validated keys.
///
/// Keys are restricted to `[A-Za-z0-9_.-]` so they never need escaping and
/// can never smuggle a `=` or `&` into the canonical text. Values may hold
/// anything; the canonicalizer escapes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParameterSet {
    entries: BTreeMap<String, String>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a parameter, returning the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, GatewayError> {
        let key = key.into();
        validate_key(&key)?;
        Ok(self.entries.insert(key, value.into()))
    }

    /// Builds a set from pairs, rejecting invalid or repeated keys.
    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self, GatewayError>
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut set = Self::new();
        for (k, v) in pairs {
            let key = k.into();
            if set.entries.contains_key(&key) {
                return Err(GatewayError::encoding(format!("duplicate parameter {key:?}")));
            }
            set.insert(key, v)?;
        }
        Ok(set)
    }

    /// Parses an `application/x-www-form-urlencoded` query string, as the
    /// gateway delivers it on the return URL and IPN callback.
    ///
    /// A leading `?` is ignored, as are empty segments. Malformed escapes,
    /// invalid UTF-8 after decoding, and repeated keys are encoding errors.
    pub fn from_query(query: &str) -> Result<Self, GatewayError> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut set = Self::new();

        for segment in query.split('&').filter(|s| !s.is_empty()) {
            let (raw_key, raw_value) = segment.split_once('=').unwrap_or((segment, ""));
            let key = form_decode(raw_key)?;
            let value = form_decode(raw_value)?;
            if set.entries.contains_key(&key) {
                return Err(GatewayError::encoding(format!("duplicate parameter {key:?}")));
            }
            set.insert(key, value)?;
        }

        Ok(set)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates in ascending byte-wise key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Keys must be non-empty and drawn from `[A-Za-z0-9_.-]`.
pub(crate) fn validate_key(key: &str) -> Result<(), GatewayError> {
    if key.is_empty() {
        return Err(GatewayError::encoding("empty parameter name"));
    }
    if let Some(bad) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        return Err(GatewayError::encoding(format!(
            "parameter name {key:?} contains {bad:?}"
        )));
    }
    Ok(())
}

/// Decodes one form-urlencoded component: `+` is a space, `%XX` a byte.
fn form_decode(input: &str) -> Result<String, GatewayError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let escape = bytes
                    .get(i + 1..i + 3)
                    .ok_or_else(|| GatewayError::encoding(format!("truncated escape in {input:?}")))?;
                let decoded = hex::decode(escape).map_err(|_| {
                    GatewayError::encoding(format!("malformed escape in {input:?}"))
                })?;
                out.extend_from_slice(&decoded);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out)
        .map_err(|_| GatewayError::encoding(format!("{input:?} does not decode to UTF-8")))
}
