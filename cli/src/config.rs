//! Configuration loading: JSON file, then flag/env overrides, then
//! validation. A missing secret is fatal here rather than at first use.

use std::path::Path;

use anyhow::{Context, Result};
use claimpay_protocol::config::AuthConfig;

use crate::cli::GlobalArgs;

pub fn load(args: &GlobalArgs) -> Result<AuthConfig> {
    let mut config = match &args.config {
        Some(path) => read_file(path)?,
        None => AuthConfig::default(),
    };

    if let Some(secret) = &args.hash_secret {
        config.gateway.hash_secret = secret.clone();
    }
    if let Some(tmn) = &args.tmn_code {
        config.gateway.tmn_code = tmn.clone();
    }
    if let Some(url) = &args.gateway_url {
        config.gateway.base_url = url.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<AuthConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}
