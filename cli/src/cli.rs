//! # CLI Interface
//!
//! `clap` derive definitions for the `claimpay` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::logging::LogFormat;

/// ClaimPay gateway tooling.
///
/// Builds signed payment redirects, verifies gateway callbacks, and
/// exercises the OTP lifecycle against the configured settings.
#[derive(Parser, Debug)]
#[command(name = "claimpay", version, propagate_version = true)]
pub struct ClaimPayCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// JSON configuration file. Defaults apply for anything it omits.
    #[arg(long, short = 'c', env = "CLAIMPAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Shared HMAC secret. Overrides the file.
    #[arg(long, env = "CLAIMPAY_HASH_SECRET", hide_env_values = true, global = true)]
    pub hash_secret: Option<String>,

    /// Merchant terminal code. Overrides the file.
    #[arg(long, env = "CLAIMPAY_TMN_CODE", global = true)]
    pub tmn_code: Option<String>,

    /// Gateway payment URL. Overrides the file.
    #[arg(long, global = true)]
    pub gateway_url: Option<String>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, default_value = "claimpay=info,claimpay_protocol=info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a signed payment redirect URL for a claim.
    Pay(PayArgs),
    /// Verify a callback query string and print the outcome.
    VerifyCallback(VerifyCallbackArgs),
    /// Print the canonical text and signature for a query string.
    Sign(SignArgs),
    /// Issue and validate a code in-process to check the OTP settings.
    OtpSelftest(OtpSelftestArgs),
    /// Validate the configuration and print it with the secret redacted.
    CheckConfig,
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct PayArgs {
    /// Claim identifier. Its first eight alphanumerics prefix the reference.
    #[arg(long)]
    pub claim_id: String,

    /// Amount in major units, e.g. `1250000` or `123.45`.
    #[arg(long)]
    pub amount: String,

    /// Claim category, used in the order description.
    #[arg(long, default_value = "expense")]
    pub claim_type: String,

    #[arg(long)]
    pub return_url: String,

    #[arg(long, default_value = "127.0.0.1")]
    pub client_ip: String,

    /// Preselect a bank on the gateway page.
    #[arg(long)]
    pub bank_code: Option<String>,

    /// Gateway page language, e.g. `vn` or `en`.
    #[arg(long)]
    pub locale: Option<String>,
}

#[derive(Args, Debug)]
pub struct VerifyCallbackArgs {
    /// The raw query string, with or without the leading `?`. Use `-` to
    /// read it from stdin.
    pub query: String,
}

#[derive(Args, Debug)]
pub struct SignArgs {
    /// `k=v&k=v` parameters to sign. Any `vnp_SecureHash` is ignored.
    pub query: String,
}

#[derive(Args, Debug)]
pub struct OtpSelftestArgs {
    /// Identity to issue the code to.
    #[arg(long, default_value = "selftest@claimpay.local")]
    pub identity: String,
}
