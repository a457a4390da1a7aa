// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ClaimPay CLI
//!
//! Entry point for the `claimpay` binary. Parses arguments, initializes
//! logging, loads configuration, and runs one subcommand:
//!
//! - `pay`: build a signed payment redirect
//! - `verify-callback`: verify a gateway callback query string
//! - `sign`: print canonical text and signature for a query
//! - `otp-selftest`: issue and validate a code in-process
//! - `check-config`: validate and print the configuration
//! - `version`: print version information

mod cli;
mod config;
mod logging;

use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;

use claimpay_protocol::config::{AuthConfig, GATEWAY_VERSION};
use claimpay_protocol::gateway::{
    Amount, CallbackVerifier, IpnAcknowledgement, ParameterSet, PaymentRequest,
    PaymentRequestBuilder, Reconciliation, SignatureEngine,
};
use claimpay_protocol::otp::{MemoryMailer, OtpLifecycleManager, OtpPurpose, OtpStore};

use cli::{ClaimPayCli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ClaimPayCli::parse();
    logging::init_logging(&cli.global.log_level, cli.global.log_format);

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    let config = config::load(&cli.global)?;

    match cli.command {
        Commands::Pay(args) => pay(&config, args),
        Commands::VerifyCallback(args) => verify_callback(&config, args),
        Commands::Sign(args) => sign(&config, args),
        Commands::OtpSelftest(args) => otp_selftest(&config, args).await,
        Commands::CheckConfig => check_config(&config),
        Commands::Version => Ok(()),
    }
}

/// Builds a redirect and prints it as JSON.
fn pay(config: &AuthConfig, args: cli::PayArgs) -> Result<()> {
    let builder = PaymentRequestBuilder::new(config.gateway.clone())
        .context("failed to initialize payment builder")?;
    let amount = Amount::parse(&args.amount).context("invalid --amount")?;

    let mut request = PaymentRequest::new(
        args.claim_id,
        amount,
        args.claim_type,
        args.return_url,
        args.client_ip,
    );
    request.bank_code = args.bank_code;
    request.locale = args.locale;

    let redirect = builder.build(&request).context("failed to build payment request")?;
    print_json(&json!({
        "redirect_url": redirect.redirect_url,
        "transaction_ref": redirect.transaction_ref,
        "amount_minor": amount.minor_units(),
        "created_at": redirect.created_at,
        "expires_at": redirect.expires_at,
    }))
}

/// Verifies a callback. Exits non-zero when the signature does not verify.
fn verify_callback(config: &AuthConfig, args: cli::VerifyCallbackArgs) -> Result<()> {
    let query = read_query(&args.query)?;
    let verifier =
        CallbackVerifier::new(&config.gateway).context("failed to initialize callback verifier")?;
    let outcome = verifier.verify_query(&query);

    // Without a pending-payment store the best this tool can say is whether
    // the signature holds.
    let ack = if outcome.is_valid {
        IpnAcknowledgement {
            rsp_code: "00".into(),
            message: "Signature valid".into(),
        }
    } else {
        IpnAcknowledgement::from(&Reconciliation::Rejected)
    };

    print_json(&json!({
        "is_valid": outcome.is_valid,
        "succeeded": outcome.is_success(),
        "response_code": outcome.response_code,
        "transaction_ref": outcome.transaction_ref,
        "transaction_status": outcome.transaction_status,
        "amount_minor": outcome.amount.map(|a| a.minor_units()),
        "gateway_transaction_no": outcome.gateway_transaction_no,
        "bank_code": outcome.bank_code,
        "pay_date": outcome.pay_date,
        "rejection": outcome.rejection,
        "ack": ack,
    }))?;

    if !outcome.is_valid {
        bail!("callback signature did not verify");
    }
    Ok(())
}

fn sign(config: &AuthConfig, args: cli::SignArgs) -> Result<()> {
    let params = ParameterSet::from_query(&read_query(&args.query)?).context("invalid query")?;
    let engine = SignatureEngine::new(&config.gateway).context("failed to initialize signer")?;
    let signed = engine.sign_parameters(params).context("failed to sign parameters")?;
    print_json(&json!({
        "canonical_text": signed.canonical_text,
        "signature": signed.signature,
        "query": signed.query_string(),
    }))
}

/// Issues a code to an in-memory mailbox and validates it, reporting each
/// step. Exercises the configured length, TTL and attempt budget.
async fn otp_selftest(config: &AuthConfig, args: cli::OtpSelftestArgs) -> Result<()> {
    let mailer = Arc::new(MemoryMailer::new());
    let manager = OtpLifecycleManager::with_system_clock(
        config.otp.clone(),
        Arc::new(OtpStore::new()),
        mailer.clone(),
    )
    .context("invalid otp configuration")?;

    let receipt = manager
        .issue(&args.identity, OtpPurpose::EmailVerify)
        .await
        .context("failed to issue code")?;
    let code = mailer
        .last_code_for(&receipt.identity)
        .context("mailer received no code")?;

    let wrong = manager
        .validate(&receipt.identity, OtpPurpose::EmailVerify, "not-a-code")
        .err()
        .map(|e| e.to_string());
    manager
        .validate(&receipt.identity, OtpPurpose::EmailVerify, &code)
        .context("issued code did not validate")?;
    let replay = manager
        .validate(&receipt.identity, OtpPurpose::EmailVerify, &code)
        .err()
        .map(|e| e.to_string());

    print_json(&json!({
        "identity": receipt.identity,
        "expires_at": receipt.expires_at,
        "attempts_allowed": receipt.attempts_allowed,
        "code_length": code.len(),
        "wrong_code": wrong,
        "correct_code": "accepted",
        "replay": replay,
    }))
}

fn check_config(config: &AuthConfig) -> Result<()> {
    let mut redacted = config.clone();
    redacted.gateway.hash_secret = "<redacted>".into();
    print_json(&redacted)
}

/// `-` means stdin; a leading `?` is tolerated either way.
fn read_query(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read query from stdin")?;
        Ok(buf.trim().to_string())
    } else {
        Ok(arg.trim().to_string())
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn print_version() {
    println!("claimpay {}", env!("CARGO_PKG_VERSION"));
    println!("gateway  {}", GATEWAY_VERSION);
}
