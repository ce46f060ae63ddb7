// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Tool to inspect an enclave quote and verify it against the enclave registry

use anyhow::{Context, Result};
use clap::{Args, Parser};
use enclave_client::{
    attestation::{chain::parse_chain_pem, Evidence},
    config::AttestationConfig,
    log::{setup_logging, LogLevel},
    quote::Quote,
    registry::Environment,
};
use std::{
    fs,
    io::Read,
    path::PathBuf,
    str::FromStr,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(author = "Matter Labs", version, about = "Enclave quote inspector and verifier", long_about = None)]
struct Arguments {
    /// The raw quote, `-` reads it from stdin.
    #[clap(name = "quote_file", value_parser)]
    quote: ArgSource,
    /// Log level for the log output.
    #[clap(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
    #[command(flatten)]
    verify: VerifyArgs,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Configuration file with the trusted root and additional enclaves.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Use the built-in enclaves of this environment (`production` or `staging`).
    #[arg(long)]
    environment: Option<String>,
    /// Name of the enclave the quote claims to come from.
    #[arg(long, requires_all = ["cert_chain", "signature", "server_public_key"])]
    enclave: Option<String>,
    /// PEM certificate chain of the attestation signer, leaf first.
    #[arg(long)]
    cert_chain: Option<PathBuf>,
    /// File with the detached signature over the quote header.
    #[arg(long)]
    signature: Option<PathBuf>,
    /// Hex encoded server ephemeral public key the quote must bind.
    #[arg(long)]
    server_public_key: Option<String>,
    /// Time the attestation service vouched for the quote, in seconds since the epoch.
    #[arg(long)]
    attested_at: Option<u64>,
}

#[derive(Debug, Clone)]
enum ArgSource {
    File(PathBuf),
    Stdin,
}

impl FromStr for ArgSource {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-" => Ok(ArgSource::Stdin),
            _ => Ok(ArgSource::File(PathBuf::from(s))),
        }
    }
}

fn main() -> Result<()> {
    let args = Arguments::parse();
    setup_logging(env!("CARGO_CRATE_NAME"), &args.log_level.into())?;

    let quote_bytes = match args.quote {
        ArgSource::File(path) => fs::read(&path)
            .with_context(|| format!("Failed to read quote from {}", path.display()))?,
        ArgSource::Stdin => {
            let mut quote = Vec::new();
            std::io::stdin()
                .read_to_end(&mut quote)
                .context("Failed to read quote from stdin")?;
            quote
        }
    };
    println!("Parsing quote ({} bytes)...", quote_bytes.len());
    let quote = Quote::parse(&quote_bytes).context("Failed to parse quote")?;
    println!("{:#}", quote);
    println!("quote digest: {}", hex::encode(quote.digest()));

    if args.verify.enclave.is_some() {
        verify_quote(&quote, &args.verify)?;
    }
    Ok(())
}

fn verify_quote(quote: &Quote, args: &VerifyArgs) -> Result<()> {
    let mut config =
        AttestationConfig::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(environment) = &args.environment {
        config.environment = match environment.to_ascii_lowercase().as_str() {
            "production" => Environment::Production,
            "staging" => Environment::Staging,
            other => anyhow::bail!("Unknown environment `{other}`"),
        };
    }
    let registry = config.registry()?;
    let validator = config.validator()?;

    // clap guarantees the companions of `--enclave`
    let (Some(name), Some(chain_path), Some(signature_path), Some(server_key)) = (
        &args.enclave,
        &args.cert_chain,
        &args.signature,
        &args.server_public_key,
    ) else {
        anyhow::bail!("--enclave requires --cert-chain, --signature and --server-public-key");
    };

    let descriptor = registry.lookup(name)?;
    let chain_pem = fs::read(chain_path)
        .with_context(|| format!("Failed to read {}", chain_path.display()))?;
    let cert_chain = parse_chain_pem(chain_pem)?;
    let signature = fs::read(signature_path)
        .with_context(|| format!("Failed to read {}", signature_path.display()))?;
    let server_key = hex::decode(server_key).context("Invalid --server-public-key")?;
    debug!(certificates = cert_chain.len(), "loaded evidence");

    let evidence = Evidence {
        cert_chain: &cert_chain,
        signature: &signature,
        attested_at: args
            .attested_at
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
    };
    validator
        .validate(quote, descriptor, &server_key, &evidence, SystemTime::now())
        .with_context(|| format!("Quote rejected for enclave `{name}`"))?;

    println!(
        "Quote verified for enclave `{}` ({} service).",
        descriptor.name, descriptor.service
    );
    Ok(())
}
