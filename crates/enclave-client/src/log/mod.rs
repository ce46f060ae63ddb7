// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Logging related stuff

use anyhow::Context;
use tracing::level_filters::LevelFilter;
use tracing_log::LogTracer;
use tracing_subscriber::Registry;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity of the tool and this crate, as a clap value
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// no output at all, not even security events
    Off,
    /// failures only
    Error,
    /// failures and rejected attestations
    #[default]
    Warn,
    /// session lifecycle
    Info,
    /// handshake steps
    Debug,
    /// quote fields and signature checks
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

fn default_filter(crate_name: &str, log_level: &LevelFilter) -> String {
    match *log_level {
        LevelFilter::OFF => "off".into(),
        _ => format!("warn,{crate_name}={log_level},enclave_client={log_level},security=warn"),
    }
}

/// Setup standard logging for `crate_name` and this crate.
///
/// `RUST_LOG` takes precedence over `log_level`. Security events of the
/// validator use the target `security`, which stays at `warn` unless logging is off.
pub fn setup_logging(crate_name: &str, log_level: &LevelFilter) -> anyhow::Result<()> {
    LogTracer::init().context("Failed to set logger")?;
    let filter = EnvFilter::builder()
        .try_from_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(crate_name, log_level)));
    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
