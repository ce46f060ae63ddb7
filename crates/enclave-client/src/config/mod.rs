// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Configuration handling

use crate::attestation::{chain::TrustAnchor, AttestationValidator, FreshnessPolicy};
use crate::client::ClientConfig;
use crate::error::{Error, Result};
use crate::registry::{EnclaveDescriptor, EnclaveRegistry, Environment};
use crate::session::SessionPolicy;
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

/// Prefix of the environment variables overriding the configuration,
/// e.g. `ENCLAVE__SESSION__VALIDITY_SECS=60`
pub const ENV_PREFIX: &str = "ENCLAVE";

/// Session limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// seconds a session is used before re-attesting
    pub validity_secs: u64,
    /// envelopes one session may encrypt
    pub max_messages: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let policy = SessionPolicy::default();
        Self {
            validity_secs: policy.validity.as_secs(),
            max_messages: policy.max_messages,
        }
    }
}

/// Accepted age of attestations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessConfig {
    /// oldest accepted attestation in seconds
    pub max_age_secs: u64,
    /// accepted clock skew in seconds
    pub max_clock_skew_secs: u64,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        let policy = FreshnessPolicy::default();
        Self {
            max_age_secs: policy.max_age.as_secs(),
            max_clock_skew_secs: policy.max_clock_skew.as_secs(),
        }
    }
}

/// Everything needed to build an [`crate::client::AttestationClient`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestationConfig {
    /// which built-in enclaves to start from
    pub environment: Environment,
    /// additional enclaves, replacing built-ins of the same name
    pub enclaves: Vec<EnclaveDescriptor>,
    /// PEM of the attestation root certificate
    pub trusted_root_pem: Option<String>,
    /// file holding the PEM of the attestation root certificate
    pub trusted_root_file: Option<PathBuf>,
    /// session limits
    pub session: SessionConfig,
    /// seconds a single transport call may take
    pub transport_timeout_secs: u64,
    /// accepted age of attestations
    pub freshness: FreshnessConfig,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            enclaves: Vec::new(),
            trusted_root_pem: None,
            trusted_root_file: None,
            session: SessionConfig::default(),
            transport_timeout_secs: ClientConfig::default().transport_timeout.as_secs(),
            freshness: FreshnessConfig::default(),
        }
    }
}

impl AttestationConfig {
    /// Load the defaults, overridden by the optional file at `path`
    /// (YAML, TOML or JSON by extension) and then by `ENCLAVE__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(
            path,
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
    }

    fn load_with(path: Option<&Path>, environment: config::Environment) -> Result<Self> {
        trace!("Loading config");
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            debug!(path = %path.display(), "reading config file");
            builder = builder.add_source(File::from(path).required(true));
        }
        let config: Self = builder
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.session.validity_secs == 0 {
            return Err(Error::config("session.validity_secs must not be 0"));
        }
        if self.session.max_messages == 0 {
            return Err(Error::config("session.max_messages must not be 0"));
        }
        if self.transport_timeout_secs == 0 {
            return Err(Error::config("transport_timeout_secs must not be 0"));
        }
        Ok(())
    }

    /// The built-in enclaves of the environment merged with the configured ones
    pub fn registry(&self) -> Result<EnclaveRegistry> {
        Ok(EnclaveRegistry::for_environment(self.environment)
            .with_overrides(self.enclaves.iter().cloned())?)
    }

    /// The configured attestation root
    pub fn trust_anchor(&self) -> Result<TrustAnchor> {
        let pem = match (&self.trusted_root_pem, &self.trusted_root_file) {
            (Some(pem), _) => pem.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                Error::config(format!(
                    "failed to read trusted root `{}`: {e}",
                    path.display()
                ))
            })?,
            (None, None) => return Err(Error::config("no trusted root certificate configured")),
        };
        Ok(TrustAnchor::from_pem(pem)?)
    }

    /// The configured freshness window
    pub fn freshness(&self) -> FreshnessPolicy {
        FreshnessPolicy {
            max_age: Duration::from_secs(self.freshness.max_age_secs),
            max_clock_skew: Duration::from_secs(self.freshness.max_clock_skew_secs),
        }
    }

    /// A validator trusting the configured root
    pub fn validator(&self) -> Result<AttestationValidator> {
        Ok(AttestationValidator::new(
            self.trust_anchor()?,
            self.freshness(),
        ))
    }

    /// The client tunables
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            session: SessionPolicy {
                validity: Duration::from_secs(self.session.validity_secs),
                max_messages: self.session.max_messages,
            },
            transport_timeout: Duration::from_secs(self.transport_timeout_secs),
        }
    }
}
