// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Known enclaves and the code identity they have to prove

use crate::error::RegistryError;
use hex_literal::hex;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::collections::{hash_map::Entry, HashMap};
use std::fmt::{Display, Formatter};

/// The service an enclave provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// private contact discovery
    ContactDiscovery,
    /// key backup
    KeyBackup,
}

impl Display for ServiceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ServiceKind {
    /// Short human readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::ContactDiscovery => "contact discovery",
            ServiceKind::KeyBackup => "key backup",
        }
    }
}

/// The deployment whose built-in enclaves are used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// production enclaves
    #[default]
    Production,
    /// staging enclaves
    Staging,
}

/// Expected identity of one enclave
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclaveDescriptor {
    /// the enclave name used by the transport
    pub name: String,
    /// what the enclave serves
    pub service: ServiceKind,
    /// expected code identity
    #[serde_as(as = "serde_with::hex::Hex")]
    pub mrenclave: [u8; 32],
    /// expected signer identity, if pinned
    #[serde_as(as = "Option<serde_with::hex::Hex>")]
    #[serde(skip_serializing_if = "Option::is_none", default = "Option::default")]
    pub mrsigner: Option<[u8; 32]>,
    /// accept quotes of enclaves running in debug mode
    #[serde(default)]
    pub allow_debug: bool,
}

struct BuiltIn {
    name: &'static str,
    service: ServiceKind,
    mrenclave: [u8; 32],
}

const fn builtin(name: &'static str, service: ServiceKind, mrenclave: [u8; 32]) -> BuiltIn {
    BuiltIn {
        name,
        service,
        mrenclave,
    }
}

impl From<&BuiltIn> for EnclaveDescriptor {
    fn from(b: &BuiltIn) -> Self {
        Self {
            name: b.name.into(),
            service: b.service,
            mrenclave: b.mrenclave,
            mrsigner: None,
            allow_debug: false,
        }
    }
}

const PRODUCTION: [BuiltIn; 2] = [
    builtin(
        "cd6cfc342937b23b1bdd3bbf9721aa5615ac9ff50a75c5527d441cd3276826c9",
        ServiceKind::ContactDiscovery,
        hex!("cd6cfc342937b23b1bdd3bbf9721aa5615ac9ff50a75c5527d441cd3276826c9"),
    ),
    builtin(
        "f2e2a5004794a6c1bac5c4949eadbc243dd02e02d1a93f10fe24584fb70815d8",
        ServiceKind::KeyBackup,
        hex!("f51f435802ada769e67aaf5744372bb7e7d519eecf996d335eb5b46b872b5789"),
    ),
];

const STAGING: [BuiltIn; 2] = [
    builtin(
        "e0f7dee77dc9d705ccc1376859811da12ecec3b6119a19dc39bdfbf97173aa18",
        ServiceKind::ContactDiscovery,
        hex!("e0f7dee77dc9d705ccc1376859811da12ecec3b6119a19dc39bdfbf97173aa18"),
    ),
    builtin(
        "b5a865941f95887018c86725cc92308d34a3084dc2b4e7bd2de5e5e1690b50c6",
        ServiceKind::KeyBackup,
        hex!("f51f435802ada769e67aaf5744372bb7e7d519eecf996d335eb5b46b872b5789"),
    ),
];

/// Read-only map from enclave name to its descriptor
#[derive(Debug, Clone, Default)]
pub struct EnclaveRegistry {
    enclaves: HashMap<String, EnclaveDescriptor>,
}

impl EnclaveRegistry {
    /// Build a registry, rejecting names that occur twice
    pub fn new(
        descriptors: impl IntoIterator<Item = EnclaveDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut enclaves = HashMap::new();
        for descriptor in descriptors {
            if descriptor.name.is_empty() {
                return Err(RegistryError::InvalidValue {
                    name: descriptor.name,
                    field: "name",
                });
            }
            match enclaves.entry(descriptor.name.clone()) {
                Entry::Occupied(e) => return Err(RegistryError::Duplicate(e.key().clone())),
                Entry::Vacant(e) => {
                    e.insert(descriptor);
                }
            }
        }
        Ok(Self { enclaves })
    }

    /// The built-in enclaves of `environment`
    pub fn for_environment(environment: Environment) -> Self {
        let table = match environment {
            Environment::Production => &PRODUCTION,
            Environment::Staging => &STAGING,
        };
        Self {
            enclaves: table
                .iter()
                .map(|b| (b.name.to_string(), EnclaveDescriptor::from(b)))
                .collect(),
        }
    }

    /// Replace or add entries by name
    pub fn with_overrides(
        mut self,
        descriptors: impl IntoIterator<Item = EnclaveDescriptor>,
    ) -> Result<Self, RegistryError> {
        let overrides = Self::new(descriptors)?;
        self.enclaves.extend(overrides.enclaves);
        Ok(self)
    }

    /// Look up the descriptor of `name`
    pub fn lookup(&self, name: &str) -> Result<&EnclaveDescriptor, RegistryError> {
        self.enclaves
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All known enclaves
    pub fn iter(&self) -> impl Iterator<Item = &EnclaveDescriptor> {
        self.enclaves.values()
    }
}
