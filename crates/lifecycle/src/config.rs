//! Layered configuration: built-in defaults, `Deploybook.toml`, then `DEPLOYBOOK_*` variables.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::{Address, U256};
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    amount::{DEFAULT_GAS_PRICE, decimal},
    confirm::DEFAULT_CONFIRMATION_TIMEOUT,
    etherscan::{DEFAULT_ETHERSCAN_API_URL, DEFAULT_STATUS_MAX_POLLS, DEFAULT_STATUS_POLL_INTERVAL},
    rpc::DEFAULT_POLL_INTERVAL,
};

/// Configuration file looked up in the working directory.
pub const CONFIG_FILENAME: &str = "Deploybook.toml";

/// Prefix of configuration environment variables; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "DEPLOYBOOK_";

/// Endpoint used when neither the network profile nor the config names one.
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

const DEFAULT_CONFIRMATIONS: u64 = 2;

/// Per-network deployment parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkProfile {
    /// Resolved from the node when absent.
    pub chain_id: Option<u64>,
    pub confirmations: u64,
    #[serde(with = "decimal")]
    pub fallback_gas_price: U256,
    pub rpc_url: Option<Url>,
}

impl Default for NetworkProfile {
    fn default() -> Self {
        Self {
            chain_id: None,
            confirmations: DEFAULT_CONFIRMATIONS,
            fallback_gas_price: DEFAULT_GAS_PRICE,
            rpc_url: None,
        }
    }
}

impl NetworkProfile {
    /// Built-in profile for a well-known network name.
    pub fn builtin(network: &str) -> Option<Self> {
        match network {
            "sepolia" => Some(Self {
                chain_id: Some(11155111),
                ..Default::default()
            }),
            "mainnet" => Some(Self {
                chain_id: Some(1),
                confirmations: 5,
                fallback_gas_price: U256::from(30_000_000_000u64),
                rpc_url: None,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Only parsed when a verification is submitted.
    pub api_url: String,
    pub api_key: Option<String>,
    pub poll_interval_secs: u64,
    /// Status checks after a submission before giving up.
    pub max_polls: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_ETHERSCAN_API_URL.to_string(),
            api_key: None,
            poll_interval_secs: DEFAULT_STATUS_POLL_INTERVAL.as_secs(),
            max_polls: DEFAULT_STATUS_MAX_POLLS,
        }
    }
}

impl VerifierConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding store documents, address books and reports.
    pub storage_root: PathBuf,
    /// Directory of compiled contract artifacts.
    pub artifacts_dir: PathBuf,
    /// Endpoint for networks whose profile names none.
    pub rpc_url: Option<Url>,
    /// Unlocked node account that sends deployments.
    pub deployer: Option<Address>,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub verifier: VerifierConfig,
    pub networks: BTreeMap<String, NetworkProfile>,
}

impl Default for Config {
    fn default() -> Self {
        let networks = ["sepolia", "mainnet"]
            .into_iter()
            .filter_map(|name| NetworkProfile::builtin(name).map(|p| (name.to_string(), p)))
            .collect();

        Self {
            storage_root: PathBuf::from("deployments"),
            artifacts_dir: PathBuf::from("artifacts"),
            rpc_url: None,
            deployer: None,
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT.as_secs(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            verifier: VerifierConfig::default(),
            networks,
        }
    }
}

impl Config {
    /// Providers in precedence order, lowest first.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration. An explicitly given file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => PathBuf::from(CONFIG_FILENAME),
        };

        let config: Self = Self::figment(&path)
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

        tracing::debug!(
            path = %path.display(),
            storage_root = %config.storage_root.display(),
            networks = config.networks.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Profile for `network`, falling back to the defaults for unknown names.
    pub fn profile(&self, network: &str) -> NetworkProfile {
        self.networks
            .get(network)
            .cloned()
            .or_else(|| NetworkProfile::builtin(network))
            .unwrap_or_default()
    }

    /// Mutable profile for `network`, created from the defaults if missing.
    pub fn profile_mut(&mut self, network: &str) -> &mut NetworkProfile {
        self.networks
            .entry(network.to_string())
            .or_insert_with(|| NetworkProfile::builtin(network).unwrap_or_default())
    }

    /// The network's own endpoint, then the shared one, then a local node.
    pub fn rpc_url(&self, network: &str) -> Result<Url> {
        match self.profile(network).rpc_url.or_else(|| self.rpc_url.clone()) {
            Some(url) => Ok(url),
            None => Url::parse(DEFAULT_RPC_URL).context("Invalid default RPC URL"),
        }
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
