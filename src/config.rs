//! Configuration module for mintmark
//!
//! This module handles configuration loading from TOML files and
//! environment variables, and provides structured configuration types.

use crate::lifecycle::LifecycleConfig;
use crate::types::is_account_address;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chain network and node endpoint
    #[serde(default)]
    pub network: NetworkConfig,

    /// Deployed contract location
    #[serde(default)]
    pub contract: ContractConfig,

    /// Confirmation timing
    #[serde(default)]
    pub transactions: TransactionConfig,

    /// Persistence targets
    #[serde(default)]
    pub storage: StorageConfig,

    /// Fees and event pricing used when initializing the platform
    #[serde(default)]
    pub platform: PlatformSettings,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network name (`testnet`, `mainnet`, ...)
    #[serde(default = "default_network")]
    pub name: String,

    /// Fullnode REST endpoint
    #[serde(default = "default_node_url")]
    pub node_url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    #[serde(default = "default_contract_address")]
    pub address: String,

    #[serde(default = "default_module_name")]
    pub module: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Total confirmation budget in milliseconds
    #[serde(default = "default_tx_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay between status queries in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Remote store endpoint
    #[serde(default = "default_storage_endpoint")]
    pub endpoint: String,

    /// Remote store API key; empty disables the remote target
    #[serde(default)]
    pub api_key: String,

    /// Network name sent with uploads
    #[serde(default = "default_network")]
    pub network: String,

    /// Local sled database directory; unset keeps data in memory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Local store quota in bytes
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSettings {
    /// GUI tokens charged per mint
    #[serde(default = "default_minting_fee")]
    pub minting_fee: u64,

    /// Percent
    #[serde(default = "default_royalty_percentage")]
    pub royalty_percentage: u64,

    #[serde(default = "default_premium_threshold")]
    pub premium_threshold: u64,

    #[serde(default = "default_reward_rate")]
    pub reward_rate: u64,

    #[serde(default)]
    pub event_pricing: EventPricing,
}

/// Event creation fees per organization tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPricing {
    #[serde(default)]
    pub individual_fee: u64,

    #[serde(default = "default_small_org_fee")]
    pub small_org_fee: u64,

    #[serde(default = "default_enterprise_fee")]
    pub enterprise_fee: u64,

    #[serde(default = "default_poap_fee")]
    pub poap_fee: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Emit JSON log lines
    #[serde(default)]
    pub json_logs: bool,
}

// Default value functions
fn default_network() -> String { "testnet".to_string() }
fn default_node_url() -> String { "https://fullnode.testnet.aptoslabs.com/v1".to_string() }
fn default_request_timeout_ms() -> u64 { 10_000 }
fn default_contract_address() -> String { "0x1".to_string() }
fn default_module_name() -> String { "platform".to_string() }
fn default_tx_timeout_ms() -> u64 { 30_000 }
fn default_poll_interval_ms() -> u64 { 1_000 }
fn default_storage_endpoint() -> String { "https://api.iagon.com/v1".to_string() }
fn default_quota_bytes() -> usize { crate::storage::DEFAULT_QUOTA_BYTES }
fn default_minting_fee() -> u64 { 100 }
fn default_royalty_percentage() -> u64 { 5 }
fn default_premium_threshold() -> u64 { 1000 }
fn default_reward_rate() -> u64 { 50 }
fn default_small_org_fee() -> u64 { 25 }
fn default_enterprise_fee() -> u64 { 100 }
fn default_poap_fee() -> u64 { 15 }
fn default_true() -> bool { true }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: default_network(),
            node_url: default_node_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            address: default_contract_address(),
            module: default_module_name(),
        }
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_tx_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_storage_endpoint(),
            api_key: String::new(),
            network: default_network(),
            data_dir: None,
            quota_bytes: default_quota_bytes(),
        }
    }
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            minting_fee: default_minting_fee(),
            royalty_percentage: default_royalty_percentage(),
            premium_threshold: default_premium_threshold(),
            reward_rate: default_reward_rate(),
            event_pricing: EventPricing::default(),
        }
    }
}

impl Default for EventPricing {
    fn default() -> Self {
        Self {
            individual_fee: 0,
            small_org_fee: default_small_org_fee(),
            enterprise_fee: default_enterprise_fee(),
            poap_fee: default_poap_fee(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            json_logs: false,
        }
    }
}

impl TransactionConfig {
    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig::from_millis(self.timeout_ms, self.poll_interval_ms)
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `MINTMARK_*` overrides from `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides: [(&str, &mut String); 7] = [
            ("MINTMARK_NETWORK", &mut self.network.name),
            ("MINTMARK_NODE_URL", &mut self.network.node_url),
            ("MINTMARK_CONTRACT_ADDRESS", &mut self.contract.address),
            ("MINTMARK_MODULE_NAME", &mut self.contract.module),
            ("MINTMARK_STORAGE_ENDPOINT", &mut self.storage.endpoint),
            ("MINTMARK_STORAGE_API_KEY", &mut self.storage.api_key),
            ("MINTMARK_STORAGE_NETWORK", &mut self.storage.network),
        ];
        for (key, field) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let tx = &self.transactions;
        if tx.timeout_ms == 0 || tx.poll_interval_ms == 0 {
            bail!("transaction timeout and poll interval must be positive");
        }
        if tx.poll_interval_ms >= tx.timeout_ms {
            bail!(
                "poll interval ({} ms) must be shorter than the timeout ({} ms)",
                tx.poll_interval_ms,
                tx.timeout_ms
            );
        }
        if self.network.node_url.trim().is_empty() {
            bail!("network.node_url must not be empty");
        }
        if self.network.request_timeout_ms == 0 {
            bail!("network.request_timeout_ms must be positive");
        }
        if !is_account_address(&self.contract.address) {
            bail!("contract.address is not a valid account address: {}", self.contract.address);
        }
        if self.platform.royalty_percentage > 100 {
            bail!("platform.royalty_percentage must be at most 100");
        }
        Ok(())
    }

    /// Copy safe to print: the API key is masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.storage.api_key.is_empty() {
            copy.storage.api_key = "***".to_string();
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.transactions.lifecycle(), LifecycleConfig::from_millis(30_000, 1_000));
        assert_eq!(config.platform.minting_fee, 100);
        assert_eq!(config.platform.event_pricing.small_org_fee, 25);
        assert_eq!(config.storage.quota_bytes, 5 * 1024 * 1024);
        assert!(config.storage.api_key.is_empty());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[network]
node_url = "http://127.0.0.1:8080/v1"

[transactions]
timeout_ms = 5000
poll_interval_ms = 100

[platform.event_pricing]
poap_fee = 20
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.network.node_url, "http://127.0.0.1:8080/v1");
        assert_eq!(config.network.name, "testnet");
        assert_eq!(config.transactions.timeout_ms, 5000);
        assert_eq!(config.platform.event_pricing.poap_fee, 20);
        assert_eq!(config.platform.event_pricing.enterprise_fee, 100);
        assert_eq!(config.contract.module, "platform");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("MINTMARK_NODE_URL", "http://node:8080/v1"),
            ("MINTMARK_STORAGE_API_KEY", "secret"),
            ("MINTMARK_MODULE_NAME", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.network.node_url, "http://node:8080/v1");
        assert_eq!(config.storage.api_key, "secret");
        // empty values are ignored
        assert_eq!(config.contract.module, "platform");
        assert_eq!(config.redacted().storage.api_key, "***");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.transactions.poll_interval_ms = 30_000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.transactions.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.contract.address = "platform".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.platform.royalty_percentage = 101;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.network.node_url = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Config::from_file("/nonexistent/mintmark.toml").is_err());
    }
}
