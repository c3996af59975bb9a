use alloy_primitives::Address;
use eyre::{eyre, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// 0.05 ether kept on the gateway for the return trip
pub const DEFAULT_SAFETY_RESERVE_WEI: u128 = 50_000_000_000_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub home: HomeConfig,
    pub chains: Vec<ChainConfig>,
    pub polling: PollingConfig,
    pub exploration: ExplorationConfig,
    pub rescue: RescueConfig,
    pub store: StoreConfig,
    pub dry_run: bool,
    /// Signing key for every write. Only ever read from the environment.
    #[serde(skip)]
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub omni_travel_address: Address,
    /// Execute explorations through the home-chain gateway instead of
    /// paying gas on the target chain
    pub gateway_enabled: bool,
    pub safety_reserve_wei: u128,
}

/// Static per-chain connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainConfig {
    pub chain_id: u64,
    #[serde(default)]
    pub name: Option<String>,
    pub rpc_url: String,
    pub connector_address: Address,
    #[serde(default)]
    pub explorer_url: Option<String>,
    /// Overrides the built-in interval multiplier for this chain
    #[serde(default)]
    pub activity_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub max_block_range: u64,
    pub rpc_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    pub tick_interval_secs: u64,
    /// CROSSING_OUT travels older than this are promoted without an arrival event
    pub fallback_promotion_secs: u64,
    /// Fixed short interval, ignores duration tiers and chain activity
    pub testing_mode: bool,
    pub testing_interval_secs: u64,
    pub pool_refresh_every_ticks: u64,
    pub pool_sample_blocks: u64,
    pub pool_max_addresses: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RescueConfig {
    pub strand_chance: f64,
    pub grace_period_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Every committed store write is flushed here
    pub snapshot_path: PathBuf,
}

impl RelayConfig {
    pub async fn load_from_file(path: &Path) -> eyre::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load `<dir>/relay.json`, or defaults if the file is missing
    pub async fn load_from_dir(dir: &Path) -> eyre::Result<Self> {
        let path = dir.join("relay.json");
        if path.exists() {
            Self::load_from_file(&path).await
        } else {
            tracing::warn!(path = %path.display(), "relay.json not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("RELAY_PRIVATE_KEY") {
            self.private_key = Some(key);
        }
        if let Some(url) = lookup("HOME_RPC_URL") {
            self.home.rpc_url = url;
        }
        if let Some(addr) = lookup("OMNI_TRAVEL_ADDRESS").and_then(|v| v.parse().ok()) {
            self.home.omni_travel_address = addr;
        }
        if let Some(secs) = lookup("POLL_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.polling.interval_secs = secs;
        }
        if let Some(secs) = lookup("EXPLORATION_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.exploration.tick_interval_secs = secs;
        }
        if let Some(path) = lookup("RELAY_STORE_PATH") {
            self.store.snapshot_path = PathBuf::from(path);
        }
        self
    }

    pub fn validate(&self) -> eyre::Result<()> {
        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                return Err(eyre!("Duplicate chain id {} in config", chain.chain_id));
            }
            if chain.rpc_url.is_empty() {
                return Err(eyre!("Chain {} has no rpc_url", chain.chain_id));
            }
        }
        if self.polling.max_block_range == 0 {
            return Err(eyre!("polling.max_block_range must be positive"));
        }
        if !(0.0..=1.0).contains(&self.rescue.strand_chance) {
            return Err(eyre!(
                "rescue.strand_chance must be within [0, 1], got {}",
                self.rescue.strand_chance
            ));
        }
        Ok(())
    }
}

impl ChainConfig {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| common::chains::chain_name(self.chain_id))
    }

    pub fn activity_multiplier(&self) -> f64 {
        self.activity_multiplier
            .unwrap_or_else(|| common::chains::default_activity_multiplier(self.chain_id))
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            home: HomeConfig::default(),
            chains: Vec::new(),
            polling: PollingConfig::default(),
            exploration: ExplorationConfig::default(),
            rescue: RescueConfig::default(),
            store: StoreConfig::default(),
            dry_run: true,
            private_key: None,
        }
    }
}

impl Default for HomeConfig {
    fn default() -> Self {
        Self {
            chain_id: common::chains::ZETACHAIN_ATHENS,
            rpc_url: "https://zetachain-athens-evm.blockpi.network/v1/rpc/public".to_string(),
            omni_travel_address: Address::ZERO,
            gateway_enabled: true,
            safety_reserve_wei: DEFAULT_SAFETY_RESERVE_WEI,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            max_block_range: 100,
            rpc_timeout_secs: 30,
        }
    }
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 90,
            fallback_promotion_secs: 120,
            testing_mode: false,
            testing_interval_secs: 60,
            pool_refresh_every_ticks: 10,
            pool_sample_blocks: 10,
            pool_max_addresses: 50,
        }
    }
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            strand_chance: 0.05,
            grace_period_secs: 4 * 60 * 60,
            sweep_interval_secs: 300,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("./data/relay-store.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.polling.interval_secs, 15);
        assert_eq!(config.polling.max_block_range, 100);
        assert_eq!(config.exploration.tick_interval_secs, 90);
        assert_eq!(config.exploration.fallback_promotion_secs, 120);
        assert_eq!(config.rescue.grace_period_secs, 14_400);
        assert!(config.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_applied() {
        let vars: HashMap<&str, &str> = [
            ("POLL_INTERVAL_SECS", "5"),
            ("EXPLORATION_INTERVAL_SECS", "30"),
            ("RELAY_STORE_PATH", "/tmp/store.json"),
            ("OMNI_TRAVEL_ADDRESS", "0x0101010101010101010101010101010101010101"),
            ("RELAY_PRIVATE_KEY", "0xabc"),
        ]
        .into_iter()
        .collect();

        let config = RelayConfig::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.polling.interval_secs, 5);
        assert_eq!(config.exploration.tick_interval_secs, 30);
        assert_eq!(config.store.snapshot_path, PathBuf::from("/tmp/store.json"));
        assert_eq!(config.home.omni_travel_address, Address::repeat_byte(0x01));
        assert_eq!(config.private_key.as_deref(), Some("0xabc"));
    }

    #[test]
    fn test_invalid_override_ignored() {
        let config = RelayConfig::default().with_overrides(|key| match key {
            "POLL_INTERVAL_SECS" => Some("soon".to_string()),
            _ => None,
        });
        assert_eq!(config.polling.interval_secs, 15);
    }

    #[test]
    fn test_parse_partial_json() {
        let json = r#"{
            "chains": [{
                "chain_id": 97,
                "rpc_url": "http://localhost:8545",
                "connector_address": "0x0202020202020202020202020202020202020202"
            }],
            "exploration": { "testing_mode": true }
        }"#;
        let config: RelayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.chains.len(), 1);
        assert_eq!(config.chains[0].display_name(), "BSC Testnet");
        assert_eq!(config.chains[0].activity_multiplier(), 1.0);
        assert!(config.exploration.testing_mode);
        assert_eq!(config.exploration.tick_interval_secs, 90);
    }

    #[test]
    fn test_validate_rejects_duplicate_chain() {
        let chain = ChainConfig {
            chain_id: 97,
            name: None,
            rpc_url: "http://localhost:8545".to_string(),
            connector_address: Address::ZERO,
            explorer_url: None,
            activity_multiplier: None,
        };
        let config = RelayConfig {
            chains: vec![chain.clone(), chain],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_from_dir_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig::load_from_dir(dir.path()).await.unwrap();
        assert!(config.chains.is_empty());
    }
}
