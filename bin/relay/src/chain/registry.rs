//! Static per-chain configuration, loaded once at startup

use crate::chain::ChainError;
use crate::config::ChainConfig;
use alloy_primitives::B256;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ChainRegistry {
    home_chain_id: u64,
    chains: BTreeMap<u64, ChainConfig>,
}

impl ChainRegistry {
    pub fn new(home_chain_id: u64, chains: Vec<ChainConfig>) -> Result<Self, ChainError> {
        let mut map = BTreeMap::new();
        for chain in chains {
            let chain_id = chain.chain_id;
            if map.insert(chain_id, chain).is_some() {
                return Err(ChainError::InvalidConfig(format!(
                    "Chain {} configured twice",
                    chain_id
                )));
            }
        }
        Ok(Self {
            home_chain_id,
            chains: map,
        })
    }

    pub fn home_chain_id(&self) -> u64 {
        self.home_chain_id
    }

    pub fn get(&self, chain_id: u64) -> Result<&ChainConfig, ChainError> {
        self.chains
            .get(&chain_id)
            .ok_or(ChainError::UnknownChain(chain_id))
    }

    pub fn is_supported(&self, chain_id: u64) -> bool {
        self.chains.contains_key(&chain_id)
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.values()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Block explorer link for a transaction, if the chain has an explorer
    pub fn explorer_tx_url(&self, chain_id: u64, tx_hash: B256) -> Option<String> {
        let base = self.chains.get(&chain_id)?.explorer_url.as_ref()?;
        Some(format!("{}/tx/{}", base.trim_end_matches('/'), tx_hash))
    }
}
