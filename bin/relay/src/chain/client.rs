//! Chain client seams used by the poller, scheduler and lifecycle manager

use crate::chain::event_types::ConnectorEvent;
use crate::chain::ChainError;
use alloy_primitives::{Address, B256, U256};

/// Marker prefix the gateway puts on observations it skipped for low reserves
pub const VIRTUAL_OBSERVATION_PREFIX: &str = "[VIRTUAL]";

#[derive(Debug, Clone, PartialEq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Result of the connector's resource-exhaustion check
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnCheck {
    pub should_return: bool,
    pub reason: String,
}

/// Exploration executed directly on the target chain
#[derive(Debug, Clone, PartialEq)]
pub struct DirectExploration {
    pub receipt: TxReceipt,
    pub explored_address: Address,
    pub is_contract: bool,
    pub code_size: u64,
    pub observation: String,
}

/// Exploration routed through the home-chain gateway
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayExploration {
    pub receipt: TxReceipt,
    /// Gateway skipped the remote call because reserves were low
    pub is_virtual: bool,
    pub observation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnlockReceipt {
    pub receipt: TxReceipt,
    /// Unused provisions returned to the owner, if the contract reported it
    pub refund_wei: Option<U256>,
}

/// Read/write access to one target chain's FrogConnector
#[async_trait::async_trait]
pub trait TargetChainClient: Send + Sync {
    fn chain_id(&self) -> u64;

    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Decoded connector events in `[from, to]`, ordered by block and log index
    async fn connector_events(&self, from: u64, to: u64)
        -> Result<Vec<ConnectorEvent>, ChainError>;

    /// Number of transactions in the latest block
    async fn latest_block_tx_count(&self) -> Result<usize, ChainError>;

    /// Distinct `to` addresses of the last `blocks` blocks, at most `max`
    async fn recent_active_addresses(
        &self,
        blocks: u64,
        max: usize,
    ) -> Result<Vec<Address>, ChainError>;

    async fn is_contract(&self, address: Address) -> Result<bool, ChainError>;

    async fn should_return(&self, token_id: u64) -> Result<ReturnCheck, ChainError>;

    async fn auto_return(&self, token_id: u64) -> Result<TxReceipt, ChainError>;

    async fn random_explore(
        &self,
        token_id: u64,
        observation: &str,
    ) -> Result<DirectExploration, ChainError>;
}

/// Write access to the home chain's OmniTravel contract
#[async_trait::async_trait]
pub trait HomeChainClient: Send + Sync {
    /// Whether explorations may be routed through the gateway
    fn gateway_enabled(&self) -> bool;

    async fn unlock_frog(
        &self,
        token_id: u64,
        return_message_id: B256,
        xp_earned: u64,
    ) -> Result<UnlockReceipt, ChainError>;

    async fn trigger_exploration(
        &self,
        token_id: u64,
        observation: &str,
    ) -> Result<GatewayExploration, ChainError>;
}
