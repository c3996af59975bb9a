//! In-process doubles for chains, notifications and store seeding

use crate::chain::{
    ChainError, ConnectorEvent, DirectExploration, EventMeta, ExplorationObservedEvent,
    FrogArrivedEvent, FrogReturnedEvent, GatewayExploration, HomeChainClient, ReturnCheck,
    TargetChainClient, TxReceipt, UnlockReceipt, VIRTUAL_OBSERVATION_PREFIX,
};
use crate::config::ChainConfig;
use crate::notify::{NotificationBus, RelayNotification};
use crate::store::{Frog, FrogStatus, NewTravel, TokenId, Travel, TravelStore};
use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

pub const HOME_CHAIN_ID: u64 = 7001;
pub const TARGET_CHAIN_ID: u64 = 97;

/// Notification bus that keeps everything it is given
#[derive(Default)]
pub struct RecordingBus {
    events: Mutex<Vec<RelayNotification>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RelayNotification> {
        self.events.lock().clone()
    }

    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&RelayNotification) -> bool,
    {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl NotificationBus for RecordingBus {
    fn publish(&self, notification: RelayNotification) {
        self.events.lock().push(notification);
    }
}

#[derive(Default)]
struct MockState {
    block_number: u64,
    events: Vec<ConnectorEvent>,
    tx_count: usize,
    active_addresses: Vec<Address>,
    contracts: Vec<Address>,
    should_return: HashMap<u64, ReturnCheck>,
    fail_reads: bool,
    fail_writes: bool,
    fail_unlock: Option<String>,
    gateway_enabled: bool,
    virtual_gateway: bool,
    refund_wei: Option<U256>,
    next_tx: u8,

    scanned_ranges: Vec<(u64, u64)>,
    contract_checks: usize,
    auto_returns: Vec<u64>,
    direct_explorations: Vec<(u64, String)>,
    gateway_explorations: Vec<(u64, String)>,
    unlocks: Vec<(u64, B256, u64)>,
}

/// Scriptable target and home chain in one
pub struct MockTravelChain {
    chain_id: u64,
    state: Mutex<MockState>,
}

impl MockTravelChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn set_block_number(&self, block: u64) {
        self.state.lock().block_number = block;
    }

    pub fn push_event(&self, event: ConnectorEvent) {
        self.state.lock().events.push(event);
    }

    pub fn set_tx_count(&self, count: usize) {
        self.state.lock().tx_count = count;
    }

    pub fn set_active_addresses(&self, addresses: Vec<Address>) {
        self.state.lock().active_addresses = addresses;
    }

    pub fn mark_contract(&self, address: Address) {
        self.state.lock().contracts.push(address);
    }

    pub fn set_should_return(&self, token_id: u64, reason: &str) {
        self.state.lock().should_return.insert(
            token_id,
            ReturnCheck {
                should_return: true,
                reason: reason.to_string(),
            },
        );
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    pub fn set_fail_unlock(&self, reason: Option<&str>) {
        self.state.lock().fail_unlock = reason.map(str::to_string);
    }

    pub fn set_gateway(&self, enabled: bool, virtual_only: bool) {
        let mut state = self.state.lock();
        state.gateway_enabled = enabled;
        state.virtual_gateway = virtual_only;
    }

    pub fn set_refund(&self, refund: Option<U256>) {
        self.state.lock().refund_wei = refund;
    }

    pub fn scanned_ranges(&self) -> Vec<(u64, u64)> {
        self.state.lock().scanned_ranges.clone()
    }

    /// Number of `is_contract` lookups served
    pub fn contract_checks(&self) -> usize {
        self.state.lock().contract_checks
    }

    pub fn auto_returns(&self) -> Vec<u64> {
        self.state.lock().auto_returns.clone()
    }

    pub fn direct_explorations(&self) -> Vec<(u64, String)> {
        self.state.lock().direct_explorations.clone()
    }

    pub fn gateway_explorations(&self) -> Vec<(u64, String)> {
        self.state.lock().gateway_explorations.clone()
    }

    pub fn unlocks(&self) -> Vec<(u64, B256, u64)> {
        self.state.lock().unlocks.clone()
    }

    fn receipt(state: &mut MockState) -> TxReceipt {
        state.next_tx = state.next_tx.wrapping_add(1);
        TxReceipt {
            tx_hash: B256::repeat_byte(state.next_tx),
            block_number: state.block_number,
            gas_used: 21_000,
        }
    }

    fn read_guard(state: &MockState) -> Result<(), ChainError> {
        if state.fail_reads {
            return Err(ChainError::RpcError("mock read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl TargetChainClient for MockTravelChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let state = self.state.lock();
        Self::read_guard(&state)?;
        Ok(state.block_number)
    }

    async fn connector_events(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<ConnectorEvent>, ChainError> {
        let mut state = self.state.lock();
        Self::read_guard(&state)?;
        state.scanned_ranges.push((from, to));
        let mut events: Vec<ConnectorEvent> = state
            .events
            .iter()
            .filter(|e| (from..=to).contains(&e.meta().block_number))
            .cloned()
            .collect();
        crate::chain::event_types::sort_events(&mut events);
        Ok(events)
    }

    async fn latest_block_tx_count(&self) -> Result<usize, ChainError> {
        let state = self.state.lock();
        Self::read_guard(&state)?;
        Ok(state.tx_count)
    }

    async fn recent_active_addresses(
        &self,
        _blocks: u64,
        max: usize,
    ) -> Result<Vec<Address>, ChainError> {
        let state = self.state.lock();
        Self::read_guard(&state)?;
        Ok(state.active_addresses.iter().take(max).copied().collect())
    }

    async fn is_contract(&self, address: Address) -> Result<bool, ChainError> {
        let mut state = self.state.lock();
        state.contract_checks += 1;
        Ok(state.contracts.contains(&address))
    }

    async fn should_return(&self, token_id: u64) -> Result<ReturnCheck, ChainError> {
        let state = self.state.lock();
        Self::read_guard(&state)?;
        Ok(state
            .should_return
            .get(&token_id)
            .cloned()
            .unwrap_or(ReturnCheck {
                should_return: false,
                reason: String::new(),
            }))
    }

    async fn auto_return(&self, token_id: u64) -> Result<TxReceipt, ChainError> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(ChainError::RpcError("mock write failure".to_string()));
        }
        state.auto_returns.push(token_id);
        Ok(Self::receipt(&mut state))
    }

    async fn random_explore(
        &self,
        token_id: u64,
        observation: &str,
    ) -> Result<DirectExploration, ChainError> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(ChainError::RpcError("mock write failure".to_string()));
        }
        state.direct_explorations.push((token_id, observation.to_string()));
        let explored_address =
            Address::repeat_byte(0xe0u8.wrapping_add(state.direct_explorations.len() as u8));
        let receipt = Self::receipt(&mut state);
        // the connector logs the exploration in the same transaction
        let log = ConnectorEvent::Exploration(ExplorationObservedEvent {
            meta: EventMeta {
                chain_id: self.chain_id,
                block_number: receipt.block_number,
                log_index: 0,
                tx_hash: receipt.tx_hash,
            },
            token_id,
            explored_address,
            is_contract: false,
            code_size: 0,
            observation: observation.to_string(),
            timestamp: Utc::now(),
        });
        state.events.push(log);
        Ok(DirectExploration {
            receipt,
            explored_address,
            is_contract: false,
            code_size: 0,
            observation: observation.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl HomeChainClient for MockTravelChain {
    fn gateway_enabled(&self) -> bool {
        self.state.lock().gateway_enabled
    }

    async fn unlock_frog(
        &self,
        token_id: u64,
        return_message_id: B256,
        xp_earned: u64,
    ) -> Result<UnlockReceipt, ChainError> {
        let mut state = self.state.lock();
        state.unlocks.push((token_id, return_message_id, xp_earned));
        if let Some(reason) = &state.fail_unlock {
            return Err(ChainError::RpcError(reason.clone()));
        }
        Ok(UnlockReceipt {
            receipt: Self::receipt(&mut state),
            refund_wei: state.refund_wei,
        })
    }

    async fn trigger_exploration(
        &self,
        token_id: u64,
        observation: &str,
    ) -> Result<GatewayExploration, ChainError> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(ChainError::RpcError("mock write failure".to_string()));
        }
        state.gateway_explorations.push((token_id, observation.to_string()));
        let (is_virtual, observation) = if state.virtual_gateway {
            (true, format!("{} {}", VIRTUAL_OBSERVATION_PREFIX, observation))
        } else {
            (false, observation.to_string())
        };
        Ok(GatewayExploration {
            receipt: Self::receipt(&mut state),
            is_virtual,
            observation,
        })
    }
}

pub fn meta(chain_id: u64, block_number: u64, log_index: u64) -> EventMeta {
    EventMeta {
        chain_id,
        block_number,
        log_index,
        tx_hash: B256::left_padding_from(&block_number.to_be_bytes()),
    }
}

pub fn arrival_event(
    chain_id: u64,
    block_number: u64,
    token_id: u64,
    message_id: B256,
) -> ConnectorEvent {
    ConnectorEvent::Arrived(FrogArrivedEvent {
        meta: meta(chain_id, block_number, 0),
        token_id,
        owner: owner_of(token_id),
        name: format!("Frog #{}", token_id),
        message_id,
        timestamp: Utc::now(),
    })
}

pub fn return_event(
    chain_id: u64,
    block_number: u64,
    token_id: u64,
    message_id: B256,
    xp_earned: u64,
) -> ConnectorEvent {
    ConnectorEvent::Returned(FrogReturnedEvent {
        meta: meta(chain_id, block_number, 1),
        token_id,
        message_id,
        xp_earned,
        timestamp: Utc::now(),
    })
}

pub fn exploration_event(
    chain_id: u64,
    block_number: u64,
    token_id: u64,
    explored_address: Address,
) -> ConnectorEvent {
    ConnectorEvent::Exploration(ExplorationObservedEvent {
        meta: meta(chain_id, block_number, 2),
        token_id,
        explored_address,
        is_contract: false,
        code_size: 0,
        observation: "Something shiny".to_string(),
        timestamp: Utc::now(),
    })
}

pub fn chain_config(chain_id: u64) -> ChainConfig {
    ChainConfig {
        chain_id,
        name: None,
        rpc_url: "http://127.0.0.1:8545".to_string(),
        connector_address: Address::repeat_byte(0xcc),
        explorer_url: None,
        activity_multiplier: None,
    }
}

/// Deterministic owner wallet per token
pub fn owner_of(token_id: TokenId) -> Address {
    Address::left_padding_from(&token_id.to_be_bytes())
}

pub fn outbound_message_id(token_id: TokenId) -> B256 {
    B256::left_padding_from(&(token_id + 1_000).to_be_bytes())
}

pub async fn seed_frog(store: &dyn TravelStore, token_id: TokenId, status: FrogStatus) -> Frog {
    let frog = Frog {
        token_id,
        name: format!("Frog #{}", token_id),
        owner: owner_of(token_id),
        status,
        xp: 0,
        reputation: 0,
    };
    store
        .upsert_frog(frog.clone())
        .await
        .expect("seed frog");
    frog
}

/// Frog plus a CROSSING_OUT travel to the mock target chain
pub async fn seed_travel(
    store: &dyn TravelStore,
    token_id: TokenId,
    start_time: DateTime<Utc>,
    duration_secs: u64,
) -> Travel {
    seed_frog(store, token_id, FrogStatus::Traveling).await;
    store
        .create_travel(NewTravel {
            token_id,
            frog_name: format!("Frog #{}", token_id),
            owner: owner_of(token_id),
            home_chain_id: HOME_CHAIN_ID,
            target_chain_id: TARGET_CHAIN_ID,
            start_time,
            duration_secs,
            cross_chain_message_id: Some(outbound_message_id(token_id)),
        })
        .await
        .expect("seed travel")
}
