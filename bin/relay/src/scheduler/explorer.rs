//! Exploration loop.
//!
//! Owns the registry of frogs currently on a target chain and decides, once
//! per tick, whether each one explores, waits, or heads home. The persisted
//! store stays authoritative: every tick re-derives the exploring set from
//! ON_TARGET_CHAIN travels and reconciles the in-memory registry with it.

use super::catalog;
use super::interval::IntervalPolicy;
use super::selection::{Neighbor, Target, TargetSelector};
use crate::chain::{ChainError, ChainRegistry, HomeChainClient, TargetChainClient};
use crate::config::ExplorationConfig;
use crate::lifecycle::{ExplorationOutcome, ExplorationRecord, TravelLifecycleManager};
use crate::narrative::{Narrator, ObservationContext};
use crate::rescue::RescueCoordinator;
use crate::store::{
    CrossChainStatus, InteractionKind, StoreError, TokenId, Travel, TravelId, TravelStage,
    TravelStore,
};
use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const NEIGHBOR_POOL_SIZE: usize = 100;

/// A frog the scheduler is pacing on a target chain
#[derive(Debug, Clone, PartialEq)]
pub struct ExploringAgent {
    pub token_id: TokenId,
    pub travel_id: TravelId,
    pub frog_name: String,
    pub owner: Address,
    pub target_chain_id: u64,
    pub start_time: DateTime<Utc>,
    pub duration_secs: u64,
    pub last_action_time: DateTime<Utc>,
    pub action_count: usize,
}

impl ExploringAgent {
    pub fn from_travel(travel: &Travel) -> Self {
        Self {
            token_id: travel.token_id,
            travel_id: travel.id,
            frog_name: travel.frog_name.clone(),
            owner: travel.owner,
            target_chain_id: travel.target_chain_id,
            start_time: travel.start_time,
            duration_secs: travel.duration_secs,
            last_action_time: travel.last_action_time(),
            action_count: travel.actions.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SchedulerCommand {
    Add(ExploringAgent),
    Remove(TokenId),
}

/// Cloneable sender side of the scheduler registry
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    sender: mpsc::UnboundedSender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SchedulerCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn add_exploring_frog(&self, agent: ExploringAgent) {
        let token_id = agent.token_id;
        if self.sender.send(SchedulerCommand::Add(agent)).is_err() {
            tracing::warn!(token_id, "Scheduler stopped, registration dropped");
        }
    }

    pub fn remove_exploring_frog(&self, token_id: TokenId) {
        if self.sender.send(SchedulerCommand::Remove(token_id)).is_err() {
            tracing::warn!(token_id, "Scheduler stopped, removal dropped");
        }
    }

    /// True once the scheduler is gone; sends are then discarded
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// What happened to one travel during a tick
#[derive(Debug, Clone, PartialEq)]
pub enum ExploreStep {
    Stranded,
    NotDue { remaining: Duration },
    Explored { is_virtual: bool, stranded: bool },
    Returned { reason: String },
    /// Travel moved on while the exploration was in flight
    Superseded,
    /// Logged and retried on the next tick
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub promoted: Vec<TravelId>,
    pub steps: Vec<(TravelId, ExploreStep)>,
}

impl TickReport {
    pub fn step(&self, travel_id: TravelId) -> Option<&ExploreStep> {
        self.steps
            .iter()
            .find(|(id, _)| *id == travel_id)
            .map(|(_, step)| step)
    }
}

pub struct ExplorationScheduler {
    lifecycle: Arc<TravelLifecycleManager>,
    store: Arc<dyn TravelStore>,
    chains: ChainRegistry,
    targets: HashMap<u64, Arc<dyn TargetChainClient>>,
    home: Option<Arc<dyn HomeChainClient>>,
    narrator: Arc<Narrator>,
    rescue: Option<Arc<RescueCoordinator>>,
    config: ExplorationConfig,
    relay_wallet: Option<Address>,

    agents: HashMap<TokenId, ExploringAgent>,
    /// Addresses each travel has already visited, loaded lazily
    explored: HashMap<TravelId, HashSet<Address>>,
    selector: TargetSelector,
    rng: StdRng,
    commands: mpsc::UnboundedReceiver<SchedulerCommand>,
    handle: SchedulerHandle,
    ticks: u64,
}

impl ExplorationScheduler {
    pub fn new(
        lifecycle: Arc<TravelLifecycleManager>,
        chains: ChainRegistry,
        narrator: Arc<Narrator>,
        config: ExplorationConfig,
    ) -> Self {
        let (handle, commands) = SchedulerHandle::channel();
        Self {
            store: lifecycle.store().clone(),
            lifecycle,
            chains,
            targets: HashMap::new(),
            home: None,
            narrator,
            rescue: None,
            config,
            relay_wallet: None,
            agents: HashMap::new(),
            explored: HashMap::new(),
            selector: TargetSelector::new(),
            rng: StdRng::from_entropy(),
            commands,
            handle,
            ticks: 0,
        }
    }

    pub fn with_target_chain(mut self, client: Arc<dyn TargetChainClient>) -> Self {
        self.targets.insert(client.chain_id(), client);
        self
    }

    pub fn with_home_chain(mut self, home: Arc<dyn HomeChainClient>) -> Self {
        self.home = Some(home);
        self
    }

    pub fn with_rescue(mut self, rescue: Arc<RescueCoordinator>) -> Self {
        self.rescue = Some(rescue);
        self
    }

    /// The relay's own signer is never explored
    pub fn with_relay_wallet(mut self, wallet: Option<Address>) -> Self {
        self.relay_wallet = wallet;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn agents(&self) -> &HashMap<TokenId, ExploringAgent> {
        &self.agents
    }

    pub fn is_exploring(&self, token_id: TokenId) -> bool {
        self.agents.contains_key(&token_id)
    }

    pub fn explored_addresses(&self, travel_id: TravelId) -> Option<&HashSet<Address>> {
        self.explored.get(&travel_id)
    }

    pub fn selector_mut(&mut self) -> &mut TargetSelector {
        &mut self.selector
    }

    pub fn add_exploring_frog(&mut self, agent: ExploringAgent) {
        tracing::info!(token_id = agent.token_id, travel_id = agent.travel_id, chain_id = agent.target_chain_id, "🐸 Frog registered for exploration");
        self.agents.insert(agent.token_id, agent);
    }

    pub fn remove_exploring_frog(&mut self, token_id: TokenId) -> Option<ExploringAgent> {
        let removed = self.agents.remove(&token_id)?;
        self.explored.remove(&removed.travel_id);
        tracing::info!(token_id, travel_id = removed.travel_id, "Frog removed from exploration");
        Some(removed)
    }

    fn apply_command(&mut self, command: SchedulerCommand) {
        match command {
            SchedulerCommand::Add(agent) => self.add_exploring_frog(agent),
            SchedulerCommand::Remove(token_id) => {
                self.remove_exploring_frog(token_id);
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply_command(command);
        }
    }

    async fn exploring_travels(&self) -> Result<Vec<Travel>, StoreError> {
        let mut travels = self
            .store
            .list_travels(&|t| {
                t.cross_chain_status == Some(CrossChainStatus::OnTargetChain) && !t.is_terminal()
            })
            .await?;
        travels.sort_by_key(|t| t.id);
        Ok(travels)
    }

    /// Rebuild the registry from persisted ON_TARGET_CHAIN travels
    pub async fn rehydrate(&mut self) -> Result<usize, StoreError> {
        let travels = self.exploring_travels().await?;
        self.reconcile(&travels);
        Ok(self.agents.len())
    }

    fn reconcile(&mut self, travels: &[Travel]) {
        let live: HashSet<TokenId> = travels.iter().map(|t| t.token_id).collect();
        let gone: Vec<TokenId> = self
            .agents
            .keys()
            .filter(|token_id| !live.contains(token_id))
            .copied()
            .collect();
        for token_id in gone {
            self.remove_exploring_frog(token_id);
        }
        for travel in travels {
            let registered = matches!(
                self.agents.get(&travel.token_id),
                Some(agent) if agent.travel_id == travel.id
            );
            if !registered {
                self.add_exploring_frog(ExploringAgent::from_travel(travel));
            }
        }
    }

    /// Refresh the active-address pools and the neighbour pool
    pub async fn refresh_pools(&mut self) {
        for (chain_id, client) in &self.targets {
            match client
                .recent_active_addresses(self.config.pool_sample_blocks, self.config.pool_max_addresses)
                .await
            {
                Ok(addresses) => {
                    tracing::debug!(chain_id, count = addresses.len(), "Active address pool updated");
                    self.selector.set_active_pool(*chain_id, addresses);
                }
                Err(e) => tracing::warn!(chain_id, %e, "Failed to refresh active address pool"),
            }
        }

        match self.store.list_frogs(NEIGHBOR_POOL_SIZE).await {
            Ok(frogs) => {
                let mut seen = HashSet::new();
                let neighbors: Vec<Neighbor> = frogs
                    .into_iter()
                    .filter(|f| seen.insert(f.owner))
                    .map(|f| Neighbor {
                        address: f.owner,
                        name: f.name,
                    })
                    .collect();
                tracing::debug!(count = neighbors.len(), "Neighbour pool updated");
                self.selector.set_neighbors(neighbors);
            }
            Err(e) => tracing::warn!(%e, "Failed to refresh neighbour pool"),
        }
    }

    async fn promote_stale_departures(&self, now: DateTime<Utc>) -> Result<Vec<TravelId>, StoreError> {
        let fallback = chrono::Duration::seconds(self.config.fallback_promotion_secs as i64);
        let stale = self
            .store
            .list_travels(&|t| {
                t.cross_chain_status == Some(CrossChainStatus::CrossingOut)
                    && !t.is_terminal()
                    && now - t.start_time > fallback
            })
            .await?;

        let mut promoted = Vec::new();
        for travel in stale {
            if self
                .lifecycle
                .promote_stale_departure(travel.id, now)
                .await?
                .is_applied()
            {
                promoted.push(travel.id);
            }
        }
        Ok(promoted)
    }

    pub async fn tick(&mut self) -> TickReport {
        self.tick_at(Utc::now()).await
    }

    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> TickReport {
        self.drain_commands();
        if self.ticks % self.config.pool_refresh_every_ticks.max(1) == 0 {
            self.refresh_pools().await;
        }
        self.ticks += 1;

        let mut report = TickReport::default();
        match self.promote_stale_departures(now).await {
            Ok(promoted) => report.promoted = promoted,
            Err(e) => tracing::error!(%e, "Fallback promotion failed"),
        }

        let travels = match self.exploring_travels().await {
            Ok(travels) => travels,
            Err(e) => {
                tracing::error!(%e, "Failed to load exploring travels");
                return report;
            }
        };
        self.reconcile(&travels);

        for travel in &travels {
            let step = match self.process_travel(travel, now).await {
                Ok(step) => step,
                Err(e) => {
                    tracing::error!(travel_id = travel.id, token_id = travel.token_id, %e, "Exploration tick failed for travel");
                    ExploreStep::Error(e.to_string())
                }
            };
            report.steps.push((travel.id, step));
        }
        report
    }

    async fn process_travel(&mut self, travel: &Travel, now: DateTime<Utc>) -> Result<ExploreStep, StoreError> {
        if travel.stage == TravelStage::Stranded {
            return Ok(ExploreStep::Stranded);
        }
        let Some(client) = self.targets.get(&travel.target_chain_id).cloned() else {
            tracing::warn!(travel_id = travel.id, chain_id = travel.target_chain_id, "No client for target chain");
            return Ok(ExploreStep::Error(
                ChainError::UnknownChain(travel.target_chain_id).to_string(),
            ));
        };

        // rescued frogs go straight home
        if travel.stage == TravelStage::Returning {
            return self.trigger_return(client.as_ref(), travel, "Rescued").await;
        }

        match client.should_return(travel.token_id).await {
            Ok(check) if check.should_return => {
                return self.trigger_return(client.as_ref(), travel, &check.reason).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(token_id = travel.token_id, %e, "shouldReturn check failed");
                return Ok(ExploreStep::Error(e.to_string()));
            }
        }

        let interval = self.exploration_interval(client.as_ref(), travel).await;
        let elapsed = (now - travel.last_action_time()).to_std().unwrap_or_default();
        if elapsed < interval {
            return Ok(ExploreStep::NotDue {
                remaining: interval - elapsed,
            });
        }

        self.explore(client.as_ref(), travel, now).await
    }

    async fn exploration_interval(&self, client: &dyn TargetChainClient, travel: &Travel) -> Duration {
        let policy = IntervalPolicy {
            testing_mode: self.config.testing_mode,
            testing_interval_secs: self.config.testing_interval_secs,
        };
        let tx_count = if self.config.testing_mode {
            None
        } else {
            match client.latest_block_tx_count().await {
                Ok(count) => Some(count),
                Err(e) => {
                    tracing::debug!(chain_id = travel.target_chain_id, %e, "Activity read failed, using neutral factor");
                    None
                }
            }
        };
        let multiplier = self
            .chains
            .get(travel.target_chain_id)
            .map(|c| c.activity_multiplier())
            .unwrap_or_else(|_| common::chains::default_activity_multiplier(travel.target_chain_id));
        let interval = policy.interval(travel.duration_secs, tx_count, multiplier);
        tracing::debug!(travel_id = travel.id, ?tx_count, multiplier, interval_secs = interval.as_secs(), "Exploration interval");
        interval
    }

    async fn ensure_explored(&mut self, travel: &Travel) -> Result<(), StoreError> {
        if self.explored.contains_key(&travel.id) {
            return Ok(());
        }
        let mut addresses: HashSet<Address> = self
            .store
            .interactions(travel.id)
            .await?
            .into_iter()
            .filter(|i| i.kind != InteractionKind::Virtual)
            .filter_map(|i| i.explored_address)
            .collect();
        addresses.insert(travel.owner);
        if let Some(wallet) = self.relay_wallet {
            addresses.insert(wallet);
        }
        tracing::debug!(travel_id = travel.id, count = addresses.len(), "Loaded explored addresses");
        self.explored.insert(travel.id, addresses);
        Ok(())
    }

    async fn explore(
        &mut self,
        client: &dyn TargetChainClient,
        travel: &Travel,
        now: DateTime<Utc>,
    ) -> Result<ExploreStep, StoreError> {
        self.ensure_explored(travel).await?;
        let chain_id = travel.target_chain_id;
        let gateway = self.home.clone().filter(|h| h.gateway_enabled());

        // direct mode lets the connector pick the address, so nothing is selected here
        let target = match gateway {
            Some(_) => {
                let excluded = self.explored.entry(travel.id).or_default();
                Some(self.selector.select(chain_id, excluded, &mut self.rng))
            }
            None => None,
        };
        let is_contract = match &target {
            Some(Target {
                landmark: Some(landmark),
                ..
            }) => landmark.category.is_contract(),
            Some(target) => client.is_contract(target.address).await.unwrap_or(false),
            None => false,
        };
        let chain_name = self
            .chains
            .get(chain_id)
            .map(|c| c.display_name())
            .unwrap_or_else(|_| common::chains::chain_name(chain_id));
        let observation = self
            .narrator
            .observation(&ObservationContext {
                token_id: travel.token_id,
                frog_name: travel.frog_name.clone(),
                chain_id,
                chain_name,
                target: target.as_ref().map(|t| t.address),
                is_contract,
                landmark: target.as_ref().and_then(|t| t.landmark),
                neighbor_name: target.as_ref().and_then(|t| t.neighbor_name.clone()),
            })
            .await;

        let executed = match (&gateway, &target) {
            (Some(home), Some(target)) => {
                Self::execute_gateway(home.as_ref(), travel, target, is_contract, observation, now).await
            }
            _ => Self::execute_direct(client, travel, observation, now).await,
        };
        let outcome = match executed {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(travel_id = travel.id, token_id = travel.token_id, %e, "Exploration failed, retrying next tick");
                return Ok(ExploreStep::Error(e.to_string()));
            }
        };

        if !self.lifecycle.record_exploration(travel.id, &outcome).await?.is_applied() {
            return Ok(ExploreStep::Superseded);
        }
        if !outcome.is_virtual() {
            self.explored
                .entry(travel.id)
                .or_default()
                .insert(outcome.record().target);
        }
        if let Some(agent) = self.agents.get_mut(&travel.token_id) {
            agent.last_action_time = now;
            agent.action_count += 1;
        }
        tracing::info!(
            travel_id = travel.id,
            token_id = travel.token_id,
            chain_id,
            target = %outcome.record().target,
            tx_hash = %outcome.record().tx_hash,
            is_virtual = outcome.is_virtual(),
            "🔭 Exploration recorded"
        );

        let stranded = match &self.rescue {
            Some(rescue) => rescue.check_and_trigger_stranded(travel.id).await?.is_some(),
            None => false,
        };
        Ok(ExploreStep::Explored {
            is_virtual: outcome.is_virtual(),
            stranded,
        })
    }

    /// Exploration through the home-chain gateway at a relay-chosen target
    async fn execute_gateway(
        home: &dyn HomeChainClient,
        travel: &Travel,
        target: &Target,
        is_contract: bool,
        observation: String,
        now: DateTime<Utc>,
    ) -> Result<ExplorationOutcome, ChainError> {
        let result = home.trigger_exploration(travel.token_id, &observation).await?;
        let record = ExplorationRecord {
            chain_id: travel.target_chain_id,
            target: target.address,
            is_contract,
            observation: result.observation,
            tx_hash: result.receipt.tx_hash,
            block_number: result.receipt.block_number,
            landmark: target.landmark,
            at: now,
        };
        Ok(if result.is_virtual {
            ExplorationOutcome::VirtualExploration(record)
        } else {
            ExplorationOutcome::RealExploration(record)
        })
    }

    /// Direct connector call; the address comes back in the receipt
    async fn execute_direct(
        client: &dyn TargetChainClient,
        travel: &Travel,
        observation: String,
        now: DateTime<Utc>,
    ) -> Result<ExplorationOutcome, ChainError> {
        let chain_id = travel.target_chain_id;
        let result = client.random_explore(travel.token_id, &observation).await?;
        Ok(ExplorationOutcome::RealExploration(ExplorationRecord {
            chain_id,
            target: result.explored_address,
            is_contract: result.is_contract,
            observation: result.observation,
            tx_hash: result.receipt.tx_hash,
            block_number: result.receipt.block_number,
            landmark: catalog::find_landmark(chain_id, result.explored_address).copied(),
            at: now,
        }))
    }

    async fn trigger_return(
        &mut self,
        client: &dyn TargetChainClient,
        travel: &Travel,
        reason: &str,
    ) -> Result<ExploreStep, StoreError> {
        match client.auto_return(travel.token_id).await {
            Ok(receipt) => {
                tracing::info!(token_id = travel.token_id, travel_id = travel.id, reason, tx_hash = %receipt.tx_hash, "Auto-return sent");
                self.lifecycle.force_return(travel.token_id, reason).await?;
                self.remove_exploring_frog(travel.token_id);
                Ok(ExploreStep::Returned {
                    reason: reason.to_string(),
                })
            }
            Err(e) => {
                tracing::error!(token_id = travel.token_id, %e, "Auto-return failed, retrying next tick");
                Ok(ExploreStep::Error(e.to_string()))
            }
        }
    }

    /// Tick until cancelled; registry commands are applied as they arrive
    pub async fn run(mut self, cancel_token: CancellationToken) {
        tracing::info!("🚀 Exploration scheduler started");
        tracing::info!("  Tick interval: {}s", self.config.tick_interval_secs);
        tracing::info!("  Testing mode: {}", self.config.testing_mode);

        match self.rehydrate().await {
            Ok(count) => tracing::info!(count, "Registry rehydrated from store"),
            Err(e) => tracing::error!(%e, "Failed to rehydrate registry"),
        }

        let mut tick_interval =
            tokio::time::interval(Duration::from_secs(self.config.tick_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    let report = self.tick_at(Utc::now()).await;
                    tracing::debug!(
                        exploring = self.agents.len(),
                        promoted = report.promoted.len(),
                        processed = report.steps.len(),
                        "⏰ Exploration tick"
                    );
                }
                Some(command) = self.commands.recv() => {
                    self.apply_command(command);
                }
                _ = cancel_token.cancelled() => {
                    tracing::info!("🛑 Exploration scheduler stopped");
                    break;
                }
            }
        }
    }
}
