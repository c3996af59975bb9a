//! Per-chain connector event poller.
//!
//! Scans a bounded block range per tick, hands every decoded event to the
//! lifecycle manager in (block, log index) order and only then advances the
//! persisted checkpoint. Any failure leaves the checkpoint where it was, so
//! the same range is scanned again on the next tick.

use crate::chain::{ChainError, ConnectorEvent, HomeChainClient, TargetChainClient};
use crate::config::PollingConfig;
use crate::lifecycle::{TransitionOutcome, TravelLifecycleManager};
use crate::scheduler::{ExploringAgent, SchedulerHandle};
use crate::store::{CrossChainStatus, StoreError, Travel, TravelStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum PollError {
    Chain(ChainError),
    Store(StoreError),
}

impl std::fmt::Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollError::Chain(e) => write!(f, "Chain error: {}", e),
            PollError::Store(e) => write!(f, "Store error: {}", e),
        }
    }
}

impl std::error::Error for PollError {}

impl From<ChainError> for PollError {
    fn from(err: ChainError) -> Self {
        PollError::Chain(err)
    }
}

impl From<StoreError> for PollError {
    fn from(err: StoreError) -> Self {
        PollError::Store(err)
    }
}

/// Result of one poll tick
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Nothing new since the checkpoint
    UpToDate { block: u64 },
    /// Range scanned and checkpoint advanced to `to`
    Scanned { from: u64, to: u64, events: usize },
}

pub struct ChainEventPoller {
    chain_id: u64,
    client: Arc<dyn TargetChainClient>,
    home: Option<Arc<dyn HomeChainClient>>,
    lifecycle: Arc<TravelLifecycleManager>,
    scheduler: SchedulerHandle,
    store: Arc<dyn TravelStore>,
    config: PollingConfig,
    last_processed_block: Option<u64>,
}

impl ChainEventPoller {
    pub fn new(
        client: Arc<dyn TargetChainClient>,
        lifecycle: Arc<TravelLifecycleManager>,
        scheduler: SchedulerHandle,
        config: PollingConfig,
    ) -> Self {
        Self {
            chain_id: client.chain_id(),
            store: lifecycle.store().clone(),
            client,
            home: None,
            lifecycle,
            scheduler,
            config,
            last_processed_block: None,
        }
    }

    /// Home chain used to unlock returning frogs. Without it returns stay
    /// CROSSING_BACK.
    pub fn with_home_chain(mut self, home: Arc<dyn HomeChainClient>) -> Self {
        self.home = Some(home);
        self
    }

    pub fn with_start_block(mut self, block: u64) -> Self {
        self.last_processed_block = Some(block);
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn last_processed_block(&self) -> Option<u64> {
        self.last_processed_block
    }

    /// Resume from the persisted checkpoint, or from the chain head on a
    /// first run
    async fn initialize(&mut self) -> Result<u64, PollError> {
        let block = match self.store.checkpoint(self.chain_id).await? {
            Some(block) => {
                tracing::info!(chain_id = self.chain_id, block, "Resuming from checkpoint");
                block
            }
            None => {
                let head = self.client.block_number().await?;
                self.store.save_checkpoint(self.chain_id, head).await?;
                tracing::info!(chain_id = self.chain_id, block = head, "No checkpoint, starting at chain head");
                head
            }
        };
        self.last_processed_block = Some(block);
        Ok(block)
    }

    pub async fn tick(&mut self) -> Result<PollOutcome, PollError> {
        let last = match self.last_processed_block {
            Some(block) => block,
            None => self.initialize().await?,
        };

        let current = self.client.block_number().await?;
        if current <= last {
            return Ok(PollOutcome::UpToDate { block: last });
        }

        let from = last + 1;
        let to = current.min(last + self.config.max_block_range.max(1));
        let events = self.client.connector_events(from, to).await?;
        tracing::debug!(chain_id = self.chain_id, from, to, count = events.len(), "Scanned connector events");

        for event in &events {
            self.dispatch(event).await?;
        }

        self.store.save_checkpoint(self.chain_id, to).await?;
        self.last_processed_block = Some(to);
        Ok(PollOutcome::Scanned {
            from,
            to,
            events: events.len(),
        })
    }

    async fn dispatch(&self, event: &ConnectorEvent) -> Result<(), StoreError> {
        let meta = event.meta();
        tracing::debug!(chain_id = self.chain_id, block = meta.block_number, log_index = meta.log_index, token_id = event.token_id(), "📥 {}", event.name());

        match event {
            ConnectorEvent::Arrived(arrived) => {
                let outcome = self
                    .lifecycle
                    .apply_arrival(self.chain_id, arrived.message_id, arrived.owner, arrived.timestamp)
                    .await?;
                if let TransitionOutcome::Applied(travel) = outcome {
                    self.scheduler
                        .add_exploring_frog(ExploringAgent::from_travel(&travel));
                }
            }
            ConnectorEvent::Exploration(exploration) => {
                self.lifecycle.apply_exploration_observation(exploration).await?;
            }
            ConnectorEvent::Returned(returned) => {
                let outcome = self
                    .lifecycle
                    .apply_return(self.chain_id, returned.token_id, returned.message_id, returned.xp_earned)
                    .await?;
                match outcome {
                    TransitionOutcome::Applied(travel) => {
                        self.scheduler.remove_exploring_frog(travel.token_id);
                        self.unlock(&travel).await?;
                    }
                    // return was recorded but the unlock never finished
                    TransitionOutcome::Stale {
                        travel_id,
                        status: Some(CrossChainStatus::CrossingBack),
                    } => {
                        if let Some(travel) = self.store.travel(travel_id).await? {
                            if travel.return_message_id == Some(returned.message_id)
                                && travel.unlock_tx_hash.is_none()
                            {
                                tracing::info!(travel_id, token_id = travel.token_id, "Resuming unlock for recorded return");
                                self.unlock(&travel).await?;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    async fn unlock(&self, travel: &Travel) -> Result<(), StoreError> {
        let Some(home) = &self.home else {
            tracing::warn!(travel_id = travel.id, token_id = travel.token_id, "No home chain client, frog left CROSSING_BACK");
            return Ok(());
        };
        let Some(return_message_id) = travel.return_message_id else {
            return Ok(());
        };

        let result = home
            .unlock_frog(travel.token_id, return_message_id, travel.xp_earned)
            .await;
        self.lifecycle.complete_return(travel.id, result).await?;
        Ok(())
    }

    /// Poll on a fixed interval until cancelled. Errors are logged and the
    /// range retried on the next tick.
    pub async fn run(mut self, cancel_token: CancellationToken) {
        tracing::info!("🔄 Poller started for chain {}", self.chain_id);
        tracing::info!("  Polling interval: {}s", self.config.interval_secs);
        tracing::info!("  Max block range: {}", self.config.max_block_range);

        let mut poll_interval =
            tokio::time::interval(Duration::from_secs(self.config.interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    match self.tick().await {
                        Ok(PollOutcome::Scanned { from, to, events }) if events > 0 => {
                            tracing::info!(chain_id = self.chain_id, from, to, events, "Processed connector events");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(chain_id = self.chain_id, %e, "Poll failed, retrying next tick");
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    tracing::info!("🛑 Poller for chain {} stopped", self.chain_id);
                    break;
                }
            }
        }
    }
}
