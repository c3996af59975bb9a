//! Process wiring: builds every component once and owns their tasks

use crate::chain::{
    connect, AlloyHomeChain, AlloyTargetChain, ChainRegistry, HomeChainClient, TargetChainClient,
};
use crate::config::RelayConfig;
use crate::lifecycle::TravelLifecycleManager;
use crate::narrative::Narrator;
use crate::notify::BroadcastBus;
use crate::poller::ChainEventPoller;
use crate::rescue::{FriendshipOracle, RescueCoordinator, StaticFriendships};
use crate::scheduler::{ExplorationScheduler, SchedulerHandle};
use crate::store::InMemoryStore;
use alloy_primitives::Address;
use eyre::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Which background loops to start
#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    pub run_pollers: bool,
    pub run_scheduler: bool,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            run_pollers: true,
            run_scheduler: true,
        }
    }
}

pub struct Relay {
    config: RelayConfig,
    store: Arc<InMemoryStore>,
    notifier: Arc<BroadcastBus>,
    lifecycle: Arc<TravelLifecycleManager>,
    rescue: Arc<RescueCoordinator>,
    scheduler: ExplorationScheduler,
    pollers: Vec<ChainEventPoller>,
    cancel_token: CancellationToken,
}

impl Relay {
    /// Connect to every configured chain and restore the store snapshot
    pub async fn build(config: RelayConfig) -> Result<Self> {
        let store = Arc::new(
            InMemoryStore::open(&config.store.snapshot_path)
                .await
                .context("Failed to open store snapshot")?,
        );

        let key = config.private_key.as_deref();
        let timeout = config.polling.rpc_timeout_secs;

        let (home_provider, relay_wallet) =
            connect(&config.home.rpc_url, key).context("Failed to connect home chain")?;
        let home: Arc<dyn HomeChainClient> = Arc::new(AlloyHomeChain::new(
            config.home.omni_travel_address,
            home_provider,
            relay_wallet,
            config.dry_run,
            timeout,
            config.home.gateway_enabled,
            config.home.safety_reserve_wei,
        ));

        let mut targets: Vec<Arc<dyn TargetChainClient>> = Vec::with_capacity(config.chains.len());
        for chain in &config.chains {
            let (provider, signer) = connect(&chain.rpc_url, key)
                .with_context(|| format!("Failed to connect {}", chain.display_name()))?;
            targets.push(Arc::new(AlloyTargetChain::new(
                chain.chain_id,
                chain.connector_address,
                provider,
                signer,
                config.dry_run,
                timeout,
            )));
            tracing::info!(chain_id = chain.chain_id, name = %chain.display_name(), connector = %chain.connector_address, "Target chain configured");
        }

        if relay_wallet.is_none() {
            tracing::warn!("RELAY_PRIVATE_KEY not set, every write will fail");
        }

        Self::assemble(
            config,
            store,
            Some(home),
            targets,
            relay_wallet,
            Arc::new(StaticFriendships::new()),
        )
    }

    /// Wire components around already-built clients
    pub fn assemble(
        config: RelayConfig,
        store: Arc<InMemoryStore>,
        home: Option<Arc<dyn HomeChainClient>>,
        targets: Vec<Arc<dyn TargetChainClient>>,
        relay_wallet: Option<Address>,
        friendship: Arc<dyn FriendshipOracle>,
    ) -> Result<Self> {
        let registry = ChainRegistry::new(config.home.chain_id, config.chains.clone())
            .context("Invalid chain configuration")?;
        let notifier = Arc::new(BroadcastBus::default());
        let narrator = Arc::new(Narrator::templates_only());
        let lifecycle = Arc::new(TravelLifecycleManager::new(
            store.clone(),
            notifier.clone(),
            narrator.clone(),
        ));
        let rescue = Arc::new(RescueCoordinator::new(
            store.clone(),
            notifier.clone(),
            friendship,
            config.rescue.clone(),
        ));

        let mut scheduler = ExplorationScheduler::new(
            lifecycle.clone(),
            registry,
            narrator,
            config.exploration.clone(),
        )
        .with_rescue(rescue.clone())
        .with_relay_wallet(relay_wallet);
        if let Some(home) = &home {
            scheduler = scheduler.with_home_chain(home.clone());
        }
        for target in &targets {
            scheduler = scheduler.with_target_chain(target.clone());
        }

        let handle = scheduler.handle();
        let pollers = targets
            .into_iter()
            .map(|client| {
                let poller = ChainEventPoller::new(
                    client,
                    lifecycle.clone(),
                    handle.clone(),
                    config.polling.clone(),
                );
                match &home {
                    Some(home) => poller.with_home_chain(home.clone()),
                    None => poller,
                }
            })
            .collect();

        Ok(Self {
            config,
            store,
            notifier,
            lifecycle,
            rescue,
            scheduler,
            pollers,
            cancel_token: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<BroadcastBus> {
        &self.notifier
    }

    pub fn lifecycle(&self) -> &Arc<TravelLifecycleManager> {
        &self.lifecycle
    }

    pub fn rescue(&self) -> &Arc<RescueCoordinator> {
        &self.rescue
    }

    pub fn scheduler_handle(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    /// Spawn every loop, wait for cancellation, join, then flush the store
    /// one last time
    pub async fn run(self, options: RelayOptions) -> Result<()> {
        let Relay {
            store,
            rescue,
            scheduler,
            pollers,
            cancel_token,
            ..
        } = self;

        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        if options.run_pollers {
            for poller in pollers {
                handles.push(tokio::spawn(poller.run(cancel_token.clone())));
            }
        } else {
            tracing::warn!("Pollers disabled");
        }

        if options.run_scheduler {
            handles.push(tokio::spawn(scheduler.run(cancel_token.clone())));
        } else {
            // closes the command channel so poller registrations are discarded, not queued
            drop(scheduler);
            tracing::warn!("Exploration scheduler disabled");
        }

        handles.push(tokio::spawn(rescue.run(cancel_token.clone())));

        tracing::info!(tasks = handles.len(), "✅ Relay running");
        cancel_token.cancelled().await;

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(%e, "Task ended abnormally");
            }
        }

        store.save().await.context("Failed to write final store snapshot")?;
        tracing::info!("Relay stopped");
        Ok(())
    }
}
