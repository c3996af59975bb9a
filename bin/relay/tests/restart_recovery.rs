use alloy_primitives::B256;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use travel_relay::config::PollingConfig;
use travel_relay::lifecycle::TravelLifecycleManager;
use travel_relay::narrative::Narrator;
use travel_relay::poller::{ChainEventPoller, PollOutcome};
use travel_relay::scheduler::SchedulerHandle;
use travel_relay::store::{CrossChainStatus, InMemoryStore, TravelStore};
use travel_relay::test_utils::*;

async fn poller_on(
    path: &Path,
    chain: &Arc<MockTravelChain>,
) -> (Arc<InMemoryStore>, ChainEventPoller) {
    let store = Arc::new(InMemoryStore::open(path).await.unwrap());
    let lifecycle = Arc::new(TravelLifecycleManager::new(
        store.clone(),
        Arc::new(RecordingBus::new()),
        Arc::new(Narrator::templates_only()),
    ));
    let (handle, _commands) = SchedulerHandle::channel();
    let poller = ChainEventPoller::new(chain.clone(), lifecycle, handle, PollingConfig::default())
        .with_home_chain(chain.clone());
    (store, poller)
}

#[tokio::test]
async fn completed_unlock_not_repeated_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let chain = Arc::new(MockTravelChain::new(TARGET_CHAIN_ID));
    let return_id = B256::repeat_byte(0x99);

    let travel_id = {
        let (store, mut poller) = poller_on(&path, &chain).await;
        let travel = seed_travel(store.as_ref(), 1, Utc::now(), 3600).await;
        store.save_checkpoint(TARGET_CHAIN_ID, 100).await.unwrap();

        chain.push_event(arrival_event(TARGET_CHAIN_ID, 105, 1, outbound_message_id(1)));
        chain.push_event(return_event(TARGET_CHAIN_ID, 115, 1, return_id, 25));
        chain.set_block_number(120);
        poller.tick().await.unwrap();
        assert_eq!(chain.unlocks().len(), 1);
        // process stops here without a final save
        travel.id
    };

    // a second unlock would revert on chain
    chain.set_fail_unlock(Some("execution reverted: not locked"));

    let (store, mut poller) = poller_on(&path, &chain).await;
    assert_eq!(store.checkpoint(TARGET_CHAIN_ID).await.unwrap(), Some(120));
    assert_eq!(
        poller.tick().await.unwrap(),
        PollOutcome::UpToDate { block: 120 }
    );

    assert_eq!(chain.unlocks().len(), 1);
    let stored = store.travel(travel_id).await.unwrap().unwrap();
    assert_eq!(stored.cross_chain_status, Some(CrossChainStatus::Completed));
    assert_eq!(stored.error_message, None);
}

#[tokio::test]
async fn interrupted_unlock_finished_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let chain = Arc::new(MockTravelChain::new(TARGET_CHAIN_ID));
    let return_id = B256::repeat_byte(0x42);

    let travel_id = {
        let store = Arc::new(InMemoryStore::open(&path).await.unwrap());
        let travel = seed_travel(store.as_ref(), 1, Utc::now(), 3600).await;
        store.save_checkpoint(TARGET_CHAIN_ID, 100).await.unwrap();
        let lifecycle = TravelLifecycleManager::new(
            store.clone(),
            Arc::new(RecordingBus::new()),
            Arc::new(Narrator::templates_only()),
        );
        lifecycle
            .apply_arrival(TARGET_CHAIN_ID, outbound_message_id(1), travel.owner, Utc::now())
            .await
            .unwrap();
        lifecycle
            .apply_return(TARGET_CHAIN_ID, 1, return_id, 30)
            .await
            .unwrap();
        // stopped before the home-chain unlock
        travel.id
    };

    chain.push_event(arrival_event(TARGET_CHAIN_ID, 105, 1, outbound_message_id(1)));
    chain.push_event(return_event(TARGET_CHAIN_ID, 115, 1, return_id, 30));
    chain.set_block_number(120);

    let (store, mut poller) = poller_on(&path, &chain).await;
    for _ in 0..3 {
        poller.tick().await.unwrap();
    }

    assert_eq!(chain.unlocks(), vec![(1, return_id, 30)]);
    let stored = store.travel(travel_id).await.unwrap().unwrap();
    assert_eq!(stored.cross_chain_status, Some(CrossChainStatus::Completed));
    assert_eq!(store.checkpoint(TARGET_CHAIN_ID).await.unwrap(), Some(120));
}
