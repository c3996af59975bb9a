use alloy_primitives::B256;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use travel_relay::chain::ChainRegistry;
use travel_relay::config::{ExplorationConfig, PollingConfig, RescueConfig};
use travel_relay::lifecycle::TravelLifecycleManager;
use travel_relay::narrative::Narrator;
use travel_relay::notify::RelayNotification;
use travel_relay::poller::ChainEventPoller;
use travel_relay::rescue::{RescueCoordinator, RescueDecline, RescueResult, StaticFriendships};
use travel_relay::scheduler::{ExplorationScheduler, ExploreStep};
use travel_relay::store::{
    CrossChainStatus, FrogStatus, InMemoryStore, InteractionKind, RescueStatus, TravelStage,
    TravelStatus, TravelStore,
};
use travel_relay::test_utils::*;

struct World {
    chain: Arc<MockTravelChain>,
    store: Arc<InMemoryStore>,
    bus: Arc<RecordingBus>,
    friends: Arc<StaticFriendships>,
    rescue: Arc<RescueCoordinator>,
    poller: ChainEventPoller,
    scheduler: ExplorationScheduler,
}

fn world(strand_chance: f64) -> World {
    let chain = Arc::new(MockTravelChain::new(TARGET_CHAIN_ID));
    let store = Arc::new(InMemoryStore::new());
    let bus = Arc::new(RecordingBus::new());
    let friends = Arc::new(StaticFriendships::new());
    let narrator = Arc::new(Narrator::templates_only());
    let lifecycle = Arc::new(TravelLifecycleManager::new(
        store.clone(),
        bus.clone(),
        narrator.clone(),
    ));
    let rescue = Arc::new(RescueCoordinator::with_rng(
        store.clone(),
        bus.clone(),
        friends.clone(),
        RescueConfig {
            strand_chance,
            ..Default::default()
        },
        StdRng::seed_from_u64(99),
    ));
    let scheduler = ExplorationScheduler::new(
        lifecycle.clone(),
        ChainRegistry::new(HOME_CHAIN_ID, vec![chain_config(TARGET_CHAIN_ID)]).unwrap(),
        narrator,
        ExplorationConfig {
            testing_mode: true,
            ..Default::default()
        },
    )
    .with_target_chain(chain.clone())
    .with_rescue(rescue.clone())
    .with_rng(StdRng::seed_from_u64(3));
    let poller = ChainEventPoller::new(
        chain.clone(),
        lifecycle,
        scheduler.handle(),
        PollingConfig::default(),
    )
    .with_home_chain(chain.clone())
    .with_start_block(0);

    World {
        chain,
        store,
        bus,
        friends,
        rescue,
        poller,
        scheduler,
    }
}

#[tokio::test]
async fn arrival_locks_frog_and_registers_explorer() {
    let mut w = world(0.0);
    let travel = seed_travel(w.store.as_ref(), 1, Utc::now(), 3600).await;

    w.chain.push_event(arrival_event(TARGET_CHAIN_ID, 10, 1, outbound_message_id(1)));
    w.chain.set_block_number(20);
    w.poller.tick().await.unwrap();

    let stored = w.store.travel(travel.id).await.unwrap().unwrap();
    assert_eq!(stored.cross_chain_status, Some(CrossChainStatus::OnTargetChain));
    assert_eq!(stored.stage, TravelStage::Exploring);
    assert_eq!(
        w.store.frog(1).await.unwrap().unwrap().status,
        FrogStatus::CrossChainLocked
    );

    w.scheduler.tick_at(Utc::now()).await;
    assert!(w.scheduler.is_exploring(1));
}

#[tokio::test]
async fn provisions_exhausted_returns_home_without_exploring() {
    let mut w = world(0.0);
    let now = Utc::now();
    let travel = seed_travel(w.store.as_ref(), 1, now - Duration::hours(1), 3600).await;
    w.chain.push_event(arrival_event(TARGET_CHAIN_ID, 10, 1, outbound_message_id(1)));
    w.chain.set_block_number(20);
    w.poller.tick().await.unwrap();

    w.chain.set_should_return(1, "Provisions depleted");
    let report = w.scheduler.tick_at(now + Duration::hours(1)).await;
    assert!(matches!(report.step(travel.id), Some(ExploreStep::Returned { .. })));
    assert!(w.chain.direct_explorations().is_empty());
    assert!(!w.scheduler.is_exploring(1));

    // the connector emits the return once autoReturnFrog lands
    let return_id = B256::repeat_byte(0x42);
    w.chain.push_event(return_event(TARGET_CHAIN_ID, 30, 1, return_id, 18));
    w.chain.set_block_number(40);
    w.poller.tick().await.unwrap();

    let stored = w.store.travel(travel.id).await.unwrap().unwrap();
    assert_eq!(stored.cross_chain_status, Some(CrossChainStatus::Completed));
    assert_eq!(stored.status, TravelStatus::Completed);
    assert_eq!(stored.return_message_id, Some(return_id));
    assert!(stored.actions.is_empty());
    assert_eq!(w.chain.unlocks(), vec![(1, return_id, 18)]);

    let frog = w.store.frog(1).await.unwrap().unwrap();
    assert_eq!(frog.status, FrogStatus::Idle);
    assert_eq!(frog.xp, 18);
}

#[tokio::test]
async fn duplicate_return_event_changes_nothing() {
    let mut w = world(0.0);
    let travel = seed_travel(w.store.as_ref(), 1, Utc::now(), 3600).await;
    let return_id = B256::repeat_byte(0x42);
    w.chain.push_event(arrival_event(TARGET_CHAIN_ID, 10, 1, outbound_message_id(1)));
    w.chain.push_event(return_event(TARGET_CHAIN_ID, 12, 1, return_id, 30));
    w.chain.push_event(return_event(TARGET_CHAIN_ID, 14, 1, return_id, 30));
    w.chain.set_block_number(20);
    w.poller.tick().await.unwrap();

    let stored = w.store.travel(travel.id).await.unwrap().unwrap();
    assert_eq!(stored.cross_chain_status, Some(CrossChainStatus::Completed));
    assert_eq!(w.chain.unlocks().len(), 1);
    assert_eq!(w.store.frog(1).await.unwrap().unwrap().xp, 30);
    assert_eq!(
        w.bus.count(|n| matches!(n, RelayNotification::Completed { .. })),
        1
    );
}

#[tokio::test]
async fn missing_arrival_promoted_exactly_once() {
    let mut w = world(0.0);
    let now = Utc::now();
    let travel = seed_travel(w.store.as_ref(), 1, now - Duration::minutes(3), 3600).await;

    let report = w.scheduler.tick_at(now).await;
    assert_eq!(report.promoted, vec![travel.id]);

    // the real arrival shows up late
    w.chain.push_event(arrival_event(TARGET_CHAIN_ID, 10, 1, outbound_message_id(1)));
    w.chain.set_block_number(20);
    w.poller.tick().await.unwrap();

    let report = w.scheduler.tick_at(now + Duration::seconds(90)).await;
    assert!(report.promoted.is_empty());
    assert_eq!(
        w.bus.count(|n| matches!(n, RelayNotification::Arrived { .. })),
        1
    );
    let stored = w.store.travel(travel.id).await.unwrap().unwrap();
    assert_eq!(stored.cross_chain_status, Some(CrossChainStatus::OnTargetChain));
}

#[tokio::test]
async fn stranded_frog_rescued_and_sent_home() {
    let mut w = world(1.0);
    let now = Utc::now();
    let travel = seed_travel(w.store.as_ref(), 1, now - Duration::minutes(10), 3600).await;
    seed_frog(w.store.as_ref(), 2, FrogStatus::Idle).await;
    w.friends.add(1, 2);

    w.scheduler.tick_at(now).await;
    let report = w.scheduler.tick_at(now + Duration::minutes(2)).await;
    assert_eq!(
        report.step(travel.id),
        Some(&ExploreStep::Explored {
            is_virtual: false,
            stranded: true
        })
    );

    // further ticks neither explore nor create another request
    let explored = w.chain.direct_explorations().len();
    w.scheduler.tick_at(now + Duration::minutes(10)).await;
    assert_eq!(w.chain.direct_explorations().len(), explored);
    let requests = w.store.list_rescue_requests(&|_| true).await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].status, RescueStatus::Pending);

    let result = w.rescue.perform_rescue(requests[0].id, 2).await.unwrap();
    assert!(matches!(result, RescueResult::Rescued { .. }));
    let again = w.rescue.perform_rescue(requests[0].id, 2).await.unwrap();
    assert!(matches!(again, RescueResult::Declined(_)));

    let report = w.scheduler.tick_at(now + Duration::minutes(12)).await;
    assert_eq!(
        report.step(travel.id),
        Some(&ExploreStep::Returned {
            reason: "Rescued".to_string()
        })
    );
    let stored = w.store.travel(travel.id).await.unwrap().unwrap();
    assert_eq!(stored.cross_chain_status, Some(CrossChainStatus::CrossingBack));
    assert_eq!(w.store.list_rescue_requests(&|_| true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn pending_request_goes_public_after_grace_window() {
    let w = world(1.0);
    let travel = seed_travel(w.store.as_ref(), 1, Utc::now(), 3600).await;
    let request = w
        .rescue
        .check_and_trigger_stranded(travel.id)
        .await
        .unwrap()
        .unwrap();

    for minutes in [0, 60, 180, 239] {
        let at = request.requested_at + Duration::minutes(minutes);
        assert!(w.rescue.sweep_expired_at(at).await.unwrap().is_empty());
    }
    let after = request.requested_at + Duration::hours(4) + Duration::minutes(1);
    assert_eq!(w.rescue.sweep_expired_at(after).await.unwrap(), vec![request.id]);

    let stored = w.store.rescue_request(request.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RescueStatus::Public);
    assert_eq!(w.rescue.list_public_requests(20).await.unwrap().len(), 1);
}

#[tokio::test]
async fn explorations_never_revisit_an_address() {
    let mut w = world(0.0);
    let start = Utc::now();
    let travel = seed_travel(w.store.as_ref(), 1, start - Duration::minutes(3), 24 * 3600).await;

    for i in 0..10 {
        w.scheduler.tick_at(start + Duration::minutes(2 * i)).await;
    }

    let stored = w.store.travel(travel.id).await.unwrap().unwrap();
    assert!(stored.actions.len() >= 9);
    let mut seen = std::collections::HashSet::new();
    for action in &stored.actions {
        assert!(seen.insert(action.target));
    }
    let explored = w.scheduler.explored_addresses(travel.id).unwrap();
    assert!(seen.iter().all(|a| explored.contains(a)));
}

#[tokio::test]
async fn direct_exploration_logged_once() {
    let mut w = world(0.0);
    let now = Utc::now();
    let travel = seed_travel(w.store.as_ref(), 1, now - Duration::minutes(10), 3600).await;
    w.chain.push_event(arrival_event(TARGET_CHAIN_ID, 10, 1, outbound_message_id(1)));
    w.chain.set_block_number(20);
    w.poller.tick().await.unwrap();

    w.chain.set_block_number(25);
    w.scheduler.tick_at(now).await;
    w.scheduler.tick_at(now + Duration::minutes(2)).await;
    let explored = w.chain.direct_explorations().len();
    assert!(explored >= 1);

    // the poller now sees the connector's own log for each exploration
    w.poller.tick().await.unwrap();

    let interactions = w.store.interactions(travel.id).await.unwrap();
    assert_eq!(interactions.len(), explored);
    assert!(interactions.iter().all(|i| i.kind == InteractionKind::Real));
    assert_eq!(
        w.bus.count(|n| matches!(n, RelayNotification::Interaction { .. })),
        explored
    );
}

#[tokio::test]
async fn rescue_declined_after_frog_returned() {
    let mut w = world(1.0);
    let now = Utc::now();
    let travel = seed_travel(w.store.as_ref(), 1, now - Duration::minutes(10), 3600).await;
    seed_frog(w.store.as_ref(), 2, FrogStatus::Idle).await;
    w.friends.add(1, 2);

    w.scheduler.tick_at(now).await;
    w.scheduler.tick_at(now + Duration::minutes(2)).await;
    let requests = w.store.list_rescue_requests(&|_| true).await.unwrap();
    assert_eq!(requests.len(), 1);

    let return_id = B256::repeat_byte(0x51);
    w.chain.push_event(return_event(TARGET_CHAIN_ID, 30, 1, return_id, 12));
    w.chain.set_block_number(40);
    w.poller.tick().await.unwrap();
    let stored = w.store.travel(travel.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TravelStatus::Completed);

    let result = w.rescue.perform_rescue(requests[0].id, 2).await.unwrap();
    assert_eq!(result, RescueResult::Declined(RescueDecline::NotStranded));
    let rescuer = w.store.frog(2).await.unwrap().unwrap();
    assert_eq!(rescuer.xp, 0);
    assert_eq!(
        w.bus.count(|n| matches!(n, RelayNotification::RescueOutcome { .. })),
        0
    );
}
