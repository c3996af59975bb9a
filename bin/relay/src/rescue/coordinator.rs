//! Stranding and rescue.
//!
//! A frog can get lost on the target chain after an exploration. Its owner's
//! friends get a grace window to bring it home; after that the request goes
//! public and anyone may help. One request per travel, ever.

use super::friendship::FriendshipOracle;
use crate::config::RescueConfig;
use crate::lifecycle::transitions;
use crate::notify::{NotificationBus, RelayNotification};
use crate::store::{
    FrogPatch, RescueId, RescueRequest, RescueStatus, RescuerType, StoreError, TokenId,
    TravelId, TravelStage, TravelStore,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// XP the stranded frog would have lost; rescuers take a share of it
pub const BASE_LOSS_XP: u64 = 50;
pub const FRIEND_SHARE_PERCENT: u8 = 30;
pub const STRANGER_SHARE_PERCENT: u8 = 20;
pub const RESCUE_REPUTATION: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescueDecline {
    NotFound,
    AlreadyRescued,
    /// Request is still in the friends-only window
    FriendsOnly,
    OwnFrog,
    UnknownRescuer,
    /// Travel already went home or ended
    NotStranded,
}

impl std::fmt::Display for RescueDecline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RescueDecline::NotFound => write!(f, "Rescue request not found"),
            RescueDecline::AlreadyRescued => write!(f, "Already rescued"),
            RescueDecline::FriendsOnly => write!(f, "Only friends can rescue at this stage"),
            RescueDecline::OwnFrog => write!(f, "A frog cannot rescue itself"),
            RescueDecline::UnknownRescuer => write!(f, "Rescuer frog not found"),
            RescueDecline::NotStranded => write!(f, "Frog is no longer stranded"),
        }
    }
}

/// Result of a rescue attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RescueResult {
    Rescued {
        rescue_id: RescueId,
        travel_id: TravelId,
        rescuer_type: RescuerType,
        xp_earned: u64,
        reputation_earned: u64,
    },
    /// Nothing was written
    Declined(RescueDecline),
}

pub struct RescueCoordinator {
    store: Arc<dyn TravelStore>,
    notifier: Arc<dyn NotificationBus>,
    friendship: Arc<dyn FriendshipOracle>,
    config: RescueConfig,
    rng: Mutex<StdRng>,
}

impl RescueCoordinator {
    pub fn new(
        store: Arc<dyn TravelStore>,
        notifier: Arc<dyn NotificationBus>,
        friendship: Arc<dyn FriendshipOracle>,
        config: RescueConfig,
    ) -> Self {
        Self::with_rng(store, notifier, friendship, config, StdRng::from_entropy())
    }

    pub fn with_rng(
        store: Arc<dyn TravelStore>,
        notifier: Arc<dyn NotificationBus>,
        friendship: Arc<dyn FriendshipOracle>,
        config: RescueConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            notifier,
            friendship,
            config,
            rng: Mutex::new(rng),
        }
    }

    fn grace_period(&self) -> Duration {
        Duration::seconds(self.config.grace_period_secs as i64)
    }

    /// Roll for stranding after an exploration. Returns the new request if
    /// the frog got lost.
    pub async fn check_and_trigger_stranded(
        &self,
        travel_id: TravelId,
    ) -> Result<Option<RescueRequest>, StoreError> {
        let Some(travel) = self.store.travel(travel_id).await? else {
            return Ok(None);
        };
        if !travel.is_cross_chain() || travel.is_terminal() {
            return Ok(None);
        }
        if self
            .store
            .list_rescue_requests(&|r| r.travel_id == travel_id)
            .await?
            .first()
            .is_some()
        {
            return Ok(None);
        }

        let roll: f64 = self.rng.lock().gen();
        if roll >= self.config.strand_chance {
            return Ok(None);
        }

        let now = Utc::now();
        let mut created = None;
        self.store
            .transaction(&mut |tx| {
                created = None;
                if tx.rescue_for_travel(travel_id).is_some() {
                    return Ok(());
                }
                let request = tx.create_rescue(travel_id, travel.token_id, now)?;
                transitions::mark_stranded(tx, travel_id)?;
                created = Some(request);
                Ok(())
            })
            .await?;

        if let Some(request) = &created {
            tracing::info!(travel_id, token_id = travel.token_id, rescue_id = request.id, chain_id = travel.target_chain_id, "😱 Frog stranded on target chain");
            self.notifier.publish(RelayNotification::Stranded {
                token_id: travel.token_id,
                travel_id,
                rescue_id: request.id,
            });
        }
        Ok(created)
    }

    pub async fn perform_rescue(
        &self,
        rescue_id: RescueId,
        rescuer_token_id: TokenId,
    ) -> Result<RescueResult, StoreError> {
        let Some(request) = self.store.rescue_request(rescue_id).await? else {
            return Ok(RescueResult::Declined(RescueDecline::NotFound));
        };
        if request.status == RescueStatus::Rescued {
            return Ok(RescueResult::Declined(RescueDecline::AlreadyRescued));
        }
        if request.stranded_token_id == rescuer_token_id {
            return Ok(RescueResult::Declined(RescueDecline::OwnFrog));
        }

        let is_friend = self
            .friendship
            .is_friend(rescuer_token_id, request.stranded_token_id)
            .await;
        if !is_friend && request.status != RescueStatus::Public {
            return Ok(RescueResult::Declined(RescueDecline::FriendsOnly));
        }

        let (rescuer_type, share) = if is_friend {
            (RescuerType::Friend, FRIEND_SHARE_PERCENT)
        } else {
            (RescuerType::Stranger, STRANGER_SHARE_PERCENT)
        };
        let xp_earned = BASE_LOSS_XP * share as u64 / 100;
        let now = Utc::now();

        let mut result = RescueResult::Declined(RescueDecline::NotFound);
        self.store
            .transaction(&mut |tx| {
                result = RescueResult::Declined(RescueDecline::NotFound);
                let Some(current) = tx.rescue(rescue_id) else {
                    return Ok(());
                };
                if current.status == RescueStatus::Rescued {
                    result = RescueResult::Declined(RescueDecline::AlreadyRescued);
                    return Ok(());
                }
                let still_stranded = tx
                    .travel(current.travel_id)
                    .is_some_and(|t| !t.is_terminal() && t.stage == TravelStage::Stranded);
                if !still_stranded {
                    result = RescueResult::Declined(RescueDecline::NotStranded);
                    return Ok(());
                }
                if tx.frog(rescuer_token_id).is_none() {
                    result = RescueResult::Declined(RescueDecline::UnknownRescuer);
                    return Ok(());
                }

                tx.update_rescue(RescueRequest {
                    status: RescueStatus::Rescued,
                    rescued_at: Some(now),
                    rescuer_token_id: Some(rescuer_token_id),
                    rescuer_type: Some(rescuer_type),
                    rescuer_share: Some(share),
                    rescuer_xp: Some(xp_earned),
                    rescuer_reputation: Some(RESCUE_REPUTATION),
                    ..current.clone()
                })?;
                transitions::mark_rescued(tx, current.travel_id)?;
                tx.update_frog(
                    rescuer_token_id,
                    FrogPatch {
                        status: None,
                        add_xp: xp_earned,
                        add_reputation: RESCUE_REPUTATION,
                    },
                )?;
                result = RescueResult::Rescued {
                    rescue_id,
                    travel_id: current.travel_id,
                    rescuer_type,
                    xp_earned,
                    reputation_earned: RESCUE_REPUTATION,
                };
                Ok(())
            })
            .await?;

        match &result {
            RescueResult::Rescued { travel_id, .. } => {
                tracing::info!(rescue_id, travel_id, rescuer_token_id, ?rescuer_type, xp_earned, "🎉 Frog rescued");
                self.notifier.publish(RelayNotification::RescueOutcome {
                    token_id: request.stranded_token_id,
                    travel_id: *travel_id,
                    rescue_id,
                    rescuer_token_id,
                    rescuer_type,
                });
            }
            RescueResult::Declined(reason) => {
                tracing::debug!(rescue_id, rescuer_token_id, %reason, "Rescue declined");
            }
        }
        Ok(result)
    }

    /// Open Pending requests older than the grace window to everyone
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<Vec<RescueId>, StoreError> {
        let grace = self.grace_period();
        let expired = self
            .store
            .list_rescue_requests(&|r| {
                r.status == RescueStatus::Pending && now - r.requested_at > grace
            })
            .await?;

        let mut promoted = Vec::new();
        for request in expired {
            let mut changed = false;
            self.store
                .transaction(&mut |tx| {
                    changed = false;
                    let Some(current) = tx.rescue(request.id) else {
                        return Ok(());
                    };
                    if current.status != RescueStatus::Pending {
                        return Ok(());
                    }
                    tx.update_rescue(RescueRequest {
                        status: RescueStatus::Public,
                        public_at: Some(now),
                        ..current
                    })?;
                    changed = true;
                    Ok(())
                })
                .await?;
            if changed {
                tracing::info!(rescue_id = request.id, travel_id = request.travel_id, "Rescue request opened to the public");
                promoted.push(request.id);
            }
        }
        Ok(promoted)
    }

    pub async fn sweep_expired(&self) -> Result<Vec<RescueId>, StoreError> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// Public requests, longest waiting first
    pub async fn list_public_requests(&self, limit: usize) -> Result<Vec<RescueRequest>, StoreError> {
        let mut requests = self
            .store
            .list_rescue_requests(&|r| r.status == RescueStatus::Public)
            .await?;
        requests.sort_by_key(|r| (r.public_at, r.id));
        requests.truncate(limit);
        Ok(requests)
    }

    /// Pending requests of this frog's friends, oldest first
    pub async fn list_friend_requests(&self, token_id: TokenId) -> Result<Vec<RescueRequest>, StoreError> {
        let friends = self.friendship.friends_of(token_id).await;
        if friends.is_empty() {
            return Ok(Vec::new());
        }
        let mut requests = self
            .store
            .list_rescue_requests(&|r| {
                r.status == RescueStatus::Pending && friends.contains(&r.stranded_token_id)
            })
            .await?;
        requests.sort_by_key(|r| (r.requested_at, r.id));
        Ok(requests)
    }

    /// Periodic grace-window sweep until cancelled
    pub async fn run(self: Arc<Self>, cancel_token: CancellationToken) {
        let mut sweep_interval =
            tokio::time::interval(std::time::Duration::from_secs(self.config.sweep_interval_secs.max(1)));
        tracing::info!(interval_secs = self.config.sweep_interval_secs, "🛟 Rescue sweep started");

        loop {
            tokio::select! {
                _ = sweep_interval.tick() => {
                    if let Err(e) = self.sweep_expired().await {
                        tracing::error!(%e, "Rescue sweep failed");
                    }
                }
                _ = cancel_token.cancelled() => {
                    tracing::info!("Rescue sweep stopped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rescue::StaticFriendships;
    use crate::store::{CrossChainStatus, FrogStatus, InMemoryStore, TravelPatch, TravelStatus};
    use crate::test_utils::{seed_frog, seed_travel, RecordingBus};

    struct Harness {
        store: Arc<InMemoryStore>,
        bus: Arc<RecordingBus>,
        friends: Arc<StaticFriendships>,
        coordinator: RescueCoordinator,
    }

    fn harness(strand_chance: f64) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let bus = Arc::new(RecordingBus::new());
        let friends = Arc::new(StaticFriendships::new());
        let coordinator = RescueCoordinator::with_rng(
            store.clone(),
            bus.clone(),
            friends.clone(),
            RescueConfig {
                strand_chance,
                grace_period_secs: 4 * 3600,
                sweep_interval_secs: 300,
            },
            StdRng::seed_from_u64(11),
        );
        Harness {
            store,
            bus,
            friends,
            coordinator,
        }
    }

    async fn stranded(h: &Harness) -> RescueRequest {
        let travel = seed_travel(h.store.as_ref(), 1, Utc::now(), 3600).await;
        h.coordinator
            .check_and_trigger_stranded(travel.id)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_stranding_creates_one_request() {
        let h = harness(1.0);
        let request = stranded(&h).await;
        assert_eq!(request.status, RescueStatus::Pending);

        let travel = h.store.travel(request.travel_id).await.unwrap().unwrap();
        assert_eq!(travel.stage, TravelStage::Stranded);

        for _ in 0..5 {
            let again = h.coordinator.check_and_trigger_stranded(request.travel_id).await.unwrap();
            assert!(again.is_none());
        }
        let all = h.store.list_rescue_requests(&|_| true).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(h.bus.count(|n| matches!(n, RelayNotification::Stranded { .. })), 1);
    }

    #[tokio::test]
    async fn test_zero_chance_never_strands() {
        let h = harness(0.0);
        let travel = seed_travel(h.store.as_ref(), 1, Utc::now(), 3600).await;
        for _ in 0..50 {
            assert!(h.coordinator.check_and_trigger_stranded(travel.id).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_stranger_declined_while_pending() {
        let h = harness(1.0);
        let request = stranded(&h).await;
        seed_frog(h.store.as_ref(), 2, FrogStatus::Idle).await;

        let result = h.coordinator.perform_rescue(request.id, 2).await.unwrap();
        assert_eq!(result, RescueResult::Declined(RescueDecline::FriendsOnly));
        let unchanged = h.store.rescue_request(request.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, RescueStatus::Pending);
    }

    #[tokio::test]
    async fn test_friend_rescue_pays_friend_share() {
        let h = harness(1.0);
        let request = stranded(&h).await;
        seed_frog(h.store.as_ref(), 2, FrogStatus::Idle).await;
        h.friends.add(1, 2);

        let result = h.coordinator.perform_rescue(request.id, 2).await.unwrap();
        assert_eq!(
            result,
            RescueResult::Rescued {
                rescue_id: request.id,
                travel_id: request.travel_id,
                rescuer_type: RescuerType::Friend,
                xp_earned: 15,
                reputation_earned: RESCUE_REPUTATION,
            }
        );

        let travel = h.store.travel(request.travel_id).await.unwrap().unwrap();
        assert_eq!(travel.stage, TravelStage::Returning);
        let rescuer = h.store.frog(2).await.unwrap().unwrap();
        assert_eq!(rescuer.xp, 15);
        assert_eq!(rescuer.reputation, 10);

        let again = h.coordinator.perform_rescue(request.id, 2).await.unwrap();
        assert_eq!(again, RescueResult::Declined(RescueDecline::AlreadyRescued));
        assert_eq!(h.store.frog(2).await.unwrap().unwrap().xp, 15);
    }

    #[tokio::test]
    async fn test_rescue_declined_once_travel_ended() {
        let h = harness(1.0);
        let request = stranded(&h).await;
        seed_frog(h.store.as_ref(), 2, FrogStatus::Idle).await;
        h.friends.add(1, 2);
        h.store
            .update_travel(
                request.travel_id,
                TravelPatch {
                    status: Some(TravelStatus::Failed),
                    ..TravelPatch::cross_chain(CrossChainStatus::Failed)
                },
            )
            .await
            .unwrap();

        let result = h.coordinator.perform_rescue(request.id, 2).await.unwrap();
        assert_eq!(result, RescueResult::Declined(RescueDecline::NotStranded));

        let rescuer = h.store.frog(2).await.unwrap().unwrap();
        assert_eq!((rescuer.xp, rescuer.reputation), (0, 0));
        let unchanged = h.store.rescue_request(request.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, RescueStatus::Pending);
        assert_eq!(h.bus.count(|n| matches!(n, RelayNotification::RescueOutcome { .. })), 0);
    }

    #[tokio::test]
    async fn test_public_request_open_to_strangers() {
        let h = harness(1.0);
        let request = stranded(&h).await;
        seed_frog(h.store.as_ref(), 3, FrogStatus::Idle).await;

        let promoted = h
            .coordinator
            .sweep_expired_at(request.requested_at + Duration::hours(5))
            .await
            .unwrap();
        assert_eq!(promoted, vec![request.id]);

        let result = h.coordinator.perform_rescue(request.id, 3).await.unwrap();
        assert!(matches!(
            result,
            RescueResult::Rescued {
                rescuer_type: RescuerType::Stranger,
                xp_earned: 10,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_sweep_respects_grace_window() {
        let h = harness(1.0);
        let request = stranded(&h).await;

        let early = request.requested_at + Duration::hours(4) - Duration::seconds(1);
        assert!(h.coordinator.sweep_expired_at(early).await.unwrap().is_empty());
        assert!(h.coordinator.list_public_requests(10).await.unwrap().is_empty());

        let late = request.requested_at + Duration::hours(4) + Duration::seconds(1);
        assert_eq!(h.coordinator.sweep_expired_at(late).await.unwrap(), vec![request.id]);
        // second sweep finds nothing left to promote
        assert!(h.coordinator.sweep_expired_at(late).await.unwrap().is_empty());

        let public = h.coordinator.list_public_requests(10).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].public_at, Some(late));
    }

    #[tokio::test]
    async fn test_self_rescue_declined() {
        let h = harness(1.0);
        let request = stranded(&h).await;
        let result = h.coordinator.perform_rescue(request.id, 1).await.unwrap();
        assert_eq!(result, RescueResult::Declined(RescueDecline::OwnFrog));
    }

    #[tokio::test]
    async fn test_friend_requests_listed_for_friends_only() {
        let h = harness(1.0);
        let request = stranded(&h).await;
        h.friends.add(1, 4);

        let listed = h.coordinator.list_friend_requests(4).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, request.id);
        assert!(h.coordinator.list_friend_requests(5).await.unwrap().is_empty());
    }
}
