//! Travel state machine.
//!
//! The only writer of cross-chain status transitions. Every transition runs
//! in a store transaction that first re-reads the travel and compares its
//! current status with the expected pre-state; a mismatch turns the call into
//! a no-op, which is what makes replayed or duplicate chain events harmless.

use super::transitions;
use crate::chain::{ChainError, ExplorationObservedEvent, UnlockReceipt};
use crate::narrative::{DiaryContext, Narrator};
use crate::notify::{NotificationBus, RelayNotification};
use crate::scheduler::catalog::Landmark;
use crate::store::{
    ActionKind, CrossChainStatus, Discovery, InteractionKind, NewInteraction, RemoteAction,
    StoreError, TokenId, Travel, TravelId, TravelPatch, TravelStore,
};
use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Result of a guarded transition
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// Transition persisted; carries the updated travel
    Applied(Travel),
    /// Travel exists but is no longer in the expected state
    Stale {
        travel_id: TravelId,
        status: Option<CrossChainStatus>,
    },
    /// No travel correlates with the input
    Untracked,
}

impl TransitionOutcome {
    pub fn applied(&self) -> Option<&Travel> {
        match self {
            TransitionOutcome::Applied(travel) => Some(travel),
            _ => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}

/// One exploration executed on the remote chain
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorationRecord {
    pub chain_id: u64,
    pub target: Address,
    pub is_contract: bool,
    pub observation: String,
    pub tx_hash: B256,
    pub block_number: u64,
    pub landmark: Option<Landmark>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExplorationOutcome {
    RealExploration(ExplorationRecord),
    /// Gateway skipped the remote call for low reserves
    VirtualExploration(ExplorationRecord),
}

impl ExplorationOutcome {
    pub fn record(&self) -> &ExplorationRecord {
        match self {
            ExplorationOutcome::RealExploration(r) | ExplorationOutcome::VirtualExploration(r) => r,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, ExplorationOutcome::VirtualExploration(_))
    }
}

pub struct TravelLifecycleManager {
    store: Arc<dyn TravelStore>,
    notifier: Arc<dyn NotificationBus>,
    narrator: Arc<Narrator>,
}

impl TravelLifecycleManager {
    pub fn new(
        store: Arc<dyn TravelStore>,
        notifier: Arc<dyn NotificationBus>,
        narrator: Arc<Narrator>,
    ) -> Self {
        Self {
            store,
            notifier,
            narrator,
        }
    }

    pub fn store(&self) -> &Arc<dyn TravelStore> {
        &self.store
    }

    /// Outbound message landed on the target chain
    pub async fn apply_arrival(
        &self,
        chain_id: u64,
        message_id: B256,
        remote_owner: Address,
        timestamp: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut outcome = TransitionOutcome::Untracked;
        self.store
            .transaction(&mut |tx| {
                outcome = TransitionOutcome::Untracked;
                let Some(travel) =
                    tx.find_travel(&|t| t.cross_chain_message_id == Some(message_id))
                else {
                    return Ok(());
                };
                if travel.cross_chain_status != Some(CrossChainStatus::CrossingOut) {
                    outcome = TransitionOutcome::Stale {
                        travel_id: travel.id,
                        status: travel.cross_chain_status,
                    };
                    return Ok(());
                }
                let updated = transitions::enter_target_chain(tx, &travel, timestamp)?;
                outcome = TransitionOutcome::Applied(updated);
                Ok(())
            })
            .await?;

        match &outcome {
            TransitionOutcome::Applied(travel) => {
                if travel.owner != remote_owner {
                    tracing::warn!(travel_id = travel.id, expected = %travel.owner, reported = %remote_owner, "Arrival owner differs from travel owner");
                }
                if travel.target_chain_id != chain_id {
                    tracing::warn!(travel_id = travel.id, expected = travel.target_chain_id, chain_id, "Arrival seen on unexpected chain");
                }
                tracing::info!(travel_id = travel.id, token_id = travel.token_id, chain_id, "Frog arrived on target chain");
                self.notify_arrival(travel, chain_id);
            }
            TransitionOutcome::Stale { travel_id, status } => {
                tracing::debug!(travel_id, ?status, "Duplicate arrival ignored");
            }
            TransitionOutcome::Untracked => {
                tracing::warn!(%message_id, chain_id, "Travel not found for arrival message id");
            }
        }
        Ok(outcome)
    }

    /// Treat a travel stuck in CROSSING_OUT as arrived. Loses to a real
    /// arrival that was applied first, and vice versa.
    pub async fn promote_stale_departure(
        &self,
        travel_id: TravelId,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut outcome = TransitionOutcome::Untracked;
        self.store
            .transaction(&mut |tx| {
                outcome = TransitionOutcome::Untracked;
                let Some(travel) = tx.travel(travel_id) else {
                    return Ok(());
                };
                if travel.cross_chain_status != Some(CrossChainStatus::CrossingOut) {
                    outcome = TransitionOutcome::Stale {
                        travel_id,
                        status: travel.cross_chain_status,
                    };
                    return Ok(());
                }
                let updated = transitions::enter_target_chain(tx, &travel, now)?;
                outcome = TransitionOutcome::Applied(updated);
                Ok(())
            })
            .await?;

        if let TransitionOutcome::Applied(travel) = &outcome {
            tracing::info!(travel_id, token_id = travel.token_id, "Promoted CROSSING_OUT travel without arrival event");
            self.notify_arrival(travel, travel.target_chain_id);
        }
        Ok(outcome)
    }

    /// Exploration seen in connector logs
    pub async fn apply_exploration_observation(
        &self,
        event: &ExplorationObservedEvent,
    ) -> Result<TransitionOutcome, StoreError> {
        let chain_id = event.meta.chain_id;
        let mut outcome = TransitionOutcome::Untracked;
        self.store
            .transaction(&mut |tx| {
                outcome = TransitionOutcome::Untracked;
                let Some(travel) = tx.find_travel(&|t| {
                    t.token_id == event.token_id
                        && t.target_chain_id == chain_id
                        && t.cross_chain_status == Some(CrossChainStatus::OnTargetChain)
                }) else {
                    return Ok(());
                };

                let seen = tx.interactions(travel.id).iter().any(|i| {
                    i.tx_hash == Some(event.meta.tx_hash)
                        && i.explored_address == Some(event.explored_address)
                });
                if seen {
                    outcome = TransitionOutcome::Stale {
                        travel_id: travel.id,
                        status: travel.cross_chain_status,
                    };
                    return Ok(());
                }

                tx.add_interaction(NewInteraction {
                    travel_id: travel.id,
                    chain_id,
                    block_number: event.meta.block_number,
                    message: event.observation.clone(),
                    explored_address: Some(event.explored_address),
                    is_contract: event.is_contract,
                    tx_hash: Some(event.meta.tx_hash),
                    kind: InteractionKind::Observed,
                    created_at: event.timestamp,
                });
                outcome = TransitionOutcome::Applied(travel);
                Ok(())
            })
            .await?;

        match &outcome {
            TransitionOutcome::Applied(travel) => {
                self.notifier.publish(RelayNotification::Interaction {
                    token_id: travel.token_id,
                    travel_id: travel.id,
                    chain_id,
                    message: event.observation.clone(),
                    explored_address: Some(event.explored_address),
                    kind: InteractionKind::Observed,
                });
            }
            TransitionOutcome::Stale { travel_id, .. } => {
                tracing::debug!(travel_id, tx_hash = %event.meta.tx_hash, "Exploration already recorded");
            }
            TransitionOutcome::Untracked => {
                tracing::warn!(token_id = event.token_id, chain_id, "No exploring travel for observed exploration");
            }
        }
        Ok(outcome)
    }

    /// Return message left the target chain. Accepts travels still on the
    /// target chain and forced returns still waiting for their message id.
    pub async fn apply_return(
        &self,
        chain_id: u64,
        token_id: TokenId,
        return_message_id: B256,
        xp_earned: u64,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut outcome = TransitionOutcome::Untracked;
        self.store
            .transaction(&mut |tx| {
                outcome = TransitionOutcome::Untracked;
                let pending = tx.find_travel(&|t| {
                    t.token_id == token_id
                        && t.target_chain_id == chain_id
                        && match t.cross_chain_status {
                            Some(CrossChainStatus::OnTargetChain) => true,
                            Some(CrossChainStatus::CrossingBack) => t.return_message_id.is_none(),
                            _ => false,
                        }
                });

                let Some(travel) = pending else {
                    if let Some(done) =
                        tx.find_travel(&|t| t.return_message_id == Some(return_message_id))
                    {
                        outcome = TransitionOutcome::Stale {
                            travel_id: done.id,
                            status: done.cross_chain_status,
                        };
                    }
                    return Ok(());
                };

                let updated = if travel.cross_chain_status == Some(CrossChainStatus::OnTargetChain) {
                    transitions::leave_target_chain(tx, &travel, Some(return_message_id), Some(xp_earned))?
                } else {
                    tx.update_travel(
                        travel.id,
                        TravelPatch {
                            return_message_id: Some(return_message_id),
                            xp_earned: Some(xp_earned),
                            ..Default::default()
                        },
                    )?
                };
                outcome = TransitionOutcome::Applied(updated);
                Ok(())
            })
            .await?;

        match &outcome {
            TransitionOutcome::Applied(travel) => {
                tracing::info!(travel_id = travel.id, token_id, xp_earned, "Frog heading home");
                self.notify_stage(travel);
            }
            TransitionOutcome::Stale { travel_id, status } => {
                tracing::debug!(travel_id, ?status, "Duplicate return ignored");
            }
            TransitionOutcome::Untracked => {
                tracing::warn!(token_id, chain_id, %return_message_id, "Travel not found for return event");
            }
        }
        Ok(outcome)
    }

    /// Record the home-chain unlock result for a CROSSING_BACK travel.
    /// A failed unlock marks the travel FAILED; it is not retried.
    pub async fn complete_return(
        &self,
        travel_id: TravelId,
        unlock: Result<UnlockReceipt, ChainError>,
    ) -> Result<TransitionOutcome, StoreError> {
        let Some(current) = self.store.travel(travel_id).await? else {
            tracing::warn!(travel_id, "Travel not found for unlock result");
            return Ok(TransitionOutcome::Untracked);
        };

        let diary = match &unlock {
            Ok(_) => Some(self.narrator.diary(&diary_context(&current)).await),
            Err(_) => None,
        };

        let mut outcome = TransitionOutcome::Untracked;
        self.store
            .transaction(&mut |tx| {
                outcome = TransitionOutcome::Untracked;
                let Some(travel) = tx.travel(travel_id) else {
                    return Ok(());
                };
                if travel.cross_chain_status != Some(CrossChainStatus::CrossingBack) {
                    outcome = TransitionOutcome::Stale {
                        travel_id,
                        status: travel.cross_chain_status,
                    };
                    return Ok(());
                }
                let updated = match &unlock {
                    Ok(receipt) => transitions::complete(
                        tx,
                        &travel,
                        TravelPatch {
                            unlock_tx_hash: Some(receipt.receipt.tx_hash),
                            refund_wei: receipt.refund_wei.map(|r| r.to_string()),
                            completed_at: Some(Utc::now()),
                            diary: diary.clone(),
                            ..Default::default()
                        },
                    )?,
                    Err(e) => transitions::fail(tx, &travel, format!("Unlock failed: {}", e))?,
                };
                outcome = TransitionOutcome::Applied(updated);
                Ok(())
            })
            .await?;

        if let TransitionOutcome::Applied(travel) = &outcome {
            match &unlock {
                Ok(receipt) => {
                    tracing::info!(travel_id, token_id = travel.token_id, tx_hash = %receipt.receipt.tx_hash, "Travel completed");
                    self.notifier.publish(RelayNotification::Completed {
                        token_id: travel.token_id,
                        travel_id,
                        xp_earned: travel.xp_earned,
                        refund_wei: travel.refund_wei.clone(),
                    });
                }
                Err(e) => {
                    tracing::error!(travel_id, token_id = travel.token_id, %e, "Unlock failed, travel marked FAILED");
                    self.notifier.publish(RelayNotification::Failed {
                        token_id: travel.token_id,
                        travel_id,
                        error: travel.error_message.clone().unwrap_or_default(),
                    });
                }
            }
        }
        Ok(outcome)
    }

    /// Move an exploring travel to CROSSING_BACK after the relay sent the
    /// return transaction itself
    pub async fn force_return(
        &self,
        token_id: TokenId,
        reason: &str,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut outcome = TransitionOutcome::Untracked;
        self.store
            .transaction(&mut |tx| {
                outcome = TransitionOutcome::Untracked;
                let Some(travel) = tx.find_travel(&|t| t.token_id == token_id && !t.is_terminal())
                else {
                    return Ok(());
                };
                if travel.cross_chain_status != Some(CrossChainStatus::OnTargetChain) {
                    outcome = TransitionOutcome::Stale {
                        travel_id: travel.id,
                        status: travel.cross_chain_status,
                    };
                    return Ok(());
                }
                let updated = transitions::leave_target_chain(tx, &travel, None, None)?;
                outcome = TransitionOutcome::Applied(updated);
                Ok(())
            })
            .await?;

        match &outcome {
            TransitionOutcome::Applied(travel) => {
                tracing::info!(travel_id = travel.id, token_id, reason, "Forced return");
                self.notifier.publish(RelayNotification::ReturnTriggered {
                    token_id,
                    travel_id: travel.id,
                    reason: reason.to_string(),
                });
                self.notify_stage(travel);
            }
            TransitionOutcome::Stale { travel_id, status } => {
                tracing::debug!(travel_id, ?status, "Forced return skipped, travel already moved");
            }
            TransitionOutcome::Untracked => {
                tracing::warn!(token_id, "No open travel to force home");
            }
        }
        Ok(outcome)
    }

    /// Persist an exploration the relay executed for an exploring travel
    pub async fn record_exploration(
        &self,
        travel_id: TravelId,
        exploration: &ExplorationOutcome,
    ) -> Result<TransitionOutcome, StoreError> {
        let record = exploration.record();
        let (action_kind, interaction_kind) = if exploration.is_virtual() {
            (ActionKind::Virtual, InteractionKind::Virtual)
        } else {
            (ActionKind::Real, InteractionKind::Real)
        };

        let mut outcome = TransitionOutcome::Untracked;
        self.store
            .transaction(&mut |tx| {
                outcome = TransitionOutcome::Untracked;
                let Some(travel) = tx.travel(travel_id) else {
                    return Ok(());
                };
                if travel.cross_chain_status != Some(CrossChainStatus::OnTargetChain) {
                    outcome = TransitionOutcome::Stale {
                        travel_id,
                        status: travel.cross_chain_status,
                    };
                    return Ok(());
                }

                let discovery = record.landmark.as_ref().map(|l| Discovery {
                    address: l.address,
                    name: l.name.to_string(),
                    category: l.category.as_str().to_string(),
                    rarity: l.rarity,
                    found_at: record.at,
                });
                let updated = tx.update_travel(
                    travel_id,
                    TravelPatch {
                        push_action: Some(RemoteAction {
                            kind: action_kind,
                            target: record.target,
                            tx_hash: record.tx_hash,
                            block_number: record.block_number,
                            observation: record.observation.clone(),
                            timestamp: record.at,
                        }),
                        push_discovery: discovery,
                        ..Default::default()
                    },
                )?;
                tx.add_interaction(NewInteraction {
                    travel_id,
                    chain_id: record.chain_id,
                    block_number: record.block_number,
                    message: record.observation.clone(),
                    explored_address: Some(record.target),
                    is_contract: record.is_contract,
                    tx_hash: Some(record.tx_hash),
                    kind: interaction_kind,
                    created_at: record.at,
                });
                outcome = TransitionOutcome::Applied(updated);
                Ok(())
            })
            .await?;

        if let TransitionOutcome::Applied(travel) = &outcome {
            self.notifier.publish(RelayNotification::Interaction {
                token_id: travel.token_id,
                travel_id,
                chain_id: record.chain_id,
                message: record.observation.clone(),
                explored_address: Some(record.target),
                kind: interaction_kind,
            });
            if let Some(landmark) = &record.landmark {
                self.notifier.publish(RelayNotification::Discovery {
                    token_id: travel.token_id,
                    travel_id,
                    name: landmark.name.to_string(),
                    category: landmark.category.as_str().to_string(),
                    rarity: landmark.rarity,
                });
            }
        }
        Ok(outcome)
    }

    fn notify_arrival(&self, travel: &Travel, chain_id: u64) {
        let arrived_at = travel.target_chain_arrival_time.unwrap_or_else(Utc::now);
        self.notifier.publish(RelayNotification::Arrived {
            token_id: travel.token_id,
            travel_id: travel.id,
            chain_id,
            arrived_at,
        });
        self.notifier.publish(RelayNotification::Interaction {
            token_id: travel.token_id,
            travel_id: travel.id,
            chain_id,
            message: format!(
                "{} arrived on {}, exploration begins!",
                travel.frog_name,
                common::chains::chain_name(chain_id)
            ),
            explored_address: Some(travel.owner),
            kind: InteractionKind::Observed,
        });
        self.notify_stage(travel);
    }

    fn notify_stage(&self, travel: &Travel) {
        self.notifier.publish(RelayNotification::StageUpdate {
            token_id: travel.token_id,
            travel_id: travel.id,
            stage: travel.stage,
            progress: travel.progress,
        });
    }
}

fn diary_context(travel: &Travel) -> DiaryContext {
    DiaryContext {
        token_id: travel.token_id,
        frog_name: travel.frog_name.clone(),
        chain_name: common::chains::chain_name(travel.target_chain_id),
        explorations: travel.actions.len(),
        discoveries: travel.discoveries.iter().map(|d| d.name.clone()).collect(),
        xp_earned: travel.xp_earned,
    }
}
