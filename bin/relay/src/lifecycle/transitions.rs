//! Guarded state writes, run inside a store transaction.
//!
//! Every helper here assumes the caller already checked the expected
//! pre-state within the same transaction.

use crate::store::{
    CrossChainStatus, FrogPatch, FrogStatus, StoreError, StoreTx, TokenId, Travel, TravelId,
    TravelPatch, TravelStage, TravelStatus,
};
use alloy_primitives::B256;
use chrono::{DateTime, Utc};

fn set_frog_status(tx: &mut dyn StoreTx, token_id: TokenId, status: FrogStatus) -> Result<(), StoreError> {
    if tx.frog(token_id).is_none() {
        tracing::warn!(token_id, "Frog row missing, status not updated");
        return Ok(());
    }
    tx.update_frog(
        token_id,
        FrogPatch {
            status: Some(status),
            ..Default::default()
        },
    )?;
    Ok(())
}

/// CROSSING_OUT -> ON_TARGET_CHAIN, frog locked on the home chain
pub(crate) fn enter_target_chain(
    tx: &mut dyn StoreTx,
    travel: &Travel,
    arrived_at: DateTime<Utc>,
) -> Result<Travel, StoreError> {
    let patch = TravelPatch {
        target_chain_arrival_time: Some(arrived_at),
        ..TravelPatch::cross_chain(CrossChainStatus::OnTargetChain)
    };
    let updated = tx.update_travel(travel.id, patch)?;
    set_frog_status(tx, travel.token_id, FrogStatus::CrossChainLocked)?;
    Ok(updated)
}

/// ON_TARGET_CHAIN -> CROSSING_BACK
pub(crate) fn leave_target_chain(
    tx: &mut dyn StoreTx,
    travel: &Travel,
    return_message_id: Option<B256>,
    xp_earned: Option<u64>,
) -> Result<Travel, StoreError> {
    let patch = TravelPatch {
        status: Some(TravelStatus::Processing),
        return_message_id,
        xp_earned,
        ..TravelPatch::cross_chain(CrossChainStatus::CrossingBack)
    };
    tx.update_travel(travel.id, patch)
}

/// CROSSING_BACK -> COMPLETED, frog released with its XP
pub(crate) fn complete(
    tx: &mut dyn StoreTx,
    travel: &Travel,
    patch: TravelPatch,
) -> Result<Travel, StoreError> {
    let patch = TravelPatch {
        status: Some(TravelStatus::Completed),
        cross_chain_status: Some(CrossChainStatus::Completed),
        stage: Some(TravelStage::Returning),
        progress: Some(100),
        ..patch
    };
    let updated = tx.update_travel(travel.id, patch)?;
    if tx.frog(travel.token_id).is_some() {
        tx.update_frog(
            travel.token_id,
            FrogPatch {
                status: Some(FrogStatus::Idle),
                add_xp: updated.xp_earned,
                add_reputation: 0,
            },
        )?;
    }
    Ok(updated)
}

/// Any non-terminal status -> FAILED. The frog stays locked until someone
/// intervenes.
pub(crate) fn fail(tx: &mut dyn StoreTx, travel: &Travel, error: String) -> Result<Travel, StoreError> {
    let patch = TravelPatch {
        status: Some(TravelStatus::Failed),
        error_message: Some(error),
        completed_at: Some(Utc::now()),
        ..TravelPatch::cross_chain(CrossChainStatus::Failed)
    };
    tx.update_travel(travel.id, patch)
}

pub(crate) fn mark_stranded(tx: &mut dyn StoreTx, travel_id: TravelId) -> Result<Travel, StoreError> {
    tx.update_travel(
        travel_id,
        TravelPatch {
            stage: Some(TravelStage::Stranded),
            ..Default::default()
        },
    )
}

/// Rescued frogs head home; the scheduler issues the return on its next tick
pub(crate) fn mark_rescued(tx: &mut dyn StoreTx, travel_id: TravelId) -> Result<Travel, StoreError> {
    tx.update_travel(
        travel_id,
        TravelPatch {
            stage: Some(TravelStage::Returning),
            ..Default::default()
        },
    )
}
