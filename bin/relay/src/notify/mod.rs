//! Fire-and-forget notifications to connected clients

use crate::store::{InteractionKind, RescueId, RescuerType, TokenId, TravelId, TravelStage};
use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RelayNotification {
    Arrived {
        token_id: TokenId,
        travel_id: TravelId,
        chain_id: u64,
        arrived_at: DateTime<Utc>,
    },
    StageUpdate {
        token_id: TokenId,
        travel_id: TravelId,
        stage: TravelStage,
        progress: u8,
    },
    Interaction {
        token_id: TokenId,
        travel_id: TravelId,
        chain_id: u64,
        message: String,
        explored_address: Option<Address>,
        kind: InteractionKind,
    },
    Discovery {
        token_id: TokenId,
        travel_id: TravelId,
        name: String,
        category: String,
        rarity: u8,
    },
    Completed {
        token_id: TokenId,
        travel_id: TravelId,
        xp_earned: u64,
        refund_wei: Option<String>,
    },
    Failed {
        token_id: TokenId,
        travel_id: TravelId,
        error: String,
    },
    Stranded {
        token_id: TokenId,
        travel_id: TravelId,
        rescue_id: RescueId,
    },
    RescueOutcome {
        token_id: TokenId,
        travel_id: TravelId,
        rescue_id: RescueId,
        rescuer_token_id: TokenId,
        rescuer_type: RescuerType,
    },
    ReturnTriggered {
        token_id: TokenId,
        travel_id: TravelId,
        reason: String,
    },
}

impl RelayNotification {
    /// Agent the notification is addressed to
    pub fn token_id(&self) -> TokenId {
        match self {
            RelayNotification::Arrived { token_id, .. }
            | RelayNotification::StageUpdate { token_id, .. }
            | RelayNotification::Interaction { token_id, .. }
            | RelayNotification::Discovery { token_id, .. }
            | RelayNotification::Completed { token_id, .. }
            | RelayNotification::Failed { token_id, .. }
            | RelayNotification::Stranded { token_id, .. }
            | RelayNotification::RescueOutcome { token_id, .. }
            | RelayNotification::ReturnTriggered { token_id, .. } => *token_id,
        }
    }
}

/// Outbound side channel. Implementations must never block the caller.
pub trait NotificationBus: Send + Sync {
    fn publish(&self, notification: RelayNotification);
}

/// Broadcast-channel bus; slow subscribers lag and drop messages
pub struct BroadcastBus {
    sender: broadcast::Sender<RelayNotification>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayNotification> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NotificationBus for BroadcastBus {
    fn publish(&self, notification: RelayNotification) {
        if self.sender.send(notification).is_err() {
            tracing::trace!("No notification subscribers");
        }
    }
}
