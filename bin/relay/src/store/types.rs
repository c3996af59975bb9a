use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frog NFT token id, also the agent's identity
pub type TokenId = u64;
pub type TravelId = u64;
pub type RescueId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TravelStatus {
    Active,
    Processing,
    Completed,
    Failed,
}

/// Position of a travel's cross-chain leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrossChainStatus {
    /// Frog locked on the home chain, outbound message not yet sent
    Locked,
    CrossingOut,
    OnTargetChain,
    CrossingBack,
    Completed,
    Failed,
}

impl CrossChainStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CrossChainStatus::Completed | CrossChainStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            CrossChainStatus::Locked => 0,
            CrossChainStatus::CrossingOut => 1,
            CrossChainStatus::OnTargetChain => 2,
            CrossChainStatus::CrossingBack => 3,
            CrossChainStatus::Completed => 4,
            CrossChainStatus::Failed => 5,
        }
    }

    /// Forward-only: each step moves one position along the happy path, or
    /// to Failed from any non-terminal state. Terminal states never move.
    pub fn can_transition_to(&self, next: CrossChainStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == CrossChainStatus::Failed {
            return true;
        }
        next.rank() == self.rank() + 1
    }

    /// UI-facing stage and progress for this status
    pub fn projection(&self) -> Option<(TravelStage, u8)> {
        match self {
            CrossChainStatus::Locked => Some((TravelStage::Departing, 0)),
            CrossChainStatus::CrossingOut => Some((TravelStage::Crossing, 20)),
            CrossChainStatus::OnTargetChain => Some((TravelStage::Exploring, 30)),
            CrossChainStatus::CrossingBack => Some((TravelStage::Returning, 80)),
            CrossChainStatus::Completed => Some((TravelStage::Returning, 100)),
            CrossChainStatus::Failed => None,
        }
    }
}

impl std::fmt::Display for CrossChainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CrossChainStatus::Locked => "LOCKED",
            CrossChainStatus::CrossingOut => "CROSSING_OUT",
            CrossChainStatus::OnTargetChain => "ON_TARGET_CHAIN",
            CrossChainStatus::CrossingBack => "CROSSING_BACK",
            CrossChainStatus::Completed => "COMPLETED",
            CrossChainStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelStage {
    Departing,
    Crossing,
    Exploring,
    Returning,
    Stranded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrogStatus {
    Idle,
    Traveling,
    CrossChainLocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frog {
    pub token_id: TokenId,
    pub name: String,
    pub owner: Address,
    pub status: FrogStatus,
    pub xp: u64,
    pub reputation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Real,
    /// Skipped on-chain because gateway reserves were low
    Virtual,
}

/// One exploration executed by the relay on the frog's behalf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteAction {
    pub kind: ActionKind,
    pub target: Address,
    pub tx_hash: B256,
    pub block_number: u64,
    pub observation: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    pub address: Address,
    pub name: String,
    pub category: String,
    pub rarity: u8,
    pub found_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Travel {
    pub id: TravelId,
    pub token_id: TokenId,
    pub frog_name: String,
    pub owner: Address,
    pub home_chain_id: u64,
    pub target_chain_id: u64,
    pub status: TravelStatus,
    pub cross_chain_status: Option<CrossChainStatus>,
    pub stage: TravelStage,
    pub progress: u8,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: u64,
    pub cross_chain_message_id: Option<B256>,
    pub return_message_id: Option<B256>,
    pub target_chain_arrival_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actions: Vec<RemoteAction>,
    #[serde(default)]
    pub discoveries: Vec<Discovery>,
    pub unlock_tx_hash: Option<B256>,
    #[serde(default)]
    pub xp_earned: u64,
    /// Refunded provisions in wei, decimal string
    pub refund_wei: Option<String>,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub diary: Option<String>,
}

impl Travel {
    pub fn is_cross_chain(&self) -> bool {
        self.cross_chain_status.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TravelStatus::Completed | TravelStatus::Failed)
    }

    /// Time of the last remote action, falling back to arrival then start
    pub fn last_action_time(&self) -> DateTime<Utc> {
        self.actions
            .last()
            .map(|a| a.timestamp)
            .or(self.target_chain_arrival_time)
            .unwrap_or(self.start_time)
    }
}

/// Fields of a new travel; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewTravel {
    pub token_id: TokenId,
    pub frog_name: String,
    pub owner: Address,
    pub home_chain_id: u64,
    pub target_chain_id: u64,
    pub start_time: DateTime<Utc>,
    pub duration_secs: u64,
    pub cross_chain_message_id: Option<B256>,
}

/// Partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct TravelPatch {
    pub status: Option<TravelStatus>,
    pub cross_chain_status: Option<CrossChainStatus>,
    pub stage: Option<TravelStage>,
    pub progress: Option<u8>,
    pub return_message_id: Option<B256>,
    pub target_chain_arrival_time: Option<DateTime<Utc>>,
    pub push_action: Option<RemoteAction>,
    pub push_discovery: Option<Discovery>,
    pub unlock_tx_hash: Option<B256>,
    pub xp_earned: Option<u64>,
    pub refund_wei: Option<String>,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub diary: Option<String>,
}

impl TravelPatch {
    /// Move the cross-chain status and its stage/progress projection together
    pub fn cross_chain(status: CrossChainStatus) -> Self {
        let (stage, progress) = match status.projection() {
            Some((stage, progress)) => (Some(stage), Some(progress)),
            None => (None, None),
        };
        Self {
            cross_chain_status: Some(status),
            stage,
            progress,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    Real,
    Virtual,
    /// Decoded from a connector event rather than executed by the relay
    Observed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelInteraction {
    pub id: u64,
    pub travel_id: TravelId,
    pub chain_id: u64,
    pub block_number: u64,
    pub message: String,
    pub explored_address: Option<Address>,
    pub is_contract: bool,
    pub tx_hash: Option<B256>,
    pub kind: InteractionKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RescueStatus {
    Pending,
    Public,
    Rescued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RescuerType {
    Friend,
    Stranger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescueRequest {
    pub id: RescueId,
    pub travel_id: TravelId,
    pub stranded_token_id: TokenId,
    pub status: RescueStatus,
    pub requested_at: DateTime<Utc>,
    pub public_at: Option<DateTime<Utc>>,
    pub rescued_at: Option<DateTime<Utc>>,
    pub rescuer_token_id: Option<TokenId>,
    pub rescuer_type: Option<RescuerType>,
    /// Percent of the base loss credited to the rescuer
    pub rescuer_share: Option<u8>,
    pub rescuer_xp: Option<u64>,
    pub rescuer_reputation: Option<u64>,
}
