//! Persistent travel store.
//!
//! The relay only consumes a small keyed-store surface: lookups by id, first
//! or all rows matching a predicate, creation, partial updates and a
//! transactional multi-row update used by every guarded state transition.

mod memory;
mod snapshot;
pub mod types;

pub use memory::{InMemoryStore, StoreState};
pub use snapshot::{load_snapshot, save_snapshot, StoreSnapshot};
pub use types::*;

use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};

#[derive(Debug)]
pub enum StoreError {
    NotFound { entity: &'static str, id: u64 },
    Conflict(String),
    InvalidTransition {
        travel_id: TravelId,
        from: CrossChainStatus,
        to: CrossChainStatus,
    },
    Io(String),
    Serialization(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound { entity, id } => write!(f, "{} {} not found", entity, id),
            StoreError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            StoreError::InvalidTransition { travel_id, from, to } => write!(
                f,
                "Travel {} cannot move from {} to {}",
                travel_id, from, to
            ),
            StoreError::Io(msg) => write!(f, "Store IO error: {}", msg),
            StoreError::Serialization(msg) => write!(f, "Store serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Agent-level counters changed alongside a travel transition
#[derive(Debug, Clone, Default)]
pub struct FrogPatch {
    pub status: Option<FrogStatus>,
    pub add_xp: u64,
    pub add_reputation: u64,
}

#[derive(Debug, Clone)]
pub struct NewInteraction {
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

pub type TravelFilter<'a> = &'a (dyn Fn(&Travel) -> bool + Send + Sync);
pub type RescueFilter<'a> = &'a (dyn Fn(&RescueRequest) -> bool + Send + Sync);

/// Mutable view handed to a transaction body. Everything written through it
/// is committed together or not at all.
pub trait StoreTx {
    fn travel(&self, id: TravelId) -> Option<Travel>;
    fn find_travel(&self, filter: &dyn Fn(&Travel) -> bool) -> Option<Travel>;
    fn update_travel(&mut self, id: TravelId, patch: TravelPatch) -> Result<Travel, StoreError>;

    fn frog(&self, token_id: TokenId) -> Option<Frog>;
    fn update_frog(&mut self, token_id: TokenId, patch: FrogPatch) -> Result<Frog, StoreError>;

    fn interactions(&self, travel_id: TravelId) -> Vec<TravelInteraction>;
    fn add_interaction(&mut self, interaction: NewInteraction) -> TravelInteraction;

    fn rescue(&self, id: RescueId) -> Option<RescueRequest>;
    fn rescue_for_travel(&self, travel_id: TravelId) -> Option<RescueRequest>;
    /// Fails with `Conflict` if the travel already has a request
    fn create_rescue(
        &mut self,
        travel_id: TravelId,
        stranded_token_id: TokenId,
        requested_at: DateTime<Utc>,
    ) -> Result<RescueRequest, StoreError>;
    fn update_rescue(&mut self, request: RescueRequest) -> Result<(), StoreError>;
}

pub type TxBody<'a> = &'a mut (dyn FnMut(&mut dyn StoreTx) -> Result<(), StoreError> + Send);

#[async_trait::async_trait]
pub trait TravelStore: Send + Sync {
    async fn travel(&self, id: TravelId) -> Result<Option<Travel>, StoreError>;
    async fn find_travel(&self, filter: TravelFilter<'_>) -> Result<Option<Travel>, StoreError>;
    async fn list_travels(&self, filter: TravelFilter<'_>) -> Result<Vec<Travel>, StoreError>;
    async fn create_travel(&self, travel: NewTravel) -> Result<Travel, StoreError>;
    async fn update_travel(&self, id: TravelId, patch: TravelPatch) -> Result<Travel, StoreError>;

    async fn frog(&self, token_id: TokenId) -> Result<Option<Frog>, StoreError>;
    async fn upsert_frog(&self, frog: Frog) -> Result<(), StoreError>;
    /// Up to `limit` frogs, ordered by token id
    async fn list_frogs(&self, limit: usize) -> Result<Vec<Frog>, StoreError>;

    async fn interactions(&self, travel_id: TravelId) -> Result<Vec<TravelInteraction>, StoreError>;

    async fn rescue_request(&self, id: RescueId) -> Result<Option<RescueRequest>, StoreError>;
    async fn list_rescue_requests(
        &self,
        filter: RescueFilter<'_>,
    ) -> Result<Vec<RescueRequest>, StoreError>;

    /// Last fully processed block for a chain's poller
    async fn checkpoint(&self, chain_id: u64) -> Result<Option<u64>, StoreError>;
    async fn save_checkpoint(&self, chain_id: u64, block: u64) -> Result<(), StoreError>;

    /// Run `body` against a consistent view; commit only if it returns Ok
    async fn transaction(&self, body: TxBody<'_>) -> Result<(), StoreError>;
}
