use super::snapshot::{load_snapshot, save_snapshot};
use super::types::*;
use super::{
    FrogPatch, NewInteraction, RescueFilter, StoreError, StoreTx, TravelFilter, TravelStore,
    TxBody,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// All tables of the in-memory store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    pub travels: BTreeMap<TravelId, Travel>,
    pub frogs: BTreeMap<TokenId, Frog>,
    pub interactions: Vec<TravelInteraction>,
    pub rescues: BTreeMap<RescueId, RescueRequest>,
    pub checkpoints: BTreeMap<u64, u64>,
    next_travel_id: u64,
    next_interaction_id: u64,
    next_rescue_id: u64,
}

impl StoreState {
    fn allocate_travel_id(&mut self) -> TravelId {
        self.next_travel_id += 1;
        self.next_travel_id
    }

    fn insert_travel(&mut self, new: NewTravel) -> Travel {
        let id = self.allocate_travel_id();
        let cross_chain_status =
            (new.target_chain_id != new.home_chain_id).then_some(CrossChainStatus::CrossingOut);
        let (stage, progress) = cross_chain_status
            .and_then(|s| s.projection())
            .unwrap_or((TravelStage::Departing, 0));

        let travel = Travel {
            id,
            token_id: new.token_id,
            frog_name: new.frog_name,
            owner: new.owner,
            home_chain_id: new.home_chain_id,
            target_chain_id: new.target_chain_id,
            status: TravelStatus::Active,
            cross_chain_status,
            stage,
            progress,
            start_time: new.start_time,
            end_time: new.start_time + chrono::Duration::seconds(new.duration_secs as i64),
            duration_secs: new.duration_secs,
            cross_chain_message_id: new.cross_chain_message_id,
            return_message_id: None,
            target_chain_arrival_time: None,
            actions: Vec::new(),
            discoveries: Vec::new(),
            unlock_tx_hash: None,
            xp_earned: 0,
            refund_wei: None,
            error_message: None,
            completed_at: None,
            diary: None,
        };
        self.travels.insert(id, travel.clone());
        travel
    }
}

fn apply_patch(travel: &mut Travel, patch: TravelPatch) -> Result<(), StoreError> {
    if let Some(next) = patch.cross_chain_status {
        if let Some(current) = travel.cross_chain_status {
            if !current.can_transition_to(next) {
                return Err(StoreError::InvalidTransition {
                    travel_id: travel.id,
                    from: current,
                    to: next,
                });
            }
        }
        travel.cross_chain_status = Some(next);
    }
    if let Some(status) = patch.status {
        travel.status = status;
    }
    if let Some(stage) = patch.stage {
        travel.stage = stage;
    }
    if let Some(progress) = patch.progress {
        travel.progress = progress;
    }
    if let Some(id) = patch.return_message_id {
        travel.return_message_id = Some(id);
    }
    if let Some(at) = patch.target_chain_arrival_time {
        travel.target_chain_arrival_time = Some(at);
    }
    if let Some(action) = patch.push_action {
        travel.actions.push(action);
    }
    if let Some(discovery) = patch.push_discovery {
        travel.discoveries.push(discovery);
    }
    if let Some(hash) = patch.unlock_tx_hash {
        travel.unlock_tx_hash = Some(hash);
    }
    if let Some(xp) = patch.xp_earned {
        travel.xp_earned = xp;
    }
    if let Some(refund) = patch.refund_wei {
        travel.refund_wei = Some(refund);
    }
    if let Some(message) = patch.error_message {
        travel.error_message = Some(message);
    }
    if let Some(at) = patch.completed_at {
        travel.completed_at = Some(at);
    }
    if let Some(diary) = patch.diary {
        travel.diary = Some(diary);
    }
    Ok(())
}

impl StoreTx for StoreState {
    fn travel(&self, id: TravelId) -> Option<Travel> {
        self.travels.get(&id).cloned()
    }

    fn find_travel(&self, filter: &dyn Fn(&Travel) -> bool) -> Option<Travel> {
        self.travels.values().find(|t| filter(t)).cloned()
    }

    fn update_travel(&mut self, id: TravelId, patch: TravelPatch) -> Result<Travel, StoreError> {
        let travel = self
            .travels
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "Travel", id })?;
        apply_patch(travel, patch)?;
        Ok(travel.clone())
    }

    fn frog(&self, token_id: TokenId) -> Option<Frog> {
        self.frogs.get(&token_id).cloned()
    }

    fn update_frog(&mut self, token_id: TokenId, patch: FrogPatch) -> Result<Frog, StoreError> {
        let frog = self.frogs.get_mut(&token_id).ok_or(StoreError::NotFound {
            entity: "Frog",
            id: token_id,
        })?;
        if let Some(status) = patch.status {
            frog.status = status;
        }
        frog.xp += patch.add_xp;
        frog.reputation += patch.add_reputation;
        Ok(frog.clone())
    }

    fn interactions(&self, travel_id: TravelId) -> Vec<TravelInteraction> {
        self.interactions
            .iter()
            .filter(|i| i.travel_id == travel_id)
            .cloned()
            .collect()
    }

    fn add_interaction(&mut self, new: NewInteraction) -> TravelInteraction {
        self.next_interaction_id += 1;
        let interaction = TravelInteraction {
            id: self.next_interaction_id,
            travel_id: new.travel_id,
            chain_id: new.chain_id,
            block_number: new.block_number,
            message: new.message,
            explored_address: new.explored_address,
            is_contract: new.is_contract,
            tx_hash: new.tx_hash,
            kind: new.kind,
            created_at: new.created_at,
        };
        self.interactions.push(interaction.clone());
        interaction
    }

    fn rescue(&self, id: RescueId) -> Option<RescueRequest> {
        self.rescues.get(&id).cloned()
    }

    fn rescue_for_travel(&self, travel_id: TravelId) -> Option<RescueRequest> {
        self.rescues
            .values()
            .find(|r| r.travel_id == travel_id)
            .cloned()
    }

    fn create_rescue(
        &mut self,
        travel_id: TravelId,
        stranded_token_id: TokenId,
        requested_at: DateTime<Utc>,
    ) -> Result<RescueRequest, StoreError> {
        if self.rescue_for_travel(travel_id).is_some() {
            return Err(StoreError::Conflict(format!(
                "Travel {} already has a rescue request",
                travel_id
            )));
        }
        self.next_rescue_id += 1;
        let request = RescueRequest {
            id: self.next_rescue_id,
            travel_id,
            stranded_token_id,
            status: RescueStatus::Pending,
            requested_at,
            public_at: None,
            rescued_at: None,
            rescuer_token_id: None,
            rescuer_type: None,
            rescuer_share: None,
            rescuer_xp: None,
            rescuer_reputation: None,
        };
        self.rescues.insert(request.id, request.clone());
        Ok(request)
    }

    fn update_rescue(&mut self, request: RescueRequest) -> Result<(), StoreError> {
        match self.rescues.get_mut(&request.id) {
            Some(existing) => {
                *existing = request;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "RescueRequest",
                id: request.id,
            }),
        }
    }
}

/// Store backed by in-process tables. When opened on a path every
/// committed write is flushed to the JSON snapshot before the call returns.
pub struct InMemoryStore {
    state: RwLock<StoreState>,
    snapshot_path: Option<PathBuf>,
    flush_lock: tokio::sync::Mutex<()>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            snapshot_path: None,
            flush_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Restore from `path` if a snapshot exists; later writes go to the same path
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let state = load_snapshot(path).await?.unwrap_or_default();
        Ok(Self {
            state: RwLock::new(state),
            snapshot_path: Some(path.to_path_buf()),
            flush_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Copy of every table
    pub fn state(&self) -> StoreState {
        self.state.read().clone()
    }

    /// Write the current tables to the snapshot path, if any. Flushes are
    /// serialized and copy the state only once they hold the lock, so the
    /// newest state is always the last one written.
    pub async fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let _flush = self.flush_lock.lock().await;
        save_snapshot(self.state(), path).await
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TravelStore for InMemoryStore {
    async fn travel(&self, id: TravelId) -> Result<Option<Travel>, StoreError> {
        Ok(self.state.read().travels.get(&id).cloned())
    }

    async fn find_travel(&self, filter: TravelFilter<'_>) -> Result<Option<Travel>, StoreError> {
        Ok(self.state.read().travels.values().find(|t| filter(t)).cloned())
    }

    async fn list_travels(&self, filter: TravelFilter<'_>) -> Result<Vec<Travel>, StoreError> {
        Ok(self
            .state
            .read()
            .travels
            .values()
            .filter(|t| filter(t))
            .cloned()
            .collect())
    }

    async fn create_travel(&self, travel: NewTravel) -> Result<Travel, StoreError> {
        let created = {
            let mut state = self.state.write();
            let has_open = state
                .travels
                .values()
                .any(|t| t.token_id == travel.token_id && !t.is_terminal());
            if has_open {
                return Err(StoreError::Conflict(format!(
                    "Frog {} already has an open travel",
                    travel.token_id
                )));
            }
            state.insert_travel(travel)
        };
        self.save().await?;
        Ok(created)
    }

    async fn update_travel(&self, id: TravelId, patch: TravelPatch) -> Result<Travel, StoreError> {
        let travel = StoreTx::update_travel(&mut *self.state.write(), id, patch)?;
        self.save().await?;
        Ok(travel)
    }

    async fn frog(&self, token_id: TokenId) -> Result<Option<Frog>, StoreError> {
        Ok(self.state.read().frogs.get(&token_id).cloned())
    }

    async fn upsert_frog(&self, frog: Frog) -> Result<(), StoreError> {
        self.state.write().frogs.insert(frog.token_id, frog);
        self.save().await
    }

    async fn list_frogs(&self, limit: usize) -> Result<Vec<Frog>, StoreError> {
        Ok(self.state.read().frogs.values().take(limit).cloned().collect())
    }

    async fn interactions(&self, travel_id: TravelId) -> Result<Vec<TravelInteraction>, StoreError> {
        Ok(StoreTx::interactions(&*self.state.read(), travel_id))
    }

    async fn rescue_request(&self, id: RescueId) -> Result<Option<RescueRequest>, StoreError> {
        Ok(self.state.read().rescues.get(&id).cloned())
    }

    async fn list_rescue_requests(
        &self,
        filter: RescueFilter<'_>,
    ) -> Result<Vec<RescueRequest>, StoreError> {
        Ok(self
            .state
            .read()
            .rescues
            .values()
            .filter(|r| filter(r))
            .cloned()
            .collect())
    }

    async fn checkpoint(&self, chain_id: u64) -> Result<Option<u64>, StoreError> {
        Ok(self.state.read().checkpoints.get(&chain_id).copied())
    }

    async fn save_checkpoint(&self, chain_id: u64, block: u64) -> Result<(), StoreError> {
        self.state.write().checkpoints.insert(chain_id, block);
        self.save().await
    }

    async fn transaction(&self, body: TxBody<'_>) -> Result<(), StoreError> {
        {
            let mut guard = self.state.write();
            let mut working = guard.clone();
            body(&mut working)?;
            *guard = working;
        }
        self.save().await
    }
}
