mod manager;
pub(crate) mod transitions;

pub use manager::{ExplorationOutcome, ExplorationRecord, TransitionOutcome, TravelLifecycleManager};
