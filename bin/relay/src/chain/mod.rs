pub mod alloy_client;
pub mod client;
pub mod errors;
pub mod event_types;
pub mod registry;

pub use alloy_client::{connect, AlloyHomeChain, AlloyTargetChain};
pub use client::{
    DirectExploration, GatewayExploration, HomeChainClient, ReturnCheck, TargetChainClient,
    TxReceipt, UnlockReceipt, VIRTUAL_OBSERVATION_PREFIX,
};
pub use errors::ChainError;
pub use event_types::{
    ConnectorEvent, EventMeta, EventSignatures, ExplorationObservedEvent, FrogArrivedEvent,
    FrogReturnedEvent,
};
pub use registry::ChainRegistry;
