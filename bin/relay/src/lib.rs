//! Cross-chain travel relay.
//!
//! Watches FrogConnector contracts on every configured target chain, drives
//! the travel state machine persisted in the [`store`], schedules remote
//! explorations for frogs that are currently abroad and runs the
//! stranding/rescue recovery path.

pub mod chain;
pub mod config;
pub mod lifecycle;
pub mod narrative;
pub mod notify;
pub mod poller;
pub mod relay;
pub mod rescue;
pub mod scheduler;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
