//! Error types for chain connectivity

use alloy_primitives::B256;

/// Errors that can occur during chain operations
#[derive(Debug)]
pub enum ChainError {
    // Connection errors
    RpcError(String),
    Timeout { operation: &'static str, secs: u64 },

    // Event processing errors
    EventParseError { reason: String },
    MissingReceiptLog { event: &'static str, tx_hash: B256 },

    // Transaction errors
    TransactionReverted { tx_hash: B256 },
    MissingSigner,
    DryRun { operation: &'static str },

    // Configuration errors
    InvalidConfig(String),
    UnknownChain(u64),
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::RpcError(msg) => write!(f, "RPC error: {}", msg),
            ChainError::Timeout { operation, secs } => {
                write!(f, "{} timed out after {}s", operation, secs)
            }
            ChainError::EventParseError { reason } => write!(f, "Event parse error: {}", reason),
            ChainError::MissingReceiptLog { event, tx_hash } => {
                write!(f, "Receipt {} has no {} log", tx_hash, event)
            }
            ChainError::TransactionReverted { tx_hash } => {
                write!(f, "Transaction {} reverted", tx_hash)
            }
            ChainError::MissingSigner => write!(f, "No signer configured for write calls"),
            ChainError::DryRun { operation } => write!(f, "Dry run, {} not sent", operation),
            ChainError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            ChainError::UnknownChain(id) => write!(f, "Chain {} is not configured", id),
        }
    }
}

impl std::error::Error for ChainError {}
