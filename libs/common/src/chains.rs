//! Well-known chain identifiers used across the relay

pub const ETHEREUM_MAINNET: u64 = 1;
pub const BSC_MAINNET: u64 = 56;
pub const BSC_TESTNET: u64 = 97;
pub const POLYGON_MAINNET: u64 = 137;
pub const ZETACHAIN_ATHENS: u64 = 7001;
pub const ETHEREUM_SEPOLIA: u64 = 11155111;

/// Human readable name for a chain id, falling back to `Chain <id>`
pub fn chain_name(chain_id: u64) -> String {
    match chain_id {
        ETHEREUM_MAINNET => "Ethereum".to_string(),
        BSC_MAINNET => "BNB Chain".to_string(),
        BSC_TESTNET => "BSC Testnet".to_string(),
        POLYGON_MAINNET => "Polygon".to_string(),
        ZETACHAIN_ATHENS => "ZetaChain Athens".to_string(),
        ETHEREUM_SEPOLIA => "Sepolia".to_string(),
        other => format!("Chain {}", other),
    }
}

/// Exploration interval multiplier for chains where acting is slow or
/// expensive. Unknown chains run at 1.0.
pub fn default_activity_multiplier(chain_id: u64) -> f64 {
    match chain_id {
        ETHEREUM_SEPOLIA => 1.1,
        ETHEREUM_MAINNET => 1.5,
        _ => 1.0,
    }
}
