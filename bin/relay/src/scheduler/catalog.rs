//! Curated "interesting address" landmarks per chain

use alloy_primitives::{address, Address};
use common::chains;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Defi,
    Whale,
    Nft,
    Dao,
    Bridge,
    Famous,
    Exchange,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Defi => "defi",
            Category::Whale => "whale",
            Category::Nft => "nft",
            Category::Dao => "dao",
            Category::Bridge => "bridge",
            Category::Famous => "famous",
            Category::Exchange => "exchange",
            Category::Other => "other",
        }
    }

    /// Landmarks of these kinds are deployed contracts
    pub fn is_contract(&self) -> bool {
        matches!(
            self,
            Category::Defi | Category::Nft | Category::Dao | Category::Bridge
        )
    }

    fn headline(&self) -> &'static str {
        match self {
            Category::Defi => "This is a DeFi protocol!",
            Category::Whale => "A whale sighting!",
            Category::Nft => "This is a famous NFT project!",
            Category::Dao => "Found a DAO treasury!",
            Category::Bridge => "This is a cross-chain bridge!",
            Category::Famous => "This address belongs to someone famous!",
            Category::Exchange => "Found an exchange hot wallet!",
            Category::Other => "Found an interesting address!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Landmark {
    pub address: Address,
    pub name: &'static str,
    pub category: Category,
    /// 1 (common) to 5 (very rare)
    pub rarity: u8,
}

impl Landmark {
    const fn new(address: Address, name: &'static str, category: Category, rarity: u8) -> Self {
        Self {
            address,
            name,
            category,
            rarity,
        }
    }

    /// Rarer landmarks are picked less often
    pub fn weight(&self) -> u32 {
        6u32.saturating_sub(self.rarity as u32).max(1)
    }

    pub fn description(&self) -> String {
        format!(
            "{} {} {}",
            "*".repeat(self.rarity.clamp(1, 5) as usize),
            self.category.headline(),
            self.name
        )
    }
}

use Category::*;

const ETH_MAINNET_LANDMARKS: &[Landmark] = &[
    Landmark::new(address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"), "Uniswap V2 Router", Defi, 3),
    Landmark::new(address!("E592427A0AEce92De3Edee1F18E0157C05861564"), "Uniswap V3 Router", Defi, 3),
    Landmark::new(address!("d9e1cE17f2641f24aE83637ab66a2cca9C378B9F"), "SushiSwap Router", Defi, 3),
    Landmark::new(address!("7d2768dE32b0b80b7a3454c06BdAc94A69DDc7A9"), "Aave V2 LendingPool", Defi, 4),
    Landmark::new(address!("1111111254fb6c44bAC0beD2854e76F90643097d"), "1inch Router", Defi, 3),
    Landmark::new(address!("Ab5801a7D398351b8bE11C439e05C5B3259aeC9B"), "Vitalik Buterin", Famous, 5),
    Landmark::new(address!("00000000219ab540356cBB839Cbe05303d7705Fa"), "ETH 2.0 Deposit", Famous, 4),
    Landmark::new(address!("BE0eB53F46cd790Cd13851d5EFf43D12404d33E8"), "Binance Hot Wallet", Exchange, 4),
    Landmark::new(address!("BC4CA0EdA7647A8aB7C2061c2E118A18a936f13D"), "BAYC Contract", Nft, 5),
    Landmark::new(address!("60E4d786628Fea6478F785A6d7e704777c86a7c6"), "MAYC Contract", Nft, 4),
    Landmark::new(address!("ED5AF388653567Af2F388E6224dC7C4b3241C544"), "Azuki Contract", Nft, 4),
    Landmark::new(address!("0BC3807Ec262cB779b38D65b38158acC3bfedE10"), "ENS DAO Treasury", Dao, 4),
    Landmark::new(address!("8EB8a3b98659Cce290402893d0123abb75E3ab28"), "Avalanche Bridge", Bridge, 3),
];

const BSC_MAINNET_LANDMARKS: &[Landmark] = &[
    Landmark::new(address!("10ED43C718714eb63d5aA57B78B54704E256024E"), "PancakeSwap Router", Defi, 4),
    Landmark::new(address!("13f4EA83D0bd40E75C8222255bc855a974568Dd4"), "PancakeSwap V3 Router", Defi, 4),
    Landmark::new(address!("8894E0a0c962CB723c1976a4421c95949bE2D4E3"), "Binance Hot Wallet 2", Exchange, 4),
    Landmark::new(address!("F68a4b64162906efF0fF6aE34E2bB1Cd42FEf62d"), "Venus Protocol", Defi, 3),
];

const POLYGON_MAINNET_LANDMARKS: &[Landmark] = &[
    Landmark::new(address!("a5E0829CaCEd8fFDD4De3c43696c57F7D7A678ff"), "QuickSwap Router", Defi, 3),
    Landmark::new(address!("1a1ec25DC08e98e5E93F1104B5e5cdD298707d31"), "Polygon Bridge", Bridge, 4),
];

const BSC_TESTNET_LANDMARKS: &[Landmark] = &[
    Landmark::new(address!("D99D1c33F9fC3444f8101754aBC46c52416550D1"), "PancakeSwap Testnet Router", Defi, 3),
    Landmark::new(address!("ae13d989daC2f0dEbFf460aC112a837C89BAa7cd"), "WBNB Testnet", Defi, 2),
    Landmark::new(address!("337610d27c682E347C9cD60BD4b3b107C9d34dDd"), "USDT Testnet", Defi, 2),
];

const ETH_SEPOLIA_LANDMARKS: &[Landmark] = &[
    Landmark::new(address!("7b79995e5f793A07Bc00c21412e50Ecae098E7f9"), "WETH Sepolia", Defi, 2),
    Landmark::new(address!("94a9D9AC8a22534E3FaCa9F4e7F2E2cf85d5E4C8"), "USDC Sepolia", Defi, 2),
    Landmark::new(address!("779877A7B0D9E8603169DdbD7836e478b4624789"), "LINK Sepolia", Defi, 2),
    Landmark::new(address!("C532a74256D3Db42D0Bf7a0400fEFDbad7694008"), "Sepolia Faucet", Other, 1),
];

const ZETACHAIN_ATHENS_LANDMARKS: &[Landmark] = &[
    Landmark::new(address!("5F0b1a82749cb4E2278EC87F8BF6B618dC71a8bf"), "ZetaChain Sample", Other, 2),
    Landmark::new(address!("239e96c8f17C85c30100aC26F635Ea15f23E9c67"), "ZetaChain Core", Bridge, 3),
];

/// Landmarks known for a chain, empty if none
pub fn landmarks(chain_id: u64) -> &'static [Landmark] {
    match chain_id {
        chains::ETHEREUM_MAINNET => ETH_MAINNET_LANDMARKS,
        chains::BSC_MAINNET => BSC_MAINNET_LANDMARKS,
        chains::POLYGON_MAINNET => POLYGON_MAINNET_LANDMARKS,
        chains::BSC_TESTNET => BSC_TESTNET_LANDMARKS,
        chains::ETHEREUM_SEPOLIA => ETH_SEPOLIA_LANDMARKS,
        chains::ZETACHAIN_ATHENS => ZETACHAIN_ATHENS_LANDMARKS,
        _ => &[],
    }
}

pub fn find_landmark(chain_id: u64, address: Address) -> Option<&'static Landmark> {
    landmarks(chain_id).iter().find(|l| l.address == address)
}

/// Weighted pick among landmarks not in `excluded`
pub fn pick_landmark<R: Rng + ?Sized>(
    chain_id: u64,
    excluded: &HashSet<Address>,
    rng: &mut R,
) -> Option<&'static Landmark> {
    let available: Vec<&'static Landmark> = landmarks(chain_id)
        .iter()
        .filter(|l| !excluded.contains(&l.address))
        .collect();
    if available.is_empty() {
        return None;
    }

    let total: u32 = available.iter().map(|l| l.weight()).sum();
    let mut roll = rng.gen_range(0..total);
    for landmark in &available {
        let weight = landmark.weight();
        if roll < weight {
            return Some(landmark);
        }
        roll -= weight;
    }
    available.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_weights() {
        let rare = find_landmark(1, address!("Ab5801a7D398351b8bE11C439e05C5B3259aeC9B")).unwrap();
        assert_eq!(rare.weight(), 1);
        let frequent = find_landmark(11155111, address!("C532a74256D3Db42D0Bf7a0400fEFDbad7694008")).unwrap();
        assert_eq!(frequent.weight(), 5);
    }

    #[test]
    fn test_pick_respects_exclusions() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut excluded: HashSet<Address> = HashSet::new();
        for _ in 0..landmarks(97).len() {
            let picked = pick_landmark(97, &excluded, &mut rng).unwrap();
            assert!(excluded.insert(picked.address));
        }
        assert!(pick_landmark(97, &excluded, &mut rng).is_none());
    }

    #[test]
    fn test_unknown_chain_has_no_landmarks() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(landmarks(424242).is_empty());
        assert!(pick_landmark(424242, &HashSet::new(), &mut rng).is_none());
    }

    #[test]
    fn test_description_mentions_name() {
        let landmark = &landmarks(97)[0];
        let text = landmark.description();
        assert!(text.contains("PancakeSwap Testnet Router"));
        assert!(text.contains("DeFi"));
    }
}
