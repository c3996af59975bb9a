//! Where the frog goes next.
//!
//! A roll picks the first strategy to try; every later strategy is tried in
//! order if the earlier ones have nothing left to offer. Random addresses
//! always succeed, so selection never fails.

use super::catalog::{self, Landmark};
use alloy_primitives::Address;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetSource {
    Landmark,
    Neighbor,
    ActivePool,
    Random,
}

impl TargetSource {
    pub const ORDER: [TargetSource; 4] = [
        TargetSource::Landmark,
        TargetSource::Neighbor,
        TargetSource::ActivePool,
        TargetSource::Random,
    ];
}

/// Owner wallet of another registered frog
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub address: Address,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub address: Address,
    pub source: TargetSource,
    pub landmark: Option<Landmark>,
    pub neighbor_name: Option<String>,
}

impl Target {
    fn plain(address: Address, source: TargetSource) -> Self {
        Self {
            address,
            source,
            landmark: None,
            neighbor_name: None,
        }
    }
}

/// Cached candidate pools shared by every exploring frog
#[derive(Debug, Default)]
pub struct TargetSelector {
    neighbors: Vec<Neighbor>,
    active_pools: HashMap<u64, Vec<Address>>,
}

impl TargetSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_neighbors(&mut self, neighbors: Vec<Neighbor>) {
        self.neighbors = neighbors;
    }

    pub fn set_active_pool(&mut self, chain_id: u64, addresses: Vec<Address>) {
        self.active_pools.insert(chain_id, addresses);
    }

    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    pub fn active_pool(&self, chain_id: u64) -> &[Address] {
        self.active_pools
            .get(&chain_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn select<R: Rng + ?Sized>(
        &self,
        chain_id: u64,
        excluded: &HashSet<Address>,
        rng: &mut R,
    ) -> Target {
        let start = rng.gen_range(0..TargetSource::ORDER.len());
        for source in &TargetSource::ORDER[start..] {
            if let Some(target) = self.try_source(*source, chain_id, excluded, rng) {
                tracing::debug!(chain_id, ?source, address = %target.address, "Exploration target selected");
                return target;
            }
        }
        // unreachable in practice, random addresses are never exhausted
        Target::plain(random_address(excluded, rng), TargetSource::Random)
    }

    fn try_source<R: Rng + ?Sized>(
        &self,
        source: TargetSource,
        chain_id: u64,
        excluded: &HashSet<Address>,
        rng: &mut R,
    ) -> Option<Target> {
        match source {
            TargetSource::Landmark => {
                catalog::pick_landmark(chain_id, excluded, rng).map(|landmark| Target {
                    address: landmark.address,
                    source,
                    landmark: Some(*landmark),
                    neighbor_name: None,
                })
            }
            TargetSource::Neighbor => {
                let open: Vec<&Neighbor> = self
                    .neighbors
                    .iter()
                    .filter(|n| !excluded.contains(&n.address))
                    .collect();
                open.choose(rng).map(|n| Target {
                    address: n.address,
                    source,
                    landmark: None,
                    neighbor_name: Some(n.name.clone()),
                })
            }
            TargetSource::ActivePool => {
                let open: Vec<Address> = self
                    .active_pool(chain_id)
                    .iter()
                    .filter(|a| !excluded.contains(*a))
                    .copied()
                    .collect();
                open.choose(rng).map(|a| Target::plain(*a, source))
            }
            TargetSource::Random => Some(Target::plain(random_address(excluded, rng), source)),
        }
    }
}

fn random_address<R: Rng + ?Sized>(excluded: &HashSet<Address>, rng: &mut R) -> Address {
    loop {
        let address = Address::from(rng.gen::<[u8; 20]>());
        if address != Address::ZERO && !excluded.contains(&address) {
            return address;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::chains;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn selector() -> TargetSelector {
        let mut selector = TargetSelector::new();
        selector.set_neighbors(vec![Neighbor {
            address: Address::repeat_byte(0x21),
            name: "Hopper".to_string(),
        }]);
        selector.set_active_pool(chains::BSC_TESTNET, vec![Address::repeat_byte(0x31)]);
        selector
    }

    #[test]
    fn test_never_returns_excluded_address() {
        let selector = selector();
        let mut excluded: HashSet<Address> = catalog::landmarks(chains::BSC_TESTNET)
            .iter()
            .map(|l| l.address)
            .collect();
        excluded.insert(Address::repeat_byte(0x21));
        excluded.insert(Address::repeat_byte(0x31));

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let target = selector.select(chains::BSC_TESTNET, &excluded, &mut rng);
            assert!(!excluded.contains(&target.address));
            assert_eq!(target.source, TargetSource::Random);
        }
    }

    #[test]
    fn test_all_sources_reachable() {
        let selector = selector();
        let excluded = HashSet::new();
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let target = selector.select(chains::BSC_TESTNET, &excluded, &mut rng);
            seen.insert(target.source);
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_landmark_carries_catalog_entry() {
        let selector = TargetSelector::new();
        let excluded = HashSet::new();
        let mut rng = StdRng::seed_from_u64(1);
        let target = selector
            .try_source(TargetSource::Landmark, chains::BSC_TESTNET, &excluded, &mut rng)
            .unwrap();
        let landmark = target.landmark.unwrap();
        assert_eq!(landmark.address, target.address);
        assert!(catalog::find_landmark(chains::BSC_TESTNET, target.address).is_some());
    }

    #[test]
    fn test_neighbor_falls_through_when_exhausted() {
        let selector = selector();
        let mut excluded = HashSet::new();
        excluded.insert(Address::repeat_byte(0x21));
        let mut rng = StdRng::seed_from_u64(3);
        assert!(selector
            .try_source(TargetSource::Neighbor, chains::BSC_TESTNET, &excluded, &mut rng)
            .is_none());
        let pooled = selector
            .try_source(TargetSource::ActivePool, chains::BSC_TESTNET, &excluded, &mut rng)
            .unwrap();
        assert_eq!(pooled.address, Address::repeat_byte(0x31));
    }

    #[test]
    fn test_unknown_chain_has_no_pool() {
        let selector = selector();
        assert!(selector.active_pool(999).is_empty());
    }
}
