//! FrogConnector events observed on target chains
//!
//! - FrogArrived: the outbound message landed, the frog is now visiting
//! - RandomExploration: the connector executed an exploration
//! - FrogReturned: the frog left, the return message is in flight home

use crate::chain::ChainError;
use alloy_primitives::{Address, Log as PrimitiveLog, B256, U256};
use alloy_sol_types::SolEvent;
use chrono::{DateTime, Utc};
use common::interfaces::frog_connector::IFrogConnector::{
    FrogArrived, FrogReturned, RandomExploration,
};

/// Where a log was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMeta {
    pub chain_id: u64,
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: B256,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrogArrivedEvent {
    pub meta: EventMeta,
    pub token_id: u64,
    pub owner: Address,
    pub name: String,
    pub message_id: B256,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplorationObservedEvent {
    pub meta: EventMeta,
    pub token_id: u64,
    pub explored_address: Address,
    pub is_contract: bool,
    pub code_size: u64,
    pub observation: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrogReturnedEvent {
    pub meta: EventMeta,
    pub token_id: u64,
    pub message_id: B256,
    pub xp_earned: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent {
    Arrived(FrogArrivedEvent),
    Exploration(ExplorationObservedEvent),
    Returned(FrogReturnedEvent),
}

impl ConnectorEvent {
    pub fn meta(&self) -> &EventMeta {
        match self {
            ConnectorEvent::Arrived(e) => &e.meta,
            ConnectorEvent::Exploration(e) => &e.meta,
            ConnectorEvent::Returned(e) => &e.meta,
        }
    }

    pub fn token_id(&self) -> u64 {
        match self {
            ConnectorEvent::Arrived(e) => e.token_id,
            ConnectorEvent::Exploration(e) => e.token_id,
            ConnectorEvent::Returned(e) => e.token_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConnectorEvent::Arrived(_) => "FrogArrived",
            ConnectorEvent::Exploration(_) => "RandomExploration",
            ConnectorEvent::Returned(_) => "FrogReturned",
        }
    }
}

/// Event signature constants for log filtering
pub struct EventSignatures;

impl EventSignatures {
    pub fn frog_arrived() -> B256 {
        FrogArrived::SIGNATURE_HASH
    }

    pub fn random_exploration() -> B256 {
        RandomExploration::SIGNATURE_HASH
    }

    pub fn frog_returned() -> B256 {
        FrogReturned::SIGNATURE_HASH
    }

    pub fn all() -> Vec<B256> {
        vec![
            Self::frog_arrived(),
            Self::random_exploration(),
            Self::frog_returned(),
        ]
    }
}

pub(crate) fn u256_to_u64(value: U256, field: &str) -> Result<u64, ChainError> {
    u64::try_from(value).map_err(|_| ChainError::EventParseError {
        reason: format!("{} does not fit in u64: {}", field, value),
    })
}

fn to_datetime(value: U256) -> DateTime<Utc> {
    u64::try_from(value)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
        .unwrap_or_else(Utc::now)
}

/// Decode a connector log
pub fn parse_log(log: &PrimitiveLog, meta: EventMeta) -> Result<ConnectorEvent, ChainError> {
    let topic0 = log.topics().first().ok_or(ChainError::EventParseError {
        reason: "log has no topics".to_string(),
    })?;

    let decode_err = |e: alloy_sol_types::Error| ChainError::EventParseError {
        reason: e.to_string(),
    };

    if *topic0 == EventSignatures::frog_arrived() {
        let decoded = FrogArrived::decode_log(log).map_err(decode_err)?;
        Ok(ConnectorEvent::Arrived(FrogArrivedEvent {
            meta,
            token_id: u256_to_u64(decoded.tokenId, "tokenId")?,
            owner: decoded.owner,
            name: decoded.name.clone(),
            message_id: decoded.messageId,
            timestamp: to_datetime(decoded.timestamp),
        }))
    } else if *topic0 == EventSignatures::random_exploration() {
        let decoded = RandomExploration::decode_log(log).map_err(decode_err)?;
        Ok(ConnectorEvent::Exploration(ExplorationObservedEvent {
            meta,
            token_id: u256_to_u64(decoded.tokenId, "tokenId")?,
            explored_address: decoded.exploredAddress,
            is_contract: decoded.isContract,
            code_size: u64::try_from(decoded.codeSize).unwrap_or(u64::MAX),
            observation: decoded.observation.clone(),
            timestamp: to_datetime(decoded.timestamp),
        }))
    } else if *topic0 == EventSignatures::frog_returned() {
        let decoded = FrogReturned::decode_log(log).map_err(decode_err)?;
        Ok(ConnectorEvent::Returned(FrogReturnedEvent {
            meta,
            token_id: u256_to_u64(decoded.tokenId, "tokenId")?,
            message_id: decoded.messageId,
            xp_earned: u256_to_u64(decoded.xpEarned, "xpEarned")?,
            timestamp: to_datetime(decoded.timestamp),
        }))
    } else {
        Err(ChainError::EventParseError {
            reason: format!("unknown event signature {}", topic0),
        })
    }
}

/// Order events the way they were emitted: block, then log index
pub fn sort_events(events: &mut [ConnectorEvent]) {
    events.sort_by_key(|e| (e.meta().block_number, e.meta().log_index));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(block_number: u64, log_index: u64) -> EventMeta {
        EventMeta {
            chain_id: 97,
            block_number,
            log_index,
            tx_hash: B256::repeat_byte(block_number as u8),
        }
    }

    fn to_log<E: SolEvent>(event: &E) -> PrimitiveLog {
        PrimitiveLog {
            address: Address::repeat_byte(0x42),
            data: event.encode_log_data(),
        }
    }

    #[test]
    fn test_signatures_distinct() {
        let sigs = EventSignatures::all();
        assert_eq!(sigs.len(), 3);
        assert_ne!(sigs[0], sigs[1]);
        assert_ne!(sigs[1], sigs[2]);
        assert!(sigs.iter().all(|s| *s != B256::ZERO));
    }

    #[test]
    fn test_parse_arrival() {
        let event = FrogArrived {
            tokenId: U256::from(12),
            owner: Address::repeat_byte(0x01),
            name: "Ribbit".to_string(),
            messageId: B256::repeat_byte(0xaa),
            timestamp: U256::from(1_700_000_000u64),
        };

        let parsed = parse_log(&to_log(&event), meta(10, 0)).unwrap();
        match parsed {
            ConnectorEvent::Arrived(e) => {
                assert_eq!(e.token_id, 12);
                assert_eq!(e.owner, Address::repeat_byte(0x01));
                assert_eq!(e.name, "Ribbit");
                assert_eq!(e.message_id, B256::repeat_byte(0xaa));
                assert_eq!(e.timestamp.timestamp(), 1_700_000_000);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_return() {
        let event = FrogReturned {
            tokenId: U256::from(3),
            messageId: B256::repeat_byte(0xbb),
            xpEarned: U256::from(45),
            timestamp: U256::from(1_700_000_100u64),
        };

        let parsed = parse_log(&to_log(&event), meta(11, 2)).unwrap();
        let ConnectorEvent::Returned(e) = parsed else {
            panic!("expected return event");
        };
        assert_eq!(e.xp_earned, 45);
        assert_eq!(e.meta.log_index, 2);
    }

    #[test]
    fn test_parse_exploration() {
        let event = RandomExploration {
            tokenId: U256::from(3),
            exploredAddress: Address::repeat_byte(0x77),
            isContract: true,
            codeSize: U256::from(2048),
            observation: "A busy DEX".to_string(),
            timestamp: U256::from(1_700_000_050u64),
        };

        let ConnectorEvent::Exploration(e) = parse_log(&to_log(&event), meta(12, 0)).unwrap() else {
            panic!("expected exploration event");
        };
        assert_eq!(e.explored_address, Address::repeat_byte(0x77));
        assert!(e.is_contract);
        assert_eq!(e.code_size, 2048);
    }

    #[test]
    fn test_oversized_token_id_rejected() {
        let event = FrogReturned {
            tokenId: U256::MAX,
            messageId: B256::ZERO,
            xpEarned: U256::ZERO,
            timestamp: U256::ZERO,
        };
        assert!(parse_log(&to_log(&event), meta(1, 0)).is_err());
    }

    #[test]
    fn test_sort_by_block_then_log_index() {
        let returned = FrogReturned {
            tokenId: U256::from(1),
            messageId: B256::ZERO,
            xpEarned: U256::ZERO,
            timestamp: U256::ZERO,
        };
        let arrived = FrogArrived {
            tokenId: U256::from(1),
            owner: Address::ZERO,
            name: String::new(),
            messageId: B256::ZERO,
            timestamp: U256::ZERO,
        };

        let mut events = vec![
            parse_log(&to_log(&returned), meta(20, 1)).unwrap(),
            parse_log(&to_log(&returned), meta(20, 0)).unwrap(),
            parse_log(&to_log(&arrived), meta(19, 5)).unwrap(),
        ];
        sort_events(&mut events);

        let order: Vec<(u64, u64)> = events
            .iter()
            .map(|e| (e.meta().block_number, e.meta().log_index))
            .collect();
        assert_eq!(order, vec![(19, 5), (20, 0), (20, 1)]);
    }
}
