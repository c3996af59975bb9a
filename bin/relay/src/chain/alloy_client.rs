//! alloy-backed implementations of the chain clients

use crate::chain::client::{
    DirectExploration, GatewayExploration, HomeChainClient, ReturnCheck, TargetChainClient,
    TxReceipt, UnlockReceipt, VIRTUAL_OBSERVATION_PREFIX,
};
use crate::chain::event_types::{parse_log, sort_events, ConnectorEvent, EventMeta, EventSignatures};
use crate::chain::ChainError;
use alloy::consensus::Transaction as _;
use alloy::eips::BlockNumberOrTag;
use alloy::network::EthereumWallet;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use common::interfaces::frog_connector::IFrogConnector;
use common::interfaces::omni_travel::IOmniTravel;
use std::collections::HashSet;
use std::future::IntoFuture;
use std::time::Duration;

/// Build an HTTP provider, with a signing wallet when a key is given
pub fn connect(
    rpc_url: &str,
    private_key: Option<&str>,
) -> Result<(DynProvider, Option<Address>), ChainError> {
    let url: Url = rpc_url
        .parse()
        .map_err(|_| ChainError::InvalidConfig(format!("Invalid RPC URL: {}", rpc_url)))?;

    match private_key {
        Some(key) => {
            let signer: PrivateKeySigner = key
                .parse()
                .map_err(|e| ChainError::InvalidConfig(format!("Invalid private key: {}", e)))?;
            let address = signer.address();
            let provider = ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(url)
                .erased();
            Ok((provider, Some(address)))
        }
        None => Ok((ProviderBuilder::new().connect_http(url).erased(), None)),
    }
}

async fn with_timeout<T, E, F>(operation: &'static str, secs: u64, fut: F) -> Result<T, ChainError>
where
    E: std::fmt::Display,
    F: IntoFuture<Output = Result<T, E>>,
{
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ChainError::RpcError(format!("{}: {}", operation, e))),
        Err(_) => Err(ChainError::Timeout { operation, secs }),
    }
}

/// Signed-write path shared by both clients
struct Writer<P> {
    provider: P,
    signer: Option<Address>,
    dry_run: bool,
    timeout_secs: u64,
}

impl<P> Writer<P>
where
    P: Provider + Clone,
{
    async fn send(
        &self,
        operation: &'static str,
        to: Address,
        input: Vec<u8>,
    ) -> Result<TransactionReceipt, ChainError> {
        if self.dry_run {
            tracing::info!(operation, %to, "Dry run, transaction not sent");
            return Err(ChainError::DryRun { operation });
        }
        if self.signer.is_none() {
            return Err(ChainError::MissingSigner);
        }

        let tx = TransactionRequest::default().to(to).input(input.into());
        let pending = with_timeout(operation, self.timeout_secs, self.provider.send_transaction(tx)).await?;
        tracing::debug!(operation, tx_hash = %pending.tx_hash(), "Transaction sent");

        let receipt = with_timeout(operation, self.timeout_secs, pending.get_receipt()).await?;
        if !receipt.status() {
            return Err(ChainError::TransactionReverted {
                tx_hash: receipt.transaction_hash,
            });
        }
        Ok(receipt)
    }
}

fn to_tx_receipt(receipt: &TransactionReceipt) -> TxReceipt {
    TxReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number.unwrap_or(0),
        gas_used: receipt.gas_used,
    }
}

/// FrogConnector client for one target chain
pub struct AlloyTargetChain<P> {
    chain_id: u64,
    connector: Address,
    provider: P,
    writer: Writer<P>,
    timeout_secs: u64,
}

impl<P> AlloyTargetChain<P>
where
    P: Provider + Clone,
{
    pub fn new(
        chain_id: u64,
        connector: Address,
        provider: P,
        signer: Option<Address>,
        dry_run: bool,
        timeout_secs: u64,
    ) -> Self {
        Self {
            chain_id,
            connector,
            writer: Writer {
                provider: provider.clone(),
                signer,
                dry_run,
                timeout_secs,
            },
            provider,
            timeout_secs,
        }
    }
}

#[async_trait::async_trait]
impl<P> TargetChainClient for AlloyTargetChain<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        with_timeout("get_block_number", self.timeout_secs, self.provider.get_block_number()).await
    }

    async fn connector_events(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<ConnectorEvent>, ChainError> {
        let filter = Filter::new()
            .address(self.connector)
            .event_signature(EventSignatures::all())
            .from_block(from)
            .to_block(to);

        let logs = with_timeout("get_logs", self.timeout_secs, self.provider.get_logs(&filter)).await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            let meta = EventMeta {
                chain_id: self.chain_id,
                block_number: log.block_number.unwrap_or(0),
                log_index: log.log_index.unwrap_or(0),
                tx_hash: log.transaction_hash.unwrap_or_default(),
            };
            match parse_log(&log.inner, meta) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(chain_id = self.chain_id, block = meta.block_number, %e, "Skipping unparsable connector log");
                }
            }
        }
        sort_events(&mut events);
        Ok(events)
    }

    async fn latest_block_tx_count(&self) -> Result<usize, ChainError> {
        let block = with_timeout(
            "get_block_by_number",
            self.timeout_secs,
            self.provider.get_block_by_number(BlockNumberOrTag::Latest),
        )
        .await?;
        Ok(block.map(|b| b.transactions.len()).unwrap_or(0))
    }

    async fn recent_active_addresses(
        &self,
        blocks: u64,
        max: usize,
    ) -> Result<Vec<Address>, ChainError> {
        let latest = self.block_number().await?;
        let mut seen = HashSet::new();
        let mut addresses = Vec::new();

        for offset in 0..blocks {
            if addresses.len() >= max || offset > latest {
                break;
            }
            let number = BlockNumberOrTag::Number(latest - offset);
            let block = with_timeout(
                "get_block_by_number",
                self.timeout_secs,
                self.provider.get_block_by_number(number).full(),
            )
            .await?;
            let Some(block) = block else { continue };

            for tx in block.transactions.txns() {
                if let Some(to) = tx.to() {
                    if seen.insert(to) {
                        addresses.push(to);
                        if addresses.len() >= max {
                            break;
                        }
                    }
                }
            }
        }
        Ok(addresses)
    }

    async fn is_contract(&self, address: Address) -> Result<bool, ChainError> {
        let code = with_timeout("get_code_at", self.timeout_secs, self.provider.get_code_at(address)).await?;
        Ok(!code.is_empty())
    }

    async fn should_return(&self, token_id: u64) -> Result<ReturnCheck, ChainError> {
        let connector = IFrogConnector::new(self.connector, &self.provider);
        let result = with_timeout(
            "shouldReturn",
            self.timeout_secs,
            connector.shouldReturn(U256::from(token_id)).call(),
        )
        .await?;
        Ok(ReturnCheck {
            should_return: result.should,
            reason: result.reason,
        })
    }

    async fn auto_return(&self, token_id: u64) -> Result<TxReceipt, ChainError> {
        let call = IFrogConnector::autoReturnFrogCall {
            tokenId: U256::from(token_id),
        };
        let receipt = self
            .writer
            .send("autoReturnFrog", self.connector, call.abi_encode())
            .await?;
        Ok(to_tx_receipt(&receipt))
    }

    async fn random_explore(
        &self,
        token_id: u64,
        observation: &str,
    ) -> Result<DirectExploration, ChainError> {
        let call = IFrogConnector::randomExploreCall {
            tokenId: U256::from(token_id),
            observation: observation.to_string(),
        };
        let receipt = self
            .writer
            .send("randomExplore", self.connector, call.abi_encode())
            .await?;

        let explored = receipt
            .inner
            .logs()
            .iter()
            .find_map(|log| IFrogConnector::RandomExploration::decode_log(&log.inner).ok())
            .ok_or(ChainError::MissingReceiptLog {
                event: "RandomExploration",
                tx_hash: receipt.transaction_hash,
            })?;

        Ok(DirectExploration {
            receipt: to_tx_receipt(&receipt),
            explored_address: explored.exploredAddress,
            is_contract: explored.isContract,
            code_size: u64::try_from(explored.codeSize).unwrap_or(u64::MAX),
            observation: explored.observation.clone(),
        })
    }
}

/// OmniTravel client on the home chain
pub struct AlloyHomeChain<P> {
    omni_travel: Address,
    writer: Writer<P>,
    gateway_enabled: bool,
    safety_reserve_wei: u128,
}

impl<P> AlloyHomeChain<P>
where
    P: Provider + Clone,
{
    pub fn new(
        omni_travel: Address,
        provider: P,
        signer: Option<Address>,
        dry_run: bool,
        timeout_secs: u64,
        gateway_enabled: bool,
        safety_reserve_wei: u128,
    ) -> Self {
        Self {
            omni_travel,
            writer: Writer {
                provider,
                signer,
                dry_run,
                timeout_secs,
            },
            gateway_enabled,
            safety_reserve_wei,
        }
    }
}

#[async_trait::async_trait]
impl<P> HomeChainClient for AlloyHomeChain<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    fn gateway_enabled(&self) -> bool {
        self.gateway_enabled && self.omni_travel != Address::ZERO
    }

    async fn unlock_frog(
        &self,
        token_id: u64,
        return_message_id: B256,
        xp_earned: u64,
    ) -> Result<UnlockReceipt, ChainError> {
        let call = IOmniTravel::unlockFrogFromCrossChainCall {
            tokenId: U256::from(token_id),
            returnMessageId: return_message_id,
            xpEarned: U256::from(xp_earned),
        };
        let receipt = self
            .writer
            .send("unlockFrogFromCrossChain", self.omni_travel, call.abi_encode())
            .await?;

        let refund_wei = receipt.inner.logs().iter().find_map(|log| {
            IOmniTravel::ProvisionsRefunded::decode_log(&log.inner)
                .ok()
                .map(|refund| refund.remaining)
        });

        Ok(UnlockReceipt {
            receipt: to_tx_receipt(&receipt),
            refund_wei,
        })
    }

    async fn trigger_exploration(
        &self,
        token_id: u64,
        observation: &str,
    ) -> Result<GatewayExploration, ChainError> {
        let call = IOmniTravel::triggerExplorationCall {
            tokenId: U256::from(token_id),
            observation: observation.to_string(),
            minReserve: U256::from(self.safety_reserve_wei),
        };
        let receipt = self
            .writer
            .send("triggerExploration", self.omni_travel, call.abi_encode())
            .await?;

        let triggered = receipt.inner.logs().iter().find_map(|log| {
            IOmniTravel::ExplorationTriggered::decode_log(&log.inner)
                .ok()
                .map(|event| event.observation.clone())
        });

        let (is_virtual, observation) = match triggered {
            Some(logged) => (logged.starts_with(VIRTUAL_OBSERVATION_PREFIX), logged),
            None => (false, observation.to_string()),
        };

        Ok(GatewayExploration {
            receipt: to_tx_receipt(&receipt),
            is_virtual,
            observation,
        })
    }
}
