//! EVM Chain Adapter
//!
//! JSON-RPC client for EVM chains running the Token Bridge and Core Bridge
//! contracts. Reads state with `eth_call`, builds calldata for the bridge
//! entrypoints and extracts `LogMessagePublished` events from receipts.

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use ethereum_types::U256;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::abi::{self, Param};
use super::ChainAdapter;
use crate::attestation::{self, Attestation, TokenBridgePayload};
use crate::config::ChainConfig;
use crate::error::{BridgeError, Result};
use crate::types::{
    BridgeMessage, ChainId, MessageId, MessageKind, TokenAddress, TokenId, TxPayload, TxStatus,
    UnsignedTransaction,
};

/// Core Bridge event carrying every published message
pub const LOG_MESSAGE_PUBLISHED: &str = "LogMessagePublished(address,uint64,uint32,bytes,uint8)";

// ============================================================================
// JSON-RPC STRUCTURES
// ============================================================================

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// EVM event log entry
#[derive(Debug, Clone, Deserialize)]
struct EvmLog {
    /// Address of the contract that emitted the event
    address: String,
    /// Array of topics (indexed event parameters)
    topics: Vec<String>,
    /// Event data (non-indexed parameters)
    data: String,
}

/// Subset of `eth_getTransactionReceipt` the adapter needs
#[derive(Debug, Clone, Deserialize)]
struct EvmReceipt {
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
    /// "0x1" = success, "0x0" = reverted
    status: Option<String>,
    #[serde(default)]
    logs: Vec<EvmLog>,
}

/// Posts a JSON-RPC call and unwraps the envelope.
///
/// Shared by the adapter and [`super::JsonRpcSigner`].
pub(crate) async fn json_rpc<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    method: &str,
    params: Vec<serde_json::Value>,
) -> AnyResult<Option<T>> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let response: JsonRpcResponse<T> = client
        .post(url)
        .json(&request)
        .send()
        .await
        .with_context(|| format!("Failed to send {} request to {}", method, url))?
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response from {}", method, url))?;

    if let Some(error) = response.error {
        anyhow::bail!(
            "JSON-RPC error from {} ({}): {} (code: {})",
            url,
            method,
            error.message,
            error.code
        );
    }

    Ok(response.result)
}

pub(crate) fn parse_hex_u64(value: &str) -> AnyResult<u64> {
    u64::from_str_radix(value.strip_prefix("0x").unwrap_or(value), 16)
        .with_context(|| format!("Failed to parse hex quantity {}", value))
}

pub(crate) fn parse_hex_u256(value: &str) -> AnyResult<U256> {
    U256::from_str_radix(value.strip_prefix("0x").unwrap_or(value), 16)
        .map_err(|e| anyhow::anyhow!("Failed to parse hex quantity {}: {:?}", value, e))
}

// ============================================================================
// CHAIN DIRECTORY
// ============================================================================

/// What an adapter needs to know about a peer chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    /// Numeric bridge chain id
    pub bridge_chain_id: u16,
    /// Wrapped-native token contract (the bridge's representation of the gas asset)
    pub wrapped_native_addr: Option<String>,
}

/// Maps opaque chain names to their bridge-level identity.
#[derive(Debug, Clone, Default)]
pub struct ChainDirectory {
    entries: HashMap<ChainId, ChainEntry>,
}

impl ChainDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chain: ChainId, entry: ChainEntry) {
        self.entries.insert(chain, entry);
    }

    pub fn from_configs<'a>(configs: impl IntoIterator<Item = &'a ChainConfig>) -> Self {
        let mut directory = Self::new();
        for config in configs {
            directory.insert(
                ChainId::new(&config.name),
                ChainEntry {
                    bridge_chain_id: config.bridge_chain_id,
                    wrapped_native_addr: config.wrapped_native_addr.clone(),
                },
            );
        }
        directory
    }

    pub fn get(&self, chain: &ChainId) -> AnyResult<&ChainEntry> {
        self.entries
            .get(chain)
            .ok_or_else(|| anyhow::anyhow!("Chain {} is not configured", chain))
    }
}

// ============================================================================
// EVM ADAPTER
// ============================================================================

/// Chain adapter for an EVM chain with the Token Bridge deployed
pub struct EvmChainAdapter {
    /// HTTP client for JSON-RPC calls
    client: Client,
    /// Base RPC URL
    rpc_url: String,
    chain: ChainId,
    /// Numeric bridge chain id of this chain
    bridge_chain_id: u16,
    token_bridge_addr: String,
    core_bridge_addr: String,
    native_decimals: u8,
    directory: ChainDirectory,
}

impl EvmChainAdapter {
    /// Creates a new EVM adapter
    ///
    /// # Arguments
    ///
    /// * `config` - Chain configuration
    /// * `directory` - Bridge identities of every configured chain (including this one)
    ///
    /// # Returns
    ///
    /// * `Ok(EvmChainAdapter)` - Successfully created adapter
    /// * `Err(anyhow::Error)` - Failed to create HTTP client
    pub fn new(config: &ChainConfig, directory: ChainDirectory) -> AnyResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            rpc_url: config.rpc_url.clone(),
            chain: ChainId::new(&config.name),
            bridge_chain_id: config.bridge_chain_id,
            token_bridge_addr: config.token_bridge_addr.clone(),
            core_bridge_addr: config.core_bridge_addr.clone(),
            native_decimals: config.native_decimals,
            directory,
        })
    }

    async fn rpc<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> AnyResult<Option<T>> {
        json_rpc(&self.client, &self.rpc_url, method, params).await
    }

    /// `eth_call` against the latest block, returning raw return data
    async fn call(&self, to: &str, data: Vec<u8>) -> AnyResult<Vec<u8>> {
        let params = vec![
            serde_json::json!({
                "to": to,
                "data": format!("0x{}", hex::encode(&data)),
            }),
            serde_json::json!("latest"),
        ];
        let result: Option<String> = self.rpc("eth_call", params).await?;
        let result = result.ok_or_else(|| anyhow::anyhow!("Empty eth_call result from {}", to))?;
        abi::decode_hex(&result)
    }

    /// Core Bridge fee for publishing one message, in wei
    async fn message_fee(&self) -> AnyResult<U256> {
        let data = self
            .call(&self.core_bridge_addr, abi::encode_call("messageFee()", &[]))
            .await
            .context("Failed to query messageFee")?;
        abi::word_u256(&data, 0)
    }

    /// Contract address a token is represented by on its own chain.
    fn contract_address(&self, token: &TokenId) -> AnyResult<String> {
        match &token.address {
            TokenAddress::Contract(addr) => Ok(addr.clone()),
            TokenAddress::Native => self
                .directory
                .get(&token.chain)?
                .wrapped_native_addr
                .clone()
                .ok_or_else(|| {
                    anyhow::anyhow!("No wrapped_native_addr configured for chain {}", token.chain)
                }),
        }
    }

    /// This chain's view of the 32-byte recipient on `destination`.
    fn recipient_word(recipient: &str) -> AnyResult<[u8; 32]> {
        let stripped = recipient.strip_prefix("0x").unwrap_or(recipient);
        if stripped.len() == 64 {
            let bytes = hex::decode(stripped).context("Invalid hex recipient")?;
            let mut out = [0u8; 32];
            out.copy_from_slice(&bytes);
            return Ok(out);
        }
        abi::address_word(recipient)
    }

    fn evm_call(&self, description: &str, to: &str, data: Vec<u8>, value: U256) -> UnsignedTransaction {
        UnsignedTransaction::new(
            self.chain.clone(),
            description,
            TxPayload::EvmCall {
                to: to.to_string(),
                data,
                value,
            },
        )
    }

    async fn receipt(&self, tx_id: &str) -> AnyResult<Option<EvmReceipt>> {
        self.rpc("eth_getTransactionReceipt", vec![serde_json::json!(tx_id)])
            .await
    }
}

#[async_trait]
impl ChainAdapter for EvmChainAdapter {
    fn chain(&self) -> &ChainId {
        &self.chain
    }

    async fn get_decimals(&self, token: &TokenId) -> Result<u8> {
        let addr = match &token.address {
            TokenAddress::Native => return Ok(self.native_decimals),
            TokenAddress::Contract(addr) => addr,
        };

        let data = self
            .call(addr, abi::encode_call("decimals()", &[]))
            .await
            .with_context(|| format!("Failed to query decimals of {}", addr))?;
        let decimals = abi::word_u256(&data, 0)?;
        if decimals > U256::from(u8::MAX) {
            return Err(anyhow::anyhow!("Token {} reports invalid decimals {}", addr, decimals).into());
        }
        Ok(decimals.as_u32() as u8)
    }

    async fn get_balance(&self, token: &TokenId, holder: &str) -> Result<U256> {
        match &token.address {
            TokenAddress::Native => {
                let result: Option<String> = self
                    .rpc(
                        "eth_getBalance",
                        vec![serde_json::json!(holder), serde_json::json!("latest")],
                    )
                    .await?;
                let result = result.ok_or_else(|| anyhow::anyhow!("Empty eth_getBalance result"))?;
                Ok(parse_hex_u256(&result)?)
            }
            TokenAddress::Contract(addr) => {
                let data = abi::encode_call("balanceOf(address)", &[Param::address(holder)?]);
                let result = self
                    .call(addr, data)
                    .await
                    .with_context(|| format!("Failed to query balanceOf on {}", addr))?;
                Ok(abi::word_u256(&result, 0)?)
            }
        }
    }

    async fn is_asset_registered(&self, origin_token: &TokenId) -> Result<bool> {
        let origin = self.directory.get(&origin_token.chain)?;
        let origin_addr = self.contract_address(origin_token)?;

        let data = abi::encode_call(
            "wrappedAsset(uint16,bytes32)",
            &[
                Param::uint(origin.bridge_chain_id),
                Param::Word(abi::address_word(&origin_addr)?),
            ],
        );
        let result = self
            .call(&self.token_bridge_addr, data)
            .await
            .context("Failed to query wrappedAsset")?;
        let wrapped = abi::word(&result, 0)?;
        let registered = wrapped != [0u8; 32];

        debug!(
            "wrappedAsset({}, {}) on {} = {}",
            origin.bridge_chain_id,
            origin_addr,
            self.chain,
            abi::word_to_address(&wrapped)
        );
        Ok(registered)
    }

    async fn build_attestation_tx(&self, token: &TokenId) -> Result<Vec<UnsignedTransaction>> {
        let token_addr = self.contract_address(token)?;
        let fee = self.message_fee().await?;
        let data = abi::encode_call(
            "attestToken(address,uint32)",
            &[Param::address(&token_addr)?, Param::uint(0u32)],
        );
        Ok(vec![self.evm_call(
            "TokenBridge.attestToken",
            &self.token_bridge_addr,
            data,
            fee,
        )])
    }

    async fn build_register_tx(&self, attestation: &Attestation) -> Result<Vec<UnsignedTransaction>> {
        if attestation.kind()? != MessageKind::AttestMeta {
            return Err(BridgeError::AttestationKindMismatch {
                expected: MessageKind::AttestMeta,
                actual: attestation.kind()?,
            });
        }
        let data = abi::encode_call(
            "createWrapped(bytes)",
            &[Param::Bytes(attestation::encode(attestation)?)],
        );
        Ok(vec![self.evm_call(
            "TokenBridge.createWrapped",
            &self.token_bridge_addr,
            data,
            U256::zero(),
        )])
    }

    async fn build_approval_tx(
        &self,
        owner: &str,
        token: &TokenId,
        amount: U256,
    ) -> Result<Vec<UnsignedTransaction>> {
        let token_addr = match &token.address {
            TokenAddress::Native => return Ok(Vec::new()),
            TokenAddress::Contract(addr) => addr,
        };

        let allowance_data = abi::encode_call(
            "allowance(address,address)",
            &[Param::address(owner)?, Param::address(&self.token_bridge_addr)?],
        );
        let allowance = abi::word_u256(
            &self
                .call(token_addr, allowance_data)
                .await
                .context("Failed to query allowance")?,
            0,
        )?;
        if allowance >= amount {
            info!(
                "Existing allowance {} already covers {} on {}",
                allowance, amount, token_addr
            );
            return Ok(Vec::new());
        }

        let data = abi::encode_call(
            "approve(address,uint256)",
            &[Param::address(&self.token_bridge_addr)?, Param::uint(amount)],
        );
        Ok(vec![self.evm_call("ERC20.approve", token_addr, data, U256::zero())])
    }

    async fn build_transfer_tx(
        &self,
        _sender: &str,
        token: &TokenId,
        amount: U256,
        destination: &ChainId,
        recipient: &str,
    ) -> Result<Vec<UnsignedTransaction>> {
        let recipient_chain = self.directory.get(destination)?.bridge_chain_id;
        let recipient = Self::recipient_word(recipient)?;
        let fee = self.message_fee().await?;

        let tx = match &token.address {
            TokenAddress::Native => {
                let data = abi::encode_call(
                    "wrapAndTransferETH(uint16,bytes32,uint256,uint32)",
                    &[
                        Param::uint(recipient_chain),
                        Param::Word(recipient),
                        Param::uint(0u64),
                        Param::uint(0u32),
                    ],
                );
                let value = amount
                    .checked_add(fee)
                    .ok_or_else(|| anyhow::anyhow!("Transfer value overflows"))?;
                self.evm_call(
                    "TokenBridge.wrapAndTransferETH",
                    &self.token_bridge_addr,
                    data,
                    value,
                )
            }
            TokenAddress::Contract(addr) => {
                let data = abi::encode_call(
                    "transferTokens(address,uint256,uint16,bytes32,uint256,uint32)",
                    &[
                        Param::address(addr)?,
                        Param::uint(amount),
                        Param::uint(recipient_chain),
                        Param::Word(recipient),
                        Param::uint(0u64),
                        Param::uint(0u32),
                    ],
                );
                self.evm_call(
                    "TokenBridge.transferTokens",
                    &self.token_bridge_addr,
                    data,
                    fee,
                )
            }
        };
        Ok(vec![tx])
    }

    async fn build_redeem_tx(
        &self,
        recipient: &str,
        attestation: &Attestation,
    ) -> Result<Vec<UnsignedTransaction>> {
        if let TokenBridgePayload::Transfer { to, to_chain, .. } = attestation.token_bridge_payload()? {
            if to_chain != self.bridge_chain_id {
                warn!(
                    "Attestation targets bridge chain {}, but {} is bridge chain {}",
                    to_chain, self.chain, self.bridge_chain_id
                );
            }
            if Self::recipient_word(recipient).ok() != Some(to) {
                warn!(
                    "Attestation pays 0x{}, not {}; redeeming on its behalf",
                    hex::encode(to),
                    recipient
                );
            }
        }

        let data = abi::encode_call(
            "completeTransfer(bytes)",
            &[Param::Bytes(attestation::encode(attestation)?)],
        );
        Ok(vec![self.evm_call(
            "TokenBridge.completeTransfer",
            &self.token_bridge_addr,
            data,
            U256::zero(),
        )])
    }

    async fn transaction_status(&self, tx_id: &str) -> Result<TxStatus> {
        let receipt = match self.receipt(tx_id).await? {
            Some(r) => r,
            None => return Ok(TxStatus::Pending),
        };
        let block_number = match &receipt.block_number {
            Some(b) => parse_hex_u64(b)?,
            None => return Ok(TxStatus::Pending),
        };
        let success = receipt.status.as_deref().map(|s| s == "0x1").unwrap_or(false);
        Ok(TxStatus::Included {
            block_number,
            success,
        })
    }

    async fn block_height(&self) -> Result<u64> {
        let result: Option<String> = self.rpc("eth_blockNumber", vec![]).await?;
        let result = result.ok_or_else(|| anyhow::anyhow!("No result in eth_blockNumber response"))?;
        Ok(parse_hex_u64(&result)?)
    }

    async fn parse_finalized_transaction(&self, tx_id: &str) -> Result<Vec<BridgeMessage>> {
        let receipt = self
            .receipt(tx_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Transaction {} not found on {}", tx_id, self.chain))?;

        let topic = abi::event_topic(LOG_MESSAGE_PUBLISHED);
        let mut messages = Vec::new();

        for log in receipt.logs {
            // topics[0] = event signature, topics[1] = sender (emitter, padded to 32 bytes)
            // data = abi.encode(sequence, nonce, payload, consistencyLevel)
            if !log.address.eq_ignore_ascii_case(&self.core_bridge_addr)
                || log.topics.len() < 2
                || !log.topics[0].eq_ignore_ascii_case(&topic)
            {
                continue;
            }

            let emitter = abi::decode_hex(&log.topics[1])?;
            if emitter.len() != 32 {
                continue;
            }
            let mut emitter_address = [0u8; 32];
            emitter_address.copy_from_slice(&emitter);

            let data = abi::decode_hex(&log.data)?;
            let sequence = abi::word_u256(&data, 0)?;
            if sequence > U256::from(u64::MAX) {
                continue;
            }
            let payload = abi::dynamic_bytes(&data, 2)?;

            let kind = match payload.first().copied().and_then(MessageKind::from_payload_id) {
                Some(kind) => kind,
                None => {
                    debug!("Skipping non token-bridge message in {}", tx_id);
                    continue;
                }
            };

            messages.push(BridgeMessage {
                chain: self.chain.clone(),
                tx_id: tx_id.to_string(),
                id: MessageId {
                    emitter_chain: self.bridge_chain_id,
                    emitter_address,
                    sequence: sequence.as_u64(),
                },
                kind,
                payload,
            });
        }

        if messages.is_empty() {
            return Err(BridgeError::NoMessageFound {
                chain: self.chain.clone(),
                tx_id: tx_id.to_string(),
            });
        }
        Ok(messages)
    }
}
