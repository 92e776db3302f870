//! Shared test helpers for bridge tests
//!
//! This module provides constants, in-memory fakes of the capability traits and
//! attestation builders used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use ethereum_types::U256;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

use token_bridge::attestation::{self, Attestation, GuardianSignature, TokenBridgePayload};
use token_bridge::chains::{ChainAdapter, TransactionSigner};
use token_bridge::config::{BridgeConfig, ChainConfig, ServiceConfig, SignerConfig, TimeoutConfig};
use token_bridge::error::{BridgeError, Result};
use token_bridge::guardian_client::AttestationSource;
use token_bridge::service::{
    AttestationWaiter, ConfirmationPolicy, Orchestrator, PollPolicy, RecordingObserver, SignerSet,
    TransactionSubmitter, WorkflowTimeouts,
};
use token_bridge::store::AttestationStore;
use token_bridge::types::{
    BridgeMessage, ChainId, MessageId, MessageKind, TokenAddress, TokenId, TxPayload, TxStatus,
    UnsignedTransaction,
};

// ============================================================================
// CONSTANTS
// ============================================================================

// -------------------------------- CHAINS --------------------------------

/// Source chain name
pub const DUMMY_SOURCE_CHAIN: &str = "ArbitrumSepolia";

/// Destination chain name
pub const DUMMY_DESTINATION_CHAIN: &str = "Celo";

/// Bridge chain id of the source chain
pub const DUMMY_SOURCE_BRIDGE_ID: u16 = 10003;

/// Bridge chain id of the destination chain
pub const DUMMY_DESTINATION_BRIDGE_ID: u16 = 14;

// -------------------------------- USERS ---------------------------------

/// Dummy sender address on the source chain (EVM format, 40 hex characters)
pub const DUMMY_SENDER_ADDR_EVM: &str = "0x0000000000000000000000000000000000000001";

/// Dummy recipient address on the destination chain (EVM format, 40 hex characters)
pub const DUMMY_RECIPIENT_ADDR_EVM: &str = "0x0000000000000000000000000000000000000002";

// ------------------------- TOKENS AND CONTRACTS -------------------------

/// Dummy ERC20 token address (EVM format, 40 hex characters)
pub const DUMMY_TOKEN_ADDR_EVM: &str = "0x000000000000000000000000000000000000000a";

/// Dummy Core Bridge address (EVM format, 40 hex characters)
pub const DUMMY_CORE_BRIDGE_ADDR_EVM: &str = "0x000000000000000000000000000000000000000b";

/// Dummy Token Bridge address (EVM format, 40 hex characters)
pub const DUMMY_TOKEN_BRIDGE_ADDR_EVM: &str = "0x000000000000000000000000000000000000000c";

/// Dummy wrapped native token address (EVM format, 40 hex characters)
pub const DUMMY_WRAPPED_NATIVE_ADDR_EVM: &str = "0x000000000000000000000000000000000000000d";

/// Emitter address of the source Token Bridge (32 bytes, left-padded)
pub const DUMMY_EMITTER: [u8; 32] = {
    let mut e = [0u8; 32];
    e[31] = 0x0c;
    e
};

// -------------------------------- OTHER ---------------------------------

/// Dummy transaction hash (64 hex characters)
pub const DUMMY_TX_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000012";

/// Block every mock transaction is included in
pub const DUMMY_BLOCK: u64 = 100;

// ============================================================================
// MOCK CHAIN ADAPTER
// ============================================================================

/// In-memory chain adapter.
///
/// Every transaction it sees is included in [`DUMMY_BLOCK`] unless listed in
/// `reverted` or `pending`. Every parsed transaction yields `messages`.
pub struct MockChainAdapter {
    pub chain: ChainId,
    pub decimals: u8,
    /// Makes `get_decimals` fail like an unreachable node
    pub decimals_unavailable: bool,
    pub balance: Mutex<U256>,
    pub registered: Mutex<bool>,
    pub messages: Mutex<Vec<BridgeMessage>>,
    pub head: Mutex<u64>,
    pub reverted: Mutex<HashSet<String>>,
    pub pending: Mutex<HashSet<String>>,
    /// Descriptions of every transaction built, in order
    pub built: Mutex<Vec<String>>,
    /// Name of every trait method called, in order
    pub calls: Mutex<Vec<&'static str>>,
}

impl MockChainAdapter {
    pub fn new(chain: &str) -> Self {
        Self {
            chain: ChainId::new(chain),
            decimals: 6,
            decimals_unavailable: false,
            balance: Mutex::new(U256::zero()),
            registered: Mutex::new(true),
            messages: Mutex::new(Vec::new()),
            head: Mutex::new(DUMMY_BLOCK),
            reverted: Mutex::new(HashSet::new()),
            pending: Mutex::new(HashSet::new()),
            built: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_balance(self, balance: u64) -> Self {
        *self.balance.lock().unwrap() = U256::from(balance);
        self
    }

    pub fn with_decimals_unavailable(mut self) -> Self {
        self.decimals_unavailable = true;
        self
    }

    pub fn with_registered(self, registered: bool) -> Self {
        *self.registered.lock().unwrap() = registered;
        self
    }

    pub fn with_messages(self, messages: Vec<BridgeMessage>) -> Self {
        *self.messages.lock().unwrap() = messages;
        self
    }

    pub fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn build(&self, description: &str) -> Vec<UnsignedTransaction> {
        self.built.lock().unwrap().push(description.to_string());
        vec![UnsignedTransaction::new(
            self.chain.clone(),
            description,
            TxPayload::EvmCall {
                to: DUMMY_TOKEN_BRIDGE_ADDR_EVM.to_string(),
                data: description.as_bytes().to_vec(),
                value: U256::zero(),
            },
        )]
    }
}

#[async_trait]
impl ChainAdapter for MockChainAdapter {
    fn chain(&self) -> &ChainId {
        &self.chain
    }

    async fn get_decimals(&self, _token: &TokenId) -> Result<u8> {
        self.record("get_decimals");
        if self.decimals_unavailable {
            return Err(BridgeError::Chain(anyhow::anyhow!("decimals() call failed")));
        }
        Ok(self.decimals)
    }

    async fn get_balance(&self, _token: &TokenId, _holder: &str) -> Result<U256> {
        self.record("get_balance");
        Ok(*self.balance.lock().unwrap())
    }

    async fn is_asset_registered(&self, _origin_token: &TokenId) -> Result<bool> {
        self.record("is_asset_registered");
        Ok(*self.registered.lock().unwrap())
    }

    async fn build_attestation_tx(&self, _token: &TokenId) -> Result<Vec<UnsignedTransaction>> {
        self.record("build_attestation_tx");
        Ok(self.build("TokenBridge.attestToken"))
    }

    async fn build_register_tx(&self, _attestation: &Attestation) -> Result<Vec<UnsignedTransaction>> {
        self.record("build_register_tx");
        Ok(self.build("TokenBridge.createWrapped"))
    }

    async fn build_approval_tx(
        &self,
        _owner: &str,
        token: &TokenId,
        _amount: U256,
    ) -> Result<Vec<UnsignedTransaction>> {
        self.record("build_approval_tx");
        if token.address.is_native() {
            return Ok(Vec::new());
        }
        Ok(self.build("ERC20.approve"))
    }

    async fn build_transfer_tx(
        &self,
        _sender: &str,
        _token: &TokenId,
        _amount: U256,
        _destination: &ChainId,
        _recipient: &str,
    ) -> Result<Vec<UnsignedTransaction>> {
        self.record("build_transfer_tx");
        Ok(self.build("TokenBridge.transferTokens"))
    }

    async fn build_redeem_tx(
        &self,
        _recipient: &str,
        _attestation: &Attestation,
    ) -> Result<Vec<UnsignedTransaction>> {
        self.record("build_redeem_tx");
        Ok(self.build("TokenBridge.completeTransfer"))
    }

    async fn transaction_status(&self, tx_id: &str) -> Result<TxStatus> {
        if self.pending.lock().unwrap().contains(tx_id) {
            return Ok(TxStatus::Pending);
        }
        Ok(TxStatus::Included {
            block_number: DUMMY_BLOCK,
            success: !self.reverted.lock().unwrap().contains(tx_id),
        })
    }

    async fn block_height(&self) -> Result<u64> {
        Ok(*self.head.lock().unwrap())
    }

    async fn parse_finalized_transaction(&self, tx_id: &str) -> Result<Vec<BridgeMessage>> {
        self.record("parse_finalized_transaction");
        let messages: Vec<BridgeMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .cloned()
            .map(|m| BridgeMessage {
                tx_id: tx_id.to_string(),
                ..m
            })
            .collect();
        if messages.is_empty() {
            return Err(BridgeError::NoMessageFound {
                chain: self.chain.clone(),
                tx_id: tx_id.to_string(),
            });
        }
        Ok(messages)
    }
}

// ============================================================================
// MOCK SIGNER
// ============================================================================

/// Signer returning sequential transaction ids `0x<prefix><n>`.
pub struct MockSigner {
    pub address: String,
    pub prefix: String,
    /// Zero-based index of the send call that fails
    pub fail_at: Option<usize>,
    pub sent: Mutex<Vec<String>>,
    counter: AtomicUsize,
}

impl MockSigner {
    pub fn new(address: &str, prefix: &str) -> Self {
        Self {
            address: address.to_string(),
            prefix: prefix.to_string(),
            fail_at: None,
            sent: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        }
    }

    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Descriptions of every transaction sent, in order
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    fn address(&self) -> &str {
        &self.address
    }

    async fn sign_and_send(&self, tx: &UnsignedTransaction) -> anyhow::Result<String> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(n) {
            anyhow::bail!("signer rejected {}", tx.description());
        }
        self.sent.lock().unwrap().push(tx.description().to_string());
        Ok(format!("0x{}{}", self.prefix, n))
    }
}

// ============================================================================
// SCRIPTED ATTESTATION SOURCE
// ============================================================================

/// Replays scripted responses and then reports "not yet signed" forever.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<anyhow::Result<Option<Vec<u8>>>>>,
    /// Time of every fetch
    pub polls: Mutex<Vec<Instant>>,
}

impl ScriptedSource {
    pub fn new(responses: Vec<anyhow::Result<Option<Vec<u8>>>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            polls: Mutex::new(Vec::new()),
        }
    }

    /// Source that never produces an attestation
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Source that returns `attestation` on the first poll
    pub fn ready(attestation: &Attestation) -> Self {
        Self::new(vec![Ok(Some(attestation::encode(attestation).unwrap()))])
    }

    pub fn poll_count(&self) -> usize {
        self.polls.lock().unwrap().len()
    }

    pub fn poll_times(&self) -> Vec<Instant> {
        self.polls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttestationSource for ScriptedSource {
    async fn fetch_signed(&self, _id: &MessageId) -> anyhow::Result<Option<Vec<u8>>> {
        self.polls.lock().unwrap().push(Instant::now());
        self.responses.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

pub fn source_chain() -> ChainId {
    ChainId::new(DUMMY_SOURCE_CHAIN)
}

pub fn destination_chain() -> ChainId {
    ChainId::new(DUMMY_DESTINATION_CHAIN)
}

/// ERC20 token on the source chain
pub fn dummy_token() -> TokenId {
    TokenId::new(
        source_chain(),
        TokenAddress::Contract(DUMMY_TOKEN_ADDR_EVM.to_string()),
    )
}

pub fn dummy_message_id(sequence: u64) -> MessageId {
    MessageId {
        emitter_chain: DUMMY_SOURCE_BRIDGE_ID,
        emitter_address: DUMMY_EMITTER,
        sequence,
    }
}

/// 32-byte left-padded form of a 20-byte EVM address
pub fn padded(addr: &str) -> [u8; 32] {
    let bytes = hex::decode(addr.trim_start_matches("0x")).unwrap();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Create a Transfer attestation with test values.
pub fn create_transfer_attestation(sequence: u64, amount: u64) -> Attestation {
    let payload = TokenBridgePayload::Transfer {
        amount: U256::from(amount),
        token_address: padded(DUMMY_TOKEN_ADDR_EVM),
        token_chain: DUMMY_SOURCE_BRIDGE_ID,
        to: padded(DUMMY_RECIPIENT_ADDR_EVM),
        to_chain: DUMMY_DESTINATION_BRIDGE_ID,
        fee: U256::zero(),
    };
    create_attestation(sequence, payload.encode())
}

/// Create an AttestMeta attestation with test values.
pub fn create_attest_meta_attestation(sequence: u64) -> Attestation {
    let mut symbol = [0u8; 32];
    symbol[..4].copy_from_slice(b"USDC");
    let mut name = [0u8; 32];
    name[..8].copy_from_slice(b"USD Coin");
    let payload = TokenBridgePayload::AttestMeta {
        token_address: padded(DUMMY_TOKEN_ADDR_EVM),
        token_chain: DUMMY_SOURCE_BRIDGE_ID,
        decimals: 6,
        symbol,
        name,
    };
    create_attestation(sequence, payload.encode())
}

pub fn create_attestation(sequence: u64, payload: Vec<u8>) -> Attestation {
    Attestation {
        version: 1,
        guardian_set_index: 0,
        signatures: vec![
            GuardianSignature {
                guardian_index: 0,
                signature: [0x11; 65],
            },
            GuardianSignature {
                guardian_index: 1,
                signature: [0x22; 65],
            },
        ],
        timestamp: 1_700_000_000,
        nonce: 7,
        emitter_chain: DUMMY_SOURCE_BRIDGE_ID,
        emitter_address: DUMMY_EMITTER,
        sequence,
        consistency_level: 1,
        payload,
    }
}

/// Message matching the attestation builders above
pub fn create_message(kind: MessageKind, sequence: u64) -> BridgeMessage {
    BridgeMessage {
        chain: source_chain(),
        tx_id: DUMMY_TX_HASH.to_string(),
        id: dummy_message_id(sequence),
        kind,
        payload: vec![kind.payload_id()],
    }
}

/// Confirmation policy that finishes instantly against the mock adapter
pub fn fast_confirmation_policy() -> ConfirmationPolicy {
    ConfirmationPolicy {
        confirmations: 1,
        poll_interval: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    }
}

/// Attestation store inside a fresh temp dir.
///
/// Keep the returned `TempDir` bound for the whole test; dropping it removes the directory.
pub fn create_temp_store() -> (TempDir, AttestationStore) {
    let dir = TempDir::new().unwrap();
    let store = AttestationStore::new(dir.path().join("transfer.bin"));
    (dir, store)
}

/// Everything an orchestrator test needs to inspect after a run.
pub struct Harness {
    pub source: Arc<MockChainAdapter>,
    pub destination: Arc<MockChainAdapter>,
    pub source_signer: Arc<MockSigner>,
    pub destination_signer: Arc<MockSigner>,
    pub attestations: Arc<ScriptedSource>,
    pub observer: Arc<RecordingObserver>,
    pub orchestrator: Orchestrator,
}

/// Wires mocks into an orchestrator with short timeouts.
pub fn create_harness(
    source: MockChainAdapter,
    destination: MockChainAdapter,
    source_signer: MockSigner,
    attestations: ScriptedSource,
) -> Harness {
    let source = Arc::new(source);
    let destination = Arc::new(destination);
    let source_signer = Arc::new(source_signer);
    let destination_signer = Arc::new(MockSigner::new(DUMMY_RECIPIENT_ADDR_EVM, "d"));
    let attestations = Arc::new(attestations);
    let observer = RecordingObserver::new();

    let orchestrator = Orchestrator::new(
        source.clone(),
        destination.clone(),
        SignerSet {
            source: source_signer.clone(),
            destination: destination_signer.clone(),
        },
        TransactionSubmitter::new(fast_confirmation_policy()),
        AttestationWaiter::new(
            attestations.clone(),
            PollPolicy::fixed(Duration::from_millis(10)),
        ),
    )
    .with_timeouts(WorkflowTimeouts {
        attest: Duration::from_secs(1),
        transfer: Duration::from_secs(1),
        fetch: Duration::from_secs(1),
    })
    .with_observer(observer.clone());

    Harness {
        source,
        destination,
        source_signer,
        destination_signer,
        attestations,
        observer,
        orchestrator,
    }
}

/// Create a default chain config with test values.
/// This can be customized using Rust's struct update syntax:
/// ```
/// let chain = ChainConfig {
///     confirmations: 3,
///     ..create_default_source_chain_config()
/// };
/// ```
pub fn create_default_source_chain_config() -> ChainConfig {
    ChainConfig {
        name: DUMMY_SOURCE_CHAIN.to_string(),
        rpc_url: "http://127.0.0.1:8545".to_string(),
        bridge_chain_id: DUMMY_SOURCE_BRIDGE_ID,
        core_bridge_addr: DUMMY_CORE_BRIDGE_ADDR_EVM.to_string(),
        token_bridge_addr: DUMMY_TOKEN_BRIDGE_ADDR_EVM.to_string(),
        wrapped_native_addr: Some(DUMMY_WRAPPED_NATIVE_ADDR_EVM.to_string()),
        native_decimals: 18,
        confirmations: 1,
        signer: SignerConfig {
            url: None,
            address: DUMMY_SENDER_ADDR_EVM.to_string(),
        },
    }
}

pub fn create_default_destination_chain_config() -> ChainConfig {
    ChainConfig {
        name: DUMMY_DESTINATION_CHAIN.to_string(),
        rpc_url: "http://127.0.0.1:8546".to_string(),
        bridge_chain_id: DUMMY_DESTINATION_BRIDGE_ID,
        core_bridge_addr: DUMMY_CORE_BRIDGE_ADDR_EVM.to_string(),
        token_bridge_addr: DUMMY_TOKEN_BRIDGE_ADDR_EVM.to_string(),
        wrapped_native_addr: None,
        native_decimals: 18,
        confirmations: 1,
        signer: SignerConfig {
            url: Some("http://127.0.0.1:8551".to_string()),
            address: DUMMY_RECIPIENT_ADDR_EVM.to_string(),
        },
    }
}

/// Create a default bridge config with test values.
pub fn create_default_bridge_config() -> BridgeConfig {
    BridgeConfig {
        service: ServiceConfig {
            guardian_urls: vec!["http://127.0.0.1:7071".to_string()],
            polling_interval_ms: 1000,
            max_polling_interval_ms: 30_000,
            backoff_multiplier: 2.0,
            attestation_path: "attestations/transfer.bin".to_string(),
        },
        source: create_default_source_chain_config(),
        destination: create_default_destination_chain_config(),
        timeouts: TimeoutConfig::default(),
    }
}
