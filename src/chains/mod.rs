//! Chain Adapters Module
//!
//! The orchestrator talks to chains only through [`ChainAdapter`] and
//! [`TransactionSigner`]. The EVM implementations speak JSON-RPC to a node and
//! to the Token Bridge / Core Bridge contracts.

pub mod abi;
pub mod evm;
pub mod signer;

use async_trait::async_trait;
use ethereum_types::U256;

use crate::attestation::Attestation;
use crate::error::Result;
use crate::types::{BridgeMessage, ChainId, TokenId, TxStatus, UnsignedTransaction};

pub use evm::{ChainDirectory, EvmChainAdapter};
pub use signer::{JsonRpcSigner, TransactionSigner};

/// Per-chain capability consumed by the orchestrator and submitter.
///
/// Builders may return several transactions; they must be submitted in the
/// returned order.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Chain this adapter serves
    fn chain(&self) -> &ChainId;

    /// Decimal precision of a token (native assets use the chain default)
    async fn get_decimals(&self, token: &TokenId) -> Result<u8>;

    /// Balance of `holder` in smallest units
    async fn get_balance(&self, token: &TokenId, holder: &str) -> Result<U256>;

    /// Whether `origin_token` has a wrapped asset on this chain
    async fn is_asset_registered(&self, origin_token: &TokenId) -> Result<bool>;

    async fn build_attestation_tx(&self, token: &TokenId) -> Result<Vec<UnsignedTransaction>>;

    /// Submits an AttestMeta attestation, creating the wrapped asset on this chain
    async fn build_register_tx(&self, attestation: &Attestation) -> Result<Vec<UnsignedTransaction>>;

    /// Allowance transactions needed before a transfer; empty for native assets
    async fn build_approval_tx(
        &self,
        owner: &str,
        token: &TokenId,
        amount: U256,
    ) -> Result<Vec<UnsignedTransaction>>;

    async fn build_transfer_tx(
        &self,
        sender: &str,
        token: &TokenId,
        amount: U256,
        destination: &ChainId,
        recipient: &str,
    ) -> Result<Vec<UnsignedTransaction>>;

    async fn build_redeem_tx(
        &self,
        recipient: &str,
        attestation: &Attestation,
    ) -> Result<Vec<UnsignedTransaction>>;

    /// Inclusion status of a broadcast transaction
    async fn transaction_status(&self, tx_id: &str) -> Result<TxStatus>;

    /// Current chain head
    async fn block_height(&self) -> Result<u64>;

    /// Bridge messages emitted by a finalized transaction.
    ///
    /// Fails with `NoMessageFound` when the transaction emitted none.
    async fn parse_finalized_transaction(&self, tx_id: &str) -> Result<Vec<BridgeMessage>>;
}
