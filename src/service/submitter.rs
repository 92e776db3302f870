//! Transaction Submitter
//!
//! Signs, broadcasts and confirms a sequence of transactions on one chain,
//! strictly one after another. A failure stops the sequence; transactions that
//! already confirmed stay committed and are reported in the error.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::chains::{ChainAdapter, TransactionSigner};
use crate::error::{BridgeError, Result};
use crate::types::{ChainId, TransactionReceipt, TxStatus, UnsignedTransaction};

/// How long and how deep to wait for a broadcast transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// Blocks (including the inclusion block) required before a transaction counts as final
    pub confirmations: u64,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            confirmations: 1,
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Submits unsigned transactions in order
#[derive(Debug, Clone, Default)]
pub struct TransactionSubmitter {
    default_policy: ConfirmationPolicy,
    chain_policies: HashMap<ChainId, ConfirmationPolicy>,
}

impl TransactionSubmitter {
    pub fn new(default_policy: ConfirmationPolicy) -> Self {
        Self {
            default_policy,
            chain_policies: HashMap::new(),
        }
    }

    /// Overrides the confirmation policy for one chain.
    pub fn with_chain_policy(mut self, chain: ChainId, policy: ConfirmationPolicy) -> Self {
        self.chain_policies.insert(chain, policy);
        self
    }

    pub fn policy_for(&self, chain: &ChainId) -> ConfirmationPolicy {
        self.chain_policies
            .get(chain)
            .copied()
            .unwrap_or(self.default_policy)
    }

    /// Signs, broadcasts and confirms each transaction in order.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<TransactionReceipt>)` - One receipt per transaction, in submission order
    /// * `Err(BridgeError::SubmissionFailed)` - Transaction `index` failed; nothing after it was sent
    pub async fn submit(
        &self,
        adapter: &dyn ChainAdapter,
        signer: &dyn TransactionSigner,
        txs: Vec<UnsignedTransaction>,
    ) -> Result<Vec<TransactionReceipt>> {
        let chain = adapter.chain().clone();
        let policy = self.policy_for(&chain);
        let total = txs.len();
        let mut receipts = Vec::with_capacity(total);

        for (index, tx) in txs.iter().enumerate() {
            let fail = |receipts: Vec<TransactionReceipt>, reason: String| BridgeError::SubmissionFailed {
                chain: chain.clone(),
                index,
                description: tx.description().to_string(),
                receipts,
                reason,
            };

            if tx.chain() != &chain {
                return Err(fail(
                    receipts,
                    format!("transaction was built for {}", tx.chain()),
                ));
            }

            let tx_id = match signer.sign_and_send(tx).await {
                Ok(id) => id,
                Err(e) => return Err(fail(receipts, format!("broadcast failed: {:#}", e))),
            };
            info!(
                "Sent {} ({}/{}) on {} from {}: {}",
                tx.description(),
                index + 1,
                total,
                chain,
                signer.address(),
                tx_id
            );

            match self.await_confirmation(adapter, &tx_id, policy).await {
                Ok(receipt) => {
                    info!(
                        "✅ {} confirmed in block {} ({} confirmations)",
                        tx_id, receipt.block_number, receipt.confirmations
                    );
                    receipts.push(receipt);
                }
                Err(reason) => return Err(fail(receipts, reason)),
            }
        }

        Ok(receipts)
    }

    /// Polls until the transaction reaches the policy's depth, reverts, or the timeout expires.
    async fn await_confirmation(
        &self,
        adapter: &dyn ChainAdapter,
        tx_id: &str,
        policy: ConfirmationPolicy,
    ) -> std::result::Result<TransactionReceipt, String> {
        let deadline = Instant::now() + policy.timeout;
        let required = policy.confirmations.max(1);

        loop {
            match self.check_once(adapter, tx_id, required).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(CheckError::Reverted(block)) => {
                    return Err(format!("transaction {} reverted in block {}", tx_id, block));
                }
                Err(CheckError::Rpc(e)) => {
                    warn!("Failed to query status of {}: {:#}", tx_id, e);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(format!(
                    "transaction {} not confirmed within {}s",
                    tx_id,
                    policy.timeout.as_secs()
                ));
            }
            tokio::time::sleep(policy.poll_interval.min(deadline - now)).await;
        }
    }

    async fn check_once(
        &self,
        adapter: &dyn ChainAdapter,
        tx_id: &str,
        required: u64,
    ) -> std::result::Result<Option<TransactionReceipt>, CheckError> {
        let block_number = match adapter.transaction_status(tx_id).await.map_err(CheckError::Rpc)? {
            TxStatus::Pending => return Ok(None),
            TxStatus::Included {
                success: false,
                block_number,
            } => return Err(CheckError::Reverted(block_number)),
            TxStatus::Included { block_number, .. } => block_number,
        };

        let head = adapter.block_height().await.map_err(CheckError::Rpc)?;
        let confirmations = head.saturating_sub(block_number) + 1;
        if confirmations < required {
            return Ok(None);
        }

        Ok(Some(TransactionReceipt {
            chain: adapter.chain().clone(),
            tx_id: tx_id.to_string(),
            block_number,
            confirmations,
        }))
    }
}

enum CheckError {
    Reverted(u64),
    Rpc(BridgeError),
}
