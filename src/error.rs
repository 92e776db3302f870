//! Error Taxonomy
//!
//! Every workflow failure is one of these kinds. `kind()` yields a stable,
//! machine-readable name that the CLI prints next to the failing step.

use ethereum_types::U256;
use thiserror::Error;

use crate::types::{ChainId, MessageId, MessageKind, TokenId, TransactionReceipt};

/// Errors surfaced by the bridge core.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("insufficient balance of {token}: have {available}, need {requested} (smallest units)")]
    InsufficientBalance {
        token: TokenId,
        available: U256,
        requested: U256,
    },

    #[error("token {token} has no wrapped asset registered on {destination}; run `attest` first")]
    UnregisteredAsset { token: TokenId, destination: ChainId },

    #[error("no bridge message found in transaction {tx_id} on {chain}")]
    NoMessageFound { chain: ChainId, tx_id: String },

    #[error("no {kind} attestation for message {message} within {timeout_secs}s")]
    AttestationTimeout {
        message: MessageId,
        kind: MessageKind,
        timeout_secs: u64,
    },

    #[error("attestation kind mismatch: expected {expected}, got {actual}")]
    AttestationKindMismatch {
        expected: MessageKind,
        actual: MessageKind,
    },

    #[error("failed to decode attestation: {0}")]
    AttestationDecode(String),

    #[error("failed to encode attestation: {0}")]
    AttestationEncode(String),

    #[error("transaction {index} ({description}) failed on {chain}: {reason}")]
    SubmissionFailed {
        chain: ChainId,
        /// Zero-based position of the failing transaction in the submitted sequence
        index: usize,
        description: String,
        /// Receipts of the transactions that committed before the failure
        receipts: Vec<TransactionReceipt>,
        reason: String,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("chain adapter error: {0:#}")]
    Chain(#[from] anyhow::Error),

    #[error("attestation file error: {0}")]
    Persistence(#[from] std::io::Error),
}

impl BridgeError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::InsufficientBalance { .. } => "insufficient_balance",
            BridgeError::UnregisteredAsset { .. } => "unregistered_asset",
            BridgeError::NoMessageFound { .. } => "no_message_found",
            BridgeError::AttestationTimeout { .. } => "attestation_timeout",
            BridgeError::AttestationKindMismatch { .. } => "attestation_kind_mismatch",
            BridgeError::AttestationDecode(_) => "attestation_decode",
            BridgeError::AttestationEncode(_) => "attestation_encode",
            BridgeError::SubmissionFailed { .. } => "submission_failed",
            BridgeError::InvalidRequest(_) => "invalid_request",
            BridgeError::Chain(_) => "chain_error",
            BridgeError::Persistence(_) => "persistence_error",
        }
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        BridgeError::AttestationDecode(msg.into())
    }
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
