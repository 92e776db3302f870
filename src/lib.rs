//! Token bridge library
//!
//! Orchestrates attestation, transfer, attestation retrieval and redemption of
//! tokens across a Wormhole-style bridge. Chains, signers and the guardian
//! network are reached through capability traits; EVM JSON-RPC and guardian
//! REST implementations are included.

pub mod attestation;
pub mod chains;
pub mod config;
pub mod error;
pub mod guardian_client;
pub mod service;
pub mod store;
pub mod types;

// Re-export public types for convenience
pub use attestation::{Attestation, AttestationView, GuardianSignature, TokenBridgePayload};
pub use chains::{ChainAdapter, ChainDirectory, EvmChainAdapter, JsonRpcSigner, TransactionSigner};
pub use config::{BridgeConfig, ChainConfig, SignerConfig};
pub use error::BridgeError;
pub use guardian_client::{AttestationSource, GuardianClient};
pub use service::{
    AttestOptions, AttestationWaiter, ConfirmationPolicy, Orchestrator, PollPolicy, SignerSet,
    Step, TracingObserver, TransactionSubmitter, Workflow, WorkflowError, WorkflowObserver,
    WorkflowTimeouts,
};
pub use store::AttestationStore;
pub use types::{
    BridgeMessage, ChainId, MessageId, MessageKind, TokenAddress, TokenId, TransactionReceipt,
    TransferRequest, TxPayload, TxStatus, UnsignedTransaction,
};
