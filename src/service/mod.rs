//! Bridge service modules
//!
//! This module contains the workflow orchestrator and the submission and
//! attestation-waiting primitives it is built from.

pub mod observer;
pub mod orchestrator;
pub mod submitter;
pub mod waiter;

// Re-export for convenience
pub use observer::{
    ObservedEvent, RecordingObserver, Step, TracingObserver, Workflow, WorkflowError,
    WorkflowObserver,
};
pub use orchestrator::{
    AttestOptions, AttestOutcome, FetchOutcome, Orchestrator, RedeemOutcome, SignerSet,
    TransferOutcome, WorkflowTimeouts,
};
pub use submitter::{ConfirmationPolicy, TransactionSubmitter};
pub use waiter::{AttestationWaiter, PollPolicy};
