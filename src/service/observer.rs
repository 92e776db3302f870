//! Workflow states and transition observers
//!
//! Each workflow is a short linear state machine. Runs move strictly forward
//! through their workflow's step list and report every transition to a
//! [`WorkflowObserver`].

use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::error::BridgeError;
use crate::types::TransactionReceipt;

/// The four bridge workflows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workflow {
    Attest,
    Transfer,
    Redeem,
    Fetch,
}

impl Workflow {
    /// Ordered steps of the workflow, `Start` first and `Done` last.
    pub fn steps(self) -> &'static [Step] {
        use Step::*;
        match self {
            Workflow::Attest => &[
                Start,
                BuildAttestTx,
                Submit,
                ParseMessage,
                AwaitAttestation,
                RegisterOnDestination,
                Done,
            ],
            Workflow::Transfer => &[
                Start,
                CheckBalance,
                CheckRegistration,
                Approve,
                BuildTransferTx,
                Submit,
                ParseMessage,
                AwaitAttestation,
                Persist,
                Done,
            ],
            Workflow::Redeem => &[Start, LoadAttestation, BuildRedeemTx, Submit, Done],
            Workflow::Fetch => &[Start, ParseMessage, AwaitAttestation, Persist, Done],
        }
    }

    fn position(self, step: Step) -> Option<usize> {
        self.steps().iter().position(|s| *s == step)
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Workflow::Attest => "attest",
            Workflow::Transfer => "transfer",
            Workflow::Redeem => "redeem",
            Workflow::Fetch => "fetch",
        };
        f.write_str(name)
    }
}

/// A workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Start,
    CheckBalance,
    CheckRegistration,
    Approve,
    BuildAttestTx,
    BuildTransferTx,
    LoadAttestation,
    BuildRedeemTx,
    Submit,
    ParseMessage,
    AwaitAttestation,
    RegisterOnDestination,
    Persist,
    Done,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Receives workflow transitions.
pub trait WorkflowObserver: Send + Sync {
    fn on_transition(&self, workflow: Workflow, from: Step, to: Step);

    fn on_halt(&self, workflow: Workflow, at: Step, error: &BridgeError);
}

/// Logs transitions through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl WorkflowObserver for TracingObserver {
    fn on_transition(&self, workflow: Workflow, from: Step, to: Step) {
        if to == Step::Done {
            info!("🎉 [{}] {} -> {}", workflow, from, to);
        } else {
            info!("[{}] {} -> {}", workflow, from, to);
        }
    }

    fn on_halt(&self, workflow: Workflow, at: Step, error: &BridgeError) {
        error!("❌ [{}] halted at {} ({}): {}", workflow, at, error.kind(), error);
    }
}

/// One observed event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    Transition(Workflow, Step, Step),
    Halt(Workflow, Step, &'static str),
}

/// Keeps every event in memory; useful for embedding callers and tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Steps entered so far, starting with `Start`.
    pub fn steps(&self) -> Vec<Step> {
        let events = self.events();
        let mut steps = Vec::new();
        for event in &events {
            if let ObservedEvent::Transition(_, from, to) = event {
                if steps.is_empty() {
                    steps.push(*from);
                }
                steps.push(*to);
            }
        }
        steps
    }

    fn record(&self, event: ObservedEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl WorkflowObserver for RecordingObserver {
    fn on_transition(&self, workflow: Workflow, from: Step, to: Step) {
        self.record(ObservedEvent::Transition(workflow, from, to));
    }

    fn on_halt(&self, workflow: Workflow, at: Step, error: &BridgeError) {
        self.record(ObservedEvent::Halt(workflow, at, error.kind()));
    }
}

/// Failure of a workflow run: where it stopped, why, and what was already committed.
#[derive(Debug, thiserror::Error)]
#[error("{workflow} failed at step {step} [{}]: {error}", error.kind())]
pub struct WorkflowError {
    pub workflow: Workflow,
    pub step: Step,
    #[source]
    pub error: BridgeError,
    /// Receipts of every transaction that committed before the failure
    pub receipts: Vec<TransactionReceipt>,
}

/// Tracks the current step of one run and forwards transitions to the observer.
pub(crate) struct WorkflowRun {
    workflow: Workflow,
    current: Step,
    observer: Arc<dyn WorkflowObserver>,
    receipts: Vec<TransactionReceipt>,
}

impl WorkflowRun {
    pub(crate) fn start(workflow: Workflow, observer: Arc<dyn WorkflowObserver>) -> Self {
        Self {
            workflow,
            current: Step::Start,
            observer,
            receipts: Vec::new(),
        }
    }

    /// Moves to `next`, which must come later in the workflow than the current step.
    pub(crate) fn enter(&mut self, next: Step) {
        debug_assert!(
            matches!(
                (self.workflow.position(self.current), self.workflow.position(next)),
                (Some(cur), Some(nxt)) if nxt > cur
            ),
            "{} cannot move from {} to {}",
            self.workflow,
            self.current,
            next
        );
        self.observer.on_transition(self.workflow, self.current, next);
        self.current = next;
    }

    pub(crate) fn record_receipts(&mut self, receipts: &[TransactionReceipt]) {
        self.receipts.extend_from_slice(receipts);
    }

    /// Halts at the current step.
    pub(crate) fn fail(self, error: BridgeError) -> WorkflowError {
        self.observer.on_halt(self.workflow, self.current, &error);
        let mut receipts = self.receipts;
        if let BridgeError::SubmissionFailed {
            receipts: committed,
            ..
        } = &error
        {
            receipts.extend_from_slice(committed);
        }
        WorkflowError {
            workflow: self.workflow,
            step: self.current,
            error,
            receipts,
        }
    }

    pub(crate) fn finish(mut self) -> Vec<TransactionReceipt> {
        self.enter(Step::Done);
        self.receipts
    }
}
