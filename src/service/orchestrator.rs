//! Bridge Orchestrator
//!
//! Drives the Attest, Transfer, Fetch and Redeem workflows over one source and
//! one destination chain. All ordering and precondition checks live here; the
//! adapters only read state and build transactions.

use ethereum_types::U256;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::observer::{Step, TracingObserver, Workflow, WorkflowError, WorkflowObserver, WorkflowRun};
use super::submitter::TransactionSubmitter;
use super::waiter::AttestationWaiter;
use crate::attestation::{Attestation, TokenBridgePayload};
use crate::chains::{ChainAdapter, TransactionSigner};
use crate::error::{BridgeError, Result};
use crate::store::AttestationStore;
use crate::types::{
    BridgeMessage, MessageKind, TokenAddress, TokenId, TransactionReceipt, TransferRequest,
};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Signing capability for each side of the bridge
#[derive(Clone)]
pub struct SignerSet {
    pub source: Arc<dyn TransactionSigner>,
    pub destination: Arc<dyn TransactionSigner>,
}

/// Upper bound on the attestation wait of each workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowTimeouts {
    pub attest: Duration,
    pub transfer: Duration,
    pub fetch: Duration,
}

impl Default for WorkflowTimeouts {
    fn default() -> Self {
        Self {
            attest: Duration::from_secs(25 * 60),
            transfer: Duration::from_secs(25 * 60),
            fetch: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttestOptions {
    /// Submit the AttestMeta attestation on the destination once signed
    pub register_on_destination: bool,
}

impl Default for AttestOptions {
    fn default() -> Self {
        Self {
            register_on_destination: true,
        }
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

#[derive(Debug, Clone)]
pub struct AttestOutcome {
    pub receipts: Vec<TransactionReceipt>,
    pub message: BridgeMessage,
    pub attestation: Attestation,
    /// Whether RegisterOnDestination created the wrapped asset in this run
    pub registered: bool,
}

#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub receipts: Vec<TransactionReceipt>,
    pub message: BridgeMessage,
    pub attestation: Attestation,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub message: BridgeMessage,
    pub attestation: Attestation,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RedeemOutcome {
    pub receipts: Vec<TransactionReceipt>,
    pub attestation: Attestation,
    pub recipient: String,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Composes chain adapters, signers, the submitter and the waiter into workflows.
pub struct Orchestrator {
    source: Arc<dyn ChainAdapter>,
    destination: Arc<dyn ChainAdapter>,
    signers: SignerSet,
    submitter: TransactionSubmitter,
    waiter: AttestationWaiter,
    timeouts: WorkflowTimeouts,
    observer: Arc<dyn WorkflowObserver>,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn ChainAdapter>,
        destination: Arc<dyn ChainAdapter>,
        signers: SignerSet,
        submitter: TransactionSubmitter,
        waiter: AttestationWaiter,
    ) -> Self {
        Self {
            source,
            destination,
            signers,
            submitter,
            waiter,
            timeouts: WorkflowTimeouts::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_timeouts(mut self, timeouts: WorkflowTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn source(&self) -> &dyn ChainAdapter {
        self.source.as_ref()
    }

    pub fn destination(&self) -> &dyn ChainAdapter {
        self.destination.as_ref()
    }

    /// Builds a transfer request from a human decimal amount.
    ///
    /// Token precision is resolved on the source chain before conversion. A rejected
    /// amount or a failed precision lookup halts the Transfer workflow at `Start`.
    ///
    /// # Arguments
    ///
    /// * `token` - Token on the source chain (`Native` or a contract)
    /// * `amount` - Decimal amount, e.g. "0.02"
    /// * `recipient` - Recipient address on the destination chain
    pub async fn prepare_transfer(
        &self,
        token: TokenAddress,
        amount: &str,
        recipient: &str,
    ) -> std::result::Result<TransferRequest, WorkflowError> {
        let token = TokenId::new(self.source.chain().clone(), token);
        let prepared = match self.source.get_decimals(&token).await {
            Ok(decimals) => TransferRequest::from_decimal(
                self.destination.chain().clone(),
                token,
                amount,
                decimals,
                recipient,
            )
            .map_err(|e| BridgeError::InvalidRequest(format!("{:#}", e))),
            Err(e) => Err(e),
        };
        prepared.map_err(|e| self.reject(Workflow::Transfer, e))
    }

    /// Builds a transfer request from an integer amount in the token's smallest unit.
    pub fn prepare_transfer_base_units(
        &self,
        token: TokenAddress,
        amount: &str,
        recipient: &str,
    ) -> std::result::Result<TransferRequest, WorkflowError> {
        match U256::from_dec_str(amount.trim()) {
            Ok(units) => Ok(TransferRequest::from_base_units(
                self.destination.chain().clone(),
                TokenId::new(self.source.chain().clone(), token),
                units,
                recipient,
            )),
            Err(e) => Err(self.reject(
                Workflow::Transfer,
                BridgeError::InvalidRequest(format!(
                    "invalid base-unit amount '{}': {:?}",
                    amount, e
                )),
            )),
        }
    }

    /// Halts `workflow` at `Start` for input rejected before any step ran.
    fn reject(&self, workflow: Workflow, error: BridgeError) -> WorkflowError {
        WorkflowRun::start(workflow, self.observer.clone()).fail(error)
    }

    // ------------------------------------------------------------------------
    // Attest
    // ------------------------------------------------------------------------

    /// Publishes the token's metadata on the source chain and waits for its attestation.
    ///
    /// With `register_on_destination` the signed attestation is then submitted on the
    /// destination, creating the wrapped asset there.
    pub async fn attest(
        &self,
        token: &TokenAddress,
        options: AttestOptions,
    ) -> std::result::Result<AttestOutcome, WorkflowError> {
        let mut run = WorkflowRun::start(Workflow::Attest, self.observer.clone());
        match self.attest_steps(&mut run, token, options).await {
            Ok((message, attestation, registered)) => Ok(AttestOutcome {
                receipts: run.finish(),
                message,
                attestation,
                registered,
            }),
            Err(e) => Err(run.fail(e)),
        }
    }

    async fn attest_steps(
        &self,
        run: &mut WorkflowRun,
        token: &TokenAddress,
        options: AttestOptions,
    ) -> Result<(BridgeMessage, Attestation, bool)> {
        let token = TokenId::new(self.source.chain().clone(), token.clone());
        info!("📝 Attesting {} for {}", token, self.destination.chain());

        run.enter(Step::BuildAttestTx);
        let txs = self.source.build_attestation_tx(&token).await?;

        run.enter(Step::Submit);
        let receipts = self
            .submitter
            .submit(self.source.as_ref(), self.signers.source.as_ref(), txs)
            .await?;
        run.record_receipts(&receipts);

        run.enter(Step::ParseMessage);
        let message = self
            .parse_message(self.source.as_ref(), &receipts, MessageKind::AttestMeta)
            .await?;

        run.enter(Step::AwaitAttestation);
        let attestation = self
            .waiter
            .await_attestation(&message, MessageKind::AttestMeta, self.timeouts.attest)
            .await?;

        if !options.register_on_destination {
            return Ok((message, attestation, false));
        }

        run.enter(Step::RegisterOnDestination);
        if self.destination.is_asset_registered(&token).await? {
            info!(
                "✅ {} already has a wrapped asset on {}, skipping registration",
                token,
                self.destination.chain()
            );
            return Ok((message, attestation, false));
        }
        let txs = self.destination.build_register_tx(&attestation).await?;
        let receipts = self
            .submitter
            .submit(
                self.destination.as_ref(),
                self.signers.destination.as_ref(),
                txs,
            )
            .await?;
        run.record_receipts(&receipts);

        Ok((message, attestation, true))
    }

    // ------------------------------------------------------------------------
    // Transfer
    // ------------------------------------------------------------------------

    /// Locks or burns `request.amount` on the source chain and persists its signed attestation.
    ///
    /// Halts before building any transaction if the sender's balance is short or the
    /// token has no wrapped asset on the destination. Never runs Attest on its own.
    pub async fn transfer(
        &self,
        request: &TransferRequest,
        store: &AttestationStore,
    ) -> std::result::Result<TransferOutcome, WorkflowError> {
        let mut run = WorkflowRun::start(Workflow::Transfer, self.observer.clone());
        match self.transfer_steps(&mut run, request, store).await {
            Ok((message, attestation)) => Ok(TransferOutcome {
                receipts: run.finish(),
                message,
                attestation,
                path: store.path().to_path_buf(),
            }),
            Err(e) => Err(run.fail(e)),
        }
    }

    async fn transfer_steps(
        &self,
        run: &mut WorkflowRun,
        request: &TransferRequest,
        store: &AttestationStore,
    ) -> Result<(BridgeMessage, Attestation)> {
        self.validate_request(request)?;
        let token = &request.token;
        let sender = self.signers.source.address().to_string();

        run.enter(Step::CheckBalance);
        let available = self.source.get_balance(token, &sender).await?;
        if available < request.amount {
            return Err(BridgeError::InsufficientBalance {
                token: token.clone(),
                available,
                requested: request.amount,
            });
        }
        info!(
            "Balance of {} for {}: {} (need {})",
            token, sender, available, request.amount
        );

        run.enter(Step::CheckRegistration);
        if !self.destination.is_asset_registered(token).await? {
            return Err(BridgeError::UnregisteredAsset {
                token: token.clone(),
                destination: request.destination.clone(),
            });
        }

        run.enter(Step::Approve);
        let mut txs = self
            .source
            .build_approval_tx(&sender, token, request.amount)
            .await?;

        run.enter(Step::BuildTransferTx);
        let transfer_txs = self
            .source
            .build_transfer_tx(
                &sender,
                token,
                request.amount,
                &request.destination,
                &request.recipient,
            )
            .await?;
        txs.extend(transfer_txs);

        run.enter(Step::Submit);
        let receipts = self
            .submitter
            .submit(self.source.as_ref(), self.signers.source.as_ref(), txs)
            .await?;
        run.record_receipts(&receipts);

        run.enter(Step::ParseMessage);
        let message = self
            .parse_message(self.source.as_ref(), &receipts, MessageKind::Transfer)
            .await?;

        run.enter(Step::AwaitAttestation);
        let attestation = self
            .waiter
            .await_attestation(&message, MessageKind::Transfer, self.timeouts.transfer)
            .await?;

        run.enter(Step::Persist);
        store.persist(&attestation).await?;

        Ok((message, attestation))
    }

    fn validate_request(&self, request: &TransferRequest) -> Result<()> {
        if &request.source != self.source.chain() || request.token.chain != request.source {
            return Err(BridgeError::InvalidRequest(format!(
                "token {} is not on source chain {}",
                request.token,
                self.source.chain()
            )));
        }
        if &request.destination != self.destination.chain() {
            return Err(BridgeError::InvalidRequest(format!(
                "destination {} is not the configured destination {}",
                request.destination,
                self.destination.chain()
            )));
        }
        if request.amount.is_zero() {
            return Err(BridgeError::InvalidRequest(
                "transfer amount must be greater than zero".to_string(),
            ));
        }
        if request.recipient.trim().is_empty() {
            return Err(BridgeError::InvalidRequest(
                "recipient must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Fetch
    // ------------------------------------------------------------------------

    /// Retrieves and persists the attestation for a source transaction sent out of band.
    pub async fn fetch(
        &self,
        tx_id: &str,
        kind: MessageKind,
        store: &AttestationStore,
    ) -> std::result::Result<FetchOutcome, WorkflowError> {
        let mut run = WorkflowRun::start(Workflow::Fetch, self.observer.clone());
        match self.fetch_steps(&mut run, tx_id, kind, store).await {
            Ok((message, attestation)) => {
                run.finish();
                Ok(FetchOutcome {
                    message,
                    attestation,
                    path: store.path().to_path_buf(),
                })
            }
            Err(e) => Err(run.fail(e)),
        }
    }

    async fn fetch_steps(
        &self,
        run: &mut WorkflowRun,
        tx_id: &str,
        kind: MessageKind,
        store: &AttestationStore,
    ) -> Result<(BridgeMessage, Attestation)> {
        run.enter(Step::ParseMessage);
        let messages = self.source.parse_finalized_transaction(tx_id).await?;
        let message = select_message(messages, kind, self.source.as_ref(), tx_id)?;

        run.enter(Step::AwaitAttestation);
        let attestation = self
            .waiter
            .await_attestation(&message, kind, self.timeouts.fetch)
            .await?;

        run.enter(Step::Persist);
        store.persist(&attestation).await?;

        Ok((message, attestation))
    }

    // ------------------------------------------------------------------------
    // Redeem
    // ------------------------------------------------------------------------

    /// Submits a persisted Transfer attestation on the destination chain.
    ///
    /// # Arguments
    ///
    /// * `store` - Location of the attestation written by Transfer or Fetch
    /// * `recipient` - Receiving account; defaults to the destination signer
    pub async fn redeem(
        &self,
        store: &AttestationStore,
        recipient: Option<&str>,
    ) -> std::result::Result<RedeemOutcome, WorkflowError> {
        let mut run = WorkflowRun::start(Workflow::Redeem, self.observer.clone());
        let recipient = recipient
            .unwrap_or_else(|| self.signers.destination.address())
            .to_string();
        match self.redeem_steps(&mut run, store, &recipient).await {
            Ok(attestation) => Ok(RedeemOutcome {
                receipts: run.finish(),
                attestation,
                recipient,
            }),
            Err(e) => Err(run.fail(e)),
        }
    }

    async fn redeem_steps(
        &self,
        run: &mut WorkflowRun,
        store: &AttestationStore,
        recipient: &str,
    ) -> Result<Attestation> {
        run.enter(Step::LoadAttestation);
        let attestation = store.load(MessageKind::Transfer).await?;
        info!(
            "Loaded attestation {} from {} (digest 0x{})",
            attestation.message_id(),
            store.path().display(),
            hex::encode(attestation.digest())
        );

        run.enter(Step::BuildRedeemTx);
        let txs = self
            .destination
            .build_redeem_tx(recipient, &attestation)
            .await?;

        run.enter(Step::Submit);
        let receipts = self
            .submitter
            .submit(
                self.destination.as_ref(),
                self.signers.destination.as_ref(),
                txs,
            )
            .await?;
        run.record_receipts(&receipts);

        if let Ok(TokenBridgePayload::Transfer { amount, .. }) = attestation.token_bridge_payload() {
            info!(
                "✅ Redeemed {} smallest units for {} on {}",
                amount,
                recipient,
                self.destination.chain()
            );
        }

        Ok(attestation)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Parses the message of `kind` from the last (action) receipt.
    async fn parse_message(
        &self,
        adapter: &dyn ChainAdapter,
        receipts: &[TransactionReceipt],
        kind: MessageKind,
    ) -> Result<BridgeMessage> {
        let last = receipts.last().ok_or_else(|| {
            BridgeError::Chain(anyhow::anyhow!(
                "{} built no transactions, nothing to parse",
                adapter.chain()
            ))
        })?;
        let messages = adapter.parse_finalized_transaction(&last.tx_id).await?;
        select_message(messages, kind, adapter, &last.tx_id)
    }
}

/// Picks the single message of `kind`; other kinds in the same transaction are ignored.
fn select_message(
    messages: Vec<BridgeMessage>,
    kind: MessageKind,
    adapter: &dyn ChainAdapter,
    tx_id: &str,
) -> Result<BridgeMessage> {
    let first_kind = match messages.first() {
        Some(m) => m.kind,
        None => {
            return Err(BridgeError::NoMessageFound {
                chain: adapter.chain().clone(),
                tx_id: tx_id.to_string(),
            })
        }
    };

    match messages.into_iter().find(|m| m.kind == kind) {
        Some(message) => {
            info!("Found {} message {} in {}", kind, message.id, tx_id);
            Ok(message)
        }
        None => Err(BridgeError::AttestationKindMismatch {
            expected: kind,
            actual: first_kind,
        }),
    }
}
