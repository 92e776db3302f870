//! Bridge CLI
//!
//! Drives one bridge workflow per invocation between the configured source and
//! destination chains:
//! - attest: publish token metadata and register the wrapped asset
//! - transfer: send tokens and save the signed transfer attestation
//! - fetch: retrieve the attestation of a transaction sent out of band
//! - redeem: submit a saved attestation on the destination chain
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin bridge -- --config config/bridge.toml transfer native 0.02 0xRecipient
//! cargo run --bin bridge -- redeem attestations/transfer.bin
//! ```
//!
//! Or set the config path via environment variable:
//!
//! ```bash
//! BRIDGE_CONFIG_PATH=config/bridge.toml cargo run --bin bridge -- attest 0xToken
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tracing::info;

use token_bridge::{
    config::BridgeConfig,
    service::{
        AttestOptions, AttestationWaiter, Orchestrator, SignerSet, TransactionSubmitter,
        WorkflowError,
    },
    types::format_units,
    AttestationStore, ChainDirectory, ChainId, EvmChainAdapter, GuardianClient, JsonRpcSigner,
    MessageKind, TokenAddress,
};

#[derive(Parser, Debug)]
#[command(name = "bridge")]
#[command(about = "Token bridge CLI - attest, transfer, fetch and redeem tokens across chains")]
struct Args {
    /// Path to bridge configuration file (default: config/bridge.toml or BRIDGE_CONFIG_PATH env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Attest a source token and register its wrapped asset on the destination
    Attest {
        /// Token address on the source chain, or `native`
        token: String,
        /// Stop once the attestation is signed, without registering on the destination
        #[arg(long)]
        no_register: bool,
    },
    /// Transfer tokens and save the signed attestation for redemption
    Transfer {
        /// Token address on the source chain, or `native`
        token: String,
        /// Amount as a decimal number of tokens (e.g. 0.02)
        amount: String,
        /// Recipient address on the destination chain
        recipient: String,
        /// Interpret `amount` as an integer in the token's smallest unit
        #[arg(long)]
        base_units: bool,
        /// Attestation output file (default: service.attestation_path)
        #[arg(long)]
        out: Option<String>,
    },
    /// Fetch and save the attestation for a source transaction
    Fetch {
        /// Source chain transaction hash
        txid: String,
        #[arg(long, value_enum, default_value_t = KindArg::Transfer)]
        kind: KindArg,
        /// Attestation output file (default: service.attestation_path)
        #[arg(long)]
        out: Option<String>,
    },
    /// Redeem a saved transfer attestation on the destination
    Redeem {
        /// Attestation file written by `transfer` or `fetch`
        file: String,
        /// Receiving account (default: destination signer address)
        #[arg(long)]
        recipient: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Transfer,
    AttestMeta,
}

impl From<KindArg> for MessageKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Transfer => MessageKind::Transfer,
            KindArg::AttestMeta => MessageKind::AttestMeta,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments first (before initializing logging)
    let args = Args::parse();

    // Initialize structured logging
    tracing_subscriber::fmt::init();

    // Priority: CLI arg > env var > default
    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            BridgeConfig::load_from_path(Some(path.as_str()))?
        }
        None => BridgeConfig::load()?,
    };
    info!(
        "Configuration loaded: {} (bridge id {}) -> {} (bridge id {})",
        config.source.name,
        config.source.bridge_chain_id,
        config.destination.name,
        config.destination.bridge_chain_id
    );

    let orchestrator = build_orchestrator(&config)?;
    let default_path = config.service.attestation_path.as_str();

    let result = match args.command {
        Command::Attest { token, no_register } => {
            let options = AttestOptions {
                register_on_destination: !no_register,
            };
            orchestrator
                .attest(&TokenAddress::parse(&token), options)
                .await
                .map(|outcome| {
                    println!("✅ Attested {} as message {}", token, outcome.message.id);
                    if outcome.registered {
                        println!("   Wrapped asset registered on {}", config.destination.name);
                    }
                    outcome.receipts
                })
        }
        Command::Transfer {
            token,
            amount,
            recipient,
            base_units,
            out,
        } => {
            let token = TokenAddress::parse(&token);
            let prepared = if base_units {
                orchestrator.prepare_transfer_base_units(token, &amount, &recipient)
            } else {
                orchestrator.prepare_transfer(token, &amount, &recipient).await
            };
            match prepared {
                Ok(request) => {
                    let store = AttestationStore::new(out.as_deref().unwrap_or(default_path));
                    info!(
                        "Transferring {} base units of {} to {} on {}",
                        request.amount, request.token, request.recipient, request.destination
                    );
                    orchestrator.transfer(&request, &store).await.map(|outcome| {
                        println!(
                            "✅ Transfer message {} attested; saved to {}",
                            outcome.message.id,
                            outcome.path.display()
                        );
                        outcome.receipts
                    })
                }
                Err(err) => Err(err),
            }
        }
        Command::Fetch { txid, kind, out } => {
            let store = AttestationStore::new(out.as_deref().unwrap_or(default_path));
            orchestrator
                .fetch(&txid, kind.into(), &store)
                .await
                .map(|outcome| {
                    println!(
                        "✅ Attestation for {} saved to {}",
                        outcome.message.id,
                        outcome.path.display()
                    );
                    Vec::new()
                })
        }
        Command::Redeem { file, recipient } => {
            let store = AttestationStore::new(file);
            orchestrator
                .redeem(&store, recipient.as_deref())
                .await
                .map(|outcome| {
                    if let Ok(token_bridge::TokenBridgePayload::Transfer { amount, .. }) =
                        outcome.attestation.token_bridge_payload()
                    {
                        println!(
                            "✅ Redeemed {} base units ({} at 8 decimals) for {}",
                            amount,
                            format_units(amount, 8),
                            outcome.recipient
                        );
                    }
                    outcome.receipts
                })
        }
    };

    match result {
        Ok(receipts) => {
            for receipt in &receipts {
                println!(
                    "   {} tx {} (block {})",
                    receipt.chain, receipt.tx_id, receipt.block_number
                );
            }
            Ok(())
        }
        Err(err) => {
            report_failure(&err);
            std::process::exit(1);
        }
    }
}

/// Wires adapters, signers, the guardian client and the orchestrator from config.
fn build_orchestrator(config: &BridgeConfig) -> Result<Orchestrator> {
    let directory = ChainDirectory::from_configs([&config.source, &config.destination]);

    let source = EvmChainAdapter::new(&config.source, directory.clone())
        .context("Failed to create source chain adapter")?;
    let destination = EvmChainAdapter::new(&config.destination, directory)
        .context("Failed to create destination chain adapter")?;

    let signers = SignerSet {
        source: Arc::new(
            JsonRpcSigner::new(&config.source.signer, &config.source.rpc_url)
                .context("Failed to create source signer")?,
        ),
        destination: Arc::new(
            JsonRpcSigner::new(&config.destination.signer, &config.destination.rpc_url)
                .context("Failed to create destination signer")?,
        ),
    };

    let submitter = TransactionSubmitter::new(config.confirmation_policy(&config.source))
        .with_chain_policy(
            ChainId::new(&config.destination.name),
            config.confirmation_policy(&config.destination),
        );

    let guardian = GuardianClient::new(config.service.guardian_urls.clone())
        .context("Failed to create guardian client")?;
    let waiter = AttestationWaiter::new(Arc::new(guardian), config.poll_policy());

    Ok(Orchestrator::new(
        Arc::new(source),
        Arc::new(destination),
        signers,
        submitter,
        waiter,
    )
    .with_timeouts(config.workflow_timeouts()))
}

fn report_failure(err: &WorkflowError) {
    eprintln!(
        "❌ {} failed at step {} [{}]: {}",
        err.workflow,
        err.step,
        err.error.kind(),
        err.error
    );
    if !err.receipts.is_empty() {
        eprintln!("   Transactions already committed:");
        for receipt in &err.receipts {
            eprintln!(
                "   {} tx {} (block {})",
                receipt.chain, receipt.tx_id, receipt.block_number
            );
        }
    }
}
