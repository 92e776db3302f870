//! Transaction Signers
//!
//! A signer is injected per chain. The crate never holds key material: the
//! JSON-RPC signer hands the transaction to an endpoint that owns the account
//! (a dev node with unlocked accounts, or a signing proxy such as Clef).

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethereum_types::U256;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::evm::json_rpc;
use crate::config::SignerConfig;
use crate::types::{TxPayload, UnsignedTransaction};

/// Per-chain signing capability.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Account address transactions are sent from
    fn address(&self) -> &str;

    /// Signs and broadcasts, returning the transaction id. Does not wait for inclusion.
    async fn sign_and_send(&self, tx: &UnsignedTransaction) -> Result<String>;
}

/// Signer that delegates to `eth_sendTransaction` on an account-holding endpoint
pub struct JsonRpcSigner {
    client: Client,
    /// Endpoint that owns the account
    url: String,
    /// Sender address (0x-prefixed)
    address: String,
}

impl JsonRpcSigner {
    /// Creates a signer for the account described by `config`.
    ///
    /// `default_url` is used when the config does not name a dedicated signer endpoint.
    pub fn new(config: &SignerConfig, default_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: config.url.clone().unwrap_or_else(|| default_url.to_string()),
            address: config.address.clone(),
        })
    }
}

#[async_trait]
impl TransactionSigner for JsonRpcSigner {
    fn address(&self) -> &str {
        &self.address
    }

    async fn sign_and_send(&self, tx: &UnsignedTransaction) -> Result<String> {
        let (to, data, value) = match tx.payload() {
            TxPayload::EvmCall { to, data, value } => (to, data, value),
            TxPayload::Opaque(_) => {
                anyhow::bail!("JSON-RPC signer cannot send non-EVM transaction '{}'", tx.description())
            }
        };

        let mut request = serde_json::json!({
            "from": self.address,
            "to": to,
            "data": format!("0x{}", hex::encode(data)),
        });
        if *value > U256::zero() {
            request["value"] = serde_json::json!(format!("0x{:x}", value));
        }

        debug!("eth_sendTransaction {} -> {}", tx.description(), to);
        let hash: Option<String> = json_rpc(
            &self.client,
            &self.url,
            "eth_sendTransaction",
            vec![request],
        )
        .await?;

        hash.ok_or_else(|| anyhow::anyhow!("eth_sendTransaction returned no transaction hash"))
    }
}
