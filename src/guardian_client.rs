//! Guardian API Client
//!
//! HTTP client for the public REST endpoint of the guardian network, which
//! serves signed attestations once a quorum of guardians has observed a message:
//!
//! ```text
//! GET /v1/signed_vaa/{emitter_chain}/{emitter_address_hex}/{sequence}
//! 200 {"vaaBytes": "<base64>"}
//! 404 {"code": 5, "message": "requested VAA not found in store"}
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::MessageId;

/// The quorum-signing network as seen by the waiter.
#[async_trait]
pub trait AttestationSource: Send + Sync {
    /// Signed attestation bytes for `id`, or `None` if no quorum has signed it yet.
    async fn fetch_signed(&self, id: &MessageId) -> Result<Option<Vec<u8>>>;
}

/// Response body of `GET /v1/signed_vaa/...`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedVaaResponse {
    /// Base64 encoded VAA bytes
    #[serde(rename = "vaaBytes")]
    pub vaa_bytes: String,
}

/// Client querying one or more guardian REST hosts in order
pub struct GuardianClient {
    /// Base URLs of guardian hosts (e.g. "https://api.testnet.wormholescan.io")
    hosts: Vec<String>,
    /// HTTP client instance
    client: Client,
}

impl GuardianClient {
    /// Create a new guardian client.
    ///
    /// # Arguments
    ///
    /// * `hosts` - Guardian REST base URLs, tried in order on every fetch
    ///
    /// # Returns
    ///
    /// * `Ok(GuardianClient)` - New client instance
    /// * `Err(anyhow::Error)` - No hosts given or failed to build the HTTP client
    pub fn new(hosts: Vec<String>) -> Result<Self> {
        if hosts.is_empty() {
            anyhow::bail!("At least one guardian host is required");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.trim_end_matches('/').to_string())
                .collect(),
            client,
        })
    }

    async fn fetch_from(&self, host: &str, id: &MessageId) -> Result<Option<Vec<u8>>> {
        let url = format!(
            "{}/v1/signed_vaa/{}/{}/{}",
            host,
            id.emitter_chain,
            hex::encode(id.emitter_address),
            id.sequence
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send GET {}", url))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("Guardian API {} returned HTTP {}", url, response.status());
        }

        let body: SignedVaaResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse GET {} response", url))?;

        let bytes = STANDARD
            .decode(body.vaa_bytes.as_bytes())
            .context("Guardian API returned invalid base64 vaaBytes")?;
        Ok(Some(bytes))
    }
}

#[async_trait]
impl AttestationSource for GuardianClient {
    async fn fetch_signed(&self, id: &MessageId) -> Result<Option<Vec<u8>>> {
        let mut last_error = None;
        let mut any_answered = false;

        for host in &self.hosts {
            match self.fetch_from(host, id).await {
                Ok(Some(bytes)) => return Ok(Some(bytes)),
                Ok(None) => {
                    debug!("Attestation {} not yet available from {}", id, host);
                    any_answered = true;
                }
                Err(e) => {
                    warn!("Guardian host {} failed: {:#}", host, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_answered => Err(e),
            _ => Ok(None),
        }
    }
}
