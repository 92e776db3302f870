//! Configuration Management Module
//!
//! This module handles loading and managing configuration for the bridge CLI.
//! Configuration includes guardian endpoints, the source and destination chains
//! with their signers, and the per-workflow timeouts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::service::{ConfirmationPolicy, PollPolicy, WorkflowTimeouts};

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all bridge settings.
///
/// This structure holds configuration for:
/// - Guardian API endpoints and attestation polling
/// - Source chain (where tokens are attested and sent from)
/// - Destination chain (where wrapped assets are registered and redeemed)
/// - Workflow timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Service configuration (guardian URLs, polling intervals)
    pub service: ServiceConfig,
    /// Chain tokens are sent from
    pub source: ChainConfig,
    /// Chain tokens are redeemed on
    pub destination: ChainConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Service-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Guardian REST base URLs, tried in order (e.g., "https://api.testnet.wormholescan.io")
    pub guardian_urls: Vec<String>,
    /// First interval between attestation polls in milliseconds
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// Upper bound for the backed-off polling interval in milliseconds
    #[serde(default = "default_max_polling_interval_ms")]
    pub max_polling_interval_ms: u64,
    /// Growth factor of the polling interval (1.0 = fixed polling)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Default attestation file written by transfer/fetch and read by redeem
    #[serde(default = "default_attestation_path")]
    pub attestation_path: String,
}

/// Configuration for an EVM chain with Token Bridge and Core Bridge deployments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain name used as the chain identifier (e.g., "ArbitrumSepolia")
    pub name: String,
    /// RPC endpoint URL for EVM chain communication
    pub rpc_url: String,
    /// Numeric chain id in the bridge protocol (e.g., 10003 for Arbitrum Sepolia)
    pub bridge_chain_id: u16,
    /// Address of the Core Bridge contract
    pub core_bridge_addr: String,
    /// Address of the Token Bridge contract
    pub token_bridge_addr: String,
    /// Wrapped native token (WETH-style) used when bridging the native asset
    #[serde(default)]
    pub wrapped_native_addr: Option<String>,
    /// Decimals of the native asset
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u8,
    /// Blocks (including the inclusion block) required before a transaction is final
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Account that signs transactions on this chain
    pub signer: SignerConfig,
}

/// External JSON-RPC signer for one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Signer endpoint accepting `eth_sendTransaction` (defaults to the chain's rpc_url)
    #[serde(default)]
    pub url: Option<String>,
    /// Sender address (0x-prefixed hex)
    pub address: String,
}

/// Timeouts in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_attest_secs")]
    pub attest_secs: u64,
    #[serde(default = "default_transfer_secs")]
    pub transfer_secs: u64,
    #[serde(default = "default_fetch_secs")]
    pub fetch_secs: u64,
    /// Maximum wait for each submitted transaction to finalize
    #[serde(default = "default_confirmation_secs")]
    pub confirmation_secs: u64,
    /// Interval between transaction status polls in milliseconds
    #[serde(default = "default_confirmation_poll_ms")]
    pub confirmation_poll_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            attest_secs: default_attest_secs(),
            transfer_secs: default_transfer_secs(),
            fetch_secs: default_fetch_secs(),
            confirmation_secs: default_confirmation_secs(),
            confirmation_poll_ms: default_confirmation_poll_ms(),
        }
    }
}

fn default_polling_interval_ms() -> u64 {
    1000
}

fn default_max_polling_interval_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_attestation_path() -> String {
    "attestations/transfer.bin".to_string()
}

fn default_native_decimals() -> u8 {
    18
}

fn default_confirmations() -> u64 {
    1
}

fn default_attest_secs() -> u64 {
    25 * 60
}

fn default_transfer_secs() -> u64 {
    25 * 60
}

fn default_fetch_secs() -> u64 {
    60
}

fn default_confirmation_secs() -> u64 {
    600
}

fn default_confirmation_poll_ms() -> u64 {
    2000
}

impl BridgeConfig {
    /// Loads configuration from a TOML file.
    ///
    /// This function:
    /// 1. Uses the provided path, or BRIDGE_CONFIG_PATH, or config/bridge.toml
    /// 2. If it exists, loads and parses the configuration
    /// 3. Validates the configuration
    /// 4. If it doesn't exist, returns an error asking user to copy template
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to config file. If None, uses BRIDGE_CONFIG_PATH env var or default.
    ///
    /// # Returns
    ///
    /// * `Ok(BridgeConfig)` - Successfully loaded and validated configuration
    /// * `Err(anyhow::Error)` - Failed to load configuration, file doesn't exist, or validation failed
    pub fn load_from_path(path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("BRIDGE_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/bridge.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config = Self::from_toml_str(&content)?;
            Ok(config)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/bridge.template.toml config/bridge.toml\n\
                Then edit config/bridge.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Loads configuration from a TOML file (convenience method that uses default path).
    ///
    /// This is equivalent to calling `load_from_path(None)`.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_path(None)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks:
    /// - At least one guardian URL is configured and all URLs are http(s)
    /// - Source and destination differ by name and bridge chain id
    /// - Contract and signer addresses are 20-byte hex
    /// - Polling and timeout values are positive
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Configuration is valid
    /// * `Err(anyhow::Error)` - Validation failed with error message
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.service.guardian_urls.is_empty() {
            anyhow::bail!("Configuration error: service.guardian_urls must not be empty");
        }
        for url in &self.service.guardian_urls {
            validate_url(url).map_err(|e| anyhow::anyhow!("Invalid guardian URL: {}", e))?;
        }

        if self.source.name == self.destination.name {
            anyhow::bail!(
                "Configuration error: source and destination are both '{}'",
                self.source.name
            );
        }
        if self.source.bridge_chain_id == self.destination.bridge_chain_id {
            anyhow::bail!(
                "Configuration error: source and destination have the same bridge_chain_id {}",
                self.source.bridge_chain_id
            );
        }

        for (side, chain) in [("source", &self.source), ("destination", &self.destination)] {
            chain
                .validate()
                .map_err(|e| anyhow::anyhow!("Invalid {} chain '{}': {}", side, chain.name, e))?;
        }

        if self.service.polling_interval_ms == 0 {
            anyhow::bail!("Configuration error: service.polling_interval_ms must be positive");
        }
        if self.service.max_polling_interval_ms < self.service.polling_interval_ms {
            anyhow::bail!(
                "Configuration error: service.max_polling_interval_ms ({}) is below polling_interval_ms ({})",
                self.service.max_polling_interval_ms,
                self.service.polling_interval_ms
            );
        }
        if self.service.backoff_multiplier.is_nan() || self.service.backoff_multiplier < 1.0 {
            anyhow::bail!(
                "Configuration error: service.backoff_multiplier must be >= 1.0, got {}",
                self.service.backoff_multiplier
            );
        }
        if self.service.attestation_path.trim().is_empty() {
            anyhow::bail!("Configuration error: service.attestation_path must not be empty");
        }

        let t = &self.timeouts;
        if [t.attest_secs, t.transfer_secs, t.fetch_secs, t.confirmation_secs, t.confirmation_poll_ms]
            .contains(&0)
        {
            anyhow::bail!("Configuration error: all [timeouts] values must be positive");
        }

        Ok(())
    }

    /// Attestation polling cadence
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::backoff(
            Duration::from_millis(self.service.polling_interval_ms),
            Duration::from_millis(self.service.max_polling_interval_ms),
            self.service.backoff_multiplier,
        )
    }

    /// Confirmation policy for transactions on `chain`
    pub fn confirmation_policy(&self, chain: &ChainConfig) -> ConfirmationPolicy {
        ConfirmationPolicy {
            confirmations: chain.confirmations,
            poll_interval: Duration::from_millis(self.timeouts.confirmation_poll_ms),
            timeout: Duration::from_secs(self.timeouts.confirmation_secs),
        }
    }

    pub fn workflow_timeouts(&self) -> WorkflowTimeouts {
        WorkflowTimeouts {
            attest: Duration::from_secs(self.timeouts.attest_secs),
            transfer: Duration::from_secs(self.timeouts.transfer_secs),
            fetch: Duration::from_secs(self.timeouts.fetch_secs),
        }
    }
}

impl ChainConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("name must not be empty");
        }
        validate_url(&self.rpc_url).map_err(|e| anyhow::anyhow!("rpc_url: {}", e))?;
        validate_evm_address(&self.core_bridge_addr)
            .map_err(|e| anyhow::anyhow!("core_bridge_addr: {}", e))?;
        validate_evm_address(&self.token_bridge_addr)
            .map_err(|e| anyhow::anyhow!("token_bridge_addr: {}", e))?;
        if let Some(addr) = &self.wrapped_native_addr {
            validate_evm_address(addr).map_err(|e| anyhow::anyhow!("wrapped_native_addr: {}", e))?;
        }
        if let Some(url) = &self.signer.url {
            validate_url(url).map_err(|e| anyhow::anyhow!("signer.url: {}", e))?;
        }
        validate_evm_address(&self.signer.address)
            .map_err(|e| anyhow::anyhow!("signer.address: {}", e))?;
        if self.confirmations == 0 {
            anyhow::bail!("confirmations must be at least 1");
        }
        Ok(())
    }
}

/// Validates that `url` is an http(s) URL with a host part.
fn validate_url(url: &str) -> anyhow::Result<()> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| anyhow::anyhow!("'{}' must start with http:// or https://", url))?;
    if rest.is_empty() || rest.starts_with('/') {
        anyhow::bail!("'{}' has no host", url);
    }
    Ok(())
}

/// Validates a `0x`-prefixed 20-byte hex address.
///
/// # Returns
///
/// - `Ok(())` - Address format is valid
/// - `Err(anyhow::Error)` - Address format is invalid
fn validate_evm_address(addr: &str) -> anyhow::Result<()> {
    let stripped = addr
        .strip_prefix("0x")
        .ok_or_else(|| anyhow::anyhow!("'{}' must be 0x-prefixed hex string", addr))?;
    let bytes = hex::decode(stripped).map_err(|_| anyhow::anyhow!("'{}' is not valid hex", addr))?;
    if bytes.len() != 20 {
        anyhow::bail!("'{}' must be 20 bytes, got {}", addr, bytes.len());
    }
    Ok(())
}
