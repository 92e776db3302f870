//! Unit tests for configuration module

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{create_default_bridge_config, DUMMY_DESTINATION_BRIDGE_ID};

use std::time::Duration;
use tempfile::TempDir;
use token_bridge::config::BridgeConfig;

const TEMPLATE: &str = include_str!("../config/bridge.template.toml");

// ============================================================================
// VALIDATION TESTS
// ============================================================================

/// What is tested: BridgeConfig::validate() accepts valid configuration
/// Why: Ensure valid configs pass validation
#[test]
fn test_config_validation_success() {
    let config = create_default_bridge_config();
    assert!(config.validate().is_ok());
}

/// What is tested: the shipped template parses and validates
/// Why: Users start from the template; it must never be broken
#[test]
fn test_template_is_valid() {
    let config = BridgeConfig::from_toml_str(TEMPLATE).unwrap();
    assert_eq!(config.source.name, "ArbitrumSepolia");
    assert_eq!(config.destination.bridge_chain_id, 14);
    assert_eq!(config.service.guardian_urls.len(), 1);
}

/// What is tested: validate() rejects source and destination with the same bridge chain id
/// Why: The chain directory maps ids to chains; duplicates make routing ambiguous
#[test]
fn test_config_validation_duplicate_chain_ids() {
    let mut config = create_default_bridge_config();
    config.source.bridge_chain_id = DUMMY_DESTINATION_BRIDGE_ID;

    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("same bridge_chain_id"));
}

/// What is tested: validate() rejects source and destination with the same name
/// Why: Chain names are the keys of every lookup
#[test]
fn test_config_validation_duplicate_chain_names() {
    let mut config = create_default_bridge_config();
    config.destination.name = config.source.name.clone();
    assert!(config.validate().is_err());
}

/// What is tested: validate() rejects malformed contract and signer addresses
/// Why: A bad address would only fail much later, mid-workflow
#[test]
fn test_config_validation_bad_addresses() {
    let mut config = create_default_bridge_config();
    config.source.token_bridge_addr = "0x1234".to_string();
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("token_bridge_addr"), "{}", err);

    let mut config = create_default_bridge_config();
    config.destination.signer.address = "not-hex".to_string();
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("signer.address"), "{}", err);
}

/// What is tested: validate() rejects non-http URLs and an empty guardian list
/// Why: Every endpoint is reached over HTTP JSON
#[test]
fn test_config_validation_bad_urls() {
    let mut config = create_default_bridge_config();
    config.service.guardian_urls.clear();
    assert!(config.validate().is_err());

    let mut config = create_default_bridge_config();
    config.source.rpc_url = "ws://127.0.0.1:8545".to_string();
    assert!(config.validate().is_err());

    let mut config = create_default_bridge_config();
    config.service.guardian_urls = vec!["https://".to_string()];
    assert!(config.validate().is_err());
}

/// What is tested: validate() rejects polling settings that could never make progress
/// Why: A zero interval busy-loops; a multiplier below 1 shrinks the interval
#[test]
fn test_config_validation_polling() {
    let mut config = create_default_bridge_config();
    config.service.polling_interval_ms = 0;
    assert!(config.validate().is_err());

    let mut config = create_default_bridge_config();
    config.service.backoff_multiplier = 0.5;
    assert!(config.validate().is_err());

    let mut config = create_default_bridge_config();
    config.service.max_polling_interval_ms = 10;
    assert!(config.validate().is_err());

    let mut config = create_default_bridge_config();
    config.timeouts.fetch_secs = 0;
    assert!(config.validate().is_err());
}

// ============================================================================
// LOADING TESTS
// ============================================================================

/// What is tested: omitted optional fields take their defaults
/// Why: Minimal configs should work without spelling out every knob
#[test]
fn test_config_defaults() {
    let toml = r#"
[service]
guardian_urls = ["https://api.testnet.wormholescan.io"]

[source]
name = "ArbitrumSepolia"
rpc_url = "http://127.0.0.1:8545"
bridge_chain_id = 10003
core_bridge_addr = "0x000000000000000000000000000000000000000b"
token_bridge_addr = "0x000000000000000000000000000000000000000c"

[source.signer]
address = "0x0000000000000000000000000000000000000001"

[destination]
name = "Celo"
rpc_url = "http://127.0.0.1:8546"
bridge_chain_id = 14
core_bridge_addr = "0x000000000000000000000000000000000000000b"
token_bridge_addr = "0x000000000000000000000000000000000000000c"

[destination.signer]
address = "0x0000000000000000000000000000000000000002"
"#;
    let config = BridgeConfig::from_toml_str(toml).unwrap();

    assert_eq!(config.source.native_decimals, 18);
    assert_eq!(config.source.confirmations, 1);
    assert!(config.source.wrapped_native_addr.is_none());
    assert!(config.source.signer.url.is_none());
    assert_eq!(config.service.attestation_path, "attestations/transfer.bin");

    let timeouts = config.workflow_timeouts();
    assert_eq!(timeouts.attest, Duration::from_secs(1500));
    assert_eq!(timeouts.fetch, Duration::from_secs(60));

    let poll = config.poll_policy();
    assert_eq!(poll.initial_interval, Duration::from_secs(1));
    assert_eq!(poll.max_interval, Duration::from_secs(30));
}

/// What is tested: load_from_path() with a missing file points at the template
/// Why: First-time users need to know how to create the config
#[test]
fn test_load_missing_file_mentions_template() {
    let err = BridgeConfig::load_from_path(Some("/nonexistent/bridge.toml")).unwrap_err();
    assert!(err.to_string().contains("bridge.template.toml"));
}

/// What is tested: load_from_path() reads and validates a file from disk
/// Why: This is how the CLI obtains its configuration
#[test]
fn test_load_from_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bridge.toml");
    std::fs::write(&path, TEMPLATE).unwrap();

    let config = BridgeConfig::load_from_path(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(config.timeouts.confirmation_secs, 600);
    let policy = config.confirmation_policy(&config.destination);
    assert_eq!(policy.timeout, Duration::from_secs(600));
    assert_eq!(policy.poll_interval, Duration::from_millis(2000));
}
