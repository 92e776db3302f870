//! Core Data Model
//!
//! Chain-neutral types that flow between the orchestrator, the chain adapters
//! and the submitter. The core never interprets a [`ChainId`]; it is only a key.

use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Opaque chain name (e.g. "ArbitrumSepolia", "Celo").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of a token on its chain. `Native` denotes the chain's gas asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenAddress {
    Native,
    Contract(String),
}

impl TokenAddress {
    /// Parses a CLI/config token argument: `native` or a contract address.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("native") {
            TokenAddress::Native
        } else {
            TokenAddress::Contract(s.to_string())
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, TokenAddress::Native)
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenAddress::Native => f.write_str("native"),
            TokenAddress::Contract(addr) => f.write_str(addr),
        }
    }
}

/// A token identified by the chain it lives on and its address there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId {
    pub chain: ChainId,
    pub address: TokenAddress,
}

impl TokenId {
    pub fn new(chain: ChainId, address: TokenAddress) -> Self {
        Self { chain, address }
    }

    pub fn native(chain: ChainId) -> Self {
        Self {
            chain,
            address: TokenAddress::Native,
        }
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.address)
    }
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

/// Chain-specific body of an unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxPayload {
    /// EVM contract call (`to`, calldata, attached native value in wei)
    EvmCall {
        to: String,
        data: Vec<u8>,
        value: U256,
    },
    /// Payload for chains the core has no dedicated representation for
    Opaque(Vec<u8>),
}

/// Transaction produced by a chain adapter, consumed by the submitter.
///
/// Fields are private: once built, an unsigned transaction is never altered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    chain: ChainId,
    description: String,
    payload: TxPayload,
}

impl UnsignedTransaction {
    pub fn new(chain: ChainId, description: impl Into<String>, payload: TxPayload) -> Self {
        Self {
            chain,
            description: description.into(),
            payload,
        }
    }

    pub fn chain(&self) -> &ChainId {
        &self.chain
    }

    /// Short human label, e.g. "ERC20.approve" or "TokenBridge.transferTokens"
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn payload(&self) -> &TxPayload {
        &self.payload
    }
}

/// Inclusion status of a broadcast transaction as reported by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Not yet mined / not found
    Pending,
    /// Included in a block; `success == false` means the transaction reverted
    Included { block_number: u64, success: bool },
}

/// Proof that a transaction reached the configured confirmation depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub chain: ChainId,
    pub tx_id: String,
    pub block_number: u64,
    /// Number of blocks (including its own) on top of the transaction when finality was observed
    pub confirmations: u64,
}

// ============================================================================
// BRIDGE MESSAGES
// ============================================================================

/// Kind of Token Bridge message carried by a message / attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    AttestMeta,
    Transfer,
}

impl MessageKind {
    /// Token Bridge payload id for this kind
    pub fn payload_id(self) -> u8 {
        match self {
            MessageKind::Transfer => 1,
            MessageKind::AttestMeta => 2,
        }
    }

    pub fn from_payload_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(MessageKind::Transfer),
            2 => Some(MessageKind::AttestMeta),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::AttestMeta => f.write_str("TokenBridge:AttestMeta"),
            MessageKind::Transfer => f.write_str("TokenBridge:Transfer"),
        }
    }
}

/// Identifies an emitted message towards the guardian network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId {
    pub emitter_chain: u16,
    pub emitter_address: [u8; 32],
    pub sequence: u64,
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.emitter_chain,
            hex::encode(self.emitter_address),
            self.sequence
        )
    }
}

/// Message published by the core bridge in a finalized transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeMessage {
    /// Chain the message was emitted on
    pub chain: ChainId,
    /// Transaction that emitted it
    pub tx_id: String,
    pub id: MessageId,
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

// ============================================================================
// TRANSFER REQUEST
// ============================================================================

/// A single transfer to drive end-to-end. `amount` is in the token's smallest unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source: ChainId,
    pub destination: ChainId,
    pub token: TokenId,
    pub amount: U256,
    pub recipient: String,
}

impl TransferRequest {
    /// Builds a request from an amount already expressed in smallest units.
    pub fn from_base_units(
        destination: ChainId,
        token: TokenId,
        amount: U256,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            source: token.chain.clone(),
            destination,
            token,
            amount,
            recipient: recipient.into(),
        }
    }

    /// Builds a request from a human decimal amount and the token's resolved precision.
    pub fn from_decimal(
        destination: ChainId,
        token: TokenId,
        amount: &str,
        decimals: u8,
        recipient: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let amount = parse_units(amount, decimals)?;
        Ok(Self::from_base_units(destination, token, amount, recipient))
    }
}

/// Converts a decimal string ("0.02") into smallest units without floating point.
///
/// Rejects negative values, malformed input, and more fractional digits than `decimals`.
pub fn parse_units(amount: &str, decimals: u8) -> anyhow::Result<U256> {
    let amount = amount.trim();
    if amount.is_empty() {
        anyhow::bail!("Amount must not be empty");
    }

    let (whole, frac) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        anyhow::bail!("Invalid amount '{}'", amount);
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        anyhow::bail!("Invalid amount '{}': only digits and one '.' are allowed", amount);
    }
    if frac.len() > decimals as usize {
        anyhow::bail!(
            "Amount '{}' has {} fractional digits but the token only supports {}",
            amount,
            frac.len(),
            decimals
        );
    }

    let padded = format!("{}{:0<width$}", whole, frac, width = decimals as usize);
    let digits = padded.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_dec_str(digits).map_err(|e| anyhow::anyhow!("Amount '{}' out of range: {:?}", amount, e))
}

/// Formats smallest units as a decimal string, trimming trailing zeros.
pub fn format_units(amount: U256, decimals: u8) -> String {
    let raw = amount.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return raw;
    }

    let padded = format!("{:0>width$}", raw, width = decimals + 1);
    let (whole, frac) = padded.split_at(padded.len() - decimals);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units_exact() {
        assert_eq!(
            parse_units("0.02", 18).unwrap(),
            U256::from_dec_str("20000000000000000").unwrap()
        );
        assert_eq!(parse_units("1", 6).unwrap(), U256::from(1_000_000u64));
        assert_eq!(parse_units("1.5", 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(parse_units(".5", 1).unwrap(), U256::from(5u64));
        assert_eq!(parse_units("0", 18).unwrap(), U256::zero());
    }

    #[test]
    fn test_parse_units_rejects_excess_precision() {
        assert!(parse_units("0.0000001", 6).is_err());
        assert!(parse_units("1.", 0).is_ok());
        assert!(parse_units("1.1", 0).is_err());
    }

    #[test]
    fn test_parse_units_rejects_garbage() {
        assert!(parse_units("", 6).is_err());
        assert!(parse_units(".", 6).is_err());
        assert!(parse_units("-1", 6).is_err());
        assert!(parse_units("1e5", 6).is_err());
        assert!(parse_units("1.2.3", 6).is_err());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_units(U256::from(1_000_000u64), 6), "1");
        assert_eq!(format_units(U256::from(5u64), 6), "0.000005");
        assert_eq!(format_units(U256::from(42u64), 0), "42");
    }

    #[test]
    fn test_token_address_parse() {
        assert_eq!(TokenAddress::parse("NATIVE"), TokenAddress::Native);
        assert_eq!(
            TokenAddress::parse("0xabc"),
            TokenAddress::Contract("0xabc".to_string())
        );
    }
}
