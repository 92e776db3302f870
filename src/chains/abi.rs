//! Minimal Solidity ABI encoding for the handful of calls the EVM adapter makes.

use anyhow::{Context, Result};
use ethereum_types::U256;
use sha3::{Digest, Keccak256};

/// One call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// Static 32-byte word (address, uintN, bytes32)
    Word([u8; 32]),
    /// Dynamic `bytes`
    Bytes(Vec<u8>),
}

impl Param {
    pub fn address(addr: &str) -> Result<Self> {
        Ok(Param::Word(address_word(addr)?))
    }

    pub fn uint(value: impl Into<U256>) -> Self {
        Param::Word(u256_word(value.into()))
    }
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// First four bytes of keccak256 of the function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Event topic (full keccak256 of the event signature), 0x-prefixed.
pub fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
}

/// Encodes `selector(signature) ++ abi.encode(params...)`.
pub fn encode_call(signature: &str, params: &[Param]) -> Vec<u8> {
    let mut head = Vec::with_capacity(params.len() * 32);
    let mut tail = Vec::new();
    let head_len = params.len() * 32;

    for param in params {
        match param {
            Param::Word(word) => head.extend_from_slice(word),
            Param::Bytes(bytes) => {
                head.extend_from_slice(&u256_word(U256::from(head_len + tail.len())));
                tail.extend_from_slice(&u256_word(U256::from(bytes.len())));
                tail.extend_from_slice(bytes);
                let pad = (32 - bytes.len() % 32) % 32;
                tail.extend(std::iter::repeat(0u8).take(pad));
            }
        }
    }

    let mut out = selector(signature).to_vec();
    out.extend_from_slice(&head);
    out.extend_from_slice(&tail);
    out
}

pub fn u256_word(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

/// Left-pads a 20-byte `0x` address to a 32-byte word.
pub fn address_word(addr: &str) -> Result<[u8; 32]> {
    let stripped = addr
        .strip_prefix("0x")
        .ok_or_else(|| anyhow::anyhow!("EVM address must be 0x-prefixed hex: {}", addr))?;
    let bytes = hex::decode(stripped).with_context(|| format!("Invalid hex address {}", addr))?;
    if bytes.len() != 20 {
        anyhow::bail!("Invalid EVM address length: expected 20 bytes, got {}", bytes.len());
    }
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(&bytes);
    Ok(out)
}

/// Last 20 bytes of a word as a lowercase `0x` address.
pub fn word_to_address(word: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(&word[12..]))
}

/// Decodes a `0x` hex string returned by the node.
pub fn decode_hex(data: &str) -> Result<Vec<u8>> {
    let stripped = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(stripped).with_context(|| format!("Invalid hex data: {}", data))
}

/// The `index`-th 32-byte word of ABI-encoded data.
pub fn word(data: &[u8], index: usize) -> Result<[u8; 32]> {
    let start = index * 32;
    let slice = data
        .get(start..start + 32)
        .ok_or_else(|| anyhow::anyhow!("ABI data too short: no word {} in {} bytes", index, data.len()))?;
    let mut out = [0u8; 32];
    out.copy_from_slice(slice);
    Ok(out)
}

pub fn word_u256(data: &[u8], index: usize) -> Result<U256> {
    Ok(U256::from_big_endian(&word(data, index)?))
}

/// Reads a dynamic `bytes` value whose offset is stored in word `index`.
pub fn dynamic_bytes(data: &[u8], index: usize) -> Result<Vec<u8>> {
    let offset = word_u256(data, index)?;
    if offset > U256::from(data.len()) {
        anyhow::bail!("ABI bytes offset {} out of range", offset);
    }
    let offset = offset.as_usize();
    let len_word = data
        .get(offset..offset + 32)
        .ok_or_else(|| anyhow::anyhow!("ABI bytes length word out of range"))?;
    let len = U256::from_big_endian(len_word);
    if len > U256::from(data.len()) {
        anyhow::bail!("ABI bytes length {} out of range", len);
    }
    let len = len.as_usize();
    data.get(offset + 32..offset + 32 + len)
        .map(|b| b.to_vec())
        .ok_or_else(|| anyhow::anyhow!("ABI bytes value truncated"))
}
