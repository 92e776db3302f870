//! Attestation Codec
//!
//! Binary encoding of guardian-signed attestations (VAAs) and their Token Bridge
//! payloads, plus a structured form for inspection.
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! header: version u8 | guardian_set_index u32 | n u8 | n * (guardian_index u8, signature [65])
//! body:   timestamp u32 | nonce u32 | emitter_chain u16 | emitter_address [32]
//!         | sequence u64 | consistency_level u8 | payload ..
//! ```

use ethereum_types::U256;
use serde::Serialize;
use sha3::{Digest, Keccak256};

use crate::error::{BridgeError, Result};
use crate::types::{MessageId, MessageKind};

/// Only VAA version currently produced by the guardian network
pub const VAA_VERSION: u8 = 1;

const SIGNATURE_LEN: usize = 65;
const HEADER_FIXED_LEN: usize = 1 + 4 + 1;
const BODY_FIXED_LEN: usize = 4 + 4 + 2 + 32 + 8 + 1;
const TRANSFER_PAYLOAD_LEN: usize = 1 + 32 + 32 + 2 + 32 + 2 + 32;
const ATTEST_META_PAYLOAD_LEN: usize = 1 + 32 + 2 + 1 + 32 + 32;

// ============================================================================
// TYPES
// ============================================================================

/// Signature of one guardian over the body digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardianSignature {
    pub guardian_index: u8,
    /// r (32) || s (32) || v (1)
    pub signature: [u8; SIGNATURE_LEN],
}

/// Guardian-signed attestation of a bridge message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    pub version: u8,
    pub guardian_set_index: u32,
    pub signatures: Vec<GuardianSignature>,
    pub timestamp: u32,
    pub nonce: u32,
    pub emitter_chain: u16,
    pub emitter_address: [u8; 32],
    pub sequence: u64,
    pub consistency_level: u8,
    pub payload: Vec<u8>,
}

/// Decoded Token Bridge payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenBridgePayload {
    Transfer {
        amount: U256,
        token_address: [u8; 32],
        token_chain: u16,
        to: [u8; 32],
        to_chain: u16,
        fee: U256,
    },
    AttestMeta {
        token_address: [u8; 32],
        token_chain: u16,
        decimals: u8,
        symbol: [u8; 32],
        name: [u8; 32],
    },
}

impl TokenBridgePayload {
    pub fn kind(&self) -> MessageKind {
        match self {
            TokenBridgePayload::Transfer { .. } => MessageKind::Transfer,
            TokenBridgePayload::AttestMeta { .. } => MessageKind::AttestMeta,
        }
    }

    /// Parses a Token Bridge payload; the first byte selects the payload type.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        let id = r.u8()?;
        let kind = MessageKind::from_payload_id(id)
            .ok_or_else(|| BridgeError::decode(format!("unknown token bridge payload id {}", id)))?;

        let parsed = match kind {
            MessageKind::Transfer => {
                if payload.len() != TRANSFER_PAYLOAD_LEN {
                    return Err(BridgeError::decode(format!(
                        "transfer payload must be {} bytes, got {}",
                        TRANSFER_PAYLOAD_LEN,
                        payload.len()
                    )));
                }
                TokenBridgePayload::Transfer {
                    amount: U256::from_big_endian(&r.array::<32>()?),
                    token_address: r.array()?,
                    token_chain: r.u16()?,
                    to: r.array()?,
                    to_chain: r.u16()?,
                    fee: U256::from_big_endian(&r.array::<32>()?),
                }
            }
            MessageKind::AttestMeta => {
                if payload.len() != ATTEST_META_PAYLOAD_LEN {
                    return Err(BridgeError::decode(format!(
                        "attest-meta payload must be {} bytes, got {}",
                        ATTEST_META_PAYLOAD_LEN,
                        payload.len()
                    )));
                }
                TokenBridgePayload::AttestMeta {
                    token_address: r.array()?,
                    token_chain: r.u16()?,
                    decimals: r.u8()?,
                    symbol: r.array()?,
                    name: r.array()?,
                }
            }
        };
        Ok(parsed)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TRANSFER_PAYLOAD_LEN);
        match self {
            TokenBridgePayload::Transfer {
                amount,
                token_address,
                token_chain,
                to,
                to_chain,
                fee,
            } => {
                out.push(MessageKind::Transfer.payload_id());
                out.extend_from_slice(&u256_be(*amount));
                out.extend_from_slice(token_address);
                out.extend_from_slice(&token_chain.to_be_bytes());
                out.extend_from_slice(to);
                out.extend_from_slice(&to_chain.to_be_bytes());
                out.extend_from_slice(&u256_be(*fee));
            }
            TokenBridgePayload::AttestMeta {
                token_address,
                token_chain,
                decimals,
                symbol,
                name,
            } => {
                out.push(MessageKind::AttestMeta.payload_id());
                out.extend_from_slice(token_address);
                out.extend_from_slice(&token_chain.to_be_bytes());
                out.push(*decimals);
                out.extend_from_slice(symbol);
                out.extend_from_slice(name);
            }
        }
        out
    }
}

impl Attestation {
    /// Kind derived from the payload id.
    pub fn kind(&self) -> Result<MessageKind> {
        let id = *self
            .payload
            .first()
            .ok_or_else(|| BridgeError::decode("empty payload"))?;
        MessageKind::from_payload_id(id)
            .ok_or_else(|| BridgeError::decode(format!("unknown token bridge payload id {}", id)))
    }

    pub fn message_id(&self) -> MessageId {
        MessageId {
            emitter_chain: self.emitter_chain,
            emitter_address: self.emitter_address,
            sequence: self.sequence,
        }
    }

    pub fn token_bridge_payload(&self) -> Result<TokenBridgePayload> {
        TokenBridgePayload::parse(&self.payload)
    }

    /// Body bytes (everything after the signatures); the guardians sign its digest.
    pub fn body(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BODY_FIXED_LEN + self.payload.len());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.nonce.to_be_bytes());
        out.extend_from_slice(&self.emitter_chain.to_be_bytes());
        out.extend_from_slice(&self.emitter_address);
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.push(self.consistency_level);
        out.extend_from_slice(&self.payload);
        out
    }

    /// keccak256(keccak256(body))
    pub fn digest(&self) -> [u8; 32] {
        let inner = Keccak256::digest(self.body());
        Keccak256::digest(inner).into()
    }

    /// Structured, serializable view used for the companion JSON file and logs.
    pub fn canonical_form(&self) -> AttestationView {
        let payload = match self.token_bridge_payload() {
            Ok(p) => PayloadView::from(&p),
            Err(_) => PayloadView::Raw {
                bytes: hex0x(&self.payload),
            },
        };

        AttestationView {
            version: self.version,
            guardian_set_index: self.guardian_set_index,
            signatures: self
                .signatures
                .iter()
                .map(|s| SignatureView {
                    guardian_index: s.guardian_index,
                    signature: hex0x(&s.signature),
                })
                .collect(),
            timestamp: self.timestamp,
            nonce: self.nonce,
            emitter_chain: self.emitter_chain,
            emitter_address: hex0x(&self.emitter_address),
            sequence: self.sequence,
            consistency_level: self.consistency_level,
            digest: hex0x(&self.digest()),
            payload,
        }
    }
}

// ============================================================================
// ENCODE / DECODE
// ============================================================================

/// Serializes an attestation into its canonical byte form.
///
/// Fails if the signature count does not fit the one-byte header field.
pub fn encode(attestation: &Attestation) -> Result<Vec<u8>> {
    let count = u8::try_from(attestation.signatures.len()).map_err(|_| {
        BridgeError::AttestationEncode(format!(
            "{} signatures exceed the maximum of {}",
            attestation.signatures.len(),
            u8::MAX
        ))
    })?;

    let mut out = Vec::with_capacity(
        HEADER_FIXED_LEN + attestation.signatures.len() * (1 + SIGNATURE_LEN) + BODY_FIXED_LEN,
    );
    out.push(attestation.version);
    out.extend_from_slice(&attestation.guardian_set_index.to_be_bytes());
    out.push(count);
    for sig in &attestation.signatures {
        out.push(sig.guardian_index);
        out.extend_from_slice(&sig.signature);
    }
    out.extend_from_slice(&attestation.body());
    Ok(out)
}

/// Parses canonical bytes and checks that the payload is of `expected_kind`.
pub fn decode(bytes: &[u8], expected_kind: MessageKind) -> Result<Attestation> {
    let attestation = decode_any(bytes)?;
    let actual = attestation.kind()?;
    if actual != expected_kind {
        return Err(BridgeError::AttestationKindMismatch {
            expected: expected_kind,
            actual,
        });
    }
    attestation.token_bridge_payload()?;
    Ok(attestation)
}

/// Parses canonical bytes without a kind expectation.
pub fn decode_any(bytes: &[u8]) -> Result<Attestation> {
    let mut r = Reader::new(bytes);

    let version = r.u8()?;
    if version != VAA_VERSION {
        return Err(BridgeError::decode(format!("unsupported VAA version {}", version)));
    }
    let guardian_set_index = r.u32()?;
    let count = r.u8()?;
    let mut signatures = Vec::with_capacity(count as usize);
    for _ in 0..count {
        signatures.push(GuardianSignature {
            guardian_index: r.u8()?,
            signature: r.array()?,
        });
    }

    let timestamp = r.u32()?;
    let nonce = r.u32()?;
    let emitter_chain = r.u16()?;
    let emitter_address = r.array()?;
    let sequence = r.u64()?;
    let consistency_level = r.u8()?;
    let payload = r.rest().to_vec();
    if payload.is_empty() {
        return Err(BridgeError::decode("missing payload"));
    }

    Ok(Attestation {
        version,
        guardian_set_index,
        signatures,
        timestamp,
        nonce,
        emitter_chain,
        emitter_address,
        sequence,
        consistency_level,
        payload,
    })
}

// ============================================================================
// STRUCTURED FORM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureView {
    pub guardian_index: u8,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayloadView {
    Transfer {
        amount: String,
        token_address: String,
        token_chain: u16,
        to: String,
        to_chain: u16,
        fee: String,
    },
    AttestMeta {
        token_address: String,
        token_chain: u16,
        decimals: u8,
        symbol: String,
        name: String,
    },
    Raw {
        bytes: String,
    },
}

impl From<&TokenBridgePayload> for PayloadView {
    fn from(p: &TokenBridgePayload) -> Self {
        match p {
            TokenBridgePayload::Transfer {
                amount,
                token_address,
                token_chain,
                to,
                to_chain,
                fee,
            } => PayloadView::Transfer {
                amount: amount.to_string(),
                token_address: hex0x(token_address),
                token_chain: *token_chain,
                to: hex0x(to),
                to_chain: *to_chain,
                fee: fee.to_string(),
            },
            TokenBridgePayload::AttestMeta {
                token_address,
                token_chain,
                decimals,
                symbol,
                name,
            } => PayloadView::AttestMeta {
                token_address: hex0x(token_address),
                token_chain: *token_chain,
                decimals: *decimals,
                symbol: fixed_string(symbol),
                name: fixed_string(name),
            },
        }
    }
}

/// Canonical structured form of an [`Attestation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttestationView {
    pub version: u8,
    pub guardian_set_index: u32,
    pub signatures: Vec<SignatureView>,
    pub timestamp: u32,
    pub nonce: u32,
    pub emitter_chain: u16,
    pub emitter_address: String,
    pub sequence: u64,
    pub consistency_level: u8,
    pub digest: String,
    pub payload: PayloadView,
}

// ============================================================================
// HELPERS
// ============================================================================

fn hex0x(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn u256_be(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

/// Right-padded bytes32 string as stored in AttestMeta (symbol/name).
fn fixed_string(bytes: &[u8; 32]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Bounds-checked big-endian reader.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(BridgeError::decode(format!(
                "truncated input: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.bytes.len().saturating_sub(self.pos)
            ))),
        }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        rest
    }
}
