//! Attestation Waiter
//!
//! Polls the guardian network for the signed attestation of an emitted message.
//! Bounded by a deadline: the waiter returns `AttestationTimeout` instead of
//! blocking past it. Re-invoking with the same message is always safe.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::attestation::{self, Attestation};
use crate::error::{BridgeError, Result};
use crate::guardian_client::AttestationSource;
use crate::types::{BridgeMessage, MessageKind};

/// Poll cadence. `multiplier == 1.0` polls at a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl PollPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1.0,
        }
    }

    pub fn backoff(initial_interval: Duration, max_interval: Duration, multiplier: f64) -> Self {
        Self {
            initial_interval,
            max_interval: max_interval.max(initial_interval),
            multiplier: multiplier.max(1.0),
        }
    }

    /// Interval to wait after one that lasted `current`
    pub fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max_interval)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::backoff(Duration::from_secs(1), Duration::from_secs(30), 2.0)
    }
}

/// Waits for guardian-signed attestations
pub struct AttestationWaiter {
    source: Arc<dyn AttestationSource>,
    policy: PollPolicy,
}

impl AttestationWaiter {
    pub fn new(source: Arc<dyn AttestationSource>, policy: PollPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Polls until an attestation of `expected_kind` for `message` appears, or `timeout` elapses.
    ///
    /// # Returns
    ///
    /// * `Ok(Attestation)` - Decoded attestation for this message
    /// * `Err(AttestationTimeout)` - Nothing was signed before the deadline
    /// * `Err(AttestationKindMismatch)` - The message or the returned attestation has another kind
    /// * `Err(AttestationDecode)` - The returned bytes are malformed or name another message
    pub async fn await_attestation(
        &self,
        message: &BridgeMessage,
        expected_kind: MessageKind,
        timeout: Duration,
    ) -> Result<Attestation> {
        if message.kind != expected_kind {
            return Err(BridgeError::AttestationKindMismatch {
                expected: expected_kind,
                actual: message.kind,
            });
        }

        info!(
            "🔄 Waiting up to {}s for {} attestation of {}",
            timeout.as_secs(),
            expected_kind,
            message.id
        );

        let deadline = Instant::now() + timeout;
        let mut interval = self.policy.initial_interval;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());

            match tokio::time::timeout(remaining, self.source.fetch_signed(&message.id)).await {
                Ok(Ok(Some(bytes))) => {
                    let attestation = attestation::decode(&bytes, expected_kind)?;
                    if attestation.message_id() != message.id {
                        return Err(BridgeError::AttestationDecode(format!(
                            "attestation is for message {}, expected {}",
                            attestation.message_id(),
                            message.id
                        )));
                    }
                    info!(
                        "✅ Attestation for {} received after {} attempt(s), {} signatures",
                        message.id,
                        attempt,
                        attestation.signatures.len()
                    );
                    return Ok(attestation);
                }
                Ok(Ok(None)) => debug!("Attempt {}: attestation for {} not yet signed", attempt, message.id),
                Ok(Err(e)) => warn!("Attempt {}: guardian query failed: {:#}", attempt, e),
                Err(_) => debug!("Attempt {}: guardian query cut off by deadline", attempt),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(BridgeError::AttestationTimeout {
                    message: message.id.clone(),
                    kind: expected_kind,
                    timeout_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
            interval = self.policy.next_interval(interval);
        }
    }
}
