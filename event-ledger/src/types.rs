//! Core types for the event ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Fixed-width hashes (32 bytes, `0x` hex on display)
//! - Memory safety (no unsafe code)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Domain tag mixed into every transaction reference
const TX_REF_DOMAIN: &[u8] = b"orderchain.ledger.tx.v1";

/// Domain tag mixed into every submission signature
const SUBMISSION_DOMAIN: &[u8] = b"orderchain.ledger.submit.v1";

macro_rules! hash32 {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            /// All-zero value
            pub const ZERO: Self = Self([0u8; 32]);

            /// Create from raw bytes
            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Get raw bytes
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Lowercase hex with `0x` prefix
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = crate::Error;

            fn from_str(s: &str) -> crate::Result<Self> {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(digits).map_err(|e| {
                    crate::Error::InvalidSubmission(format!("bad hex {}: {}", s, e))
                })?;
                let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
                    crate::Error::InvalidSubmission(format!("expected 32 bytes: {}", s))
                })?;
                Ok(Self(bytes))
            }
        }
    };
}

hash32!(
    /// Commitment hash over an off-chain payload
    Commitment
);

hash32!(
    /// Ledger-assigned transaction reference
    TxRef
);

hash32!(
    /// Identity of a submitting party (Ed25519 public key)
    SubmitterId
);

/// Kind of business event recorded on the ledger
///
/// Wire codes are fixed: they are part of the transaction reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    /// Order placed
    OrderCreated = 0,
    /// Order status or shipment checkpoint changed
    StatusUpdate = 1,
    /// Buyer confirmed receipt
    DeliveryConfirmed = 2,
    /// Seller collected payment
    PaymentReleased = 3,
}

impl EventKind {
    /// Wire code
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Parse from wire code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(EventKind::OrderCreated),
            1 => Some(EventKind::StatusUpdate),
            2 => Some(EventKind::DeliveryConfirmed),
            3 => Some(EventKind::PaymentReleased),
            _ => None,
        }
    }

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OrderCreated => "ORDER_CREATED",
            EventKind::StatusUpdate => "STATUS_UPDATE",
            EventKind::DeliveryConfirmed => "DELIVERY_CONFIRMED",
            EventKind::PaymentReleased => "PAYMENT_RELEASED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to append an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSubmission {
    /// Id of the domain entity the event describes
    pub correlation_id: String,

    /// Event kind
    pub kind: EventKind,

    /// Commitment over the off-chain payload
    pub commitment: Commitment,

    /// Submitting party
    pub submitter: SubmitterId,

    /// Ed25519 signature over [`EventSubmission::signing_message`]
    pub signature: Signature,
}

impl EventSubmission {
    /// Message the submitter signs
    pub fn signing_message(correlation_id: &str, kind: EventKind, commitment: &Commitment) -> Vec<u8> {
        let mut message = Vec::with_capacity(SUBMISSION_DOMAIN.len() + correlation_id.len() + 41);
        message.extend_from_slice(SUBMISSION_DOMAIN);
        message.push(kind.code());
        message.extend_from_slice(&(correlation_id.len() as u32).to_be_bytes());
        message.extend_from_slice(correlation_id.as_bytes());
        message.extend_from_slice(commitment.as_bytes());
        message
    }

    /// Verify the signature against the claimed submitter
    pub fn verify_signature(&self) -> bool {
        let message = Self::signing_message(&self.correlation_id, self.kind, &self.commitment);
        self.signature.verify(&message, self.submitter.as_bytes())
    }
}

/// Event recorded on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the log (dense, starting at 0)
    pub offset: u64,

    /// Transaction reference
    pub tx_ref: TxRef,

    /// Transaction reference of the previous event (zero for genesis)
    pub prev_tx_ref: TxRef,

    /// Ledger-assigned timestamp
    pub timestamp: DateTime<Utc>,

    /// Event kind
    pub kind: EventKind,

    /// Commitment over the off-chain payload
    pub commitment: Commitment,

    /// Submitting party
    pub submitter: SubmitterId,

    /// Id of the domain entity the event describes
    pub correlation_id: String,
}

impl LedgerEvent {
    /// Build the event for an accepted submission and compute its reference
    pub fn seal(
        offset: u64,
        prev_tx_ref: TxRef,
        timestamp: DateTime<Utc>,
        submission: EventSubmission,
    ) -> Self {
        let mut event = Self {
            offset,
            tx_ref: TxRef::ZERO,
            prev_tx_ref,
            timestamp,
            kind: submission.kind,
            commitment: submission.commitment,
            submitter: submission.submitter,
            correlation_id: submission.correlation_id,
        };
        event.tx_ref = event.compute_tx_ref();
        event
    }

    /// Recompute the transaction reference from the event contents
    pub fn compute_tx_ref(&self) -> TxRef {
        let mut hasher = Sha256::new();
        hasher.update(TX_REF_DOMAIN);
        hasher.update(self.prev_tx_ref.as_bytes());
        hasher.update(self.offset.to_be_bytes());
        hasher.update(self.timestamp.timestamp_nanos_opt().unwrap_or(0).to_be_bytes());
        hasher.update([self.kind.code()]);
        hasher.update((self.correlation_id.len() as u32).to_be_bytes());
        hasher.update(self.correlation_id.as_bytes());
        hasher.update(self.commitment.as_bytes());
        hasher.update(self.submitter.as_bytes());
        TxRef::from_bytes(hasher.finalize().into())
    }

    /// Check this event's reference and its link to `prev`
    pub fn verify_link(&self, prev: Option<&LedgerEvent>) -> bool {
        let expected_prev = prev.map(|p| p.tx_ref).unwrap_or(TxRef::ZERO);
        self.prev_tx_ref == expected_prev && self.tx_ref == self.compute_tx_ref()
    }
}

/// Digital signature (Ed25519)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Signature bytes (64 bytes)
    #[serde(with = "serde_bytes")]
    bytes: [u8; 64],
}

impl Signature {
    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }

    /// Verify signature
    pub fn verify(&self, message: &[u8], public_key: &[u8; 32]) -> bool {
        use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};

        let signature = DalekSignature::from_bytes(&self.bytes);

        let verifying_key = match VerifyingKey::from_bytes(public_key) {
            Ok(key) => key,
            Err(_) => return false,
        };

        verifying_key.verify(message, &signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(correlation_id: &str) -> EventSubmission {
        EventSubmission {
            correlation_id: correlation_id.to_string(),
            kind: EventKind::OrderCreated,
            commitment: Commitment::from_bytes([7u8; 32]),
            submitter: SubmitterId::from_bytes([1u8; 32]),
            signature: Signature::from_bytes([0u8; 64]),
        }
    }

    #[test]
    fn test_event_kind_codes() {
        for code in 0u8..4 {
            let kind = EventKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert_eq!(EventKind::from_code(4), None);
        assert_eq!(EventKind::DeliveryConfirmed.as_str(), "DELIVERY_CONFIRMED");
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let tx = TxRef::from_bytes([0xab; 32]);
        let text = tx.to_string();
        assert!(text.starts_with("0xabab"));
        assert_eq!(text.parse::<TxRef>().unwrap(), tx);
        assert!("0x1234".parse::<TxRef>().is_err());
    }

    #[test]
    fn test_seal_links_to_previous() {
        let genesis = LedgerEvent::seal(0, TxRef::ZERO, Utc::now(), submission("ord_1"));
        let next = LedgerEvent::seal(1, genesis.tx_ref, Utc::now(), submission("ord_2"));

        assert!(genesis.verify_link(None));
        assert!(next.verify_link(Some(&genesis)));
        assert!(!next.verify_link(None));
    }

    #[test]
    fn test_tampered_event_fails_verification() {
        let mut event = LedgerEvent::seal(0, TxRef::ZERO, Utc::now(), submission("ord_1"));
        event.commitment = Commitment::from_bytes([8u8; 32]);
        assert!(!event.verify_link(None));
    }

    #[test]
    fn test_signing_message_binds_correlation_id() {
        let commitment = Commitment::from_bytes([3u8; 32]);
        let a = EventSubmission::signing_message("ord_1", EventKind::StatusUpdate, &commitment);
        let b = EventSubmission::signing_message("ord_2", EventKind::StatusUpdate, &commitment);
        assert_ne!(a, b);
    }
}
