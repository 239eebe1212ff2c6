//! Hash commitments over off-chain payloads
//!
//! Each event kind commits to a fixed, declared set of fields. The canonical
//! form is independent of in-memory field order:
//!
//! ```text
//! domain tag || kind code || for each field sorted by name:
//!     u32 name length || name || u32 value length || value
//! ```
//!
//! Decimals are normalized first, so `60.00` and `60` commit identically.

use crate::types::{Checkpoint, OrderId, OrderStatus, ShipmentId, UserId};
use event_ledger::{Commitment, EventKind};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// Domain tag mixed into every commitment
const COMMITMENT_DOMAIN: &[u8] = b"orderchain.commitment.v1";

/// Payload of a ledger event, with exactly the committed fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitmentPayload {
    /// `ORDER_CREATED` over {id, amount, buyer}
    OrderCreated {
        /// Order id
        order_id: OrderId,
        /// Total amount
        amount: Decimal,
        /// Buyer id
        buyer_id: UserId,
    },

    /// `STATUS_UPDATE` over {id, status, updater}
    StatusUpdate {
        /// Order id
        order_id: OrderId,
        /// New status
        status: OrderStatus,
        /// Acting user
        updater: UserId,
    },

    /// `DELIVERY_CONFIRMED` over {id, status, updater}
    DeliveryConfirmed {
        /// Order id
        order_id: OrderId,
        /// New status (always delivered)
        status: OrderStatus,
        /// Acting user
        updater: UserId,
    },

    /// `STATUS_UPDATE` keyed by shipment, over {id, location, updater}
    CheckpointUpdate {
        /// Shipment id
        shipment_id: ShipmentId,
        /// New checkpoint
        checkpoint: Checkpoint,
        /// Acting user
        updater: UserId,
    },

    /// `PAYMENT_RELEASED` over {id, amount, seller}
    PaymentReleased {
        /// Order id
        order_id: OrderId,
        /// Amount released
        amount: Decimal,
        /// Collecting seller
        seller_id: UserId,
    },
}

impl CommitmentPayload {
    /// Payload for an order status change
    ///
    /// Delivery is recorded as its own event kind.
    pub fn status_change(order_id: OrderId, status: OrderStatus, updater: UserId) -> Self {
        if status == OrderStatus::Delivered {
            CommitmentPayload::DeliveryConfirmed {
                order_id,
                status,
                updater,
            }
        } else {
            CommitmentPayload::StatusUpdate {
                order_id,
                status,
                updater,
            }
        }
    }

    /// Ledger event kind
    pub fn kind(&self) -> EventKind {
        match self {
            CommitmentPayload::OrderCreated { .. } => EventKind::OrderCreated,
            CommitmentPayload::StatusUpdate { .. } => EventKind::StatusUpdate,
            CommitmentPayload::DeliveryConfirmed { .. } => EventKind::DeliveryConfirmed,
            CommitmentPayload::CheckpointUpdate { .. } => EventKind::StatusUpdate,
            CommitmentPayload::PaymentReleased { .. } => EventKind::PaymentReleased,
        }
    }

    /// Entity the event is recorded under
    pub fn correlation_id(&self) -> &str {
        match self {
            CommitmentPayload::OrderCreated { order_id, .. }
            | CommitmentPayload::StatusUpdate { order_id, .. }
            | CommitmentPayload::DeliveryConfirmed { order_id, .. }
            | CommitmentPayload::PaymentReleased { order_id, .. } => order_id.as_str(),
            CommitmentPayload::CheckpointUpdate { shipment_id, .. } => shipment_id.as_str(),
        }
    }

    /// Committed fields as (name, canonical value), sorted by name
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = match self {
            CommitmentPayload::OrderCreated {
                order_id,
                amount,
                buyer_id,
            } => vec![
                ("id", order_id.to_string()),
                ("amount", canonical_decimal(amount)),
                ("buyer", buyer_id.to_string()),
            ],
            CommitmentPayload::StatusUpdate {
                order_id,
                status,
                updater,
            }
            | CommitmentPayload::DeliveryConfirmed {
                order_id,
                status,
                updater,
            } => vec![
                ("id", order_id.to_string()),
                ("status", status.as_str().to_string()),
                ("updater", updater.to_string()),
            ],
            CommitmentPayload::CheckpointUpdate {
                shipment_id,
                checkpoint,
                updater,
            } => vec![
                ("id", shipment_id.to_string()),
                ("location", checkpoint.label().to_string()),
                ("updater", updater.to_string()),
            ],
            CommitmentPayload::PaymentReleased {
                order_id,
                amount,
                seller_id,
            } => vec![
                ("id", order_id.to_string()),
                ("amount", canonical_decimal(amount)),
                ("seller", seller_id.to_string()),
            ],
        };

        fields.sort_by(|a, b| a.0.cmp(b.0));
        fields
    }

    /// Canonical byte form that is hashed
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(128);
        bytes.extend_from_slice(COMMITMENT_DOMAIN);
        bytes.push(self.kind().code());

        for (name, value) in self.fields() {
            bytes.extend_from_slice(&(name.len() as u32).to_be_bytes());
            bytes.extend_from_slice(name.as_bytes());
            bytes.extend_from_slice(&(value.len() as u32).to_be_bytes());
            bytes.extend_from_slice(value.as_bytes());
        }

        bytes
    }

    /// SHA-256 commitment
    pub fn commitment(&self) -> Commitment {
        let digest: [u8; 32] = Sha256::digest(self.canonical_bytes()).into();
        Commitment::from_bytes(digest)
    }
}

fn canonical_decimal(value: &Decimal) -> String {
    value.normalize().to_string()
}
