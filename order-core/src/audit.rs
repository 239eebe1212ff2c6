//! Cross-checks between relational rows and ledger events
//!
//! A row is consistent when the ledger event named by its `ledger_tx_ref`
//! carries the commitment rebuilt from the row's current fields. The scan
//! works the other way round: every event this process submitted must have
//! a receipt stored by the matching relational transaction.

use crate::commitment::CommitmentPayload;
use crate::context::CoreContext;
use crate::types::{Order, OrderId, Shipment, ShipmentId};
use crate::Result;
use event_ledger::{Commitment, EventKind, LedgerEvent, TxRef};
use serde::Serialize;

/// Outcome of checking one row against the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Ledger commitment matches the rebuilt payload
    Verified,
    /// Row references no ledger event yet
    NotRecorded,
    /// Row references an event the ledger does not have
    MissingEvent,
    /// Ledger commitment differs from the row
    Mismatch {
        /// Commitment on the ledger
        recorded: Commitment,
        /// Commitment rebuilt from the row, if the row could describe the event at all
        rebuilt: Option<Commitment>,
    },
}

/// Result of verifying one row
#[derive(Debug, Clone)]
pub struct Verification {
    /// Row id
    pub entity_id: String,
    /// Referenced ledger event
    pub tx_ref: Option<TxRef>,
    /// Kind of the referenced event
    pub kind: Option<EventKind>,
    /// Outcome
    pub verdict: Verdict,
}

impl Verification {
    /// Whether the row and the ledger agree
    pub fn is_consistent(&self) -> bool {
        matches!(self.verdict, Verdict::Verified | Verdict::NotRecorded)
    }
}

/// Result of scanning a range of ledger events
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// First offset examined
    pub from_offset: Option<u64>,
    /// Last offset examined
    pub to_offset: Option<u64>,
    /// Own events with a matching receipt
    pub matched: usize,
    /// Events from other submitters
    pub foreign: usize,
    /// Own events with no relational write
    pub orphaned: Vec<LedgerEvent>,
    /// Own events whose receipt disagrees with the ledger
    pub mismatched: Vec<LedgerEvent>,
}

impl ScanReport {
    /// No orphaned or mismatched events
    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty() && self.mismatched.is_empty()
    }
}

/// Ledger/relational auditor
#[derive(Debug, Clone)]
pub struct Auditor {
    ctx: CoreContext,
}

impl Auditor {
    /// Create auditor
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    /// Check an order row against its latest ledger event
    pub async fn verify_order(&self, order_id: &OrderId) -> Result<Verification> {
        let order = self.ctx.store.order(order_id)?;

        let mut verification = Verification {
            entity_id: order.id.to_string(),
            tx_ref: order.ledger_tx_ref,
            kind: None,
            verdict: Verdict::NotRecorded,
        };

        let event = match self.fetch(order.ledger_tx_ref).await? {
            Fetched::Event(event) => event,
            Fetched::NoReference => return Ok(verification),
            Fetched::Missing => {
                verification.verdict = Verdict::MissingEvent;
                return Ok(verification);
            }
        };

        let rebuilt = if event.correlation_id == order.id.as_str() {
            order_payload(&order, event.kind)
        } else {
            // checkpoint events also move the order to shipped
            let shipment = self.ctx.store.shipment_for_order(&order.id)?;
            if event.correlation_id == shipment.id.as_str() {
                shipment_payload(&shipment)
            } else {
                None
            }
        };

        verification.kind = Some(event.kind);
        verification.verdict = compare(&event, rebuilt);
        Ok(verification)
    }

    /// Check a shipment row against its latest checkpoint event
    pub async fn verify_shipment(&self, shipment_id: &ShipmentId) -> Result<Verification> {
        let shipment = self.ctx.store.shipment(shipment_id)?;

        let mut verification = Verification {
            entity_id: shipment.id.to_string(),
            tx_ref: shipment.ledger_tx_ref,
            kind: None,
            verdict: Verdict::NotRecorded,
        };

        let event = match self.fetch(shipment.ledger_tx_ref).await? {
            Fetched::Event(event) => event,
            Fetched::NoReference => return Ok(verification),
            Fetched::Missing => {
                verification.verdict = Verdict::MissingEvent;
                return Ok(verification);
            }
        };

        let rebuilt = if event.correlation_id == shipment.id.as_str() {
            shipment_payload(&shipment)
        } else {
            None
        };

        verification.kind = Some(event.kind);
        verification.verdict = compare(&event, rebuilt);
        Ok(verification)
    }

    /// Pair the most recent ledger window with stored receipts
    pub async fn scan_recent(&self) -> Result<ScanReport> {
        let events = self.ctx.gateway.recent_events().await?;
        self.classify(events)
    }

    /// Pair every ledger event with stored receipts, paging through history
    pub async fn scan_all(&self) -> Result<ScanReport> {
        let events = match self.ctx.gateway.latest_offset().await? {
            Some(head) => self.ctx.gateway.read_range(0, head).await?,
            None => Vec::new(),
        };
        self.classify(events)
    }

    fn classify(&self, events: Vec<LedgerEvent>) -> Result<ScanReport> {
        let submitter = self.ctx.gateway.submitter_id();
        let mut report = ScanReport {
            from_offset: events.first().map(|e| e.offset),
            to_offset: events.last().map(|e| e.offset),
            ..ScanReport::default()
        };

        for event in events {
            if event.submitter != submitter {
                report.foreign += 1;
                continue;
            }

            match self.ctx.store.receipt(&event.tx_ref)? {
                Some(receipt)
                    if receipt.kind == event.kind
                        && receipt.commitment == event.commitment
                        && receipt.correlation_id == event.correlation_id =>
                {
                    report.matched += 1;
                }
                Some(_) => {
                    tracing::warn!(
                        tx_ref = %event.tx_ref,
                        correlation_id = %event.correlation_id,
                        "Receipt disagrees with ledger event"
                    );
                    report.mismatched.push(event);
                }
                None => {
                    tracing::warn!(
                        tx_ref = %event.tx_ref,
                        correlation_id = %event.correlation_id,
                        kind = %event.kind,
                        "Ledger event has no relational write"
                    );
                    report.orphaned.push(event);
                }
            }
        }

        Ok(report)
    }

    async fn fetch(&self, tx_ref: Option<TxRef>) -> Result<Fetched> {
        let tx_ref = match tx_ref {
            Some(tx_ref) => tx_ref,
            None => return Ok(Fetched::NoReference),
        };

        match self.ctx.gateway.event(&tx_ref).await {
            Ok(event) => Ok(Fetched::Event(event)),
            Err(crate::Error::NotFound { .. }) => Ok(Fetched::Missing),
            Err(e) => Err(e),
        }
    }
}

enum Fetched {
    Event(LedgerEvent),
    NoReference,
    Missing,
}

fn order_payload(order: &Order, kind: EventKind) -> Option<CommitmentPayload> {
    let order_id = order.id.clone();
    match kind {
        EventKind::OrderCreated => Some(CommitmentPayload::OrderCreated {
            order_id,
            amount: order.total_amount,
            buyer_id: order.buyer_id.clone(),
        }),
        EventKind::StatusUpdate => Some(CommitmentPayload::StatusUpdate {
            order_id,
            status: order.status,
            updater: order.status_updated_by.clone()?,
        }),
        EventKind::DeliveryConfirmed => Some(CommitmentPayload::DeliveryConfirmed {
            order_id,
            status: order.status,
            updater: order.status_updated_by.clone()?,
        }),
        EventKind::PaymentReleased => Some(CommitmentPayload::PaymentReleased {
            order_id,
            amount: order.total_amount,
            seller_id: order.seller_id.clone(),
        }),
    }
}

fn shipment_payload(shipment: &Shipment) -> Option<CommitmentPayload> {
    Some(CommitmentPayload::CheckpointUpdate {
        shipment_id: shipment.id.clone(),
        checkpoint: shipment.checkpoint,
        updater: shipment.updated_by.clone()?,
    })
}

fn compare(event: &LedgerEvent, rebuilt: Option<CommitmentPayload>) -> Verdict {
    match rebuilt {
        Some(payload) if payload.kind() == event.kind && payload.commitment() == event.commitment => {
            Verdict::Verified
        }
        Some(payload) => Verdict::Mismatch {
            recorded: event.commitment,
            rebuilt: Some(payload.commitment()),
        },
        None => Verdict::Mismatch {
            recorded: event.commitment,
            rebuilt: None,
        },
    }
}
