//! Narrow service boundary consumed by order services
//!
//! Callers never see the actor or RocksDB; they append and read through
//! [`LedgerService`], which remote clients and test doubles implement too.

use crate::types::{EventSubmission, LedgerEvent, TxRef};
use crate::{Ledger, Result};
use async_trait::async_trait;

/// Append/read interface of the external ledger
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Append a signed submission; resolves once the event is durable
    async fn append_event(&self, submission: EventSubmission) -> Result<LedgerEvent>;

    /// Events in `from..=to`, oldest first (capped at [`LedgerService::max_read_window`])
    async fn read_events(&self, from: u64, to: u64) -> Result<Vec<LedgerEvent>>;

    /// All events recorded for a correlation id
    async fn events_for(&self, correlation_id: &str) -> Result<Vec<LedgerEvent>>;

    /// Event by transaction reference
    async fn event_by_tx_ref(&self, tx_ref: &TxRef) -> Result<LedgerEvent>;

    /// Offset of the newest event, if any
    async fn latest_offset(&self) -> Result<Option<u64>>;

    /// Largest range a single read may request
    fn max_read_window(&self) -> u64;
}

#[async_trait]
impl LedgerService for Ledger {
    async fn append_event(&self, submission: EventSubmission) -> Result<LedgerEvent> {
        Ledger::append_event(self, submission).await
    }

    async fn read_events(&self, from: u64, to: u64) -> Result<Vec<LedgerEvent>> {
        Ledger::read_events(self, from, to)
    }

    async fn events_for(&self, correlation_id: &str) -> Result<Vec<LedgerEvent>> {
        Ledger::events_for(self, correlation_id)
    }

    async fn event_by_tx_ref(&self, tx_ref: &TxRef) -> Result<LedgerEvent> {
        Ledger::event_by_tx_ref(self, tx_ref)
    }

    async fn latest_offset(&self) -> Result<Option<u64>> {
        Ledger::latest_offset(self)
    }

    fn max_read_window(&self) -> u64 {
        Ledger::max_read_window(self)
    }
}
