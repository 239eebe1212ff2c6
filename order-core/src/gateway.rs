//! Ledger client used by the engines
//!
//! Wraps the injected [`LedgerService`] with signing, a bounded append
//! timeout and idempotent retries:
//!
//! 1. Re-read the correlation id. If an event of the same kind and
//!    commitment from this submitter exists, return its receipt.
//! 2. Otherwise sign and append under `append_timeout`.
//! 3. On timeout, re-read once more. The ledger may have recorded the event
//!    even though the caller stopped waiting.

use crate::commitment::CommitmentPayload;
use crate::metrics::Metrics;
use crate::types::LedgerReceipt;
use crate::{Error, Result};
use event_ledger::{Commitment, EventKind, KeyPair, LedgerEvent, LedgerService, SubmitterId, TxRef};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Idempotent, timeout-bounded ledger client
pub struct LedgerGateway {
    service: Arc<dyn LedgerService>,
    keypair: KeyPair,
    append_timeout: Duration,
    metrics: Metrics,
}

impl std::fmt::Debug for LedgerGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerGateway")
            .field("submitter", &self.keypair.submitter_id())
            .field("append_timeout", &self.append_timeout)
            .finish()
    }
}

impl LedgerGateway {
    /// Create gateway
    pub fn new(
        service: Arc<dyn LedgerService>,
        keypair: KeyPair,
        append_timeout: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            service,
            keypair,
            append_timeout,
            metrics,
        }
    }

    /// Identity this process submits under
    pub fn submitter_id(&self) -> SubmitterId {
        self.keypair.submitter_id()
    }

    /// Largest range the ledger serves per read
    pub fn max_read_window(&self) -> u64 {
        self.service.max_read_window().max(1)
    }

    /// Record the payload on the ledger, returning once it is durable
    pub async fn append(&self, payload: &CommitmentPayload) -> Result<LedgerReceipt> {
        let correlation_id = payload.correlation_id();
        let kind = payload.kind();
        let commitment = payload.commitment();

        if let Some(existing) = self.find_recorded(correlation_id, kind, &commitment).await? {
            self.metrics.ledger_replays.inc();
            tracing::warn!(
                correlation_id,
                kind = %kind,
                tx_ref = %existing.tx_ref,
                "Event already on ledger, reusing receipt"
            );
            return Ok(LedgerReceipt::from(&existing));
        }

        let submission = self.keypair.sign_submission(correlation_id, kind, commitment);

        let start = Instant::now();
        let outcome =
            tokio::time::timeout(self.append_timeout, self.service.append_event(submission)).await;
        self.metrics
            .append_duration
            .observe(start.elapsed().as_secs_f64());

        match outcome {
            Ok(Ok(event)) => {
                tracing::info!(
                    correlation_id,
                    kind = %kind,
                    tx_ref = %event.tx_ref,
                    offset = event.offset,
                    "Event recorded on ledger"
                );
                Ok(LedgerReceipt::from(&event))
            }
            Ok(Err(e)) => {
                self.metrics.ledger_failures.inc();
                tracing::warn!(correlation_id, kind = %kind, error = %e, "Ledger append failed");
                Err(Error::LedgerUnavailable(e.to_string()))
            }
            Err(_) => {
                self.metrics.ledger_failures.inc();
                tracing::warn!(
                    correlation_id,
                    kind = %kind,
                    timeout_ms = self.append_timeout.as_millis() as u64,
                    "Ledger append timed out, re-reading"
                );

                match self.find_recorded(correlation_id, kind, &commitment).await {
                    Ok(Some(event)) => {
                        tracing::info!(
                            correlation_id,
                            tx_ref = %event.tx_ref,
                            "Timed-out append found on ledger"
                        );
                        Ok(LedgerReceipt::from(&event))
                    }
                    Ok(None) | Err(_) => Err(Error::LedgerTimeout {
                        correlation_id: correlation_id.to_string(),
                        timeout_ms: self.append_timeout.as_millis() as u64,
                    }),
                }
            }
        }
    }

    /// Events in the most recent read window, oldest first
    ///
    /// Older history is not returned; use [`LedgerGateway::read_range`] to page.
    pub async fn recent_events(&self) -> Result<Vec<LedgerEvent>> {
        let head = match self.bounded(self.service.latest_offset()).await? {
            Some(head) => head,
            None => return Ok(Vec::new()),
        };

        let from = head.saturating_sub(self.max_read_window() - 1);
        self.bounded(self.service.read_events(from, head)).await
    }

    /// Events in `from..=to`, paging through read windows
    pub async fn read_range(&self, from: u64, to: u64) -> Result<Vec<LedgerEvent>> {
        if to < from {
            return Err(Error::Validation(format!("Invalid range {}..={}", from, to)));
        }

        let window = self.max_read_window();
        let mut events = Vec::new();
        let mut start = from;

        loop {
            let end = to.min(start.saturating_add(window - 1));
            let page = self.bounded(self.service.read_events(start, end)).await?;
            let short = (page.len() as u64) < end - start + 1;
            events.extend(page);

            if short || end == to {
                break;
            }
            start = end + 1;
        }

        Ok(events)
    }

    /// Offset of the newest ledger event
    pub async fn latest_offset(&self) -> Result<Option<u64>> {
        self.bounded(self.service.latest_offset()).await
    }

    /// Full history of one entity
    pub async fn history(&self, correlation_id: &str) -> Result<Vec<LedgerEvent>> {
        self.bounded(self.service.events_for(correlation_id)).await
    }

    /// Event by transaction reference
    pub async fn event(&self, tx_ref: &TxRef) -> Result<LedgerEvent> {
        match tokio::time::timeout(self.append_timeout, self.service.event_by_tx_ref(tx_ref)).await
        {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(event_ledger::Error::EventNotFound(_))) => {
                Err(Error::not_found("ledger event", tx_ref))
            }
            Ok(Err(e)) => Err(Error::LedgerUnavailable(e.to_string())),
            Err(_) => Err(Error::LedgerUnavailable(format!(
                "read of {} timed out",
                tx_ref
            ))),
        }
    }

    async fn find_recorded(
        &self,
        correlation_id: &str,
        kind: EventKind,
        commitment: &Commitment,
    ) -> Result<Option<LedgerEvent>> {
        let submitter = self.submitter_id();
        let events = self.bounded(self.service.events_for(correlation_id)).await?;

        Ok(events.into_iter().find(|event| {
            event.kind == kind && event.commitment == *commitment && event.submitter == submitter
        }))
    }

    async fn bounded<T>(
        &self,
        read: impl Future<Output = event_ledger::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.append_timeout, read).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::LedgerUnavailable(e.to_string())),
            Err(_) => Err(Error::LedgerUnavailable(format!(
                "ledger read timed out after {}ms",
                self.append_timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderId, UserId};
    use event_ledger::Ledger;
    use rust_decimal::Decimal;

    async fn create_test_gateway(window: u64) -> (LedgerGateway, Arc<Ledger>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = event_ledger::Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.max_read_window = window;
        config.batching.enabled = false;
        config.rocksdb.sync_writes = false;

        let ledger = Arc::new(Ledger::open(config).await.unwrap());
        let gateway = LedgerGateway::new(
            ledger.clone(),
            KeyPair::generate(),
            Duration::from_secs(2),
            Metrics::new().unwrap(),
        );
        (gateway, ledger, temp_dir)
    }

    fn created(n: u32) -> CommitmentPayload {
        CommitmentPayload::OrderCreated {
            order_id: OrderId::new(format!("ord_{}", n)),
            amount: Decimal::from(n),
            buyer_id: UserId::new("usr_buyer"),
        }
    }

    #[tokio::test]
    async fn test_append_returns_receipt() {
        let (gateway, _ledger, _temp) = create_test_gateway(10).await;

        let receipt = gateway.append(&created(1)).await.unwrap();
        assert_eq!(receipt.offset, 0);
        assert_eq!(receipt.correlation_id, "ord_1");
        assert_eq!(receipt.kind, EventKind::OrderCreated);
        assert_eq!(receipt.commitment, created(1).commitment());
    }

    #[tokio::test]
    async fn test_repeated_append_replays_existing_event() {
        let (gateway, ledger, _temp) = create_test_gateway(10).await;

        let first = gateway.append(&created(1)).await.unwrap();
        let second = gateway.append(&created(1)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.latest_offset().unwrap(), Some(0));
        assert_eq!(gateway.metrics.ledger_replays.get(), 1);
    }

    #[tokio::test]
    async fn test_different_submitter_is_not_a_replay() {
        let (gateway, ledger, _temp) = create_test_gateway(10).await;
        let other = LedgerGateway::new(
            ledger.clone(),
            KeyPair::generate(),
            Duration::from_secs(2),
            Metrics::new().unwrap(),
        );

        gateway.append(&created(1)).await.unwrap();
        other.append(&created(1)).await.unwrap();

        assert_eq!(ledger.latest_offset().unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_recent_events_limited_to_window() {
        let (gateway, _ledger, _temp) = create_test_gateway(3).await;
        assert!(gateway.recent_events().await.unwrap().is_empty());

        for n in 0..7 {
            gateway.append(&created(n)).await.unwrap();
        }

        let recent = gateway.recent_events().await.unwrap();
        let offsets: Vec<u64> = recent.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn test_read_range_pages_through_windows() {
        let (gateway, _ledger, _temp) = create_test_gateway(3).await;
        for n in 0..8 {
            gateway.append(&created(n)).await.unwrap();
        }

        let all = gateway.read_range(0, 7).await.unwrap();
        assert_eq!(all.len(), 8);
        assert!(all.windows(2).all(|w| w[1].offset == w[0].offset + 1));

        // clamped to the head
        let tail = gateway.read_range(6, 100).await.unwrap();
        assert_eq!(tail.len(), 2);

        assert!(gateway.read_range(5, 2).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_tx_ref_is_not_found() {
        let (gateway, _ledger, _temp) = create_test_gateway(10).await;
        let err = gateway.event(&TxRef::ZERO).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
