//! Main ledger orchestration layer
//!
//! This module ties together storage, crypto, and actor components
//! into the append/read API the order services consume.
//!
//! # Example
//!
//! ```no_run
//! use event_ledger::{Commitment, Config, EventKind, KeyPair, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> event_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!     let keypair = KeyPair::generate();
//!
//!     let submission = keypair.sign_submission(
//!         "ord_0190",
//!         EventKind::OrderCreated,
//!         Commitment::from_bytes([0u8; 32]),
//!     );
//!     let event = ledger.append_event(submission).await?;
//!     println!("recorded at offset {} as {}", event.offset, event.tx_ref);
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    metrics::Metrics,
    types::{EventSubmission, LedgerEvent, TxRef},
    Config, Error, Result, Storage,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;

/// Longest accepted correlation id, in bytes
pub const MAX_CORRELATION_ID_LEN: usize = 128;

/// Main ledger interface
#[derive(Debug)]
pub struct Ledger {
    /// Actor handle for appends
    handle: LedgerHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new().map_err(|e| Error::Config(e.to_string()))?;

        let handle = spawn_ledger_actor(
            storage.clone(),
            metrics.clone(),
            config.batching.max_batch_size,
            Duration::from_millis(config.batching.batch_timeout_ms),
            config.batching.enabled,
        )?;

        if let Some((offset, _)) = storage.head()? {
            metrics.head_offset.set(offset as i64);
        }

        Ok(Self {
            handle,
            storage,
            metrics,
            config,
        })
    }

    /// Append a submission, returning the sealed event once it is durable
    pub async fn append_event(&self, submission: EventSubmission) -> Result<LedgerEvent> {
        if let Err(e) = self.validate_submission(&submission) {
            self.metrics.record_rejection();
            tracing::warn!(
                correlation_id = %submission.correlation_id,
                error = %e,
                "Rejected ledger submission"
            );
            return Err(e);
        }

        let start = Instant::now();
        let event = self.handle.append(submission).await?;

        self.metrics
            .record_append_duration(start.elapsed().as_secs_f64());
        self.metrics.record_event_append(event.offset);

        tracing::debug!(
            offset = event.offset,
            tx_ref = %event.tx_ref,
            kind = %event.kind,
            correlation_id = %event.correlation_id,
            "Appended ledger event"
        );

        Ok(event)
    }

    /// Events in `from..=to`, oldest first, clamped to the head
    pub fn read_events(&self, from: u64, to: u64) -> Result<Vec<LedgerEvent>> {
        if to < from {
            return Err(Error::InvalidRange { from, to });
        }

        let requested = to - from + 1;
        if requested > self.config.max_read_window {
            return Err(Error::RangeTooLarge {
                requested,
                limit: self.config.max_read_window,
            });
        }

        let head = match self.storage.head()? {
            Some((offset, _)) => offset,
            None => return Ok(Vec::new()),
        };
        if from > head {
            return Ok(Vec::new());
        }

        self.storage.events_in_range(from, to.min(head))
    }

    /// All events recorded under a correlation id, in ledger order
    pub fn events_for(&self, correlation_id: &str) -> Result<Vec<LedgerEvent>> {
        self.storage.correlation_events(correlation_id)
    }

    /// Look up an event by transaction reference
    pub fn event_by_tx_ref(&self, tx_ref: &TxRef) -> Result<LedgerEvent> {
        self.storage.get_event_by_tx_ref(tx_ref)
    }

    /// Offset of the newest durable event
    pub fn latest_offset(&self) -> Result<Option<u64>> {
        Ok(self.storage.head()?.map(|(offset, _)| offset))
    }

    /// Largest range a single read may request
    pub fn max_read_window(&self) -> u64 {
        self.config.max_read_window
    }

    /// Recompute references and links over `from..=to`
    ///
    /// Reads in windows so arbitrarily long spans can be checked.
    pub fn verify_chain(&self, from: u64, to: u64) -> Result<()> {
        if to < from {
            return Err(Error::InvalidRange { from, to });
        }

        let mut prev = if from == 0 {
            None
        } else {
            Some(self.storage.get_event(from - 1)?)
        };

        let window = self.config.max_read_window.max(1);
        let mut start = from;
        while start <= to {
            let end = to.min(start.saturating_add(window - 1));
            let events = self.storage.events_in_range(start, end)?;

            let mut expected = start;
            for event in events {
                if event.offset != expected || !event.verify_link(prev.as_ref()) {
                    return Err(Error::ChainBroken {
                        offset: expected,
                    });
                }
                expected += 1;
                prev = Some(event);
            }

            if expected <= end {
                // Gap in the requested span
                return Err(Error::ChainBroken { offset: expected });
            }

            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }

        Ok(())
    }

    /// Flush batch immediately (for testing/shutdown)
    pub async fn flush_batch(&self) -> Result<()> {
        self.handle.flush_batch().await
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Storage handle (read access for tooling)
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Shutdown ledger
    pub async fn shutdown(&self) -> Result<()> {
        self.handle.shutdown().await
    }

    /// Validate submission invariants
    fn validate_submission(&self, submission: &EventSubmission) -> Result<()> {
        let correlation_id = &submission.correlation_id;

        if correlation_id.is_empty() {
            return Err(Error::InvalidSubmission(
                "Correlation id must not be empty".to_string(),
            ));
        }

        if correlation_id.len() > MAX_CORRELATION_ID_LEN {
            return Err(Error::InvalidSubmission(format!(
                "Correlation id longer than {} bytes",
                MAX_CORRELATION_ID_LEN
            )));
        }

        // NUL separates the id from the offset in the correlation index
        if correlation_id.contains('\0') {
            return Err(Error::InvalidSubmission(
                "Correlation id must not contain NUL".to_string(),
            ));
        }

        if self.config.require_signatures && !submission.verify_signature() {
            return Err(Error::SignatureError(format!(
                "Invalid signature from {}",
                submission.submitter
            )));
        }

        Ok(())
    }
}
