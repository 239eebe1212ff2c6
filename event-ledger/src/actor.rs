//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One logical writer task assigns offsets and links the hash chain
//! - Batching amortizes fsync cost across concurrent submitters
//! - A submitter is answered only after its batch is durable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends submissions to actor mailbox           │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │ Pending: Vec<(LedgerEvent, responder)>        │  │
//! │  │ Timer: 10ms or 100 events → flush_batch()     │  │
//! │  └────────────────────────────────────────────────┘  │
//! │                       │                               │
//! │                       ▼                               │
//! │           Storage::append_batch()                     │
//! │          (atomic write to RocksDB)                    │
//! │                       │                               │
//! │                       ▼                               │
//! │            receipts sent to submitters                │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::metrics::Metrics;
use crate::types::{EventSubmission, LedgerEvent, TxRef};
use crate::{Error, Result, Storage};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Append a validated submission
    Append {
        /// Submission to seal and append
        submission: EventSubmission,
        /// Receives the sealed event once durable
        response: oneshot::Sender<Result<LedgerEvent>>,
    },

    /// Flush pending batch immediately
    FlushBatch {
        /// Flush outcome
        response: oneshot::Sender<Result<()>>,
    },

    /// Shutdown actor
    Shutdown,
}

type Pending = (LedgerEvent, oneshot::Sender<Result<LedgerEvent>>);

/// Actor that owns the write side of the ledger
pub struct LedgerActor {
    storage: Arc<Storage>,
    mailbox: mpsc::Receiver<LedgerMessage>,
    metrics: Metrics,

    /// Last event written to disk
    durable_head: Option<(u64, TxRef)>,

    /// Last event sealed (durable or pending)
    tail: Option<(u64, TxRef)>,

    pending: Vec<Pending>,
    max_batch_size: usize,
    batch_timeout: Duration,
    batching_enabled: bool,
}

impl std::fmt::Debug for LedgerActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerActor")
            .field("durable_head", &self.durable_head)
            .field("pending", &self.pending.len())
            .field("batching_enabled", &self.batching_enabled)
            .finish()
    }
}

impl LedgerActor {
    /// Create new actor, resuming from the storage head
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<LedgerMessage>,
        metrics: Metrics,
        max_batch_size: usize,
        batch_timeout: Duration,
        batching_enabled: bool,
    ) -> Result<Self> {
        let durable_head = storage.head()?;

        Ok(Self {
            storage,
            mailbox,
            metrics,
            durable_head,
            tail: durable_head,
            pending: Vec::with_capacity(max_batch_size),
            max_batch_size: max_batch_size.max(1),
            batch_timeout,
            batching_enabled,
        })
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let mut batch_timer = interval(self.batch_timeout);
        batch_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(msg) = self.mailbox.recv() => {
                    match msg {
                        LedgerMessage::Shutdown => {
                            let _ = self.flush_batch();
                            break;
                        }
                        LedgerMessage::Append { submission, response } => {
                            self.seal(submission, response);

                            if !self.batching_enabled || self.pending.len() >= self.max_batch_size {
                                let _ = self.flush_batch();
                            }
                        }
                        LedgerMessage::FlushBatch { response } => {
                            let result = self.flush_batch();
                            let _ = response.send(result);
                        }
                    }
                }

                // Batch timeout expired
                _ = batch_timer.tick(), if self.batching_enabled && !self.pending.is_empty() => {
                    let _ = self.flush_batch();
                }

                // Mailbox closed
                else => {
                    let _ = self.flush_batch();
                    break;
                }
            }
        }

        tracing::info!(head = ?self.durable_head.map(|(offset, _)| offset), "Ledger actor stopped");
    }

    /// Assign offset and reference, then queue for the next flush
    fn seal(&mut self, submission: EventSubmission, response: oneshot::Sender<Result<LedgerEvent>>) {
        let (offset, prev) = match self.tail {
            Some((offset, tx_ref)) => (offset + 1, tx_ref),
            None => (0, TxRef::ZERO),
        };

        let event = LedgerEvent::seal(offset, prev, Utc::now(), submission);
        self.tail = Some((event.offset, event.tx_ref));
        self.pending.push((event, response));
    }

    /// Write pending events and answer their submitters
    fn flush_batch(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let batch: Vec<Pending> = self.pending.drain(..).collect();
        let events: Vec<LedgerEvent> = batch.iter().map(|(event, _)| event.clone()).collect();

        tracing::debug!("Flushing batch of {} events", events.len());

        match self.storage.append_batch(&events) {
            Ok(()) => {
                self.durable_head = self.tail;
                self.metrics.record_batch_flush(events.len());
                for (event, response) in batch {
                    let _ = response.send(Ok(event));
                }
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(error = %message, "Failed to flush ledger batch");

                // Nothing from this batch is on disk; resume the chain from the durable head
                self.tail = self.durable_head;
                for (_, response) in batch {
                    let _ = response.send(Err(Error::Storage(message.clone())));
                }
                Err(Error::Storage(message))
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Append a submission, resolving once it is durable
    pub async fn append(&self, submission: EventSubmission) -> Result<LedgerEvent> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Append {
                submission,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Flush batch immediately
    pub async fn flush_batch(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::FlushBatch { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    storage: Arc<Storage>,
    metrics: Metrics,
    max_batch_size: usize,
    batch_timeout: Duration,
    batching_enabled: bool,
) -> Result<LedgerHandle> {
    let (tx, rx) = mpsc::channel(1000); // Bounded channel for backpressure
    let actor = LedgerActor::new(
        storage,
        rx,
        metrics,
        max_batch_size,
        batch_timeout,
        batching_enabled,
    )?;

    tokio::spawn(async move {
        actor.run().await;
    });

    Ok(LedgerHandle::new(tx))
}
