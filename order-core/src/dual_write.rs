//! Ledger-first dual write
//!
//! Every state change that carries business weight is recorded in two places:
//! a ledger event (the tamper-evident commitment) and a relational
//! transaction (the queryable state). The ledger is written first. The
//! relational transaction is built around the ledger receipt and committed
//! only once that receipt exists.
//!
//! ```text
//!   append ──fail──> LedgerUnavailable / LedgerTimeout   (nothing written)
//!     │
//!     ok
//!     │
//!   commit ──fail──> ReconciliationRequired               (ledger only)
//!     │
//!     ok ──> receipt
//! ```

use crate::commitment::CommitmentPayload;
use crate::context::CoreContext;
use crate::store::{Mutation, StoreTx};
use crate::types::LedgerReceipt;
use crate::{Error, Result};

/// One ledger append followed by one relational transaction
#[derive(Debug)]
pub struct DualWrite<'a> {
    ctx: &'a CoreContext,
}

impl<'a> DualWrite<'a> {
    /// Bind to a core context
    pub fn new(ctx: &'a CoreContext) -> Self {
        Self { ctx }
    }

    /// Append `payload`, then commit the transaction built from its receipt
    ///
    /// The caller must hold the entity locks covering every row `build`
    /// touches. A commit failure after a successful append is never retried
    /// here and surfaces as [`Error::ReconciliationRequired`].
    pub async fn execute<F>(&self, payload: &CommitmentPayload, build: F) -> Result<LedgerReceipt>
    where
        F: FnOnce(&LedgerReceipt) -> StoreTx,
    {
        let receipt = self.ctx.gateway.append(payload).await?;

        let tx = build(&receipt).with(Mutation::RecordReceipt(receipt.clone()));

        match self.ctx.store.commit(tx) {
            Ok(()) => {
                self.ctx.metrics.record_dual_write(receipt.kind.as_str());
                tracing::debug!(
                    correlation_id = %receipt.correlation_id,
                    tx_ref = %receipt.tx_ref,
                    "Dual write committed"
                );
                Ok(receipt)
            }
            Err(e) => {
                self.ctx.metrics.reconciliation_required.inc();
                tracing::error!(
                    correlation_id = %receipt.correlation_id,
                    tx_ref = %receipt.tx_ref,
                    kind = %receipt.kind,
                    error = %e,
                    "Relational write failed after ledger append, reconciliation required"
                );
                Err(Error::ReconciliationRequired {
                    correlation_id: receipt.correlation_id,
                    tx_ref: receipt.tx_ref,
                    reason: e.to_string(),
                })
            }
        }
    }
}
