//! Shipment checkpoint engine
//!
//! Shipments move strictly forward through [`Checkpoint::ALL`]. The first
//! advance out of `Awaiting Seller Acceptance` also marks a processing order
//! as shipped and sets the arrival estimate.

use crate::commitment::CommitmentPayload;
use crate::context::CoreContext;
use crate::dual_write::DualWrite;
use crate::locks::LockKey;
use crate::store::{Mutation, StoreTx};
use crate::types::{Actor, Checkpoint, OrderStatus, Role, Shipment, ShipmentId};
use crate::{Error, Result};
use chrono::{Duration, Utc};

/// Shipment checkpoint engine
#[derive(Debug, Clone)]
pub struct CheckpointEngine {
    ctx: CoreContext,
}

impl CheckpointEngine {
    /// Create engine
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    /// Advance a shipment to `target`
    ///
    /// Forward skips are allowed; moving to the current or an earlier
    /// checkpoint is a [`Error::CheckpointRegression`].
    pub async fn advance_checkpoint(
        &self,
        actor: &Actor,
        shipment_id: &ShipmentId,
        target: Checkpoint,
    ) -> Result<Shipment> {
        if actor.role != Role::Logistics {
            return Err(Error::Unauthorized(format!(
                "{} cannot update shipments",
                actor.role
            )));
        }

        let snapshot = self.ctx.store.shipment(shipment_id)?;
        let _locks = self
            .ctx
            .locks
            .acquire([
                LockKey::shipment(shipment_id),
                LockKey::order(&snapshot.order_id),
            ])
            .await;

        let shipment = self.ctx.store.shipment(shipment_id)?;
        let order = self.ctx.store.order(&shipment.order_id)?;

        if let Some(assigned) = &shipment.logistics_id {
            if *assigned != actor.user_id {
                return Err(Error::Unauthorized(format!(
                    "shipment {} is assigned to {}",
                    shipment.id, assigned
                )));
            }
        }

        match order.status {
            OrderStatus::Pending => return Err(Error::ApprovalPending(order.id)),
            OrderStatus::Cancelled => {
                return Err(Error::Validation(format!(
                    "Order {} is cancelled",
                    order.id
                )))
            }
            _ => {}
        }

        if shipment.checkpoint.is_final() {
            return Err(Error::Validation(format!(
                "Shipment {} is already '{}'",
                shipment.id, shipment.checkpoint
            )));
        }
        if target.index() <= shipment.checkpoint.index() {
            return Err(Error::CheckpointRegression {
                current: shipment.checkpoint,
                target,
            });
        }

        let payload = CommitmentPayload::CheckpointUpdate {
            shipment_id: shipment.id.clone(),
            checkpoint: target,
            updater: actor.user_id.clone(),
        };

        let now = Utc::now();
        let estimated_arrival = shipment
            .estimated_arrival
            .or_else(|| Some(now + Duration::hours(self.ctx.config.estimated_transit_hours)));

        let receipt = DualWrite::new(&self.ctx)
            .execute(&payload, |receipt| {
                StoreTx::new()
                    .with(Mutation::AdvanceCheckpoint {
                        shipment_id: shipment.id.clone(),
                        expected: shipment.checkpoint,
                        target,
                        actor: actor.user_id.clone(),
                        tx_ref: receipt.tx_ref,
                        at: now,
                        estimated_arrival,
                    })
                    .with(Mutation::AdvanceOrderToShipped {
                        order_id: order.id.clone(),
                        tx_ref: receipt.tx_ref,
                        actor: actor.user_id.clone(),
                        at: now,
                    })
            })
            .await?;

        tracing::info!(
            shipment_id = %shipment.id,
            order_id = %order.id,
            from = %shipment.checkpoint,
            to = %target,
            tx_ref = %receipt.tx_ref,
            "Shipment checkpoint advanced"
        );

        Ok(Shipment {
            checkpoint: target,
            last_update: now,
            estimated_arrival,
            updated_by: Some(actor.user_id.clone()),
            ledger_tx_ref: Some(receipt.tx_ref),
            ..shipment
        })
    }

    /// Shipment by id
    pub fn shipment(&self, shipment_id: &ShipmentId) -> Result<Shipment> {
        self.ctx.store.shipment(shipment_id)
    }
}
