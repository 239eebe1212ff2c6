//! Main settlement engine

use crate::{Error, Result};
use chrono::Utc;
use order_core::{
    Actor, CommitmentPayload, CoreContext, DualWrite, LedgerReceipt, LockKey, Mutation, Order,
    OrderId, Role, StoreTx,
};
use rust_decimal::Decimal;
use serde::Serialize;

/// Result of a successful collection
#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    /// Order, now flagged as collected
    pub order: Order,
    /// Seller balance after the credit
    pub seller_balance: Decimal,
    /// Ledger receipt of the release event
    pub receipt: LedgerReceipt,
}

/// Settlement engine
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    ctx: CoreContext,
}

impl SettlementEngine {
    /// Create new settlement engine
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    /// Release an order's total to its seller
    ///
    /// Rejected without touching the ledger unless the actor is the order's
    /// seller, the order is delivered or completed, and the payment is still
    /// uncollected.
    pub async fn collect_payment(&self, actor: &Actor, order_id: &OrderId) -> Result<Collection> {
        if actor.role != Role::Seller {
            return Err(order_core::Error::Unauthorized(format!(
                "{} cannot collect payments",
                actor.role
            ))
            .into());
        }

        let snapshot = self.ctx.store.order(order_id)?;
        let _locks = self
            .ctx
            .locks
            .acquire([LockKey::order(order_id), LockKey::user(&snapshot.seller_id)])
            .await;

        let order = self.ctx.store.order(order_id)?;

        if order.seller_id != actor.user_id {
            return Err(order_core::Error::Unauthorized(format!(
                "{} is not the seller of order {}",
                actor.user_id, order.id
            ))
            .into());
        }
        if order.payment_collected {
            return Err(order_core::Error::Validation(format!(
                "Payment for order {} was already collected",
                order.id
            ))
            .into());
        }
        if !order.status.allows_collection() {
            return Err(order_core::Error::Validation(format!(
                "Order {} is {}; payment is released after delivery",
                order.id, order.status
            ))
            .into());
        }

        let payload = CommitmentPayload::PaymentReleased {
            order_id: order.id.clone(),
            amount: order.total_amount,
            seller_id: order.seller_id.clone(),
        };
        let now = Utc::now();

        let receipt = DualWrite::new(&self.ctx)
            .execute(&payload, |receipt| {
                StoreTx::new()
                    .with(Mutation::AdjustBalance {
                        user_id: order.seller_id.clone(),
                        delta: order.total_amount,
                    })
                    .with(Mutation::MarkPaymentCollected {
                        order_id: order.id.clone(),
                        tx_ref: receipt.tx_ref,
                        at: now,
                    })
            })
            .await
            .map_err(|e| match e {
                order_core::Error::ReconciliationRequired { tx_ref, reason, .. } => {
                    tracing::error!(
                        order_id = %order.id,
                        tx_ref = %tx_ref,
                        amount = %order.total_amount,
                        "Payment released on ledger but not credited, fund recovery required"
                    );
                    Error::FundRecovery {
                        order_id: order.id.clone(),
                        tx_ref,
                        amount: order.total_amount,
                        reason,
                    }
                }
                other => Error::Core(other),
            })?;

        let seller_balance = self.ctx.store.user(&order.seller_id)?.wallet_balance;

        tracing::info!(
            order_id = %order.id,
            seller_id = %order.seller_id,
            amount = %order.total_amount,
            tx_ref = %receipt.tx_ref,
            "Payment collected"
        );

        Ok(Collection {
            order: Order {
                payment_collected: true,
                ledger_tx_ref: Some(receipt.tx_ref),
                updated_at: now,
                ..order
            },
            seller_balance,
            receipt,
        })
    }

    /// Delivered or completed orders of this seller still awaiting collection
    pub fn pending_collections(&self, actor: &Actor) -> Result<Vec<Order>> {
        if actor.role != Role::Seller {
            return Err(order_core::Error::Unauthorized(format!(
                "{} has no collections",
                actor.role
            ))
            .into());
        }

        let mut orders: Vec<Order> = self
            .ctx
            .store
            .orders()?
            .into_iter()
            .filter(|order| {
                order.seller_id == actor.user_id
                    && order.status.allows_collection()
                    && !order.payment_collected
            })
            .collect();

        orders.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(orders)
    }
}
