//! Order lifecycle engine
//!
//! ```text
//! PENDING -> PROCESSING -> SHIPPED -> DELIVERED -> COMPLETED
//!    \            \            \           \
//!     +------------+------------+-----------+--> CANCELLED
//! ```
//!
//! Every change is a dual write: the ledger event first, then the order row
//! (plus wallet and stock movements) in one relational transaction.

use crate::commitment::CommitmentPayload;
use crate::context::CoreContext;
use crate::dual_write::DualWrite;
use crate::locks::LockKey;
use crate::store::{Mutation, StoreTx};
use crate::types::{
    Actor, Checkpoint, ItemId, LedgerReceipt, Order, OrderId, OrderStatus, Role, Shipment,
    ShipmentId, UserId,
};
use crate::{Error, Result};
use chrono::Utc;
use rust_decimal::Decimal;

/// Request to place an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    /// Idempotency key; a retry must reuse it
    pub order_id: OrderId,
    /// Item to buy
    pub item_id: ItemId,
    /// Units
    pub quantity: u32,
}

impl OrderRequest {
    /// New request with a fresh order id
    pub fn new(item_id: impl Into<ItemId>, quantity: u32) -> Self {
        Self {
            order_id: OrderId::generate(),
            item_id: item_id.into(),
            quantity,
        }
    }
}

/// Result of a successful order placement
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    /// The new order, pending seller acceptance
    pub order: Order,
    /// Its shipment, at the initial checkpoint
    pub shipment: Shipment,
    /// Ledger receipt of the creation event
    pub receipt: LedgerReceipt,
}

/// Order lifecycle engine
#[derive(Debug, Clone)]
pub struct OrderLifecycle {
    ctx: CoreContext,
}

impl OrderLifecycle {
    /// Create engine
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    /// Place an order for `quantity` units of an item
    ///
    /// Debits the buyer, decrements stock, and creates the order and its
    /// shipment in one transaction after the creation event is on the ledger.
    pub async fn create_order(&self, actor: &Actor, request: OrderRequest) -> Result<PlacedOrder> {
        if actor.role != Role::Buyer {
            return Err(Error::Unauthorized(format!(
                "{} cannot place orders",
                actor.role
            )));
        }
        if request.quantity == 0 {
            return Err(Error::Validation("Quantity must be at least 1".to_string()));
        }

        let _locks = self
            .ctx
            .locks
            .acquire([
                LockKey::order(&request.order_id),
                LockKey::user(&actor.user_id),
                LockKey::item(&request.item_id),
            ])
            .await;

        let store = &self.ctx.store;
        if store.find_order(&request.order_id)?.is_some() {
            return Err(Error::Duplicate(format!("order {}", request.order_id)));
        }

        let buyer = store.user(&actor.user_id)?;
        let item = store.item(&request.item_id)?;

        if item.stock < request.quantity {
            return Err(Error::InsufficientStock {
                item_id: item.id,
                requested: request.quantity,
                available: item.stock,
            });
        }

        let total = item
            .price
            .checked_mul(Decimal::from(request.quantity))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "Total for {} x {} is out of range",
                    request.quantity, item.id
                ))
            })?;
        if buyer.wallet_balance < total {
            return Err(Error::InsufficientFunds {
                user_id: buyer.id,
                required: total,
                available: buyer.wallet_balance,
            });
        }

        let now = Utc::now();
        let mut order = Order {
            id: request.order_id.clone(),
            buyer_id: buyer.id.clone(),
            seller_id: item.seller_id.clone(),
            item_id: item.id.clone(),
            quantity: request.quantity,
            total_amount: total,
            status: OrderStatus::Pending,
            ledger_tx_ref: None,
            payment_collected: false,
            status_updated_by: None,
            created_at: now,
            updated_at: now,
        };
        let shipment = Shipment {
            id: ShipmentId::generate(),
            order_id: order.id.clone(),
            logistics_id: self.ctx.config.default_logistics_id.clone().map(UserId::new),
            checkpoint: Checkpoint::AwaitingSellerAcceptance,
            last_update: now,
            estimated_arrival: None,
            updated_by: None,
            ledger_tx_ref: None,
        };

        let payload = CommitmentPayload::OrderCreated {
            order_id: order.id.clone(),
            amount: total,
            buyer_id: buyer.id.clone(),
        };

        let receipt = DualWrite::new(&self.ctx)
            .execute(&payload, |receipt| {
                let mut order = order.clone();
                order.ledger_tx_ref = Some(receipt.tx_ref);

                StoreTx::new()
                    .with(Mutation::AdjustBalance {
                        user_id: buyer.id.clone(),
                        delta: -total,
                    })
                    .with(Mutation::AdjustStock {
                        item_id: item.id.clone(),
                        delta: -i64::from(request.quantity),
                    })
                    .with(Mutation::InsertOrder(order))
                    .with(Mutation::InsertShipment(shipment.clone()))
            })
            .await?;

        order.ledger_tx_ref = Some(receipt.tx_ref);

        tracing::info!(
            order_id = %order.id,
            buyer_id = %order.buyer_id,
            item_id = %order.item_id,
            total = %total,
            tx_ref = %receipt.tx_ref,
            "Order created"
        );

        Ok(PlacedOrder {
            order,
            shipment,
            receipt,
        })
    }

    /// Move an order along the lifecycle
    ///
    /// Cancellation refunds the buyer and restocks the item in the same
    /// transaction, and is refused once the payment has been collected.
    pub async fn update_status(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<Order> {
        // buyer and item never change, so they can be read before locking
        let snapshot = self.ctx.store.order(order_id)?;

        let _locks = self
            .ctx
            .locks
            .acquire([
                LockKey::order(order_id),
                LockKey::user(&snapshot.buyer_id),
                LockKey::item(&snapshot.item_id),
            ])
            .await;

        let order = self.ctx.store.order(order_id)?;

        if !order.status.can_transition_to(status) {
            return Err(Error::IllegalTransition {
                from: order.status,
                to: status,
            });
        }
        self.authorize(actor, &order, status)?;

        if status == OrderStatus::Cancelled && order.payment_collected {
            return Err(Error::Validation(format!(
                "Order {} cannot be cancelled after payment was collected",
                order.id
            )));
        }

        let payload =
            CommitmentPayload::status_change(order.id.clone(), status, actor.user_id.clone());
        let now = Utc::now();

        let receipt = DualWrite::new(&self.ctx)
            .execute(&payload, |receipt| {
                let mut tx = StoreTx::new().with(Mutation::SetOrderStatus {
                    order_id: order.id.clone(),
                    expected: order.status,
                    status,
                    tx_ref: receipt.tx_ref,
                    actor: actor.user_id.clone(),
                    at: now,
                });

                if status == OrderStatus::Cancelled {
                    tx.push(Mutation::AdjustBalance {
                        user_id: order.buyer_id.clone(),
                        delta: order.total_amount,
                    });
                    tx.push(Mutation::AdjustStock {
                        item_id: order.item_id.clone(),
                        delta: i64::from(order.quantity),
                    });
                }
                tx
            })
            .await?;

        tracing::info!(
            order_id = %order.id,
            from = %order.status,
            to = %status,
            actor = %actor.user_id,
            tx_ref = %receipt.tx_ref,
            "Order status updated"
        );

        Ok(Order {
            status,
            ledger_tx_ref: Some(receipt.tx_ref),
            status_updated_by: Some(actor.user_id.clone()),
            updated_at: now,
            ..order
        })
    }

    /// Order by id
    pub fn order(&self, order_id: &OrderId) -> Result<Order> {
        self.ctx.store.order(order_id)
    }

    /// Orders visible to the actor, newest first
    pub fn orders_for(&self, actor: &Actor) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .ctx
            .store
            .orders()?
            .into_iter()
            .filter(|order| match actor.role {
                Role::Buyer => order.buyer_id == actor.user_id,
                Role::Seller => order.seller_id == actor.user_id,
                Role::Logistics => true,
            })
            .collect();

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// Shipments visible to the actor, most recently updated first
    pub fn shipments_for(&self, actor: &Actor) -> Result<Vec<Shipment>> {
        let visible = match actor.role {
            Role::Logistics => None,
            _ => Some(
                self.orders_for(actor)?
                    .into_iter()
                    .map(|order| order.id)
                    .collect::<std::collections::HashSet<_>>(),
            ),
        };

        let mut shipments: Vec<Shipment> = self
            .ctx
            .store
            .shipments()?
            .into_iter()
            .filter(|shipment| {
                visible
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&shipment.order_id))
            })
            .collect();

        shipments.sort_by(|a, b| b.last_update.cmp(&a.last_update));
        Ok(shipments)
    }

    fn authorize(&self, actor: &Actor, order: &Order, status: OrderStatus) -> Result<()> {
        let is_buyer = actor.role == Role::Buyer && actor.user_id == order.buyer_id;
        let is_seller = actor.role == Role::Seller && actor.user_id == order.seller_id;

        let allowed = match status {
            OrderStatus::Processing => is_seller,
            OrderStatus::Shipped => {
                is_seller || (actor.role == Role::Logistics && self.is_assigned(actor, order)?)
            }
            OrderStatus::Delivered | OrderStatus::Completed => is_buyer,
            OrderStatus::Cancelled => is_buyer || is_seller,
            OrderStatus::Pending => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(Error::Unauthorized(format!(
                "{} {} cannot move order {} to {}",
                actor.role, actor.user_id, order.id, status
            )))
        }
    }

    fn is_assigned(&self, actor: &Actor, order: &Order) -> Result<bool> {
        let shipment = self.ctx.store.shipment_for_order(&order.id)?;
        Ok(shipment
            .logistics_id
            .map_or(true, |assigned| assigned == actor.user_id))
    }
}
