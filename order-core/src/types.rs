//! Core domain types for orders, shipments and wallets
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money)
//! - Prefixed string ids that read well in logs and on the ledger

use chrono::{DateTime, Utc};
use event_ledger::{Commitment, EventKind, LedgerEvent, TxRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Prefix of generated ids
            pub const PREFIX: &'static str = $prefix;

            /// Wrap an existing id
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Fresh time-ordered id
            pub fn generate() -> Self {
                Self(format!("{}{}", $prefix, Uuid::now_v7().simple()))
            }

            /// Get as string
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// User identifier
    UserId,
    "usr_"
);

entity_id!(
    /// Catalog item identifier
    ItemId,
    "itm_"
);

entity_id!(
    /// Order identifier (also the ledger correlation id for order events)
    OrderId,
    "ord_"
);

entity_id!(
    /// Shipment identifier (ledger correlation id for checkpoint events)
    ShipmentId,
    "shp_"
);

/// Marketplace role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Places orders and confirms delivery
    Buyer,
    /// Lists items, accepts orders, collects payment
    Seller,
    /// Moves shipments through checkpoints
    Logistics,
}

impl Role {
    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
            Role::Logistics => "logistics",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated caller, supplied by the authentication collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Verified user id
    pub user_id: UserId,
    /// Verified role
    pub role: Role,
}

impl Actor {
    /// Create new actor
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Actor for a stored user
    pub fn of(user: &User) -> Self {
        Self::new(user.id.clone(), user.role)
    }
}

/// Registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User id
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Unique email (stored lowercase)
    pub email: String,
    /// Role
    pub role: Role,
    /// Postal address
    pub address: String,
    /// Wallet balance, never negative
    pub wallet_balance: Decimal,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

/// Catalog item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Item id
    pub id: ItemId,
    /// Owning seller
    pub seller_id: UserId,
    /// Name
    pub name: String,
    /// Description
    pub description: String,
    /// Unit price, never negative
    pub price: Decimal,
    /// Units in stock
    pub stock: u32,
    /// Listing time
    pub created_at: DateTime<Utc>,
}

/// Order lifecycle status
///
/// ```text
/// PENDING -> PROCESSING -> SHIPPED -> DELIVERED -> COMPLETED
///    \___________\____________\___________\______-> CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Placed, awaiting seller acceptance
    Pending,
    /// Accepted by the seller
    Processing,
    /// In transit
    Shipped,
    /// Receipt confirmed by the buyer
    Delivered,
    /// Closed by the buyer (terminal)
    Completed,
    /// Cancelled (terminal)
    Cancelled,
}

impl OrderStatus {
    /// Canonical name (committed to the ledger)
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Whether `self -> next` is an edge of the lifecycle
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        match (self, next) {
            (Pending, Processing) => true,
            (Processing, Shipped) => true,
            (Shipped, Delivered) => true,
            (Delivered, Completed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Payment may be collected in these states
    pub fn allows_collection(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            _ => Err(crate::Error::Validation(format!("Unknown order status: {}", s))),
        }
    }
}

/// Shipment checkpoint, in route order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Checkpoint {
    /// Created with the order; seller has not accepted yet
    AwaitingSellerAcceptance,
    /// Regional hub
    LogisticsHub,
    /// Transit center
    TransitCenter,
    /// Local delivery station
    DeliveryStation,
    /// Last leg (terminal)
    OutForDelivery,
}

impl Checkpoint {
    /// Every checkpoint, in sequence order
    pub const ALL: [Checkpoint; 5] = [
        Checkpoint::AwaitingSellerAcceptance,
        Checkpoint::LogisticsHub,
        Checkpoint::TransitCenter,
        Checkpoint::DeliveryStation,
        Checkpoint::OutForDelivery,
    ];

    /// Position in the route
    pub fn index(&self) -> usize {
        match self {
            Checkpoint::AwaitingSellerAcceptance => 0,
            Checkpoint::LogisticsHub => 1,
            Checkpoint::TransitCenter => 2,
            Checkpoint::DeliveryStation => 3,
            Checkpoint::OutForDelivery => 4,
        }
    }

    /// Location label (committed to the ledger)
    pub fn label(&self) -> &'static str {
        match self {
            Checkpoint::AwaitingSellerAcceptance => "Awaiting Seller Acceptance",
            Checkpoint::LogisticsHub => "Logistics Hub - Kuala Lumpur",
            Checkpoint::TransitCenter => "Transit Center - Johor Bahru",
            Checkpoint::DeliveryStation => "Delivery Station - Penang",
            Checkpoint::OutForDelivery => "Out for Delivery",
        }
    }

    /// The final checkpoint ends the route
    pub fn is_final(&self) -> bool {
        matches!(self, Checkpoint::OutForDelivery)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Checkpoint {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let wanted = s.trim();
        Checkpoint::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| crate::Error::Validation(format!("Unknown checkpoint: {}", s)))
    }
}

/// Order row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order id
    pub id: OrderId,
    /// Purchasing buyer
    pub buyer_id: UserId,
    /// Seller of the item at purchase time
    pub seller_id: UserId,
    /// Purchased item
    pub item_id: ItemId,
    /// Units purchased
    pub quantity: u32,
    /// Price times quantity at purchase time
    pub total_amount: Decimal,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Reference of the latest ledger event applied to this row
    pub ledger_tx_ref: Option<TxRef>,
    /// Set once when the seller collects
    pub payment_collected: bool,
    /// Who made the latest status change
    pub status_updated_by: Option<UserId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Shipment row (1:1 with its order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    /// Shipment id
    pub id: ShipmentId,
    /// Parent order
    pub order_id: OrderId,
    /// Assigned logistics provider
    pub logistics_id: Option<UserId>,
    /// Current checkpoint
    pub checkpoint: Checkpoint,
    /// Last checkpoint change
    pub last_update: DateTime<Utc>,
    /// Set once the shipment starts moving
    pub estimated_arrival: Option<DateTime<Utc>>,
    /// Who made the latest checkpoint change
    pub updated_by: Option<UserId>,
    /// Reference of the latest checkpoint event
    pub ledger_tx_ref: Option<TxRef>,
}

/// Wallet adjustment direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Add funds
    Deposit,
    /// Remove funds
    Withdraw,
}

/// Proof that an event is durable on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Ledger-assigned reference
    pub tx_ref: TxRef,
    /// Position in the ledger
    pub offset: u64,
    /// Entity the event describes
    pub correlation_id: String,
    /// Event kind
    pub kind: EventKind,
    /// Committed hash
    pub commitment: Commitment,
    /// Ledger-assigned timestamp
    pub recorded_at: DateTime<Utc>,
}

impl From<&LedgerEvent> for LedgerReceipt {
    fn from(event: &LedgerEvent) -> Self {
        Self {
            tx_ref: event.tx_ref,
            offset: event.offset,
            correlation_id: event.correlation_id.clone(),
            kind: event.kind,
            commitment: event.commitment,
            recorded_at: event.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_prefixed_and_unique() {
        let a = OrderId::generate();
        let b = OrderId::generate();
        assert!(a.as_str().starts_with("ord_"));
        assert!(ShipmentId::generate().as_str().starts_with("shp_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_lifecycle_edges() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Delivered.can_transition_to(Completed));

        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Delivered.can_transition_to(Processing));
        assert!(!Shipped.can_transition_to(Shipped));

        for from in [Pending, Processing, Shipped, Delivered] {
            assert!(from.can_transition_to(Cancelled));
        }
        for next in [Pending, Processing, Shipped, Delivered, Completed, Cancelled] {
            assert!(!Completed.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn test_checkpoint_order_and_labels() {
        for (i, checkpoint) in Checkpoint::ALL.iter().enumerate() {
            assert_eq!(checkpoint.index(), i);
            assert_eq!(checkpoint.label().parse::<Checkpoint>().unwrap(), *checkpoint);
        }
        assert!(Checkpoint::OutForDelivery.is_final());
        assert!(Checkpoint::TransitCenter < Checkpoint::OutForDelivery);
        assert!("transit center - johor bahru".parse::<Checkpoint>().is_ok());
        assert!("Moon Base".parse::<Checkpoint>().is_err());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("delivered".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert!("LOST".parse::<OrderStatus>().is_err());
    }
}
