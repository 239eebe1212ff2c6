//! Relational state store using RocksDB
//!
//! The mutable system of record for users, items, orders and shipments.
//!
//! # Column Families
//!
//! - `users` - User rows (key: user id)
//! - `user_emails` - Lowercased email to user id (uniqueness index)
//! - `items` - Catalog items (key: item id)
//! - `orders` - Order rows (key: order id)
//! - `shipments` - Shipment rows (key: shipment id)
//! - `order_shipments` - Order id to shipment id (1:1 index)
//! - `receipts` - Ledger receipts written alongside dual writes (key: tx ref)
//!
//! # Transactions
//!
//! Every write goes through [`StateStore::commit`]. A [`StoreTx`] is a list of
//! guarded [`Mutation`]s. Commit takes the writer lock, replays the mutations
//! against current rows, re-checking every guard, and writes all touched rows
//! in one atomic `WriteBatch`. If any guard fails nothing is written.

use crate::types::{
    Checkpoint, Item, ItemId, LedgerReceipt, Order, OrderId, OrderStatus, Shipment, ShipmentId,
    User, UserId,
};
use crate::{Config, Error, Result};
use chrono::{DateTime, Utc};
use event_ledger::TxRef;
use parking_lot::Mutex;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, WriteOptions, DB,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Column family names
const CF_USERS: &str = "users";
const CF_USER_EMAILS: &str = "user_emails";
const CF_ITEMS: &str = "items";
const CF_ORDERS: &str = "orders";
const CF_SHIPMENTS: &str = "shipments";
const CF_ORDER_SHIPMENTS: &str = "order_shipments";
const CF_RECEIPTS: &str = "receipts";

const ALL_CFS: [&str; 7] = [
    CF_USERS,
    CF_USER_EMAILS,
    CF_ITEMS,
    CF_ORDERS,
    CF_SHIPMENTS,
    CF_ORDER_SHIPMENTS,
    CF_RECEIPTS,
];

/// One guarded row change
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Insert a user; id and email must be new
    InsertUser(User),

    /// Change name and/or address
    UpdateProfile {
        /// User
        user_id: UserId,
        /// New name
        name: Option<String>,
        /// New address
        address: Option<String>,
    },

    /// Atomic balance delta; the result must not be negative
    AdjustBalance {
        /// Wallet owner
        user_id: UserId,
        /// Signed amount
        delta: Decimal,
    },

    /// Insert an item; id must be new
    InsertItem(Item),

    /// Replace an item; the seller must not change
    UpdateItem(Item),

    /// Atomic stock delta; the result must not be negative
    AdjustStock {
        /// Item
        item_id: ItemId,
        /// Signed units
        delta: i64,
    },

    /// Insert an order; id must be new
    InsertOrder(Order),

    /// Insert a shipment; id must be new and the order must have none
    InsertShipment(Shipment),

    /// Compare-and-set the order status along a lifecycle edge
    SetOrderStatus {
        /// Order
        order_id: OrderId,
        /// Status the caller validated against
        expected: OrderStatus,
        /// New status
        status: OrderStatus,
        /// Ledger event recording the change
        tx_ref: TxRef,
        /// Acting user
        actor: UserId,
        /// Change time
        at: DateTime<Utc>,
    },

    /// Move the order to shipped unless it is pending or already past shipping
    AdvanceOrderToShipped {
        /// Order
        order_id: OrderId,
        /// Ledger event of the checkpoint change
        tx_ref: TxRef,
        /// Acting user
        actor: UserId,
        /// Change time
        at: DateTime<Utc>,
    },

    /// Compare-and-set the checkpoint, strictly forward
    AdvanceCheckpoint {
        /// Shipment
        shipment_id: ShipmentId,
        /// Checkpoint the caller validated against
        expected: Checkpoint,
        /// New checkpoint
        target: Checkpoint,
        /// Acting user
        actor: UserId,
        /// Ledger event recording the change
        tx_ref: TxRef,
        /// Change time
        at: DateTime<Utc>,
        /// Arrival estimate, applied if none is set yet
        estimated_arrival: Option<DateTime<Utc>>,
    },

    /// Set `payment_collected`; only once, only when delivered or completed
    MarkPaymentCollected {
        /// Order
        order_id: OrderId,
        /// Ledger event releasing the payment
        tx_ref: TxRef,
        /// Change time
        at: DateTime<Utc>,
    },

    /// Store the receipt of the ledger event this transaction applies
    RecordReceipt(LedgerReceipt),
}

/// Atomic unit of relational change
#[derive(Debug, Clone, Default)]
pub struct StoreTx {
    mutations: Vec<Mutation>,
}

impl StoreTx {
    /// Empty transaction
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mutation (builder style)
    pub fn with(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    /// Append a mutation
    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// Mutations in application order
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Number of mutations
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Whether the transaction is empty
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Relational state store
pub struct StateStore {
    db: Arc<DB>,
    write_lock: Mutex<()>,
    sync_writes: bool,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl StateStore {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.store.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.store.max_background_jobs);

        let cf_descriptors = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened state store");

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
            sync_writes: config.store.sync_writes,
        })
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    fn get<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let handle = self.cf_handle(cf)?;
        match self.db.get_cf(handle, key)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn contains(&self, cf: &str, key: &[u8]) -> Result<bool> {
        let handle = self.cf_handle(cf)?;
        Ok(self.db.get_pinned_cf(handle, key)?.is_some())
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let handle = self.cf_handle(cf)?;

        let mut rows = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (_, value) = item?;
            rows.push(bincode::deserialize(&value)?);
        }
        Ok(rows)
    }

    // Users

    /// User by id, if present
    pub fn find_user(&self, id: &UserId) -> Result<Option<User>> {
        self.get(CF_USERS, id.as_str().as_bytes())
    }

    /// User by id
    pub fn user(&self, id: &UserId) -> Result<User> {
        self.find_user(id)?
            .ok_or_else(|| Error::not_found("user", id))
    }

    /// User by email (case-insensitive)
    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let id: Option<UserId> = self.get(CF_USER_EMAILS, normalize_email(email).as_bytes())?;
        match id {
            Some(id) => self.find_user(&id),
            None => Ok(None),
        }
    }

    /// All users
    pub fn users(&self) -> Result<Vec<User>> {
        self.scan(CF_USERS)
    }

    // Items

    /// Item by id, if present
    pub fn find_item(&self, id: &ItemId) -> Result<Option<Item>> {
        self.get(CF_ITEMS, id.as_str().as_bytes())
    }

    /// Item by id
    pub fn item(&self, id: &ItemId) -> Result<Item> {
        self.find_item(id)?
            .ok_or_else(|| Error::not_found("item", id))
    }

    /// All items
    pub fn items(&self) -> Result<Vec<Item>> {
        self.scan(CF_ITEMS)
    }

    // Orders

    /// Order by id, if present
    pub fn find_order(&self, id: &OrderId) -> Result<Option<Order>> {
        self.get(CF_ORDERS, id.as_str().as_bytes())
    }

    /// Order by id
    pub fn order(&self, id: &OrderId) -> Result<Order> {
        self.find_order(id)?
            .ok_or_else(|| Error::not_found("order", id))
    }

    /// All orders
    pub fn orders(&self) -> Result<Vec<Order>> {
        self.scan(CF_ORDERS)
    }

    // Shipments

    /// Shipment by id, if present
    pub fn find_shipment(&self, id: &ShipmentId) -> Result<Option<Shipment>> {
        self.get(CF_SHIPMENTS, id.as_str().as_bytes())
    }

    /// Shipment by id
    pub fn shipment(&self, id: &ShipmentId) -> Result<Shipment> {
        self.find_shipment(id)?
            .ok_or_else(|| Error::not_found("shipment", id))
    }

    /// Shipment belonging to an order
    pub fn shipment_for_order(&self, order_id: &OrderId) -> Result<Shipment> {
        let id: Option<ShipmentId> = self.get(CF_ORDER_SHIPMENTS, order_id.as_str().as_bytes())?;
        let id = id.ok_or_else(|| Error::not_found("shipment for order", order_id))?;
        self.shipment(&id)
    }

    /// All shipments
    pub fn shipments(&self) -> Result<Vec<Shipment>> {
        self.scan(CF_SHIPMENTS)
    }

    // Receipts

    /// Receipt stored for a ledger event, if any
    pub fn receipt(&self, tx_ref: &TxRef) -> Result<Option<LedgerReceipt>> {
        self.get(CF_RECEIPTS, tx_ref.as_bytes())
    }

    /// All receipts
    pub fn receipts(&self) -> Result<Vec<LedgerReceipt>> {
        self.scan(CF_RECEIPTS)
    }

    // Transactions

    /// Apply a transaction atomically
    ///
    /// Returns [`Error::Conflict`] (or the first guard's error) and writes
    /// nothing if any mutation's guard fails.
    pub fn commit(&self, tx: StoreTx) -> Result<()> {
        if tx.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock();

        let mut staged = Staged::default();
        for mutation in tx.mutations {
            staged.apply(self, mutation)?;
        }

        self.write_staged(staged)
    }

    fn write_staged(&self, staged: Staged) -> Result<()> {
        let cf_users = self.cf_handle(CF_USERS)?;
        let cf_emails = self.cf_handle(CF_USER_EMAILS)?;
        let cf_items = self.cf_handle(CF_ITEMS)?;
        let cf_orders = self.cf_handle(CF_ORDERS)?;
        let cf_shipments = self.cf_handle(CF_SHIPMENTS)?;
        let cf_order_shipments = self.cf_handle(CF_ORDER_SHIPMENTS)?;
        let cf_receipts = self.cf_handle(CF_RECEIPTS)?;

        let mut batch = WriteBatch::default();

        for (id, user) in &staged.users {
            batch.put_cf(cf_users, id.as_str(), bincode::serialize(user)?);
        }
        for (email, id) in &staged.emails {
            batch.put_cf(cf_emails, email, bincode::serialize(id)?);
        }
        for (id, item) in &staged.items {
            batch.put_cf(cf_items, id.as_str(), bincode::serialize(item)?);
        }
        for (id, order) in &staged.orders {
            batch.put_cf(cf_orders, id.as_str(), bincode::serialize(order)?);
        }
        for (id, shipment) in &staged.shipments {
            batch.put_cf(cf_shipments, id.as_str(), bincode::serialize(shipment)?);
        }
        for (order_id, shipment_id) in &staged.order_shipments {
            batch.put_cf(
                cf_order_shipments,
                order_id.as_str(),
                bincode::serialize(shipment_id)?,
            );
        }
        for receipt in &staged.receipts {
            batch.put_cf(cf_receipts, receipt.tx_ref.as_bytes(), bincode::serialize(receipt)?);
        }

        let rows = batch.len();
        self.db.write_opt(batch, &self.write_options())?;

        tracing::debug!(rows, "State transaction committed");
        Ok(())
    }
}

/// Rows touched by a transaction, as they will be written
#[derive(Default)]
struct Staged {
    users: HashMap<UserId, User>,
    emails: HashMap<String, UserId>,
    items: HashMap<ItemId, Item>,
    orders: HashMap<OrderId, Order>,
    shipments: HashMap<ShipmentId, Shipment>,
    order_shipments: HashMap<OrderId, ShipmentId>,
    receipts: Vec<LedgerReceipt>,
}

/// Staged row, loading it from the store on first touch
fn load<'a, K, V>(
    rows: &'a mut HashMap<K, V>,
    key: &K,
    fetch: impl FnOnce() -> Result<V>,
) -> Result<&'a mut V>
where
    K: Eq + Hash + Clone,
{
    match rows.entry(key.clone()) {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => Ok(entry.insert(fetch()?)),
    }
}

impl Staged {
    fn apply(&mut self, store: &StateStore, mutation: Mutation) -> Result<()> {
        match mutation {
            Mutation::InsertUser(user) => {
                let email = normalize_email(&user.email);
                if self.users.contains_key(&user.id) || store.find_user(&user.id)?.is_some() {
                    return Err(Error::Duplicate(format!("user {}", user.id)));
                }
                if self.emails.contains_key(&email)
                    || store.contains(CF_USER_EMAILS, email.as_bytes())?
                {
                    return Err(Error::Duplicate(format!("email {}", email)));
                }
                self.emails.insert(email.clone(), user.id.clone());
                self.users.insert(user.id.clone(), User { email, ..user });
            }

            Mutation::UpdateProfile {
                user_id,
                name,
                address,
            } => {
                let user = load(&mut self.users, &user_id, || store.user(&user_id))?;
                if let Some(name) = name {
                    user.name = name;
                }
                if let Some(address) = address {
                    user.address = address;
                }
            }

            Mutation::AdjustBalance { user_id, delta } => {
                let user = load(&mut self.users, &user_id, || store.user(&user_id))?;
                let balance = user.wallet_balance.checked_add(delta).ok_or_else(|| {
                    Error::Conflict(format!("balance of {} would overflow", user_id))
                })?;
                if balance < Decimal::ZERO {
                    return Err(Error::Conflict(format!(
                        "balance of {} would become {}",
                        user_id, balance
                    )));
                }
                user.wallet_balance = balance;
            }

            Mutation::InsertItem(item) => {
                if self.items.contains_key(&item.id) || store.find_item(&item.id)?.is_some() {
                    return Err(Error::Duplicate(format!("item {}", item.id)));
                }
                self.items.insert(item.id.clone(), item);
            }

            Mutation::UpdateItem(item) => {
                let current = load(&mut self.items, &item.id, || store.item(&item.id))?;
                if current.seller_id != item.seller_id {
                    return Err(Error::Conflict(format!(
                        "item {} belongs to {}",
                        item.id, current.seller_id
                    )));
                }
                *current = item;
            }

            Mutation::AdjustStock { item_id, delta } => {
                let item = load(&mut self.items, &item_id, || store.item(&item_id))?;
                let stock = i64::from(item.stock) + delta;
                if stock < 0 {
                    return Err(Error::Conflict(format!(
                        "stock of {} would become {}",
                        item_id, stock
                    )));
                }
                item.stock = u32::try_from(stock).map_err(|_| {
                    Error::Conflict(format!("stock of {} would overflow", item_id))
                })?;
            }

            Mutation::InsertOrder(order) => {
                if self.orders.contains_key(&order.id) || store.find_order(&order.id)?.is_some() {
                    return Err(Error::Duplicate(format!("order {}", order.id)));
                }
                self.orders.insert(order.id.clone(), order);
            }

            Mutation::InsertShipment(shipment) => {
                if self.shipments.contains_key(&shipment.id)
                    || store.find_shipment(&shipment.id)?.is_some()
                {
                    return Err(Error::Duplicate(format!("shipment {}", shipment.id)));
                }
                if self.order_shipments.contains_key(&shipment.order_id)
                    || store.contains(CF_ORDER_SHIPMENTS, shipment.order_id.as_str().as_bytes())?
                {
                    return Err(Error::Duplicate(format!(
                        "shipment for order {}",
                        shipment.order_id
                    )));
                }
                self.order_shipments
                    .insert(shipment.order_id.clone(), shipment.id.clone());
                self.shipments.insert(shipment.id.clone(), shipment);
            }

            Mutation::SetOrderStatus {
                order_id,
                expected,
                status,
                tx_ref,
                actor,
                at,
            } => {
                let order = load(&mut self.orders, &order_id, || store.order(&order_id))?;
                if order.status != expected {
                    return Err(Error::Conflict(format!(
                        "order {} is {}, expected {}",
                        order_id, order.status, expected
                    )));
                }
                if !expected.can_transition_to(status) {
                    return Err(Error::Conflict(format!(
                        "order {} cannot move {} -> {}",
                        order_id, expected, status
                    )));
                }
                if status == OrderStatus::Cancelled && order.payment_collected {
                    return Err(Error::Conflict(format!(
                        "order {} payment already collected",
                        order_id
                    )));
                }
                order.status = status;
                order.ledger_tx_ref = Some(tx_ref);
                order.status_updated_by = Some(actor);
                order.updated_at = at;
            }

            Mutation::AdvanceOrderToShipped {
                order_id,
                tx_ref,
                actor,
                at,
            } => {
                let order = load(&mut self.orders, &order_id, || store.order(&order_id))?;
                if matches!(order.status, OrderStatus::Processing | OrderStatus::Shipped) {
                    order.status = OrderStatus::Shipped;
                    order.ledger_tx_ref = Some(tx_ref);
                    order.status_updated_by = Some(actor);
                    order.updated_at = at;
                }
            }

            Mutation::AdvanceCheckpoint {
                shipment_id,
                expected,
                target,
                actor,
                tx_ref,
                at,
                estimated_arrival,
            } => {
                let shipment =
                    load(&mut self.shipments, &shipment_id, || store.shipment(&shipment_id))?;
                if shipment.checkpoint != expected {
                    return Err(Error::Conflict(format!(
                        "shipment {} is at '{}', expected '{}'",
                        shipment_id, shipment.checkpoint, expected
                    )));
                }
                if target.index() <= expected.index() {
                    return Err(Error::Conflict(format!(
                        "shipment {} cannot move back to '{}'",
                        shipment_id, target
                    )));
                }
                shipment.checkpoint = target;
                shipment.last_update = at;
                shipment.updated_by = Some(actor);
                shipment.ledger_tx_ref = Some(tx_ref);
                if shipment.estimated_arrival.is_none() {
                    shipment.estimated_arrival = estimated_arrival;
                }
            }

            Mutation::MarkPaymentCollected {
                order_id,
                tx_ref,
                at,
            } => {
                let order = load(&mut self.orders, &order_id, || store.order(&order_id))?;
                if order.payment_collected {
                    return Err(Error::Conflict(format!(
                        "order {} payment already collected",
                        order_id
                    )));
                }
                if !order.status.allows_collection() {
                    return Err(Error::Conflict(format!(
                        "order {} is {}",
                        order_id, order.status
                    )));
                }
                order.payment_collected = true;
                order.ledger_tx_ref = Some(tx_ref);
                order.updated_at = at;
            }

            Mutation::RecordReceipt(receipt) => {
                self.receipts.push(receipt);
            }
        }

        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use tempfile::TempDir;

    fn open_store() -> (StateStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.store.sync_writes = false;
        (StateStore::open(&config).unwrap(), temp_dir)
    }

    fn user(id: &str, email: &str, balance: i64) -> User {
        User {
            id: UserId::new(id),
            name: id.to_string(),
            email: email.to_string(),
            role: Role::Buyer,
            address: "1 Jalan Ampang".to_string(),
            wallet_balance: Decimal::from(balance),
            created_at: Utc::now(),
        }
    }

    fn item(id: &str, stock: u32) -> Item {
        Item {
            id: ItemId::new(id),
            seller_id: UserId::new("usr_s"),
            name: "Kettle".to_string(),
            description: "Steel".to_string(),
            price: Decimal::from(60),
            stock,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_and_read_user() {
        let (store, _temp) = open_store();
        store
            .commit(StoreTx::new().with(Mutation::InsertUser(user("usr_a", "A@Example.com", 5))))
            .unwrap();

        let loaded = store.user(&UserId::new("usr_a")).unwrap();
        assert_eq!(loaded.email, "a@example.com");
        assert_eq!(
            store.user_by_email("a@EXAMPLE.com").unwrap().unwrap().id,
            loaded.id
        );
        assert!(matches!(
            store.user(&UserId::new("usr_zz")),
            Err(Error::NotFound { entity: "user", .. })
        ));
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (store, _temp) = open_store();
        store
            .commit(StoreTx::new().with(Mutation::InsertUser(user("usr_a", "a@example.com", 5))))
            .unwrap();

        let result = store.commit(
            StoreTx::new().with(Mutation::InsertUser(user("usr_b", "a@example.com", 5))),
        );
        assert!(matches!(result, Err(Error::Duplicate(_))));
        assert!(store.find_user(&UserId::new("usr_b")).unwrap().is_none());
    }

    #[test]
    fn test_failed_guard_writes_nothing() {
        let (store, _temp) = open_store();
        store
            .commit(
                StoreTx::new()
                    .with(Mutation::InsertUser(user("usr_a", "a@example.com", 10)))
                    .with(Mutation::InsertUser(user("usr_b", "b@example.com", 10))),
            )
            .unwrap();

        let result = store.commit(
            StoreTx::new()
                .with(Mutation::AdjustBalance {
                    user_id: UserId::new("usr_a"),
                    delta: Decimal::from(50),
                })
                .with(Mutation::AdjustBalance {
                    user_id: UserId::new("usr_b"),
                    delta: Decimal::from(-11),
                }),
        );

        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(
            store.user(&UserId::new("usr_a")).unwrap().wallet_balance,
            Decimal::from(10)
        );
        assert_eq!(
            store.user(&UserId::new("usr_b")).unwrap().wallet_balance,
            Decimal::from(10)
        );
    }

    #[test]
    fn test_balance_overflow_is_a_conflict() {
        let (store, _temp) = open_store();
        store
            .commit(StoreTx::new().with(Mutation::InsertUser(user("usr_a", "a@example.com", 1))))
            .unwrap();

        let result = store.commit(StoreTx::new().with(Mutation::AdjustBalance {
            user_id: UserId::new("usr_a"),
            delta: Decimal::MAX,
        }));

        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(
            store.user(&UserId::new("usr_a")).unwrap().wallet_balance,
            Decimal::from(1)
        );
    }

    #[test]
    fn test_deltas_accumulate_within_transaction() {
        let (store, _temp) = open_store();
        store
            .commit(StoreTx::new().with(Mutation::InsertItem(item("itm_1", 3))))
            .unwrap();

        store
            .commit(
                StoreTx::new()
                    .with(Mutation::AdjustStock {
                        item_id: ItemId::new("itm_1"),
                        delta: -2,
                    })
                    .with(Mutation::AdjustStock {
                        item_id: ItemId::new("itm_1"),
                        delta: -1,
                    }),
            )
            .unwrap();
        assert_eq!(store.item(&ItemId::new("itm_1")).unwrap().stock, 0);

        let result = store.commit(StoreTx::new().with(Mutation::AdjustStock {
            item_id: ItemId::new("itm_1"),
            delta: -1,
        }));
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_one_shipment_per_order() {
        let (store, _temp) = open_store();
        let shipment = |id: &str| Shipment {
            id: ShipmentId::new(id),
            order_id: OrderId::new("ord_1"),
            logistics_id: None,
            checkpoint: Checkpoint::AwaitingSellerAcceptance,
            last_update: Utc::now(),
            estimated_arrival: None,
            updated_by: None,
            ledger_tx_ref: None,
        };

        store
            .commit(StoreTx::new().with(Mutation::InsertShipment(shipment("shp_1"))))
            .unwrap();
        let result = store.commit(StoreTx::new().with(Mutation::InsertShipment(shipment("shp_2"))));

        assert!(matches!(result, Err(Error::Duplicate(_))));
        assert_eq!(
            store.shipment_for_order(&OrderId::new("ord_1")).unwrap().id,
            ShipmentId::new("shp_1")
        );
    }

    #[test]
    fn test_rows_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();

        {
            let store = StateStore::open(&config).unwrap();
            store
                .commit(StoreTx::new().with(Mutation::InsertItem(item("itm_1", 7))))
                .unwrap();
        }

        let store = StateStore::open(&config).unwrap();
        assert_eq!(store.item(&ItemId::new("itm_1")).unwrap().stock, 7);
        assert_eq!(store.items().unwrap().len(), 1);
    }
}
