//! Marketplace harness for settlement tests

#![allow(dead_code)]

use async_trait::async_trait;
use event_ledger::{EventSubmission, KeyPair, Ledger, LedgerEvent, LedgerService, TxRef};
use order_core::{
    Actor, Catalog, Checkpoint, CheckpointEngine, Config, CoreContext, Item, NewItem, NewUser,
    Order, OrderLifecycle, OrderRequest, OrderStatus, Role, StateStore, User,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use settlement::SettlementEngine;
use std::sync::Arc;
use tempfile::TempDir;

type Hook = Box<dyn FnOnce(&LedgerEvent) + Send>;

/// Embedded ledger with a one-shot hook run after the next append
pub struct HookedLedger {
    inner: Arc<Ledger>,
    after_append: Mutex<Option<Hook>>,
}

impl HookedLedger {
    pub fn after_next_append(&self, hook: impl FnOnce(&LedgerEvent) + Send + 'static) {
        *self.after_append.lock() = Some(Box::new(hook));
    }
}

#[async_trait]
impl LedgerService for HookedLedger {
    async fn append_event(&self, submission: EventSubmission) -> event_ledger::Result<LedgerEvent> {
        let event = self.inner.append_event(submission).await?;
        let hook = self.after_append.lock().take();
        if let Some(hook) = hook {
            hook(&event);
        }
        Ok(event)
    }

    async fn read_events(&self, from: u64, to: u64) -> event_ledger::Result<Vec<LedgerEvent>> {
        self.inner.read_events(from, to)
    }

    async fn events_for(&self, correlation_id: &str) -> event_ledger::Result<Vec<LedgerEvent>> {
        self.inner.events_for(correlation_id)
    }

    async fn event_by_tx_ref(&self, tx_ref: &TxRef) -> event_ledger::Result<LedgerEvent> {
        self.inner.event_by_tx_ref(tx_ref)
    }

    async fn latest_offset(&self) -> event_ledger::Result<Option<u64>> {
        self.inner.latest_offset()
    }

    fn max_read_window(&self) -> u64 {
        self.inner.max_read_window()
    }
}

pub struct Market {
    pub ctx: CoreContext,
    pub ledger: Arc<HookedLedger>,
    pub lifecycle: OrderLifecycle,
    pub checkpoints: CheckpointEngine,
    pub settlement: SettlementEngine,
    pub buyer: User,
    pub seller: User,
    pub logistics: User,
    pub item: Item,
    _ledger_dir: TempDir,
    _store_dir: TempDir,
}

impl Market {
    /// Buyer with 100, seller with nothing, item priced 60 with 3 in stock
    pub async fn new() -> Self {
        let ledger_dir = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.data_dir = store_dir.path().to_path_buf();
        config.store.sync_writes = false;
        config.ledger.data_dir = ledger_dir.path().to_path_buf();
        config.ledger.batching.enabled = false;
        config.ledger.rocksdb.sync_writes = false;

        let ledger = Arc::new(HookedLedger {
            inner: Arc::new(Ledger::open(config.ledger.clone()).await.unwrap()),
            after_append: Mutex::new(None),
        });
        let store = Arc::new(StateStore::open(&config).unwrap());
        let ctx =
            CoreContext::with_parts(config, store, ledger.clone(), KeyPair::generate()).unwrap();

        let catalog = Catalog::new(ctx.clone());
        let buyer = catalog
            .register_user(new_user("Aisyah", "aisyah@buyer.test", Role::Buyer, 100))
            .unwrap();
        let seller = catalog
            .register_user(new_user("Kedai Runcit", "shop@seller.test", Role::Seller, 0))
            .unwrap();
        let logistics = catalog
            .register_user(new_user("FastTrack", "ops@fasttrack.test", Role::Logistics, 0))
            .unwrap();
        let item = catalog
            .create_item(
                &Actor::of(&seller),
                NewItem {
                    name: "Batik Shirt".to_string(),
                    description: "Hand-drawn batik".to_string(),
                    price: Decimal::from(60),
                    stock: 3,
                },
            )
            .unwrap();

        Self {
            lifecycle: OrderLifecycle::new(ctx.clone()),
            checkpoints: CheckpointEngine::new(ctx.clone()),
            settlement: SettlementEngine::new(ctx.clone()),
            ctx,
            ledger,
            buyer,
            seller,
            logistics,
            item,
            _ledger_dir: ledger_dir,
            _store_dir: store_dir,
        }
    }

    pub fn buyer(&self) -> Actor {
        Actor::of(&self.buyer)
    }

    pub fn seller(&self) -> Actor {
        Actor::of(&self.seller)
    }

    pub fn balance(&self, user: &User) -> Decimal {
        self.ctx.store.user(&user.id).unwrap().wallet_balance
    }

    pub async fn ledger_len(&self) -> u64 {
        self.ledger
            .latest_offset()
            .await
            .unwrap()
            .map_or(0, |head| head + 1)
    }

    /// Place an order and drive it through delivery
    pub async fn delivered_order(&self) -> Order {
        let placed = self
            .lifecycle
            .create_order(&self.buyer(), OrderRequest::new(self.item.id.clone(), 1))
            .await
            .unwrap();
        self.lifecycle
            .update_status(&self.seller(), &placed.order.id, OrderStatus::Processing)
            .await
            .unwrap();
        self.checkpoints
            .advance_checkpoint(
                &Actor::of(&self.logistics),
                &placed.shipment.id,
                Checkpoint::TransitCenter,
            )
            .await
            .unwrap();
        self.checkpoints
            .advance_checkpoint(
                &Actor::of(&self.logistics),
                &placed.shipment.id,
                Checkpoint::OutForDelivery,
            )
            .await
            .unwrap();
        self.lifecycle
            .update_status(&self.buyer(), &placed.order.id, OrderStatus::Delivered)
            .await
            .unwrap()
    }
}

pub fn new_user(name: &str, email: &str, role: Role, balance: i64) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: email.to_string(),
        role,
        address: "Jalan Tun Razak, Kuala Lumpur".to_string(),
        opening_balance: Decimal::from(balance),
    }
}
