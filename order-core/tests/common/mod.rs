//! Shared harness for order-core integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use event_ledger::{EventSubmission, KeyPair, Ledger, LedgerEvent, LedgerService, TxRef};
use order_core::{
    Actor, Auditor, Catalog, CheckpointEngine, Config, CoreContext, Item, NewItem, NewUser,
    OrderLifecycle, Role, StateStore, User, Wallet,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const SEED: &str = "0707070707070707070707070707070707070707070707070707070707070707";

/// How the scripted ledger answers appends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Pass through
    Normal,
    /// Refuse every call
    Unavailable,
    /// Record the event, then answer after `delay`
    LateReceipt(Duration),
    /// Never record, answer after `delay`
    Lost(Duration),
}

type Hook = Box<dyn FnOnce(&LedgerEvent) + Send>;

/// Real ledger behind a switchable failure mode and a one-shot post-append hook
pub struct ScriptedLedger {
    inner: Arc<Ledger>,
    mode: Mutex<Mode>,
    after_append: Mutex<Option<Hook>>,
}

impl ScriptedLedger {
    pub fn new(inner: Arc<Ledger>) -> Self {
        Self {
            inner,
            mode: Mutex::new(Mode::Normal),
            after_append: Mutex::new(None),
        }
    }

    pub fn set_mode(&self, mode: Mode) {
        *self.mode.lock() = mode;
    }

    /// Run `hook` right after the next successful append, before the caller sees it
    pub fn after_next_append(&self, hook: impl FnOnce(&LedgerEvent) + Send + 'static) {
        *self.after_append.lock() = Some(Box::new(hook));
    }

    fn unavailable(&self) -> event_ledger::Result<()> {
        if *self.mode.lock() == Mode::Unavailable {
            return Err(event_ledger::Error::Unavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerService for ScriptedLedger {
    async fn append_event(&self, submission: EventSubmission) -> event_ledger::Result<LedgerEvent> {
        let mode = *self.mode.lock();
        match mode {
            Mode::Unavailable => Err(event_ledger::Error::Unavailable(
                "connection refused".to_string(),
            )),
            Mode::Lost(delay) => {
                tokio::time::sleep(delay).await;
                Err(event_ledger::Error::Unavailable("connection reset".to_string()))
            }
            Mode::LateReceipt(delay) => {
                let event = self.inner.append_event(submission).await?;
                tokio::time::sleep(delay).await;
                Ok(event)
            }
            Mode::Normal => {
                let event = self.inner.append_event(submission).await?;
                let hook = self.after_append.lock().take();
                if let Some(hook) = hook {
                    hook(&event);
                }
                Ok(event)
            }
        }
    }

    async fn read_events(&self, from: u64, to: u64) -> event_ledger::Result<Vec<LedgerEvent>> {
        self.unavailable()?;
        self.inner.read_events(from, to)
    }

    async fn events_for(&self, correlation_id: &str) -> event_ledger::Result<Vec<LedgerEvent>> {
        self.unavailable()?;
        self.inner.events_for(correlation_id)
    }

    async fn event_by_tx_ref(&self, tx_ref: &TxRef) -> event_ledger::Result<LedgerEvent> {
        self.unavailable()?;
        self.inner.event_by_tx_ref(tx_ref)
    }

    async fn latest_offset(&self) -> event_ledger::Result<Option<u64>> {
        self.unavailable()?;
        self.inner.latest_offset()
    }

    fn max_read_window(&self) -> u64 {
        self.inner.max_read_window()
    }
}

/// Core wired to a scripted ledger, with one buyer, seller, logistics provider and item
pub struct Harness {
    pub ctx: CoreContext,
    pub ledger: Arc<ScriptedLedger>,
    pub raw_ledger: Arc<Ledger>,
    pub lifecycle: OrderLifecycle,
    pub checkpoints: CheckpointEngine,
    pub wallet: Wallet,
    pub catalog: Catalog,
    pub auditor: Auditor,
    pub buyer: User,
    pub seller: User,
    pub logistics: User,
    pub item: Item,
    _ledger_dir: TempDir,
    _store_dir: TempDir,
}

impl Harness {
    /// Buyer with 100, item priced 60 with 3 in stock
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// `tweak` adjusts the core config once the ledger is open and users exist
    pub async fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let ledger_dir = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.data_dir = store_dir.path().to_path_buf();
        config.store.sync_writes = false;
        config.append_timeout_ms = 500;
        config.signing_seed = Some(SEED.to_string());
        config.ledger.data_dir = ledger_dir.path().to_path_buf();
        config.ledger.batching.enabled = false;
        config.ledger.rocksdb.sync_writes = false;

        let raw_ledger = Arc::new(Ledger::open(config.ledger.clone()).await.unwrap());
        let ledger = Arc::new(ScriptedLedger::new(raw_ledger.clone()));

        let store = Arc::new(StateStore::open(&config).unwrap());
        let keypair = KeyPair::from_hex_seed(SEED).unwrap();

        // providers are registered before the default assignment is known
        let bootstrap = CoreContext::with_parts(
            config.clone(),
            store.clone(),
            ledger.clone(),
            KeyPair::from_hex_seed(SEED).unwrap(),
        )
        .unwrap();
        let catalog = Catalog::new(bootstrap);
        let logistics = catalog
            .register_user(new_user("FastTrack", "ops@fasttrack.test", Role::Logistics, 0))
            .unwrap();
        let buyer = catalog
            .register_user(new_user("Aisyah", "aisyah@buyer.test", Role::Buyer, 100))
            .unwrap();
        let seller = catalog
            .register_user(new_user("Kedai Runcit", "shop@seller.test", Role::Seller, 0))
            .unwrap();

        config.default_logistics_id = Some(logistics.id.to_string());
        tweak(&mut config);
        let ctx = CoreContext::with_parts(config, store, ledger.clone(), keypair).unwrap();

        let catalog = Catalog::new(ctx.clone());
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
            wallet: Wallet::new(ctx.clone()),
            auditor: Auditor::new(ctx.clone()),
            catalog,
            ctx,
            ledger,
            raw_ledger,
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

    pub fn logistics(&self) -> Actor {
        Actor::of(&self.logistics)
    }

    pub fn balance(&self, user: &User) -> Decimal {
        self.ctx.store.user(&user.id).unwrap().wallet_balance
    }

    pub fn stock(&self) -> u32 {
        self.ctx.store.item(&self.item.id).unwrap().stock
    }

    pub fn ledger_len(&self) -> u64 {
        self.raw_ledger.latest_offset().unwrap().map_or(0, |head| head + 1)
    }

    /// Register another user in the same store
    pub fn register(&self, name: &str, role: Role, balance: i64) -> User {
        let email = format!("{}@extra.test", name.to_lowercase());
        self.catalog
            .register_user(new_user(name, &email, role, balance))
            .unwrap()
    }
}

pub fn new_user(name: &str, email: &str, role: Role, balance: i64) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: email.to_string(),
        role,
        address: "Jalan Ampang, Kuala Lumpur".to_string(),
        opening_balance: Decimal::from(balance),
    }
}
