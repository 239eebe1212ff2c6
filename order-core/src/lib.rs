//! OrderChain order core
//!
//! Keeps a relational store and an append-only ledger consistent for the
//! marketplace's order, shipment and payment flows.
//!
//! # Architecture
//!
//! - **Ledger First**: every recorded change is appended to the ledger before
//!   the relational transaction that applies it
//! - **Hash Commitments**: the ledger holds SHA-256 commitments, never payloads
//! - **Atomic Relational Writes**: one guarded `WriteBatch` per change
//! - **Entity Locks**: operations on the same order, shipment, item or user
//!   run one at a time from validation to commit
//!
//! # Invariants
//!
//! - A failed ledger append leaves relational state untouched
//! - A relational failure after an append is reported, never hidden
//! - Payment is collected at most once per order
//! - Checkpoints only move forward

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod audit;
pub mod catalog;
pub mod checkpoint;
pub mod commitment;
pub mod config;
pub mod context;
pub mod dual_write;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod locks;
pub mod metrics;
pub mod store;
pub mod types;
pub mod wallet;

// Re-exports
pub use audit::{Auditor, ScanReport, Verdict, Verification};
pub use catalog::{Catalog, ItemUpdate, NewItem, NewUser, ProfileUpdate};
pub use checkpoint::CheckpointEngine;
pub use commitment::CommitmentPayload;
pub use config::Config;
pub use context::CoreContext;
pub use dual_write::DualWrite;
pub use error::{Error, ErrorCategory, Result};
pub use gateway::LedgerGateway;
pub use lifecycle::{OrderLifecycle, OrderRequest, PlacedOrder};
pub use locks::{EntityLocks, LockKey};
pub use metrics::Metrics;
pub use store::{Mutation, StateStore, StoreTx};
pub use types::{
    Actor, Checkpoint, Direction, Item, ItemId, LedgerReceipt, Order, OrderId, OrderStatus, Role,
    Shipment, ShipmentId, User, UserId,
};
pub use wallet::Wallet;
