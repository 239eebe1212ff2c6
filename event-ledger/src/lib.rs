//! OrderChain Event Ledger
//!
//! Append-only, hash-chained event log that plays the role of the external
//! distributed ledger. Order services only see it through [`LedgerService`].
//!
//! # Architecture
//!
//! - **Single Writer**: one actor task assigns offsets, so appends are linearizable
//! - **Hash Chain**: every transaction reference commits to its predecessor
//! - **Durable Receipts**: an append is acknowledged only after its batch is on disk
//! - **Bounded Reads**: range queries are capped at a fixed window per call
//!
//! # Invariants
//!
//! - Append-only: events are never modified or deleted
//! - Offsets are dense and strictly increasing
//! - `tx_ref(n) = H(tx_ref(n - 1) || event n)`

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod service;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use crypto::KeyPair;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use service::LedgerService;
pub use storage::Storage;
pub use types::{
    Commitment, EventKind, EventSubmission, LedgerEvent, Signature, SubmitterId, TxRef,
};
