//! Payment Settlement
//!
//! Releases an order's escrowed total to its seller once the buyer has
//! confirmed delivery.
//!
//! # Flow
//!
//! 1. **Check**: the caller is the order's seller, the order is delivered or
//!    completed, and the payment has not been collected
//! 2. **Record**: a `PAYMENT_RELEASED` event committing to {id, amount, seller}
//!    is appended to the ledger
//! 3. **Apply**: the seller's wallet is credited and the order is flagged as
//!    collected in one relational transaction
//!
//! If step 3 fails after step 2, the ledger promises funds that never moved.
//! That is reported as [`Error::FundRecovery`] for an operator to resolve.
//!
//! # Example
//!
//! ```no_run
//! use order_core::{Actor, CoreContext, OrderId, Role};
//! use settlement::SettlementEngine;
//!
//! async fn collect(ctx: CoreContext, seller: Actor, order_id: OrderId) -> settlement::Result<()> {
//!     let engine = SettlementEngine::new(ctx);
//!     let collection = engine.collect_payment(&seller, &order_id).await?;
//!     println!("Seller balance is now {}", collection.seller_balance);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod engine;
pub mod error;

// Re-exports
pub use engine::{Collection, SettlementEngine};
pub use error::{Error, Result};
