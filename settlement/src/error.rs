//! Error types for payment settlement

use event_ledger::TxRef;
use order_core::{ErrorCategory, OrderId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Order core error
    #[error(transparent)]
    Core(#[from] order_core::Error),

    /// Payment release is on the ledger but the seller was not credited
    #[error(
        "Fund recovery required for order {order_id}: {amount} released by ledger tx {tx_ref} \
         was not credited: {reason}"
    )]
    FundRecovery {
        /// Order whose payment was released
        order_id: OrderId,
        /// Ledger event releasing the payment
        tx_ref: TxRef,
        /// Amount promised to the seller
        amount: Decimal,
        /// Why the credit failed
        reason: String,
    },
}

impl Error {
    /// Classify the error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Core(e) => e.category(),
            Error::FundRecovery { .. } => ErrorCategory::ReconciliationRequired,
        }
    }

    /// Message suitable for end users
    pub fn public_message(&self) -> String {
        match self {
            Error::Core(e) => e.public_message(),
            Error::FundRecovery { order_id, .. } => format!(
                "Payment for order {} is being processed and has been flagged for review",
                order_id
            ),
        }
    }
}
