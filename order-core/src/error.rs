//! Error types for the order core

use crate::types::{Checkpoint, ItemId, OrderId, OrderStatus, UserId};
use event_ledger::TxRef;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for order core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Order core errors
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Transition not in the lifecycle
    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition {
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },

    /// Checkpoint at or before the current one
    #[error("Checkpoint regression: shipment is at '{current}', cannot move to '{target}'")]
    CheckpointRegression {
        /// Current checkpoint
        current: Checkpoint,
        /// Requested checkpoint
        target: Checkpoint,
    },

    /// Shipment cannot move before the seller accepts the order
    #[error("Approval pending: order {0} has not been accepted by the seller")]
    ApprovalPending(OrderId),

    /// Wallet cannot cover the amount
    #[error("Insufficient funds for {user_id}: required {required}, available {available}")]
    InsufficientFunds {
        /// Wallet owner
        user_id: UserId,
        /// Amount needed
        required: Decimal,
        /// Current balance
        available: Decimal,
    },

    /// Item cannot cover the quantity
    #[error("Insufficient stock for {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Item
        item_id: ItemId,
        /// Units requested
        requested: u32,
        /// Units in stock
        available: u32,
    },

    /// Actor may not perform this operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Entity already exists
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Unknown entity id
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// Ledger refused or could not be reached; nothing was written
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Ledger did not answer in time and the event was not found on re-read
    #[error("Ledger append for {correlation_id} timed out after {timeout_ms}ms")]
    LedgerTimeout {
        /// Correlation id of the submission
        correlation_id: String,
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Ledger holds an event whose relational write did not happen
    #[error("Reconciliation required for {correlation_id} (ledger tx {tx_ref}): {reason}")]
    ReconciliationRequired {
        /// Entity the event describes
        correlation_id: String,
        /// Reference of the unmatched ledger event
        tx_ref: TxRef,
        /// Why the relational write failed
        reason: String,
    },

    /// A transaction guard no longer holds
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ledger library error outside an append
    #[error("Ledger error: {0}")]
    Ledger(#[from] event_ledger::Error),
}

/// Coarse error classes surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before any external write; fix input and retry
    Validation,
    /// Unknown entity
    NotFound,
    /// No relational mutation happened; retry the whole operation
    LedgerUnavailable,
    /// Stores diverged; operator follow-up needed
    ReconciliationRequired,
    /// Infrastructure failure
    Internal,
}

impl Error {
    /// Shorthand for [`Error::NotFound`]
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classify the error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_)
            | Error::IllegalTransition { .. }
            | Error::CheckpointRegression { .. }
            | Error::ApprovalPending(_)
            | Error::InsufficientFunds { .. }
            | Error::InsufficientStock { .. }
            | Error::Unauthorized(_)
            | Error::Duplicate(_) => ErrorCategory::Validation,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::LedgerUnavailable(_) | Error::LedgerTimeout { .. } => {
                ErrorCategory::LedgerUnavailable
            }
            Error::ReconciliationRequired { .. } => ErrorCategory::ReconciliationRequired,
            Error::Conflict(_)
            | Error::Storage(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Ledger(_) => ErrorCategory::Internal,
        }
    }

    /// Whether repeating the whole operation is safe
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::LedgerUnavailable(_) | Error::LedgerTimeout { .. } | Error::Conflict(_)
        )
    }

    /// Message suitable for end users
    ///
    /// Infrastructure details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Error::LedgerTimeout { correlation_id, .. } => format!(
                "The request could not be confirmed in time (reference {}); please retry",
                correlation_id
            ),
            Error::ReconciliationRequired { correlation_id, .. } => format!(
                "The request could not be completed and has been flagged for review (reference {})",
                correlation_id
            ),
            _ => match self.category() {
                ErrorCategory::Validation | ErrorCategory::NotFound => self.to_string(),
                ErrorCategory::LedgerUnavailable => {
                    "The ledger is temporarily unavailable; please retry".to_string()
                }
                ErrorCategory::ReconciliationRequired | ErrorCategory::Internal => {
                    "Internal error".to_string()
                }
            },
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
