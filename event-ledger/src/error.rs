//! Error types for the event ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Submission rejected before it reached the log
    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    /// Submission signature did not verify against the submitter key
    #[error("Signature verification failed: {0}")]
    SignatureError(String),

    /// No event at this offset or transaction reference
    #[error("Event not found: {0}")]
    EventNotFound(String),

    /// Range query wider than the ledger is willing to scan
    #[error("Range too large: requested {requested} offsets, limit is {limit}")]
    RangeTooLarge {
        /// Offsets requested
        requested: u64,
        /// Maximum offsets per call
        limit: u64,
    },

    /// Range query with `to < from`
    #[error("Invalid range: {from}..={to}")]
    InvalidRange {
        /// Start offset
        from: u64,
        /// End offset
        to: u64,
    },

    /// Hash chain does not verify at this offset
    #[error("Hash chain broken at offset {offset}")]
    ChainBroken {
        /// First offset that failed verification
        offset: u64,
    },

    /// Ledger cannot be reached (used by remote clients and test doubles)
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
