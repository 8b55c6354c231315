//! Error types for the utxoindex pipeline.

use thiserror::Error;

/// Errors that can occur during indexing.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transaction fetch failed: {0}")]
    TxFetch(String),

    #[error("Confirmed block handler failed: {reason}")]
    Handler { reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The rollback target is neither an unconfirmed block nor the latest
    /// confirmed one: something already confirmed would have to be undone.
    #[error("Roll backward, block not found = ({slot}, {hash})")]
    RollbackTargetNotFound { slot: u64, hash: String },

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Returns `true` if the error breaks the chain-continuity contract.
    ///
    /// Fatal errors must not be retried; the driver has to stop syncing.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RollbackTargetNotFound { .. })
    }
}
