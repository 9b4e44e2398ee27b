//! Error types for the ledger

use crate::types::ClientId;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown menu item code (rejected before any write)
    #[error("Unknown menu item: {0}")]
    InvalidItem(String),

    /// Quantity must be a positive integer (rejected before any write)
    #[error("Invalid quantity: {0} (must be positive)")]
    InvalidQuantity(i64),

    /// Payment amount must be positive (rejected before any write)
    #[error("Invalid payment amount: {0} (must be positive)")]
    InvalidAmount(Decimal),

    /// Client has no record in the ledger
    #[error("Unknown client: {0}")]
    UnknownClient(ClientId),

    /// Pending-queue position outside the current listing
    #[error("Pending payment position {position} out of range (1..={pending})")]
    IndexOutOfRange {
        /// 1-based position the manager asked for
        position: usize,
        /// Pending count at resolution time
        pending: usize,
    },

    /// Claim was removed by a concurrent confirmation
    #[error("Pending payment {0} was already confirmed or removed")]
    StaleClaim(Uuid),

    /// Caller is not the manager
    #[error("Client {0} is not authorized for manager operations")]
    Unauthorized(ClientId),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Queue removal succeeded but the ledger append kept failing.
    ///
    /// The claim is gone from the pending queue and the payment is not yet in
    /// the permanent record; an operator must reconcile by hand.
    #[error(
        "RECONCILIATION FAILURE: payment of {amount} from client {client_id} was removed \
         from the pending queue but could not be appended to the ledger: {reason}"
    )]
    ReconciliationFatal {
        /// Client whose payment is at risk
        client_id: ClientId,
        /// Amount removed from the queue
        amount: Decimal,
        /// Last storage failure
        reason: String,
    },

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

impl Error {
    /// Whether a bounded retry is worthwhile
    ///
    /// Only raw storage failures are transient. Validation, not-found, and
    /// fatal reconciliation errors never become retryable.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Storage("io".to_string()).is_transient());
        assert!(!Error::InvalidItem("soup".to_string()).is_transient());
        assert!(!Error::StaleClaim(Uuid::now_v7()).is_transient());
        assert!(!Error::ReconciliationFatal {
            client_id: ClientId::new(1),
            amount: dec!(5.00),
            reason: "down".to_string(),
        }
        .is_transient());
    }

    #[test]
    fn test_fatal_message_names_client_and_amount() {
        let err = Error::ReconciliationFatal {
            client_id: ClientId::new(42),
            amount: dec!(15.50),
            reason: "storage unavailable".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("15.50"));
        assert!(msg.contains("RECONCILIATION FAILURE"));
    }
}
