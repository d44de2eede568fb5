use mpg_common::Money;
use thiserror::Error;

use crate::{db_types::OrderId, helpers::NormalizationError, traits::LedgerError};

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("{0}")]
    Normalization(#[from] NormalizationError),
    #[error("Order not found: {0}")]
    OrderNotFound(String),
    #[error("Amount mismatch for order {order_id}. Expected {expected}, but {received} was paid")]
    AmountMismatch { order_id: OrderId, expected: Money, received: Money },
    #[error("The order ledger is busy. {0}")]
    StorageConflict(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<LedgerError> for ReconciliationError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::StorageConflict(s) => ReconciliationError::StorageConflict(s),
            LedgerError::OrderNotFound(id) => ReconciliationError::OrderNotFound(id.as_str().to_string()),
            e => ReconciliationError::InternalError(e.to_string()),
        }
    }
}
