use thiserror::Error;

use crate::{
    db_types::OrderId,
    traits::{is_lock_contention, LedgerError},
};

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(sqlx::Error),
    #[error("The database is locked by another writer: {0}")]
    Conflict(sqlx::Error),
    #[error("Could not run database migrations: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Cannot insert duplicate order {0}")]
    DuplicateOrder(OrderId),
    #[error("Cannot insert duplicate charge request {0}")]
    DuplicateChargeRequest(String),
}

impl From<sqlx::Error> for SqliteDatabaseError {
    fn from(e: sqlx::Error) -> Self {
        if is_lock_contention(&e) {
            SqliteDatabaseError::Conflict(e)
        } else {
            SqliteDatabaseError::DriverError(e)
        }
    }
}

impl From<SqliteDatabaseError> for LedgerError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::Conflict(e) => LedgerError::StorageConflict(e.to_string()),
            SqliteDatabaseError::DuplicateOrder(id) => LedgerError::OrderAlreadyExists(id),
            SqliteDatabaseError::DuplicateChargeRequest(r) => LedgerError::ChargeRequestAlreadyExists(r),
            e => LedgerError::DatabaseError(e.to_string()),
        }
    }
}
