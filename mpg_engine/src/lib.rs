//! M-Pesa Payment Gateway Engine
//!
//! This library contains the core logic for accepting mobile-money payments against marketplace orders. It is
//! independent of any web framework.
//!
//! The library is divided into these sections:
//! 1. The order ledger ([`mod@traits`] and, for SQLite, [`mod@sqlite`]). The ledger stores orders, their line items,
//!    the payments that settled them and the charge requests that were sent to the gateway. You should never need to
//!    access the database directly. The exception is the data types, which are defined in [`mod@db_types`].
//! 2. Callback processing helpers ([`mod@helpers`]): signature verification and payload normalization.
//! 3. The public API ([`mod@mpg_api`]): checkout and order queries, plus payment reconciliation.
//!
//! The engine also emits events when an order is paid, or when a payment arrives for an order that was already paid
//! by a different transaction. Hooks can subscribe to these; see [`mod@events`].
pub mod db_types;
pub mod events;
pub mod helpers;
mod mpg_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use mpg_api::{
    errors::ReconciliationError,
    order_api::OrderApi,
    order_objects,
    reconciliation_api::{
        confirmation_prompt,
        ReconciliationApi,
        ReconciliationOptions,
        ReconciliationOutcome,
        ReconciliationResult,
        DEFAULT_AMOUNT_TOLERANCE,
        DEFAULT_MAX_CONFLICT_RETRIES,
    },
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{InsertPaymentResult, LedgerError, OrderLedger, SettleResult};
