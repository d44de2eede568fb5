//! # Order ledger backends
//!
//! This module defines the interface contract that storage *backends* must satisfy in order to be used by the
//! reconciliation engine.
//!
//! * [`OrderLedger`] is the single trait a backend has to implement. It provides the read-side lookups (orders, line
//!   items, payments and charge requests), the checkout-side `insert_order`, and the atomic `settle_order` primitive
//!   that performs the `Pending → Paid` compare-and-swap together with the payment insert.
//!
//! Errors are reported with the backend-agnostic [`LedgerError`]. Backends must map transient lock contention to
//! [`LedgerError::StorageConflict`], since that is the only error the engine retries.
mod data_objects;
mod order_ledger;

pub use data_objects::{InsertPaymentResult, SettleResult};
pub(crate) use order_ledger::is_lock_contention;
pub use order_ledger::{LedgerError, OrderLedger};
