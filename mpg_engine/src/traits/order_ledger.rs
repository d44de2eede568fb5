use thiserror::Error;

use crate::{
    db_types::{ChargeRequest, NewChargeRequest, NewOrder, NewPayment, Order, OrderId, OrderItem, Payment},
    order_objects::OrderQueryFilter,
    traits::SettleResult,
};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("The database is busy and the write could not be completed: {0}")]
    StorageConflict(String),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Gateway reference {0} has already been recorded")]
    ChargeRequestAlreadyExists(String),
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        if is_lock_contention(&e) {
            LedgerError::StorageConflict(e.to_string())
        } else {
            LedgerError::DatabaseError(e.to_string())
        }
    }
}

/// SQLite reports lock contention as `SQLITE_BUSY` (5) or `SQLITE_LOCKED` (6). The driver hands us the extended code,
/// so only the low byte is compared.
pub(crate) fn is_lock_contention(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|c| c.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, 5 | 6))
            .unwrap_or(false),
        _ => false,
    }
}

/// The storage contract of the reconciliation engine.
///
/// Orders are written once, by the checkout flow, via [`OrderLedger::insert_order`]. After that, the only mutation a
/// backend may ever perform on an order is the `Pending → Paid` transition inside [`OrderLedger::settle_order`].
#[allow(async_fn_in_trait)]
pub trait OrderLedger: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order along with all of its line items in a single atomic transaction. Either everything is
    /// written, or nothing is.
    ///
    /// The order is created in the `Pending` state. If an order with the same id exists,
    /// [`LedgerError::OrderAlreadyExists`] is returned.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, LedgerError>;

    /// Fetches the order with the given id, or `None` if it does not exist.
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, LedgerError>;

    /// Fetches the order a charge with the given gateway reference (`CheckoutRequestID`) was raised for.
    async fn fetch_order_by_gateway_reference(&self, gateway_reference: &str) -> Result<Option<Order>, LedgerError>;

    /// Fetches orders matching the given filter, oldest first.
    async fn fetch_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, LedgerError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, LedgerError>;

    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, LedgerError>;

    /// Records that a charge was initiated for an order, so that later callbacks carrying only the gateway reference
    /// can be matched back to it.
    async fn record_charge_request(&self, request: NewChargeRequest) -> Result<ChargeRequest, LedgerError>;

    /// Settles the order named in `payment`. In a single atomic transaction:
    /// * The order status is changed from `Pending` to `Paid` with a conditional write. If no row was changed, the
    ///   order had already been paid and the transaction is rolled back.
    /// * The payment is inserted. If a payment with the same `(order_id, transaction_id)` already exists, the
    ///   transaction is rolled back.
    ///
    /// Both "already paid" cases return [`SettleResult::AlreadySettled`]. Nothing is ever written twice.
    async fn settle_order(&self, payment: NewPayment) -> Result<SettleResult, LedgerError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), LedgerError> {
        Ok(())
    }
}
