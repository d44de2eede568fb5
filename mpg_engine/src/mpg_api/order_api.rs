//! Checkout and read-side access to the order ledger.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{ChargeRequest, NewChargeRequest, NewOrder, Order, OrderId, Payment},
    order_objects::{OrderDetails, OrderQueryFilter},
    traits::{LedgerError, OrderLedger},
};

/// The `OrderApi` is used by the checkout flow to place orders, by the charge route to correlate charges with
/// orders, and by dashboards to look at orders and their payments. It never changes the status of an order.
pub struct OrderApi<B> {
    db: B,
}

impl<B: Debug> Debug for OrderApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderApi ({:?})", self.db)
    }
}

impl<B> OrderApi<B>
where B: OrderLedger
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Stores the order and all its line items atomically. The order starts out `Pending`.
    pub async fn checkout(&self, order: NewOrder) -> Result<Order, LedgerError> {
        let order = self.db.insert_order(order).await?;
        info!("🛒️ Order {} for {} {} placed by {}", order.order_id, order.total_amount, order.currency, order.user_id);
        Ok(order)
    }

    pub async fn order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, LedgerError> {
        self.db.fetch_order(order_id).await
    }

    /// Fetches the order along with its line items and payments. If no order exists, `None` is returned.
    pub async fn order_details(&self, order_id: &OrderId) -> Result<Option<OrderDetails>, LedgerError> {
        let Some(order) = self.db.fetch_order(order_id).await? else {
            trace!("🛒️ Order {order_id} does not exist");
            return Ok(None);
        };
        let items = self.db.fetch_order_items(order_id).await?;
        let payments = self.db.fetch_payments_for_order(order_id).await?;
        Ok(Some(OrderDetails { order, items, payments }))
    }

    pub async fn payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, LedgerError> {
        self.db.fetch_payments_for_order(order_id).await
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, LedgerError> {
        trace!("🛒️ Searching orders. {query}");
        self.db.fetch_orders(query).await
    }

    /// Remembers which order a charge was raised for, so that callbacks carrying only the gateway reference can be
    /// matched.
    pub async fn record_charge_request(&self, request: NewChargeRequest) -> Result<ChargeRequest, LedgerError> {
        self.db.record_charge_request(request).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
