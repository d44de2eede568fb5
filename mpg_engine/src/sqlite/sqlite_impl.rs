//! `SqliteDatabase` is a concrete implementation of an order ledger backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the [`OrderLedger`] trait.
use std::fmt::Debug;

use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{charge_requests, db_url, new_pool, orders, payments, SqliteDatabaseError};
use crate::{
    db_types::{
        ChargeRequest,
        NewChargeRequest,
        NewOrder,
        NewPayment,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        Payment,
    },
    order_objects::OrderQueryFilter,
    traits::{InsertPaymentResult, LedgerError, OrderLedger, SettleResult},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderLedger for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, LedgerError> {
        order.validate().map_err(LedgerError::InvalidOrder)?;
        let mut tx = self.pool.begin().await?;
        let saved = orders::insert_order(&order, &mut tx).await?;
        let items = orders::insert_order_items(&order.order_id, &order.items, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Order {} for {} with {} line items has been saved in the DB with id {}",
            saved.order_id,
            saved.total_amount,
            items.len(),
            saved.id
        );
        Ok(saved)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_gateway_reference(&self, gateway_reference: &str) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = charge_requests::fetch_order_by_gateway_reference(gateway_reference, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_payments_for_order(order_id, &mut conn).await?;
        Ok(payments)
    }

    async fn record_charge_request(&self, request: NewChargeRequest) -> Result<ChargeRequest, LedgerError> {
        let mut tx = self.pool.begin().await?;
        if orders::fetch_order_by_order_id(&request.order_id, &mut tx).await?.is_none() {
            tx.rollback().await?;
            return Err(LedgerError::OrderNotFound(request.order_id));
        }
        let saved = charge_requests::insert_charge_request(&request, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Charge request {} recorded for order {}", saved.gateway_reference, saved.order_id);
        Ok(saved)
    }

    async fn settle_order(&self, payment: NewPayment) -> Result<SettleResult, LedgerError> {
        let order_id = payment.order_id.clone();
        let mut tx = self.pool.begin().await?;
        let transitioned = orders::conditional_mark_paid(
            &order_id,
            OrderStatusType::Pending,
            OrderStatusType::Paid,
            payment.received_at,
            &mut tx,
        )
        .await?;
        if !transitioned {
            tx.rollback().await?;
            trace!("🗃️ Order {order_id} was not pending. Nothing was written.");
            return self.already_settled(&order_id).await;
        }
        let saved = match payments::idempotent_insert(&payment, &mut tx).await? {
            InsertPaymentResult::Inserted(p) => p,
            InsertPaymentResult::AlreadyExists => {
                tx.rollback().await?;
                warn!(
                    "🗃️ Order {order_id} was pending, but payment {:?} has already been recorded. The status change \
                     has been rolled back.",
                    payment.transaction_id
                );
                return self.already_settled(&order_id).await;
            },
        };
        let order = orders::fetch_order_by_order_id(&order_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} settled with payment #{} of {}", saved.id, saved.amount);
        Ok(SettleResult::Settled { order, payment: saved })
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Migrations that have already been applied are skipped.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn already_settled(&self, order_id: &OrderId) -> Result<SettleResult, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.clone()))?;
        let payments = payments::fetch_payments_for_order(order_id, &mut conn).await?;
        Ok(SettleResult::AlreadySettled { order, payments })
    }
}
