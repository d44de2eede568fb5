//! The reconciliation engine.
//!
//! Payment callbacks arrive at least once, possibly concurrently, and in no particular order. Reconciliation turns
//! each of them into at most one durable `Pending → Paid` transition:
//!
//! 1. Find the order, either by id or by the gateway reference of the charge.
//! 2. Check the amount paid against the order total, within a tolerance.
//! 3. If the order is already paid, report a duplicate. Nothing is written.
//! 4. Otherwise settle the order: the conditional status change and the payment insert happen in one transaction.
//!    Losing a race at this point is also reported as a duplicate.
//! 5. Build the confirmation prompt shown to the buyer.
//!
//! Lock contention in the ledger is retried a few times. It is the only error that is.
use std::{fmt::Debug, time::Duration};

use log::*;
use mpg_common::Money;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    db_types::{NewPayment, Order, OrderItem, Payment},
    events::{EventProducers, OrderPaidEvent, PaymentAnomalyEvent},
    helpers::{normalize, NormalizedNotification, OrderReference},
    mpg_api::errors::ReconciliationError,
    traits::{LedgerError, OrderLedger, SettleResult},
};

pub const DEFAULT_AMOUNT_TOLERANCE: Money = Money::from_minor(50);
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 2;
const CONFLICT_BACKOFF: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationOptions {
    /// The largest difference between the order total and the amount paid that is still accepted
    pub amount_tolerance: Money,
    /// How many times a settlement that hit lock contention is retried before giving up
    pub max_conflict_retries: u32,
}

impl Default for ReconciliationOptions {
    fn default() -> Self {
        Self { amount_tolerance: DEFAULT_AMOUNT_TOLERANCE, max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationOutcome {
    /// This notification paid the order.
    Settled,
    /// The order had already been paid. The notification was acknowledged, but changed nothing.
    Duplicate,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    pub outcome: ReconciliationOutcome,
    pub order: Order,
    /// For duplicates, the amount of the payment that actually settled the order
    pub paid_amount: Money,
    pub transaction_id: Option<String>,
    /// Human-readable confirmation for the buyer
    pub prompt: String,
}

impl ReconciliationResult {
    pub fn is_duplicate(&self) -> bool {
        self.outcome == ReconciliationOutcome::Duplicate
    }
}

/// `ReconciliationApi` is the only component that ever marks an order as paid.
pub struct ReconciliationApi<B> {
    db: B,
    producers: EventProducers,
    options: ReconciliationOptions,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?})", self.options)
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, options: ReconciliationOptions::default() }
    }

    pub fn with_options(mut self, options: ReconciliationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ReconciliationOptions {
        &self.options
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> ReconciliationApi<B>
where B: OrderLedger
{
    /// Normalizes an (already authenticated) callback payload and reconciles it.
    pub async fn process_callback(&self, payload: &Value) -> Result<ReconciliationResult, ReconciliationError> {
        let notification = normalize(payload)?;
        self.reconcile(notification).await
    }

    pub async fn reconcile(
        &self,
        notification: NormalizedNotification,
    ) -> Result<ReconciliationResult, ReconciliationError> {
        let order = self.resolve_order(&notification.order_ref).await?;
        let received = notification.paid_amount;
        if order.total_amount.abs_diff(received) > self.options.amount_tolerance {
            warn!(
                "🔄️ Amount mismatch for order {}. Expected {}, received {received}. The notification was rejected.",
                order.order_id, order.total_amount
            );
            return Err(ReconciliationError::AmountMismatch {
                order_id: order.order_id,
                expected: order.total_amount,
                received,
            });
        }
        if order.is_paid() {
            debug!("🔄️ Order {} is already paid. Treating notification as a duplicate.", order.order_id);
            let payments = self.db.fetch_payments_for_order(&order.order_id).await?;
            return self.duplicate(order, payments, &notification).await;
        }
        let payment = NewPayment::new(order.order_id.clone(), received)
            .with_transaction_id(notification.transaction_id.clone())
            .with_payer_phone(notification.payer_phone.clone());
        match self.settle(payment).await? {
            SettleResult::Settled { order, payment } => {
                info!(
                    "🔄️ Order {} has been paid. {} received in transaction {}",
                    order.order_id,
                    payment.amount,
                    payment.transaction_id.as_deref().unwrap_or("N/A")
                );
                self.call_order_paid_hook(&order, &payment).await;
                let paid = payment.amount;
                let transaction_id = payment.transaction_id;
                self.confirmation(ReconciliationOutcome::Settled, order, paid, transaction_id).await
            },
            SettleResult::AlreadySettled { order, payments } => {
                debug!("🔄️ Order {} was paid by a concurrent notification", order.order_id);
                self.duplicate(order, payments, &notification).await
            },
        }
    }

    async fn resolve_order(&self, order_ref: &OrderReference) -> Result<Order, ReconciliationError> {
        let order = match order_ref {
            OrderReference::OrderId(id) => self.db.fetch_order(id).await?,
            OrderReference::GatewayReference(r) => self.db.fetch_order_by_gateway_reference(r).await?,
        };
        order.ok_or_else(|| {
            warn!("🔄️ Received a payment notification for {order_ref}, but no such order exists");
            match order_ref {
                OrderReference::OrderId(id) => ReconciliationError::OrderNotFound(id.as_str().to_string()),
                OrderReference::GatewayReference(r) => ReconciliationError::OrderNotFound(r.clone()),
            }
        })
    }

    /// Settles the order, retrying on lock contention. If the contention outlasts the retries, the order is read once
    /// more: if somebody else paid it in the meantime, this is a duplicate rather than a failure.
    async fn settle(&self, payment: NewPayment) -> Result<SettleResult, ReconciliationError> {
        let max_retries = self.options.max_conflict_retries;
        let mut attempt = 0;
        loop {
            match self.db.settle_order(payment.clone()).await {
                Err(LedgerError::StorageConflict(e)) if attempt < max_retries => {
                    attempt += 1;
                    warn!(
                        "🔄️ Storage conflict while settling order {}. Retrying ({attempt}/{max_retries}). {e}",
                        payment.order_id
                    );
                    tokio::time::sleep(CONFLICT_BACKOFF * attempt).await;
                },
                Err(LedgerError::StorageConflict(e)) => {
                    return match self.db.fetch_order(&payment.order_id).await? {
                        Some(order) if order.is_paid() => {
                            let payments = self.db.fetch_payments_for_order(&order.order_id).await?;
                            Ok(SettleResult::AlreadySettled { order, payments })
                        },
                        _ => {
                            error!(
                                "🔄️ Could not settle order {} after {max_retries} retries. {e}",
                                payment.order_id
                            );
                            Err(ReconciliationError::StorageConflict(e))
                        },
                    };
                },
                result => return result.map_err(ReconciliationError::from),
            }
        }
    }

    async fn duplicate(
        &self,
        order: Order,
        payments: Vec<Payment>,
        notification: &NormalizedNotification,
    ) -> Result<ReconciliationResult, ReconciliationError> {
        let recorded = payments.iter().filter_map(|p| p.transaction_id.clone()).collect::<Vec<String>>();
        if let Some(received) = &notification.transaction_id {
            if !recorded.is_empty() && !recorded.contains(received) {
                error!(
                    "🔄️ Order {} was paid by transaction(s) [{}], but another notification with transaction {received} \
                     has arrived. The buyer may have been charged twice. Manual review is required.",
                    order.order_id,
                    recorded.join(", ")
                );
                let event = PaymentAnomalyEvent::new(order.order_id.clone(), recorded, received.clone());
                self.call_payment_anomaly_hook(event).await;
            }
        }
        let (paid, transaction_id) = match payments.into_iter().next() {
            Some(p) => (p.amount, p.transaction_id),
            None => (notification.paid_amount, notification.transaction_id.clone()),
        };
        self.confirmation(ReconciliationOutcome::Duplicate, order, paid, transaction_id).await
    }

    async fn confirmation(
        &self,
        outcome: ReconciliationOutcome,
        order: Order,
        paid_amount: Money,
        transaction_id: Option<String>,
    ) -> Result<ReconciliationResult, ReconciliationError> {
        // The order is settled at this point, so a missing item list only degrades the prompt
        let items = self.db.fetch_order_items(&order.order_id).await.unwrap_or_else(|e| {
            warn!("🔄️ Could not fetch line items for order {}. {e}", order.order_id);
            Vec::new()
        });
        let prompt = confirmation_prompt(&order, &items, paid_amount, transaction_id.as_deref());
        Ok(ReconciliationResult { outcome, order, paid_amount, transaction_id, prompt })
    }

    async fn call_order_paid_hook(&self, order: &Order, payment: &Payment) {
        for emitter in &self.producers.order_paid_producer {
            debug!("🔄️ Notifying order paid hook subscribers");
            let event = OrderPaidEvent::new(order.clone(), payment.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_payment_anomaly_hook(&self, event: PaymentAnomalyEvent) {
        for emitter in &self.producers.payment_anomaly_producer {
            debug!("🔄️ Notifying payment anomaly hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }
}

fn currency_label(code: &str) -> &str {
    match code {
        "KES" => "KSh",
        other => other,
    }
}

/// The message shown to the buyer once their payment has been accepted, e.g.
///
/// `Thank you for your purchase! Order O1 for 2 x Tomatoes (KSh 120.00 each). Amount paid: KSh 240.00. Transaction
/// ID: T1.`
pub fn confirmation_prompt(order: &Order, items: &[OrderItem], paid: Money, transaction_id: Option<&str>) -> String {
    let currency = currency_label(&order.currency);
    let products = items
        .iter()
        .map(|it| format!("{} x {} ({currency} {} each)", it.quantity, it.product_name, it.unit_price))
        .collect::<Vec<String>>()
        .join(", ");
    format!(
        "Thank you for your purchase! Order {} for {products}. Amount paid: {currency} {paid}. Transaction ID: {}.",
        order.order_id.as_str(),
        transaction_id.unwrap_or("N/A")
    )
}
