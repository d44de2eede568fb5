use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId, Payment};

/// Published exactly once per order, when a payment notification moves it from `Pending` to `Paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub payment: Payment,
}

impl OrderPaidEvent {
    pub fn new(order: Order, payment: Payment) -> Self {
        Self { order, payment }
    }
}

/// Published when a duplicate notification for a paid order carries a transaction id that differs from the one that
/// settled it. The gateway still gets a benign "already processed" answer, but an operator needs to look at it: the
/// buyer may have been charged twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAnomalyEvent {
    pub order_id: OrderId,
    pub recorded_transaction_ids: Vec<String>,
    pub received_transaction_id: String,
    pub detected_at: DateTime<Utc>,
}

impl PaymentAnomalyEvent {
    pub fn new(order_id: OrderId, recorded_transaction_ids: Vec<String>, received_transaction_id: String) -> Self {
        Self { order_id, recorded_transaction_ids, received_transaction_id, detected_at: Utc::now() }
    }
}
