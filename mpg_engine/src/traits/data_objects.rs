use crate::db_types::{Order, Payment};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPaymentResult {
    Inserted(Payment),
    /// A payment with the same `(order_id, transaction_id)` pair has already been recorded
    AlreadyExists,
}

/// The result of an attempt to settle an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleResult {
    /// This call moved the order from `Pending` to `Paid` and recorded the payment.
    Settled { order: Order, payment: Payment },
    /// The order had already been paid. Nothing was written. `payments` holds what was recorded at the time.
    AlreadySettled { order: Order, payments: Vec<Payment> },
}
