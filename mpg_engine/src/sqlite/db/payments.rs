use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayment, OrderId, Payment, PaymentStatus},
    sqlite::db::SqliteDatabaseError,
    traits::InsertPaymentResult,
};

/// Inserts the payment, unless one with the same `(order_id, transaction_id)` has already been recorded.
///
/// Payments without a transaction id are not covered by the unique index, so the caller has to guarantee (with the
/// order status compare-and-swap) that those can't be written twice.
pub async fn idempotent_insert(
    payment: &NewPayment,
    conn: &mut SqliteConnection,
) -> Result<InsertPaymentResult, SqliteDatabaseError> {
    match sqlx::query_as::<_, Payment>(
        r#"
            INSERT INTO payments (order_id, amount, transaction_id, payer_phone, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(payment.order_id.as_str())
    .bind(payment.amount)
    .bind(payment.transaction_id.as_deref())
    .bind(payment.payer_phone.as_deref())
    .bind(PaymentStatus::Confirmed.to_string())
    .bind(payment.received_at)
    .fetch_one(conn)
    .await
    {
        Ok(payment) => Ok(InsertPaymentResult::Inserted(payment)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(InsertPaymentResult::AlreadyExists),
        Err(e) => Err(SqliteDatabaseError::from(e)),
    }
}

pub async fn fetch_payments_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, SqliteDatabaseError> {
    let payments = sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(payments)
}
