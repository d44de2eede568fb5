use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{ChargeRequest, NewChargeRequest, Order},
    sqlite::db::SqliteDatabaseError,
};

pub async fn insert_charge_request(
    request: &NewChargeRequest,
    conn: &mut SqliteConnection,
) -> Result<ChargeRequest, SqliteDatabaseError> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO charge_requests (order_id, gateway_reference, merchant_request_id, amount, phone, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(request.order_id.as_str())
    .bind(request.gateway_reference.as_str())
    .bind(request.merchant_request_id.as_deref())
    .bind(request.amount)
    .bind(request.phone.as_str())
    .bind(Utc::now())
    .fetch_one(conn)
    .await;
    match result {
        Ok(r) => Ok(r),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(SqliteDatabaseError::DuplicateChargeRequest(request.gateway_reference.clone()))
        },
        Err(e) => Err(e.into()),
    }
}

/// Returns the order that the charge with the given gateway reference was raised for
pub async fn fetch_order_by_gateway_reference(
    gateway_reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as(
        r#"
            SELECT orders.* FROM orders
            JOIN charge_requests ON charge_requests.order_id = orders.order_id
            WHERE charge_requests.gateway_reference = $1
        "#,
    )
    .bind(gateway_reference)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}
