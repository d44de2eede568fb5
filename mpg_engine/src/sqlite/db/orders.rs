use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderStatusType},
    order_objects::OrderQueryFilter,
    sqlite::db::SqliteDatabaseError,
};

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// The line items are *not* written here. See [`insert_order_items`].
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, SqliteDatabaseError> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                user_id,
                total_amount,
                currency,
                phone_number,
                delivery_address,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(order.user_id.as_str())
    .bind(order.total_amount)
    .bind(order.currency.as_str())
    .bind(order.phone_number.as_str())
    .bind(order.delivery_address.as_str())
    .bind(OrderStatusType::Pending.to_string())
    .bind(order.created_at)
    .fetch_one(conn)
    .await;
    match result {
        Ok(order) => Ok(order),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(SqliteDatabaseError::DuplicateOrder(order.order_id.clone()))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn insert_order_items(
    order_id: &OrderId,
    items: &[NewOrderItem],
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, SqliteDatabaseError> {
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        let item: OrderItem = sqlx::query_as(
            r#"
                INSERT INTO order_items (
                    order_id,
                    product_id,
                    product_name,
                    product_image,
                    unit_price,
                    quantity,
                    seller
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *;
            "#,
        )
        .bind(order_id.as_str())
        .bind(item.product_id.as_str())
        .bind(item.product_name.as_str())
        .bind(item.product_image.as_deref())
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(item.seller.as_deref())
        .fetch_one(&mut *conn)
        .await?;
        result.push(item);
    }
    trace!("🗃️ {} line items saved for order {order_id}", result.len());
    Ok(result)
}

/// Returns the order with the given `order_id`, if it exists
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_items(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, SqliteDatabaseError> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// The compare-and-swap at the heart of settlement. The status of the order is only changed if it is currently
/// `expected`. Returns `true` if a row was changed.
///
/// Callers must treat `false` as "somebody else got there first" (or the order does not exist), and must not write
/// anything else that depends on the transition.
pub async fn conditional_mark_paid(
    order_id: &OrderId,
    expected: OrderStatusType,
    new_status: OrderStatusType,
    paid_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE orders SET status = $1, paid_at = $2, updated_at = $2 WHERE order_id = $3 AND status = $4",
    )
    .bind(new_status.to_string())
    .bind(paid_at)
    .bind(order_id.as_str())
    .bind(expected.to_string())
    .execute(conn)
    .await?;
    let changed = result.rows_affected() == 1;
    if changed {
        debug!("🗃️ Order {order_id} changed from {expected} to {new_status}");
    } else {
        debug!("🗃️ Order {order_id} was not {expected}. No change made.");
    }
    Ok(changed)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn fetch_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.0);
    }
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(phone) = query.phone_number {
        where_clause.push("phone_number = ");
        where_clause.push_bind_unseparated(phone);
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        let statuses = statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    builder.push(" ORDER BY created_at ASC, id ASC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("🗃️ Result of fetch_orders: {:?}", orders.len());
    Ok(orders)
}
