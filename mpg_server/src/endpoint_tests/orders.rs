use actix_web::{http::StatusCode, web, web::ServiceConfig};
use mpg_engine::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType},
    LedgerError,
    OrderApi,
};
use serde_json::Value;

use super::{
    helpers::{get_request, item, order, payment, post_request},
    mocks::MockLedger,
};
use crate::routes::{CheckoutRoute, OrderByIdRoute, OrdersSearchRoute, PaymentsForOrderRoute};

#[actix_web::test]
async fn fetch_order_details() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/O1", configure).await;
    assert_eq!(status, StatusCode::OK);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body["order"]["order_id"], "O1");
    assert_eq!(body["order"]["status"], "Paid");
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["payments"][0]["transaction_id"], "QK1");
}

#[actix_web::test]
async fn fetch_missing_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/zzz", configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body["error"], "The data was not found. Order zzz does not exist");
}

#[actix_web::test]
async fn fetch_payments() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/O1/payments", configure).await;
    assert_eq!(status, StatusCode::OK);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    let payments = body.as_array().unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["amount"], 68000);
    let (status, _) = get_request("/orders/zzz/payments", configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn search_orders_by_phone() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/search/orders?phone_number=254712345678", configure).await;
    assert_eq!(status, StatusCode::OK);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (status, _) = get_request("/search/orders?colour=red", configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn checkout_creates_pending_order() {
    let _ = env_logger::try_init().ok();
    let checkout = r#"{"order_id": "O7", "user_id": "buyer-17", "total_amount": 68000,
        "phone_number": "0712345678", "delivery_address": "Stall 4, Wakulima Market, Nairobi",
        "items": [{"product_id": "tomatoes", "product_name": "Tomatoes", "unit_price": 12000, "quantity": 3},
                  {"product_id": "delivery", "product_name": "Delivery", "unit_price": 32000, "quantity": 1}]}"#;
    let (status, body) = post_request("/orders", checkout, &[], configure).await;
    assert_eq!(status, StatusCode::CREATED);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body["order_id"], "O7");
    assert_eq!(body["status"], "Pending");
    assert_eq!(body["total_amount"], 68000);
}

#[actix_web::test]
async fn checkout_twice() {
    let _ = env_logger::try_init().ok();
    let checkout = r#"{"order_id": "O1", "user_id": "buyer-17", "total_amount": 68000,
        "phone_number": "0712345678", "delivery_address": "Nairobi"}"#;
    let (status, _) = post_request("/orders", checkout, &[], configure).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

fn configure(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_order().returning(|id| match id.as_str() {
        "O1" => Ok(Some(order("O1", 680, OrderStatusType::Paid))),
        _ => Ok(None),
    });
    ledger
        .expect_fetch_order_items()
        .returning(|_| Ok(vec![item("O1", "Tomatoes", 120, 3), item("O1", "Delivery", 320, 1)]));
    ledger.expect_fetch_payments_for_order().returning(|_| Ok(vec![payment("O1", 680, "QK1")]));
    ledger.expect_fetch_orders().returning(|query| {
        assert_eq!(query.phone_number.as_deref(), Some("254712345678"));
        Ok(vec![order("O1", 680, OrderStatusType::Paid)])
    });
    ledger.expect_insert_order().returning(|new_order| match new_order.order_id.as_str() {
        "O1" => Err(LedgerError::OrderAlreadyExists(OrderId::from("O1"))),
        _ => Ok(created(new_order)),
    });
    cfg.app_data(web::Data::new(OrderApi::new(ledger)))
        .service(CheckoutRoute::<MockLedger>::new())
        .service(OrderByIdRoute::<MockLedger>::new())
        .service(PaymentsForOrderRoute::<MockLedger>::new())
        .service(OrdersSearchRoute::<MockLedger>::new());
}

fn created(new_order: NewOrder) -> Order {
    let mut result = order(new_order.order_id.as_str(), 0, OrderStatusType::Pending);
    result.total_amount = new_order.total_amount;
    result.user_id = new_order.user_id;
    result.phone_number = new_order.phone_number;
    result.delivery_address = new_order.delivery_address;
    result
}
