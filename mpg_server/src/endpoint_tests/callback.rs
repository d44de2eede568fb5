use std::net::IpAddr;

use actix_web::{http::StatusCode, web, web::ServiceConfig};
use mpg_engine::{
    db_types::{OrderId, OrderStatusType},
    events::EventProducers,
    helpers::{sign, CallbackAuth},
    ReconciliationApi,
    SettleResult,
};
use serde_json::Value;

use super::{
    helpers::{item, order, payment, post_request, CALLBACK_SECRET, GATEWAY_PEER},
    mocks::MockLedger,
};
use crate::{
    config::ServerOptions,
    middleware::{check_callback_peer, HmacMiddlewareFactory},
    routes::PaymentCallbackRoute,
};

const O1_CALLBACK: &str = r#"{"order_id": "O1", "amount": 680, "transaction_id": "QK1", "msisdn": "254712345678"}"#;

#[actix_web::test]
async fn signed_callback_settles_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_callback(O1_CALLBACK, Some(&signature(O1_CALLBACK)), configure_settle).await;
    assert_eq!(status, StatusCode::OK);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["outcome"], "Settled");
    assert_eq!(body["order"]["status"], "Paid");
    assert_eq!(
        body["prompt"],
        "Thank you for your purchase! Order O1 for 3 x Tomatoes (KSh 120.00 each), 1 x Delivery (KSh 320.00 each). \
         Amount paid: KSh 680.00. Transaction ID: QK1."
    );
}

#[actix_web::test]
async fn replayed_callback_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_callback(O1_CALLBACK, Some(&signature(O1_CALLBACK)), configure_already_paid).await;
    assert_eq!(status, StatusCode::OK);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["outcome"], "Duplicate");
    assert_eq!(body["message"], "Payment already processed.");
}

#[actix_web::test]
async fn callback_with_bad_signature() {
    let _ = env_logger::try_init().ok();
    let forged = sign(b"not-the-secret", O1_CALLBACK.as_bytes());
    let (status, body) = post_callback(O1_CALLBACK, Some(&forged), configure_untouched).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "The callback signature is missing or invalid.");
}

#[actix_web::test]
async fn callback_without_signature() {
    let _ = env_logger::try_init().ok();
    let (status, _) = post_callback(O1_CALLBACK, None, configure_untouched).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn signature_must_cover_the_exact_body() {
    let _ = env_logger::try_init().ok();
    // Same JSON, different bytes
    let reformatted = r#"{"order_id":"O1","amount":680,"transaction_id":"QK1","msisdn":"254712345678"}"#;
    let (status, _) = post_callback(reformatted, Some(&signature(O1_CALLBACK)), configure_untouched).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn callback_from_unlisted_peer_is_forbidden() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_callback(O1_CALLBACK, Some(&signature(O1_CALLBACK)), configure_other_peer).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Requests from this address are not allowed.");
}

#[actix_web::test]
async fn peer_is_checked_before_signature() {
    let _ = env_logger::try_init().ok();
    let (status, _) = post_callback(O1_CALLBACK, None, configure_other_peer).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn callback_with_wrong_amount() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"order_id": "O2", "amount": 450, "transaction_id": "QK2"}"#;
    let (status, body) = post_callback(payload, Some(&signature(payload)), configure_mismatch).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn callback_for_unknown_order() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"order_id": "zzz", "amount": 10}"#;
    let (status, body) = post_callback(payload, Some(&signature(payload)), configure_unknown).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body["error"], "The data was not found. Order zzz does not exist");
}

#[actix_web::test]
async fn callback_without_amount() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"order_id": "O1"}"#;
    let (status, _) = post_callback(payload, Some(&signature(payload)), configure_untouched).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn cancelled_stk_payment_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"Body": {"stkCallback": {"MerchantRequestID": "29115-34620561-1",
        "CheckoutRequestID": "ws_CO_191220191020363925", "ResultCode": 1032,
        "ResultDesc": "Request cancelled by user"}}}"#;
    let (status, body) = post_callback(payload, Some(&signature(payload)), configure_untouched).await;
    assert_eq!(status, StatusCode::OK);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "The payment was not completed (1032): Request cancelled by user");
}

async fn post_callback(
    payload: &str,
    signature: Option<&str>,
    configure: fn(&mut ServiceConfig),
) -> (StatusCode, String) {
    let headers = signature.map(|s| vec![("X-Mpesa-Signature", s)]).unwrap_or_default();
    post_request("/mpesa/callback", payload, &headers, configure).await
}

fn signature(payload: &str) -> String {
    sign(CALLBACK_SECRET.as_bytes(), payload.as_bytes())
}

// Test requests come from GATEWAY_PEER
fn register(cfg: &mut ServiceConfig, ledger: MockLedger) {
    register_with_whitelist(cfg, ledger, vec![GATEWAY_PEER.parse().unwrap()]);
}

fn register_with_whitelist(cfg: &mut ServiceConfig, ledger: MockLedger, whitelist: Vec<IpAddr>) {
    let api = ReconciliationApi::new(ledger, EventProducers::default());
    let options = ServerOptions::default();
    cfg.app_data(web::Data::new(api)).app_data(web::Data::new(options)).service(
        web::scope("/mpesa")
            .service(PaymentCallbackRoute::<MockLedger>::new())
            .wrap(HmacMiddlewareFactory::new(CallbackAuth::enforced(CALLBACK_SECRET)))
            .wrap_fn(move |req, srv| check_callback_peer(req, srv, Some(whitelist.as_slice()), options)),
    );
}

// Any call to the ledger fails the test
fn configure_untouched(cfg: &mut ServiceConfig) {
    register(cfg, MockLedger::new());
}

fn configure_other_peer(cfg: &mut ServiceConfig) {
    register_with_whitelist(cfg, MockLedger::new(), vec!["196.201.214.206".parse().unwrap()]);
}

fn configure_settle(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedger::new();
    ledger
        .expect_fetch_order()
        .withf(|id| id == &OrderId::from("O1"))
        .times(1)
        .returning(|_| Ok(Some(order("O1", 680, OrderStatusType::Pending))));
    ledger
        .expect_settle_order()
        .withf(|p| p.order_id == OrderId::from("O1") && p.transaction_id.as_deref() == Some("QK1"))
        .times(1)
        .returning(|_| {
            Ok(SettleResult::Settled {
                order: order("O1", 680, OrderStatusType::Paid),
                payment: payment("O1", 680, "QK1"),
            })
        });
    ledger
        .expect_fetch_order_items()
        .returning(|_| Ok(vec![item("O1", "Tomatoes", 120, 3), item("O1", "Delivery", 320, 1)]));
    register(cfg, ledger);
}

fn configure_already_paid(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_order().returning(|_| Ok(Some(order("O1", 680, OrderStatusType::Paid))));
    ledger.expect_fetch_payments_for_order().returning(|_| Ok(vec![payment("O1", 680, "QK1")]));
    ledger.expect_fetch_order_items().returning(|_| Ok(vec![item("O1", "Tomatoes", 120, 3)]));
    ledger.expect_settle_order().never();
    register(cfg, ledger);
}

fn configure_mismatch(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_order().returning(|_| Ok(Some(order("O2", 500, OrderStatusType::Pending))));
    ledger.expect_settle_order().never();
    register(cfg, ledger);
}

fn configure_unknown(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_order().returning(|_| Ok(None));
    register(cfg, ledger);
}
