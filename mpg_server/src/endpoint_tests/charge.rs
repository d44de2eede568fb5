use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Utc;
use mpesa_tools::{ChargeAcknowledgement, MpesaApiError};
use mpg_common::Money;
use mpg_engine::{
    db_types::{ChargeRequest, OrderId, OrderStatusType},
    OrderApi,
};
use serde_json::{json, Value};

use super::{
    helpers::{order, post_request},
    mocks::{MockCharger, MockLedger},
};
use crate::routes::ChargeRoute;

const CHARGE: &str = r#"{"amount": 680, "phone": "0712345678", "accountReference": "O1"}"#;

#[actix_web::test]
async fn charge_is_pushed_and_recorded() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/charge", CHARGE, &[], configure_accepted).await;
    assert_eq!(status, StatusCode::OK);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body["CheckoutRequestID"], "ws_CO_191220191020363925");
    assert_eq!(body["ResponseCode"], "0");
    assert_eq!(body["CustomerMessage"], "Success. Request accepted for processing");
}

#[actix_web::test]
async fn charge_for_unknown_reference_is_not_recorded() {
    let _ = env_logger::try_init().ok();
    let charge = r#"{"amount": 50.5, "phone": "254712345678", "accountReference": "market-stall-4"}"#;
    let (status, body) = post_request("/charge", charge, &[], configure_unknown_reference).await;
    assert_eq!(status, StatusCode::OK);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body["CheckoutRequestID"], "ws_CO_191220191020363925");
}

#[actix_web::test]
async fn charge_with_invalid_phone() {
    let _ = env_logger::try_init().ok();
    let charge = r#"{"amount": 680, "phone": "12ab", "accountReference": "O1"}"#;
    let (status, body) = post_request("/charge", charge, &[], configure_invalid_phone).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid input. Invalid phone number: 12ab");
}

#[actix_web::test]
async fn charge_without_phone() {
    let _ = env_logger::try_init().ok();
    let (status, _) = post_request("/charge", r#"{"amount": 680}"#, &[], configure_untouched).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn charge_rejected_by_gateway() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/charge", CHARGE, &[], configure_rejected).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let body = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn gateway_unreachable() {
    let _ = env_logger::try_init().ok();
    let (status, _) = post_request("/charge", CHARGE, &[], configure_unavailable).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
}

fn acknowledgement() -> ChargeAcknowledgement {
    serde_json::from_value(json!({
        "MerchantRequestID": "29115-34620561-1",
        "CheckoutRequestID": "ws_CO_191220191020363925",
        "ResponseCode": "0",
        "ResponseDescription": "Success. Request accepted for processing",
        "CustomerMessage": "Success. Request accepted for processing"
    }))
    .unwrap()
}

fn register(cfg: &mut ServiceConfig, ledger: MockLedger, charger: MockCharger) {
    cfg.app_data(web::Data::new(OrderApi::new(ledger)))
        .app_data(web::Data::new(charger))
        .service(ChargeRoute::<MockLedger, MockCharger>::new());
}

fn configure_untouched(cfg: &mut ServiceConfig) {
    register(cfg, MockLedger::new(), MockCharger::new());
}

fn configure_accepted(cfg: &mut ServiceConfig) {
    let mut charger = MockCharger::new();
    charger
        .expect_initiate_charge()
        .withf(|reference, amount, phone| reference == "O1" && *amount == Money::from_major(680) && phone == "0712345678")
        .times(1)
        .returning(|_, _, _| Ok(acknowledgement()));
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_order().returning(|_| Ok(Some(order("O1", 680, OrderStatusType::Pending))));
    ledger
        .expect_record_charge_request()
        .withf(|req| req.order_id == OrderId::from("O1") && req.gateway_reference == "ws_CO_191220191020363925")
        .times(1)
        .returning(|req| {
            Ok(ChargeRequest {
                id: 1,
                order_id: req.order_id,
                gateway_reference: req.gateway_reference,
                merchant_request_id: req.merchant_request_id,
                amount: req.amount,
                phone: req.phone,
                created_at: Utc::now(),
            })
        });
    register(cfg, ledger, charger);
}

fn configure_unknown_reference(cfg: &mut ServiceConfig) {
    let mut charger = MockCharger::new();
    charger
        .expect_initiate_charge()
        .withf(|_, amount, _| *amount == Money::from(5050))
        .returning(|_, _, _| Ok(acknowledgement()));
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_order().returning(|_| Ok(None));
    ledger.expect_record_charge_request().never();
    register(cfg, ledger, charger);
}

fn configure_invalid_phone(cfg: &mut ServiceConfig) {
    let mut charger = MockCharger::new();
    charger
        .expect_initiate_charge()
        .returning(|_, _, phone| Err(MpesaApiError::InvalidPhoneNumber(phone.to_string())));
    register(cfg, MockLedger::new(), charger);
}

fn configure_rejected(cfg: &mut ServiceConfig) {
    let mut charger = MockCharger::new();
    charger.expect_initiate_charge().returning(|_, _, _| {
        Err(MpesaApiError::GatewayRejected { status: 400, message: "Bad Request - Invalid PhoneNumber".into() })
    });
    register(cfg, MockLedger::new(), charger);
}

fn configure_unavailable(cfg: &mut ServiceConfig) {
    let mut charger = MockCharger::new();
    charger
        .expect_initiate_charge()
        .returning(|_, _, _| Err(MpesaApiError::GatewayUnavailable("operation timed out".into())));
    register(cfg, MockLedger::new(), charger);
}
