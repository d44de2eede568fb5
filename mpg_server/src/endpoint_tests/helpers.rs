use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use chrono::{TimeZone, Utc};
use log::debug;
use mpg_common::Money;
use mpg_engine::db_types::{Order, OrderId, OrderItem, OrderStatusType, Payment, PaymentStatus};

pub const CALLBACK_SECRET: &str = "the-gateway-and-i-share-this";
/// The remote address every test request is sent from
pub const GATEWAY_PEER: &str = "196.201.214.200";

pub async fn get_request(path: &str, configure: fn(&mut ServiceConfig)) -> (StatusCode, String) {
    let req = TestRequest::get().uri(path).to_request();
    send(req, configure).await
}

pub async fn post_request(
    path: &str,
    body: &str,
    headers: &[(&str, &str)],
    configure: fn(&mut ServiceConfig),
) -> (StatusCode, String) {
    let mut req = TestRequest::post()
        .uri(path)
        .insert_header(("Content-Type", "application/json"))
        .peer_addr(format!("{GATEWAY_PEER}:443").parse().unwrap())
        .set_payload(body.to_string());
    for (name, value) in headers {
        req = req.insert_header((*name, *value));
    }
    send(req.to_request(), configure).await
}

// Errors raised by middleware reach the test harness as `Err`, so they are rendered the way the server would
async fn send(req: actix_http::Request, configure: fn(&mut ServiceConfig)) -> (StatusCode, String) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = match test::try_call_service(&service, req).await {
        Ok(res) => res.into_parts().1,
        Err(e) => e.error_response(),
    };
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

pub fn order(order_id: &str, total: i64, status: OrderStatusType) -> Order {
    let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
    let paid_at = (status == OrderStatusType::Paid).then(|| Utc.with_ymd_and_hms(2024, 3, 1, 8, 32, 10).unwrap());
    Order {
        id: 1,
        order_id: OrderId::from(order_id),
        user_id: "buyer-17".to_string(),
        total_amount: Money::from_major(total),
        currency: "KES".to_string(),
        phone_number: "254712345678".to_string(),
        delivery_address: "Stall 4, Wakulima Market, Nairobi".to_string(),
        status,
        paid_at,
        created_at,
        updated_at: paid_at.unwrap_or(created_at),
    }
}

pub fn item(order_id: &str, name: &str, price: i64, quantity: i64) -> OrderItem {
    OrderItem {
        id: 1,
        order_id: OrderId::from(order_id),
        product_id: name.to_lowercase(),
        product_name: name.to_string(),
        product_image: None,
        unit_price: Money::from_major(price),
        quantity,
        seller: Some("Kamau Farm".to_string()),
    }
}

pub fn payment(order_id: &str, amount: i64, transaction_id: &str) -> Payment {
    Payment {
        id: 1,
        order_id: OrderId::from(order_id),
        amount: Money::from_major(amount),
        transaction_id: Some(transaction_id.to_string()),
        payer_phone: Some("254712345678".to_string()),
        status: PaymentStatus::Confirmed,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 32, 10).unwrap(),
    }
}
