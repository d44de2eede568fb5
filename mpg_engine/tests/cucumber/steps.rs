use cucumber::{then, when};
use mpg_common::Money;
use mpg_engine::{
    db_types::{NewOrder, NewOrderItem, OrderId, OrderStatusType},
    ReconciliationError,
    ReconciliationOutcome,
};
use serde_json::Value;

use crate::cucumber::GatewayWorld;

#[when(expr = "customer '{word}' checks out order {word} for {int} KES")]
async fn checkout(world: &mut GatewayWorld, user_id: String, order_id: String, total: i64) {
    let order = NewOrder::new(OrderId::from(order_id), user_id, Money::from_major(total))
        .with_contact("0712345678", "Nakuru")
        .with_item(NewOrderItem::new("p1", "Maize flour", Money::from_major(total), 1));
    world.orders().checkout(order).await.expect("Error placing order");
}

#[when(expr = "the gateway sends the callback {string}")]
async fn send_callback(world: &mut GatewayWorld, body: String) {
    let payload = serde_json::from_str::<Value>(&body).expect("Callback in feature file is not valid JSON");
    let result = world.api().process_callback(&payload).await;
    world.last_result = Some(result);
}

#[then(expr = "the callback is accepted as {word}")]
async fn callback_accepted(world: &mut GatewayWorld, outcome: String) {
    let expected = match outcome.as_str() {
        "settled" => ReconciliationOutcome::Settled,
        "duplicate" => ReconciliationOutcome::Duplicate,
        _ => panic!("Unknown outcome {outcome}"),
    };
    match world.last_result() {
        Ok(result) => assert_eq!(result.outcome, expected),
        Err(e) => panic!("Callback was rejected: {e}"),
    }
}

#[then(expr = "the callback is rejected because of an amount mismatch")]
async fn rejected_amount(world: &mut GatewayWorld) {
    let result = world.last_result();
    assert!(matches!(result, Err(ReconciliationError::AmountMismatch { .. })), "{result:?}");
}

#[then(expr = "the callback is rejected because order {word} does not exist")]
async fn rejected_not_found(world: &mut GatewayWorld, order_id: String) {
    match world.last_result() {
        Err(ReconciliationError::OrderNotFound(id)) => assert_eq!(id, &order_id),
        other => panic!("Expected OrderNotFound, got {other:?}"),
    }
}

#[then(expr = "the confirmation says {string}")]
async fn confirmation(world: &mut GatewayWorld, prompt: String) {
    let result = world.last_result().as_ref().expect("Callback was rejected");
    assert_eq!(result.prompt, prompt);
}

#[then(expr = "order {word} is {word}")]
async fn order_status(world: &mut GatewayWorld, order_id: String, status: String) {
    let status = status.parse::<OrderStatusType>().expect("Not a valid order status");
    let order = world.orders().order_by_id(&OrderId::from(order_id)).await.unwrap().expect("Order does not exist");
    assert_eq!(order.status, status);
}

#[then(expr = "order {word} has {int} payment(s)")]
async fn payment_count(world: &mut GatewayWorld, order_id: String, count: usize) {
    let payments = world.orders().payments_for_order(&OrderId::from(order_id)).await.unwrap();
    assert_eq!(payments.len(), count);
}
