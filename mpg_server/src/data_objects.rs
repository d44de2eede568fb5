use std::fmt::Display;

use mpg_common::{Money, DEFAULT_CURRENCY_CODE};
use mpg_engine::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId},
    ReconciliationOutcome,
    ReconciliationResult,
};
use serde::{Deserialize, Serialize};

/// The body of a charge initiation request. `amount` is in major units (e.g. `680` or `680.50`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeParams {
    pub amount: f64,
    pub phone: String,
    #[serde(default)]
    pub account_reference: String,
}

/// The answer to a payment callback. Gateways retry anything outside the 2xx range, so duplicates and payments the
/// buyer did not complete are also answered with a 200.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ReconciliationOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

impl CallbackResponse {
    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string(), outcome: None, prompt: None, order: None }
    }
}

impl From<ReconciliationResult> for CallbackResponse {
    fn from(result: ReconciliationResult) -> Self {
        let message = match result.outcome {
            ReconciliationOutcome::Settled => "Payment received. The order has been paid.",
            ReconciliationOutcome::Duplicate => "Payment already processed.",
        };
        Self {
            success: true,
            message: message.to_string(),
            outcome: Some(result.outcome),
            prompt: Some(result.prompt),
            order: Some(result.order),
        }
    }
}

/// The body of a checkout request. Amounts are in minor units. If no order id is given, one is generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    pub user_id: String,
    pub total_amount: Money,
    #[serde(default)]
    pub currency: Option<String>,
    pub phone_number: String,
    pub delivery_address: String,
    #[serde(default)]
    pub items: Vec<NewOrderItem>,
}

impl From<CheckoutRequest> for NewOrder {
    fn from(req: CheckoutRequest) -> Self {
        let order_id = req.order_id.unwrap_or_else(OrderId::random);
        let mut order = NewOrder::new(order_id, req.user_id, req.total_amount)
            .with_contact(req.phone_number, req.delivery_address)
            .with_currency(req.currency.unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string()));
        order.items = req.items;
        order
    }
}
