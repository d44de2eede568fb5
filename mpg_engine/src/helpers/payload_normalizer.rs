//! Turns a loosely structured payment callback into a [`NormalizedNotification`].
//!
//! Gateways (and the aggregators that sit in front of them) disagree on what to call things. Each logical field has
//! an ordered list of [`FieldExtractor`]s, and the first one that yields a present, non-empty value wins.
//!
//! Native STK-push callbacks nest everything under `Body.stkCallback` and carry the payment details as a list of
//! `{Name, Value}` items. They don't carry the order id at all, only the gateway reference of the charge, which is
//! reported as [`OrderReference::GatewayReference`] for the engine to resolve.
use log::*;
use mpg_common::Money;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::db_types::OrderId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("The callback body is not valid JSON. {0}")]
    MalformedPayload(String),
    #[error("The callback payload must be a JSON object")]
    NotAnObject,
    #[error("Missing {0} in payload")]
    MissingField(&'static str),
    #[error("Invalid amount in payload: {0}")]
    InvalidAmount(String),
    #[error("The payment was not completed ({code}): {description}")]
    PaymentNotCompleted { code: i64, description: String },
}

/// How a notification identifies the order it pays for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OrderReference {
    OrderId(OrderId),
    /// The gateway's reference for the charge (`CheckoutRequestID`). Resolved via the recorded charge request.
    GatewayReference(String),
}

impl std::fmt::Display for OrderReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderReference::OrderId(id) => write!(f, "{id}"),
            OrderReference::GatewayReference(r) => write!(f, "gateway reference {r}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedNotification {
    pub order_ref: OrderReference,
    pub paid_amount: Money,
    pub transaction_id: Option<String>,
    pub payer_phone: Option<String>,
}

/// A strategy for pulling one value out of a callback payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldExtractor {
    /// A key at the top level of the payload
    Key(&'static str),
    /// A path through nested objects, e.g. `metadata.order_id`
    Path(&'static [&'static str]),
    /// A named entry in the `Body.stkCallback.CallbackMetadata.Item` list of an STK callback
    StkItem(&'static str),
}

impl FieldExtractor {
    /// Returns the value this strategy points at, if it is present. `null` and blank strings count as absent.
    pub fn extract<'a>(&self, payload: &'a Value) -> Option<&'a Value> {
        let value = match self {
            FieldExtractor::Key(key) => payload.get(*key),
            FieldExtractor::Path(path) => path.iter().try_fold(payload, |v, key| v.get(*key)),
            FieldExtractor::StkItem(name) => stk_callback(payload)?
                .pointer("/CallbackMetadata/Item")?
                .as_array()?
                .iter()
                .find(|item| item.get("Name").and_then(Value::as_str) == Some(*name))
                .and_then(|item| item.get("Value")),
        }?;
        is_present(value).then_some(value)
    }
}

use FieldExtractor::{Key, Path, StkItem};

pub const ORDER_ID_EXTRACTORS: &[FieldExtractor] =
    &[Path(&["metadata", "order_id"]), Key("invoice"), Key("order_id"), Key("AccountReference")];
pub const GATEWAY_REFERENCE_EXTRACTORS: &[FieldExtractor] =
    &[Path(&["Body", "stkCallback", "CheckoutRequestID"]), Key("CheckoutRequestID")];
pub const AMOUNT_EXTRACTORS: &[FieldExtractor] =
    &[Key("amount"), Key("paid_amount"), Key("transactionAmount"), Key("Amount"), StkItem("Amount")];
pub const TRANSACTION_ID_EXTRACTORS: &[FieldExtractor] =
    &[Key("transaction_id"), Key("checkout_request_id"), Key("txid"), Key("TransID"), StkItem("MpesaReceiptNumber")];
pub const PAYER_PHONE_EXTRACTORS: &[FieldExtractor] =
    &[Key("msisdn"), Key("phone"), Key("customer_msisdn"), Key("MSISDN"), StkItem("PhoneNumber")];

/// Parses the raw callback body and normalizes it. See [`normalize`].
pub fn normalize_raw(body: &[u8]) -> Result<NormalizedNotification, NormalizationError> {
    let payload = serde_json::from_slice::<Value>(body).map_err(|e| NormalizationError::MalformedPayload(e.to_string()))?;
    normalize(&payload)
}

/// Extracts the canonical notification from a callback payload.
///
/// * An STK callback with a non-zero `ResultCode` is reported as [`NormalizationError::PaymentNotCompleted`].
/// * The order reference and the amount are mandatory.
/// * The transaction id and the payer's phone number are optional.
pub fn normalize(payload: &Value) -> Result<NormalizedNotification, NormalizationError> {
    if !payload.is_object() {
        return Err(NormalizationError::NotAnObject);
    }
    check_result_code(payload)?;
    let order_ref = match first_text(payload, ORDER_ID_EXTRACTORS) {
        Some(id) => OrderReference::OrderId(OrderId::from(id)),
        None => first_text(payload, GATEWAY_REFERENCE_EXTRACTORS)
            .map(OrderReference::GatewayReference)
            .ok_or(NormalizationError::MissingField("order_id"))?,
    };
    let amount = AMOUNT_EXTRACTORS
        .iter()
        .find_map(|x| x.extract(payload))
        .ok_or(NormalizationError::MissingField("amount"))?;
    let paid_amount = to_money(amount)?;
    let transaction_id = first_text(payload, TRANSACTION_ID_EXTRACTORS);
    let payer_phone = first_text(payload, PAYER_PHONE_EXTRACTORS);
    let result = NormalizedNotification { order_ref, paid_amount, transaction_id, payer_phone };
    trace!("🔄️ Normalized callback: {result:?}");
    Ok(result)
}

fn stk_callback(payload: &Value) -> Option<&Value> {
    payload.pointer("/Body/stkCallback")
}

fn check_result_code(payload: &Value) -> Result<(), NormalizationError> {
    let Some(code) = stk_callback(payload).and_then(|stk| stk.get("ResultCode")) else {
        return Ok(());
    };
    let code = match code {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .unwrap_or(-1);
    if code == 0 {
        return Ok(());
    }
    let description = stk_callback(payload)
        .and_then(|stk| stk.get("ResultDesc"))
        .and_then(Value::as_str)
        .unwrap_or("No description given")
        .to_string();
    Err(NormalizationError::PaymentNotCompleted { code, description })
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// Strings are trimmed; numbers are printed as-is. Anything else is not a usable identifier.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_text(payload: &Value, extractors: &[FieldExtractor]) -> Option<String> {
    extractors.iter().filter_map(|x| x.extract(payload)).find_map(as_text)
}

fn to_money(value: &Value) -> Result<Money, NormalizationError> {
    let amount = match value {
        Value::Number(n) => match n.as_i64() {
            Some(units) => units.checked_mul(mpg_common::MINOR_UNITS_PER_MAJOR).map(Money::from).ok_or_else(|| {
                NormalizationError::InvalidAmount(format!("{n} is out of range"))
            })?,
            None => n
                .as_f64()
                .ok_or_else(|| NormalizationError::InvalidAmount(n.to_string()))
                .and_then(|f| Money::try_from_major_f64(f).map_err(|e| NormalizationError::InvalidAmount(e.to_string())))?,
        },
        Value::String(s) => s.parse::<Money>().map_err(|e| NormalizationError::InvalidAmount(e.to_string()))?,
        other => return Err(NormalizationError::InvalidAmount(format!("{other} is not a number"))),
    };
    if !amount.is_positive() {
        return Err(NormalizationError::InvalidAmount(format!("{amount} is not a positive amount")));
    }
    Ok(amount)
}
