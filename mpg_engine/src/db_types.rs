use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use mpg_common::{Money, DEFAULT_CURRENCY_CODE};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been placed and is awaiting payment.
    Pending,
    /// A payment notification matching the order has been accepted. This is a terminal state.
    Paid,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Paid => write!(f, "Paid"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// An opaque, stable order identifier. It is echoed to the gateway as the account reference of a charge, and is what
/// most callbacks use to point back at the order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generates a fresh order id for checkouts that do not supply their own.
    pub fn random() -> Self {
        Self(format!("ord-{:016x}", rand::random::<u64>()))
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    /// Reference to the buyer's account in the (external) user directory
    pub user_id: String,
    /// Fixed at checkout. Reconciliation never changes this.
    pub total_amount: Money,
    pub currency: String,
    pub phone_number: String,
    pub delivery_address: String,
    #[sqlx(try_from = "String")]
    pub status: OrderStatusType,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.status == OrderStatusType::Paid
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub user_id: String,
    /// The amount the buyer has to pay, including any delivery fees
    pub total_amount: Money,
    pub currency: String,
    pub phone_number: String,
    pub delivery_address: String,
    pub items: Vec<NewOrderItem>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, user_id: String, total_amount: Money) -> Self {
        Self {
            order_id,
            user_id,
            total_amount,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            phone_number: String::default(),
            delivery_address: String::default(),
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_contact<S: Into<String>>(mut self, phone_number: S, delivery_address: S) -> Self {
        self.phone_number = phone_number.into();
        self.delivery_address = delivery_address.into();
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_item(mut self, item: NewOrderItem) -> Self {
        self.items.push(item);
        self
    }

    /// Checks the invariants a checkout has to satisfy before it can be stored.
    pub fn validate(&self) -> Result<(), String> {
        if self.order_id.as_str().trim().is_empty() {
            return Err("The order id cannot be empty".to_string());
        }
        if !self.total_amount.is_positive() {
            return Err(format!("The order total must be positive, not {}", self.total_amount));
        }
        if let Some(item) = self.items.iter().find(|i| i.quantity <= 0 || i.unit_price.value() < 0) {
            return Err(format!("Line item {} has an invalid quantity or price", item.product_id));
        }
        Ok(())
    }
}

//--------------------------------------      OrderItem       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price: Money,
    pub quantity: i64,
    /// The farmer or merchant supplying the product
    pub seller: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub product_name: String,
    #[serde(default)]
    pub product_image: Option<String>,
    pub unit_price: Money,
    pub quantity: i64,
    #[serde(default)]
    pub seller: Option<String>,
}

impl NewOrderItem {
    pub fn new<S: Into<String>>(product_id: S, product_name: S, unit_price: Money, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            product_image: None,
            unit_price,
            quantity,
            seller: None,
        }
    }
}

//-----------------------------------------   PaymentStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Payments are only ever written once a notification has been accepted, so this is the only status.
    Confirmed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Confirmed => write!(f, "Confirmed"),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        if value != "Confirmed" {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to Confirmed");
        }
        PaymentStatus::Confirmed
    }
}

//--------------------------------------        Payment       ---------------------------------------------------------
/// The audit record of an accepted payment notification. Exactly one exists per paid order.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: OrderId,
    pub amount: Money,
    /// The gateway's transaction id (e.g. the M-Pesa receipt number), if the notification carried one
    pub transaction_id: Option<String>,
    pub payer_phone: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub amount: Money,
    pub transaction_id: Option<String>,
    pub payer_phone: Option<String>,
    /// When the notification was accepted. Also becomes the order's `paid_at` timestamp.
    pub received_at: DateTime<Utc>,
}

impl NewPayment {
    pub fn new(order_id: OrderId, amount: Money) -> Self {
        Self { order_id, amount, transaction_id: None, payer_phone: None, received_at: Utc::now() }
    }

    pub fn with_transaction_id(mut self, transaction_id: Option<String>) -> Self {
        self.transaction_id = transaction_id;
        self
    }

    pub fn with_payer_phone(mut self, payer_phone: Option<String>) -> Self {
        self.payer_phone = payer_phone;
        self
    }
}

//--------------------------------------     ChargeRequest     ---------------------------------------------------------
/// Correlates a gateway reference (the `CheckoutRequestID` of an STK push) with the order it was raised for.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub id: i64,
    pub order_id: OrderId,
    pub gateway_reference: String,
    pub merchant_request_id: Option<String>,
    pub amount: Money,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChargeRequest {
    pub order_id: OrderId,
    pub gateway_reference: String,
    pub merchant_request_id: Option<String>,
    pub amount: Money,
    pub phone: String,
}
