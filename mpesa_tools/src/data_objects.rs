use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    /// Seconds. The gateway sends this as a string.
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// The charge (STK push) request body.
#[derive(Debug, Clone, Serialize)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: u64,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: i64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: u64,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

/// The gateway's synchronous acknowledgment of a charge request. Unknown fields are kept so that the response can be
/// handed back to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeAcknowledgement {
    #[serde(rename = "MerchantRequestID", default, skip_serializing_if = "Option::is_none")]
    pub merchant_request_id: Option<String>,
    /// The gateway reference that later callbacks are correlated against.
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode", default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<String>,
    #[serde(rename = "ResponseDescription", default, skip_serializing_if = "Option::is_none")]
    pub response_description: Option<String>,
    #[serde(rename = "CustomerMessage", default, skip_serializing_if = "Option::is_none")]
    pub customer_message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChargeAcknowledgement {
    /// A missing response code is taken as acceptance. Anything other than `"0"` is a rejection.
    pub fn is_accepted(&self) -> bool {
        self.response_code.as_deref().map(|c| c.trim() == "0").unwrap_or(true)
    }

    pub fn gateway_reference(&self) -> &str {
        self.checkout_request_id.as_str()
    }
}
