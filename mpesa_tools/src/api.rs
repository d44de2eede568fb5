use std::sync::Arc;

use chrono::Utc;
use log::*;
use mpg_common::Money;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Response,
};
use serde_json::Value;

use crate::{
    config::MpesaConfig,
    data_objects::{AccessToken, ChargeAcknowledgement, StkPushRequest},
    helpers::{gateway_amount, gateway_timestamp, normalize_phone, stk_password},
    MpesaApiError,
};

const TOKEN_PATH: &str = "/oauth/v1/generate";
const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";
const DEFAULT_ACCOUNT_REFERENCE: &str = "ORDER";
const TRANSACTION_DESCRIPTION: &str = "Order payment";

/// Anything that can push a charge prompt to a buyer's phone.
///
/// Charge initiation is **not** idempotent at the gateway: every successful call prompts the buyer again. Callers must
/// never retry automatically; a retry is a new, explicit user action.
#[allow(async_fn_in_trait)]
pub trait ChargeInitiator {
    /// Requests a charge of `amount` from `phone`, tagged with `account_reference` (usually the order id).
    ///
    /// Returns the gateway's acknowledgment, which carries the gateway reference that later callbacks are correlated
    /// against.
    async fn initiate_charge(
        &self,
        account_reference: &str,
        amount: Money,
        phone: &str,
    ) -> Result<ChargeAcknowledgement, MpesaApiError>;
}

#[derive(Clone)]
pub struct MpesaApi {
    config: MpesaConfig,
    client: Arc<Client>,
}

impl MpesaApi {
    pub fn new(config: MpesaConfig) -> Result<Self, MpesaApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| MpesaApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    pub fn config(&self) -> &MpesaConfig {
        &self.config
    }

    /// Exchanges the consumer key and secret for a short-lived bearer token.
    pub async fn fetch_access_token(&self) -> Result<AccessToken, MpesaApiError> {
        let url = self.url(TOKEN_PATH);
        trace!("📲️ Requesting an access token from {url}");
        let response = self
            .client
            .get(url)
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(&self.config.consumer_key, Some(self.config.consumer_secret.reveal()))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            warn!("📲️ The gateway rejected our credentials. {status}. {message}");
            return Err(MpesaApiError::AuthError { status: status.as_u16(), message });
        }
        response.json::<AccessToken>().await.map_err(|e| {
            if e.is_timeout() {
                MpesaApiError::GatewayUnavailable(e.to_string())
            } else {
                MpesaApiError::AuthError { status: status.as_u16(), message: format!("Malformed token response. {e}") }
            }
        })
    }

    /// Builds a signed charge request. The password is only valid together with the timestamp it was derived from.
    pub fn build_charge_request(
        &self,
        account_reference: &str,
        amount: Money,
        phone: &str,
        timestamp: String,
    ) -> Result<StkPushRequest, MpesaApiError> {
        let amount = gateway_amount(amount)?;
        let phone = normalize_phone(phone, &self.config.country_code)?;
        let shortcode = self.config.shortcode.trim().parse::<u64>().map_err(|e| {
            MpesaApiError::Configuration(format!("The shortcode '{}' is not numeric. {e}", self.config.shortcode))
        })?;
        let password = stk_password(&self.config.shortcode, self.config.passkey.reveal(), &timestamp);
        let account_reference = match account_reference.trim() {
            "" => DEFAULT_ACCOUNT_REFERENCE.to_string(),
            s => s.to_string(),
        };
        Ok(StkPushRequest {
            business_short_code: shortcode,
            password,
            timestamp,
            transaction_type: self.config.transaction_type.clone(),
            amount,
            party_a: phone.clone(),
            party_b: shortcode,
            phone_number: phone,
            callback_url: self.config.callback_url.clone(),
            account_reference,
            transaction_desc: TRANSACTION_DESCRIPTION.to_string(),
        })
    }

    /// Submits a signed charge request. A 2xx response with a non-zero `ResponseCode` is still a rejection.
    pub async fn submit_charge(
        &self,
        token: &AccessToken,
        request: &StkPushRequest,
    ) -> Result<ChargeAcknowledgement, MpesaApiError> {
        let url = self.url(STK_PUSH_PATH);
        trace!("📲️ Submitting charge for {} to {url}", request.account_reference);
        let response = self.client.post(url).bearer_auth(&token.access_token).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            warn!("📲️ Charge for {} was rejected. {status}. {message}", request.account_reference);
            return Err(MpesaApiError::GatewayRejected { status: status.as_u16(), message });
        }
        let ack = response.json::<ChargeAcknowledgement>().await.map_err(|e| {
            if e.is_timeout() {
                MpesaApiError::GatewayUnavailable(e.to_string())
            } else {
                MpesaApiError::JsonError(e.to_string())
            }
        })?;
        if !ack.is_accepted() {
            let message = ack.response_description.clone().unwrap_or_else(|| "No reason given".to_string());
            warn!("📲️ Charge for {} was not accepted. {message}", request.account_reference);
            return Err(MpesaApiError::GatewayRejected { status: status.as_u16(), message });
        }
        Ok(ack)
    }
}

impl ChargeInitiator for MpesaApi {
    async fn initiate_charge(
        &self,
        account_reference: &str,
        amount: Money,
        phone: &str,
    ) -> Result<ChargeAcknowledgement, MpesaApiError> {
        // Validate before talking to the gateway at all
        let request = self.build_charge_request(account_reference, amount, phone, gateway_timestamp(Utc::now()))?;
        let token = self.fetch_access_token().await?;
        let ack = self.submit_charge(&token, &request).await?;
        info!(
            "📲️ Charge of {} for {} pushed to {}. Gateway reference: {}",
            request.amount,
            request.account_reference,
            request.phone_number,
            ack.gateway_reference()
        );
        Ok(ack)
    }
}

/// Pulls the most useful error description out of a failed gateway response.
async fn error_message(response: Response) -> String {
    let text = match response.text().await {
        Ok(t) => t,
        Err(e) => return format!("Could not read the response body. {e}"),
    };
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| {
            ["errorMessage", "error_description", "error", "ResponseDescription"]
                .iter()
                .find_map(|k| v[*k].as_str().map(String::from))
        })
        .unwrap_or(text)
}
