//! # M-Pesa tools
//!
//! A thin client for push-style mobile-money gateways that follow the M-Pesa "Daraja" STK-push flow:
//!
//! 1. Fetch a short-lived OAuth access token using the consumer key and secret.
//! 2. Submit a charge request, signed with a password derived from the shortcode, passkey and a timestamp.
//! 3. The gateway prompts the buyer on their phone and later pushes the outcome to the configured callback URL.
//!
//! This crate only handles steps 1 and 2 (the *charge initiator*). Callbacks are the payment engine's business.
mod api;
mod config;
mod data_objects;
mod error;
pub mod helpers;

pub use api::{ChargeInitiator, MpesaApi};
pub use config::{MpesaConfig, MpesaEnvironment};
pub use data_objects::{AccessToken, ChargeAcknowledgement, StkPushRequest};
pub use error::MpesaApiError;
