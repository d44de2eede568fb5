//! # Mobile-money payment gateway server
//! This module hosts the server code for the payment gateway. It is responsible for:
//! Pushing charge prompts to buyers' phones via the mobile-money gateway.
//! Receiving the gateway's payment callbacks, verifying their signatures, and handing them to the reconciliation
//! engine, which marks the matching orders as paid.
//! Serving read-only views of orders and their payments.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `POST /api/charge`: Initiates a charge for an order.
//! * `POST /mpesa/callback`: The payment callback. Signed, and optionally restricted to whitelisted gateway IPs.
//! * `POST /api/orders`: Places an order.
//! * `GET /api/orders/{order_id}` and `GET /api/orders/{order_id}/payments`: Order details and payment history.
//! * `GET /api/search/orders`: Order search.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
