//! The public API of the payment gateway engine.
//!
//! * [`order_api::OrderApi`] places orders and reads them back. It never changes an order's status.
//! * [`reconciliation_api::ReconciliationApi`] turns payment callbacks into settled orders. It is the only writer of
//!   the `Pending → Paid` transition.
//!
//! Both are generic over an [`crate::traits::OrderLedger`] backend.
pub mod errors;
pub mod order_api;
pub mod order_objects;
pub mod reconciliation_api;
