//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use mpesa_tools::ChargeInitiator;
use mpg_common::Money;
use mpg_engine::{
    db_types::{NewChargeRequest, NewOrder, OrderId},
    helpers::NormalizationError,
    order_objects::OrderQueryFilter,
    OrderApi,
    OrderLedger,
    ReconciliationApi,
    ReconciliationError,
};
use serde_json::Value;

use crate::{
    config::ServerOptions,
    data_objects::{CallbackResponse, ChargeParams, CheckoutRequest},
    errors::ServerError,
    helpers::get_remote_ip,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Charge  ----------------------------------------------------
route!(charge => Post "/charge" impl OrderLedger, ChargeInitiator);
/// Pushes a payment prompt to the buyer's phone.
///
/// The body is a [`ChargeParams`] object: `{ "amount": 680, "phone": "0712345678", "accountReference": "O1" }`.
/// On success, the gateway's acknowledgment is returned verbatim. Its `CheckoutRequestID` is what the payment
/// callback for this charge will carry.
///
/// If `accountReference` names a known order, the charge is recorded against it so that the callback can be matched
/// to the order. The charge has been pushed at that point, so failing to record it is logged but not reported.
///
/// This route is never retried automatically: every successful call prompts the buyer again.
pub async fn charge<BLedger, BCharge>(
    body: web::Json<ChargeParams>,
    orders: web::Data<OrderApi<BLedger>>,
    gateway: web::Data<BCharge>,
) -> Result<HttpResponse, ServerError>
where
    BLedger: OrderLedger,
    BCharge: ChargeInitiator,
{
    let params = body.into_inner();
    debug!("💻️ POST charge for {} ({})", params.account_reference, params.amount);
    let amount = Money::try_from_major_f64(params.amount).map_err(|e| ServerError::InvalidInput(e.to_string()))?;
    let ack = gateway.initiate_charge(&params.account_reference, amount, &params.phone).await?;
    let order_id = OrderId::from(params.account_reference.trim());
    match orders.order_by_id(&order_id).await {
        Ok(Some(_)) => {
            let request = NewChargeRequest {
                order_id: order_id.clone(),
                gateway_reference: ack.gateway_reference().to_string(),
                merchant_request_id: ack.merchant_request_id.clone(),
                amount,
                phone: params.phone.clone(),
            };
            if let Err(e) = orders.record_charge_request(request).await {
                warn!("💻️ Charge {} was pushed, but could not be recorded against {order_id}. {e}", ack.gateway_reference());
            }
        },
        Ok(None) => {
            debug!("💻️ Charge reference {} is not a known order. Nothing to record.", params.account_reference);
        },
        Err(e) => warn!("💻️ Could not look up order {order_id} for charge {}. {e}", ack.gateway_reference()),
    }
    Ok(HttpResponse::Ok().json(ack))
}

//----------------------------------------------   Callback  ----------------------------------------------------
route!(payment_callback => Post "/callback" impl OrderLedger);
/// Receives the gateway's (asynchronous, at-least-once) payment notification.
///
/// By the time this handler runs, the signature has been verified by the HMAC middleware on the raw body.
///
/// * A notification that settles an order, or that repeats one that already did, gets a 200 with `success: true`.
/// * A payment the buyer did not complete gets a 200 with `success: false`. Nothing changes.
/// * Malformed payloads and amount mismatches get a 400, unknown orders a 404.
pub async fn payment_callback<B: OrderLedger>(
    req: HttpRequest,
    body: web::Bytes,
    options: web::Data<ServerOptions>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let peer = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    trace!("💻️ Payment callback from {peer:?}");
    let payload = serde_json::from_slice::<Value>(&body).map_err(|e| {
        warn!("💻️ Payment callback body is not valid JSON. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    match api.process_callback(&payload).await {
        Ok(result) => {
            info!("💻️ Payment callback for order {} processed. {:?}", result.order.order_id, result.outcome);
            Ok(HttpResponse::Ok().json(CallbackResponse::from(result)))
        },
        Err(ReconciliationError::Normalization(e @ NormalizationError::PaymentNotCompleted { .. })) => {
            info!("💻️ {e}");
            Ok(HttpResponse::Ok().json(CallbackResponse::failure(e)))
        },
        Err(e) => {
            warn!("💻️ Payment callback rejected. {e}");
            Err(e.into())
        },
    }
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(checkout => Post "/orders" impl OrderLedger);
/// Places a new order with its line items. See [`CheckoutRequest`] for the body.
pub async fn checkout<B: OrderLedger>(
    body: web::Json<CheckoutRequest>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order = NewOrder::from(body.into_inner());
    debug!("💻️ POST checkout for order {}", order.order_id);
    let order = api.checkout(order).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderLedger);
/// Fetches an order with its line items and payments.
pub async fn order_by_id<B: OrderLedger>(
    path: web::Path<OrderId>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order_by_id({order_id})");
    let details = api.order_details(&order_id).await.map_err(|e| {
        debug!("💻️ Could not fetch order. {e}");
        ServerError::from(e)
    })?;
    match details {
        Some(details) => Ok(HttpResponse::Ok().json(details)),
        None => Err(ServerError::NoRecordFound(format!("Order {order_id} does not exist"))),
    }
}

route!(payments_for_order => Get "/orders/{order_id}/payments" impl OrderLedger);
pub async fn payments_for_order<B: OrderLedger>(
    path: web::Path<OrderId>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET payments_for_order({order_id})");
    if api.order_by_id(&order_id).await?.is_none() {
        return Err(ServerError::NoRecordFound(format!("Order {order_id} does not exist")));
    }
    let payments = api.payments_for_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(payments))
}

route!(orders_search => Get "/search/orders" impl OrderLedger);
/// Searches orders by `order_id`, `user_id`, `phone_number`, and a `since`/`until` creation window.
pub async fn orders_search<B: OrderLedger>(
    query: web::Query<OrderQueryFilter>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    debug!("💻️ GET orders_search. {query}");
    let orders = api.search_orders(query).await?;
    Ok(HttpResponse::Ok().json(orders))
}
