use std::{future::Future, pin::Pin, time::Duration};

use actix_web::{
    dev::Server,
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use log::*;
use mpesa_tools::MpesaApi;
use mpg_engine::{
    events::{EventHandlers, EventHooks, EventProducers, OrderPaidEvent, PaymentAnomalyEvent},
    OrderApi,
    ReconciliationApi,
    SqliteDatabase,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    middleware::{check_callback_peer, HmacMiddlewareFactory},
    routes::{
        health,
        ChargeRoute,
        CheckoutRoute,
        OrderByIdRoute,
        OrdersSearchRoute,
        PaymentCallbackRoute,
        PaymentsForOrderRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = MpesaApi::new(config.mpesa.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, default_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Hooks that only write to the log. Deployments that need to notify sellers or page an operator add their own.
pub fn default_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_paid(|ev: OrderPaidEvent| {
            Box::pin(async move {
                info!("📬️ Order {} paid in full ({}).", ev.order.order_id, ev.payment.amount);
            }) as HookFuture
        })
        .on_payment_anomaly(|ev: PaymentAnomalyEvent| {
            Box::pin(async move {
                error!(
                    "📬️ 🚨️ Order {} received payment {} after it was already paid by [{}]. Refund review required.",
                    ev.order_id,
                    ev.received_transaction_id,
                    ev.recorded_transaction_ids.join(", ")
                );
            }) as HookFuture
        });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: MpesaApi,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = OrderApi::new(db.clone());
        let reconciliation_api =
            ReconciliationApi::new(db.clone(), producers.clone()).with_options(config.reconciliation);
        let options = ServerOptions::from_config(&config);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mpg::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(options));
        let api_scope = web::scope("/api")
            .service(ChargeRoute::<SqliteDatabase, MpesaApi>::new())
            .service(CheckoutRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(PaymentsForOrderRoute::<SqliteDatabase>::new())
            .service(OrdersSearchRoute::<SqliteDatabase>::new());
        let whitelist = config.callback.whitelist.clone();
        let callback_scope = web::scope("/mpesa")
            .service(PaymentCallbackRoute::<SqliteDatabase>::new())
            .wrap(HmacMiddlewareFactory::new(config.callback.auth.clone()))
            // Registered last, so the peer is checked before the body is read
            .wrap_fn(move |req, srv| check_callback_peer(req, srv, whitelist.as_deref(), options));
        app.service(health).service(api_scope).service(callback_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
