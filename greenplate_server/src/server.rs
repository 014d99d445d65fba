use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use greenplate_engine::{events::EventProducers, AccountApi, OrderFlowApi, ResaleApi, SqliteDatabase};

use crate::{
    auth::TokenVerifier,
    config::ServerConfig,
    errors::ServerError,
    integrations::{notifications::create_notification_event_handlers, razorpay::RazorpayGateway},
    middleware::HmacMiddlewareFactory,
    routes::{
        health,
        BuyResaleItemRoute,
        CancelOrderRoute,
        CheckoutRoute,
        MyOrdersRoute,
        ResaleFeedRoute,
        StallOrdersRoute,
        UpdateOrderStatusRoute,
        VerifyPaymentRoute,
        VerifyPickupRoute,
    },
    webhook_routes::PaymentsWebhookRoute,
};

pub const RAZORPAY_SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = RazorpayGateway::new(config.razorpay.clone())?;
    let handlers = create_notification_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: RazorpayGateway,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let (host, port) = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let orders_api =
            OrderFlowApi::new(db.clone(), gateway.clone(), producers.clone(), config.ready_refund_percent);
        let resale_api = ResaleApi::new(db.clone(), gateway.clone(), config.ready_refund_percent);
        let accounts_api = AccountApi::new(db.clone());
        let verifier = TokenVerifier::new(&config.auth);
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(
                RAZORPAY_SIGNATURE_HEADER,
                config.razorpay.webhook_secret.clone(),
                config.webhook_signature_checks,
            ))
            .service(PaymentsWebhookRoute::<SqliteDatabase, RazorpayGateway>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("gps::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(resale_api))
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(verifier))
            .service(health)
            .service(CheckoutRoute::<SqliteDatabase, RazorpayGateway>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, RazorpayGateway>::new())
            .service(CancelOrderRoute::<SqliteDatabase, RazorpayGateway>::new())
            .service(ResaleFeedRoute::<SqliteDatabase, RazorpayGateway>::new())
            .service(BuyResaleItemRoute::<SqliteDatabase, RazorpayGateway>::new())
            .service(StallOrdersRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase, RazorpayGateway>::new())
            .service(VerifyPickupRoute::<SqliteDatabase, RazorpayGateway>::new())
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
