//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the storage and gateway ports, so the whole HTTP surface can run
//! against mocks in tests. actix cannot register generic handlers directly, which is what the
//! `route!` macro works around.
use actix_web::{get, web, HttpResponse, Responder};
use greenplate_engine::{
    db_types::{OrderId, OrderStatusType, ResaleId, StaffProfile, UserProfile},
    order_objects::{CheckoutRequest, PaymentConfirmation},
    traits::{AccountManagement, LedgerDatabase, PaymentGateway},
    AccountApi,
    OrderFlowApi,
    ResaleApi,
};
use log::*;
use serde_json::json;

use crate::{
    auth::JwtClaims,
    data_objects::{CancelOrderRequest, StallOrdersQuery, UpdateOrderStatusRequest, VerifyPickupRequest},
    errors::{AuthError, ServerError},
};

// actix-web cannot handle generics in handlers, so routes are registered manually via this macro
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

/// Resolve the caller against the student records, or reject.
pub async fn require_user<B: AccountManagement>(db: &B, claims: &JwtClaims) -> Result<UserProfile, ServerError> {
    db.fetch_user_profile(&claims.uid)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .ok_or_else(|| ServerError::AuthenticationError(AuthError::AccountNotFound))
}

/// Resolve the caller against the staff records, or reject.
pub async fn require_staff<B: AccountManagement>(db: &B, claims: &JwtClaims) -> Result<StaffProfile, ServerError> {
    db.fetch_staff_profile(&claims.uid)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .ok_or_else(|| ServerError::AuthenticationError(AuthError::AccountNotFound))
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    let environment = std::env::var("GP_ENV").unwrap_or_else(|_| "development".to_string());
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "greenplate-backend",
        "environment": environment,
    }))
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/order/checkout" impl LedgerDatabase, PaymentGateway);
pub async fn checkout<B, G>(
    claims: JwtClaims,
    body: web::Json<CheckoutRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerDatabase,
    G: PaymentGateway,
{
    let user = require_user(api.db(), &claims).await?;
    debug!("💻️ POST checkout for {}", user.uid);
    let instructions = api.checkout(&user, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(instructions))
}

//----------------------------------------------   My orders  ----------------------------------------------------
route!(my_orders => Get "/orders" impl LedgerDatabase);
pub async fn my_orders<B: LedgerDatabase>(
    claims: JwtClaims,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user = api
        .fetch_user_profile(&claims.uid)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .ok_or_else(|| ServerError::AuthenticationError(AuthError::AccountNotFound))?;
    debug!("💻️ GET my_orders for {}", user.uid);
    let orders = api.my_orders(&user.uid).await.map_err(ServerError::from)?;
    Ok(HttpResponse::Ok().json(orders))
}

//----------------------------------------------   Verify payment  ----------------------------------------------
route!(verify_payment => Post "/order/verify" impl LedgerDatabase, PaymentGateway);
pub async fn verify_payment<B, G>(
    claims: JwtClaims,
    body: web::Json<PaymentConfirmation>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerDatabase,
    G: PaymentGateway,
{
    let user = require_user(api.db(), &claims).await?;
    let confirmation = body.into_inner();
    debug!("💻️ POST verify payment for order {}", confirmation.order_id);
    let outcome = api.verify_and_settle(&user, confirmation).await?;
    Ok(HttpResponse::Ok().json(outcome.order()))
}

//----------------------------------------------   Cancel order  ------------------------------------------------
route!(cancel_order => Post "/order/{order_id}/cancel" impl LedgerDatabase, PaymentGateway);
pub async fn cancel_order<B, G>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: Option<web::Json<CancelOrderRequest>>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerDatabase,
    G: PaymentGateway,
{
    let user = require_user(api.db(), &claims).await?;
    let order_id = OrderId::from(path.into_inner());
    let reason = body.map(|b| b.into_inner().reason).unwrap_or_default();
    debug!("💻️ POST cancel order {order_id} for {}", user.uid);
    let outcome = api.cancel_order(&user, &order_id, reason).await?;
    Ok(HttpResponse::Ok().json(json!({
        "order": outcome.order,
        "resale_listing": outcome.listing,
    })))
}

//----------------------------------------------   Resale feed  -------------------------------------------------
route!(resale_feed => Get "/resale/feed" impl LedgerDatabase, PaymentGateway);
pub async fn resale_feed<B, G>(
    claims: JwtClaims,
    api: web::Data<ResaleApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerDatabase,
    G: PaymentGateway,
{
    let user = require_user(api.db(), &claims).await?;
    debug!("💻️ GET resale feed for college {}", user.college_id);
    let items = api.feed(&user).await?;
    Ok(HttpResponse::Ok().json(items))
}

//----------------------------------------------   Buy resale item  ---------------------------------------------
route!(buy_resale_item => Post "/resale/{resale_id}/buy" impl LedgerDatabase, PaymentGateway);
pub async fn buy_resale_item<B, G>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<ResaleApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerDatabase,
    G: PaymentGateway,
{
    let user = require_user(api.db(), &claims).await?;
    let resale_id = ResaleId::from(path.into_inner());
    debug!("💻️ POST buy resale item {resale_id} for {}", user.uid);
    let instructions = api.buy(&user, &resale_id).await?;
    Ok(HttpResponse::Created().json(instructions))
}

//----------------------------------------------   Stall orders  ------------------------------------------------
route!(stall_orders => Get "/staff/orders" impl LedgerDatabase);
pub async fn stall_orders<B: LedgerDatabase>(
    claims: JwtClaims,
    query: web::Query<StallOrdersQuery>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let staff = require_staff_for_account_api(&api, &claims).await?;
    let status = query.into_inner().status.or(Some(OrderStatusType::Paid));
    debug!("💻️ GET stall orders for {} ({:?})", staff.stall_id, status);
    let orders = api.stall_orders(&staff, status).await.map_err(ServerError::from)?;
    Ok(HttpResponse::Ok().json(orders))
}

async fn require_staff_for_account_api<B: AccountManagement>(
    api: &AccountApi<B>,
    claims: &JwtClaims,
) -> Result<StaffProfile, ServerError> {
    api.fetch_staff_profile(&claims.uid)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .ok_or_else(|| ServerError::AuthenticationError(AuthError::AccountNotFound))
}

//----------------------------------------------   Update order status  -----------------------------------------
route!(update_order_status => Patch "/staff/orders/{order_id}/status" impl LedgerDatabase, PaymentGateway);
pub async fn update_order_status<B, G>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<UpdateOrderStatusRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerDatabase,
    G: PaymentGateway,
{
    let staff = require_staff(api.db(), &claims).await?;
    let order_id = OrderId::from(path.into_inner());
    let new_status = body.into_inner().status;
    debug!("💻️ PATCH order {order_id} to {new_status} by {}", staff.email);
    let order = api.staff_update_status(&staff, &order_id, new_status).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Verify pickup  -----------------------------------------------
route!(verify_pickup => Post "/staff/orders/verify-pickup" impl LedgerDatabase, PaymentGateway);
pub async fn verify_pickup<B, G>(
    claims: JwtClaims,
    body: web::Json<VerifyPickupRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerDatabase,
    G: PaymentGateway,
{
    let staff = require_staff(api.db(), &claims).await?;
    let request = body.into_inner();
    debug!("💻️ POST verify pickup for order {} by {}", request.order_id, staff.email);
    let order = api.verify_pickup(&staff, &request.order_id, &request.pickup_code).await?;
    Ok(HttpResponse::Ok().json(order))
}
