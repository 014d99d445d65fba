use std::fmt::Display;

use greenplate_engine::db_types::{OrderId, OrderStatusType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPickupRequest {
    pub order_id: OrderId,
    pub pickup_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// `?status=` filter for the stall order queue. Defaults to PAID, the orders a kitchen needs to
/// start preparing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StallOrdersQuery {
    #[serde(default)]
    pub status: Option<OrderStatusType>,
}
