use gp_common::Paise;
use serde::{Deserialize, Serialize};

use crate::db_types::OrderId;

/// One line of an incoming cart: which menu item, how many. Prices are never taken from the
/// client; they are looked up server-side at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub stall_id: String,
    pub items: Vec<CartLine>,
}

/// What the buyer's client needs to drive the gateway's payment form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInstructions {
    pub order_id: OrderId,
    pub intent_id: String,
    pub amount: Paise,
    pub currency: String,
}

/// The client-confirmation payload: gateway-issued identifiers plus the signature over them,
/// and our internal order id (the gateway ids are never used to look the order up).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub order_id: OrderId,
    pub intent_id: String,
    pub payment_id: String,
    pub signature: String,
}
