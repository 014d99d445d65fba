use thiserror::Error;

use crate::{
    db_types::OrderStatusType,
    traits::{GatewayError, LedgerError},
};

#[derive(Debug, Error)]
pub enum OrderFlowError {
    #[error("Cart validation failed: {0}")]
    InvalidCart(String),
    #[error("The payment signature is invalid")]
    InvalidPaymentSignature,
    #[error("You do not have access to this order")]
    NotOrderOwner,
    #[error("Staff at stall {staff_stall} cannot act on orders for stall {order_stall}")]
    WrongStall { staff_stall: String, order_stall: String },
    #[error("You cannot buy your own resale listing")]
    OwnListingPurchase,
    #[error("Order cannot be cancelled from status {0}")]
    NotCancellable(OrderStatusType),
    #[error("{0}")]
    Ledger(#[from] LedgerError),
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
}
