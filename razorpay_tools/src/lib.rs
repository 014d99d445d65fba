mod api;
mod config;
mod error;

mod data_objects;

pub mod helpers;

pub use api::RazorpayApi;
pub use config::RazorpayConfig;
pub use data_objects::{
    Notes,
    PaymentEntity,
    PaymentIntent,
    PaymentStatus,
    RefundEntity,
    WebhookEnvelope,
    WebhookPayload,
    WrappedEntity,
};
pub use error::RazorpayApiError;
