mod pickup_code;
mod refunds;

pub use pickup_code::new_pickup_code;
pub use refunds::{refund_tier, RefundTier};
