use gp_common::Secret;
use log::*;

pub const DEFAULT_RAZORPAY_API_URL: &str = "https://api.razorpay.com/v1";

#[derive(Debug, Clone, Default)]
pub struct RazorpayConfig {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub webhook_secret: Secret<String>,
}

impl RazorpayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("GP_RAZORPAY_API_URL").unwrap_or_else(|_| DEFAULT_RAZORPAY_API_URL.to_string());
        let key_id = std::env::var("GP_RAZORPAY_KEY_ID").unwrap_or_else(|_| {
            warn!("GP_RAZORPAY_KEY_ID not set, using (probably useless) default");
            "rzp_test_0000000000".to_string()
        });
        let key_secret = Secret::new(std::env::var("GP_RAZORPAY_KEY_SECRET").unwrap_or_else(|_| {
            warn!("GP_RAZORPAY_KEY_SECRET not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        let webhook_secret = Secret::new(std::env::var("GP_RAZORPAY_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("GP_RAZORPAY_WEBHOOK_SECRET not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        Self { base_url, key_id, key_secret, webhook_secret }
    }
}
