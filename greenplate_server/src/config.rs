use std::env;

use gp_common::Secret;
use greenplate_engine::db_types::DEFAULT_READY_REFUND_PERCENT;
use log::*;
use razorpay_tools::RazorpayConfig;

const DEFAULT_GP_HOST: &str = "127.0.0.1";
const DEFAULT_GP_PORT: u16 = 8360;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// Percentage of the total refunded when a READY order is cancelled. Stamped onto each
    /// order at creation; changing it never affects orders that already exist.
    pub ready_refund_percent: u32,
    /// Payment gateway credentials and webhook secret.
    pub razorpay: RazorpayConfig,
    /// When false, webhook signature verification is skipped. Only ever disable this against a
    /// local gateway simulator.
    pub webhook_signature_checks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_GP_HOST.to_string(),
            port: DEFAULT_GP_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            ready_refund_percent: DEFAULT_READY_REFUND_PERCENT,
            razorpay: RazorpayConfig::default(),
            webhook_signature_checks: true,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("GP_HOST").ok().unwrap_or_else(|| DEFAULT_GP_HOST.into());
        let port = env::var("GP_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for GP_PORT. {e} Using the default, {DEFAULT_GP_PORT}, instead.");
                    DEFAULT_GP_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_GP_PORT);
        let database_url = env::var("GP_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ GP_DATABASE_URL is not set. Please set it to the URL for the GreenPlate database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!("🪛️ Could not load the authentication configuration from the environment. {e}");
            AuthConfig::default()
        });
        let ready_refund_percent = env::var("GP_READY_REFUND_PERCENT")
            .ok()
            .and_then(|s| {
                s.parse::<u32>()
                    .map_err(|e| warn!("🪛️ Invalid value for GP_READY_REFUND_PERCENT: {e}"))
                    .ok()
            })
            .filter(|pct| {
                let valid = *pct <= 100;
                if !valid {
                    warn!("🪛️ GP_READY_REFUND_PERCENT must be at most 100. Using the default instead.");
                }
                valid
            })
            .unwrap_or(DEFAULT_READY_REFUND_PERCENT);
        let razorpay = RazorpayConfig::new_from_env_or_default();
        let webhook_signature_checks =
            gp_common::parse_boolean_flag(env::var("GP_WEBHOOK_SIGNATURE_CHECKS").ok(), true);
        if !webhook_signature_checks {
            warn!("🚨️ Webhook signature checks are DISABLED. Never run a reachable instance like this.");
        }
        Self { host, port, database_url, auth, ready_refund_percent, razorpay, webhook_signature_checks }
    }
}

//-------------------------------------------------  AuthConfig  ------------------------------------------------------
/// Verification key for the identity provider's bearer tokens.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, String> {
        let secret = env::var("GP_JWT_SECRET").map_err(|e| format!("{e} [GP_JWT_SECRET]"))?;
        if secret.is_empty() {
            return Err("GP_JWT_SECRET is empty".to_string());
        }
        Ok(Self { jwt_secret: Secret::new(secret) })
    }
}
