use serde::Deserialize;

use crate::utils::error::BookingError;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Port the booking API listens on (default 8080)
    #[serde(default = "default_port")]
    pub port: u16,

    pub database_url: String,

    #[serde(default = "default_max_connections")]
    pub max_db_connections: u32,

    /// Sliding expiration applied while the customer is browsing,
    /// in minutes (start/resume refreshes)
    #[serde(default = "default_browse_ttl_minutes")]
    pub session_browse_ttl_minutes: i64,

    /// Tighter expiration applied on every quote recalculation,
    /// reflecting an active checkout
    #[serde(default = "default_checkout_ttl_minutes")]
    pub session_checkout_ttl_minutes: i64,

    /// Per-request timeout in ms before the server gives up
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, BookingError> {
        dotenvy::dotenv().ok();

        let cfg: AppConfig = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()?;

        if cfg.session_checkout_ttl_minutes > cfg.session_browse_ttl_minutes {
            return Err(BookingError::Config(
                "session_checkout_ttl_minutes must not exceed session_browse_ttl_minutes"
                    .to_string(),
            ));
        }

        Ok(cfg)
    }
}

fn default_port() -> u16 {
    8080
}
fn default_max_connections() -> u32 {
    20
}
fn default_browse_ttl_minutes() -> i64 {
    30
}
fn default_checkout_ttl_minutes() -> i64 {
    15
}
fn default_timeout_ms() -> u64 {
    10_000
}
