//! Process configuration from environment variables.
//!
//! Supported variables (a `.env` file is loaded first when present):
//! - `DATABASE_URL` (default `sqlite:dmxcue.db?mode=rwc`)
//! - `API_BIND_ADDRESS`, `API_PORT`, `CORS_ALLOWED_ORIGINS`
//! - `EVENT_RETENTION_DAYS` (default 30)
//! - `LOG_DIR` (default `logs`)
//! - `SHUTDOWN_TIMEOUT_SECS` (default 10)

use std::time::Duration;

use crate::api::server::ApiServerConfig;
use crate::events::DEFAULT_EVENT_RETENTION;
use crate::playback::PlaybackConfig;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:dmxcue.db?mode=rwc";
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Settings for the whole service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub log_dir: String,
    pub event_retention: Duration,
    pub api: ApiServerConfig,
    pub playback: PlaybackConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_dir: DEFAULT_LOG_DIR.to_string(),
            event_retention: DEFAULT_EVENT_RETENTION,
            api: ApiServerConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` for variable values. Unparseable values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_blank("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(dir) = non_blank("LOG_DIR") {
            config.log_dir = dir;
        }
        if let Some(days) = non_blank("EVENT_RETENTION_DAYS")
            && let Ok(days) = days.trim().parse::<u64>()
        {
            config.event_retention = Duration::from_secs(days * 24 * 60 * 60);
        }
        if let Some(secs) = non_blank("SHUTDOWN_TIMEOUT_SECS")
            && let Ok(secs) = secs.trim().parse::<u64>()
        {
            config.playback.shutdown_timeout = Duration::from_secs(secs);
        }

        if let Some(bind_address) = non_blank("API_BIND_ADDRESS") {
            config.api.bind_address = bind_address;
        }
        if let Some(port) = non_blank("API_PORT")
            && let Ok(port) = port.trim().parse::<u16>()
        {
            config.api.port = port;
        }
        if let Some(origins) = non_blank("CORS_ALLOWED_ORIGINS") {
            config.api.cors_allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }

        config
    }
}
