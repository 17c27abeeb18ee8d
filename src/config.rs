use dotenvy::dotenv;
use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Interval between WebSocket pings
    pub ws_heartbeat_secs: u64,
    /// Drop a WebSocket session after this long without a pong
    pub ws_client_timeout_secs: u64,
    pub migration_batch_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let port = parse_var("PORT", 8080u16)?;
        let ws_heartbeat_secs = parse_var("WS_HEARTBEAT_SECS", 5u64)?;
        let ws_client_timeout_secs = parse_var("WS_CLIENT_TIMEOUT_SECS", 30u64)?;
        let migration_batch_size = parse_var("MIGRATION_BATCH_SIZE", 100usize)?;

        if migration_batch_size == 0 {
            return Err(AppError::Config(
                "MIGRATION_BATCH_SIZE must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            port,
            ws_heartbeat_secs,
            ws_client_timeout_secs,
            migration_batch_size,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            ws_heartbeat_secs: 5,
            ws_client_timeout_secs: 30,
            migration_batch_size: 100,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("invalid value for {name}: {raw}"))),
        Err(_) => Ok(default),
    }
}
