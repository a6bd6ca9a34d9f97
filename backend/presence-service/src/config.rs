use crate::error::AppError;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub store: StoreConfig,
    pub websocket: WebSocketConfig,
    pub auth: AuthConfig,
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
    /// Emit JSON log lines instead of the human-readable format
    pub json_logs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::Config(format!(
                "NOTIFICATION_STORE must be postgres or memory, got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Required for the Postgres backend
    pub database_url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            client_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Shared secret for service-to-service endpoints; unset disables them
    pub internal_token: Option<String>,
}

/// Upper bound for `RETENTION_DAYS` (100 years)
pub const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub days: i64,
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: 30,
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} is not valid: {raw}"))),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let backend = match lookup("NOTIFICATION_STORE") {
            Some(raw) => raw.parse()?,
            None => StoreBackend::Postgres,
        };
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::Config("DATABASE_URL missing".into()));
        }

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| AppError::Config("JWT_SECRET missing".into()))?;

        let websocket_defaults = WebSocketConfig::default();
        let heartbeat_secs = parse_or(
            &lookup,
            "WS_HEARTBEAT_INTERVAL_SECS",
            websocket_defaults.heartbeat_interval.as_secs(),
        )?;
        let timeout_secs = parse_or(
            &lookup,
            "WS_CLIENT_TIMEOUT_SECS",
            websocket_defaults.client_timeout.as_secs(),
        )?;
        if heartbeat_secs == 0 {
            return Err(AppError::Config(
                "WS_HEARTBEAT_INTERVAL_SECS must be at least 1".into(),
            ));
        }
        if timeout_secs <= heartbeat_secs {
            return Err(AppError::Config(
                "WS_CLIENT_TIMEOUT_SECS must exceed WS_HEARTBEAT_INTERVAL_SECS".into(),
            ));
        }

        let retention_defaults = RetentionConfig::default();
        let retention_days = parse_or(&lookup, "RETENTION_DAYS", retention_defaults.days)?;
        if !(1..=MAX_RETENTION_DAYS).contains(&retention_days) {
            return Err(AppError::Config(format!(
                "RETENTION_DAYS must be between 1 and {MAX_RETENTION_DAYS}"
            )));
        }
        let sweep_secs = parse_or(
            &lookup,
            "RETENTION_SWEEP_INTERVAL_SECS",
            retention_defaults.sweep_interval.as_secs(),
        )?;
        if sweep_secs == 0 {
            return Err(AppError::Config(
                "RETENTION_SWEEP_INTERVAL_SECS must be at least 1".into(),
            ));
        }

        Ok(Config {
            app: AppConfig {
                env: lookup("APP_ENV").unwrap_or_else(|| "development".to_string()),
                host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "APP_PORT", 8085)?,
                json_logs: lookup("LOG_FORMAT")
                    .map(|v| v.eq_ignore_ascii_case("json"))
                    .unwrap_or(false),
            },
            store: StoreConfig {
                backend,
                database_url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            websocket: WebSocketConfig {
                heartbeat_interval: Duration::from_secs(heartbeat_secs),
                client_timeout: Duration::from_secs(timeout_secs),
            },
            auth: AuthConfig {
                jwt_secret,
                internal_token: lookup("INTERNAL_API_TOKEN").filter(|t| !t.is_empty()),
            },
            retention: RetentionConfig {
                days: retention_days,
                sweep_interval: Duration::from_secs(sweep_secs),
            },
        })
    }
}
