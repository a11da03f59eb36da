use serde::Deserialize;
use service_core::config::Config as CommonConfig;
use service_core::error::AppError;

/// Database settings.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Configuration for the finance service.
#[derive(Debug, Deserialize, Clone)]
pub struct FinanceConfig {
    pub common: CommonConfig,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    /// Emit JSON log lines (production); plain fmt otherwise.
    pub json_logs: bool,
    pub database: DatabaseConfig,
}

impl FinanceConfig {
    /// Load configuration from the environment (`.env` honored).
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("FINANCE_DATABASE_URL").map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("FINANCE_DATABASE_URL must be set"))
        })?;

        let max_connections = env_parse("FINANCE_DB_MAX_CONNECTIONS", 10)?;
        let min_connections = env_parse("FINANCE_DB_MIN_CONNECTIONS", 1)?;

        let log_level = std::env::var("FINANCE_LOG_LEVEL")
            .unwrap_or_else(|_| "info,finance_service=debug,sqlx=warn".to_string());
        let json_logs = std::env::var("FINANCE_JSON_LOGS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            common: CommonConfig::from_env("FINANCE_SERVICE"),
            service_name: "finance-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level,
            json_logs,
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                min_connections,
            },
        })
    }
}

fn env_parse(name: &str, default: u32) -> Result<u32, AppError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("{} must be an integer, got '{}'", name, raw))
        }),
        Err(_) => Ok(default),
    }
}
