use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_REFERRAL_REWARD_POINTS: i64 = 2;
pub const DEFAULT_WITHDRAWAL_THRESHOLD_POINTS: i64 = 50_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub app_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    pub webhook_secret: String,
    // Business constants shared by every screen
    pub referral_reward_points: i64,
    pub withdrawal_threshold_points: i64,
    pub allowed_origins: Vec<String>,
    pub log_level: String,
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        let store_backend = match std::env::var("STORE_BACKEND") {
            Ok(value) => value.parse::<StoreBackend>().map_err(|value| ConfigError::Invalid {
                name: "STORE_BACKEND",
                value,
            })?,
            Err(_) => StoreBackend::Postgres,
        };

        let database_url = std::env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let jwt_secret = required("JWT_SECRET_KEY")?;
        let jwt_maxage = parse_or("JWT_MAXAGE", 60)?;
        let webhook_secret = required("WEBHOOK_SECRET")?;

        let app_url = std::env::var("APP_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec![app_url.clone()]);

        Ok(Config {
            store_backend,
            database_url,
            app_url,
            jwt_secret,
            jwt_maxage,
            port: parse_or("PORT", 8000)?,
            webhook_secret,
            referral_reward_points: parse_or("REFERRAL_REWARD_POINTS", DEFAULT_REFERRAL_REWARD_POINTS)?,
            withdrawal_threshold_points: parse_or(
                "WITHDRAWAL_THRESHOLD_POINTS",
                DEFAULT_WITHDRAWAL_THRESHOLD_POINTS,
            )?,
            allowed_origins,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Config {
        Config {
            store_backend: StoreBackend::Memory,
            database_url: None,
            app_url: "http://localhost:5173".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_maxage: 60,
            port: 8000,
            webhook_secret: "webhook-secret".to_string(),
            referral_reward_points: DEFAULT_REFERRAL_REWARD_POINTS,
            withdrawal_threshold_points: DEFAULT_WITHDRAWAL_THRESHOLD_POINTS,
            allowed_origins: vec!["http://localhost:5173".to_string()],
            log_level: "debug".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("postgres".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert_eq!(" Memory ".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("mongo".parse::<StoreBackend>(), Err("mongo".to_string()));
    }
}
