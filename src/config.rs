use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub mongo_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub jwt_expire_hours: i64,
    pub port: u16,
    pub frontend_origin: String,
    pub mail_from: String,
    pub invitation_ttl_days: i64,
    pub bcrypt_cost: u32,
    pub db_connect_retries: u32,
    pub db_retry_delay: Duration,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

// Out-of-range values would overflow chrono's date arithmetic.
fn bounded(
    name: &'static str,
    default: i64,
    range: RangeInclusive<i64>,
) -> Result<i64, ConfigError> {
    let value = parsed(name, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid { name, value: value.to_string() })
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        Ok(Self {
            mongo_uri: required("MONGO_URI")?,
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "tasknest".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_expire_hours: bounded("JWT_EXPIRE_HOURS", 24 * 7, 1..=24 * 365)?,
            port: parsed("PORT", 5000)?,
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "TaskNest <noreply@tasknest.app>".to_string()),
            invitation_ttl_days: bounded("INVITATION_TTL_DAYS", 7, 1..=365)?,
            bcrypt_cost: parsed("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            db_connect_retries: parsed("DB_CONNECT_RETRIES", 5)?,
            db_retry_delay: Duration::from_secs(parsed("DB_RETRY_DELAY_SECS", 5)?),
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            database_name: "tasknest_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_expire_hours: 1,
            port: 0,
            frontend_origin: "http://localhost:5173".to_string(),
            mail_from: "TaskNest <noreply@tasknest.test>".to_string(),
            invitation_ttl_days: 7,
            bcrypt_cost: 4,
            db_connect_retries: 1,
            db_retry_delay: Duration::from_millis(0),
        }
    }
}
