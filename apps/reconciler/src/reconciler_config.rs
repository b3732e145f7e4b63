use std::env;

use rolemend_core::{AppError, AppResult};

/// Connection settings for both stores, loaded from the environment and
/// validated before the runner starts.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Document-store connection URI.
    pub mongo_uri: String,
    /// Document-store database name.
    pub mongo_db_name: String,
    /// Relational-store host.
    pub pg_host: String,
    /// Relational-store port.
    pub pg_port: u16,
    /// Relational-store database name.
    pub pg_db_name: String,
    /// Relational-store user.
    pub pg_user: String,
    /// Relational-store password.
    pub pg_password: String,
}

impl ReconcilerConfig {
    /// Loads and validates every recognized variable. Any missing or
    /// unparsable value aborts before a single team is processed.
    pub fn load() -> AppResult<Self> {
        Ok(Self {
            mongo_uri: required_env("MONGO_URI")?,
            mongo_db_name: required_env("MONGO_DB_NAME")?,
            pg_host: required_env("PG_HOST")?,
            pg_port: parse_env_u16("PG_PORT", 5432)?,
            pg_db_name: required_env("PG_DB_NAME")?,
            pg_user: required_env("PG_USER")?,
            pg_password: required_env("PG_PASSWORD")?,
        })
    }
}

fn required_env(name: &str) -> AppResult<String> {
    let value = env::var(name).map_err(|_| AppError::Config(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Config(format!("{name} must not be empty")));
    }
    Ok(value)
}

fn parse_env_u16(name: &str, default: u16) -> AppResult<u16> {
    match env::var(name) {
        Ok(value) => value.parse::<u16>().map_err(|error| {
            AppError::Config(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
