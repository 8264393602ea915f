use std::{path::PathBuf, str::FromStr, time::Duration};

use chrono::NaiveDate;
use thiserror::Error;

/// The environment whose `.env` file is allowed to be absent.
pub const DEFAULT_ENV: &str = "prod";

const DEFAULT_BASE_URL: &str = "https://site.api.espn.com/apis/site/v2/sports/football/nfl";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment file {file}: {source}")]
    MissingEnvFile {
        file: String,
        #[source]
        source: dotenvy::Error,
    },

    #[error("invalid value '{value}' for {key}")]
    BadValue { key: String, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_dsn: String,
    pub espn: EspnConfig,
}

#[derive(Debug, Clone)]
pub struct EspnConfig {
    pub base_url: String,
    pub cache_dir: PathBuf,
    pub sync_enabled: bool,
    pub sync_interval: Duration,
    /// Negative means cache entries never expire.
    pub cache_expiry_secs: i64,
    pub season_year: i32,
    pub week1_date: NaiveDate,
    pub cron_timezone: String,
}

/// Load configuration: real environment variables win over `.env.{APP_ENV}`
/// file values (dotenvy never overrides existing vars), file values win over
/// the compiled defaults.
pub fn load() -> Result<Config, ConfigError> {
    let env = std::env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    let file = format!(".env.{env}");
    if let Err(source) = dotenvy::from_filename(&file)
        && env != DEFAULT_ENV
    {
        return Err(ConfigError::MissingEnvFile { file, source });
    }

    Ok(Config {
        server_host: var_or("SERVER_HOST", "127.0.0.1"),
        server_port: parse_var("SERVER_PORT", "8080")?,
        database_dsn: var_or("DATABASE_DSN", "sqlite://pickem.db?mode=rwc"),
        espn: EspnConfig {
            base_url: var_or("ESPN_BASE_URL", DEFAULT_BASE_URL),
            cache_dir: PathBuf::from(var_or("ESPN_CACHE_DIR", "./cache")),
            sync_enabled: parse_bool_var("ESPN_SYNC_ENABLED", "true")?,
            sync_interval: Duration::from_secs(parse_var("ESPN_SYNC_INTERVAL_SECS", "300")?),
            cache_expiry_secs: parse_var("ESPN_CACHE_EXPIRY_SECS", "300")?,
            season_year: parse_var("ESPN_SEASON_YEAR", "2025")?,
            week1_date: parse_date_var("ESPN_WEEK1_DATE", "2025-09-04")?,
            cron_timezone: var_or("ESPN_CRON_TZ", "America/New_York"),
        },
    })
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError> {
    let value = var_or(key, default);
    value.parse().map_err(|_| ConfigError::BadValue {
        key: key.to_string(),
        value,
    })
}

fn parse_bool_var(key: &str, default: &str) -> Result<bool, ConfigError> {
    let value = var_or(key, default);
    parse_bool(&value).ok_or_else(|| ConfigError::BadValue {
        key: key.to_string(),
        value,
    })
}

fn parse_date_var(key: &str, default: &str) -> Result<NaiveDate, ConfigError> {
    let value = var_or(key, default);
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| ConfigError::BadValue {
        key: key.to_string(),
        value,
    })
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
