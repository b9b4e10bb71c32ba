use chrono::format::{Item, StrftimeItems};
use dotenvy::dotenv;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::pipeline::search_endpoint;
use crate::render::DEFAULT_DATE_FORMAT;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_SEARCH_API_BASE_URL: &str = "http://flask-app:5000";

/// Runtime settings, built once at startup and handed to each component.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub search_api_base_url: String,
    pub search_timeout: Duration,
    pub probe_timeout: Duration,
    pub token_secret: Option<String>,
    pub token_max_age: Duration,
    pub date_format: String,
    pub static_dir: PathBuf,
    pub page_content_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        dotenv().ok(); // Load .env file if present
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let search_api_base_url =
            get("SEARCH_API_BASE_URL").unwrap_or_else(|| DEFAULT_SEARCH_API_BASE_URL.to_string());
        search_endpoint(&search_api_base_url)?;

        let date_format = get("DATE_FORMAT").unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
        if StrftimeItems::new(&date_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Invalid {
                key: "DATE_FORMAT",
                value: date_format,
                reason: "not a valid strftime format".to_string(),
            });
        }

        Ok(Config {
            bind_addr: parse_or_default("BIND_ADDR", get("BIND_ADDR"), DEFAULT_BIND_ADDR)?,
            search_api_base_url,
            search_timeout: secs("SEARCH_TIMEOUT_SECS", get("SEARCH_TIMEOUT_SECS"), 30)?,
            probe_timeout: secs("PROBE_TIMEOUT_SECS", get("PROBE_TIMEOUT_SECS"), 10)?,
            token_secret: get("TOKEN_SECRET"),
            token_max_age: secs("TOKEN_MAX_AGE_SECS", get("TOKEN_MAX_AGE_SECS"), 86_400)?,
            date_format,
            static_dir: get("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static")),
            page_content_path: get("PAGE_CONTENT_PATH").map(PathBuf::from),
        })
    }
}

fn parse_or_default<T>(key: &'static str, raw: Option<String>, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = raw.unwrap_or_else(|| default.to_string());
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })
}

fn secs(key: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_or_default(key, raw, &default.to_string())?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
            reason: "must be at least one second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
