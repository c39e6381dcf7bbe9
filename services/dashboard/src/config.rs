//! services/dashboard/src/config.rs
//!
//! Defines the dashboard's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracker_core::BarScale;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;
const MAX_REMINDER_WINDOW_DAYS: i64 = 365;

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub backend_url: String,
    pub log_level: Level,
    pub static_dir: PathBuf,
    pub cors_origin: HeaderValue,
    pub request_timeout: Duration,
    pub session_ttl: chrono::Duration,
    pub session_sweep_interval: Duration,
    pub bar_scale: BarScale,
    pub reminder_window_days: i64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        // --- Server and Backend Settings ---
        let bind_address = parse_var("BIND_ADDRESS", &var_or("BIND_ADDRESS", "0.0.0.0:3000"))?;

        let backend_url = lookup("BACKEND_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::MissingVar("BACKEND_URL".to_string()))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let static_dir = PathBuf::from(var_or("STATIC_DIR", "./public"));

        let cors_origin_str = var_or("CORS_ORIGIN", "http://localhost:5173");
        let cors_origin = cors_origin_str
            .parse::<HeaderValue>()
            .map_err(|e| ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string()))?;

        let timeout_secs: u64 =
            parse_var("REQUEST_TIMEOUT_SECS", &var_or("REQUEST_TIMEOUT_SECS", "10"))?;
        let ttl_hours: i64 = parse_var("SESSION_TTL_HOURS", &var_or("SESSION_TTL_HOURS", "24"))?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&ttl_hours) {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_HOURS".to_string(),
                format!("must be between 1 and {MAX_SESSION_TTL_HOURS}"),
            ));
        }

        let sweep_secs: u64 =
            parse_var("SESSION_SWEEP_SECS", &var_or("SESSION_SWEEP_SECS", "60"))?;
        if sweep_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_SWEEP_SECS".to_string(),
                "must be positive".to_string(),
            ));
        }

        // --- Progress Settings ---
        let bar_scale = var_or("PROGRESS_BAR_SCALE", "normalized")
            .parse::<BarScale>()
            .map_err(|e| ConfigError::InvalidValue("PROGRESS_BAR_SCALE".to_string(), e))?;
        let reminder_window_days: i64 =
            parse_var("REMINDER_WINDOW_DAYS", &var_or("REMINDER_WINDOW_DAYS", "3"))?;
        if !(0..=MAX_REMINDER_WINDOW_DAYS).contains(&reminder_window_days) {
            return Err(ConfigError::InvalidValue(
                "REMINDER_WINDOW_DAYS".to_string(),
                format!("must be between 0 and {MAX_REMINDER_WINDOW_DAYS}"),
            ));
        }

        Ok(Self {
            bind_address,
            backend_url,
            log_level,
            static_dir,
            cors_origin,
            request_timeout: Duration::from_secs(timeout_secs),
            session_ttl: chrono::Duration::hours(ttl_hours),
            session_sweep_interval: Duration::from_secs(sweep_secs),
            bar_scale,
            reminder_window_days,
        })
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_backend_is_set() {
        let config =
            Config::from_lookup(lookup(&[("BACKEND_URL", "http://backend:3001/")])).unwrap();
        assert_eq!(config.backend_url, "http://backend:3001");
        assert_eq!(config.bind_address, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.session_ttl, chrono::Duration::hours(24));
        assert_eq!(config.session_sweep_interval, Duration::from_secs(60));
        assert_eq!(config.bar_scale, BarScale::Normalized);
        assert_eq!(config.reminder_window_days, 3);
    }

    #[test]
    fn backend_url_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(name) if name == "BACKEND_URL"));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = Config::from_lookup(lookup(&[
            ("BACKEND_URL", "http://backend"),
            ("PROGRESS_BAR_SCALE", "sideways"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "PROGRESS_BAR_SCALE"));

        let err = Config::from_lookup(lookup(&[
            ("BACKEND_URL", "http://backend"),
            ("REQUEST_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "REQUEST_TIMEOUT_SECS"));
    }

    #[test]
    fn out_of_range_windows_and_lifetimes_are_rejected() {
        for (name, raw) in [
            ("REMINDER_WINDOW_DAYS", "1000000000"),
            ("REMINDER_WINDOW_DAYS", "-1"),
            ("SESSION_TTL_HOURS", "0"),
            ("SESSION_TTL_HOURS", "9223372036854775807"),
        ] {
            let err = Config::from_lookup(lookup(&[("BACKEND_URL", "http://backend"), (name, raw)]))
                .unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidValue(var, _) if var == name),
                "{name}={raw} gave {err:?}"
            );
        }

        let config = Config::from_lookup(lookup(&[
            ("BACKEND_URL", "http://backend"),
            ("REMINDER_WINDOW_DAYS", "365"),
        ]))
        .unwrap();
        assert_eq!(config.reminder_window_days, 365);
    }
}
