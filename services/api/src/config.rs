//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub upload_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub render_dpi: u32,
    pub pdftoppm_path: PathBuf,
    pub font_path: Option<PathBuf>,
    /// Idle sessions are evicted after this long. `None` disables eviction.
    pub session_ttl: Option<Duration>,
    /// `None` allows any origin.
    pub cors_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: Level::INFO,
            upload_dir: PathBuf::from("uploads"),
            temp_dir: PathBuf::from("temp"),
            max_upload_bytes: 100 * 1024 * 1024,
            render_dpi: 150,
            pdftoppm_path: PathBuf::from("pdftoppm"),
            font_path: None,
            session_ttl: None,
            cors_origin: None,
        }
    }
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source. Unset keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        // --- Server Settings ---
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", defaults.bind_address)?;

        let log_level = match lookup("RUST_LOG") {
            Some(value) => value.parse::<Level>().map_err(|_| {
                ConfigError::InvalidValue(
                    "RUST_LOG".to_string(),
                    format!("'{}' is not a valid log level", value),
                )
            })?,
            None => defaults.log_level,
        };

        // --- Storage Settings ---
        let upload_dir = lookup("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir);
        let temp_dir = lookup("TEMP_DIR").map(PathBuf::from).unwrap_or(defaults.temp_dir);
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?;

        // --- Rendering Settings ---
        let render_dpi: u32 = parse_or(&lookup, "RENDER_DPI", defaults.render_dpi)?;
        if render_dpi == 0 {
            return Err(ConfigError::InvalidValue(
                "RENDER_DPI".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let pdftoppm_path = lookup("PDFTOPPM_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.pdftoppm_path);
        let font_path = lookup("FONT_PATH").filter(|v| !v.is_empty()).map(PathBuf::from);

        // --- Session Settings ---
        let ttl_secs: u64 = parse_or(&lookup, "SESSION_TTL_SECS", 0)?;
        let session_ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));

        let cors_origin = lookup("CORS_ORIGIN").filter(|v| !v.trim().is_empty());

        Ok(Self {
            bind_address,
            log_level,
            upload_dir,
            temp_dir,
            max_upload_bytes,
            render_dpi,
            pdftoppm_path,
            font_path,
            session_ttl,
            cors_origin,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.render_dpi, 150);
        assert_eq!(config.max_upload_bytes, 104_857_600);
        assert!(config.session_ttl.is_none());
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn values_are_parsed() {
        let config = config_from(&[
            ("BIND_ADDRESS", "127.0.0.1:9000"),
            ("RENDER_DPI", "72"),
            ("SESSION_TTL_SECS", "600"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();
        assert_eq!(config.bind_address.to_string(), "127.0.0.1:9000");
        assert_eq!(config.render_dpi, 72);
        assert_eq!(config.session_ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = config_from(&[("RENDER_DPI", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "RENDER_DPI"));
        assert!(config_from(&[("RENDER_DPI", "0")]).is_err());
        assert!(config_from(&[("BIND_ADDRESS", "nowhere")]).is_err());
    }
}
