//! Configuration management for the text detection server

use serde::Deserialize;
use std::env;

/// Default Cloud Vision annotate endpoint
pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Largest decoded inline image accepted by the detect endpoint: 10MB
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Request body limit. Larger than the image limit so base64 overhead still
/// reaches the payload check instead of being cut off by the HTTP layer.
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub vision: VisionConfig,
    pub limits: LimitsConfig,
    /// Bearer token identifying the privileged service caller
    pub service_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisionConfig {
    /// API key; when absent every detect request fails with 500
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub max_image_bytes: usize,
    pub max_body_bytes: usize,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "sqlite:./text-detect.db".to_string(),
                max_connections: 5,
            },
            vision: VisionConfig {
                api_key: None,
                endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
                timeout_secs: 30,
            },
            limits: LimitsConfig {
                max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            },
            service_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: parse_var(
                    "DATABASE_MAX_CONNECTIONS",
                    defaults.database.max_connections,
                )?,
            },
            vision: VisionConfig {
                api_key: non_empty_var("VISION_API_KEY"),
                endpoint: env::var("VISION_ENDPOINT").unwrap_or(defaults.vision.endpoint),
                timeout_secs: parse_var("VISION_TIMEOUT_SECS", defaults.vision.timeout_secs)?,
            },
            limits: LimitsConfig {
                max_image_bytes: parse_var("MAX_IMAGE_BYTES", defaults.limits.max_image_bytes)?,
                max_body_bytes: parse_var("MAX_BODY_BYTES", defaults.limits.max_body_bytes)?,
            },
            service_key: non_empty_var("SERVICE_KEY"),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}
