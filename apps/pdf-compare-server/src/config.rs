//! Configuration management for PDF Compare Server

use std::env;
use std::str::FromStr;

use serde::Deserialize;

use crate::diff::{
    DiffConfig, DEFAULT_OVERLAY_BLEND_ALPHA, DEFAULT_OVERLAY_THRESHOLD,
    DEFAULT_SIDE_BY_SIDE_BLEND_ALPHA, DEFAULT_SIDE_BY_SIDE_THRESHOLD,
};
use crate::narrative::{DEFAULT_API_URL, DEFAULT_CHUNK_SIZE, DEFAULT_MODEL};
use crate::raster::{DEFAULT_RENDER_SCALE, DEFAULT_RENDER_TIMEOUT_SECS};
use crate::session::SESSION_EXPIRY_HOURS;

/// Default upload limit per request (both documents): 100MB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub raster: RasterConfig,
    pub diff: DiffConfig,
    pub compare: CompareConfig,
    pub narrative: NarrativeConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RasterConfig {
    pub scale: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompareConfig {
    pub max_concurrent_pages: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NarrativeConfig {
    pub enabled: bool,
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub chunk_size: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub expiry_hours: i64,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            raster: RasterConfig {
                scale: DEFAULT_RENDER_SCALE,
                timeout_secs: DEFAULT_RENDER_TIMEOUT_SECS,
            },
            diff: DiffConfig {
                overlay_threshold: DEFAULT_OVERLAY_THRESHOLD,
                overlay_blend_alpha: DEFAULT_OVERLAY_BLEND_ALPHA,
                side_by_side_threshold: DEFAULT_SIDE_BY_SIDE_THRESHOLD,
                side_by_side_blend_alpha: DEFAULT_SIDE_BY_SIDE_BLEND_ALPHA,
            },
            compare: CompareConfig {
                max_concurrent_pages: default_parallelism(),
            },
            narrative: NarrativeConfig {
                enabled: true,
                api_url: DEFAULT_API_URL.to_string(),
                api_key: None,
                model: DEFAULT_MODEL.to_string(),
                chunk_size: DEFAULT_CHUNK_SIZE,
                timeout_secs: 60,
            },
            session: SessionConfig {
                expiry_hours: SESSION_EXPIRY_HOURS,
            },
        }
    }
}

impl Config {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Config {
            server: ServerConfig {
                host: get("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse(&get, "SERVER_PORT", defaults.server.port)?,
                max_upload_bytes: parse(&get, "MAX_UPLOAD_BYTES", defaults.server.max_upload_bytes)?,
            },
            raster: RasterConfig {
                scale: parse(&get, "RENDER_SCALE", defaults.raster.scale)?,
                timeout_secs: parse(&get, "RENDER_TIMEOUT_SECS", defaults.raster.timeout_secs)?,
            },
            diff: DiffConfig {
                overlay_threshold: parse(&get, "OVERLAY_THRESHOLD", defaults.diff.overlay_threshold)?,
                overlay_blend_alpha: parse(&get, "OVERLAY_BLEND_ALPHA", defaults.diff.overlay_blend_alpha)?,
                side_by_side_threshold: parse(
                    &get,
                    "SIDE_BY_SIDE_THRESHOLD",
                    defaults.diff.side_by_side_threshold,
                )?,
                side_by_side_blend_alpha: parse(
                    &get,
                    "SIDE_BY_SIDE_BLEND_ALPHA",
                    defaults.diff.side_by_side_blend_alpha,
                )?,
            },
            compare: CompareConfig {
                max_concurrent_pages: parse(
                    &get,
                    "MAX_CONCURRENT_PAGES",
                    defaults.compare.max_concurrent_pages,
                )?,
            },
            narrative: NarrativeConfig {
                enabled: parse_bool(&get, "NARRATIVE_ENABLED", defaults.narrative.enabled)?,
                api_url: get("NARRATIVE_API_URL").unwrap_or(defaults.narrative.api_url),
                api_key: get("NARRATIVE_API_KEY").or_else(|| get("OPENAI_API_KEY")),
                model: get("NARRATIVE_MODEL").unwrap_or(defaults.narrative.model),
                chunk_size: parse(&get, "NARRATIVE_CHUNK_SIZE", defaults.narrative.chunk_size)?,
                timeout_secs: parse(&get, "NARRATIVE_TIMEOUT_SECS", defaults.narrative.timeout_secs)?,
            },
            session: SessionConfig {
                expiry_hours: parse(&get, "SESSION_EXPIRY_HOURS", defaults.session.expiry_hours)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.diff.validate().map_err(ConfigError::Invalid)?;

        if !(self.raster.scale > 0.0 && self.raster.scale <= 4.0) {
            return Err(ConfigError::Invalid(format!(
                "render scale must be within (0, 4], got {}",
                self.raster.scale
            )));
        }
        if self.compare.max_concurrent_pages == 0 {
            return Err(ConfigError::Invalid(
                "max concurrent pages must be at least 1".to_string(),
            ));
        }
        if self.narrative.chunk_size == 0 {
            return Err(ConfigError::Invalid("narrative chunk size must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

fn parse_bool<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue { key, value }),
        },
        None => Ok(default),
    }
}
