use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use fg_core::constants::{API_KEY_SENTINEL, DEFAULT_VENDOR_URL};
use crate::error::ConfigError;

pub const API_KEY_VAR: &str = "MESHY_API_KEY";

/// Where the vendor credential comes from.
///
/// `Env` is looked up on every call so a key added to the environment of a
/// running gateway takes effect on the next request.
#[derive(Debug, Clone)]
pub enum Credential {
    Env(String),
    Static(Option<String>),
}

impl Credential {
    /// The usable key, or `None` when absent, blank or the sample placeholder.
    pub fn resolve(&self) -> Option<String> {
        let raw = match self {
            Credential::Env(var) => env::var(var).ok(),
            Credential::Static(key) => key.clone(),
        };
        raw.map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != API_KEY_SENTINEL)
    }
}

impl Default for Credential {
    fn default() -> Self {
        Credential::Env(API_KEY_VAR.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub vendor_url: String,
    pub gateway_url: String,
    pub quota_file: PathBuf,
    pub log_level: String,
    pub credential: Credential,
    /// The `.env` file that was read, if any.
    pub env_file: Option<PathBuf>,
}

impl Config {
    /// Reads `.env` (if there is one) and then the process environment.
    ///
    /// Runs before logging is set up, so the `.env` path is kept in
    /// `env_file` for the caller to report.
    pub fn load() -> Result<Self, ConfigError> {
        let loaded = env_file(dotenvy::dotenv())?;

        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        config.env_file = loaded;
        Ok(config)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value: v })?,
            None => 3000,
        };

        let host = match lookup("HOST") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "HOST", value: v })?,
            None => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };

        let vendor_url = lookup("MESHY_API_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_VENDOR_URL.to_string());

        let gateway_url = lookup("FORGE3D_GATEWAY")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://127.0.0.1:{port}"));

        let quota_file = lookup("FORGE3D_QUOTA_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".forge3d/generations.json"));

        let log_level = lookup("FORGE3D_LOG").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            host,
            port,
            vendor_url,
            gateway_url,
            quota_file,
            log_level,
            credential: Credential::default(),
            env_file: None,
        })
    }
}

/// A missing `.env` is fine; an unreadable one is not.
fn env_file(loaded: Result<PathBuf, dotenvy::Error>) -> Result<Option<PathBuf>, ConfigError> {
    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(ConfigError::Dotenv(e)),
    }
}
