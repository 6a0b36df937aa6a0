//! Runtime configuration.
//!
//! Values come from the environment (after `.env` has been loaded by the
//! binary) and fall back to [`crate::defaults`].

use std::path::PathBuf;
use std::str::FromStr;

use crate::defaults;
use crate::error::{Error, Result};

/// Environment variable for the PBKDF2 round count of new containers.
pub const ENV_KDF_ROUNDS: &str = "SDC_KDF_ROUNDS";
/// Environment variable for the share URL base (e.g. `https://share.example.com`).
pub const ENV_SHARE_BASE_URL: &str = "SDC_SHARE_BASE_URL";
/// Environment variable for the directory store location.
pub const ENV_STORE_DIR: &str = "SDC_STORE_DIR";
/// Environment variable for the event bus capacity.
pub const ENV_EVENT_BUS_CAPACITY: &str = "SDC_EVENT_BUS_CAPACITY";
/// Environment variable for the default compression level.
pub const ENV_COMPRESSION_LEVEL: &str = "SDC_COMPRESSION_LEVEL";

/// Container service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdcConfig {
    /// PBKDF2 rounds used when `CreateOptions` does not specify any.
    pub kdf_rounds: u32,
    /// Base URL for share links. Locators without it are bare `sdc:` URIs.
    pub share_base_url: Option<String>,
    /// Root of the directory-backed store.
    pub store_dir: PathBuf,
    /// Broadcast channel capacity for audit events.
    pub event_bus_capacity: usize,
    /// Compression level recorded when the caller does not pick one.
    pub compression_level: u8,
}

impl Default for SdcConfig {
    fn default() -> Self {
        Self {
            kdf_rounds: defaults::KDF_ROUNDS,
            share_base_url: None,
            store_dir: PathBuf::from(defaults::STORE_DIR),
            event_bus_capacity: defaults::EVENT_BUS_CAPACITY,
            compression_level: defaults::COMPRESSION_LEVEL,
        }
    }
}

impl SdcConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset or empty keys use defaults;
    /// unparseable values are a `Config` error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let base = Self::default();

        let config = Self {
            kdf_rounds: parse_var(ENV_KDF_ROUNDS, get(ENV_KDF_ROUNDS))?
                .unwrap_or(base.kdf_rounds),
            share_base_url: get(ENV_SHARE_BASE_URL)
                .map(|url| url.trim().trim_end_matches('/').to_string()),
            store_dir: get(ENV_STORE_DIR)
                .map(PathBuf::from)
                .unwrap_or(base.store_dir),
            event_bus_capacity: parse_var(ENV_EVENT_BUS_CAPACITY, get(ENV_EVENT_BUS_CAPACITY))?
                .unwrap_or(base.event_bus_capacity),
            compression_level: parse_var(ENV_COMPRESSION_LEVEL, get(ENV_COMPRESSION_LEVEL))?
                .unwrap_or(base.compression_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.kdf_rounds < defaults::MIN_KDF_ROUNDS {
            return Err(Error::Config(format!(
                "{} must be at least {}, got {}",
                ENV_KDF_ROUNDS,
                defaults::MIN_KDF_ROUNDS,
                self.kdf_rounds
            )));
        }
        if self.event_bus_capacity == 0 {
            return Err(Error::Config(format!(
                "{} must be greater than zero",
                ENV_EVENT_BUS_CAPACITY
            )));
        }
        if self.compression_level > defaults::MAX_COMPRESSION_LEVEL {
            return Err(Error::Config(format!(
                "{} must be between 0 and {}, got {}",
                ENV_COMPRESSION_LEVEL,
                defaults::MAX_COMPRESSION_LEVEL,
                self.compression_level
            )));
        }
        if let Some(url) = &self.share_base_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(Error::Config(format!(
                    "{} must be an http(s) URL, got {}",
                    ENV_SHARE_BASE_URL, url
                )));
            }
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| Error::Config(format!("{} has invalid value {:?}", key, raw)))
        })
        .transpose()
}
