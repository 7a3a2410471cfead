//! Configuration schema for grid-intensity
//!
//! Configuration is stored at `~/.config/grid-intensity/config.toml`

use crate::cache::{CacheConfig, LockOptions};
use crate::provider::{carbon_intensity_uk, electricity_maps, watt_time};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache settings for caching providers
    pub cache: CacheSettings,

    /// carbonintensity.org.uk endpoint
    pub carbon_intensity_uk: ApiConfig,

    /// Electricity Maps endpoint
    pub electricity_maps: ApiConfig,

    /// WattTime endpoint
    pub watt_time: ApiConfig,

    /// Prometheus exporter settings
    pub exporter: ExporterConfig,
}

impl Default for Config {
    /// Each provider points at its public API
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            cache: CacheSettings::default(),
            carbon_intensity_uk: ApiConfig::new(carbon_intensity_uk::DEFAULT_API_URL),
            electricity_maps: ApiConfig::new(electricity_maps::DEFAULT_API_URL),
            watt_time: ApiConfig::new(watt_time::DEFAULT_API_URL),
            exporter: ExporterConfig::default(),
        }
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Provider used when `--provider` is not given
    pub provider: String,

    /// Regions used when `--region` is not given
    pub regions: Vec<String>,

    /// Overall deadline for a `get` in seconds
    pub timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            provider: "Ember".to_string(),
            regions: vec![],
            timeout_secs: 30,
        }
    }
}

/// File cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache file shared between processes (in-memory when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Give up on the cache lock after this many seconds
    pub lock_timeout_secs: u64,

    /// Pause between lock attempts in milliseconds
    pub lock_retry_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            file: None,
            lock_timeout_secs: 30,
            lock_retry_ms: 1000,
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            cache_file: self.file.clone(),
            lock: LockOptions {
                timeout: Duration::from_secs(self.lock_timeout_secs),
                retry_delay: Duration::from_millis(self.lock_retry_ms),
            },
        }
    }
}

/// Upstream API endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL, without a trailing slash
    pub api_url: String,
}

impl ApiConfig {
    fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
        }
    }
}

/// Prometheus exporter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Listen address for the `/metrics` endpoint
    pub address: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8000".to_string(),
        }
    }
}
