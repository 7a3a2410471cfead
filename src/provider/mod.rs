//! Carbon intensity providers
//!
//! Every data source presents the same `Provider` contract to the rest of
//! the crate. Concrete clients also expose `readings()` with the full
//! metadata (units, validity window) for single-region lookups.

pub mod carbon_intensity_uk;
pub mod electricity_maps;
pub mod ember;
mod http;
pub mod watt_time;

#[cfg(test)]
pub(crate) mod test_server;

pub use carbon_intensity_uk::CarbonIntensityUk;
pub use electricity_maps::ElectricityMaps;
pub use ember::Ember;
pub use watt_time::WattTime;

use crate::config::Config;
use crate::context::Context;
use crate::error::{GridError, GridResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Env var holding the Electricity Maps API token
pub const ELECTRICITY_MAPS_TOKEN_ENV: &str = "ELECTRICITY_MAP_API_TOKEN";
/// Env var holding the WattTime user name
pub const WATT_TIME_USER_ENV: &str = "WATT_TIME_USER";
/// Env var holding the WattTime password
pub const WATT_TIME_PASSWORD_ENV: &str = "WATT_TIME_PASSWORD";

/// Source of a single carbon intensity value per region
#[async_trait]
pub trait Provider: Send + Sync {
    /// Current carbon intensity for `region`, in provider-defined units
    async fn get_carbon_intensity(&self, ctx: &Context, region: &str) -> GridResult<f64>;
}

/// Average vs marginal emissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionsType {
    Average,
    Marginal,
}

/// Absolute magnitude vs relative index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Absolute,
    Relative,
}

/// Units a reading can be expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Units {
    #[serde(rename = "gCO2e per kWh")]
    GramsCo2ePerKwh,
    #[serde(rename = "lbCO2e per MWh")]
    LbCo2ePerMwh,
    #[serde(rename = "percent")]
    Percent,
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GramsCo2ePerKwh => "gCO2e per kWh",
            Self::LbCo2ePerMwh => "lbCO2e per MWh",
            Self::Percent => "percent",
        };
        write!(f, "{}", name)
    }
}

/// One carbon intensity reading for a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonIntensity {
    pub emissions_type: EmissionsType,
    pub metric_type: MetricType,
    pub provider: String,
    pub region: String,
    pub units: Units,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub value: f64,
    #[serde(default)]
    pub is_estimated: bool,
}

/// Supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    CarbonIntensityOrgUk,
    ElectricityMaps,
    Ember,
    WattTime,
}

impl ProviderKind {
    /// All providers in display order
    pub fn all() -> &'static [Self] {
        &[
            Self::CarbonIntensityOrgUk,
            Self::ElectricityMaps,
            Self::Ember,
            Self::WattTime,
        ]
    }

    /// Canonical provider name
    pub fn name(&self) -> &'static str {
        match self {
            Self::CarbonIntensityOrgUk => "CarbonIntensityOrgUK",
            Self::ElectricityMaps => "ElectricityMaps",
            Self::Ember => "Ember",
            Self::WattTime => "WattTime",
        }
    }

    /// Provider homepage
    pub fn url(&self) -> &'static str {
        match self {
            Self::CarbonIntensityOrgUk => "carbonintensity.org.uk",
            Self::ElectricityMaps => "electricitymaps.com",
            Self::Ember => "ember-climate.org",
            Self::WattTime => "watttime.org",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| GridError::UnknownProvider(s.to_string()))
    }
}

/// A provider that can also return the full readings behind its value
#[async_trait]
pub trait ReadingSource: Provider {
    /// All readings available for `region`
    async fn readings(&self, ctx: &Context, region: &str) -> GridResult<Vec<CarbonIntensity>>;
}

/// Build a provider from configuration and environment credentials
pub fn create_provider(kind: ProviderKind, config: &Config) -> GridResult<Arc<dyn ReadingSource>> {
    match kind {
        ProviderKind::CarbonIntensityOrgUk => Ok(Arc::new(CarbonIntensityUk::new(
            config.carbon_intensity_uk.api_url.clone(),
        ))),
        ProviderKind::ElectricityMaps => {
            let token = required_env(ELECTRICITY_MAPS_TOKEN_ENV)?;
            Ok(Arc::new(ElectricityMaps::new(
                config.electricity_maps.api_url.clone(),
                token,
            )))
        }
        ProviderKind::Ember => Ok(Arc::new(Ember::new()?)),
        ProviderKind::WattTime => {
            let user = required_env(WATT_TIME_USER_ENV)?;
            let password = required_env(WATT_TIME_PASSWORD_ENV)?;
            Ok(Arc::new(WattTime::new(
                config.watt_time.api_url.clone(),
                user,
                password,
                config.cache.to_cache_config(),
            )))
        }
    }
}

fn required_env(name: &str) -> GridResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GridError::MissingEnv(name.to_string()))
}

/// Pick the first reading's value, or report an empty response
pub(crate) fn primary_value(readings: &[CarbonIntensity]) -> GridResult<f64> {
    readings
        .first()
        .map(|r| r.value)
        .ok_or(GridError::NoResponse)
}
