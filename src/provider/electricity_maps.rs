//! Electricity Maps API client
//!
//! Uses the hourly history endpoint and reports the most recent measured
//! point and the most recent estimated point, when each exists.

use super::http::{agent, build_url, Request};
use super::{
    primary_value, CarbonIntensity, EmissionsType, MetricType, Provider, ProviderKind,
    ReadingSource, Units,
};
use crate::context::Context;
use crate::error::{GridError, GridResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use ureq::Agent;

/// Default API base URL
pub const DEFAULT_API_URL: &str = "https://api.electricitymap.org/v3";

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Vec<HistoryPoint>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryPoint {
    carbon_intensity: Option<f64>,
    datetime: String,
    #[serde(default)]
    is_estimated: bool,
}

/// Client authenticated with an API token
#[derive(Clone)]
pub struct ElectricityMaps {
    agent: Agent,
    api_url: String,
    token: String,
}

impl ElectricityMaps {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            agent: agent(),
            api_url: api_url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl Provider for ElectricityMaps {
    async fn get_carbon_intensity(&self, ctx: &Context, region: &str) -> GridResult<f64> {
        primary_value(&self.readings(ctx, region).await?)
    }
}

#[async_trait]
impl ReadingSource for ElectricityMaps {
    /// Measured reading first (if any), then estimated
    async fn readings(&self, ctx: &Context, region: &str) -> GridResult<Vec<CarbonIntensity>> {
        let response: HistoryResponse =
            Request::get(build_url(&self.api_url, "/carbon-intensity/history"))
                .query("zone", region)
                .header("auth-token", &self.token)
                .json(ctx, &self.agent)
                .await?;

        latest_readings(region, &response.history)
    }
}

/// Latest measured and latest estimated points, in that order
fn latest_readings(region: &str, history: &[HistoryPoint]) -> GridResult<Vec<CarbonIntensity>> {
    let mut measured: Option<(DateTime<Utc>, f64)> = None;
    let mut estimated: Option<(DateTime<Utc>, f64)> = None;

    for point in history {
        let Some(value) = point.carbon_intensity else {
            continue;
        };
        let at = DateTime::parse_from_rfc3339(&point.datetime)
            .map_err(|e| GridError::decode(format!("datetime {:?}", point.datetime), e))?
            .with_timezone(&Utc);

        let slot = if point.is_estimated {
            &mut estimated
        } else {
            &mut measured
        };
        if slot.map_or(true, |(latest, _)| at > latest) {
            *slot = Some((at, value));
        }
    }

    let readings: Vec<CarbonIntensity> = [(measured, false), (estimated, true)]
        .into_iter()
        .filter_map(|(point, is_estimated)| {
            point.map(|(valid_from, value)| CarbonIntensity {
                emissions_type: EmissionsType::Average,
                metric_type: MetricType::Absolute,
                provider: ProviderKind::ElectricityMaps.name().to_string(),
                region: region.to_string(),
                units: Units::GramsCo2ePerKwh,
                valid_from,
                valid_to: valid_from + Duration::hours(1),
                value,
                is_estimated,
            })
        })
        .collect();

    if readings.is_empty() {
        return Err(GridError::NoResponse);
    }
    Ok(readings)
}
