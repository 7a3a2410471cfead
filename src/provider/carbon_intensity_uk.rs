//! National Grid ESO carbon intensity API (carbonintensity.org.uk)

use super::http::{agent, build_url, Request};
use super::{
    primary_value, CarbonIntensity, EmissionsType, MetricType, Provider, ProviderKind,
    ReadingSource, Units,
};
use crate::context::Context;
use crate::error::{GridError, GridResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use ureq::Agent;

/// Default API base URL
pub const DEFAULT_API_URL: &str = "https://api.carbonintensity.org.uk";

/// The only region this API covers
pub const UK_REGION: &str = "UK";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%MZ";

#[derive(Debug, Deserialize)]
struct IntensityResponse {
    data: Vec<IntensityData>,
}

#[derive(Debug, Deserialize)]
struct IntensityData {
    from: String,
    to: String,
    intensity: Option<Intensity>,
}

#[derive(Debug, Deserialize)]
struct Intensity {
    forecast: Option<f64>,
    actual: Option<f64>,
}

/// Client for the UK national grid
#[derive(Clone)]
pub struct CarbonIntensityUk {
    agent: Agent,
    api_url: String,
}

impl CarbonIntensityUk {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            agent: agent(),
            api_url: api_url.into(),
        }
    }
}

impl Default for CarbonIntensityUk {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

#[async_trait]
impl Provider for CarbonIntensityUk {
    async fn get_carbon_intensity(&self, ctx: &Context, region: &str) -> GridResult<f64> {
        primary_value(&self.readings(ctx, region).await?)
    }
}

#[async_trait]
impl ReadingSource for CarbonIntensityUk {
    async fn readings(&self, ctx: &Context, region: &str) -> GridResult<Vec<CarbonIntensity>> {
        if region != UK_REGION {
            return Err(GridError::InvalidRegion {
                provider: ProviderKind::CarbonIntensityOrgUk.name().to_string(),
                region: region.to_string(),
            });
        }

        let response: IntensityResponse = Request::get(build_url(&self.api_url, "/intensity/"))
            .json(ctx, &self.agent)
            .await?;

        parse_response(region, response)
    }
}

fn parse_response(region: &str, response: IntensityResponse) -> GridResult<Vec<CarbonIntensity>> {
    let data = response.data.into_iter().next().ok_or(GridError::NoResponse)?;
    let intensity = data.intensity.ok_or(GridError::NoResponse)?;

    // The current half hour often has no actual figure yet.
    let (value, is_estimated) = match (intensity.actual, intensity.forecast) {
        (Some(actual), _) => (actual, false),
        (None, Some(forecast)) => (forecast, true),
        (None, None) => return Err(GridError::NoResponse),
    };

    Ok(vec![CarbonIntensity {
        emissions_type: EmissionsType::Average,
        metric_type: MetricType::Absolute,
        provider: ProviderKind::CarbonIntensityOrgUk.name().to_string(),
        region: region.to_string(),
        units: Units::GramsCo2ePerKwh,
        valid_from: parse_time(&data.from)?,
        valid_to: parse_time(&data.to)?,
        value,
        is_estimated,
    }])
}

fn parse_time(value: &str) -> GridResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIME_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|e| GridError::decode(format!("timestamp {:?}", value), e))
}
