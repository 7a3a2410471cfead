//! WattTime marginal emissions client
//!
//! WattTime rate-limits its API, so index data is kept in a `CacheStore`
//! until the end of its validity window. The bearer token from `/login` is
//! reused across calls and refreshed once when the API answers 403.

use super::http::{agent, build_url, Request};
use super::{CarbonIntensity, EmissionsType, MetricType, Provider, ProviderKind, ReadingSource, Units};
use crate::cache::{fresh_expiry, CacheConfig, CacheStore};
use crate::context::Context;
use crate::error::{GridError, GridResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use ureq::Agent;

/// Default API base URL
pub const DEFAULT_API_URL: &str = "https://api2.watttime.org/v2";

/// Payload of `GET /index`, cached per balancing authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexData {
    pub ba: String,
    /// Seconds the point is valid for, as a decimal string
    pub freq: String,
    #[serde(default)]
    pub moer: Option<String>,
    #[serde(default)]
    pub percent: Option<String>,
    pub point_time: DateTime<Utc>,
}

impl IndexData {
    fn freq(&self) -> GridResult<Duration> {
        self.freq
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| GridError::decode(format!("freq {:?}", self.freq), e))
    }

    fn valid_to(&self) -> GridResult<DateTime<Utc>> {
        let freq = chrono::Duration::from_std(self.freq()?)
            .map_err(|e| GridError::decode(format!("freq {:?}", self.freq), e))?;
        self.point_time
            .checked_add_signed(freq)
            .ok_or_else(|| GridError::decode(format!("freq {:?}", self.freq), "out of range"))
    }

    /// Relative percent reading first, then absolute MOER, each when present
    fn readings(&self, region: &str) -> GridResult<Vec<CarbonIntensity>> {
        let valid_to = self.valid_to()?;
        let reading = |metric_type, units, value| CarbonIntensity {
            emissions_type: EmissionsType::Marginal,
            metric_type,
            provider: ProviderKind::WattTime.name().to_string(),
            region: region.to_string(),
            units,
            valid_from: self.point_time,
            valid_to,
            value,
            is_estimated: false,
        };

        let mut readings = Vec::with_capacity(2);
        if let Some(percent) = non_empty(&self.percent) {
            let value = parse_number("percent", percent)?;
            readings.push(reading(MetricType::Relative, Units::Percent, value));
        }
        if let Some(moer) = non_empty(&self.moer) {
            let value = parse_number("moer", moer)?;
            readings.push(reading(MetricType::Absolute, Units::LbCo2ePerMwh, value));
        }
        Ok(readings)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number(field: &str, value: &str) -> GridResult<f64> {
    value
        .parse()
        .map_err(|e| GridError::decode(format!("{} {:?}", field, value), e))
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Authenticated, caching WattTime client
pub struct WattTime {
    agent: Agent,
    api_url: String,
    user: String,
    password: String,
    token: RwLock<Option<String>>,
    cache: CacheStore<IndexData>,
}

impl WattTime {
    pub fn new(
        api_url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        cache: CacheConfig,
    ) -> Self {
        Self {
            agent: agent(),
            api_url: api_url.into(),
            user: user.into(),
            password: password.into(),
            token: RwLock::new(None),
            cache: CacheStore::new(cache),
        }
    }

    /// Index data for `region`, from cache when fresh
    pub async fn index(&self, ctx: &Context, region: &str) -> GridResult<IndexData> {
        match self.cache.get(ctx, region).await {
            Ok(Some(data)) => {
                debug!("cache hit for {}", region);
                return Ok(data);
            }
            Ok(None) => debug!("cache miss for {}", region),
            Err(e) => debug!("cache unavailable for {}: {}", region, e),
        }

        let data = self.fetch_index(ctx, region).await?;

        let freq = data.freq()?;
        let expires_at = fresh_expiry(data.valid_to()?, freq);
        if let Err(e) = self.cache.set(ctx, region, data.clone(), expires_at).await {
            debug!("could not cache {}: {}", region, e);
        }

        Ok(data)
    }

    async fn fetch_index(&self, ctx: &Context, region: &str) -> GridResult<IndexData> {
        let cached = self.token.read().await.clone();
        let token = match cached {
            Some(token) => token,
            None => self.refresh_token(ctx).await?,
        };

        match self.request_index(ctx, region, &token).await {
            Err(GridError::Forbidden) => {
                debug!("token rejected, logging in again");
                let token = self.refresh_token(ctx).await?;
                self.request_index(ctx, region, &token).await
            }
            other => other,
        }
    }

    async fn request_index(&self, ctx: &Context, region: &str, token: &str) -> GridResult<IndexData> {
        Request::get(build_url(&self.api_url, "/index"))
            .query("ba", region)
            .header("Authorization", &format!("Bearer {}", token))
            .json(ctx, &self.agent)
            .await
    }

    async fn refresh_token(&self, ctx: &Context) -> GridResult<String> {
        let credentials = STANDARD.encode(format!("{}:{}", self.user, self.password));
        let login: LoginResponse = Request::get(build_url(&self.api_url, "/login"))
            .header("Authorization", &format!("Basic {}", credentials))
            .json(ctx, &self.agent)
            .await?;

        if login.token.is_empty() {
            return Err(GridError::decode("login response", "empty token"));
        }

        *self.token.write().await = Some(login.token.clone());
        Ok(login.token)
    }
}

#[async_trait]
impl Provider for WattTime {
    /// MOER when the index carries one, otherwise the relative percent
    async fn get_carbon_intensity(&self, ctx: &Context, region: &str) -> GridResult<f64> {
        let readings = self.readings(ctx, region).await?;
        readings
            .iter()
            .find(|r| r.units == Units::LbCo2ePerMwh)
            .or_else(|| readings.first())
            .map(|r| r.value)
            .ok_or(GridError::NoResponse)
    }
}

#[async_trait]
impl ReadingSource for WattTime {
    async fn readings(&self, ctx: &Context, region: &str) -> GridResult<Vec<CarbonIntensity>> {
        self.index(ctx, region).await?.readings(region)
    }
}
