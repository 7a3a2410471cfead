//! Ember yearly grid intensity, bundled with the binary
//!
//! The dataset is a CSV embedded at compile time. Lookups accept ISO 3166
//! alpha-2 or alpha-3 country codes in any case.

use super::{CarbonIntensity, EmissionsType, MetricType, Provider, ProviderKind, ReadingSource, Units};
use crate::context::Context;
use crate::error::{GridError, GridResult};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const EMBER_CSV: &str = include_str!("../../data/co2-intensities-ember-2021.csv");
const EMBER_DATA_YEAR: i32 = 2021;

/// One row of the Ember dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmberGridIntensity {
    pub country_code_iso_2: String,
    pub country_code_iso_3: String,
    pub country_or_region: String,
    pub year: i32,
    pub latest_year: i32,
    pub emissions_intensity_gco2_per_kwh: f64,
}

/// Static table provider
#[derive(Debug, Clone)]
pub struct Ember {
    data: HashMap<String, EmberGridIntensity>,
}

impl Ember {
    /// Load the embedded dataset
    pub fn new() -> GridResult<Self> {
        Ok(Self {
            data: parse_dataset(EMBER_CSV)?,
        })
    }

    /// Dataset row for a country code
    pub fn lookup(&self, region: &str) -> GridResult<&EmberGridIntensity> {
        let key = region.trim().to_ascii_uppercase();
        self.data
            .get(&key)
            .ok_or(GridError::RegionNotFound(key))
    }

    /// Number of countries in the dataset
    pub fn len(&self) -> usize {
        self.data.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl Provider for Ember {
    async fn get_carbon_intensity(&self, _ctx: &Context, region: &str) -> GridResult<f64> {
        Ok(self.lookup(region)?.emissions_intensity_gco2_per_kwh)
    }
}

#[async_trait]
impl ReadingSource for Ember {
    async fn readings(&self, _ctx: &Context, region: &str) -> GridResult<Vec<CarbonIntensity>> {
        let row = self.lookup(region)?;
        let (valid_from, valid_to) = data_year_window(EMBER_DATA_YEAR);

        Ok(vec![CarbonIntensity {
            emissions_type: EmissionsType::Average,
            metric_type: MetricType::Absolute,
            provider: ProviderKind::Ember.name().to_string(),
            region: region.trim().to_ascii_uppercase(),
            units: Units::GramsCo2ePerKwh,
            valid_from,
            valid_to,
            value: row.emissions_intensity_gco2_per_kwh,
            is_estimated: false,
        }])
    }
}

fn data_year_window(year: i32) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = Utc
        .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default();
    let to = Utc
        .with_ymd_and_hms(year, 12, 31, 23, 59, 0)
        .single()
        .unwrap_or_default();
    (from, to)
}

fn parse_dataset(text: &str) -> GridResult<HashMap<String, EmberGridIntensity>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut data = HashMap::new();

    for record in reader.deserialize::<EmberGridIntensity>() {
        let mut row = record.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or_default();
            GridError::decode(format!("ember dataset line {}", line), e)
        })?;
        if row.country_code_iso_2.is_empty() {
            continue;
        }
        row.country_code_iso_2.make_ascii_uppercase();
        row.country_code_iso_3.make_ascii_uppercase();

        // Either code format works for lookups.
        data.insert(row.country_code_iso_2.clone(), row.clone());
        data.insert(row.country_code_iso_3.clone(), row);
    }

    Ok(data)
}
