//! Prometheus exporter
//!
//! Serves `/metrics` with one gauge family per kind of reading:
//! `grid_intensity_carbon_average`, `grid_intensity_carbon_marginal` and
//! `grid_intensity_carbon_relative`. Every scrape fetches the configured
//! regions again, so caching providers keep upstream traffic bounded by
//! their TTL.

use crate::context::Context;
use crate::error::{GridError, GridResult};
use crate::provider::{CarbonIntensity, EmissionsType, MetricType, ReadingSource};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::future::join_all;
use prometheus::{GaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

const NAMESPACE: &str = "grid_intensity";
const SUBSYSTEM: &str = "carbon";
const LABELS: &[&str] = &["provider", "region", "units", "is_estimated"];

/// Gauges for a fixed set of regions of one provider
pub struct Exporter {
    source: Arc<dyn ReadingSource>,
    regions: Vec<String>,
    timeout: Duration,
    registry: Registry,
    average: GaugeVec,
    marginal: GaugeVec,
    relative: GaugeVec,
    // One scrape at a time, so a reset never races another scrape's writes.
    scrape: Mutex<()>,
}

impl Exporter {
    /// Register the gauge families in a registry owned by this exporter
    pub fn new(
        source: Arc<dyn ReadingSource>,
        regions: Vec<String>,
        timeout: Duration,
    ) -> GridResult<Self> {
        if regions.is_empty() {
            return Err(GridError::NoRegionProvided);
        }

        let registry = Registry::new();
        let average = register(
            &registry,
            "average",
            "Average carbon intensity for the electricity grid in this region.",
        )?;
        let marginal = register(
            &registry,
            "marginal",
            "Marginal carbon intensity for the electricity grid in this region.",
        )?;
        let relative = register(
            &registry,
            "relative",
            "Relative carbon intensity for the electricity grid in this region.",
        )?;

        Ok(Self {
            source,
            regions,
            timeout,
            registry,
            average,
            marginal,
            relative,
            scrape: Mutex::new(()),
        })
    }

    /// Regions scraped on every request
    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    /// Fetch every region and encode the registry in the text format
    pub async fn render(&self) -> GridResult<String> {
        let _scrape = self.scrape.lock().await;
        self.refresh().await;
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }

    /// Replace all gauge values with fresh readings. Returns how many
    /// regions failed; their series are absent until a later scrape succeeds.
    async fn refresh(&self) -> usize {
        let ctx = Context::background().with_timeout(self.timeout);
        let source = &self.source;
        let results = join_all(self.regions.iter().map(|region| {
            let ctx = ctx.clone();
            async move { (region, source.readings(&ctx, region).await) }
        }))
        .await;

        self.average.reset();
        self.marginal.reset();
        self.relative.reset();

        let mut failed = 0;
        for (region, result) in results {
            match result {
                Ok(readings) => {
                    debug!("{} readings for {}", readings.len(), region);
                    for reading in &readings {
                        self.record(reading);
                    }
                }
                Err(e) if e.is_retryable() => {
                    failed += 1;
                    warn!("{}: {}, retrying on next scrape", region, e);
                }
                Err(e) => {
                    failed += 1;
                    error!("{}: {}", region, e);
                }
            }
        }
        failed
    }

    fn record(&self, reading: &CarbonIntensity) {
        let gauge = match (reading.emissions_type, reading.metric_type) {
            (_, MetricType::Relative) => &self.relative,
            (EmissionsType::Marginal, MetricType::Absolute) => &self.marginal,
            (EmissionsType::Average, MetricType::Absolute) => &self.average,
        };

        let units = reading.units.to_string();
        let estimated = reading.is_estimated.to_string();
        gauge
            .with_label_values(&[
                reading.provider.as_str(),
                reading.region.as_str(),
                units.as_str(),
                estimated.as_str(),
            ])
            .set(reading.value);
    }

    /// Router exposing `GET /metrics`
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(self)
    }

    /// Serve `/metrics` on `listener` until `shutdown` is done
    pub async fn serve(self, listener: TcpListener, shutdown: Context) -> GridResult<()> {
        axum::serve(listener, Arc::new(self).router())
            .with_graceful_shutdown(async move { shutdown.done().await })
            .await
            .map_err(|e| GridError::io("serving metrics", e))
    }
}

fn register(registry: &Registry, name: &str, help: &str) -> GridResult<GaugeVec> {
    let gauge = GaugeVec::new(
        Opts::new(name, help).namespace(NAMESPACE).subsystem(SUBSYSTEM),
        LABELS,
    )?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

async fn metrics_handler(State(exporter): State<Arc<Exporter>>) -> impl IntoResponse {
    match exporter.render().await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        ),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::provider::test_server::TestServer;
    use crate::provider::{Ember, WattTime};
    use chrono::Utc;

    fn ember_exporter(regions: &[&str]) -> Exporter {
        Exporter::new(
            Arc::new(Ember::new().unwrap()),
            regions.iter().map(|r| r.to_string()).collect(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn series<'a>(text: &'a str, family: &str, region: &str) -> Option<&'a str> {
        let needle = format!("region=\"{}\"", region);
        text.lines()
            .find(|line| line.starts_with(family) && line.contains(&needle))
    }

    #[test]
    fn no_regions_is_rejected() {
        let err = Exporter::new(
            Arc::new(Ember::new().unwrap()),
            vec![],
            Duration::from_secs(5),
        )
        .err()
        .unwrap();
        assert!(matches!(err, GridError::NoRegionProvided));
    }

    #[tokio::test]
    async fn ember_regions_become_average_gauges() {
        let exporter = ember_exporter(&["GBR", "esp"]);

        let text = exporter.render().await.unwrap();

        let gbr = series(&text, "grid_intensity_carbon_average{", "GBR").unwrap();
        assert!(gbr.contains("provider=\"Ember\""));
        assert!(gbr.contains("units=\"gCO2e per kWh\""));
        assert!(gbr.contains("is_estimated=\"false\""));
        assert!(gbr.ends_with(" 268.255"));

        let esp = series(&text, "grid_intensity_carbon_average{", "ESP").unwrap();
        assert!(esp.ends_with(" 193.737"));
        assert!(text.contains("# TYPE grid_intensity_carbon_average gauge"));
    }

    #[tokio::test]
    async fn failing_region_is_left_out() {
        let exporter = ember_exporter(&["GBR", "XXX"]);

        let text = exporter.render().await.unwrap();

        assert!(series(&text, "grid_intensity_carbon_average{", "GBR").is_some());
        assert!(!text.contains("region=\"XXX\""));
        assert_eq!(exporter.refresh().await, 1);
    }

    #[tokio::test]
    async fn upstream_outage_is_left_out_and_retried() {
        let server = TestServer::start(|req| {
            if req.path == "/login" {
                (200, r#"{"token":"t1"}"#.to_string())
            } else {
                (503, String::new())
            }
        })
        .await;
        let source = WattTime::new(server.base(), "user", "pass", CacheConfig::default());
        let exporter = Exporter::new(
            Arc::new(source),
            vec!["CAISO_NORTH".to_string()],
            Duration::from_secs(5),
        )
        .unwrap();

        let text = exporter.render().await.unwrap();
        assert!(!text.contains("CAISO_NORTH"));

        // nothing cached, so the next scrape asks upstream again
        assert_eq!(exporter.refresh().await, 1);
        assert_eq!(server.hits(), 3);
    }

    #[tokio::test]
    async fn watt_time_index_becomes_marginal_and_relative() {
        let body = format!(
            r#"{{"ba":"CAISO_NORTH","freq":"300","moer":"850.743982","percent":"53","point_time":"{}"}}"#,
            Utc::now().to_rfc3339()
        );
        let server = TestServer::start(move |req| {
            if req.path == "/login" {
                (200, r#"{"token":"t1"}"#.to_string())
            } else {
                (200, body.clone())
            }
        })
        .await;
        let source = WattTime::new(server.base(), "user", "pass", CacheConfig::default());
        let exporter = Exporter::new(
            Arc::new(source),
            vec!["CAISO_NORTH".to_string()],
            Duration::from_secs(5),
        )
        .unwrap();

        let text = exporter.render().await.unwrap();
        let again = exporter.render().await.unwrap();

        let marginal = series(&text, "grid_intensity_carbon_marginal{", "CAISO_NORTH").unwrap();
        assert!(marginal.contains("units=\"lbCO2e per MWh\""));
        assert!(marginal.ends_with(" 850.743982"));

        let relative = series(&text, "grid_intensity_carbon_relative{", "CAISO_NORTH").unwrap();
        assert!(relative.contains("units=\"percent\""));
        assert!(relative.ends_with(" 53"));

        assert_eq!(text, again);
        // second scrape is served from the provider cache
        assert_eq!(server.hits(), 2);
    }

    #[tokio::test]
    async fn serves_metrics_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/metrics", listener.local_addr().unwrap());
        let shutdown = Context::background();
        let server = tokio::spawn(ember_exporter(&["DEU"]).serve(listener, shutdown.clone()));

        let (status, content_type, body) = tokio::task::spawn_blocking(move || {
            let mut response = ureq::get(&url).call().unwrap();
            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let body = response.body_mut().read_to_string().unwrap();
            (response.status().as_u16(), content_type, body)
        })
        .await
        .unwrap();

        assert_eq!(status, 200);
        assert!(content_type.starts_with("text/plain"));
        assert!(series(&body, "grid_intensity_carbon_average{", "DEU").is_some());

        shutdown.cancel();
        server.await.unwrap().unwrap();
    }
}
