//! Exporter command - serve carbon intensity as Prometheus metrics

use super::get::resolve_regions;
use crate::cli::args::ExporterArgs;
use crate::config::Config;
use crate::context::Context;
use crate::error::{GridError, GridResult};
use crate::exporter::Exporter;
use crate::provider::{create_provider, ProviderKind};
use crate::ui::{self, UiContext};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

/// Execute the exporter command
pub async fn execute(args: ExporterArgs, config: &Config) -> GridResult<()> {
    let kind: ProviderKind = args
        .provider
        .as_deref()
        .unwrap_or(config.general.provider.as_str())
        .parse()?;
    let regions = resolve_regions(&args.region, &config.general.regions);
    let address = args
        .address
        .unwrap_or_else(|| config.exporter.address.clone());
    let timeout = Duration::from_secs(args.timeout.unwrap_or(config.general.timeout_secs));

    let source = create_provider(kind, config)?;
    let exporter = Exporter::new(source, regions, timeout)?;

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| GridError::io(format!("binding {}", address), e))?;
    let local = listener
        .local_addr()
        .map_err(|e| GridError::io("reading listen address", e))?;

    let ctx = UiContext::detect();
    ui::intro(&ctx, "grid-intensity exporter");
    ui::step_ok(
        &ctx,
        &format!("Using provider {} with regions {}", kind, exporter.regions().join(",")),
        None,
    );
    ui::remark(&ctx, &format!("Metrics available at http://{}/metrics", local));
    info!("exporter listening on {}", local);

    let shutdown = Context::background();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutting down exporter");
            trigger.cancel();
        }
    });

    exporter.serve(listener, shutdown).await
}
