//! Get command - look up carbon intensity

use crate::aggregate::get_carbon_intensity_map;
use crate::cli::args::{GetArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::context::Context;
use crate::error::GridResult;
use crate::provider::{create_provider, CarbonIntensity, ProviderKind};
use crate::ui::{self, Table, UiContext};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Execute the get command
pub async fn execute(args: GetArgs, config: &Config, manager: &ConfigManager) -> GridResult<()> {
    let provider_name = args
        .provider
        .clone()
        .unwrap_or_else(|| config.general.provider.clone());
    let kind: ProviderKind = provider_name.parse()?;

    let regions = resolve_regions(&args.region, &config.general.regions);
    let timeout = Duration::from_secs(args.timeout.unwrap_or(config.general.timeout_secs));
    debug!("provider {} regions {:?} timeout {:?}", kind, regions, timeout);

    let provider = create_provider(kind, config)?;
    let ctx = Context::background().with_timeout(timeout);

    if let [region] = regions.as_slice() {
        let readings = provider.readings(&ctx, region).await?;
        print_readings(args.format, &readings)?;
    } else {
        let map = get_carbon_intensity_map(&ctx, provider, &regions).await?;
        print_map(args.format, kind, &map.into_iter().collect())?;
    }

    if args.save {
        let mut config = config.clone();
        config.general.provider = kind.name().to_string();
        config.general.regions = regions;
        manager.save(&config).await?;
    }

    Ok(())
}

/// Regions from the command line, or the configured defaults when none given
pub(crate) fn resolve_regions(cli: &[String], configured: &[String]) -> Vec<String> {
    let pick = if cli.is_empty() { configured } else { cli };
    pick.iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

fn print_readings(format: OutputFormat, readings: &[CarbonIntensity]) -> GridResult<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(readings)?),
        OutputFormat::Plain => {
            for r in readings {
                println!("{} {} {}", r.region, r.value, r.units);
            }
        }
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            if let Some(first) = readings.first() {
                ui::intro(&ctx, &format!("{} - {}", first.provider, first.region));
            }

            let mut table = Table::new(&[
                ("VALUE", 12),
                ("UNITS", 16),
                ("EMISSIONS", 10),
                ("METRIC", 10),
                ("VALID FROM", 17),
                ("VALID TO", 17),
            ]);
            for r in readings {
                let value = if r.is_estimated {
                    format!("{}*", r.value)
                } else {
                    r.value.to_string()
                };
                table.row(vec![
                    value,
                    r.units.to_string(),
                    format!("{:?}", r.emissions_type).to_lowercase(),
                    format!("{:?}", r.metric_type).to_lowercase(),
                    r.valid_from.format("%Y-%m-%d %H:%M").to_string(),
                    r.valid_to.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }
            table.print(&ctx);

            if readings.iter().any(|r| r.is_estimated) {
                println!();
                ui::remark(&ctx, "* estimated");
            }
        }
    }
    Ok(())
}

fn print_map(
    format: OutputFormat,
    kind: ProviderKind,
    map: &BTreeMap<String, f64>,
) -> GridResult<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(map)?),
        OutputFormat::Plain => {
            for (region, value) in map {
                println!("{} {}", region, value);
            }
        }
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::intro(&ctx, &format!("{} - {} regions", kind, map.len()));

            let mut table = Table::new(&[("REGION", 24), ("VALUE", 12)]);
            for (region, value) in map {
                table.row(vec![region.clone(), value.to_string()]);
            }
            table.print(&ctx);
        }
    }
    Ok(())
}
