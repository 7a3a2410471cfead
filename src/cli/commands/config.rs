//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{GridError, GridResult};
use crate::provider::ProviderKind;
use crate::ui::{self, UiContext};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Keys accepted by `config set`
const VALID_KEYS: &[&str] = &[
    "general.provider",
    "general.regions",
    "general.timeout_secs",
    "cache.file",
    "cache.lock_timeout_secs",
    "cache.lock_retry_ms",
    "carbon_intensity_uk.api_url",
    "electricity_maps.api_url",
    "watt_time.api_url",
    "exporter.address",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> GridResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, config, &key, &value).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> GridResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> GridResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;

    ui::step_ok(
        &ctx,
        "Configuration initialized",
        Some(&path.display().to_string()),
    );

    Ok(())
}

async fn set_value(
    manager: &ConfigManager,
    config: &Config,
    key: &str,
    value: &str,
) -> GridResult<()> {
    let ctx = UiContext::detect();
    let mut config = config.clone();

    if let Err(e) = apply(&mut config, key, value) {
        if matches!(e, GridError::User(_)) && !VALID_KEYS.contains(&key) {
            ui::step_error(&ctx, "Unknown config key", key);
            ui::remark(&ctx, "Valid keys:");
            print_valid_keys();
        }
        return Err(e);
    }

    manager.save(&config).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value), None);

    Ok(())
}

/// Apply one dot-separated key to `config`
fn apply(config: &mut Config, key: &str, value: &str) -> GridResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "provider"] => {
            config.general.provider = value.parse::<ProviderKind>()?.name().to_string()
        }
        ["general", "regions"] => {
            config.general.regions = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        ["general", "timeout_secs"] => config.general.timeout_secs = parse_u64(value)?,

        ["cache", "file"] => {
            config.cache.file = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            }
        }
        ["cache", "lock_timeout_secs"] => config.cache.lock_timeout_secs = parse_u64(value)?,
        ["cache", "lock_retry_ms"] => config.cache.lock_retry_ms = parse_u64(value)?,

        ["carbon_intensity_uk", "api_url"] => {
            config.carbon_intensity_uk.api_url = value.to_string()
        }
        ["electricity_maps", "api_url"] => config.electricity_maps.api_url = value.to_string(),
        ["watt_time", "api_url"] => config.watt_time.api_url = value.to_string(),

        ["exporter", "address"] => {
            value
                .parse::<SocketAddr>()
                .map_err(|_| GridError::User(format!("Invalid listen address: {}", value)))?;
            config.exporter.address = value.to_string();
        }

        _ => return Err(GridError::User(format!("Unknown config key: {}", key))),
    }

    Ok(())
}

fn parse_u64(value: &str) -> GridResult<u64> {
    value
        .parse()
        .map_err(|_| GridError::User(format!("Invalid number: {}", value)))
}

fn print_valid_keys() {
    for key in VALID_KEYS {
        eprintln!("  {}", key);
    }
}
