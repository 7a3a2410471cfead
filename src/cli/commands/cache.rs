//! Cache command - inspect or clear the shared cache file

use crate::cache::{CacheEntry, CacheStore};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::context::Context;
use crate::error::GridResult;
use crate::ui::{self, Table, UiContext};
use serde_json::Value;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> GridResult<()> {
    let Some(store) = file_store(config) else {
        let ctx = UiContext::detect();
        ui::step_warn(
            &ctx,
            "No cache file configured, providers cache in memory only",
            "Run: grid-intensity config set cache.file <path>",
        );
        return Ok(());
    };
    let ctx = Context::background();

    match args.action {
        CacheAction::List { format } => list_entries(&ctx, &store, format).await,
        CacheAction::Clear => clear(&ctx, &store).await,
    }
}

/// Payloads are provider-specific, so entries are read as raw JSON
fn file_store(config: &Config) -> Option<CacheStore<Value>> {
    let cache = config.cache.to_cache_config();
    cache.cache_file.as_ref()?;
    Some(CacheStore::new(cache))
}

async fn list_entries(
    ctx: &Context,
    store: &CacheStore<Value>,
    format: OutputFormat,
) -> GridResult<()> {
    let entries = store.entries(ctx).await?;

    if entries.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => ui::step_info(&UiContext::detect(), "Cache is empty"),
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&entries),
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Plain => {
            for (key, _) in &entries {
                println!("{}", key);
            }
        }
    }

    Ok(())
}

fn print_table(entries: &[(String, CacheEntry<Value>)]) {
    let ctx = UiContext::detect();
    let mut table = Table::new(&[("KEY", 24), ("STATE", 8), ("EXPIRES", 20)]);
    for (key, entry) in entries {
        let state = if entry.is_expired() { "expired" } else { "fresh" };
        table.row(vec![
            key.clone(),
            state.to_string(),
            entry.expires_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    table.print(&ctx);

    println!();
    println!("Total: {} entries", table.len());
}

fn print_json(entries: &[(String, CacheEntry<Value>)]) -> GridResult<()> {
    #[derive(serde::Serialize)]
    struct EntryJson<'a> {
        key: &'a str,
        expired: bool,
        #[serde(flatten)]
        entry: &'a CacheEntry<Value>,
    }

    let json: Vec<EntryJson<'_>> = entries
        .iter()
        .map(|(key, entry)| EntryJson {
            key,
            expired: entry.is_expired(),
            entry,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn clear(ctx: &Context, store: &CacheStore<Value>) -> GridResult<()> {
    store.clear(ctx).await?;

    let path = store
        .cache_file()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    ui::step_ok(&UiContext::detect(), "Cache cleared", Some(&path));
    Ok(())
}
