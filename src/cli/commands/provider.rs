//! Provider command - list supported providers

use crate::cli::args::{OutputFormat, ProviderAction, ProviderArgs};
use crate::error::GridResult;
use crate::provider::ProviderKind;
use crate::ui::{self, Table, UiContext};
use serde::Serialize;

#[derive(Serialize)]
struct ProviderInfo {
    name: &'static str,
    url: &'static str,
}

/// Execute the provider command
pub async fn execute(args: ProviderArgs) -> GridResult<()> {
    match args.action {
        ProviderAction::List { format } => list(format),
    }
}

fn list(format: OutputFormat) -> GridResult<()> {
    let providers: Vec<ProviderInfo> = ProviderKind::all()
        .iter()
        .map(|kind| ProviderInfo {
            name: kind.name(),
            url: kind.url(),
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&providers)?),
        OutputFormat::Plain => {
            for p in &providers {
                println!("{}", p.name);
            }
        }
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::intro(&ctx, "Providers");

            let mut table = Table::new(&[("NAME", 24), ("URL", 30)]);
            for p in &providers {
                table.row(vec![p.name.to_string(), p.url.to_string()]);
            }
            table.print(&ctx);
        }
    }

    Ok(())
}
