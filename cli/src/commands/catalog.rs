use adminkit_core::api::{CatalogOrigin, CliError, ToolDescriptor};

use crate::app::App;

use super::cli::CatalogArgs;

pub async fn run(app: &App, args: &CatalogArgs, json: bool) -> Result<i32, CliError> {
    let catalog = app.resolver.resolve(args.refresh).await?;

    if json {
        let out = serde_json::to_string_pretty(&*catalog).map_err(|e| CliError::Command(e.to_string()))?;
        println!("{out}");
        return Ok(0);
    }

    match catalog.origin {
        CatalogOrigin::Remote => {}
        CatalogOrigin::Cache => println!("(catalog from cache, fetched {})", catalog.fetched_at.format("%F %T")),
        CatalogOrigin::StaleCache => println!("(offline: showing the last cached catalog)"),
    }
    if let Some(update) = &catalog.update {
        println!("launcher update available: {} -> {}", update.current, update.available);
    }

    for category in &catalog.categories {
        println!("\n{category}");
        for tool in catalog.tools_in(category) {
            println!("  {:<28} {:<36} {:<10} {}", tool.id, tool.name, tool.version, flags(tool));
        }
    }
    Ok(0)
}

fn flags(tool: &ToolDescriptor) -> String {
    let mut flags = Vec::new();
    if tool.requires_elevated_privilege {
        flags.push("admin");
    }
    if tool.requires_external_resource {
        flags.push("network");
    }
    if flags.is_empty() {
        String::new()
    } else {
        format!("[{}]", flags.join(","))
    }
}
