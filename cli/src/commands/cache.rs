use adminkit_core::api::CliError;

use crate::app::App;
use crate::output::human_bytes;

use super::cli::{CacheAction, CacheArgs};

pub async fn run(app: &App, args: &CacheArgs, json: bool) -> Result<i32, CliError> {
    match &args.action {
        CacheAction::Size => {
            let entries = app.cache.entries();
            let bytes = app.cache.size();
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "root": app.cache.root(),
                        "entries": entries.len(),
                        "bytes": bytes,
                    })
                );
            } else {
                println!("{}", app.cache.root().display());
                println!("{} entries, {}", entries.len(), human_bytes(bytes));
            }
        }
        CacheAction::Prune => {
            let removed = app.cache.prune()?;
            println!("pruned {removed} expired entries");
        }
        CacheAction::Clear => {
            let removed = app.cache.clear().await?;
            println!("removed {removed} entries");
        }
        CacheAction::Invalidate { path } => {
            if app.cache.invalidate(path)? {
                println!("invalidated {path}");
            } else {
                println!("{path} was not cached");
            }
        }
    }
    Ok(0)
}
