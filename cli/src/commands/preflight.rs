use adminkit_core::api::{CheckStatus, CliError, PreflightReport, ToolDescriptor};

use crate::app::App;

use super::cli::PreflightArgs;

pub async fn run(app: &App, args: &PreflightArgs, json: bool) -> Result<i32, CliError> {
    let tool = find_tool(app, &args.tool).await?;
    let report = app.validator.evaluate(&tool).await;

    if json {
        let out = serde_json::to_string_pretty(&report).map_err(|e| CliError::Command(e.to_string()))?;
        println!("{out}");
    } else {
        print_report(&tool, &report);
    }
    Ok(if report.is_blocked() { 1 } else { 0 })
}

pub async fn find_tool(app: &App, id: &str) -> Result<ToolDescriptor, CliError> {
    let catalog = app.resolver.resolve(false).await?;
    catalog
        .tool(id)
        .cloned()
        .ok_or_else(|| CliError::UnknownTool(id.to_string()))
}

pub fn print_report(tool: &ToolDescriptor, report: &PreflightReport) {
    println!("pre-flight for {} ({} {})", tool.name, tool.id, tool.version);
    for check in &report.checks {
        let mark = match check.status {
            CheckStatus::Pass => "ok  ",
            CheckStatus::Warn => "WARN",
            CheckStatus::Block => "FAIL",
        };
        match check.remediation {
            Some(r) => println!("  [{mark}] {:<22} {} ({})", check.name, check.detail, r.hint()),
            None => println!("  [{mark}] {:<22} {}", check.name, check.detail),
        }
    }
}
