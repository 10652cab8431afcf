use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use adminkit_core::api::{Background, CliError, ExecutionRequest, ExecutionResult, TerminationReason};

use crate::app::App;
use crate::output::ConsoleSink;

use super::cli::RunArgs;
use super::preflight::{find_tool, print_report};

pub async fn run(app: &App, args: &RunArgs) -> Result<i32, CliError> {
    let tool = find_tool(app, &args.tool).await?;
    let report = app.validator.evaluate(&tool).await;
    print_report(&tool, &report);

    if !report.is_blocked() && report.has_warnings() && !args.yes && !confirm("Proceed despite warnings? [y/N] ").await? {
        println!("aborted");
        return Ok(1);
    }

    let mut request = ExecutionRequest::new(&tool.id);
    for raw in &args.params {
        let (key, value) = parse_param(raw)?;
        request = request.with_param(key, value);
    }
    if let Some(secs) = args.timeout_secs {
        request = request.with_max_duration(Duration::from_secs(secs));
    }

    let mut background = Background::new();
    background.spawn_cache_pruner(
        app.cache.clone(),
        Duration::from_secs(app.cfg.cache.prune_interval_secs),
    );
    background.spawn_catalog_refresher(
        app.resolver.clone(),
        Duration::from_secs(app.cfg.catalog.refresh_interval_secs),
    );

    // A blocked report is refused here, with the remediation attached.
    let handle = app.host.start(request, &tool, &report, Arc::new(ConsoleSink::new()))?;
    let correlation_id = handle.correlation_id().to_string();

    let wait = handle.wait();
    tokio::pin!(wait);
    let result = loop {
        tokio::select! {
            result = &mut wait => break result,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("cancelling {}...", tool.id);
                if let Err(e) = app.host.cancel(&correlation_id) {
                    tracing::debug!(error = %e, "cancel after completion");
                }
            }
        }
    };
    background.shutdown().await;

    summarize(&result);
    Ok(exit_code(&result))
}

fn parse_param(raw: &str) -> Result<(String, String), CliError> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(CliError::Command(format!("invalid --param '{raw}', expected KEY=VALUE"))),
    }
}

async fn confirm(prompt: &str) -> Result<bool, CliError> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .map_err(|e| CliError::Command(e.to_string()))??;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn summarize(result: &ExecutionResult) {
    let secs = result.duration_ms as f64 / 1000.0;
    match result.termination_reason {
        TerminationReason::Completed => {
            println!("finished with exit code {} in {secs:.1}s", result.exit_code)
        }
        TerminationReason::Cancelled => println!("cancelled after {secs:.1}s"),
        TerminationReason::TimedOut => println!("timed out after {secs:.1}s"),
        TerminationReason::HostFailure => eprintln!(
            "host failure: {}",
            result.message.as_deref().unwrap_or("process ended abnormally")
        ),
    }
}

/// Script exit code on completion; shell conventions otherwise.
fn exit_code(result: &ExecutionResult) -> i32 {
    match result.termination_reason {
        TerminationReason::Completed => result.exit_code,
        TerminationReason::Cancelled => 130,
        TerminationReason::TimedOut => 124,
        TerminationReason::HostFailure => 125,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_split_on_first_equals() {
        assert_eq!(
            parse_param("filter=a=b").unwrap(),
            ("filter".to_string(), "a=b".to_string())
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }
}
