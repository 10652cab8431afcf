use std::collections::HashMap;

use adminkit_core::api::{CliError, ExecutionHistoryEntry, HistoryFilter, TerminationReason};
use serde::Serialize;

use crate::app::App;

use super::cli::HistoryArgs;

pub async fn run(app: &App, args: &HistoryArgs, json: bool) -> Result<i32, CliError> {
    let outcome = args
        .outcome
        .as_deref()
        .map(str::parse::<TerminationReason>)
        .transpose()
        .map_err(CliError::Command)?;
    let mut filter = HistoryFilter {
        tool_id: args.tool.clone(),
        outcome,
        since: None,
        limit: Some(args.limit),
    };

    if args.stats {
        filter.limit = None;
        let stats = HistoryStats::from_entries(&app.ledger.query(&filter).await?);
        if json {
            let out = serde_json::to_string_pretty(&stats).map_err(|e| CliError::Command(e.to_string()))?;
            println!("{out}");
        } else {
            println!(
                "{} runs, {} succeeded ({:.0}%)",
                stats.total,
                stats.succeeded,
                stats.success_rate * 100.0
            );
            for (tool, count) in &stats.most_used {
                println!("  {count:>5}  {tool}");
            }
        }
        return Ok(0);
    }

    let entries = app.ledger.query(&filter).await?;
    if json {
        let out = serde_json::to_string_pretty(&entries).map_err(|e| CliError::Command(e.to_string()))?;
        println!("{out}");
        return Ok(0);
    }
    for e in &entries {
        println!(
            "{}  {:<28} {:<12} exit {:>4}  {:>7}ms  {}@{}",
            e.result.end_time.format("%F %T"),
            e.tool_id,
            e.result.termination_reason.as_str(),
            e.result.exit_code,
            e.result.duration_ms,
            e.user,
            e.machine
        );
    }
    Ok(0)
}

#[derive(Debug, Serialize, PartialEq)]
struct HistoryStats {
    total: usize,
    succeeded: usize,
    success_rate: f64,
    /// Tool id and run count, most used first.
    most_used: Vec<(String, usize)>,
}

impl HistoryStats {
    const TOP: usize = 5;

    fn from_entries(entries: &[ExecutionHistoryEntry]) -> Self {
        let total = entries.len();
        let succeeded = entries.iter().filter(|e| e.result.success).count();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for e in entries {
            *counts.entry(e.tool_id.as_str()).or_default() += 1;
        }
        let mut most_used: Vec<(String, usize)> = counts.into_iter().map(|(t, n)| (t.to_string(), n)).collect();
        most_used.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        most_used.truncate(Self::TOP);

        Self {
            total,
            succeeded,
            success_rate: if total == 0 { 0.0 } else { succeeded as f64 / total as f64 },
            most_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adminkit_core::api::ExecutionResult;
    use chrono::Utc;

    fn entry(tool: &str, success: bool) -> ExecutionHistoryEntry {
        let now = Utc::now();
        ExecutionHistoryEntry {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            tool_id: tool.into(),
            tool_name: tool.into(),
            tool_version: "1.0".into(),
            machine: "m".into(),
            user: "u".into(),
            result: ExecutionResult {
                success,
                exit_code: if success { 0 } else { 1 },
                start_time: now,
                end_time: now,
                duration_ms: 1,
                termination_reason: TerminationReason::Completed,
                message: None,
            },
        }
    }

    #[test]
    fn stats_rank_tools_and_compute_success_rate() {
        let entries = vec![
            entry("disk.clean", true),
            entry("net.flush", false),
            entry("disk.clean", true),
            entry("net.flush", true),
            entry("disk.clean", false),
        ];
        let stats = HistoryStats::from_entries(&entries);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.succeeded, 3);
        assert!((stats.success_rate - 0.6).abs() < f64::EPSILON);
        assert_eq!(
            stats.most_used,
            vec![("disk.clean".to_string(), 3), ("net.flush".to_string(), 2)]
        );
    }

    #[test]
    fn empty_history_has_zero_rate() {
        let stats = HistoryStats::from_entries(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.success_rate, 0.0);
    }
}
