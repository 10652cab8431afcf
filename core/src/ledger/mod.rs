//! Append-only execution history.
mod memory;
mod ndjson;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::runner::{ExecutionResult, TerminationReason};

pub use memory::MemoryLedger;
pub use ndjson::NdjsonLedger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionHistoryEntry {
    pub correlation_id: String,
    pub tool_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub tool_version: String,
    pub machine: String,
    pub user: String,
    #[serde(flatten)]
    pub result: ExecutionResult,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub tool_id: Option<String>,
    pub outcome: Option<TerminationReason>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn for_tool(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: Some(tool_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &ExecutionHistoryEntry) -> bool {
        if let Some(tool) = &self.tool_id {
            if &entry.tool_id != tool {
                return false;
            }
        }
        if let Some(outcome) = self.outcome {
            if entry.result.termination_reason != outcome {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.result.start_time < since {
                return false;
            }
        }
        true
    }

    /// Newest first, then limited. `entries` is in append order.
    pub(crate) fn apply(&self, entries: Vec<ExecutionHistoryEntry>) -> Vec<ExecutionHistoryEntry> {
        let mut out: Vec<_> = entries.into_iter().rev().filter(|e| self.matches(e)).collect();
        // Stable: equal end times keep reverse append order.
        out.sort_by(|a, b| b.result.end_time.cmp(&a.result.end_time));
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// Durable record of every execution. `record` is called exactly once per
/// run, whatever its outcome.
#[async_trait]
pub trait ExecutionLedger: Send + Sync {
    async fn record(&self, entry: &ExecutionHistoryEntry) -> Result<(), LedgerError>;

    async fn query(&self, filter: &HistoryFilter) -> Result<Vec<ExecutionHistoryEntry>, LedgerError>;
}

/// Machine and user the host attributes runs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub machine: String,
    pub user: String,
}

impl HostIdentity {
    pub fn detect() -> Self {
        let machine = sysinfo::System::host_name()
            .or_else(|| std::env::var("COMPUTERNAME").ok())
            .unwrap_or_else(|| "unknown".to_string());
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self { machine, user }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::Duration;

    pub fn entry(tool: &str, reason: TerminationReason, minutes_ago: i64) -> ExecutionHistoryEntry {
        let end = Utc::now() - Duration::minutes(minutes_ago);
        ExecutionHistoryEntry {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            tool_id: tool.to_string(),
            tool_name: tool.to_uppercase(),
            tool_version: "1.0.0".into(),
            machine: "host-1".into(),
            user: "ops".into(),
            result: ExecutionResult {
                success: reason == TerminationReason::Completed,
                exit_code: if reason == TerminationReason::Completed { 0 } else { -1 },
                start_time: end - Duration::seconds(3),
                end_time: end,
                duration_ms: 3_000,
                termination_reason: reason,
                message: None,
            },
        }
    }
}
