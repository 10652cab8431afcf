use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One request to run a catalog tool.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub tool_id: String,
    pub parameters: BTreeMap<String, String>,
    pub correlation_id: String,
    /// Overrides `[control].max_duration_ms` for this run.
    pub max_duration: Option<Duration>,
}

impl ExecutionRequest {
    pub fn new(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            parameters: BTreeMap::new(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
            max_duration: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    pub fn with_max_duration(mut self, limit: Duration) -> Self {
        self.max_duration = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Completed,
    Cancelled,
    TimedOut,
    HostFailure,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Completed => "completed",
            TerminationReason::Cancelled => "cancelled",
            TerminationReason::TimedOut => "timed_out",
            TerminationReason::HostFailure => "host_failure",
        }
    }
}

impl std::str::FromStr for TerminationReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "timed_out" | "timeout" => Ok(Self::TimedOut),
            "host_failure" => Ok(Self::HostFailure),
            other => Err(format!("unknown outcome '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// True only for a normal completion with exit code 0.
    pub success: bool,
    /// `-1` when the process never produced one.
    pub exit_code: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub termination_reason: TerminationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Lifecycle of one run. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecState {
    Pending,
    Starting,
    Running,
    Completed,
    Cancelled,
    TimedOut,
    HostFailure,
}

impl ExecState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecState::Completed | ExecState::Cancelled | ExecState::TimedOut | ExecState::HostFailure
        )
    }

    pub fn can_transition_to(&self, next: ExecState) -> bool {
        use ExecState::*;
        matches!(
            (self, next),
            (Pending, Starting)
                | (Starting, Running)
                | (Starting, Cancelled)
                | (Starting, HostFailure)
                | (Running, Completed)
                | (Running, Cancelled)
                | (Running, TimedOut)
                | (Running, HostFailure)
        )
    }
}

impl From<TerminationReason> for ExecState {
    fn from(reason: TerminationReason) -> Self {
        match reason {
            TerminationReason::Completed => ExecState::Completed,
            TerminationReason::Cancelled => ExecState::Cancelled,
            TerminationReason::TimedOut => ExecState::TimedOut,
            TerminationReason::HostFailure => ExecState::HostFailure,
        }
    }
}
