use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use super::types::{ExecState, ExecutionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
    Progress,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub percent: Option<u8>,
    pub activity: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputEvent {
    pub stream: OutputStream,
    pub line: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressUpdate>,
}

/// Receives a run's output as it is produced. Called from reader tasks, so
/// implementations must not block.
pub trait OutputSink: Send + Sync {
    fn on_output(&self, correlation_id: &str, event: OutputEvent);

    fn on_state(&self, _correlation_id: &str, _state: ExecState) {}

    fn on_result(&self, correlation_id: &str, result: &ExecutionResult);
}

/// Frontend-facing events, forwarded by [`ChannelSink`].
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    Output(OutputEvent),
    State(ExecState),
    Finished(ExecutionResult),
}

/// Sink that forwards everything into an unbounded channel. A dropped
/// receiver silently discards events.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RunnerEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RunnerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl OutputSink for ChannelSink {
    fn on_output(&self, _correlation_id: &str, event: OutputEvent) {
        let _ = self.tx.send(RunnerEvent::Output(event));
    }

    fn on_state(&self, _correlation_id: &str, state: ExecState) {
        let _ = self.tx.send(RunnerEvent::State(state));
    }

    fn on_result(&self, _correlation_id: &str, result: &ExecutionResult) {
        let _ = self.tx.send(RunnerEvent::Finished(result.clone()));
    }
}

/// Discards everything.
pub struct NullSink;

impl OutputSink for NullSink {
    fn on_output(&self, _correlation_id: &str, _event: OutputEvent) {}

    fn on_result(&self, _correlation_id: &str, _result: &ExecutionResult) {}
}
