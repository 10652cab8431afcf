//! Supervised execution of catalog tools.
mod events;
pub mod exit;
mod host;
mod progress;
mod tee;
mod terminate;
mod types;

pub use events::{ChannelSink, NullSink, OutputEvent, OutputSink, OutputStream, ProgressUpdate, RunnerEvent};
pub use host::{ExecutionHandle, ExecutionHost, CORRELATION_ENV, MODULE_PATH_ENV, PARAM_ENV_PREFIX};
pub use progress::{ProgressParser, PROGRESS_PREFIX};
pub use types::{ExecState, ExecutionRequest, ExecutionResult, TerminationReason};
