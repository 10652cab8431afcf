use thiserror::Error;

use super::{ErrorKind, Remediation};

/// Reasons `ExecutionHost::start` / `cancel` refuse a request. Failures of the
/// script itself are not errors; they end up in `ExecutionResult`.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("execution {active} is already running")]
    AlreadyRunning { active: String },

    #[error("pre-flight blocked execution: {detail}")]
    Privilege { detail: String },

    #[error("pre-flight blocked execution: {detail}")]
    Integrity { detail: String },

    #[error("pre-flight blocked execution, interpreter unavailable: {detail}")]
    Interpreter { detail: String },

    #[error("request targets tool {requested} but descriptor is {descriptor}")]
    DescriptorMismatch { requested: String, descriptor: String },

    #[error("no running execution with correlation id {0}")]
    NotRunning(String),
}

impl ExecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::AlreadyRunning { .. } => ErrorKind::AlreadyRunning,
            ExecError::Privilege { .. } => ErrorKind::Privilege,
            ExecError::Integrity { .. } => ErrorKind::Integrity,
            ExecError::Interpreter { .. } => ErrorKind::HostFailure,
            ExecError::DescriptorMismatch { .. } | ExecError::NotRunning(_) => ErrorKind::Invalid,
        }
    }

    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            ExecError::AlreadyRunning { .. } => Some(Remediation::WaitOrCancel),
            ExecError::Privilege { .. } => Some(Remediation::RestartElevated),
            ExecError::Integrity { .. } => Some(Remediation::Redownload),
            ExecError::Interpreter { .. } => Some(Remediation::InstallInterpreter),
            ExecError::DescriptorMismatch { .. } | ExecError::NotRunning(_) => None,
        }
    }
}
