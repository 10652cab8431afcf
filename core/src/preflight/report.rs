use serde::Serialize;

use crate::error::Remediation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    /// Advisory; the operator may proceed.
    Warn,
    /// Execution must not start.
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Interpreter,
    Artifact,
    Dependency,
    Privilege,
    ExternalResource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreflightCheck {
    pub name: String,
    pub kind: CheckKind,
    pub status: CheckStatus,
    pub remediation: Option<Remediation>,
    pub detail: String,
}

impl PreflightCheck {
    pub fn pass(kind: CheckKind, name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            status: CheckStatus::Pass,
            remediation: None,
            detail: detail.into(),
        }
    }

    pub fn warn(
        kind: CheckKind,
        name: impl Into<String>,
        remediation: Remediation,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            status: CheckStatus::Warn,
            remediation: Some(remediation),
            detail: detail.into(),
        }
    }

    pub fn block(
        kind: CheckKind,
        name: impl Into<String>,
        remediation: Remediation,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            status: CheckStatus::Block,
            remediation: Some(remediation),
            detail: detail.into(),
        }
    }
}

/// Ordered checklist for one tool. Purely data: deciding whether to go ahead
/// past warnings belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreflightReport {
    pub tool_id: String,
    pub checks: Vec<PreflightCheck>,
}

impl PreflightReport {
    pub fn is_blocked(&self) -> bool {
        self.blocking().next().is_some()
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    pub fn blocking(&self) -> impl Iterator<Item = &PreflightCheck> {
        self.checks.iter().filter(|c| c.status == CheckStatus::Block)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &PreflightCheck> {
        self.checks.iter().filter(|c| c.status == CheckStatus::Warn)
    }
}
