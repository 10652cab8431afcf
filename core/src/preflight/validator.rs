use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::cache::ArtifactCache;
use crate::catalog::{ModuleRef, ToolDescriptor};
use crate::error::Remediation;

use super::probes::{PrivilegeProbe, ReachabilityProbe};
use super::report::{CheckKind, PreflightCheck, PreflightReport};

/// Runs the pre-flight checklist for a tool. Side effects are limited to
/// warming the artifact cache.
pub struct PreflightValidator {
    cache: ArtifactCache,
    interpreter: String,
    privilege: Arc<dyn PrivilegeProbe>,
    reachability: Arc<dyn ReachabilityProbe>,
    probe_timeout: Duration,
    default_probe_target: Option<String>,
}

impl PreflightValidator {
    pub fn new(
        cache: ArtifactCache,
        interpreter: impl Into<String>,
        privilege: Arc<dyn PrivilegeProbe>,
        reachability: Arc<dyn ReachabilityProbe>,
    ) -> Self {
        Self {
            cache,
            interpreter: interpreter.into(),
            privilege,
            reachability,
            probe_timeout: Duration::from_millis(3_000),
            default_probe_target: None,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_default_probe_target(mut self, target: Option<String>) -> Self {
        self.default_probe_target = target;
        self
    }

    /// Checks are independent and run concurrently; the report keeps a fixed
    /// order (interpreter, artifact, dependencies, privilege, external resource).
    pub async fn evaluate(&self, tool: &ToolDescriptor) -> PreflightReport {
        let (interpreter, artifact, dependencies, privilege, external) = tokio::join!(
            self.check_interpreter(),
            self.check_artifact(tool),
            self.check_dependencies(tool),
            self.check_privilege(tool),
            self.check_external_resource(tool),
        );

        let mut checks = Vec::with_capacity(dependencies.len() + 4);
        checks.push(interpreter);
        checks.push(artifact);
        checks.extend(dependencies);
        checks.push(privilege);
        checks.push(external);

        let report = PreflightReport {
            tool_id: tool.id.clone(),
            checks,
        };
        tracing::info!(
            target: "adminkit.preflight",
            tool = %tool.id,
            blocked = report.is_blocked(),
            warnings = report.warnings().count(),
            "pre-flight evaluated"
        );
        report
    }

    async fn check_interpreter(&self) -> PreflightCheck {
        let program = self.interpreter.clone();
        let found = tokio::task::spawn_blocking(move || which::which(&program)).await;
        match found {
            Ok(Ok(path)) => PreflightCheck::pass(
                CheckKind::Interpreter,
                "interpreter",
                format!("found at {}", path.display()),
            ),
            Ok(Err(e)) => PreflightCheck::block(
                CheckKind::Interpreter,
                "interpreter",
                Remediation::InstallInterpreter,
                format!("{}: {e}", self.interpreter),
            ),
            Err(e) => PreflightCheck::block(
                CheckKind::Interpreter,
                "interpreter",
                Remediation::InstallInterpreter,
                format!("lookup failed: {e}"),
            ),
        }
    }

    async fn check_artifact(&self, tool: &ToolDescriptor) -> PreflightCheck {
        match self.cache.resolve(&tool.artifact_path, &tool.checksum).await {
            Ok(path) => PreflightCheck::pass(
                CheckKind::Artifact,
                "artifact",
                format!("verified {}", path.display()),
            ),
            Err(e) => PreflightCheck::block(
                CheckKind::Artifact,
                "artifact",
                Remediation::Redownload,
                e.to_string(),
            ),
        }
    }

    async fn check_dependencies(&self, tool: &ToolDescriptor) -> Vec<PreflightCheck> {
        if tool.dependencies.is_empty() {
            return vec![PreflightCheck::pass(
                CheckKind::Dependency,
                "dependencies",
                "none declared",
            )];
        }
        join_all(tool.dependencies.iter().map(|m| self.check_module(m))).await
    }

    async fn check_module(&self, module: &ModuleRef) -> PreflightCheck {
        let name = format!("module {}", module.id);
        match self.cache.resolve(&module.artifact_path, &module.checksum).await {
            Ok(_) => PreflightCheck::pass(CheckKind::Dependency, name, "verified"),
            Err(e) => PreflightCheck::block(
                CheckKind::Dependency,
                name,
                Remediation::Redownload,
                e.to_string(),
            ),
        }
    }

    async fn check_privilege(&self, tool: &ToolDescriptor) -> PreflightCheck {
        if !tool.requires_elevated_privilege {
            return PreflightCheck::pass(CheckKind::Privilege, "privilege", "not required");
        }
        let probe = self.privilege.clone();
        let elevated = tokio::task::spawn_blocking(move || probe.is_elevated())
            .await
            .unwrap_or(false);
        if elevated {
            PreflightCheck::pass(CheckKind::Privilege, "privilege", "running elevated")
        } else {
            PreflightCheck::block(
                CheckKind::Privilege,
                "privilege",
                Remediation::RestartElevated,
                "tool requires elevated privilege",
            )
        }
    }

    async fn check_external_resource(&self, tool: &ToolDescriptor) -> PreflightCheck {
        const NAME: &str = "external resource";
        if !tool.requires_external_resource {
            return PreflightCheck::pass(CheckKind::ExternalResource, NAME, "not required");
        }
        let Some(target) = tool
            .external_resource
            .as_deref()
            .or(self.default_probe_target.as_deref())
        else {
            return PreflightCheck::warn(
                CheckKind::ExternalResource,
                NAME,
                Remediation::CheckConnectivity,
                "no probe target configured",
            );
        };

        let outcome = tokio::time::timeout(
            self.probe_timeout,
            self.reachability.probe(target, self.probe_timeout),
        )
        .await;
        match outcome {
            Ok(Ok(())) => PreflightCheck::pass(
                CheckKind::ExternalResource,
                NAME,
                format!("{target} reachable"),
            ),
            Ok(Err(reason)) => PreflightCheck::warn(
                CheckKind::ExternalResource,
                NAME,
                Remediation::CheckConnectivity,
                format!("{target}: {reason}"),
            ),
            Err(_) => PreflightCheck::warn(
                CheckKind::ExternalResource,
                NAME,
                Remediation::CheckConnectivity,
                format!("{target}: no answer within {:?}", self.probe_timeout),
            ),
        }
    }
}
