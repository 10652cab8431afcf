use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use encoding_rs::Encoding;
use futures::FutureExt;
use tokio::process::Command;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::cache::ArtifactCache;
use crate::catalog::ToolDescriptor;
use crate::config::{ControlConfig, InterpreterConfig, ParamStyle};
use crate::error::ExecError;
use crate::ledger::{ExecutionHistoryEntry, ExecutionLedger, HostIdentity};
use crate::preflight::{CheckKind, PreflightReport};

use super::events::OutputSink;
use super::exit::{exited_normally, normalize_exit};
use super::progress::ProgressParser;
use super::tee::{self, LineTap};
use super::terminate::terminate;
use super::types::{ExecState, ExecutionRequest, ExecutionResult, TerminationReason};

/// Directories of the tool's resolved modules, in dependency order.
pub const MODULE_PATH_ENV: &str = "ADMINKIT_MODULE_PATH";
pub const CORRELATION_ENV: &str = "ADMINKIT_CORRELATION_ID";
pub const PARAM_ENV_PREFIX: &str = "ADMINKIT_PARAM_";

/// Returned by [`ExecutionHost::start`]; resolves once the run has been
/// recorded and the host is free again.
pub struct ExecutionHandle {
    correlation_id: String,
    result: oneshot::Receiver<ExecutionResult>,
}

impl ExecutionHandle {
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub async fn wait(self) -> ExecutionResult {
        let now = Utc::now();
        self.result.await.unwrap_or_else(|_| ExecutionResult {
            success: false,
            exit_code: -1,
            start_time: now,
            end_time: now,
            duration_ms: 0,
            termination_reason: TerminationReason::HostFailure,
            message: Some("execution supervisor went away".to_string()),
        })
    }
}

struct ActiveRun {
    correlation_id: String,
    state: ExecState,
    stop: watch::Sender<bool>,
}

enum Ending {
    Exited(std::io::Result<ExitStatus>),
    Stopped(TerminationReason),
}

struct Prepared {
    artifact: PathBuf,
    module_dirs: Vec<PathBuf>,
}

/// Runs at most one tool at a time as a supervised child process.
#[derive(Clone)]
pub struct ExecutionHost {
    inner: Arc<HostInner>,
}

struct HostInner {
    cache: ArtifactCache,
    ledger: Arc<dyn ExecutionLedger>,
    interpreter: InterpreterConfig,
    control: ControlConfig,
    identity: HostIdentity,
    encoding: &'static Encoding,
    progress: Arc<ProgressParser>,
    active: Mutex<Option<ActiveRun>>,
}

impl ExecutionHost {
    pub fn new(
        cache: ArtifactCache,
        ledger: Arc<dyn ExecutionLedger>,
        interpreter: InterpreterConfig,
        control: ControlConfig,
        identity: HostIdentity,
    ) -> Self {
        let encoding = Encoding::for_label(interpreter.output_encoding.as_bytes()).unwrap_or_else(|| {
            tracing::warn!(
                target: "adminkit.exec",
                label = %interpreter.output_encoding,
                "unknown output encoding, using utf-8"
            );
            encoding_rs::UTF_8
        });
        Self {
            inner: Arc::new(HostInner {
                cache,
                ledger,
                interpreter,
                control,
                identity,
                encoding,
                progress: Arc::new(ProgressParser::new()),
                active: Mutex::new(None),
            }),
        }
    }

    /// Claims the single execution slot and starts supervising the run in the
    /// background. Refuses blocked pre-flight reports, mismatched requests
    /// and concurrent runs; everything after this point (including a failed
    /// spawn) is reported through the handle and the ledger.
    pub fn start(
        &self,
        request: ExecutionRequest,
        tool: &ToolDescriptor,
        preflight: &PreflightReport,
        sink: Arc<dyn OutputSink>,
    ) -> Result<ExecutionHandle, ExecError> {
        if request.tool_id != tool.id {
            return Err(ExecError::DescriptorMismatch {
                requested: request.tool_id,
                descriptor: tool.id.clone(),
            });
        }
        if preflight.tool_id != tool.id {
            return Err(ExecError::DescriptorMismatch {
                requested: preflight.tool_id.clone(),
                descriptor: tool.id.clone(),
            });
        }
        if preflight.is_blocked() {
            return Err(blocked(preflight));
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        {
            let mut active = lock(&self.inner.active);
            if let Some(run) = active.as_ref() {
                return Err(ExecError::AlreadyRunning {
                    active: run.correlation_id.clone(),
                });
            }
            *active = Some(ActiveRun {
                correlation_id: request.correlation_id.clone(),
                state: ExecState::Pending,
                stop: stop_tx,
            });
        }

        let (result_tx, result_rx) = oneshot::channel();
        let correlation_id = request.correlation_id.clone();
        let inner = self.inner.clone();
        let tool = tool.clone();
        tokio::spawn(async move {
            let requested_at = Utc::now();
            let supervised = AssertUnwindSafe(inner.supervise(&request, &tool, stop_rx, &sink))
                .catch_unwind()
                .await;
            let result = supervised.unwrap_or_else(|_| ExecutionResult {
                success: false,
                exit_code: -1,
                start_time: requested_at,
                end_time: Utc::now(),
                duration_ms: 0,
                termination_reason: TerminationReason::HostFailure,
                message: Some("execution supervisor panicked".to_string()),
            });
            inner.finish(&request, &tool, &result, &sink).await;
            let _ = result_tx.send(result);
        });

        Ok(ExecutionHandle {
            correlation_id,
            result: result_rx,
        })
    }

    /// Requests termination of the active run. Returns once the request is
    /// registered; the run itself ends within the configured grace period.
    pub fn cancel(&self, correlation_id: &str) -> Result<(), ExecError> {
        let active = lock(&self.inner.active);
        match active.as_ref() {
            Some(run) if run.correlation_id == correlation_id && !run.state.is_terminal() => {
                run.stop.send_replace(true);
                tracing::info!(
                    target: "adminkit.exec",
                    correlation_id,
                    state = ?run.state,
                    "cancellation requested"
                );
                Ok(())
            }
            _ => Err(ExecError::NotRunning(correlation_id.to_string())),
        }
    }

    pub async fn wait(&self, handle: ExecutionHandle) -> ExecutionResult {
        handle.wait().await
    }

    /// Correlation id and state of the run holding the slot, if any.
    pub fn active(&self) -> Option<(String, ExecState)> {
        lock(&self.inner.active)
            .as_ref()
            .map(|run| (run.correlation_id.clone(), run.state))
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.inner.active).is_some()
    }
}

impl HostInner {
    async fn supervise(
        &self,
        request: &ExecutionRequest,
        tool: &ToolDescriptor,
        mut stop: watch::Receiver<bool>,
        sink: &Arc<dyn OutputSink>,
    ) -> ExecutionResult {
        let id = request.correlation_id.as_str();
        let start_time = Utc::now();
        let clock = Instant::now();
        self.transition(id, ExecState::Starting, sink);

        let prepared = tokio::select! {
            prepared = self.prepare(tool) => prepared,
            _ = stop_requested(&mut stop) => {
                return self.conclude(id, TerminationReason::Cancelled, None,
                    Some("cancelled before the process started".into()), start_time, clock, sink);
            }
        };
        let prepared = match prepared {
            Ok(p) => p,
            Err(message) => {
                return self.conclude(id, TerminationReason::HostFailure, None, Some(message), start_time, clock, sink);
            }
        };

        let mut command = self.build_command(request, &prepared);
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = format!("failed to start {}: {e}", self.interpreter.program);
                return self.conclude(id, TerminationReason::HostFailure, None, Some(message), start_time, clock, sink);
            }
        };
        self.transition(id, ExecState::Running, sink);
        tracing::info!(
            target: "adminkit.exec",
            correlation_id = id,
            tool = %tool.id,
            pid = child.id(),
            "process started"
        );

        let tap = LineTap {
            correlation_id: Arc::from(id),
            sink: sink.clone(),
            encoding: self.encoding,
            progress: self.progress.clone(),
        };
        let mut readers: Vec<JoinHandle<u64>> = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tee::pump_stdout(stdout, tap.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tee::pump_stderr(stderr, tap));
        }

        let limit = request
            .max_duration
            .or(self.control.max_duration_ms.map(Duration::from_millis));
        let deadline = limit.map(|d| tokio::time::Instant::now() + d);

        let ending = tokio::select! {
            status = child.wait() => Ending::Exited(status),
            _ = stop_requested(&mut stop) => Ending::Stopped(TerminationReason::Cancelled),
            _ = sleep_until(deadline) => Ending::Stopped(TerminationReason::TimedOut),
        };

        let (reason, status, message) = match ending {
            Ending::Exited(Ok(status)) if exited_normally(&status) => {
                (TerminationReason::Completed, Some(status), None)
            }
            Ending::Exited(Ok(status)) => (
                TerminationReason::HostFailure,
                Some(status),
                Some(format!("process died abnormally (status {})", normalize_exit(status))),
            ),
            Ending::Exited(Err(e)) => (
                TerminationReason::HostFailure,
                None,
                Some(format!("lost track of process: {e}")),
            ),
            Ending::Stopped(reason) => {
                tracing::info!(
                    target: "adminkit.exec",
                    correlation_id = id,
                    reason = reason.as_str(),
                    "stopping process"
                );
                let grace = Duration::from_millis(self.control.abort_grace_ms);
                match terminate(&mut child, grace).await {
                    Ok(status) => (reason, Some(status), None),
                    Err(e) => (reason, None, Some(format!("termination failed: {e}"))),
                }
            }
        };

        drain(id, readers, Duration::from_millis(self.control.drain_timeout_ms)).await;
        self.conclude(id, reason, status, message, start_time, clock, sink)
    }

    async fn prepare(&self, tool: &ToolDescriptor) -> Result<Prepared, String> {
        let artifact = self
            .cache
            .resolve(&tool.artifact_path, &tool.checksum)
            .await
            .map_err(|e| format!("artifact {}: {e}", tool.artifact_path))?;

        let mut module_dirs: Vec<PathBuf> = Vec::new();
        for module in &tool.dependencies {
            let path = self
                .cache
                .resolve(&module.artifact_path, &module.checksum)
                .await
                .map_err(|e| format!("module {}: {e}", module.id))?;
            if let Some(dir) = path.parent().map(|d| d.to_path_buf()) {
                if !module_dirs.contains(&dir) {
                    module_dirs.push(dir);
                }
            }
        }
        Ok(Prepared {
            artifact,
            module_dirs,
        })
    }

    fn build_command(&self, request: &ExecutionRequest, prepared: &Prepared) -> Command {
        let mut cmd = Command::new(&self.interpreter.program);
        cmd.args(&self.interpreter.args).arg(&prepared.artifact);

        match self.interpreter.param_style {
            ParamStyle::Named => {
                for (key, value) in &request.parameters {
                    cmd.arg(format!("-{key}")).arg(value);
                }
            }
            ParamStyle::Env => {
                for (key, value) in &request.parameters {
                    cmd.env(param_env_name(key), value);
                }
            }
        }

        cmd.env(CORRELATION_ENV, &request.correlation_id);
        if !prepared.module_dirs.is_empty() {
            match std::env::join_paths(&prepared.module_dirs) {
                Ok(joined) => {
                    cmd.env(MODULE_PATH_ENV, joined);
                }
                Err(e) => tracing::warn!(
                    target: "adminkit.exec",
                    error = %e,
                    "module directories cannot be joined into a search path"
                ),
            }
        }
        if let Some(dir) = prepared.artifact.parent() {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    fn conclude(
        &self,
        id: &str,
        reason: TerminationReason,
        status: Option<ExitStatus>,
        message: Option<String>,
        start_time: DateTime<Utc>,
        clock: Instant,
        sink: &Arc<dyn OutputSink>,
    ) -> ExecutionResult {
        let exit_code = status.map(normalize_exit).unwrap_or(-1);
        self.transition(id, reason.into(), sink);
        ExecutionResult {
            success: reason == TerminationReason::Completed && exit_code == 0,
            exit_code,
            start_time,
            end_time: Utc::now(),
            duration_ms: clock.elapsed().as_millis() as u64,
            termination_reason: reason,
            message,
        }
    }

    /// Ledger first, then the slot, then observers.
    async fn finish(
        &self,
        request: &ExecutionRequest,
        tool: &ToolDescriptor,
        result: &ExecutionResult,
        sink: &Arc<dyn OutputSink>,
    ) {
        let entry = ExecutionHistoryEntry {
            correlation_id: request.correlation_id.clone(),
            tool_id: tool.id.clone(),
            tool_name: tool.name.clone(),
            tool_version: tool.version.clone(),
            machine: self.identity.machine.clone(),
            user: self.identity.user.clone(),
            result: result.clone(),
        };
        if let Err(e) = self.ledger.record(&entry).await {
            tracing::error!(
                target: "adminkit.ledger",
                correlation_id = %request.correlation_id,
                error = %e,
                "failed to record execution"
            );
        }

        {
            let mut active = lock(&self.active);
            if active
                .as_ref()
                .is_some_and(|run| run.correlation_id == request.correlation_id)
            {
                *active = None;
            }
        }

        tracing::info!(
            target: "adminkit.exec",
            correlation_id = %request.correlation_id,
            tool = %tool.id,
            outcome = result.termination_reason.as_str(),
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            "execution finished"
        );
        sink.on_result(&request.correlation_id, result);
    }

    fn transition(&self, id: &str, next: ExecState, sink: &Arc<dyn OutputSink>) {
        {
            let mut active = lock(&self.active);
            if let Some(run) = active.as_mut().filter(|run| run.correlation_id == id) {
                if !run.state.can_transition_to(next) {
                    tracing::warn!(
                        target: "adminkit.exec",
                        correlation_id = id,
                        from = ?run.state,
                        to = ?next,
                        "ignoring invalid state transition"
                    );
                    return;
                }
                run.state = next;
            }
        }
        sink.on_state(id, next);
    }
}

fn blocked(report: &PreflightReport) -> ExecError {
    let detail = report
        .blocking()
        .map(|c| format!("{}: {}", c.name, c.detail))
        .collect::<Vec<_>>()
        .join("; ");
    let blocked_on = |kind: CheckKind| report.blocking().any(|c| c.kind == kind);
    if blocked_on(CheckKind::Privilege) {
        ExecError::Privilege { detail }
    } else if blocked_on(CheckKind::Interpreter) {
        ExecError::Interpreter { detail }
    } else {
        ExecError::Integrity { detail }
    }
}

fn param_env_name(key: &str) -> String {
    let suffix: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{PARAM_ENV_PREFIX}{suffix}")
}

/// Resolves once a stop has been requested; never if the sender is gone.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Waits for reader tasks to flush remaining output, aborting any that are
/// still attached to a pipe held open by a straggler after `limit`.
async fn drain(id: &str, readers: Vec<JoinHandle<u64>>, limit: Duration) {
    let deadline = tokio::time::Instant::now() + limit;
    for mut reader in readers {
        if tokio::time::timeout_at(deadline, &mut reader).await.is_err() {
            reader.abort();
            tracing::warn!(target: "adminkit.exec", correlation_id = id, "output drain timed out");
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}
