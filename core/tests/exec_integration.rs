//! End-to-end runs of shell scripts through the execution host.
#![cfg(unix)]
mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use adminkit_core::api::{
    ArtifactCache, ChannelSink, CheckKind, ControlConfig, ExecError, ExecState, ExecutionHost, ExecutionLedger,
    ExecutionRequest, HistoryFilter, HostIdentity, InterpreterConfig, MemoryLedger, MemorySource, NullSink,
    OutputStream, ParamStyle, PreflightCheck, PreflightReport, Remediation, RunnerEvent, TerminationReason, ToolDescriptor,
};
use tokio::sync::mpsc::UnboundedReceiver;

use common::{module, open_cache, publish, tool, HOUR};

struct Harness {
    _dir: tempfile::TempDir,
    source: Arc<MemorySource>,
    cache: ArtifactCache,
    ledger: Arc<MemoryLedger>,
    host: ExecutionHost,
}

fn interpreter(program: &str, style: ParamStyle) -> InterpreterConfig {
    InterpreterConfig {
        program: program.to_string(),
        args: Vec::new(),
        param_style: style,
        output_encoding: "utf-8".to_string(),
    }
}

fn control(grace_ms: u64) -> ControlConfig {
    ControlConfig {
        abort_grace_ms: grace_ms,
        max_duration_ms: None,
        drain_timeout_ms: 1_000,
    }
}

async fn harness_with(interp: InterpreterConfig, control: ControlConfig) -> Harness {
    harness_from(Arc::new(MemorySource::new()), interp, control).await
}

async fn harness_from(source: Arc<MemorySource>, interp: InterpreterConfig, control: ControlConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(dir.path(), HOUR, &source).await;
    let ledger = Arc::new(MemoryLedger::new());
    let host = ExecutionHost::new(
        cache.clone(),
        ledger.clone(),
        interp,
        control,
        HostIdentity {
            machine: "test-host".into(),
            user: "operator".into(),
        },
    );
    Harness {
        _dir: dir,
        source,
        cache,
        ledger,
        host,
    }
}

async fn harness() -> Harness {
    harness_with(interpreter("sh", ParamStyle::Env), control(5_000)).await
}

impl Harness {
    fn install(&self, id: &str, script: &str) -> ToolDescriptor {
        let path = format!("tools/{id}/run.sh");
        let sum = publish(&self.source, &path, script);
        tool(id, &path, &sum)
    }
}

fn clean_report(tool: &ToolDescriptor) -> PreflightReport {
    PreflightReport {
        tool_id: tool.id.clone(),
        checks: vec![PreflightCheck::pass(CheckKind::Artifact, "artifact", "verified")],
    }
}

fn drain(rx: &mut UnboundedReceiver<RunnerEvent>) -> Vec<RunnerEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn lines(events: &[RunnerEvent], stream: OutputStream) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            RunnerEvent::Output(o) if o.stream == stream => Some(o.line.clone()),
            _ => None,
        })
        .collect()
}

async fn wait_for_line(rx: &mut UnboundedReceiver<RunnerEvent>, needle: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(ev) = rx.recv().await {
            if let RunnerEvent::Output(o) = ev {
                if o.line == needle {
                    return;
                }
            }
        }
    })
    .await
    .expect("script reported readiness");
}

#[tokio::test]
async fn completed_run_streams_output_and_is_recorded_once() {
    let h = harness().await;
    let t = h.install("report", "echo hello\necho oops >&2\nexit 3\n");
    let (sink, mut rx) = ChannelSink::new();

    let request = ExecutionRequest::new("report");
    let id = request.correlation_id.clone();
    let handle = h.host.start(request, &t, &clean_report(&t), Arc::new(sink)).unwrap();
    assert_eq!(handle.correlation_id(), id);
    let result = handle.wait().await;

    assert_eq!(result.termination_reason, TerminationReason::Completed);
    assert_eq!(result.exit_code, 3);
    assert!(!result.success);
    assert!(result.end_time >= result.start_time);

    let events = drain(&mut rx);
    assert_eq!(lines(&events, OutputStream::Stdout), vec!["hello"]);
    assert_eq!(lines(&events, OutputStream::Stderr), vec!["oops"]);
    let states: Vec<ExecState> = events
        .iter()
        .filter_map(|e| match e {
            RunnerEvent::State(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![ExecState::Starting, ExecState::Running, ExecState::Completed]);
    assert!(matches!(events.last(), Some(RunnerEvent::Finished(_))));

    let history = h.ledger.snapshot();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].correlation_id, id);
    assert_eq!(history[0].tool_id, "report");
    assert_eq!(history[0].machine, "test-host");
    assert_eq!(history[0].result, result);
    assert!(!h.host.is_busy());
}

#[tokio::test]
async fn parameters_modules_and_working_directory_reach_the_script() {
    let h = harness().await;
    let base = publish(&h.source, "modules/base.sh", "greet() { echo \"hi $1\"; }\n");
    let mut t = h.install(
        "greet",
        ". \"$ADMINKIT_MODULE_PATH/base.sh\"\ngreet \"$ADMINKIT_PARAM_TARGET_HOST\"\ntest -f ./run.sh && echo in-place\n",
    );
    t.dependencies = vec![module("base", "modules/base.sh", &base)];
    let (sink, mut rx) = ChannelSink::new();

    let request = ExecutionRequest::new("greet").with_param("target-host", "db01");
    let result = h
        .host
        .start(request, &t, &clean_report(&t), Arc::new(sink))
        .unwrap()
        .wait()
        .await;

    assert!(result.success, "{result:?}");
    let events = drain(&mut rx);
    assert_eq!(lines(&events, OutputStream::Stdout), vec!["hi db01", "in-place"]);
}

#[tokio::test]
async fn named_parameters_follow_the_artifact_path() {
    let h = harness_with(interpreter("sh", ParamStyle::Named), control(5_000)).await;
    let t = h.install("args", "echo \"$1=$2\"\n");
    let (sink, mut rx) = ChannelSink::new();

    let request = ExecutionRequest::new("args").with_param("drive", "C:");
    h.host
        .start(request, &t, &clean_report(&t), Arc::new(sink))
        .unwrap()
        .wait()
        .await;
    assert_eq!(lines(&drain(&mut rx), OutputStream::Stdout), vec!["-drive=C:"]);
}

#[tokio::test]
async fn progress_markers_become_progress_events() {
    let h = harness().await;
    let t = h.install(
        "scan",
        "echo '##progress 40 Scanning'\necho '@@PROGRESS@@ {\"percent\": 90, \"activity\": \"Finishing\"}'\necho done\n",
    );
    let (sink, mut rx) = ChannelSink::new();
    h.host
        .start(ExecutionRequest::new("scan"), &t, &clean_report(&t), Arc::new(sink))
        .unwrap()
        .wait()
        .await;

    let events = drain(&mut rx);
    let progress: Vec<(Option<u8>, Option<String>)> = events
        .iter()
        .filter_map(|e| match e {
            RunnerEvent::Output(o) if o.stream == OutputStream::Progress => {
                o.progress.as_ref().map(|p| (p.percent, p.activity.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        progress,
        vec![
            (Some(40), Some("Scanning".to_string())),
            (Some(90), Some("Finishing".to_string())),
        ]
    );
    assert_eq!(lines(&events, OutputStream::Stdout), vec!["done"]);
}

#[tokio::test]
async fn blocked_report_is_refused_and_not_recorded() {
    let h = harness().await;
    let t = h.install("admin", "echo never\n");
    let (sink, _rx) = ChannelSink::new();
    let sink = Arc::new(sink);

    let privilege = PreflightReport {
        tool_id: t.id.clone(),
        checks: vec![PreflightCheck::block(
            CheckKind::Privilege,
            "privilege",
            Remediation::RestartElevated,
            "tool requires elevated privilege",
        )],
    };
    let err = h
        .host
        .start(ExecutionRequest::new("admin"), &t, &privilege, sink.clone())
        .err()
        .unwrap();
    assert!(matches!(err, ExecError::Privilege { .. }));
    assert_eq!(err.remediation(), Some(Remediation::RestartElevated));

    let integrity = PreflightReport {
        tool_id: t.id.clone(),
        checks: vec![PreflightCheck::block(
            CheckKind::Dependency,
            "module base",
            Remediation::Redownload,
            "checksum mismatch",
        )],
    };
    let err = h
        .host
        .start(ExecutionRequest::new("admin"), &t, &integrity, sink)
        .err()
        .unwrap();
    assert!(matches!(err, ExecError::Integrity { .. }));
    assert_eq!(err.remediation(), Some(Remediation::Redownload));

    let interpreter = PreflightReport {
        tool_id: t.id.clone(),
        checks: vec![PreflightCheck::block(
            CheckKind::Interpreter,
            "interpreter",
            Remediation::InstallInterpreter,
            "pwsh not found on PATH",
        )],
    };
    let err = h
        .host
        .start(ExecutionRequest::new("admin"), &t, &interpreter, Arc::new(NullSink))
        .err()
        .unwrap();
    assert!(matches!(err, ExecError::Interpreter { .. }));
    assert_eq!(err.remediation(), Some(Remediation::InstallInterpreter));

    assert!(h.ledger.is_empty());
    assert!(!h.host.is_busy());
    assert_eq!(h.source.total_fetches(), 0);
}

#[tokio::test]
async fn second_start_is_rejected_while_one_runs() {
    let h = harness().await;
    let slow = h.install("slow", "sleep 5\n");
    let quick = h.install("quick", "echo quick\n");
    let (sink, _rx) = ChannelSink::new();
    let sink = Arc::new(sink);

    let first = h
        .host
        .start(ExecutionRequest::new("slow"), &slow, &clean_report(&slow), sink.clone())
        .unwrap();
    let err = h
        .host
        .start(ExecutionRequest::new("quick"), &quick, &clean_report(&quick), sink.clone())
        .err()
        .unwrap();
    match err {
        ExecError::AlreadyRunning { active } => assert_eq!(active, first.correlation_id()),
        other => panic!("unexpected {other:?}"),
    }

    h.host.cancel(first.correlation_id()).unwrap();
    first.wait().await;

    let second = h
        .host
        .start(ExecutionRequest::new("quick"), &quick, &clean_report(&quick), sink)
        .unwrap();
    assert!(second.wait().await.success);
    assert_eq!(h.ledger.len(), 2);
}

#[tokio::test]
async fn cancel_stops_run_within_grace() {
    let h = harness().await;
    let t = h.install("sleepy", "echo ready\nsleep 30\n");
    let (sink, mut rx) = ChannelSink::new();

    let handle = h
        .host
        .start(ExecutionRequest::new("sleepy"), &t, &clean_report(&t), Arc::new(sink))
        .unwrap();
    wait_for_line(&mut rx, "ready").await;

    let asked = Instant::now();
    h.host.cancel(handle.correlation_id()).unwrap();
    let result = handle.wait().await;

    assert!(asked.elapsed() < Duration::from_secs(5));
    assert_eq!(result.termination_reason, TerminationReason::Cancelled);
    assert!(!result.success);

    let recorded = h
        .ledger
        .query(&HistoryFilter {
            outcome: Some(TerminationReason::Cancelled),
            ..HistoryFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(recorded.len(), 1);
}

#[tokio::test]
async fn script_ignoring_stop_request_is_killed() {
    let h = harness_with(interpreter("sh", ParamStyle::Env), control(300)).await;
    let t = h.install(
        "stubborn",
        "trap '' TERM\necho ready\nwhile true; do sleep 1; done\n",
    );
    let (sink, mut rx) = ChannelSink::new();

    let handle = h
        .host
        .start(ExecutionRequest::new("stubborn"), &t, &clean_report(&t), Arc::new(sink))
        .unwrap();
    wait_for_line(&mut rx, "ready").await;

    let asked = Instant::now();
    h.host.cancel(handle.correlation_id()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("forced termination after grace");

    assert!(asked.elapsed() >= Duration::from_millis(300));
    assert_eq!(result.termination_reason, TerminationReason::Cancelled);
    assert_eq!(result.exit_code, 128 + 9);
    assert_eq!(h.ledger.len(), 1);
}

#[tokio::test]
async fn deadline_times_the_run_out() {
    let h = harness().await;
    let t = h.install("forever", "sleep 30\n");

    let request = ExecutionRequest::new("forever").with_max_duration(Duration::from_millis(300));
    let result = tokio::time::timeout(
        Duration::from_secs(10),
        h.host
            .start(request, &t, &clean_report(&t), Arc::new(NullSink))
            .unwrap()
            .wait(),
    )
    .await
    .unwrap();

    assert_eq!(result.termination_reason, TerminationReason::TimedOut);
    assert!(!result.success);
    assert!(result.duration_ms >= 300);
    assert_eq!(
        h.ledger.snapshot()[0].result.termination_reason,
        TerminationReason::TimedOut
    );
}

#[tokio::test]
async fn missing_interpreter_is_host_failure() {
    let h = harness_with(
        interpreter("/nonexistent/adminkit-interpreter", ParamStyle::Env),
        control(5_000),
    )
    .await;
    let t = h.install("any", "echo any\n");
    let (sink, mut rx) = ChannelSink::new();

    let result = h
        .host
        .start(ExecutionRequest::new("any"), &t, &clean_report(&t), Arc::new(sink))
        .unwrap()
        .wait()
        .await;

    assert_eq!(result.termination_reason, TerminationReason::HostFailure);
    assert_eq!(result.exit_code, -1);
    assert!(result.message.is_some());
    assert_eq!(h.ledger.len(), 1);

    let states: Vec<ExecState> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            RunnerEvent::State(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![ExecState::Starting, ExecState::HostFailure]);
}

#[tokio::test]
async fn script_killed_by_foreign_signal_is_recorded_as_host_failure() {
    let h = harness().await;
    let t = h.install("crash", "echo going down\nkill -9 $$\necho unreachable\n");
    let (sink, mut rx) = ChannelSink::new();

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        h.host
            .start(ExecutionRequest::new("crash"), &t, &clean_report(&t), Arc::new(sink))
            .unwrap()
            .wait(),
    )
    .await
    .unwrap();

    assert_eq!(result.termination_reason, TerminationReason::HostFailure);
    assert_eq!(result.exit_code, 137);
    assert!(!result.success);
    assert!(result.message.is_some());

    let history = h.ledger.snapshot();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].tool_id, "crash");
    assert_eq!(history[0].result, result);

    let events = drain(&mut rx);
    assert_eq!(lines(&events, OutputStream::Stdout), vec!["going down"]);
    assert!(!h.host.is_busy());
}

#[tokio::test]
async fn cancel_while_starting_never_spawns() {
    let source = Arc::new(MemorySource::with_latency(Duration::from_secs(2)));
    let h = harness_from(source, interpreter("sh", ParamStyle::Env), control(5_000)).await;
    let t = h.install("slowfetch", "echo should not run\n");
    let (sink, mut rx) = ChannelSink::new();

    let handle = h
        .host
        .start(ExecutionRequest::new("slowfetch"), &t, &clean_report(&t), Arc::new(sink))
        .unwrap();
    let id = handle.correlation_id().to_string();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.host.active().map(|(_, s)| s), Some(ExecState::Starting));
    h.host.cancel(&id).unwrap();

    let started = Instant::now();
    let result = handle.wait().await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(result.termination_reason, TerminationReason::Cancelled);
    assert_eq!(result.exit_code, -1);
    assert_eq!(h.ledger.len(), 1);

    let events = drain(&mut rx);
    assert!(lines(&events, OutputStream::Stdout).is_empty());
    let states: Vec<ExecState> = events
        .into_iter()
        .filter_map(|e| match e {
            RunnerEvent::State(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![ExecState::Starting, ExecState::Cancelled]);
}

#[tokio::test]
async fn unresolvable_artifact_is_host_failure() {
    let h = harness().await;
    let t = tool("ghost", "tools/ghost/run.sh", "00");

    let result = h
        .host
        .start(ExecutionRequest::new("ghost"), &t, &clean_report(&t), Arc::new(NullSink))
        .unwrap()
        .wait()
        .await;
    assert_eq!(result.termination_reason, TerminationReason::HostFailure);
    assert!(h.cache.entries().is_empty());
}

#[tokio::test]
async fn mismatched_and_unknown_requests_are_rejected() {
    let h = harness().await;
    let t = h.install("a", "echo a\n");
    let (sink, _rx) = ChannelSink::new();

    let err = h
        .host
        .start(ExecutionRequest::new("b"), &t, &clean_report(&t), Arc::new(sink))
        .err()
        .unwrap();
    assert!(matches!(err, ExecError::DescriptorMismatch { .. }));
    assert!(matches!(h.host.cancel("nope"), Err(ExecError::NotRunning(_))));
}
