use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

/// Graceful stop first, forced stop once `grace` elapses. On unix the whole
/// process group is signalled so helpers started by the script go too.
pub(crate) async fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Err(e) = request_stop(child) {
        tracing::debug!(target: "adminkit.exec", error = %e, "graceful stop signal failed");
    }
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!(
                target: "adminkit.exec",
                grace_ms = grace.as_millis() as u64,
                "process ignored stop request, killing"
            );
            force_kill(child).await;
            child.wait().await
        }
    }
}

#[cfg(unix)]
fn request_stop(child: &mut Child) -> io::Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(());
    };
    killpg(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

#[cfg(unix)]
async fn force_kill(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
async fn force_kill(child: &mut Child) {
    let _ = child.start_kill();
}
