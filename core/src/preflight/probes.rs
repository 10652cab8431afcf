use std::time::Duration;

use async_trait::async_trait;

/// Reports whether the current process runs with elevated privilege.
pub trait PrivilegeProbe: Send + Sync {
    fn is_elevated(&self) -> bool;
}

/// Inspects the running process: effective uid 0 on unix, an administrator
/// token on Windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessPrivilege;

impl PrivilegeProbe for ProcessPrivilege {
    #[cfg(unix)]
    fn is_elevated(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    #[cfg(windows)]
    fn is_elevated(&self) -> bool {
        // `net session` only succeeds from an elevated token.
        std::process::Command::new("net")
            .arg("session")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(not(any(unix, windows)))]
    fn is_elevated(&self) -> bool {
        false
    }
}

/// Fixed answer, for callers that already know (and for tests).
#[derive(Debug, Clone, Copy)]
pub struct StaticPrivilege(pub bool);

impl PrivilegeProbe for StaticPrivilege {
    fn is_elevated(&self) -> bool {
        self.0
    }
}

/// Bounded connectivity test against an external resource.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, target: &str, timeout: Duration) -> Result<(), String>;
}
