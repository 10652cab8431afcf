//! Error families for every component, plus the shared taxonomy the shell uses
//! to pick operator-facing text.

mod cache_error;
mod catalog_error;
mod cli_error;
mod config_error;
mod exec_error;
mod fetch_error;
mod ledger_error;

pub use cache_error::CacheError;
pub use catalog_error::CatalogError;
pub use cli_error::CliError;
pub use config_error::ConfigError;
pub use exec_error::ExecError;
pub use fetch_error::FetchError;
pub use ledger_error::LedgerError;

use serde::Serialize;

/// Coarse classification of a failure, independent of which component raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Integrity,
    Privilege,
    AlreadyRunning,
    HostFailure,
    Io,
    Invalid,
}

/// Actionable next step attached to an error or a blocking pre-flight check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remediation {
    Redownload,
    RestartElevated,
    CheckConnectivity,
    WaitOrCancel,
    InstallInterpreter,
}

impl Remediation {
    pub fn hint(&self) -> &'static str {
        match self {
            Remediation::Redownload => "re-download dependency",
            Remediation::RestartElevated => "restart elevated",
            Remediation::CheckConnectivity => "check connectivity",
            Remediation::WaitOrCancel => "wait for the current run to finish or cancel it",
            Remediation::InstallInterpreter => "install interpreter",
        }
    }
}

impl std::fmt::Display for Remediation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.hint())
    }
}
