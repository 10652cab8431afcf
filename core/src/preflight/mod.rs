//! Pre-flight checklist evaluated before a tool may start.
mod probes;
mod report;
mod validator;

pub use probes::{PrivilegeProbe, ProcessPrivilege, ReachabilityProbe, StaticPrivilege};
pub use report::{CheckKind, CheckStatus, PreflightCheck, PreflightReport};
pub use validator::PreflightValidator;
