//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `adminkit_core::api` instead of reaching into internal modules.

pub use crate::background::Background;
pub use crate::cache::{ArtifactCache, CacheEntry};
pub use crate::catalog::{Catalog, CatalogOrigin, CatalogResolver, ModuleRef, ToolDescriptor, UpdateNotice};
pub use crate::config::{
    AppConfig, CacheConfig, CatalogConfig, ControlConfig, InterpreterConfig, LoggingConfig, ParamStyle,
    PreflightConfig, ResolvedPaths,
};
pub use crate::error::{
    CacheError, CatalogError, CliError, ConfigError, ErrorKind, ExecError, FetchError, LedgerError, Remediation,
};
pub use crate::ledger::{ExecutionHistoryEntry, ExecutionLedger, HistoryFilter, HostIdentity, MemoryLedger, NdjsonLedger};
pub use crate::preflight::{
    CheckKind, CheckStatus, PreflightCheck, PreflightReport, PreflightValidator, PrivilegeProbe, ProcessPrivilege,
    ReachabilityProbe, StaticPrivilege,
};
pub use crate::runner::{
    ChannelSink, ExecState, ExecutionHandle, ExecutionHost, ExecutionRequest, ExecutionResult, NullSink, OutputEvent,
    OutputSink, OutputStream, ProgressUpdate, RunnerEvent, TerminationReason,
};
pub use crate::source::{MemorySource, RemoteSource};
