use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub interpreter: InterpreterConfig,

    #[serde(default)]
    pub preflight: PreflightConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_url")]
    pub base_url: String,

    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_catalog_url() -> String {
    "https://adminkit.internal/catalog/".to_string()
}

fn default_manifest_path() -> String {
    "catalog.json".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_refresh_interval_secs() -> u64 {
    900
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            manifest_path: default_manifest_path(),
            timeout_ms: default_timeout_ms(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Empty means the platform cache directory.
    #[serde(default)]
    pub dir: String,

    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,

    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

fn default_ttl_minutes() -> u64 {
    60
}

fn default_prune_interval_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: String::new(),
            ttl_minutes: default_ttl_minutes(),
            prune_interval_secs: default_prune_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_abort_grace_ms")]
    pub abort_grace_ms: u64,

    #[serde(default)]
    pub max_duration_ms: Option<u64>,

    /// How long to keep reading output after a forced stop before giving up on
    /// pipes still held open by stray descendants.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

fn default_abort_grace_ms() -> u64 {
    5_000
}

fn default_drain_timeout_ms() -> u64 {
    2_000
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            abort_grace_ms: default_abort_grace_ms(),
            max_duration_ms: None,
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParamStyle {
    /// `-key value` pairs appended after the artifact path.
    #[default]
    Named,
    /// `ADMINKIT_PARAM_<KEY>` environment variables.
    Env,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterConfig {
    #[serde(default = "default_interpreter_program")]
    pub program: String,

    #[serde(default = "default_interpreter_args")]
    pub args: Vec<String>,

    #[serde(default)]
    pub param_style: ParamStyle,

    #[serde(default = "default_output_encoding")]
    pub output_encoding: String,
}

#[cfg(windows)]
fn default_interpreter_program() -> String {
    "powershell.exe".to_string()
}

#[cfg(not(windows))]
fn default_interpreter_program() -> String {
    "sh".to_string()
}

#[cfg(windows)]
fn default_interpreter_args() -> Vec<String> {
    ["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass", "-File"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(not(windows))]
fn default_interpreter_args() -> Vec<String> {
    Vec::new()
}

fn default_output_encoding() -> String {
    "utf-8".to_string()
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            program: default_interpreter_program(),
            args: default_interpreter_args(),
            param_style: ParamStyle::default(),
            output_encoding: default_output_encoding(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default)]
    pub default_probe_target: Option<String>,
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            default_probe_target: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LedgerConfig {
    /// Empty means `<data dir>/adminkit/history.ndjson`.
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,

    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_file_prefix() -> String {
    "adminkit.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            file_prefix: default_log_file_prefix(),
        }
    }
}

/// Filesystem locations after `~`/`$VAR` expansion and platform defaults.
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub cache_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub log_dir: Option<PathBuf>,
}
