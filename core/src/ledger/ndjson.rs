use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::LedgerError;

use super::{ExecutionHistoryEntry, ExecutionLedger, HistoryFilter};

/// One JSON object per line, appended under a lock. Readers never take the
/// lock; a torn or foreign line is skipped rather than failing the query.
pub struct NdjsonLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl NdjsonLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ExecutionLedger for NdjsonLedger {
    async fn record(&self, entry: &ExecutionHistoryEntry) -> Result<(), LedgerError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| self.io_err(e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_err(e))?;
        // A write cut short by a crash leaves no newline; start on a fresh line
        // so only the torn fragment is lost.
        if !ends_with_newline(&mut file).await.map_err(|e| self.io_err(e))? {
            line.insert(0, '\n');
        }
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.io_err(e))?;
        file.flush().await.map_err(|e| self.io_err(e))?;

        tracing::debug!(
            target: "adminkit.ledger",
            correlation_id = %entry.correlation_id,
            tool = %entry.tool_id,
            outcome = entry.result.termination_reason.as_str(),
            "execution recorded"
        );
        Ok(())
    }

    async fn query(&self, filter: &HistoryFilter) -> Result<Vec<ExecutionHistoryEntry>, LedgerError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };

        let mut entries = Vec::new();
        for (n, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ExecutionHistoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::debug!(
                    target: "adminkit.ledger",
                    line = n + 1,
                    error = %e,
                    "skipping unreadable ledger line"
                ),
            }
        }
        Ok(filter.apply(entries))
    }
}

/// True for an empty file or one whose last byte is `\n`.
async fn ends_with_newline(file: &mut tokio::fs::File) -> std::io::Result<bool> {
    let len = file.metadata().await?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(std::io::SeekFrom::Start(len - 1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}
