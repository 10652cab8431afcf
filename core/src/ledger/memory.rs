use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::LedgerError;

use super::{ExecutionHistoryEntry, ExecutionLedger, HistoryFilter};

/// In-process ledger for tests and embedders that persist elsewhere.
#[derive(Default)]
pub struct MemoryLedger {
    entries: RwLock<Vec<ExecutionHistoryEntry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in append order.
    pub fn snapshot(&self) -> Vec<ExecutionHistoryEntry> {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl ExecutionLedger for MemoryLedger {
    async fn record(&self, entry: &ExecutionHistoryEntry) -> Result<(), LedgerError> {
        self.entries
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(entry.clone());
        Ok(())
    }

    async fn query(&self, filter: &HistoryFilter) -> Result<Vec<ExecutionHistoryEntry>, LedgerError> {
        Ok(filter.apply(self.snapshot()))
    }
}
