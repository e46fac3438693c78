//! The shared cross-run ledger: `<workspace_root>/runs-ledger.jsonl`.
//!
//! One entry per run, appended at `init` and updated by appending a new
//! entry whenever status changes (the ledger is append-only like the audit
//! log; the latest entry per `run_id` wins on read).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::io::append_jsonl;
use crate::model::manifest::RunStatus;

const LEDGER_FILE: &str = "runs-ledger.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub ts: DateTime<Utc>,
    pub run_id: String,
    pub status: RunStatus,
    pub artifacts_root: String,
}

pub struct RunLedger {
    path: PathBuf,
}

impl RunLedger {
    pub fn new(workspace_root: &Path) -> Self {
        Self {
            path: workspace_root.join(LEDGER_FILE),
        }
    }

    pub fn record(&self, run_id: &str, status: RunStatus, artifacts_root: &str) -> CoreResult<()> {
        append_jsonl(
            &self.path,
            &LedgerEntry {
                ts: Utc::now(),
                run_id: run_id.to_string(),
                status,
                artifacts_root: artifacts_root.to_string(),
            },
        )
    }

    /// The most recent entry for every run_id seen, keyed by id.
    pub fn latest_by_run(&self) -> CoreResult<std::collections::HashMap<String, LedgerEntry>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Default::default()),
            Err(e) => return Err(e.into()),
        };
        let mut latest = std::collections::HashMap::new();
        for line in contents.lines() {
            if let Ok(entry) = serde_json::from_str::<LedgerEntry>(line) {
                latest.insert(entry.run_id.clone(), entry);
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn latest_entry_wins_per_run() {
        let dir = tempdir().unwrap();
        let ledger = RunLedger::new(dir.path());
        ledger.record("run-1", RunStatus::Created, "/a/run-1").unwrap();
        ledger.record("run-1", RunStatus::Running, "/a/run-1").unwrap();
        ledger.record("run-2", RunStatus::Created, "/a/run-2").unwrap();

        let latest = ledger.latest_by_run().unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest["run-1"].status, RunStatus::Running);
    }
}
