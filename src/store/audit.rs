//! The per-run audit log: `operator/audit.jsonl`, one entry per mutation.
//!
//! This is the durable record; `tracing` events alongside each mutation are
//! for operator visibility only and carry no guarantee of retention.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::io::append_jsonl;

const AUDIT_FILE: &str = "operator/audit.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub run_id: String,
    pub actor: String,
    pub action: String,
    #[serde(default)]
    pub detail: serde_json::Value,
}

pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(run_root: &Path) -> Self {
        Self {
            path: run_root.join(AUDIT_FILE),
        }
    }

    pub fn record(&self, run_id: &str, actor: &str, action: &str, detail: serde_json::Value) -> CoreResult<()> {
        let entry = AuditEntry {
            ts: Utc::now(),
            run_id: run_id.to_string(),
            actor: actor.to_string(),
            action: action.to_string(),
            detail,
        };
        tracing::debug!(run_id, actor, action, "audit entry");
        append_jsonl(&self.path, &entry)
    }

    /// Read all entries, skipping any line that fails to parse (a torn
    /// final line after a crash is tolerated, per the append-only contract).
    pub fn read_all(&self) -> CoreResult<Vec<AuditEntry>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}
