//! The manifest: the mutable control record for a run.
//!
//! Immutable fields (enforced by [`crate::store::run_store::ManifestWrite`],
//! not by this struct alone): `schema_version`, `run_id`, `created_at`,
//! `artifacts.*`. Everything else is mutable and gated by optimistic
//! revisioning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::common::{Validate, ValidationError};

pub const MANIFEST_SCHEMA_VERSION: &str = "manifest.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Wave1,
    Pivot,
    Wave2,
    Citations,
    Summaries,
    Synthesis,
    Review,
    Finalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Wave1 => "wave1",
            Stage::Pivot => "pivot",
            Stage::Wave2 => "wave2",
            Stage::Citations => "citations",
            Stage::Summaries => "summaries",
            Stage::Synthesis => "synthesis",
            Stage::Review => "review",
            Stage::Finalize => "finalize",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Finalize)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    Running,
    Paused,
    Failed,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Quick,
    Standard,
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Normal,
    Restricted,
    NoWeb,
}

/// One append-only stage transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageHistoryEntry {
    pub from: Stage,
    pub to: Stage,
    pub ts: DateTime<Utc>,
    pub reason: String,
    pub inputs_digest: String,
    pub gates_revision: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageInfo {
    pub current: Stage,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<StageHistoryEntry>,
    #[serde(default)]
    pub last_progress_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub max_wave1_agents: u32,
    pub max_review_iterations: u32,
    pub max_summary_kb: u64,
    pub max_total_summary_kb: u64,
    pub max_wave_failures: u32,
    pub lease_seconds: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_wave1_agents: 8,
            max_review_iterations: 3,
            max_summary_kb: 32,
            max_total_summary_kb: 256,
            max_wave_failures: 25,
            lease_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryHistoryEntry {
    pub gate_id: String,
    pub change_note: String,
    pub reason: String,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default)]
    pub retry_counts: HashMap<String, u32>,
    #[serde(default)]
    pub retry_history: Vec<RetryHistoryEntry>,
    #[serde(default)]
    pub review_iteration: u32,
    #[serde(default)]
    pub measurements: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: String,
    pub stage: Stage,
    pub message: String,
    pub retryable: bool,
    pub ts: DateTime<Utc>,
}

/// Immutable description of where this run's artifacts live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsRoot {
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryInfo {
    pub text: String,
    pub mode: Mode,
    pub sensitivity: Sensitivity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: String,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
    pub status: RunStatus,
    pub stage: StageInfo,
    pub query: QueryInfo,
    pub limits: Limits,
    #[serde(default)]
    pub metrics: Metrics,
    #[serde(default)]
    pub failures: Vec<FailureRecord>,
    pub artifacts: ArtifactsRoot,
}

impl Manifest {
    pub fn new(run_id: String, root: String, query: QueryInfo, limits: Limits) -> Self {
        let now = Utc::now();
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            run_id,
            created_at: now,
            updated_at: now,
            revision: 1,
            status: RunStatus::Created,
            stage: StageInfo {
                current: Stage::Init,
                started_at: now,
                history: Vec::new(),
                last_progress_at: None,
            },
            query,
            limits,
            metrics: Metrics::default(),
            failures: Vec::new(),
            artifacts: ArtifactsRoot { root },
        }
    }
}

/// JSON-pointer paths the merge-patch writer must reject.
pub const IMMUTABLE_MANIFEST_PATHS: &[&str] = &[
    "/schema_version",
    "/run_id",
    "/created_at",
    "/updated_at",
    "/revision",
    "/artifacts",
];

impl Validate for Manifest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != MANIFEST_SCHEMA_VERSION {
            return Err(ValidationError::new(
                "/schema_version",
                format!("expected {MANIFEST_SCHEMA_VERSION}, found {}", self.schema_version),
            ));
        }
        super::common::require_non_empty("/run_id", &self.run_id)?;
        if !self.artifacts.root.starts_with('/') {
            return Err(ValidationError::new(
                "/artifacts/root",
                "must be an absolute path",
            ));
        }
        if let Some(first) = self.stage.history.first() {
            let mut prev_to = first.to;
            for entry in self.stage.history.iter().skip(1) {
                if entry.from != prev_to {
                    return Err(ValidationError::new(
                        "/stage/history",
                        "history entries must chain: history[i].to == history[i+1].from",
                    ));
                }
                prev_to = entry.to;
            }
            if let Some(last) = self.stage.history.last() {
                if last.to != self.stage.current {
                    return Err(ValidationError::new(
                        "/stage/current",
                        "must equal the last history entry's `to`",
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        Manifest::new(
            "run-1".into(),
            "/tmp/run-1".into(),
            QueryInfo {
                text: "q".into(),
                mode: Mode::Standard,
                sensitivity: Sensitivity::Normal,
            },
            Limits::default(),
        )
    }

    #[test]
    fn fresh_manifest_validates() {
        sample().validate().unwrap();
    }

    #[test]
    fn relative_artifact_root_is_rejected() {
        let mut m = sample();
        m.artifacts.root = "relative/path".into();
        assert!(m.validate().is_err());
    }

    #[test]
    fn stage_history_must_chain() {
        let mut m = sample();
        let now = Utc::now();
        m.stage.history = vec![
            StageHistoryEntry {
                from: Stage::Init,
                to: Stage::Wave1,
                ts: now,
                reason: "r".into(),
                inputs_digest: "sha256:x".into(),
                gates_revision: 1,
            },
            StageHistoryEntry {
                from: Stage::Pivot, // should be Wave1
                to: Stage::Citations,
                ts: now,
                reason: "r".into(),
                inputs_digest: "sha256:x".into(),
                gates_revision: 1,
            },
        ];
        m.stage.current = Stage::Citations;
        assert!(m.validate().is_err());
    }
}
