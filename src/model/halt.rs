//! `operator/halt/tick-####.json` and `latest.json` — the `halt.v1` artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const HALT_SCHEMA_VERSION: &str = "halt.v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedTransition {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaltError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Blockers {
    #[serde(default)]
    pub missing_artifacts: Vec<String>,
    #[serde(default)]
    pub blocked_gates: Vec<String>,
    #[serde(default)]
    pub failed_checks: Vec<String>,
}

impl Blockers {
    pub fn is_empty(&self) -> bool {
        self.missing_artifacts.is_empty() && self.blocked_gates.is_empty() && self.failed_checks.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelatedPaths {
    #[serde(flatten)]
    pub paths: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaltArtifact {
    pub schema_version: String,
    pub created_at: DateTime<Utc>,
    pub run_id: String,
    pub tick_index: u64,
    pub stage_current: String,
    #[serde(default)]
    pub blocked_transition: Option<BlockedTransition>,
    pub error: HaltError,
    #[serde(default)]
    pub blockers: Blockers,
    #[serde(default)]
    pub related_paths: RelatedPaths,
    #[serde(default)]
    pub next_commands: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl HaltArtifact {
    pub fn waiting(run_id: &str, tick_index: u64, stage_current: &str) -> Self {
        Self {
            schema_version: HALT_SCHEMA_VERSION.to_string(),
            created_at: Utc::now(),
            run_id: run_id.to_string(),
            tick_index,
            stage_current: stage_current.to_string(),
            blocked_transition: None,
            error: HaltError {
                code: "WAITING".to_string(),
                message: "tick made no progress this invocation".to_string(),
            },
            blockers: Blockers::default(),
            related_paths: RelatedPaths::default(),
            next_commands: Vec::new(),
            notes: "waiting".to_string(),
        }
    }
}
