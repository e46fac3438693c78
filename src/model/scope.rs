//! `operator/scope.json` — immutable per-run research scope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{require_non_empty, Validate, ValidationError};

pub const SCOPE_SCHEMA_VERSION: &str = "scope.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
    Shallow,
    Standard,
    Exhaustive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationPosture {
    /// Every non-heading factual paragraph must carry a citation.
    Strict,
    /// Citations required only for numeric/quantitative claims.
    Standard,
    /// Citations encouraged but not gated.
    Relaxed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    pub schema_version: String,
    pub questions: Vec<String>,
    #[serde(default)]
    pub non_goals: Vec<String>,
    pub deliverable: String,
    pub depth: Depth,
    pub time_budget_minutes: u32,
    pub citation_posture: CitationPosture,
    /// Ambient: when this scope was generated (ambient-stack addition, see
    /// SPEC_FULL.md §3).
    #[serde(default = "Utc::now")]
    pub generated_at: DateTime<Utc>,
    /// Ambient: `"cli" | "api"` — defaults to `"cli"` for backward/forward
    /// compatibility, per SPEC_FULL.md §3.
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "cli".to_string()
}

impl Validate for Scope {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCOPE_SCHEMA_VERSION {
            return Err(ValidationError::new(
                "/schema_version",
                format!("expected {SCOPE_SCHEMA_VERSION}, found {}", self.schema_version),
            ));
        }
        if self.questions.is_empty() {
            return Err(ValidationError::new("/questions", "must have at least one question"));
        }
        require_non_empty("/deliverable", &self.deliverable)?;
        Ok(())
    }
}
