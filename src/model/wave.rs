//! `wave-<n>/wave1-plan.json`, per-output `.meta.json` sidecars, and
//! `wave-review.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{Validate, ValidationError};

pub const WAVE_PLAN_SCHEMA_VERSION: &str = "wave-plan.v1";
pub const WAVE_OUTPUT_META_SCHEMA_VERSION: &str = "wave-output-meta.v1";
pub const WAVE_REVIEW_SCHEMA_VERSION: &str = "wave-review.v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WavePlanEntry {
    pub perspective_id: String,
    pub prompt_md: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WavePlan {
    pub schema_version: String,
    pub wave: u32,
    pub entries: Vec<WavePlanEntry>,
    pub inputs_digest: String,
}

impl Validate for WavePlan {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != WAVE_PLAN_SCHEMA_VERSION {
            return Err(ValidationError::new(
                "/schema_version",
                format!("expected {WAVE_PLAN_SCHEMA_VERSION}, found {}", self.schema_version),
            ));
        }
        for (i, e) in self.entries.iter().enumerate() {
            if !e.prompt_md.contains("## Scope Contract") {
                return Err(ValidationError::new(
                    format!("/entries/{i}/prompt_md"),
                    "must embed a `## Scope Contract` heading",
                ));
            }
        }
        Ok(())
    }
}

/// Sidecar written alongside `wave-<n>/<perspective_id>.md`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveOutputMeta {
    pub schema_version: String,
    pub perspective_id: String,
    pub prompt_digest: String,
    #[serde(default)]
    pub agent_run_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub model: Option<String>,
    pub ingested_at: DateTime<Utc>,
    pub source_input_path: String,
}

impl Validate for WaveOutputMeta {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != WAVE_OUTPUT_META_SCHEMA_VERSION {
            return Err(ValidationError::new(
                "/schema_version",
                format!(
                    "expected {WAVE_OUTPUT_META_SCHEMA_VERSION}, found {}",
                    self.schema_version
                ),
            ));
        }
        super::common::require_non_empty("/perspective_id", &self.perspective_id)?;
        super::common::require_non_empty("/prompt_digest", &self.prompt_digest)?;
        Ok(())
    }
}

/// Typed reasons a wave output can fail its contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveFailureCode {
    MissingRequiredSection,
    TooManyWords,
    MalformedSources,
    TooManySources,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryDirective {
    pub perspective_id: String,
    pub action: String, // always "retry"
    pub change_note: String,
    pub blocking_error_code: WaveFailureCode,
    #[serde(default)]
    pub consumed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerspectiveReview {
    pub perspective_id: String,
    pub passed: bool,
    #[serde(default)]
    pub failure_codes: Vec<WaveFailureCode>,
    pub words: usize,
    pub sources: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveReview {
    pub schema_version: String,
    pub wave: u32,
    pub reviews: Vec<PerspectiveReview>,
    #[serde(default)]
    pub retry_directives: Vec<RetryDirective>,
}

impl WaveReview {
    pub fn all_passed(&self) -> bool {
        self.reviews.iter().all(|r| r.passed)
    }
}

impl Validate for WaveReview {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != WAVE_REVIEW_SCHEMA_VERSION {
            return Err(ValidationError::new(
                "/schema_version",
                format!("expected {WAVE_REVIEW_SCHEMA_VERSION}, found {}", self.schema_version),
            ));
        }
        Ok(())
    }
}
