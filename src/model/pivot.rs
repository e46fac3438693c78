//! `pivot.json` — the post-wave-1 gap analysis and wave-2 decision.

use serde::{Deserialize, Serialize};

use super::common::{Validate, ValidationError};

pub const PIVOT_SCHEMA_VERSION: &str = "pivot.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapSource {
    Explicit,
    ParsedWave1,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gap {
    pub id: String,
    pub priority: Priority,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub source: GapSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleHit {
    Wave2RequiredP0,
    Wave2RequiredP1,
    Wave2RequiredVolume,
    Wave2SkipNoGaps,
}

impl RuleHit {
    pub fn requires_wave2(&self) -> bool {
        !matches!(self, RuleHit::Wave2SkipNoGaps)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pivot {
    pub schema_version: String,
    pub wave1_output_refs: Vec<String>,
    pub gaps: Vec<Gap>,
    pub rule_hit: RuleHit,
    pub wave2_required: bool,
    #[serde(default)]
    pub wave2_gap_ids: Vec<String>,
    pub inputs_digest: String,
}

impl Validate for Pivot {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != PIVOT_SCHEMA_VERSION {
            return Err(ValidationError::new(
                "/schema_version",
                format!("expected {PIVOT_SCHEMA_VERSION}, found {}", self.schema_version),
            ));
        }
        if self.wave2_required != self.rule_hit.requires_wave2() {
            return Err(ValidationError::new(
                "/wave2_required",
                "must match rule_hit.requires_wave2()",
            ));
        }
        if self.wave2_required && self.wave2_gap_ids.is_empty() {
            return Err(ValidationError::new(
                "/wave2_gap_ids",
                "wave2_required implies at least one gap id is selected",
            ));
        }
        Ok(())
    }
}
