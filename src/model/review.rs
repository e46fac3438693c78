//! `review/review-bundle.json` — the reviewer-bundle ingest schema.

use serde::{Deserialize, Serialize};

use super::common::{Validate, ValidationError};

pub const REVIEW_BUNDLE_SCHEMA_VERSION: &str = "review-bundle.v1";
pub const MAX_FINDINGS: usize = 100;
pub const MAX_DIRECTIVES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Pass,
    ChangesRequired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub id: String,
    pub severity: String,
    pub section: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionDirective {
    pub id: String,
    pub section: String,
    pub instruction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewBundle {
    pub schema_version: String,
    pub decision: ReviewDecision,
    pub findings: Vec<ReviewFinding>,
    pub directives: Vec<RevisionDirective>,
}

impl Validate for ReviewBundle {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != REVIEW_BUNDLE_SCHEMA_VERSION {
            return Err(ValidationError::new(
                "/schema_version",
                format!(
                    "expected {REVIEW_BUNDLE_SCHEMA_VERSION}, found {}",
                    self.schema_version
                ),
            ));
        }
        if self.findings.len() > MAX_FINDINGS {
            return Err(ValidationError::new(
                "/findings",
                format!("{} findings exceeds cap of {MAX_FINDINGS}", self.findings.len()),
            ));
        }
        if self.directives.len() > MAX_DIRECTIVES {
            return Err(ValidationError::new(
                "/directives",
                format!(
                    "{} directives exceeds cap of {MAX_DIRECTIVES}",
                    self.directives.len()
                ),
            ));
        }
        Ok(())
    }
}
