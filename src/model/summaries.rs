//! `summaries/summary-pack.json` and `synthesis/final-synthesis.md` metadata.

use serde::{Deserialize, Serialize};

use super::common::{Validate, ValidationError};

pub const SUMMARY_PACK_SCHEMA_VERSION: &str = "summary-pack.v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerspectiveSummaryEntry {
    pub perspective_id: String,
    pub path: String,
    pub size_kb: u64,
    #[serde(default)]
    pub cids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryPack {
    pub schema_version: String,
    pub summaries: Vec<PerspectiveSummaryEntry>,
    pub total_size_kb: u64,
}

impl Validate for SummaryPack {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SUMMARY_PACK_SCHEMA_VERSION {
            return Err(ValidationError::new(
                "/schema_version",
                format!(
                    "expected {SUMMARY_PACK_SCHEMA_VERSION}, found {}",
                    self.schema_version
                ),
            ));
        }
        let total: u64 = self.summaries.iter().map(|s| s.size_kb).sum();
        if total != self.total_size_kb {
            return Err(ValidationError::new(
                "/total_size_kb",
                format!("declared {} but summaries sum to {total}", self.total_size_kb),
            ));
        }
        Ok(())
    }
}

pub const SYNTHESIS_REQUIRED_HEADINGS: &[&str] =
    &["Summary", "Key Findings", "Evidence", "Caveats"];
