//! `citations/*` artifact schemas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{Validate, ValidationError};

pub const CITATIONS_SCHEMA_VERSION: &str = "citations.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStatus {
    Valid,
    Paywalled,
    Blocked,
    Mismatch,
    Invalid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundByEntry {
    pub url_original: String,
    pub wave: u32,
    pub perspective_id: String,
    pub source_line: String,
    pub ordinal: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationRecord {
    pub normalized_url: String,
    pub url_original: String,
    pub cid: String,
    pub status: CitationStatus,
    pub checked_at: DateTime<Utc>,
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub evidence_snippet: Option<String>,
    #[serde(default)]
    pub found_by: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl Validate for CitationRecord {
    fn validate(&self) -> Result<(), ValidationError> {
        let expected_cid = format!("cid_{}", crate::io::sha256_hex(self.normalized_url.as_bytes()));
        if self.cid != expected_cid {
            return Err(ValidationError::new(
                "/cid",
                format!("expected {expected_cid}, found {}", self.cid),
            ));
        }
        Ok(())
    }
}

/// `citations/citations.json` — every citation record produced by the
/// pipeline, valid or not (invalid/blocked entries stay for auditability;
/// gate C reasons about the mix, it does not filter anything out here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationsFile {
    pub schema_version: String,
    pub records: Vec<CitationRecord>,
}

impl Validate for CitationsFile {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != CITATIONS_SCHEMA_VERSION {
            return Err(ValidationError::new(
                "/schema_version",
                format!(
                    "expected {CITATIONS_SCHEMA_VERSION}, found {}",
                    self.schema_version
                ),
            ));
        }
        for (i, record) in self.records.iter().enumerate() {
            record
                .validate()
                .map_err(|e| ValidationError::new(format!("/records/{i}{}", e.path), e.message))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedUrlEntry {
    pub normalized_url: String,
    pub reason: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineFixturePointer {
    pub schema_version: String,
    pub fixture_path: String,
    pub captured_at: DateTime<Utc>,
}
