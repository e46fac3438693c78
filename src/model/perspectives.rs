//! `perspectives.json` — the ordered set of wave-1 research perspectives.

use serde::{Deserialize, Serialize};

use super::common::{require_non_empty, Validate, ValidationError};

pub const PERSPECTIVES_SCHEMA_VERSION: &str = "perspectives.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Standard,
    Independent,
    Contrarian,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptContract {
    pub max_words: u32,
    pub max_sources: u32,
    pub tool_budget: u32,
    pub must_include_sections: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Perspective {
    pub id: String,
    pub title: String,
    pub track: Track,
    pub agent_type: String,
    pub prompt_contract: PromptContract,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerspectivesFile {
    pub schema_version: String,
    pub perspectives: Vec<Perspective>,
}

impl PerspectivesFile {
    /// Perspectives sorted by id — the order wave-1 plan entries must follow.
    pub fn sorted_by_id(&self) -> Vec<&Perspective> {
        let mut v: Vec<&Perspective> = self.perspectives.iter().collect();
        v.sort_by(|a, b| a.id.cmp(&b.id));
        v
    }
}

impl Validate for PerspectivesFile {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != PERSPECTIVES_SCHEMA_VERSION {
            return Err(ValidationError::new(
                "/schema_version",
                format!(
                    "expected {PERSPECTIVES_SCHEMA_VERSION}, found {}",
                    self.schema_version
                ),
            ));
        }
        if self.perspectives.is_empty() {
            return Err(ValidationError::new("/perspectives", "must not be empty"));
        }
        let mut seen = std::collections::HashSet::new();
        for (i, p) in self.perspectives.iter().enumerate() {
            let path = format!("/perspectives/{i}");
            require_non_empty(&format!("{path}/id"), &p.id)?;
            if !seen.insert(p.id.clone()) {
                return Err(ValidationError::new(&path, format!("duplicate perspective id {}", p.id)));
            }
            if p.prompt_contract.max_words == 0 {
                return Err(ValidationError::new(
                    format!("{path}/prompt_contract/max_words"),
                    "must be positive",
                ));
            }
            if p.prompt_contract.must_include_sections.is_empty() {
                return Err(ValidationError::new(
                    format!("{path}/prompt_contract/must_include_sections"),
                    "must name at least one required section",
                ));
            }
        }
        Ok(())
    }
}
