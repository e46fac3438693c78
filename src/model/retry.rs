//! `retry/retry-directives.json` — the persisted queue of pending wave
//! retries, consumed one-at-a-time by the next wave tick.
//!
//! The directive shape itself (`perspective_id`, `change_note`,
//! `blocking_error_code`, `consumed_at`) is [`super::wave::RetryDirective`];
//! this module only wraps it in the file-level envelope that gets written to
//! disk and re-read across ticks.

use serde::{Deserialize, Serialize};

use super::common::{Validate, ValidationError};
use super::wave::RetryDirective;

pub const RETRY_DIRECTIVES_SCHEMA_VERSION: &str = "retry-directives.v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryDirectivesFile {
    pub schema_version: String,
    pub wave: u32,
    pub directives: Vec<RetryDirective>,
}

impl RetryDirectivesFile {
    pub fn empty(wave: u32) -> Self {
        Self {
            schema_version: RETRY_DIRECTIVES_SCHEMA_VERSION.to_string(),
            wave,
            directives: Vec::new(),
        }
    }

    /// Directives not yet consumed by a wave tick.
    pub fn pending(&self) -> impl Iterator<Item = &RetryDirective> {
        self.directives.iter().filter(|d| d.consumed_at.is_none())
    }
}

impl Validate for RetryDirectivesFile {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != RETRY_DIRECTIVES_SCHEMA_VERSION {
            return Err(ValidationError::new(
                "/schema_version",
                format!(
                    "expected {RETRY_DIRECTIVES_SCHEMA_VERSION}, found {}",
                    self.schema_version
                ),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for (i, d) in self.directives.iter().enumerate() {
            if !seen.insert(d.perspective_id.clone()) {
                return Err(ValidationError::new(
                    format!("/directives/{i}"),
                    format!("duplicate retry directive for perspective {}", d.perspective_id),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::wave::WaveFailureCode;

    #[test]
    fn empty_file_validates() {
        RetryDirectivesFile::empty(1).validate().unwrap();
    }

    #[test]
    fn duplicate_perspective_directives_rejected() {
        let mut f = RetryDirectivesFile::empty(1);
        let d = RetryDirective {
            perspective_id: "p1".into(),
            action: "retry".into(),
            change_note: "shorten".into(),
            blocking_error_code: WaveFailureCode::TooManyWords,
            consumed_at: None,
        };
        f.directives.push(d.clone());
        f.directives.push(d);
        assert!(f.validate().is_err());
    }

    #[test]
    fn pending_excludes_consumed() {
        let mut f = RetryDirectivesFile::empty(1);
        f.directives.push(RetryDirective {
            perspective_id: "p1".into(),
            action: "retry".into(),
            change_note: "shorten".into(),
            blocking_error_code: WaveFailureCode::TooManyWords,
            consumed_at: Some(chrono::Utc::now()),
        });
        assert_eq!(f.pending().count(), 0);
    }
}
