//! Gate B — wave output contract compliance.
//!
//! Passes once every perspective in `wave-<n>/wave-review.json` reports
//! `passed: true`. A wave with outstanding retry directives fails; the
//! caller is expected to re-run the wave and re-evaluate.

use std::collections::HashMap;

use crate::error::CoreResult;
use crate::gates::GateEvalResult;
use crate::model::gates::GateStatus;
use crate::model::wave::WaveReview;
use crate::store::RunStore;

pub fn evaluate(store: &RunStore, wave: u32) -> CoreResult<GateEvalResult> {
    let rel = format!("wave-{wave}/wave-review.json");
    let review: WaveReview = store.read_json_at(&rel)?;

    let mut metrics = HashMap::new();
    let total = review.reviews.len();
    let failing: Vec<&str> = review
        .reviews
        .iter()
        .filter(|r| !r.passed)
        .map(|r| r.perspective_id.as_str())
        .collect();
    metrics.insert("total_perspectives".to_string(), total.into());
    metrics.insert("failing_count".to_string(), failing.len().into());

    let warnings = failing
        .iter()
        .map(|id| format!("perspective {id} did not pass its output contract"))
        .collect::<Vec<_>>();

    let status = if total > 0 && failing.is_empty() {
        GateStatus::Pass
    } else {
        GateStatus::Fail
    };

    let inputs = serde_json::to_value(&review)?;
    Ok(GateEvalResult {
        status,
        metrics,
        artifacts: vec![rel],
        warnings,
        notes: format!("wave {wave} output contract compliance"),
        inputs_digest: crate::io::sha256_digest_json(&inputs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::manifest::{Mode, QueryInfo, Sensitivity};
    use crate::model::run_config::{CitationValidationMode, RunConfig};
    use crate::model::scope::{CitationPosture, Depth, Scope, SCOPE_SCHEMA_VERSION};
    use crate::model::wave::{PerspectiveReview, WAVE_REVIEW_SCHEMA_VERSION};
    use tempfile::tempdir;

    fn init_store(workspace: &std::path::Path) -> RunStore {
        let mut config = RunConfig::default();
        config.citations.mode = CitationValidationMode::OfflineFixture;
        config.citations.fixtures_dir = Some(workspace.to_string_lossy().to_string());
        RunStore::init(
            workspace,
            "run-1",
            QueryInfo {
                text: "q".into(),
                mode: Mode::Standard,
                sensitivity: Sensitivity::Normal,
            },
            Scope {
                schema_version: SCOPE_SCHEMA_VERSION.into(),
                questions: vec!["q1".into()],
                non_goals: vec![],
                deliverable: "report".into(),
                depth: Depth::Standard,
                time_budget_minutes: 30,
                citation_posture: CitationPosture::Standard,
                generated_at: chrono::Utc::now(),
                source: "cli".into(),
            },
            config,
        )
        .unwrap()
    }

    #[test]
    fn passes_when_all_perspectives_pass() {
        let workspace = tempdir().unwrap();
        let store = init_store(workspace.path());
        let review = WaveReview {
            schema_version: WAVE_REVIEW_SCHEMA_VERSION.into(),
            wave: 1,
            reviews: vec![PerspectiveReview {
                perspective_id: "p0".into(),
                passed: true,
                failure_codes: vec![],
                words: 400,
                sources: 5,
            }],
            retry_directives: vec![],
        };
        store.write_json_once("wave-1/wave-review.json", &review).unwrap();
        let result = evaluate(&store, 1).unwrap();
        assert_eq!(result.status, GateStatus::Pass);
    }

    #[test]
    fn fails_when_any_perspective_fails() {
        let workspace = tempdir().unwrap();
        let store = init_store(workspace.path());
        let review = WaveReview {
            schema_version: WAVE_REVIEW_SCHEMA_VERSION.into(),
            wave: 1,
            reviews: vec![PerspectiveReview {
                perspective_id: "p0".into(),
                passed: false,
                failure_codes: vec![],
                words: 4000,
                sources: 0,
            }],
            retry_directives: vec![],
        };
        store.write_json_once("wave-1/wave-review.json", &review).unwrap();
        let result = evaluate(&store, 1).unwrap();
        assert_eq!(result.status, GateStatus::Fail);
    }
}
