//! Gate F — rollout safety.
//!
//! A soft gate: it never blocks a stage transition (see
//! `stage::machine::allowed_next`, which never reads gate F). It exists so
//! an operator can see, in `gates.json`, whether a run's synthesis touched
//! any restricted-sensitivity content before the report is handed off.
//! There is no rollout surface wired up yet, so this always evaluates to
//! `warn` on a restricted/no-web query and `pass` otherwise.

use std::collections::HashMap;

use crate::error::CoreResult;
use crate::gates::GateEvalResult;
use crate::model::gates::GateStatus;
use crate::model::manifest::{Manifest, Sensitivity};

pub fn evaluate(manifest: &Manifest) -> CoreResult<GateEvalResult> {
    let mut metrics = HashMap::new();
    metrics.insert(
        "sensitivity".to_string(),
        serde_json::to_value(manifest.query.sensitivity)?,
    );

    let (status, warnings) = match manifest.query.sensitivity {
        Sensitivity::Normal => (GateStatus::Pass, vec![]),
        Sensitivity::Restricted | Sensitivity::NoWeb => (
            GateStatus::Warn,
            vec!["query flagged restricted/no-web sensitivity; rollout not evaluated".to_string()],
        ),
    };

    let inputs = serde_json::json!({"sensitivity": manifest.query.sensitivity});
    Ok(GateEvalResult {
        status,
        metrics,
        artifacts: vec![],
        warnings,
        notes: "rollout safety (placeholder)".into(),
        inputs_digest: crate::io::sha256_digest_json(&inputs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::manifest::{Mode, QueryInfo};

    fn manifest_with(sensitivity: Sensitivity) -> Manifest {
        Manifest::new(
            "run-1".into(),
            "/tmp/run-1".into(),
            QueryInfo {
                text: "q".into(),
                mode: Mode::Standard,
                sensitivity,
            },
            crate::model::manifest::Limits::default(),
        )
    }

    #[test]
    fn passes_for_normal_sensitivity() {
        let manifest = manifest_with(Sensitivity::Normal);
        let result = evaluate(&manifest).unwrap();
        assert_eq!(result.status, GateStatus::Pass);
    }

    #[test]
    fn warns_for_restricted_sensitivity() {
        let manifest = manifest_with(Sensitivity::Restricted);
        let result = evaluate(&manifest).unwrap();
        assert_eq!(result.status, GateStatus::Warn);
    }
}
