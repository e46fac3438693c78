//! Gate A — planning completeness.
//!
//! Passes once `operator/scope.json` and `perspectives.json` both exist,
//! validate against their schemas, and the perspective count sits within
//! the run's `max_wave1_agents` limit.

use std::collections::HashMap;

use crate::error::CoreResult;
use crate::gates::GateEvalResult;
use crate::model::gates::GateStatus;
use crate::model::manifest::Manifest;
use crate::model::perspectives::PerspectivesFile;
use crate::model::scope::Scope;
use crate::model::Validate;
use crate::store::RunStore;

pub fn evaluate(store: &RunStore, manifest: &Manifest) -> CoreResult<GateEvalResult> {
    let mut warnings = Vec::new();
    let mut metrics = HashMap::new();

    let scope: Scope = store.read_json_at("operator/scope.json")?;
    scope.validate()?;

    let perspectives: PerspectivesFile = store.read_json_at("perspectives.json")?;
    perspectives.validate()?;

    let count = perspectives.perspectives.len() as u32;
    metrics.insert("perspective_count".to_string(), count.into());
    metrics.insert(
        "max_wave1_agents".to_string(),
        manifest.limits.max_wave1_agents.into(),
    );

    let status = if count > manifest.limits.max_wave1_agents {
        warnings.push(format!(
            "perspective count {count} exceeds max_wave1_agents {}",
            manifest.limits.max_wave1_agents
        ));
        GateStatus::Fail
    } else {
        GateStatus::Pass
    };

    let inputs = serde_json::json!({"scope": scope, "perspectives": perspectives});
    Ok(GateEvalResult {
        status,
        metrics,
        artifacts: vec!["operator/scope.json".into(), "perspectives.json".into()],
        warnings,
        notes: "planning completeness".into(),
        inputs_digest: crate::io::sha256_digest_json(&inputs),
    })
}
