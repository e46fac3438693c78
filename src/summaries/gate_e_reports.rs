//! Persists gate E's evaluation as `synthesis/gate-e-report.json` — the
//! same metrics and status the gate itself produces, written once per
//! synthesis draft so an operator or the review stage can read the
//! numeric-claims/heading/citation-utilization breakdown without
//! re-running the gate evaluator by hand.

use serde::Serialize;
use std::collections::HashMap;

use crate::error::CoreResult;
use crate::gates::e_synthesis;
use crate::model::gates::GateStatus;
use crate::store::RunStore;

#[derive(Debug, Serialize)]
pub struct GateEReport {
    pub status: GateStatus,
    pub metrics: HashMap<String, serde_json::Value>,
    pub warnings: Vec<String>,
    pub inputs_digest: String,
}

pub fn write_report(store: &RunStore) -> CoreResult<GateEReport> {
    let result = e_synthesis::evaluate(store)?;
    let report = GateEReport {
        status: result.status,
        metrics: result.metrics,
        warnings: result.warnings,
        inputs_digest: result.inputs_digest,
    };
    store.write_json_once("synthesis/gate-e-report.json", &report)?;
    Ok(report)
}
