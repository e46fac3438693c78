//! The six quality gate evaluators.
//!
//! Each evaluator is a pure function over the artifacts a stage produced:
//! it never mutates the run store itself (the caller, typically an
//! orchestrator tick, takes the returned [`GateEvalResult`] and applies it
//! through [`crate::store::RunStore::write_gates_patch`]).

pub mod a_planning;
pub mod b_wave;
pub mod c_citations;
pub mod d_summary;
pub mod e_synthesis;
pub mod f_rollout;

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;

use crate::model::gates::GateStatus;

/// What an evaluator hands back; the caller turns this into a merge patch
/// against the gate's entry in `gates.json`.
#[derive(Debug, Clone)]
pub struct GateEvalResult {
    pub status: GateStatus,
    pub metrics: HashMap<String, Value>,
    pub artifacts: Vec<String>,
    pub warnings: Vec<String>,
    pub notes: String,
    pub inputs_digest: String,
}

impl GateEvalResult {
    pub fn to_patch(&self) -> Value {
        serde_json::json!({
            "status": self.status,
            "checked_at": Utc::now(),
            "metrics": self.metrics,
            "artifacts": self.artifacts,
            "warnings": self.warnings,
            "notes": self.notes,
            "inputs_digest": self.inputs_digest,
        })
    }
}
