//! The review-loop policy: advance to finalize, send another revision
//! back to synthesis, or escalate to the operator when the iteration
//! budget is exhausted.

use serde::Serialize;

use crate::model::gates::GateStatus;
use crate::model::manifest::Manifest;
use crate::model::review::ReviewDecision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Advance,
    Revise,
    Escalate,
}

/// `advance` when the reviewer passed and gate E passed; `escalate` once
/// `manifest.metrics.review_iteration` has reached `max_review_iterations`
/// without a pass; otherwise `revise` and send another draft back through
/// synthesis.
pub fn decide(manifest: &Manifest, decision: ReviewDecision, gate_e_status: GateStatus) -> ReviewAction {
    if decision == ReviewDecision::Pass && gate_e_status.is_passing() {
        return ReviewAction::Advance;
    }
    if manifest.metrics.review_iteration >= manifest.limits.max_review_iterations {
        return ReviewAction::Escalate;
    }
    ReviewAction::Revise
}
