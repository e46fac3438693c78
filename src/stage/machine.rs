//! The stage machine: nine states, one forward graph, gate-gated edges.
//!
//! ```text
//! init -> wave1 -> pivot -+-> wave2 -> citations -> summaries -> synthesis -> review -+-> finalize
//!                         |                                           ^--------------+
//!                         +-------------------> citations (skip wave2)
//! ```
//!
//! Every edge in this graph is checked twice before it is taken: once
//! against the static adjacency table ([`allowed_next`]), once against the
//! gates and artifacts that edge specifically requires
//! ([`stage_preconditions`]). A transition that fails either check never
//! touches the manifest; the caller gets a typed [`CoreError`] it can turn
//! into a halt artifact.

use serde_json::json;

use crate::error::{CoreError, CoreResult};
use crate::model::gates::{GateId, GateStatus, GatesFile};
use crate::model::manifest::{Manifest, RunStatus, Stage, StageHistoryEntry};
use crate::model::pivot::Pivot;
use crate::model::Validate;
use crate::store::RunStore;

/// Stages reachable directly from `from`, in the order they'd be tried.
pub fn allowed_next(from: Stage) -> &'static [Stage] {
    match from {
        Stage::Init => &[Stage::Wave1],
        Stage::Wave1 => &[Stage::Pivot],
        Stage::Pivot => &[Stage::Wave2, Stage::Citations],
        Stage::Wave2 => &[Stage::Citations],
        Stage::Citations => &[Stage::Summaries],
        Stage::Summaries => &[Stage::Synthesis],
        Stage::Synthesis => &[Stage::Review],
        Stage::Review => &[Stage::Synthesis, Stage::Finalize],
        Stage::Finalize => &[],
    }
}

fn require_gate_pass(gates: &GatesFile, id: GateId) -> CoreResult<()> {
    let gate = gates
        .get(id)
        .ok_or_else(|| CoreError::NotFound(format!("gate {id}")))?;
    if gate.status != GateStatus::Pass {
        return Err(CoreError::GateBlocked {
            gate: id.to_string(),
            status: gate_status_label(gate.status).to_string(),
        });
    }
    Ok(())
}

fn gate_status_label(status: GateStatus) -> &'static str {
    match status {
        GateStatus::NotRun => "not_run",
        GateStatus::Pass => "pass",
        GateStatus::Fail => "fail",
        GateStatus::Warn => "warn",
    }
}

/// Stage-specific preconditions beyond the adjacency check. Each entry
/// documents, in the match arm, what it enforces and why.
fn check_preconditions(store: &RunStore, from: Stage, to: Stage, gates: &GatesFile) -> CoreResult<()> {
    match (from, to) {
        // Planning completeness: scope + perspectives must already validate,
        // enforced by gate A.
        (Stage::Init, Stage::Wave1) => require_gate_pass(gates, GateId::A),

        // Wave-1 outputs must all satisfy their prompt contract.
        (Stage::Wave1, Stage::Pivot) => require_gate_pass(gates, GateId::B),

        // Pivot decides its own successor; no additional gate beyond the
        // pivot.json artifact itself existing and being internally
        // consistent (checked by its own Validate impl at read time).
        (Stage::Pivot, Stage::Wave2) | (Stage::Pivot, Stage::Citations) => {
            let pivot: Pivot = store.read_json_at("pivot.json")?;
            pivot.validate()?;
            let wants_wave2 = pivot.wave2_required;
            if to == Stage::Wave2 && !wants_wave2 {
                return Err(CoreError::RequestedNextNotAllowed {
                    from: from.to_string(),
                    requested: to.to_string(),
                });
            }
            if to == Stage::Citations && wants_wave2 {
                return Err(CoreError::RequestedNextNotAllowed {
                    from: from.to_string(),
                    requested: to.to_string(),
                });
            }
            Ok(())
        }

        // Wave-2 gap-fill outputs must satisfy their contract too.
        (Stage::Wave2, Stage::Citations) => require_gate_pass(gates, GateId::B),

        (Stage::Citations, Stage::Summaries) => require_gate_pass(gates, GateId::C),
        (Stage::Summaries, Stage::Synthesis) => require_gate_pass(gates, GateId::D),

        // Entering review requires nothing beyond the draft existing; the
        // review stage is precisely where gate E gets evaluated.
        (Stage::Synthesis, Stage::Review) => Ok(()),

        // Looping back to revise never requires a passing gate E — that's
        // the point of the loop.
        (Stage::Review, Stage::Synthesis) => Ok(()),

        // Finalize requires the synthesis to have actually passed quality
        // review. Gate F (rollout safety) is soft and never blocks.
        (Stage::Review, Stage::Finalize) => require_gate_pass(gates, GateId::E),

        _ => Err(CoreError::RequestedNextNotAllowed {
            from: from.to_string(),
            requested: to.to_string(),
        }),
    }
}

/// Attempt to advance the run from its current stage to `requested`.
///
/// On success, appends a [`StageHistoryEntry`] and persists the new
/// `stage.current` (and `status`, once terminal) through
/// [`RunStore::write_manifest_patch`]. On failure, the manifest is
/// untouched.
pub fn advance(store: &RunStore, requested: Stage, reason: &str) -> CoreResult<Manifest> {
    let manifest = store.manifest()?;
    let from = manifest.stage.current;

    if from.is_terminal() {
        return Err(CoreError::InvalidState(format!(
            "run is already terminal at {from}"
        )));
    }
    if !allowed_next(from).contains(&requested) {
        return Err(CoreError::RequestedNextNotAllowed {
            from: from.to_string(),
            requested: requested.to_string(),
        });
    }

    let gates = store.gates()?;
    check_preconditions(store, from, requested, &gates)?;

    let inputs = json!({
        "manifest_revision": manifest.revision,
        "gates_revision": gates.revision,
        "from": from,
        "to": requested,
    });
    let inputs_digest = crate::io::sha256_digest_json(&inputs);

    let mut history = manifest.stage.history.clone();
    history.push(StageHistoryEntry {
        from,
        to: requested,
        ts: chrono::Utc::now(),
        reason: reason.to_string(),
        inputs_digest,
        gates_revision: gates.revision,
    });

    let status = if requested.is_terminal() {
        RunStatus::Completed
    } else {
        RunStatus::Running
    };

    let patch = json!({
        "status": status,
        "stage": {
            "current": requested,
            "history": history,
            "last_progress_at": chrono::Utc::now(),
        },
    });

    store.write_manifest_patch(manifest.revision, &patch, reason)
}
