//! Per-stage timeout enforcement: a stage that has been `current` for
//! longer than its configured timeout without a halted/waiting checkpoint
//! fails the run outright.

use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::model::manifest::{FailureRecord, Manifest, RunStatus};
use crate::model::run_config::WatchdogConfig;
use crate::store::RunStore;

/// Whether the manifest's most recent halt (if any) is still current —
/// i.e. was written after the stage started. A current halt means the
/// stage is legitimately waiting on an external actor, not stuck.
fn has_current_halt(store: &RunStore, manifest: &Manifest) -> bool {
    let Ok(path) = store.resolve("operator/halt/latest.json") else {
        return false;
    };
    let Ok(text) = std::fs::read_to_string(path) else {
        return false;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
        return false;
    };
    let Some(created_at) = value.get("created_at").and_then(|v| v.as_str()) else {
        return false;
    };
    let Ok(created_at) = DateTime::parse_from_rfc3339(created_at) else {
        return false;
    };
    created_at.with_timezone(&Utc) >= manifest.stage.started_at
}

/// Runs the timeout check for `manifest`'s current stage at `now`. On
/// timeout, patches `status=failed`, appends a failure record, and writes
/// `logs/timeout-checkpoint.md`; returns whether the run timed out.
pub fn check(store: &RunStore, config: &WatchdogConfig, now: DateTime<Utc>) -> CoreResult<bool> {
    let manifest = store.manifest()?;
    if manifest.status == RunStatus::Paused || manifest.status == RunStatus::Cancelled {
        return Ok(false);
    }

    let stage = manifest.stage.current;
    let Some(&timeout_seconds) = config.stage_timeouts_seconds.get(stage.as_str()) else {
        return Ok(false);
    };
    let elapsed = (now - manifest.stage.started_at).num_seconds().max(0) as u64;
    if elapsed <= timeout_seconds || has_current_halt(store, &manifest) {
        return Ok(false);
    }

    let message = format!("stage {stage} exceeded timeout of {timeout_seconds}s (elapsed {elapsed}s)");
    let checkpoint = format!(
        "# Timeout checkpoint\n\nstage: {stage}\nelapsed_seconds: {elapsed}\ntimeout_seconds: {timeout_seconds}\nat: {now}\n"
    );
    store.write_text_once("logs/timeout-checkpoint.md", &checkpoint)?;

    let mut failures = manifest.failures.clone();
    failures.push(FailureRecord {
        kind: "timeout".to_string(),
        stage,
        message: message.clone(),
        retryable: false,
        ts: now,
    });

    store.write_manifest_patch(
        manifest.revision,
        &serde_json::json!({"status": "failed", "failures": failures}),
        "watchdog timeout",
    )?;
    tracing::warn!(run_id = store.run_id(), %stage, elapsed, timeout_seconds, "watchdog timed out stage");
    Ok(true)
}
