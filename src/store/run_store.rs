//! The run store: the single place every other module goes through to
//! read or mutate a run's on-disk state.
//!
//! Writers funnel through three primitives:
//!
//! 1. **Merge-patch mutation** ([`RunStore::write_manifest_patch`],
//!    [`RunStore::write_gates_patch`]) — RFC 7396 JSON Merge Patch via the
//!    `json-patch` crate, with an immutable-field blocklist and optimistic
//!    `revision` concurrency control.
//! 2. **Write-once artifacts** ([`RunStore::write_json_once`],
//!    [`RunStore::write_text_once`]) — idempotent: writing the same content
//!    twice is a no-op (the common case when a tick is re-run after a
//!    crash), writing different content over an existing artifact is a
//!    lifecycle error.
//! 3. **Contained paths** ([`RunStore::resolve`]) for artifacts whose
//!    relative path is caller-supplied (wave outputs, citation fixtures).

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::io::{atomic_write_json, atomic_write_text, ensure_dir, resolve_contained, sha256_digest_json};
use crate::model::gates::{GateId, GatesFile};
use crate::model::manifest::{Manifest, QueryInfo, IMMUTABLE_MANIFEST_PATHS};
use crate::model::perspectives::PerspectivesFile;
use crate::model::run_config::RunConfig;
use crate::model::scope::Scope;
use crate::model::Validate;

use super::audit::AuditLog;

const MANIFEST_FILE: &str = "manifest.json";
const GATES_FILE: &str = "gates.json";
const RUN_CONFIG_FILE: &str = "run-config.json";
const SCOPE_FILE: &str = "operator/scope.json";

pub struct RunStore {
    root: PathBuf,
    run_id: String,
    audit: AuditLog,
}

impl RunStore {
    /// Open a store over an already-initialized run root (does not itself
    /// create anything; use [`RunStore::init`] for that).
    pub fn open(root: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        let root = root.into();
        let audit = AuditLog::new(&root);
        Self {
            root,
            run_id: run_id.into(),
            audit,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Create a brand-new run: the directory tree, the frozen
    /// `run-config.json` snapshot, `operator/scope.json`, and the initial
    /// `manifest.json`/`gates.json`. Fails with
    /// [`CoreError::AlreadyExistsConflict`] if `manifest.json` already
    /// exists (re-running `init` against a live run is not allowed; the
    /// caller should pick a new `run_id`).
    pub fn init(
        workspace_root: &Path,
        run_id: &str,
        query: QueryInfo,
        scope: Scope,
        config: RunConfig,
    ) -> CoreResult<Self> {
        let root = workspace_root.join(run_id);
        let manifest_path = root.join(MANIFEST_FILE);
        if manifest_path.exists() {
            return Err(CoreError::AlreadyExistsConflict {
                run_id: run_id.to_string(),
            });
        }

        ensure_dir(&root)?;
        ensure_dir(&root.join("operator"))?;

        config.validate()?;
        atomic_write_json(&root.join(RUN_CONFIG_FILE), &config)?;

        scope.validate()?;
        atomic_write_json(&root.join(SCOPE_FILE), &scope)?;

        let root_str = root
            .canonicalize()
            .unwrap_or_else(|_| root.clone())
            .to_string_lossy()
            .to_string();
        let manifest = Manifest::new(run_id.to_string(), root_str, query, config.limits.clone());
        manifest.validate()?;
        atomic_write_json(&manifest_path, &manifest)?;

        let gates = GatesFile::fresh();
        gates.validate()?;
        atomic_write_json(&root.join(GATES_FILE), &gates)?;

        let store = Self::open(root, run_id);
        store.audit.record(
            run_id,
            "orchestrator",
            "run_initialized",
            serde_json::json!({}),
        )?;
        tracing::info!(run_id, "run initialized");
        Ok(store)
    }

    pub fn manifest(&self) -> CoreResult<Manifest> {
        self.read_json(&self.root.join(MANIFEST_FILE))
    }

    pub fn gates(&self) -> CoreResult<GatesFile> {
        self.read_json(&self.root.join(GATES_FILE))
    }

    pub fn run_config(&self) -> CoreResult<RunConfig> {
        self.read_json(&self.root.join(RUN_CONFIG_FILE))
    }

    pub fn perspectives(&self) -> CoreResult<PerspectivesFile> {
        self.read_json(&self.root.join("perspectives.json"))
    }

    /// Apply an RFC 7396 merge patch to the manifest under optimistic
    /// concurrency control: `expected_revision` must match the manifest's
    /// current `revision`, and the patch must not touch any path in
    /// [`IMMUTABLE_MANIFEST_PATHS`].
    pub fn write_manifest_patch(
        &self,
        expected_revision: u64,
        patch: &Value,
        reason: &str,
    ) -> CoreResult<Manifest> {
        reject_immutable_paths(patch, IMMUTABLE_MANIFEST_PATHS)?;

        let current = self.manifest()?;
        if current.revision != expected_revision {
            return Err(CoreError::RevisionMismatch {
                expected: expected_revision,
                found: current.revision,
            });
        }

        let mut doc = serde_json::to_value(&current)?;
        json_patch::merge(&mut doc, patch);
        let mut updated: Manifest = serde_json::from_value(doc)?;
        updated.revision = current.revision + 1;
        updated.updated_at = chrono::Utc::now();
        updated.validate()?;

        atomic_write_json(&self.root.join(MANIFEST_FILE), &updated)?;
        self.audit.record(
            &self.run_id,
            "orchestrator",
            "manifest_patch",
            serde_json::json!({"reason": reason, "revision": updated.revision}),
        )?;
        tracing::debug!(run_id = %self.run_id, revision = updated.revision, reason, "manifest patched");
        Ok(updated)
    }

    /// Apply an RFC 7396 merge patch scoped to a single gate entry.
    /// `patch` is the merge patch for that gate's object (not the whole
    /// `GatesFile`); this keeps gate writers from accidentally touching a
    /// sibling gate.
    pub fn write_gates_patch(
        &self,
        expected_revision: u64,
        gate_id: GateId,
        patch: &Value,
    ) -> CoreResult<GatesFile> {
        let mut current = self.gates()?;
        if current.revision != expected_revision {
            return Err(CoreError::RevisionMismatch {
                expected: expected_revision,
                found: current.revision,
            });
        }

        let idx = current
            .gates
            .iter()
            .position(|g| g.id == gate_id)
            .ok_or_else(|| CoreError::NotFound(format!("gate {gate_id}")))?;

        let mut gate_doc = serde_json::to_value(&current.gates[idx])?;
        json_patch::merge(&mut gate_doc, patch);
        current.gates[idx] = serde_json::from_value(gate_doc)?;
        current.revision += 1;
        current.validate()?;

        atomic_write_json(&self.root.join(GATES_FILE), &current)?;
        self.audit.record(
            &self.run_id,
            "orchestrator",
            "gate_patch",
            serde_json::json!({"gate": gate_id.to_string(), "revision": current.revision}),
        )?;
        tracing::debug!(run_id = %self.run_id, gate = %gate_id, revision = current.revision, "gate patched");
        Ok(current)
    }

    /// Write `perspectives.json` exactly once. A second call with identical
    /// content is a no-op; a second call with different content is a
    /// lifecycle error (perspectives are frozen at planning time).
    pub fn write_perspectives(&self, perspectives: &PerspectivesFile) -> CoreResult<()> {
        perspectives.validate()?;
        self.write_json_once("perspectives.json", perspectives)
    }

    /// Resolve a run-root-relative path, rejecting any escape.
    pub fn resolve(&self, rel: &str) -> CoreResult<PathBuf> {
        resolve_contained(&self.root, rel)
    }

    /// Write a JSON artifact at `rel` exactly once (by canonical-JSON
    /// content digest). Used for every artifact in the pipeline that is
    /// produced once per wave/stage and never patched afterward: wave
    /// plans, pivot decisions, summary packs, review bundles.
    pub fn write_json_once<T: Serialize + DeserializeOwned>(&self, rel: &str, value: &T) -> CoreResult<()> {
        let path = self.resolve(rel)?;
        let new_value = serde_json::to_value(value)?;
        if path.exists() {
            let existing: Value = self.read_json(&path)?;
            if sha256_digest_json(&existing) == sha256_digest_json(&new_value) {
                return Ok(());
            }
            return Err(CoreError::LifecycleRuleViolation(format!(
                "{rel} already exists with different content"
            )));
        }
        atomic_write_json(&path, &new_value)
    }

    /// Write a text artifact at `rel` exactly once (byte-identical check).
    pub fn write_text_once(&self, rel: &str, text: &str) -> CoreResult<()> {
        let path = self.resolve(rel)?;
        if path.exists() {
            let existing = std::fs::read_to_string(&path)?;
            if existing == text {
                return Ok(());
            }
            return Err(CoreError::LifecycleRuleViolation(format!(
                "{rel} already exists with different content"
            )));
        }
        atomic_write_text(&path, text)
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> CoreResult<T> {
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::MissingArtifact(path.to_string_lossy().to_string())
            } else {
                CoreError::Io(e)
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|e| CoreError::InvalidJson {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn read_json_at<T: DeserializeOwned>(&self, rel: &str) -> CoreResult<T> {
        let path = self.resolve(rel)?;
        self.read_json(&path)
    }
}

fn reject_immutable_paths(patch: &Value, immutable: &[&str]) -> CoreResult<()> {
    let Value::Object(map) = patch else {
        return Ok(());
    };
    for key in map.keys() {
        let pointer = format!("/{key}");
        if immutable.contains(&pointer.as_str()) {
            return Err(CoreError::ImmutableField { path: pointer });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::manifest::{Mode, Sensitivity};
    use crate::model::run_config::CitationValidationMode;
    use crate::model::scope::{CitationPosture, Depth};
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_query() -> QueryInfo {
        QueryInfo {
            text: "what changed".into(),
            mode: Mode::Standard,
            sensitivity: Sensitivity::Normal,
        }
    }

    fn sample_scope() -> Scope {
        Scope {
            schema_version: crate::model::scope::SCOPE_SCHEMA_VERSION.into(),
            questions: vec!["q1".into()],
            non_goals: vec![],
            deliverable: "report".into(),
            depth: Depth::Standard,
            time_budget_minutes: 30,
            citation_posture: CitationPosture::Standard,
            generated_at: chrono::Utc::now(),
            source: "cli".into(),
        }
    }

    fn sample_config(fixtures_dir: &Path) -> RunConfig {
        let mut cfg = RunConfig::default();
        cfg.citations.mode = CitationValidationMode::OfflineFixture;
        cfg.citations.fixtures_dir = Some(fixtures_dir.to_string_lossy().to_string());
        cfg
    }

    #[test]
    fn init_creates_manifest_and_gates() {
        let workspace = tempdir().unwrap();
        let store = RunStore::init(
            workspace.path(),
            "run-1",
            sample_query(),
            sample_scope(),
            sample_config(workspace.path()),
        )
        .unwrap();
        let manifest = store.manifest().unwrap();
        assert_eq!(manifest.revision, 1);
        let gates = store.gates().unwrap();
        assert_eq!(gates.gates.len(), 6);
    }

    #[test]
    fn init_twice_conflicts() {
        let workspace = tempdir().unwrap();
        RunStore::init(
            workspace.path(),
            "run-1",
            sample_query(),
            sample_scope(),
            sample_config(workspace.path()),
        )
        .unwrap();
        let err = RunStore::init(
            workspace.path(),
            "run-1",
            sample_query(),
            sample_scope(),
            sample_config(workspace.path()),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExistsConflict { .. }));
    }

    #[test]
    fn manifest_patch_bumps_revision_and_rejects_stale_cas() {
        let workspace = tempdir().unwrap();
        let store = RunStore::init(
            workspace.path(),
            "run-1",
            sample_query(),
            sample_scope(),
            sample_config(workspace.path()),
        )
        .unwrap();

        let updated = store
            .write_manifest_patch(1, &json!({"status": "running"}), "start")
            .unwrap();
        assert_eq!(updated.revision, 2);

        let err = store
            .write_manifest_patch(1, &json!({"status": "paused"}), "stale")
            .unwrap_err();
        assert!(matches!(err, CoreError::RevisionMismatch { .. }));
    }

    #[test]
    fn manifest_patch_rejects_immutable_field() {
        let workspace = tempdir().unwrap();
        let store = RunStore::init(
            workspace.path(),
            "run-1",
            sample_query(),
            sample_scope(),
            sample_config(workspace.path()),
        )
        .unwrap();
        let err = store
            .write_manifest_patch(1, &json!({"run_id": "other"}), "tamper")
            .unwrap_err();
        assert!(matches!(err, CoreError::ImmutableField { .. }));
    }

    #[test]
    fn gate_patch_cannot_make_hard_gate_warn() {
        let workspace = tempdir().unwrap();
        let store = RunStore::init(
            workspace.path(),
            "run-1",
            sample_query(),
            sample_scope(),
            sample_config(workspace.path()),
        )
        .unwrap();
        let err = store
            .write_gates_patch(
                1,
                GateId::A,
                &json!({"status": "warn", "checked_at": chrono::Utc::now()}),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::SchemaValidationFailed { .. }));
    }

    #[test]
    fn write_json_once_is_idempotent_and_rejects_divergence() {
        let workspace = tempdir().unwrap();
        let store = RunStore::init(
            workspace.path(),
            "run-1",
            sample_query(),
            sample_scope(),
            sample_config(workspace.path()),
        )
        .unwrap();
        store.write_json_once("pivot.json", &json!({"a": 1})).unwrap();
        store.write_json_once("pivot.json", &json!({"a": 1})).unwrap();
        let err = store.write_json_once("pivot.json", &json!({"a": 2})).unwrap_err();
        assert!(matches!(err, CoreError::LifecycleRuleViolation(_)));
    }
}
