//! Crate-wide error taxonomy.
//!
//! One variant per error code in the specification's error taxonomy. Every
//! variant carries enough structured context to build a halt artifact's
//! `next_commands[]` without re-deriving it at the call site — the pattern
//! is the teacher's `StructuredError` ("errors should tell the agent what to
//! do"), collapsed into a single `thiserror` enum instead of a side-channel
//! struct so `?` keeps working end to end.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Anything an operator or the next tick can act on: a machine-readable
/// code, a human message, and a recovery hint.
pub trait Recoverable {
    fn code(&self) -> &'static str;
    fn message(&self) -> String;
    /// A short, actionable instruction — becomes a `next_commands[]` entry
    /// on the halt artifact.
    fn recovery_hint(&self) -> String;
    fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    // ---- usage ----
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("feature disabled: {0}")]
    Disabled(String),
    #[error("run already exists and is not complete: {run_id}")]
    AlreadyExistsConflict { run_id: String },

    // ---- state/integrity ----
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("revision mismatch: expected {expected}, found {found}")]
    RevisionMismatch { expected: u64, found: u64 },
    #[error("immutable field written: {path}")]
    ImmutableField { path: String },
    #[error("lifecycle rule violation: {0}")]
    LifecycleRuleViolation(String),

    // ---- schema ----
    #[error("schema validation failed at {path}: {reason}")]
    SchemaValidationFailed { path: String, reason: String },
    #[error("invalid JSON in {path}: {reason}")]
    InvalidJson { path: PathBuf, reason: String },
    #[error("invalid JSONL in {path} at line {line}: {reason}")]
    InvalidJsonl {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    // ---- artifact ----
    #[error("not found: {0}")]
    NotFound(String),
    #[error("missing artifact: {0}")]
    MissingArtifact(String),
    #[error("missing required section {heading:?} in {path}")]
    MissingRequiredSection { path: String, heading: String },
    #[error("malformed sources line in {path}: {line:?}")]
    MalformedSources { path: String, line: String },
    #[error("too many words in {path}: {words} > {max}")]
    TooManyWords {
        path: String,
        words: usize,
        max: usize,
    },
    #[error("too many sources in {path}: {sources} > {max}")]
    TooManySources {
        path: String,
        sources: usize,
        max: usize,
    },
    #[error("raw URL not allowed in {path}")]
    RawUrlNotAllowed { path: String },
    #[error("unknown citation id: {cid}")]
    UnknownCid { cid: String },

    // ---- gating ----
    #[error("gate blocked: {gate} is {status}")]
    GateBlocked { gate: String, status: String },
    #[error("requested next stage {requested} is not allowed from {from}")]
    RequestedNextNotAllowed { from: String, requested: String },
    #[error("retry exhausted for {gate_id}: {count}/{cap}")]
    RetryExhausted {
        gate_id: String,
        count: u32,
        cap: u32,
    },
    #[error("size cap exceeded for {what}: {size_kb}KB > {cap_kb}KB")]
    SizeCapExceeded {
        what: String,
        size_kb: u64,
        cap_kb: u64,
    },

    // ---- agent seam ----
    #[error("agent run required for stage {stage}")]
    RunAgentRequired { stage: String },
    #[error("wave1 output not validated for {perspective_id}")]
    Wave1NotValidated { perspective_id: String },
    #[error("wave1 contract not met for {perspective_id}: {reason}")]
    Wave1ContractNotMet {
        perspective_id: String,
        reason: String,
    },
    #[error("mismatched perspective id: expected {expected}, got {found}")]
    MismatchedPerspectiveId { expected: String, found: String },

    // ---- citations ----
    #[error("citation bundle invalid: {0}")]
    BundleInvalid(String),
    #[error("no valid citation bundles available")]
    NoValidBundles,

    // ---- io/lock ----
    #[error("write failed at {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },
    #[error("path not writable: {0}")]
    PathNotWritable(PathBuf),
    #[error("stage mismatch: manifest is at {actual}, caller asserted {expected}")]
    StageMismatch { expected: String, actual: String },
    #[error("path escapes run root: {0}")]
    PathEscapesRunRoot(PathBuf),
    #[error("run lock unavailable: {0}")]
    LockUnavailable(String),
    #[error("run lock lost: {0}")]
    LockLost(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Recoverable for CoreError {
    fn code(&self) -> &'static str {
        use CoreError::*;
        match self {
            InvalidArgs(_) => "INVALID_ARGS",
            Disabled(_) => "DISABLED",
            AlreadyExistsConflict { .. } => "ALREADY_EXISTS_CONFLICT",
            InvalidState(_) => "INVALID_STATE",
            RevisionMismatch { .. } => "REVISION_MISMATCH",
            ImmutableField { .. } => "IMMUTABLE_FIELD",
            LifecycleRuleViolation(_) => "LIFECYCLE_RULE_VIOLATION",
            SchemaValidationFailed { .. } => "SCHEMA_VALIDATION_FAILED",
            InvalidJson { .. } => "INVALID_JSON",
            InvalidJsonl { .. } => "INVALID_JSONL",
            NotFound(_) => "NOT_FOUND",
            MissingArtifact(_) => "MISSING_ARTIFACT",
            MissingRequiredSection { .. } => "MISSING_REQUIRED_SECTION",
            MalformedSources { .. } => "MALFORMED_SOURCES",
            TooManyWords { .. } => "TOO_MANY_WORDS",
            TooManySources { .. } => "TOO_MANY_SOURCES",
            RawUrlNotAllowed { .. } => "RAW_URL_NOT_ALLOWED",
            UnknownCid { .. } => "UNKNOWN_CID",
            GateBlocked { .. } => "GATE_BLOCKED",
            RequestedNextNotAllowed { .. } => "REQUESTED_NEXT_NOT_ALLOWED",
            RetryExhausted { .. } => "RETRY_EXHAUSTED",
            SizeCapExceeded { .. } => "SIZE_CAP_EXCEEDED",
            RunAgentRequired { .. } => "RUN_AGENT_REQUIRED",
            Wave1NotValidated { .. } => "WAVE1_NOT_VALIDATED",
            Wave1ContractNotMet { .. } => "WAVE1_CONTRACT_NOT_MET",
            MismatchedPerspectiveId { .. } => "MISMATCHED_PERSPECTIVE_ID",
            BundleInvalid(_) => "BUNDLE_INVALID",
            NoValidBundles => "NO_VALID_BUNDLES",
            WriteFailed { .. } => "WRITE_FAILED",
            PathNotWritable(_) => "PATH_NOT_WRITABLE",
            StageMismatch { .. } => "STAGE_MISMATCH",
            PathEscapesRunRoot(_) => "PATH_ESCAPES_RUN_ROOT",
            LockUnavailable(_) => "LOCK_UNAVAILABLE",
            LockLost(_) => "LOCK_LOST",
            Io(_) => "IO_ERROR",
            Json(_) => "INVALID_JSON",
        }
    }

    fn message(&self) -> String {
        self.to_string()
    }

    fn recovery_hint(&self) -> String {
        use CoreError::*;
        match self {
            RevisionMismatch { .. } => {
                "re-read the artifact to get the current revision, then retry the write".into()
            }
            GateBlocked { gate, .. } => {
                format!("inspect gates.json for gate {gate} and resolve the reported failures")
            }
            RunAgentRequired { stage } => format!(
                "run the agent against operator/prompts/{stage}/*.md and call agent-result"
            ),
            MissingArtifact(what) => format!("produce {what} before advancing the stage"),
            RetryExhausted { gate_id, .. } => format!(
                "gate {gate_id} has exhausted its retry cap; escalate or revise scope"
            ),
            LockLost(_) => "re-acquire the run lock and re-issue the tick".into(),
            _ => "see message for details".into(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(
            self,
            CoreError::LockUnavailable(_) | CoreError::RevisionMismatch { .. }
        )
    }
}
