//! `run-config.json` — the effective configuration snapshot read once at
//! `init` and frozen into the manifest's `limits`. Nothing outside this file
//! (no environment variable) influences core behavior; see SPEC_FULL.md §2.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::common::{Validate, ValidationError};
use super::gates::GateId;
use super::manifest::Limits;

pub const RUN_CONFIG_SCHEMA_VERSION: &str = "run-config.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationValidationMode {
    /// Replay pre-recorded fixtures keyed by normalized URL; never touches
    /// the network.
    OfflineFixture,
    /// Walk the online ladder (HEAD, then ranged GET) and capture a fixture
    /// of what was observed for later offline replay.
    OnlineLadderCapture,
    /// Classify reachability/safety without content validation (SSRF-safe
    /// dry run); used when no fixture exists and online capture is refused.
    OnlineDryRun,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationConfig {
    pub mode: CitationValidationMode,
    #[serde(default)]
    pub fixtures_dir: Option<String>,
    pub max_found_by_per_url: u32,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            mode: CitationValidationMode::OfflineFixture,
            fixtures_dir: None,
            max_found_by_per_url: 20,
        }
    }
}

/// Per-stage watchdog timeout, keyed by `Stage::as_str()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    pub stage_timeouts_seconds: HashMap<String, u64>,
    pub heartbeat_seconds: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        let mut stage_timeouts_seconds = HashMap::new();
        stage_timeouts_seconds.insert("init".to_string(), 120);
        stage_timeouts_seconds.insert("wave1".to_string(), 600);
        stage_timeouts_seconds.insert("pivot".to_string(), 120);
        stage_timeouts_seconds.insert("wave2".to_string(), 600);
        stage_timeouts_seconds.insert("citations".to_string(), 600);
        stage_timeouts_seconds.insert("summaries".to_string(), 600);
        stage_timeouts_seconds.insert("synthesis".to_string(), 600);
        stage_timeouts_seconds.insert("review".to_string(), 300);
        stage_timeouts_seconds.insert("finalize".to_string(), 120);
        Self {
            stage_timeouts_seconds,
            heartbeat_seconds: 30,
        }
    }
}

/// Per-gate retry cap before a failure escalates to a halt. Asymmetric by
/// design: gate A and F never retry (planning failures and rollout
/// warnings aren't transient), gate E gets the most slack since it drives
/// the review loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries_per_gate: HashMap<GateId, u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let mut max_retries_per_gate = HashMap::new();
        max_retries_per_gate.insert(GateId::A, 0);
        max_retries_per_gate.insert(GateId::B, 2);
        max_retries_per_gate.insert(GateId::C, 1);
        max_retries_per_gate.insert(GateId::D, 1);
        max_retries_per_gate.insert(GateId::E, 3);
        max_retries_per_gate.insert(GateId::F, 0);
        Self { max_retries_per_gate }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub schema_version: String,
    pub limits: Limits,
    pub citations: CitationConfig,
    pub watchdog: WatchdogConfig,
    pub retry: RetryConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            schema_version: RUN_CONFIG_SCHEMA_VERSION.to_string(),
            limits: Limits::default(),
            citations: CitationConfig::default(),
            watchdog: WatchdogConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Validate for RunConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != RUN_CONFIG_SCHEMA_VERSION {
            return Err(ValidationError::new(
                "/schema_version",
                format!(
                    "expected {RUN_CONFIG_SCHEMA_VERSION}, found {}",
                    self.schema_version
                ),
            ));
        }
        if self.limits.lease_seconds == 0 {
            return Err(ValidationError::new("/limits/lease_seconds", "must be positive"));
        }
        if matches!(
            self.citations.mode,
            CitationValidationMode::OfflineFixture | CitationValidationMode::OnlineLadderCapture
        ) && self.citations.fixtures_dir.is_none()
        {
            return Err(ValidationError::new(
                "/citations/fixtures_dir",
                "required when mode replays or captures fixtures",
            ));
        }
        Ok(())
    }
}
