//! The six quality gates (A–F): evaluator output plus lifecycle rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::common::{Validate, ValidationError};

pub const GATES_SCHEMA_VERSION: &str = "gates.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateId {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl GateId {
    pub const ALL: [GateId; 6] = [
        GateId::A,
        GateId::B,
        GateId::C,
        GateId::D,
        GateId::E,
        GateId::F,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GateId::A => "planning_completeness",
            GateId::B => "wave_output_contract_compliance",
            GateId::C => "citation_validation_integrity",
            GateId::D => "summary_pack_boundedness",
            GateId::E => "synthesis_quality",
            GateId::F => "rollout_safety",
        }
    }

    pub fn class(&self) -> GateClass {
        match self {
            GateId::F => GateClass::Soft,
            _ => GateClass::Hard,
        }
    }
}

impl std::fmt::Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateClass {
    Hard,
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    NotRun,
    Pass,
    Fail,
    Warn,
}

impl GateStatus {
    pub fn is_passing(&self) -> bool {
        matches!(self, GateStatus::Pass | GateStatus::Warn)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    pub id: GateId,
    pub name: String,
    pub class: GateClass,
    pub status: GateStatus,
    #[serde(default)]
    pub checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub inputs_digest: Option<String>,
}

impl Gate {
    pub fn not_run(id: GateId) -> Self {
        Self {
            id,
            name: id.name().to_string(),
            class: id.class(),
            status: GateStatus::NotRun,
            checked_at: None,
            metrics: HashMap::new(),
            artifacts: Vec::new(),
            warnings: Vec::new(),
            notes: String::new(),
            inputs_digest: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatesFile {
    pub schema_version: String,
    pub revision: u64,
    pub gates: Vec<Gate>,
}

impl GatesFile {
    pub fn fresh() -> Self {
        Self {
            schema_version: GATES_SCHEMA_VERSION.to_string(),
            revision: 1,
            gates: GateId::ALL.iter().map(|id| Gate::not_run(*id)).collect(),
        }
    }

    pub fn get(&self, id: GateId) -> Option<&Gate> {
        self.gates.iter().find(|g| g.id == id)
    }

    pub fn get_mut(&mut self, id: GateId) -> Option<&mut Gate> {
        self.gates.iter_mut().find(|g| g.id == id)
    }
}

impl Validate for GatesFile {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != GATES_SCHEMA_VERSION {
            return Err(ValidationError::new(
                "/schema_version",
                format!("expected {GATES_SCHEMA_VERSION}, found {}", self.schema_version),
            ));
        }
        for gate in &self.gates {
            let path = format!("/gates/{}", gate.id);
            if gate.class == GateClass::Hard && gate.status == GateStatus::Warn {
                return Err(ValidationError::new(
                    &path,
                    "hard gate must never be in status `warn`",
                ));
            }
            if gate.status != GateStatus::NotRun && gate.checked_at.is_none() {
                return Err(ValidationError::new(
                    format!("{path}/checked_at"),
                    "checked_at is required whenever status != not_run",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_gates_all_not_run_and_valid() {
        let gf = GatesFile::fresh();
        assert_eq!(gf.gates.len(), 6);
        gf.validate().unwrap();
    }

    #[test]
    fn hard_gate_cannot_warn() {
        let mut gf = GatesFile::fresh();
        let gate = gf.get_mut(GateId::A).unwrap();
        gate.status = GateStatus::Warn;
        gate.checked_at = Some(Utc::now());
        assert!(gf.validate().is_err());
    }

    #[test]
    fn soft_gate_can_warn() {
        let mut gf = GatesFile::fresh();
        let gate = gf.get_mut(GateId::F).unwrap();
        gate.status = GateStatus::Warn;
        gate.checked_at = Some(Utc::now());
        gf.validate().unwrap();
    }

    #[test]
    fn checked_at_required_once_status_changes() {
        let mut gf = GatesFile::fresh();
        let gate = gf.get_mut(GateId::B).unwrap();
        gate.status = GateStatus::Pass;
        assert!(gf.validate().is_err());
    }
}
