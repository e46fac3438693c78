//! Per-perspective summary packs and the final synthesis draft: building,
//! citation-pool validation, and gate E's persisted report.

pub mod gate_e_reports;
pub mod pack;
pub mod synthesis;

pub use pack::{build as build_pack, SummaryInput};
pub use synthesis::validate as validate_synthesis;
