//! Gate C — citation validation integrity.
//!
//! `validated_url_rate = valid / extracted` must be `>= 0.9`,
//! `invalid_url_rate = invalid / extracted` must be `<= 0.1`, and
//! `uncategorized_url_rate = (extracted - categorized) / extracted` must be
//! `0` — every extracted URL must have ended up with a citation record.
//! `extracted` is read from `citations/extracted-urls.txt` when present
//! (one normalized URL per line); a run without that file (e.g. a gate
//! test driving `citations.json` directly) falls back to treating every
//! citation record as extracted.

use std::collections::HashMap;

use crate::error::CoreResult;
use crate::gates::GateEvalResult;
use crate::model::citations::{CitationStatus, CitationsFile};
use crate::model::gates::GateStatus;
use crate::store::RunStore;

pub const MIN_VALIDATED_URL_RATE: f64 = 0.9;
pub const MAX_INVALID_URL_RATE: f64 = 0.1;

fn round6(x: f64) -> f64 {
    (x * 1_000_000.0).round() / 1_000_000.0
}

fn extracted_count(store: &RunStore, fallback: usize) -> usize {
    match store.resolve("citations/extracted-urls.txt") {
        Ok(path) => match std::fs::read_to_string(path) {
            Ok(text) => text.lines().filter(|l| !l.trim().is_empty()).count(),
            Err(_) => fallback,
        },
        Err(_) => fallback,
    }
}

pub fn evaluate(store: &RunStore) -> CoreResult<GateEvalResult> {
    let citations: CitationsFile = store.read_json_at("citations/citations.json")?;

    let categorized = citations.records.len();
    let extracted = extracted_count(store, categorized);

    let valid = citations
        .records
        .iter()
        .filter(|r| r.status == CitationStatus::Valid)
        .count();
    let invalid = citations
        .records
        .iter()
        .filter(|r| r.status == CitationStatus::Invalid)
        .count();

    let mut warnings = Vec::new();
    let (validated_url_rate, invalid_url_rate, uncategorized_url_rate) = if extracted == 0 {
        warnings.push("NO_URLS_EXTRACTED".to_string());
        (0.0, 0.0, 0.0)
    } else {
        (
            round6(valid as f64 / extracted as f64),
            round6(invalid as f64 / extracted as f64),
            round6((extracted.saturating_sub(categorized)) as f64 / extracted as f64),
        )
    };

    let mut metrics = HashMap::new();
    metrics.insert("extracted".to_string(), extracted.into());
    metrics.insert("categorized".to_string(), categorized.into());
    metrics.insert("valid".to_string(), valid.into());
    metrics.insert("invalid".to_string(), invalid.into());
    metrics.insert("validated_url_rate".to_string(), validated_url_rate.into());
    metrics.insert("invalid_url_rate".to_string(), invalid_url_rate.into());
    metrics.insert("uncategorized_url_rate".to_string(), uncategorized_url_rate.into());

    let status = if extracted == 0 {
        GateStatus::Fail
    } else if validated_url_rate < MIN_VALIDATED_URL_RATE {
        warnings.push(format!(
            "validated_url_rate {validated_url_rate} below minimum {MIN_VALIDATED_URL_RATE}"
        ));
        GateStatus::Fail
    } else if invalid_url_rate > MAX_INVALID_URL_RATE {
        warnings.push(format!(
            "invalid_url_rate {invalid_url_rate} above maximum {MAX_INVALID_URL_RATE}"
        ));
        GateStatus::Fail
    } else if uncategorized_url_rate > 0.0 {
        warnings.push(format!(
            "uncategorized_url_rate {uncategorized_url_rate} must be 0"
        ));
        GateStatus::Fail
    } else {
        GateStatus::Pass
    };

    let inputs = serde_json::json!({"citations": citations, "extracted": extracted});
    Ok(GateEvalResult {
        status,
        metrics,
        artifacts: vec!["citations/citations.json".into()],
        warnings,
        notes: "citation validation integrity".into(),
        inputs_digest: crate::io::sha256_digest_json(&inputs),
    })
}
