//! Gate E — synthesis quality.
//!
//! Hard failure conditions: any uncited numeric claim in a non-heading
//! paragraph, or a missing required heading. Soft warnings (never
//! block): low citation utilization and high duplicate-citation rate.

use std::collections::HashMap;

use regex::Regex;

use crate::error::CoreResult;
use crate::gates::GateEvalResult;
use crate::model::gates::GateStatus;
use crate::model::summaries::SYNTHESIS_REQUIRED_HEADINGS;
use crate::store::RunStore;

const LOW_CITATION_UTILIZATION_THRESHOLD: f64 = 0.6;
const HIGH_DUPLICATE_CITATION_RATE_THRESHOLD: f64 = 0.2;

fn round6(x: f64) -> f64 {
    (x * 1_000_000.0).round() / 1_000_000.0
}

/// Paragraphs, with fenced code blocks removed and headings tagged.
fn paragraphs(markdown: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_fence = false;
    for line in markdown.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            continue;
        }
        if line.trim_start().starts_with('#') {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            continue;
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn required_headings_present(markdown: &str) -> Vec<&'static str> {
    SYNTHESIS_REQUIRED_HEADINGS
        .iter()
        .copied()
        .filter(|h| {
            markdown
                .lines()
                .any(|l| l.trim_start().trim_start_matches('#').trim() == *h)
        })
        .collect()
}

pub fn evaluate(store: &RunStore) -> CoreResult<GateEvalResult> {
    let path = store.resolve("synthesis/final-synthesis.md")?;
    let markdown = std::fs::read_to_string(&path)
        .map_err(|_| crate::error::CoreError::MissingArtifact(path.display().to_string()))?;

    let numeric_token = Regex::new(r"-?\d+(?:\.\d+)?%?").expect("valid regex");
    let cid_ref = Regex::new(r"\[@(cid_[0-9a-f]+)\]").expect("valid regex");
    let ordered_list_marker = Regex::new(r"^\s*\d+[.)]\s").expect("valid regex");

    let present_headings = required_headings_present(&markdown);
    let missing_headings: Vec<&str> = SYNTHESIS_REQUIRED_HEADINGS
        .iter()
        .copied()
        .filter(|h| !present_headings.contains(h))
        .collect();
    let sections_present_rate = round6(
        present_headings.len() as f64 / SYNTHESIS_REQUIRED_HEADINGS.len() as f64,
    );

    let mut uncited_numeric_claims = 0u32;
    let mut used_cids: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut total_mentions = 0u32;

    for paragraph in paragraphs(&markdown) {
        for cap in cid_ref.captures_iter(&paragraph) {
            used_cids.insert(cap[1].to_string());
            total_mentions += 1;
        }
        let has_citation = cid_ref.is_match(&paragraph);
        if has_citation {
            continue;
        }
        let has_numeric_claim = paragraph.lines().any(|line| {
            if ordered_list_marker.is_match(line) {
                return false;
            }
            numeric_token.is_match(line)
        });
        if has_numeric_claim {
            uncited_numeric_claims += 1;
        }
    }

    let validated_cids = validated_cid_count(store)?;
    let citation_utilization = if validated_cids == 0 {
        0.0
    } else {
        round6(used_cids.len() as f64 / validated_cids as f64)
    };
    let duplicate_rate = if total_mentions == 0 {
        0.0
    } else {
        round6(1.0 - (used_cids.len() as f64 / total_mentions as f64))
    };

    let mut warnings = Vec::new();
    if missing_headings.is_empty() && uncited_numeric_claims > 0 {
        warnings.push(format!("{uncited_numeric_claims} uncited numeric claim(s)"));
    }
    for h in &missing_headings {
        warnings.push(format!("missing required heading: {h}"));
    }
    if citation_utilization < LOW_CITATION_UTILIZATION_THRESHOLD {
        warnings.push("LOW_CITATION_UTILIZATION".to_string());
    }
    if duplicate_rate > HIGH_DUPLICATE_CITATION_RATE_THRESHOLD {
        warnings.push("HIGH_DUPLICATE_CITATION_RATE".to_string());
    }

    let status = if uncited_numeric_claims == 0 && missing_headings.is_empty() {
        GateStatus::Pass
    } else {
        GateStatus::Fail
    };

    let mut metrics = HashMap::new();
    metrics.insert("uncited_numeric_claims".to_string(), uncited_numeric_claims.into());
    metrics.insert("sections_present_rate".to_string(), sections_present_rate.into());
    metrics.insert("citation_utilization".to_string(), citation_utilization.into());
    metrics.insert("duplicate_citation_rate".to_string(), duplicate_rate.into());
    metrics.insert("used_cids".to_string(), used_cids.len().into());
    metrics.insert("validated_cids".to_string(), validated_cids.into());

    Ok(GateEvalResult {
        status,
        metrics,
        artifacts: vec!["synthesis/final-synthesis.md".into()],
        warnings,
        notes: "synthesis quality".into(),
        inputs_digest: format!("sha256:{}", crate::io::sha256_hex(markdown.as_bytes())),
    })
}

fn validated_cid_count(store: &RunStore) -> CoreResult<usize> {
    use crate::model::citations::{CitationStatus, CitationsFile};
    let citations: CitationsFile = store.read_json_at("citations/citations.json")?;
    Ok(citations
        .records
        .iter()
        .filter(|r| r.status == CitationStatus::Valid)
        .count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::citations::{CitationRecord, CitationStatus, CitationsFile, CITATIONS_SCHEMA_VERSION};
    use crate::model::manifest::{Mode, QueryInfo, Sensitivity};
    use crate::model::run_config::{CitationValidationMode, RunConfig};
    use crate::model::scope::{CitationPosture, Depth, Scope, SCOPE_SCHEMA_VERSION};
    use tempfile::tempdir;

    fn init_store(workspace: &std::path::Path) -> RunStore {
        let mut config = RunConfig::default();
        config.citations.mode = CitationValidationMode::OfflineFixture;
        config.citations.fixtures_dir = Some(workspace.to_string_lossy().to_string());
        let store = RunStore::init(
            workspace,
            "run-1",
            QueryInfo {
                text: "q".into(),
                mode: Mode::Standard,
                sensitivity: Sensitivity::Normal,
            },
            Scope {
                schema_version: SCOPE_SCHEMA_VERSION.into(),
                questions: vec!["q1".into()],
                non_goals: vec![],
                deliverable: "report".into(),
                depth: Depth::Standard,
                time_budget_minutes: 30,
                citation_posture: CitationPosture::Standard,
                generated_at: chrono::Utc::now(),
                source: "cli".into(),
            },
            config,
        )
        .unwrap();
        let cid = format!("cid_{}", crate::io::sha256_hex(b"https://a.example/1"));
        let citations = CitationsFile {
            schema_version: CITATIONS_SCHEMA_VERSION.into(),
            records: vec![CitationRecord {
                normalized_url: "https://a.example/1".into(),
                url_original: "https://a.example/1".into(),
                cid,
                status: CitationStatus::Valid,
                checked_at: chrono::Utc::now(),
                http_status: Some(200),
                title: None,
                publisher: None,
                evidence_snippet: None,
                found_by: vec![],
                notes: String::new(),
            }],
        };
        store
            .write_json_once("citations/citations.json", &citations)
            .unwrap();
        store
    }

    #[test]
    fn passes_with_all_headings_and_no_uncited_claims() {
        let workspace = tempdir().unwrap();
        let store = init_store(workspace.path());
        let cid = format!("cid_{}", crate::io::sha256_hex(b"https://a.example/1"));
        let markdown = format!(
            "# Report\n\n## Summary\n\nThe project grew 42% [@{cid}].\n\n## Key Findings\n\nEverything checks out.\n\n## Evidence\n\n1. first item\n2. second item\n\n## Caveats\n\nNone known.\n"
        );
        std::fs::write(
            store.resolve("synthesis/final-synthesis.md").unwrap(),
            markdown,
        )
        .unwrap();
        let result = evaluate(&store).unwrap();
        assert_eq!(result.status, GateStatus::Pass, "{:?}", result.warnings);
    }

    #[test]
    fn fails_on_uncited_numeric_claim() {
        let workspace = tempdir().unwrap();
        let store = init_store(workspace.path());
        let markdown = "# Report\n\n## Summary\n\nThe project grew 42% last year.\n\n## Key Findings\n\nok\n\n## Evidence\n\nok\n\n## Caveats\n\nnone\n";
        std::fs::write(
            store.resolve("synthesis/final-synthesis.md").unwrap(),
            markdown,
        )
        .unwrap();
        let result = evaluate(&store).unwrap();
        assert_eq!(result.status, GateStatus::Fail);
    }

    #[test]
    fn fails_on_missing_heading() {
        let workspace = tempdir().unwrap();
        let store = init_store(workspace.path());
        let markdown = "# Report\n\n## Summary\n\nno numbers here.\n";
        std::fs::write(
            store.resolve("synthesis/final-synthesis.md").unwrap(),
            markdown,
        )
        .unwrap();
        let result = evaluate(&store).unwrap();
        assert_eq!(result.status, GateStatus::Fail);
    }
}
