//! The citation pipeline: extract URLs from wave outputs, normalize them,
//! validate each one, and render the artifacts the rest of the run reads
//! (`citations.json`, `extracted-urls.txt`, `blocked-urls.md`,
//! `validated-citations.md`).

pub mod blocked;
pub mod extract;
pub mod normalize;
pub mod render;
pub mod validate;

use std::collections::BTreeMap;

use crate::error::CoreResult;
use crate::model::citations::{CitationsFile, CITATIONS_SCHEMA_VERSION};
use crate::model::run_config::CitationConfig;
use crate::store::RunStore;

pub use extract::WaveOutput;
pub use validate::{OfflineFixtureEntry, OfflineFixtures};

/// Runs the full citation pipeline over a batch of wave outputs and
/// persists every artifact under `citations/`. Idempotent: re-running
/// against unchanged inputs writes byte-identical content.
pub fn run(store: &RunStore, outputs: &[WaveOutput<'_>], config: &CitationConfig) -> CoreResult<CitationsFile> {
    let fixtures = load_fixtures(config)?;

    let (extracted, found_by) = extract::extract_urls(outputs);

    let mut found_by_perspectives: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in &found_by {
        found_by_perspectives
            .entry(entry.url_original.clone())
            .or_default()
            .push(entry.perspective_id.clone());
    }

    let mut records = Vec::with_capacity(extracted.len());
    for url_original in &extracted {
        let Some(normalized) = normalize::normalize(url_original) else {
            continue;
        };
        let mut record = validate::validate(config.mode, &normalized, url_original, fixtures.as_ref());
        let mut perspectives = found_by_perspectives.remove(url_original).unwrap_or_default();
        perspectives.sort();
        perspectives.dedup();
        record.found_by = perspectives;
        records.push(record);
    }
    records.sort_by(|a, b| (&a.normalized_url, &a.url_original).cmp(&(&b.normalized_url, &b.url_original)));

    let citations = CitationsFile {
        schema_version: CITATIONS_SCHEMA_VERSION.to_string(),
        records,
    };

    let extracted_urls_text = {
        let mut normalized: Vec<String> = extracted.iter().filter_map(|u| normalize::normalize(u)).collect();
        normalized.sort();
        normalized.dedup();
        normalized.join("\n") + if normalized.is_empty() { "" } else { "\n" }
    };
    store.write_text_once("citations/extracted-urls.txt", &extracted_urls_text)?;
    store.write_json_once("citations/citations.json", &citations)?;

    let queue = blocked::build_queue(&citations.records);
    store.write_json_once("citations/blocked-urls.json", &queue)?;
    store.write_text_once("citations/blocked-urls.md", &blocked::render_queue_markdown(&queue))?;

    store.write_text_once("citations/validated-citations.md", &render::render(&citations.records))?;

    Ok(citations)
}

fn load_fixtures(config: &CitationConfig) -> CoreResult<Option<OfflineFixtures>> {
    let Some(dir) = &config.fixtures_dir else {
        return Ok(None);
    };
    let path = std::path::Path::new(dir).join("citations-fixture.json");
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)?;
    let fixtures: OfflineFixtures = serde_json::from_str(&text).map_err(|e| crate::error::CoreError::InvalidJson {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    Ok(Some(fixtures))
}
