//! Builds a `summaries/summary-pack.json` from per-perspective summary
//! markdown: computes sizes, extracts the `[@cid_...]` references each
//! summary makes, and rejects a summary that cites something outside the
//! known citation pool or that embeds a raw (uncited) URL.

use regex::Regex;

use crate::error::{CoreError, CoreResult};
use crate::model::summaries::{PerspectiveSummaryEntry, SummaryPack, SUMMARY_PACK_SCHEMA_VERSION};

fn cid_ref_re() -> Regex {
    Regex::new(r"\[@(cid_[0-9a-f]+)\]").expect("valid regex")
}

fn raw_url_re() -> Regex {
    Regex::new(r"https?://").expect("valid regex")
}

/// One perspective's raw summary markdown, keyed by `perspective_id`, and
/// the path it will live at once written.
pub struct SummaryInput<'a> {
    pub perspective_id: &'a str,
    pub path: &'a str,
    pub markdown: &'a str,
}

fn size_kb(markdown: &str) -> u64 {
    ((markdown.len() as u64) + 1023) / 1024
}

/// Builds and validates the pack. Every cid a summary references must be
/// present in `known_cids`; any bare `http(s)://` substring outside a
/// `[@cid_...]` reference is rejected as an uncited raw URL.
pub fn build(inputs: &[SummaryInput<'_>], known_cids: &[String]) -> CoreResult<SummaryPack> {
    let cid_re = cid_ref_re();
    let url_re = raw_url_re();
    let mut summaries = Vec::with_capacity(inputs.len());

    for input in inputs {
        let cids: Vec<String> = {
            let mut found: Vec<String> = cid_re
                .captures_iter(input.markdown)
                .map(|c| c[1].to_string())
                .collect();
            found.sort();
            found.dedup();
            found
        };
        for cid in &cids {
            if !known_cids.iter().any(|k| k == cid) {
                return Err(CoreError::UnknownCid { cid: cid.clone() });
            }
        }

        let without_refs = cid_re.replace_all(input.markdown, "");
        if url_re.is_match(&without_refs) {
            return Err(CoreError::RawUrlNotAllowed {
                path: input.path.to_string(),
            });
        }

        summaries.push(PerspectiveSummaryEntry {
            perspective_id: input.perspective_id.to_string(),
            path: input.path.to_string(),
            size_kb: size_kb(input.markdown),
            cids,
        });
    }
    summaries.sort_by(|a, b| a.perspective_id.cmp(&b.perspective_id));

    let total_size_kb = summaries.iter().map(|s| s.size_kb).sum();
    Ok(SummaryPack {
        schema_version: SUMMARY_PACK_SCHEMA_VERSION.to_string(),
        summaries,
        total_size_kb,
    })
}
