//! Validates and writes `synthesis/final-synthesis.md`: every required
//! heading must be present, every `[@cid_...]` reference must resolve
//! against the known citation pool, and no bare URL may appear outside a
//! citation reference.

use regex::Regex;

use crate::error::{CoreError, CoreResult};
use crate::model::summaries::SYNTHESIS_REQUIRED_HEADINGS;

fn cid_ref_re() -> Regex {
    Regex::new(r"\[@(cid_[0-9a-f]+)\]").expect("valid regex")
}

fn raw_url_re() -> Regex {
    Regex::new(r"https?://").expect("valid regex")
}

fn heading_present(markdown: &str, heading: &str) -> bool {
    markdown
        .lines()
        .any(|l| l.trim_start().trim_start_matches('#').trim() == heading)
}

/// Validates a synthesis draft against the citation pool. Returns the
/// sorted set of cids it references on success.
pub fn validate(markdown: &str, known_cids: &[String], path: &str) -> CoreResult<Vec<String>> {
    for heading in SYNTHESIS_REQUIRED_HEADINGS {
        if !heading_present(markdown, heading) {
            return Err(CoreError::MissingRequiredSection {
                path: path.to_string(),
                heading: heading.to_string(),
            });
        }
    }

    let cid_re = cid_ref_re();
    let mut cids: Vec<String> = cid_re.captures_iter(markdown).map(|c| c[1].to_string()).collect();
    cids.sort();
    cids.dedup();
    for cid in &cids {
        if !known_cids.iter().any(|k| k == cid) {
            return Err(CoreError::UnknownCid { cid: cid.clone() });
        }
    }

    let without_refs = cid_re.replace_all(markdown, "");
    if raw_url_re().is_match(&without_refs) {
        return Err(CoreError::RawUrlNotAllowed {
            path: path.to_string(),
        });
    }

    Ok(cids)
}
