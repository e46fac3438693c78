//! The blocked/invalid URL queue: anything that didn't validate clean
//! gets surfaced here for operator triage rather than silently dropped.

use crate::model::citations::{BlockedUrlEntry, CitationRecord, CitationStatus};

fn action_for(status: CitationStatus) -> &'static str {
    match status {
        CitationStatus::Blocked => "retry_online_capture",
        CitationStatus::Invalid => "drop_or_replace",
        CitationStatus::Paywalled => "manual_review",
        CitationStatus::Mismatch => "manual_review",
        CitationStatus::Valid => "none",
    }
}

/// Builds the blocked-url queue from every non-valid citation record,
/// sorted by `normalized_url` for a stable diff across re-runs.
pub fn build_queue(records: &[CitationRecord]) -> Vec<BlockedUrlEntry> {
    let mut entries: Vec<BlockedUrlEntry> = records
        .iter()
        .filter(|r| r.status != CitationStatus::Valid)
        .map(|r| BlockedUrlEntry {
            normalized_url: r.normalized_url.clone(),
            reason: if r.notes.is_empty() {
                format!("status={:?}", r.status)
            } else {
                r.notes.clone()
            },
            action: action_for(r.status).to_string(),
        })
        .collect();
    entries.sort_by(|a, b| a.normalized_url.cmp(&b.normalized_url));
    entries
}

/// Renders the queue as a deterministic markdown checklist for operator
/// triage (`citations/blocked-urls.md`).
pub fn render_queue_markdown(entries: &[BlockedUrlEntry]) -> String {
    let mut out = String::from("# Blocked / Invalid Citations\n\n");
    if entries.is_empty() {
        out.push_str("None.\n");
        return out;
    }
    for entry in entries {
        out.push_str(&format!(
            "- [ ] {} — {} ({})\n",
            entry.normalized_url, entry.reason, entry.action
        ));
    }
    out
}
