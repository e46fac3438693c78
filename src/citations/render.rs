//! Renders `citations/validated-citations.md`, the deterministic
//! human-readable index of every citation that validated clean.

use crate::model::citations::{CitationRecord, CitationStatus};

/// One line per valid citation, sorted by `cid` so the file is stable
/// across re-runs that only reorder discovery.
pub fn render(records: &[CitationRecord]) -> String {
    let mut valid: Vec<&CitationRecord> = records.iter().filter(|r| r.status == CitationStatus::Valid).collect();
    valid.sort_by(|a, b| a.cid.cmp(&b.cid));

    let mut out = String::from("# Validated Citations\n\n");
    if valid.is_empty() {
        out.push_str("None.\n");
        return out;
    }
    for record in valid {
        let title = record.title.as_deref().unwrap_or("(untitled)");
        out.push_str(&format!("- **[{}]** {} — {}\n", record.cid, title, record.normalized_url));
        if let Some(publisher) = &record.publisher {
            out.push_str(&format!("  - Publisher: {publisher}\n"));
        }
        if let Some(snippet) = &record.evidence_snippet {
            out.push_str(&format!("  - Evidence: {snippet}\n"));
        }
    }
    out
}

/// One `[@cid] -> url (status)` line per record, in the order given (the
/// caller is expected to pass records already sorted by the citations
/// file's own ordering guarantee).
pub fn render_footnotes(records: &[CitationRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&format!("[@{}] -> {} ({})\n", record.cid, record.normalized_url, status_str(record.status)));
    }
    out
}

fn status_str(status: CitationStatus) -> &'static str {
    match status {
        CitationStatus::Valid => "valid",
        CitationStatus::Paywalled => "paywalled",
        CitationStatus::Blocked => "blocked",
        CitationStatus::Mismatch => "mismatch",
        CitationStatus::Invalid => "invalid",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(cid: &str, title: Option<&str>, status: CitationStatus) -> CitationRecord {
        CitationRecord {
            normalized_url: format!("https://{cid}.example/"),
            url_original: format!("https://{cid}.example/"),
            cid: cid.to_string(),
            status,
            checked_at: Utc::now(),
            http_status: Some(200),
            title: title.map(String::from),
            publisher: None,
            evidence_snippet: None,
            found_by: vec![],
            notes: String::new(),
        }
    }

    #[test]
    fn only_valid_records_are_rendered_and_sorted_by_cid() {
        let records = vec![
            record("cid_b", Some("B"), CitationStatus::Valid),
            record("cid_a", Some("A"), CitationStatus::Valid),
            record("cid_c", Some("C"), CitationStatus::Invalid),
        ];
        let md = render(&records);
        let pos_a = md.find("cid_a").unwrap();
        let pos_b = md.find("cid_b").unwrap();
        assert!(pos_a < pos_b);
        assert!(!md.contains("cid_c"));
    }

    #[test]
    fn empty_set_renders_none() {
        assert!(render(&[]).contains("None."));
    }

    #[test]
    fn footnotes_include_every_record_regardless_of_status() {
        let records = vec![record("cid_a", None, CitationStatus::Valid), record("cid_b", None, CitationStatus::Blocked)];
        let footnotes = render_footnotes(&records);
        assert!(footnotes.contains("[@cid_a] -> https://cid_a.example/ (valid)"));
        assert!(footnotes.contains("[@cid_b] -> https://cid_b.example/ (blocked)"));
    }
}
