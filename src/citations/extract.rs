//! Scans wave output markdown for `## Sources` bullets and extracts URLs.

use crate::model::citations::FoundByEntry;

const MAX_MENTIONS_PER_URL: usize = 20;

fn sources_section_lines(markdown: &str) -> Vec<&str> {
    let lines: Vec<&str> = markdown.lines().collect();
    let Some(start) = lines
        .iter()
        .position(|l| l.trim_start().trim_start_matches('#').trim() == "Sources")
    else {
        return Vec::new();
    };
    let end = lines[start + 1..]
        .iter()
        .position(|l| l.trim_start().starts_with('#'))
        .map(|i| start + 1 + i)
        .unwrap_or(lines.len());
    lines[start + 1..end].to_vec()
}

fn trim_trailing_punctuation(token: &str) -> &str {
    token.trim_end_matches([')', ',', '.', ';', ':', '!', '?'])
}

fn extract_urls_from_line(line: &str) -> Vec<String> {
    line.split_whitespace()
        .filter(|t| t.starts_with("http://") || t.starts_with("https://"))
        .map(trim_trailing_punctuation)
        .map(|t| t.to_string())
        .collect()
}

/// One `(perspective_id, markdown)` pair per ingested wave output.
pub struct WaveOutput<'a> {
    pub wave: u32,
    pub perspective_id: &'a str,
    pub markdown: &'a str,
}

/// Extracts every URL mentioned in each output's `## Sources` section.
/// Returns a sorted, deduplicated list of original URL strings and the
/// found-by mentions (capped per URL).
pub fn extract_urls(outputs: &[WaveOutput<'_>]) -> (Vec<String>, Vec<FoundByEntry>) {
    let mut seen = std::collections::BTreeSet::new();
    let mut mentions: std::collections::HashMap<String, Vec<FoundByEntry>> =
        std::collections::HashMap::new();

    for output in outputs {
        for (ordinal, line) in sources_section_lines(output.markdown).into_iter().enumerate() {
            for url in extract_urls_from_line(line) {
                seen.insert(url.clone());
                let entry = mentions.entry(url.clone()).or_default();
                if entry.len() < MAX_MENTIONS_PER_URL {
                    entry.push(FoundByEntry {
                        url_original: url,
                        wave: output.wave,
                        perspective_id: output.perspective_id.to_string(),
                        source_line: line.to_string(),
                        ordinal: ordinal as u32,
                    });
                }
            }
        }
    }

    let extracted: Vec<String> = seen.into_iter().collect();
    let mut found_by: Vec<FoundByEntry> = extracted
        .iter()
        .flat_map(|url| mentions.remove(url).unwrap_or_default())
        .collect();
    found_by.sort_by(|a, b| (a.url_original.as_str(), a.ordinal).cmp(&(b.url_original.as_str(), b.ordinal)));

    (extracted, found_by)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_dedupes_urls_sorted() {
        let md = "## Sources\n\n- https://b.example/1.\n- https://a.example/1,\n- https://b.example/1\n";
        let (urls, _found) = extract_urls(&[WaveOutput {
            wave: 1,
            perspective_id: "p0",
            markdown: md,
        }]);
        assert_eq!(urls, vec!["https://a.example/1".to_string(), "https://b.example/1".to_string()]);
    }

    #[test]
    fn caps_mentions_per_url() {
        let mut md = "## Sources\n\n".to_string();
        for _ in 0..30 {
            md.push_str("- https://a.example/1\n");
        }
        let (_urls, found_by) = extract_urls(&[WaveOutput {
            wave: 1,
            perspective_id: "p0",
            markdown: &md,
        }]);
        assert_eq!(found_by.len(), MAX_MENTIONS_PER_URL);
    }

    #[test]
    fn ignores_urls_outside_sources_section() {
        let md = "## Findings\n\nsee https://a.example/1\n\n## Sources\n\n- https://b.example/1\n";
        let (urls, _) = extract_urls(&[WaveOutput {
            wave: 1,
            perspective_id: "p0",
            markdown: md,
        }]);
        assert_eq!(urls, vec!["https://b.example/1".to_string()]);
    }
}
