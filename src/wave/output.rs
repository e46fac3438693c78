//! Wave output contract validation (`WaveOutputValidate`).

use crate::error::{CoreError, CoreResult};
use crate::model::perspectives::PromptContract;

#[derive(Debug, Clone, serde::Serialize)]
pub struct WaveOutputReport {
    pub perspective_id: String,
    pub markdown_path: String,
    pub words: usize,
    pub sources: usize,
    pub missing_sections: Vec<String>,
}

fn heading_present(markdown: &str, heading: &str) -> bool {
    markdown
        .lines()
        .any(|l| l.trim_start().trim_start_matches('#').trim() == heading)
}

/// Lines belonging to the body of `heading`, up to the next heading.
fn section_body_lines<'a>(markdown: &'a str, heading: &str) -> Option<Vec<&'a str>> {
    let lines: Vec<&str> = markdown.lines().collect();
    let start = lines
        .iter()
        .position(|l| l.trim_start().trim_start_matches('#').trim() == heading)?;
    let end = lines[start + 1..]
        .iter()
        .position(|l| l.trim_start().starts_with('#'))
        .map(|i| start + 1 + i)
        .unwrap_or(lines.len());
    Some(lines[start + 1..end].to_vec())
}

fn word_count(markdown: &str) -> usize {
    markdown.split_whitespace().count()
}

fn validate_sources(markdown: &str, max_sources: u32, path: &str) -> CoreResult<usize> {
    let Some(body) = section_body_lines(markdown, "Sources") else {
        return Ok(0);
    };
    let mut count = 0usize;
    for line in body {
        if line.trim().is_empty() {
            continue;
        }
        let trimmed = line.trim_start();
        let looks_like_bullet = trimmed.starts_with('-')
            || trimmed.starts_with('*')
            || trimmed.chars().next().is_some_and(|c| c.is_ascii_digit());
        if !looks_like_bullet {
            continue;
        }
        if !(line.contains("http://") || line.contains("https://")) {
            return Err(CoreError::MalformedSources {
                path: path.to_string(),
                line: line.to_string(),
            });
        }
        count += 1;
    }
    if count as u32 > max_sources {
        return Err(CoreError::TooManySources {
            path: path.to_string(),
            sources: count,
            max: max_sources as usize,
        });
    }
    Ok(count)
}

/// Validates a wave output markdown body against its perspective's prompt
/// contract. `path` is used only for error context (e.g. `wave-1/p0.md`).
pub fn validate_output(
    perspective_id: &str,
    path: &str,
    markdown: &str,
    contract: &PromptContract,
) -> CoreResult<WaveOutputReport> {
    let missing_sections: Vec<String> = contract
        .must_include_sections
        .iter()
        .filter(|h| !heading_present(markdown, h))
        .cloned()
        .collect();
    if let Some(first) = missing_sections.first() {
        return Err(CoreError::MissingRequiredSection {
            path: path.to_string(),
            heading: first.clone(),
        });
    }

    let words = word_count(markdown);
    if words as u32 > contract.max_words {
        return Err(CoreError::TooManyWords {
            path: path.to_string(),
            words,
            max: contract.max_words as usize,
        });
    }

    let sources = validate_sources(markdown, contract.max_sources, path)?;

    Ok(WaveOutputReport {
        perspective_id: perspective_id.to_string(),
        markdown_path: path.to_string(),
        words,
        sources,
        missing_sections: Vec::new(),
    })
}
