//! Gap parsing and the post-wave-1 wave-2-required decision.

use std::collections::BTreeSet;

use regex::Regex;

use crate::model::pivot::{Gap, GapSource, Pivot, Priority, RuleHit, PIVOT_SCHEMA_VERSION};

fn bullet_re() -> Regex {
    Regex::new(r"^\s*[-*]\s*\(P([0-3])\)\s*(.+?)\s*$").expect("valid regex")
}

fn tag_re() -> Regex {
    Regex::new(r"#(\S+)").expect("valid regex")
}

fn priority_from_digit(d: &str) -> Priority {
    match d {
        "0" => Priority::P0,
        "1" => Priority::P1,
        "2" => Priority::P2,
        _ => Priority::P3,
    }
}

/// Parses gap bullets of the form `- (P[0-3]) <text> [#tag ...]` out of a
/// wave-1 output's `## Gaps` section body.
fn gaps_section_body(markdown: &str) -> Vec<&str> {
    let lines: Vec<&str> = markdown.lines().collect();
    let Some(start) = lines
        .iter()
        .position(|l| l.trim_start().trim_start_matches('#').trim() == "Gaps")
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

/// Parses gaps from a single wave-1 perspective output, prefixing each gap
/// id with `perspective_id` to keep ids stable and collision-free across
/// perspectives.
pub fn parse_gaps_from_output(perspective_id: &str, markdown: &str) -> Vec<Gap> {
    let bullets = bullet_re();
    let tags = tag_re();
    let mut gaps = Vec::new();
    for (i, line) in gaps_section_body(markdown).into_iter().enumerate() {
        let Some(caps) = bullets.captures(line) else {
            continue;
        };
        let priority = priority_from_digit(&caps[1]);
        let rest = caps[2].to_string();
        let mut tag_set: BTreeSet<String> = BTreeSet::new();
        for t in tags.captures_iter(&rest) {
            tag_set.insert(t[1].to_lowercase());
        }
        let text = tags.replace_all(&rest, "").trim().to_string();
        gaps.push(Gap {
            id: format!("{perspective_id}-gap-{i}"),
            priority,
            text,
            tags: tag_set.into_iter().collect(),
            source: GapSource::ParsedWave1,
        });
    }
    gaps
}

fn rule_hit(gaps: &[Gap]) -> RuleHit {
    let p0 = gaps.iter().filter(|g| g.priority == Priority::P0).count();
    let p1 = gaps.iter().filter(|g| g.priority == Priority::P1).count();
    let p2 = gaps.iter().filter(|g| g.priority == Priority::P2).count();
    let total = gaps.len();

    if p0 > 0 {
        RuleHit::Wave2RequiredP0
    } else if p1 >= 2 {
        RuleHit::Wave2RequiredP1
    } else if total >= 4 && p1 + p2 >= 3 {
        RuleHit::Wave2RequiredVolume
    } else {
        RuleHit::Wave2SkipNoGaps
    }
}

/// Selects which gaps wave-2 should target: every P0/P1 gap, or (if none
/// qualify despite the rule requiring wave2) the first three gaps in
/// encounter order.
fn select_wave2_gap_ids(gaps: &[Gap]) -> Vec<String> {
    let qualifying: Vec<&Gap> = gaps
        .iter()
        .filter(|g| matches!(g.priority, Priority::P0 | Priority::P1))
        .collect();
    if !qualifying.is_empty() {
        return qualifying.into_iter().map(|g| g.id.clone()).collect();
    }
    gaps.iter().take(3).map(|g| g.id.clone()).collect()
}

/// Builds the pivot decision from every wave-1 output's parsed gaps.
pub fn decide(wave1_output_refs: &[String], gaps: Vec<Gap>) -> Pivot {
    let hit = rule_hit(&gaps);
    let wave2_required = hit.requires_wave2();
    let wave2_gap_ids = if wave2_required {
        select_wave2_gap_ids(&gaps)
    } else {
        Vec::new()
    };

    let inputs = serde_json::json!({
        "wave1_output_refs": wave1_output_refs,
        "gaps": gaps,
    });

    Pivot {
        schema_version: PIVOT_SCHEMA_VERSION.to_string(),
        wave1_output_refs: wave1_output_refs.to_vec(),
        gaps,
        rule_hit: hit,
        wave2_required,
        wave2_gap_ids,
        inputs_digest: crate::io::sha256_digest_json(&inputs),
    }
}
