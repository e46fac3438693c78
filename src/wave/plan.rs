//! Deterministic wave-1/wave-2 plan construction.

use crate::model::manifest::Manifest;
use crate::model::perspectives::{Perspective, PerspectivesFile};
use crate::model::scope::Scope;
use crate::model::wave::{WavePlan, WavePlanEntry, WAVE_PLAN_SCHEMA_VERSION};

fn scope_contract_block(scope: &Scope, perspective: &Perspective) -> String {
    let mut block = String::new();
    block.push_str("## Scope Contract\n\n");
    block.push_str(&format!("- Deliverable: {}\n", scope.deliverable));
    block.push_str(&format!("- Depth: {:?}\n", scope.depth));
    block.push_str(&format!("- Citation posture: {:?}\n", scope.citation_posture));
    block.push_str("- Questions:\n");
    for q in &scope.questions {
        block.push_str(&format!("  - {q}\n"));
    }
    if !scope.non_goals.is_empty() {
        block.push_str("- Non-goals:\n");
        for n in &scope.non_goals {
            block.push_str(&format!("  - {n}\n"));
        }
    }
    block.push_str(&format!(
        "- Max words: {}\n- Max sources: {}\n- Tool budget: {}\n",
        perspective.prompt_contract.max_words,
        perspective.prompt_contract.max_sources,
        perspective.prompt_contract.tool_budget,
    ));
    block.push_str("- Required sections: ");
    block.push_str(&perspective.prompt_contract.must_include_sections.join(", "));
    block.push('\n');
    block
}

fn prompt_md(scope: &Scope, perspective: &Perspective) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", perspective.title));
    out.push_str(&format!(
        "Perspective `{}` ({:?} track, agent type `{}`).\n\n",
        perspective.id, perspective.track, perspective.agent_type
    ));
    out.push_str(&scope_contract_block(scope, perspective));
    out.push_str("\nProduce the following sections: ");
    out.push_str(&perspective.prompt_contract.must_include_sections.join(", "));
    out.push('\n');
    out
}

/// Builds the deterministic wave plan: perspectives sorted by id, each with
/// a computed prompt embedding the scope contract. `inputs_digest` covers
/// `(run_id, query, limits, perspective contracts, scope)`.
pub fn build_plan(wave: u32, manifest: &Manifest, scope: &Scope, perspectives: &PerspectivesFile) -> WavePlan {
    let entries: Vec<WavePlanEntry> = perspectives
        .sorted_by_id()
        .into_iter()
        .map(|p| WavePlanEntry {
            perspective_id: p.id.clone(),
            prompt_md: prompt_md(scope, p),
        })
        .collect();

    let inputs = serde_json::json!({
        "run_id": manifest.run_id,
        "query": manifest.query,
        "limits": manifest.limits,
        "perspectives": perspectives.sorted_by_id(),
        "scope": scope,
    });

    WavePlan {
        schema_version: WAVE_PLAN_SCHEMA_VERSION.to_string(),
        wave,
        entries,
        inputs_digest: crate::io::sha256_digest_json(&inputs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::manifest::{Limits, Mode, QueryInfo, Sensitivity};
    use crate::model::perspectives::{PromptContract, Track, PERSPECTIVES_SCHEMA_VERSION};
    use crate::model::scope::{CitationPosture, Depth, SCOPE_SCHEMA_VERSION};

    fn sample_scope() -> Scope {
        Scope {
            schema_version: SCOPE_SCHEMA_VERSION.into(),
            questions: vec!["what is x?".into()],
            non_goals: vec![],
            deliverable: "report".into(),
            depth: Depth::Standard,
            time_budget_minutes: 30,
            citation_posture: CitationPosture::Standard,
            generated_at: chrono::Utc::now(),
            source: "cli".into(),
        }
    }

    fn sample_perspectives() -> PerspectivesFile {
        PerspectivesFile {
            schema_version: PERSPECTIVES_SCHEMA_VERSION.into(),
            perspectives: vec![
                Perspective {
                    id: "p1".into(),
                    title: "Second".into(),
                    track: Track::Standard,
                    agent_type: "researcher".into(),
                    prompt_contract: PromptContract {
                        max_words: 800,
                        max_sources: 10,
                        tool_budget: 5,
                        must_include_sections: vec!["Findings".into(), "Sources".into(), "Gaps".into()],
                    },
                },
                Perspective {
                    id: "p0".into(),
                    title: "First".into(),
                    track: Track::Contrarian,
                    agent_type: "researcher".into(),
                    prompt_contract: PromptContract {
                        max_words: 800,
                        max_sources: 10,
                        tool_budget: 5,
                        must_include_sections: vec!["Findings".into(), "Sources".into(), "Gaps".into()],
                    },
                },
            ],
        }
    }

    #[test]
    fn entries_are_ordered_by_perspective_id() {
        let manifest = Manifest::new(
            "run-1".into(),
            "/tmp/run-1".into(),
            QueryInfo {
                text: "q".into(),
                mode: Mode::Standard,
                sensitivity: Sensitivity::Normal,
            },
            Limits::default(),
        );
        let plan = build_plan(1, &manifest, &sample_scope(), &sample_perspectives());
        let ids: Vec<&str> = plan.entries.iter().map(|e| e.perspective_id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p1"]);
    }

    #[test]
    fn prompt_embeds_scope_contract_heading() {
        let manifest = Manifest::new(
            "run-1".into(),
            "/tmp/run-1".into(),
            QueryInfo {
                text: "q".into(),
                mode: Mode::Standard,
                sensitivity: Sensitivity::Normal,
            },
            Limits::default(),
        );
        let plan = build_plan(1, &manifest, &sample_scope(), &sample_perspectives());
        for entry in &plan.entries {
            assert!(entry.prompt_md.contains("## Scope Contract"));
        }
    }

    #[test]
    fn digest_is_stable_for_identical_inputs() {
        let manifest = Manifest::new(
            "run-1".into(),
            "/tmp/run-1".into(),
            QueryInfo {
                text: "q".into(),
                mode: Mode::Standard,
                sensitivity: Sensitivity::Normal,
            },
            Limits::default(),
        );
        let a = build_plan(1, &manifest, &sample_scope(), &sample_perspectives());
        let b = build_plan(1, &manifest, &sample_scope(), &sample_perspectives());
        assert_eq!(a.inputs_digest, b.inputs_digest);
    }
}
