//! One tick per stage: the deterministic unit of progress the CLI's
//! `tick`/`run` commands repeatedly invoke. Each function assumes the
//! manifest is already at the stage it handles (the caller dispatches on
//! `manifest.stage.current`) and returns whether it advanced the run.

use std::collections::HashSet;

use crate::error::{CoreError, CoreResult};
use crate::gates::{self, GateEvalResult};
use crate::model::citations::CitationStatus;
use crate::model::common::Validate;
use crate::model::gates::{GateId, GateStatus};
use crate::model::manifest::Stage;
use crate::model::pivot::Gap;
use crate::model::retry::RetryDirectivesFile;
use crate::model::review::ReviewBundle;
use crate::model::scope::Scope;
use crate::model::wave::{WaveOutputMeta, WavePlan, WAVE_OUTPUT_META_SCHEMA_VERSION};
use crate::orchestrator::driver::{self, AgentRunner, AgentTask, DriverOutcome};
use crate::store::RunStore;
use crate::{citations, pivot, review, stage, summaries, wave};

const RETRY_DIRECTIVES_REL: &str = "retry/retry-directives.json";

#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub advanced_to: Option<Stage>,
    pub halted: bool,
    pub notes: String,
}

fn no_progress(notes: impl Into<String>) -> TickOutcome {
    TickOutcome { advanced_to: None, halted: true, notes: notes.into() }
}

fn advanced(to: Stage, notes: impl Into<String>) -> TickOutcome {
    TickOutcome { advanced_to: Some(to), halted: false, notes: notes.into() }
}

fn write_gate(store: &RunStore, gates_revision: u64, id: GateId, result: &GateEvalResult) -> CoreResult<()> {
    store.write_gates_patch(gates_revision, id, &result.to_patch())?;
    Ok(())
}

/// Stage `init`: evaluate gate A and advance to `wave1` on pass.
pub fn tick_init(store: &RunStore, reason: &str) -> CoreResult<TickOutcome> {
    let manifest = store.manifest()?;
    let gates = store.gates()?;
    let result = gates::a_planning::evaluate(store, &manifest)?;
    write_gate(store, gates.revision, GateId::A, &result)?;
    if result.status != GateStatus::Pass {
        return Ok(no_progress("gate A not passing"));
    }
    stage::machine::advance(store, Stage::Wave1, reason)?;
    Ok(advanced(Stage::Wave1, "gate A passed"))
}

/// Loads the persisted retry queue for `wave_n`, discarding it if it was
/// left over from a different wave (the artifact is a single shared path
/// across wave1/wave2, per spec.md's persisted-state layout).
fn load_retry_directives(store: &RunStore, wave_n: u32) -> CoreResult<RetryDirectivesFile> {
    match store.read_json_at::<RetryDirectivesFile>(RETRY_DIRECTIVES_REL) {
        Ok(file) if file.wave == wave_n => Ok(file),
        Ok(_) | Err(CoreError::MissingArtifact(_)) => Ok(RetryDirectivesFile::empty(wave_n)),
        Err(e) => Err(e),
    }
}

/// Stage `wave1`/`wave2`: build the plan if missing, resolve each
/// perspective's output (skip if cached, otherwise run/externalize via
/// `runner`), validate, build the review, evaluate gate B, and advance.
///
/// A perspective named by a pending retry directive bypasses the freshness
/// cache even if its sidecar's prompt digest still matches — the prompt
/// didn't change, the prior output just failed its contract, so it must be
/// re-dispatched rather than reused. Once a retried perspective produces a
/// fresh output, its directive is marked consumed; directives for
/// perspectives still failing this round are carried forward (or added).
pub fn tick_wave(store: &RunStore, wave_n: u32, runner: Option<&dyn AgentRunner>, reason: &str) -> CoreResult<TickOutcome> {
    let manifest = store.manifest()?;
    let perspectives = store.perspectives()?;

    let plan_rel = format!("wave-{wave_n}/wave{wave_n}-plan.json");
    let plan: WavePlan = match store.read_json_at(&plan_rel) {
        Ok(plan) => plan,
        Err(CoreError::MissingArtifact(_)) => {
            let scope: Scope = store.read_json_at("operator/scope.json")?;
            let plan = wave::build_plan(wave_n, &manifest, &scope, &perspectives);
            store.write_json_once(&plan_rel, &plan)?;
            plan
        }
        Err(e) => return Err(e),
    };

    let mut retry_file = load_retry_directives(store, wave_n)?;
    let pending_retry_ids: HashSet<String> = retry_file.pending().map(|d| d.perspective_id.clone()).collect();

    let mut outputs: Vec<(String, String, String)> = Vec::new();
    let mut externalized = false;
    let mut regenerated: HashSet<String> = HashSet::new();

    for entry in &plan.entries {
        let meta_rel = format!("wave-{wave_n}/{}.meta.json", entry.perspective_id);
        let output_rel = format!("wave-{wave_n}/{}.md", entry.perspective_id);
        let existing_meta: Option<WaveOutputMeta> = store.read_json_at(&meta_rel).ok();
        let is_retry = pending_retry_ids.contains(&entry.perspective_id);

        if !is_retry && wave::cache::is_fresh(&entry.prompt_md, existing_meta.as_ref()) {
            let markdown = std::fs::read_to_string(store.resolve(&output_rel)?)?;
            outputs.push((entry.perspective_id.clone(), output_rel, markdown));
            continue;
        }

        let task = AgentTask {
            stage: format!("wave{wave_n}"),
            id: entry.perspective_id.clone(),
            prompt_md: entry.prompt_md.clone(),
        };
        match driver::resolve(store, &task, runner)? {
            DriverOutcome::Externalized { .. } => {
                externalized = true;
                continue;
            }
            DriverOutcome::Resolved(markdown) => {
                let meta = WaveOutputMeta {
                    schema_version: WAVE_OUTPUT_META_SCHEMA_VERSION.to_string(),
                    perspective_id: entry.perspective_id.clone(),
                    prompt_digest: wave::cache::prompt_digest(&entry.prompt_md),
                    agent_run_id: None,
                    started_at: None,
                    finished_at: None,
                    model: None,
                    ingested_at: chrono::Utc::now(),
                    source_input_path: output_rel.clone(),
                };
                if is_retry {
                    // A retry legitimately overwrites the prior failing
                    // output, so this bypasses the once-write guard.
                    crate::io::atomic_write_text(&store.resolve(&output_rel)?, &markdown)?;
                    crate::io::atomic_write_json(&store.resolve(&meta_rel)?, &meta)?;
                    regenerated.insert(entry.perspective_id.clone());
                } else {
                    store.write_text_once(&output_rel, &markdown)?;
                    store.write_json_once(&meta_rel, &meta)?;
                }
                outputs.push((entry.perspective_id.clone(), output_rel, markdown));
            }
        }
    }

    if externalized {
        return Ok(no_progress(format!("wave {wave_n} awaiting agent output")));
    }

    let now = chrono::Utc::now();
    for directive in retry_file.directives.iter_mut() {
        if directive.consumed_at.is_none() && regenerated.contains(&directive.perspective_id) {
            directive.consumed_at = Some(now);
        }
    }

    let max_failures = manifest.limits.max_wave_failures;
    let review = wave::build_review(wave_n, &perspectives, &outputs, max_failures);
    // A retry round can change this wave's review from a prior failing
    // attempt, so it's rewritten directly rather than through the
    // once-write guard.
    crate::io::atomic_write_json(&store.resolve(&format!("wave-{wave_n}/wave-review.json"))?, &review)?;

    for directive in &review.retry_directives {
        match retry_file.directives.iter_mut().find(|d| d.perspective_id == directive.perspective_id) {
            Some(existing) => *existing = directive.clone(),
            None => retry_file.directives.push(directive.clone()),
        }
    }
    retry_file.wave = wave_n;
    retry_file.validate()?;
    crate::io::atomic_write_json(&store.resolve(RETRY_DIRECTIVES_REL)?, &retry_file)?;

    let gates = store.gates()?;
    let result = gates::b_wave::evaluate(store, wave_n)?;
    write_gate(store, gates.revision, GateId::B, &result)?;
    if result.status != GateStatus::Pass {
        return Ok(no_progress(format!("wave {wave_n} gate B not passing")));
    }

    let next = if wave_n == 1 { Stage::Pivot } else { Stage::Citations };
    stage::machine::advance(store, next, reason)?;
    Ok(advanced(next, format!("wave {wave_n} gate B passed")))
}

/// Stage `pivot`: parse gaps out of every wave-1 output unless the caller
/// supplied its own explicit set, decide, and advance to `wave2` or
/// `citations` per the decision.
pub fn tick_pivot(store: &RunStore, explicit_gaps: Vec<Gap>, reason: &str) -> CoreResult<TickOutcome> {
    let perspectives = store.perspectives()?;
    let parse_from_outputs = explicit_gaps.is_empty();
    let mut gaps = explicit_gaps;
    let mut refs = Vec::new();

    for p in perspectives.sorted_by_id() {
        let rel = format!("wave-1/{}.md", p.id);
        let Ok(path) = store.resolve(&rel) else { continue };
        let Ok(markdown) = std::fs::read_to_string(&path) else { continue };
        refs.push(rel);
        if parse_from_outputs {
            gaps.extend(pivot::parse_gaps_from_output(&p.id, &markdown));
        }
    }

    let decision = pivot::decide(&refs, gaps);
    store.write_json_once("pivot.json", &decision)?;

    let next = if decision.wave2_required { Stage::Wave2 } else { Stage::Citations };
    stage::machine::advance(store, next, reason)?;
    Ok(advanced(next, format!("pivot rule hit {:?}", decision.rule_hit)))
}

/// Stage `citations`: run the extraction/normalization/validation
/// pipeline over every wave output produced so far, evaluate gate C, and
/// advance on pass.
pub fn tick_citations(store: &RunStore, reason: &str) -> CoreResult<TickOutcome> {
    let perspectives = store.perspectives()?;
    let config = store.run_config()?.citations;

    let mut markdowns: Vec<(u32, String, String)> = Vec::new();
    for wave_n in [1u32, 2u32] {
        for p in perspectives.sorted_by_id() {
            let rel = format!("wave-{wave_n}/{}.md", p.id);
            if let Ok(path) = store.resolve(&rel) {
                if let Ok(markdown) = std::fs::read_to_string(&path) {
                    markdowns.push((wave_n, p.id.clone(), markdown));
                }
            }
        }
    }
    let outputs: Vec<citations::WaveOutput<'_>> = markdowns
        .iter()
        .map(|(wave_n, perspective_id, markdown)| citations::WaveOutput {
            wave: *wave_n,
            perspective_id,
            markdown,
        })
        .collect();

    citations::run(store, &outputs, &config)?;

    let gates = store.gates()?;
    let result = gates::c_citations::evaluate(store)?;
    write_gate(store, gates.revision, GateId::C, &result)?;
    if result.status != GateStatus::Pass {
        return Ok(no_progress("gate C not passing"));
    }
    stage::machine::advance(store, Stage::Summaries, reason)?;
    Ok(advanced(Stage::Summaries, "gate C passed"))
}

/// Stage `summaries`: fixture-mode pack build from externally supplied
/// per-perspective summary markdown.
pub fn tick_summaries(store: &RunStore, inputs: &[summaries::SummaryInput<'_>], reason: &str) -> CoreResult<TickOutcome> {
    let manifest = store.manifest()?;
    let citations: crate::model::citations::CitationsFile = store.read_json_at("citations/citations.json")?;
    let known_cids: Vec<String> = citations.records.iter().map(|r| r.cid.clone()).collect();

    let pack = summaries::build_pack(inputs, &known_cids)?;
    store.write_json_once("summaries/summary-pack.json", &pack)?;
    for input in inputs {
        store.write_text_once(input.path, input.markdown)?;
    }

    let gates = store.gates()?;
    let result = gates::d_summary::evaluate(store, &manifest)?;
    write_gate(store, gates.revision, GateId::D, &result)?;
    if result.status != GateStatus::Pass {
        return Ok(no_progress("gate D not passing"));
    }
    stage::machine::advance(store, Stage::Synthesis, reason)?;
    Ok(advanced(Stage::Synthesis, "gate D passed"))
}

/// Stage `synthesis`: fixture-mode draft write, validated against the
/// citation pool, then straight on to `review` (gate E is evaluated
/// inside the review stage, not here).
pub fn tick_synthesis(store: &RunStore, draft_markdown: &str, reason: &str) -> CoreResult<TickOutcome> {
    let citations: crate::model::citations::CitationsFile = store.read_json_at("citations/citations.json")?;
    let known_cids: Vec<String> = citations
        .records
        .iter()
        .filter(|r| r.status == CitationStatus::Valid)
        .map(|r| r.cid.clone())
        .collect();

    summaries::validate_synthesis(draft_markdown, &known_cids, "synthesis/final-synthesis.md")?;
    store.write_text_once("synthesis/final-synthesis.md", draft_markdown)?;
    summaries::gate_e_reports::write_report(store)?;

    stage::machine::advance(store, Stage::Review, reason)?;
    Ok(advanced(Stage::Review, "synthesis draft validated"))
}

/// Stage `review`: ingest the fixture review bundle, evaluate gate E,
/// and decide advance/revise/escalate.
pub fn tick_review(store: &RunStore, bundle: &ReviewBundle, reason: &str) -> CoreResult<TickOutcome> {
    let manifest = store.manifest()?;
    let iteration = manifest.metrics.review_iteration + 1;
    let rel = format!("review/iteration-{iteration}/review-bundle.json");
    review::ingest_bundle(store, &rel, bundle)?;

    let gates = store.gates()?;
    let gate_e = gates::e_synthesis::evaluate(store)?;
    write_gate(store, gates.revision, GateId::E, &gate_e)?;

    let manifest = store.write_manifest_patch(
        manifest.revision,
        &serde_json::json!({"metrics": {"review_iteration": iteration}}),
        "record review iteration",
    )?;

    let action = review::decide(&manifest, bundle.decision, gate_e.status);
    match action {
        review::ReviewAction::Advance => {
            stage::machine::advance(store, Stage::Finalize, reason)?;
            Ok(advanced(Stage::Finalize, "review passed"))
        }
        review::ReviewAction::Revise => {
            stage::machine::advance(store, Stage::Synthesis, reason)?;
            Ok(advanced(Stage::Synthesis, "review requested changes"))
        }
        review::ReviewAction::Escalate => Ok(no_progress("review escalated: iteration budget exhausted")),
    }
}

/// Stage `finalize`: evaluate the soft rollout gate (never blocks), render
/// `report.md` (the synthesis draft plus a citation footnote list), and
/// report the run's terminal state.
pub fn tick_finalize(store: &RunStore) -> CoreResult<TickOutcome> {
    let manifest = store.manifest()?;
    let gates = store.gates()?;
    let result = gates::f_rollout::evaluate(&manifest)?;
    write_gate(store, gates.revision, GateId::F, &result)?;

    let synthesis = std::fs::read_to_string(store.resolve("synthesis/final-synthesis.md")?)?;
    let citations: crate::model::citations::CitationsFile = store.read_json_at("citations/citations.json")?;
    let footnotes = citations::render::render_footnotes(&citations.records);
    let report = if footnotes.is_empty() {
        format!("{synthesis}\n## Citations\n\nNone.\n")
    } else {
        format!("{synthesis}\n## Citations\n\n{footnotes}")
    };
    store.write_text_once("report.md", &report)?;

    Ok(TickOutcome { advanced_to: None, halted: false, notes: "run finalized".to_string() })
}
