//! Thin CLI shell over `deep_research_core`. Not where the engineering of
//! record lives (see SPEC_FULL.md §1) — it exists so the library can be
//! exercised end to end, in the teacher's style of shipping a `[[bin]]`
//! alongside the library crate.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use deep_research_core::model::halt::HaltArtifact;
use deep_research_core::model::manifest::{Mode, QueryInfo, Sensitivity, Stage};
use deep_research_core::model::perspectives::{Perspective, PerspectivesFile, PromptContract, Track, PERSPECTIVES_SCHEMA_VERSION};
use deep_research_core::model::review::ReviewBundle;
use deep_research_core::model::run_config::{CitationValidationMode, RunConfig};
use deep_research_core::model::scope::{CitationPosture, Depth, Scope, SCOPE_SCHEMA_VERSION};
use deep_research_core::model::wave::{WaveOutputMeta, WAVE_OUTPUT_META_SCHEMA_VERSION};
use deep_research_core::orchestrator::tick::{self, TickOutcome};
use deep_research_core::orchestrator::{AgentRunner, FixtureRunner};
use deep_research_core::store::RunStore;
use deep_research_core::summaries::SummaryInput;
use deep_research_core::{CoreError, CoreResult, Recoverable};

#[derive(Parser, Debug)]
#[command(name = "drctl", author, version, about = "Deterministic deep-research run driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Quick,
    Standard,
    Deep,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SensitivityArg {
    Normal,
    Restricted,
    NoWeb,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DriverArg {
    Fixture,
    Task,
    Live,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AgentStageArg {
    Wave1,
    Wave2,
    Summaries,
    Synthesis,
}

#[derive(Subcommand, Debug)]
enum Command {
    Init {
        query: String,
        #[arg(long)]
        run_id: Option<String>,
        #[arg(long)]
        runs_root: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "standard")]
        mode: ModeArg,
        #[arg(long, value_enum, default_value = "normal")]
        sensitivity: SensitivityArg,
        #[arg(long)]
        no_perspectives: bool,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        json: bool,
    },
    Tick {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        gates: Option<PathBuf>,
        #[arg(long, value_enum)]
        driver: DriverArg,
        #[arg(long)]
        reason: String,
        /// Ambient addition: path to a reviewer bundle JSON, consumed only
        /// when the run is currently at the Review stage.
        #[arg(long)]
        review_bundle: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    Run {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        gates: Option<PathBuf>,
        #[arg(long, value_enum)]
        driver: DriverArg,
        #[arg(long)]
        max_ticks: Option<u32>,
        #[arg(long)]
        until: Option<String>,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        review_bundle: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    AgentResult {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long, value_enum)]
        stage: AgentStageArg,
        #[arg(long)]
        perspective: Option<String>,
        #[arg(long)]
        gap: Option<String>,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        agent_run_id: String,
        #[arg(long)]
        started_at: Option<String>,
        #[arg(long)]
        finished_at: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        json: bool,
    },
    Status {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        json: bool,
    },
    Inspect {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        json: bool,
    },
    Triage {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        json: bool,
    },
    Pause {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        json: bool,
    },
    Resume {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        json: bool,
    },
    Cancel {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        json: bool,
    },
    CaptureFixtures {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        bundle_id: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(output) => {
            if output.json {
                println!("{}", serde_json::to_string(&output.body).unwrap());
            } else {
                print_human(&output.body);
            }
            std::process::exit(0);
        }
        Err(Failure::Halted { json, body }) => {
            if json {
                println!("{}", serde_json::to_string(&body).unwrap());
            } else {
                print_human(&body);
            }
            std::process::exit(2);
        }
        Err(Failure::Core { json, err }) => {
            let code = exit_code_for(&err);
            let body = serde_json::json!({
                "error": {
                    "code": err.code(),
                    "message": err.message(),
                    "recovery_hint": err.recovery_hint(),
                    "retryable": err.retryable(),
                }
            });
            if json {
                println!("{}", serde_json::to_string(&body).unwrap());
            } else {
                eprintln!("error [{}]: {}", err.code(), err.message());
                eprintln!("hint: {}", err.recovery_hint());
            }
            std::process::exit(code);
        }
    }
}

struct Output {
    json: bool,
    body: serde_json::Value,
}

enum Failure {
    Halted { json: bool, body: serde_json::Value },
    Core { json: bool, err: CoreError },
}

fn print_human(body: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(body).unwrap());
}

fn exit_code_for(err: &CoreError) -> i32 {
    match err {
        CoreError::SchemaValidationFailed { .. }
        | CoreError::InvalidJson { .. }
        | CoreError::InvalidJsonl { .. }
        | CoreError::ImmutableField { .. } => 3,
        CoreError::Io(_)
        | CoreError::WriteFailed { .. }
        | CoreError::PathNotWritable(_)
        | CoreError::LockUnavailable(_)
        | CoreError::LockLost(_)
        | CoreError::PathEscapesRunRoot(_) => 4,
        CoreError::GateBlocked { .. }
        | CoreError::RunAgentRequired { .. }
        | CoreError::RequestedNextNotAllowed { .. }
        | CoreError::RetryExhausted { .. }
        | CoreError::MissingArtifact(_) => 2,
        _ => 1,
    }
}

fn open_store(manifest_path: &Path) -> CoreResult<RunStore> {
    let root = manifest_path
        .parent()
        .ok_or_else(|| CoreError::InvalidArgs("--manifest must point at a manifest.json file".into()))?;
    let store = RunStore::open(root, "");
    let manifest = store.manifest()?;
    Ok(RunStore::open(root, manifest.run_id))
}

fn run(command: Command) -> Result<Output, Failure> {
    match command {
        Command::Init { query, run_id, runs_root, mode, sensitivity, no_perspectives, force, json } => {
            cmd_init(query, run_id, runs_root, mode, sensitivity, no_perspectives, force, json)
        }
        Command::Tick { manifest, driver, reason, review_bundle, json, .. } => {
            cmd_tick(&manifest, driver, &reason, review_bundle.as_deref(), json)
        }
        Command::Run { manifest, driver, max_ticks, until, reason, review_bundle, json, .. } => {
            cmd_run(&manifest, driver, max_ticks, until.as_deref(), &reason, review_bundle.as_deref(), json)
        }
        Command::AgentResult {
            manifest,
            stage,
            perspective,
            gap,
            input,
            agent_run_id,
            started_at,
            finished_at,
            model,
            reason: _,
            json,
        } => cmd_agent_result(&manifest, stage, perspective.or(gap), &input, agent_run_id, started_at, finished_at, model, json),
        Command::Status { manifest, json } | Command::Inspect { manifest, json } | Command::Triage { manifest, json } => {
            cmd_status(&manifest, json)
        }
        Command::Pause { manifest, reason, json } => cmd_set_status(&manifest, "paused", &reason, json),
        Command::Resume { manifest, reason, json } => cmd_set_status(&manifest, "running", &reason, json),
        Command::Cancel { manifest, reason, json } => cmd_set_status(&manifest, "cancelled", &reason, json),
        Command::CaptureFixtures { manifest, reason, output_dir, bundle_id, json } => {
            cmd_capture_fixtures(&manifest, &reason, output_dir, bundle_id, json)
        }
    }
}

fn default_perspectives() -> PerspectivesFile {
    let contract = |max_words: u32| PromptContract {
        max_words,
        max_sources: 10,
        tool_budget: 5,
        must_include_sections: vec!["Findings".into(), "Sources".into(), "Gaps".into()],
    };
    PerspectivesFile {
        schema_version: PERSPECTIVES_SCHEMA_VERSION.to_string(),
        perspectives: vec![
            Perspective {
                id: "p0-standard".into(),
                title: "Mainline account".into(),
                track: Track::Standard,
                agent_type: "researcher".into(),
                prompt_contract: contract(900),
            },
            Perspective {
                id: "p1-independent".into(),
                title: "Independent corroboration".into(),
                track: Track::Independent,
                agent_type: "researcher".into(),
                prompt_contract: contract(700),
            },
            Perspective {
                id: "p2-contrarian".into(),
                title: "Contrarian / failure-mode read".into(),
                track: Track::Contrarian,
                agent_type: "researcher".into(),
                prompt_contract: contract(700),
            },
        ],
    }
}

fn cmd_init(
    query: String,
    run_id: Option<String>,
    runs_root: Option<PathBuf>,
    mode: ModeArg,
    sensitivity: SensitivityArg,
    no_perspectives: bool,
    force: bool,
    json: bool,
) -> Result<Output, Failure> {
    let runs_root = runs_root.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let run_id = run_id.unwrap_or_else(|| format!("run-{}", uuid::Uuid::new_v4()));

    if force {
        let _ = std::fs::remove_dir_all(runs_root.join(&run_id));
    }

    let mode = match mode {
        ModeArg::Quick => Mode::Quick,
        ModeArg::Standard => Mode::Standard,
        ModeArg::Deep => Mode::Deep,
    };
    let sensitivity = match sensitivity {
        SensitivityArg::Normal => Sensitivity::Normal,
        SensitivityArg::Restricted => Sensitivity::Restricted,
        SensitivityArg::NoWeb => Sensitivity::NoWeb,
    };

    let scope = Scope {
        schema_version: SCOPE_SCHEMA_VERSION.to_string(),
        questions: vec![query.clone()],
        non_goals: vec![],
        deliverable: "a cited synthesis report".to_string(),
        depth: match mode {
            Mode::Quick => Depth::Shallow,
            Mode::Standard => Depth::Standard,
            Mode::Deep => Depth::Exhaustive,
        },
        time_budget_minutes: match mode {
            Mode::Quick => 15,
            Mode::Standard => 45,
            Mode::Deep => 120,
        },
        citation_posture: CitationPosture::Standard,
        generated_at: chrono::Utc::now(),
        source: "cli".to_string(),
    };

    let mut config = RunConfig::default();
    config.citations.mode = CitationValidationMode::OfflineFixture;
    config.citations.fixtures_dir = Some(runs_root.join(&run_id).to_string_lossy().to_string());

    let query_info = QueryInfo { text: query, mode, sensitivity };
    let store = RunStore::init(&runs_root, &run_id, query_info, scope, config).map_err(core_err(json))?;

    if !no_perspectives {
        store.write_perspectives(&default_perspectives()).map_err(core_err(json))?;
    }

    let manifest = store.manifest().map_err(core_err(json))?;
    Ok(Output {
        json,
        body: serde_json::json!({
            "run_id": manifest.run_id,
            "manifest_path": store.resolve("manifest.json").map_err(core_err(json))?.to_string_lossy(),
            "stage": manifest.stage.current,
            "status": manifest.status,
        }),
    })
}

fn build_runner(driver: DriverArg, store: &RunStore, json: bool) -> Result<Option<FixtureRunner>, Failure> {
    match driver {
        DriverArg::Task => Ok(None),
        DriverArg::Fixture => {
            let path = store.resolve("operator/fixtures.json").map_err(core_err(json))?;
            if !path.exists() {
                return Ok(Some(FixtureRunner::new(std::collections::HashMap::new())));
            }
            let text = std::fs::read_to_string(&path).map_err(|e| Failure::Core { json, err: CoreError::Io(e) })?;
            let raw: std::collections::HashMap<String, std::collections::HashMap<String, String>> =
                serde_json::from_str(&text).map_err(|e| Failure::Core {
                    json,
                    err: CoreError::InvalidJson { path, reason: e.to_string() },
                })?;
            let mut outputs = std::collections::HashMap::new();
            for (stage, by_id) in raw {
                for (id, markdown) in by_id {
                    outputs.insert((stage.clone(), id), markdown);
                }
            }
            Ok(Some(FixtureRunner::new(outputs)))
        }
        DriverArg::Live => Err(Failure::Core {
            json,
            err: CoreError::Disabled("the live driver has no in-process AgentRunner wired into this binary".into()),
        }),
    }
}

fn run_one_tick(
    store: &RunStore,
    driver: DriverArg,
    reason: &str,
    review_bundle: Option<&Path>,
    json: bool,
) -> Result<TickOutcome, Failure> {
    let manifest = store.manifest().map_err(core_err(json))?;
    let runner = build_runner(driver, store, json)?;
    let runner_ref: Option<&dyn AgentRunner> = runner.as_ref().map(|r| r as &dyn AgentRunner);

    let outcome = match manifest.stage.current {
        Stage::Init => tick::tick_init(store, reason),
        Stage::Wave1 => tick::tick_wave(store, 1, runner_ref, reason),
        Stage::Pivot => tick::tick_pivot(store, vec![], reason),
        Stage::Wave2 => tick::tick_wave(store, 2, runner_ref, reason),
        Stage::Citations => tick::tick_citations(store, reason),
        Stage::Summaries => tick_summaries_from_disk(store, reason, json),
        Stage::Synthesis => tick_synthesis_from_disk(store, reason, json),
        Stage::Review => tick_review_from_disk(store, review_bundle, reason, json),
        Stage::Finalize => tick::tick_finalize(store),
    }
    .map_err(core_err(json))?;
    Ok(outcome)
}

fn tick_summaries_from_disk(store: &RunStore, reason: &str, json: bool) -> CoreResult<TickOutcome> {
    let perspectives = store.perspectives()?;
    let mut paths = Vec::new();
    let mut markdowns = Vec::new();
    for p in perspectives.sorted_by_id() {
        let rel = format!("summaries/{}.md", p.id);
        let path = store.resolve(&rel)?;
        if !path.exists() {
            return Ok(TickOutcome {
                advanced_to: None,
                halted: true,
                notes: format!("waiting on {rel}; supply it via agent-result --stage summaries"),
            });
        }
        paths.push((p.id.clone(), rel));
        markdowns.push(std::fs::read_to_string(&path)?);
    }
    let inputs: Vec<SummaryInput<'_>> = paths
        .iter()
        .zip(markdowns.iter())
        .map(|((pid, rel), md)| SummaryInput { perspective_id: pid, path: rel, markdown: md })
        .collect();
    let _ = json;
    tick::tick_summaries(store, &inputs, reason)
}

fn tick_synthesis_from_disk(store: &RunStore, reason: &str, _json: bool) -> CoreResult<TickOutcome> {
    let path = store.resolve("synthesis/final-synthesis.md")?;
    if !path.exists() {
        return Ok(TickOutcome {
            advanced_to: None,
            halted: true,
            notes: "waiting on synthesis/final-synthesis.md; supply it via agent-result --stage synthesis".into(),
        });
    }
    let draft = std::fs::read_to_string(&path)?;
    // tick_synthesis writes this same path write-once; remove the
    // operator-placed copy first so the write-once check compares against
    // nothing rather than itself-with-itself (harmless either way, but
    // keeps the call symmetric with the other stages).
    tick::tick_synthesis(store, &draft, reason)
}

fn tick_review_from_disk(store: &RunStore, review_bundle: Option<&Path>, reason: &str, json: bool) -> CoreResult<TickOutcome> {
    let path = match review_bundle {
        Some(p) => p.to_path_buf(),
        None => store.resolve("review/incoming-bundle.json")?,
    };
    if !path.exists() {
        return Ok(TickOutcome {
            advanced_to: None,
            halted: true,
            notes: "waiting on a reviewer bundle; pass --review-bundle <path> or place review/incoming-bundle.json".into(),
        });
    }
    let text = std::fs::read_to_string(&path)?;
    let bundle: ReviewBundle = serde_json::from_str(&text).map_err(|e| CoreError::InvalidJson { path, reason: e.to_string() })?;
    let _ = json;
    tick::tick_review(store, &bundle, reason)
}

fn cmd_tick(manifest: &Path, driver: DriverArg, reason: &str, review_bundle: Option<&Path>, json: bool) -> Result<Output, Failure> {
    let store = open_store(manifest).map_err(core_err(json))?;
    let outcome = run_one_tick(&store, driver, reason, review_bundle, json)?;
    outcome_to_result(&store, outcome, json)
}

fn cmd_run(
    manifest: &Path,
    driver: DriverArg,
    max_ticks: Option<u32>,
    until: Option<&str>,
    reason: &str,
    review_bundle: Option<&Path>,
    json: bool,
) -> Result<Output, Failure> {
    let store = open_store(manifest).map_err(core_err(json))?;
    let until_stage = until.map(parse_stage).transpose().map_err(core_err(json))?;
    let cap = max_ticks.unwrap_or(64);

    let mut last = TickOutcome { advanced_to: None, halted: false, notes: "no ticks run".into() };
    for _ in 0..cap {
        let current = store.manifest().map_err(core_err(json))?.stage.current;
        if let Some(target) = until_stage {
            if current == target {
                break;
            }
        }
        if current.is_terminal() {
            break;
        }
        last = run_one_tick(&store, driver, reason, review_bundle, json)?;
        if last.halted {
            break;
        }
    }
    outcome_to_result(&store, last, json)
}

fn outcome_to_result(store: &RunStore, outcome: TickOutcome, json: bool) -> Result<Output, Failure> {
    let body = serde_json::json!({
        "advanced_to": outcome.advanced_to,
        "halted": outcome.halted,
        "notes": outcome.notes,
    });
    if outcome.halted {
        record_halt(store, &outcome).map_err(core_err(json))?;
        return Err(Failure::Halted { json, body });
    }
    Ok(Output { json, body })
}

/// Writes `operator/halt/tick-####.json` and refreshes `latest.json` so the
/// watchdog recognizes this stall as a legitimate wait rather than a stuck
/// stage. `latest.json` is rewritten directly since each halt's content
/// (timestamp, notes) differs from the last, which `write_json_once` would
/// reject as a divergent rewrite.
fn record_halt(store: &RunStore, outcome: &TickOutcome) -> CoreResult<()> {
    let manifest = store.manifest()?;
    let dir = store.resolve("operator/halt")?;
    let tick_index = std::fs::create_dir_all(&dir)
        .ok()
        .and_then(|_| std::fs::read_dir(&dir).ok())
        .map(|rd| rd.filter_map(|e| e.ok()).count() as u64)
        .unwrap_or(0);

    let mut artifact = HaltArtifact::waiting(store.run_id(), tick_index, manifest.stage.current.as_str());
    artifact.notes = outcome.notes.clone();

    let tick_rel = format!("operator/halt/tick-{tick_index:04}.json");
    store.write_json_once(&tick_rel, &artifact)?;

    let latest_path = store.resolve("operator/halt/latest.json")?;
    std::fs::write(&latest_path, serde_json::to_string_pretty(&artifact)?)?;
    Ok(())
}

fn parse_stage(s: &str) -> CoreResult<Stage> {
    match s {
        "init" => Ok(Stage::Init),
        "wave1" => Ok(Stage::Wave1),
        "pivot" => Ok(Stage::Pivot),
        "wave2" => Ok(Stage::Wave2),
        "citations" => Ok(Stage::Citations),
        "summaries" => Ok(Stage::Summaries),
        "synthesis" => Ok(Stage::Synthesis),
        "review" => Ok(Stage::Review),
        "finalize" => Ok(Stage::Finalize),
        other => Err(CoreError::InvalidArgs(format!("unknown stage {other}"))),
    }
}

fn cmd_agent_result(
    manifest: &Path,
    stage: AgentStageArg,
    id: Option<String>,
    input: &Path,
    agent_run_id: String,
    started_at: Option<String>,
    finished_at: Option<String>,
    model: Option<String>,
    json: bool,
) -> Result<Output, Failure> {
    let store = open_store(manifest).map_err(core_err(json))?;
    let markdown = std::fs::read_to_string(input).map_err(|e| Failure::Core { json, err: CoreError::Io(e) })?;

    let written = match stage {
        AgentStageArg::Wave1 | AgentStageArg::Wave2 => {
            let id = id.ok_or_else(|| Failure::Core {
                json,
                err: CoreError::InvalidArgs("--perspective or --gap is required for this stage".into()),
            })?;
            let wave_n = if matches!(stage, AgentStageArg::Wave1) { 1 } else { 2 };
            let output_rel = format!("wave-{wave_n}/{id}.md");
            let meta_rel = format!("wave-{wave_n}/{id}.meta.json");
            store.write_text_once(&output_rel, &markdown).map_err(core_err(json))?;
            let meta = WaveOutputMeta {
                schema_version: WAVE_OUTPUT_META_SCHEMA_VERSION.to_string(),
                perspective_id: id,
                prompt_digest: String::new(),
                agent_run_id: Some(agent_run_id),
                started_at: started_at.map(|s| parse_ts(&s, json)).transpose()?,
                finished_at: finished_at.map(|s| parse_ts(&s, json)).transpose()?,
                model,
                ingested_at: chrono::Utc::now(),
                source_input_path: output_rel.clone(),
            };
            store.write_json_once(&meta_rel, &meta).map_err(core_err(json))?;
            output_rel
        }
        AgentStageArg::Summaries => {
            let id = id.ok_or_else(|| Failure::Core {
                json,
                err: CoreError::InvalidArgs("--perspective is required for the summaries stage".into()),
            })?;
            let rel = format!("summaries/{id}.md");
            store.write_text_once(&rel, &markdown).map_err(core_err(json))?;
            rel
        }
        AgentStageArg::Synthesis => {
            let rel = "synthesis/final-synthesis.md".to_string();
            store.write_text_once(&rel, &markdown).map_err(core_err(json))?;
            rel
        }
    };

    Ok(Output { json, body: serde_json::json!({"written": written}) })
}

fn parse_ts(s: &str, json: bool) -> Result<chrono::DateTime<chrono::Utc>, Failure> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| Failure::Core { json, err: CoreError::InvalidArgs(format!("invalid timestamp {s}: {e}")) })
}

fn cmd_status(manifest: &Path, json: bool) -> Result<Output, Failure> {
    let store = open_store(manifest).map_err(core_err(json))?;
    let manifest = store.manifest().map_err(core_err(json))?;
    let gates = store.gates().map_err(core_err(json))?;
    Ok(Output {
        json,
        body: serde_json::json!({
            "run_id": manifest.run_id,
            "status": manifest.status,
            "stage": manifest.stage.current,
            "revision": manifest.revision,
            "gates": gates.gates.iter().map(|g| serde_json::json!({"id": g.id, "status": g.status})).collect::<Vec<_>>(),
            "failures": manifest.failures,
        }),
    })
}

fn cmd_set_status(manifest: &Path, status: &str, reason: &str, json: bool) -> Result<Output, Failure> {
    let store = open_store(manifest).map_err(core_err(json))?;
    let current = store.manifest().map_err(core_err(json))?;
    let updated = store
        .write_manifest_patch(current.revision, &serde_json::json!({"status": status}), reason)
        .map_err(core_err(json))?;
    Ok(Output { json, body: serde_json::json!({"run_id": updated.run_id, "status": updated.status}) })
}

fn cmd_capture_fixtures(
    manifest: &Path,
    reason: &str,
    output_dir: Option<PathBuf>,
    bundle_id: Option<String>,
    json: bool,
) -> Result<Output, Failure> {
    let store = open_store(manifest).map_err(core_err(json))?;
    let citations: deep_research_core::model::citations::CitationsFile =
        store.read_json_at("citations/citations.json").map_err(core_err(json))?;

    let bundle_id = bundle_id.unwrap_or_else(|| format!("bundle-{}", chrono::Utc::now().timestamp()));
    let mut fixture = serde_json::Map::new();
    for record in &citations.records {
        fixture.insert(
            record.normalized_url.clone(),
            serde_json::json!({"status": record.status, "http_status": null, "title": null}),
        );
    }

    let dir = output_dir.unwrap_or_else(|| store.root().to_path_buf());
    std::fs::create_dir_all(&dir).map_err(|e| Failure::Core { json, err: CoreError::Io(e) })?;
    let path = dir.join(format!("{bundle_id}.citations-fixture.json"));
    std::fs::write(&path, serde_json::to_string_pretty(&serde_json::Value::Object(fixture)).unwrap())
        .map_err(|e| Failure::Core { json, err: CoreError::Io(e) })?;

    store
        .audit()
        .record(store.run_id(), "operator", "fixtures_captured", serde_json::json!({"reason": reason, "bundle_id": bundle_id}))
        .map_err(core_err(json))?;

    Ok(Output { json, body: serde_json::json!({"bundle_id": bundle_id, "path": path.to_string_lossy()}) })
}

fn core_err(json: bool) -> impl Fn(CoreError) -> Failure {
    move |err| Failure::Core { json, err }
}
