//! The agent seam: ticks never call an LLM directly. A driver either
//! answers deterministically from fixtures, externalizes the call as a
//! prompt file + halt (`task`), or invokes an injected [`AgentRunner`]
//! in-process (`live`) — all three present the same contract to
//! [`super::tick`].

use crate::error::{CoreError, CoreResult};

/// One unit of agent work: render a prompt, get markdown back.
#[derive(Debug, Clone)]
pub struct AgentTask {
    pub stage: String,
    pub id: String,
    pub prompt_md: String,
}

/// Implemented by whatever actually produces markdown for an [`AgentTask`].
/// `live` drivers inject a real implementation; `fixture` drivers inject
/// [`FixtureRunner`]; `task` drivers never call this at all — they
/// externalize via prompt files instead.
pub trait AgentRunner {
    fn run(&self, task: &AgentTask) -> CoreResult<String>;
}

/// Answers deterministically from a preloaded table, keyed by
/// `(stage, id)`. Used by the `fixture` driver and by tests.
pub struct FixtureRunner {
    outputs: std::collections::HashMap<(String, String), String>,
}

impl FixtureRunner {
    pub fn new(outputs: std::collections::HashMap<(String, String), String>) -> Self {
        Self { outputs }
    }
}

impl AgentRunner for FixtureRunner {
    fn run(&self, task: &AgentTask) -> CoreResult<String> {
        self.outputs
            .get(&(task.stage.clone(), task.id.clone()))
            .cloned()
            .ok_or_else(|| CoreError::RunAgentRequired { stage: task.stage.clone() })
    }
}

/// What a driver does with a task it cannot answer immediately: the
/// `task` driver writes the prompt to disk and halts; `live` and
/// `fixture` drivers resolve it in-process via an [`AgentRunner`].
pub enum DriverOutcome {
    Resolved(String),
    Externalized { prompt_path: String },
}

/// Resolves `task` against `runner` if one is given (fixture/live), or
/// externalizes it by writing the prompt under
/// `operator/prompts/<stage>/<id>.md` when `runner` is `None` (task driver).
pub fn resolve(
    store: &crate::store::RunStore,
    task: &AgentTask,
    runner: Option<&dyn AgentRunner>,
) -> CoreResult<DriverOutcome> {
    if let Some(runner) = runner {
        return Ok(DriverOutcome::Resolved(runner.run(task)?));
    }
    let rel = format!("operator/prompts/{}/{}.md", task.stage, task.id);
    store.write_text_once(&rel, &task.prompt_md)?;
    Ok(DriverOutcome::Externalized { prompt_path: rel })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::manifest::{Mode, QueryInfo, Sensitivity};
    use crate::model::run_config::{CitationValidationMode, RunConfig};
    use crate::model::scope::{CitationPosture, Depth, Scope, SCOPE_SCHEMA_VERSION};
    use crate::store::RunStore;
    use tempfile::tempdir;

    fn init_store(workspace: &std::path::Path) -> RunStore {
        let mut config = RunConfig::default();
        config.citations.mode = CitationValidationMode::OfflineFixture;
        config.citations.fixtures_dir = Some(workspace.to_string_lossy().to_string());
        RunStore::init(
            workspace,
            "run-1",
            QueryInfo { text: "q".into(), mode: Mode::Standard, sensitivity: Sensitivity::Normal },
            Scope {
                schema_version: SCOPE_SCHEMA_VERSION.into(),
                questions: vec!["q1".into()],
                non_goals: vec![],
                deliverable: "report".into(),
                depth: Depth::Standard,
                time_budget_minutes: 30,
                citation_posture: CitationPosture::Standard,
                generated_at: chrono::Utc::now(),
                source: "cli".into(),
            },
            config,
        )
        .unwrap()
    }

    #[test]
    fn fixture_runner_answers_known_tasks() {
        let mut outputs = std::collections::HashMap::new();
        outputs.insert(("wave1".to_string(), "p0".to_string()), "# Output\n".to_string());
        let runner = FixtureRunner::new(outputs);
        let task = AgentTask { stage: "wave1".into(), id: "p0".into(), prompt_md: "prompt".into() };
        assert_eq!(runner.run(&task).unwrap(), "# Output\n");
    }

    #[test]
    fn fixture_runner_errors_on_unknown_task() {
        let runner = FixtureRunner::new(std::collections::HashMap::new());
        let task = AgentTask { stage: "wave1".into(), id: "p0".into(), prompt_md: "prompt".into() };
        assert!(matches!(runner.run(&task), Err(CoreError::RunAgentRequired { .. })));
    }

    #[test]
    fn no_runner_externalizes_the_prompt() {
        let workspace = tempdir().unwrap();
        let store = init_store(workspace.path());
        let task = AgentTask { stage: "wave1".into(), id: "p0".into(), prompt_md: "## Scope Contract\n".into() };
        let outcome = resolve(&store, &task, None).unwrap();
        match outcome {
            DriverOutcome::Externalized { prompt_path } => {
                assert_eq!(prompt_path, "operator/prompts/wave1/p0.md");
                assert!(store.resolve(&prompt_path).unwrap().exists());
            }
            DriverOutcome::Resolved(_) => panic!("expected externalized outcome"),
        }
    }

    #[test]
    fn runner_resolves_in_process() {
        let workspace = tempdir().unwrap();
        let store = init_store(workspace.path());
        let mut outputs = std::collections::HashMap::new();
        outputs.insert(("wave1".to_string(), "p0".to_string()), "# Output\n".to_string());
        let runner = FixtureRunner::new(outputs);
        let task = AgentTask { stage: "wave1".into(), id: "p0".into(), prompt_md: "prompt".into() };
        match resolve(&store, &task, Some(&runner)).unwrap() {
            DriverOutcome::Resolved(md) => assert_eq!(md, "# Output\n"),
            DriverOutcome::Externalized { .. } => panic!("expected resolved outcome"),
        }
    }
}
