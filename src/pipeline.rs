//! Module generation: one outline-agent call, then one detail-agent call per
//! outline entry, strictly in order.
//!
//! Outline failures (no reply, transport error, unparseable JSON) abort the
//! run before anything is written. Detail failures never abort: the entry
//! degrades to a record built from its outline stub, so the final module
//! always has as many problems as the outline.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::agent::{receive_final_text, AgentError, AgentRuntime, AgentSpec};
use crate::config::AgentConfig;
use crate::domain::{Module, ModuleOutline, ProblemDetail, ProblemOutline};
use crate::error::PipelineError;
use crate::normalize::{degraded_problem, normalize_problem};
use crate::sanitize::extract_json_object;
use crate::store::ModuleStore;
use crate::util::{fill_template, trunc_for_log};

const USER_ID: &str = "module_generator";

pub struct ModulePipeline {
  runtime: Arc<dyn AgentRuntime>,
  config: Arc<AgentConfig>,
  store: ModuleStore,
}

impl ModulePipeline {
  pub fn new(runtime: Arc<dyn AgentRuntime>, config: Arc<AgentConfig>) -> Self {
    let store = ModuleStore::new(config.output_path.clone());
    Self { runtime, config, store }
  }

  /// Explicit non-blank description, else the configured default.
  pub fn resolve_description<'a>(&'a self, description: Option<&'a str>) -> &'a str {
    description
      .filter(|d| !d.trim().is_empty())
      .unwrap_or(&self.config.default_description)
  }

  /// Run the whole pipeline and return the detailed module.
  #[instrument(level = "info", skip(self, description), fields(has_description = description.is_some()))]
  pub async fn run(&self, description: Option<&str>) -> Result<Module, PipelineError> {
    let description = self.resolve_description(description);
    let run_id = Uuid::new_v4();
    info!(target: "pipeline", %run_id, description = %trunc_for_log(description, 120), "Running module agent");

    let outline = self.generate_outline(description, run_id).await?;
    self.store.save(&outline).await?;
    info!(target: "pipeline", %run_id, problems = outline.problems.len(), topics = outline.topics.len(), "Outline saved");

    let mut problems = Vec::with_capacity(outline.problems.len());
    for (i, entry) in outline.problems.iter().enumerate() {
      problems.push(self.expand_problem(entry, i, run_id).await);
    }

    let module = Module {
      title: outline.title,
      description: Some(description.to_string()),
      topics: outline.topics,
      problems,
    };
    self.store.save(&module).await?;
    info!(target: "pipeline", %run_id, problems = module.problems.len(), "Detailed module saved");
    Ok(module)
  }

  /// Ask the outline agent and parse its reply into a `ModuleOutline`.
  #[instrument(level = "info", skip(self, description))]
  pub async fn generate_outline(&self, description: &str, run_id: Uuid) -> Result<ModuleOutline, PipelineError> {
    let agent = self.config.module_agent();
    let message = fill_template(&self.config.prompts.module_user_template, &[("description", description)]);
    let session_id = format!("module_run_{run_id}");

    let text = self
      .ask(&agent, &session_id, &message)
      .await
      .map_err(|source| PipelineError::Agent { agent: agent.name.clone(), source })?
      .ok_or_else(|| {
        error!(target: "pipeline", %run_id, "No final response event detected");
        PipelineError::NoFinalResponse { agent: agent.name.clone() }
      })?;

    let obj = extract_json_object(&text)?;
    serde_json::from_value::<ModuleOutline>(serde_json::Value::Object(obj)).map_err(PipelineError::OutlineShape)
  }

  /// Ask the detail agent about one outline entry. Never fails.
  #[instrument(level = "info", skip(self, entry), fields(title = %entry.problem_title))]
  pub async fn expand_problem(&self, entry: &ProblemOutline, index: usize, run_id: Uuid) -> ProblemDetail {
    let agent = self.config.problem_agent();
    let session_id = format!("problem_run_{index}_{run_id}");
    let message = match serde_json::to_string_pretty(entry) {
      Ok(m) => m,
      Err(e) => {
        warn!(target: "pipeline", index, error = %e, "Could not serialize outline entry");
        return degraded_problem(entry, index, None);
      }
    };

    info!(target: "pipeline", index, "Sending problem {} to problem agent", index + 1);
    let text = match self.ask(&agent, &session_id, &message).await {
      Ok(Some(text)) => text,
      Ok(None) => {
        warn!(target: "pipeline", index, "Problem agent gave no final response; using outline entry");
        return degraded_problem(entry, index, None);
      }
      Err(e) => {
        warn!(target: "pipeline", index, error = %e, "Problem agent failed; using outline entry");
        return degraded_problem(entry, index, None);
      }
    };

    match extract_json_object(&text) {
      Ok(detail) => normalize_problem(&detail, entry, index),
      Err(e) => {
        warn!(target: "pipeline", index, error = %e, reply = %trunc_for_log(&text, 200), "Problem reply unparseable; keeping raw text");
        degraded_problem(entry, index, Some(&text))
      }
    }
  }

  /// One isolated session: create, send, wait for the final text, release.
  async fn ask(&self, agent: &AgentSpec, session_id: &str, message: &str) -> Result<Option<String>, AgentError> {
    let session = self.runtime.create_session(agent, USER_ID, session_id).await?;
    let result = match self.runtime.send_message(&session, message).await {
      Ok(events) => Ok(receive_final_text(events).await),
      Err(e) => Err(e),
    };
    self.runtime.end_session(&session).await;
    result
  }
}
