//! Loading generator configuration (prompts, models, default description,
//! output path) from TOML, with environment overrides.
//!
//! TOML schema (all keys optional):
//!
//! ```toml
//! default_description = "..."
//! output_path = "quiz_module.json"
//!
//! [models]
//! module_agent = "gemini-2.5-flash"
//! problem_agent = "gemini-2.5-flash"
//!
//! [prompts]
//! module_instruction = "..."
//! module_user_template = "{description}"
//! problem_instruction = "..."
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{error, info};

use crate::agent::AgentSpec;

pub const DEFAULT_OUTPUT_PATH: &str = "quiz_module.json";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub const DEFAULT_DESCRIPTION: &str = "We want to create a quiz game in React. Multiple-choice quiz app with score tracking, conditional rendering, and user state.";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
  pub default_description: String,
  pub output_path: PathBuf,
  pub models: Models,
  pub prompts: Prompts,
}

impl Default for AgentConfig {
  fn default() -> Self {
    Self {
      default_description: DEFAULT_DESCRIPTION.into(),
      output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
      models: Models::default(),
      prompts: Prompts::default(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Models {
  pub module_agent: String,
  pub problem_agent: String,
}

impl Default for Models {
  fn default() -> Self {
    Self { module_agent: DEFAULT_MODEL.into(), problem_agent: DEFAULT_MODEL.into() }
  }
}

/// Agent instructions. Override in TOML to tune step count or tone.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub module_instruction: String,
  pub module_user_template: String,
  pub problem_instruction: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      module_instruction: r#"You design learning modules. A module is a sequence of step-by-step problems that together build one complete project.
You receive the module's objective. Produce 6 steps, or as many as the objective asks for.
Each step will later be expanded into a full problem, in order, so every step description must start with
"In the previous steps we ..." and continue with "Now in this step you have to ...".
Every step must be concrete and discrete: state exactly what has to be built. Never write vague steps such as "enhance your project".
Learner solutions are checked automatically, so steps must not leave room for very different answers.
Respond ONLY with JSON of this shape:
{
  "topics": ["topic", "..."],
  "problems": [
    { "problem_title": "title of the first step", "problem_description": "2-4 lines describing the step" }
  ]
}"#
        .into(),
      module_user_template: "{description}".into(),
      problem_instruction: r#"You are a coding problem generator. You receive a short description of one step of a project.
Write a detailed problem that a learner aged 15-25 can understand, reason about, and learn from.
When the problem has input and output, the description must state their types and any constraints.
Respond ONLY with valid JSON of this shape and nothing else:
{
  "title": "Title of the problem",
  "description": "Detailed description of the problem",
  "difficulty": "Easy | Medium | Hard",
  "topics": ["Web Dev", "String Manipulation"],
  "sample_input": "sample input for SQL/DSA problems, otherwise null",
  "sample_output": "sample output for SQL/DSA problems, otherwise null"
}"#
        .into(),
    }
  }
}

impl AgentConfig {
  /// Outline agent ("module structure generator").
  pub fn module_agent(&self) -> AgentSpec {
    AgentSpec {
      name: "module_structure_generator".into(),
      model: self.models.module_agent.clone(),
      instruction: self.prompts.module_instruction.clone(),
      json_output: false,
    }
  }

  /// Detail agent ("problem generator").
  pub fn problem_agent(&self) -> AgentSpec {
    AgentSpec {
      name: "problem_generator".into(),
      model: self.models.problem_agent.clone(),
      instruction: self.prompts.problem_instruction.clone(),
      json_output: true,
    }
  }

  /// Apply MODULE_OUTPUT_PATH / MODULE_AGENT_MODEL / PROBLEM_AGENT_MODEL.
  pub fn apply_env_overrides(mut self) -> Self {
    if let Ok(p) = std::env::var("MODULE_OUTPUT_PATH") {
      self.output_path = PathBuf::from(p);
    }
    if let Ok(m) = std::env::var("MODULE_AGENT_MODEL") {
      self.models.module_agent = m;
    }
    if let Ok(m) = std::env::var("PROBLEM_AGENT_MODEL") {
      self.models.problem_agent = m;
    }
    self
  }
}

/// Parse a TOML config file. On any IO/parse error, logs and returns None.
pub fn load_agent_config(path: &Path) -> Option<AgentConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "modgen", path = %path.display(), "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "modgen", path = %path.display(), error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "modgen", path = %path.display(), error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// AGENT_CONFIG_PATH (if set and valid) or defaults, then env overrides.
pub fn load_agent_config_from_env() -> AgentConfig {
  std::env::var("AGENT_CONFIG_PATH")
    .ok()
    .and_then(|p| load_agent_config(Path::new(&p)))
    .unwrap_or_default()
    .apply_env_overrides()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: AgentConfig = toml::from_str(
      r#"
      output_path = "out/module.json"
      [models]
      problem_agent = "gemini-2.5-pro"
      "#,
    )
    .unwrap();

    assert_eq!(cfg.output_path, PathBuf::from("out/module.json"));
    assert_eq!(cfg.models.module_agent, DEFAULT_MODEL);
    assert_eq!(cfg.models.problem_agent, "gemini-2.5-pro");
    assert_eq!(cfg.default_description, DEFAULT_DESCRIPTION);
    assert_eq!(cfg.prompts.module_user_template, "{description}");
  }

  #[test]
  fn load_from_file_and_reject_garbage() {
    let mut good = tempfile::NamedTempFile::new().unwrap();
    writeln!(good, "default_description = \"Build a to-do list app\"").unwrap();
    let cfg = load_agent_config(good.path()).unwrap();
    assert_eq!(cfg.default_description, "Build a to-do list app");

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    writeln!(bad, "default_description = [").unwrap();
    assert!(load_agent_config(bad.path()).is_none());
    assert!(load_agent_config(Path::new("/definitely/not/here.toml")).is_none());
  }

  #[test]
  fn agent_specs_follow_models_and_prompts() {
    let cfg = AgentConfig::default();
    let module = cfg.module_agent();
    let problem = cfg.problem_agent();
    assert_eq!(module.model, DEFAULT_MODEL);
    assert!(!module.json_output);
    assert!(problem.json_output);
    assert!(problem.instruction.contains("\"difficulty\""));
  }
}
