//! Application state: read-only config plus the optional agent runtime.
//!
//! Nothing here is mutated per request; the description travels as an
//! argument through the pipeline, so concurrent requests do not interfere.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::agent::{chat::ChatRuntime, AgentRuntime};
use crate::config::{load_agent_config_from_env, AgentConfig};
use crate::error::PipelineError;
use crate::pipeline::ModulePipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AgentConfig>,
    pub runtime: Option<Arc<dyn AgentRuntime>>,
}

impl AppState {
    /// Build state from env: load config, init the chat runtime if a key is present.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Self {
        let config = load_agent_config_from_env();
        info!(
            target: "modgen",
            output_path = %config.output_path.display(),
            module_model = %config.models.module_agent,
            problem_model = %config.models.problem_agent,
            "Generator configured"
        );

        let runtime = ChatRuntime::from_env().map(|rt| {
            info!(target: "modgen", base_url = %rt.base_url, "Agent runtime enabled.");
            Arc::new(rt) as Arc<dyn AgentRuntime>
        });
        if runtime.is_none() {
            warn!(target: "modgen", "Agent runtime disabled (no LLM_API_KEY). /generate will fail.");
        }

        Self::new(config, runtime)
    }

    pub fn new(config: AgentConfig, runtime: Option<Arc<dyn AgentRuntime>>) -> Self {
        Self { config: Arc::new(config), runtime }
    }

    /// Pipeline bound to this state's runtime and config.
    pub fn pipeline(&self) -> Result<ModulePipeline, PipelineError> {
        let runtime = self.runtime.clone().ok_or(PipelineError::RuntimeUnavailable)?;
        Ok(ModulePipeline::new(runtime, Arc::clone(&self.config)))
    }
}
