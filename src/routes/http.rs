//! HTTP endpoint handlers. Thin wrappers that forward to the pipeline.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, response::IntoResponse, Json};
use tracing::{info, instrument};

use crate::error::PipelineError;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
    Json(HealthOut { status: "ok" })
}

/// Run the pipeline with the request's description (or the default).
/// Only an empty body means "no description"; a body that is not a
/// `GenerateIn` object is rejected before any agent is called.
#[instrument(level = "info", skip(state, body), fields(body_len = body.len()))]
pub async fn http_generate(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<GenerateOut>, PipelineError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateIn::default()
    } else {
        serde_json::from_slice::<GenerateIn>(&body).map_err(PipelineError::InvalidRequest)?
    };
    let module = state.pipeline()?.run(request.description.as_deref()).await?;
    info!(target: "modgen", problems = module.problems.len(), topics = module.topics.len(), "HTTP module generated");
    Ok(Json(GenerateOut { module }))
}
