//! Pipeline error type and its HTTP mapping: 422 for an unreadable request
//! body, otherwise an undifferentiated 500, both with `{"detail"}`.

use std::path::PathBuf;

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::agent::AgentError;
use crate::protocol::ErrorOut;
use crate::sanitize::ExtractError;

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("invalid request body: {0}")]
  InvalidRequest(#[source] serde_json::Error),
  #[error("agent runtime unavailable: set LLM_API_KEY to enable generation")]
  RuntimeUnavailable,
  #[error("{agent} failed: {source}")]
  Agent {
    agent: String,
    #[source]
    source: AgentError,
  },
  #[error("no final response event from {agent}")]
  NoFinalResponse { agent: String },
  #[error(transparent)]
  OutlineParse(#[from] ExtractError),
  #[error("outline JSON has an unexpected shape: {0}")]
  OutlineShape(#[source] serde_json::Error),
  #[error("could not write {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("could not encode module JSON: {0}")]
  Encode(#[source] serde_json::Error),
}

impl IntoResponse for PipelineError {
  fn into_response(self) -> Response {
    let status = match self {
      PipelineError::InvalidRequest(_) => {
        warn!(target: "modgen", error = %self, "Rejected /generate request");
        StatusCode::UNPROCESSABLE_ENTITY
      }
      _ => {
        error!(target: "modgen", error = %self, "Module generation failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    (status, Json(ErrorOut { detail: self.to_string() })).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn messages_carry_the_cause() {
    let e = PipelineError::from(ExtractError::NoJsonObject);
    assert_eq!(e.to_string(), "no JSON object found in response");

    let e = PipelineError::NoFinalResponse { agent: "module_structure_generator".into() };
    assert_eq!(e.to_string(), "no final response event from module_structure_generator");
  }

  #[test]
  fn pipeline_errors_are_500s() {
    let res = PipelineError::RuntimeUnavailable.into_response();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn bad_request_body_is_a_422() {
    let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let res = PipelineError::InvalidRequest(parse).into_response();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
  }
}
