//! Agent runtime boundary.
//!
//! The pipeline needs three capabilities from whatever runs the model:
//! open an isolated session for an agent, send it one text message and get
//! back an asynchronous stream of events, and find the final response in
//! that stream. `AgentRuntime` is that seam; `chat::ChatRuntime` implements
//! it over an OpenAI-compatible chat completions API.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

pub mod chat;
#[cfg(test)]
pub mod scripted;

/// Static description of one agent: which model, which instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentSpec {
  pub name: String,
  pub model: String,
  pub instruction: String,
  /// Ask the model for a strict JSON object reply.
  pub json_output: bool,
}

/// Handle to a conversation opened with `create_session`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
  #[allow(dead_code)]
  pub app_name: String,
  #[allow(dead_code)]
  pub user_id: String,
  pub session_id: String,
  pub agent: AgentSpec,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
  /// Intermediate output (streamed chunk, tool call, thought). `ChatRuntime`
  /// answers in one shot and never emits it.
  #[cfg_attr(not(test), allow(dead_code))]
  Partial,
  /// Terminal event of a turn.
  Final,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentEvent {
  pub author: String,
  pub kind: EventKind,
  pub text: Option<String>,
}

impl AgentEvent {
  #[cfg(test)]
  pub fn partial(author: impl Into<String>, text: impl Into<String>) -> Self {
    Self { author: author.into(), kind: EventKind::Partial, text: Some(text.into()) }
  }

  pub fn final_response(author: impl Into<String>, text: Option<String>) -> Self {
    Self { author: author.into(), kind: EventKind::Final, text }
  }

  pub fn is_final_response(&self) -> bool {
    self.kind == EventKind::Final
  }
}

pub type EventStream = mpsc::Receiver<AgentEvent>;

#[derive(Debug, Error)]
pub enum AgentError {
  #[error("agent request failed: {0}")]
  Http(#[from] reqwest::Error),
  #[error("agent HTTP {status}: {message}")]
  Status { status: u16, message: String },
  #[error("could not decode agent reply: {0}")]
  Decode(String),
  #[error("unknown session '{0}'")]
  UnknownSession(String),
}

#[async_trait]
pub trait AgentRuntime: Send + Sync {
  async fn create_session(
    &self,
    agent: &AgentSpec,
    user_id: &str,
    session_id: &str,
  ) -> Result<Session, AgentError>;

  async fn send_message(&self, session: &Session, text: &str) -> Result<EventStream, AgentError>;

  /// Release whatever the runtime keeps for this session.
  async fn end_session(&self, _session: &Session) {}
}

/// Drain `events` until the first final event that carries non-empty text.
/// Returns None if the stream closes without one.
pub async fn receive_final_text(mut events: EventStream) -> Option<String> {
  while let Some(ev) = events.recv().await {
    if !ev.is_final_response() {
      debug!(target: "agent", author = %ev.author, "Skipping non-final event");
      continue;
    }
    if let Some(text) = ev.text.filter(|t| !t.trim().is_empty()) {
      return Some(text);
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn stream_of(events: Vec<AgentEvent>) -> EventStream {
    let (tx, rx) = mpsc::channel(events.len().max(1));
    for ev in events {
      tx.send(ev).await.unwrap();
    }
    rx
  }

  #[tokio::test]
  async fn final_text_skips_partials() {
    let rx = stream_of(vec![
      AgentEvent::partial("a", "thinking"),
      AgentEvent::final_response("a", Some("done".into())),
      AgentEvent::final_response("a", Some("late".into())),
    ])
    .await;
    assert_eq!(receive_final_text(rx).await.as_deref(), Some("done"));
  }

  #[tokio::test]
  async fn empty_final_events_mean_no_response() {
    let rx = stream_of(vec![
      AgentEvent::partial("a", "chunk"),
      AgentEvent::final_response("a", None),
      AgentEvent::final_response("a", Some("   ".into())),
    ])
    .await;
    assert_eq!(receive_final_text(rx).await, None);
  }

  #[tokio::test]
  async fn closed_stream_means_no_response() {
    let rx = stream_of(vec![]).await;
    assert_eq!(receive_final_text(rx).await, None);
  }
}
