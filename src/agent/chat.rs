//! `AgentRuntime` over an OpenAI-compatible chat.completions API.
//!
//! Sessions live in memory: each holds the system instruction plus the turns
//! so far. One `send_message` is one chat completion; the reply comes back
//! as a single final event. Calls log model names, latencies, and token
//! usage (never contents or the API key).

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, instrument};

use super::{AgentError, AgentEvent, AgentRuntime, AgentSpec, EventStream, Session};

/// Gemini's OpenAI-compatible endpoint; any chat.completions server works.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const APP_NAME: &str = "agents";
const API_KEY_VARS: [&str; 2] = ["LLM_API_KEY", "GOOGLE_API_KEY"];

/// First non-blank key among `API_KEY_VARS`, in order.
fn first_api_key(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
  API_KEY_VARS.iter().filter_map(|name| lookup(*name)).find(|k| !k.trim().is_empty())
}

#[derive(Clone)]
pub struct ChatRuntime {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  sessions: Arc<RwLock<HashMap<String, Vec<ChatMessage>>>>,
}

impl ChatRuntime {
  pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, AgentError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      api_key,
      base_url: base_url.trim_end_matches('/').to_string(),
      sessions: Arc::new(RwLock::new(HashMap::new())),
    })
  }

  /// Construct the runtime if we find LLM_API_KEY (or GOOGLE_API_KEY); otherwise None.
  pub fn from_env() -> Option<Self> {
    let api_key = first_api_key(|name| std::env::var(name).ok())?;
    let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let timeout = std::env::var("LLM_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(DEFAULT_TIMEOUT_SECS);

    match Self::new(api_key, base_url, Duration::from_secs(timeout)) {
      Ok(rt) => Some(rt),
      Err(e) => {
        error!(target: "agent", error = %e, "Failed to build HTTP client for agent runtime");
        None
      }
    }
  }

  #[cfg(test)]
  pub async fn session_count(&self) -> usize {
    self.sessions.read().await.len()
  }

  #[instrument(level = "info", skip(self, messages), fields(model = %model, turns = messages.len()))]
  async fn complete(&self, model: &str, messages: Vec<ChatMessage>, json_output: bool) -> Result<Option<String>, AgentError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages,
      response_format: json_output.then(|| ResponseFormat { r#type: "json_object".into() }),
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "modgen/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_api_error(&body).unwrap_or(body);
      error!(target: "agent", elapsed = ?start.elapsed(), %status, "Chat completion failed");
      return Err(AgentError::Status { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| AgentError::Decode(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(target: "agent", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "LLM usage");
    }
    let text = body.choices.into_iter().next().and_then(|c| c.message.content);
    info!(target: "agent", elapsed = ?start.elapsed(), reply_len = text.as_ref().map_or(0, String::len), "Chat completion received");
    Ok(text)
  }
}

#[async_trait]
impl AgentRuntime for ChatRuntime {
  async fn create_session(&self, agent: &AgentSpec, user_id: &str, session_id: &str) -> Result<Session, AgentError> {
    let history = vec![ChatMessage { role: "system".into(), content: agent.instruction.clone() }];
    self.sessions.write().await.insert(session_id.to_string(), history);
    Ok(Session {
      app_name: APP_NAME.into(),
      user_id: user_id.to_string(),
      session_id: session_id.to_string(),
      agent: agent.clone(),
    })
  }

  #[instrument(level = "info", skip(self, session, text), fields(agent = %session.agent.name, session_id = %session.session_id, text_len = text.len()))]
  async fn send_message(&self, session: &Session, text: &str) -> Result<EventStream, AgentError> {
    let messages = {
      let mut sessions = self.sessions.write().await;
      let history = sessions
        .get_mut(&session.session_id)
        .ok_or_else(|| AgentError::UnknownSession(session.session_id.clone()))?;
      history.push(ChatMessage { role: "user".into(), content: text.to_string() });
      history.clone()
    };

    let reply = self.complete(&session.agent.model, messages, session.agent.json_output).await?;

    if let Some(content) = &reply {
      if let Some(history) = self.sessions.write().await.get_mut(&session.session_id) {
        history.push(ChatMessage { role: "assistant".into(), content: content.clone() });
      }
    }

    let (tx, rx) = mpsc::channel(1);
    // Capacity 1 holds the single final event; the receiver drains it later.
    let _ = tx.send(AgentEvent::final_response(session.agent.name.clone(), reply)).await;
    Ok(rx)
  }

  async fn end_session(&self, session: &Session) {
    self.sessions.write().await.remove(&session.session_id);
  }
}

// --- Chat DTOs ---

#[derive(Clone, Debug, Serialize)]
struct ChatMessage { role: String, content: String }

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessage>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an API error body.
/// Gemini's compat endpoint wraps errors in a one-element array.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  if let Ok(w) = serde_json::from_str::<EWrap>(body) {
    return Some(w.error.message);
  }
  serde_json::from_str::<Vec<EWrap>>(body)
    .ok()?
    .into_iter()
    .next()
    .map(|w| w.error.message)
}
