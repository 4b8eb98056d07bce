//! In-memory runtime with canned replies, for pipeline and route tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use super::{AgentError, AgentEvent, AgentRuntime, AgentSpec, EventStream, Session};

#[derive(Clone, Debug)]
pub enum Reply {
  /// Final event with this text, preceded by one partial event.
  Text(String),
  /// Stream closes without a final event.
  Silent,
  /// `send_message` itself fails.
  Fail,
  /// Outline reply whose single topic is the message that was sent.
  EchoOutline,
}

#[derive(Default)]
pub struct ScriptedRuntime {
  queues: Mutex<HashMap<String, VecDeque<Reply>>>,
  fallback: Mutex<HashMap<String, Reply>>,
  /// (agent name, message) in arrival order.
  pub received: Mutex<Vec<(String, String)>>,
  pub ended: Mutex<Vec<String>>,
}

impl ScriptedRuntime {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn script(self, agent: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
    self.queues.lock().unwrap().entry(agent.to_string()).or_default().extend(replies);
    self
  }

  /// Reply used once the agent's queue is empty (default: `Silent`).
  pub fn otherwise(self, agent: &str, reply: Reply) -> Self {
    self.fallback.lock().unwrap().insert(agent.to_string(), reply);
    self
  }

  pub fn messages_for(&self, agent: &str) -> Vec<String> {
    self.received
      .lock()
      .unwrap()
      .iter()
      .filter(|(a, _)| a == agent)
      .map(|(_, m)| m.clone())
      .collect()
  }

  fn next_reply(&self, agent: &str) -> Reply {
    let queued = self.queues.lock().unwrap().get_mut(agent).and_then(VecDeque::pop_front);
    queued
      .or_else(|| self.fallback.lock().unwrap().get(agent).cloned())
      .unwrap_or(Reply::Silent)
  }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
  async fn create_session(&self, agent: &AgentSpec, user_id: &str, session_id: &str) -> Result<Session, AgentError> {
    Ok(Session {
      app_name: "agents".into(),
      user_id: user_id.into(),
      session_id: session_id.into(),
      agent: agent.clone(),
    })
  }

  async fn send_message(&self, session: &Session, text: &str) -> Result<EventStream, AgentError> {
    let name = session.agent.name.clone();
    self.received.lock().unwrap().push((name.clone(), text.to_string()));
    let reply = self.next_reply(&name);
    // Let concurrent callers interleave here.
    tokio::task::yield_now().await;

    let (tx, rx) = mpsc::channel(4);
    match reply {
      Reply::Fail => return Err(AgentError::Status { status: 503, message: "scripted failure".into() }),
      Reply::Silent => {
        let _ = tx.send(AgentEvent::partial(&name, "...")).await;
      }
      Reply::Text(t) => {
        let _ = tx.send(AgentEvent::partial(&name, "drafting")).await;
        let _ = tx.send(AgentEvent::final_response(&name, Some(t))).await;
      }
      Reply::EchoOutline => {
        let body = json!({
          "topics": [text],
          "problems": [{ "problem_title": "Only", "problem_description": text }]
        });
        let _ = tx.send(AgentEvent::final_response(&name, Some(body.to_string()))).await;
      }
    }
    Ok(rx)
  }

  async fn end_session(&self, session: &Session) {
    self.ended.lock().unwrap().push(session.session_id.clone());
  }
}
