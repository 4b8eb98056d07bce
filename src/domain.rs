//! Domain models: module outline (agent stage one) and the detailed module (stage two).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::normalize::{take_outline_text, Field};

/// Difficulty of a detailed problem. Parsed case-insensitively, stored lowercase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  Easy,
  #[default]
  Medium,
  Hard,
}

impl Difficulty {
  /// Returns None for anything that is not easy/medium/hard (ignoring case and padding).
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "easy" => Some(Self::Easy),
      "medium" => Some(Self::Medium),
      "hard" => Some(Self::Hard),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Easy => "easy",
      Self::Medium => "medium",
      Self::Hard => "hard",
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One stub from the outline agent.
///
/// Read as a raw map: title and description come from the outline keys in
/// `FIELD_TABLE` (primary first, so an entry may carry both shapes). Other
/// keys are kept as-is in `extra` so they survive the round-trip to the
/// detail agent and can serve as fallbacks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct ProblemOutline {
  pub problem_title: String,
  pub problem_description: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for ProblemOutline {
  fn from(mut entry: Map<String, Value>) -> Self {
    let problem_title = take_outline_text(&mut entry, Field::Title);
    let problem_description = take_outline_text(&mut entry, Field::Description);
    Self { problem_title, problem_description, extra: entry }
  }
}

impl ProblemOutline {
  #[cfg(test)]
  pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      problem_title: title.into(),
      problem_description: description.into(),
      extra: Map::new(),
    }
  }

  /// Flat JSON view of the entry (canonical keys plus extras).
  pub fn as_map(&self) -> Map<String, Value> {
    let mut m = self.extra.clone();
    m.insert("problem_title".into(), Value::String(self.problem_title.clone()));
    m.insert("problem_description".into(), Value::String(self.problem_description.clone()));
    m
  }
}

/// Stage-one output: topics plus the ordered problem stubs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleOutline {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, deserialize_with = "deserialize_topics")]
  pub topics: Vec<String>,
  #[serde(default)]
  pub problems: Vec<ProblemOutline>,
}

/// Fully expanded problem, canonical shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetail {
  pub problem_title: String,
  pub problem_description: String,
  #[serde(default)]
  pub difficulty: Difficulty,
  #[serde(default)]
  pub topics: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sample_input: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sample_output: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
}

/// Final module, as persisted and returned by `/generate`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub topics: Vec<String>,
  #[serde(default)]
  pub problems: Vec<ProblemDetail>,
}

/// Split a topics value that may be an array of strings or a single
/// comma-separated string. Blank entries are dropped.
pub fn topics_from_value(v: &Value) -> Vec<String> {
  match v {
    Value::String(s) => s
      .split(',')
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(str::to_string)
      .collect(),
    Value::Array(items) => items
      .iter()
      .filter_map(|item| match item {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
      })
      .filter(|t| !t.is_empty())
      .collect(),
    _ => Vec::new(),
  }
}

fn deserialize_topics<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let v = Value::deserialize(deserializer)?;
  Ok(topics_from_value(&v))
}
