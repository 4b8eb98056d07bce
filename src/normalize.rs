//! Reconcile detail-agent output with its outline entry into a `ProblemDetail`.
//!
//! Two historical shapes exist (`title`/`description` and
//! `problem_title`/`problem_description`), plus `body` seen in some replies.
//! Each canonical field is resolved through `FIELD_TABLE`: detail keys in
//! order, then outline keys, then the field default. Supporting a new shape
//! means adding keys to the table.

use serde_json::{Map, Value};
use tracing::warn;

use crate::domain::{topics_from_value, Difficulty, ProblemDetail, ProblemOutline};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
  Title,
  Description,
  Difficulty,
  Topics,
  SampleInput,
  SampleOutput,
  ImageUrl,
}

pub struct FieldRule {
  pub field: Field,
  pub detail_keys: &'static [&'static str],
  pub outline_keys: &'static [&'static str],
}

pub const FIELD_TABLE: &[FieldRule] = &[
  FieldRule {
    field: Field::Title,
    detail_keys: &["problem_title", "title"],
    outline_keys: &["problem_title", "title"],
  },
  FieldRule {
    field: Field::Description,
    detail_keys: &["problem_description", "description", "body"],
    outline_keys: &["problem_description", "description"],
  },
  FieldRule {
    field: Field::Difficulty,
    detail_keys: &["difficulty"],
    outline_keys: &["difficulty"],
  },
  FieldRule {
    field: Field::Topics,
    detail_keys: &["topics"],
    outline_keys: &["topics"],
  },
  FieldRule { field: Field::SampleInput, detail_keys: &["sample_input"], outline_keys: &[] },
  FieldRule { field: Field::SampleOutput, detail_keys: &["sample_output"], outline_keys: &[] },
  FieldRule { field: Field::ImageUrl, detail_keys: &["image_url"], outline_keys: &[] },
];

/// Missing, null, blank, the literal "None", or an empty array/object.
fn is_empty_value(v: &Value) -> bool {
  match v {
    Value::Null => true,
    Value::String(s) => {
      let t = s.trim();
      t.is_empty() || t.eq_ignore_ascii_case("none") || t.eq_ignore_ascii_case("null")
    }
    Value::Array(a) => a.is_empty(),
    Value::Object(o) => o.is_empty(),
    _ => false,
  }
}

fn rule(field: Field) -> Option<&'static FieldRule> {
  FIELD_TABLE.iter().find(|r| r.field == field)
}

/// Every value present for `field`, in resolution order: detail keys, then outline keys.
fn candidates<'a>(
  field: Field,
  detail: &'a Map<String, Value>,
  outline: &'a Map<String, Value>,
) -> impl Iterator<Item = &'a Value> + 'a {
  let (detail_keys, outline_keys): (&'static [&'static str], &'static [&'static str]) = match rule(field) {
    Some(r) => (r.detail_keys, r.outline_keys),
    None => (&[], &[]),
  };
  detail_keys
    .iter()
    .filter_map(move |k| detail.get(*k))
    .chain(outline_keys.iter().filter_map(move |k| outline.get(*k)))
}

/// Resolve one field: first non-empty value among detail keys, then outline keys.
pub fn resolve<'a>(
  field: Field,
  detail: &'a Map<String, Value>,
  outline: &'a Map<String, Value>,
) -> Option<&'a Value> {
  candidates(field, detail, outline).find(|v| !is_empty_value(v))
}

/// Topics are judged after conversion, so `" , "` or `[null]` fall through.
fn resolve_topics(detail: &Map<String, Value>, outline: &Map<String, Value>) -> Vec<String> {
  candidates(Field::Topics, detail, outline)
    .map(topics_from_value)
    .find(|t| !t.is_empty())
    .unwrap_or_default()
}

/// Remove every outline key of `field` from a raw outline entry and return
/// the first non-empty one as text (primary key first).
pub fn take_outline_text(entry: &mut Map<String, Value>, field: Field) -> String {
  let keys: &[&str] = match rule(field) {
    Some(r) => r.outline_keys,
    None => &[],
  };
  let mut found = None;
  for key in keys {
    if let Some(v) = entry.remove(*key) {
      if found.is_none() && !is_empty_value(&v) {
        found = value_to_string(&v);
      }
    }
  }
  found.unwrap_or_default()
}

fn value_to_string(v: &Value) -> Option<String> {
  match v {
    Value::String(s) => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    Value::Array(_) | Value::Object(_) => serde_json::to_string(v).ok(),
    Value::Null => None,
  }
}

fn difficulty_from(v: Option<&Value>) -> Difficulty {
  let Some(raw) = v.and_then(value_to_string) else {
    return Difficulty::default();
  };
  Difficulty::parse(&raw).unwrap_or_else(|| {
    warn!(target: "pipeline", difficulty = %raw, "Unrecognised difficulty; using medium");
    Difficulty::default()
  })
}

fn ordinal_title(ordinal: usize) -> String {
  format!("Problem {}", ordinal + 1)
}

/// Normalize a parsed detail mapping against its outline entry.
pub fn normalize_problem(
  detail: &Map<String, Value>,
  outline: &ProblemOutline,
  ordinal: usize,
) -> ProblemDetail {
  let outline = outline.as_map();
  let text = |f: Field| resolve(f, detail, &outline).and_then(value_to_string);

  ProblemDetail {
    problem_title: text(Field::Title)
      .filter(|t| !t.is_empty())
      .unwrap_or_else(|| ordinal_title(ordinal)),
    problem_description: text(Field::Description).unwrap_or_default(),
    difficulty: difficulty_from(resolve(Field::Difficulty, detail, &outline)),
    topics: resolve_topics(detail, &outline),
    sample_input: text(Field::SampleInput),
    sample_output: text(Field::SampleOutput),
    image_url: text(Field::ImageUrl),
  }
}

/// Record built from the outline entry alone.
///
/// `raw` is the unparseable detail reply, used as the description when present;
/// with `None` (no reply at all) the outline description is kept.
pub fn degraded_problem(outline: &ProblemOutline, ordinal: usize, raw: Option<&str>) -> ProblemDetail {
  let mut p = normalize_problem(&Map::new(), outline, ordinal);
  if let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) {
    p.problem_description = raw.to_string();
  }
  p
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn obj(v: Value) -> Map<String, Value> {
    match v {
      Value::Object(m) => m,
      _ => panic!("expected object"),
    }
  }

  #[test]
  fn every_field_has_a_rule() {
    for f in [
      Field::Title,
      Field::Description,
      Field::Difficulty,
      Field::Topics,
      Field::SampleInput,
      Field::SampleOutput,
      Field::ImageUrl,
    ] {
      assert!(FIELD_TABLE.iter().any(|r| r.field == f), "{f:?} missing");
    }
  }

  #[test]
  fn detail_title_and_difficulty_with_outline_description() {
    let detail = obj(json!({ "title": "Scoreboard", "difficulty": "Hard" }));
    let outline = ProblemOutline::new("", "Track the score across questions.");

    let p = normalize_problem(&detail, &outline, 0);
    assert_eq!(p.problem_title, "Scoreboard");
    assert_eq!(p.difficulty, Difficulty::Hard);
    assert_eq!(p.problem_description, "Track the score across questions.");
    assert!(p.topics.is_empty());
  }

  #[test]
  fn empty_detail_and_bare_outline_use_ordinal_title() {
    let p = normalize_problem(&Map::new(), &ProblemOutline::default(), 2);
    assert_eq!(p.problem_title, "Problem 3");
    assert_eq!(p.difficulty, Difficulty::Medium);
    assert!(p.topics.is_empty());
    assert_eq!(p.sample_input, None);
    assert_eq!(p.sample_output, None);
    assert_eq!(p.image_url, None);
  }

  #[test]
  fn primary_key_wins_over_alias() {
    let detail = obj(json!({
      "problem_title": "Primary",
      "title": "Alias",
      "description": "",
      "body": "From body"
    }));
    let p = normalize_problem(&detail, &ProblemOutline::new("Outline", "Outline desc"), 0);
    assert_eq!(p.problem_title, "Primary");
    assert_eq!(p.problem_description, "From body");
  }

  #[test]
  fn comma_topics_split_and_none_samples_dropped() {
    let detail = obj(json!({
      "title": "Sum",
      "topics": "DSA, Arrays ,",
      "sample_input": "None",
      "sample_output": "10",
      "image_url": null
    }));
    let p = normalize_problem(&detail, &ProblemOutline::new("Sum", "Add numbers"), 0);
    assert_eq!(p.topics, vec!["DSA", "Arrays"]);
    assert_eq!(p.sample_input, None);
    assert_eq!(p.sample_output.as_deref(), Some("10"));
    assert_eq!(p.image_url, None);
  }

  #[test]
  fn outline_extras_fill_difficulty_and_topics() {
    let mut outline = ProblemOutline::new("Timer", "Count down.");
    outline.extra.insert("difficulty".into(), json!("easy"));
    outline.extra.insert("topics".into(), json!(["useEffect"]));

    let p = normalize_problem(&Map::new(), &outline, 0);
    assert_eq!(p.difficulty, Difficulty::Easy);
    assert_eq!(p.topics, vec!["useEffect"]);
  }

  #[test]
  fn unusable_detail_topics_fall_back_to_outline() {
    let mut outline = ProblemOutline::new("Timer", "Count down.");
    outline.extra.insert("topics".into(), json!("timers, state"));

    for junk in [json!(" , "), json!([null]), json!(5)] {
      let detail = obj(json!({ "title": "Timer", "topics": junk.clone() }));
      let p = normalize_problem(&detail, &outline, 0);
      assert_eq!(p.topics, vec!["timers", "state"], "detail topics {junk}");
    }
  }

  #[test]
  fn outline_text_prefers_primary_key_and_drops_aliases() {
    let mut entry = obj(json!({ "problem_title": "", "title": "Alias", "description": "Desc", "difficulty": "easy" }));
    assert_eq!(take_outline_text(&mut entry, Field::Title), "Alias");
    assert_eq!(take_outline_text(&mut entry, Field::Description), "Desc");
    assert_eq!(Value::Object(entry), json!({ "difficulty": "easy" }));
  }

  #[test]
  fn unknown_difficulty_becomes_medium() {
    let detail = obj(json!({ "title": "X", "difficulty": "Beginner" }));
    let p = normalize_problem(&detail, &ProblemOutline::default(), 0);
    assert_eq!(p.difficulty, Difficulty::Medium);
  }

  #[test]
  fn numeric_samples_are_stringified() {
    let detail = obj(json!({ "title": "X", "sample_input": 42 }));
    let p = normalize_problem(&detail, &ProblemOutline::default(), 0);
    assert_eq!(p.sample_input.as_deref(), Some("42"));
  }

  #[test]
  fn degraded_keeps_outline_or_uses_raw_text() {
    let outline = ProblemOutline::new("Step1", "...");
    let silent = degraded_problem(&outline, 0, None);
    assert_eq!(
      serde_json::to_value(&silent).unwrap(),
      json!({ "problem_title": "Step1", "problem_description": "...", "difficulty": "medium", "topics": [] })
    );

    let garbled = degraded_problem(&outline, 0, Some("not json at all"));
    assert_eq!(garbled.problem_title, "Step1");
    assert_eq!(garbled.problem_description, "not json at all");
  }
}
