//! Pull one JSON object out of a model reply.
//!
//! Replies often arrive wrapped in ```json fences or with a sentence of prose
//! around them. Extraction is two-stage: strip the fences, then parse the span
//! between the first `{` and the last `}`. This is only correct when the reply
//! holds a single top-level object; two sibling objects produce a span that
//! fails to parse. Nothing is repaired.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::util::trunc_for_log;

#[derive(Debug, Error)]
pub enum ExtractError {
  #[error("no JSON object found in response")]
  NoJsonObject,
  #[error("malformed JSON in response: {0}")]
  Malformed(#[source] serde_json::Error),
}

fn fence_re() -> &'static Regex {
  static FENCE: OnceLock<Regex> = OnceLock::new();
  FENCE.get_or_init(|| Regex::new(r"(?i)```(?:json)?").expect("static fence pattern"))
}

/// Remove code-fence markers and trim whitespace/backticks at both ends.
pub fn strip_fences(raw: &str) -> String {
  fence_re()
    .replace_all(raw, "")
    .trim_matches(|c: char| c == '`' || c.is_whitespace())
    .to_string()
}

/// Span from the first `{` to the last `}` inclusive, if both exist.
/// A `}` before the `{` gives an empty span, which then fails to parse.
pub fn object_span(text: &str) -> Option<&str> {
  let start = text.find('{')?;
  let end = text.rfind('}')?;
  Some(text.get(start..=end).unwrap_or(""))
}

/// Parse the single JSON object embedded in `raw`.
pub fn extract_json_object(raw: &str) -> Result<Map<String, Value>, ExtractError> {
  let clean = strip_fences(raw);
  let span = object_span(&clean).ok_or(ExtractError::NoJsonObject)?;
  serde_json::from_str::<Map<String, Value>>(span).map_err(|e| {
    warn!(target: "pipeline", error = %e, span = %trunc_for_log(span, 200), "JSON decoding failed");
    ExtractError::Malformed(e)
  })
}
