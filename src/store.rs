//! Module file persistence: whole-file overwrite, last write wins, no locking.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, instrument};

use crate::error::PipelineError;

#[derive(Clone, Debug)]
pub struct ModuleStore {
  path: PathBuf,
}

/// Pretty JSON with 4-space indentation.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
  let mut buf = Vec::new();
  let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
  let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
  value.serialize(&mut ser)?;
  buf.push(b'\n');
  Ok(buf)
}

impl ModuleStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  #[cfg(test)]
  pub fn path(&self) -> &std::path::Path {
    &self.path
  }

  /// Replace the file contents with `value` as JSON.
  #[instrument(level = "debug", skip(self, value), fields(path = %self.path.display()))]
  pub async fn save<T: Serialize>(&self, value: &T) -> Result<(), PipelineError> {
    let bytes = to_pretty_json(value).map_err(PipelineError::Encode)?;
    if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(dir).await.map_err(|source| PipelineError::Io {
        path: dir.to_path_buf(),
        source,
      })?;
    }
    tokio::fs::write(&self.path, &bytes).await.map_err(|source| PipelineError::Io {
      path: self.path.clone(),
      source,
    })?;
    info!(target: "pipeline", path = %self.path.display(), bytes = bytes.len(), "Module JSON saved");
    Ok(())
  }
}
