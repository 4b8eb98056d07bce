//! Public HTTP request/response structs (serde ready).

use serde::{Deserialize, Serialize};

use crate::domain::Module;

#[derive(Debug, Default, Deserialize)]
pub struct GenerateIn {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateOut {
    pub module: Module,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOut {
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub status: &'static str,
}
