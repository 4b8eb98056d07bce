//! Modgen · Learning-module generator
//!
//! - Outline agent: free-text description -> ordered problem stubs
//! - Detail agent: one stub -> one fully specified problem
//! - Axum HTTP API (`POST /generate`, `GET /health`) or one-shot CLI run
//!
//! Important env variables (a `.env` file is honored):
//!   PORT                 : u16 (default 8000)
//!   LLM_API_KEY          : enables the agent runtime (GOOGLE_API_KEY also accepted)
//!   LLM_BASE_URL         : OpenAI-compatible base URL (default: Gemini's compat endpoint)
//!   LLM_TIMEOUT_SECS     : per-request timeout for agent calls (default 120)
//!   MODULE_AGENT_MODEL   : default "gemini-2.5-flash"
//!   PROBLEM_AGENT_MODEL  : default "gemini-2.5-flash"
//!   MODULE_OUTPUT_PATH   : default "quiz_module.json"
//!   AGENT_CONFIG_PATH    : path to TOML config (prompts, default description, output path)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod agent;
mod config;
mod domain;
mod error;
mod normalize;
mod pipeline;
mod protocol;
mod routes;
mod sanitize;
mod state;
mod store;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

const DEFAULT_PORT: u16 = 8000;

#[derive(Parser)]
#[command(author, version, about = "Generate step-by-step learning modules with LLM agents")]
struct Args {
  #[command(subcommand)]
  command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
  /// Serve the HTTP API (default)
  Serve {
    /// Port to listen on (falls back to PORT, then 8000)
    #[arg(short, long)]
    port: Option<u16>,
  },
  /// Run the pipeline once and print the module JSON
  Generate {
    /// Module description (defaults to the configured one)
    #[arg(short, long)]
    description: Option<String>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let _ = dotenvy::dotenv();
  telemetry::init_tracing();

  let args = Args::parse();
  let state = Arc::new(AppState::from_env());

  match args.command.unwrap_or(CliCommand::Serve { port: None }) {
    CliCommand::Serve { port } => serve(state, port).await,
    CliCommand::Generate { description } => {
      let module = state.pipeline()?.run(description.as_deref()).await?;
      let out = store::to_pretty_json(&module).context("encoding module")?;
      println!("{}", String::from_utf8_lossy(&out).trim_end());
      info!(target: "modgen", path = %state.config.output_path.display(), "Module written");
      Ok(())
    }
  }
}

async fn serve(state: Arc<AppState>, port: Option<u16>) -> anyhow::Result<()> {
  let app = build_router(state);

  let port = port
    .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()))
    .unwrap_or(DEFAULT_PORT);
  let addr = SocketAddr::from(([0, 0, 0, 0], port));

  let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
  info!(target: "modgen", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "modgen", error = %e, "Failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "modgen", "Shutdown signal received");
}
