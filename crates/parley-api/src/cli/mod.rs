//! CLI command definitions for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod budget;
pub mod checkpoint;
pub mod run;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use parley_core::budget::compute_budget;
use parley_core::catalog::select_model;
use parley_core::model::ParameterHost;
use parley_infra::config::{load_agent_config, resolve_data_dir};
use parley_infra::memory_probe::SystemMemoryProbe;
use parley_infra::model::RemoteModel;
use parley_types::config::AgentConfig;
use parley_types::memory::MemoryStats;
use parley_types::model::ModelSpec;

/// A chat agent backed by a recurrent language model.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// Data directory holding parley.toml and checkpoints.
    #[arg(long, global = true, env = "PARLEY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Model server base URL, overriding parley.toml.
    #[arg(long, global = true, env = "PARLEY_MODEL_URL")]
    pub model_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the agent in an interactive console room.
    Run {
        /// Use this model instead of picking one from the memory budget.
        #[arg(long)]
        model: Option<String>,

        /// Name of the console room.
        #[arg(long, default_value = "console")]
        room: String,

        /// The agent's user name.
        #[arg(long, default_value = "parley")]
        agent: String,

        /// Your user name in the console room.
        #[arg(long, default_value = "operator")]
        user: String,
    },

    /// Show memory statistics, the computed budget and the model it selects.
    Budget,

    /// Show the stored checkpoint for a model.
    Checkpoint {
        /// Model name; defaults to the one the memory budget selects.
        model: Option<String>,
    },
}

/// Data directory and configuration after CLI overrides.
pub struct Settings {
    pub data_dir: PathBuf,
    pub config: AgentConfig,
}

impl Settings {
    pub async fn load(cli: &Cli) -> Self {
        let data_dir = cli.data_dir.clone().unwrap_or_else(resolve_data_dir);
        let mut config = load_agent_config(&data_dir).await;
        if let Some(url) = &cli.model_url {
            config.model_url = url.clone();
        }
        Self { data_dir, config }
    }
}

/// Outcome of the startup memory measurement.
pub struct Sizing {
    pub stats: MemoryStats,
    pub budget: u64,
    pub model: ModelSpec,
}

/// Measure memory, compute the budget and pick a model from the catalog.
///
/// Accelerator memory is asked of the model server; when it cannot be
/// reached the host is assumed to have no accelerator.
pub async fn size_model(config: &AgentConfig, override_name: Option<&str>) -> anyhow::Result<Sizing> {
    let server = RemoteModel::new(&config.model_url, "", 0)?;
    let accelerator_free = match server.accelerator_free().await {
        Ok(free) => free,
        Err(err) => {
            tracing::warn!(error = %err, "could not query accelerator memory, assuming none");
            None
        }
    };

    let stats = SystemMemoryProbe::new().snapshot(accelerator_free);
    let budget = compute_budget(&stats);

    let model = match override_name {
        Some(name) => config
            .models
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .unwrap_or_else(|| ModelSpec::new(name, 0)),
        None => select_model(&config.models, budget)
            .cloned()
            .context("model catalog is empty")?,
    };

    Ok(Sizing {
        stats,
        budget,
        model,
    })
}

/// Render a byte count for humans.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
