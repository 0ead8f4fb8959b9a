//! CLI interface for the planner.
//!
//! Every subcommand is non-interactive: a snapshot file in, tables or JSON
//! out. Planning runs can be saved and inspected later.
//!
//! - `epic-planner plan <snapshot>` simulates the backlog and prints the schedule.
//! - `epic-planner check <snapshot>` compares the current sprint's plan with actuals.
//! - `epic-planner runs list|show` browses saved runs.

mod check;
mod format;
mod plan;
mod runs;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use crate::calendar::{CapacityAdjustment, SprintCalendar, adjust_capacities};
use crate::config::Config;
use crate::engine::{EngineResult, SimulationSettings, simulate};
use crate::model::CapacityTable;
use crate::snapshot::{LoadedSnapshot, Snapshot};
use crate::storage::Storage;

use runs::RunsCommand;

/// Epic planner: sprint-by-sprint capacity allocation.
#[derive(Debug, Parser)]
#[command(name = "epic-planner", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Config file (defaults to `~/.epic-planner/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error). `EPIC_PLANNER_LOG` overrides it.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    command: Command,
}

const WORKFLOW_HELP: &str = r"Workflow: planning a quarter
  1. epic-planner plan snapshot.json
     → prints the schedule, sprint utilization and unused capacity
  2. epic-planner plan snapshot.json --save
     → also stores the run and prints its ID (e.g. a3b0fc12)
  3. epic-planner runs show a3b

Checking the current sprint:
  epic-planner check snapshot.json";

#[derive(Debug, Subcommand)]
enum Command {
    /// Simulate the backlog sprint by sprint and print the schedule.
    Plan {
        /// Snapshot JSON file.
        snapshot: PathBuf,

        /// Schedule only epics in development.
        #[arg(long)]
        only_development: bool,

        /// Store the run under the storage root.
        #[arg(long)]
        save: bool,

        /// Print the full report as JSON instead of tables.
        #[arg(long)]
        json: bool,
    },

    /// Compare the current sprint's planned hours and epic progress with capacity.
    Check {
        /// Snapshot JSON file, including planned hours and epic summaries.
        snapshot: PathBuf,

        /// Print JSON instead of tables.
        #[arg(long)]
        json: bool,
    },

    /// Browse saved runs.
    Runs {
        #[command(subcommand)]
        command: RunsCommand,
    },
}

/// Run the CLI, returning an error message on failure.
pub fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Plan {
            snapshot,
            only_development,
            save,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;
            plan::cmd_plan(&config, &snapshot, only_development, save, json)
        }
        Command::Check { snapshot, json } => {
            let config = load_config(cli.config.as_deref())?;
            check::cmd_check(&config, &snapshot, json)
        }
        Command::Runs { command } => {
            let storage = open_storage(cli.config.as_deref())?;
            match command {
                RunsCommand::List => runs::cmd_list(&storage),
                RunsCommand::Show { run, json } => runs::cmd_show(&storage, &run, json),
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, String> {
    Config::load(path).map_err(|e| e.to_string())
}

/// Opens run storage at the configured root, or the default one.
///
/// Listing runs doesn't need a planning config, so a missing config file
/// falls back to the default root.
fn open_storage(config_path: Option<&Path>) -> Result<Storage, String> {
    let configured = Config::load(config_path).ok().and_then(|c| c.storage_root);
    let root = configured
        .or_else(Storage::default_root)
        .ok_or("could not determine home directory")?;
    Storage::new(&root).map_err(|e| format!("failed to open storage at {}: {e}", root.display()))
}

/// A snapshot simulated under the configured calendar.
struct Simulated {
    loaded: LoadedSnapshot,
    capacity: CapacityTable,
    result: EngineResult,
}

/// Loads a snapshot, builds the capacity table, and runs the engine.
fn simulate_snapshot(
    config: &Config,
    path: &Path,
    only_development_epics: bool,
) -> Result<Simulated, String> {
    let loaded = Snapshot::load(path).map_err(|e| format!("failed to load snapshot: {e}"))?;
    let snapshot = &loaded.snapshot;
    let base = snapshot
        .base_capacities()
        .map_err(|e| format!("invalid snapshot: {e}"))?;
    let backlog = snapshot
        .backlog(config.initial_sprint_start)
        .map_err(|e| format!("invalid snapshot: {e}"))?;
    if backlog.is_empty() {
        warn!(path = %path.display(), "snapshot has no epics");
    }
    debug!(
        epics = backlog.len(),
        fingerprint = %loaded.fingerprint,
        "resolved backlog"
    );

    let calendar = SprintCalendar::new(config.initial_sprint_start, config.sprint_days)
        .map_err(|e| format!("invalid sprint calendar: {e}"))?;
    let capacity = adjust_capacities(
        &base,
        &snapshot.absences(),
        &CapacityAdjustment {
            calendar,
            sprint_capacity_days: config.sprint_capacity_days,
            sprint_count: config.max_sprint_count,
            holidays: &config.holidays,
        },
    )
    .map_err(|e| format!("failed to adjust capacities: {e}"))?;

    let settings = SimulationSettings {
        calendar,
        max_sprint_count: config.max_sprint_count,
        only_development_epics,
        dependency_policy: config.dependency_policy(only_development_epics),
    };
    let result = simulate(backlog, capacity.clone(), settings)
        .map_err(|e| format!("failed to simulate: {e}"))?;

    Ok(Simulated {
        loaded,
        capacity,
        result,
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("failed to serialize output: {e}"))?;
    println!("{json}");
    Ok(())
}
