//! Saved run commands: list, show.

use clap::Subcommand;

use crate::storage::Storage;

use super::format::{format_outcomes, format_run_line};
use super::print_json;

#[derive(Debug, Subcommand)]
pub enum RunsCommand {
    /// List saved runs, oldest first.
    List,

    /// Show a saved run's epic outcomes.
    Show {
        /// Run ID: full UUID or unambiguous prefix (e.g. `a3b`).
        run: String,

        /// Print the whole run, ledger included, as JSON.
        #[arg(long)]
        json: bool,
    },
}

pub(super) fn cmd_list(storage: &Storage) -> Result<(), String> {
    let runs = storage
        .list_runs()
        .map_err(|e| format!("failed to list runs: {e}"))?;

    if runs.is_empty() {
        println!("No runs");
        return Ok(());
    }

    for run in &runs {
        println!("{}", format_run_line(run));
    }
    Ok(())
}

pub(super) fn cmd_show(storage: &Storage, reference: &str, json: bool) -> Result<(), String> {
    let id = storage.resolve_run(reference).map_err(|e| e.to_string())?;
    let run = storage
        .load_run(id)
        .map_err(|e| format!("failed to load run: {e}"))?;

    if json {
        return print_json(&run);
    }

    println!("{}", format_run_line(&run.summary));
    println!(
        "{} allocation(s), {} unused capacity entr{}",
        run.allocations.len(),
        run.underutilization.len(),
        if run.underutilization.len() == 1 { "y" } else { "ies" }
    );
    println!();
    print!("{}", format_outcomes(&run.outcomes));
    Ok(())
}
