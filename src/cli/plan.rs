//! Plan command: simulate a snapshot and print the schedule.

use std::path::Path;

use jiff::Timestamp;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::model::{EpicOutcome, RunSettings, RunSummary, SavedRun};
use crate::report::PlanReport;
use crate::storage::Storage;

use super::format::{
    format_overbooking, format_schedule, format_sprint_summaries, format_underutilization,
};
use super::{Simulated, print_json, simulate_snapshot};

pub(super) fn cmd_plan(
    config: &Config,
    snapshot: &Path,
    only_development: bool,
    save: bool,
    json: bool,
) -> Result<(), String> {
    let only_development = only_development || config.only_development_epics;
    let simulated = simulate_snapshot(config, snapshot, only_development)?;
    let report = PlanReport::build(
        &simulated.result,
        &simulated.capacity,
        config.initial_sprint_number,
    );

    if save {
        let id = save_run(config, &simulated, only_development)?;
        eprintln!("Saved run {}", &id.to_string()[..8]);
    }

    if json {
        return print_json(&report);
    }

    println!("Simulated {} sprint(s)", report.sprints_simulated);
    println!("{}", format_schedule(&report.schedule));
    println!("{}", format_sprint_summaries(&report.sprint_summaries));
    if !report.underutilization.is_empty() {
        println!("Unused capacity");
        println!("{}", format_underutilization(&report.underutilization));
    }
    if report.overbooking.iter().any(|r| r.overbooked) {
        println!("Over-booked resources");
        print!("{}", format_overbooking(&report.overbooking));
    }
    Ok(())
}

fn save_run(
    config: &Config,
    simulated: &Simulated,
    only_development: bool,
) -> Result<Uuid, String> {
    let root = config
        .storage_root
        .clone()
        .or_else(Storage::default_root)
        .ok_or("could not determine home directory")?;
    let storage = Storage::new(&root)
        .map_err(|e| format!("failed to open storage at {}: {e}", root.display()))?;

    let result = &simulated.result;
    let run = SavedRun {
        summary: RunSummary {
            id: Uuid::new_v4(),
            created_at: Timestamp::now(),
            fingerprint: simulated.loaded.fingerprint.clone(),
            settings: RunSettings {
                initial_sprint_start: config.initial_sprint_start,
                sprint_days: config.sprint_days,
                max_sprint_count: config.max_sprint_count,
                initial_sprint_number: config.initial_sprint_number,
                only_development_epics: only_development,
            },
        },
        allocations: result.allocations.clone(),
        outcomes: result.epics.iter().map(EpicOutcome::from).collect(),
        underutilization: result.underutilization.clone(),
    };

    storage
        .create_run(&run)
        .map_err(|e| format!("failed to save run: {e}"))?;
    info!(run = %run.summary.id, root = %root.display(), "saved run");
    Ok(run.summary.id)
}
