//! Check command: plan-vs-actual for the current sprint.

use std::path::Path;

use crate::config::Config;
use crate::report::checker::CheckReport;

use super::format::{format_comparison, format_epic_checks};
use super::{print_json, simulate_snapshot};

pub(super) fn cmd_check(config: &Config, snapshot: &Path, json: bool) -> Result<(), String> {
    let simulated = simulate_snapshot(config, snapshot, config.only_development_epics)?;
    let source = &simulated.loaded.snapshot;
    let report = CheckReport::build(
        &simulated.result.epics,
        &simulated.capacity,
        &source.planned_hours(),
        &source.epic_summaries,
    );

    if json {
        return print_json(&report);
    }

    println!("Sprint {} capacity vs plan", config.initial_sprint_number);
    println!("{}", format_comparison(&report.comparison));
    if report.epics.is_empty() {
        println!("No epic summaries in snapshot");
    } else {
        println!("Epic check");
        print!("{}", format_epic_checks(&report.epics));
    }
    Ok(())
}
