//! Reports over a finished run.
//!
//! Everything here is a pure reader of an [`EngineResult`] and the capacity
//! table it ran against. Figures are rounded to two decimals and sprints are
//! shown as `index + initial sprint number`.

pub mod checker;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use jiff::civil::Date;
use serde::Serialize;

use crate::engine::EngineResult;
use crate::model::{
    CapacityTable, Epic, EpicState, Priority, UnderutilizationReason, name_key, round2,
};

/// Ordering key pulled from epic names like `2024-12 Foo` or `2024_7 Bar`.
///
/// Names with only a year sort as `(year, 0)`; names without one sort last.
pub fn epic_key(name: &str) -> (u32, u32) {
    let bytes = name.as_bytes();
    let year_at = |i: usize| -> Option<u32> {
        if !bytes.get(i..i + 4)?.iter().all(u8::is_ascii_digit) {
            return None;
        }
        name[i..i + 4].parse().ok()
    };

    for i in 0..bytes.len() {
        let Some(year) = year_at(i) else { continue };
        let mut j = i + 4;
        while j < bytes.len() && matches!(bytes[j], b'-' | b'_' | b' ') {
            j += 1;
        }
        if j == i + 4 {
            continue;
        }
        let digits = bytes[j..]
            .iter()
            .take(3)
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits > 0 {
            if let Ok(num) = name[j..j + digits].parse() {
                return (year, num);
            }
        }
    }
    (0..bytes.len())
        .find_map(year_at)
        .map_or((9999, 9999), |year| (year, 0))
}

/// Start date first (unscheduled last), then the name key.
fn schedule_order(a: &Epic, b: &Epic) -> Ordering {
    let start = |e: &Epic| e.start_date.unwrap_or(Date::MAX);
    start(a)
        .cmp(&start(b))
        .then_with(|| epic_key(&a.name).cmp(&epic_key(&b.name)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleRow {
    pub epic: String,
    pub state: EpicState,
    /// Tracker state as written, lower-cased.
    pub state_text: String,
    pub priority: Priority,
    pub group: Option<String>,
    pub charge: f64,
    pub allocated: f64,
    pub remaining: f64,
    pub start: Option<Date>,
    pub end: Option<Date>,
}

/// Hours per (epic, sprint, resource).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceAllocationRow {
    pub epic: String,
    pub sprint: usize,
    pub resource: String,
    pub hours: f64,
}

/// Hours per (epic, sprint) across all resources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintAllocationRow {
    pub epic: String,
    pub sprint: usize,
    pub sprint_start: Date,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceUtilization {
    pub resource: String,
    pub allocated: f64,
    pub capacity: f64,
    pub utilization_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintSummary {
    pub sprint: usize,
    pub start: Date,
    pub end: Date,
    pub resources: Vec<ResourceUtilization>,
}

/// All three capacity buckets of a resource in one sprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityRow {
    pub sprint: usize,
    pub resource: String,
    pub development: f64,
    pub maintenance: f64,
    pub analysis: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverbookingRow {
    pub resource: String,
    /// Sum of every epic's wish on this resource, in percent.
    pub total_percent: f64,
    pub overbooked: bool,
    /// `epic:NN%` for each wishing epic.
    pub details: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationRow {
    pub epic: String,
    pub charge: f64,
    pub allocated: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnderutilizationRow {
    pub sprint: usize,
    pub resource: String,
    pub unused_hours: f64,
    pub reason: UnderutilizationReason,
}

/// Every table of a planning report.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub sprints_simulated: usize,
    pub schedule: Vec<ScheduleRow>,
    pub allocations_by_resource: Vec<ResourceAllocationRow>,
    pub allocations_by_sprint: Vec<SprintAllocationRow>,
    pub verification: Vec<VerificationRow>,
    pub sprint_summaries: Vec<SprintSummary>,
    pub capacities: Vec<CapacityRow>,
    pub underutilization: Vec<UnderutilizationRow>,
    pub overbooking: Vec<OverbookingRow>,
}

impl PlanReport {
    pub fn build(
        result: &EngineResult,
        capacity: &CapacityTable,
        initial_sprint_number: usize,
    ) -> Self {
        let sprints = reported_sprints(result);
        Self {
            sprints_simulated: result.sprints_simulated,
            schedule: schedule(&result.epics),
            allocations_by_resource: allocations_by_resource(result, initial_sprint_number),
            allocations_by_sprint: allocations_by_sprint(result, initial_sprint_number),
            verification: verification(&result.epics),
            sprint_summaries: sprint_summaries(result, capacity, &sprints, initial_sprint_number),
            capacities: capacities(capacity, &sprints, initial_sprint_number),
            underutilization: underutilization(result, initial_sprint_number),
            overbooking: overbooking(&result.epics),
        }
    }
}

/// Final state of every epic, in schedule order.
pub fn schedule(epics: &[Epic]) -> Vec<ScheduleRow> {
    let mut sorted: Vec<&Epic> = epics.iter().collect();
    sorted.sort_by(|a, b| schedule_order(a, b));
    sorted
        .into_iter()
        .map(|e| ScheduleRow {
            epic: e.name.clone(),
            state: e.state,
            state_text: e.state_text.clone(),
            priority: e.priority,
            group: e.group.clone(),
            charge: round2(e.charge),
            allocated: round2(e.allocated_hours()),
            remaining: round2(e.remaining.max(0.0)),
            start: e.start_date,
            end: e.end_date,
        })
        .collect()
}

pub fn allocations_by_resource(result: &EngineResult, offset: usize) -> Vec<ResourceAllocationRow> {
    let mut totals: BTreeMap<(usize, (u32, u32), String, String), (String, String, f64)> =
        BTreeMap::new();
    for a in &result.allocations {
        let key = (a.sprint, epic_key(&a.epic), a.epic.clone(), name_key(&a.resource));
        totals
            .entry(key)
            .or_insert_with(|| (a.epic.clone(), a.resource.clone(), 0.0))
            .2 += a.hours;
    }
    totals
        .into_iter()
        .map(|((sprint, ..), (epic, resource, hours))| ResourceAllocationRow {
            epic,
            sprint: sprint + offset,
            resource,
            hours: round2(hours),
        })
        .collect()
}

pub fn allocations_by_sprint(result: &EngineResult, offset: usize) -> Vec<SprintAllocationRow> {
    let mut totals: BTreeMap<(usize, (u32, u32), String), (Date, f64)> = BTreeMap::new();
    for a in &result.allocations {
        totals
            .entry((a.sprint, epic_key(&a.epic), a.epic.clone()))
            .or_insert((a.sprint_start, 0.0))
            .1 += a.hours;
    }
    totals
        .into_iter()
        .map(|((sprint, _, epic), (sprint_start, hours))| SprintAllocationRow {
            epic,
            sprint: sprint + offset,
            sprint_start,
            hours: round2(hours),
        })
        .collect()
}

/// Charge against what the ledger actually handed out.
pub fn verification(epics: &[Epic]) -> Vec<VerificationRow> {
    let mut sorted: Vec<&Epic> = epics.iter().collect();
    sorted.sort_by(|a, b| schedule_order(a, b));
    sorted
        .into_iter()
        .map(|e| {
            let allocated = round2(e.allocated_hours());
            VerificationRow {
                epic: e.name.clone(),
                charge: e.charge,
                allocated,
                delta: round2(e.charge - allocated),
            }
        })
        .collect()
}

/// Sprints that received any allocation, or just the first one.
fn reported_sprints(result: &EngineResult) -> Vec<usize> {
    let mut sprints: Vec<usize> = result.allocations.iter().map(|a| a.sprint).collect();
    sprints.sort_unstable();
    sprints.dedup();
    if sprints.is_empty() {
        sprints.push(0);
    }
    sprints
}

fn sprint_summaries(
    result: &EngineResult,
    capacity: &CapacityTable,
    sprints: &[usize],
    offset: usize,
) -> Vec<SprintSummary> {
    let resources = capacity.resources();
    sprints
        .iter()
        .filter_map(|&index| {
            let window = result.windows.get(index)?;
            let resources = resources
                .iter()
                .map(|resource| {
                    let allocated = round2(
                        result
                            .allocations
                            .iter()
                            .filter(|a| a.sprint == index && a.resource == *resource)
                            .map(|a| a.hours)
                            .sum(),
                    );
                    let development = capacity
                        .get(index, resource)
                        .map_or(0.0, |c| c.development);
                    let utilization_percent = if development > 0.0 {
                        round2(allocated / development * 100.0)
                    } else {
                        0.0
                    };
                    ResourceUtilization {
                        resource: resource.clone(),
                        allocated,
                        capacity: development,
                        utilization_percent,
                    }
                })
                .collect();
            Some(SprintSummary {
                sprint: index + offset,
                start: window.start,
                end: window.end,
                resources,
            })
        })
        .collect()
}

fn capacities(capacity: &CapacityTable, sprints: &[usize], offset: usize) -> Vec<CapacityRow> {
    sprints
        .iter()
        .filter_map(|&index| Some((index, capacity.sprint(index)?)))
        .flat_map(|(index, table)| {
            table.iter().map(move |(resource, c)| CapacityRow {
                sprint: index + offset,
                resource: resource.clone(),
                development: c.development,
                maintenance: c.maintenance,
                analysis: c.analysis,
            })
        })
        .collect()
}

fn underutilization(result: &EngineResult, offset: usize) -> Vec<UnderutilizationRow> {
    let mut rows: Vec<UnderutilizationRow> = result
        .underutilization
        .iter()
        .map(|u| UnderutilizationRow {
            sprint: u.sprint + offset,
            resource: u.resource.clone(),
            unused_hours: u.unused_hours,
            reason: u.reason,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.sprint
            .cmp(&b.sprint)
            .then_with(|| name_key(&a.resource).cmp(&name_key(&b.resource)))
    });
    rows
}

/// Resources whose wishes add up past their whole capacity.
pub fn overbooking(epics: &[Epic]) -> Vec<OverbookingRow> {
    let mut by_resource: BTreeMap<String, OverbookingRow> = BTreeMap::new();
    for epic in epics {
        for wish in &epic.wishes {
            let row = by_resource
                .entry(name_key(&wish.resource))
                .or_insert_with(|| OverbookingRow {
                    resource: wish.resource.clone(),
                    total_percent: 0.0,
                    overbooked: false,
                    details: Vec::new(),
                });
            row.total_percent += wish.percentage * 100.0;
            row.details
                .push(format!("{}:{}%", epic.name, (wish.percentage * 100.0).round()));
        }
    }
    by_resource
        .into_values()
        .map(|mut row| {
            row.overbooked = row.total_percent > 100.0 + 1e-9;
            row.total_percent = (row.total_percent * 10.0).round() / 10.0;
            row
        })
        .collect()
}
