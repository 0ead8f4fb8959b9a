//! Plan-vs-actual checks for the current sprint.
//!
//! Names are matched exactly, ignoring case. Anything the tracker reports
//! under a different spelling simply has no counterpart.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::model::{CapacityTable, Epic, name_key, round2};
use crate::snapshot::{EpicSummaryRecord, PlannedHoursRecord};

/// Planned total exceeds capacity by more than this share.
const UNDER_THRESHOLD: f64 = 0.05;
/// Capacity exceeds planned total by more than this share.
const OVER_THRESHOLD: f64 = 0.15;
const MIN_RELIABILITY: f64 = 0.8;
const USAGE_RANGE: (f64, f64) = (0.8, 1.2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanningFlag {
    /// More hours planned than the resource has.
    Under,
    /// A large part of the resource's capacity is unplanned.
    Over,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub resource: String,
    pub capacity: f64,
    pub planned_epic: f64,
    pub planned_outside_epic: f64,
    pub planned_total: f64,
    /// Capacity minus planned total.
    pub diff: f64,
    pub flag: Option<PlanningFlag>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpicCheckRow {
    pub epic: String,
    /// The epic's charge, when the backlog knows the epic.
    pub initial_remaining: Option<f64>,
    pub planned_capacity: f64,
    pub consumed: f64,
    pub actual_remaining: f64,
    pub projected_remaining: f64,
    pub delta_remaining: Option<f64>,
    pub reliability: Option<f64>,
    pub usage_rate: f64,
    pub flagged: bool,
}

/// Both plan-vs-actual tables.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub comparison: Vec<ComparisonRow>,
    pub epics: Vec<EpicCheckRow>,
}

impl CheckReport {
    pub fn build(
        epics: &[Epic],
        capacity: &CapacityTable,
        planned: &BTreeMap<String, PlannedHoursRecord>,
        summaries: &[EpicSummaryRecord],
    ) -> Self {
        Self {
            comparison: compare(capacity, planned),
            epics: check_epics(epics, summaries),
        }
    }
}

/// Compares sprint 0 development capacity with the hours already planned.
pub fn compare(
    capacity: &CapacityTable,
    planned: &BTreeMap<String, PlannedHoursRecord>,
) -> Vec<ComparisonRow> {
    let planned: BTreeMap<String, &PlannedHoursRecord> =
        planned.iter().map(|(name, r)| (name_key(name), r)).collect();
    let Some(sprint) = capacity.sprint(0) else {
        return Vec::new();
    };

    let mut rows: Vec<ComparisonRow> = sprint
        .iter()
        .map(|(resource, c)| {
            let record = planned.get(&name_key(resource));
            let planned_epic = record.map_or(0.0, |r| r.epic_hours);
            let planned_outside_epic = record.map_or(0.0, |r| r.outside_epic_hours);
            let planned_total = planned_epic + planned_outside_epic;
            let diff = round2(c.development - planned_total);
            ComparisonRow {
                resource: resource.clone(),
                capacity: c.development,
                planned_epic: round2(planned_epic),
                planned_outside_epic: round2(planned_outside_epic),
                planned_total: round2(planned_total),
                diff,
                flag: planning_flag(diff, c.development),
            }
        })
        .collect();
    rows.sort_by_key(|r| name_key(&r.resource));
    rows
}

fn planning_flag(diff: f64, capacity: f64) -> Option<PlanningFlag> {
    if capacity <= 0.0 {
        return (diff < 0.0).then_some(PlanningFlag::Under);
    }
    if diff < 0.0 && diff.abs() / capacity > UNDER_THRESHOLD {
        Some(PlanningFlag::Under)
    } else if diff > 0.0 && diff / capacity > OVER_THRESHOLD {
        Some(PlanningFlag::Over)
    } else {
        None
    }
}

/// Checks each tracker summary against the epic's charge.
pub fn check_epics(epics: &[Epic], summaries: &[EpicSummaryRecord]) -> Vec<EpicCheckRow> {
    let mut rows: Vec<EpicCheckRow> = summaries
        .iter()
        .map(|summary| {
            let initial = epics
                .iter()
                .find(|e| e.is_named(&summary.epic))
                .map(|e| e.charge);
            if initial.is_none() {
                warn!(epic = %summary.epic, "summary for an epic missing from the backlog");
            }
            epic_check(summary, initial)
        })
        .collect();
    rows.sort_by_key(|r| name_key(&r.epic));
    rows
}

fn epic_check(summary: &EpicSummaryRecord, initial: Option<f64>) -> EpicCheckRow {
    let planned = round2(summary.planned_capacity);
    let consumed = round2(summary.consumed);
    let actual = round2(summary.remaining);

    let projected = initial.map_or(actual, |initial| (initial - planned).max(0.0));
    let delta = initial.map(|initial| round2(initial - actual));
    let reliability = initial.map(|_| {
        let miss = (projected - actual).abs();
        let ratio = if planned <= 0.0 {
            miss / projected.abs().max(1e-4)
        } else {
            miss / planned
        };
        (1.0 - ratio).clamp(0.0, 1.0)
    });
    let usage_rate = if planned <= 0.0 {
        if consumed <= 0.0 { 1.0 } else { 2.0 }
    } else {
        consumed / planned
    };

    let flagged = reliability.is_some_and(|r| r < MIN_RELIABILITY)
        || usage_rate < USAGE_RANGE.0
        || usage_rate > USAGE_RANGE.1;

    EpicCheckRow {
        epic: summary.epic.clone(),
        initial_remaining: initial,
        planned_capacity: planned,
        consumed,
        actual_remaining: actual,
        projected_remaining: round2(projected),
        delta_remaining: delta,
        reliability,
        usage_rate,
        flagged,
    }
}
