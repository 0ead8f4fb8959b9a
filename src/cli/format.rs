//! Output formatting for CLI display.

use jiff::civil::Date;

use crate::model::{EpicOutcome, EpicState, RunSummary};
use crate::report::checker::{ComparisonRow, EpicCheckRow, PlanningFlag};
use crate::report::{OverbookingRow, ScheduleRow, SprintSummary, UnderutilizationRow};

/// Lays rows out in left-aligned columns under a header.
fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = table_line(headers.iter().copied(), &widths);
    for row in rows {
        out.push_str(&table_line(row.iter().map(String::as_str), &widths));
    }
    out
}

fn table_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let line = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    format!("{}\n", line.trim_end())
}

fn date_or_dash(date: Option<Date>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.to_string())
}

fn hours(value: f64) -> String {
    format!("{value:.2}")
}

fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

fn state_label(state: EpicState) -> &'static str {
    match state {
        EpicState::InDevelopment => "in development",
        EpicState::PendingDevelopment => "pending development",
        EpicState::InAnalysis => "in analysis",
        EpicState::PendingAnalysis => "pending analysis",
        EpicState::Other => "other",
    }
}

pub(super) fn format_schedule(rows: &[ScheduleRow]) -> String {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.epic.clone(),
                r.state_text.clone(),
                r.priority.label().to_string(),
                hours(r.charge),
                hours(r.allocated),
                hours(r.remaining),
                date_or_dash(r.start),
                date_or_dash(r.end),
            ]
        })
        .collect();
    table(
        &[
            "EPIC",
            "STATE",
            "PRIORITY",
            "CHARGE",
            "ALLOCATED",
            "REMAINING",
            "START",
            "END",
        ],
        &rows,
    )
}

pub(super) fn format_sprint_summaries(summaries: &[SprintSummary]) -> String {
    let rows: Vec<Vec<String>> = summaries
        .iter()
        .flat_map(|s| {
            s.resources.iter().map(move |r| {
                vec![
                    s.sprint.to_string(),
                    s.start.to_string(),
                    r.resource.clone(),
                    hours(r.allocated),
                    hours(r.capacity),
                    format!("{:.2}%", r.utilization_percent),
                ]
            })
        })
        .collect();
    table(
        &[
            "SPRINT",
            "START",
            "RESOURCE",
            "ALLOCATED",
            "CAPACITY",
            "UTILIZATION",
        ],
        &rows,
    )
}

pub(super) fn format_underutilization(rows: &[UnderutilizationRow]) -> String {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|u| {
            vec![
                u.sprint.to_string(),
                u.resource.clone(),
                hours(u.unused_hours),
                u.reason.to_string(),
            ]
        })
        .collect();
    table(&["SPRINT", "RESOURCE", "UNUSED", "REASON"], &rows)
}

/// Only resources whose wishes exceed their capacity.
pub(super) fn format_overbooking(rows: &[OverbookingRow]) -> String {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .filter(|r| r.overbooked)
        .map(|r| {
            vec![
                r.resource.clone(),
                format!("{:.1}%", r.total_percent),
                r.details.join("; "),
            ]
        })
        .collect();
    table(&["RESOURCE", "WISHED", "EPICS"], &rows)
}

pub(super) fn format_comparison(rows: &[ComparisonRow]) -> String {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let flag = match r.flag {
                Some(PlanningFlag::Under) => "over-planned",
                Some(PlanningFlag::Over) => "under-planned",
                None => "",
            };
            vec![
                r.resource.clone(),
                hours(r.capacity),
                hours(r.planned_epic),
                hours(r.planned_outside_epic),
                hours(r.planned_total),
                hours(r.diff),
                flag.to_string(),
            ]
        })
        .collect();
    table(
        &[
            "RESOURCE",
            "CAPACITY",
            "EPIC",
            "NON-EPIC",
            "TOTAL",
            "DIFF",
            "",
        ],
        &rows,
    )
}

pub(super) fn format_epic_checks(rows: &[EpicCheckRow]) -> String {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.epic.clone(),
                r.initial_remaining.map_or_else(|| "-".to_string(), hours),
                hours(r.planned_capacity),
                hours(r.consumed),
                hours(r.actual_remaining),
                hours(r.projected_remaining),
                r.delta_remaining.map_or_else(|| "-".to_string(), hours),
                r.reliability.map_or_else(|| "-".to_string(), percent),
                percent(r.usage_rate),
                if r.flagged { "!" } else { "" }.to_string(),
            ]
        })
        .collect();
    table(
        &[
            "EPIC",
            "INITIAL",
            "PLANNED",
            "CONSUMED",
            "ACTUAL",
            "PROJECTED",
            "DELTA",
            "RELIABILITY",
            "USAGE",
            "",
        ],
        &rows,
    )
}

pub(super) fn format_run_line(summary: &RunSummary) -> String {
    let short_id = &summary.id.to_string()[..8];
    let settings = &summary.settings;
    format!(
        "{short_id}  {}  snapshot {}  from {} ({} x {}d){}",
        summary.created_at.strftime("%Y-%m-%d %H:%M"),
        &summary.fingerprint[..summary.fingerprint.len().min(12)],
        settings.initial_sprint_start,
        settings.max_sprint_count,
        settings.sprint_days,
        if settings.only_development_epics {
            "  [development only]"
        } else {
            ""
        },
    )
}

pub(super) fn format_outcomes(outcomes: &[EpicOutcome]) -> String {
    let rows: Vec<Vec<String>> = outcomes
        .iter()
        .map(|o| {
            vec![
                o.epic.clone(),
                state_label(o.state).to_string(),
                o.priority.label().to_string(),
                hours(o.charge),
                hours(o.remaining),
                date_or_dash(o.start_date),
                date_or_dash(o.end_date),
            ]
        })
        .collect();
    table(
        &[
            "EPIC",
            "STATE",
            "PRIORITY",
            "CHARGE",
            "REMAINING",
            "START",
            "END",
        ],
        &rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::Timestamp;
    use jiff::civil::date;
    use uuid::Uuid;

    use crate::model::{Priority, RunSettings, UnderutilizationReason};

    #[test]
    fn table_aligns_columns() {
        let out = table(
            &["A", "LONGER"],
            &[
                vec!["wide cell".into(), "x".into()],
                vec!["y".into(), String::new()],
            ],
        );
        assert_eq!(out, "A          LONGER\nwide cell  x\ny\n");
    }

    #[test]
    fn schedule_shows_dashes_for_unscheduled() {
        let row = ScheduleRow {
            epic: "2024-01 Login".into(),
            state: EpicState::PendingAnalysis,
            state_text: "pending analysis".into(),
            priority: Priority::High,
            group: None,
            charge: 12.0,
            allocated: 0.0,
            remaining: 12.0,
            start: None,
            end: None,
        };
        let out = format_schedule(&[row]);
        let line = out.lines().nth(1).unwrap();
        assert!(line.starts_with("2024-01 Login  pending analysis  High"));
        assert!(line.ends_with("12.00      -      -"));
    }

    #[test]
    fn underutilization_shows_reason() {
        let out = format_underutilization(&[UnderutilizationRow {
            sprint: 3,
            resource: "Alice".into(),
            unused_hours: 4.5,
            reason: UnderutilizationReason::NoAssignedEpics,
        }]);
        assert!(out.contains("3       Alice     4.50    no assigned epics"));
    }

    #[test]
    fn overbooking_lists_only_overbooked_resources() {
        let rows = [
            OverbookingRow {
                resource: "Alice".into(),
                total_percent: 120.0,
                overbooked: true,
                details: vec!["A:70%".into(), "B:50%".into()],
            },
            OverbookingRow {
                resource: "Bob".into(),
                total_percent: 20.0,
                overbooked: false,
                details: vec!["A:20%".into()],
            },
        ];
        let out = format_overbooking(&rows);
        assert!(out.contains("Alice     120.0%  A:70%; B:50%"));
        assert!(!out.contains("Bob"));
    }

    #[test]
    fn run_line_uses_short_id() {
        let id = Uuid::new_v4();
        let summary = RunSummary {
            id,
            created_at: Timestamp::new(1_700_000_000, 0).unwrap(),
            fingerprint: "0123456789abcdef".repeat(4),
            settings: RunSettings {
                initial_sprint_start: date(2024, 1, 1),
                sprint_days: 21,
                max_sprint_count: 20,
                initial_sprint_number: 0,
                only_development_epics: true,
            },
        };
        let line = format_run_line(&summary);
        assert!(line.starts_with(&id.to_string()[..8]));
        assert!(line.contains("2023-11-14 22:13"));
        assert!(line.contains("snapshot 0123456789ab "));
        assert!(line.contains("from 2024-01-01 (20 x 21d)"));
        assert!(line.ends_with("[development only]"));
    }
}
