//! Sprint calendar and capacity adjustment.
//!
//! The engine consumes a fully resolved capacity table. This module builds
//! it: base capacities are scaled to the working days of each sprint and
//! then reduced for each resource's absences.

use std::collections::BTreeMap;

use jiff::civil::{Date, Weekday};
use jiff::{Span, ToSpan};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{CapacityTable, ResourceCapacity, SprintCapacity, name_key};

/// Errors from sprint date arithmetic.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("sprint length must be at least one day")]
    EmptySprint,

    #[error("sprint capacity days must be at least one")]
    NoCapacityDays,

    #[error("sprint {index} falls outside the supported date range: {source}")]
    OutOfRange { index: usize, source: jiff::Error },
}

pub type Result<T> = core::result::Result<T, CalendarError>;

/// A resource's absence, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Absence {
    pub from: Date,
    pub to: Date,
}

/// Fixed-length sprints laid end to end from a start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SprintCalendar {
    pub start: Date,
    pub sprint_days: u32,
}

/// The dates covered by one sprint, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SprintWindow {
    pub index: usize,
    pub start: Date,
    pub end: Date,
}

impl SprintCalendar {
    pub fn new(start: Date, sprint_days: u32) -> Result<Self> {
        if sprint_days == 0 {
            return Err(CalendarError::EmptySprint);
        }
        Ok(Self { start, sprint_days })
    }

    /// `start + index * sprint_days` through `start + (index + 1) * sprint_days - 1`.
    pub fn window(&self, index: usize) -> Result<SprintWindow> {
        let out_of_range = |source| CalendarError::OutOfRange { index, source };
        let offset = i64::try_from(index)
            .unwrap_or(i64::MAX)
            .saturating_mul(i64::from(self.sprint_days));
        let start = Span::new()
            .try_days(offset)
            .and_then(|span| self.start.checked_add(span))
            .map_err(out_of_range)?;
        let end = Span::new()
            .try_days(i64::from(self.sprint_days) - 1)
            .and_then(|span| start.checked_add(span))
            .map_err(out_of_range)?;
        Ok(SprintWindow { index, start, end })
    }

    /// Windows for sprints `0..count`.
    pub fn windows(&self, count: usize) -> Result<Vec<SprintWindow>> {
        (0..count).map(|index| self.window(index)).collect()
    }
}

pub fn is_weekend(date: Date) -> bool {
    matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday)
}

/// Days in `[start, end]` that are neither weekend days nor holidays.
pub fn count_working_days(start: Date, end: Date, holidays: &[Date]) -> usize {
    if end < start {
        return 0;
    }
    start
        .series(1.day())
        .take_while(|date| *date <= end)
        .filter(|date| !is_weekend(*date) && !holidays.contains(date))
        .count()
}

/// Working days shared by an absence and a sprint window.
pub fn count_working_days_overlap(
    absence: &Absence,
    window: &SprintWindow,
    holidays: &[Date],
) -> usize {
    let start = absence.from.max(window.start);
    let end = absence.to.min(window.end);
    count_working_days(start, end, holidays)
}

/// Inputs for [`adjust_capacities`].
#[derive(Debug, Clone)]
pub struct CapacityAdjustment<'a> {
    pub calendar: SprintCalendar,
    /// Working days the base capacities are expressed for.
    pub sprint_capacity_days: u32,
    pub sprint_count: usize,
    pub holidays: &'a [Date],
}

/// Builds the per-sprint capacity table from base capacities.
///
/// Each sprint scales the base by `working days / capacity days`, then each
/// absence overlapping the sprint removes its working days at the daily
/// rate. Results are clamped at zero and rounded to two decimals.
pub fn adjust_capacities(
    base: &BTreeMap<String, ResourceCapacity>,
    absences: &BTreeMap<String, Vec<Absence>>,
    adjustment: &CapacityAdjustment<'_>,
) -> Result<CapacityTable> {
    if adjustment.sprint_capacity_days == 0 {
        return Err(CalendarError::NoCapacityDays);
    }
    let absences_by_key: BTreeMap<String, &Vec<Absence>> = absences
        .iter()
        .map(|(name, list)| (name_key(name), list))
        .collect();

    let mut sprints = Vec::with_capacity(adjustment.sprint_count);
    for window in adjustment.calendar.windows(adjustment.sprint_count)? {
        let working_days = count_working_days(window.start, window.end, adjustment.holidays);
        let scale = working_days as f64 / f64::from(adjustment.sprint_capacity_days);

        let mut sprint = SprintCapacity::new();
        for (resource, capacity) in base {
            let mut adjusted = capacity.scaled(scale);
            if let Some(list) = absences_by_key.get(&name_key(resource)) {
                for absence in list.iter() {
                    let absent = count_working_days_overlap(absence, &window, adjustment.holidays);
                    if absent > 0 && working_days > 0 {
                        adjusted = adjusted.less_absence(working_days as f64, absent as f64);
                    }
                }
            }
            sprint.insert(resource.clone(), adjusted.settled());
        }
        debug!(
            sprint = window.index,
            start = %window.start,
            working_days,
            "adjusted sprint capacity"
        );
        sprints.push(sprint);
    }
    Ok(CapacityTable::new(sprints))
}
