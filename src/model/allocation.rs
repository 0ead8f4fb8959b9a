//! Allocation ledger records.

use std::fmt;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

/// Hours of one resource granted to one epic in one sprint.
///
/// The ordered collection of these is the authoritative ledger: every
/// report, as well as each epic's `remaining` and `history`, can be
/// rebuilt from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub epic: String,
    pub sprint: usize,
    pub resource: String,
    pub hours: f64,
    pub sprint_start: Date,
}

/// Why a resource kept unused development hours in a sprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnderutilizationReason {
    /// No epic wishes this resource at all.
    NoAssignedEpics,

    /// Epics wish it, but they are done, blocked, or not ready this sprint.
    NoRemainingHoursOnAssignedEpics,
}

impl fmt::Display for UnderutilizationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAssignedEpics => f.write_str("no assigned epics"),
            Self::NoRemainingHoursOnAssignedEpics => {
                f.write_str("no remaining hours on assigned epics")
            }
        }
    }
}

/// Development hours a resource could not place in a sprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Underutilization {
    pub sprint: usize,
    pub resource: String,
    /// Rounded to two decimals.
    pub unused_hours: f64,
    pub reason: UnderutilizationReason,
}
