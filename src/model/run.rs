//! Saved planning runs: settings, summary and per-epic outcomes.

use jiff::Timestamp;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Allocation, Epic, EpicState, Priority, Underutilization};

/// Parameters a run was planned with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSettings {
    pub initial_sprint_start: Date,
    pub sprint_days: u32,
    pub max_sprint_count: usize,
    pub initial_sprint_number: usize,
    pub only_development_epics: bool,
}

/// Identity and inputs of a saved planning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: Uuid,
    pub created_at: Timestamp,
    /// Hex SHA-256 of the snapshot the run was planned from.
    pub fingerprint: String,
    pub settings: RunSettings,
}

/// Where an epic ended up after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpicOutcome {
    pub epic: String,
    pub state: EpicState,
    pub priority: Priority,
    pub charge: f64,
    pub remaining: f64,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
}

impl From<&Epic> for EpicOutcome {
    fn from(epic: &Epic) -> Self {
        Self {
            epic: epic.name.clone(),
            state: epic.state,
            priority: epic.priority,
            charge: epic.charge,
            remaining: epic.remaining,
            start_date: epic.start_date,
            end_date: epic.end_date,
        }
    }
}

/// A planning run as stored: summary, ledger, outcomes and unused capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRun {
    pub summary: RunSummary,
    pub allocations: Vec<Allocation>,
    pub outcomes: Vec<EpicOutcome>,
    pub underutilization: Vec<Underutilization>,
}
