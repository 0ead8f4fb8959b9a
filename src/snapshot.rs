//! Planning snapshots: the fixed input of one planning run.
//!
//! A snapshot is a JSON document exported from the team's planning sheet
//! and issue tracker. It is read once, validated, and resolved into the
//! typed inputs the engine needs: base capacities, absences, and a
//! [`Backlog`] whose dependencies are indexes rather than names.

mod assignments;
mod dependencies;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::calendar::Absence;
use crate::model::{Backlog, BacklogError, Epic, EpicId, Priority, ResourceCapacity, name_key};

use assignments::parse_assignments;
use dependencies::{resolve_dependency, split_dependencies};

/// Errors that can occur while loading or resolving a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("resource '{0}' is listed more than once")]
    DuplicateResource(String),

    #[error("resource '{0}' has negative capacity")]
    NegativeCapacity(String),

    #[error("epic '{0}' is listed more than once")]
    DuplicateEpic(String),

    #[error("epic '{epic}' has an assignment outside (0%, 100%]: '{entry}'")]
    InvalidPercentage { epic: String, entry: String },

    #[error(transparent)]
    Backlog(#[from] BacklogError),
}

pub type Result<T> = core::result::Result<T, SnapshotError>;

/// A resource and its base capacity for a full sprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub name: String,
    pub development: f64,
    #[serde(default)]
    pub maintenance: f64,
    #[serde(default)]
    pub analysis: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsenceRecord {
    pub resource: String,
    pub from: Date,
    pub to: Date,
}

/// An epic row as exported, before any interpretation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EpicRecord {
    pub name: String,
    pub state: String,
    /// Remaining estimate in hours; preferred when positive.
    pub remaining: f64,
    /// Rough estimate in hours; used when no remaining estimate is given.
    pub rough: f64,
    pub priority: String,
    pub assigned_to: String,
    pub will_be_assigned: String,
    pub dependencies: String,
    pub end_of_analysis: Option<Date>,
    pub group: Option<String>,
}

impl EpicRecord {
    /// Hours to schedule: the remaining estimate, else the rough one, else zero.
    pub fn charge(&self) -> f64 {
        if self.remaining > 0.0 {
            self.remaining
        } else if self.rough > 0.0 {
            self.rough
        } else {
            0.0
        }
    }
}

/// Hours already booked on a resource in the current sprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedHoursRecord {
    pub resource: String,
    #[serde(default)]
    pub epic_hours: f64,
    #[serde(default)]
    pub outside_epic_hours: f64,
}

/// Tracker figures for one epic over the current sprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpicSummaryRecord {
    pub epic: String,
    #[serde(default)]
    pub planned_capacity: f64,
    #[serde(default)]
    pub consumed: f64,
    #[serde(default)]
    pub remaining: f64,
}

/// The raw snapshot document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub resources: Vec<ResourceRecord>,
    #[serde(default)]
    pub absences: Vec<AbsenceRecord>,
    pub epics: Vec<EpicRecord>,
    #[serde(default)]
    pub planned_hours: Vec<PlannedHoursRecord>,
    #[serde(default)]
    pub epic_summaries: Vec<EpicSummaryRecord>,
}

/// A snapshot together with the fingerprint of the bytes it was read from.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub snapshot: Snapshot,
    /// Hex SHA-256 of the file contents.
    pub fingerprint: String,
}

/// Hex SHA-256 of snapshot bytes. Identical files give identical runs.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

impl Snapshot {
    /// Reads and parses a snapshot file.
    pub fn load(path: &Path) -> Result<LoadedSnapshot> {
        let bytes = fs::read(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: Self = serde_json::from_slice(&bytes)?;
        debug!(
            path = %path.display(),
            epics = snapshot.epics.len(),
            resources = snapshot.resources.len(),
            "loaded snapshot"
        );
        Ok(LoadedSnapshot {
            snapshot,
            fingerprint: fingerprint(&bytes),
        })
    }

    /// Resource names as written, in snapshot order.
    pub fn resource_names(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.name.trim().to_string()).collect()
    }

    /// Base capacities keyed by trimmed resource name.
    pub fn base_capacities(&self) -> Result<BTreeMap<String, ResourceCapacity>> {
        let mut seen = BTreeMap::new();
        let mut capacities = BTreeMap::new();
        for record in &self.resources {
            let name = record.name.trim().to_string();
            if seen.insert(name_key(&name), ()).is_some() {
                return Err(SnapshotError::DuplicateResource(name));
            }
            if record.development < 0.0 || record.maintenance < 0.0 || record.analysis < 0.0 {
                return Err(SnapshotError::NegativeCapacity(name));
            }
            capacities.insert(
                name,
                ResourceCapacity::new(record.development, record.maintenance, record.analysis),
            );
        }
        Ok(capacities)
    }

    /// Absences grouped by resource. Absences of unknown resources are dropped.
    pub fn absences(&self) -> BTreeMap<String, Vec<Absence>> {
        let names = self.resource_names();
        let mut absences: BTreeMap<String, Vec<Absence>> = BTreeMap::new();
        for record in &self.absences {
            let key = name_key(&record.resource);
            let Some(resource) = names.iter().find(|n| name_key(n) == key) else {
                warn!(resource = %record.resource, "absence for unknown resource");
                continue;
            };
            absences.entry(resource.clone()).or_default().push(Absence {
                from: record.from,
                to: record.to,
            });
        }
        absences
    }

    /// Resolves epic rows into a validated backlog.
    ///
    /// Rows with a blank name are skipped. Epics with nothing left to do are
    /// dated at their end of analysis, or at `initial_sprint_start` without one.
    pub fn backlog(&self, initial_sprint_start: Date) -> Result<Backlog> {
        let resources = self.resource_names();
        let names: Vec<String> = self.epics.iter().map(|e| e.name.trim().to_string()).collect();

        let mut seen = BTreeMap::new();
        for name in names.iter().filter(|n| !n.is_empty()) {
            if seen.insert(name_key(name), ()).is_some() {
                return Err(SnapshotError::DuplicateEpic(name.clone()));
            }
        }

        let mut epics = Vec::new();
        for (index, record) in self.epics.iter().enumerate() {
            if names[index].is_empty() {
                continue;
            }
            let id = EpicId(epics.len());
            let mut epic = Epic::new(id, &names[index], &record.state, record.charge());
            epic.priority = Priority::parse(&record.priority);
            epic.end_analysis = record.end_of_analysis;
            if epic.is_pre_completed() {
                let done = epic.end_analysis.unwrap_or(initial_sprint_start);
                epic.start_date = Some(done);
                epic.end_date = Some(done);
            }
            epic.group = record
                .group
                .as_deref()
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(String::from);
            let assignment = format!("{},{}", record.assigned_to, record.will_be_assigned);
            epic.wishes = parse_assignments(&epic.name, &assignment, &resources)?;
            epics.push((index, epic));
        }
        debug!(epics = epics.len(), skipped = names.len() - epics.len(), "resolved epics");

        // Dependencies index into the kept epics, so resolve against their names.
        let kept: Vec<String> = epics.iter().map(|(_, e)| e.name.clone()).collect();
        let epics = epics
            .into_iter()
            .map(|(index, mut epic)| {
                epic.dependencies = split_dependencies(&self.epics[index].dependencies)
                    .into_iter()
                    .map(|name| resolve_dependency(epic.id.0, name, &kept))
                    .collect();
                epic
            })
            .collect();

        Ok(Backlog::new(epics)?)
    }

    /// Planned hours per resource, keyed by trimmed name.
    pub fn planned_hours(&self) -> BTreeMap<String, PlannedHoursRecord> {
        self.planned_hours
            .iter()
            .map(|r| (r.resource.trim().to_string(), r.clone()))
            .collect()
    }
}
