//! Core data model for the planner.
//!
//! These types are what the engine consumes and mutates: epics with their
//! wishes and dependencies, the per-sprint capacity table, and the
//! allocation ledger the engine writes as it runs, plus the shape of a
//! saved run.

mod allocation;
mod backlog;
mod capacity;
mod epic;
mod run;

pub use allocation::{Allocation, Underutilization, UnderutilizationReason};
pub use backlog::{Backlog, BacklogError};
pub use capacity::{CapacityTable, ResourceCapacity, SprintCapacity, round2};
pub use epic::{Dependency, Epic, EpicId, EpicState, Priority, Wish, name_key};
pub use run::{EpicOutcome, RunSettings, RunSummary, SavedRun};
