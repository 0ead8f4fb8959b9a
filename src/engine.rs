//! The allocation engine: sprint-by-sprint capacity simulation.
//!
//! For each sprint the engine snapshots the capacity table, builds two pools
//! of ready epics (development first, then analysis/pending), and hands each
//! resource's development hours out by priority tier with proportional
//! sharing inside a tier. Hours left on a resource after that are swept to
//! any epic in the pool still wishing it. What nobody could use is logged as
//! underutilization.
//!
//! The engine owns its epics for the whole run and is the only thing that
//! mutates `remaining`, `start_date`, `end_date`, `history` and the
//! completion map.

pub mod gate;

use std::cmp::Reverse;
use std::collections::BTreeMap;

use jiff::civil::Date;
use serde::Serialize;
use tracing::{debug, info};

use crate::calendar::{CalendarError, SprintCalendar, SprintWindow};
use crate::model::{
    Allocation, Backlog, CapacityTable, Epic, EpicId, Priority, SprintCapacity, Underutilization,
    UnderutilizationReason, round2,
};

pub use gate::{CompletionMap, DependencyPolicy, ReadinessGate};

/// An epic with at most this many hours left is finished.
pub const REMAINING_EPS: f64 = 1e-6;

/// Grants at or below this size are not recorded.
pub const ALLOC_EPS: f64 = 1e-9;

/// Errors detected while setting up a simulation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error("capacity table covers {available} sprint(s) but {required} are simulated")]
    MissingSprintCapacity { available: usize, required: usize },
}

pub type Result<T> = core::result::Result<T, EngineError>;

/// Fixed parameters of one planning run.
#[derive(Debug, Clone, Copy)]
pub struct SimulationSettings {
    pub calendar: SprintCalendar,
    /// Hard ceiling on simulated sprints. Epics unfinished by then stay unfinished.
    pub max_sprint_count: usize,
    /// Skip the analysis/pending pass entirely.
    pub only_development_epics: bool,
    pub dependency_policy: DependencyPolicy,
}

/// Everything a run produces. Reports read this; nothing feeds back.
#[derive(Debug, Clone, Serialize)]
pub struct EngineResult {
    pub epics: Vec<Epic>,
    /// Ledger of every grant in the order it was made.
    pub allocations: Vec<Allocation>,
    pub underutilization: Vec<Underutilization>,
    /// Windows of every sprint the run was allowed to use.
    pub windows: Vec<SprintWindow>,
    /// Sprints actually simulated before every epic finished or the ceiling hit.
    pub sprints_simulated: usize,
}

/// One epic's claim on a resource during a pass.
#[derive(Debug, Clone, Copy)]
struct Request {
    epic: EpicId,
    desired: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Development,
    Other,
}

/// Sprint-by-sprint allocation simulator over one backlog and capacity table.
#[derive(Debug)]
pub struct Simulator {
    epics: Vec<Epic>,
    capacity: CapacityTable,
    settings: SimulationSettings,
    windows: Vec<SprintWindow>,
    gate: ReadinessGate,
    completions: CompletionMap,
    allocations: Vec<Allocation>,
    underutilization: Vec<Underutilization>,
}

impl Simulator {
    /// Prepares a run.
    ///
    /// Wish resource names are mapped to the capacity table's spelling, and
    /// pre-completed epics are seeded into the completion map at their end
    /// date. Undated ones count as done the day before the first sprint.
    pub fn new(
        backlog: Backlog,
        capacity: CapacityTable,
        settings: SimulationSettings,
    ) -> Result<Self> {
        if capacity.sprint_count() < settings.max_sprint_count {
            return Err(EngineError::MissingSprintCapacity {
                available: capacity.sprint_count(),
                required: settings.max_sprint_count,
            });
        }
        let windows = settings.calendar.windows(settings.max_sprint_count)?;
        let seed_date = settings
            .calendar
            .start
            .yesterday()
            .map_err(|source| CalendarError::OutOfRange { index: 0, source })?;

        let mut epics = backlog.into_epics();
        let mut completions = CompletionMap::new();
        for epic in &mut epics {
            for wish in &mut epic.wishes {
                if let Some(name) = capacity.canonical_resource(&wish.resource) {
                    wish.resource = name;
                }
            }
            if epic.is_pre_completed() || epic.remaining <= REMAINING_EPS {
                epic.remaining = 0.0;
                completions.insert(epic.id, epic.end_date.unwrap_or(seed_date));
            }
        }

        Ok(Self {
            epics,
            capacity,
            windows,
            gate: ReadinessGate::new(settings.dependency_policy),
            settings,
            completions,
            allocations: Vec::new(),
            underutilization: Vec::new(),
        })
    }

    /// Runs every sprint up to the ceiling, stopping early once all epics are done.
    pub fn run(mut self) -> EngineResult {
        let mut sprints_simulated = 0;
        for sprint in 0..self.settings.max_sprint_count {
            if self.epics.iter().all(|e| e.remaining <= REMAINING_EPS) {
                break;
            }
            let window = self.windows[sprint];
            let mut remaining = self.capacity.sprint(sprint).cloned().unwrap_or_default();

            let development = self.pool(window.start, Pass::Development);
            let others = if self.settings.only_development_epics {
                Vec::new()
            } else {
                self.pool(window.start, Pass::Other)
            };
            debug!(
                sprint,
                start = %window.start,
                development = development.len(),
                others = others.len(),
                "simulating sprint"
            );

            // Development goes first; the other pass only sees what it left.
            for pool in [&development, &others] {
                self.allocate_by_priority(sprint, window.start, pool, &mut remaining);
                self.sweep_leftovers(sprint, window.start, pool, &mut remaining);
            }

            self.record_underutilization(sprint, &remaining);
            sprints_simulated += 1;
        }

        let finished = self.epics.iter().filter(|e| e.end_date.is_some()).count();
        info!(
            sprints = sprints_simulated,
            allocations = self.allocations.len(),
            finished,
            epics = self.epics.len(),
            "simulation complete"
        );

        EngineResult {
            epics: self.epics,
            allocations: self.allocations,
            underutilization: self.underutilization,
            windows: self.windows,
            sprints_simulated,
        }
    }

    /// Epics with hours left that belong to `pass` and pass the readiness gate.
    fn pool(&self, sprint_start: Date, pass: Pass) -> Vec<EpicId> {
        self.epics
            .iter()
            .filter(|epic| epic.remaining > REMAINING_EPS)
            .filter(|epic| match pass {
                Pass::Development => epic.state.is_in_development(),
                Pass::Other => {
                    !epic.state.is_in_development() && epic.state.is_analysis_or_pending()
                }
            })
            .filter(|epic| {
                self.gate
                    .is_ready(epic, sprint_start, &self.completions, &self.epics)
            })
            .map(|epic| epic.id)
            .collect()
    }

    /// Priority-tiered, proportionally shared allocation for one pool.
    fn allocate_by_priority(
        &mut self,
        sprint: usize,
        sprint_start: Date,
        pool: &[EpicId],
        remaining: &mut SprintCapacity,
    ) {
        // Resources in the order their first request appears.
        let mut requests: Vec<(String, Vec<Request>)> = Vec::new();
        for id in pool {
            let epic = &self.epics[id.0];
            for wish in &epic.wishes {
                let Some(capacity) = remaining.get(&wish.resource) else {
                    continue;
                };
                if wish.percentage <= 0.0 {
                    continue;
                }
                let request = Request {
                    epic: *id,
                    desired: capacity.development * wish.percentage,
                };
                match requests.iter_mut().find(|(name, _)| *name == wish.resource) {
                    Some((_, list)) => list.push(request),
                    None => requests.push((wish.resource.clone(), vec![request])),
                }
            }
        }

        for (resource, resource_requests) in requests {
            let mut available = remaining.get(&resource).map_or(0.0, |c| c.development);

            let mut tiers: BTreeMap<Reverse<Priority>, Vec<Request>> = BTreeMap::new();
            for request in resource_requests {
                let priority = self.epics[request.epic.0].priority;
                tiers.entry(Reverse(priority)).or_default().push(request);
            }

            for tier in tiers.into_values() {
                if available <= REMAINING_EPS {
                    break;
                }

                if let [lone] = tier.as_slice() {
                    // No contention: the lone claimant may take the whole pool.
                    let grant = available.min(self.epics[lone.epic.0].remaining);
                    if grant > ALLOC_EPS {
                        self.commit(lone.epic, sprint, sprint_start, &resource, grant);
                        available -= grant;
                        draw_down(remaining, &resource, grant);
                    }
                    continue;
                }

                let total_desired: f64 = tier.iter().map(|r| r.desired).sum();
                let tier_available = available;
                for request in &tier {
                    if available <= REMAINING_EPS {
                        break;
                    }
                    let share = if total_desired > ALLOC_EPS {
                        request.desired / total_desired
                    } else {
                        1.0 / tier.len() as f64
                    };
                    let grant = (tier_available * share)
                        .min(self.epics[request.epic.0].remaining)
                        .min(available);
                    if grant <= ALLOC_EPS {
                        continue;
                    }
                    self.commit(request.epic, sprint, sprint_start, &resource, grant);
                    available -= grant;
                    draw_down(remaining, &resource, grant);
                }
            }
        }
    }

    /// Pushes each resource's leftover hours to pool epics still wishing it, in pool order.
    fn sweep_leftovers(
        &mut self,
        sprint: usize,
        sprint_start: Date,
        pool: &[EpicId],
        remaining: &mut SprintCapacity,
    ) {
        let resources: Vec<String> = remaining.keys().cloned().collect();
        for resource in resources {
            let mut leftover = remaining.get(&resource).map_or(0.0, |c| c.development);
            if leftover <= REMAINING_EPS {
                continue;
            }
            for id in pool {
                if leftover <= REMAINING_EPS {
                    break;
                }
                let epic = &self.epics[id.0];
                if epic.remaining <= REMAINING_EPS || epic.wish_for(&resource).is_none() {
                    continue;
                }
                let grant = leftover.min(epic.remaining);
                if grant <= ALLOC_EPS {
                    continue;
                }
                self.commit(*id, sprint, sprint_start, &resource, grant);
                leftover -= grant;
                draw_down(remaining, &resource, grant);
            }
        }
    }

    /// Records a grant and settles the epic's dates and completion.
    fn commit(
        &mut self,
        id: EpicId,
        sprint: usize,
        sprint_start: Date,
        resource: &str,
        hours: f64,
    ) {
        let epic = &mut self.epics[id.0];
        epic.remaining -= hours;
        let allocation = Allocation {
            epic: epic.name.clone(),
            sprint,
            resource: resource.to_string(),
            hours,
            sprint_start,
        };
        epic.history.push(allocation.clone());
        self.allocations.push(allocation);

        if epic.start_date.is_none() {
            epic.start_date = Some(sprint_start);
        }
        if epic.remaining <= REMAINING_EPS {
            epic.remaining = 0.0;
            epic.end_date = Some(sprint_start);
            self.completions.insert(id, sprint_start);
        }
    }

    fn record_underutilization(&mut self, sprint: usize, remaining: &SprintCapacity) {
        for (resource, capacity) in remaining {
            if capacity.development <= REMAINING_EPS {
                continue;
            }
            let assigned = self.epics.iter().any(|e| e.wish_for(resource).is_some());
            let reason = if assigned {
                UnderutilizationReason::NoRemainingHoursOnAssignedEpics
            } else {
                UnderutilizationReason::NoAssignedEpics
            };
            debug!(
                sprint,
                resource = %resource,
                unused = capacity.development,
                %reason,
                "unused capacity"
            );
            self.underutilization.push(Underutilization {
                sprint,
                resource: resource.clone(),
                unused_hours: round2(capacity.development),
                reason,
            });
        }
    }
}

fn draw_down(remaining: &mut SprintCapacity, resource: &str, hours: f64) {
    if let Some(capacity) = remaining.get_mut(resource) {
        capacity.development -= hours;
    }
}

/// Builds a simulator and runs it to completion.
pub fn simulate(
    backlog: Backlog,
    capacity: CapacityTable,
    settings: SimulationSettings,
) -> Result<EngineResult> {
    Ok(Simulator::new(backlog, capacity, settings)?.run())
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::civil::date;

    use crate::model::{Dependency, ResourceCapacity, Wish};

    const EPS: f64 = 1e-6;

    fn settings(max_sprint_count: usize) -> SimulationSettings {
        SimulationSettings {
            calendar: SprintCalendar::new(date(2024, 1, 1), 14).unwrap(),
            max_sprint_count,
            only_development_epics: false,
            dependency_policy: DependencyPolicy::Strict,
        }
    }

    fn capacity(sprints: usize, resources: &[(&str, f64)]) -> CapacityTable {
        let sprint: SprintCapacity = resources
            .iter()
            .map(|(name, hours)| ((*name).to_string(), ResourceCapacity::new(*hours, 4.0, 2.0)))
            .collect();
        CapacityTable::new(vec![sprint; sprints])
    }

    fn epic(id: usize, name: &str, state: &str, charge: f64, wishes: &[(&str, f64)]) -> Epic {
        let mut epic = Epic::new(EpicId(id), name, state, charge);
        epic.wishes = wishes
            .iter()
            .map(|(resource, percentage)| Wish {
                resource: (*resource).to_string(),
                percentage: *percentage,
            })
            .collect();
        epic
    }

    fn dev(id: usize, name: &str, charge: f64, wishes: &[(&str, f64)]) -> Epic {
        epic(id, name, "in development", charge, wishes)
    }

    fn run(
        epics: Vec<Epic>,
        capacity: CapacityTable,
        settings: SimulationSettings,
    ) -> EngineResult {
        simulate(Backlog::new(epics).unwrap(), capacity, settings).unwrap()
    }

    fn hours_in(result: &EngineResult, epic: &str, sprint: usize) -> f64 {
        result
            .allocations
            .iter()
            .filter(|a| a.epic == epic && a.sprint == sprint)
            .map(|a| a.hours)
            .sum()
    }

    fn find<'a>(result: &'a EngineResult, name: &str) -> &'a Epic {
        result.epics.iter().find(|e| e.name == name).unwrap()
    }

    /// Replays an epic's history: every grant is positive, sprints never go
    /// back, and the running remaining only falls.
    fn assert_monotonic(epic: &Epic) {
        let mut running = epic.charge.max(0.0);
        let mut last_sprint = 0;
        for grant in &epic.history {
            assert!(grant.hours > 0.0, "{} has an empty grant", epic.name);
            assert!(grant.sprint >= last_sprint, "{} history out of order", epic.name);
            let next = running - grant.hours;
            assert!(next < running && next > -EPS, "{} remaining rose", epic.name);
            running = next;
            last_sprint = grant.sprint;
        }
    }

    /// Conservation, monotonicity and capacity limits over a finished run.
    fn assert_ledger_invariants(result: &EngineResult, capacity: &CapacityTable) {
        for epic in &result.epics {
            assert_monotonic(epic);
            let allocated: f64 = epic.history.iter().map(|a| a.hours).sum();
            assert!(epic.remaining >= 0.0, "{} went negative", epic.name);
            assert!(
                (epic.charge.max(0.0) - allocated - epic.remaining).abs() < EPS,
                "{} does not conserve hours",
                epic.name
            );
            let from_ledger: f64 = result
                .allocations
                .iter()
                .filter(|a| a.epic == epic.name)
                .map(|a| a.hours)
                .sum();
            assert!((from_ledger - allocated).abs() < EPS);
        }
        for window in &result.windows {
            for resource in capacity.resources() {
                let used: f64 = result
                    .allocations
                    .iter()
                    .filter(|a| a.sprint == window.index && a.resource == resource)
                    .map(|a| a.hours)
                    .sum();
                let limit = capacity
                    .get(window.index, &resource)
                    .map_or(0.0, |c| c.development);
                assert!(
                    used <= limit + EPS,
                    "{resource} oversubscribed in sprint {}",
                    window.index
                );
            }
        }
    }

    #[test]
    fn single_epic_completes_in_two_sprints() {
        let table = capacity(5, &[("EngA", 20.0)]);
        let result = run(vec![dev(0, "Solo", 40.0, &[("EngA", 1.0)])], table.clone(), settings(5));

        let solo = find(&result, "Solo");
        assert_eq!(solo.remaining, 0.0);
        assert_eq!(solo.start_date, Some(date(2024, 1, 1)));
        assert_eq!(solo.end_date, Some(date(2024, 1, 15)));
        assert!((hours_in(&result, "Solo", 0) - 20.0).abs() < EPS);
        assert!((hours_in(&result, "Solo", 1) - 20.0).abs() < EPS);
        assert_eq!(result.sprints_simulated, 2);
        assert_ledger_invariants(&result, &table);
    }

    #[test]
    fn equal_claims_split_evenly() {
        let table = capacity(4, &[("EngA", 10.0)]);
        let result = run(
            vec![
                dev(0, "Left", 10.0, &[("EngA", 1.0)]),
                dev(1, "Right", 10.0, &[("EngA", 1.0)]),
            ],
            table.clone(),
            settings(4),
        );

        assert!((hours_in(&result, "Left", 0) - 5.0).abs() < EPS);
        assert!((hours_in(&result, "Right", 0) - 5.0).abs() < EPS);
        assert_eq!(find(&result, "Left").end_date, Some(date(2024, 1, 15)));
        assert_eq!(find(&result, "Right").end_date, Some(date(2024, 1, 15)));
        assert_ledger_invariants(&result, &table);
    }

    #[test]
    fn dependent_starts_only_after_its_dependency_sprint() {
        let table = capacity(4, &[("EngA", 20.0)]);
        let mut after = dev(1, "After", 10.0, &[("EngA", 1.0)]);
        after.dependencies = vec![Dependency::Epic(EpicId(0))];
        let result = run(
            vec![dev(0, "Before", 10.0, &[("EngA", 1.0)]), after],
            table.clone(),
            settings(4),
        );

        assert_eq!(find(&result, "Before").end_date, Some(date(2024, 1, 1)));
        assert_eq!(hours_in(&result, "After", 0), 0.0);
        assert_eq!(find(&result, "After").start_date, Some(date(2024, 1, 15)));
        assert!((hours_in(&result, "After", 1) - 10.0).abs() < EPS);

        // The hours After could not take in sprint 0 are logged.
        let unused = &result.underutilization[0];
        assert_eq!(unused.sprint, 0);
        assert_eq!(unused.unused_hours, 10.0);
        assert_eq!(
            unused.reason,
            UnderutilizationReason::NoRemainingHoursOnAssignedEpics
        );
        assert_ledger_invariants(&result, &table);
    }

    #[test]
    fn proportional_step_alone_can_exhaust_the_resource() {
        let table = capacity(2, &[("EngA", 20.0)]);
        let result = run(
            vec![
                dev(0, "One", 100.0, &[("EngA", 0.1)]),
                dev(1, "Two", 100.0, &[("EngA", 0.1)]),
            ],
            table.clone(),
            settings(1),
        );

        // Equal desires split the whole 20 hours, leaving nothing to sweep.
        assert!((hours_in(&result, "One", 0) - 10.0).abs() < EPS);
        assert!((hours_in(&result, "Two", 0) - 10.0).abs() < EPS);
        assert_eq!(find(&result, "One").history.len(), 1);
        assert_eq!(find(&result, "Two").history.len(), 1);
        assert!(result.underutilization.is_empty());
        assert_ledger_invariants(&result, &table);
    }

    #[test]
    fn sweep_serves_capped_epics_in_pool_order() {
        let table = capacity(1, &[("EngA", 30.0)]);
        let result = run(
            vec![
                dev(0, "Small", 1.0, &[("EngA", 0.1)]),
                dev(1, "Medium", 12.0, &[("EngA", 0.1)]),
                dev(2, "Big", 100.0, &[("EngA", 0.1)]),
            ],
            table.clone(),
            settings(1),
        );

        // Shares are 10 each; Small takes 1, leaving 9 for the sweep.
        // Medium is topped up to its 12 first, Big takes the last 7.
        assert!((hours_in(&result, "Small", 0) - 1.0).abs() < EPS);
        assert!((hours_in(&result, "Medium", 0) - 12.0).abs() < EPS);
        assert!((hours_in(&result, "Big", 0) - 17.0).abs() < EPS);
        assert_eq!(find(&result, "Medium").history.len(), 2);
        assert_eq!(find(&result, "Big").history.len(), 2);
        assert!(result.underutilization.is_empty());
        assert_ledger_invariants(&result, &table);
    }

    #[test]
    fn remaining_never_rises_across_sprints() {
        let table = capacity(6, &[("EngA", 12.0), ("EngB", 8.0)]);
        let mut urgent = dev(1, "Urgent", 25.0, &[("EngA", 0.5)]);
        urgent.priority = Priority::Urgent;
        let mut follow = dev(2, "Follow", 30.0, &[("EngA", 0.5), ("EngB", 1.0)]);
        follow.dependencies = vec![Dependency::Epic(EpicId(1))];
        let result = run(
            vec![
                dev(0, "Steady", 40.0, &[("EngA", 0.5), ("EngB", 0.5)]),
                urgent,
                follow,
                epic(3, "Review", "in analysis", 10.0, &[("EngB", 0.2)]),
            ],
            table.clone(),
            settings(6),
        );

        assert!(result.allocations.len() > 4);
        for epic in &result.epics {
            assert_monotonic(epic);
        }
        assert_ledger_invariants(&result, &table);
    }

    #[test]
    fn leftover_sweep_tops_up_epics_still_wishing() {
        let table = capacity(1, &[("EngA", 20.0)]);
        let result = run(
            vec![
                dev(0, "Tiny", 2.0, &[("EngA", 0.1)]),
                dev(1, "Large", 100.0, &[("EngA", 0.1)]),
            ],
            table.clone(),
            settings(1),
        );

        // Proportional step gives Tiny its 2 and Large 10; the sweep moves the other 8 to Large.
        assert!((hours_in(&result, "Tiny", 0) - 2.0).abs() < EPS);
        assert!((hours_in(&result, "Large", 0) - 18.0).abs() < EPS);
        assert_eq!(find(&result, "Large").history.len(), 2);
        assert!(result.underutilization.is_empty());
        assert_ledger_invariants(&result, &table);
    }

    #[test]
    fn higher_tier_is_served_before_lower_tier() {
        let table = capacity(1, &[("EngA", 20.0)]);
        let mut urgent = dev(1, "Urgent", 100.0, &[("EngA", 0.5)]);
        urgent.priority = Priority::Urgent;
        let result = run(
            vec![dev(0, "Normal", 100.0, &[("EngA", 1.0)]), urgent],
            table.clone(),
            settings(1),
        );

        assert!((hours_in(&result, "Urgent", 0) - 20.0).abs() < EPS);
        assert_eq!(hours_in(&result, "Normal", 0), 0.0);
        assert_ledger_invariants(&result, &table);
    }

    #[test]
    fn lower_tier_gets_what_higher_tier_cannot_use() {
        let table = capacity(1, &[("EngA", 20.0)]);
        let mut high = dev(1, "High", 5.0, &[("EngA", 0.5)]);
        high.priority = Priority::High;
        let result = run(
            vec![dev(0, "Normal", 100.0, &[("EngA", 1.0)]), high],
            table.clone(),
            settings(1),
        );

        assert!((hours_in(&result, "High", 0) - 5.0).abs() < EPS);
        assert!((hours_in(&result, "Normal", 0) - 15.0).abs() < EPS);
        assert_ledger_invariants(&result, &table);
    }

    #[test]
    fn shares_follow_desired_hours_within_a_tier() {
        let table = capacity(1, &[("EngA", 30.0)]);
        let result = run(
            vec![
                dev(0, "Big", 100.0, &[("EngA", 0.6)]),
                dev(1, "Small", 100.0, &[("EngA", 0.3)]),
            ],
            table.clone(),
            settings(1),
        );

        assert!((hours_in(&result, "Big", 0) - 20.0).abs() < EPS);
        assert!((hours_in(&result, "Small", 0) - 10.0).abs() < EPS);
        assert_ledger_invariants(&result, &table);
    }

    #[test]
    fn development_pass_has_first_claim() {
        let table = capacity(1, &[("EngA", 20.0)]);
        let result = run(
            vec![
                epic(0, "Study", "in analysis", 100.0, &[("EngA", 1.0)]),
                dev(1, "Build", 15.0, &[("EngA", 1.0)]),
            ],
            table.clone(),
            settings(1),
        );

        assert!((hours_in(&result, "Build", 0) - 15.0).abs() < EPS);
        assert!((hours_in(&result, "Study", 0) - 5.0).abs() < EPS);
        assert_ledger_invariants(&result, &table);
    }

    #[test]
    fn only_development_mode_skips_other_epics() {
        let table = capacity(1, &[("EngA", 20.0)]);
        let mut settings = settings(1);
        settings.only_development_epics = true;
        let result = run(
            vec![
                epic(0, "Study", "in analysis", 100.0, &[("EngA", 1.0)]),
                dev(1, "Build", 15.0, &[("EngA", 1.0)]),
            ],
            table,
            settings,
        );

        assert_eq!(hours_in(&result, "Study", 0), 0.0);
        assert_eq!(result.underutilization.len(), 1);
        assert_eq!(result.underutilization[0].unused_hours, 5.0);
    }

    #[test]
    fn other_state_epics_are_never_scheduled() {
        let table = capacity(1, &[("EngA", 20.0)]);
        let result = run(
            vec![epic(0, "Closed", "done", 10.0, &[("EngA", 1.0)])],
            table,
            settings(1),
        );
        assert!(result.allocations.is_empty());
        assert_eq!(find(&result, "Closed").remaining, 10.0);
    }

    #[test]
    fn resource_without_wishes_is_reported_unassigned() {
        let table = capacity(1, &[("EngA", 20.0), ("EngB", 8.0)]);
        let result = run(
            vec![dev(0, "Solo", 100.0, &[("EngA", 1.0)])],
            table,
            settings(1),
        );

        assert_eq!(result.underutilization.len(), 1);
        let entry = &result.underutilization[0];
        assert_eq!(entry.resource, "EngB");
        assert_eq!(entry.unused_hours, 8.0);
        assert_eq!(entry.reason, UnderutilizationReason::NoAssignedEpics);
    }

    #[test]
    fn unfinished_work_at_the_ceiling_is_silent() {
        let table = capacity(3, &[("EngA", 10.0)]);
        let result = run(vec![dev(0, "Long", 100.0, &[("EngA", 1.0)])], table, settings(3));

        let long = find(&result, "Long");
        assert!((long.remaining - 70.0).abs() < EPS);
        assert_eq!(long.end_date, None);
        assert_eq!(result.sprints_simulated, 3);
    }

    #[test]
    fn pre_completed_dependency_does_not_delay_dependents() {
        let table = capacity(2, &[("EngA", 10.0)]);
        let mut next = dev(1, "Next", 10.0, &[("EngA", 1.0)]);
        next.dependencies = vec![Dependency::Epic(EpicId(0))];
        let result = run(
            vec![dev(0, "Shipped", 0.0, &[("EngA", 1.0)]), next],
            table,
            settings(2),
        );

        assert!((hours_in(&result, "Next", 0) - 10.0).abs() < EPS);
    }

    #[test]
    fn end_of_analysis_defers_development() {
        let table = capacity(3, &[("EngA", 10.0)]);
        let mut gated = dev(0, "Gated", 10.0, &[("EngA", 1.0)]);
        gated.end_analysis = Some(date(2024, 1, 10));
        let result = run(vec![gated], table, settings(3));

        assert_eq!(hours_in(&result, "Gated", 0), 0.0);
        assert_eq!(find(&result, "Gated").start_date, Some(date(2024, 1, 15)));
    }

    #[test]
    fn wish_names_match_capacity_ignoring_case() {
        let table = capacity(1, &[("EngA", 10.0)]);
        let result = run(vec![dev(0, "Solo", 10.0, &[("enga", 1.0)])], table, settings(1));
        assert_eq!(result.allocations.len(), 1);
        assert_eq!(result.allocations[0].resource, "EngA");
    }

    #[test]
    fn identical_inputs_produce_identical_ledgers() {
        let build = || {
            let mut chained = dev(2, "Chained", 30.0, &[("EngA", 0.5), ("EngB", 0.5)]);
            chained.dependencies = vec![Dependency::Epic(EpicId(0))];
            let mut urgent = epic(3, "Review", "pending development", 12.0, &[("EngB", 1.0)]);
            urgent.priority = Priority::Urgent;
            vec![
                dev(0, "Base", 25.0, &[("EngA", 0.7), ("EngB", 0.2)]),
                dev(1, "Side", 40.0, &[("EngA", 0.3)]),
                chained,
                urgent,
            ]
        };
        let table = capacity(6, &[("EngA", 18.5), ("EngB", 9.25)]);

        let first = run(build(), table.clone(), settings(6));
        let second = run(build(), table.clone(), settings(6));
        assert_eq!(first.allocations, second.allocations);
        assert_eq!(first.underutilization, second.underutilization);
        assert_ledger_invariants(&first, &table);

        // Chained never overlaps with the sprint Base finished in.
        let base_end = find(&first, "Base").end_date.unwrap();
        for allocation in &find(&first, "Chained").history {
            assert!(allocation.sprint_start > base_end);
        }
    }

    #[test]
    fn short_capacity_table_is_rejected() {
        let err = Simulator::new(
            Backlog::new(vec![]).unwrap(),
            capacity(2, &[("EngA", 10.0)]),
            settings(3),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingSprintCapacity {
                available: 2,
                required: 3
            }
        ));
    }
}
