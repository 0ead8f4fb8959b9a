//! Dependency readiness: may an epic draw capacity in a given sprint?

use std::collections::BTreeMap;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::model::{Dependency, Epic, EpicId};

/// Date (a sprint start) at which each finished epic reached zero remaining hours.
pub type CompletionMap = BTreeMap<EpicId, Date>;

/// How to treat a dependency that has not completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyPolicy {
    /// Every dependency must have completed before the sprint starts.
    #[default]
    Strict,

    /// A dependency that isn't in development counts as already done.
    ///
    /// Used when only development epics are scheduled: their analysis or
    /// pending dependencies are never scheduled, so waiting on them would
    /// block forever.
    AssumeNonDevelopmentDone,
}

/// Pure readiness predicate over an epic, a sprint start and a completion snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadinessGate {
    pub policy: DependencyPolicy,
}

impl ReadinessGate {
    pub fn new(policy: DependencyPolicy) -> Self {
        Self { policy }
    }

    /// Whether `epic` may consume capacity in the sprint starting `sprint_start`.
    ///
    /// Closed before the epic's end of analysis. Otherwise open only if every
    /// dependency completed strictly before `sprint_start`: a dependency
    /// finishing in the same sprint does not hand off until the next one.
    pub fn is_ready(
        &self,
        epic: &Epic,
        sprint_start: Date,
        completions: &CompletionMap,
        epics: &[Epic],
    ) -> bool {
        if epic
            .end_analysis
            .is_some_and(|end_analysis| sprint_start < end_analysis)
        {
            return false;
        }

        epic.dependencies.iter().all(|dependency| match dependency {
            Dependency::Unresolved(_) => false,
            Dependency::Epic(id) => match completions.get(id) {
                Some(done) => *done < sprint_start,
                None => self.assumed_done(*id, epics),
            },
        })
    }

    fn assumed_done(&self, id: EpicId, epics: &[Epic]) -> bool {
        match self.policy {
            DependencyPolicy::Strict => false,
            DependencyPolicy::AssumeNonDevelopmentDone => epics
                .get(id.0)
                .is_some_and(|dependency| !dependency.state.is_in_development()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::civil::date;

    fn epics() -> Vec<Epic> {
        let analysis = Epic::new(EpicId(0), "Spec", "in analysis", 10.0);
        let dev = Epic::new(EpicId(1), "Core", "in development", 10.0);
        let mut dependent = Epic::new(EpicId(2), "UI", "in development", 10.0);
        dependent.dependencies = vec![Dependency::Epic(EpicId(0)), Dependency::Epic(EpicId(1))];
        vec![analysis, dev, dependent]
    }

    #[test]
    fn no_dependencies_is_ready() {
        let epics = epics();
        let gate = ReadinessGate::default();
        assert!(gate.is_ready(&epics[0], date(2024, 1, 1), &CompletionMap::new(), &epics));
    }

    #[test]
    fn end_of_analysis_closes_the_gate_until_reached() {
        let mut epics = epics();
        epics[0].end_analysis = Some(date(2024, 1, 10));
        let gate = ReadinessGate::default();
        let completions = CompletionMap::new();
        assert!(!gate.is_ready(&epics[0], date(2024, 1, 1), &completions, &epics));
        assert!(gate.is_ready(&epics[0], date(2024, 1, 10), &completions, &epics));
        assert!(gate.is_ready(&epics[0], date(2024, 1, 15), &completions, &epics));
    }

    #[test]
    fn dependency_must_finish_before_the_sprint() {
        let epics = epics();
        let gate = ReadinessGate::default();
        let mut completions = CompletionMap::new();
        completions.insert(EpicId(0), date(2024, 1, 1));
        completions.insert(EpicId(1), date(2024, 1, 1));

        // Same-sprint completion does not hand off.
        assert!(!gate.is_ready(&epics[2], date(2024, 1, 1), &completions, &epics));
        assert!(gate.is_ready(&epics[2], date(2024, 1, 15), &completions, &epics));
    }

    #[test]
    fn unfinished_dependency_blocks_under_strict_policy() {
        let epics = epics();
        let mut completions = CompletionMap::new();
        completions.insert(EpicId(1), date(2024, 1, 1));
        let gate = ReadinessGate::new(DependencyPolicy::Strict);
        assert!(!gate.is_ready(&epics[2], date(2024, 2, 1), &completions, &epics));
    }

    #[test]
    fn non_development_dependency_is_assumed_done_when_configured() {
        let epics = epics();
        let mut completions = CompletionMap::new();
        completions.insert(EpicId(1), date(2024, 1, 1));
        let gate = ReadinessGate::new(DependencyPolicy::AssumeNonDevelopmentDone);
        assert!(gate.is_ready(&epics[2], date(2024, 2, 1), &completions, &epics));

        // A development dependency is never assumed.
        let pending = CompletionMap::new();
        assert!(!gate.is_ready(&epics[2], date(2024, 2, 1), &pending, &epics));
    }

    #[test]
    fn unresolved_dependency_blocks_forever() {
        let mut epics = epics();
        epics[0].dependencies = vec![Dependency::Unresolved("Ghost".into())];
        let gate = ReadinessGate::new(DependencyPolicy::AssumeNonDevelopmentDone);
        assert!(!gate.is_ready(&epics[0], date(2030, 1, 1), &CompletionMap::new(), &epics));
    }
}
