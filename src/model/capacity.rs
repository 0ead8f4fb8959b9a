//! Per-sprint, per-resource capacity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::name_key;

/// Rounds to two decimals, the precision of every exported figure.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Hours a resource can give in one sprint, split into non-fungible buckets.
///
/// Only `development` is drawn down by the engine. The other two are carried
/// through for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceCapacity {
    pub development: f64,
    pub maintenance: f64,
    pub analysis: f64,
}

impl ResourceCapacity {
    pub fn new(development: f64, maintenance: f64, analysis: f64) -> Self {
        Self {
            development,
            maintenance,
            analysis,
        }
    }

    /// Scales every bucket, e.g. for a sprint shortened by holidays.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(
            self.development * factor,
            self.maintenance * factor,
            self.analysis * factor,
        )
    }

    /// Removes `absent_days` worth of the daily rate from every bucket.
    #[must_use]
    pub fn less_absence(self, working_days: f64, absent_days: f64) -> Self {
        let reduce = |hours: f64| hours - (hours / working_days) * absent_days;
        Self::new(
            reduce(self.development),
            reduce(self.maintenance),
            reduce(self.analysis),
        )
    }

    /// Clamps negatives to zero and rounds to two decimals.
    #[must_use]
    pub fn settled(self) -> Self {
        let settle = |hours: f64| round2(hours.max(0.0));
        Self::new(
            settle(self.development),
            settle(self.maintenance),
            settle(self.analysis),
        )
    }
}

/// One sprint's capacities keyed by resource name.
pub type SprintCapacity = BTreeMap<String, ResourceCapacity>;

/// The immutable `{sprint index -> {resource -> capacity}}` input of the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacityTable {
    sprints: Vec<SprintCapacity>,
}

impl CapacityTable {
    pub fn new(sprints: Vec<SprintCapacity>) -> Self {
        Self { sprints }
    }

    /// Number of sprints the table covers.
    pub fn sprint_count(&self) -> usize {
        self.sprints.len()
    }

    pub fn sprint(&self, index: usize) -> Option<&SprintCapacity> {
        self.sprints.get(index)
    }

    /// Looks up a resource in a sprint, ignoring case.
    pub fn get(&self, sprint: usize, resource: &str) -> Option<&ResourceCapacity> {
        let table = self.sprints.get(sprint)?;
        table.get(resource).or_else(|| {
            let key = name_key(resource);
            table
                .iter()
                .find(|(name, _)| name_key(name) == key)
                .map(|(_, capacity)| capacity)
        })
    }

    /// Every resource name appearing in any sprint, sorted case-insensitively.
    pub fn resources(&self) -> Vec<String> {
        let mut seen = BTreeMap::new();
        for table in &self.sprints {
            for name in table.keys() {
                seen.entry(name_key(name)).or_insert_with(|| name.clone());
            }
        }
        seen.into_values().collect()
    }

    /// Maps a resource name to the spelling used in the table.
    pub fn canonical_resource(&self, resource: &str) -> Option<String> {
        let key = name_key(resource);
        self.resources().into_iter().find(|name| name_key(name) == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CapacityTable {
        let mut sprint = SprintCapacity::new();
        sprint.insert("Alice".into(), ResourceCapacity::new(20.0, 5.0, 2.0));
        sprint.insert("bob".into(), ResourceCapacity::new(10.0, 0.0, 0.0));
        CapacityTable::new(vec![sprint])
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round2(2.0 / 3.0), 0.67);
    }

    #[test]
    fn settles_negative_buckets_to_zero() {
        let capacity = ResourceCapacity::new(-1.0, 3.333, 0.0).settled();
        assert_eq!(capacity, ResourceCapacity::new(0.0, 3.33, 0.0));
    }

    #[test]
    fn absence_removes_daily_rate() {
        let capacity = ResourceCapacity::new(30.0, 15.0, 0.0).less_absence(15.0, 5.0);
        assert!((capacity.development - 20.0).abs() < 1e-9);
        assert!((capacity.maintenance - 10.0).abs() < 1e-9);
    }

    #[test]
    fn lookup_ignores_case() {
        let table = table();
        assert_eq!(table.get(0, "ALICE").map(|c| c.development), Some(20.0));
        assert!(table.get(1, "Alice").is_none());
        assert_eq!(table.canonical_resource("BOB").as_deref(), Some("bob"));
        assert_eq!(table.resources(), vec!["Alice".to_string(), "bob".to_string()]);
    }
}
