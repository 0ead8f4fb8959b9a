//! The backlog: an arena of epics whose dependencies point at each other by index.

use serde::Serialize;

use super::{Dependency, Epic, EpicId};

/// Errors that make a set of epics unusable as a backlog.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BacklogError {
    #[error("epic '{name}' sits at index {index} but carries id {id}")]
    IdMismatch {
        name: String,
        index: usize,
        id: usize,
    },

    #[error("epic '{name}' depends on unknown epic id {id}")]
    DanglingDependency { name: String, id: usize },

    #[error("epic '{0}' depends on itself")]
    SelfDependency(String),

    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

/// Epics in load order. Each epic's id is its index, and the dependency graph is acyclic.
#[derive(Debug, Clone, Serialize)]
pub struct Backlog {
    epics: Vec<Epic>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl Backlog {
    /// Validates ids and dependency edges, then rejects cycles.
    pub fn new(epics: Vec<Epic>) -> Result<Self, BacklogError> {
        for (index, epic) in epics.iter().enumerate() {
            if epic.id.0 != index {
                return Err(BacklogError::IdMismatch {
                    name: epic.name.clone(),
                    index,
                    id: epic.id.0,
                });
            }
            for dependency in &epic.dependencies {
                if let Dependency::Epic(target) = dependency {
                    if target.0 >= epics.len() {
                        return Err(BacklogError::DanglingDependency {
                            name: epic.name.clone(),
                            id: target.0,
                        });
                    }
                    if *target == epic.id {
                        return Err(BacklogError::SelfDependency(epic.name.clone()));
                    }
                }
            }
        }
        if let Some(cycle) = find_cycle(&epics) {
            return Err(BacklogError::Cycle(
                cycle.iter().map(|id| epics[id.0].name.clone()).collect(),
            ));
        }
        Ok(Self { epics })
    }

    pub fn len(&self) -> usize {
        self.epics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epics.is_empty()
    }

    pub fn into_epics(self) -> Vec<Epic> {
        self.epics
    }
}

/// Depth-first search over resolved edges. Returns the epics on the first
/// cycle found, with the entry epic repeated at the end.
fn find_cycle(epics: &[Epic]) -> Option<Vec<EpicId>> {
    let edges: Vec<Vec<usize>> = epics
        .iter()
        .map(|epic| {
            epic.dependencies
                .iter()
                .filter_map(|d| match d {
                    Dependency::Epic(id) => Some(id.0),
                    Dependency::Unresolved(_) => None,
                })
                .collect()
        })
        .collect();
    let mut marks = vec![Mark::Unvisited; epics.len()];

    for root in 0..epics.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        // (node, index of the next edge to follow)
        let mut stack = vec![(root, 0_usize)];
        marks[root] = Mark::InProgress;

        while let Some((node, edge)) = stack.last_mut() {
            let node = *node;
            let Some(&child) = edges[node].get(*edge) else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };
            *edge += 1;

            match marks[child] {
                Mark::Unvisited => {
                    marks[child] = Mark::InProgress;
                    stack.push((child, 0));
                }
                Mark::InProgress => {
                    let start = stack.iter().position(|&(n, _)| n == child)?;
                    let mut cycle: Vec<EpicId> =
                        stack[start..].iter().map(|&(n, _)| EpicId(n)).collect();
                    cycle.push(EpicId(child));
                    return Some(cycle);
                }
                Mark::Done => {}
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epic(id: usize, name: &str, deps: &[usize]) -> Epic {
        let mut epic = Epic::new(EpicId(id), name, "in development", 10.0);
        epic.dependencies = deps.iter().map(|&d| Dependency::Epic(EpicId(d))).collect();
        epic
    }

    #[test]
    fn accepts_acyclic_graph() {
        let backlog = Backlog::new(vec![
            epic(0, "A", &[]),
            epic(1, "B", &[0]),
            epic(2, "C", &[0, 1]),
        ])
        .unwrap();
        assert_eq!(backlog.len(), 3);
        assert_eq!(backlog.into_epics()[2].name, "C");
    }

    #[test]
    fn rejects_two_epic_cycle() {
        let err = Backlog::new(vec![epic(0, "A", &[1]), epic(1, "B", &[0])]).unwrap_err();
        assert_eq!(
            err,
            BacklogError::Cycle(vec!["A".into(), "B".into(), "A".into()])
        );
    }

    #[test]
    fn rejects_longer_cycle_behind_a_clean_prefix() {
        let err = Backlog::new(vec![
            epic(0, "Root", &[1]),
            epic(1, "X", &[2]),
            epic(2, "Y", &[3]),
            epic(3, "Z", &[1]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            BacklogError::Cycle(vec!["X".into(), "Y".into(), "Z".into(), "X".into()])
        );
    }

    #[test]
    fn rejects_self_dependency() {
        let err = Backlog::new(vec![epic(0, "A", &[0])]).unwrap_err();
        assert_eq!(err, BacklogError::SelfDependency("A".into()));
    }

    #[test]
    fn rejects_dangling_and_misplaced_ids() {
        let err = Backlog::new(vec![epic(0, "A", &[7])]).unwrap_err();
        assert!(matches!(err, BacklogError::DanglingDependency { id: 7, .. }));

        let err = Backlog::new(vec![epic(1, "A", &[])]).unwrap_err();
        assert!(matches!(
            err,
            BacklogError::IdMismatch {
                index: 0,
                id: 1,
                ..
            }
        ));
    }

    #[test]
    fn unresolved_dependencies_do_not_form_cycles() {
        let mut a = epic(0, "A", &[]);
        a.dependencies.push(Dependency::Unresolved("Ghost".into()));
        assert!(Backlog::new(vec![a]).is_ok());
    }
}
