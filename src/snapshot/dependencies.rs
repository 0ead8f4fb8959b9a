//! Resolution of dependency text into backlog edges.

use tracing::warn;

use crate::model::{Dependency, EpicId, name_key};

/// Splits dependency text on `,` and `;`, dropping blanks.
pub(super) fn split_dependencies(text: &str) -> Vec<&str> {
    text.split([',', ';'])
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .collect()
}

/// Resolves a dependency name against the epic names, by index.
///
/// An exact (case-insensitive) match wins. Otherwise the first other epic
/// whose name contains the dependency, or is contained in it, is used.
/// Names that match nothing stay unresolved.
pub(super) fn resolve_dependency(
    dependent: usize,
    name: &str,
    epic_names: &[String],
) -> Dependency {
    let key = name_key(name);
    let keys: Vec<String> = epic_names.iter().map(|n| name_key(n)).collect();

    if let Some(index) = keys.iter().position(|k| *k == key) {
        return Dependency::Epic(EpicId(index));
    }
    let partial = keys
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != dependent)
        .find(|(_, k)| !k.is_empty() && (k.contains(&key) || key.contains(k.as_str())));
    match partial {
        Some((index, _)) => Dependency::Epic(EpicId(index)),
        None => {
            warn!(
                epic = %epic_names[dependent],
                dependency = name,
                "dependency matches no epic; dependent will never start"
            );
            Dependency::Unresolved(name.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec![
            "2024-01 Login".into(),
            "2024-02 Login audit".into(),
            "2024-03 Reports".into(),
        ]
    }

    #[test]
    fn splits_on_both_separators() {
        assert_eq!(split_dependencies(" A, B ;; C "), vec!["A", "B", "C"]);
        assert!(split_dependencies("").is_empty());
    }

    #[test]
    fn exact_match_wins_over_containment() {
        assert_eq!(
            resolve_dependency(2, "2024-02 login AUDIT", &names()),
            Dependency::Epic(EpicId(1))
        );
    }

    #[test]
    fn partial_match_skips_the_dependent_itself() {
        // "Login" is contained in both 0 and 1; 0 is the dependent.
        assert_eq!(resolve_dependency(0, "Login", &names()), Dependency::Epic(EpicId(1)));
        assert_eq!(resolve_dependency(2, "Login", &names()), Dependency::Epic(EpicId(0)));
    }

    #[test]
    fn unknown_name_stays_unresolved() {
        assert_eq!(
            resolve_dependency(0, "Billing", &names()),
            Dependency::Unresolved("Billing".into())
        );
    }
}
