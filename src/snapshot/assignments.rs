//! Parsing of "assigned to" text into resource wishes.
//!
//! Entries are separated by `,` or `;` and may end with a percentage:
//! `Alice 50%, Bob; Carol 20 %`. An entry without one asks for 100%.

use tracing::warn;

use crate::model::{Wish, name_key};

use super::{Result, SnapshotError};

/// Parses assignment text against the known resource names.
///
/// A name matches the first resource equal to it or containing it, ignoring
/// case. Entries matching no resource are dropped with a warning, and a
/// second entry for an already-wished resource is ignored.
pub(super) fn parse_assignments(epic: &str, text: &str, resources: &[String]) -> Result<Vec<Wish>> {
    let mut wishes: Vec<Wish> = Vec::new();
    for entry in text.split([',', ';']) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (name, percentage) = split_percentage(entry);
        if !(percentage > 0.0 && percentage <= 1.0) {
            return Err(SnapshotError::InvalidPercentage {
                epic: epic.to_string(),
                entry: entry.to_string(),
            });
        }
        let Some(resource) = match_resource(name, resources) else {
            warn!(epic, entry, "assignment matches no resource");
            continue;
        };
        if wishes.iter().any(|w| w.resource == resource) {
            warn!(epic, resource, "resource assigned twice; keeping the first share");
            continue;
        }
        wishes.push(Wish {
            resource: resource.to_string(),
            percentage,
        });
    }
    Ok(wishes)
}

/// Splits a trailing `NN%` (one to three digits) off an entry.
fn split_percentage(entry: &str) -> (&str, f64) {
    let Some(body) = entry.strip_suffix('%') else {
        return (entry, 1.0);
    };
    let body = body.trim_end();
    let digits = body
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .count();
    if digits == 0 || digits > 3 {
        return (entry, 1.0);
    }
    let (name, number) = body.split_at(body.len() - digits);
    match number.parse::<u32>() {
        Ok(value) => (name.trim(), f64::from(value) / 100.0),
        Err(_) => (entry, 1.0),
    }
}

fn match_resource<'a>(name: &str, resources: &'a [String]) -> Option<&'a str> {
    let key = name_key(name);
    if key.is_empty() {
        return None;
    }
    resources
        .iter()
        .find(|r| {
            let resource = name_key(r);
            resource == key || resource.contains(&key)
        })
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources() -> Vec<String> {
        vec!["Alice Martin".into(), "Bob".into(), "Carol".into()]
    }

    #[test]
    fn parses_names_and_percentages() {
        let wishes = parse_assignments("E", "alice 50%, Bob; Carol 20 %", &resources()).unwrap();
        assert_eq!(
            wishes,
            vec![
                Wish {
                    resource: "Alice Martin".into(),
                    percentage: 0.5
                },
                Wish {
                    resource: "Bob".into(),
                    percentage: 1.0
                },
                Wish {
                    resource: "Carol".into(),
                    percentage: 0.2
                },
            ]
        );
    }

    #[test]
    fn drops_unknown_and_repeated_names() {
        let wishes = parse_assignments("E", "Dave 30%, Bob 40%, bob 10%,,", &resources()).unwrap();
        assert_eq!(wishes.len(), 1);
        assert_eq!(wishes[0].percentage, 0.4);
    }

    #[test]
    fn rejects_out_of_range_percentages() {
        let err = parse_assignments("E", "Bob 150%", &resources()).unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidPercentage { .. }));
        assert!(parse_assignments("E", "Bob 0%", &resources()).is_err());
    }

    #[test]
    fn empty_text_has_no_wishes() {
        assert!(parse_assignments("E", "  ", &resources()).unwrap().is_empty());
    }
}
