//! Reconciliation between device entries and the desired prefix list.
//!
//! The difference is computed over ordered lists, not sets: inputs are
//! scanned in order and every element is judged on its own, so duplicates
//! survive into the output and results are reproducible.

use std::collections::HashSet;

/// Changes needed to turn the device's tagged entries into the desired list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Entries of `current` absent from `desired`, in `current` order
    pub to_remove: Vec<String>,
    /// Entries of `desired` absent from `current`, in `desired` order
    pub to_add: Vec<String>,
}

impl Diff {
    /// No change required
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

/// Compute the removals and additions reconciling `current` with `desired`.
///
/// # Examples
/// ```
/// use asnlist::reconcile::diff;
///
/// let current = vec!["10.0.0.0/8".to_string()];
/// let desired = vec!["10.0.0.0/8".to_string(), "11.0.0.0/8".to_string()];
/// let d = diff(&current, &desired);
/// assert!(d.to_remove.is_empty());
/// assert_eq!(d.to_add, vec!["11.0.0.0/8".to_string()]);
/// ```
pub fn diff(current: &[String], desired: &[String]) -> Diff {
    Diff {
        to_remove: missing_from(current, desired),
        to_add: missing_from(desired, current),
    }
}

/// Elements of `source`, in order and with repeats, that never occur in `other`
fn missing_from(source: &[String], other: &[String]) -> Vec<String> {
    // Lookup index only; the output is built by scanning `source`
    let present: HashSet<&str> = other.iter().map(String::as_str).collect();

    source
        .iter()
        .filter(|entry| !present.contains(entry.as_str()))
        .cloned()
        .collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Small alphabet so that overlaps and duplicates are common
    fn prefix_list() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(
            (0u8..6, 6u8..10).prop_map(|(a, len)| format!("{}.0.0.0/{}", a, len)),
            0..20,
        )
    }

    proptest! {
        #[test]
        fn prop_removals_absent_from_desired(current in prefix_list(), desired in prefix_list()) {
            let d = diff(&current, &desired);
            for entry in &d.to_remove {
                prop_assert!(!desired.contains(entry));
            }
        }

        #[test]
        fn prop_additions_absent_from_current(current in prefix_list(), desired in prefix_list()) {
            let d = diff(&current, &desired);
            for entry in &d.to_add {
                prop_assert!(!current.contains(entry));
            }
        }

        #[test]
        fn prop_self_diff_is_empty(entries in prefix_list()) {
            prop_assert!(diff(&entries, &entries).is_empty());
        }

        /// Kept + removed partitions `current`, with multiplicity
        #[test]
        fn prop_partition_of_current(current in prefix_list(), desired in prefix_list()) {
            let d = diff(&current, &desired);
            let kept = current.iter().filter(|e| desired.contains(e)).count();
            prop_assert_eq!(kept + d.to_remove.len(), current.len());
        }

        /// After applying the diff, the distinct values on the device equal
        /// the distinct desired values
        #[test]
        fn prop_apply_reaches_desired(current in prefix_list(), desired in prefix_list()) {
            let d = diff(&current, &desired);

            let mut result: Vec<String> = current
                .iter()
                .filter(|e| !d.to_remove.contains(e))
                .cloned()
                .collect();
            result.extend(d.to_add.iter().cloned());

            let result_set: HashSet<&String> = result.iter().collect();
            let desired_set: HashSet<&String> = desired.iter().collect();
            prop_assert_eq!(result_set, desired_set);
        }
    }
}
