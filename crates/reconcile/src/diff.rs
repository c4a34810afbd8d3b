//! Change detection between previous and desired entry sets

use crate::error::Result;
use crate::types::{ApplySummary, Entry, EntrySet, Operation};
use std::collections::BTreeSet;

/// Whole-record difference between two entry sets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Desired records with no identical previous record
    pub to_add: Vec<Entry>,
    /// Previous records with no identical desired record
    pub to_remove: Vec<Entry>,
}

impl ChangeSet {
    /// Compute `desired - previous` and `previous - desired`
    pub fn compute(previous: &EntrySet, desired: &EntrySet) -> Self {
        Self {
            to_add: desired.difference(previous),
            to_remove: previous.difference(desired),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Paths that appear on both sides, i.e. edited in place
    pub fn rewritten_paths(&self) -> BTreeSet<&str> {
        let added: BTreeSet<&str> = self.to_add.iter().map(|e| e.path.as_str()).collect();
        self.to_remove
            .iter()
            .map(|e| e.path.as_str())
            .filter(|p| added.contains(p))
            .collect()
    }
}

/// Value an added entry writes, if any
pub(crate) fn write_value(entry: &Entry) -> Option<&str> {
    Some(entry.value()).filter(|v| entry.is_managed_write() && !v.is_empty())
}

/// What happens to a removed entry given the paths written in this pass
pub(crate) fn removal(entry: &Entry, added_paths: &BTreeSet<String>) -> Operation {
    let path = entry.path.clone();
    if added_paths.contains(&entry.path) {
        Operation::KeepRewritten { path }
    } else if !entry.delete_on_remove {
        Operation::Untrack { path }
    } else {
        Operation::Delete { path }
    }
}

/// Predicted outcome of a reconciliation, computed without the store
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub changes: ChangeSet,
    /// Operations in the order they would run
    pub operations: Vec<Operation>,
    /// The aggregate map will be recomputed
    pub vars_recomputed: bool,
}

impl Plan {
    pub fn summary(&self) -> ApplySummary {
        let mut summary = ApplySummary::default();
        for op in &self.operations {
            summary.add(op);
        }
        summary
    }

    /// Check if applying would touch the store
    pub fn has_mutations(&self) -> bool {
        self.operations.iter().any(Operation::is_mutation)
    }
}

/// Predict the write and delete phases of `apply`, assuming every put succeeds
pub fn plan(previous: &EntrySet, desired: &EntrySet) -> Result<Plan> {
    previous.validate()?;
    desired.validate()?;

    let changes = ChangeSet::compute(previous, desired);
    let mut operations = Vec::with_capacity(changes.to_add.len() + changes.to_remove.len());
    let mut added_paths = BTreeSet::new();

    for entry in &changes.to_add {
        match write_value(entry) {
            Some(_) => {
                added_paths.insert(entry.path.clone());
                operations.push(Operation::Put {
                    path: entry.path.clone(),
                    flags: entry.flags,
                });
            }
            None => operations.push(Operation::SkipEmptyWrite {
                path: entry.path.clone(),
            }),
        }
    }

    for entry in &changes.to_remove {
        operations.push(removal(entry, &added_paths));
    }

    Ok(Plan {
        vars_recomputed: !changes.is_empty(),
        changes,
        operations,
    })
}

/// Predict teardown of every tracked entry
pub fn teardown_plan(entries: &EntrySet) -> Result<Plan> {
    entries.validate()?;
    let added_paths = BTreeSet::new();
    Ok(Plan {
        changes: ChangeSet {
            to_add: Vec::new(),
            to_remove: entries.iter().cloned().collect(),
        },
        operations: entries.iter().map(|e| removal(e, &added_paths)).collect(),
        vars_recomputed: !entries.is_empty(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(entries: impl IntoIterator<Item = Entry>) -> EntrySet {
        entries.into_iter().collect()
    }

    #[test]
    fn test_identical_sets_have_no_changes() {
        let a = set([Entry::write("a", "1"), Entry::read("b").with_label("b")]);
        let changes = ChangeSet::compute(&a, &a.clone());
        assert!(changes.is_empty());
    }

    #[test]
    fn test_difference_is_by_whole_record() {
        let previous = set([Entry::write("a", "1"), Entry::write("keep", "x")]);
        let desired = set([Entry::write("a", "2"), Entry::write("keep", "x")]);
        let changes = ChangeSet::compute(&previous, &desired);

        assert_eq!(changes.to_add, vec![Entry::write("a", "2")]);
        assert_eq!(changes.to_remove, vec![Entry::write("a", "1")]);
        assert_eq!(changes.rewritten_paths(), BTreeSet::from(["a"]));
    }

    #[test]
    fn test_flag_change_is_remove_plus_add() {
        let previous = set([Entry::write("a", "1")]);
        let desired = set([Entry::write("a", "1").with_flags(9)]);
        let changes = ChangeSet::compute(&previous, &desired);
        assert_eq!(changes.to_add.len(), 1);
        assert_eq!(changes.to_remove.len(), 1);
    }

    #[test]
    fn test_plan_value_edit_is_put_without_delete() {
        let previous = set([Entry::write("a", "1").with_delete(true)]);
        let desired = set([Entry::write("a", "2").with_delete(true)]);
        let plan = plan(&previous, &desired).unwrap();

        assert_eq!(
            plan.operations,
            vec![
                Operation::Put {
                    path: "a".into(),
                    flags: 0
                },
                Operation::KeepRewritten { path: "a".into() },
            ]
        );
        assert!(plan.vars_recomputed);
        assert_eq!(plan.summary().deleted, 0);
    }

    #[test]
    fn test_plan_removed_entry_respects_delete_policy() {
        let previous = set([
            Entry::write("gone", "1").with_delete(true),
            Entry::write("dropped", "1"),
        ]);
        let plan = plan(&previous, &EntrySet::new()).unwrap();
        assert!(plan.operations.contains(&Operation::Delete {
            path: "gone".into()
        }));
        assert!(plan.operations.contains(&Operation::Untrack {
            path: "dropped".into()
        }));
    }

    #[test]
    fn test_plan_read_only_entry_writes_nothing() {
        let desired = set([Entry::read("a").with_label("a")]);
        let plan = plan(&EntrySet::new(), &desired).unwrap();
        assert_eq!(
            plan.operations,
            vec![Operation::SkipEmptyWrite { path: "a".into() }]
        );
        assert!(!plan.has_mutations());
    }

    #[test]
    fn test_plan_rejects_malformed_entry() {
        let desired = set([Entry::write("", "1").with_label("broken")]);
        assert!(plan(&EntrySet::new(), &desired).is_err());
    }

    #[test]
    fn test_teardown_plan() {
        let entries = set([
            Entry::write("a", "1").with_delete(true),
            Entry::write("b", "2"),
        ]);
        let plan = teardown_plan(&entries).unwrap();
        assert_eq!(plan.summary().deleted, 1);
        assert_eq!(plan.summary().untracked, 1);
    }
}
