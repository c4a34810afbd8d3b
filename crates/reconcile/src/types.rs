//! Core types for key/value reconciliation

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

/// Fallback used when the store holds no value for a path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Bool(bool),
    Text(String),
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Whether an entry writes to the store or only reads from it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKind {
    /// The entry owns the value at its path and writes it
    ManagedWrite { value: String },
    /// The entry only observes the path
    ReadOnlyReference,
}

/// One key/value binding under management
///
/// Entries compare by every field. Two entries with the same path but a
/// different value, flag, label or policy are distinct records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "EntryRecord", into = "EntryRecord")]
pub struct Entry {
    /// Store key
    pub path: String,
    /// Legacy alias exposed in the aggregate map (empty = not exposed)
    pub label: String,
    pub kind: EntryKind,
    /// Opaque metadata stored alongside the value
    pub flags: u64,
    pub default: Option<DefaultValue>,
    /// Delete the key from the store when the entry stops being desired
    pub delete_on_remove: bool,
}

impl Entry {
    /// Create an entry that writes `value` to `path`
    pub fn write(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: String::new(),
            kind: EntryKind::ManagedWrite {
                value: value.into(),
            },
            flags: 0,
            default: None,
            delete_on_remove: false,
        }
    }

    /// Create an entry that only reads `path`
    pub fn read(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: String::new(),
            kind: EntryKind::ReadOnlyReference,
            flags: 0,
            default: None,
            delete_on_remove: false,
        }
    }

    /// Create an entry from an optionally declared literal value.
    ///
    /// An absent or empty literal yields a read-only reference.
    pub fn declared(path: impl Into<String>, value: Option<String>) -> Self {
        match value {
            Some(v) if !v.is_empty() => Self::write(path, v),
            _ => Self::read(path),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_flags(mut self, flags: u64) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_default(mut self, default: impl Into<DefaultValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_delete(mut self, delete_on_remove: bool) -> Self {
        self.delete_on_remove = delete_on_remove;
        self
    }

    /// The literal value, or `""` for read-only references
    pub fn value(&self) -> &str {
        match &self.kind {
            EntryKind::ManagedWrite { value } => value,
            EntryKind::ReadOnlyReference => "",
        }
    }

    pub fn is_managed_write(&self) -> bool {
        matches!(self.kind, EntryKind::ManagedWrite { .. })
    }

    /// Reject entries that cannot address the store
    pub fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(Error::MalformedEntry {
                label: self.label.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{} ({})", self.path, self.label)
        }
    }
}

/// Serialized shape of an entry, shared by manifests and state files
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
    path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    value: String,
    #[serde(default)]
    flags: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<DefaultValue>,
    #[serde(default)]
    delete: bool,
}

impl From<EntryRecord> for Entry {
    fn from(record: EntryRecord) -> Self {
        Self {
            path: record.path,
            label: record.name,
            kind: if record.value.is_empty() {
                EntryKind::ReadOnlyReference
            } else {
                EntryKind::ManagedWrite {
                    value: record.value,
                }
            },
            flags: record.flags,
            default: record.default,
            delete_on_remove: record.delete,
        }
    }
}

impl From<Entry> for EntryRecord {
    fn from(entry: Entry) -> Self {
        let value = match entry.kind {
            EntryKind::ManagedWrite { value } => value,
            EntryKind::ReadOnlyReference => String::new(),
        };
        Self {
            name: entry.label,
            path: entry.path,
            value,
            flags: entry.flags,
            default: entry.default,
            delete: entry.delete_on_remove,
        }
    }
}

/// A set of entries keyed by the whole record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntrySet(BTreeSet<Entry>);

impl EntrySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning false if an identical record was present
    pub fn insert(&mut self, entry: Entry) -> bool {
        self.0.insert(entry)
    }

    pub fn contains(&self, entry: &Entry) -> bool {
        self.0.contains(entry)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.0.iter()
    }

    /// Entries in `self` that have no identical record in `other`
    pub fn difference(&self, other: &EntrySet) -> Vec<Entry> {
        self.0.difference(&other.0).cloned().collect()
    }

    /// Validate every entry in the set
    pub fn validate(&self) -> Result<()> {
        self.0.iter().try_for_each(Entry::validate)
    }

    /// Look up the first entry stored at `path`
    pub fn find_path(&self, path: &str) -> Option<&Entry> {
        self.0.iter().find(|e| e.path == path)
    }
}

impl FromIterator<Entry> for EntrySet {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for EntrySet {
    type Item = Entry;
    type IntoIter = std::collections::btree_set::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a EntrySet {
    type Item = &'a Entry;
    type IntoIter = std::collections::btree_set::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A single step performed (or predicted) during reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Value written to the store
    Put { path: String, flags: u64 },
    /// Key deleted from the store
    Delete { path: String },
    /// Delete suppressed because the path was rewritten in the same pass
    KeepRewritten { path: String },
    /// Entry dropped from tracking, store key left untouched
    Untrack { path: String },
    /// Nothing to write for an added entry
    SkipEmptyWrite { path: String },
    /// Authoritative value fetched during read-back
    Read { path: String, found: bool },
}

impl Operation {
    pub fn path(&self) -> &str {
        match self {
            Self::Put { path, .. }
            | Self::Delete { path }
            | Self::KeepRewritten { path }
            | Self::Untrack { path }
            | Self::SkipEmptyWrite { path }
            | Self::Read { path, .. } => path,
        }
    }

    /// Check if the operation changes the store
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Put { .. } | Self::Delete { .. })
    }
}

/// Counts of operations performed in one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub written: usize,
    pub deleted: usize,
    pub kept_rewritten: usize,
    pub untracked: usize,
    pub skipped_empty: usize,
    pub read: usize,
}

impl ApplySummary {
    /// Number of store mutations
    pub fn total_changes(&self) -> usize {
        self.written + self.deleted
    }

    /// Check if nothing in the store was changed
    pub fn is_noop(&self) -> bool {
        self.total_changes() == 0
    }

    pub fn add(&mut self, operation: &Operation) {
        match operation {
            Operation::Put { .. } => self.written += 1,
            Operation::Delete { .. } => self.deleted += 1,
            Operation::KeepRewritten { .. } => self.kept_rewritten += 1,
            Operation::Untrack { .. } => self.untracked += 1,
            Operation::SkipEmptyWrite { .. } => self.skipped_empty += 1,
            Operation::Read { .. } => self.read += 1,
        }
    }

    pub fn merge(&mut self, other: &ApplySummary) {
        self.written += other.written;
        self.deleted += other.deleted;
        self.kept_rewritten += other.kept_rewritten;
        self.untracked += other.untracked;
        self.skipped_empty += other.skipped_empty;
        self.read += other.read;
    }
}

/// Observed state produced by an apply or a plain read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedResult {
    /// Entries with live values and flags merged in
    pub entries: EntrySet,
    /// Label to effective value, for every labelled entry
    pub vars: BTreeMap<String, String>,
    /// Scope the reconciliation ran in
    pub scope: String,
    pub summary: ApplySummary,
}
