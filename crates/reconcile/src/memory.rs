//! In-memory store for tests and dry runs
//!
//! [`MemoryStore`] keeps keys per scope, records every call it receives and
//! can be told to fail on particular paths, which makes ordering and abort
//! behaviour of the engine observable without a network.
//!
//! ```
//! use reconcile::{Entry, EntrySet, KeyClient, MemoryStore, apply_simple};
//!
//! let store = MemoryStore::new();
//! let client = KeyClient::new(&store, "dc1", "");
//! let desired: EntrySet = [Entry::write("app/port", "8080")].into_iter().collect();
//!
//! apply_simple(&EntrySet::new(), &desired, &client).unwrap();
//! assert_eq!(store.value("dc1", "app/port"), Some(("8080".to_string(), 0)));
//! ```

use crate::client::{KvStore, StoredValue};
use crate::scope::{ScopeLookupError, ScopeSource};
use anyhow::{Result, bail};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A call received by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get {
        scope: String,
        path: String,
    },
    Put {
        scope: String,
        token: String,
        path: String,
        value: String,
        flags: u64,
    },
    Delete {
        scope: String,
        path: String,
    },
}

/// How the store answers scope discovery
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScopeAnswer {
    Scope(String),
    Denied,
    Unreachable,
}

#[derive(Debug)]
struct Inner {
    keys: BTreeMap<(String, String), StoredValue>,
    calls: Vec<StoreCall>,
    failing: BTreeSet<String>,
    scope: ScopeAnswer,
}

/// Scope-partitioned in-memory key/value store
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store whose agent reports scope `dc1`
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                keys: BTreeMap::new(),
                calls: Vec::new(),
                failing: BTreeSet::new(),
                scope: ScopeAnswer::Scope("dc1".to_string()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a key without recording a call
    pub fn insert(&self, scope: &str, path: &str, value: &str, flags: u64) {
        self.lock().keys.insert(
            (scope.to_string(), path.to_string()),
            StoredValue {
                value: value.to_string(),
                flags,
            },
        );
    }

    /// Current value and flags of a key
    pub fn value(&self, scope: &str, path: &str) -> Option<(String, u64)> {
        self.lock()
            .keys
            .get(&(scope.to_string(), path.to_string()))
            .map(|s| (s.value.clone(), s.flags))
    }

    /// Number of keys across all scopes
    pub fn len(&self) -> usize {
        self.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Only the put and delete calls, in order
    pub fn mutations(&self) -> Vec<StoreCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| !matches!(c, StoreCall::Get { .. }))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make every call touching `path` fail
    pub fn fail_on(&self, path: &str) {
        self.lock().failing.insert(path.to_string());
    }

    /// Set the scope reported by the agent
    pub fn set_local_scope(&self, scope: &str) {
        self.lock().scope = ScopeAnswer::Scope(scope.to_string());
    }

    /// Make scope discovery fail with a permission error
    pub fn deny_scope_lookup(&self) {
        self.lock().scope = ScopeAnswer::Denied;
    }

    /// Make scope discovery fail with a generic error
    pub fn break_scope_lookup(&self) {
        self.lock().scope = ScopeAnswer::Unreachable;
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, scope: &str, _token: &str, path: &str) -> Result<Option<StoredValue>> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Get {
            scope: scope.to_string(),
            path: path.to_string(),
        });
        if inner.failing.contains(path) {
            bail!("injected failure reading {path}");
        }
        Ok(inner
            .keys
            .get(&(scope.to_string(), path.to_string()))
            .cloned())
    }

    fn put(&self, scope: &str, token: &str, path: &str, value: &str, flags: u64) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Put {
            scope: scope.to_string(),
            token: token.to_string(),
            path: path.to_string(),
            value: value.to_string(),
            flags,
        });
        if inner.failing.contains(path) {
            bail!("injected failure writing {path}");
        }
        inner.keys.insert(
            (scope.to_string(), path.to_string()),
            StoredValue {
                value: value.to_string(),
                flags,
            },
        );
        Ok(())
    }

    fn delete(&self, scope: &str, _token: &str, path: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Delete {
            scope: scope.to_string(),
            path: path.to_string(),
        });
        if inner.failing.contains(path) {
            bail!("injected failure deleting {path}");
        }
        inner.keys.remove(&(scope.to_string(), path.to_string()));
        Ok(())
    }
}

impl ScopeSource for MemoryStore {
    fn local_scope(&self) -> std::result::Result<String, ScopeLookupError> {
        match &self.lock().scope {
            ScopeAnswer::Scope(s) => Ok(s.clone()),
            ScopeAnswer::Denied => Err(ScopeLookupError::PermissionDenied(
                "Unexpected response code: 403 (Permission denied)".to_string(),
            )),
            ScopeAnswer::Unreachable => Err(ScopeLookupError::Other(anyhow::anyhow!(
                "connection refused"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_are_isolated() {
        let store = MemoryStore::new();
        store.insert("dc1", "a", "1", 0);
        store.insert("dc2", "a", "2", 4);
        assert_eq!(store.value("dc1", "a"), Some(("1".into(), 0)));
        assert_eq!(store.value("dc2", "a"), Some(("2".into(), 4)));
        assert_eq!(store.len(), 2);
        assert!(store.calls().is_empty());
    }

    #[test]
    fn test_delete_missing_key_is_ok() {
        let store = MemoryStore::new();
        store.delete("dc1", "", "ghost").unwrap();
        assert!(store.is_empty());
        assert_eq!(store.mutations().len(), 1);
    }

    #[test]
    fn test_scope_answers() {
        let store = MemoryStore::new();
        assert_eq!(store.local_scope().unwrap(), "dc1");

        store.deny_scope_lookup();
        assert!(matches!(
            store.local_scope(),
            Err(ScopeLookupError::PermissionDenied(_))
        ));

        store.break_scope_lookup();
        assert!(matches!(store.local_scope(), Err(ScopeLookupError::Other(_))));
    }
}
