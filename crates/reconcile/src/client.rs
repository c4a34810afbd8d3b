//! Store access bound to a scope and token

use crate::error::{Error, Result, StoreOperation};
use anyhow::Result as AnyResult;

/// A value as held by the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub flags: u64,
}

/// Backing store transport
///
/// Implementations perform exactly one round trip per call. Retries, if any,
/// happen inside the implementation.
pub trait KvStore {
    /// Fetch a key, returning `None` if it does not exist
    fn get(&self, scope: &str, token: &str, path: &str) -> AnyResult<Option<StoredValue>>;

    /// Write a key, overwriting any existing value
    fn put(&self, scope: &str, token: &str, path: &str, value: &str, flags: u64) -> AnyResult<()>;

    /// Delete a key
    fn delete(&self, scope: &str, token: &str, path: &str) -> AnyResult<()>;
}

/// Thin adapter executing get/put/delete in one scope with one token
pub struct KeyClient<'a, S: KvStore + ?Sized> {
    store: &'a S,
    scope: String,
    token: String,
}

impl<'a, S: KvStore + ?Sized> KeyClient<'a, S> {
    pub fn new(store: &'a S, scope: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            store,
            scope: scope.into(),
            token: token.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Read a key. A missing key reads as an empty value with no flags.
    pub fn get(&self, path: &str) -> Result<(String, u64)> {
        let stored = self.lookup(path)?;
        Ok(stored.map(|s| (s.value, s.flags)).unwrap_or_default())
    }

    /// Read a key, keeping "not found" distinguishable from an empty value
    pub fn lookup(&self, path: &str) -> Result<Option<StoredValue>> {
        log::debug!("get {path} (scope '{}')", self.scope);
        self.store
            .get(&self.scope, &self.token, path)
            .map_err(|source| Error::StoreOperationFailed {
                operation: StoreOperation::Get,
                path: path.to_string(),
                source,
            })
    }

    pub fn put(&self, path: &str, value: &str, flags: u64) -> Result<()> {
        log::debug!("put {path} flags={flags} (scope '{}')", self.scope);
        self.store
            .put(&self.scope, &self.token, path, value, flags)
            .map_err(|source| Error::StoreOperationFailed {
                operation: StoreOperation::Put,
                path: path.to_string(),
                source,
            })
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        log::debug!("delete {path} (scope '{}')", self.scope);
        self.store
            .delete(&self.scope, &self.token, path)
            .map_err(|source| Error::StoreOperationFailed {
                operation: StoreOperation::Delete,
                path: path.to_string(),
                source,
            })
    }
}
