//! Backend trait and implementations for talking to a Consul agent.
//!
//! [`http::HttpBackend`] speaks the agent's HTTP API. [`MockBackend`] keeps
//! keys in memory for tests.
//!
//! # Testing
//!
//! ```
//! use consulkit::backend::{Backend, MockBackend};
//! use consulkit::QueryOptions;
//!
//! let mock = MockBackend::new();
//! let opts = QueryOptions::default();
//! mock.put_key("app/version", "1.0", 0, &opts).unwrap();
//!
//! let pair = mock.get_key("app/version", &opts).unwrap().unwrap();
//! assert_eq!(pair.value, "1.0");
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{AgentConfig, AgentSelf, KvPair, QueryOptions};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Transport for the handful of Consul endpoints this crate uses.
pub trait Backend: Send + Sync {
    /// Read a single key. `Ok(None)` when the key does not exist.
    fn get_key(&self, key: &str, opts: &QueryOptions) -> Result<Option<KvPair>>;

    /// Write a key with the given flags. Returns Consul's acknowledgement.
    fn put_key(&self, key: &str, value: &str, flags: u64, opts: &QueryOptions) -> Result<bool>;

    /// Delete a single key. Deleting a missing key succeeds.
    fn delete_key(&self, key: &str, opts: &QueryOptions) -> Result<bool>;

    /// Describe the local agent.
    fn agent_self(&self, opts: &QueryOptions) -> Result<AgentSelf>;
}

/// A request seen by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get { datacenter: String, key: String },
    Put { datacenter: String, key: String, value: String, flags: u64, token: String },
    Delete { datacenter: String, key: String },
    AgentSelf,
}

#[derive(Debug, Default)]
struct MockState {
    keys: BTreeMap<(String, String), KvPair>,
    requests: Vec<Request>,
    agent_datacenter: String,
    deny_agent: bool,
    transient_failures: u32,
    index: u64,
}

/// In-memory backend for testing without a Consul agent.
///
/// Keys are partitioned by datacenter. A request with an empty datacenter
/// lands in the agent's own datacenter.
#[derive(Debug, Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create an empty mock whose agent lives in `dc1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                agent_datacenter: "dc1".to_string(),
                ..MockState::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the datacenter reported by `agent_self`.
    pub fn set_agent_datacenter(&self, datacenter: impl Into<String>) {
        self.state().agent_datacenter = datacenter.into();
    }

    /// Make `agent_self` answer 403.
    pub fn deny_agent(&self) {
        self.state().deny_agent = true;
    }

    /// Fail the next `count` requests with a retryable transport error.
    pub fn fail_next(&self, count: u32) {
        self.state().transient_failures = count;
    }

    /// Seed a key directly.
    pub fn insert(&self, datacenter: &str, key: &str, value: &str, flags: u64) {
        let mut state = self.state();
        let dc = resolve_dc(&state, datacenter);
        state.index += 1;
        let index = state.index;
        state.keys.insert(
            (dc, key.to_string()),
            KvPair {
                create_index: index,
                modify_index: index,
                ..KvPair::new(key, value, flags)
            },
        );
    }

    /// Current value of a key, bypassing request recording.
    #[must_use]
    pub fn value(&self, datacenter: &str, key: &str) -> Option<String> {
        let state = self.state();
        let dc = resolve_dc(&state, datacenter);
        state.keys.get(&(dc, key.to_string())).map(|p| p.value.clone())
    }

    /// Number of stored keys across all datacenters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every request received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.state().requests.clone()
    }

    fn begin(&self, request: Request) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.state();
        state.requests.push(request);
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(Error::http("connection reset by peer", None));
        }
        Ok(state)
    }
}

fn resolve_dc(state: &MockState, datacenter: &str) -> String {
    if datacenter.is_empty() {
        state.agent_datacenter.clone()
    } else {
        datacenter.to_string()
    }
}

impl Backend for MockBackend {
    fn get_key(&self, key: &str, opts: &QueryOptions) -> Result<Option<KvPair>> {
        let state = self.begin(Request::Get {
            datacenter: opts.datacenter.clone(),
            key: key.to_string(),
        })?;
        let dc = resolve_dc(&state, &opts.datacenter);
        Ok(state.keys.get(&(dc, key.to_string())).cloned())
    }

    fn put_key(&self, key: &str, value: &str, flags: u64, opts: &QueryOptions) -> Result<bool> {
        let mut state = self.begin(Request::Put {
            datacenter: opts.datacenter.clone(),
            key: key.to_string(),
            value: value.to_string(),
            flags,
            token: opts.token.clone(),
        })?;
        let dc = resolve_dc(&state, &opts.datacenter);
        state.index += 1;
        let index = state.index;
        let pair = state
            .keys
            .entry((dc, key.to_string()))
            .or_insert_with(|| KvPair {
                create_index: index,
                ..KvPair::new(key, "", 0)
            });
        pair.value = value.to_string();
        pair.flags = flags;
        pair.modify_index = index;
        Ok(true)
    }

    fn delete_key(&self, key: &str, opts: &QueryOptions) -> Result<bool> {
        let mut state = self.begin(Request::Delete {
            datacenter: opts.datacenter.clone(),
            key: key.to_string(),
        })?;
        let dc = resolve_dc(&state, &opts.datacenter);
        state.keys.remove(&(dc, key.to_string()));
        Ok(true)
    }

    fn agent_self(&self, _opts: &QueryOptions) -> Result<AgentSelf> {
        let state = self.begin(Request::AgentSelf)?;
        if state.deny_agent {
            return Err(Error::from_status(403, "Permission denied"));
        }
        Ok(AgentSelf {
            config: AgentConfig {
                datacenter: state.agent_datacenter.clone(),
                node_name: "mock".to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dc(name: &str) -> QueryOptions {
        QueryOptions::new(name, "")
    }

    #[test]
    fn test_mock_backend_new() {
        let mock = MockBackend::new();
        assert!(mock.is_empty());
        assert!(mock.get_key("missing", &dc("")).unwrap().is_none());
    }

    #[test]
    fn test_mock_backend_put_get_delete() {
        let mock = MockBackend::new();
        assert!(mock.put_key("a", "1", 4, &dc("dc1")).unwrap());

        let pair = mock.get_key("a", &dc("dc1")).unwrap().unwrap();
        assert_eq!(pair.value, "1");
        assert_eq!(pair.flags, 4);

        mock.delete_key("a", &dc("dc1")).unwrap();
        assert!(mock.get_key("a", &dc("dc1")).unwrap().is_none());
    }

    #[test]
    fn test_mock_backend_partitions_datacenters() {
        let mock = MockBackend::new();
        mock.insert("dc2", "a", "remote", 0);
        assert!(mock.get_key("a", &dc("dc1")).unwrap().is_none());
        assert_eq!(mock.value("dc2", "a").as_deref(), Some("remote"));
    }

    #[test]
    fn test_mock_backend_empty_dc_is_agent_dc() {
        let mock = MockBackend::new();
        mock.put_key("a", "1", 0, &dc("")).unwrap();
        assert_eq!(mock.value("dc1", "a").as_deref(), Some("1"));
    }

    #[test]
    fn test_mock_backend_modify_index_advances() {
        let mock = MockBackend::new();
        mock.put_key("a", "1", 0, &dc("")).unwrap();
        let first = mock.get_key("a", &dc("")).unwrap().unwrap();
        mock.put_key("a", "2", 0, &dc("")).unwrap();
        let second = mock.get_key("a", &dc("")).unwrap().unwrap();
        assert_eq!(first.create_index, second.create_index);
        assert!(second.modify_index > first.modify_index);
    }

    #[test]
    fn test_mock_backend_agent_self() {
        let mock = MockBackend::new();
        mock.set_agent_datacenter("eu-west");
        let agent = mock.agent_self(&QueryOptions::default()).unwrap();
        assert_eq!(agent.config.datacenter, "eu-west");

        mock.deny_agent();
        let err = mock.agent_self(&QueryOptions::default()).unwrap_err();
        assert!(err.is_permission_denied());
    }

    #[test]
    fn test_mock_backend_transient_failures() {
        let mock = MockBackend::new();
        mock.fail_next(1);
        assert!(mock.get_key("a", &dc("")).unwrap_err().is_retryable());
        assert!(mock.get_key("a", &dc("")).is_ok());
        assert_eq!(mock.requests().len(), 2);
    }

    #[test]
    fn test_mock_backend_records_put_token() {
        let mock = MockBackend::new();
        mock.put_key("a", "1", 0, &QueryOptions::new("dc1", "secret"))
            .unwrap();
        assert!(matches!(
            &mock.requests()[0],
            Request::Put { token, .. } if token == "secret"
        ));
    }
}
