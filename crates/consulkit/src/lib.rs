//! # consulkit
//!
//! Small blocking client for the Consul key/value store and agent API.
//!
//! This crate provides:
//! - Single-key reads, writes and deletes scoped to a datacenter
//! - Discovery of the local agent's datacenter
//! - Retry with exponential backoff for transient failures
//! - A [`MockBackend`] for tests that need no agent
//!
//! ## Example
//!
//! ```no_run
//! use consulkit::{Client, ClientConfig, QueryOptions};
//!
//! let client = Client::new(ClientConfig::new("127.0.0.1:8500").token("secret"));
//! let dc = client.agent_datacenter("").unwrap();
//!
//! let opts = QueryOptions::new(dc, "");
//! client.kv_put("app/version", "1.2.3", 0, &opts).unwrap();
//! let pair = client.kv_get("app/version", &opts).unwrap();
//! assert_eq!(pair.map(|p| p.value).as_deref(), Some("1.2.3"));
//! ```

#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod retry;
pub mod types;

pub use backend::{MockBackend, Request};
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    AgentConfig, AgentSelf, ClientConfig, DEFAULT_ADDRESS, KvPair, QueryOptions, RetryConfig,
    Scheme,
};

use backend::Backend;
use backend::http::HttpBackend;
use retry::{LogCallback, with_retry};

/// High-level client for Consul operations.
///
/// Every call goes through the retry loop, so transport errors and 5xx
/// answers are repeated while 403 and other client errors fail at once.
pub struct Client {
    backend: Box<dyn Backend>,
    retry: RetryConfig,
}

impl Client {
    /// Create a client talking HTTP to the configured agent.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self::with_backend(Box::new(HttpBackend::new(config)))
    }

    /// Create a client with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    // =========================================================================
    // Key/Value
    // =========================================================================

    /// Read a key. `Ok(None)` when it does not exist.
    pub fn kv_get(&self, key: &str, opts: &QueryOptions) -> Result<Option<KvPair>> {
        with_retry(&self.retry, Some(&LogCallback), || {
            self.backend.get_key(key, opts)
        })
    }

    /// Write a key with flags.
    ///
    /// A write Consul refuses to acknowledge is an error.
    pub fn kv_put(&self, key: &str, value: &str, flags: u64, opts: &QueryOptions) -> Result<()> {
        let acknowledged = with_retry(&self.retry, Some(&LogCallback), || {
            self.backend.put_key(key, value, flags, opts)
        })?;
        if acknowledged {
            Ok(())
        } else {
            Err(Error::Other(format!("write of key '{key}' was not acknowledged")))
        }
    }

    /// Delete a key. Deleting a missing key succeeds.
    pub fn kv_delete(&self, key: &str, opts: &QueryOptions) -> Result<()> {
        with_retry(&self.retry, Some(&LogCallback), || {
            self.backend.delete_key(key, opts)
        })
        .map(|_| ())
    }

    // =========================================================================
    // Agent
    // =========================================================================

    /// Datacenter of the local agent, queried with the given token.
    pub fn agent_datacenter(&self, token: &str) -> Result<String> {
        let opts = QueryOptions::new("", token);
        let agent = with_retry(&self.retry, Some(&LogCallback), || {
            self.backend.agent_self(&opts)
        })?;
        if agent.config.datacenter.is_empty() {
            return Err(Error::InvalidResponse(
                "agent did not report a datacenter".to_string(),
            ));
        }
        Ok(agent.config.datacenter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(mock: &MockBackend) -> Client {
        Client::with_backend(Box::new(mock.clone())).with_retry(RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(2),
        })
    }

    #[test]
    fn test_client_with_mock_backend() {
        let mock = MockBackend::new();
        let client = client(&mock);
        let opts = QueryOptions::new("dc1", "");

        client.kv_put("a/b", "v", 3, &opts).unwrap();
        let pair = client.kv_get("a/b", &opts).unwrap().unwrap();
        assert_eq!(pair.value, "v");
        assert_eq!(pair.flags, 3);

        client.kv_delete("a/b", &opts).unwrap();
        assert!(client.kv_get("a/b", &opts).unwrap().is_none());
    }

    #[test]
    fn test_client_retries_transient_failures() {
        let mock = MockBackend::new();
        mock.fail_next(2);
        let client = client(&mock);

        client
            .kv_put("a", "1", 0, &QueryOptions::default())
            .unwrap();
        assert_eq!(mock.requests().len(), 3);
        assert_eq!(mock.value("", "a").as_deref(), Some("1"));
    }

    #[test]
    fn test_client_gives_up_after_max_attempts() {
        let mock = MockBackend::new();
        mock.fail_next(10);
        let client = client(&mock);

        assert!(client.kv_get("a", &QueryOptions::default()).is_err());
        assert_eq!(mock.requests().len(), 3);
    }

    #[test]
    fn test_client_agent_datacenter() {
        let mock = MockBackend::new();
        mock.set_agent_datacenter("us-east");
        assert_eq!(client(&mock).agent_datacenter("").unwrap(), "us-east");
    }

    #[test]
    fn test_client_agent_denied_is_not_retried() {
        let mock = MockBackend::new();
        mock.deny_agent();
        let err = client(&mock).agent_datacenter("t").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::PermissionDenied);
        assert_eq!(mock.requests(), vec![Request::AgentSelf]);
    }

    #[test]
    fn test_client_agent_without_datacenter() {
        let mock = MockBackend::new();
        mock.set_agent_datacenter("");
        assert!(client(&mock).agent_datacenter("").is_err());
    }
}
