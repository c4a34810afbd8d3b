//! Core types for the Consul HTTP API.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default agent address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8500";

/// URL scheme used to reach the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    /// Parse a scheme name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
        }
    }
}

/// Connection settings for a Consul agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// `host:port` of the agent, optionally prefixed with a scheme.
    pub address: String,
    pub scheme: Scheme,
    /// Default ACL token, sent when a request carries none.
    pub token: String,
    /// Global timeout for a single request.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            scheme: Scheme::Http,
            token: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Create a config for the given address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Set the scheme.
    #[must_use]
    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Set the default token.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL of the HTTP API, without a trailing slash.
    ///
    /// An address that already carries a scheme keeps it.
    #[must_use]
    pub fn base_url(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("{}://{}", self.scheme, address)
        }
    }
}

/// Per-request datacenter and token.
///
/// Empty strings mean "let the agent decide".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub datacenter: String,
    pub token: String,
}

impl QueryOptions {
    pub fn new(datacenter: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            datacenter: datacenter.into(),
            token: token.into(),
        }
    }
}

/// A key as stored in Consul, with its value already decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvPair {
    pub key: String,
    pub value: String,
    pub flags: u64,
    pub create_index: u64,
    pub modify_index: u64,
    pub lock_index: u64,
    pub session: Option<String>,
}

impl KvPair {
    /// Create a pair with only key, value and flags set.
    pub fn new(key: impl Into<String>, value: impl Into<String>, flags: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            flags,
            ..Default::default()
        }
    }
}

/// Wire form of a key as returned by `GET /v1/kv/<key>`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawKvPair {
    key: String,
    #[serde(default)]
    flags: u64,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    create_index: u64,
    #[serde(default)]
    modify_index: u64,
    #[serde(default)]
    lock_index: u64,
    #[serde(default)]
    session: Option<String>,
}

impl RawKvPair {
    /// Decode the base64 value. A null value is an empty string and bytes
    /// that are not UTF-8 are replaced with U+FFFD.
    pub(crate) fn decode(self) -> Result<KvPair, String> {
        let value = match self.value {
            Some(encoded) => {
                let bytes = STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| format!("key '{}': invalid base64 value: {e}", self.key))?;
                String::from_utf8_lossy(&bytes).into_owned()
            }
            None => String::new(),
        };
        Ok(KvPair {
            key: self.key,
            value,
            flags: self.flags,
            create_index: self.create_index,
            modify_index: self.modify_index,
            lock_index: self.lock_index,
            session: self.session.filter(|s| !s.is_empty()),
        })
    }
}

/// Subset of `GET /v1/agent/self`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentSelf {
    #[serde(rename = "Config", default)]
    pub config: AgentConfig,
}

/// The `Config` block of the agent self-description.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentConfig {
    #[serde(rename = "Datacenter", default)]
    pub datacenter: String,
    #[serde(rename = "NodeName", default)]
    pub node_name: String,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    #[allow(clippy::cast_possible_wrap)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_adds_scheme() {
        let config = ClientConfig::new("consul.local:8500").scheme(Scheme::Https);
        assert_eq!(config.base_url(), "https://consul.local:8500");
    }

    #[test]
    fn test_base_url_keeps_explicit_scheme() {
        let config = ClientConfig::new("http://10.0.0.1:8500/");
        assert_eq!(config.base_url(), "http://10.0.0.1:8500");
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url(), "http://127.0.0.1:8500");
        assert!(config.token.is_empty());
    }

    #[test]
    fn test_scheme_parse() {
        assert_eq!(Scheme::parse("HTTPS"), Some(Scheme::Https));
        assert_eq!(Scheme::parse("http"), Some(Scheme::Http));
        assert_eq!(Scheme::parse("ftp"), None);
    }

    #[test]
    fn test_raw_pair_decodes_value() {
        let json = r#"[{"LockIndex":0,"Key":"app/version","Flags":7,
            "Value":"MS4yLjM=","CreateIndex":10,"ModifyIndex":12}]"#;
        let raw: Vec<RawKvPair> = serde_json::from_str(json).unwrap();
        let pair = raw.into_iter().next().unwrap().decode().unwrap();
        assert_eq!(pair.key, "app/version");
        assert_eq!(pair.value, "1.2.3");
        assert_eq!(pair.flags, 7);
        assert_eq!(pair.modify_index, 12);
        assert_eq!(pair.session, None);
    }

    #[test]
    fn test_raw_pair_null_value_is_empty() {
        let json = r#"{"Key":"empty","Flags":0,"Value":null}"#;
        let raw: RawKvPair = serde_json::from_str(json).unwrap();
        assert_eq!(raw.decode().unwrap().value, "");
    }

    #[test]
    fn test_raw_pair_binary_value_is_lossy() {
        // 0xff 0xfe 'A'
        let json = r#"{"Key":"blob","Value":"//5B"}"#;
        let raw: RawKvPair = serde_json::from_str(json).unwrap();
        assert_eq!(raw.decode().unwrap().value, "\u{fffd}\u{fffd}A");
    }

    #[test]
    fn test_raw_pair_rejects_bad_base64() {
        let json = r#"{"Key":"bad","Value":"!!!"}"#;
        let raw: RawKvPair = serde_json::from_str(json).unwrap();
        assert!(raw.decode().unwrap_err().contains("bad"));
    }

    #[test]
    fn test_agent_self_datacenter() {
        let json = r#"{"Config":{"Datacenter":"eu-west","NodeName":"n1","Server":true}}"#;
        let agent: AgentSelf = serde_json::from_str(json).unwrap();
        assert_eq!(agent.config.datacenter, "eu-west");
        assert_eq!(agent.config.node_name, "n1");
    }

    #[test]
    fn test_retry_config_delay() {
        let config = RetryConfig::new(5, Duration::from_millis(100), 2.0);
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_retry_config_max_delay() {
        let config = RetryConfig {
            max_delay: Duration::from_millis(300),
            ..RetryConfig::new(5, Duration::from_millis(100), 2.0)
        };
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(300));
    }

    #[test]
    fn test_no_retry() {
        assert_eq!(RetryConfig::no_retry().max_attempts, 1);
    }
}
