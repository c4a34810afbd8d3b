//! Provider configuration
//!
//! Settings come from, in increasing priority: built-in defaults, the
//! `config.toml` file, `CONSUL_*` environment variables, command-line flags.

use anyhow::{Context, Result, bail};
use consulkit::{Client, ClientConfig, DEFAULT_ADDRESS, RetryConfig, Scheme};
use reconcile::ProviderDefaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const ENV_HTTP_ADDR: &str = "CONSUL_HTTP_ADDR";
pub const ENV_HTTP_TOKEN: &str = "CONSUL_HTTP_TOKEN";
pub const ENV_HTTP_SSL: &str = "CONSUL_HTTP_SSL";
pub const ENV_DATACENTER: &str = "CONSUL_DATACENTER";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// File format
// ============================================================================

/// On-disk `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub provider: ProviderSection,
    pub retry: RetrySection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSection {
    pub address: Option<String>,
    pub scheme: Option<String>,
    pub datacenter: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub backoff_factor: Option<f64>,
    pub max_delay_ms: Option<u64>,
}

impl ConfigFile {
    /// Load the file, or defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

// ============================================================================
// Resolved configuration
// ============================================================================

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub address: Option<String>,
    pub token: Option<String>,
    pub datacenter: Option<String>,
}

/// Fully resolved provider settings
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub address: String,
    pub scheme: Scheme,
    /// Scope used when the agent refuses to tell its own
    pub datacenter: String,
    pub token: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl ProviderConfig {
    /// Load from the config file, the process environment and the overrides
    pub fn load(path: &Path, overrides: &Overrides) -> Result<Self> {
        let file = ConfigFile::load(path)?;
        Self::resolve(&file, |key| std::env::var(key).ok(), overrides)
    }

    /// Merge the layers, with `env` standing in for the process environment
    pub fn resolve<E>(file: &ConfigFile, env: E, overrides: &Overrides) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.is_empty());
        let provider = &file.provider;

        let address = overrides
            .address
            .clone()
            .or_else(|| lookup(ENV_HTTP_ADDR))
            .or_else(|| provider.address.clone())
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

        let token = overrides
            .token
            .clone()
            .or_else(|| lookup(ENV_HTTP_TOKEN))
            .or_else(|| provider.token.clone())
            .unwrap_or_default();

        let datacenter = overrides
            .datacenter
            .clone()
            .or_else(|| lookup(ENV_DATACENTER))
            .or_else(|| provider.datacenter.clone())
            .unwrap_or_default();

        let scheme = match lookup(ENV_HTTP_SSL) {
            Some(ssl) => {
                if parse_bool(&ssl).with_context(|| format!("Invalid {ENV_HTTP_SSL}"))? {
                    Scheme::Https
                } else {
                    Scheme::Http
                }
            }
            None => match provider.scheme.as_deref() {
                Some(name) => match Scheme::parse(name) {
                    Some(scheme) => scheme,
                    None => bail!("Unknown scheme '{name}', expected http or https"),
                },
                None => Scheme::Http,
            },
        };

        let timeout =
            Duration::from_secs(provider.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));

        Ok(Self {
            address,
            scheme,
            datacenter,
            token,
            timeout,
            retry: file.retry.to_retry_config()?,
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.address.clone())
            .scheme(self.scheme)
            .token(self.token.clone())
            .timeout(self.timeout)
    }

    /// Build an HTTP client for the configured agent
    pub fn client(&self) -> Client {
        Client::new(self.client_config()).with_retry(self.retry.clone())
    }

    /// Defaults handed to scope resolution
    pub fn defaults(&self) -> ProviderDefaults {
        ProviderDefaults::new(self.datacenter.clone(), self.token.clone())
    }
}

impl RetrySection {
    fn to_retry_config(&self) -> Result<RetryConfig> {
        let defaults = RetryConfig::default();
        let config = RetryConfig {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            base_delay: self
                .base_delay_ms
                .map_or(defaults.base_delay, Duration::from_millis),
            backoff_factor: self.backoff_factor.unwrap_or(defaults.backoff_factor),
            max_delay: self
                .max_delay_ms
                .map_or(defaults.max_delay, Duration::from_millis),
        };
        if config.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if !config.backoff_factor.is_finite() || config.backoff_factor < 1.0 {
            bail!("retry.backoff_factor must be a number >= 1.0");
        }
        Ok(config)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn file(toml_src: &str) -> ConfigFile {
        toml::from_str(toml_src).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config =
            ProviderConfig::resolve(&ConfigFile::default(), env_of(&[]), &Overrides::default())
                .unwrap();
        assert_eq!(config.address, "127.0.0.1:8500");
        assert_eq!(config.scheme, Scheme::Http);
        assert!(config.datacenter.is_empty());
        assert!(config.token.is_empty());
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_file_values() {
        let f = file(
            r#"
            [provider]
            address = "consul.internal:8501"
            scheme = "https"
            datacenter = "dc9"
            token = "file-token"
            timeout_secs = 3

            [retry]
            max_attempts = 5
            base_delay_ms = 10
            "#,
        );
        let config = ProviderConfig::resolve(&f, env_of(&[]), &Overrides::default()).unwrap();
        assert_eq!(config.address, "consul.internal:8501");
        assert_eq!(config.scheme, Scheme::Https);
        assert_eq!(config.datacenter, "dc9");
        assert_eq!(config.token, "file-token");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_env_beats_file() {
        let f = file("[provider]\naddress = \"file:8500\"\ntoken = \"file\"");
        let env = env_of(&[
            (ENV_HTTP_ADDR, "env:8500"),
            (ENV_HTTP_TOKEN, "env"),
            (ENV_DATACENTER, "env-dc"),
        ]);
        let config = ProviderConfig::resolve(&f, env, &Overrides::default()).unwrap();
        assert_eq!(config.address, "env:8500");
        assert_eq!(config.token, "env");
        assert_eq!(config.datacenter, "env-dc");
    }

    #[test]
    fn test_flags_beat_env() {
        let env = env_of(&[(ENV_HTTP_ADDR, "env:8500"), (ENV_HTTP_TOKEN, "env")]);
        let overrides = Overrides {
            address: Some("flag:8500".into()),
            token: Some("flag".into()),
            datacenter: Some("flag-dc".into()),
        };
        let config = ProviderConfig::resolve(&ConfigFile::default(), env, &overrides).unwrap();
        assert_eq!(config.address, "flag:8500");
        assert_eq!(config.token, "flag");
        assert_eq!(config.defaults().scope, "flag-dc");
    }

    #[test]
    fn test_empty_env_is_ignored() {
        let f = file("[provider]\ntoken = \"file\"");
        let config =
            ProviderConfig::resolve(&f, env_of(&[(ENV_HTTP_TOKEN, "")]), &Overrides::default())
                .unwrap();
        assert_eq!(config.token, "file");
    }

    #[test]
    fn test_ssl_env_sets_scheme() {
        let f = file("[provider]\nscheme = \"http\"");
        let config =
            ProviderConfig::resolve(&f, env_of(&[(ENV_HTTP_SSL, "true")]), &Overrides::default())
                .unwrap();
        assert_eq!(config.scheme, Scheme::Https);
        assert_eq!(config.client_config().base_url(), "https://127.0.0.1:8500");
    }

    #[test]
    fn test_invalid_ssl_env() {
        let result = ProviderConfig::resolve(
            &ConfigFile::default(),
            env_of(&[(ENV_HTTP_SSL, "maybe")]),
            &Overrides::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_scheme() {
        let f = file("[provider]\nscheme = \"gopher\"");
        assert!(ProviderConfig::resolve(&f, env_of(&[]), &Overrides::default()).is_err());
    }

    #[test]
    fn test_invalid_retry() {
        let f = file("[retry]\nmax_attempts = 0");
        assert!(ProviderConfig::resolve(&f, env_of(&[]), &Overrides::default()).is_err());

        let f = file("[retry]\nbackoff_factor = 0.5");
        assert!(ProviderConfig::resolve(&f, env_of(&[]), &Overrides::default()).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<ConfigFile>("[provider]\nadress = \"typo\"").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load(&dir.path().join("config.toml")).unwrap();
        assert!(config.provider.address.is_none());
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[provider]\ndatacenter = \"dc2\"\n").unwrap();
        let config = ConfigFile::load(&path).unwrap();
        assert_eq!(config.provider.datacenter.as_deref(), Some("dc2"));
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[provider\n").unwrap();
        let err = ConfigFile::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
