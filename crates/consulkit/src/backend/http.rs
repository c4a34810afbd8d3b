//! Consul HTTP API backend.
//!
//! Only the endpoints needed for key reconciliation are covered:
//! `/v1/kv/<key>` (GET, PUT, DELETE) and `/v1/agent/self`.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{AgentSelf, ClientConfig, KvPair, QueryOptions, RawKvPair};
use ureq::http::Response;
use ureq::{Body, RequestBuilder};

const TOKEN_HEADER: &str = "X-Consul-Token";

/// Backend speaking the agent's HTTP API.
///
/// # Example
///
/// ```no_run
/// use consulkit::backend::Backend;
/// use consulkit::backend::http::HttpBackend;
/// use consulkit::{ClientConfig, QueryOptions};
///
/// let backend = HttpBackend::new(ClientConfig::new("127.0.0.1:8500"));
/// let agent = backend.agent_self(&QueryOptions::default()).unwrap();
/// println!("agent datacenter: {}", agent.config.datacenter);
/// ```
pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: String,
    default_token: String,
}

impl HttpBackend {
    /// Create a backend for the configured agent.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            base_url: config.base_url(),
            default_token: config.token,
        }
    }

    /// Get the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the URL for a key. Each path segment is percent-encoded.
    fn kv_url(&self, key: &str) -> String {
        let encoded: Vec<_> = key
            .split('/')
            .map(urlencoding::encode)
            .collect();
        format!("{}/v1/kv/{}", self.base_url, encoded.join("/"))
    }

    fn token<'a>(&'a self, opts: &'a QueryOptions) -> &'a str {
        if opts.token.is_empty() {
            &self.default_token
        } else {
            &opts.token
        }
    }

    /// Attach datacenter and token when they are set.
    fn scoped<B>(&self, mut request: RequestBuilder<B>, opts: &QueryOptions) -> RequestBuilder<B> {
        if !opts.datacenter.is_empty() {
            request = request.query("dc", &opts.datacenter);
        }
        let token = self.token(opts);
        if !token.is_empty() {
            request = request.header(TOKEN_HEADER, token);
        }
        request
    }
}

/// Turn a non-success response into an error carrying the body.
fn check(mut response: Response<Body>) -> Result<Response<Body>> {
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        return Ok(response);
    }
    let body = response.body_mut().read_to_string().unwrap_or_default();
    Err(Error::from_status(status, &body))
}

/// Parse the `true`/`false` body returned by KV writes.
fn acknowledged(mut response: Response<Body>) -> Result<bool> {
    let body = response.body_mut().read_to_string()?;
    match body.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::InvalidResponse(format!(
            "expected true or false, got '{other}'"
        ))),
    }
}

impl Backend for HttpBackend {
    fn get_key(&self, key: &str, opts: &QueryOptions) -> Result<Option<KvPair>> {
        let url = self.kv_url(key);
        log::trace!("GET {url}");

        let response = self.scoped(self.agent.get(&url), opts).call()?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }

        let pairs: Vec<RawKvPair> = check(response)?.body_mut().read_json()?;
        match pairs.into_iter().next() {
            Some(raw) => raw.decode().map(Some).map_err(Error::InvalidResponse),
            None => Ok(None),
        }
    }

    fn put_key(&self, key: &str, value: &str, flags: u64, opts: &QueryOptions) -> Result<bool> {
        let url = self.kv_url(key);
        log::trace!("PUT {url} (flags={flags})");

        let mut request = self.scoped(self.agent.put(&url), opts);
        if flags != 0 {
            request = request.query("flags", flags.to_string());
        }
        acknowledged(check(request.send(value)?)?)
    }

    fn delete_key(&self, key: &str, opts: &QueryOptions) -> Result<bool> {
        let url = self.kv_url(key);
        log::trace!("DELETE {url}");

        let response = self.scoped(self.agent.delete(&url), opts).call()?;
        acknowledged(check(response)?)
    }

    fn agent_self(&self, opts: &QueryOptions) -> Result<AgentSelf> {
        let url = format!("{}/v1/agent/self", self.base_url);
        log::trace!("GET {url}");

        let token_only = QueryOptions::new("", opts.token.clone());
        let response = self.scoped(self.agent.get(&url), &token_only).call()?;
        Ok(check(response)?.body_mut().read_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Scheme;

    #[test]
    fn test_kv_url_encodes_segments() {
        let backend = HttpBackend::new(ClientConfig::new("localhost:8500"));
        assert_eq!(
            backend.kv_url("app/my key/v1"),
            "http://localhost:8500/v1/kv/app/my%20key/v1"
        );
    }

    #[test]
    fn test_base_url_uses_scheme() {
        let config = ClientConfig::new("consul:8501").scheme(Scheme::Https);
        let backend = HttpBackend::new(config);
        assert_eq!(backend.base_url(), "https://consul:8501");
    }

    #[test]
    fn test_request_token_overrides_default() {
        let backend = HttpBackend::new(ClientConfig::default().token("provider"));
        assert_eq!(backend.token(&QueryOptions::default()), "provider");
        assert_eq!(
            backend.token(&QueryOptions::new("", "resource")),
            "resource"
        );
    }

    #[test]
    fn test_unreachable_agent_is_retryable() {
        let config = ClientConfig::new("127.0.0.1:1")
            .timeout(std::time::Duration::from_millis(500));
        let backend = HttpBackend::new(config);
        let err = backend
            .get_key("a", &QueryOptions::default())
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
