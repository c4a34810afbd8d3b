//! Bridges the reconciliation engine to a Consul agent

use anyhow::Result;
use consulkit::{Client, QueryOptions};
use reconcile::{KvStore, ScopeLookupError, ScopeSource, StoredValue};

/// Consul key/value store reached through a `consulkit::Client`
pub struct ConsulStore {
    client: Client,
}

impl ConsulStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Scope discovery that authenticates with `token`
    pub fn agent<'a>(&'a self, token: &'a str) -> AgentScope<'a> {
        AgentScope {
            client: &self.client,
            token,
        }
    }
}

impl KvStore for ConsulStore {
    fn get(&self, scope: &str, token: &str, path: &str) -> Result<Option<StoredValue>> {
        let pair = self.client.kv_get(path, &QueryOptions::new(scope, token))?;
        Ok(pair.map(|p| StoredValue {
            value: p.value,
            flags: p.flags,
        }))
    }

    fn put(&self, scope: &str, token: &str, path: &str, value: &str, flags: u64) -> Result<()> {
        let opts = QueryOptions::new(scope, token);
        self.client.kv_put(path, value, flags, &opts)?;
        Ok(())
    }

    fn delete(&self, scope: &str, token: &str, path: &str) -> Result<()> {
        self.client.kv_delete(path, &QueryOptions::new(scope, token))?;
        Ok(())
    }
}

/// The local agent, asked for its datacenter
pub struct AgentScope<'a> {
    client: &'a Client,
    token: &'a str,
}

impl ScopeSource for AgentScope<'_> {
    fn local_scope(&self) -> std::result::Result<String, ScopeLookupError> {
        match self.client.agent_datacenter(self.token) {
            Ok(dc) => Ok(dc),
            Err(e) if e.is_permission_denied() => {
                Err(ScopeLookupError::PermissionDenied(e.to_string()))
            }
            Err(e) => Err(ScopeLookupError::Other(e.into())),
        }
    }
}
