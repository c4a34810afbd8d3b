//! Runs the reconciliation modes against the live store

use anyhow::{Context as AnyhowContext, Result};
use reconcile::{
    AppliedResult, ApplySummary, KeyClient, ProgressCallback, ProviderDefaults,
    ScopeResolver, apply, destroy, read,
};

use crate::manifest::ResourceSpec;
use crate::state::ResourceState;
use crate::store::ConsulStore;

/// Options for apply and destroy
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub yes: bool,
}

/// Binds a store to the provider defaults
pub struct Executor<'a> {
    store: &'a ConsulStore,
    defaults: ProviderDefaults,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a ConsulStore, defaults: ProviderDefaults) -> Self {
        Self { store, defaults }
    }

    /// Resolve scope and token, and bind a key client to them
    fn client(
        &self,
        explicit_scope: Option<&str>,
        token: Option<&str>,
    ) -> Result<KeyClient<'a, ConsulStore>> {
        let token = self.defaults.token_for(token).to_string();
        let scope = ScopeResolver::new(&self.defaults)
            .resolve(explicit_scope, &self.store.agent(&token))?;
        log::debug!("Using datacenter '{scope}'");
        Ok(KeyClient::new(self.store, scope, token))
    }

    /// Converge the store toward `spec`, starting from what `tracked` recorded.
    ///
    /// Without an explicit datacenter the recorded one is reused, so the
    /// agent is only asked for a resource that was never applied.
    pub fn reconcile<P: ProgressCallback>(
        &self,
        spec: &ResourceSpec,
        tracked: Option<&ResourceState>,
        progress: &mut P,
    ) -> Result<AppliedResult> {
        let scope = spec
            .datacenter
            .as_deref()
            .filter(|dc| !dc.is_empty())
            .or_else(|| tracked.map(|t| t.datacenter.as_str()));
        let previous = tracked.map(|t| t.keys.clone()).unwrap_or_default();

        let client = self.client(scope, spec.token.as_deref())?;
        Ok(apply(&previous, &spec.entries(), &client, progress)?)
    }

    /// Stop tracking a resource in the datacenter it was applied to
    pub fn teardown<P: ProgressCallback>(
        &self,
        tracked: &ResourceState,
        token: Option<&str>,
        progress: &mut P,
    ) -> Result<ApplySummary> {
        let client = self.client(Some(&tracked.datacenter), token)?;
        Ok(destroy(&tracked.keys, &client, progress)?)
    }

    /// Re-read a tracked resource without writing
    pub fn refresh<P: ProgressCallback>(
        &self,
        tracked: &ResourceState,
        token: Option<&str>,
        progress: &mut P,
    ) -> Result<AppliedResult> {
        let client = self.client(Some(&tracked.datacenter), token)?;
        Ok(read(&tracked.keys, &client, progress)?)
    }
}

/// An explicit datacenter that differs from the recorded one forces a
/// teardown before the resource is reconciled again
pub fn needs_replacement(spec: &ResourceSpec, tracked: Option<&ResourceState>) -> bool {
    match (spec.datacenter.as_deref(), tracked) {
        (Some(dc), Some(tracked)) => !dc.is_empty() && dc != tracked.datacenter,
        _ => false,
    }
}

/// Confirm with user
pub fn confirm_proceed(prompt: &str) -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")?;

    Ok(confirmed)
}
