use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reconcile::{AppliedResult, EntrySet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// State Structures
// ============================================================================

/// Everything consul-keys remembers between runs, keyed by resource name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    pub resources: BTreeMap<String, ResourceState>,
}

/// Last observed state of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Scope the resource was reconciled in
    pub datacenter: String,

    /// Entries as last read back; the `previous` set of the next apply
    #[serde(default)]
    pub keys: EntrySet,

    /// Label to effective value
    #[serde(default)]
    pub var: BTreeMap<String, String>,

    pub last_applied: DateTime<Utc>,
}

impl ResourceState {
    pub fn from_result(result: &AppliedResult) -> Self {
        Self {
            datacenter: result.scope.clone(),
            keys: result.entries.clone(),
            var: result.vars.clone(),
            last_applied: Utc::now(),
        }
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// A state document bound to the file it came from
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    pub state: State,
}

impl StateFile {
    /// Load state from disk, or start empty if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, using empty state", path.display());
            return Ok(Self {
                path: path.to_path_buf(),
                state: State::default(),
            });
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: State = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!(
            "Loaded state for {} resources from {}",
            state.resources.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    /// Save state to disk
    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(&self.state).context("Failed to serialize state")?;
        fs::write(&self.path, content + "\n")
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;

        log::debug!("Saved state to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl State {
    pub fn get(&self, name: &str) -> Option<&ResourceState> {
        self.resources.get(name)
    }

    /// Entries tracked for a resource, empty when it was never applied
    pub fn previous(&self, name: &str) -> EntrySet {
        self.get(name).map(|r| r.keys.clone()).unwrap_or_default()
    }

    /// Record the outcome of an apply or refresh
    pub fn record(&mut self, name: &str, result: &AppliedResult) {
        self.resources
            .insert(name.to_string(), ResourceState::from_result(result));
    }

    pub fn remove(&mut self, name: &str) -> Option<ResourceState> {
        self.resources.remove(name)
    }

    /// Tracked resources that are no longer declared
    pub fn orphans<'a>(&'a self, declared: &[&str]) -> Vec<&'a str> {
        self.resources
            .keys()
            .map(String::as_str)
            .filter(|name| !declared.contains(name))
            .collect()
    }
}
