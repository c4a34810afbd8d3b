//! Desired keys, declared in a TOML manifest
//!
//! ```toml
//! [keys.app]
//! datacenter = "dc1"
//!
//! [[keys.app.key]]
//! name = "ami"
//! path = "service/app/ami"
//! value = "ami-1234"
//! delete = true
//! ```

use anyhow::{Context, Result, bail};
use reconcile::{Entry, EntrySet};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Parsed manifest: resource name to its declaration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub keys: BTreeMap<String, ResourceSpec>,
}

/// One independently reconciled group of keys
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    /// Explicit scope; discovered from the agent when absent
    #[serde(default)]
    pub datacenter: Option<String>,
    /// Token for this resource only
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "key")]
    pub keys: Vec<Entry>,
}

impl ResourceSpec {
    /// Declared entries, with identical records collapsed
    pub fn entries(&self) -> EntrySet {
        self.keys.iter().cloned().collect()
    }
}

impl Manifest {
    /// Read and validate a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let manifest = Self::parse(&content)
            .with_context(|| format!("Invalid manifest: {}", path.display()))?;
        log::debug!(
            "Loaded {} resources from {}",
            manifest.keys.len(),
            path.display()
        );
        Ok(manifest)
    }

    /// Like [`Manifest::load`], but a missing file is not an error
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            log::debug!("No manifest at {}", path.display());
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        for (name, spec) in &self.keys {
            if name.trim().is_empty() {
                bail!("Resource names must not be empty");
            }
            spec.entries()
                .validate()
                .with_context(|| format!("Resource '{name}'"))?;

            let mut seen = BTreeSet::new();
            for entry in spec.entries().iter() {
                if !seen.insert(entry.path.as_str()) {
                    log::warn!(
                        "Resource '{name}' declares path '{}' more than once",
                        entry.path
                    );
                }
            }
        }
        Ok(())
    }

    /// Token declared for a resource, if any
    pub fn token_for(&self, name: &str) -> Option<&str> {
        self.keys.get(name).and_then(|spec| spec.token.as_deref())
    }

    /// Resources to act on: one by name, or all of them
    pub fn select(&self, name: Option<&str>) -> Result<Vec<(&str, &ResourceSpec)>> {
        match name {
            Some(name) => match self.keys.get_key_value(name) {
                Some((n, spec)) => Ok(vec![(n.as_str(), spec)]),
                None => bail!("Resource '{name}' is not declared in the manifest"),
            },
            None => Ok(self.keys.iter().map(|(n, s)| (n.as_str(), s)).collect()),
        }
    }
}
