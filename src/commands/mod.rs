pub mod apply;
pub mod destroy;
pub mod plan;
pub mod refresh;
pub mod show;

use anyhow::{Result, bail};

use crate::state::State;

/// Tracked resources to act on: one by name, or all of them
pub fn tracked_names(state: &State, target: Option<&str>) -> Result<Vec<String>> {
    match target {
        Some(name) if state.get(name).is_some() => Ok(vec![name.to_string()]),
        Some(name) => bail!("Resource '{name}' is not tracked in state"),
        None => Ok(state.resources.keys().cloned().collect()),
    }
}
