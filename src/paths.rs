//! Where consul-keys keeps its provider config and state file
//!
//! Each directory comes from the first of: its `CONSUL_KEYS_*_DIR` override,
//! the matching XDG base directory, the platform default. Empty variables
//! count as unset.

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "consul-keys";

/// Default manifest file name, looked up in the working directory
pub const DEFAULT_MANIFEST: &str = "consul-keys.toml";

const CONFIG_FILE: &str = "config.toml";
const STATE_FILE: &str = "state.json";

struct Location {
    override_var: &'static str,
    xdg_var: &'static str,
    /// Used on Windows before falling back to the home directory
    windows_base: fn() -> Option<PathBuf>,
    home_relative: &'static [&'static str],
}

const CONFIG: Location = Location {
    override_var: "CONSUL_KEYS_CONFIG_DIR",
    xdg_var: "XDG_CONFIG_HOME",
    windows_base: dirs::config_dir,
    home_relative: &[".config"],
};

const STATE: Location = Location {
    override_var: "CONSUL_KEYS_STATE_DIR",
    xdg_var: "XDG_STATE_HOME",
    windows_base: dirs::data_local_dir,
    home_relative: &[".local", "state"],
};

impl Location {
    fn resolve(
        &self,
        var: impl Fn(&str) -> Option<String>,
        home: Option<PathBuf>,
    ) -> Result<PathBuf> {
        let var = |name: &str| var(name).filter(|v| !v.is_empty());

        if let Some(dir) = var(self.override_var) {
            log::debug!("{} is set", self.override_var);
            return Ok(expand(&dir));
        }
        if let Some(base) = var(self.xdg_var) {
            return Ok(PathBuf::from(base).join(APP_DIR));
        }
        if let Some(base) = cfg!(windows).then(self.windows_base).flatten() {
            return Ok(base.join(APP_DIR));
        }

        let home = home.context("Could not determine home directory")?;
        Ok(self
            .home_relative
            .iter()
            .fold(home, |path, part| path.join(part))
            .join(APP_DIR))
    }

    fn file(&self, explicit: Option<&str>, name: &str) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(expand(path));
        }
        let dir = self.resolve(|key| std::env::var(key).ok(), dirs::home_dir())?;
        log::debug!("Resolved {} under {}", name, dir.display());
        Ok(dir.join(name))
    }
}

/// Provider config file, unless overridden on the command line
pub fn config_file(explicit: Option<&str>) -> Result<PathBuf> {
    CONFIG.file(explicit, CONFIG_FILE)
}

/// State file, unless overridden on the command line
pub fn state_file(explicit: Option<&str>) -> Result<PathBuf> {
    STATE.file(explicit, STATE_FILE)
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
