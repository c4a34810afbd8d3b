//! `refresh` - re-read tracked keys and report drift

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use reconcile::{AppliedResult, Operation, Phase, ProgressCallback};
use std::fmt;

use crate::Context;
use crate::cli::RefreshArgs;
use crate::commands::tracked_names;
use crate::engine::{Executor, TerminalProgress};
use crate::manifest::Manifest;
use crate::paths;
use crate::state::{ResourceState, StateFile};
use crate::ui;

/// A difference between recorded state and the live store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    Value {
        path: String,
        old: String,
        new: String,
    },
    Flags {
        path: String,
        old: u64,
        new: u64,
    },
    Missing {
        path: String,
    },
    Var {
        label: String,
        old: Option<String>,
        new: String,
    },
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drift::Value { path, old, new } => write!(
                f,
                "{path}: {} -> {}",
                ui::truncate_value(old, 30),
                ui::truncate_value(new, 30)
            ),
            Drift::Flags { path, old, new } => write!(f, "{path}: flags {old} -> {new}"),
            Drift::Missing { path } => write!(f, "{path}: no longer in the store"),
            Drift::Var { label, old, new } => match old {
                Some(old) => write!(
                    f,
                    "var {label}: {} -> {}",
                    ui::truncate_value(old, 30),
                    ui::truncate_value(new, 30)
                ),
                None => write!(f, "var {label}: {}", ui::truncate_value(new, 30)),
            },
        }
    }
}

/// Passes progress through while remembering keys the store did not have
struct MissingKeys<P> {
    inner: P,
    missing: Vec<String>,
}

impl<P: ProgressCallback> ProgressCallback for MissingKeys<P> {
    fn on_phase_start(&mut self, phase: Phase, count: usize) {
        self.inner.on_phase_start(phase, count);
    }

    fn on_operation(&mut self, operation: &Operation) {
        if let Operation::Read { path, found: false } = operation {
            self.missing.push(path.clone());
        }
        self.inner.on_operation(operation);
    }

    fn on_phase_complete(&mut self, phase: Phase) {
        self.inner.on_phase_complete(phase);
    }
}

/// Compare recorded state against a fresh read
pub fn detect_drift(
    before: &ResourceState,
    after: &AppliedResult,
    missing: &[String],
) -> Vec<Drift> {
    let mut drift = Vec::new();

    for entry in after.entries.iter() {
        if missing.contains(&entry.path) {
            drift.push(Drift::Missing {
                path: entry.path.clone(),
            });
            continue;
        }
        let Some(old) = before.keys.find_path(&entry.path) else {
            continue;
        };
        if entry.is_managed_write() && old.value() != entry.value() {
            drift.push(Drift::Value {
                path: entry.path.clone(),
                old: old.value().to_string(),
                new: entry.value().to_string(),
            });
        }
        if old.flags != entry.flags {
            drift.push(Drift::Flags {
                path: entry.path.clone(),
                old: old.flags,
                new: entry.flags,
            });
        }
    }

    for (label, new) in &after.vars {
        let old = before.var.get(label);
        if old != Some(new) {
            drift.push(Drift::Var {
                label: label.clone(),
                old: old.cloned(),
                new: new.clone(),
            });
        }
    }

    drift
}

pub fn run(ctx: &Context, args: &RefreshArgs) -> Result<()> {
    ui::header("Refreshing Consul Keys");

    let manifest = Manifest::load_optional(&paths::expand(&args.file))?;
    let mut state = ctx.state_file()?;
    let (store, defaults) = ctx.connect()?;
    let executor = Executor::new(&store, defaults);

    let drifted = execute(
        &executor,
        manifest.as_ref(),
        &mut state,
        args.target.resource.as_deref(),
        ctx.quiet,
    )?;

    println!();
    if drifted == 0 {
        ui::success("No drift detected");
    } else {
        ui::warn(&format!("Drift detected in {}", ui::count(drifted, "resource")));
    }

    Ok(())
}

/// Read every selected resource, report its drift and record the result.
///
/// Returns how many resources drifted.
pub fn execute(
    executor: &Executor<'_>,
    manifest: Option<&Manifest>,
    state: &mut StateFile,
    target: Option<&str>,
    quiet: bool,
) -> Result<usize> {
    let names = tracked_names(&state.state, target)?;
    if names.is_empty() {
        ui::info("Nothing is tracked yet");
        return Ok(0);
    }

    let mut drifted = 0;
    for name in &names {
        let Some(tracked) = state.state.get(name).cloned() else {
            continue;
        };
        let token = manifest.and_then(|m| m.token_for(name));

        let mut progress = MissingKeys {
            inner: TerminalProgress::new(quiet),
            missing: Vec::new(),
        };
        let result = executor
            .refresh(&tracked, token, &mut progress)
            .with_context(|| format!("Failed to refresh resource '{name}'"))?;

        let drift = detect_drift(&tracked, &result, &progress.missing);
        if !quiet {
            ui::section(name);
            if drift.is_empty() {
                ui::dim("in sync");
            }
            for item in &drift {
                println!("  {} {item}", "~".yellow());
            }
        }
        if !drift.is_empty() {
            log::info!("Resource '{name}' drifted: {} changes", drift.len());
            drifted += 1;
        }

        state.state.record(name, &result);
        state.save()?;
    }

    Ok(drifted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ConsulStore;
    use chrono::Utc;
    use consulkit::{Client, MockBackend, RetryConfig};
    use reconcile::{Entry, EntrySet, ProviderDefaults};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn tracked(keys: Vec<Entry>, var: &[(&str, &str)]) -> ResourceState {
        ResourceState {
            datacenter: "dc1".to_string(),
            keys: keys.into_iter().collect(),
            var: var
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            last_applied: Utc::now(),
        }
    }

    fn observed(keys: Vec<Entry>, vars: &[(&str, &str)]) -> AppliedResult {
        AppliedResult {
            entries: keys.into_iter().collect::<EntrySet>(),
            vars: vars
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
            scope: "dc1".to_string(),
            ..AppliedResult::default()
        }
    }

    #[test]
    fn test_no_drift() {
        let before = tracked(vec![Entry::write("a", "1").with_label("a")], &[("a", "1")]);
        let after = observed(vec![Entry::write("a", "1").with_label("a")], &[("a", "1")]);
        assert!(detect_drift(&before, &after, &[]).is_empty());
    }

    #[test]
    fn test_value_and_flag_drift() {
        let before = tracked(vec![Entry::write("a", "1")], &[]);
        let after = observed(vec![Entry::write("a", "2").with_flags(4)], &[]);

        assert_eq!(
            detect_drift(&before, &after, &[]),
            vec![
                Drift::Value {
                    path: "a".into(),
                    old: "1".into(),
                    new: "2".into()
                },
                Drift::Flags {
                    path: "a".into(),
                    old: 0,
                    new: 4
                },
            ]
        );
    }

    #[test]
    fn test_missing_key() {
        let before = tracked(vec![Entry::write("a", "1")], &[]);
        let after = observed(vec![Entry::write("a", "")], &[]);
        assert_eq!(
            detect_drift(&before, &after, &["a".to_string()]),
            vec![Drift::Missing { path: "a".into() }]
        );
    }

    #[test]
    fn test_var_drift_on_read_only_key() {
        let before = tracked(vec![Entry::read("r").with_label("r")], &[("r", "old")]);
        let after = observed(vec![Entry::read("r").with_label("r")], &[("r", "new")]);
        assert_eq!(
            detect_drift(&before, &after, &[]),
            vec![Drift::Var {
                label: "r".into(),
                old: Some("old".into()),
                new: "new".into()
            }]
        );
    }

    #[test]
    fn test_refresh_records_live_state() {
        let dir = TempDir::new().unwrap();
        let mock = MockBackend::new();
        mock.insert("dc1", "a", "edited", 0);
        let store = ConsulStore::new(
            Client::with_backend(Box::new(mock.clone())).with_retry(RetryConfig::no_retry()),
        );
        let executor = Executor::new(&store, ProviderDefaults::default());

        let mut state = StateFile::load(&dir.path().join("state.json")).unwrap();
        state.state.resources.insert(
            "app".into(),
            tracked(vec![Entry::write("a", "1").with_label("a")], &[("a", "1")]),
        );

        let drifted = execute(&executor, None, &mut state, None, true).unwrap();

        assert_eq!(drifted, 1);
        assert_eq!(state.state.get("app").unwrap().var["a"], "edited");
        // Refresh never writes
        assert_eq!(mock.value("dc1", "a").as_deref(), Some("edited"));
        assert!(dir.path().join("state.json").exists());
    }

    #[test]
    fn test_refresh_unknown_target() {
        let dir = TempDir::new().unwrap();
        let mock = MockBackend::new();
        let store = ConsulStore::new(Client::with_backend(Box::new(mock)));
        let executor = Executor::new(&store, ProviderDefaults::default());
        let mut state = StateFile::load(&dir.path().join("state.json")).unwrap();

        assert!(execute(&executor, None, &mut state, Some("nope"), true).is_err());
    }
}
