//! Reconciliation engine - applies entry changes through a [`KeyClient`]
//!
//! Writes always run before deletes. A key that is renamed or edited in
//! place shows up as one removal plus one addition on the same path; writing
//! first and then refusing to delete any path written in the same pass keeps
//! the key present throughout.
//!
//! Any store failure aborts the remaining phases. Work done before the
//! failure is not rolled back.

use crate::client::{KeyClient, KvStore};
use crate::context::{NoProgress, Phase, ProgressCallback};
use crate::diff::{ChangeSet, removal, write_value};
use crate::error::Result;
use crate::types::{AppliedResult, ApplySummary, Entry, EntryKind, EntrySet, Operation};
use crate::value;
use std::collections::{BTreeMap, BTreeSet};

/// Converge the store from `previous` towards `desired`, then re-read it.
///
/// # Arguments
/// * `previous` - Entries as last observed
/// * `desired` - Entries as now declared
/// * `client` - Store access bound to the resolved scope
/// * `progress` - Progress callback
///
/// # Returns
/// The refreshed entries and aggregate map, to be used as the next `previous`
pub fn apply<S, P>(
    previous: &EntrySet,
    desired: &EntrySet,
    client: &KeyClient<'_, S>,
    progress: &mut P,
) -> Result<AppliedResult>
where
    S: KvStore + ?Sized,
    P: ProgressCallback,
{
    previous.validate()?;
    desired.validate()?;

    let changes = ChangeSet::compute(previous, desired);
    let mut summary = ApplySummary::default();

    if changes.is_empty() {
        log::debug!("No key changes, only refreshing");
    } else {
        log::debug!(
            "{} entries to add, {} to remove",
            changes.to_add.len(),
            changes.to_remove.len()
        );
        let added_paths = write_phase(&changes.to_add, client, progress, &mut summary)?;
        delete_phase(&changes.to_remove, &added_paths, client, progress, &mut summary)?;
    }

    let mut result = read_back(desired, client, progress)?;
    result.summary.merge(&summary);
    Ok(result)
}

/// Apply without progress reporting
pub fn apply_simple<S: KvStore + ?Sized>(
    previous: &EntrySet,
    desired: &EntrySet,
    client: &KeyClient<'_, S>,
) -> Result<AppliedResult> {
    apply(previous, desired, client, &mut NoProgress)
}

/// Plain read: refresh `entries` from the store without writing anything
pub fn read<S, P>(
    entries: &EntrySet,
    client: &KeyClient<'_, S>,
    progress: &mut P,
) -> Result<AppliedResult>
where
    S: KvStore + ?Sized,
    P: ProgressCallback,
{
    entries.validate()?;
    read_back(entries, client, progress)
}

/// Teardown: stop tracking every entry, deleting those marked for deletion
pub fn destroy<S, P>(
    entries: &EntrySet,
    client: &KeyClient<'_, S>,
    progress: &mut P,
) -> Result<ApplySummary>
where
    S: KvStore + ?Sized,
    P: ProgressCallback,
{
    entries.validate()?;

    let removed: Vec<Entry> = entries.iter().cloned().collect();
    let mut summary = ApplySummary::default();
    delete_phase(&removed, &BTreeSet::new(), client, progress, &mut summary)?;
    Ok(summary)
}

fn write_phase<S, P>(
    to_add: &[Entry],
    client: &KeyClient<'_, S>,
    progress: &mut P,
    summary: &mut ApplySummary,
) -> Result<BTreeSet<String>>
where
    S: KvStore + ?Sized,
    P: ProgressCallback,
{
    let mut added_paths = BTreeSet::new();
    progress.on_phase_start(Phase::Write, to_add.len());

    for entry in to_add {
        let operation = match write_value(entry) {
            Some(value) => {
                client.put(&entry.path, value, entry.flags)?;
                log::info!("Wrote {}", entry.path);
                added_paths.insert(entry.path.clone());
                Operation::Put {
                    path: entry.path.clone(),
                    flags: entry.flags,
                }
            }
            None => Operation::SkipEmptyWrite {
                path: entry.path.clone(),
            },
        };
        summary.add(&operation);
        progress.on_operation(&operation);
    }

    progress.on_phase_complete(Phase::Write);
    Ok(added_paths)
}

fn delete_phase<S, P>(
    to_remove: &[Entry],
    added_paths: &BTreeSet<String>,
    client: &KeyClient<'_, S>,
    progress: &mut P,
    summary: &mut ApplySummary,
) -> Result<()>
where
    S: KvStore + ?Sized,
    P: ProgressCallback,
{
    progress.on_phase_start(Phase::Delete, to_remove.len());

    for entry in to_remove {
        let operation = removal(entry, added_paths);
        match &operation {
            Operation::Delete { path } => {
                client.delete(path)?;
                log::info!("Deleted {path}");
            }
            Operation::KeepRewritten { path } => {
                log::debug!("Not deleting {path}, it was rewritten in this pass");
            }
            _ => log::debug!("No longer tracking {}", entry.path),
        }
        summary.add(&operation);
        progress.on_operation(&operation);
    }

    progress.on_phase_complete(Phase::Delete);
    Ok(())
}

fn read_back<S, P>(
    entries: &EntrySet,
    client: &KeyClient<'_, S>,
    progress: &mut P,
) -> Result<AppliedResult>
where
    S: KvStore + ?Sized,
    P: ProgressCallback,
{
    progress.on_phase_start(Phase::ReadBack, entries.len());

    let mut refreshed = EntrySet::new();
    let mut vars = BTreeMap::new();
    let mut summary = ApplySummary::default();

    for entry in entries {
        let stored = client.lookup(&entry.path)?;
        let found = stored.is_some();
        let stored = stored.unwrap_or_default();

        let effective = value::resolve(&stored.value, entry.default.as_ref());
        if !entry.label.is_empty() {
            vars.insert(entry.label.clone(), effective.clone());
        }

        let mut observed = entry.clone();
        observed.flags = stored.flags;
        // Managed writes carry the live value so drift shows up in the next diff
        if let EntryKind::ManagedWrite { value } = &mut observed.kind {
            *value = effective;
        }
        refreshed.insert(observed);

        let operation = Operation::Read {
            path: entry.path.clone(),
            found,
        };
        summary.add(&operation);
        progress.on_operation(&operation);
    }

    progress.on_phase_complete(Phase::ReadBack);

    Ok(AppliedResult {
        entries: refreshed,
        vars,
        scope: client.scope().to_string(),
        summary,
    })
}
