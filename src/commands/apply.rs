//! `apply` - make the store match the manifest

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use reconcile::ApplySummary;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::commands::plan::build_plans;
use crate::engine::{
    ExecuteOptions, Executor, PlanMode, TerminalProgress, confirm_proceed, display_plans,
};
use crate::manifest::Manifest;
use crate::paths;
use crate::state::StateFile;
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    ui::header("Applying Consul Keys");

    if args.dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    let manifest = Manifest::load(&paths::expand(&args.file))?;
    let mut state = ctx.state_file()?;
    let (store, defaults) = ctx.connect()?;
    let executor = Executor::new(&store, defaults);

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        yes: args.yes,
    };
    let summary = execute(
        &executor,
        &manifest,
        &mut state,
        args.target.resource.as_deref(),
        &opts,
        ctx.quiet,
    )?;

    if let Some(summary) = summary {
        println!();
        ui::success(&format!(
            "Apply complete: {} written, {} deleted, {} untracked",
            summary.written.to_string().green(),
            summary.deleted.to_string().red(),
            summary.untracked
        ));
    }

    Ok(())
}

/// Plan, confirm, then run every resource plan in order.
///
/// State is saved after each resource, so a failure leaves the resources
/// finished before it recorded. Returns `None` when nothing was run.
pub fn execute(
    executor: &Executor<'_>,
    manifest: &Manifest,
    state: &mut StateFile,
    target: Option<&str>,
    opts: &ExecuteOptions,
    quiet: bool,
) -> Result<Option<ApplySummary>> {
    let plans = build_plans(manifest, &state.state, target)?;

    if !quiet {
        display_plans(&plans);
    }

    if opts.dry_run {
        return Ok(None);
    }

    if plans.iter().any(|p| p.has_changes())
        && !opts.yes
        && !confirm_proceed("Apply these changes?")?
    {
        ui::info("Cancelled");
        return Ok(None);
    }

    let mut progress = TerminalProgress::new(quiet);
    let mut total = ApplySummary::default();

    for resource in &plans {
        let name = resource.name.as_str();
        match resource.mode {
            PlanMode::Teardown => {
                let Some(tracked) = state.state.get(name).cloned() else {
                    continue;
                };
                if !quiet {
                    ui::section(&format!("Tearing down {name}"));
                }
                let summary = executor
                    .teardown(&tracked, manifest.token_for(name), &mut progress)
                    .with_context(|| format!("Failed to tear down resource '{name}'"))?;
                state.state.remove(name);
                state.save()?;
                total.merge(&summary);
            }
            PlanMode::Reconcile => {
                let Some(spec) = manifest.keys.get(name) else {
                    continue;
                };
                if !quiet {
                    ui::section(&format!("Reconciling {name}"));
                }
                let tracked = state.state.get(name).cloned();
                let result = executor
                    .reconcile(spec, tracked.as_ref(), &mut progress)
                    .with_context(|| format!("Failed to apply resource '{name}'"))?;
                log::info!(
                    "Resource '{name}' in '{}': {} vars",
                    result.scope,
                    result.vars.len()
                );
                state.state.record(name, &result);
                state.save()?;
                total.merge(&result.summary);
            }
        }
    }

    Ok(Some(total))
}
