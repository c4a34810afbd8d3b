//! `destroy` - stop managing resources

use anyhow::{Context as AnyhowContext, Result};
use reconcile::ApplySummary;

use crate::Context;
use crate::cli::DestroyArgs;
use crate::commands::tracked_names;
use crate::engine::{
    ExecuteOptions, Executor, ResourcePlan, TerminalProgress, confirm_proceed, display_plans,
};
use crate::manifest::Manifest;
use crate::paths;
use crate::state::StateFile;
use crate::ui;

pub fn run(ctx: &Context, args: &DestroyArgs) -> Result<()> {
    ui::header("Destroying Consul Keys");

    let manifest = Manifest::load_optional(&paths::expand(&args.file))?;
    let mut state = ctx.state_file()?;
    let (store, defaults) = ctx.connect()?;
    let executor = Executor::new(&store, defaults);

    let opts = ExecuteOptions {
        dry_run: false,
        yes: args.yes,
    };
    if let Some(summary) = execute(
        &executor,
        manifest.as_ref(),
        &mut state,
        args.target.resource.as_deref(),
        &opts,
        ctx.quiet,
    )? {
        println!();
        ui::success(&format!(
            "Destroy complete: {} deleted, {} left in place",
            summary.deleted, summary.untracked
        ));
    }

    Ok(())
}

/// Tear down tracked resources and drop them from state.
///
/// Keys are removed in the datacenter recorded at apply time. Returns
/// `None` when nothing was run.
pub fn execute(
    executor: &Executor<'_>,
    manifest: Option<&Manifest>,
    state: &mut StateFile,
    target: Option<&str>,
    opts: &ExecuteOptions,
    quiet: bool,
) -> Result<Option<ApplySummary>> {
    let names = tracked_names(&state.state, target)?;
    if names.is_empty() {
        ui::info("Nothing to destroy");
        return Ok(None);
    }

    let plans = names
        .iter()
        .map(|name| ResourcePlan::teardown(name, &state.state.previous(name)))
        .collect::<Result<Vec<_>>>()?;
    if !quiet {
        display_plans(&plans);
    }

    if !opts.yes && !confirm_proceed("Destroy these resources?")? {
        ui::info("Cancelled");
        return Ok(None);
    }

    let mut progress = TerminalProgress::new(quiet);
    let mut total = ApplySummary::default();

    for name in &names {
        let Some(tracked) = state.state.get(name).cloned() else {
            continue;
        };
        let token = manifest.and_then(|m| m.token_for(name));
        let summary = executor
            .teardown(&tracked, token, &mut progress)
            .with_context(|| format!("Failed to destroy resource '{name}'"))?;

        state.state.remove(name);
        state.save()?;
        total.merge(&summary);
    }

    Ok(Some(total))
}
