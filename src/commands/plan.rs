//! `plan` - preview what apply would change

use anyhow::Result;
use reconcile::EntrySet;

use crate::Context;
use crate::cli::PlanArgs;
use crate::engine::{ResourcePlan, display_plans, needs_replacement};
use crate::manifest::Manifest;
use crate::paths;
use crate::state::State;
use crate::ui;

pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    ui::header("Consul Keys Plan");

    let manifest = Manifest::load(&paths::expand(&args.file))?;
    let state = ctx.state_file()?;
    let plans = build_plans(&manifest, &state.state, args.target.resource.as_deref())?;

    display_plans(&plans);
    Ok(())
}

/// Plans for the selected resources, in execution order.
///
/// A replaced resource gets a teardown followed by a reconcile from nothing.
/// Without a target, tracked resources missing from the manifest are torn
/// down after everything else.
pub fn build_plans(
    manifest: &Manifest,
    state: &State,
    target: Option<&str>,
) -> Result<Vec<ResourcePlan>> {
    let selected = manifest.select(target)?;
    let mut plans = Vec::new();

    for (name, spec) in &selected {
        let tracked = state.get(name);
        let previous = match tracked {
            Some(tracked) if needs_replacement(spec, Some(tracked)) => {
                log::info!(
                    "Resource '{name}' moves from '{}' to '{}'",
                    tracked.datacenter,
                    spec.datacenter.as_deref().unwrap_or_default()
                );
                plans.push(ResourcePlan::teardown(name, &tracked.keys)?);
                EntrySet::new()
            }
            Some(tracked) => tracked.keys.clone(),
            None => EntrySet::new(),
        };
        plans.push(ResourcePlan::reconcile(name, &previous, &spec.entries())?);
    }

    if target.is_none() {
        let declared: Vec<&str> = selected.iter().map(|(name, _)| *name).collect();
        for name in state.orphans(&declared) {
            log::info!("Resource '{name}' is no longer declared");
            plans.push(ResourcePlan::teardown(name, &state.previous(name))?);
        }
    }

    Ok(plans)
}
